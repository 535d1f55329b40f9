use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use imulink_frame::TelemetryReader;
use imulink_transport::LineSource;
use tracing::debug;

use crate::cmd::{print_stream, DecodeArgs};
use crate::exit::{io_error, CliResult};
use crate::output::OutputFormat;

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let (input, source) = open_input(&args.input)?;
    debug!(%source, "decoding capture");

    let reader = TelemetryReader::with_config(
        LineSource::new(BufReader::new(input)),
        args.decode.decoder_config(),
    );
    let (rx, handle) = reader
        .spawn(args.decode.queue)
        .map_err(|err| io_error("reader thread failed to start", err))?;

    print_stream(rx, handle, &source, args.count, format)
}

fn open_input(path: &Path) -> CliResult<(Box<dyn Read + Send>, String)> {
    if path == Path::new("-") {
        return Ok((Box::new(io::stdin()), "stdin".to_string()));
    }
    let file = File::open(path)
        .map_err(|err| io_error(&format!("open {} failed", path.display()), err))?;
    Ok((Box::new(file), path.display().to_string()))
}
