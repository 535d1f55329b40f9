use crate::cmd::ListenArgs;
use crate::exit::CliResult;
use crate::output::OutputFormat;

#[cfg(unix)]
pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    use imulink_frame::TelemetryReader;
    use imulink_transport::{SerialConfig, SerialPort};

    use crate::exit::{io_error, transport_error};

    let mut config = SerialConfig::default();
    if let Some(device) = args.device {
        config.device = device;
    }
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }

    let port = SerialPort::open(&config).map_err(|err| transport_error("open failed", err))?;
    let source = port.path().display().to_string();
    tracing::info!(%source, baud_rate = port.baud_rate(), "listening");

    let reader =
        TelemetryReader::with_config(port.into_line_source(), args.decode.decoder_config());
    let (rx, handle) = reader
        .spawn(args.decode.queue)
        .map_err(|err| io_error("reader thread failed to start", err))?;

    crate::cmd::print_stream(rx, handle, &source, args.count, format)
}

#[cfg(not(unix))]
pub fn run(_args: ListenArgs, _format: OutputFormat) -> CliResult<i32> {
    Err(crate::exit::CliError::new(
        crate::exit::USAGE,
        "serial devices are only supported on unix",
    ))
}
