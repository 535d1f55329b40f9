use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use imulink_frame::{DecodeStats, Decoded, DecoderConfig, FrameError, DEFAULT_QUEUE_CAPACITY};
use tracing::info;

use crate::exit::{frame_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_decoded, print_stats, OutputFormat};

pub mod decode;
pub mod listen;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read telemetry from a serial device and print decoded frames.
    Listen(ListenArgs),
    /// Decode a captured byte stream (file or stdin).
    Decode(DecodeArgs),
    /// Write synthetic newline-terminated frames.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Simulate(args) => simulate::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// How often the printer wakes to check for Ctrl-C while the queue is empty.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Print values from a spawned reader until it stops, `count` values have
/// been printed, or Ctrl-C.
pub(crate) fn print_stream(
    rx: Receiver<Decoded>,
    handle: JoinHandle<(DecodeStats, FrameError)>,
    source: &str,
    count: Option<usize>,
    format: OutputFormat,
) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let decoded = match rx.recv_timeout(POLL_INTERVAL) {
            Ok(decoded) => decoded,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return finish(handle, source, format),
        };

        print_decoded(&decoded, source, printed as u64, format);
        printed = printed.saturating_add(1);

        if let Some(count) = count {
            if printed >= count {
                info!(printed, "count reached");
                return Ok(SUCCESS);
            }
        }
    }

    info!(printed, "interrupted");
    Ok(SUCCESS)
}

fn finish(
    handle: JoinHandle<(DecodeStats, FrameError)>,
    source: &str,
    format: OutputFormat,
) -> CliResult<i32> {
    let (stats, err) = handle
        .join()
        .map_err(|_| CliError::new(INTERNAL, "reader thread panicked"))?;
    info!(
        frames = stats.frames,
        measurements = stats.measurements,
        discarded = stats.discarded(),
        "stream finished"
    );
    print_stats(&stats, source, format);

    if err.is_end_of_stream() {
        Ok(SUCCESS)
    } else {
        Err(frame_error("read failed", err))
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Decoder options shared by `listen` and `decode`.
#[derive(Args, Debug)]
pub struct DecodeOptions {
    /// Print init notices in addition to measurements.
    #[arg(long)]
    pub forward_init: bool,
    /// Drop frames carrying both a float and a fixed-point quaternion.
    #[arg(long)]
    pub reject_conflicting: bool,
    /// Capacity of the queue between the reader thread and the printer.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_QUEUE_CAPACITY, value_parser = parse_queue)]
    pub queue: usize,
}

impl DecodeOptions {
    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            forward_init_notices: self.forward_init,
            reject_conflicting_quaternion: self.reject_conflicting,
        }
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Serial device path [default: /dev/ttyACM0].
    #[arg(env = "IMULINK_DEVICE")]
    pub device: Option<PathBuf>,
    /// Line speed [default: 38400].
    #[arg(long, env = "IMULINK_BAUD")]
    pub baud: Option<u32>,
    /// Exit after printing N values.
    #[arg(long, value_name = "N", value_parser = parse_count)]
    pub count: Option<usize>,
    #[command(flatten)]
    pub decode: DecodeOptions,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file to decode, or `-` for stdin.
    pub input: PathBuf,
    /// Exit after printing N values.
    #[arg(long, value_name = "N", value_parser = parse_count)]
    pub count: Option<usize>,
    #[command(flatten)]
    pub decode: DecodeOptions,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of measurement frames to write.
    #[arg(long, default_value_t = 10)]
    pub count: u64,
    /// Status mask selecting the field groups (decimal or 0x-prefixed hex).
    #[arg(long, value_name = "MASK", default_value = "0x1f", value_parser = parse_status)]
    pub status: u8,
    /// Precede the measurements with the firmware start-up notices.
    #[arg(long)]
    pub init: bool,
    /// Write to a file instead of stdout.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
    /// Delay between frames in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 0)]
    pub interval_ms: u64,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_queue(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("queue capacity must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(err) => Err(err.to_string()),
    }
}

fn parse_count(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("count must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(err) => Err(err.to_string()),
    }
}

fn parse_status(raw: &str) -> Result<u8, String> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => raw.parse::<u8>(),
    };
    parsed.map_err(|err| format!("invalid status mask `{raw}`: {err}"))
}
