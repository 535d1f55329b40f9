//! Byte sources for IMU telemetry links.
//!
//! The device writes binary frames terminated by `\n`, so every source here
//! yields newline-delimited chunks:
//! - [`LineSource`] adapts any buffered reader (files, pipes, captures)
//! - [`SerialPort`] opens and configures a serial device (unix)
//!
//! This is the lowest layer of imulink. The frame reassembler consumes the
//! [`ChunkSource`] trait provided here and never touches the device itself.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod serial;

pub use error::{Result, TransportError};
pub use traits::{ChunkSource, LineSource, CHUNK_TERMINATOR, MAX_CHUNK_LEN};

#[cfg(unix)]
pub use serial::{SerialConfig, SerialPort, DEFAULT_BAUD_RATE, DEFAULT_DEVICE};
