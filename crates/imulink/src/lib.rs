//! Streaming decoder for CRC-checked IMU telemetry.
//!
//! An MPU-style sensor board streams one binary frame per sample over a
//! serial link. imulink turns that newline-chunked, possibly fragmented byte
//! stream into validated measurements.
//!
//! # Crate Structure
//!
//! - [`transport`]: newline-chunked byte sources (buffered readers, serial devices)
//! - [`frame`]: reassembly, CRC validation and field decoding
//!
//! ```no_run
//! use imulink::frame::{TelemetryReader, DEFAULT_QUEUE_CAPACITY};
//! use imulink::transport::{SerialConfig, SerialPort};
//!
//! let port = SerialPort::open(&SerialConfig::default())?;
//! let reader = TelemetryReader::new(port.into_line_source());
//! let (measurements, _handle) = reader.spawn(DEFAULT_QUEUE_CAPACITY)?;
//! for decoded in measurements {
//!     println!("{decoded}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use imulink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use imulink_frame::*;
}
