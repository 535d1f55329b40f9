use std::path::PathBuf;

/// Errors that can occur while opening or reading a telemetry byte source.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the device at the specified path.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to apply line settings to an opened device.
    #[error("failed to configure {path}: {source}")]
    Configure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The requested baud rate has no termios equivalent.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaudRate(u32),

    /// An I/O error occurred while reading from the source.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The source reached end of stream.
    #[error("end of stream")]
    EndOfStream,
}

impl TransportError {
    /// Returns true if the source was closed rather than failing.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, TransportError::EndOfStream)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
