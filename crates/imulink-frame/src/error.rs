use imulink_transport::TransportError;

use crate::status::FieldGroup;

/// Errors that can occur during frame decoding and delivery.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The CRC carried by the frame does not match its payload.
    #[error("invalid crc: got {received:04X}, expect {expected:04X}")]
    ChecksumMismatch { received: u16, expected: u16 },

    /// The status mask announces a field group the payload is too short for.
    #[error("{group}: invalid got {available} expect {needed}")]
    TruncatedField {
        group: FieldGroup,
        needed: usize,
        available: usize,
    },

    /// Both quaternion encodings are present and the decoder rejects that.
    #[error("quaternion and buffer quaternion both present (status {status:#04x})")]
    ConflictingQuaternion { status: u8 },

    /// The candidate is not a complete `':' L payload crc` frame.
    #[error("malformed frame ({len} bytes)")]
    MalformedFrame { len: usize },

    /// The payload does not fit the one-byte length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The downstream queue was closed by its consumer.
    #[error("measurement sink closed")]
    SinkClosed,

    /// The byte source failed or reached end of stream.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An I/O error occurred while reading frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Returns true for failures confined to a single frame.
    ///
    /// These are logged and skipped; the stream carries on with the next
    /// candidate frame.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            FrameError::ChecksumMismatch { .. }
                | FrameError::TruncatedField { .. }
                | FrameError::ConflictingQuaternion { .. }
                | FrameError::MalformedFrame { .. }
        )
    }

    /// Returns true if the byte source was closed cleanly.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, FrameError::Transport(err) if err.is_end_of_stream())
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
