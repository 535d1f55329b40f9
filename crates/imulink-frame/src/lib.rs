//! Reassembly and decoding of CRC-checked IMU measurement frames.
//!
//! The sensor emits one frame per sample:
//! - `':'` header byte
//! - 1-byte payload length
//! - payload: a status byte selecting the field groups, then the groups
//! - CRC-CCITT (Kermit) over the payload, big-endian
//!
//! Frames are read as newline-terminated chunks from an
//! [`imulink_transport::ChunkSource`]. The [`Reassembler`] joins chunks that
//! were split on a `0x0A` payload byte, the decoder validates and parses each
//! candidate, and a [`TelemetryReader`] delivers the results to a
//! [`MeasurementSink`]. Corrupt frames are counted and skipped.

pub mod codec;
pub mod crc;
pub mod decoder;
pub mod error;
pub mod measurement;
pub mod reader;
pub mod reassembler;
pub mod sink;
pub mod status;

#[cfg(feature = "async")]
pub mod stream;

pub use codec::{
    encode_frame, encode_line, frame_len, FIXED_POINT_SCALE, FRAME_OVERHEAD, HEADER,
    MAX_FRAME_SIZE, MAX_PAYLOAD, MIN_CHUNK_SIZE,
};
pub use crc::crc16_kermit;
pub use decoder::{decode_frame, decode_frame_with, decode_measurement, DecoderConfig, PayloadCursor};
pub use error::{FrameError, Result};
pub use measurement::{
    Decoded, InitNotice, InitStage, Measurement, Quaternion, QuaternionField, Vector3,
    YawPitchRoll,
};
pub use reader::{DecodeStats, TelemetryReader};
pub use reassembler::{Assembly, Reassembler};
pub use sink::{MeasurementSink, DEFAULT_QUEUE_CAPACITY};
pub use status::{FieldGroup, StatusMask};

#[cfg(feature = "async")]
pub use stream::TelemetryCodec;
