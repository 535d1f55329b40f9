use bytes::{BufMut, BytesMut};

use crate::crc::crc16_kermit;
use crate::error::{FrameError, Result};

/// Frame start marker (`':'`).
pub const HEADER: u8 = b':';

/// Header byte + length byte.
pub const PREFIX_SIZE: usize = 2;

/// Big-endian CRC trailer.
pub const CRC_SIZE: usize = 2;

/// Bytes a frame adds around its payload.
pub const FRAME_OVERHEAD: usize = PREFIX_SIZE + CRC_SIZE;

/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Largest complete frame on the wire.
pub const MAX_FRAME_SIZE: usize = FRAME_OVERHEAD + MAX_PAYLOAD;

/// Chunks shorter than this cannot hold a frame and are treated as noise.
pub const MIN_CHUNK_SIZE: usize = 7;

/// Scale of the 2.14 fixed-point quaternion components.
pub const FIXED_POINT_SCALE: f32 = 16384.0;

/// Total wire size of a frame carrying `payload_len` bytes.
pub const fn frame_len(payload_len: usize) -> usize {
    FRAME_OVERHEAD + payload_len
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────┬─────────────────┬──────────────┐
/// │ Header   │ Length   │ Payload         │ CRC (2B BE)  │
/// │ ':'      │ (1B)     │ (Length bytes)  │ Kermit       │
/// └──────────┴──────────┴─────────────────┴──────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(frame_len(payload.len()));
    dst.put_u8(HEADER);
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    dst.put_u16(crc16_kermit(payload));
    Ok(())
}

/// Encode a payload followed by the `\n` the firmware ends each frame with.
pub fn encode_line(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    encode_frame(payload, dst)?;
    dst.put_u8(b'\n');
    Ok(())
}

/// Decode one 2.14 fixed-point component.
///
/// The raw value is read as unsigned and wrapped into `[-2, 2)`.
pub fn fixed_point_to_f32(raw: u16) -> f32 {
    let value = f32::from(raw) / FIXED_POINT_SCALE;
    if value >= 2.0 {
        value - 4.0
    } else {
        value
    }
}

/// Encode one component as 2.14 fixed point, saturating outside `[-2, 2)`.
pub fn f32_to_fixed_point(value: f32) -> u16 {
    let scaled = (value * FIXED_POINT_SCALE).round();
    let clamped = scaled.clamp(-2.0 * FIXED_POINT_SCALE, 2.0 * FIXED_POINT_SCALE - 1.0);
    (clamped as i32 as i16) as u16
}

/// Round half-up to `places` decimals. Presentation only.
///
/// Rounds the magnitude and keeps the sign, so `-0.0125` becomes `-0.013`
/// and `-0.0001` becomes `-0.000`.
pub fn round_half_up(value: f32, places: u32) -> f64 {
    let value = f64::from(value);
    let pow = 10f64.powi(places as i32);
    let digit = pow * value.abs();
    let fraction = digit - digit.trunc();
    let rounded = if fraction >= 0.5 {
        digit.ceil()
    } else {
        digit.floor()
    };
    (rounded / pow).copysign(value)
}
