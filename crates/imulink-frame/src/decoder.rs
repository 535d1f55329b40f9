//! Decoding of complete candidate frames into [`Decoded`] values.
//!
//! Per frame: CRC check, init-notice detection, then a walk over the payload
//! with a [`PayloadCursor`] that every announced field group advances in bit
//! order. Any failure discards the whole frame; nothing partial escapes.

use crate::codec::{fixed_point_to_f32, CRC_SIZE, FRAME_OVERHEAD, HEADER, PREFIX_SIZE};
use crate::crc::crc16_kermit;
use crate::error::{FrameError, Result};
use crate::measurement::{
    Decoded, InitNotice, InitStage, Measurement, Quaternion, QuaternionField, Vector3,
    YawPitchRoll,
};
use crate::status::{FieldGroup, StatusMask};

/// Payload length of an init notice.
pub const INIT_NOTICE_LEN: usize = 2;

/// Decoder behavior switches.
#[derive(Debug, Clone, Default)]
pub struct DecoderConfig {
    /// Deliver init notices downstream instead of only logging them.
    pub forward_init_notices: bool,
    /// Drop frames announcing both QUATERNION and BUFFER.
    pub reject_conflicting_quaternion: bool,
}

/// A bounds-checked view over the not-yet-decoded payload bytes.
#[derive(Debug, Clone, Copy)]
pub struct PayloadCursor<'a> {
    remaining: &'a [u8],
}

impl<'a> PayloadCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { remaining: bytes }
    }

    /// Bytes left to decode.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Take the bytes of `group`, or fail without advancing.
    pub fn take_group(&mut self, group: FieldGroup) -> Result<&'a [u8]> {
        let needed = group.byte_len();
        if self.remaining.len() < needed {
            return Err(FrameError::TruncatedField {
                group,
                needed,
                available: self.remaining.len(),
            });
        }
        let (head, tail) = self.remaining.split_at(needed);
        self.remaining = tail;
        Ok(head)
    }
}

/// Decode a complete frame with default settings.
pub fn decode_frame(frame: &[u8]) -> Result<Decoded> {
    decode_frame_with(frame, &DecoderConfig::default())
}

/// Decode a complete `':' L payload crc` frame.
pub fn decode_frame_with(frame: &[u8], config: &DecoderConfig) -> Result<Decoded> {
    let payload = verified_payload(frame)?;

    let status = payload[0];
    if payload.len() == INIT_NOTICE_LEN {
        if let Some(stage) = InitStage::from_status(status) {
            return Ok(Decoded::Init(InitNotice::new(stage, payload[1])));
        }
    }

    let status = StatusMask::new(status);
    if config.reject_conflicting_quaternion && status.has_conflicting_quaternion() {
        return Err(FrameError::ConflictingQuaternion {
            status: status.bits(),
        });
    }

    decode_measurement(status, &payload[1..]).map(Decoded::Measurement)
}

/// Check framing and CRC, returning the payload (never empty).
fn verified_payload(frame: &[u8]) -> Result<&[u8]> {
    if frame.len() < PREFIX_SIZE || frame[0] != HEADER {
        return Err(FrameError::MalformedFrame { len: frame.len() });
    }
    let length = usize::from(frame[1]);
    if length == 0 || frame.len() < FRAME_OVERHEAD + length {
        return Err(FrameError::MalformedFrame { len: frame.len() });
    }

    let crc_at = PREFIX_SIZE + length;
    let received = u16::from_be_bytes([frame[crc_at], frame[crc_at + CRC_SIZE - 1]]);
    let payload = &frame[PREFIX_SIZE..crc_at];

    let expected = crc16_kermit(payload);
    if received != expected {
        return Err(FrameError::ChecksumMismatch { received, expected });
    }
    Ok(payload)
}

/// Decode the field groups announced by `status` from `fields`.
///
/// Bytes left over after the last announced group are ignored.
pub fn decode_measurement(status: StatusMask, fields: &[u8]) -> Result<Measurement> {
    let mut cursor = PayloadCursor::new(fields);
    let mut measurement = Measurement {
        status,
        ..Measurement::default()
    };

    for group in status.groups() {
        let bytes = cursor.take_group(group)?;
        match group {
            FieldGroup::Quaternion => {
                let q = float_quaternion(bytes);
                measurement.quaternion =
                    Some(QuaternionField::with_float(measurement.quaternion, q));
            }
            FieldGroup::Euler => measurement.euler = Some(vector3(bytes)),
            FieldGroup::YawPitchRoll => {
                let [yaw, pitch, roll] = floats::<3>(bytes);
                measurement.yaw_pitch_roll = Some(YawPitchRoll { yaw, pitch, roll });
            }
            FieldGroup::RealAccel => measurement.real_accel = Some(vector3(bytes)),
            FieldGroup::WorldAccel => measurement.world_accel = Some(vector3(bytes)),
            FieldGroup::Buffer => {
                let q = fixed_point_quaternion(bytes);
                measurement.quaternion =
                    Some(QuaternionField::with_fixed_point(measurement.quaternion, q));
            }
        }
    }

    Ok(measurement)
}

/// `N` little-endian `f32` from exactly `4 * N` bytes.
fn floats<const N: usize>(bytes: &[u8]) -> [f32; N] {
    let mut out = [0f32; N];
    for (value, word) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *value = f32::from_le_bytes([word[0], word[1], word[2], word[3]]);
    }
    out
}

fn vector3(bytes: &[u8]) -> Vector3 {
    let [x, y, z] = floats::<3>(bytes);
    Vector3 { x, y, z }
}

fn float_quaternion(bytes: &[u8]) -> Quaternion {
    let [w, x, y, z] = floats::<4>(bytes);
    Quaternion { w, x, y, z }
}

fn fixed_point_quaternion(bytes: &[u8]) -> Quaternion {
    let mut out = [0f32; 4];
    for (value, word) in out.iter_mut().zip(bytes.chunks_exact(2)) {
        *value = fixed_point_to_f32(u16::from_be_bytes([word[0], word[1]]));
    }
    let [w, x, y, z] = out;
    Quaternion { w, x, y, z }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::encode_frame;
    use crate::status::{BUFFER, EULER, QUATERNION, REALACCEL, WORLDACCEL, YAWPITCHROLL};

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(payload, &mut buf).unwrap();
        buf.to_vec()
    }

    fn floats_payload(status: u8, values: &[f32]) -> Vec<u8> {
        let mut payload = vec![status];
        for v in values {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        payload
    }

    #[test]
    fn quaternion_only() {
        let payload = floats_payload(QUATERNION, &[0.5, -0.25, 1.0e-3, 0.8660254]);
        let decoded = decode_frame(&frame(&payload)).unwrap();

        let m = decoded.into_measurement().unwrap();
        assert_eq!(m.status.bits(), QUATERNION);
        assert_eq!(
            m.quaternion,
            Some(QuaternionField::Float(Quaternion {
                w: 0.5,
                x: -0.25,
                y: 1.0e-3,
                z: 0.8660254,
            }))
        );
        assert!(m.euler.is_none());
        assert!(m.yaw_pitch_roll.is_none());
        assert!(m.real_accel.is_none());
        assert!(m.world_accel.is_none());
    }

    #[test]
    fn floats_are_bit_identical() {
        let odd = [f32::MIN_POSITIVE, -0.0, f32::MAX, 1.0e-40];
        let payload = floats_payload(QUATERNION, &odd);
        let m = decode_frame(&frame(&payload))
            .unwrap()
            .into_measurement()
            .unwrap();
        let q = m.quaternion.unwrap();
        let q = q.value();
        let got = [q.w, q.x, q.y, q.z];
        for (a, b) in got.iter().zip(odd.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn quaternion_then_euler_order() {
        let values = [1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0];
        let payload = floats_payload(QUATERNION | EULER, &values);
        let m = decode_frame(&frame(&payload))
            .unwrap()
            .into_measurement()
            .unwrap();

        assert_eq!(
            *m.quaternion.unwrap().value(),
            Quaternion {
                w: 1.0,
                x: 2.0,
                y: 3.0,
                z: 4.0
            }
        );
        assert_eq!(
            m.euler.unwrap(),
            Vector3 {
                x: 10.0,
                y: 20.0,
                z: 30.0
            }
        );

        // Euler bytes first, quaternion bytes second: same status, wrong values.
        let swapped = floats_payload(QUATERNION | EULER, &[10.0, 20.0, 30.0, 1.0, 2.0, 3.0, 4.0]);
        let wrong = decode_frame(&frame(&swapped))
            .unwrap()
            .into_measurement()
            .unwrap();
        assert_ne!(wrong.quaternion, m.quaternion);
        assert_ne!(wrong.euler, m.euler);
    }

    #[test]
    fn all_float_groups() {
        let values: Vec<f32> = (0..16).map(|i| i as f32 * 0.5).collect();
        let payload = floats_payload(
            QUATERNION | EULER | YAWPITCHROLL | REALACCEL | WORLDACCEL,
            &values,
        );
        let m = decode_frame(&frame(&payload))
            .unwrap()
            .into_measurement()
            .unwrap();

        assert_eq!(m.quaternion.unwrap().value().z, 1.5);
        assert_eq!(m.euler.unwrap().x, 2.0);
        assert_eq!(
            m.yaw_pitch_roll.unwrap(),
            YawPitchRoll {
                yaw: 3.5,
                pitch: 4.0,
                roll: 4.5
            }
        );
        assert_eq!(m.real_accel.unwrap().z, 6.0);
        assert_eq!(m.world_accel.unwrap().z, 7.5);
    }

    #[test]
    fn buffer_quaternion_fixed_point() {
        let mut payload = BytesMut::new();
        payload.put_u8(BUFFER);
        payload.put_u16(0x4000); // 1.0
        payload.put_u16(0xC000); // -1.0
        payload.put_u16(0x2000); // 0.5
        payload.put_u16(0x8000); // -2.0

        let m = decode_frame(&frame(&payload))
            .unwrap()
            .into_measurement()
            .unwrap();
        assert_eq!(
            m.quaternion,
            Some(QuaternionField::FixedPoint(Quaternion {
                w: 1.0,
                x: -1.0,
                y: 0.5,
                z: -2.0,
            }))
        );
    }

    #[test]
    fn buffer_after_float_groups() {
        let mut payload = floats_payload(EULER | BUFFER, &[1.0, 2.0, 3.0]);
        payload.extend_from_slice(&[0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let m = decode_frame(&frame(&payload))
            .unwrap()
            .into_measurement()
            .unwrap();
        assert_eq!(m.euler.unwrap().z, 3.0);
        assert_eq!(m.quaternion.unwrap().value().w, 1.0);
    }

    #[test]
    fn conflicting_quaternion_keeps_both() {
        let mut payload = floats_payload(QUATERNION | BUFFER, &[0.1, 0.2, 0.3, 0.4]);
        payload.extend_from_slice(&[0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let m = decode_frame(&frame(&payload))
            .unwrap()
            .into_measurement()
            .unwrap();
        let field = m.quaternion.unwrap();
        assert!(field.is_conflicting());
        assert_eq!(field.value().w, 1.0);
        match field {
            QuaternionField::Conflicting { float, .. } => assert_eq!(float.w, 0.1),
            other => panic!("expected conflicting, got {other:?}"),
        }
    }

    #[test]
    fn conflicting_quaternion_rejected_when_configured() {
        let mut payload = floats_payload(QUATERNION | BUFFER, &[0.1, 0.2, 0.3, 0.4]);
        payload.extend_from_slice(&[0u8; 8]);
        let config = DecoderConfig {
            reject_conflicting_quaternion: true,
            ..DecoderConfig::default()
        };

        let err = decode_frame_with(&frame(&payload), &config).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ConflictingQuaternion { status: 0x21 }
        ));
        assert!(err.is_integrity());
    }

    #[test]
    fn init_notice() {
        let decoded = decode_frame(&frame(&[0x02, 0x07])).unwrap();
        let notice = decoded.as_init().unwrap();
        assert_eq!(notice.stage, InitStage::DmpInit);
        assert_eq!(notice.code, 7);
        assert_eq!(notice.to_string(), "DMP init: 7");
        assert!(decoded.as_measurement().is_none());
    }

    #[test]
    fn two_byte_payload_with_high_status_is_measurement() {
        // Status 5 = QUATERNION | YAWPITCHROLL, which cannot fit in one byte.
        let err = decode_frame(&frame(&[0x05, 0x00])).unwrap_err();
        assert!(matches!(
            err,
            FrameError::TruncatedField {
                group: FieldGroup::Quaternion,
                needed: 16,
                available: 1,
            }
        ));
    }

    #[test]
    fn status_without_groups_is_empty_measurement() {
        let m = decode_frame(&frame(&[0x40]))
            .unwrap()
            .into_measurement()
            .unwrap();
        assert_eq!(m.status.bits(), 0x40);
        assert!(m.quaternion.is_none());
    }

    #[test]
    fn truncated_by_one_byte_names_group() {
        let cases = [
            (FieldGroup::Quaternion, QUATERNION),
            (FieldGroup::Euler, EULER),
            (FieldGroup::YawPitchRoll, YAWPITCHROLL),
            (FieldGroup::RealAccel, REALACCEL),
            (FieldGroup::WorldAccel, WORLDACCEL),
            (FieldGroup::Buffer, BUFFER),
        ];
        for (group, bit) in cases {
            let mut payload = vec![bit];
            payload.extend(std::iter::repeat(0x11).take(group.byte_len() - 1));

            let err = decode_frame(&frame(&payload)).unwrap_err();
            match err {
                FrameError::TruncatedField {
                    group: g,
                    needed,
                    available,
                } => {
                    assert_eq!(g, group);
                    assert_eq!(needed, group.byte_len());
                    assert_eq!(available, group.byte_len() - 1);
                }
                other => panic!("expected truncation for {group}, got {other:?}"),
            }
        }
    }

    #[test]
    fn truncation_in_later_group_discards_earlier_groups() {
        let mut payload = floats_payload(QUATERNION | EULER, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        payload.truncate(payload.len() - 1);

        let err = decode_frame(&frame(&payload)).unwrap_err();
        assert!(matches!(
            err,
            FrameError::TruncatedField {
                group: FieldGroup::Euler,
                ..
            }
        ));
    }

    #[test]
    fn corrupted_crc_bit() {
        let payload = floats_payload(QUATERNION, &[1.0, 0.0, 0.0, 0.0]);
        let valid = frame(&payload);
        let crc_at = valid.len() - 2;

        for byte in crc_at..valid.len() {
            for bit in 0..8 {
                let mut corrupted = valid.clone();
                corrupted[byte] ^= 1 << bit;
                let err = decode_frame(&corrupted).unwrap_err();
                assert!(matches!(err, FrameError::ChecksumMismatch { .. }));
            }
        }
    }

    #[test]
    fn corrupted_payload_fails_crc() {
        let mut bad = frame(&[0x02, 0x07]);
        bad[3] = 0x08;
        let err = decode_frame(&bad).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ChecksumMismatch {
                received: 0x0F47,
                ..
            }
        ));
    }

    #[test]
    fn malformed_candidates() {
        assert!(matches!(
            decode_frame(&[]),
            Err(FrameError::MalformedFrame { len: 0 })
        ));
        assert!(matches!(
            decode_frame(b"x\x01\x00\x00\x00"),
            Err(FrameError::MalformedFrame { .. })
        ));
        // Zero-length payload has no status byte.
        assert!(matches!(
            decode_frame(&frame(&[])),
            Err(FrameError::MalformedFrame { len: 4 })
        ));
        // Length claims more than is present.
        assert!(matches!(
            decode_frame(&[b':', 9, 1, 2, 3]),
            Err(FrameError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn cursor_does_not_advance_on_failure() {
        let bytes = [0u8; 10];
        let mut cursor = PayloadCursor::new(&bytes);
        assert!(cursor.take_group(FieldGroup::Euler).is_err());
        assert_eq!(cursor.remaining(), 10);
        assert_eq!(cursor.take_group(FieldGroup::Buffer).unwrap().len(), 8);
        assert_eq!(cursor.remaining(), 2);
    }
}
