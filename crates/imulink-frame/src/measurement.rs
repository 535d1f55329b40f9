//! Decoded values delivered downstream.

use std::fmt;

use bytes::{BufMut, BytesMut};
use serde::Serialize;

use crate::codec::{f32_to_fixed_point, round_half_up};
use crate::status::{FieldGroup, StatusMask};

/// Orientation quaternion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Three-axis reading (Euler angles, real or world acceleration).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Yaw, pitch and roll angles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct YawPitchRoll {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// The quaternion of a measurement, tagged with the encoding it arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "encoding", rename_all = "snake_case")]
pub enum QuaternionField {
    /// QUATERNION bit: four little-endian `f32`.
    Float(Quaternion),
    /// BUFFER bit: four big-endian 2.14 fixed-point values.
    FixedPoint(Quaternion),
    /// Both bits set; both readings are kept.
    Conflicting {
        float: Quaternion,
        fixed_point: Quaternion,
    },
}

impl QuaternionField {
    /// The effective quaternion.
    ///
    /// When both encodings are present the fixed-point reading wins, since it
    /// is decoded last.
    pub fn value(&self) -> &Quaternion {
        match self {
            QuaternionField::Float(q) | QuaternionField::FixedPoint(q) => q,
            QuaternionField::Conflicting { fixed_point, .. } => fixed_point,
        }
    }

    /// Returns true if both encodings were present.
    pub fn is_conflicting(&self) -> bool {
        matches!(self, QuaternionField::Conflicting { .. })
    }

    pub(crate) fn with_float(current: Option<Self>, q: Quaternion) -> Self {
        match current {
            Some(QuaternionField::FixedPoint(fixed_point)) => QuaternionField::Conflicting {
                float: q,
                fixed_point,
            },
            _ => QuaternionField::Float(q),
        }
    }

    pub(crate) fn with_fixed_point(current: Option<Self>, q: Quaternion) -> Self {
        match current {
            Some(QuaternionField::Float(float)) => QuaternionField::Conflicting {
                float,
                fixed_point: q,
            },
            _ => QuaternionField::FixedPoint(q),
        }
    }

    fn float(&self) -> Option<&Quaternion> {
        match self {
            QuaternionField::Float(q) => Some(q),
            QuaternionField::Conflicting { float, .. } => Some(float),
            QuaternionField::FixedPoint(_) => None,
        }
    }

    fn fixed_point(&self) -> Option<&Quaternion> {
        match self {
            QuaternionField::FixedPoint(q) => Some(q),
            QuaternionField::Conflicting { fixed_point, .. } => Some(fixed_point),
            QuaternionField::Float(_) => None,
        }
    }
}

/// One validated sensor sample.
///
/// Only the groups announced by `status` are populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Measurement {
    pub status: StatusMask,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quaternion: Option<QuaternionField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub euler: Option<Vector3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaw_pitch_roll: Option<YawPitchRoll>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_accel: Option<Vector3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_accel: Option<Vector3>,
}

impl Measurement {
    /// Write the payload (status byte, then groups in bit order).
    ///
    /// Groups announced by `status` but missing from the record are written
    /// as zeros, so the payload always matches its status byte.
    pub fn encode_payload(&self, dst: &mut BytesMut) {
        dst.reserve(1 + self.status.payload_len());
        dst.put_u8(self.status.bits());

        let float = self.quaternion.as_ref().and_then(QuaternionField::float);
        let fixed = self
            .quaternion
            .as_ref()
            .and_then(QuaternionField::fixed_point);

        for group in self.status.groups() {
            match group {
                FieldGroup::Quaternion => {
                    let q = float.copied().unwrap_or_default();
                    for v in [q.w, q.x, q.y, q.z] {
                        dst.put_f32_le(v);
                    }
                }
                FieldGroup::Euler => put_vector(dst, self.euler),
                FieldGroup::YawPitchRoll => {
                    let ypr = self.yaw_pitch_roll.unwrap_or_default();
                    for v in [ypr.yaw, ypr.pitch, ypr.roll] {
                        dst.put_f32_le(v);
                    }
                }
                FieldGroup::RealAccel => put_vector(dst, self.real_accel),
                FieldGroup::WorldAccel => put_vector(dst, self.world_accel),
                FieldGroup::Buffer => {
                    let q = fixed.copied().unwrap_or_default();
                    for v in [q.w, q.x, q.y, q.z] {
                        dst.put_u16(f32_to_fixed_point(v));
                    }
                }
            }
        }
    }
}

fn put_vector(dst: &mut BytesMut, v: Option<Vector3>) {
    let v = v.unwrap_or_default();
    dst.put_f32_le(v.x);
    dst.put_f32_le(v.y);
    dst.put_f32_le(v.z);
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.quaternion {
            let q = field.value();
            writeln!(
                f,
                "quaternion:\tw:{:.6}\tx:{:.6}\ty:{:.6}\tz:{:.6}",
                round_half_up(q.w, 3),
                round_half_up(q.x, 3),
                round_half_up(q.y, 3),
                round_half_up(q.z, 3)
            )?;
        }
        if let Some(v) = &self.euler {
            writeln!(f, "euler:\tx:{:.6}\ty:{:.6}\tz:{:.6}", v.x, v.y, v.z)?;
        }
        if let Some(v) = &self.yaw_pitch_roll {
            writeln!(
                f,
                "yaw/pitch/roll:\tyaw:{:.6}\tpitch:{:.6}\troll:{:.6}",
                v.yaw, v.pitch, v.roll
            )?;
        }
        if let Some(v) = &self.real_accel {
            writeln!(f, "real:\tx:{:.6}\ty:{:.6}\tz:{:.6}", v.x, v.y, v.z)?;
        }
        if let Some(v) = &self.world_accel {
            writeln!(f, "world:\tx:{:.6}\ty:{:.6}\tz:{:.6}", v.x, v.y, v.z)?;
        }
        Ok(())
    }
}

/// Firmware start-up stages reported through init notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStage {
    MpuInit,
    MpuConnection,
    DmpInit,
    DmpInterruptStatus,
    FifoOverflow,
}

impl InitStage {
    /// Stages indexed by their status byte.
    pub const ALL: [InitStage; 5] = [
        InitStage::MpuInit,
        InitStage::MpuConnection,
        InitStage::DmpInit,
        InitStage::DmpInterruptStatus,
        InitStage::FifoOverflow,
    ];

    /// Look up the stage for a status byte below 5.
    pub fn from_status(status: u8) -> Option<Self> {
        Self::ALL.get(usize::from(status)).copied()
    }

    /// The status byte announcing this stage.
    pub fn status(self) -> u8 {
        self as u8
    }

    pub fn message(self) -> &'static str {
        match self {
            InitStage::MpuInit => "MPU init",
            InitStage::MpuConnection => "MPU connection",
            InitStage::DmpInit => "DMP init",
            InitStage::DmpInterruptStatus => "DMP interrupt status",
            InitStage::FifoOverflow => "FIFO overflow!",
        }
    }
}

/// A two-byte status notice sent while the sensor starts up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InitNotice {
    pub stage: InitStage,
    /// Auxiliary code reported with the stage.
    pub code: u8,
}

impl InitNotice {
    pub fn new(stage: InitStage, code: u8) -> Self {
        Self { stage, code }
    }

    /// Write the two-byte payload.
    pub fn encode_payload(&self, dst: &mut BytesMut) {
        dst.put_u8(self.stage.status());
        dst.put_u8(self.code);
    }
}

impl fmt::Display for InitNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage.message(), self.code)
    }
}

/// Everything a valid frame can decode to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decoded {
    Measurement(Measurement),
    Init(InitNotice),
}

impl Decoded {
    pub fn as_measurement(&self) -> Option<&Measurement> {
        match self {
            Decoded::Measurement(m) => Some(m),
            Decoded::Init(_) => None,
        }
    }

    pub fn into_measurement(self) -> Option<Measurement> {
        match self {
            Decoded::Measurement(m) => Some(m),
            Decoded::Init(_) => None,
        }
    }

    pub fn as_init(&self) -> Option<&InitNotice> {
        match self {
            Decoded::Init(notice) => Some(notice),
            Decoded::Measurement(_) => None,
        }
    }
}

impl From<Measurement> for Decoded {
    fn from(m: Measurement) -> Self {
        Decoded::Measurement(m)
    }
}

impl From<InitNotice> for Decoded {
    fn from(notice: InitNotice) -> Self {
        Decoded::Init(notice)
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decoded::Measurement(m) => m.fmt(f),
            Decoded::Init(notice) => writeln!(f, "{notice}"),
        }
    }
}
