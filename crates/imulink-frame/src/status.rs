//! Status mask and field groups.
//!
//! The first payload byte selects which field groups follow. Groups are laid
//! out back to back in ascending bit order, so the order below is part of the
//! wire format.

use std::fmt;

use serde::Serialize;

/// Quaternion as four little-endian `f32` (w, x, y, z).
pub const QUATERNION: u8 = 1;

/// Euler angles as three little-endian `f32`.
pub const EULER: u8 = 1 << 1;

/// Yaw, pitch, roll as three little-endian `f32`.
pub const YAWPITCHROLL: u8 = 1 << 2;

/// Gravity-compensated acceleration as three little-endian `f32`.
pub const REALACCEL: u8 = 1 << 3;

/// World-frame acceleration as three little-endian `f32`.
pub const WORLDACCEL: u8 = 1 << 4;

/// Quaternion as four big-endian 2.14 fixed-point values.
pub const BUFFER: u8 = 1 << 5;

/// A field group selected by one status bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    Quaternion,
    Euler,
    YawPitchRoll,
    RealAccel,
    WorldAccel,
    Buffer,
}

impl FieldGroup {
    /// All groups in decode order.
    pub const ALL: [FieldGroup; 6] = [
        FieldGroup::Quaternion,
        FieldGroup::Euler,
        FieldGroup::YawPitchRoll,
        FieldGroup::RealAccel,
        FieldGroup::WorldAccel,
        FieldGroup::Buffer,
    ];

    /// The status bit announcing this group.
    pub const fn bit(self) -> u8 {
        match self {
            FieldGroup::Quaternion => QUATERNION,
            FieldGroup::Euler => EULER,
            FieldGroup::YawPitchRoll => YAWPITCHROLL,
            FieldGroup::RealAccel => REALACCEL,
            FieldGroup::WorldAccel => WORLDACCEL,
            FieldGroup::Buffer => BUFFER,
        }
    }

    /// Bytes this group occupies in the payload.
    pub const fn byte_len(self) -> usize {
        match self {
            FieldGroup::Quaternion => 16,
            FieldGroup::Euler
            | FieldGroup::YawPitchRoll
            | FieldGroup::RealAccel
            | FieldGroup::WorldAccel => 12,
            FieldGroup::Buffer => 8,
        }
    }

    /// Human-readable name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            FieldGroup::Quaternion => "Quaternion",
            FieldGroup::Euler => "Euler",
            FieldGroup::YawPitchRoll => "YawPitchRoll",
            FieldGroup::RealAccel => "RealAccel",
            FieldGroup::WorldAccel => "WorldAccel",
            FieldGroup::Buffer => "Buffer",
        }
    }
}

impl fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The status byte of a measurement payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StatusMask(u8);

impl StatusMask {
    /// Wrap a raw status byte. Unknown high bits are kept but ignored.
    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    /// The raw status byte.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if `group` is announced.
    pub const fn contains(self, group: FieldGroup) -> bool {
        self.0 & group.bit() != 0
    }

    /// Add `group` to the mask.
    pub fn insert(&mut self, group: FieldGroup) {
        self.0 |= group.bit();
    }

    /// Announced groups in decode order.
    pub fn groups(self) -> impl Iterator<Item = FieldGroup> {
        FieldGroup::ALL
            .into_iter()
            .filter(move |group| self.contains(*group))
    }

    /// Total payload bytes the announced groups need after the status byte.
    pub fn payload_len(self) -> usize {
        self.groups().map(FieldGroup::byte_len).sum()
    }

    /// Both quaternion encodings are announced.
    pub const fn has_conflicting_quaternion(self) -> bool {
        self.contains(FieldGroup::Quaternion) && self.contains(FieldGroup::Buffer)
    }
}

impl From<u8> for StatusMask {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl FromIterator<FieldGroup> for StatusMask {
    fn from_iter<I: IntoIterator<Item = FieldGroup>>(iter: I) -> Self {
        let mut mask = StatusMask::default();
        for group in iter {
            mask.insert(group);
        }
        mask
    }
}

impl fmt::Display for StatusMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for group in self.groups() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(group.name())?;
            first = false;
        }
        if first {
            write!(f, "{:#04x}", self.0)?;
        }
        Ok(())
    }
}
