use serde::Serialize;
use vnlink_frame::fields::{attitude, common, group, imu, ins, time};
use vnlink_frame::BinaryHeader;

/// Slots in [`EnabledMeasurements`]: one per group bit above Common.
pub const NUM_GROUPS: usize = 19;

/// Which measurement fields are present or wanted, independent of framing.
///
/// Slot `g - 1` holds the field bitmap of group bit `g`. The Common group
/// has no slot; its fields are folded into the groups they belong to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct EnabledMeasurements([u32; NUM_GROUPS]);

impl EnabledMeasurements {
    pub const fn new() -> Self {
        Self([0; NUM_GROUPS])
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|bits| *bits == 0)
    }

    fn slot(group: u8) -> Option<usize> {
        let idx = usize::from(group).checked_sub(1)?;
        (idx < NUM_GROUPS).then_some(idx)
    }

    /// Mark `(group, field)` present. Common fields expand to their targets.
    pub fn set(&mut self, group: u8, field: u8) {
        if group == group::COMMON {
            for &(g, f) in common_targets(field) {
                self.set(g, f);
            }
            return;
        }
        if let Some(idx) = Self::slot(group) {
            if field < 32 {
                self.0[idx] |= 1 << field;
            }
        }
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, group: u8, field: u8) -> Self {
        self.set(group, field);
        self
    }

    pub fn contains(&self, group: u8, field: u8) -> bool {
        Self::slot(group).is_some_and(|idx| field < 32 && self.0[idx] & (1 << field) != 0)
    }

    /// Field bitmap of one group; zero for Common and unknown groups.
    pub fn group(&self, group: u8) -> u32 {
        Self::slot(group).map_or(0, |idx| self.0[idx])
    }

    pub fn set_group(&mut self, group: u8, bits: u32) {
        if let Some(idx) = Self::slot(group) {
            self.0[idx] = bits;
        }
    }

    pub fn as_array(&self) -> &[u32; NUM_GROUPS] {
        &self.0
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut out = *self;
        for (a, b) in out.0.iter_mut().zip(other.0.iter()) {
            *a |= b;
        }
        out
    }

    pub fn intersection(&self, other: &Self) -> Self {
        let mut out = *self;
        for (a, b) in out.0.iter_mut().zip(other.0.iter()) {
            *a &= b;
        }
        out
    }

    /// True if any field is enabled in both.
    pub fn overlaps(&self, other: &Self) -> bool {
        !self.intersection(other).is_empty()
    }

    /// True if every field enabled in `other` is enabled here.
    pub fn contains_all(&self, other: &Self) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a & b == *b)
    }

    /// Every `(group, field)` pair that is set, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.0.iter().enumerate().flat_map(|(idx, bits)| {
            let bits = *bits;
            (0..32u8)
                .filter(move |f| bits & (1 << f) != 0)
                .map(move |f| (idx as u8 + 1, f))
        })
    }

    pub fn count(&self) -> u32 {
        self.0.iter().map(|b| b.count_ones()).sum()
    }

    /// Measurements carried by a binary header.
    pub fn from_binary_header(header: &BinaryHeader) -> Self {
        let mut out = Self::new();
        for (g, f) in header.fields() {
            out.set(g, f);
        }
        out
    }
}

impl FromIterator<(u8, u8)> for EnabledMeasurements {
    fn from_iter<I: IntoIterator<Item = (u8, u8)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (g, f) in iter {
            out.set(g, f);
        }
        out
    }
}

/// Where each Common-group field lands once decoded.
pub fn common_targets(field: u8) -> &'static [(u8, u8)] {
    match field {
        common::TIME_STARTUP => &[(group::TIME, time::TIME_STARTUP)],
        common::TIME_GPS => &[(group::TIME, time::TIME_GPS)],
        common::TIME_SYNC_IN => &[(group::TIME, time::TIME_SYNC_IN)],
        common::YPR => &[(group::ATTITUDE, attitude::YPR)],
        common::QUATERNION => &[(group::ATTITUDE, attitude::QUATERNION)],
        common::ANGULAR_RATE => &[(group::IMU, imu::ANGULAR_RATE)],
        common::POS_LLA => &[(group::INS, ins::POS_LLA)],
        common::VEL_NED => &[(group::INS, ins::VEL_NED)],
        common::ACCEL => &[(group::IMU, imu::ACCEL)],
        common::IMU => &[
            (group::IMU, imu::UNCOMP_ACCEL),
            (group::IMU, imu::UNCOMP_GYRO),
        ],
        common::MAG_PRES => &[
            (group::IMU, imu::MAG),
            (group::IMU, imu::TEMPERATURE),
            (group::IMU, imu::PRESSURE),
        ],
        common::DELTA_THETA => &[
            (group::IMU, imu::DELTA_THETA),
            (group::IMU, imu::DELTA_VEL),
        ],
        common::INS_STATUS => &[(group::INS, ins::INS_STATUS)],
        common::SYNC_IN_CNT => &[(group::TIME, time::SYNC_IN_CNT)],
        common::TIME_GPS_PPS => &[(group::TIME, time::TIME_GPS_PPS)],
        _ => &[],
    }
}
