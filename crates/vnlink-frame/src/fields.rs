//! Binary output groups, their field bits, and each field's wire size.
//!
//! Group bits are combined across the chained group bytes (7 usable bits per
//! byte). Field bits are combined across a group's chained type words (15
//! usable bits per word).

/// Group bit indices.
pub mod group {
    pub const COMMON: u8 = 0;
    pub const TIME: u8 = 1;
    pub const IMU: u8 = 2;
    pub const GNSS: u8 = 3;
    pub const ATTITUDE: u8 = 4;
    pub const INS: u8 = 5;
    pub const GNSS2: u8 = 6;
    pub const GNSS3: u8 = 19;
}

pub mod common {
    pub const TIME_STARTUP: u8 = 0;
    pub const TIME_GPS: u8 = 1;
    pub const TIME_SYNC_IN: u8 = 2;
    pub const YPR: u8 = 3;
    pub const QUATERNION: u8 = 4;
    pub const ANGULAR_RATE: u8 = 5;
    pub const POS_LLA: u8 = 6;
    pub const VEL_NED: u8 = 7;
    pub const ACCEL: u8 = 8;
    pub const IMU: u8 = 9;
    pub const MAG_PRES: u8 = 10;
    pub const DELTA_THETA: u8 = 11;
    pub const INS_STATUS: u8 = 12;
    pub const SYNC_IN_CNT: u8 = 13;
    pub const TIME_GPS_PPS: u8 = 14;
}

pub mod time {
    pub const TIME_STARTUP: u8 = 0;
    pub const TIME_GPS: u8 = 1;
    pub const GPS_TOW: u8 = 2;
    pub const GPS_WEEK: u8 = 3;
    pub const TIME_SYNC_IN: u8 = 4;
    pub const TIME_GPS_PPS: u8 = 5;
    pub const TIME_UTC: u8 = 6;
    pub const SYNC_IN_CNT: u8 = 7;
    pub const SYNC_OUT_CNT: u8 = 8;
    pub const TIME_STATUS: u8 = 9;
}

pub mod imu {
    pub const IMU_STATUS: u8 = 0;
    pub const UNCOMP_MAG: u8 = 1;
    pub const UNCOMP_ACCEL: u8 = 2;
    pub const UNCOMP_GYRO: u8 = 3;
    pub const TEMPERATURE: u8 = 4;
    pub const PRESSURE: u8 = 5;
    pub const DELTA_THETA: u8 = 6;
    pub const DELTA_VEL: u8 = 7;
    pub const MAG: u8 = 8;
    pub const ACCEL: u8 = 9;
    pub const ANGULAR_RATE: u8 = 10;
    pub const SENS_SAT: u8 = 11;
}

/// Field bits shared by the GNSS, GNSS2 and GNSS3 groups.
pub mod gnss {
    pub const TIME_UTC: u8 = 0;
    pub const TOW: u8 = 1;
    pub const WEEK: u8 = 2;
    pub const NUM_SATS: u8 = 3;
    pub const FIX: u8 = 4;
    pub const POS_LLA: u8 = 5;
    pub const POS_ECEF: u8 = 6;
    pub const VEL_NED: u8 = 7;
    pub const VEL_ECEF: u8 = 8;
    pub const POS_U: u8 = 9;
    pub const VEL_U: u8 = 10;
    pub const TIME_U: u8 = 11;
    pub const TIME_INFO: u8 = 12;
    pub const DOP: u8 = 13;
    pub const SAT_INFO: u8 = 14;
    pub const RAW_MEAS: u8 = 15;
    pub const STATUS: u8 = 16;
    pub const ALT_MSL: u8 = 17;
}

pub mod attitude {
    pub const VPE_STATUS: u8 = 0;
    pub const YPR: u8 = 1;
    pub const QUATERNION: u8 = 2;
    pub const DCM: u8 = 3;
    pub const MAG_NED: u8 = 4;
    pub const ACCEL_NED: u8 = 5;
    pub const LIN_ACCEL_BODY: u8 = 6;
    pub const LIN_ACCEL_NED: u8 = 7;
    pub const YPR_U: u8 = 8;
    pub const HEAVE: u8 = 12;
    pub const ATT_U: u8 = 13;
}

pub mod ins {
    pub const INS_STATUS: u8 = 0;
    pub const POS_LLA: u8 = 1;
    pub const POS_ECEF: u8 = 2;
    pub const VEL_BODY: u8 = 3;
    pub const VEL_NED: u8 = 4;
    pub const VEL_ECEF: u8 = 5;
    pub const MAG_ECEF: u8 = 6;
    pub const ACCEL_ECEF: u8 = 7;
    pub const LIN_ACCEL_ECEF: u8 = 8;
    pub const POS_U: u8 = 9;
    pub const VEL_U: u8 = 10;
}

/// Bytes before the count byte of a satellite-info field.
pub const SAT_INFO_COUNT_OFFSET: usize = 0;
/// Bytes before the count byte of a raw-measurement field.
pub const RAW_MEAS_COUNT_OFFSET: usize = 10;

/// Wire size of a binary field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSize {
    Fixed(usize),
    /// `2 + 8 * N` with N read from the first payload byte of the field.
    SatInfo,
    /// `12 + 28 * N` with N read at byte 10 of the field.
    RawMeas,
}

impl FieldSize {
    /// Offset of the count byte within the field, for dynamic sizes.
    pub fn count_offset(&self) -> Option<usize> {
        match self {
            FieldSize::Fixed(_) => None,
            FieldSize::SatInfo => Some(SAT_INFO_COUNT_OFFSET),
            FieldSize::RawMeas => Some(RAW_MEAS_COUNT_OFFSET),
        }
    }

    /// Field size given the count byte (ignored for fixed sizes).
    pub fn resolve(&self, count: usize) -> usize {
        match self {
            FieldSize::Fixed(n) => *n,
            FieldSize::SatInfo => 2 + 8 * count,
            FieldSize::RawMeas => 12 + 28 * count,
        }
    }
}

pub fn is_gnss_group(g: u8) -> bool {
    matches!(g, group::GNSS | group::GNSS2 | group::GNSS3)
}

/// Wire size of field `field` in group `g`, or `None` if the field is unknown.
pub fn field_size(g: u8, field: u8) -> Option<FieldSize> {
    use FieldSize::Fixed;

    let size = match g {
        group::COMMON => match field {
            0..=2 => Fixed(8),
            3 => Fixed(12),
            4 => Fixed(16),
            5 => Fixed(12),
            6 => Fixed(24),
            7 | 8 => Fixed(12),
            9 => Fixed(24),
            10 => Fixed(20),
            11 => Fixed(28),
            12 => Fixed(2),
            13 => Fixed(4),
            14 => Fixed(8),
            _ => return None,
        },
        group::TIME => match field {
            0..=2 => Fixed(8),
            3 => Fixed(2),
            4..=6 => Fixed(8),
            7 | 8 => Fixed(4),
            9 => Fixed(1),
            _ => return None,
        },
        group::IMU => match field {
            0 => Fixed(2),
            1..=3 => Fixed(12),
            4 | 5 => Fixed(4),
            6 => Fixed(16),
            7..=10 => Fixed(12),
            11 => Fixed(2),
            _ => return None,
        },
        g if is_gnss_group(g) => match field {
            0 | 1 => Fixed(8),
            2 => Fixed(2),
            3 | 4 => Fixed(1),
            5 | 6 => Fixed(24),
            7..=9 => Fixed(12),
            10 | 11 => Fixed(4),
            12 => Fixed(2),
            13 => Fixed(28),
            14 => FieldSize::SatInfo,
            15 => FieldSize::RawMeas,
            16 => Fixed(2),
            17 => Fixed(8),
            _ => return None,
        },
        group::ATTITUDE => match field {
            0 => Fixed(2),
            1 => Fixed(12),
            2 => Fixed(16),
            3 => Fixed(36),
            4..=8 => Fixed(12),
            12 => Fixed(12),
            13 => Fixed(4),
            _ => return None,
        },
        group::INS => match field {
            0 => Fixed(2),
            1 | 2 => Fixed(24),
            3..=8 => Fixed(12),
            9 | 10 => Fixed(4),
            _ => return None,
        },
        _ => return None,
    };
    Some(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_sizes() {
        assert_eq!(field_size(group::COMMON, common::YPR), Some(FieldSize::Fixed(12)));
        assert_eq!(field_size(group::ATTITUDE, attitude::DCM), Some(FieldSize::Fixed(36)));
        assert_eq!(field_size(group::GNSS3, gnss::POS_LLA), Some(FieldSize::Fixed(24)));
        assert_eq!(field_size(group::GNSS2, gnss::SAT_INFO), Some(FieldSize::SatInfo));
        assert_eq!(field_size(group::TIME, time::TIME_STATUS), Some(FieldSize::Fixed(1)));
    }

    #[test]
    fn unknown_fields_are_unsized() {
        assert_eq!(field_size(group::ATTITUDE, 9), None);
        assert_eq!(field_size(group::INS, 11), None);
        assert_eq!(field_size(7, 0), None);
    }

    #[test]
    fn dynamic_sizes_resolve_from_count() {
        assert_eq!(FieldSize::SatInfo.resolve(3), 26);
        assert_eq!(FieldSize::RawMeas.resolve(2), 68);
        assert_eq!(FieldSize::RawMeas.count_offset(), Some(10));
        assert_eq!(FieldSize::Fixed(4).count_offset(), None);
    }
}
