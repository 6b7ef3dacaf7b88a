use heapless::Vec;
use serde::Serialize;
use vnlink_frame::fields::{attitude, gnss, group, imu, ins, time};

use crate::enabled::EnabledMeasurements;

/// Satellite or raw-measurement entries kept per GNSS field.
pub const MAX_GNSS_ENTRIES: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Ypr {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

pub type Vec3f = [f32; 3];
pub type Vec3d = [f64; 3];
pub type Quaternion = [f32; 4];
pub type Dcm = [f32; 9];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DeltaTheta {
    /// Integration interval in seconds.
    pub delta_time: f32,
    pub delta_theta: Vec3f,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeUtc {
    /// Years since 2000.
    pub year: i8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeInfo {
    pub status: u8,
    pub leap_seconds: i8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Dop {
    pub g_dop: f32,
    pub p_dop: f32,
    pub t_dop: f32,
    pub v_dop: f32,
    pub h_dop: f32,
    pub n_dop: f32,
    pub e_dop: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SatInfoEntry {
    pub sys: i8,
    pub sv_id: u8,
    pub flags: u8,
    pub cno: u8,
    pub qi: u8,
    pub elevation: i8,
    pub azimuth: i16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SatInfo {
    pub num_sats: u8,
    pub sats: Vec<SatInfoEntry, MAX_GNSS_ENTRIES>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RawMeasEntry {
    pub sys: u8,
    pub sv_id: u8,
    pub band: u8,
    pub channel: u8,
    pub freq_num: i8,
    pub cno: u8,
    pub flags: u16,
    pub pseudorange: f64,
    pub carrier: f64,
    pub doppler: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawMeas {
    pub tow: f64,
    pub week: u16,
    pub num_meas: u8,
    pub meas: Vec<RawMeasEntry, MAX_GNSS_ENTRIES>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Heave {
    pub heave: f32,
    pub heave_rate: f32,
    pub delayed_heave: f32,
}

macro_rules! measurement_group {
    ($(#[$meta:meta])* $name:ident { $($field:ident : $ty:ty = $bit:expr),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize)]
        pub struct $name {
            $(
                #[serde(skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl $name {
            /// Field bitmap of the values present.
            pub fn present(&self) -> u32 {
                let mut bits = 0u32;
                $(
                    if self.$field.is_some() {
                        bits |= 1 << $bit;
                    }
                )*
                bits
            }

            pub fn is_empty(&self) -> bool {
                self.present() == 0
            }
        }
    };
}

measurement_group!(TimeGroup {
    time_startup: u64 = time::TIME_STARTUP,
    time_gps: u64 = time::TIME_GPS,
    gps_tow: u64 = time::GPS_TOW,
    gps_week: u16 = time::GPS_WEEK,
    time_sync_in: u64 = time::TIME_SYNC_IN,
    time_gps_pps: u64 = time::TIME_GPS_PPS,
    time_utc: TimeUtc = time::TIME_UTC,
    sync_in_cnt: u32 = time::SYNC_IN_CNT,
    sync_out_cnt: u32 = time::SYNC_OUT_CNT,
    time_status: u8 = time::TIME_STATUS,
});

measurement_group!(ImuGroup {
    imu_status: u16 = imu::IMU_STATUS,
    uncomp_mag: Vec3f = imu::UNCOMP_MAG,
    uncomp_accel: Vec3f = imu::UNCOMP_ACCEL,
    uncomp_gyro: Vec3f = imu::UNCOMP_GYRO,
    temperature: f32 = imu::TEMPERATURE,
    pressure: f32 = imu::PRESSURE,
    delta_theta: DeltaTheta = imu::DELTA_THETA,
    delta_vel: Vec3f = imu::DELTA_VEL,
    mag: Vec3f = imu::MAG,
    accel: Vec3f = imu::ACCEL,
    angular_rate: Vec3f = imu::ANGULAR_RATE,
    sens_sat: u16 = imu::SENS_SAT,
});

measurement_group!(
    /// One GNSS receiver's outputs; shared by GNSS, GNSS2 and GNSS3.
    GnssGroup {
        time_utc: TimeUtc = gnss::TIME_UTC,
        tow: u64 = gnss::TOW,
        week: u16 = gnss::WEEK,
        num_sats: u8 = gnss::NUM_SATS,
        fix: u8 = gnss::FIX,
        pos_lla: Vec3d = gnss::POS_LLA,
        pos_ecef: Vec3d = gnss::POS_ECEF,
        vel_ned: Vec3f = gnss::VEL_NED,
        vel_ecef: Vec3f = gnss::VEL_ECEF,
        pos_u: Vec3f = gnss::POS_U,
        vel_u: f32 = gnss::VEL_U,
        time_u: f32 = gnss::TIME_U,
        time_info: TimeInfo = gnss::TIME_INFO,
        dop: Dop = gnss::DOP,
        sat_info: SatInfo = gnss::SAT_INFO,
        raw_meas: RawMeas = gnss::RAW_MEAS,
        status: u16 = gnss::STATUS,
        alt_msl: f64 = gnss::ALT_MSL,
    }
);

measurement_group!(AttitudeGroup {
    vpe_status: u16 = attitude::VPE_STATUS,
    ypr: Ypr = attitude::YPR,
    quaternion: Quaternion = attitude::QUATERNION,
    dcm: Dcm = attitude::DCM,
    mag_ned: Vec3f = attitude::MAG_NED,
    accel_ned: Vec3f = attitude::ACCEL_NED,
    lin_accel_body: Vec3f = attitude::LIN_ACCEL_BODY,
    lin_accel_ned: Vec3f = attitude::LIN_ACCEL_NED,
    ypr_u: Vec3f = attitude::YPR_U,
    heave: Heave = attitude::HEAVE,
    att_u: f32 = attitude::ATT_U,
});

measurement_group!(InsGroup {
    ins_status: u16 = ins::INS_STATUS,
    pos_lla: Vec3d = ins::POS_LLA,
    pos_ecef: Vec3d = ins::POS_ECEF,
    vel_body: Vec3f = ins::VEL_BODY,
    vel_ned: Vec3f = ins::VEL_NED,
    vel_ecef: Vec3f = ins::VEL_ECEF,
    mag_ecef: Vec3f = ins::MAG_ECEF,
    accel_ecef: Vec3f = ins::ACCEL_ECEF,
    lin_accel_ecef: Vec3f = ins::LIN_ACCEL_ECEF,
    pos_u: f32 = ins::POS_U,
    vel_u: f32 = ins::VEL_U,
});

/// Every measurement one frame can carry, decoded into native types.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompositeData {
    pub time: TimeGroup,
    pub imu: ImuGroup,
    pub gnss: GnssGroup,
    pub attitude: AttitudeGroup,
    pub ins: InsGroup,
    pub gnss2: GnssGroup,
    pub gnss3: GnssGroup,
}

impl CompositeData {
    pub fn new() -> Self {
        Self::default()
    }

    /// The receiver group addressed by a GNSS group bit.
    pub fn gnss_mut(&mut self, g: u8) -> Option<&mut GnssGroup> {
        match g {
            group::GNSS => Some(&mut self.gnss),
            group::GNSS2 => Some(&mut self.gnss2),
            group::GNSS3 => Some(&mut self.gnss3),
            _ => None,
        }
    }

    pub fn gnss_for(&self, g: u8) -> Option<&GnssGroup> {
        match g {
            group::GNSS => Some(&self.gnss),
            group::GNSS2 => Some(&self.gnss2),
            group::GNSS3 => Some(&self.gnss3),
            _ => None,
        }
    }

    /// Which fields hold a value.
    pub fn present(&self) -> EnabledMeasurements {
        let mut em = EnabledMeasurements::new();
        em.set_group(group::TIME, self.time.present());
        em.set_group(group::IMU, self.imu.present());
        em.set_group(group::GNSS, self.gnss.present());
        em.set_group(group::ATTITUDE, self.attitude.present());
        em.set_group(group::INS, self.ins.present());
        em.set_group(group::GNSS2, self.gnss2.present());
        em.set_group(group::GNSS3, self.gnss3.present());
        em
    }

    pub fn is_empty(&self) -> bool {
        self.present().is_empty()
    }

    /// Reset every field to absent.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
