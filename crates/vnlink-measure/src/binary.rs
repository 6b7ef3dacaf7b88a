use tracing::trace;
use vnlink_frame::fields::{attitude, common, field_size, gnss, group, imu, ins, is_gnss_group, time};
use vnlink_frame::{FaMetadata, RingByteBuffer};

use crate::composite::{
    CompositeData, DeltaTheta, Dop, GnssGroup, Heave, RawMeas, RawMeasEntry, SatInfo,
    SatInfoEntry, TimeInfo, TimeUtc, Ypr, MAX_GNSS_ENTRIES,
};
use crate::error::{ParseError, Result};
use crate::extract::BinaryExtractor;

/// Decode the FA frame whose sync byte is at logical `offset`.
pub fn parse_fa_packet(
    buf: &RingByteBuffer,
    offset: usize,
    meta: &FaMetadata,
) -> Result<CompositeData> {
    let payload_len = meta.payload_length();
    let mut ex = BinaryExtractor::new(buf, offset + meta.payload_offset(), payload_len);
    let mut cd = CompositeData::new();

    for (g, f) in meta.header.fields() {
        if field_size(g, f).is_none() {
            return Err(ParseError::UnsupportedField { group: g, field: f });
        }
        read_field(&mut ex, g, f, &mut cd)?;
    }

    if ex.remaining() != 0 {
        return Err(ParseError::LengthMismatch {
            consumed: payload_len - ex.remaining(),
            length: payload_len,
        });
    }
    trace!(offset, payload_len, "decoded fa frame");
    Ok(cd)
}

fn read_field(ex: &mut BinaryExtractor<'_>, g: u8, f: u8, cd: &mut CompositeData) -> Result<()> {
    match g {
        group::COMMON => read_common(ex, f, cd),
        group::TIME => read_time(ex, f, cd),
        group::IMU => read_imu(ex, f, cd),
        group::ATTITUDE => read_attitude(ex, f, cd),
        group::INS => read_ins(ex, f, cd),
        g if is_gnss_group(g) => match cd.gnss_mut(g) {
            Some(gnss) => read_gnss(ex, g, f, gnss),
            None => Err(ParseError::UnsupportedField { group: g, field: f }),
        },
        _ => Err(ParseError::UnsupportedField { group: g, field: f }),
    }
}

fn read_common(ex: &mut BinaryExtractor<'_>, f: u8, cd: &mut CompositeData) -> Result<()> {
    match f {
        common::TIME_STARTUP => cd.time.time_startup = Some(ex.u64()?),
        common::TIME_GPS => cd.time.time_gps = Some(ex.u64()?),
        common::TIME_SYNC_IN => cd.time.time_sync_in = Some(ex.u64()?),
        common::YPR => cd.attitude.ypr = Some(read_ypr(ex)?),
        common::QUATERNION => cd.attitude.quaternion = Some(ex.f32s()?),
        common::ANGULAR_RATE => cd.imu.angular_rate = Some(ex.vec3f()?),
        common::POS_LLA => cd.ins.pos_lla = Some(ex.vec3d()?),
        common::VEL_NED => cd.ins.vel_ned = Some(ex.vec3f()?),
        common::ACCEL => cd.imu.accel = Some(ex.vec3f()?),
        common::IMU => {
            ex.require(24)?;
            cd.imu.uncomp_accel = Some(ex.vec3f()?);
            cd.imu.uncomp_gyro = Some(ex.vec3f()?);
        }
        common::MAG_PRES => {
            ex.require(20)?;
            cd.imu.mag = Some(ex.vec3f()?);
            cd.imu.temperature = Some(ex.f32()?);
            cd.imu.pressure = Some(ex.f32()?);
        }
        common::DELTA_THETA => {
            ex.require(28)?;
            cd.imu.delta_theta = Some(read_delta_theta(ex)?);
            cd.imu.delta_vel = Some(ex.vec3f()?);
        }
        common::INS_STATUS => cd.ins.ins_status = Some(ex.u16()?),
        common::SYNC_IN_CNT => cd.time.sync_in_cnt = Some(ex.u32()?),
        common::TIME_GPS_PPS => cd.time.time_gps_pps = Some(ex.u64()?),
        _ => return Err(ParseError::UnsupportedField { group: group::COMMON, field: f }),
    }
    Ok(())
}

fn read_time(ex: &mut BinaryExtractor<'_>, f: u8, cd: &mut CompositeData) -> Result<()> {
    let t = &mut cd.time;
    match f {
        time::TIME_STARTUP => t.time_startup = Some(ex.u64()?),
        time::TIME_GPS => t.time_gps = Some(ex.u64()?),
        time::GPS_TOW => t.gps_tow = Some(ex.u64()?),
        time::GPS_WEEK => t.gps_week = Some(ex.u16()?),
        time::TIME_SYNC_IN => t.time_sync_in = Some(ex.u64()?),
        time::TIME_GPS_PPS => t.time_gps_pps = Some(ex.u64()?),
        time::TIME_UTC => t.time_utc = Some(read_time_utc(ex)?),
        time::SYNC_IN_CNT => t.sync_in_cnt = Some(ex.u32()?),
        time::SYNC_OUT_CNT => t.sync_out_cnt = Some(ex.u32()?),
        time::TIME_STATUS => t.time_status = Some(ex.u8()?),
        _ => return Err(ParseError::UnsupportedField { group: group::TIME, field: f }),
    }
    Ok(())
}

fn read_imu(ex: &mut BinaryExtractor<'_>, f: u8, cd: &mut CompositeData) -> Result<()> {
    let m = &mut cd.imu;
    match f {
        imu::IMU_STATUS => m.imu_status = Some(ex.u16()?),
        imu::UNCOMP_MAG => m.uncomp_mag = Some(ex.vec3f()?),
        imu::UNCOMP_ACCEL => m.uncomp_accel = Some(ex.vec3f()?),
        imu::UNCOMP_GYRO => m.uncomp_gyro = Some(ex.vec3f()?),
        imu::TEMPERATURE => m.temperature = Some(ex.f32()?),
        imu::PRESSURE => m.pressure = Some(ex.f32()?),
        imu::DELTA_THETA => m.delta_theta = Some(read_delta_theta(ex)?),
        imu::DELTA_VEL => m.delta_vel = Some(ex.vec3f()?),
        imu::MAG => m.mag = Some(ex.vec3f()?),
        imu::ACCEL => m.accel = Some(ex.vec3f()?),
        imu::ANGULAR_RATE => m.angular_rate = Some(ex.vec3f()?),
        imu::SENS_SAT => m.sens_sat = Some(ex.u16()?),
        _ => return Err(ParseError::UnsupportedField { group: group::IMU, field: f }),
    }
    Ok(())
}

fn read_gnss(ex: &mut BinaryExtractor<'_>, grp: u8, f: u8, g: &mut GnssGroup) -> Result<()> {
    match f {
        gnss::TIME_UTC => g.time_utc = Some(read_time_utc(ex)?),
        gnss::TOW => g.tow = Some(ex.u64()?),
        gnss::WEEK => g.week = Some(ex.u16()?),
        gnss::NUM_SATS => g.num_sats = Some(ex.u8()?),
        gnss::FIX => g.fix = Some(ex.u8()?),
        gnss::POS_LLA => g.pos_lla = Some(ex.vec3d()?),
        gnss::POS_ECEF => g.pos_ecef = Some(ex.vec3d()?),
        gnss::VEL_NED => g.vel_ned = Some(ex.vec3f()?),
        gnss::VEL_ECEF => g.vel_ecef = Some(ex.vec3f()?),
        gnss::POS_U => g.pos_u = Some(ex.vec3f()?),
        gnss::VEL_U => g.vel_u = Some(ex.f32()?),
        gnss::TIME_U => g.time_u = Some(ex.f32()?),
        gnss::TIME_INFO => {
            g.time_info = Some(TimeInfo {
                status: ex.u8()?,
                leap_seconds: ex.i8()?,
            })
        }
        gnss::DOP => {
            let [g_dop, p_dop, t_dop, v_dop, h_dop, n_dop, e_dop] = ex.f32s::<7>()?;
            g.dop = Some(Dop {
                g_dop,
                p_dop,
                t_dop,
                v_dop,
                h_dop,
                n_dop,
                e_dop,
            });
        }
        gnss::SAT_INFO => g.sat_info = Some(read_sat_info(ex)?),
        gnss::RAW_MEAS => g.raw_meas = Some(read_raw_meas(ex)?),
        gnss::STATUS => g.status = Some(ex.u16()?),
        gnss::ALT_MSL => g.alt_msl = Some(ex.f64()?),
        _ => return Err(ParseError::UnsupportedField { group: grp, field: f }),
    }
    Ok(())
}

fn read_attitude(ex: &mut BinaryExtractor<'_>, f: u8, cd: &mut CompositeData) -> Result<()> {
    let a = &mut cd.attitude;
    match f {
        attitude::VPE_STATUS => a.vpe_status = Some(ex.u16()?),
        attitude::YPR => a.ypr = Some(read_ypr(ex)?),
        attitude::QUATERNION => a.quaternion = Some(ex.f32s()?),
        attitude::DCM => a.dcm = Some(ex.f32s()?),
        attitude::MAG_NED => a.mag_ned = Some(ex.vec3f()?),
        attitude::ACCEL_NED => a.accel_ned = Some(ex.vec3f()?),
        attitude::LIN_ACCEL_BODY => a.lin_accel_body = Some(ex.vec3f()?),
        attitude::LIN_ACCEL_NED => a.lin_accel_ned = Some(ex.vec3f()?),
        attitude::YPR_U => a.ypr_u = Some(ex.vec3f()?),
        attitude::HEAVE => {
            let [heave, heave_rate, delayed_heave] = ex.f32s::<3>()?;
            a.heave = Some(Heave {
                heave,
                heave_rate,
                delayed_heave,
            });
        }
        attitude::ATT_U => a.att_u = Some(ex.f32()?),
        _ => return Err(ParseError::UnsupportedField { group: group::ATTITUDE, field: f }),
    }
    Ok(())
}

fn read_ins(ex: &mut BinaryExtractor<'_>, f: u8, cd: &mut CompositeData) -> Result<()> {
    let n = &mut cd.ins;
    match f {
        ins::INS_STATUS => n.ins_status = Some(ex.u16()?),
        ins::POS_LLA => n.pos_lla = Some(ex.vec3d()?),
        ins::POS_ECEF => n.pos_ecef = Some(ex.vec3d()?),
        ins::VEL_BODY => n.vel_body = Some(ex.vec3f()?),
        ins::VEL_NED => n.vel_ned = Some(ex.vec3f()?),
        ins::VEL_ECEF => n.vel_ecef = Some(ex.vec3f()?),
        ins::MAG_ECEF => n.mag_ecef = Some(ex.vec3f()?),
        ins::ACCEL_ECEF => n.accel_ecef = Some(ex.vec3f()?),
        ins::LIN_ACCEL_ECEF => n.lin_accel_ecef = Some(ex.vec3f()?),
        ins::POS_U => n.pos_u = Some(ex.f32()?),
        ins::VEL_U => n.vel_u = Some(ex.f32()?),
        _ => return Err(ParseError::UnsupportedField { group: group::INS, field: f }),
    }
    Ok(())
}

fn read_ypr(ex: &mut BinaryExtractor<'_>) -> Result<Ypr> {
    let [yaw, pitch, roll] = ex.vec3f()?;
    Ok(Ypr { yaw, pitch, roll })
}

fn read_delta_theta(ex: &mut BinaryExtractor<'_>) -> Result<DeltaTheta> {
    ex.require(16)?;
    Ok(DeltaTheta {
        delta_time: ex.f32()?,
        delta_theta: ex.vec3f()?,
    })
}

fn read_time_utc(ex: &mut BinaryExtractor<'_>) -> Result<TimeUtc> {
    ex.require(8)?;
    Ok(TimeUtc {
        year: ex.i8()?,
        month: ex.u8()?,
        day: ex.u8()?,
        hour: ex.u8()?,
        minute: ex.u8()?,
        second: ex.u8()?,
        millisecond: ex.u16()?,
    })
}

fn read_sat_info(ex: &mut BinaryExtractor<'_>) -> Result<SatInfo> {
    let count = usize::from(ex.peek_u8(0)?);
    ex.require(2 + 8 * count)?;
    if count > MAX_GNSS_ENTRIES {
        return Err(ParseError::TooManyEntries {
            count,
            max: MAX_GNSS_ENTRIES,
        });
    }

    let mut info = SatInfo {
        num_sats: ex.u8()?,
        ..SatInfo::default()
    };
    ex.skip(1)?;
    for _ in 0..count {
        let entry = SatInfoEntry {
            sys: ex.i8()?,
            sv_id: ex.u8()?,
            flags: ex.u8()?,
            cno: ex.u8()?,
            qi: ex.u8()?,
            elevation: ex.i8()?,
            azimuth: ex.i16()?,
        };
        // Capacity was checked above.
        let _ = info.sats.push(entry);
    }
    Ok(info)
}

fn read_raw_meas(ex: &mut BinaryExtractor<'_>) -> Result<RawMeas> {
    let count = usize::from(ex.peek_u8(10)?);
    ex.require(12 + 28 * count)?;
    if count > MAX_GNSS_ENTRIES {
        return Err(ParseError::TooManyEntries {
            count,
            max: MAX_GNSS_ENTRIES,
        });
    }

    let mut raw = RawMeas {
        tow: ex.f64()?,
        week: ex.u16()?,
        num_meas: ex.u8()?,
        ..RawMeas::default()
    };
    ex.skip(1)?;
    for _ in 0..count {
        let entry = RawMeasEntry {
            sys: ex.u8()?,
            sv_id: ex.u8()?,
            band: ex.u8()?,
            channel: ex.u8()?,
            freq_num: ex.i8()?,
            cno: ex.u8()?,
            flags: ex.u16()?,
            pseudorange: ex.f64()?,
            carrier: ex.f64()?,
            doppler: ex.f32()?,
        };
        let _ = raw.meas.push(entry);
    }
    Ok(raw)
}
