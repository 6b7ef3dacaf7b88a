use tracing::trace;
use vnlink_frame::fields::{attitude, gnss, group, imu, ins, is_gnss_group, time};
use vnlink_frame::{AsciiMetadata, RingByteBuffer};

use crate::composite::{CompositeData, DeltaTheta, GnssGroup, Heave, Ypr};
use crate::enabled::EnabledMeasurements;
use crate::error::{ParseError, Result};
use crate::extract::AsciiExtractor;

/// Talker prefix in front of every sensor mnemonic.
pub const TALKER: &str = "VN";

/// Suffix tokens a sensor may append after the measurement values.
pub const MAX_APPENDED_TOKENS: usize = 2;

/// Layout of one ASCII measurement output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsciiHeaderLayout {
    /// Three-letter mnemonic, e.g. `YPR`.
    pub mnemonic: &'static str,
    /// Measurement values before any appended suffix.
    pub tokens: usize,
    /// `(group, field)` targets filled in token order.
    pub targets: &'static [(u8, u8)],
}

impl AsciiHeaderLayout {
    pub fn measurements(&self) -> EnabledMeasurements {
        self.targets.iter().copied().collect()
    }
}

const fn layout(
    mnemonic: &'static str,
    tokens: usize,
    targets: &'static [(u8, u8)],
) -> AsciiHeaderLayout {
    AsciiHeaderLayout {
        mnemonic,
        tokens,
        targets,
    }
}

const G1: u8 = group::GNSS;
const G2: u8 = group::GNSS2;

/// Every ASCII measurement output the sensor family emits.
pub static ASCII_HEADERS: &[AsciiHeaderLayout] = &[
    layout("YPR", 3, &[(group::ATTITUDE, attitude::YPR)]),
    layout("QTN", 4, &[(group::ATTITUDE, attitude::QUATERNION)]),
    layout(
        "QMR",
        13,
        &[
            (group::ATTITUDE, attitude::QUATERNION),
            (group::IMU, imu::MAG),
            (group::IMU, imu::ACCEL),
            (group::IMU, imu::ANGULAR_RATE),
        ],
    ),
    layout("MAG", 3, &[(group::IMU, imu::MAG)]),
    layout("ACC", 3, &[(group::IMU, imu::ACCEL)]),
    layout("GYR", 3, &[(group::IMU, imu::ANGULAR_RATE)]),
    layout(
        "MAR",
        9,
        &[
            (group::IMU, imu::MAG),
            (group::IMU, imu::ACCEL),
            (group::IMU, imu::ANGULAR_RATE),
        ],
    ),
    layout(
        "YMR",
        12,
        &[
            (group::ATTITUDE, attitude::YPR),
            (group::IMU, imu::MAG),
            (group::IMU, imu::ACCEL),
            (group::IMU, imu::ANGULAR_RATE),
        ],
    ),
    layout(
        "YBA",
        9,
        &[
            (group::ATTITUDE, attitude::YPR),
            (group::ATTITUDE, attitude::LIN_ACCEL_BODY),
            (group::IMU, imu::ANGULAR_RATE),
        ],
    ),
    layout(
        "YIA",
        9,
        &[
            (group::ATTITUDE, attitude::YPR),
            (group::ATTITUDE, attitude::LIN_ACCEL_NED),
            (group::IMU, imu::ANGULAR_RATE),
        ],
    ),
    layout(
        "IMU",
        11,
        &[
            (group::IMU, imu::UNCOMP_MAG),
            (group::IMU, imu::UNCOMP_ACCEL),
            (group::IMU, imu::UNCOMP_GYRO),
            (group::IMU, imu::TEMPERATURE),
            (group::IMU, imu::PRESSURE),
        ],
    ),
    layout(
        "DTV",
        7,
        &[
            (group::IMU, imu::DELTA_THETA),
            (group::IMU, imu::DELTA_VEL),
        ],
    ),
    layout("GPS", 15, GPS_LLA_TARGETS_1),
    layout("GPE", 15, GPS_ECEF_TARGETS_1),
    layout("G2S", 15, GPS_LLA_TARGETS_2),
    layout("G2E", 15, GPS_ECEF_TARGETS_2),
    layout(
        "INS",
        15,
        &[
            (group::TIME, time::GPS_TOW),
            (group::TIME, time::GPS_WEEK),
            (group::INS, ins::INS_STATUS),
            (group::ATTITUDE, attitude::YPR),
            (group::INS, ins::POS_LLA),
            (group::INS, ins::VEL_NED),
            (group::ATTITUDE, attitude::ATT_U),
            (group::INS, ins::POS_U),
            (group::INS, ins::VEL_U),
        ],
    ),
    layout(
        "INE",
        15,
        &[
            (group::TIME, time::GPS_TOW),
            (group::TIME, time::GPS_WEEK),
            (group::INS, ins::INS_STATUS),
            (group::ATTITUDE, attitude::YPR),
            (group::INS, ins::POS_ECEF),
            (group::INS, ins::VEL_ECEF),
            (group::ATTITUDE, attitude::ATT_U),
            (group::INS, ins::POS_U),
            (group::INS, ins::VEL_U),
        ],
    ),
    layout(
        "ISL",
        15,
        &[
            (group::ATTITUDE, attitude::YPR),
            (group::INS, ins::POS_LLA),
            (group::INS, ins::VEL_NED),
            (group::IMU, imu::ACCEL),
            (group::IMU, imu::ANGULAR_RATE),
        ],
    ),
    layout(
        "ISE",
        15,
        &[
            (group::ATTITUDE, attitude::YPR),
            (group::INS, ins::POS_ECEF),
            (group::INS, ins::VEL_ECEF),
            (group::IMU, imu::ACCEL),
            (group::IMU, imu::ANGULAR_RATE),
        ],
    ),
    layout("HVE", 3, &[(group::ATTITUDE, attitude::HEAVE)]),
];

macro_rules! gnss_targets {
    ($g:expr, $pos:expr, $vel:expr) => {
        &[
            ($g, gnss::TOW),
            ($g, gnss::WEEK),
            ($g, gnss::FIX),
            ($g, gnss::NUM_SATS),
            ($g, $pos),
            ($g, $vel),
            ($g, gnss::POS_U),
            ($g, gnss::VEL_U),
            ($g, gnss::TIME_U),
        ]
    };
}

const GPS_LLA_TARGETS_1: &[(u8, u8)] = gnss_targets!(G1, gnss::POS_LLA, gnss::VEL_NED);
const GPS_ECEF_TARGETS_1: &[(u8, u8)] = gnss_targets!(G1, gnss::POS_ECEF, gnss::VEL_ECEF);
const GPS_LLA_TARGETS_2: &[(u8, u8)] = gnss_targets!(G2, gnss::POS_LLA, gnss::VEL_NED);
const GPS_ECEF_TARGETS_2: &[(u8, u8)] = gnss_targets!(G2, gnss::POS_ECEF, gnss::VEL_ECEF);

/// Layout for a full header such as `VNYPR`.
pub fn lookup(header: &str) -> Option<&'static AsciiHeaderLayout> {
    let mnemonic = header.strip_prefix(TALKER)?;
    ASCII_HEADERS.iter().find(|l| l.mnemonic == mnemonic)
}

/// True if `header` names a measurement output rather than command traffic.
pub fn is_measurement_header(header: &str) -> bool {
    lookup(header).is_some()
}

/// Measurements an ASCII output carries, or `None` for non-measurement headers.
pub fn ascii_header_to_meas_header(header: &str) -> Option<EnabledMeasurements> {
    lookup(header).map(AsciiHeaderLayout::measurements)
}

/// Decode the ASCII frame whose `$` is at logical `offset`.
pub fn parse_ascii_packet(
    buf: &RingByteBuffer,
    offset: usize,
    meta: &AsciiMetadata,
) -> Result<CompositeData> {
    let layout =
        lookup(meta.header()).ok_or_else(|| ParseError::UnknownHeader(meta.header().to_string()))?;

    let found = meta.token_count();
    if found < layout.tokens || found > layout.tokens + MAX_APPENDED_TOKENS {
        return Err(ParseError::TokenCount {
            header: meta.header().to_string(),
            expected: layout.tokens,
            found,
        });
    }

    let mut ex = AsciiExtractor::new(buf, offset, meta);
    let mut cd = CompositeData::new();
    for &(g, f) in layout.targets {
        read_target(&mut ex, g, f, &mut cd)?;
    }
    while ex.remaining() > 0 {
        read_appended(&mut ex, &mut cd)?;
    }

    trace!(header = meta.header(), "decoded ascii frame");
    Ok(cd)
}

fn read_target(ex: &mut AsciiExtractor<'_>, g: u8, f: u8, cd: &mut CompositeData) -> Result<()> {
    let index = ex.index();
    let unsupported = || ParseError::InvalidToken { index };

    match (g, f) {
        (group::ATTITUDE, attitude::YPR) => {
            let [yaw, pitch, roll] = ex.vec3f()?;
            cd.attitude.ypr = Some(Ypr { yaw, pitch, roll });
        }
        (group::ATTITUDE, attitude::QUATERNION) => cd.attitude.quaternion = Some(ex.f32s()?),
        (group::ATTITUDE, attitude::LIN_ACCEL_BODY) => cd.attitude.lin_accel_body = Some(ex.vec3f()?),
        (group::ATTITUDE, attitude::LIN_ACCEL_NED) => cd.attitude.lin_accel_ned = Some(ex.vec3f()?),
        (group::ATTITUDE, attitude::ATT_U) => cd.attitude.att_u = Some(ex.f32()?),
        (group::ATTITUDE, attitude::HEAVE) => {
            let [heave, heave_rate, delayed_heave] = ex.vec3f()?;
            cd.attitude.heave = Some(Heave {
                heave,
                heave_rate,
                delayed_heave,
            });
        }
        (group::IMU, imu::MAG) => cd.imu.mag = Some(ex.vec3f()?),
        (group::IMU, imu::ACCEL) => cd.imu.accel = Some(ex.vec3f()?),
        (group::IMU, imu::ANGULAR_RATE) => cd.imu.angular_rate = Some(ex.vec3f()?),
        (group::IMU, imu::UNCOMP_MAG) => cd.imu.uncomp_mag = Some(ex.vec3f()?),
        (group::IMU, imu::UNCOMP_ACCEL) => cd.imu.uncomp_accel = Some(ex.vec3f()?),
        (group::IMU, imu::UNCOMP_GYRO) => cd.imu.uncomp_gyro = Some(ex.vec3f()?),
        (group::IMU, imu::TEMPERATURE) => cd.imu.temperature = Some(ex.f32()?),
        (group::IMU, imu::PRESSURE) => cd.imu.pressure = Some(ex.f32()?),
        (group::IMU, imu::DELTA_THETA) => {
            let delta_time = ex.f32()?;
            cd.imu.delta_theta = Some(DeltaTheta {
                delta_time,
                delta_theta: ex.vec3f()?,
            });
        }
        (group::IMU, imu::DELTA_VEL) => cd.imu.delta_vel = Some(ex.vec3f()?),
        (group::TIME, time::GPS_TOW) => cd.time.gps_tow = Some(ex.seconds_as_nanos()?),
        (group::TIME, time::GPS_WEEK) => cd.time.gps_week = Some(ex.u16()?),
        (group::INS, ins::INS_STATUS) => cd.ins.ins_status = Some(ex.hex_u16()?),
        (group::INS, ins::POS_LLA) => cd.ins.pos_lla = Some(ex.vec3d()?),
        (group::INS, ins::POS_ECEF) => cd.ins.pos_ecef = Some(ex.vec3d()?),
        (group::INS, ins::VEL_NED) => cd.ins.vel_ned = Some(ex.vec3f()?),
        (group::INS, ins::VEL_ECEF) => cd.ins.vel_ecef = Some(ex.vec3f()?),
        (group::INS, ins::POS_U) => cd.ins.pos_u = Some(ex.f32()?),
        (group::INS, ins::VEL_U) => cd.ins.vel_u = Some(ex.f32()?),
        (g, f) if is_gnss_group(g) => {
            let target = cd.gnss_mut(g).ok_or_else(unsupported)?;
            read_gnss_target(ex, f, target).ok_or_else(unsupported)??;
        }
        _ => return Err(unsupported()),
    }
    Ok(())
}

/// `None` when the field has no ASCII form.
fn read_gnss_target(ex: &mut AsciiExtractor<'_>, f: u8, g: &mut GnssGroup) -> Option<Result<()>> {
    let outcome = match f {
        gnss::TOW => ex.seconds_as_nanos().map(|v| g.tow = Some(v)),
        gnss::WEEK => ex.u16().map(|v| g.week = Some(v)),
        gnss::FIX => ex.u8().map(|v| g.fix = Some(v)),
        gnss::NUM_SATS => ex.u8().map(|v| g.num_sats = Some(v)),
        gnss::POS_LLA => ex.vec3d().map(|v| g.pos_lla = Some(v)),
        gnss::POS_ECEF => ex.vec3d().map(|v| g.pos_ecef = Some(v)),
        gnss::VEL_NED => ex.vec3f().map(|v| g.vel_ned = Some(v)),
        gnss::VEL_ECEF => ex.vec3f().map(|v| g.vel_ecef = Some(v)),
        gnss::POS_U => ex.vec3f().map(|v| g.pos_u = Some(v)),
        gnss::VEL_U => ex.f32().map(|v| g.vel_u = Some(v)),
        gnss::TIME_U => ex.f32().map(|v| g.time_u = Some(v)),
        _ => return None,
    };
    Some(outcome)
}

/// `T<startup ns>` or `S<sync-in count>` after the measurement values.
fn read_appended(ex: &mut AsciiExtractor<'_>, cd: &mut CompositeData) -> Result<()> {
    let index = ex.index();
    let invalid = ParseError::InvalidToken { index };
    let token = ex.token()?;
    if let Some(rest) = token.strip_prefix('T') {
        cd.time.time_startup = Some(rest.parse().map_err(|_| invalid)?);
    } else if let Some(rest) = token.strip_prefix('S') {
        cd.time.sync_in_cnt = Some(rest.parse().map_err(|_| invalid)?);
    } else {
        return Err(invalid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use vnlink_frame::{encode_ascii, find_ascii_packet, AsciiChecksum, FrameConfig};

    use super::*;

    fn parse(text: &str) -> Result<CompositeData> {
        let mut buf = RingByteBuffer::new(512);
        buf.put(text.as_bytes()).unwrap();
        let meta = find_ascii_packet(&buf, 0, &FrameConfig::default())
            .into_valid()
            .expect("fixture must be a valid frame");
        parse_ascii_packet(&buf, 0, &meta)
    }

    #[test]
    fn ypr_frame_sets_only_attitude_ypr() {
        let cd = parse("$VNYPR,+010.0,-002.0,+000.1*6E\r\n").unwrap();
        let ypr = cd.attitude.ypr.unwrap();
        assert!((ypr.yaw - 10.0).abs() < 1e-6);
        assert!((ypr.pitch + 2.0).abs() < 1e-6);
        assert!((ypr.roll - 0.1).abs() < 1e-6);
        assert_eq!(
            cd.present(),
            EnabledMeasurements::new().with(group::ATTITUDE, attitude::YPR)
        );
    }

    #[test]
    fn every_header_populates_exactly_its_targets() {
        for layout in ASCII_HEADERS {
            let mut body = format!("VN{}", layout.mnemonic);
            for _ in 0..layout.tokens {
                body.push_str(",1");
            }
            let cd = parse(&encode_ascii(&body, AsciiChecksum::Crc16))
                .unwrap_or_else(|e| panic!("{} failed: {e}", layout.mnemonic));
            let expected = ascii_header_to_meas_header(&format!("VN{}", layout.mnemonic)).unwrap();
            assert_eq!(cd.present(), expected, "{}", layout.mnemonic);
        }
    }

    #[test]
    fn token_counts_match_target_widths() {
        for layout in ASCII_HEADERS {
            let width: usize = layout
                .targets
                .iter()
                .map(|&(g, f)| match (g, f) {
                    (group::ATTITUDE, attitude::QUATERNION) => 4,
                    (group::IMU, imu::DELTA_THETA) => 4,
                    (group::IMU, imu::TEMPERATURE | imu::PRESSURE) => 1,
                    (group::ATTITUDE, attitude::ATT_U) => 1,
                    (group::TIME, _) => 1,
                    (group::INS, ins::INS_STATUS | ins::POS_U | ins::VEL_U) => 1,
                    (_, gnss::TOW | gnss::WEEK | gnss::FIX | gnss::NUM_SATS)
                        if is_gnss_group(g) =>
                    {
                        1
                    }
                    (_, gnss::VEL_U | gnss::TIME_U) if is_gnss_group(g) => 1,
                    _ => 3,
                })
                .sum();
            assert_eq!(width, layout.tokens, "{}", layout.mnemonic);
        }
    }

    #[test]
    fn ins_frame_decodes_time_and_hex_status() {
        let body = "VNINS,345600.250,2200,0207,+010.0,-002.0,+000.1,+37.1,-122.2,+0010.0,\
                    +0.1,+0.2,-0.3,1.5,2.5,0.5";
        let cd = parse(&encode_ascii(body, AsciiChecksum::Xor8)).unwrap();
        assert_eq!(cd.time.gps_tow, Some(345_600_250_000_000));
        assert_eq!(cd.time.gps_week, Some(2200));
        assert_eq!(cd.ins.ins_status, Some(0x0207));
        assert_eq!(cd.ins.pos_lla, Some([37.1, -122.2, 10.0]));
        assert_eq!(cd.attitude.att_u, Some(1.5));
        assert_eq!(cd.ins.vel_u, Some(0.5));
    }

    #[test]
    fn gnss2_frame_lands_in_second_receiver() {
        let body = "VNG2S,345600.0,2200,3,12,+37.1,-122.2,+10.0,0.1,0.2,0.3,1.0,1.0,2.0,0.5,1e-8";
        let cd = parse(&encode_ascii(body, AsciiChecksum::Crc16)).unwrap();
        assert!(cd.gnss.is_empty());
        assert_eq!(cd.gnss2.fix, Some(3));
        assert_eq!(cd.gnss2.num_sats, Some(12));
        assert_eq!(cd.gnss2.tow, Some(345_600_000_000_000));
    }

    #[test]
    fn appended_tokens_fill_time_fields() {
        let cd = parse(&encode_ascii("VNYPR,1,2,3,T123456,S42", AsciiChecksum::Crc16)).unwrap();
        assert_eq!(cd.time.time_startup, Some(123_456));
        assert_eq!(cd.time.sync_in_cnt, Some(42));

        let err = parse(&encode_ascii("VNYPR,1,2,3,X9", AsciiChecksum::Crc16)).unwrap_err();
        assert_eq!(err, ParseError::InvalidToken { index: 3 });
    }

    #[test]
    fn wrong_token_count_is_rejected() {
        let err = parse(&encode_ascii("VNYPR,1,2", AsciiChecksum::Crc16)).unwrap_err();
        assert!(matches!(
            err,
            ParseError::TokenCount {
                expected: 3,
                found: 2,
                ..
            }
        ));
        let err = parse(&encode_ascii("VNYPR,1,2,3,T1,S2,T3", AsciiChecksum::Crc16)).unwrap_err();
        assert!(matches!(err, ParseError::TokenCount { found: 6, .. }));
    }

    #[test]
    fn command_traffic_is_not_a_measurement() {
        assert!(!is_measurement_header("VNRRG"));
        assert!(!is_measurement_header("VNERR"));
        assert!(!is_measurement_header("YPR"));
        assert!(is_measurement_header("VNHVE"));
        let err = parse(&encode_ascii("VNRRG,8,1,2,3", AsciiChecksum::Crc16)).unwrap_err();
        assert_eq!(err, ParseError::UnknownHeader("VNRRG".into()));
    }
}
