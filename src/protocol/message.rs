//! GDL-90 message builders
//!
//! Pure functions mapping a flight-state snapshot into the fixed payload
//! layouts of the three messages the bridge transmits. Builders return the
//! unframed payload; callers pass it through [`super::frame`]. Out-of-range
//! values are clamped or wrapped to their field width, never an error.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use super::{MSG_ID_FOREFLIGHT, MSG_ID_HEARTBEAT, MSG_ID_OWNSHIP, SUB_ID_AHRS};
use crate::sim::FlightState;

/// Heartbeat payload length before framing
pub const HEARTBEAT_LEN: usize = 7;

/// Ownship report payload length before framing
pub const OWNSHIP_LEN: usize = 28;

/// AHRS payload length before framing
pub const AHRS_LEN: usize = 12;

/// Identity of the transmitting aircraft
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AircraftInfo {
    /// Call sign, transmitted space-padded to 8 characters
    pub call_sign: String,
    /// 24-bit ICAO address
    pub icao_address: u32,
}

impl Default for AircraftInfo {
    fn default() -> Self {
        Self {
            call_sign: "N825V".to_string(),
            icao_address: 0xABCDEF,
        }
    }
}

/// Build a heartbeat payload.
///
/// Status byte 1 advertises GPS position valid (bit 7) and UAT initialized
/// (bit 0); status byte 2 advertises UTC timing ok (bit 0). Timestamp and
/// message counts are not tracked by the bridge and go out as zero.
pub fn heartbeat() -> Bytes {
    let mut buf = BytesMut::with_capacity(HEARTBEAT_LEN);
    buf.put_u8(MSG_ID_HEARTBEAT);
    buf.put_u8(0x81); // GPS valid + UAT initialized
    buf.put_u8(0x01); // UTC ok
    buf.put_u16(0); // timestamp
    buf.put_u16(0); // message counts
    buf.freeze()
}

/// Build an ownship position report from a state snapshot.
pub fn ownship(state: &FlightState, aircraft: &AircraftInfo) -> Bytes {
    let lat = encode_angle(state.lat_deg);
    let lon = encode_angle(state.lon_deg);
    let alt = encode_altitude(state.altitude_ft);

    // Airborne, true-track valid.
    let misc: u8 = 0x09;

    let h_vel = (state.ground_speed_kt.round().max(0.0) as u32).min(0xFFF);
    let v_vel = encode_vertical_velocity(state.vertical_speed_fpm);
    let track = ((state.track_deg * 256.0 / 360.0).round() as i64 & 0xFF) as u8;

    let mut buf = BytesMut::with_capacity(OWNSHIP_LEN);
    buf.put_u8(MSG_ID_OWNSHIP);
    buf.put_u8(0x00); // no alert, ICAO address type
    buf.put_u8((aircraft.icao_address >> 16) as u8);
    buf.put_u8((aircraft.icao_address >> 8) as u8);
    buf.put_u8(aircraft.icao_address as u8);
    buf.put_u8((lat >> 16) as u8);
    buf.put_u8((lat >> 8) as u8);
    buf.put_u8(lat as u8);
    buf.put_u8((lon >> 16) as u8);
    buf.put_u8((lon >> 8) as u8);
    buf.put_u8(lon as u8);
    buf.put_u8((alt >> 4) as u8);
    buf.put_u8((((alt & 0x0F) as u8) << 4) | (misc & 0x0F));
    buf.put_u8(0xBB); // NIC=11, NACp=11
    buf.put_u8((h_vel >> 4) as u8);
    buf.put_u8((((h_vel & 0x0F) as u8) << 4) | ((v_vel >> 8) & 0x0F) as u8);
    buf.put_u8(v_vel as u8);
    buf.put_u8(track);
    buf.put_u8(0x01); // emitter category: light aircraft

    let call_sign = aircraft.call_sign.as_bytes();
    for i in 0..8 {
        buf.put_u8(*call_sign.get(i).unwrap_or(&b' '));
    }

    buf.put_u8(0x00); // no emergency
    buf.freeze()
}

/// Build a ForeFlight AHRS (attitude) extension payload.
///
/// Roll and pitch are signed 0.1-degree units, heading is an unsigned
/// 15-bit 0.1-degree value, airspeeds are whole knots; all big-endian.
pub fn ahrs(state: &FlightState) -> Bytes {
    let roll = encode_decideg(state.roll_deg);
    let pitch = encode_decideg(state.pitch_deg);
    let heading = ((state.heading_deg * 10.0).round() as i64 & 0x7FFF) as u16;
    let airspeed = state
        .ground_speed_kt
        .round()
        .clamp(0.0, f64::from(u16::MAX)) as u16;

    let mut buf = BytesMut::with_capacity(AHRS_LEN);
    buf.put_u8(MSG_ID_FOREFLIGHT);
    buf.put_u8(SUB_ID_AHRS);
    buf.put_i16(roll);
    buf.put_i16(pitch);
    buf.put_u16(heading);
    buf.put_u16(airspeed); // indicated
    buf.put_u16(airspeed); // true
    buf.freeze()
}

/// Encode a latitude or longitude as a 24-bit two's-complement value with
/// resolution 180 / 2^23 degrees. Negative values fold into the 24-bit
/// range via the two's-complement mask.
fn encode_angle(degrees: f64) -> u32 {
    let raw = (degrees * (0x80_0000 as f64 / 180.0)).round() as i32;
    (raw as u32) & 0xFF_FFFF
}

/// Decode a 24-bit two's-complement angle back to degrees. Test support.
#[cfg(test)]
fn decode_angle(value: u32) -> f64 {
    let raw = if value & 0x80_0000 != 0 {
        value as i32 - 0x100_0000
    } else {
        value as i32
    };
    f64::from(raw) * (180.0 / 0x80_0000 as f64)
}

/// Encode pressure altitude: 25 ft resolution, offset so -1000 ft maps to
/// zero, clamped to the 12-bit field.
fn encode_altitude(altitude_ft: f64) -> u16 {
    let units = ((altitude_ft + 1000.0) / 25.0).round();
    units.clamp(0.0, 0xFFF as f64) as u16
}

/// Encode vertical velocity in units of 64 fpm as a signed 12-bit field.
fn encode_vertical_velocity(fpm: f64) -> u16 {
    let units = (fpm / 64.0).round().clamp(-2048.0, 2047.0) as i16;
    (units as u16) & 0xFFF
}

/// Encode an angle in signed 0.1-degree units, saturating at the i16 range.
fn encode_decideg(degrees: f64) -> i16 {
    (degrees * 10.0)
        .round()
        .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}
