//! Per-operation argument schemas.
//!
//! The link carries no self-describing schema: for every operation code the
//! argument encoder and decoder below are the single source of truth, used
//! by the client proxy on the way out and the server dispatcher on the way
//! in. Replies carry one little-endian `i32` status.

use gpsbridge_wire::{PayloadReader, PayloadWriter, Result};

use crate::types::{AgpsType, NiUserResponse, PositionMode, Recurrence, SetIdType};

/// Reply payload: a single status word. Zero is success.
pub fn encode_status(w: &mut PayloadWriter<'_>, status: i32) -> Result<()> {
    w.put_i32(status)
}

pub fn decode_status(r: &mut PayloadReader<'_>) -> Result<i32> {
    r.get_i32()
}

pub fn encode_inject_time(
    w: &mut PayloadWriter<'_>,
    utc_ms: i64,
    reference_ms: i64,
    uncertainty_ms: i32,
) -> Result<()> {
    w.put_i64(utc_ms)?;
    w.put_i64(reference_ms)?;
    w.put_i32(uncertainty_ms)
}

pub fn decode_inject_time(r: &mut PayloadReader<'_>) -> Result<(i64, i64, i32)> {
    Ok((r.get_i64()?, r.get_i64()?, r.get_i32()?))
}

pub fn encode_inject_location(
    w: &mut PayloadWriter<'_>,
    latitude: f64,
    longitude: f64,
    accuracy: f32,
) -> Result<()> {
    w.put_f64(latitude)?;
    w.put_f64(longitude)?;
    w.put_f32(accuracy)
}

pub fn decode_inject_location(r: &mut PayloadReader<'_>) -> Result<(f64, f64, f32)> {
    Ok((r.get_f64()?, r.get_f64()?, r.get_f32()?))
}

pub fn encode_position_mode(
    w: &mut PayloadWriter<'_>,
    mode: PositionMode,
    recurrence: Recurrence,
    min_interval_ms: u32,
    preferred_accuracy_m: u32,
    preferred_time_ms: u32,
) -> Result<()> {
    w.put_u32(mode.to_wire())?;
    w.put_u32(recurrence.to_wire())?;
    w.put_u32(min_interval_ms)?;
    w.put_u32(preferred_accuracy_m)?;
    w.put_u32(preferred_time_ms)
}

#[allow(clippy::type_complexity)]
pub fn decode_position_mode(
    r: &mut PayloadReader<'_>,
) -> Result<(PositionMode, Recurrence, u32, u32, u32)> {
    Ok((
        PositionMode::from_wire(r.get_u32()?)?,
        Recurrence::from_wire(r.get_u32()?)?,
        r.get_u32()?,
        r.get_u32()?,
        r.get_u32()?,
    ))
}

pub fn encode_set_server(
    w: &mut PayloadWriter<'_>,
    kind: AgpsType,
    port: i32,
    hostname: &str,
) -> Result<()> {
    w.put_u16(kind.to_wire())?;
    w.put_i32(port)?;
    w.put_str(hostname)
}

pub fn decode_set_server(r: &mut PayloadReader<'_>) -> Result<(AgpsType, i32, String)> {
    Ok((
        AgpsType::from_wire(r.get_u16()?)?,
        r.get_i32()?,
        r.get_str()?,
    ))
}

pub fn encode_ni_respond(
    w: &mut PayloadWriter<'_>,
    notification_id: i32,
    response: NiUserResponse,
) -> Result<()> {
    w.put_i32(notification_id)?;
    w.put_u32(response.to_wire())
}

pub fn decode_ni_respond(r: &mut PayloadReader<'_>) -> Result<(i32, NiUserResponse)> {
    Ok((r.get_i32()?, NiUserResponse::from_wire(r.get_u32()?)?))
}

pub fn encode_set_id(w: &mut PayloadWriter<'_>, kind: SetIdType, set_id: &str) -> Result<()> {
    w.put_u32(kind.to_wire())?;
    w.put_str(set_id)
}

pub fn decode_set_id(r: &mut PayloadReader<'_>) -> Result<(SetIdType, String)> {
    Ok((SetIdType::from_wire(r.get_u32()?)?, r.get_str()?))
}

pub fn encode_network_state(
    w: &mut PayloadWriter<'_>,
    connected: bool,
    kind: i32,
    roaming: bool,
    extra_info: &str,
) -> Result<()> {
    w.put_u8(connected as u8)?;
    w.put_i32(kind)?;
    w.put_u8(roaming as u8)?;
    w.put_str(extra_info)
}

pub fn decode_network_state(r: &mut PayloadReader<'_>) -> Result<(bool, i32, bool, String)> {
    Ok((
        r.get_u8()? != 0,
        r.get_i32()?,
        r.get_u8()? != 0,
        r.get_str()?,
    ))
}

pub fn encode_network_availability(
    w: &mut PayloadWriter<'_>,
    available: bool,
    apn: &str,
) -> Result<()> {
    w.put_u8(available as u8)?;
    w.put_str(apn)
}

pub fn decode_network_availability(r: &mut PayloadReader<'_>) -> Result<(bool, String)> {
    Ok((r.get_u8()? != 0, r.get_str()?))
}

pub fn encode_nmea(w: &mut PayloadWriter<'_>, utc_ms: i64, sentence: &[u8]) -> Result<()> {
    w.put_i64(utc_ms)?;
    w.put_bytes(sentence)
}

pub fn decode_nmea(r: &mut PayloadReader<'_>) -> Result<(i64, Vec<u8>)> {
    Ok((r.get_i64()?, r.get_bytes()?))
}

#[cfg(test)]
mod tests {
    use gpsbridge_wire::Payload;

    use super::*;

    #[test]
    fn inject_time_roundtrip() {
        let mut payload = Payload::new();
        encode_inject_time(&mut payload.writer(), 1_700_000_000_000, 12_345, 250).unwrap();
        assert_eq!(
            decode_inject_time(&mut payload.reader()).unwrap(),
            (1_700_000_000_000, 12_345, 250)
        );
    }

    #[test]
    fn position_mode_roundtrip() {
        let mut payload = Payload::new();
        encode_position_mode(
            &mut payload.writer(),
            PositionMode::MsBased,
            Recurrence::Periodic,
            1000,
            50,
            90_000,
        )
        .unwrap();
        assert_eq!(
            decode_position_mode(&mut payload.reader()).unwrap(),
            (PositionMode::MsBased, Recurrence::Periodic, 1000, 50, 90_000)
        );
    }

    #[test]
    fn set_server_field_order_is_kind_port_hostname() {
        let mut payload = Payload::new();
        encode_set_server(&mut payload.writer(), AgpsType::Supl, 7275, "supl.example.net").unwrap();

        let mut r = payload.reader();
        assert_eq!(r.get_u16().unwrap(), AgpsType::Supl.to_wire());
        assert_eq!(r.get_i32().unwrap(), 7275);
        assert_eq!(r.get_str().unwrap(), "supl.example.net");
    }

    #[test]
    fn network_state_roundtrip() {
        let mut payload = Payload::new();
        encode_network_state(&mut payload.writer(), true, 1, false, "lte").unwrap();
        assert_eq!(
            decode_network_state(&mut payload.reader()).unwrap(),
            (true, 1, false, "lte".to_string())
        );
    }

    #[test]
    fn nmea_roundtrip() {
        let mut payload = Payload::new();
        encode_nmea(&mut payload.writer(), 77, b"$GPRMC,123519,A").unwrap();
        let (ts, sentence) = decode_nmea(&mut payload.reader()).unwrap();
        assert_eq!(ts, 77);
        assert_eq!(sentence, b"$GPRMC,123519,A");
    }

    #[test]
    fn status_roundtrip() {
        let mut payload = Payload::new();
        encode_status(&mut payload.writer(), -7).unwrap();
        assert_eq!(decode_status(&mut payload.reader()).unwrap(), -7);
    }
}
