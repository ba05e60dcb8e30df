//! Positioning data types and their wire schemas.
//!
//! Field order is the schema: both ends encode and decode each type with the
//! same impl, little-endian, no structure copies. An out-of-range enum value
//! is a wire error — schema skew surfaces instead of being misread.

use gpsbridge_wire::{PayloadReader, PayloadWriter, Result, WireError};

/// Maximum satellites carried in one [`SvStatus`].
pub const MAX_SVS: usize = 32;

/// Validity bits for [`Location`] fields.
pub mod location_flags {
    pub const LAT_LONG: u16 = 0x0001;
    pub const ALTITUDE: u16 = 0x0002;
    pub const SPEED: u16 = 0x0004;
    pub const BEARING: u16 = 0x0008;
    pub const ACCURACY: u16 = 0x0010;
}

/// Engine capability bits reported through the capabilities event.
pub mod capabilities {
    pub const SCHEDULING: u32 = 0x0000_0001;
    pub const MSB: u32 = 0x0000_0002;
    pub const MSA: u32 = 0x0000_0004;
    pub const SINGLE_SHOT: u32 = 0x0000_0008;
    pub const ON_DEMAND_TIME: u32 = 0x0000_0010;
}

/// Aiding-data bits accepted by delete-aiding-data.
pub mod aiding {
    pub const EPHEMERIS: u16 = 0x0001;
    pub const ALMANAC: u16 = 0x0002;
    pub const POSITION: u16 = 0x0004;
    pub const TIME: u16 = 0x0008;
    pub const IONO: u16 = 0x0010;
    pub const UTC: u16 = 0x0020;
    pub const HEALTH: u16 = 0x0040;
    pub const SVDIR: u16 = 0x0080;
    pub const SVSTEER: u16 = 0x0100;
    pub const SADATA: u16 = 0x0200;
    pub const RTI: u16 = 0x0400;
    pub const CELLDB_INFO: u16 = 0x8000;
    pub const ALL: u16 = 0xFFFF;
}

/// Verification bits on a network-initiated notification.
pub mod ni_flags {
    pub const NEED_NOTIFY: u32 = 0x0001;
    pub const NEED_VERIFY: u32 = 0x0002;
    pub const PRIVACY_OVERRIDE: u32 = 0x0004;
}

/// One position fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Which of the fields below are valid (`location_flags`).
    pub flags: u16,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub speed: f32,
    pub bearing: f32,
    pub accuracy: f32,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl Location {
    pub fn encode(&self, w: &mut PayloadWriter<'_>) -> Result<()> {
        w.put_u16(self.flags)?;
        w.put_f64(self.latitude)?;
        w.put_f64(self.longitude)?;
        w.put_f64(self.altitude)?;
        w.put_f32(self.speed)?;
        w.put_f32(self.bearing)?;
        w.put_f32(self.accuracy)?;
        w.put_i64(self.timestamp_ms)
    }

    pub fn decode(r: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(Self {
            flags: r.get_u16()?,
            latitude: r.get_f64()?,
            longitude: r.get_f64()?,
            altitude: r.get_f64()?,
            speed: r.get_f32()?,
            bearing: r.get_f32()?,
            accuracy: r.get_f32()?,
            timestamp_ms: r.get_i64()?,
        })
    }
}

/// Engine session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    None,
    SessionBegin,
    SessionEnd,
    EngineOn,
    EngineOff,
}

impl EngineStatus {
    pub fn to_wire(self) -> u16 {
        match self {
            EngineStatus::None => 0,
            EngineStatus::SessionBegin => 1,
            EngineStatus::SessionEnd => 2,
            EngineStatus::EngineOn => 3,
            EngineStatus::EngineOff => 4,
        }
    }

    pub fn from_wire(v: u16) -> Result<Self> {
        Ok(match v {
            0 => EngineStatus::None,
            1 => EngineStatus::SessionBegin,
            2 => EngineStatus::SessionEnd,
            3 => EngineStatus::EngineOn,
            4 => EngineStatus::EngineOff,
            other => {
                return Err(WireError::InvalidField {
                    field: "engine status",
                    value: other as i64,
                })
            }
        })
    }
}

/// Per-satellite view data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvInfo {
    pub prn: i32,
    pub snr: f32,
    pub elevation: f32,
    pub azimuth: f32,
}

/// Satellite constellation snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SvStatus {
    pub svs: Vec<SvInfo>,
    pub ephemeris_mask: u32,
    pub almanac_mask: u32,
    pub used_in_fix_mask: u32,
}

impl SvStatus {
    pub fn encode(&self, w: &mut PayloadWriter<'_>) -> Result<()> {
        if self.svs.len() > MAX_SVS {
            return Err(WireError::InvalidField {
                field: "sv count",
                value: self.svs.len() as i64,
            });
        }
        w.put_u32(self.svs.len() as u32)?;
        for sv in &self.svs {
            w.put_i32(sv.prn)?;
            w.put_f32(sv.snr)?;
            w.put_f32(sv.elevation)?;
            w.put_f32(sv.azimuth)?;
        }
        w.put_u32(self.ephemeris_mask)?;
        w.put_u32(self.almanac_mask)?;
        w.put_u32(self.used_in_fix_mask)
    }

    pub fn decode(r: &mut PayloadReader<'_>) -> Result<Self> {
        let count = r.get_u32()? as usize;
        if count > MAX_SVS {
            return Err(WireError::InvalidField {
                field: "sv count",
                value: count as i64,
            });
        }
        let mut svs = Vec::with_capacity(count);
        for _ in 0..count {
            svs.push(SvInfo {
                prn: r.get_i32()?,
                snr: r.get_f32()?,
                elevation: r.get_f32()?,
                azimuth: r.get_f32()?,
            });
        }
        Ok(Self {
            svs,
            ephemeris_mask: r.get_u32()?,
            almanac_mask: r.get_u32()?,
            used_in_fix_mask: r.get_u32()?,
        })
    }
}

/// Positioning computation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionMode {
    Standalone,
    MsBased,
    MsAssisted,
}

impl PositionMode {
    pub fn to_wire(self) -> u32 {
        match self {
            PositionMode::Standalone => 0,
            PositionMode::MsBased => 1,
            PositionMode::MsAssisted => 2,
        }
    }

    pub fn from_wire(v: u32) -> Result<Self> {
        Ok(match v {
            0 => PositionMode::Standalone,
            1 => PositionMode::MsBased,
            2 => PositionMode::MsAssisted,
            other => {
                return Err(WireError::InvalidField {
                    field: "position mode",
                    value: other as i64,
                })
            }
        })
    }
}

/// Fix recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    Periodic,
    Single,
}

impl Recurrence {
    pub fn to_wire(self) -> u32 {
        match self {
            Recurrence::Periodic => 0,
            Recurrence::Single => 1,
        }
    }

    pub fn from_wire(v: u32) -> Result<Self> {
        Ok(match v {
            0 => Recurrence::Periodic,
            1 => Recurrence::Single,
            other => {
                return Err(WireError::InvalidField {
                    field: "recurrence",
                    value: other as i64,
                })
            }
        })
    }
}

/// Assisted-positioning bearer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgpsType {
    Supl,
    C2k,
}

impl AgpsType {
    pub fn to_wire(self) -> u16 {
        match self {
            AgpsType::Supl => 1,
            AgpsType::C2k => 2,
        }
    }

    pub fn from_wire(v: u16) -> Result<Self> {
        Ok(match v {
            1 => AgpsType::Supl,
            2 => AgpsType::C2k,
            other => {
                return Err(WireError::InvalidField {
                    field: "agps type",
                    value: other as i64,
                })
            }
        })
    }
}

/// Assisted-positioning data-connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgpsState {
    RequestConn,
    ReleaseConn,
    Connected,
    Done,
    Failed,
}

impl AgpsState {
    pub fn to_wire(self) -> u16 {
        match self {
            AgpsState::RequestConn => 1,
            AgpsState::ReleaseConn => 2,
            AgpsState::Connected => 3,
            AgpsState::Done => 4,
            AgpsState::Failed => 5,
        }
    }

    pub fn from_wire(v: u16) -> Result<Self> {
        Ok(match v {
            1 => AgpsState::RequestConn,
            2 => AgpsState::ReleaseConn,
            3 => AgpsState::Connected,
            4 => AgpsState::Done,
            5 => AgpsState::Failed,
            other => {
                return Err(WireError::InvalidField {
                    field: "agps state",
                    value: other as i64,
                })
            }
        })
    }
}

/// Assisted-positioning status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgpsStatus {
    pub kind: AgpsType,
    pub state: AgpsState,
}

impl AgpsStatus {
    pub fn encode(&self, w: &mut PayloadWriter<'_>) -> Result<()> {
        w.put_u16(self.kind.to_wire())?;
        w.put_u16(self.state.to_wire())
    }

    pub fn decode(r: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(Self {
            kind: AgpsType::from_wire(r.get_u16()?)?,
            state: AgpsState::from_wire(r.get_u16()?)?,
        })
    }
}

/// Kind of a network-initiated session request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NiType {
    Voice,
    UmtsSupl,
    UmtsCtrlPlane,
}

impl NiType {
    pub fn to_wire(self) -> u32 {
        match self {
            NiType::Voice => 1,
            NiType::UmtsSupl => 2,
            NiType::UmtsCtrlPlane => 3,
        }
    }

    pub fn from_wire(v: u32) -> Result<Self> {
        Ok(match v {
            1 => NiType::Voice,
            2 => NiType::UmtsSupl,
            3 => NiType::UmtsCtrlPlane,
            other => {
                return Err(WireError::InvalidField {
                    field: "ni type",
                    value: other as i64,
                })
            }
        })
    }
}

/// User response to a network-initiated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NiUserResponse {
    Accept,
    Deny,
    NoResponse,
}

impl NiUserResponse {
    pub fn to_wire(self) -> u32 {
        match self {
            NiUserResponse::Accept => 1,
            NiUserResponse::Deny => 2,
            NiUserResponse::NoResponse => 3,
        }
    }

    pub fn from_wire(v: u32) -> Result<Self> {
        Ok(match v {
            1 => NiUserResponse::Accept,
            2 => NiUserResponse::Deny,
            3 => NiUserResponse::NoResponse,
            other => {
                return Err(WireError::InvalidField {
                    field: "ni user response",
                    value: other as i64,
                })
            }
        })
    }
}

/// Text encoding of notification strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NiEncoding {
    Unknown,
    None,
    SuplGsmDefault,
    SuplUtf8,
    SuplUcs2,
}

impl NiEncoding {
    pub fn to_wire(self) -> i32 {
        match self {
            NiEncoding::Unknown => -1,
            NiEncoding::None => 0,
            NiEncoding::SuplGsmDefault => 1,
            NiEncoding::SuplUtf8 => 2,
            NiEncoding::SuplUcs2 => 3,
        }
    }

    pub fn from_wire(v: i32) -> Result<Self> {
        Ok(match v {
            -1 => NiEncoding::Unknown,
            0 => NiEncoding::None,
            1 => NiEncoding::SuplGsmDefault,
            2 => NiEncoding::SuplUtf8,
            3 => NiEncoding::SuplUcs2,
            other => {
                return Err(WireError::InvalidField {
                    field: "ni encoding",
                    value: other as i64,
                })
            }
        })
    }
}

/// A network-initiated session notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NiNotification {
    pub notification_id: i32,
    pub kind: NiType,
    /// `ni_flags` bits.
    pub flags: u32,
    /// Seconds the user has to respond.
    pub timeout: i32,
    pub default_response: NiUserResponse,
    pub requestor_id: String,
    pub text: String,
    pub requestor_id_encoding: NiEncoding,
    pub text_encoding: NiEncoding,
    pub extras: String,
}

impl NiNotification {
    pub fn encode(&self, w: &mut PayloadWriter<'_>) -> Result<()> {
        w.put_i32(self.notification_id)?;
        w.put_u32(self.kind.to_wire())?;
        w.put_u32(self.flags)?;
        w.put_i32(self.timeout)?;
        w.put_u32(self.default_response.to_wire())?;
        w.put_str(&self.requestor_id)?;
        w.put_str(&self.text)?;
        w.put_i32(self.requestor_id_encoding.to_wire())?;
        w.put_i32(self.text_encoding.to_wire())?;
        w.put_str(&self.extras)
    }

    pub fn decode(r: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(Self {
            notification_id: r.get_i32()?,
            kind: NiType::from_wire(r.get_u32()?)?,
            flags: r.get_u32()?,
            timeout: r.get_i32()?,
            default_response: NiUserResponse::from_wire(r.get_u32()?)?,
            requestor_id: r.get_str()?,
            text: r.get_str()?,
            requestor_id_encoding: NiEncoding::from_wire(r.get_i32()?)?,
            text_encoding: NiEncoding::from_wire(r.get_i32()?)?,
            extras: r.get_str()?,
        })
    }
}

/// Set-ID kind for the network-reference interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetIdType {
    None,
    Imsi,
    Msisdn,
}

impl SetIdType {
    pub fn to_wire(self) -> u32 {
        match self {
            SetIdType::None => 0,
            SetIdType::Imsi => 1,
            SetIdType::Msisdn => 2,
        }
    }

    pub fn from_wire(v: u32) -> Result<Self> {
        Ok(match v {
            0 => SetIdType::None,
            1 => SetIdType::Imsi,
            2 => SetIdType::Msisdn,
            other => {
                return Err(WireError::InvalidField {
                    field: "set id type",
                    value: other as i64,
                })
            }
        })
    }
}

/// Reference location supplied by the network-reference interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefLocation {
    GsmCellId { mcc: u16, mnc: u16, lac: u16, cid: u32 },
    UmtsCellId { mcc: u16, mnc: u16, lac: u16, cid: u32 },
    Mac([u8; 6]),
}

impl RefLocation {
    pub fn encode(&self, w: &mut PayloadWriter<'_>) -> Result<()> {
        match *self {
            RefLocation::GsmCellId { mcc, mnc, lac, cid } => {
                w.put_u16(1)?;
                w.put_u16(mcc)?;
                w.put_u16(mnc)?;
                w.put_u16(lac)?;
                w.put_u32(cid)
            }
            RefLocation::UmtsCellId { mcc, mnc, lac, cid } => {
                w.put_u16(2)?;
                w.put_u16(mcc)?;
                w.put_u16(mnc)?;
                w.put_u16(lac)?;
                w.put_u32(cid)
            }
            RefLocation::Mac(mac) => {
                w.put_u16(3)?;
                w.put_bytes(&mac)
            }
        }
    }

    pub fn decode(r: &mut PayloadReader<'_>) -> Result<Self> {
        let tag = r.get_u16()?;
        match tag {
            1 | 2 => {
                let mcc = r.get_u16()?;
                let mnc = r.get_u16()?;
                let lac = r.get_u16()?;
                let cid = r.get_u32()?;
                Ok(if tag == 1 {
                    RefLocation::GsmCellId { mcc, mnc, lac, cid }
                } else {
                    RefLocation::UmtsCellId { mcc, mnc, lac, cid }
                })
            }
            3 => {
                let bytes = r.get_bytes()?;
                let mac: [u8; 6] = bytes.as_slice().try_into().map_err(|_| {
                    WireError::InvalidField {
                        field: "mac length",
                        value: bytes.len() as i64,
                    }
                })?;
                Ok(RefLocation::Mac(mac))
            }
            other => Err(WireError::InvalidField {
                field: "ref location tag",
                value: other as i64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use gpsbridge_wire::Payload;

    use super::*;

    #[test]
    fn location_roundtrip() {
        let location = Location {
            flags: location_flags::LAT_LONG | location_flags::ACCURACY,
            latitude: 59.4370,
            longitude: 24.7536,
            altitude: 12.0,
            speed: 0.4,
            bearing: 270.0,
            accuracy: 8.0,
            timestamp_ms: 1_700_000_000_000,
        };

        let mut payload = Payload::new();
        location.encode(&mut payload.writer()).unwrap();
        let decoded = Location::decode(&mut payload.reader()).unwrap();
        assert_eq!(decoded, location);
    }

    #[test]
    fn sv_status_roundtrip() {
        let status = SvStatus {
            svs: (1..=12)
                .map(|prn| SvInfo {
                    prn,
                    snr: prn as f32 * 2.0,
                    elevation: 45.0,
                    azimuth: 180.0,
                })
                .collect(),
            ephemeris_mask: 0x0FFF,
            almanac_mask: 0xFFFF,
            used_in_fix_mask: 0x00FF,
        };

        let mut payload = Payload::new();
        status.encode(&mut payload.writer()).unwrap();
        let decoded = SvStatus::decode(&mut payload.reader()).unwrap();
        assert_eq!(decoded, status);
    }

    #[test]
    fn sv_status_full_constellation_fits() {
        let status = SvStatus {
            svs: vec![
                SvInfo {
                    prn: 1,
                    snr: 0.0,
                    elevation: 0.0,
                    azimuth: 0.0
                };
                MAX_SVS
            ],
            ..SvStatus::default()
        };

        let mut payload = Payload::new();
        status.encode(&mut payload.writer()).unwrap();
        assert_eq!(
            SvStatus::decode(&mut payload.reader()).unwrap().svs.len(),
            MAX_SVS
        );
    }

    #[test]
    fn sv_status_rejects_oversized_count() {
        let status = SvStatus {
            svs: vec![
                SvInfo {
                    prn: 1,
                    snr: 0.0,
                    elevation: 0.0,
                    azimuth: 0.0
                };
                MAX_SVS + 1
            ],
            ..SvStatus::default()
        };

        let mut payload = Payload::new();
        assert!(matches!(
            status.encode(&mut payload.writer()),
            Err(WireError::InvalidField { .. })
        ));

        let mut forged = Payload::new();
        forged.writer().put_u32(MAX_SVS as u32 + 1).unwrap();
        assert!(matches!(
            SvStatus::decode(&mut forged.reader()),
            Err(WireError::InvalidField { .. })
        ));
    }

    #[test]
    fn ni_notification_roundtrip() {
        let notification = NiNotification {
            notification_id: 42,
            kind: NiType::UmtsSupl,
            flags: ni_flags::NEED_NOTIFY | ni_flags::NEED_VERIFY,
            timeout: 30,
            default_response: NiUserResponse::NoResponse,
            requestor_id: "+15551234567".to_string(),
            text: "Location request".to_string(),
            requestor_id_encoding: NiEncoding::SuplUtf8,
            text_encoding: NiEncoding::SuplUtf8,
            extras: String::new(),
        };

        let mut payload = Payload::new();
        notification.encode(&mut payload.writer()).unwrap();
        let decoded = NiNotification::decode(&mut payload.reader()).unwrap();
        assert_eq!(decoded, notification);
    }

    #[test]
    fn agps_status_roundtrip() {
        let status = AgpsStatus {
            kind: AgpsType::Supl,
            state: AgpsState::RequestConn,
        };

        let mut payload = Payload::new();
        status.encode(&mut payload.writer()).unwrap();
        assert_eq!(AgpsStatus::decode(&mut payload.reader()).unwrap(), status);
    }

    #[test]
    fn ref_location_roundtrip() {
        for reference in [
            RefLocation::GsmCellId {
                mcc: 248,
                mnc: 1,
                lac: 0x1234,
                cid: 0x5678_9ABC,
            },
            RefLocation::UmtsCellId {
                mcc: 248,
                mnc: 2,
                lac: 0x4321,
                cid: 7,
            },
            RefLocation::Mac([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]),
        ] {
            let mut payload = Payload::new();
            reference.encode(&mut payload.writer()).unwrap();
            assert_eq!(
                RefLocation::decode(&mut payload.reader()).unwrap(),
                reference
            );
        }
    }

    #[test]
    fn out_of_range_enum_values_are_wire_errors() {
        assert!(matches!(
            EngineStatus::from_wire(99),
            Err(WireError::InvalidField { .. })
        ));
        assert!(matches!(
            PositionMode::from_wire(17),
            Err(WireError::InvalidField { .. })
        ));
        assert!(matches!(
            AgpsType::from_wire(0),
            Err(WireError::InvalidField { .. })
        ));
        assert!(matches!(
            NiUserResponse::from_wire(0),
            Err(WireError::InvalidField { .. })
        ));
        assert!(matches!(
            NiEncoding::from_wire(-2),
            Err(WireError::InvalidField { .. })
        ));

        let mut forged = Payload::new();
        forged.writer().put_u16(9).unwrap();
        assert!(matches!(
            RefLocation::decode(&mut forged.reader()),
            Err(WireError::InvalidField { .. })
        ));
    }

    #[test]
    fn engine_status_wire_values_are_stable() {
        for (status, wire) in [
            (EngineStatus::None, 0u16),
            (EngineStatus::SessionBegin, 1),
            (EngineStatus::SessionEnd, 2),
            (EngineStatus::EngineOn, 3),
            (EngineStatus::EngineOff, 4),
        ] {
            assert_eq!(status.to_wire(), wire);
            assert_eq!(EngineStatus::from_wire(wire).unwrap(), status);
        }
    }
}
