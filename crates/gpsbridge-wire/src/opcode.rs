//! Operation codes.
//!
//! The code space is partitioned into four ranges:
//! - `0` — reserved no-op/diagnostic code
//! - `1..100` — interface calls (client → server, expect a reply)
//! - `100..200` — callback events (server → client, fire-and-forget)
//! - `200..300` — worker-provisioning requests (server → client,
//!   fire-and-forget, precede the first event of a category)
//!
//! Codes are stable for the lifetime of a session. An integer outside the
//! known set is a protocol-level condition handled by the dispatcher, never
//! a crash.

use crate::error::WireError;

const CALL_START: u32 = 1;
const EVENT_START: u32 = 100;
const SPAWN_START: u32 = 200;
const SPAWN_END: u32 = 300;

/// Every operation the link understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OpCode {
    /// Reserved diagnostic code; a server answers it with an empty success reply.
    Nop = 0,

    // Interface calls.
    Open = 1,
    GpsInit = 2,
    GpsStart = 3,
    GpsStop = 4,
    GpsCleanup = 5,
    GpsInjectTime = 6,
    GpsInjectLocation = 7,
    GpsDeleteAidingData = 8,
    GpsSetPositionMode = 9,
    GetExtension = 10,
    XtraInit = 11,
    XtraInjectData = 12,
    AgpsInit = 13,
    AgpsDataConnOpen = 14,
    AgpsDataConnClosed = 15,
    AgpsDataConnFailed = 16,
    AgpsSetServer = 17,
    NiInit = 18,
    NiRespond = 19,
    RilInit = 20,
    RilSetRefLocation = 21,
    RilSetSetId = 22,
    RilNiMessage = 23,
    RilUpdateNetworkState = 24,
    RilUpdateNetworkAvailability = 25,

    // Callback events.
    GpsLocation = 100,
    GpsStatus = 101,
    GpsSvStatus = 102,
    GpsNmea = 103,
    GpsSetCapabilities = 104,
    GpsAcquireWakelock = 105,
    GpsReleaseWakelock = 106,
    GpsRequestUtcTime = 107,
    XtraDownloadRequest = 108,
    AgpsStatus = 109,
    NiNotify = 110,
    RilRequestSetId = 111,
    RilRequestRefLocation = 112,

    // Worker-provisioning requests.
    GpsSpawnWorker = 200,
    XtraSpawnWorker = 201,
    AgpsSpawnWorker = 202,
    NiSpawnWorker = 203,
    RilSpawnWorker = 204,
}

/// Which range a raw code falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    /// Reserved no-op/diagnostic code.
    Nop,
    /// Client → server, expects a correlated reply.
    Call,
    /// Server → client event, fire-and-forget.
    Event,
    /// Server → client worker-provisioning request, fire-and-forget.
    SpawnWorker,
    /// Outside every defined range.
    Unknown,
}

impl CodeKind {
    /// Classify a raw wire code by range. Works for codes outside the known
    /// set, so dispatch policy can decide how to answer them.
    pub fn classify(code: u32) -> Self {
        match code {
            0 => CodeKind::Nop,
            c if (CALL_START..EVENT_START).contains(&c) => CodeKind::Call,
            c if (EVENT_START..SPAWN_START).contains(&c) => CodeKind::Event,
            c if (SPAWN_START..SPAWN_END).contains(&c) => CodeKind::SpawnWorker,
            _ => CodeKind::Unknown,
        }
    }

    /// Whether a frame with this kind completes a pending synchronous call.
    pub fn is_reply_style(self) -> bool {
        matches!(self, CodeKind::Call | CodeKind::Nop)
    }
}

/// Callback delivery category. One queue and one worker thread each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Core positioning events (fixes, status, NMEA, capabilities).
    Gps,
    /// Supplementary-data (XTRA) events.
    Xtra,
    /// Network-assistance (AGPS) events.
    Agps,
    /// Network-initiated notification events.
    Ni,
    /// Network-reference (RIL) events.
    Ril,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Gps,
        Category::Xtra,
        Category::Agps,
        Category::Ni,
        Category::Ril,
    ];

    /// Stable index for per-category storage.
    pub fn index(self) -> usize {
        match self {
            Category::Gps => 0,
            Category::Xtra => 1,
            Category::Agps => 2,
            Category::Ni => 3,
            Category::Ril => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Gps => "gps",
            Category::Xtra => "xtra",
            Category::Agps => "agps",
            Category::Ni => "ni",
            Category::Ril => "ril",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl OpCode {
    /// Decode a raw wire code.
    pub fn from_u32(code: u32) -> Result<Self, WireError> {
        use OpCode::*;
        let op = match code {
            0 => Nop,
            1 => Open,
            2 => GpsInit,
            3 => GpsStart,
            4 => GpsStop,
            5 => GpsCleanup,
            6 => GpsInjectTime,
            7 => GpsInjectLocation,
            8 => GpsDeleteAidingData,
            9 => GpsSetPositionMode,
            10 => GetExtension,
            11 => XtraInit,
            12 => XtraInjectData,
            13 => AgpsInit,
            14 => AgpsDataConnOpen,
            15 => AgpsDataConnClosed,
            16 => AgpsDataConnFailed,
            17 => AgpsSetServer,
            18 => NiInit,
            19 => NiRespond,
            20 => RilInit,
            21 => RilSetRefLocation,
            22 => RilSetSetId,
            23 => RilNiMessage,
            24 => RilUpdateNetworkState,
            25 => RilUpdateNetworkAvailability,
            100 => GpsLocation,
            101 => GpsStatus,
            102 => GpsSvStatus,
            103 => GpsNmea,
            104 => GpsSetCapabilities,
            105 => GpsAcquireWakelock,
            106 => GpsReleaseWakelock,
            107 => GpsRequestUtcTime,
            108 => XtraDownloadRequest,
            109 => AgpsStatus,
            110 => NiNotify,
            111 => RilRequestSetId,
            112 => RilRequestRefLocation,
            200 => GpsSpawnWorker,
            201 => XtraSpawnWorker,
            202 => AgpsSpawnWorker,
            203 => NiSpawnWorker,
            204 => RilSpawnWorker,
            other => return Err(WireError::UnknownCode(other)),
        };
        Ok(op)
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn kind(self) -> CodeKind {
        CodeKind::classify(self as u32)
    }

    /// The delivery category for event and worker-provisioning codes.
    pub fn category(self) -> Option<Category> {
        use OpCode::*;
        let cat = match self {
            GpsLocation | GpsStatus | GpsSvStatus | GpsNmea | GpsSetCapabilities
            | GpsAcquireWakelock | GpsReleaseWakelock | GpsRequestUtcTime | GpsSpawnWorker => {
                Category::Gps
            }
            XtraDownloadRequest | XtraSpawnWorker => Category::Xtra,
            AgpsStatus | AgpsSpawnWorker => Category::Agps,
            NiNotify | NiSpawnWorker => Category::Ni,
            RilRequestSetId | RilRequestRefLocation | RilSpawnWorker => Category::Ril,
            _ => return None,
        };
        Some(cat)
    }

    /// Diagnostic name, mirrored in log output on both ends.
    pub fn name(self) -> &'static str {
        use OpCode::*;
        match self {
            Nop => "NOP",
            Open => "OPEN",
            GpsInit => "GPS_INIT",
            GpsStart => "GPS_START",
            GpsStop => "GPS_STOP",
            GpsCleanup => "GPS_CLEANUP",
            GpsInjectTime => "GPS_INJECT_TIME",
            GpsInjectLocation => "GPS_INJECT_LOCATION",
            GpsDeleteAidingData => "GPS_DELETE_AIDING_DATA",
            GpsSetPositionMode => "GPS_SET_POSITION_MODE",
            GetExtension => "GET_EXTENSION",
            XtraInit => "XTRA_INIT",
            XtraInjectData => "XTRA_INJECT_DATA",
            AgpsInit => "AGPS_INIT",
            AgpsDataConnOpen => "AGPS_DATA_CONN_OPEN",
            AgpsDataConnClosed => "AGPS_DATA_CONN_CLOSED",
            AgpsDataConnFailed => "AGPS_DATA_CONN_FAILED",
            AgpsSetServer => "AGPS_SET_SERVER",
            NiInit => "NI_INIT",
            NiRespond => "NI_RESPOND",
            RilInit => "RIL_INIT",
            RilSetRefLocation => "RIL_SET_REF_LOCATION",
            RilSetSetId => "RIL_SET_SET_ID",
            RilNiMessage => "RIL_NI_MESSAGE",
            RilUpdateNetworkState => "RIL_UPDATE_NETWORK_STATE",
            RilUpdateNetworkAvailability => "RIL_UPDATE_NETWORK_AVAILABILITY",
            GpsLocation => "GPS_LOCATION_CB",
            GpsStatus => "GPS_STATUS_CB",
            GpsSvStatus => "GPS_SV_STATUS_CB",
            GpsNmea => "GPS_NMEA_CB",
            GpsSetCapabilities => "GPS_SET_CAPABILITIES_CB",
            GpsAcquireWakelock => "GPS_ACQUIRE_WAKELOCK_CB",
            GpsReleaseWakelock => "GPS_RELEASE_WAKELOCK_CB",
            GpsRequestUtcTime => "GPS_REQUEST_UTC_TIME_CB",
            XtraDownloadRequest => "XTRA_DOWNLOAD_REQUEST_CB",
            AgpsStatus => "AGPS_STATUS_CB",
            NiNotify => "NI_NOTIFY_CB",
            RilRequestSetId => "RIL_REQUEST_SET_ID_CB",
            RilRequestRefLocation => "RIL_REQUEST_REF_LOCATION_CB",
            GpsSpawnWorker => "GPS_SPAWN_WORKER",
            XtraSpawnWorker => "XTRA_SPAWN_WORKER",
            AgpsSpawnWorker => "AGPS_SPAWN_WORKER",
            NiSpawnWorker => "NI_SPAWN_WORKER",
            RilSpawnWorker => "RIL_SPAWN_WORKER",
        }
    }
}
