//! Capability abstraction.
//!
//! A vendor implementation is one [`GpsVendor`]: the core interface is
//! always present, everything else is an extension looked up by name. The
//! client-side proxy implements the same traits, which is what makes the
//! bridge transparent to its caller.

use std::sync::Arc;

use crate::error::HalResult;
use crate::events::{AgpsEvents, GpsEvents, NiEvents, RilEvents, XtraEvents};
use crate::types::{
    AgpsType, NiUserResponse, PositionMode, Recurrence, RefLocation, SetIdType,
};

/// Names of the optional capabilities, as used in extension lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityName {
    /// Core positioning.
    Gps,
    /// Supplementary assistance data (XTRA).
    Xtra,
    /// Network-assisted positioning (AGPS).
    Agps,
    /// Network-initiated sessions.
    Ni,
    /// Network reference information (RIL).
    Ril,
}

impl CapabilityName {
    /// The lookup string, kept compatible with the classic HAL extension names.
    pub fn as_str(self) -> &'static str {
        match self {
            CapabilityName::Gps => "gps",
            CapabilityName::Xtra => "gps-xtra",
            CapabilityName::Agps => "agps",
            CapabilityName::Ni => "gps-ni",
            CapabilityName::Ril => "agps_ril",
        }
    }

    pub fn from_str(name: &str) -> Option<Self> {
        Some(match name {
            "gps" => CapabilityName::Gps,
            "gps-xtra" => CapabilityName::Xtra,
            "agps" => CapabilityName::Agps,
            "gps-ni" => CapabilityName::Ni,
            "agps_ril" => CapabilityName::Ril,
            _ => return None,
        })
    }

    /// The optional extensions, in probe order.
    pub const EXTENSIONS: [CapabilityName; 4] = [
        CapabilityName::Xtra,
        CapabilityName::Agps,
        CapabilityName::Ni,
        CapabilityName::Ril,
    ];
}

impl std::fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core positioning operations.
pub trait GpsInterface: Send + Sync {
    /// Install the event handler set and bring the engine up.
    fn init(&self, events: Arc<dyn GpsEvents>) -> HalResult<()>;
    fn start(&self) -> HalResult<()>;
    fn stop(&self) -> HalResult<()>;
    /// Bring the engine down; the handler set installed by `init` is dropped.
    fn cleanup(&self);
    fn inject_time(
        &self,
        utc_ms: i64,
        reference_ms: i64,
        uncertainty_ms: i32,
    ) -> HalResult<()>;
    fn inject_location(&self, latitude: f64, longitude: f64, accuracy: f32) -> HalResult<()>;
    /// `flags` are `types::aiding` bits.
    fn delete_aiding_data(&self, flags: u16);
    fn set_position_mode(
        &self,
        mode: PositionMode,
        recurrence: Recurrence,
        min_interval_ms: u32,
        preferred_accuracy_m: u32,
        preferred_time_ms: u32,
    ) -> HalResult<()>;
}

/// Supplementary assistance data (XTRA) operations.
pub trait XtraInterface: Send + Sync {
    fn init(&self, events: Arc<dyn XtraEvents>) -> HalResult<()>;
    fn inject_data(&self, data: &[u8]) -> HalResult<()>;
}

/// Network-assisted positioning (AGPS) operations.
pub trait AgpsInterface: Send + Sync {
    fn init(&self, events: Arc<dyn AgpsEvents>) -> HalResult<()>;
    fn data_conn_open(&self, apn: &str) -> HalResult<()>;
    fn data_conn_closed(&self) -> HalResult<()>;
    fn data_conn_failed(&self) -> HalResult<()>;
    fn set_server(&self, kind: AgpsType, hostname: &str, port: i32) -> HalResult<()>;
}

/// Network-initiated session operations.
pub trait NiInterface: Send + Sync {
    fn init(&self, events: Arc<dyn NiEvents>) -> HalResult<()>;
    fn respond(&self, notification_id: i32, response: NiUserResponse) -> HalResult<()>;
}

/// Network-reference (RIL) operations.
pub trait RilInterface: Send + Sync {
    fn init(&self, events: Arc<dyn RilEvents>) -> HalResult<()>;
    fn set_ref_location(&self, location: &RefLocation) -> HalResult<()>;
    fn set_set_id(&self, kind: SetIdType, set_id: &str) -> HalResult<()>;
    fn ni_message(&self, message: &[u8]) -> HalResult<()>;
    fn update_network_state(
        &self,
        connected: bool,
        kind: i32,
        roaming: bool,
        extra_info: &str,
    ) -> HalResult<()>;
    fn update_network_availability(&self, available: bool, apn: &str) -> HalResult<()>;
}

/// One optional capability resolved by extension lookup.
pub enum Extension<'a> {
    Xtra(&'a dyn XtraInterface),
    Agps(&'a dyn AgpsInterface),
    Ni(&'a dyn NiInterface),
    Ril(&'a dyn RilInterface),
}

/// A loaded vendor implementation.
///
/// Consumed interface: gpsbridge drives it, it never implements it against
/// real hardware. The client proxy also implements this trait, backed by the
/// RPC link.
pub trait GpsVendor: Send + Sync {
    /// The core interface; always present.
    fn gps(&self) -> &dyn GpsInterface;

    /// Look up an optional capability by name. `None` means the vendor does
    /// not offer it.
    fn extension(&self, name: CapabilityName) -> Option<Extension<'_>>;
}
