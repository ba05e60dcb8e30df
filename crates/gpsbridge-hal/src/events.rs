//! Event handler traits.
//!
//! A capability's `init` installs one of these sets; the vendor (or the
//! bridge, on the client side) invokes it asynchronously. Handlers for one
//! set are never invoked concurrently with each other — delivery is
//! serialized per capability — so implementations need no reentrancy.

use crate::types::{AgpsStatus, EngineStatus, Location, NiNotification, SvStatus};

/// Core positioning events.
pub trait GpsEvents: Send + Sync {
    fn location(&self, location: &Location);
    fn status(&self, status: EngineStatus);
    fn sv_status(&self, status: &SvStatus);
    /// A raw NMEA sentence with its receiver timestamp.
    fn nmea(&self, utc_ms: i64, sentence: &[u8]);
    /// `types::capabilities` bits.
    fn set_capabilities(&self, capabilities: u32);
    fn acquire_wakelock(&self);
    fn release_wakelock(&self);
    fn request_utc_time(&self);
}

/// Supplementary-data (XTRA) events.
pub trait XtraEvents: Send + Sync {
    /// The engine wants fresh assistance data downloaded and injected.
    fn download_request(&self);
}

/// Network-assistance (AGPS) events.
pub trait AgpsEvents: Send + Sync {
    fn status(&self, status: &AgpsStatus);
}

/// Network-initiated session events.
pub trait NiEvents: Send + Sync {
    fn notify(&self, notification: &NiNotification);
}

/// Network-reference (RIL) events.
pub trait RilEvents: Send + Sync {
    fn request_set_id(&self, flags: u32);
    fn request_ref_location(&self, flags: u32);
}
