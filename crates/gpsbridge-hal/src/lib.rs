//! Positioning data model and capability abstraction.
//!
//! The vendor side of the bridge implements [`GpsVendor`]; the client side
//! exposes the same traits backed by the RPC link, so callers cannot tell a
//! proxied implementation from a local one. Every value that crosses the
//! link has an explicit field-by-field wire schema here — both ends encode
//! and decode with the same functions, which is what keeps the schemaless
//! protocol byte-agreed.

pub mod capability;
pub mod error;
pub mod events;
pub mod schema;
pub mod types;

pub use capability::{
    AgpsInterface, CapabilityName, Extension, GpsInterface, GpsVendor, NiInterface, RilInterface,
    XtraInterface,
};
pub use error::{HalError, HalResult};
pub use events::{AgpsEvents, GpsEvents, NiEvents, RilEvents, XtraEvents};
pub use types::{
    AgpsState, AgpsStatus, AgpsType, EngineStatus, Location, NiEncoding, NiNotification, NiType,
    NiUserResponse, PositionMode, Recurrence, RefLocation, SetIdType, SvInfo, SvStatus, MAX_SVS,
};
