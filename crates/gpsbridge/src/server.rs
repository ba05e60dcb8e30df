//! Server side of the bridge.
//!
//! Accepts one client at a time. Each accepted session gets a fresh vendor
//! instance from the factory ("load"), a [`VendorDispatch`] that decodes
//! call frames and drives the vendor, and forwarding event handlers that
//! turn vendor callbacks into fire-and-forget frames. When the session
//! closes the vendor instance is dropped ("unload") and the server returns
//! to accepting.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gpsbridge_hal::error::result_to_status;
use gpsbridge_hal::{
    schema, AgpsEvents, CapabilityName, EngineStatus, Extension, GpsEvents, GpsVendor, HalResult,
    Location, NiEvents, NiNotification, RefLocation, RilEvents, SvStatus, XtraEvents,
};
use gpsbridge_session::{
    Dispatch, Result as SessionResult, SessionConfig, SessionHandle, SessionListener,
};
use gpsbridge_transport::DEFAULT_SOCKET_PATH;
use gpsbridge_wire::{CodeKind, Frame, OpCode, Payload, PayloadWriter};
use tracing::{debug, error, info, warn};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            session: SessionConfig::default(),
        }
    }
}

/// Produces a vendor instance per client session.
///
/// Dynamic loading of a real vendor module lives behind this boundary; the
/// bridge only ever sees the trait object.
pub type VendorFactory = dyn Fn() -> HalResult<Arc<dyn GpsVendor>> + Send + Sync;

/// The serving half of the bridge.
pub struct Server {
    listener: SessionListener,
}

impl Server {
    /// Bind the well-known socket.
    pub fn bind(config: &ServerConfig) -> SessionResult<Self> {
        let listener =
            SessionListener::bind(&config.socket_path)?.with_config(config.session.clone());
        Ok(Self { listener })
    }

    /// Bound socket path.
    pub fn path(&self) -> &Path {
        self.listener.path()
    }

    /// Accept one client and serve it to completion with the given vendor.
    pub fn serve_client(&self, vendor: Arc<dyn GpsVendor>) -> SessionResult<()> {
        let session = self.listener.accept()?;
        let dispatch = Arc::new(VendorDispatch::new(vendor, session.handle()));
        session.start(dispatch)?;
        session.wait();
        Ok(())
    }

    /// Accept-serve loop: one client at a time, a fresh vendor instance per
    /// session, until `running` goes false.
    pub fn run(&self, make_vendor: &VendorFactory, running: &AtomicBool) -> SessionResult<()> {
        info!(path = ?self.path(), "positioning proxy serving");
        while running.load(Ordering::SeqCst) {
            let vendor = match make_vendor() {
                Ok(vendor) => vendor,
                Err(err) => {
                    error!(%err, "vendor module failed to load");
                    return Ok(());
                }
            };
            self.serve_client(vendor)?;
            info!("client session ended; ready for next client");
        }
        Ok(())
    }
}

/// Server-side dispatch policy: decode the call, drive the vendor, reply
/// with the status. Events never originate here — they come from the vendor
/// through the forwarders installed at init.
pub struct VendorDispatch {
    vendor: Arc<dyn GpsVendor>,
    handle: SessionHandle,
}

impl VendorDispatch {
    pub fn new(vendor: Arc<dyn GpsVendor>, handle: SessionHandle) -> Self {
        Self { vendor, handle }
    }

    fn status_reply(&self, code: u32, status: i32) -> Option<Frame> {
        let mut payload = Payload::new();
        if let Err(err) = schema::encode_status(&mut payload.writer(), status) {
            error!(%err, "failed to encode status reply");
            return None;
        }
        Some(Frame { code, payload })
    }

    /// Ask the client to provision the worker for a category before its
    /// first event can arrive.
    fn request_worker(&self, op: OpCode) {
        if let Err(err) = self.handle.send(Frame::new(op)) {
            warn!(code = op.name(), %err, "failed to request client worker");
        }
    }

    fn execute(&self, op: OpCode, frame: &Frame) -> gpsbridge_wire::Result<i32> {
        let vendor = &*self.vendor;
        let mut r = frame.payload.reader();
        let status = match op {
            OpCode::Nop => 0,
            // The vendor instance was constructed when this session was
            // accepted; open confirms it is there.
            OpCode::Open => 0,

            OpCode::GetExtension => {
                let name = r.get_str()?;
                match CapabilityName::from_str(&name) {
                    Some(CapabilityName::Gps) => 0,
                    Some(name) if vendor.extension(name).is_some() => 0,
                    Some(name) => {
                        debug!(capability = %name, "vendor does not offer capability");
                        -1
                    }
                    None => {
                        debug!(capability = %name, "unknown capability name");
                        -1
                    }
                }
            }

            OpCode::GpsInit => {
                self.request_worker(OpCode::GpsSpawnWorker);
                result_to_status(vendor.gps().init(Arc::new(GpsForwarder {
                    handle: self.handle.clone(),
                })))
            }
            OpCode::GpsStart => result_to_status(vendor.gps().start()),
            OpCode::GpsStop => result_to_status(vendor.gps().stop()),
            OpCode::GpsCleanup => {
                vendor.gps().cleanup();
                0
            }
            OpCode::GpsInjectTime => {
                let (utc_ms, reference_ms, uncertainty_ms) = schema::decode_inject_time(&mut r)?;
                result_to_status(vendor.gps().inject_time(utc_ms, reference_ms, uncertainty_ms))
            }
            OpCode::GpsInjectLocation => {
                let (latitude, longitude, accuracy) = schema::decode_inject_location(&mut r)?;
                result_to_status(vendor.gps().inject_location(latitude, longitude, accuracy))
            }
            OpCode::GpsDeleteAidingData => {
                let flags = r.get_u16()?;
                vendor.gps().delete_aiding_data(flags);
                0
            }
            OpCode::GpsSetPositionMode => {
                let (mode, recurrence, min_interval, accuracy, time) =
                    schema::decode_position_mode(&mut r)?;
                result_to_status(vendor.gps().set_position_mode(
                    mode,
                    recurrence,
                    min_interval,
                    accuracy,
                    time,
                ))
            }

            OpCode::XtraInit => match vendor.extension(CapabilityName::Xtra) {
                Some(Extension::Xtra(xtra)) => {
                    self.request_worker(OpCode::XtraSpawnWorker);
                    result_to_status(xtra.init(Arc::new(XtraForwarder {
                        handle: self.handle.clone(),
                    })))
                }
                _ => missing_capability(CapabilityName::Xtra),
            },
            OpCode::XtraInjectData => match vendor.extension(CapabilityName::Xtra) {
                Some(Extension::Xtra(xtra)) => {
                    let data = r.get_bytes()?;
                    result_to_status(xtra.inject_data(&data))
                }
                _ => missing_capability(CapabilityName::Xtra),
            },

            OpCode::AgpsInit => match vendor.extension(CapabilityName::Agps) {
                Some(Extension::Agps(agps)) => {
                    self.request_worker(OpCode::AgpsSpawnWorker);
                    result_to_status(agps.init(Arc::new(AgpsForwarder {
                        handle: self.handle.clone(),
                    })))
                }
                _ => missing_capability(CapabilityName::Agps),
            },
            OpCode::AgpsDataConnOpen => match vendor.extension(CapabilityName::Agps) {
                Some(Extension::Agps(agps)) => {
                    let apn = r.get_str()?;
                    result_to_status(agps.data_conn_open(&apn))
                }
                _ => missing_capability(CapabilityName::Agps),
            },
            OpCode::AgpsDataConnClosed => match vendor.extension(CapabilityName::Agps) {
                Some(Extension::Agps(agps)) => result_to_status(agps.data_conn_closed()),
                _ => missing_capability(CapabilityName::Agps),
            },
            OpCode::AgpsDataConnFailed => match vendor.extension(CapabilityName::Agps) {
                Some(Extension::Agps(agps)) => result_to_status(agps.data_conn_failed()),
                _ => missing_capability(CapabilityName::Agps),
            },
            OpCode::AgpsSetServer => match vendor.extension(CapabilityName::Agps) {
                Some(Extension::Agps(agps)) => {
                    let (kind, port, hostname) = schema::decode_set_server(&mut r)?;
                    result_to_status(agps.set_server(kind, &hostname, port))
                }
                _ => missing_capability(CapabilityName::Agps),
            },

            OpCode::NiInit => match vendor.extension(CapabilityName::Ni) {
                Some(Extension::Ni(ni)) => {
                    self.request_worker(OpCode::NiSpawnWorker);
                    result_to_status(ni.init(Arc::new(NiForwarder {
                        handle: self.handle.clone(),
                    })))
                }
                _ => missing_capability(CapabilityName::Ni),
            },
            OpCode::NiRespond => match vendor.extension(CapabilityName::Ni) {
                Some(Extension::Ni(ni)) => {
                    let (notification_id, response) = schema::decode_ni_respond(&mut r)?;
                    result_to_status(ni.respond(notification_id, response))
                }
                _ => missing_capability(CapabilityName::Ni),
            },

            OpCode::RilInit => match vendor.extension(CapabilityName::Ril) {
                Some(Extension::Ril(ril)) => {
                    self.request_worker(OpCode::RilSpawnWorker);
                    result_to_status(ril.init(Arc::new(RilForwarder {
                        handle: self.handle.clone(),
                    })))
                }
                _ => missing_capability(CapabilityName::Ril),
            },
            OpCode::RilSetRefLocation => match vendor.extension(CapabilityName::Ril) {
                Some(Extension::Ril(ril)) => {
                    let location = RefLocation::decode(&mut r)?;
                    result_to_status(ril.set_ref_location(&location))
                }
                _ => missing_capability(CapabilityName::Ril),
            },
            OpCode::RilSetSetId => match vendor.extension(CapabilityName::Ril) {
                Some(Extension::Ril(ril)) => {
                    let (kind, set_id) = schema::decode_set_id(&mut r)?;
                    result_to_status(ril.set_set_id(kind, &set_id))
                }
                _ => missing_capability(CapabilityName::Ril),
            },
            OpCode::RilNiMessage => match vendor.extension(CapabilityName::Ril) {
                Some(Extension::Ril(ril)) => {
                    let message = r.get_bytes()?;
                    result_to_status(ril.ni_message(&message))
                }
                _ => missing_capability(CapabilityName::Ril),
            },
            OpCode::RilUpdateNetworkState => match vendor.extension(CapabilityName::Ril) {
                Some(Extension::Ril(ril)) => {
                    let (connected, kind, roaming, extra) = schema::decode_network_state(&mut r)?;
                    result_to_status(ril.update_network_state(connected, kind, roaming, &extra))
                }
                _ => missing_capability(CapabilityName::Ril),
            },
            OpCode::RilUpdateNetworkAvailability => match vendor.extension(CapabilityName::Ril) {
                Some(Extension::Ril(ril)) => {
                    let (available, apn) = schema::decode_network_availability(&mut r)?;
                    result_to_status(ril.update_network_availability(available, &apn))
                }
                _ => missing_capability(CapabilityName::Ril),
            },

            // Events and worker requests flow server -> client only.
            other => {
                warn!(code = other.name(), "event-style frame on serving side; dropping");
                return Err(gpsbridge_wire::WireError::UnknownCode(other.as_u32()));
            }
        };
        Ok(status)
    }
}

fn missing_capability(name: CapabilityName) -> i32 {
    warn!(capability = %name, "call for capability the vendor does not offer");
    -1
}

impl Dispatch for VendorDispatch {
    fn dispatch(&self, frame: Frame) -> Option<Frame> {
        let op = match frame.opcode() {
            Ok(op) => op,
            Err(_) => {
                // Unknown call-style codes get a generic failure so the
                // caller unblocks; unknown fire-and-forget codes are dropped.
                warn!(code = frame.code, "unknown operation code");
                return match frame.kind() {
                    CodeKind::Call | CodeKind::Nop => self.status_reply(frame.code, -1),
                    _ => None,
                };
            }
        };

        debug!(code = op.name(), "dispatching request");
        match op.kind() {
            CodeKind::Call | CodeKind::Nop => match self.execute(op, &frame) {
                Ok(status) => self.status_reply(frame.code, status),
                Err(err) => {
                    warn!(code = op.name(), %err, "malformed request payload");
                    self.status_reply(frame.code, -1)
                }
            },
            _ => {
                warn!(code = op.name(), "event-style frame on serving side; dropping");
                None
            }
        }
    }
}

// Forwarding event handlers, installed into the vendor at init. Each one
// packs the event and sends it fire-and-forget; a dead link drops events
// with a warning until teardown finishes.

fn forward_event(
    handle: &SessionHandle,
    op: OpCode,
    fill: impl FnOnce(&mut PayloadWriter<'_>) -> gpsbridge_wire::Result<()>,
) {
    let mut payload = Payload::new();
    if let Err(err) = fill(&mut payload.writer()) {
        warn!(code = op.name(), %err, "failed to encode event; dropping");
        return;
    }
    if let Err(err) = handle.send(Frame::with_payload(op, payload)) {
        warn!(code = op.name(), %err, "failed to forward event");
    }
}

struct GpsForwarder {
    handle: SessionHandle,
}

impl GpsEvents for GpsForwarder {
    fn location(&self, location: &Location) {
        forward_event(&self.handle, OpCode::GpsLocation, |w| location.encode(w));
    }

    fn status(&self, status: EngineStatus) {
        forward_event(&self.handle, OpCode::GpsStatus, |w| {
            w.put_u16(status.to_wire())
        });
    }

    fn sv_status(&self, status: &SvStatus) {
        forward_event(&self.handle, OpCode::GpsSvStatus, |w| status.encode(w));
    }

    fn nmea(&self, utc_ms: i64, sentence: &[u8]) {
        forward_event(&self.handle, OpCode::GpsNmea, |w| {
            schema::encode_nmea(w, utc_ms, sentence)
        });
    }

    fn set_capabilities(&self, capabilities: u32) {
        forward_event(&self.handle, OpCode::GpsSetCapabilities, |w| {
            w.put_u32(capabilities)
        });
    }

    fn acquire_wakelock(&self) {
        forward_event(&self.handle, OpCode::GpsAcquireWakelock, |_w| Ok(()));
    }

    fn release_wakelock(&self) {
        forward_event(&self.handle, OpCode::GpsReleaseWakelock, |_w| Ok(()));
    }

    fn request_utc_time(&self) {
        forward_event(&self.handle, OpCode::GpsRequestUtcTime, |_w| Ok(()));
    }
}

struct XtraForwarder {
    handle: SessionHandle,
}

impl XtraEvents for XtraForwarder {
    fn download_request(&self) {
        forward_event(&self.handle, OpCode::XtraDownloadRequest, |_w| Ok(()));
    }
}

struct AgpsForwarder {
    handle: SessionHandle,
}

impl AgpsEvents for AgpsForwarder {
    fn status(&self, status: &gpsbridge_hal::AgpsStatus) {
        forward_event(&self.handle, OpCode::AgpsStatus, |w| status.encode(w));
    }
}

struct NiForwarder {
    handle: SessionHandle,
}

impl NiEvents for NiForwarder {
    fn notify(&self, notification: &NiNotification) {
        forward_event(&self.handle, OpCode::NiNotify, |w| notification.encode(w));
    }
}

struct RilForwarder {
    handle: SessionHandle,
}

impl RilEvents for RilForwarder {
    fn request_set_id(&self, flags: u32) {
        forward_event(&self.handle, OpCode::RilRequestSetId, |w| w.put_u32(flags));
    }

    fn request_ref_location(&self, flags: u32) {
        forward_event(&self.handle, OpCode::RilRequestRefLocation, |w| {
            w.put_u32(flags)
        });
    }
}
