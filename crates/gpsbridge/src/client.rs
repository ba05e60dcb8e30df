//! Client side of the bridge.
//!
//! [`open`] establishes the session and returns a [`RemoteGps`] implementing
//! the same capability traits a local vendor would, so the host's plugin
//! loader cannot tell the difference. Calls pack their arguments and block
//! for the status reply; events arrive on the session's read loop, get
//! routed to per-category workers and are decoded there into the handler
//! set the caller registered at init time.

use std::path::PathBuf;
use std::sync::Arc;

use gpsbridge_hal::error::{status_to_result, HalError};
use gpsbridge_hal::{
    schema, AgpsEvents, AgpsInterface, AgpsType, CapabilityName, EngineStatus, Extension,
    GpsEvents, GpsInterface, GpsVendor, HalResult, Location, NiEvents, NiInterface,
    NiNotification, NiUserResponse, PositionMode, Recurrence, RefLocation, RilEvents,
    RilInterface, SetIdType, SvStatus, XtraEvents, XtraInterface,
};
use gpsbridge_session::{
    connect, CallbackRouter, ConnectConfig, Dispatch, EventHandler, Session, SessionError,
    StopMode,
};
use gpsbridge_transport::DEFAULT_SOCKET_PATH;
use gpsbridge_wire::{Category, CodeKind, Frame, OpCode, Payload, PayloadWriter};
use tracing::{debug, warn};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub socket_path: PathBuf,
    pub connect: ConnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            connect: ConnectConfig::default(),
        }
    }
}

/// Errors from establishing the proxied interface.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connecting or talking to the server failed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// The server answered `open` with a failure status (vendor module did
    /// not come up).
    #[error("server rejected open (status {0})")]
    OpenRejected(i32),
}

/// Open the bridge: connect with bounded retries, confirm the vendor module
/// and probe which optional capabilities the server side offers.
pub fn open(config: ClientConfig) -> Result<RemoteGps, ClientError> {
    let session = connect(&config.socket_path, config.connect)?;
    let router = Arc::new(CallbackRouter::new());
    session.start(Arc::new(EventDispatch {
        router: Arc::clone(&router),
    }))?;

    let inner = Arc::new(ClientInner { session, router });

    let reply = inner.session.call(Frame::new(OpCode::Open))?;
    let status = schema::decode_status(&mut reply.payload.reader()).map_err(SessionError::from)?;
    if status != 0 {
        return Err(ClientError::OpenRejected(status));
    }

    let mut remote = RemoteGps {
        core: RemoteCore {
            inner: Arc::clone(&inner),
        },
        xtra: None,
        agps: None,
        ni: None,
        ril: None,
        inner: Arc::clone(&inner),
    };
    for name in CapabilityName::EXTENSIONS {
        if probe_extension(&inner, name)? {
            debug!(capability = %name, "server offers capability");
            match name {
                CapabilityName::Xtra => {
                    remote.xtra = Some(RemoteXtra {
                        inner: Arc::clone(&inner),
                    })
                }
                CapabilityName::Agps => {
                    remote.agps = Some(RemoteAgps {
                        inner: Arc::clone(&inner),
                    })
                }
                CapabilityName::Ni => {
                    remote.ni = Some(RemoteNi {
                        inner: Arc::clone(&inner),
                    })
                }
                CapabilityName::Ril => {
                    remote.ril = Some(RemoteRil {
                        inner: Arc::clone(&inner),
                    })
                }
                CapabilityName::Gps => {}
            }
        }
    }

    Ok(remote)
}

fn probe_extension(inner: &ClientInner, name: CapabilityName) -> Result<bool, ClientError> {
    let mut payload = Payload::new();
    payload
        .writer()
        .put_str(name.as_str())
        .map_err(SessionError::from)?;
    let reply = inner
        .session
        .call(Frame::with_payload(OpCode::GetExtension, payload))?;
    let status = schema::decode_status(&mut reply.payload.reader()).map_err(SessionError::from)?;
    Ok(status == 0)
}

struct ClientInner {
    session: Session,
    router: Arc<CallbackRouter>,
}

impl ClientInner {
    fn build_payload(
        &self,
        fill: impl FnOnce(&mut PayloadWriter<'_>) -> gpsbridge_wire::Result<()>,
    ) -> HalResult<Payload> {
        let mut payload = Payload::new();
        fill(&mut payload.writer()).map_err(link_error)?;
        Ok(payload)
    }

    /// Issue a call and interpret the status reply.
    fn call_status(&self, op: OpCode, payload: Payload) -> HalResult<()> {
        let reply = self
            .session
            .call(Frame::with_payload(op, payload))
            .map_err(link_error)?;
        let status = schema::decode_status(&mut reply.payload.reader()).map_err(link_error)?;
        status_to_result(status)
    }
}

/// Transport failures surface like any other vendor failure.
fn link_error(err: impl std::fmt::Display) -> HalError {
    HalError::Link(err.to_string())
}

/// Client-side dispatch policy: events go to their category queue, worker
/// provisioning requests spawn the category worker, nothing ever replies.
struct EventDispatch {
    router: Arc<CallbackRouter>,
}

impl Dispatch for EventDispatch {
    fn dispatch(&self, frame: Frame) -> Option<Frame> {
        match frame.kind() {
            CodeKind::Event => match frame.opcode().ok().and_then(|op| op.category()) {
                Some(category) => self.router.route(category, frame),
                None => warn!(code = frame.code, "unknown event code; dropping"),
            },
            CodeKind::SpawnWorker => match frame.opcode().ok().and_then(|op| op.category()) {
                Some(category) => {
                    self.router.provision(category);
                }
                None => warn!(code = frame.code, "unknown worker request; dropping"),
            },
            CodeKind::Call | CodeKind::Nop => {
                // No call is pending on this side; a server never issues one.
                warn!(
                    code = frame.code_name(),
                    "unexpected call-style frame; dropping"
                );
            }
            CodeKind::Unknown => {
                warn!(code = frame.code, "frame outside every code range; dropping");
            }
        }
        None
    }

    fn connection_closed(&self) {
        self.router.stop_all(StopMode::Drain);
    }
}

/// The proxied vendor interface returned by [`open`].
pub struct RemoteGps {
    inner: Arc<ClientInner>,
    core: RemoteCore,
    xtra: Option<RemoteXtra>,
    agps: Option<RemoteAgps>,
    ni: Option<RemoteNi>,
    ril: Option<RemoteRil>,
}

impl RemoteGps {
    /// Tear the session down. Also happens when the value is dropped.
    pub fn shutdown(&self) {
        self.inner.session.shutdown();
    }
}

impl GpsVendor for RemoteGps {
    fn gps(&self) -> &dyn GpsInterface {
        &self.core
    }

    fn extension(&self, name: CapabilityName) -> Option<Extension<'_>> {
        match name {
            CapabilityName::Gps => None,
            CapabilityName::Xtra => self.xtra.as_ref().map(|x| Extension::Xtra(x)),
            CapabilityName::Agps => self.agps.as_ref().map(|a| Extension::Agps(a)),
            CapabilityName::Ni => self.ni.as_ref().map(|n| Extension::Ni(n)),
            CapabilityName::Ril => self.ril.as_ref().map(|r| Extension::Ril(r)),
        }
    }
}

struct RemoteCore {
    inner: Arc<ClientInner>,
}

impl GpsInterface for RemoteCore {
    fn init(&self, events: Arc<dyn GpsEvents>) -> HalResult<()> {
        self.inner
            .router
            .register(Category::Gps, gps_event_shim(events));
        self.inner.call_status(OpCode::GpsInit, Payload::new())
    }

    fn start(&self) -> HalResult<()> {
        self.inner.call_status(OpCode::GpsStart, Payload::new())
    }

    fn stop(&self) -> HalResult<()> {
        self.inner.call_status(OpCode::GpsStop, Payload::new())
    }

    fn cleanup(&self) {
        if let Err(err) = self.inner.call_status(OpCode::GpsCleanup, Payload::new()) {
            warn!(%err, "cleanup call failed");
        }
        self.inner.router.clear(Category::Gps);
    }

    fn inject_time(&self, utc_ms: i64, reference_ms: i64, uncertainty_ms: i32) -> HalResult<()> {
        let payload = self.inner.build_payload(|w| {
            schema::encode_inject_time(w, utc_ms, reference_ms, uncertainty_ms)
        })?;
        self.inner.call_status(OpCode::GpsInjectTime, payload)
    }

    fn inject_location(&self, latitude: f64, longitude: f64, accuracy: f32) -> HalResult<()> {
        let payload = self
            .inner
            .build_payload(|w| schema::encode_inject_location(w, latitude, longitude, accuracy))?;
        self.inner.call_status(OpCode::GpsInjectLocation, payload)
    }

    fn delete_aiding_data(&self, flags: u16) {
        let result = self
            .inner
            .build_payload(|w| w.put_u16(flags))
            .and_then(|payload| self.inner.call_status(OpCode::GpsDeleteAidingData, payload));
        if let Err(err) = result {
            warn!(%err, "delete aiding data call failed");
        }
    }

    fn set_position_mode(
        &self,
        mode: PositionMode,
        recurrence: Recurrence,
        min_interval_ms: u32,
        preferred_accuracy_m: u32,
        preferred_time_ms: u32,
    ) -> HalResult<()> {
        let payload = self.inner.build_payload(|w| {
            schema::encode_position_mode(
                w,
                mode,
                recurrence,
                min_interval_ms,
                preferred_accuracy_m,
                preferred_time_ms,
            )
        })?;
        self.inner.call_status(OpCode::GpsSetPositionMode, payload)
    }
}

struct RemoteXtra {
    inner: Arc<ClientInner>,
}

impl XtraInterface for RemoteXtra {
    fn init(&self, events: Arc<dyn XtraEvents>) -> HalResult<()> {
        self.inner
            .router
            .register(Category::Xtra, xtra_event_shim(events));
        self.inner.call_status(OpCode::XtraInit, Payload::new())
    }

    fn inject_data(&self, data: &[u8]) -> HalResult<()> {
        let payload = self.inner.build_payload(|w| w.put_bytes(data))?;
        self.inner.call_status(OpCode::XtraInjectData, payload)
    }
}

struct RemoteAgps {
    inner: Arc<ClientInner>,
}

impl AgpsInterface for RemoteAgps {
    fn init(&self, events: Arc<dyn AgpsEvents>) -> HalResult<()> {
        self.inner
            .router
            .register(Category::Agps, agps_event_shim(events));
        self.inner.call_status(OpCode::AgpsInit, Payload::new())
    }

    fn data_conn_open(&self, apn: &str) -> HalResult<()> {
        let payload = self.inner.build_payload(|w| w.put_str(apn))?;
        self.inner.call_status(OpCode::AgpsDataConnOpen, payload)
    }

    fn data_conn_closed(&self) -> HalResult<()> {
        self.inner
            .call_status(OpCode::AgpsDataConnClosed, Payload::new())
    }

    fn data_conn_failed(&self) -> HalResult<()> {
        self.inner
            .call_status(OpCode::AgpsDataConnFailed, Payload::new())
    }

    fn set_server(&self, kind: AgpsType, hostname: &str, port: i32) -> HalResult<()> {
        let payload = self
            .inner
            .build_payload(|w| schema::encode_set_server(w, kind, port, hostname))?;
        self.inner.call_status(OpCode::AgpsSetServer, payload)
    }
}

struct RemoteNi {
    inner: Arc<ClientInner>,
}

impl NiInterface for RemoteNi {
    fn init(&self, events: Arc<dyn NiEvents>) -> HalResult<()> {
        self.inner
            .router
            .register(Category::Ni, ni_event_shim(events));
        self.inner.call_status(OpCode::NiInit, Payload::new())
    }

    fn respond(&self, notification_id: i32, response: NiUserResponse) -> HalResult<()> {
        let payload = self
            .inner
            .build_payload(|w| schema::encode_ni_respond(w, notification_id, response))?;
        self.inner.call_status(OpCode::NiRespond, payload)
    }
}

struct RemoteRil {
    inner: Arc<ClientInner>,
}

impl RilInterface for RemoteRil {
    fn init(&self, events: Arc<dyn RilEvents>) -> HalResult<()> {
        self.inner
            .router
            .register(Category::Ril, ril_event_shim(events));
        self.inner.call_status(OpCode::RilInit, Payload::new())
    }

    fn set_ref_location(&self, location: &RefLocation) -> HalResult<()> {
        let payload = self.inner.build_payload(|w| location.encode(w))?;
        self.inner.call_status(OpCode::RilSetRefLocation, payload)
    }

    fn set_set_id(&self, kind: SetIdType, set_id: &str) -> HalResult<()> {
        let payload = self
            .inner
            .build_payload(|w| schema::encode_set_id(w, kind, set_id))?;
        self.inner.call_status(OpCode::RilSetSetId, payload)
    }

    fn ni_message(&self, message: &[u8]) -> HalResult<()> {
        let payload = self.inner.build_payload(|w| w.put_bytes(message))?;
        self.inner.call_status(OpCode::RilNiMessage, payload)
    }

    fn update_network_state(
        &self,
        connected: bool,
        kind: i32,
        roaming: bool,
        extra_info: &str,
    ) -> HalResult<()> {
        let payload = self.inner.build_payload(|w| {
            schema::encode_network_state(w, connected, kind, roaming, extra_info)
        })?;
        self.inner
            .call_status(OpCode::RilUpdateNetworkState, payload)
    }

    fn update_network_availability(&self, available: bool, apn: &str) -> HalResult<()> {
        let payload = self
            .inner
            .build_payload(|w| schema::encode_network_availability(w, available, apn))?;
        self.inner
            .call_status(OpCode::RilUpdateNetworkAvailability, payload)
    }
}

// Event shims: decode a category frame on the worker thread and invoke the
// registered handler set. A malformed event is dropped with a warning — it
// must never take the worker down.

fn gps_event_shim(events: Arc<dyn GpsEvents>) -> EventHandler {
    Arc::new(move |frame: Frame| {
        let decoded = (|| -> gpsbridge_wire::Result<()> {
            let mut r = frame.payload.reader();
            match frame.opcode()? {
                OpCode::GpsLocation => events.location(&Location::decode(&mut r)?),
                OpCode::GpsStatus => events.status(EngineStatus::from_wire(r.get_u16()?)?),
                OpCode::GpsSvStatus => events.sv_status(&SvStatus::decode(&mut r)?),
                OpCode::GpsNmea => {
                    let (utc_ms, sentence) = schema::decode_nmea(&mut r)?;
                    events.nmea(utc_ms, &sentence);
                }
                OpCode::GpsSetCapabilities => events.set_capabilities(r.get_u32()?),
                OpCode::GpsAcquireWakelock => events.acquire_wakelock(),
                OpCode::GpsReleaseWakelock => events.release_wakelock(),
                OpCode::GpsRequestUtcTime => events.request_utc_time(),
                other => warn!(code = other.name(), "unexpected code on gps category"),
            }
            Ok(())
        })();
        if let Err(err) = decoded {
            warn!(code = frame.code_name(), %err, "dropping malformed gps event");
        }
    })
}

fn xtra_event_shim(events: Arc<dyn XtraEvents>) -> EventHandler {
    Arc::new(move |frame: Frame| match frame.opcode() {
        Ok(OpCode::XtraDownloadRequest) => events.download_request(),
        _ => warn!(code = frame.code, "unexpected code on xtra category"),
    })
}

fn agps_event_shim(events: Arc<dyn AgpsEvents>) -> EventHandler {
    Arc::new(move |frame: Frame| {
        let decoded = (|| -> gpsbridge_wire::Result<()> {
            let mut r = frame.payload.reader();
            match frame.opcode()? {
                OpCode::AgpsStatus => {
                    events.status(&gpsbridge_hal::AgpsStatus::decode(&mut r)?)
                }
                other => warn!(code = other.name(), "unexpected code on agps category"),
            }
            Ok(())
        })();
        if let Err(err) = decoded {
            warn!(code = frame.code_name(), %err, "dropping malformed agps event");
        }
    })
}

fn ni_event_shim(events: Arc<dyn NiEvents>) -> EventHandler {
    Arc::new(move |frame: Frame| {
        let decoded = (|| -> gpsbridge_wire::Result<()> {
            let mut r = frame.payload.reader();
            match frame.opcode()? {
                OpCode::NiNotify => events.notify(&NiNotification::decode(&mut r)?),
                other => warn!(code = other.name(), "unexpected code on ni category"),
            }
            Ok(())
        })();
        if let Err(err) = decoded {
            warn!(code = frame.code_name(), %err, "dropping malformed ni event");
        }
    })
}

fn ril_event_shim(events: Arc<dyn RilEvents>) -> EventHandler {
    Arc::new(move |frame: Frame| {
        let decoded = (|| -> gpsbridge_wire::Result<()> {
            let mut r = frame.payload.reader();
            match frame.opcode()? {
                OpCode::RilRequestSetId => events.request_set_id(r.get_u32()?),
                OpCode::RilRequestRefLocation => events.request_ref_location(r.get_u32()?),
                other => warn!(code = other.name(), "unexpected code on ril category"),
            }
            Ok(())
        })();
        if let Err(err) = decoded {
            warn!(code = frame.code_name(), %err, "dropping malformed ril event");
        }
    })
}
