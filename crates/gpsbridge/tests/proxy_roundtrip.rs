//! End-to-end tests: a real server on a real socket, the client proxy in the
//! same process, frames on the wire in between.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use gpsbridge::{open, ClientConfig, Server, ServerConfig, SimVendor};
use gpsbridge_hal::types::capabilities;
use gpsbridge_hal::{
    CapabilityName, EngineStatus, Extension, GpsEvents, GpsInterface, GpsVendor, HalError,
    HalResult, Location, PositionMode, Recurrence, SvStatus, XtraEvents, XtraInterface,
};
use gpsbridge_session::{ConnectConfig, SessionConfig};

fn temp_sock(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gpsbridge-e2e-{}-{}", tag, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join("link.sock")
}

fn client_config(socket_path: &PathBuf) -> ClientConfig {
    ClientConfig {
        socket_path: socket_path.clone(),
        connect: ConnectConfig {
            session: SessionConfig {
                call_timeout: Duration::from_secs(5),
            },
            ..ConnectConfig::default()
        },
    }
}

/// Test vendor: capabilities on init, a burst of fixes on start, xtra echo.
struct TestVendor {
    core: TestCore,
    xtra: TestXtra,
}

impl TestVendor {
    fn new(injected_tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            core: TestCore {
                events: Mutex::new(None),
            },
            xtra: TestXtra { injected_tx },
        }
    }
}

impl GpsVendor for TestVendor {
    fn gps(&self) -> &dyn GpsInterface {
        &self.core
    }

    fn extension(&self, name: CapabilityName) -> Option<Extension<'_>> {
        match name {
            CapabilityName::Xtra => Some(Extension::Xtra(&self.xtra)),
            _ => None,
        }
    }
}

struct TestCore {
    events: Mutex<Option<Arc<dyn GpsEvents>>>,
}

impl GpsInterface for TestCore {
    fn init(&self, events: Arc<dyn GpsEvents>) -> HalResult<()> {
        // The engine reports what it can do while init is still in flight.
        events.set_capabilities(capabilities::SCHEDULING | capabilities::MSA);
        *self.events.lock().unwrap() = Some(events);
        Ok(())
    }

    fn start(&self) -> HalResult<()> {
        let events = self
            .events
            .lock()
            .unwrap()
            .clone()
            .ok_or(HalError::Vendor(-1))?;
        for i in 0..3 {
            events.location(&Location {
                flags: 0x1,
                latitude: 10.0 + i as f64,
                longitude: 20.0,
                altitude: 0.0,
                speed: 0.0,
                bearing: 0.0,
                accuracy: 5.0,
                timestamp_ms: 1_000 + i,
            });
        }
        Ok(())
    }

    fn stop(&self) -> HalResult<()> {
        Ok(())
    }

    fn cleanup(&self) {
        *self.events.lock().unwrap() = None;
    }

    fn inject_time(&self, _utc_ms: i64, _reference_ms: i64, _unc: i32) -> HalResult<()> {
        Ok(())
    }

    fn inject_location(&self, latitude: f64, _longitude: f64, _accuracy: f32) -> HalResult<()> {
        if latitude.abs() > 90.0 {
            return Err(HalError::Vendor(-2));
        }
        Ok(())
    }

    fn delete_aiding_data(&self, _flags: u16) {}

    fn set_position_mode(
        &self,
        _mode: PositionMode,
        _recurrence: Recurrence,
        _min_interval_ms: u32,
        _preferred_accuracy_m: u32,
        _preferred_time_ms: u32,
    ) -> HalResult<()> {
        Ok(())
    }
}

struct TestXtra {
    injected_tx: mpsc::Sender<Vec<u8>>,
}

impl XtraInterface for TestXtra {
    fn init(&self, events: Arc<dyn XtraEvents>) -> HalResult<()> {
        events.download_request();
        Ok(())
    }

    fn inject_data(&self, data: &[u8]) -> HalResult<()> {
        self.injected_tx.send(data.to_vec()).unwrap();
        Ok(())
    }
}

struct CaptureGps {
    capabilities_tx: Mutex<mpsc::Sender<u32>>,
    fixes_tx: Mutex<mpsc::Sender<Location>>,
}

impl GpsEvents for CaptureGps {
    fn location(&self, location: &Location) {
        let _ = self.fixes_tx.lock().unwrap().send(*location);
    }
    fn status(&self, _status: EngineStatus) {}
    fn sv_status(&self, _status: &SvStatus) {}
    fn nmea(&self, _utc_ms: i64, _sentence: &[u8]) {}
    fn set_capabilities(&self, capabilities: u32) {
        let _ = self.capabilities_tx.lock().unwrap().send(capabilities);
    }
    fn acquire_wakelock(&self) {}
    fn release_wakelock(&self) {}
    fn request_utc_time(&self) {}
}

struct CaptureXtra {
    download_tx: Mutex<mpsc::Sender<()>>,
}

impl XtraEvents for CaptureXtra {
    fn download_request(&self) {
        let _ = self.download_tx.lock().unwrap().send(());
    }
}

#[test]
fn init_call_and_capabilities_event_both_arrive() {
    let sock = temp_sock("init");
    let config = ServerConfig {
        socket_path: sock.clone(),
        ..ServerConfig::default()
    };
    let server = Server::bind(&config).unwrap();

    let (injected_tx, _injected_rx) = mpsc::channel();
    let server_thread = thread::spawn(move || {
        server
            .serve_client(Arc::new(TestVendor::new(injected_tx)))
            .unwrap();
    });

    let remote = open(client_config(&sock)).unwrap();

    let (caps_tx, caps_rx) = mpsc::channel();
    let (fixes_tx, _fixes_rx) = mpsc::channel();
    remote
        .gps()
        .init(Arc::new(CaptureGps {
            capabilities_tx: Mutex::new(caps_tx),
            fixes_tx: Mutex::new(fixes_tx),
        }))
        .unwrap();

    // The event fired during init arrives with the exact bit pattern, while
    // the init call got its own separate reply above.
    let bits = caps_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(bits, capabilities::SCHEDULING | capabilities::MSA);

    remote.shutdown();
    server_thread.join().unwrap();
    let _ = std::fs::remove_dir_all(sock.parent().unwrap());
}

#[test]
fn fixes_interleaved_with_start_reply_keep_order() {
    let sock = temp_sock("interleave");
    let config = ServerConfig {
        socket_path: sock.clone(),
        ..ServerConfig::default()
    };
    let server = Server::bind(&config).unwrap();

    let (injected_tx, _injected_rx) = mpsc::channel();
    let server_thread = thread::spawn(move || {
        server
            .serve_client(Arc::new(TestVendor::new(injected_tx)))
            .unwrap();
    });

    let remote = open(client_config(&sock)).unwrap();

    let (caps_tx, _caps_rx) = mpsc::channel();
    let (fixes_tx, fixes_rx) = mpsc::channel();
    remote
        .gps()
        .init(Arc::new(CaptureGps {
            capabilities_tx: Mutex::new(caps_tx),
            fixes_tx: Mutex::new(fixes_tx),
        }))
        .unwrap();

    // start() emits three fixes before its reply; the call must still get
    // its own answer and the fixes must arrive in emission order.
    remote.gps().start().unwrap();

    for i in 0..3 {
        let fix = fixes_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(fix.latitude, 10.0 + i as f64);
        assert_eq!(fix.timestamp_ms, 1_000 + i);
    }

    remote.gps().stop().unwrap();
    remote.shutdown();
    server_thread.join().unwrap();
    let _ = std::fs::remove_dir_all(sock.parent().unwrap());
}

#[test]
fn extension_probe_reflects_vendor_capabilities() {
    let sock = temp_sock("probe");
    let config = ServerConfig {
        socket_path: sock.clone(),
        ..ServerConfig::default()
    };
    let server = Server::bind(&config).unwrap();

    let (injected_tx, _injected_rx) = mpsc::channel();
    let server_thread = thread::spawn(move || {
        server
            .serve_client(Arc::new(TestVendor::new(injected_tx)))
            .unwrap();
    });

    let remote = open(client_config(&sock)).unwrap();

    assert!(remote.extension(CapabilityName::Xtra).is_some());
    assert!(remote.extension(CapabilityName::Agps).is_none());
    assert!(remote.extension(CapabilityName::Ni).is_none());
    assert!(remote.extension(CapabilityName::Ril).is_none());

    remote.shutdown();
    server_thread.join().unwrap();
    let _ = std::fs::remove_dir_all(sock.parent().unwrap());
}

#[test]
fn xtra_download_request_and_injection_roundtrip() {
    let sock = temp_sock("xtra");
    let config = ServerConfig {
        socket_path: sock.clone(),
        ..ServerConfig::default()
    };
    let server = Server::bind(&config).unwrap();

    let (injected_tx, injected_rx) = mpsc::channel();
    let server_thread = thread::spawn(move || {
        server
            .serve_client(Arc::new(TestVendor::new(injected_tx)))
            .unwrap();
    });

    let remote = open(client_config(&sock)).unwrap();

    let Some(Extension::Xtra(xtra)) = remote.extension(CapabilityName::Xtra) else {
        panic!("xtra must be offered");
    };

    let (download_tx, download_rx) = mpsc::channel();
    xtra.init(Arc::new(CaptureXtra {
        download_tx: Mutex::new(download_tx),
    }))
    .unwrap();

    // The vendor asked for a download during init; answer it with data and
    // verify the exact bytes reach the vendor.
    download_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    xtra.inject_data(b"assistance-blob").unwrap();
    assert_eq!(
        injected_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        b"assistance-blob"
    );

    remote.shutdown();
    server_thread.join().unwrap();
    let _ = std::fs::remove_dir_all(sock.parent().unwrap());
}

#[test]
fn vendor_failure_status_is_transparent() {
    let sock = temp_sock("failure");
    let config = ServerConfig {
        socket_path: sock.clone(),
        ..ServerConfig::default()
    };
    let server = Server::bind(&config).unwrap();

    let (injected_tx, _injected_rx) = mpsc::channel();
    let server_thread = thread::spawn(move || {
        server
            .serve_client(Arc::new(TestVendor::new(injected_tx)))
            .unwrap();
    });

    let remote = open(client_config(&sock)).unwrap();

    // The vendor's own status codes pass through unchanged; transport and
    // vendor failures look the same to the caller.
    assert!(remote.gps().inject_location(45.0, 20.0, 5.0).is_ok());
    assert!(matches!(
        remote.gps().inject_location(95.0, 20.0, 5.0),
        Err(HalError::Vendor(-2))
    ));

    remote.shutdown();
    server_thread.join().unwrap();
    let _ = std::fs::remove_dir_all(sock.parent().unwrap());
}

#[test]
fn operations_fail_cleanly_after_shutdown() {
    let sock = temp_sock("teardown");
    let config = ServerConfig {
        socket_path: sock.clone(),
        ..ServerConfig::default()
    };
    let server = Server::bind(&config).unwrap();

    let (injected_tx, _injected_rx) = mpsc::channel();
    let server_thread = thread::spawn(move || {
        server
            .serve_client(Arc::new(TestVendor::new(injected_tx)))
            .unwrap();
    });

    let remote = open(client_config(&sock)).unwrap();
    remote.shutdown();
    server_thread.join().unwrap();

    assert!(matches!(remote.gps().start(), Err(HalError::Link(_))));

    let _ = std::fs::remove_dir_all(sock.parent().unwrap());
}

#[test]
fn sim_vendor_streams_fixes_end_to_end() {
    let sock = temp_sock("sim");
    let config = ServerConfig {
        socket_path: sock.clone(),
        ..ServerConfig::default()
    };
    let server = Server::bind(&config).unwrap();

    let server_thread = thread::spawn(move || {
        server
            .serve_client(Arc::new(SimVendor::new(Duration::from_millis(20))))
            .unwrap();
    });

    let remote = open(client_config(&sock)).unwrap();

    let (caps_tx, caps_rx) = mpsc::channel();
    let (fixes_tx, fixes_rx) = mpsc::channel();
    remote
        .gps()
        .init(Arc::new(CaptureGps {
            capabilities_tx: Mutex::new(caps_tx),
            fixes_tx: Mutex::new(fixes_tx),
        }))
        .unwrap();
    assert!(caps_rx.recv_timeout(Duration::from_secs(5)).is_ok());

    remote.gps().start().unwrap();
    let first = fixes_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let second = fixes_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(first.flags != 0);
    assert!(second.timestamp_ms >= first.timestamp_ms);

    remote.gps().stop().unwrap();
    remote.gps().cleanup();
    remote.shutdown();
    server_thread.join().unwrap();
    let _ = std::fs::remove_dir_all(sock.parent().unwrap());
}
