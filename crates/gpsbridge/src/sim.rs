//! A simulated vendor implementation.
//!
//! Lets the whole bridge run without positioning hardware: `start` spawns a
//! ticker thread that walks a fix around a base point and reports satellite
//! state until `stop`. The xtra extension asks for a download on init and
//! accepts any injected data; the agps extension accepts its configuration
//! calls. Used by the `serve` subcommand and the integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use gpsbridge_hal::types::{capabilities, location_flags};
use gpsbridge_hal::{
    AgpsEvents, AgpsInterface, AgpsType, CapabilityName, EngineStatus, Extension, GpsEvents,
    GpsInterface, GpsVendor, HalError, HalResult, Location, PositionMode, Recurrence, SvInfo,
    SvStatus, XtraEvents, XtraInterface,
};
use tracing::{debug, info, warn};

const BASE_LATITUDE: f64 = 59.4370;
const BASE_LONGITUDE: f64 = 24.7536;

/// Simulated vendor: core positioning plus xtra and agps extensions.
pub struct SimVendor {
    core: SimCore,
    xtra: SimXtra,
    agps: SimAgps,
}

impl SimVendor {
    pub fn new(fix_interval: Duration) -> Self {
        Self {
            core: SimCore {
                events: Mutex::new(None),
                worker: Mutex::new(None),
                running: Arc::new(AtomicBool::new(false)),
                fix_interval: Mutex::new(fix_interval),
            },
            xtra: SimXtra {
                events: Mutex::new(None),
            },
            agps: SimAgps,
        }
    }
}

impl Default for SimVendor {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl GpsVendor for SimVendor {
    fn gps(&self) -> &dyn GpsInterface {
        &self.core
    }

    fn extension(&self, name: CapabilityName) -> Option<Extension<'_>> {
        match name {
            CapabilityName::Xtra => Some(Extension::Xtra(&self.xtra)),
            CapabilityName::Agps => Some(Extension::Agps(&self.agps)),
            _ => None,
        }
    }
}

struct SimCore {
    events: Mutex<Option<Arc<dyn GpsEvents>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
    fix_interval: Mutex<Duration>,
}

impl SimCore {
    fn stop_worker(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.lock().unwrap().take() {
            if worker.join().is_err() {
                warn!("sim fix thread panicked");
            }
        }
    }
}

impl GpsInterface for SimCore {
    fn init(&self, events: Arc<dyn GpsEvents>) -> HalResult<()> {
        info!("sim engine init");
        events.set_capabilities(capabilities::SCHEDULING | capabilities::MSB);
        events.status(EngineStatus::EngineOn);
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

        if self.running.swap(true, Ordering::SeqCst) {
            debug!("sim fix thread already running");
            return Ok(());
        }

        let running = Arc::clone(&self.running);
        let interval = *self.fix_interval.lock().unwrap();
        let worker = std::thread::Builder::new()
            .name("gpsbridge-sim".to_string())
            .spawn(move || fix_loop(events, running, interval))
            .map_err(|err| {
                warn!(%err, "failed to spawn sim fix thread");
                HalError::Vendor(-1)
            })?;
        *self.worker.lock().unwrap() = Some(worker);
        Ok(())
    }

    fn stop(&self) -> HalResult<()> {
        self.stop_worker();
        Ok(())
    }

    fn cleanup(&self) {
        info!("sim engine cleanup");
        self.stop_worker();
        if let Some(events) = self.events.lock().unwrap().take() {
            events.status(EngineStatus::EngineOff);
        }
    }

    fn inject_time(&self, utc_ms: i64, _reference_ms: i64, uncertainty_ms: i32) -> HalResult<()> {
        debug!(utc_ms, uncertainty_ms, "sim time injected");
        Ok(())
    }

    fn inject_location(&self, latitude: f64, longitude: f64, accuracy: f32) -> HalResult<()> {
        debug!(latitude, longitude, accuracy, "sim location injected");
        Ok(())
    }

    fn delete_aiding_data(&self, flags: u16) {
        debug!(flags, "sim aiding data deleted");
    }

    fn set_position_mode(
        &self,
        _mode: PositionMode,
        _recurrence: Recurrence,
        min_interval_ms: u32,
        _preferred_accuracy_m: u32,
        _preferred_time_ms: u32,
    ) -> HalResult<()> {
        let interval = Duration::from_millis(min_interval_ms.max(100) as u64);
        *self.fix_interval.lock().unwrap() = interval;
        debug!(?interval, "sim fix interval updated");
        Ok(())
    }
}

fn fix_loop(events: Arc<dyn GpsEvents>, running: Arc<AtomicBool>, interval: Duration) {
    events.status(EngineStatus::SessionBegin);

    let mut tick = 0u64;
    while running.load(Ordering::SeqCst) {
        let phase = tick as f64 * 0.1;
        let location = Location {
            flags: location_flags::LAT_LONG | location_flags::ALTITUDE | location_flags::ACCURACY,
            latitude: BASE_LATITUDE + 0.0005 * phase.sin(),
            longitude: BASE_LONGITUDE + 0.0005 * phase.cos(),
            altitude: 30.0,
            speed: 1.2,
            bearing: (phase.to_degrees() % 360.0) as f32,
            accuracy: 6.0,
            timestamp_ms: unix_millis(),
        };
        events.location(&location);

        if tick % 5 == 0 {
            events.sv_status(&constellation(tick));
        }

        tick += 1;
        std::thread::sleep(interval);
    }

    events.status(EngineStatus::SessionEnd);
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn constellation(tick: u64) -> SvStatus {
    let visible = 8 + (tick % 3) as i32;
    SvStatus {
        svs: (1..=visible)
            .map(|prn| SvInfo {
                prn,
                snr: 30.0 + (prn % 4) as f32 * 2.5,
                elevation: 15.0 + (prn * 7 % 70) as f32,
                azimuth: (prn * 45 % 360) as f32,
            })
            .collect(),
        ephemeris_mask: (1 << visible) - 1,
        almanac_mask: 0xFFFF_FFFF >> (32 - visible),
        used_in_fix_mask: (1 << (visible - 2)) - 1,
    }
}

struct SimXtra {
    events: Mutex<Option<Arc<dyn XtraEvents>>>,
}

impl XtraInterface for SimXtra {
    fn init(&self, events: Arc<dyn XtraEvents>) -> HalResult<()> {
        // A fresh engine always wants assistance data.
        events.download_request();
        *self.events.lock().unwrap() = Some(events);
        Ok(())
    }

    fn inject_data(&self, data: &[u8]) -> HalResult<()> {
        if data.is_empty() {
            return Err(HalError::Vendor(-1));
        }
        debug!(len = data.len(), "sim assistance data injected");
        Ok(())
    }
}

struct SimAgps;

impl AgpsInterface for SimAgps {
    fn init(&self, _events: Arc<dyn AgpsEvents>) -> HalResult<()> {
        Ok(())
    }

    fn data_conn_open(&self, apn: &str) -> HalResult<()> {
        debug!(apn, "sim agps data connection opened");
        Ok(())
    }

    fn data_conn_closed(&self) -> HalResult<()> {
        Ok(())
    }

    fn data_conn_failed(&self) -> HalResult<()> {
        Ok(())
    }

    fn set_server(&self, kind: AgpsType, hostname: &str, port: i32) -> HalResult<()> {
        debug!(?kind, hostname, port, "sim agps server configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    struct CountingEvents {
        fixes: mpsc::Sender<Location>,
        statuses: mpsc::Sender<EngineStatus>,
    }

    impl GpsEvents for CountingEvents {
        fn location(&self, location: &Location) {
            let _ = self.fixes.send(*location);
        }
        fn status(&self, status: EngineStatus) {
            let _ = self.statuses.send(status);
        }
        fn sv_status(&self, _status: &SvStatus) {}
        fn nmea(&self, _utc_ms: i64, _sentence: &[u8]) {}
        fn set_capabilities(&self, _capabilities: u32) {}
        fn acquire_wakelock(&self) {}
        fn release_wakelock(&self) {}
        fn request_utc_time(&self) {}
    }

    #[test]
    fn start_emits_fixes_until_stop() {
        let vendor = SimVendor::new(Duration::from_millis(10));
        let (fix_tx, fix_rx) = mpsc::channel();
        let (status_tx, status_rx) = mpsc::channel();

        vendor
            .gps()
            .init(Arc::new(CountingEvents {
                fixes: fix_tx,
                statuses: status_tx,
            }))
            .unwrap();
        assert_eq!(
            status_rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            EngineStatus::EngineOn
        );

        vendor.gps().start().unwrap();
        assert_eq!(
            status_rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            EngineStatus::SessionBegin
        );

        let fix = fix_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(fix.flags & location_flags::LAT_LONG != 0);
        assert!((fix.latitude - BASE_LATITUDE).abs() < 0.01);

        vendor.gps().stop().unwrap();
        assert_eq!(
            status_rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            EngineStatus::SessionEnd
        );
    }

    #[test]
    fn start_before_init_fails() {
        let vendor = SimVendor::default();
        assert!(vendor.gps().start().is_err());
    }

    #[test]
    fn xtra_requests_download_on_init() {
        let vendor = SimVendor::default();
        let (tx, rx) = mpsc::channel();

        struct DownloadProbe(Mutex<mpsc::Sender<()>>);
        impl XtraEvents for DownloadProbe {
            fn download_request(&self) {
                let _ = self.0.lock().unwrap().send(());
            }
        }

        let Some(Extension::Xtra(xtra)) = vendor.extension(CapabilityName::Xtra) else {
            panic!("sim must offer xtra");
        };
        xtra.init(Arc::new(DownloadProbe(Mutex::new(tx)))).unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());

        assert!(xtra.inject_data(b"assistance").is_ok());
        assert!(xtra.inject_data(b"").is_err());
    }

    #[test]
    fn ni_and_ril_are_absent() {
        let vendor = SimVendor::default();
        assert!(vendor.extension(CapabilityName::Ni).is_none());
        assert!(vendor.extension(CapabilityName::Ril).is_none());
        assert!(vendor.extension(CapabilityName::Agps).is_some());
    }
}
