use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gpsbridge::{open, ClientConfig};
use gpsbridge_hal::{EngineStatus, GpsEvents, GpsVendor, Location, SvStatus};

use crate::cmd::WatchArgs;
use crate::exit::{client_error, hal_error, CliError, CliResult, INTERNAL, SUCCESS};

enum Report {
    Fix(Location),
    Status(EngineStatus),
    Satellites(usize),
    Capabilities(u32),
}

struct Reporter {
    tx: Mutex<mpsc::Sender<Report>>,
}

impl Reporter {
    fn send(&self, report: Report) {
        let _ = self.tx.lock().unwrap().send(report);
    }
}

impl GpsEvents for Reporter {
    fn location(&self, location: &Location) {
        self.send(Report::Fix(*location));
    }
    fn status(&self, status: EngineStatus) {
        self.send(Report::Status(status));
    }
    fn sv_status(&self, status: &SvStatus) {
        self.send(Report::Satellites(status.svs.len()));
    }
    fn nmea(&self, _utc_ms: i64, _sentence: &[u8]) {}
    fn set_capabilities(&self, capabilities: u32) {
        self.send(Report::Capabilities(capabilities));
    }
    fn acquire_wakelock(&self) {}
    fn release_wakelock(&self) {}
    fn request_utc_time(&self) {}
}

pub fn run(args: WatchArgs) -> CliResult<i32> {
    let config = ClientConfig {
        socket_path: args.socket,
        ..ClientConfig::default()
    };
    let remote = open(config).map_err(|err| client_error("open failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (tx, rx) = mpsc::channel();
    remote
        .gps()
        .init(Arc::new(Reporter { tx: Mutex::new(tx) }))
        .map_err(|err| hal_error("init failed", err))?;
    remote
        .gps()
        .start()
        .map_err(|err| hal_error("start failed", err))?;

    let mut printed = 0u32;
    while running.load(Ordering::SeqCst) {
        let report = match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(report) => report,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match report {
            Report::Fix(fix) => {
                println!(
                    "fix lat={:.6} lon={:.6} acc={:.1}m t={}",
                    fix.latitude, fix.longitude, fix.accuracy, fix.timestamp_ms
                );
                printed = printed.saturating_add(1);
                if let Some(count) = args.count {
                    if printed >= count {
                        break;
                    }
                }
            }
            Report::Status(status) => println!("engine {status:?}"),
            Report::Satellites(count) => println!("satellites visible={count}"),
            Report::Capabilities(bits) => println!("capabilities {bits:#06x}"),
        }
    }

    let _ = remote.gps().stop();
    remote.gps().cleanup();
    remote.shutdown();

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
