use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gpsbridge::{Server, ServerConfig, SimVendor};

use crate::cmd::ServeArgs;
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let config = ServerConfig {
        socket_path: args.socket,
        ..ServerConfig::default()
    };
    let server = Server::bind(&config).map_err(|err| session_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let fix_interval = Duration::from_millis(args.fix_interval_ms);
    let make_vendor = move || {
        Ok(Arc::new(SimVendor::new(fix_interval)) as Arc<dyn gpsbridge_hal::GpsVendor>)
    };
    server
        .run(&make_vendor, &running)
        .map_err(|err| session_error("serve failed", err))?;

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
