use std::path::PathBuf;

use clap::{Args, Subcommand};
use gpsbridge_transport::DEFAULT_SOCKET_PATH;

use crate::exit::CliResult;

pub mod serve;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the proxy server with the simulated vendor.
    Serve(ServeArgs),
    /// Connect as a client and print position fixes.
    Watch(WatchArgs),
}

pub fn run(command: Command) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Watch(args) => watch::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,
    /// Simulated fix interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub fix_interval_ms: u64,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Socket path to connect to.
    #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,
    /// Exit after printing this many fixes.
    #[arg(long)]
    pub count: Option<u32>,
}
