//! Positioning-HAL proxy over local IPC.
//!
//! Two halves of one bridge:
//! - [`client`] — runs where the positioning interface is consumed. `open`
//!   connects to the server and returns a [`client::RemoteGps`] that
//!   implements the vendor traits over the RPC link.
//! - [`server`] — runs next to the real vendor implementation. It accepts
//!   one client at a time, dispatches calls into the vendor and forwards
//!   vendor events back as fire-and-forget frames.
//!
//! [`sim`] provides a simulated vendor so the whole bridge can be exercised
//! without positioning hardware.

pub mod client;
pub mod server;
pub mod sim;

pub use client::{open, ClientConfig, ClientError, RemoteGps};
pub use server::{Server, ServerConfig, VendorFactory};
pub use sim::SimVendor;
