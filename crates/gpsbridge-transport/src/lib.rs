//! Unix domain socket transport for the gpsbridge RPC link.
//!
//! The proxy talks to its server over a single stream socket at a well-known
//! local path. This crate provides the listening socket (bind/accept) and the
//! connected [`RpcStream`] everything else builds on. One client at a time:
//! the server accepts a connection, serves it to completion, then accepts the
//! next one.

pub mod error;
pub mod stream;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use stream::RpcStream;

#[cfg(unix)]
pub use uds::RpcListener;

/// Well-known socket path for the positioning RPC link.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/gpsbridge.sock";
