//! Call/reply session management for the gpsbridge RPC link.
//!
//! A [`Session`] owns one connected stream: a dedicated read loop decodes
//! frames and hands them to a per-side [`Dispatch`] policy, synchronous
//! [`Session::call`]s block on a one-slot reply cell, and fire-and-forget
//! [`Session::send`]s carry events. The [`CallbackRouter`] decouples slow
//! event handlers from the read loop with one queue and one worker thread
//! per callback category.

pub mod connector;
pub mod error;
pub mod listener;
pub mod router;
pub mod session;
pub mod state;

pub use connector::{connect, ConnectConfig};
pub use error::{Result, SessionError};
pub use listener::SessionListener;
pub use router::{CallbackRouter, EventHandler, StopMode};
pub use session::{Dispatch, Session, SessionConfig, SessionHandle};
pub use state::SessionState;
