//! Client-side connection establishment.

use std::path::Path;
use std::time::Duration;

use gpsbridge_transport::RpcListener;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::session::{Session, SessionConfig};
use crate::state::SessionState;

/// Bounded-retry connect policy.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Total connection attempts before giving up.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Configuration for the session once connected.
    pub session: SessionConfig,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            retry_delay: Duration::from_millis(200),
            session: SessionConfig::default(),
        }
    }
}

/// Connect to a listening server with bounded retries.
///
/// Exhausting the retry budget is permanent: the caller gets
/// [`SessionError::ConnectExhausted`] and must decide whether to try again
/// with a fresh call.
pub fn connect(path: impl AsRef<Path>, config: ConnectConfig) -> Result<Session> {
    let path = path.as_ref();
    debug!(?path, state = %SessionState::Connecting, "connecting");

    let mut last_error = None;
    for attempt in 1..=config.attempts {
        match RpcListener::connect(path) {
            Ok(stream) => {
                info!(?path, attempt, "connected");
                return Session::new(stream, config.session);
            }
            Err(err) => {
                warn!(?path, attempt, max = config.attempts, %err, "connect attempt failed");
                last_error = Some(err);
            }
        }
        if attempt < config.attempts {
            std::thread::sleep(config.retry_delay);
        }
    }

    let source = last_error.unwrap_or_else(|| {
        gpsbridge_transport::TransportError::Connect {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "retry budget is zero",
            ),
        }
    });
    Err(SessionError::ConnectExhausted {
        attempts: config.attempts,
        source,
    })
}
