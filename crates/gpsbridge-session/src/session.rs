//! One connected RPC session.
//!
//! A session owns both directions of one stream socket. Writes are
//! serialized behind a lock; reads happen on a dedicated dispatch-loop
//! thread. Synchronous calls block the calling thread on a one-slot reply
//! cell until the read loop observes the correlated reply; everything else
//! the read loop sees goes to the installed [`Dispatch`] policy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use gpsbridge_transport::RpcStream;
use gpsbridge_wire::{Frame, FrameReader, FrameWriter};
use tracing::{debug, error, info, warn};

use crate::error::{Result, SessionError};
use crate::state::SessionState;

/// Per-side policy for inbound frames the session does not correlate to a
/// pending call.
///
/// Returning `Some(reply)` makes the read loop write the reply before
/// processing the next frame; event-style frames return `None`. A dispatcher
/// must not block: anything slow belongs on a router worker.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, frame: Frame) -> Option<Frame>;

    /// Called once from the read-loop thread after it stops, before the
    /// session reaches `Closed`. Stop router workers here.
    fn connection_closed(&self) {}
}

/// Session behavior knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on how long [`Session::call`] waits for its reply. A
    /// crashed peer fails the call instead of hanging it forever.
    pub call_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
        }
    }
}

enum PendingSlot {
    /// No call outstanding.
    Idle,
    /// A call was written; its thread is blocked waiting.
    Waiting { code: u32 },
    /// The read loop observed the reply.
    Ready(Frame),
    /// The connection went away before the reply.
    Failed,
}

struct PendingCall {
    slot: Mutex<PendingSlot>,
    cond: Condvar,
}

struct Shared {
    writer: Mutex<Option<FrameWriter<RpcStream>>>,
    pending: PendingCall,
    state: Mutex<SessionState>,
    stop: AtomicBool,
    config: SessionConfig,
}

impl Shared {
    fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock().unwrap();
        if !state.is_terminal() {
            debug!(from = %*state, to = %next, "session state change");
            *state = next;
        }
    }

    fn write(&self, frame: &Frame) -> Result<()> {
        let mut guard = self.writer.lock().unwrap();
        let writer = guard
            .as_mut()
            .ok_or(SessionError::NotConnected(self.state()))?;
        writer.write_frame(frame)?;
        Ok(())
    }

    /// Hand a reply-style frame to the blocked caller. Returns the frame
    /// back when no call is pending so the dispatcher can decide instead.
    fn complete_pending(&self, frame: Frame) -> Option<Frame> {
        let mut slot = self.pending.slot.lock().unwrap();
        if let PendingSlot::Waiting { code } = *slot {
            if code != frame.code {
                debug!(
                    sent = code,
                    got = frame.code,
                    "reply code does not echo the call code"
                );
            }
            *slot = PendingSlot::Ready(frame);
            self.pending.cond.notify_all();
            None
        } else {
            Some(frame)
        }
    }

    fn fail_pending(&self) {
        let mut slot = self.pending.slot.lock().unwrap();
        if matches!(*slot, PendingSlot::Waiting { .. }) {
            *slot = PendingSlot::Failed;
            self.pending.cond.notify_all();
        }
    }

    fn release_socket(&self) {
        if let Some(writer) = self.writer.lock().unwrap().take() {
            let _ = writer.get_ref().shutdown();
        }
    }
}

enum ReaderSlot {
    Idle(FrameReader<RpcStream>),
    Running(JoinHandle<()>),
    Finished,
}

/// One connected transport session.
///
/// Created per connection, destroyed on disconnect or [`Session::shutdown`].
/// Dropping the session tears it down.
pub struct Session {
    shared: Arc<Shared>,
    reader: Mutex<ReaderSlot>,
}

impl Session {
    /// Wrap a connected stream. The read loop starts with [`Session::start`].
    pub fn new(stream: RpcStream, config: SessionConfig) -> Result<Self> {
        let reader_stream = stream.try_clone()?;
        Ok(Self {
            shared: Arc::new(Shared {
                writer: Mutex::new(Some(FrameWriter::new(stream))),
                pending: PendingCall {
                    slot: Mutex::new(PendingSlot::Idle),
                    cond: Condvar::new(),
                },
                state: Mutex::new(SessionState::Connected),
                stop: AtomicBool::new(false),
                config,
            }),
            reader: Mutex::new(ReaderSlot::Idle(FrameReader::new(reader_stream))),
        })
    }

    /// Start the read/dispatch loop with the given per-side policy.
    pub fn start(&self, dispatch: Arc<dyn Dispatch>) -> Result<()> {
        let mut slot = self.reader.lock().unwrap();
        let reader = match std::mem::replace(&mut *slot, ReaderSlot::Finished) {
            ReaderSlot::Idle(reader) => reader,
            other => {
                *slot = other;
                return Err(SessionError::AlreadyStarted);
            }
        };

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("gpsbridge-session".to_string())
            .spawn(move || dispatch_loop(shared, reader, dispatch))
            .map_err(gpsbridge_transport::TransportError::Io)?;
        *slot = ReaderSlot::Running(handle);
        Ok(())
    }

    /// Issue a synchronous call and block until the correlated reply.
    ///
    /// One call may be outstanding at a time: the protocol has no call IDs,
    /// so the next reply-style frame belongs to the last sent call. Callers
    /// must serialize their own calls; a concurrent second call fails with
    /// [`SessionError::CallInProgress`].
    pub fn call(&self, frame: Frame) -> Result<Frame> {
        let state = self.shared.state();
        if state != SessionState::Connected {
            return Err(SessionError::NotConnected(state));
        }

        {
            let mut slot = self.shared.pending.slot.lock().unwrap();
            match *slot {
                PendingSlot::Idle | PendingSlot::Failed => {
                    *slot = PendingSlot::Waiting { code: frame.code };
                }
                PendingSlot::Waiting { .. } | PendingSlot::Ready(_) => {
                    return Err(SessionError::CallInProgress);
                }
            }
        }

        // Re-check after installing the slot: a drain that raced past the
        // first check now sees the waiting slot and fails it.
        let state = self.shared.state();
        if state != SessionState::Connected {
            *self.shared.pending.slot.lock().unwrap() = PendingSlot::Idle;
            return Err(SessionError::NotConnected(state));
        }

        if let Err(err) = self.shared.write(&frame) {
            *self.shared.pending.slot.lock().unwrap() = PendingSlot::Idle;
            return Err(err);
        }

        self.await_reply()
    }

    fn await_reply(&self) -> Result<Frame> {
        let timeout = self.shared.config.call_timeout;
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.pending.slot.lock().unwrap();
        loop {
            match std::mem::replace(&mut *slot, PendingSlot::Idle) {
                PendingSlot::Ready(reply) => return Ok(reply),
                PendingSlot::Failed => return Err(SessionError::Disconnected),
                waiting @ PendingSlot::Waiting { .. } => {
                    *slot = waiting;
                    let now = Instant::now();
                    if now >= deadline {
                        *slot = PendingSlot::Idle;
                        return Err(SessionError::CallTimeout(timeout));
                    }
                    let (guard, _result) = self
                        .shared
                        .pending
                        .cond
                        .wait_timeout(slot, deadline - now)
                        .unwrap();
                    slot = guard;
                }
                PendingSlot::Idle => return Err(SessionError::Disconnected),
            }
        }
    }

    /// Fire-and-forget send; returns once the write completed.
    pub fn send(&self, frame: Frame) -> Result<()> {
        let state = self.shared.state();
        if state != SessionState::Connected {
            return Err(SessionError::NotConnected(state));
        }
        self.shared.write(&frame)
    }

    /// A cloneable handle for sending events from other threads.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Block until the read loop exits (the session reached `Closed`).
    pub fn wait(&self) {
        let handle = {
            let mut slot = self.reader.lock().unwrap();
            match std::mem::replace(&mut *slot, ReaderSlot::Finished) {
                ReaderSlot::Running(handle) => Some(handle),
                other => {
                    *slot = other;
                    None
                }
            }
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("session dispatch loop panicked");
            }
        }
    }

    /// Stop the read loop, fail any pending call and release the socket.
    /// Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        // Shutting the socket down unblocks the read loop, which then runs
        // the drain path.
        if let Some(writer) = self.shared.writer.lock().unwrap().as_ref() {
            let _ = writer.get_ref().shutdown();
        }
        self.wait();

        // The loop never ran: drain inline.
        let mut slot = self.reader.lock().unwrap();
        if matches!(*slot, ReaderSlot::Idle(_)) {
            *slot = ReaderSlot::Finished;
            self.shared.set_state(SessionState::Draining);
            self.shared.fail_pending();
            self.shared.release_socket();
            self.shared.set_state(SessionState::Closed);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.shared.state())
            .finish()
    }
}

/// Cloneable sender attached to a session.
///
/// Dispatchers and event forwarders hold one of these instead of the session
/// itself, so teardown ownership stays in one place.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Fire-and-forget send; returns once the write completed.
    pub fn send(&self, frame: Frame) -> Result<()> {
        let state = self.shared.state();
        if state != SessionState::Connected {
            return Err(SessionError::NotConnected(state));
        }
        self.shared.write(&frame)
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }
}

fn dispatch_loop(shared: Arc<Shared>, mut reader: FrameReader<RpcStream>, dispatch: Arc<dyn Dispatch>) {
    debug!("dispatch loop running");
    loop {
        if shared.stop.load(Ordering::SeqCst) {
            break;
        }

        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                if !shared.stop.load(Ordering::SeqCst) {
                    match err {
                        gpsbridge_wire::WireError::ConnectionClosed => {
                            info!("peer closed the connection")
                        }
                        other => warn!(%other, "read loop terminating"),
                    }
                }
                break;
            }
        };

        // A reply-style frame completes the pending call, if any; with no
        // call outstanding it falls through to the dispatcher (the serving
        // side treats it as an incoming request).
        let frame = if frame.kind().is_reply_style() {
            match shared.complete_pending(frame) {
                None => continue,
                Some(frame) => frame,
            }
        } else {
            frame
        };

        if let Some(reply) = dispatch.dispatch(frame) {
            if let Err(err) = shared.write(&reply) {
                error!(%err, "failed to write reply; terminating session");
                break;
            }
        }
    }

    shared.set_state(SessionState::Draining);
    shared.fail_pending();
    dispatch.connection_closed();
    shared.release_socket();
    shared.set_state(SessionState::Closed);
    info!("session closed");
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::sync::mpsc;

    use gpsbridge_wire::{OpCode, Payload, PayloadWriter};

    use super::*;

    struct FnDispatch<F: Fn(Frame) -> Option<Frame> + Send + Sync>(F);

    impl<F: Fn(Frame) -> Option<Frame> + Send + Sync> Dispatch for FnDispatch<F> {
        fn dispatch(&self, frame: Frame) -> Option<Frame> {
            (self.0)(frame)
        }
    }

    fn pair() -> (RpcStream, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        (RpcStream::from_unix_stream(ours), theirs)
    }

    fn frame_with(op: OpCode, fill: impl FnOnce(&mut PayloadWriter<'_>)) -> Frame {
        let mut payload = Payload::new();
        fill(&mut payload.writer());
        Frame::with_payload(op, payload)
    }

    fn drop_all() -> Arc<dyn Dispatch> {
        Arc::new(FnDispatch(|_frame| None))
    }

    #[test]
    fn call_receives_correlated_reply() {
        let (ours, theirs) = pair();
        let session = Session::new(ours, SessionConfig::default()).unwrap();
        session.start(drop_all()).unwrap();

        let peer = std::thread::spawn(move || {
            let mut reader = FrameReader::new(theirs.try_clone().unwrap());
            let mut writer = FrameWriter::new(theirs);
            let request = reader.read_frame().unwrap();
            assert_eq!(request.opcode().unwrap(), OpCode::GpsStart);

            let reply = frame_with(OpCode::GpsStart, |w| w.put_i32(0).unwrap());
            writer.write_frame(&reply).unwrap();
        });

        let reply = session.call(Frame::new(OpCode::GpsStart)).unwrap();
        assert_eq!(reply.code, OpCode::GpsStart.as_u32());
        assert_eq!(reply.payload.reader().get_i32().unwrap(), 0);

        peer.join().unwrap();
    }

    #[test]
    fn events_interleaved_with_reply_do_not_confuse_correlation() {
        let (ours, theirs) = pair();
        let session = Session::new(ours, SessionConfig::default()).unwrap();

        let (event_tx, event_rx) = mpsc::channel();
        session
            .start(Arc::new(FnDispatch(move |frame: Frame| {
                event_tx.send(frame.code).unwrap();
                None
            })))
            .unwrap();

        let peer = std::thread::spawn(move || {
            let mut reader = FrameReader::new(theirs.try_clone().unwrap());
            let mut writer = FrameWriter::new(theirs);
            let _request = reader.read_frame().unwrap();

            // Two events around the reply.
            writer
                .write_frame(&frame_with(OpCode::GpsSetCapabilities, |w| {
                    w.put_u32(7).unwrap()
                }))
                .unwrap();
            writer
                .write_frame(&frame_with(OpCode::GpsInit, |w| w.put_i32(0).unwrap()))
                .unwrap();
            writer
                .write_frame(&Frame::new(OpCode::GpsAcquireWakelock))
                .unwrap();
        });

        let reply = session.call(Frame::new(OpCode::GpsInit)).unwrap();
        assert_eq!(reply.code, OpCode::GpsInit.as_u32());

        assert_eq!(
            event_rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            OpCode::GpsSetCapabilities.as_u32()
        );
        assert_eq!(
            event_rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            OpCode::GpsAcquireWakelock.as_u32()
        );

        peer.join().unwrap();
    }

    #[test]
    fn second_concurrent_call_fails_loudly() {
        let (ours, theirs) = pair();
        let session = Arc::new(Session::new(ours, SessionConfig::default()).unwrap());
        session.start(drop_all()).unwrap();

        // Peer swallows the first request and stays silent.
        let _theirs = theirs;

        let blocked = Arc::clone(&session);
        let first = std::thread::spawn(move || blocked.call(Frame::new(OpCode::GpsStart)));

        std::thread::sleep(Duration::from_millis(50));
        let second = session.call(Frame::new(OpCode::GpsStop));
        assert!(matches!(second, Err(SessionError::CallInProgress)));

        session.shutdown();
        assert!(matches!(
            first.join().unwrap(),
            Err(SessionError::Disconnected)
        ));
    }

    #[test]
    fn call_times_out_when_peer_hangs() {
        let (ours, theirs) = pair();
        let config = SessionConfig {
            call_timeout: Duration::from_millis(100),
        };
        let session = Session::new(ours, config).unwrap();
        session.start(drop_all()).unwrap();

        let _theirs = theirs; // keep the peer alive but silent

        let started = Instant::now();
        let result = session.call(Frame::new(OpCode::GpsStart));
        assert!(matches!(result, Err(SessionError::CallTimeout(_))));
        assert!(started.elapsed() < Duration::from_secs(5));

        // The slot is usable again.
        let result = session.call(Frame::new(OpCode::GpsStop));
        assert!(matches!(result, Err(SessionError::CallTimeout(_))));
    }

    #[test]
    fn disconnect_unblocks_pending_call() {
        let (ours, theirs) = pair();
        let session = Session::new(ours, SessionConfig::default()).unwrap();
        session.start(drop_all()).unwrap();

        let peer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            drop(theirs);
        });

        let started = Instant::now();
        let result = session.call(Frame::new(OpCode::GpsInit));
        assert!(matches!(result, Err(SessionError::Disconnected)));
        assert!(started.elapsed() < Duration::from_secs(5));

        peer.join().unwrap();
        session.wait();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn call_after_close_is_not_connected() {
        let (ours, theirs) = pair();
        let session = Session::new(ours, SessionConfig::default()).unwrap();
        session.start(drop_all()).unwrap();

        drop(theirs);
        session.wait();

        assert!(matches!(
            session.call(Frame::new(OpCode::GpsStart)),
            Err(SessionError::NotConnected(SessionState::Closed))
        ));
        assert!(matches!(
            session.send(Frame::new(OpCode::GpsLocation)),
            Err(SessionError::NotConnected(SessionState::Closed))
        ));
    }

    #[test]
    fn dispatcher_reply_reaches_peer() {
        let (ours, theirs) = pair();
        let session = Session::new(ours, SessionConfig::default()).unwrap();

        // Server-style policy: echo every call with a status reply.
        session
            .start(Arc::new(FnDispatch(|frame: Frame| {
                let mut payload = Payload::new();
                payload.writer().put_i32(0).unwrap();
                Some(Frame {
                    code: frame.code,
                    payload,
                })
            })))
            .unwrap();

        let mut reader = FrameReader::new(theirs.try_clone().unwrap());
        let mut writer = FrameWriter::new(theirs);
        writer.write_frame(&Frame::new(OpCode::GpsStop)).unwrap();

        let reply = reader.read_frame().unwrap();
        assert_eq!(reply.opcode().unwrap(), OpCode::GpsStop);
        assert_eq!(reply.payload.reader().get_i32().unwrap(), 0);
    }

    #[test]
    fn send_is_fire_and_forget() {
        let (ours, theirs) = pair();
        let session = Session::new(ours, SessionConfig::default()).unwrap();
        session.start(drop_all()).unwrap();

        session
            .send(frame_with(OpCode::GpsSetCapabilities, |w| {
                w.put_u32(0xAA55).unwrap()
            }))
            .unwrap();

        let mut reader = FrameReader::new(theirs);
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.opcode().unwrap(), OpCode::GpsSetCapabilities);
        assert_eq!(frame.payload.reader().get_u32().unwrap(), 0xAA55);
    }

    #[test]
    fn connection_closed_hook_runs_once() {
        struct HookDispatch {
            closed: mpsc::Sender<()>,
        }
        impl Dispatch for HookDispatch {
            fn dispatch(&self, _frame: Frame) -> Option<Frame> {
                None
            }
            fn connection_closed(&self) {
                self.closed.send(()).unwrap();
            }
        }

        let (ours, theirs) = pair();
        let session = Session::new(ours, SessionConfig::default()).unwrap();
        let (tx, rx) = mpsc::channel();
        session.start(Arc::new(HookDispatch { closed: tx })).unwrap();

        drop(theirs);
        session.wait();

        assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn shutdown_is_idempotent_and_closes() {
        let (ours, _theirs) = pair();
        let session = Session::new(ours, SessionConfig::default()).unwrap();
        session.start(drop_all()).unwrap();

        session.shutdown();
        session.shutdown();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn start_twice_fails() {
        let (ours, _theirs) = pair();
        let session = Session::new(ours, SessionConfig::default()).unwrap();
        session.start(drop_all()).unwrap();
        assert!(matches!(
            session.start(drop_all()),
            Err(SessionError::AlreadyStarted)
        ));
    }

    #[test]
    fn unstarted_session_drops_cleanly() {
        let (ours, _theirs) = pair();
        let session = Session::new(ours, SessionConfig::default()).unwrap();
        drop(session);
    }
}
