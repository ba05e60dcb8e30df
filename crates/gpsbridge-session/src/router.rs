//! Per-category callback delivery.
//!
//! Each category owns a FIFO queue and at most one worker thread. The
//! session's read loop enqueues without blocking; the worker drains the
//! queue and invokes the registered handler, so a slow handler stalls only
//! its own category. Workers are provisioned on demand — the server requests
//! one before the first event of a category — and stopped cooperatively at
//! their queue-wait point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use gpsbridge_wire::{Category, Frame};
use tracing::{debug, warn};

/// An installed upper-layer event handler for one category.
pub type EventHandler = Arc<dyn Fn(Frame) + Send + Sync>;

/// How to stop category workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Finish delivering everything already queued, then exit.
    Drain,
    /// Exit at the next queue-wait point; queued frames are dropped.
    /// Events still in flight at stop time are delivered at most once.
    Abandon,
}

struct Lane {
    tx: Mutex<Option<Sender<Frame>>>,
    /// Parked until the category is provisioned.
    rx: Mutex<Option<Receiver<Frame>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    handler: Arc<Mutex<Option<EventHandler>>>,
    abandon: Arc<AtomicBool>,
}

impl Lane {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
            handler: Arc::new(Mutex::new(None)),
            abandon: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Routes event frames to per-category worker threads.
///
/// Queues exist from construction, so events arriving before their worker is
/// provisioned are buffered and delivered once it starts.
pub struct CallbackRouter {
    lanes: [Lane; 5],
}

impl Default for CallbackRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackRouter {
    pub fn new() -> Self {
        Self {
            lanes: std::array::from_fn(|_| Lane::new()),
        }
    }

    fn lane(&self, category: Category) -> &Lane {
        &self.lanes[category.index()]
    }

    /// Install the handler invoked by `category`'s worker.
    pub fn register(&self, category: Category, handler: EventHandler) {
        *self.lane(category).handler.lock().unwrap() = Some(handler);
    }

    /// Remove the handler for `category`. Frames delivered afterwards are
    /// dropped with a warning.
    pub fn clear(&self, category: Category) {
        *self.lane(category).handler.lock().unwrap() = None;
    }

    /// Enqueue a frame for delivery on `category`. Non-blocking; FIFO within
    /// the category.
    pub fn route(&self, category: Category, frame: Frame) {
        let guard = self.lane(category).tx.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => {
                // Send only fails when the receiver is gone, i.e. stopped.
                if tx.send(frame).is_err() {
                    debug!(%category, "category stopped; dropping event");
                }
            }
            None => debug!(%category, "category stopped; dropping event"),
        }
    }

    /// Spawn the worker thread for `category`.
    ///
    /// The worker is spawned at most once; repeated requests are ignored, as
    /// are requests arriving after the router stopped.
    pub fn provision(&self, category: Category) -> bool {
        let lane = self.lane(category);
        let Some(rx) = lane.rx.lock().unwrap().take() else {
            debug!(%category, "worker already provisioned; ignoring request");
            return false;
        };

        let handler = Arc::clone(&lane.handler);
        let abandon = Arc::clone(&lane.abandon);
        let spawned = std::thread::Builder::new()
            .name(format!("gpsbridge-{category}"))
            .spawn(move || worker_loop(category, rx, handler, abandon));

        match spawned {
            Ok(worker) => {
                *lane.worker.lock().unwrap() = Some(worker);
                debug!(%category, "provisioned category worker");
                true
            }
            Err(err) => {
                warn!(%category, %err, "failed to spawn category worker");
                false
            }
        }
    }

    /// Whether `category`'s worker has been provisioned.
    pub fn is_provisioned(&self, category: Category) -> bool {
        self.lane(category).worker.lock().unwrap().is_some()
    }

    /// Stop one category: signal its worker and join it.
    pub fn stop(&self, category: Category, mode: StopMode) {
        let lane = self.lane(category);
        if mode == StopMode::Abandon {
            lane.abandon.store(true, Ordering::SeqCst);
        }
        // Dropping the sender ends the worker's recv loop once the queue is
        // empty (Drain) or at the next wakeup (Abandon).
        lane.tx.lock().unwrap().take();
        lane.rx.lock().unwrap().take();
        if let Some(worker) = lane.worker.lock().unwrap().take() {
            if worker.join().is_err() {
                warn!(%category, "category worker panicked");
            }
        }
        *lane.handler.lock().unwrap() = None;
    }

    /// Stop every category worker and clear all handlers.
    pub fn stop_all(&self, mode: StopMode) {
        for category in Category::ALL {
            self.stop(category, mode);
        }
    }
}

fn worker_loop(
    category: Category,
    rx: Receiver<Frame>,
    handler: Arc<Mutex<Option<EventHandler>>>,
    abandon: Arc<AtomicBool>,
) {
    debug!(%category, "category worker running");
    while let Ok(frame) = rx.recv() {
        if abandon.load(Ordering::SeqCst) {
            break;
        }
        let installed = handler.lock().unwrap().clone();
        match installed {
            Some(handler) => handler(frame),
            None => warn!(
                %category,
                code = frame.code_name(),
                "no handler registered; dropping event"
            ),
        }
    }
    debug!(%category, "category worker exiting");
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use gpsbridge_wire::{OpCode, Payload};

    use super::*;

    fn numbered_frame(n: u32) -> Frame {
        let mut payload = Payload::new();
        payload.writer().put_u32(n).unwrap();
        Frame::with_payload(OpCode::GpsSetCapabilities, payload)
    }

    #[test]
    fn delivery_preserves_fifo_order() {
        const COUNT: u32 = 10_000;

        let router = CallbackRouter::new();
        let (tx, rx) = mpsc::channel();
        router.register(
            Category::Gps,
            Arc::new(move |frame: Frame| {
                let n = frame.payload.reader().get_u32().unwrap();
                tx.send(n).unwrap();
            }),
        );
        router.provision(Category::Gps);

        for n in 0..COUNT {
            router.route(Category::Gps, numbered_frame(n));
        }

        for expected in 0..COUNT {
            let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(got, expected);
        }

        router.stop_all(StopMode::Drain);
    }

    #[test]
    fn events_buffered_until_provisioned() {
        let router = CallbackRouter::new();
        let (tx, rx) = mpsc::channel();
        router.register(
            Category::Ni,
            Arc::new(move |frame: Frame| {
                tx.send(frame.payload.reader().get_u32().unwrap()).unwrap();
            }),
        );

        router.route(Category::Ni, numbered_frame(1));
        router.route(Category::Ni, numbered_frame(2));
        assert!(rx.try_recv().is_err());

        router.provision(Category::Ni);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 1);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 2);

        router.stop_all(StopMode::Drain);
    }

    #[test]
    fn duplicate_provision_is_ignored() {
        let router = CallbackRouter::new();
        assert!(router.provision(Category::Xtra));
        assert!(!router.provision(Category::Xtra));
        assert!(router.is_provisioned(Category::Xtra));
        router.stop_all(StopMode::Drain);
    }

    #[test]
    fn unhandled_event_is_dropped_not_fatal() {
        let router = CallbackRouter::new();
        router.provision(Category::Agps);
        router.route(Category::Agps, numbered_frame(9));

        // Register after the drop; later events still flow.
        let (tx, rx) = mpsc::channel();
        router.register(
            Category::Agps,
            Arc::new(move |frame: Frame| {
                tx.send(frame.payload.reader().get_u32().unwrap()).unwrap();
            }),
        );
        router.route(Category::Agps, numbered_frame(10));
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 10);

        router.stop_all(StopMode::Drain);
    }

    #[test]
    fn drain_stop_delivers_queued_frames() {
        let router = CallbackRouter::new();
        let (tx, rx) = mpsc::channel();
        router.register(
            Category::Gps,
            Arc::new(move |frame: Frame| {
                tx.send(frame.payload.reader().get_u32().unwrap()).unwrap();
            }),
        );

        for n in 0..64 {
            router.route(Category::Gps, numbered_frame(n));
        }
        router.provision(Category::Gps);
        router.stop(Category::Gps, StopMode::Drain);

        let received: Vec<u32> = rx.try_iter().collect();
        assert_eq!(received, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn route_after_stop_is_dropped() {
        let router = CallbackRouter::new();
        router.provision(Category::Ril);
        router.stop(Category::Ril, StopMode::Drain);
        // Must not panic or block.
        router.route(Category::Ril, numbered_frame(1));
    }

    #[test]
    fn stop_without_provision_is_clean() {
        let router = CallbackRouter::new();
        router.stop_all(StopMode::Abandon);
    }

    #[test]
    fn categories_run_independently() {
        let router = CallbackRouter::new();

        let (gps_tx, gps_rx) = mpsc::channel();
        let (ni_tx, ni_rx) = mpsc::channel();
        let gate = Arc::new(Mutex::new(()));

        // Block the gps worker while ni keeps delivering.
        let held = gate.lock().unwrap();
        {
            let gate = Arc::clone(&gate);
            router.register(
                Category::Gps,
                Arc::new(move |_f: Frame| {
                    let _g = gate.lock().unwrap();
                    gps_tx.send(()).unwrap();
                }),
            );
        }
        router.register(
            Category::Ni,
            Arc::new(move |_f: Frame| {
                ni_tx.send(()).unwrap();
            }),
        );
        router.provision(Category::Gps);
        router.provision(Category::Ni);

        router.route(Category::Gps, numbered_frame(0));
        router.route(Category::Ni, numbered_frame(0));

        assert!(ni_rx.recv_timeout(Duration::from_secs(1)).is_ok());
        assert!(gps_rx.try_recv().is_err(), "gps worker should be blocked");

        drop(held);
        assert!(gps_rx.recv_timeout(Duration::from_secs(1)).is_ok());

        router.stop_all(StopMode::Drain);
    }
}
