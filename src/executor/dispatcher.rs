use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use parking_lot::RwLock;
use tokio::sync::mpsc::{Sender, error::TrySendError};
use tracing::{debug, info, trace};

use crate::backend::{BackendError, InputBackend};
use crate::input::Input;

#[derive(Default)]
struct Listeners {
    by_input: HashMap<Input, Vec<Sender<Input>>>,
    catch_all: Vec<Sender<Input>>,
}

impl Listeners {
    /// Senders whose receiver is still alive.
    fn len(&self) -> usize {
        self.by_input
            .values()
            .flatten()
            .chain(&self.catch_all)
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

/// Fans observed input out to registered listener channels.
///
/// Delivery never blocks: a listener whose channel is full misses the event.
/// Registrations live until `teardown`.
pub struct Dispatcher {
    backend: Arc<dyn InputBackend>,
    listeners: RwLock<Listeners>,
    running: AtomicBool,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn InputBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            listeners: RwLock::new(Listeners::default()),
            running: AtomicBool::new(false),
        })
    }

    /// Start the backend and the thread pumping its events into `dispatch`.
    ///
    /// Calling it on a running dispatcher does nothing.
    pub fn init(self: &Arc<Self>) -> Result<(), BackendError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(err) = self.backend.init() {
            self.running.store(false, Ordering::SeqCst);
            return Err(err);
        }

        let this = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("keyweave-dispatch".into())
            .spawn(move || this.pump());
        if let Err(err) = spawned {
            self.running.store(false, Ordering::SeqCst);
            self.backend.teardown();
            return Err(BackendError::Init {
                backend: self.backend.name(),
                reason: format!("cannot spawn dispatch thread: {err}"),
            });
        }

        info!(target: "keyweave::dispatch", backend = self.backend.name(), "Dispatcher started");
        Ok(())
    }

    fn pump(&self) {
        while let Some(event) = self.backend.next_event() {
            if !self.is_running() {
                break;
            }
            self.dispatch(event);
        }
        debug!(target: "keyweave::dispatch", "Event source finished");
    }

    /// Deliver `event` to every listener registered for it and every catch-all
    /// listener. Returns how many listeners took it.
    pub fn dispatch(&self, event: Input) -> usize {
        let listeners = self.listeners.read();
        let targets = listeners
            .by_input
            .get(&event)
            .into_iter()
            .flatten()
            .chain(&listeners.catch_all);

        let mut delivered = 0;
        for tx in targets {
            match tx.try_send(event) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    trace!(target: "keyweave::dispatch", key = event.key, flag = ?event.flag, "Listener busy; event dropped");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        trace!(target: "keyweave::dispatch", key = event.key, flag = ?event.flag, delivered, "Dispatched");
        delivered
    }

    /// Subscribe `tx` to events exactly equal to `trigger`.
    ///
    /// Senders whose receiver is gone are pruned first; registering the same
    /// channel twice for one input is a no-op.
    pub fn register(&self, trigger: Input, tx: Sender<Input>) {
        let mut listeners = self.listeners.write();
        let slot = listeners.by_input.entry(trigger).or_default();
        add_sender(slot, tx);
        debug!(
            target: "keyweave::dispatch",
            key = trigger.key, flag = ?trigger.flag, listeners = slot.len(),
            "Registered listener"
        );
    }

    /// Subscribe `tx` to every observed event.
    pub fn register_catch_all(&self, tx: Sender<Input>) {
        let mut listeners = self.listeners.write();
        add_sender(&mut listeners.catch_all, tx);
        debug!(target: "keyweave::dispatch", listeners = listeners.catch_all.len(), "Registered catch-all listener");
    }

    /// Stop the backend and drop every registration, closing all listener channels.
    pub fn teardown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.backend.teardown();
        }
        let mut listeners = self.listeners.write();
        let dropped = listeners.len();
        *listeners = Listeners::default();
        if dropped > 0 {
            info!(target: "keyweave::dispatch", listeners = dropped, "Dispatcher torn down");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of live registrations (an input registered for N channels counts N).
    ///
    /// Registrations whose receiver was dropped are not counted, even before the
    /// next `register` prunes them.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

fn add_sender(slot: &mut Vec<Sender<Input>>, tx: Sender<Input>) {
    slot.retain(|existing| !existing.is_closed());
    if !slot.iter().any(|existing| existing.same_channel(&tx)) {
        slot.push(tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::input::{Flag, vk};
    use tokio::sync::mpsc::{self, error::TryRecvError};

    const A_DOWN: Input = Input::new(vk::LETTER_A, Flag::KeyDown);
    const A_UP: Input = Input::new(vk::LETTER_A, Flag::KeyUp);

    fn dispatcher() -> (Arc<RecordingBackend>, Arc<Dispatcher>) {
        let backend = Arc::new(RecordingBackend::new());
        let dispatcher = Dispatcher::new(backend.clone());
        (backend, dispatcher)
    }

    #[test]
    fn test_fan_out_to_every_listener() {
        let (_, d) = dispatcher();
        let (tx1, mut rx1) = mpsc::channel(1);
        let (tx2, mut rx2) = mpsc::channel(1);
        d.register(A_DOWN, tx1);
        d.register(A_DOWN, tx2);

        assert_eq!(d.dispatch(A_DOWN), 2);
        assert_eq!(rx1.try_recv().unwrap(), A_DOWN);
        assert_eq!(rx2.try_recv().unwrap(), A_DOWN);
    }

    #[test]
    fn test_matching_is_exact_on_flag() {
        let (_, d) = dispatcher();
        let (tx, mut rx) = mpsc::channel(1);
        d.register(A_DOWN, tx);

        assert_eq!(d.dispatch(A_UP), 0);
        assert_eq!(d.dispatch(Input::new(vk::LETTER_A + 1, Flag::KeyDown)), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_listener_does_not_block_others() {
        let (_, d) = dispatcher();
        let (busy_tx, mut busy_rx) = mpsc::channel(1);
        let (idle_tx, mut idle_rx) = mpsc::channel(1);
        d.register(A_DOWN, busy_tx);
        d.register(A_DOWN, idle_tx);

        assert_eq!(d.dispatch(A_DOWN), 2);
        idle_rx.try_recv().unwrap();
        // busy still holds the first event; the second is dropped for it only
        assert_eq!(d.dispatch(A_DOWN), 1);
        assert_eq!(idle_rx.try_recv().unwrap(), A_DOWN);
        busy_rx.try_recv().unwrap();
        assert!(busy_rx.try_recv().is_err());
    }

    #[test]
    fn test_catch_all_sees_everything() {
        let (_, d) = dispatcher();
        let (tx, mut rx) = mpsc::channel(4);
        d.register_catch_all(tx);

        d.dispatch(A_DOWN);
        d.dispatch(A_UP);
        assert_eq!(rx.try_recv().unwrap(), A_DOWN);
        assert_eq!(rx.try_recv().unwrap(), A_UP);
    }

    #[test]
    fn test_register_prunes_and_dedupes() {
        let (_, d) = dispatcher();
        let (gone_tx, gone_rx) = mpsc::channel(1);
        let (tx, _rx) = mpsc::channel(1);
        d.register(A_DOWN, gone_tx);
        drop(gone_rx);

        d.register(A_DOWN, tx.clone());
        d.register(A_DOWN, tx);
        assert_eq!(d.listener_count(), 1);
    }

    #[test]
    fn test_dropped_receivers_are_not_counted() {
        let (_, d) = dispatcher();
        let (tx, rx) = mpsc::channel(1);
        let (catch_tx, catch_rx) = mpsc::channel(1);
        d.register(A_DOWN, tx.clone());
        d.register(A_UP, tx);
        d.register_catch_all(catch_tx);
        assert_eq!(d.listener_count(), 3);

        drop(rx);
        assert_eq!(d.listener_count(), 1);
        drop(catch_rx);
        assert_eq!(d.listener_count(), 0);
    }

    #[test]
    fn test_teardown_closes_listener_channels() {
        let (_, d) = dispatcher();
        let (tx, mut rx) = mpsc::channel(1);
        d.register(A_DOWN, tx);
        d.teardown();

        assert_eq!(d.listener_count(), 0);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
        assert_eq!(d.dispatch(A_DOWN), 0);
    }

    #[test]
    fn test_pump_delivers_backend_events() {
        let (backend, d) = dispatcher();
        let (tx, mut rx) = mpsc::channel(1);
        d.register(A_DOWN, tx);
        d.init().unwrap();
        d.init().unwrap();
        assert!(d.is_running());

        backend.inject(A_DOWN);
        assert_eq!(rx.blocking_recv(), Some(A_DOWN));

        d.teardown();
        assert!(!d.is_running());
        assert_eq!(rx.blocking_recv(), None);
    }
}
