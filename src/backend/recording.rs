//! Recording backend.
//!
//! Nothing reaches the operating system. Every send is validated, logged as
//! `DRY-RUN` and appended to an in-memory log; observed input comes from whatever
//! is pushed with `inject`.

use std::sync::mpsc::{Receiver, Sender, channel};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{BackendError, InputBackend, SendError, check_flag};
use crate::input::Input;

/// Backend that records sends and replays injected events.
pub struct RecordingBackend {
    sent: Mutex<Vec<Input>>,
    events_tx: Sender<Option<Input>>,
    events_rx: Mutex<Receiver<Option<Input>>>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        let (events_tx, events_rx) = channel();
        Self {
            sent: Mutex::new(Vec::new()),
            events_tx,
            events_rx: Mutex::new(events_rx),
        }
    }

    /// Queue an observed input for the dispatcher to pick up.
    pub fn inject(&self, event: Input) {
        // The receiver lives as long as `self`.
        let _ = self.events_tx.send(Some(event));
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<Input> {
        self.sent.lock().clone()
    }

    /// Forget everything sent so far.
    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl InputBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn init(&self) -> Result<(), BackendError> {
        debug!(target: "keyweave::backend", "Recording backend ready");
        Ok(())
    }

    fn teardown(&self) {
        // Wake a dispatcher blocked in `next_event`.
        let _ = self.events_tx.send(None);
    }

    fn next_event(&self) -> Option<Input> {
        self.events_rx.lock().recv().ok().flatten()
    }

    fn send(&self, input: Input) -> Result<(), SendError> {
        check_flag(input)?;
        info!(target: "keyweave::backend", key = input.key, flag = ?input.flag, "DRY-RUN send");
        self.sent.lock().push(input);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Flag;

    #[test]
    fn test_records_sends_in_order() {
        let backend = RecordingBackend::new();
        backend.send(Input::new(0x41, Flag::KeyDown)).unwrap();
        backend.send(Input::new(0x41, Flag::KeyUp)).unwrap();
        assert_eq!(
            backend.sent(),
            vec![Input::new(0x41, Flag::KeyDown), Input::new(0x41, Flag::KeyUp)]
        );
        backend.clear();
        assert!(backend.sent().is_empty());
    }

    #[test]
    fn test_unset_flag_is_rejected() {
        let backend = RecordingBackend::new();
        let err = backend.send(Input::new(0x41, Flag::Unset)).unwrap_err();
        assert!(matches!(err, SendError::InvalidFlag { .. }));
        assert!(backend.sent().is_empty());
    }

    #[test]
    fn test_injected_events_then_teardown() {
        let backend = RecordingBackend::new();
        backend.inject(Input::new(0x41, Flag::KeyDown));
        backend.teardown();
        assert_eq!(backend.next_event(), Some(Input::new(0x41, Flag::KeyDown)));
        assert_eq!(backend.next_event(), None);
    }
}
