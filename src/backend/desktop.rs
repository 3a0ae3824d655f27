//! Desktop backend: real input injection through enigo.
//!
//! Enigo is created and driven on a dedicated injector thread, so the backend can
//! be shared across tasks without requiring the platform handle to be `Send`.
//! `send` validates the flag synchronously and queues the injection; failures
//! reported by enigo are logged on the injector thread.
//!
//! Observed input is read from stdin (`StdinSource`). Global capture hooks are
//! platform specific and live outside this crate.

use std::sync::mpsc::{Sender, channel, sync_channel};
use std::thread;

use enigo::{Button, Direction, Enigo, Keyboard as _, Mouse as _, Settings};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace};

use super::{BackendError, InputBackend, SendError, StdinSource, check_flag};
use crate::input::{Flag, Input};

/// Injects through enigo, observes from stdin.
pub struct DesktopBackend {
    injector: Mutex<Option<Sender<Input>>>,
    source: StdinSource,
}

impl Default for DesktopBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopBackend {
    pub fn new() -> Self {
        Self {
            injector: Mutex::new(None),
            source: StdinSource::new(),
        }
    }

    fn spawn_injector(&self) -> Result<Sender<Input>, BackendError> {
        let (tx, rx) = channel::<Input>();
        let (ready_tx, ready_rx) = sync_channel::<Result<(), String>>(1);

        thread::Builder::new()
            .name("keyweave-injector".into())
            .spawn(move || {
                let mut enigo = match Enigo::new(&Settings::default()) {
                    Ok(enigo) => {
                        let _ = ready_tx.send(Ok(()));
                        enigo
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                trace!(target: "keyweave::backend", "Injector thread started");
                while let Ok(input) = rx.recv() {
                    if let Err(e) = inject(&mut enigo, input) {
                        error!(
                            target: "keyweave::backend",
                            key = input.key, flag = ?input.flag, error = %e,
                            "Injection failed"
                        );
                    }
                }
                trace!(target: "keyweave::backend", "Injector thread ended");
            })
            .map_err(|e| self.init_error(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(tx),
            Ok(Err(reason)) => Err(self.init_error(reason)),
            Err(_) => Err(self.init_error("injector thread exited during startup".into())),
        }
    }

    fn init_error(&self, reason: String) -> BackendError {
        BackendError::Init {
            backend: self.name(),
            reason,
        }
    }
}

fn inject(enigo: &mut Enigo, input: Input) -> enigo::InputResult<()> {
    match input.flag {
        Flag::KeyDown => enigo.raw(input.key, Direction::Press),
        Flag::KeyUp => enigo.raw(input.key, Direction::Release),
        Flag::MouseLeftDown => enigo.button(Button::Left, Direction::Press),
        Flag::MouseLeftUp => enigo.button(Button::Left, Direction::Release),
        Flag::MouseRightDown => enigo.button(Button::Right, Direction::Press),
        Flag::MouseRightUp => enigo.button(Button::Right, Direction::Release),
        // Rejected by `check_flag` before queueing.
        Flag::Unset => Ok(()),
    }
}

impl InputBackend for DesktopBackend {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn init(&self) -> Result<(), BackendError> {
        let mut injector = self.injector.lock();
        if injector.is_none() {
            *injector = Some(self.spawn_injector()?);
            info!(target: "keyweave::backend", "Desktop backend initialized");
        }
        Ok(())
    }

    fn teardown(&self) {
        // Dropping the sender ends the injector thread.
        if self.injector.lock().take().is_some() {
            debug!(target: "keyweave::backend", "Desktop backend torn down");
        }
    }

    fn next_event(&self) -> Option<Input> {
        self.source.next_event()
    }

    fn send(&self, input: Input) -> Result<(), SendError> {
        check_flag(input)?;
        let injector = self.injector.lock();
        let tx = injector
            .as_ref()
            .ok_or_else(|| SendError::Unavailable("backend is not initialized".into()))?;
        trace!(target: "keyweave::backend", key = input.key, flag = ?input.flag, "send");
        tx.send(input)
            .map_err(|_| SendError::Unavailable("injector thread has stopped".into()))
    }
}
