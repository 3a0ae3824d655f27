/*!
Input backends.

A backend is the engine's only contact with the operating system:
- it observes global input (`next_event`), pulled by the dispatcher's loop
- it injects synthetic input (`send`), called by `press`/`hold`/`release`

Implementations:
- `DesktopBackend` (`desktop.rs`): injects through enigo; observes events read
  from stdin (see `stdin_source.rs`)
- `RecordingBackend` (`recording.rs`): logs and records every send instead of
  injecting; events are pushed in with `inject`. Used for `--dry-run` and tests.
*/

use thiserror::Error;

use crate::input::{Flag, Input};

pub mod desktop;
pub mod recording;
pub mod stdin_source;

pub use desktop::DesktopBackend;
pub use recording::RecordingBackend;
pub use stdin_source::{StdinSource, parse_event_line};

/// Returned by `InputBackend::send`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("invalid flag {flag:?} for key {key:#04x}")]
    InvalidFlag { key: u16, flag: Flag },

    #[error("input injection is unavailable: {0}")]
    Unavailable(String),
}

/// Returned by `InputBackend::init`.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to initialize {backend} backend: {reason}")]
    Init {
        backend: &'static str,
        reason: String,
    },
}

/// Contract between the engine and the platform input layer.
///
/// `init`/`teardown` bracket the period during which `next_event` yields observed
/// input. `next_event` blocks; it returns `None` once the backend has no more
/// input (end of stream or torn down), which ends the dispatcher's loop.
pub trait InputBackend: Send + Sync {
    /// Static human-readable identifier (used in logs).
    fn name(&self) -> &'static str;

    /// Start observing global input.
    fn init(&self) -> Result<(), BackendError>;

    /// Stop observing global input. Must unblock or eventually end `next_event`.
    fn teardown(&self);

    /// Block until the next observed input.
    fn next_event(&self) -> Option<Input>;

    /// Inject one synthetic input.
    fn send(&self, input: Input) -> Result<(), SendError>;
}

/// Reject transitions no backend can inject.
pub(crate) fn check_flag(input: Input) -> Result<(), SendError> {
    if input.flag == Flag::Unset {
        return Err(SendError::InvalidFlag {
            key: input.key,
            flag: input.flag,
        });
    }
    Ok(())
}
