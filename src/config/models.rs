use serde::{Deserialize, Serialize};

use crate::compiler::CompileOptions;

/// Default queue of a `do` listener: nothing is queued while its action runs.
pub const DEFAULT_LISTENER_CAPACITY: usize = 0;

/// Engine-wide settings.
///
/// Filled from the command line by the binary; deserializable so embedders can
/// keep them next to their own configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineOptions {
    /// Log synthetic input instead of injecting it.
    pub dry_run: bool,

    /// Reject static operands with bad values (`at: "banana"`) at compile time
    /// instead of when the branch is evaluated.
    pub strict_values: bool,

    /// Events each `do` listener may queue while its action is running. With the
    /// default of 0 a listener only takes events while it is idle; anything that
    /// arrives mid-action is dropped for that listener.
    pub listener_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            strict_values: false,
            listener_capacity: DEFAULT_LISTENER_CAPACITY,
        }
    }
}

impl EngineOptions {
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            strict_values: self.strict_values,
        }
    }

    pub fn listener_capacity(&self) -> usize {
        self.listener_capacity
    }
}
