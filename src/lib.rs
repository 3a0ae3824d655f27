#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! keyweave: compile declarative input-automation documents into a reactive
//! keyboard/mouse engine.
//!
//! A document (JSON) describes what to send and when: `press`, `hold` and
//! `release` inject input, `do` binds actions to observed input, `repeat` runs an
//! action at a fixed rate, `file` pulls in another document. The modules:
//! - `config`: document loader and engine options.
//! - `input`: keys, flags, the input lexicon and value grammars.
//! - `compiler`: document -> expression tree, static folding, evaluation.
//! - `executor`: dispatcher, repeat loop, runtime and engine lifecycle.
//! - `backend`: the platform input boundary (enigo injection, dry-run recording).
//! - `error`: compile and evaluation errors.
//!
//! Use `keyweave::prelude::*` to bring commonly used items into scope quickly.

/// Public module: platform input backends.
pub mod backend;
/// Public module: document compiler and expression tree.
pub mod compiler;
/// Public module: configuration (document loader, engine options).
pub mod config;
/// Public module: error types.
pub mod error;
/// Public module: execution engine (dispatcher, repeat, runtime).
pub mod executor;
/// Public module: input model and lexicon.
pub mod input;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version (e.g., "0.1.0").
#[inline]
pub const fn version() -> &'static str {
    PKG_VERSION
}

/// Parse a plain level name (trace|debug|info|warn|error), case-insensitively.
pub fn parse_level(s: &str) -> Option<tracing::Level> {
    use tracing::Level;

    match s.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize tracing (logging) with a reasonable default.
/// - Honors the `RUST_LOG` environment variable if set.
/// - Falls back to `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(tracing::Level::INFO);
    init_tracing_with(level);
}

/// Initialize tracing at a fixed level, ignoring `RUST_LOG`.
pub fn init_tracing_with(level: tracing::Level) {
    // Ignore the error if the global subscriber was already set.
    let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use keyweave::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use anyhow::{Context, Error, Result, anyhow, bail, ensure};

    // Serialization
    pub use serde::{Deserialize, Serialize};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    // Timing helpers
    pub use std::time::Duration;

    // External crates (namespaced) if callers want direct access
    pub use crate as keyweave;
    pub use enigo;

    // Core types
    pub use crate::backend::{DesktopBackend, InputBackend, RecordingBackend};
    pub use crate::compiler::{CompileOptions, Compiler, Expression, compile};
    pub use crate::config::{ConfigValue, EngineOptions};
    pub use crate::error::{CompileError, EvalError, ValueError};
    pub use crate::executor::{Dispatcher, Engine, RepeatSession, Runtime};
    pub use crate::input::{Flag, Input, InputSpec};

    // Frequently used internal modules
    pub use crate::{backend, compiler, config, executor, input};
}
