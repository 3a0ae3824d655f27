//! Configuration module for keyweave.
//!
//! Two kinds of configuration live here:
//! - the automation document (`ConfigValue`), a generic structured value the
//!   compiler turns into an expression tree
//! - `EngineOptions`, the knobs of the engine that runs it
//!
//! Example:
//! use keyweave::config::load_from_path;
//!
//! let doc = load_from_path("scripts/spam.json")?;

pub mod loader;
pub mod models;

/// Parsed document: booleans, numbers, strings, sequences and string-keyed mappings.
pub type ConfigValue = serde_json::Value;

// Re-export core data models
pub use models::{DEFAULT_LISTENER_CAPACITY, EngineOptions};

// Re-export loader utilities
pub use loader::{
    load_from_path, load_from_path_async, load_from_reader, load_from_str, validate_document,
};
