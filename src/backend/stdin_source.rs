//! Stdin event source.
//!
//! Reads observed input as newline-delimited JSON from standard input.
//!
//! Each non-empty line is one event, in either form:
//! - `{"key": 65, "flag": "key_down"}`: raw key code and flag
//! - `{"input": "a down"}`: a lexicon name; an unset flag defaults to `key_down`
//!
//! Malformed lines are logged with `warn!` and skipped; reading continues.
//! End of file ends the stream.
//!
//! Reads are blocking. The source is meant to be drained from the dispatcher's
//! dedicated thread, never from an async task.

use std::io::{self, BufRead};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{info, trace, warn};

use crate::input::{Flag, Input, lexicon};

/// One line of observed input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventLine {
    Raw { key: u16, flag: Flag },
    Named { input: String },
}

/// Parse a single NDJSON line into an observed input.
pub fn parse_event_line(line: &str) -> Result<Input> {
    let parsed: EventLine =
        serde_json::from_str(line).context("Failed to parse event line as JSON")?;
    match parsed {
        EventLine::Raw { key, flag } => Ok(Input::new(key, flag)),
        EventLine::Named { input } => lexicon::lookup(&input)
            .map(|i| i.with_default(Flag::KeyDown))
            .ok_or_else(|| anyhow!("Unknown input name '{input}'")),
    }
}

/// Blocking reader of observed input lines from stdin.
#[derive(Debug, Clone, Default)]
pub struct StdinSource;

impl StdinSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Block until the next well-formed event, or `None` at end of input.
    pub fn next_event(&self) -> Option<Input> {
        let mut line = String::new();
        let stdin = io::stdin();
        let mut reader = stdin.lock();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => {
                    info!(target: "keyweave::sources", "EOF on stdin; no more observed input");
                    return None;
                }
                Ok(_) => {
                    let raw = line.trim();
                    if raw.is_empty() {
                        continue;
                    }
                    match parse_event_line(raw) {
                        Ok(event) => {
                            trace!(target: "keyweave::sources", ?event, "Observed input from stdin");
                            return Some(event);
                        }
                        Err(e) => {
                            warn!(
                                target: "keyweave::sources",
                                error = %e,
                                line = raw,
                                "Failed to parse stdin event line"
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        target: "keyweave::sources",
                        error = %e,
                        "Error reading from stdin; ending observed input"
                    );
                    return None;
                }
            }
        }
    }
}
