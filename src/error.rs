//! Error types for compilation and evaluation.
//!
//! Structural problems in a document are `CompileError`s and abort compilation.
//! Value problems found while evaluating are `EvalError`s and abort the evaluation
//! that hit them.

use std::fmt;

use thiserror::Error;

use crate::backend::SendError;

/// A value that does not match the grammar its field expects.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("cannot parse {value} as an input")]
    Input { value: String },

    #[error("integer input {value} is not a digit (0-9)")]
    Digit { value: String },

    #[error("cannot parse {value} as a frequency")]
    Frequency { value: String },

    #[error("cannot parse {value} as a duration: {reason}")]
    Duration { value: String, reason: String },

    #[error("duration {value} must be positive")]
    NonPositiveDuration { value: String },

    #[error("file path must be a string, got {value}")]
    Path { value: String },
}

/// What went wrong structurally, without the nesting trail.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileErrorKind {
    #[error("unrecognized element {0}")]
    Unrecognized(String),

    #[error("invalid key `{0}`")]
    InvalidKey(String),

    #[error("`{0}` expects a mapping")]
    ExpectedMapping(&'static str),

    #[error("`{0}` expects a mapping or a sequence")]
    ExpectedMappingOrSequence(&'static str),

    #[error("missing `{0}`")]
    MissingField(&'static str),

    #[error("must contain either `until` or `for`")]
    MissingBound,

    #[error("bad value for `{field}`: {source}")]
    Value {
        field: &'static str,
        source: ValueError,
    },

    #[error("cannot include `{path}`: {reason}")]
    Include { path: String, reason: String },

    #[error("includes nested deeper than {0} levels")]
    IncludeDepth(usize),
}

/// Structural compile error with the chain of keys/indices it was found under.
///
/// Displays as the error followed by one `\n\tfrom <context>` line per level,
/// innermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    kind: CompileErrorKind,
    trail: Vec<String>,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind) -> Self {
        Self {
            kind,
            trail: Vec::new(),
        }
    }

    pub fn kind(&self) -> &CompileErrorKind {
        &self.kind
    }

    /// Contexts from innermost to outermost.
    pub fn trail(&self) -> &[String] {
        &self.trail
    }

    /// Record that the error surfaced under mapping key `key`.
    pub fn from_key(mut self, key: &str) -> Self {
        self.trail.push(format!("`{key}`"));
        self
    }

    /// Record that the error surfaced at sequence position `index`.
    pub fn from_index(mut self, index: usize) -> Self {
        self.trail.push(format!("[{index}]"));
        self
    }

    /// Record that the error surfaced while compiling an included file.
    pub fn from_file(mut self, path: &str) -> Self {
        self.trail.push(format!("file `{path}`"));
        self
    }
}

impl From<CompileErrorKind> for CompileError {
    fn from(kind: CompileErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for ctx in &self.trail {
            write!(f, "\n\tfrom {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            CompileErrorKind::Value { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failure while evaluating an expression.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("bad value for `{field}`: {source}")]
    Value {
        field: &'static str,
        #[source]
        source: ValueError,
    },

    #[error("cannot include `{path}`: {reason}")]
    Include { path: String, reason: String },

    #[error(transparent)]
    Send(#[from] SendError),
}

impl EvalError {
    pub fn value(field: &'static str, source: ValueError) -> Self {
        Self::Value { field, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trail_rendering() {
        let err = CompileError::new(CompileErrorKind::MissingField("at")).from_key("repeat");
        assert_eq!(err.to_string(), "missing `at`\n\tfrom `repeat`");

        let nested = CompileError::new(CompileErrorKind::InvalidKey("frobnicate".into()))
            .from_index(2)
            .from_key("do");
        assert_eq!(
            nested.to_string(),
            "invalid key `frobnicate`\n\tfrom [2]\n\tfrom `do`"
        );
        assert_eq!(nested.trail().len(), 2);
    }
}
