/*!
Compiler: document -> expression tree.

Recognized mapping keys:

| Key | Value |
|---|---|
| `do` | mapping with optional `on`, remaining keys are the action; or a sequence |
| `repeat` | mapping with `at` and at least one of `for`/`until`, remaining keys are the action |
| `press` / `hold` / `release` | an input expression |
| `file` | a path expression |

A mapping with one key compiles to that key's node; with several keys it is an
aggregate evaluating every node, in ascending key order. Literals compile to
themselves, sequences to sequences. Static sub-trees are folded at compile time.

Structural errors abort compilation and carry the trail of keys and indices
they were found under. Bad values in otherwise well-formed nodes are reported
when the node is evaluated, unless `CompileOptions::strict_values` is set.
*/

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::config::{ConfigValue, loader};
use crate::error::{CompileError, CompileErrorKind, ValueError};
use crate::input::{parse_duration, parse_frequency};

pub mod expr;

pub use expr::{DoExpr, EvalFuture, Expression, FileInclude, Operand, RepeatExpr};

use expr::{hold_input, press_input, release_input, trigger_input};

/// Maximum nesting of `file` includes (protects against include cycles).
pub const MAX_INCLUDE_DEPTH: usize = 64;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Reject static operands whose value fails its grammar.
    pub strict_values: bool,
}

/// Compiles documents, including the ones pulled in by `file`.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
    depth: usize,
}

/// Compile `doc` with default options.
pub fn compile(doc: &ConfigValue) -> Result<Expression, CompileError> {
    Compiler::default().compile(doc)
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options, depth: 0 }
    }

    pub fn options(&self) -> CompileOptions {
        self.options
    }

    /// Compile a document into an expression.
    pub fn compile(&self, doc: &ConfigValue) -> Result<Expression, CompileError> {
        match doc {
            Value::Bool(_) | Value::Number(_) | Value::String(_) => Ok(Expression::Literal(doc.clone())),
            Value::Array(items) => self.compile_sequence(items),
            Value::Object(map) => self.compile_actions(map.iter().collect()),
            Value::Null => Err(CompileErrorKind::Unrecognized(doc.to_string()).into()),
        }
    }

    /// Load and compile the document at `path`, one include level deeper.
    pub fn compile_file(&self, path: &str) -> Result<Expression, CompileError> {
        let nested = self.nested()?;
        let doc = loader::load_from_path(Path::new(path)).map_err(|e| load_failure(path, &e))?;
        nested.compile(&doc).map_err(|e| e.from_file(path))
    }

    /// Async flavor of `compile_file`, used when a path is only known at runtime.
    pub async fn compile_file_async(&self, path: &str) -> Result<Expression, CompileError> {
        let nested = self.nested()?;
        let doc = loader::load_from_path_async(Path::new(path))
            .await
            .map_err(|e| load_failure(path, &e))?;
        nested.compile(&doc).map_err(|e| e.from_file(path))
    }

    fn nested(&self) -> Result<Self, CompileError> {
        if self.depth >= MAX_INCLUDE_DEPTH {
            return Err(CompileErrorKind::IncludeDepth(MAX_INCLUDE_DEPTH).into());
        }
        Ok(Self {
            options: self.options,
            depth: self.depth + 1,
        })
    }

    fn compile_sequence(&self, items: &[Value]) -> Result<Expression, CompileError> {
        let mut members = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            members.push(self.compile(item).map_err(|e| e.from_index(i))?);
        }
        Ok(Expression::sequence(members))
    }

    /// Compile mapping entries that must all be action keys.
    fn compile_actions(&self, mut entries: Vec<(&String, &Value)>) -> Result<Expression, CompileError> {
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let mut members = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            members.push(self.compile_action(key, value)?);
        }
        if members.len() == 1 {
            return Ok(members.remove(0));
        }
        Ok(Expression::sequence(members))
    }

    fn compile_action(&self, key: &str, value: &Value) -> Result<Expression, CompileError> {
        let node = match key {
            "do" => self.compile_do(value),
            "repeat" => self.compile_repeat(value),
            "press" => self
                .operand(value, "press", press_input)
                .map(Expression::Press),
            "hold" => self.operand(value, "hold", hold_input).map(Expression::Hold),
            "release" => self
                .operand(value, "release", release_input)
                .map(Expression::Release),
            "file" => self.compile_include(value),
            other => return Err(CompileErrorKind::InvalidKey(other.to_string()).into()),
        };
        node.map_err(|e| e.from_key(key))
    }

    fn compile_do(&self, value: &Value) -> Result<Expression, CompileError> {
        let map = match value {
            Value::Object(map) => map,
            Value::Array(items) => return self.compile_sequence(items),
            _ => return Err(CompileErrorKind::ExpectedMappingOrSequence("do").into()),
        };

        let on = match map.get("on") {
            Some(v) => Some(
                self.operand(v, "on", trigger_input)
                    .map_err(|e| e.from_key("on"))?,
            ),
            None => None,
        };
        let action = self.compile_actions(remaining(map, &["on"]))?;

        if action.is_static() {
            trace!(target: "keyweave::compiler", "Folding `do` with a static action");
            return Ok(Expression::Literal(Value::Null));
        }
        Ok(Expression::Do(DoExpr {
            on,
            action: action.into(),
        }))
    }

    fn compile_repeat(&self, value: &Value) -> Result<Expression, CompileError> {
        let Value::Object(map) = value else {
            return Err(CompileErrorKind::ExpectedMapping("repeat").into());
        };

        let at = map.get("at").ok_or(CompileErrorKind::MissingField("at"))?;
        let at = self
            .operand(at, "at", parse_frequency)
            .map_err(|e| e.from_key("at"))?;
        let action = self.compile_actions(remaining(map, &["at", "for", "until"]))?;

        let (duration, until) = (map.get("for"), map.get("until"));
        if duration.is_none() && until.is_none() {
            return Err(CompileErrorKind::MissingBound.into());
        }
        let until = match until {
            Some(v) => Some(
                self.operand(v, "until", trigger_input)
                    .map_err(|e| e.from_key("until"))?,
            ),
            None => None,
        };
        let duration = match duration {
            Some(v) => Some(
                self.operand(v, "for", parse_duration)
                    .map_err(|e| e.from_key("for"))?,
            ),
            None => None,
        };

        if action.is_static() {
            trace!(target: "keyweave::compiler", "Folding `repeat` with a static action");
            return Ok(Expression::Literal(Value::Null));
        }
        Ok(Expression::Repeat(RepeatExpr {
            at,
            duration,
            until,
            action: Box::new(action),
        }))
    }

    fn compile_include(&self, value: &Value) -> Result<Expression, CompileError> {
        let path = self.compile(value)?;
        let Some(static_path) = path.static_value() else {
            return Ok(self.dynamic_include(path));
        };

        let path = static_path.as_str().ok_or_else(|| CompileErrorKind::Value {
            field: "file",
            source: ValueError::Path {
                value: static_path.to_string(),
            },
        })?;
        let included = self.compile_file(path)?;
        let include = match included.static_value() {
            Some(value) => {
                debug!(target: "keyweave::compiler", %path, "Folded static include");
                FileInclude::Folded {
                    path: path.to_string(),
                    value,
                }
            }
            None => FileInclude::Compiled {
                path: path.to_string(),
                expr: Box::new(included),
            },
        };
        Ok(Expression::FileInclude(include))
    }

    /// An include whose path is only known when evaluated.
    fn dynamic_include(&self, path: Expression) -> Expression {
        Expression::FileInclude(FileInclude::Dynamic {
            path: Box::new(path),
            // `compile_file_async` goes one level deeper on each evaluation
            compiler: self.clone(),
        })
    }

    /// Compile `value` as the argument of `field`, parsing it now if it is static.
    fn operand<T, F>(&self, value: &Value, field: &'static str, parse: F) -> Result<Operand<T>, CompileError>
    where
        F: Fn(&Value) -> Result<T, ValueError>,
    {
        let expr = self.compile(value)?;
        let Some(fixed) = expr.static_value() else {
            return Ok(Operand::Deferred(Box::new(expr)));
        };
        match parse(&fixed) {
            Ok(parsed) => Ok(Operand::Fixed(parsed)),
            Err(source) if self.options.strict_values => {
                Err(CompileErrorKind::Value { field, source }.into())
            }
            Err(source) => {
                debug!(
                    target: "keyweave::compiler",
                    field, error = %source,
                    "Static value does not parse; deferring to evaluation"
                );
                Ok(Operand::Deferred(Box::new(expr)))
            }
        }
    }
}

/// Entries of `map` other than `reserved`: the action of a `do`/`repeat`.
fn remaining<'a>(map: &'a Map<String, Value>, reserved: &[&str]) -> Vec<(&'a String, &'a Value)> {
    map.iter()
        .filter(|(key, _)| !reserved.contains(&key.as_str()))
        .collect()
}

fn load_failure(path: &str, err: &anyhow::Error) -> CompileError {
    CompileErrorKind::Include {
        path: path.to_string(),
        reason: format!("{err:#}"),
    }
    .into()
}
