//! Compiled expression tree and its evaluator.
//!
//! Every node evaluates to a `Value` and may have side effects (sending input,
//! subscribing to triggers, blocking on a repeat loop). Static nodes have a value
//! fixed at compile time and no side effects; the compiler folds them into
//! `Literal`s wherever it can.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, trace};

use super::Compiler;
use crate::error::{CompileError, CompileErrorKind, EvalError, ValueError};
use crate::executor::{RepeatSession, Runtime};
use crate::input::{
    Flag, Frequency, Input, InputSpec, parse_duration, parse_frequency, parse_input,
};

/// Boxed evaluation future; boxing is what lets evaluation recurse.
pub type EvalFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, EvalError>> + Send + 'a>>;

/// A node's typed argument.
///
/// `Fixed` when the argument was static and parsed at compile time. Otherwise the
/// expression is kept and parsed on every evaluation, which is also where a bad
/// static value surfaces when strict values are off.
#[derive(Debug, Clone)]
pub enum Operand<T> {
    Fixed(T),
    Deferred(Box<Expression>),
}

impl<T: Clone + Send + Sync> Operand<T> {
    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }

    async fn resolve<F>(&self, rt: &Runtime, field: &'static str, parse: F) -> Result<T, EvalError>
    where
        F: Fn(&Value) -> Result<T, ValueError>,
    {
        match self {
            Self::Fixed(v) => Ok(v.clone()),
            Self::Deferred(expr) => {
                let value = expr.eval(rt).await?;
                parse(&value).map_err(|source| EvalError::value(field, source))
            }
        }
    }
}

/// `do`: run `action` now, or on every matching input when `on` is present.
#[derive(Debug, Clone)]
pub struct DoExpr {
    pub on: Option<Operand<InputSpec>>,
    pub action: Arc<Expression>,
}

/// `repeat`: run `action` at a fixed rate until `for` elapses or `until` fires.
#[derive(Debug, Clone)]
pub struct RepeatExpr {
    pub at: Operand<Frequency>,
    pub duration: Option<Operand<Duration>>,
    pub until: Option<Operand<InputSpec>>,
    pub action: Box<Expression>,
}

/// `file`: evaluate another document.
#[derive(Debug, Clone)]
pub enum FileInclude {
    /// Static path, static document: the value itself.
    Folded { path: String, value: Value },
    /// Static path, dynamic document: compiled once, evaluated every time.
    Compiled { path: String, expr: Box<Expression> },
    /// Dynamic path: read and compiled on every evaluation.
    Dynamic {
        path: Box<Expression>,
        compiler: Compiler,
    },
}

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Value),
    Sequence(Vec<Expression>),
    Do(DoExpr),
    Repeat(RepeatExpr),
    Press(Operand<InputSpec>),
    Hold(Operand<InputSpec>),
    Release(Operand<InputSpec>),
    FileInclude(FileInclude),
}

impl Expression {
    /// Build a sequence, folding it into a literal array when every member is static.
    pub fn sequence(members: Vec<Expression>) -> Self {
        let folded: Option<Vec<Value>> = members.iter().map(Self::static_value).collect();
        match folded {
            Some(values) => Self::Literal(Value::Array(values)),
            None => Self::Sequence(members),
        }
    }

    /// True when the value is fixed and evaluating has no side effect.
    pub fn is_static(&self) -> bool {
        match self {
            Self::Literal(_) => true,
            Self::Sequence(members) => members.iter().all(Self::is_static),
            Self::Do(node) => node.action.is_static(),
            Self::Repeat(node) => node.action.is_static(),
            Self::Press(_) | Self::Hold(_) | Self::Release(_) => false,
            Self::FileInclude(include) => matches!(include, FileInclude::Folded { .. }),
        }
    }

    /// The compile-time value of a static expression, `None` for dynamic ones.
    pub fn static_value(&self) -> Option<Value> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Sequence(members) => members
                .iter()
                .map(Self::static_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Self::Do(_) | Self::Repeat(_) => self.is_static().then_some(Value::Null),
            Self::Press(_) | Self::Hold(_) | Self::Release(_) => None,
            Self::FileInclude(FileInclude::Folded { value, .. }) => Some(value.clone()),
            Self::FileInclude(_) => None,
        }
    }

    /// Evaluate, performing side effects.
    pub fn eval<'a>(&'a self, rt: &'a Runtime) -> EvalFuture<'a> {
        Box::pin(async move {
            match self {
                Self::Literal(value) => Ok(value.clone()),
                Self::Sequence(members) => {
                    let mut values = Vec::with_capacity(members.len());
                    for member in members {
                        values.push(member.eval(rt).await?);
                    }
                    Ok(Value::Array(values))
                }
                Self::Do(node) => node.eval(rt).await,
                Self::Repeat(node) => node.eval(rt).await,
                Self::Press(inputs) => press(inputs, rt).await,
                Self::Hold(inputs) => {
                    let spec = inputs.resolve(rt, "hold", hold_input).await?;
                    send_all(rt, spec.iter().copied())
                }
                Self::Release(inputs) => {
                    let spec = inputs.resolve(rt, "release", release_input).await?;
                    send_all(rt, spec.iter().copied())
                }
                Self::FileInclude(include) => include.eval(rt).await,
            }
        })
    }
}

pub(crate) fn press_input(value: &Value) -> Result<InputSpec, ValueError> {
    parse_input(value, Flag::Unset)
}

pub(crate) fn hold_input(value: &Value) -> Result<InputSpec, ValueError> {
    parse_input(value, Flag::KeyDown)
}

pub(crate) fn release_input(value: &Value) -> Result<InputSpec, ValueError> {
    parse_input(value, Flag::KeyUp)
}

/// Triggers default to key-down.
pub(crate) fn trigger_input(value: &Value) -> Result<InputSpec, ValueError> {
    parse_input(value, Flag::KeyDown)
}

fn send_all(rt: &Runtime, inputs: impl Iterator<Item = Input>) -> Result<Value, EvalError> {
    for input in inputs {
        rt.send(input)?;
    }
    Ok(Value::Null)
}

/// All downs in order, then ups for the inputs that had no explicit flag.
async fn press(inputs: &Operand<InputSpec>, rt: &Runtime) -> Result<Value, EvalError> {
    let spec = inputs.resolve(rt, "press", press_input).await?;
    send_all(rt, spec.iter().map(|input| input.pressed()))?;
    send_all(
        rt,
        spec.iter()
            .filter(|input| input.is_unset())
            .map(|input| input.released()),
    )
}

impl DoExpr {
    async fn eval(&self, rt: &Runtime) -> Result<Value, EvalError> {
        if self.action.is_static() {
            return Ok(Value::Null);
        }
        let Some(on) = &self.on else {
            self.action.eval(rt).await?;
            return Ok(Value::Null);
        };
        let trigger = on.resolve(rt, "on", trigger_input).await?;
        rt.listen(trigger, Arc::clone(&self.action));
        Ok(Value::Null)
    }
}

impl RepeatExpr {
    async fn eval(&self, rt: &Runtime) -> Result<Value, EvalError> {
        if self.action.is_static() {
            return Ok(Value::Null);
        }
        let freq = self.at.resolve(rt, "at", parse_frequency).await?;
        let until = match &self.until {
            Some(until) => Some(until.resolve(rt, "until", trigger_input).await?),
            None => None,
        };
        let duration = match &self.duration {
            Some(duration) => Some(duration.resolve(rt, "for", parse_duration).await?),
            None => None,
        };

        let mut session = RepeatSession::new(freq.period()).with_stop(rt.shutdown_token());
        if let Some(duration) = duration {
            session = session.with_deadline(duration);
        }
        if let Some(trigger) = until {
            session = session.with_cancel(rt.cancellation_channel(&trigger));
        }

        debug!(
            target: "keyweave::runtime",
            hz = freq.hertz(), ?duration, "Starting repeat"
        );
        let ticks = session.run(|| self.action.eval(rt)).await?;
        debug!(target: "keyweave::runtime", ticks, "Repeat finished");
        Ok(Value::Null)
    }
}

impl FileInclude {
    async fn eval(&self, rt: &Runtime) -> Result<Value, EvalError> {
        match self {
            Self::Folded { value, .. } => Ok(value.clone()),
            Self::Compiled { expr, .. } => expr.eval(rt).await,
            Self::Dynamic { path, compiler } => {
                let value = path.eval(rt).await?;
                let path = value.as_str().ok_or_else(|| {
                    EvalError::value(
                        "file",
                        ValueError::Path {
                            value: value.to_string(),
                        },
                    )
                })?;
                trace!(target: "keyweave::runtime", %path, "Including file");
                let expr = compiler
                    .compile_file_async(path)
                    .await
                    .map_err(|err| include_failure(path, err))?;
                expr.eval(rt).await
            }
        }
    }
}

fn include_failure(path: &str, err: CompileError) -> EvalError {
    let reason = match err.kind() {
        CompileErrorKind::Include { reason, .. } if err.trail().is_empty() => reason.clone(),
        _ => err.to_string(),
    };
    EvalError::Include {
        path: path.to_string(),
        reason,
    }
}
