use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::Dispatcher;
use crate::backend::{BackendError, InputBackend};
use crate::compiler::{Compiler, Expression};
use crate::config::{ConfigValue, EngineOptions};
use crate::error::{CompileError, EvalError};
use crate::input::{Input, InputSpec};

/// Evaluation context shared by every branch of a running document.
///
/// Cheap to clone; clones share the dispatcher, the backend, the shutdown token
/// and the fatal-error slot.
#[derive(Clone)]
pub struct Runtime {
    dispatcher: Arc<Dispatcher>,
    backend: Arc<dyn InputBackend>,
    shutdown: CancellationToken,
    fatal: Arc<Mutex<Option<EvalError>>>,
    listener_capacity: usize,
}

impl Runtime {
    pub fn new(backend: Arc<dyn InputBackend>, listener_capacity: usize) -> Self {
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&backend)),
            backend,
            shutdown: CancellationToken::new(),
            fatal: Arc::new(Mutex::new(None)),
            listener_capacity,
        }
    }

    /// Inject one synthetic input through the backend.
    pub fn send(&self, input: Input) -> Result<(), EvalError> {
        trace!(target: "keyweave::runtime", key = input.key, flag = ?input.flag, "Send");
        self.backend.send(input)?;
        Ok(())
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Cancelled when the engine shuts down or a listener fails.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Evaluate `action` once per observed input matching `trigger`, in a
    /// background task, until shutdown or until the registrations are dropped.
    ///
    /// With a listener capacity of 0, events arriving while the action is still
    /// running are dropped; otherwise up to that many of them are queued.
    pub fn listen(&self, trigger: InputSpec, action: Arc<Expression>) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::channel(self.listener_capacity.max(1));
        for input in &trigger {
            self.dispatcher.register(*input, tx.clone());
        }
        drop(tx);

        let rt = self.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = rt.shutdown.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                trace!(target: "keyweave::runtime", key = event.key, flag = ?event.flag, "Trigger fired");
                if let Err(err) = action.eval(&rt).await {
                    rt.fail(err);
                    break;
                }
                if rt.listener_capacity == 0 {
                    skip_buffered(&mut rx);
                }
            }
            trace!(target: "keyweave::runtime", "Listener finished");
        })
    }

    /// A single-slot channel fed by `trigger`, used to cancel a `repeat`.
    pub fn cancellation_channel(&self, trigger: &InputSpec) -> Receiver<Input> {
        let (tx, rx) = mpsc::channel(1);
        for input in trigger {
            self.dispatcher.register(*input, tx.clone());
        }
        rx
    }

    /// Record a failure from a background branch and stop the engine.
    ///
    /// Only the first failure is kept.
    pub fn fail(&self, err: EvalError) {
        error!(target: "keyweave::runtime", error = %err, "Listener action failed");
        {
            let mut fatal = self.fatal.lock();
            if fatal.is_none() {
                *fatal = Some(err);
            }
        }
        self.shutdown.cancel();
    }

    fn take_fatal(&self) -> Option<EvalError> {
        self.fatal.lock().take()
    }
}

/// Discard events that were buffered while the listener was busy.
fn skip_buffered(rx: &mut Receiver<Input>) {
    let mut skipped = 0usize;
    while rx.try_recv().is_ok() {
        skipped += 1;
    }
    if skipped > 0 {
        trace!(target: "keyweave::runtime", skipped, "Dropped events that arrived while busy");
    }
}

/// Owns a runtime for the lifetime of one document run.
///
/// `start` begins observing input; dropping the engine (or `shutdown`) tears
/// everything down.
pub struct Engine {
    runtime: Runtime,
    compiler: Compiler,
    options: EngineOptions,
}

impl Engine {
    pub fn new(backend: Arc<dyn InputBackend>, options: EngineOptions) -> Self {
        info!(
            target: "keyweave::runtime",
            backend = backend.name(),
            dry_run = options.dry_run,
            "Creating engine"
        );
        Self {
            runtime: Runtime::new(backend, options.listener_capacity()),
            compiler: Compiler::new(options.compile_options()),
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn compile(&self, doc: &ConfigValue) -> Result<Expression, CompileError> {
        self.compiler.compile(doc)
    }

    /// Start the dispatcher. Triggers registered before this only fire afterwards.
    pub fn start(&self) -> Result<(), BackendError> {
        self.runtime.dispatcher.init()
    }

    /// Evaluate the top-level expression.
    ///
    /// Returns once the expression itself is done; `do` listeners it started keep
    /// running in the background.
    pub async fn run(&self, expr: &Expression) -> Result<Value, EvalError> {
        debug!(target: "keyweave::runtime", is_static = expr.is_static(), "Evaluating document");
        let value = expr.eval(&self.runtime).await;
        match &value {
            Ok(_) => info!(
                target: "keyweave::runtime",
                listeners = self.runtime.dispatcher.listener_count(),
                "Document evaluated"
            ),
            Err(err) => error!(target: "keyweave::runtime", error = %err, "Document evaluation failed"),
        }
        value
    }

    /// Wait for shutdown; returns the first listener failure, if one caused it.
    pub async fn wait(&self) -> Result<(), EvalError> {
        self.runtime.shutdown.cancelled().await;
        match self.runtime.take_fatal() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Stop every listener and repeat loop and tear the dispatcher down.
    pub fn shutdown(&self) {
        self.runtime.shutdown.cancel();
        self.runtime.dispatcher.teardown();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
