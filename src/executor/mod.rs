/*!
Executor module for keyweave.

This module wires together:
- `dispatcher`: fans observed input out to the channels of registered triggers
- `repeat`: the ticking loop behind `repeat`
- `runtime`: the evaluation context (`Runtime`) and its lifecycle owner (`Engine`)

Typical usage:
- Construct an `Engine` with a backend and `EngineOptions`.
- Compile a document, `start` the engine, `run` the expression, then `wait`.

Example:
```no_run
use std::sync::Arc;
use keyweave::backend::RecordingBackend;
use keyweave::config::EngineOptions;
use keyweave::executor::Engine;
use serde_json::json;

# async fn demo() -> anyhow::Result<()> {
let engine = Engine::new(Arc::new(RecordingBackend::new()), EngineOptions::default());
let expr = engine.compile(&json!({"do": {"on": "f1", "press": ["ctrl", "c"]}}))?;
engine.start()?;
engine.run(&expr).await?;
engine.wait().await?;
# Ok(())
# }
```
*/

pub mod dispatcher;
pub mod repeat;
pub mod runtime;

// Re-exports for convenient access from `keyweave::executor::*`
pub use dispatcher::Dispatcher;
pub use repeat::RepeatSession;
pub use runtime::{Engine, Runtime};
