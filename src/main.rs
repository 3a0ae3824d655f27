use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info, warn};

use keyweave::backend::{DesktopBackend, InputBackend, RecordingBackend, StdinSource};
use keyweave::config::{self as cfg, EngineOptions};
use keyweave::executor::Engine;

/// keyweave CLI
#[derive(Debug, Parser)]
#[command(
    name = keyweave::PKG_NAME,
    version = keyweave::PKG_VERSION,
    about = "Run a declarative input-automation document"
)]
struct Args {
    /// Path to the JSON document to run
    document: PathBuf,

    /// Enable dry-run mode (log synthetic input instead of injecting it)
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Reject static values that do not parse at compile time
    #[arg(long = "strict")]
    strict: bool,

    /// Compile the document, report errors and exit without running it
    #[arg(long = "check")]
    check: bool,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Events each `do` listener may queue while its action is running
    #[arg(long = "listener-capacity", default_value_t = cfg::DEFAULT_LISTENER_CAPACITY)]
    listener_capacity: usize,
}

impl Args {
    fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            dry_run: self.dry_run,
            strict_values: self.strict,
            listener_capacity: self.listener_capacity,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    match args.log_level.as_deref() {
        Some(level) => {
            keyweave::init_tracing_with(keyweave::parse_level(level).unwrap_or(tracing::Level::INFO))
        }
        None => keyweave::init_tracing(),
    }
    info!(
        version = keyweave::PKG_VERSION,
        document = %args.document.display(),
        dry_run = args.dry_run,
        "Starting keyweave"
    );

    let doc = cfg::load_from_path_async(&args.document)
        .await
        .with_context(|| format!("Cannot load {}", args.document.display()))?;
    let options = args.engine_options();

    let backend = backend_for(&options)?;
    let engine = Engine::new(backend, options);
    let expr = match engine.compile(&doc) {
        Ok(expr) => expr,
        Err(err) => {
            error!(target: "keyweave::compiler", "Compile error: {err}");
            eprintln!("{err}");
            return Ok(ExitCode::FAILURE);
        }
    };
    debug!(target: "keyweave", is_static = expr.is_static(), "Document compiled");

    if args.check {
        info!("Document is valid");
        return Ok(ExitCode::SUCCESS);
    }

    engine.start().context("Cannot start the input backend")?;
    if let Err(err) = engine.run(&expr).await {
        eprintln!("{err}");
        return Ok(ExitCode::FAILURE);
    }

    if engine.runtime().dispatcher().listener_count() == 0 {
        info!("Nothing is listening for input; exiting");
        return Ok(ExitCode::SUCCESS);
    }

    // Listeners keep running until one fails or Ctrl+C
    let code = tokio::select! {
        result = engine.wait() => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("{err}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            ExitCode::SUCCESS
        }
    };

    engine.shutdown();
    info!("keyweave exited");
    Ok(code)
}

/// The desktop backend, or in dry-run a recording backend fed from stdin.
fn backend_for(options: &EngineOptions) -> anyhow::Result<Arc<dyn InputBackend>> {
    if !options.dry_run {
        return Ok(Arc::new(DesktopBackend::new()));
    }

    let backend = Arc::new(RecordingBackend::new());
    let sink = Arc::clone(&backend);
    thread::Builder::new()
        .name("keyweave-stdin".into())
        .spawn(move || {
            let source = StdinSource::new();
            while let Some(event) = source.next_event() {
                sink.inject(event);
            }
            warn!(target: "keyweave::sources", "Observed input ended");
        })
        .context("Cannot spawn stdin reader")?;
    Ok(backend)
}
