//! Tracing setup shared by the runtime CLI and the shim binary.
//!
//! Grounded on the teacher's `init_logging_for` (file appender + `EnvFilter`
//! + `tracing_subscriber`), extended with the `--log-format json|text`
//! switch and the `--global-log` secondary sink from spec.md §6.1.

use std::path::Path;

use tracing_subscriber::layer::Layered;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown log format '{other}', expected json|text")),
        }
    }
}

/// Guards returned by [`init_logging`]; drop them only at process exit so
/// every non-blocking file writer thread flushes its buffered lines.
pub type LoggingGuard = Vec<tracing_appender::non_blocking::WorkerGuard>;

type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync + 'static>;

fn file_layer(path: &Path, format: LogFormat) -> (BoxedLayer, tracing_appender::non_blocking::WorkerGuard) {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        let _ = std::fs::create_dir_all(dir);
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("failed to open log file");
    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let layer = match format {
        LogFormat::Json => fmt::layer().json().with_writer(non_blocking).boxed(),
        LogFormat::Text => fmt::layer().with_ansi(false).with_writer(non_blocking).boxed(),
    };
    (layer, guard)
}

fn stderr_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer().json().boxed(),
        LogFormat::Text => fmt::layer().boxed(),
    }
}

/// Initialize the global tracing subscriber.
///
/// `log_file` routes the primary output to a file (non-blocking writer)
/// instead of stderr. `global_log`, when set, is a second sink that every
/// invocation appends to regardless of `log_file` — a standing activity
/// log across runs, independent of whichever per-run `--log` file (if any)
/// was also requested. `debug` raises the default filter from `info` to
/// `debug` when `RUST_LOG` is unset.
pub fn init_logging(
    log_file: Option<&Path>,
    global_log: Option<&Path>,
    format: LogFormat,
    debug: bool,
) -> LoggingGuard {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let mut guards = Vec::new();
    let mut layers: Vec<BoxedLayer> = Vec::new();

    match log_file {
        Some(path) => {
            let (layer, guard) = file_layer(path, format);
            layers.push(layer);
            guards.push(guard);
        }
        None => layers.push(stderr_layer(format)),
    }

    if let Some(path) = global_log {
        let (layer, guard) = file_layer(path, format);
        layers.push(layer);
        guards.push(guard);
    }

    tracing_subscriber::registry().with(env_filter).with(layers).init();
    guards
}
