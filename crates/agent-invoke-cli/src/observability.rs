use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const LOG_FILTER_ENV: &str = "AGENT_INVOKE_LOG";
const JSON_LOG_PATH_ENV: &str = "AGENT_INVOKE_JSON_LOG_PATH";

/// Logging settings for one process, built by `main` and passed in.
#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    pub verbose: bool,
    /// Explicit filter directives, overriding `verbose`.
    pub filter: Option<String>,
    /// When set, logs are written as JSON lines to this file instead of stderr.
    pub json_log_path: Option<PathBuf>,
}

impl LogConfig {
    /// Environment variables:
    /// - `AGENT_INVOKE_LOG`: filter directives (`info`, `agent_invoke_harness=debug`, ...).
    /// - `RUST_LOG`: used when `AGENT_INVOKE_LOG` is unset.
    /// - `AGENT_INVOKE_JSON_LOG_PATH`: JSONL log file.
    pub fn from_env(verbose: bool) -> Self {
        Self::from_lookup(verbose, |key| std::env::var(key).ok())
    }

    fn from_lookup(verbose: bool, env: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |v: Option<String>| v.filter(|v| !v.trim().is_empty());
        Self {
            verbose,
            filter: non_empty(env(LOG_FILTER_ENV)).or_else(|| non_empty(env("RUST_LOG"))),
            json_log_path: non_empty(env(JSON_LOG_PATH_ENV)).map(PathBuf::from),
        }
    }

    fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        if let Some(filter) = &self.filter
            && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(filter)
        {
            return filter;
        }
        tracing_subscriber::EnvFilter::new(if self.verbose { "debug" } else { "warn" })
    }
}

/// Installs the global subscriber. Keep the returned guard alive until exit
/// so buffered JSON lines are flushed.
pub fn init(config: &LogConfig) -> Option<WorkerGuard> {
    let env_filter = config.env_filter();
    if let Some(path) = &config.json_log_path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let _ = std::fs::create_dir_all(parent);
        }
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("agent-invoke.logs.jsonl");
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(false)
            .with_writer(writer);
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init();
        Some(guard)
    } else {
        // stdout carries the agent response.
        let console_layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr);
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .try_init();
        None
    }
}
