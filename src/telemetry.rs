use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// JSONL trace destination; `CASETERM_TRACE_LOG` overrides the temp-dir default.
pub(crate) fn tracing_log_path() -> PathBuf {
    env::var("CASETERM_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("caseterm_trace.jsonl"))
}

/// Install the global JSON subscriber once. Only timing runs emit structured events,
/// so plain `--logs` keeps the trace file untouched.
pub(crate) fn init_tracing(config: &AppConfig) {
    if !config.log_timings || config.no_logs {
        return;
    }

    let _ = TRACING_INIT.get_or_init(|| {
        let path = tracing_log_path();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(_) => return,
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(file)
            .with_target(true)
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_path_defaults_to_temp_dir() {
        if env::var("CASETERM_TRACE_LOG").is_ok() {
            return;
        }
        assert_eq!(
            tracing_log_path(),
            env::temp_dir().join("caseterm_trace.jsonl")
        );
    }
}
