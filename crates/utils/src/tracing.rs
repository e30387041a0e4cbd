use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use ::tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Filter used when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info";

/// Initialize the tracing system
///
/// Installs a registry with an `EnvFilter` (from `RUST_LOG`, falling back to
/// `info`) and a compact formatter writing to stderr. ANSI colours are only
/// used when stderr is a terminal.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Check if we're running in a TTY environment
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Create a span for one dispatched task request
pub fn task_span(task_id: &str, request_id: &str) -> Span {
    span!(Level::INFO, "task", task_id = %task_id, request_id = %request_id)
}

/// Create a span for a worker pool job
pub fn worker_span(task_id: &str, job_id: &str) -> Span {
    span!(Level::DEBUG, "worker", task_id = %task_id, job_id = %job_id)
}

/// Emit a structured event for task progress
pub fn task_progress(task_id: &str, progress: Option<f64>, message: &str) {
    if let Some(progress) = progress {
        debug!(
            task_id = %task_id,
            progress = progress,
            message = %message,
            "task_progress"
        );
    } else {
        debug!(
            task_id = %task_id,
            message = %message,
            "task_progress"
        );
    }
}

/// Emit a structured event for task completion
pub fn task_completed(task_id: &str, duration_ms: u64, success: bool) {
    if success {
        info!(
            task_id = %task_id,
            duration_ms = %duration_ms,
            "task_completed"
        );
    } else {
        error!(
            task_id = %task_id,
            duration_ms = %duration_ms,
            "task_failed"
        );
    }
}

/// Emit a structured event for result cache lookups
pub fn cache_event(task_id: &str, fingerprint: &str, hit: bool) {
    if hit {
        debug!(
            task_id = %task_id,
            fingerprint = %fingerprint,
            "cache_hit"
        );
    } else {
        debug!(
            task_id = %task_id,
            fingerprint = %fingerprint,
            "cache_miss"
        );
    }
}
