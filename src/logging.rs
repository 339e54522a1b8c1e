use camino::Utf8Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::MirrorError;

/// Install the process-wide subscriber: human-readable events on stderr plus
/// a persistent log file. Called once per process, before any worker starts;
/// worker threads inherit the subscriber. The returned guard must stay alive
/// until exit or buffered file output is lost.
pub fn init(log_file: &Utf8Path) -> Result<WorkerGuard, MirrorError> {
    let directory = match log_file.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.as_std_path(),
        _ => Utf8Path::new(".").as_std_path(),
    };
    let file_name = log_file
        .file_name()
        .ok_or_else(|| MirrorError::Filesystem(format!("invalid log file path {log_file}")))?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        );
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
