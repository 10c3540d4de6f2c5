use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::infra::{config::LogConfig, error::AppError, storage_layout::StorageLayout};

const LOG_FILE_NAME: &str = "commhub.log";

/// Routes tracing output to a log file so the text shell on stdout stays
/// clean. The returned guard must be held until exit to flush buffered lines.
pub fn init(config: &LogConfig) -> Result<WorkerGuard, AppError> {
    let layout = StorageLayout::resolve(config.directory.as_ref())?;
    layout.ensure_dirs()?;

    let appender = tracing_appender::rolling::never(&layout.log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level)),
        )
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer)
        .try_init()
        .map_err(AppError::LoggingInit)?;

    Ok(guard)
}
