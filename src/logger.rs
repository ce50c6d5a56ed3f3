use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;
use crate::errors::AppError;

const DEFAULT_LOG_FILE: &str = "dermoai.log";

/// Sets up the global subscriber. Logs go to stderr unless the config names
/// a file. `RUST_LOG` takes precedence over the configured level.
///
/// The returned guard must be kept alive for buffered file output to be
/// flushed.
pub fn setup_logging(config: &Config) -> Result<Option<WorkerGuard>, AppError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level()));

    match config.log_file_path() {
        None => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .finish();
            set_global(subscriber)?;
            Ok(None)
        }
        Some(path) => {
            let (file_writer, guard) = create_file_logger(Path::new(path))?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .with_writer(file_writer)
                .finish();
            set_global(subscriber)?;
            Ok(Some(guard))
        }
    }
}

fn set_global<S>(subscriber: S) -> Result<(), AppError>
where
    S: tracing::Subscriber + Send + Sync + 'static,
{
    tracing::subscriber::set_global_default(subscriber).map_err(|e| AppError::Generic {
        message: format!("Failed to set global tracing subscriber: {}", e),
    })
}

fn log_dir_for(log_path: &Path) -> PathBuf {
    match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("dermoai")
            .join("logs"),
    }
}

fn create_file_logger(log_path: &Path) -> Result<(NonBlocking, WorkerGuard), AppError> {
    let log_dir = log_dir_for(log_path);
    std::fs::create_dir_all(&log_dir).map_err(|e| AppError::Generic {
        message: format!("Failed to create log directory {:?}: {}", log_dir, e),
    })?;

    let log_file_name = log_path
        .file_name()
        .unwrap_or(std::ffi::OsStr::new(DEFAULT_LOG_FILE));

    let file_appender = tracing_appender::rolling::never(&log_dir, log_file_name);
    Ok(tracing_appender::non_blocking(file_appender))
}
