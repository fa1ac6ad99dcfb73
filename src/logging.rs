//! Structured logging setup (console + optional daily rolling file).

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogConfig, LogFormat};
use crate::error::PosError;

pub const DEFAULT_FILTER: &str = "info,store_pos_client=debug";

/// Prefix of the rolling log files written to [`LogConfig::directory`].
pub const LOG_FILE_PREFIX: &str = "pos";

/// Install the global subscriber.
///
/// Returns the file writer guard when a log directory is configured; keep it
/// alive for the lifetime of the process, dropping it flushes the file.
pub fn init_logging(cfg: &LogConfig) -> Result<Option<WorkerGuard>, PosError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = fmt::layer().with_target(true);

    let (file_layer, guard) = match cfg.directory.as_ref() {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|e| PosError::Config(format!("create log dir: {e}")))?;
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = match cfg.format {
                LogFormat::Json => fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .boxed(),
                LogFormat::Pretty => fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true)
                    .boxed(),
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| PosError::Config(format!("logging already initialized: {e}")))?;

    tracing::info!("Store POS client v{}", env!("CARGO_PKG_VERSION"));
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Only one test may install the global subscriber per process.
    #[test]
    fn writes_to_rolling_file_and_refuses_reinit() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LogConfig {
            directory: Some(dir.path().join("logs")),
            format: LogFormat::Json,
        };
        let guard = init_logging(&cfg).unwrap();
        assert!(guard.is_some());
        tracing::info!(order_id = "ord-1", "logged to file");
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX))
            .collect();
        assert!(!files.is_empty());

        let again = init_logging(&LogConfig::default());
        assert!(matches!(again, Err(PosError::Config(_))));
    }
}
