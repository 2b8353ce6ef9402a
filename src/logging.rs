use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::error::{LedgerError, LedgerResult};

/// Logging configuration for LedgerLens
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
    pub enable_file_logging: bool,
    pub enable_json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            enable_file_logging: false,
            enable_json_format: false,
        }
    }
}

/// Keeps the non-blocking file writer alive; drop it only on exit.
pub struct LoggingGuard {
    #[cfg(feature = "advanced_logging")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialize the logging system
pub fn init_logging(config: &LoggingConfig) -> LedgerResult<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Keep HTTP client internals quiet unless asked for
        EnvFilter::new(format!(
            "ledgerlens={},reqwest=warn,hyper=warn,{}",
            config.level, config.level
        ))
    });

    let console_layer = if config.enable_json_format {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .compact()
            .boxed()
    };

    let registry = Registry::default().with(env_filter).with(console_layer);

    #[cfg(feature = "advanced_logging")]
    let guard = if config.enable_file_logging {
        std::fs::create_dir_all(&config.log_dir)
            .map_err(|e| LedgerError::file_io(config.log_dir.display().to_string(), e))?;

        let file_appender = tracing_appender::rolling::daily(&config.log_dir, "ledgerlens.log");
        let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
        let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);

        registry
            .with(file_layer)
            .try_init()
            .map_err(|e| LedgerError::configuration(format!("logging already initialized: {}", e)))?;

        LoggingGuard {
            _file_guard: Some(file_guard),
        }
    } else {
        registry
            .try_init()
            .map_err(|e| LedgerError::configuration(format!("logging already initialized: {}", e)))?;
        LoggingGuard { _file_guard: None }
    };

    #[cfg(not(feature = "advanced_logging"))]
    let guard = {
        if config.enable_file_logging {
            tracing::warn!("File logging requested but the advanced_logging feature is disabled");
        }
        registry
            .try_init()
            .map_err(|e| LedgerError::configuration(format!("logging already initialized: {}", e)))?;
        LoggingGuard {}
    };

    info!("Log level: {}", config.level);
    if config.enable_file_logging {
        info!("File logging directory: {}", config.log_dir.display());
    }

    Ok(guard)
}

/// Log system information for debugging
pub fn log_system_info() {
    info!("📒 LedgerLens v{}", env!("CARGO_PKG_VERSION"));
    info!("System: {} {}", std::env::consts::OS, std::env::consts::ARCH);

    if let Ok(cwd) = std::env::current_dir() {
        info!("Working directory: {}", cwd.display());
    }
}

/// Performance logging utilities
pub struct PerformanceTimer {
    start: std::time::Instant,
    operation: String,
}

impl PerformanceTimer {
    pub fn start(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        tracing::debug!("⏱️  Starting: {}", operation);
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        info!("⏱️  Completed {}: {}ms", self.operation, elapsed.as_millis());
    }
}

/// Log a `LedgerError` with the operation it came from
#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            recoverable = $error.is_recoverable(),
            "LedgerLens operation failed"
        );
    };
}
