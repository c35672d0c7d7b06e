use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
    Registry,
};

use crate::error::{ChunkheatError, ChunkheatResult};

/// Logging configuration for chunkheat
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
    pub enable_file_logging: bool,
    pub enable_json_format: bool,
    pub max_log_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            enable_file_logging: false,
            enable_json_format: false,
            max_log_files: 10,
        }
    }
}

/// Initialize the logging system.
///
/// The returned guard flushes the file writer when dropped, so callers keep
/// it alive for the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> ChunkheatResult<Option<WorkerGuard>> {
    if config.enable_file_logging {
        fs::create_dir_all(&config.log_dir).map_err(|e| {
            ChunkheatError::file_io(config.log_dir.to_string_lossy().to_string(), e)
        })?;
    }

    // sqlx logs every statement at info; keep it quiet unless asked
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("chunkheat={},sqlx=warn,{}", config.level, config.level))
    });

    let registry = Registry::default().with(env_filter);

    let guard = if config.enable_file_logging {
        let file_appender = rolling::daily(&config.log_dir, "chunkheat.log");
        let (file_writer, guard) = non_blocking(file_appender);

        let file_layer = if config.enable_json_format {
            fmt::layer().json().with_writer(file_writer).boxed()
        } else {
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .boxed()
        };

        registry
            .with(file_layer)
            .try_init()
            .map_err(|e| {
                ChunkheatError::configuration(format!("logging already initialized: {}", e))
            })?;
        Some(guard)
    } else {
        // stdout carries command output, so console logs go to stderr
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .compact()
            .boxed();

        registry
            .with(console_layer)
            .try_init()
            .map_err(|e| {
                ChunkheatError::configuration(format!("logging already initialized: {}", e))
            })?;
        None
    };

    info!("🔥 chunkheat logging initialized");
    info!("Log level: {}", config.level);

    if config.enable_file_logging {
        info!("File logging enabled: {}", config.log_dir.display());
    }

    Ok(guard)
}

pub fn log_system_info() {
    info!("🔥 chunkheat v{}", env!("CARGO_PKG_VERSION"));
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
        info!("⏱️  Starting: {}", operation);
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    pub fn checkpoint(&self, checkpoint: &str) {
        let elapsed = self.start.elapsed();
        info!("⏱️  {} - {}: {}ms", self.operation, checkpoint, elapsed.as_millis());
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        info!("⏱️  Completed {}: {}ms", self.operation, elapsed.as_millis());
    }
}

/// Clean up old log files
pub fn cleanup_old_logs(config: &LoggingConfig) -> ChunkheatResult<()> {
    if !config.enable_file_logging {
        return Ok(());
    }

    let mut log_files = Vec::new();

    let entries = fs::read_dir(&config.log_dir).map_err(|e| {
        ChunkheatError::file_io(config.log_dir.to_string_lossy().to_string(), e)
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            ChunkheatError::file_io(config.log_dir.to_string_lossy().to_string(), e)
        })?;

        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|name| name.starts_with("chunkheat.log"))
            .unwrap_or(false);
        if is_log {
            if let Ok(metadata) = fs::metadata(&path) {
                let modified = metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                log_files.push((path, modified));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    if log_files.len() > config.max_log_files {
        for (path, _) in &log_files[config.max_log_files..] {
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to remove old log file {}: {}", path.display(), e);
            } else {
                info!("Removed old log file: {}", path.display());
            }
        }
    }

    Ok(())
}

/// Macro for logging with context
#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            recoverable = $error.is_recoverable(),
            "chunkheat error occurred"
        );
    };
}

#[macro_export]
macro_rules! log_chunk_created {
    ($page:expr, $chunk_index:expr, $char_count:expr, $is_image:expr) => {
        tracing::debug!(
            page = $page,
            chunk_index = $chunk_index,
            char_count = $char_count,
            is_image = $is_image,
            "Created chunk"
        );
    };
}
