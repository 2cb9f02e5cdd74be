//! Optional file-based logging, enabled via `MSM_FILE_LOGGING`.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Clone)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub log_dir: PathBuf,
    pub max_files: usize,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        let enabled =
            std::env::var("MSM_FILE_LOGGING").map(|v| v == "true" || v == "1").unwrap_or(false);
        let log_dir = std::env::var("MSM_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| msm_utils::paths::data_root().join("logs"));
        let max_files = std::env::var("MSM_LOG_MAX_FILES").ok().and_then(|s| s.parse().ok()).unwrap_or(7);
        Self { enabled, log_dir, max_files }
    }
}

/// Returns a guard that must be held for the process lifetime so buffered
/// file logs are flushed before exit.
pub fn init_logging(log_level: &str) -> Option<WorkerGuard> {
    let config = FileLoggingConfig::default();
    let filter_string = format!(
        "warn,msm_server={level},msm_supervisor={level},msm_services={level},msm_db={level},msm_platform={level},msm_fetchers={level},msm_utils={level}",
        level = log_level
    );
    let console_filter = EnvFilter::try_new(&filter_string).expect("valid tracing filter");
    let console_layer = tracing_subscriber::fmt::layer().with_filter(console_filter);

    if !config.enabled {
        tracing_subscriber::registry().with(console_layer).init();
        return None;
    }

    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!("failed to create log directory {:?}: {e}", config.log_dir);
        tracing_subscriber::registry().with(console_layer).init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "msm.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_filter = EnvFilter::try_new(&filter_string).expect("valid tracing filter");
    let file_layer = tracing_subscriber::fmt::layer().json().with_writer(non_blocking).with_filter(file_filter);

    tracing_subscriber::registry().with(console_layer).with(file_layer).init();
    tracing::info!(log_dir = ?config.log_dir, max_files = config.max_files, "file logging enabled");

    let log_dir = config.log_dir.clone();
    let max_files = config.max_files;
    std::thread::spawn(move || cleanup_old_logs(&log_dir, max_files));

    Some(guard)
}

fn cleanup_old_logs(log_dir: &PathBuf, max_files: usize) {
    let entries = match std::fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    let mut log_files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with("msm.log")))
        .filter_map(|e| e.metadata().ok().and_then(|m| m.modified().ok()).map(|t| (e.path(), t)))
        .collect();

    log_files.sort_by(|a, b| b.1.cmp(&a.1));
    for (path, _) in log_files.into_iter().skip(max_files) {
        let _ = std::fs::remove_file(&path);
    }
}
