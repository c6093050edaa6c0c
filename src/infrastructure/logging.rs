//! Logging system configuration and initialization
//!
//! - Console output and an optional non-blocking log file
//! - Level and per-module filters from [`LoggingConfig`], overridable with `RUST_LOG`
//! - Optional structured JSON output
//! - Log files stored in `logs/` next to the executable, rotated on startup

#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use chrono::Utc;
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

/// Dependencies that are only interesting at TRACE
const NOISY_TARGETS: &[(&str, &str)] = &[
    ("reqwest", "info"),
    ("hyper", "warn"),
    ("hyper_util", "warn"),
    ("h2", "warn"),
    ("html5ever", "warn"),
    ("selectors", "warn"),
    ("tokio", "info"),
];

/// UTC timestamps with millisecond precision
struct UtcTimeFormatter;

impl FormatTime for UtcTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC"))
    }
}

/// Get the log directory relative to the executable location
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Build the filter used when `RUST_LOG` is not set
pub fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    let mut filter = EnvFilter::new(&config.level);

    if !config.level.to_lowercase().contains("trace") {
        for (target, level) in NOISY_TARGETS {
            if let Ok(directive) = format!("{}={}", target, level).parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    // Explicit module filters from the config file win over the built-in list
    for (module, level) in &config.module_filters {
        match format!("{}={}", module, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Ignoring invalid log filter {}={}: {}", module, level, e),
        }
    }

    filter
}

/// Rename an existing log file with its modification timestamp
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<()> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(());
    }

    let metadata = std::fs::metadata(&log_file_path)
        .map_err(|e| anyhow!("Failed to get log file metadata: {}", e))?;
    let file_time = metadata
        .modified()
        .unwrap_or_else(|_| std::time::SystemTime::now());
    let datetime: chrono::DateTime<Utc> = file_time.into();

    let file_stem = log_file_name.trim_end_matches(".log");
    let timestamped_name = format!("{}.{}.log", file_stem, datetime.format("%Y%m%dT%H%M%S"));
    let timestamped_path = log_dir.join(&timestamped_name);

    std::fs::rename(&log_file_path, &timestamped_path).map_err(|e| {
        anyhow!(
            "Failed to rotate log file {} to {}: {}",
            log_file_path.display(),
            timestamped_path.display(),
            e
        )
    })?;

    Ok(())
}

/// Initialize logging with custom configuration
///
/// Dependency output (`reqwest`, `hyper`, `html5ever`, `selectors`) is
/// suppressed unless the level is TRACE. `RUST_LOG` replaces the computed
/// filter entirely:
/// ```bash
/// RUST_LOG="debug,reqwest=debug" car-listings listing 41234567
/// ```
pub fn init_logging_with_config(config: LoggingConfig) -> Result<()> {
    init_logging_in(config, &get_log_directory())
}

/// Same as [`init_logging_with_config`], writing log files under `log_dir`
pub fn init_logging_in(config: LoggingConfig, log_dir: &Path) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| build_env_filter(&config));
    let registry = Registry::default().with(env_filter);

    // stdout carries command output, so console logs go to stderr
    match (config.file_output, config.console_output) {
        (true, console) => {
            std::fs::create_dir_all(log_dir)
                .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
            rotate_existing_log_file(log_dir, &config.file_name)?;
            if config.auto_cleanup_logs {
                cleanup_old_logs(log_dir, config.max_files)?;
            }

            let file_appender = rolling::never(log_dir, &config.file_name);
            let (file_writer, file_guard) = non_blocking(file_appender);
            LOG_GUARDS
                .lock()
                .map_err(|_| anyhow!("Log guard registry poisoned"))?
                .push(file_guard);

            if config.json_format {
                let file_layer = fmt::Layer::new()
                    .json()
                    .with_writer(file_writer)
                    .with_timer(UtcTimeFormatter)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false);
                let console_layer = console.then(|| {
                    fmt::Layer::new()
                        .with_writer(std::io::stderr)
                        .with_timer(UtcTimeFormatter)
                        .with_target(false)
                });
                registry.with(file_layer).with(console_layer).try_init()?;
            } else {
                let file_layer = fmt::Layer::new()
                    .with_writer(file_writer)
                    .with_timer(UtcTimeFormatter)
                    .with_target(true)
                    .with_ansi(false);
                let console_layer = console.then(|| {
                    fmt::Layer::new()
                        .with_writer(std::io::stderr)
                        .with_timer(UtcTimeFormatter)
                        .with_target(false)
                });
                registry.with(file_layer).with(console_layer).try_init()?;
            }
        }
        (false, true) => {
            if config.json_format {
                let console_layer = fmt::Layer::new()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_timer(UtcTimeFormatter);
                registry.with(console_layer).try_init()?;
            } else {
                let console_layer = fmt::Layer::new()
                    .with_writer(std::io::stderr)
                    .with_timer(UtcTimeFormatter)
                    .with_target(false);
                registry.with(console_layer).try_init()?;
            }
        }
        (false, false) => {
            return Err(anyhow!("No logging output configured"));
        }
    }

    info!(
        level = %config.level,
        json = config.json_format,
        file = config.file_output,
        "Logging system initialized"
    );
    if config.file_output {
        info!("Log directory: {:?}", log_dir);
    }

    Ok(())
}

/// Remove the oldest `.log` files beyond `max_files`
fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<()> {
    if !log_dir.exists() {
        return Ok(());
    }

    let mut log_files = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".log"));
        if path.is_file() && is_log {
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                log_files.push((path, modified));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(max_files as usize) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove old log file {:?}: {}", path, e);
        }
    }

    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== car-listings {} ===", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);
}
