//! Logging setup using tracing
//!
//! The terminal UI owns stderr, so logs go to
//! `<data_local_dir>/nector/logs/nector.log` (or the platform equivalent).

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,nector_chat=debug";

pub fn log_file_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("nector").join("logs").join("nector.log"))
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the file-backed subscriber. Keep the returned guard alive for the
/// lifetime of the process or buffered lines are lost.
pub fn init_logging() -> Option<WorkerGuard> {
    let Some(path) = log_file_path() else {
        init_stderr_logging();
        return None;
    };

    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("[nector] Failed to create log directory {:?}: {}", parent, e);
        }
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path);

    match file {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let subscriber = tracing_subscriber::registry()
                .with(env_filter(DEFAULT_FILTER))
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                );

            if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!("[nector] Failed to set tracing subscriber: {}", e);
                return None;
            }
            tracing::info!("Logging initialized, writing to {:?}", path);
            Some(guard)
        }
        Err(e) => {
            eprintln!("[nector] Failed to open log file {:?}: {}", path, e);
            init_stderr_logging();
            None
        }
    }
}

/// Stderr subscriber for the one-shot subcommands; quiet unless `RUST_LOG` says otherwise
pub fn init_stderr_logging() {
    let subscriber = tracing_subscriber::registry()
        .with(env_filter("warn"))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false));

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("[nector] Failed to set tracing subscriber: {}", e);
    }
}
