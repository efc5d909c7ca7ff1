use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LOG_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "importer.log";
const DEFAULT_FILTER: &str = "address_importer=info,warn";

/// Console logging on stderr plus a daily-rolling JSON log file.
///
/// Records may be streamed on stdout, so nothing human-readable goes there.
/// `RUST_LOG` overrides the default filter and `IMPORTER_LOG_DIR` the file location.
pub fn init_logging() {
    let log_dir = std::env::var("IMPORTER_LOG_DIR")
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_DIR.to_string());
    let _ = fs::create_dir_all(&log_dir);

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX));
    let file_layer = fmt::layer().json().with_writer(file_writer);
    let console_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    // The writer thread lives for the whole process
    std::mem::forget(guard);
}
