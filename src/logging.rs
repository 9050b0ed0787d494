use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Local;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Log file name for a run started now, e.g. `2025_11_03_14_05_09.log`.
pub fn log_file_name() -> String {
    format!("{}.log", Local::now().format("%Y_%m_%d_%H_%M_%S"))
}

/// Installs the global subscriber: stderr always, plus a plain-text file under `logs_path` when given.
///
/// Returns the log file path. A subscriber installed earlier is left in place.
pub fn init_logging(logs_path: Option<&Path>) -> Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, log_file) = match logs_path {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create logs directory {:?}", dir))?;
            let path = dir.join(log_file_name());
            let file = File::create(&path)
                .with_context(|| format!("Failed to create log file {:?}", path))?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();

    Ok(log_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_timestamped() {
        let name = log_file_name();
        assert!(name.ends_with(".log"));
        // YYYY_MM_DD_HH_MM_SS
        assert_eq!(name.trim_end_matches(".log").split('_').count(), 6);
    }

    #[test]
    fn creates_log_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let logs = dir.path().join("logs");
        let path = init_logging(Some(&logs)).expect("logging").expect("path");
        assert!(path.starts_with(&logs));
        assert!(path.is_file());
    }
}
