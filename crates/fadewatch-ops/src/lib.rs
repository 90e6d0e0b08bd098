//! Operational helpers: logging setup and session export.

use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::Utc;
use fadewatch_types::{config::OpsConfig, export::ExportRow, FadewatchError, Result};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| ops_error(format!("failed to create log filter: {err}")))?;

    match &config.log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => fmt().with_env_filter(filter).try_init(),
    }
    .map_err(|err| ops_error(format!("tracing init error: {err}")))?;
    Ok(())
}

fn open_log_file(path: &str) -> Result<File> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| ops_error(format!("failed to create log dir: {err}")))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| ops_error(format!("failed to open log file {path}: {err}")))
}

pub fn ensure_export_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    fs::create_dir_all(&dir)
        .map_err(|err| ops_error(format!("failed to create export dir: {err}")))?;
    Ok(dir)
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    exported_at: chrono::DateTime<Utc>,
    rows: &'a [ExportRow],
}

/// Writes `rows` as a timestamped JSON document under `dir`.
pub fn write_export(dir: &str, rows: &[ExportRow]) -> Result<PathBuf> {
    let dir = ensure_export_dir(dir)?;
    let exported_at = Utc::now();
    let path = dir.join(format!(
        "fadewatch_{}.json",
        exported_at.format("%Y%m%d_%H%M%S_%3f")
    ));
    let doc = serde_json::to_string_pretty(&ExportDocument { exported_at, rows })
        .map_err(|err| ops_error(format!("failed to encode export: {err}")))?;
    fs::write(&path, doc).map_err(|err| ops_error(format!("failed to write export: {err}")))?;
    info!(rows = rows.len(), "session exported to {:?}", path);
    Ok(path)
}

pub fn ops_error(message: impl Into<String>) -> FadewatchError {
    FadewatchError::Ops(message.into())
}
