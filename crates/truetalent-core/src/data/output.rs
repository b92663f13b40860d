// Result table writer (CSV or pretty JSON).

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::engine::compose::{ProjectionRow, ProjectionTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write CSV output: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write one record per row, header first. `None` becomes an empty field.
pub fn write_csv<W: Write>(rows: &[ProjectionRow], writer: W) -> Result<(), OutputError> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// The whole table, including the enabled layers and league baselines.
pub fn write_json<W: Write>(table: &ProjectionTable, mut writer: W) -> Result<(), OutputError> {
    serde_json::to_writer_pretty(&mut writer, table)?;
    writer.write_all(b"\n").map_err(serde_json::Error::io)?;
    writer.flush().map_err(serde_json::Error::io)?;
    Ok(())
}

pub fn write_table_to_writer<W: Write>(
    table: &ProjectionTable,
    format: OutputFormat,
    writer: W,
) -> Result<(), OutputError> {
    match format {
        OutputFormat::Csv => write_csv(&table.rows, writer),
        OutputFormat::Json => write_json(table, writer),
    }
}

/// Write `table` to `path`, creating parent directories as needed.
pub fn write_table(table: &ProjectionTable, format: OutputFormat, path: &Path) -> Result<(), OutputError> {
    let io_err = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = std::fs::File::create(path).map_err(io_err)?;
    write_table_to_writer(table, format, std::io::BufWriter::new(file))?;
    info!("Wrote {} rows to {}", table.rows.len(), path.display());
    Ok(())
}
