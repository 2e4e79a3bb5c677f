use std::io::Write;
use std::path::Path;

use serde_json::Value;

use crate::extract::OutputRow;
use crate::jira::JiraError;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("row {row} has columns {found:?}, expected {expected:?}")]
    ColumnMismatch {
        row: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("view failed while exporting: {0}")]
    View(#[from] JiraError),
}

pub fn ensure_dir(path: &Path) -> Result<(), ExportError> {
    std::fs::create_dir_all(path).map_err(|source| ExportError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `rows` to a CSV file at `path`, returning the number of data rows.
pub fn write_csv<I>(path: &Path, rows: I) -> Result<usize, ExportError>
where
    I: IntoIterator<Item = OutputRow>,
{
    let writer = csv::Writer::from_path(path)?;
    write_rows(writer, rows.into_iter().map(Ok))
}

/// Like [`write_csv`] for views whose rows can fail mid-stream.
pub fn try_write_csv<I>(path: &Path, rows: I) -> Result<usize, ExportError>
where
    I: IntoIterator<Item = Result<OutputRow, JiraError>>,
{
    let writer = csv::Writer::from_path(path)?;
    write_rows(writer, rows)
}

/// The header is taken from the first row; an empty view writes an empty file.
fn write_rows<W, I>(mut writer: csv::Writer<W>, rows: I) -> Result<usize, ExportError>
where
    W: Write,
    I: IntoIterator<Item = Result<OutputRow, JiraError>>,
{
    let mut header: Option<Vec<String>> = None;
    let mut written = 0;

    for row in rows {
        let row = row?;
        let columns: Vec<String> = row.columns().map(ToString::to_string).collect();
        match header.as_ref() {
            None => {
                writer.write_record(&columns)?;
                header = Some(columns);
            }
            Some(expected) if *expected != columns => {
                return Err(ExportError::ColumnMismatch {
                    row: written,
                    expected: expected.clone(),
                    found: columns,
                });
            }
            Some(_) => {}
        }
        writer.write_record(row.values().map(cell))?;
        written += 1;
    }

    writer.flush().map_err(csv::Error::from)?;
    Ok(written)
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}
