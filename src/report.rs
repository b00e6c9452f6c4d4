//! Result reporting.
//!
//! Writes a status line and a preview of the first rows, either as an
//! aligned text table or as a single JSON document.

use std::io::Write;

use serde::Serialize;

use crate::db::{QueryResult, Row, Value};
use crate::error::{PeekError, Result};

/// Number of rows shown in the preview by default.
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

/// Maximum width for any column.
const MAX_COLUMN_WIDTH: usize = 40;

/// Minimum width for any column.
const MIN_COLUMN_WIDTH: usize = 4;

/// Output format for the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Status line plus an aligned table.
    #[default]
    Text,
    /// One JSON object.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = PeekError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(PeekError::config(format!(
                "Invalid output format: {s}. Expected: text or json"
            ))),
        }
    }
}

/// Prints query results.
#[derive(Debug, Clone)]
pub struct Reporter {
    format: OutputFormat,
    preview_rows: usize,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(OutputFormat::default(), DEFAULT_PREVIEW_ROWS)
    }
}

impl Reporter {
    pub fn new(format: OutputFormat, preview_rows: usize) -> Self {
        Self {
            format,
            preview_rows,
        }
    }

    /// Writes the report for `result`, read from `table`.
    pub fn report<W: Write>(&self, out: &mut W, table: &str, result: &QueryResult) -> Result<()> {
        match self.format {
            OutputFormat::Text => self.write_text(out, table, result),
            OutputFormat::Json => self.write_json(out, table, result),
        }
    }

    fn write_text<W: Write>(&self, out: &mut W, table: &str, result: &QueryResult) -> Result<()> {
        writeln!(
            out,
            "Successfully retrieved {} rows from {table}",
            result.row_count()
        )?;

        if result.is_empty() || result.columns.is_empty() {
            writeln!(out, "(no rows)")?;
            return Ok(());
        }

        let preview = result.head(self.preview_rows);
        if preview.is_empty() {
            return Ok(());
        }

        writeln!(out, "Preview (first {} rows):", preview.len())?;
        for line in render_table(result, preview) {
            writeln!(out, "{}", line.trim_end())?;
        }
        Ok(())
    }

    fn write_json<W: Write>(&self, out: &mut W, table: &str, result: &QueryResult) -> Result<()> {
        let report = JsonReport {
            table,
            row_count: result.row_count(),
            execution_time_ms: result.execution_time.as_millis() as u64,
            columns: result
                .columns
                .iter()
                .map(|c| JsonColumn {
                    name: &c.name,
                    data_type: &c.data_type,
                })
                .collect(),
            preview: result
                .head(self.preview_rows)
                .iter()
                .map(|row| row.iter().map(Value::to_json).collect())
                .collect(),
        };

        serde_json::to_writer_pretty(&mut *out, &report)
            .map_err(|e| PeekError::internal(format!("Failed to serialize report: {e}")))?;
        writeln!(out)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    table: &'a str,
    row_count: usize,
    execution_time_ms: u64,
    columns: Vec<JsonColumn<'a>>,
    preview: Vec<Vec<serde_json::Value>>,
}

#[derive(Serialize)]
struct JsonColumn<'a> {
    name: &'a str,
    data_type: &'a str,
}

/// Renders header, separator and rows with per-column widths.
fn render_table(result: &QueryResult, rows: &[Row]) -> Vec<String> {
    let widths = column_widths(result, rows);

    let header = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(col, &w)| pad(&truncate(&col.name, w), w))
        .collect::<Vec<_>>()
        .join(" | ");
    let separator = widths
        .iter()
        .map(|&w| "-".repeat(w))
        .collect::<Vec<_>>()
        .join("-+-");

    let mut lines = vec![header, separator];
    for row in rows {
        let line = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let cell = row.get(i).map(Value::to_display_string).unwrap_or_default();
                pad(&truncate(&cell, w), w)
            })
            .collect::<Vec<_>>()
            .join(" | ");
        lines.push(line);
    }
    lines
}

/// Calculates the width of each column from its header and preview cells.
fn column_widths(result: &QueryResult, rows: &[Row]) -> Vec<usize> {
    let mut widths: Vec<usize> = result
        .columns
        .iter()
        .map(|col| col.name.chars().count().max(MIN_COLUMN_WIDTH))
        .collect();

    for row in rows {
        for (i, value) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(value.to_display_string().chars().count());
            }
        }
    }

    widths.iter().map(|&w| w.min(MAX_COLUMN_WIDTH)).collect()
}

/// Truncates a string to fit within the given width, adding ellipsis if needed.
fn truncate(s: &str, max_width: usize) -> String {
    if s.chars().count() <= max_width {
        s.to_string()
    } else if max_width <= 3 {
        s.chars().take(max_width).collect()
    } else {
        let kept: String = s.chars().take(max_width - 3).collect();
        format!("{kept}...")
    }
}

fn pad(s: &str, width: usize) -> String {
    format!("{s:<width$}")
}
