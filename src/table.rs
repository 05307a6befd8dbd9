//! Append-only daily log tables.
//!
//! One file per day: a `# `-prefixed comma-joined header line, then one
//! comma-joined row per measurement cycle. Each cron invocation opens the
//! file, appends a row, and exits; there is no coordination between writers.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use log::warn;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("table i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("row has {got} fields, table has {expected} columns")]
    ColumnCount { expected: usize, got: usize },
}

#[derive(Clone, Debug)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Parse a table from file contents. Rows with the wrong field count
    /// are skipped with a warning; a corrupt line should not cost the rest
    /// of the day's history.
    pub fn parse(columns: &[&str], text: &str) -> Self {
        let mut table = Self::new(columns);
        for line in text.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if let Some(header) = line.strip_prefix('#') {
                table.columns = header.trim().split(',').map(|c| c.trim().to_string()).collect();
                continue;
            }
            let fields: Vec<String> = line.split(',').map(|f| f.trim().to_string()).collect();
            if fields.len() == table.columns.len() {
                table.rows.push(fields);
            } else {
                warn!(
                    "skipping malformed table row ({} fields, expected {}): {line:?}",
                    fields.len(),
                    table.columns.len()
                );
            }
        }
        table
    }

    /// Load a daily table. A missing file yields an empty table with the
    /// given columns so history-driven policies see "no history" rather
    /// than an error.
    pub fn load(path: &Path, columns: &[&str]) -> Result<Self, TableError> {
        if !path.exists() {
            return Ok(Self::new(columns));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(columns, &text))
    }

    /// Append one row, writing the header first when the file is new.
    pub fn append_row(path: &Path, columns: &[&str], row: &[String]) -> Result<(), TableError> {
        if row.len() != columns.len() {
            return Err(TableError::ColumnCount {
                expected: columns.len(),
                got: row.len(),
            });
        }
        let new_file = !path.exists();
        let mut file = OpenOptions::new().append(true).create(true).open(path)?;
        if new_file {
            writeln!(file, "# {}", columns.join(","))?;
        }
        writeln!(file, "{}", row.join(","))?;
        Ok(())
    }

    /// All values of one column, in row order. Rows too short for the
    /// column (possible when a stray header line widened the column list
    /// mid-file) contribute an empty field rather than a panic.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }

    /// The most recent value of one column.
    pub fn last(&self, name: &str) -> Option<&str> {
        self.column(name)?.last().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
