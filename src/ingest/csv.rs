//! Single-column extraction from comma-separated sensor logs.
//!
//! Rows are read in order; blank lines are ignored and rows whose tracked
//! column is missing or not a finite number are skipped and reported. Row
//! order is the temporal order of the samples. Quotes carry no meaning, so
//! every line is split on commas on its own.

use super::IngestError;
use csv::{ByteRecord, ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Column of the piezo signal in the reference logs (`raw(:,2)`).
pub const PIEZO_COLUMN: usize = 1;

/// Why a row was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowDefect {
    /// The row has too few columns
    MissingColumn { columns: usize },
    /// The value is not a finite number
    NotNumeric { value: String },
}

impl std::fmt::Display for RowDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowDefect::MissingColumn { columns } => write!(f, "only {columns} column(s)"),
            RowDefect::NotNumeric { value } => write!(f, "non-numeric value '{value}'"),
        }
    }
}

/// A skipped row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedRow {
    /// 1-based line number in the source
    pub line: u64,
    pub defect: RowDefect,
}

/// Samples read from a table plus the rows that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvIngest {
    pub samples: Vec<f32>,
    pub skipped: Vec<MalformedRow>,
}

/// Reads one numeric column from CSV input.
#[derive(Debug, Clone, Copy)]
pub struct ColumnReader {
    column: usize,
}

impl ColumnReader {
    pub fn new(column: usize) -> Self {
        Self { column }
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn read_path(&self, path: impl AsRef<Path>) -> Result<CsvIngest, IngestError> {
        let file = std::fs::File::open(path.as_ref())?;
        let ingest = self.read(std::io::BufReader::new(file))?;
        tracing::info!(
            path = %path.as_ref().display(),
            samples = ingest.samples.len(),
            skipped = ingest.skipped.len(),
            "loaded samples"
        );
        Ok(ingest)
    }

    pub fn read_str(&self, text: &str) -> Result<CsvIngest, IngestError> {
        self.read(text.as_bytes())
    }

    pub fn read<R: Read>(&self, reader: R) -> Result<CsvIngest, IngestError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .trim(Trim::All)
            .from_reader(reader);

        let mut ingest = CsvIngest::default();
        let mut record = ByteRecord::new();

        while reader.read_byte_record(&mut record)? {
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }

            let line = record.position().map(|p| p.line()).unwrap_or(0);
            match self.extract(&record) {
                Ok(value) => ingest.samples.push(value),
                Err(defect) => {
                    tracing::debug!(line, "skipping row: {defect}");
                    ingest.skipped.push(MalformedRow { line, defect });
                }
            }
        }

        if !ingest.skipped.is_empty() {
            tracing::warn!(
                skipped = ingest.skipped.len(),
                column = self.column,
                "skipped malformed rows"
            );
        }
        Ok(ingest)
    }

    fn extract(&self, record: &ByteRecord) -> Result<f32, RowDefect> {
        let field = record.get(self.column).ok_or(RowDefect::MissingColumn {
            columns: record.len(),
        })?;

        std::str::from_utf8(field)
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
            .filter(|v| v.is_finite())
            .ok_or_else(|| RowDefect::NotNumeric {
                value: String::from_utf8_lossy(field).into_owned(),
            })
    }
}

impl Default for ColumnReader {
    fn default() -> Self {
        Self::new(PIEZO_COLUMN)
    }
}
