//! Raw sample sources.
//!
//! - [`csv`]: one numeric column of a comma-separated table
//! - [`stream`]: live `t,y;` batches over TCP

pub mod csv;
pub mod stream;

pub use self::csv::{ColumnReader, CsvIngest, MalformedRow, RowDefect, PIEZO_COLUMN};
pub use self::stream::{collect_tcp, FrameDecoder, StreamCollection, StreamSample, DEFAULT_STREAM_PORT};

use thiserror::Error;

/// Unrecoverable ingestion failures. Malformed rows are not errors.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
}
