//! Output writers.

pub mod csv;
pub mod jsonl;

use cardlens_core::config::OutputFormat;
use cardlens_core::types::RowBatch;

use crate::error::Result;

pub use self::csv::CsvWriter;
pub use self::jsonl::JsonlWriter;

/// Render `batch` in memory. The same batch always renders to the same bytes.
pub fn encode(batch: &RowBatch, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Csv => {
            let mut w = CsvWriter::to_writer(Vec::new());
            w.write_batch(batch)?;
            w.into_inner()
        }
        OutputFormat::Jsonl => {
            let mut w = JsonlWriter::to_writer(Vec::new(), None);
            w.write_batch(batch)?;
            w.into_inner()
        }
    }
}
