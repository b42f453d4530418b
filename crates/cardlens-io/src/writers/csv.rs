//! CSV writer: a header row of column names, then one record per row.
//!
//! Nulls become empty fields and blobs lowercase hex, so an unresolved name
//! shows up as an empty cell rather than a placeholder string.

use std::io::Write;

use cardlens_core::types::RowBatch;

use crate::error::{Error, Result};

pub struct CsvWriter<W: Write> {
    writer: csv::Writer<W>,
    header_written: bool,
}

impl<W: Write> CsvWriter<W> {
    pub fn to_writer(writer: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().from_writer(writer),
            header_written: false,
        }
    }

    /// Write a batch. The header comes from the first batch written.
    pub fn write_batch(&mut self, batch: &RowBatch) -> Result<()> {
        if !self.header_written {
            self.writer.write_record(batch.column_names())?;
            self.header_written = true;
        }
        for r in 0..batch.num_rows() {
            self.writer
                .write_record(batch.columns.iter().map(|c| c.values[r].to_string()))?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardlens_core::types::{Column, Scalar};

    #[test]
    fn null_renders_as_empty_field() {
        let batch = RowBatch::new(vec![
            Column::new("card", vec![Scalar::I64(1), Scalar::I64(99)]),
            Column::new("count", vec![Scalar::I64(3), Scalar::I64(1)]),
            Column::new(
                "name",
                vec![Scalar::Str("Fireball".into()), Scalar::Null],
            ),
        ])
        .unwrap();
        let mut w = CsvWriter::to_writer(Vec::new());
        w.write_batch(&batch).unwrap();
        let out = String::from_utf8(w.into_inner().unwrap()).unwrap();
        assert_eq!(out, "card,count,name\n1,3,Fireball\n99,1,\n");
    }

    #[test]
    fn quotes_fields_with_delimiters() {
        let batch = RowBatch::new(vec![Column::new(
            "name",
            vec![Scalar::Str("Ajani, Mentor".into())],
        )])
        .unwrap();
        let mut w = CsvWriter::to_writer(Vec::new());
        w.write_batch(&batch).unwrap();
        let out = String::from_utf8(w.into_inner().unwrap()).unwrap();
        assert_eq!(out, "name\n\"Ajani, Mentor\"\n");
    }
}
