//! Streaming NDJSON writer.

use std::io::{BufWriter, Write};

use crate::error::{Error, Result};
use cardlens_core::types::{RowBatch, Scalar};

pub struct JsonlWriter<W: Write> {
    writer: BufWriter<W>,
    // key order to keep column ordering stable across batches
    columns: Vec<String>,
}

impl<W: Write> JsonlWriter<W> {
    pub fn to_writer(writer: W, columns: Option<Vec<String>>) -> Self {
        Self {
            writer: BufWriter::new(writer),
            columns: columns.unwrap_or_default(),
        }
    }

    /// Write a batch as one JSON object per line.
    /// If `columns` was empty, take it from the first batch.
    pub fn write_batch(&mut self, batch: &RowBatch) -> Result<()> {
        if self.columns.is_empty() {
            self.columns = batch.columns.iter().map(|c| c.name.clone()).collect();
        }
        for r in 0..batch.num_rows() {
            let mut obj = serde_json::Map::new();
            for name in &self.columns {
                if let Some(col) = batch.column(name) {
                    obj.insert(name.clone(), scalar_to_json(&col.values[r]));
                }
            }
            let line = serde_json::to_string(&obj)?;
            writeln!(self.writer, "{}", line)?;
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

fn scalar_to_json(v: &Scalar) -> serde_json::Value {
    use Scalar::*;
    match v {
        Null => serde_json::Value::Null,
        I64(i) => serde_json::Value::from(*i),
        F64(f) => serde_json::Value::from(*f),
        Str(s) => serde_json::Value::String(s.clone()),
        Bin(_) => serde_json::Value::String(v.to_string()), // hex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardlens_core::types::Column;

    #[test]
    fn keys_follow_column_order_and_null_name_is_null() {
        let batch = RowBatch::new(vec![
            Column::new("count", vec![Scalar::I64(3)]),
            Column::new("card", vec![Scalar::I64(99)]),
            Column::new("name", vec![Scalar::Null]),
        ])
        .unwrap();
        let mut w = JsonlWriter::to_writer(Vec::new(), None);
        w.write_batch(&batch).unwrap();
        let out = String::from_utf8(w.into_inner().unwrap()).unwrap();
        assert_eq!(out, "{\"count\":3,\"card\":99,\"name\":null}\n");
    }
}
