//! Lightweight value/column types for query results and join output.
//!
//! Values mirror SQLite's storage classes so rows can be carried through the
//! join without losing anything the source database held.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{DataType, Field, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    I64(i64),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Null => DataType::Null,
            Scalar::I64(_) => DataType::Int64,
            Scalar::F64(_) => DataType::Float64,
            Scalar::Str(_) => DataType::Utf8,
            Scalar::Bin(_) => DataType::Binary,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Text rendering used by the delimited writers. Nulls render empty.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::I64(v) => write!(f, "{v}"),
            Scalar::F64(v) => write!(f, "{v}"),
            Scalar::Str(s) => f.write_str(s),
            Scalar::Bin(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Columnar batch of rows: every column holds the same number of values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowBatch {
    pub columns: Vec<Column>,
}

impl RowBatch {
    /// Build a batch, rejecting ragged columns.
    pub fn new(columns: Vec<Column>) -> crate::Result<Self> {
        if let Some(first) = columns.first() {
            if let Some(bad) = columns.iter().find(|c| c.len() != first.len()) {
                return Err(crate::Error::Invariant(format!(
                    "column '{}' has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    first.len()
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Values of row `idx` in column order.
    pub fn row(&self, idx: usize) -> Option<Vec<&Scalar>> {
        if idx >= self.num_rows() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[idx]).collect())
    }

    /// Infer a schema: the first non-null value of a column decides its type,
    /// a column is nullable if any of its values is null.
    pub fn schema(&self) -> Schema {
        let fields = self
            .columns
            .iter()
            .map(|col| {
                let data_type = col
                    .values
                    .iter()
                    .find(|v| !v.is_null())
                    .map(Scalar::data_type)
                    .unwrap_or(DataType::Null);
                let nullable = col.values.iter().any(Scalar::is_null);
                Field::new(col.name.clone(), data_type, nullable)
            })
            .collect();
        Schema::new(fields)
    }
}
