//! Typed tables validated at the load boundary.
//!
//! Query results arrive as untyped `RowBatch`es. Before the join sees them
//! they are checked against the shape each side is expected to have:
//!
//! - the package query yields `(id, name)` pairs; a NULL name means the card
//!   has no name and its rows merge with a NULL name;
//! - the scan query yields arbitrary columns, one of which is the card key
//!   (NULL allowed, it simply never matches).
//!
//! Card ids are integers. SQLite columns without a declared type may hold
//! them as integral reals or decimal text, so those are read as the same id.
//! Any other value in an id or key column is a schema error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::types::{RowBatch, Scalar};

/// Integer card id held by `value`: `Some(None)` for NULL, `None` when the
/// value cannot be an id.
pub fn card_key(value: &Scalar) -> Option<Option<i64>> {
    match value {
        Scalar::Null => Some(None),
        Scalar::I64(id) => Some(Some(*id)),
        Scalar::F64(v)
            if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64 =>
        {
            Some(Some(*v as i64))
        }
        Scalar::Str(s) => s.trim().parse::<i64>().ok().map(Some),
        _ => None,
    }
}

/// id -> card name mapping built from the package database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardNameTable {
    names: HashMap<i64, Option<String>>,
    source_rows: usize,
    duplicate_ids: usize,
    null_names: usize,
}

impl CardNameTable {
    /// Validate a two-column `(id, name)` batch and index it by id.
    ///
    /// When an id repeats, the later row wins and the repeat is counted in
    /// [`duplicate_ids`](Self::duplicate_ids).
    pub fn from_batch(batch: &RowBatch) -> Result<Self> {
        if batch.num_columns() != 2 {
            return Err(Error::Schema(format!(
                "card name query must return exactly 2 columns (id, name), got {}: {:?}",
                batch.num_columns(),
                batch.column_names()
            )));
        }
        let ids = &batch.columns[0];
        let names = &batch.columns[1];

        let mut table = CardNameTable {
            names: HashMap::with_capacity(batch.num_rows()),
            ..Default::default()
        };
        for (row, (id, name)) in ids.values.iter().zip(&names.values).enumerate() {
            let id = card_key(id).flatten().ok_or_else(|| {
                Error::Schema(format!(
                    "card name row {row}: id column '{}' must be an integer, got {}",
                    ids.name,
                    id.data_type()
                ))
            })?;
            let name = match name {
                Scalar::Null => None,
                Scalar::Str(s) => Some(s.clone()),
                other => {
                    return Err(Error::Schema(format!(
                        "card name row {row}: name column '{}' must be text, got {}",
                        names.name,
                        other.data_type()
                    )))
                }
            };
            table.insert(id, name);
        }
        Ok(table)
    }

    fn insert(&mut self, id: i64, name: Option<String>) {
        self.source_rows += 1;
        if name.is_none() {
            self.null_names += 1;
        }
        if self.names.insert(id, name).is_some() {
            self.duplicate_ids += 1;
        }
    }

    /// Name of card `id`; `None` when the id is unknown or its name is NULL.
    pub fn get(&self, id: i64) -> Option<&str> {
        self.names.get(&id).and_then(|n| n.as_deref())
    }

    /// Number of distinct ids, named or not.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Rows the table was built from, including repeated ids.
    pub fn source_rows(&self) -> usize {
        self.source_rows
    }

    pub fn duplicate_ids(&self) -> usize {
        self.duplicate_ids
    }

    /// Rows whose name was NULL.
    pub fn null_names(&self) -> usize {
        self.null_names
    }
}

impl FromIterator<(i64, String)> for CardNameTable {
    fn from_iter<I: IntoIterator<Item = (i64, String)>>(iter: I) -> Self {
        let mut table = CardNameTable::default();
        for (id, name) in iter {
            table.insert(id, Some(name));
        }
        table
    }
}

/// One row of the scan export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedCard {
    /// Key into the card name table; `None` when the stored value is NULL.
    pub card: Option<i64>,
    /// Every column of the row, in schema order (the key column included).
    pub values: Vec<Scalar>,
}

/// Rows of the scan export in storage order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedCardTable {
    pub schema: Schema,
    pub key_index: usize,
    pub rows: Vec<ScannedCard>,
}

impl ScannedCardTable {
    /// Validate a scan batch: `key_column` must exist and hold card ids or NULLs.
    pub fn from_batch(batch: &RowBatch, key_column: &str) -> Result<Self> {
        let key_index = batch.index_of(key_column).ok_or_else(|| {
            Error::Schema(format!(
                "scanned cards have no '{key_column}' column (columns: {:?})",
                batch.column_names()
            ))
        })?;

        let rows = (0..batch.num_rows())
            .map(|idx| {
                let values: Vec<Scalar> = batch
                    .columns
                    .iter()
                    .map(|c| c.values[idx].clone())
                    .collect();
                let key = &values[key_index];
                let card = card_key(key).ok_or_else(|| {
                    Error::Schema(format!(
                        "scanned row {idx}: '{key_column}' must be an integer, got {} ({key})",
                        key.data_type()
                    ))
                })?;
                Ok(ScannedCard { card, values })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema: batch.schema(),
            key_index,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
