//! Left lookup join of scanned rows against the card name table.
//!
//! Every scanned row comes out exactly once, in input order, with every
//! original value untouched plus one resolved name. Ids without a name keep
//! their row and get a NULL name. No dedup, sort or aggregation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use cardlens_core::records::{CardNameTable, ScannedCardTable};
use cardlens_core::types::{Column, RowBatch, Scalar};

use crate::error::OpError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStats {
    pub rows: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Rows whose key was NULL (counted in `unmatched` too).
    pub null_keys: usize,
    /// The scan already had a column named like the output column and its
    /// values were replaced in place.
    pub replaced_column: bool,
}

#[derive(Debug, Clone)]
pub struct JoinOutput {
    pub batch: RowBatch,
    pub stats: JoinStats,
    /// Distinct ids without a name, in first-seen order.
    pub unmatched_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct LookupJoin {
    /// Scan column holding the card id.
    pub key_column: String,
    /// Column that receives the resolved name.
    pub output_column: String,
}

impl LookupJoin {
    pub fn new(key_column: impl Into<String>, output_column: impl Into<String>) -> Self {
        Self {
            key_column: key_column.into(),
            output_column: output_column.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        "join_lookup"
    }

    pub fn eval(
        &self,
        scanned: &ScannedCardTable,
        names: &CardNameTable,
    ) -> Result<JoinOutput, OpError> {
        let key_field = scanned
            .schema
            .field(scanned.key_index)
            .ok_or_else(|| OpError::Schema("scan key index out of range".into()))?;
        if key_field.name != self.key_column {
            return Err(OpError::Schema(format!(
                "scan table is keyed on '{}', join expects '{}'",
                key_field.name, self.key_column
            )));
        }

        let n = scanned.len();
        let mut columns: Vec<Column> = scanned
            .schema
            .fields
            .iter()
            .map(|f| Column::new(f.name.clone(), Vec::with_capacity(n)))
            .collect();
        let mut resolved = Vec::with_capacity(n);
        let mut stats = JoinStats {
            rows: n,
            ..Default::default()
        };
        let mut unmatched_ids = Vec::new();
        let mut seen_unmatched = HashSet::new();

        for (idx, row) in scanned.rows.iter().enumerate() {
            if row.values.len() != columns.len() {
                return Err(OpError::Exec(format!(
                    "scanned row {idx} has {} values, schema has {} columns",
                    row.values.len(),
                    columns.len()
                )));
            }
            for (col, value) in columns.iter_mut().zip(&row.values) {
                col.values.push(value.clone());
            }

            match row.card.and_then(|id| names.get(id)) {
                Some(name) => {
                    stats.matched += 1;
                    resolved.push(Scalar::Str(name.to_string()));
                }
                None => {
                    stats.unmatched += 1;
                    match row.card {
                        Some(id) => {
                            if seen_unmatched.insert(id) {
                                unmatched_ids.push(id);
                            }
                        }
                        None => stats.null_keys += 1,
                    }
                    resolved.push(Scalar::Null);
                }
            }
        }

        match scanned.schema.index_of(&self.output_column) {
            Some(idx) => {
                columns[idx].values = resolved;
                stats.replaced_column = true;
            }
            None => columns.push(Column::new(self.output_column.clone(), resolved)),
        }

        let batch = RowBatch::new(columns).map_err(|e| OpError::Exec(e.to_string()))?;
        Ok(JoinOutput {
            batch,
            stats,
            unmatched_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanned(columns: Vec<Column>) -> ScannedCardTable {
        ScannedCardTable::from_batch(&RowBatch::new(columns).unwrap(), "card").unwrap()
    }

    fn names() -> CardNameTable {
        [(1, "Fireball".to_string()), (2, "Lightning Bolt".to_string())]
            .into_iter()
            .collect()
    }

    #[test]
    fn resolves_name_and_keeps_fields() {
        let table = scanned(vec![
            Column::new("card", vec![Scalar::I64(1)]),
            Column::new("count", vec![Scalar::I64(3)]),
        ]);
        let out = LookupJoin::new("card", "name").eval(&table, &names()).unwrap();
        assert_eq!(out.batch.column_names(), vec!["card", "count", "name"]);
        assert_eq!(
            out.batch.row(0).unwrap(),
            vec![
                &Scalar::I64(1),
                &Scalar::I64(3),
                &Scalar::Str("Fireball".into())
            ]
        );
        assert_eq!(out.stats.matched, 1);
        assert_eq!(out.stats.unmatched, 0);
    }

    #[test]
    fn unmatched_rows_are_kept_with_null_name() {
        let table = scanned(vec![
            Column::new(
                "card",
                vec![Scalar::I64(99), Scalar::I64(2), Scalar::I64(99), Scalar::Null],
            ),
            Column::new(
                "foil",
                vec![Scalar::I64(0), Scalar::I64(1), Scalar::I64(0), Scalar::I64(0)],
            ),
        ]);
        let out = LookupJoin::new("card", "name").eval(&table, &names()).unwrap();
        assert_eq!(out.batch.num_rows(), 4);
        let name = out.batch.column("name").unwrap();
        assert_eq!(
            name.values,
            vec![
                Scalar::Null,
                Scalar::Str("Lightning Bolt".into()),
                Scalar::Null,
                Scalar::Null
            ]
        );
        assert_eq!(out.stats.matched, 1);
        assert_eq!(out.stats.unmatched, 3);
        assert_eq!(out.stats.null_keys, 1);
        assert_eq!(out.unmatched_ids, vec![99]);
    }

    #[test]
    fn unmatched_ids_are_distinct_in_first_seen_order() {
        let keys: Vec<Scalar> = (0..5000).map(|i| Scalar::I64(1000 + i % 250)).collect();
        let table = scanned(vec![Column::new("card", keys)]);
        let out = LookupJoin::new("card", "name").eval(&table, &names()).unwrap();
        assert_eq!(out.stats.unmatched, 5000);
        assert_eq!(out.unmatched_ids, (1000..1250).collect::<Vec<i64>>());
    }

    #[test]
    fn existing_name_column_is_replaced_in_place() {
        let table = scanned(vec![
            Column::new("name", vec![Scalar::Str("scanner guess".into())]),
            Column::new("card", vec![Scalar::I64(1)]),
        ]);
        let out = LookupJoin::new("card", "name").eval(&table, &names()).unwrap();
        assert_eq!(out.batch.column_names(), vec!["name", "card"]);
        assert_eq!(
            out.batch.columns[0].values,
            vec![Scalar::Str("Fireball".into())]
        );
        assert!(out.stats.replaced_column);
    }

    #[test]
    fn empty_scan_yields_header_only_batch() {
        let table = scanned(vec![Column::new("card", vec![])]);
        let out = LookupJoin::new("card", "name").eval(&table, &names()).unwrap();
        assert_eq!(out.batch.num_rows(), 0);
        assert_eq!(out.batch.column_names(), vec!["card", "name"]);
    }

    #[test]
    fn key_mismatch_is_a_schema_error() {
        let table = scanned(vec![Column::new("card", vec![Scalar::I64(1)])]);
        let err = LookupJoin::new("card_id", "name")
            .eval(&table, &names())
            .unwrap_err();
        assert!(matches!(err, OpError::Schema(_)));
    }
}
