//! Isolated SQLite query contexts over in-memory database images.
//!
//! A context owns its image: the bytes are handed over whole, restored into a
//! private in-memory connection, and released when the context is closed or
//! dropped. Contexts never share a connection, so two images loaded in the
//! same run cannot see each other.

use std::io::Write;

use rusqlite::backup::Progress;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, DatabaseName};
use tracing::debug;

use cardlens_core::types::{Column, RowBatch, Scalar};

use crate::error::{Error, Result};

/// Every SQLite database file starts with this header string.
pub const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

#[derive(Debug)]
pub struct QueryContext {
    conn: Connection,
    image_len: usize,
}

impl QueryContext {
    /// Load a full database image into a fresh in-memory connection.
    ///
    /// The image is staged in a private temporary file only for the duration
    /// of the restore; after this returns nothing of it remains on disk.
    pub fn load(image: Vec<u8>) -> Result<Self> {
        let image_len = image.len();
        if !image.starts_with(SQLITE_MAGIC) {
            return Err(Error::NotADatabase { len: image_len });
        }

        let mut conn = Connection::open_in_memory()?;
        {
            let mut staged = tempfile::Builder::new()
                .prefix("cardlens-")
                .suffix(".db")
                .tempfile()?;
            staged.write_all(&image)?;
            staged.flush()?;
            drop(image);
            conn.restore(DatabaseName::Main, staged.path(), None::<fn(Progress)>)?;
        }
        conn.pragma_update(None, "query_only", true)?;

        debug!(bytes = image_len, "loaded database image");
        Ok(Self { conn, image_len })
    }

    /// Size in bytes of the image this context was loaded from.
    pub fn image_len(&self) -> usize {
        self.image_len
    }

    /// Run one statement and collect every row, in the order SQLite yields them.
    pub fn query(&self, sql: &str) -> Result<RowBatch> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut columns: Vec<Column> = stmt
            .column_names()
            .into_iter()
            .map(|name| Column::new(name, Vec::new()))
            .collect();

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (idx, col) in columns.iter_mut().enumerate() {
                col.values.push(scalar_from_ref(row.get_ref(idx)?));
            }
        }

        let batch = RowBatch { columns };
        debug!(sql, rows = batch.num_rows(), "query finished");
        Ok(batch)
    }

    /// User tables of the image, sorted by name.
    pub fn tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    pub fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", table.replace('"', "\"\""));
        let n: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    /// Release the connection and the image it holds.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Sqlite(e))
    }
}

/// Load `image`, hand the context to `f`, and close it whatever `f` returns.
pub fn with_context<T, E, F>(image: Vec<u8>, f: F) -> std::result::Result<T, E>
where
    F: FnOnce(&QueryContext) -> std::result::Result<T, E>,
    E: From<Error>,
{
    let ctx = QueryContext::load(image)?;
    let out = f(&ctx);
    let closed = ctx.close();
    let value = out?;
    closed?;
    Ok(value)
}

fn scalar_from_ref(v: ValueRef<'_>) -> Scalar {
    match v {
        ValueRef::Null => Scalar::Null,
        ValueRef::Integer(i) => Scalar::I64(i),
        ValueRef::Real(f) => Scalar::F64(f),
        ValueRef::Text(t) => Scalar::Str(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Scalar::Bin(b.to_vec()),
    }
}

/// Test helper: run `sql` against an empty database file and return its bytes.
#[cfg(test)]
pub(crate) fn image_from_sql(sql: &str) -> Vec<u8> {
    let file = tempfile::NamedTempFile::new().unwrap();
    {
        let conn = Connection::open(file.path()).unwrap();
        conn.execute_batch(sql).unwrap();
    }
    std::fs::read(file.path()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKAGE_SQL: &str = "
        CREATE TABLE names (_id INTEGER PRIMARY KEY, name TEXT);
        CREATE TABLE cards (_id INTEGER PRIMARY KEY, name INTEGER);
        INSERT INTO names VALUES (10, 'Fireball'), (11, 'Counterspell');
        INSERT INTO cards VALUES (1, 10), (2, 11), (3, 12);
    ";

    #[test]
    fn runs_join_query_against_loaded_image() {
        let ctx = QueryContext::load(image_from_sql(PACKAGE_SQL)).unwrap();
        let batch = ctx
            .query("SELECT cards._id, names.name FROM cards JOIN names ON cards.name = names._id ORDER BY cards._id")
            .unwrap();
        assert_eq!(batch.column_names(), vec!["_id", "name"]);
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.columns[0].values, vec![Scalar::I64(1), Scalar::I64(2)]);
        assert_eq!(
            batch.columns[1].values,
            vec![Scalar::Str("Fireball".into()), Scalar::Str("Counterspell".into())]
        );
        ctx.close().unwrap();
    }

    #[test]
    fn preserves_storage_classes() {
        let ctx = QueryContext::load(image_from_sql(
            "CREATE TABLE cards (card INTEGER, price REAL, note TEXT, art BLOB);
             INSERT INTO cards VALUES (1, 0.25, NULL, x'00ff');",
        ))
        .unwrap();
        let batch = ctx.query("SELECT * FROM cards").unwrap();
        let row = batch.row(0).unwrap();
        assert_eq!(
            row,
            vec![
                &Scalar::I64(1),
                &Scalar::F64(0.25),
                &Scalar::Null,
                &Scalar::Bin(vec![0x00, 0xff]),
            ]
        );
    }

    #[test]
    fn rejects_bytes_without_sqlite_header() {
        let err = QueryContext::load(b"PK\x03\x04 not sqlite".to_vec()).unwrap_err();
        assert!(matches!(err, Error::NotADatabase { len: 15 }));
    }

    #[test]
    fn context_is_read_only() {
        let ctx = QueryContext::load(image_from_sql(PACKAGE_SQL)).unwrap();
        assert!(ctx.query("DELETE FROM cards").is_err());
        assert_eq!(ctx.count_rows("cards").unwrap(), 3);
    }

    #[test]
    fn lists_tables_and_counts() {
        let ctx = QueryContext::load(image_from_sql(PACKAGE_SQL)).unwrap();
        assert_eq!(ctx.tables().unwrap(), vec!["cards", "names"]);
        assert_eq!(ctx.count_rows("names").unwrap(), 2);
    }

    #[test]
    fn contexts_are_isolated() {
        let a = QueryContext::load(image_from_sql(PACKAGE_SQL)).unwrap();
        let b = QueryContext::load(image_from_sql(
            "CREATE TABLE cards (card INTEGER, count INTEGER); INSERT INTO cards VALUES (1, 3);",
        ))
        .unwrap();
        assert_eq!(a.count_rows("cards").unwrap(), 3);
        assert_eq!(b.count_rows("cards").unwrap(), 1);
        assert!(b.query("SELECT * FROM names").is_err());
    }

    #[test]
    fn with_context_propagates_closure_error() {
        let result: Result<RowBatch> = with_context(image_from_sql(PACKAGE_SQL), |ctx| {
            ctx.query("SELECT * FROM missing_table")
        });
        assert!(matches!(result, Err(Error::Sqlite(_))));
    }
}
