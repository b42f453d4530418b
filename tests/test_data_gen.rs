//! Fixture builders shared by the integration tests.
#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;

use rusqlite::Connection;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Package database: three card definitions, two of them with names.
pub const PACKAGE_SQL: &str = "
    CREATE TABLE names (_id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE cards (_id INTEGER PRIMARY KEY, name INTEGER NOT NULL);
    INSERT INTO names VALUES (10, 'Fireball'), (11, 'Counterspell'), (12, 'Llanowar Elves');
    INSERT INTO cards VALUES (1, 10), (2, 11), (3, 12);
";

/// Build a SQLite database image by running `sql` against an empty file.
pub fn sqlite_image(sql: &str) -> Vec<u8> {
    let file = tempfile::NamedTempFile::new().expect("temp db");
    {
        let conn = Connection::open(file.path()).expect("open temp db");
        conn.execute_batch(sql).expect("fixture sql");
    }
    fs::read(file.path()).expect("read temp db")
}

/// Zip archive shaped like an application package with `image` at `entry`.
pub fn package_archive(entry: &str, image: &[u8]) -> Vec<u8> {
    let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
    zw.start_file("AndroidManifest.xml", SimpleFileOptions::default()).expect("start manifest");
    zw.write_all(b"<manifest/>").expect("write manifest");
    zw.start_file(entry, SimpleFileOptions::default()).expect("start entry");
    zw.write_all(image).expect("write entry");
    zw.finish().expect("finish zip").into_inner()
}

/// Standard package archive with the card database at its usual place.
pub fn default_package() -> Vec<u8> {
    package_archive("res/raw/data.db", &sqlite_image(PACKAGE_SQL))
}

/// Scan export image with a `cards` table defined by `sql`.
pub fn scan_image(sql: &str) -> Vec<u8> {
    sqlite_image(sql)
}

pub fn write_fixture(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).expect("write fixture");
    path
}
