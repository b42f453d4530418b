//! Archive extraction: fetch one named entry from a package archive held in memory.
//!
//! The entry's bytes are returned as-is. Whether they form a usable database
//! is decided later, when the image is loaded into a query context.

use std::io::{Cursor, Read};

use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{Error, Result};

/// Upper bound on the buffer reserved up front from the size the archive claims.
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// A package archive opened over an in-memory buffer.
pub struct PackageArchive<'a> {
    inner: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> PackageArchive<'a> {
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self> {
        let inner =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::Package(e.to_string()))?;
        debug!(entries = inner.len(), bytes = bytes.len(), "opened package archive");
        Ok(Self { inner })
    }

    /// Entry paths in archive order.
    pub fn entry_names(&self) -> Vec<String> {
        self.inner.file_names().map(str::to_string).collect()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.inner.file_names().any(|name| name == entry)
    }

    /// Raw (decompressed) bytes of `entry`.
    pub fn entry_bytes(&mut self, entry: &str) -> Result<Vec<u8>> {
        let mut file = match self.inner.by_name(entry) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => {
                return Err(Error::MissingEntry {
                    entry: entry.to_string(),
                })
            }
            Err(e) => return Err(Error::Package(format!("{entry}: {e}"))),
        };

        let claimed = usize::try_from(file.size()).unwrap_or(MAX_PREALLOC);
        let mut buf = Vec::with_capacity(claimed.min(MAX_PREALLOC));
        file.read_to_end(&mut buf)
            .map_err(|e| Error::Package(format!("{entry}: {e}")))?;
        debug!(entry, bytes = buf.len(), "extracted package entry");
        Ok(buf)
    }
}

/// Open `archive` and return the bytes of `entry`.
pub fn extract_entry(archive: &[u8], entry: &str) -> Result<Vec<u8>> {
    PackageArchive::from_bytes(archive)?.entry_bytes(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            zw.start_file(*name, SimpleFileOptions::default()).unwrap();
            zw.write_all(data).unwrap();
        }
        zw.finish().unwrap().into_inner()
    }

    #[test]
    fn extracts_named_entry_verbatim() {
        let zip = build_zip(&[
            ("AndroidManifest.xml", b"<manifest/>"),
            ("res/raw/data.db", b"not checked here"),
        ]);
        let bytes = extract_entry(&zip, "res/raw/data.db").unwrap();
        assert_eq!(bytes, b"not checked here");
    }

    #[test]
    fn missing_entry_is_reported_by_name() {
        let zip = build_zip(&[("classes.dex", b"dex")]);
        let err = extract_entry(&zip, "res/raw/data.db").unwrap_err();
        assert!(matches!(err, Error::MissingEntry { ref entry } if entry == "res/raw/data.db"));
        assert!(err.to_string().starts_with("could not read package"));
    }

    #[test]
    fn garbage_is_not_a_package() {
        let err = extract_entry(b"definitely not a zip", "res/raw/data.db").unwrap_err();
        assert!(matches!(err, Error::Package(_)));
    }

    #[test]
    fn lists_entries() {
        let zip = build_zip(&[("a.txt", b"a"), ("res/raw/data.db", b"db")]);
        let archive = PackageArchive::from_bytes(&zip).unwrap();
        assert!(archive.contains("res/raw/data.db"));
        assert!(!archive.contains("res/raw/other.db"));
        let mut names = archive.entry_names();
        names.sort();
        assert_eq!(names, vec!["a.txt", "res/raw/data.db"]);
    }
}
