//! Reading user-selected input files.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

/// Read a whole input file into memory. Both the package and the scan export
/// are needed in full before anything can be queried.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path).map_err(|source| Error::Input {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = bytes.len(), "read input file");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_names_the_path() {
        let err = read_input(Path::new("/nonexistent/cards.dlens")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cards.dlens"));
    }
}
