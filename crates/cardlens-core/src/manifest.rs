//! Run manifest for audit.
//!
//! The engine emits a manifest after a successful run. Two runs over the same
//! inputs carry the same input and output digests.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::Hash256;
use crate::id::Generation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestId(pub Uuid);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub id: ManifestId,

    /// Generation of the run that produced this manifest.
    pub generation: Generation,

    /// Engine version string for provenance.
    pub engine_version: String,

    /// Digest of the package archive as read from disk.
    pub package_digest: Hash256,

    /// Digest of the database image extracted from the package.
    pub package_image_digest: Option<Hash256>,

    /// Digest of the scan export image.
    pub scan_digest: Hash256,

    /// Digest of the rendered output, set once the output is encoded.
    pub output_digest: Option<Hash256>,

    pub card_names: usize,
    pub scanned_rows: usize,
    pub matched_rows: usize,
    pub unmatched_rows: usize,

    /// Milliseconds since Unix epoch (UTC).
    pub started_ms: u64,
    pub finished_ms: u64,
}

impl RunManifest {
    pub fn new(
        generation: Generation,
        package_digest: Hash256,
        scan_digest: Hash256,
        started_ms: u64,
    ) -> Self {
        Self {
            id: ManifestId(Uuid::new_v4()),
            generation,
            engine_version: crate::VERSION.to_string(),
            package_digest,
            package_image_digest: None,
            scan_digest,
            output_digest: None,
            card_names: 0,
            scanned_rows: 0,
            matched_rows: 0,
            unmatched_rows: 0,
            started_ms,
            finished_ms: started_ms,
        }
    }

    pub fn finish(mut self, finished_ms: u64) -> Self {
        self.finished_ms = finished_ms;
        self
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_ms.saturating_sub(self.started_ms)
    }
}
