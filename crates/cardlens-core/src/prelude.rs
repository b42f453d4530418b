//! Convenient re-exports for downstream crates.

pub use crate::config::{ExportConfig, OutputFormat, ProfileDoc};
pub use crate::error::{Error, Result};
pub use crate::hash::Hash256;
pub use crate::id::Generation;
pub use crate::manifest::{ManifestId, RunManifest};
pub use crate::records::{CardNameTable, ScannedCard, ScannedCardTable};
pub use crate::schema::{DataType, Field, Schema};
pub use crate::types::{Column, RowBatch, Scalar};
