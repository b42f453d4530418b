#![forbid(unsafe_code)]
//! cardlens-io: everything that touches bytes on the way in or out.
//!
//! - `archive`: pull the card database out of a package archive.
//! - `sqlite`: load a database image into an isolated, read-only query context.
//! - `source`: read user-selected input files whole.
//! - `writers`: render a `RowBatch` as CSV or JSON lines.

pub mod archive;
pub mod error;
pub mod source;
pub mod sqlite;
pub mod writers;

pub use archive::{extract_entry, PackageArchive};
pub use error::{Error, Result};
pub use sqlite::{with_context, QueryContext};
