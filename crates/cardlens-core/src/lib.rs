//! cardlens-core: shared types for the package/scan join.
//!
//! Pure data and validation only. Anything that touches files, archives or
//! SQLite lives in `cardlens-io`.

pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod manifest;
pub mod prelude;
pub mod records;
pub mod schema;
pub mod types;

pub use error::{Error, Result};

/// Engine version string recorded in run manifests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
