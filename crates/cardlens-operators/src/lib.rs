#![forbid(unsafe_code)]
//! cardlens-operators: the merge step of a run.
//!
//! Pure and synchronous: operators take validated tables from
//! `cardlens-core` and return a `RowBatch`. No IO here.

pub mod error;
pub mod join;

pub use error::OpError;
pub use join::{JoinOutput, JoinStats, LookupJoin};
