#![forbid(unsafe_code)]
//! cardlens-exec: the run engine and the session that drives it.
//!
//! A run is strictly sequential: extract the package database, load it and
//! read the card names, load the scan export and read its rows, merge. The
//! session owns the selected inputs and only publishes results from the
//! latest run.

pub mod metrics;
pub mod runtime;
pub mod session;

pub use runtime::{Engine, ExecError, RunOutput, RunState, Stage};
pub use session::{PreparedRun, RunToken, RunTracker, Session};
