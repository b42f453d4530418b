#![forbid(unsafe_code)]
//! cardlens: attach card names from an app package's embedded database to
//! the rows of a card scanner export.
//!
//! This crate re-exports the workspace crates; the `cardlens` binary lives in
//! `cardlens-cli`.

pub use cardlens_core;
pub use cardlens_exec;
pub use cardlens_io;
pub use cardlens_operators;

pub use cardlens_core::config::ExportConfig;
pub use cardlens_core::VERSION;
pub use cardlens_exec::{Engine, ExecError, RunOutput, RunState, Session, Stage};
