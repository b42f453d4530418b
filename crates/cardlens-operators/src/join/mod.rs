//! Join operators.

pub mod lookup;

pub use lookup::{JoinOutput, JoinStats, LookupJoin};
