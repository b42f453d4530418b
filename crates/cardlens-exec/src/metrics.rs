//! Metrics/tracing hooks.
//!
//! Stage measurements are emitted as tracing events inside a per-stage span;
//! the binary decides where they go.

use crate::runtime::Stage;

pub fn emit_stage(stage: Stage, key_values: &[(&str, String)]) {
    let span = tracing::debug_span!("cardlens_stage", %stage);
    let _guard = span.enter();
    for (k, v) in key_values {
        tracing::debug!(%k, %v, "metric");
    }
}
