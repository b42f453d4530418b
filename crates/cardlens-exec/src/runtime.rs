//! Runtime: execute one package/scan join and emit a RunManifest.
//!
//! The engine walks a fixed, linear sequence of stages:
//!
//! `Idle -> Extracting -> LoadingPackageDb -> LoadingScanDb -> Merging -> Done`
//!
//! A failure in any stage moves to `Failed(stage)` and nothing of the run is
//! returned. Each database lives in its own query context, which is closed
//! before the next stage starts.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{info, warn};

use cardlens_core::config::{ExportConfig, OutputFormat};
use cardlens_core::hash::hash_bytes;
use cardlens_core::id::Generation;
use cardlens_core::manifest::RunManifest;
use cardlens_core::records::{CardNameTable, ScannedCardTable};
use cardlens_core::types::RowBatch;

use cardlens_io::archive::extract_entry;
use cardlens_io::sqlite::with_context;
use cardlens_io::writers;

use cardlens_operators::{JoinStats, LookupJoin, OpError};

use crate::metrics::emit_stage;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("missing input: select a {0} before running")]
    MissingInput(&'static str),
    #[error(transparent)]
    Io(#[from] cardlens_io::Error),
    #[error(transparent)]
    Core(#[from] cardlens_core::error::Error),
    #[error("join: {0}")]
    Join(#[from] OpError),
    #[error("run {0} was superseded by a newer run")]
    Superseded(Generation),
    #[error("{count} scanned row(s) have no card name (ids: {ids:?})")]
    UnmatchedCards { count: usize, ids: Vec<i64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    LoadingPackageDb,
    LoadingScanDb,
    Merging,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Extracting => "extracting",
            Stage::LoadingPackageDb => "loading-package-db",
            Stage::LoadingScanDb => "loading-scan-db",
            Stage::Merging => "merging",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running(Stage),
    Done,
    Failed(Stage),
}

/// Everything a successful run produces.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub batch: RowBatch,
    pub stats: JoinStats,
    pub unmatched_ids: Vec<i64>,
    pub manifest: RunManifest,
}

impl RunOutput {
    /// Render the joined rows and record the digest of the rendering.
    pub fn encode(&mut self, format: OutputFormat) -> Result<Vec<u8>, ExecError> {
        let bytes = writers::encode(&self.batch, format)?;
        self.manifest.output_digest = Some(hash_bytes(&bytes));
        Ok(bytes)
    }
}

/// Engine owns the export configuration and the state of the current run.
pub struct Engine {
    cfg: ExportConfig,
    state: RunState,
}

impl Engine {
    pub fn new(cfg: ExportConfig) -> Result<Self, ExecError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            state: RunState::Idle,
        })
    }

    pub fn config(&self) -> &ExportConfig {
        &self.cfg
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run the join outside of a session.
    pub fn run(
        &mut self,
        package_archive: &[u8],
        scan_image: Vec<u8>,
    ) -> Result<RunOutput, ExecError> {
        self.run_as(Generation::new(0), package_archive, scan_image)
    }

    /// Run the join and tag the manifest with `generation`.
    ///
    /// Takes ownership of the scan image; it is released together with the
    /// scan query context.
    pub fn run_as(
        &mut self,
        generation: Generation,
        package_archive: &[u8],
        scan_image: Vec<u8>,
    ) -> Result<RunOutput, ExecError> {
        let manifest = RunManifest::new(
            generation,
            hash_bytes(package_archive),
            hash_bytes(&scan_image),
            now_ms(),
        );

        match self.execute(package_archive, scan_image, manifest) {
            Ok(out) => {
                self.state = RunState::Done;
                info!(
                    %generation,
                    rows = out.stats.rows,
                    matched = out.stats.matched,
                    unmatched = out.stats.unmatched,
                    "run finished"
                );
                Ok(out)
            }
            Err(e) => {
                if let RunState::Running(stage) = self.state {
                    self.state = RunState::Failed(stage);
                    warn!(%generation, %stage, error = %e, "run failed");
                }
                Err(e)
            }
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.state = RunState::Running(stage);
        info!(%stage, "stage started");
    }

    fn execute(
        &mut self,
        package_archive: &[u8],
        scan_image: Vec<u8>,
        mut manifest: RunManifest,
    ) -> Result<RunOutput, ExecError> {
        self.enter(Stage::Extracting);
        let package_image = extract_entry(package_archive, &self.cfg.package_entry)?;
        manifest.package_image_digest = Some(hash_bytes(&package_image));
        emit_stage(
            Stage::Extracting,
            &[
                ("entry", self.cfg.package_entry.clone()),
                ("bytes", package_image.len().to_string()),
            ],
        );

        self.enter(Stage::LoadingPackageDb);
        let names_sql = self.cfg.card_names_sql.as_str();
        let names = with_context(package_image, |ctx| -> Result<_, ExecError> {
            let batch = ctx.query(names_sql)?;
            Ok(CardNameTable::from_batch(&batch)?)
        })?;
        if names.duplicate_ids() > 0 {
            warn!(
                duplicates = names.duplicate_ids(),
                "card name query returned repeated ids; later rows win"
            );
        }
        if names.null_names() > 0 {
            warn!(
                null_names = names.null_names(),
                "card name query returned NULL names; those cards merge without a name"
            );
        }
        emit_stage(
            Stage::LoadingPackageDb,
            &[
                ("rows", names.source_rows().to_string()),
                ("card_names", names.len().to_string()),
                ("null_names", names.null_names().to_string()),
            ],
        );

        self.enter(Stage::LoadingScanDb);
        let scan_sql = self.cfg.scanned_cards_sql.as_str();
        let key_column = self.cfg.key_column.as_str();
        let scanned = with_context(scan_image, |ctx| -> Result<_, ExecError> {
            let batch = ctx.query(scan_sql)?;
            Ok(ScannedCardTable::from_batch(&batch, key_column)?)
        })?;
        emit_stage(
            Stage::LoadingScanDb,
            &[
                ("rows", scanned.len().to_string()),
                ("columns", scanned.schema.len().to_string()),
            ],
        );

        self.enter(Stage::Merging);
        let join = LookupJoin::new(self.cfg.key_column.clone(), self.cfg.name_column.clone());
        let joined = join.eval(&scanned, &names)?;
        if joined.stats.replaced_column {
            warn!(
                column = %self.cfg.name_column,
                "scan export already has this column; its values were replaced by resolved names"
            );
        }
        if joined.stats.unmatched > 0 {
            warn!(
                unmatched = joined.stats.unmatched,
                ids = ?joined.unmatched_ids,
                "scanned rows without a card name"
            );
            if self.cfg.require_names {
                return Err(ExecError::UnmatchedCards {
                    count: joined.stats.unmatched,
                    ids: joined.unmatched_ids,
                });
            }
        }
        emit_stage(
            Stage::Merging,
            &[
                ("operator", join.name().to_string()),
                ("matched", joined.stats.matched.to_string()),
                ("unmatched", joined.stats.unmatched.to_string()),
            ],
        );

        manifest.card_names = names.len();
        manifest.scanned_rows = joined.stats.rows;
        manifest.matched_rows = joined.stats.matched;
        manifest.unmatched_rows = joined.stats.unmatched;

        Ok(RunOutput {
            batch: joined.batch,
            stats: joined.stats,
            unmatched_ids: joined.unmatched_ids,
            manifest: manifest.finish(now_ms()),
        })
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let cfg = ExportConfig {
            package_entry: String::new(),
            ..Default::default()
        };
        assert!(matches!(Engine::new(cfg), Err(ExecError::Core(_))));
    }

    #[test]
    fn unreadable_package_fails_while_extracting() {
        let mut engine = Engine::new(ExportConfig::default()).unwrap();
        assert_eq!(engine.state(), RunState::Idle);
        let err = engine.run(b"not an archive", Vec::new()).unwrap_err();
        assert!(matches!(err, ExecError::Io(cardlens_io::Error::Package(_))));
        assert_eq!(engine.state(), RunState::Failed(Stage::Extracting));
    }

    #[test]
    fn stage_names_follow_run_sequence() {
        let names: Vec<String> = [
            Stage::Extracting,
            Stage::LoadingPackageDb,
            Stage::LoadingScanDb,
            Stage::Merging,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        assert_eq!(
            names,
            vec!["extracting", "loading-package-db", "loading-scan-db", "merging"]
        );
    }
}
