//! Session state around the engine: the two selected inputs, the latest
//! published result, and a generation counter that retires stale runs.
//!
//! Selecting a new input bumps the generation and drops the published
//! result. A run remembers the generation it started under; when it finishes
//! after a newer generation began, its output is refused instead of replacing
//! fresher state.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use cardlens_core::config::ExportConfig;
use cardlens_core::id::Generation;
use cardlens_io::source::read_input;

use crate::runtime::{Engine, ExecError, RunOutput};

#[derive(Debug, Default)]
pub struct RunTracker {
    current: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunToken {
    generation: Generation,
}

impl RunToken {
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation; every earlier token stops being current.
    pub fn begin(&self) -> RunToken {
        let g = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        RunToken {
            generation: Generation::new(g),
        }
    }

    /// Retire the current generation without starting a run.
    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }

    pub fn current(&self) -> Generation {
        Generation::new(self.current.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, token: RunToken) -> bool {
        self.current() == token.generation
    }
}

/// A run that has been assigned a token and its inputs, but not executed.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub token: RunToken,
    pub package: PathBuf,
    pub scan: PathBuf,
}

pub struct Session {
    engine: Engine,
    tracker: Arc<RunTracker>,
    package: Option<PathBuf>,
    scan: Option<PathBuf>,
    latest: Option<RunOutput>,
}

impl Session {
    pub fn new(cfg: ExportConfig) -> Result<Self, ExecError> {
        Ok(Self {
            engine: Engine::new(cfg)?,
            tracker: Arc::new(RunTracker::new()),
            package: None,
            scan: None,
            latest: None,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Shared handle to the generation counter.
    pub fn tracker(&self) -> Arc<RunTracker> {
        Arc::clone(&self.tracker)
    }

    pub fn set_package(&mut self, path: impl Into<PathBuf>) {
        self.package = Some(path.into());
        self.invalidate();
    }

    pub fn set_scan(&mut self, path: impl Into<PathBuf>) {
        self.scan = Some(path.into());
        self.invalidate();
    }

    pub fn package(&self) -> Option<&Path> {
        self.package.as_deref()
    }

    pub fn scan(&self) -> Option<&Path> {
        self.scan.as_deref()
    }

    /// Result of the latest run that was allowed to publish.
    pub fn latest(&self) -> Option<&RunOutput> {
        self.latest.as_ref()
    }

    fn invalidate(&mut self) {
        self.tracker.invalidate();
        if self.latest.take().is_some() {
            debug!("input changed; dropped published result");
        }
    }

    /// Claim a token for a run over the currently selected inputs.
    pub fn begin(&self) -> Result<PreparedRun, ExecError> {
        let package = self
            .package
            .clone()
            .ok_or(ExecError::MissingInput("package archive"))?;
        let scan = self
            .scan
            .clone()
            .ok_or(ExecError::MissingInput("scan export"))?;
        let token = self.tracker.begin();
        debug!(generation = %token.generation(), "run prepared");
        Ok(PreparedRun {
            token,
            package,
            scan,
        })
    }

    /// Read both inputs and run the engine. A run whose token is no longer
    /// current is refused before any work is done.
    pub fn execute(&mut self, run: &PreparedRun) -> Result<RunOutput, ExecError> {
        if !self.tracker.is_current(run.token) {
            return Err(ExecError::Superseded(run.token.generation()));
        }
        let package_archive = read_input(&run.package)?;
        let scan_image = read_input(&run.scan)?;
        self.engine
            .run_as(run.token.generation(), &package_archive, scan_image)
    }

    /// Store `output` as the latest result if `token` is still current.
    pub fn publish(
        &mut self,
        token: RunToken,
        output: RunOutput,
    ) -> Result<&mut RunOutput, ExecError> {
        if !self.tracker.is_current(token) {
            info!(
                generation = %token.generation(),
                current = %self.tracker.current(),
                "discarding result of superseded run"
            );
            return Err(ExecError::Superseded(token.generation()));
        }
        Ok(self.latest.insert(output))
    }

    /// Prepare, execute and publish in one go.
    pub fn run(&mut self) -> Result<&mut RunOutput, ExecError> {
        let prepared = self.begin()?;
        let output = self.execute(&prepared)?;
        self.publish(prepared.token, output)
    }
}
