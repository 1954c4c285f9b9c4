//! Per-source cache state machine.
//!
//! ```text
//! Unchecked → CycleChecked → CacheEvaluated ─┬─ Skipped ──────────────┬─→ Deployed
//!                                             └─ Downloading → Downloaded ┘
//!                                                           └─→ Failed
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use planaid_shared::{Edition, ProgressPhase, ProgressSink, SourceName, SourceOutcome};

use crate::handler::SourceHandler;

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// The fields of a source that survive between runs.
///
/// Unknown fields in the registry document are ignored; missing ones default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceState {
    /// Outcome of the last run.
    #[serde(default)]
    pub success: bool,
    /// Time of the last download attempt, successful or not.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Edition date of the cached artifact.
    #[serde(default)]
    pub downloaded_cycle_date: Option<String>,
    /// Directory holding the cached artifact.
    #[serde(default)]
    pub download_location: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Phases and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePhase {
    Unchecked,
    CycleChecked,
    CacheEvaluated,
    Skipped,
    Downloading,
    Downloaded,
    Deployed,
    Failed,
}

/// What happened to one source during a run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: SourceName,
    pub outcome: SourceOutcome,
    /// Remote edition date, when the source publishes one and the lookup worked.
    pub edition: Option<String>,
    /// Last error recorded during the run.
    pub error: Option<String>,
    /// Whether deployment into the working files succeeded.
    pub deployed: bool,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// One acquisition source and its cache decision for the current run.
#[derive(Debug)]
pub struct Source {
    name: SourceName,
    state: SourceState,
    phase: SourcePhase,
    cache_root: PathBuf,
    reuse_window: Option<chrono::Duration>,
    current_cycle: Option<Edition>,
    current: bool,
    exists: bool,
    skip_download: bool,
    downloaded_now: bool,
    deployed: bool,
    last_error: Option<String>,
}

impl Source {
    /// Seed a source from its persisted state. Cached artifacts live under
    /// `cache_dir/<name>/`.
    pub fn new(name: SourceName, state: SourceState, cache_dir: &Path) -> Self {
        Self {
            name,
            state,
            phase: SourcePhase::Unchecked,
            cache_root: cache_dir.join(name.as_str()),
            reuse_window: None,
            current_cycle: None,
            current: false,
            exists: false,
            skip_download: false,
            downloaded_now: false,
            deployed: false,
            last_error: None,
        }
    }

    /// Treat an uncycled source as current while its last download is
    /// younger than `window`.
    pub fn with_reuse_window(mut self, window: Option<chrono::Duration>) -> Self {
        self.reuse_window = window;
        self
    }

    pub fn name(&self) -> SourceName {
        self.name
    }

    pub fn state(&self) -> &SourceState {
        &self.state
    }

    pub fn phase(&self) -> SourcePhase {
        self.phase
    }

    pub fn is_current(&self) -> bool {
        self.current
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn skip_download(&self) -> bool {
        self.skip_download
    }

    pub fn current_cycle(&self) -> Option<&Edition> {
        self.current_cycle.as_ref()
    }

    // -- step 1 --------------------------------------------------------------

    /// Look up the remote edition and decide whether the cache is current.
    pub async fn check_cycle_status<H: SourceHandler>(&mut self, handler: &H) {
        if self.name.is_cycle_tracked() {
            match handler.lookup_edition(self.name).await {
                Ok(edition) => self.current_cycle = edition,
                Err(e) => {
                    warn!(source = %self.name, error = %e, "edition lookup failed");
                    self.last_error = Some(e.to_string());
                    self.current_cycle = None;
                }
            }
            self.current = match (&self.current_cycle, &self.state.downloaded_cycle_date) {
                (Some(remote), Some(local)) => remote.date == *local,
                _ => false,
            };
        } else {
            self.current = match (self.reuse_window, self.state.timestamp) {
                (Some(window), Some(at)) => Utc::now().signed_duration_since(at) < window,
                _ => false,
            };
        }

        debug!(
            source = %self.name,
            remote = ?self.current_cycle.as_ref().map(|e| &e.date),
            local = ?self.state.downloaded_cycle_date,
            current = self.current,
            "cycle checked"
        );
        self.phase = SourcePhase::CycleChecked;
    }

    // -- step 2 --------------------------------------------------------------

    /// Decide whether the cached artifact can be reused. Resets the persisted
    /// success flag and cached edition when it cannot.
    pub fn should_skip_download(&mut self) -> bool {
        self.exists = self
            .state
            .download_location
            .as_deref()
            .is_some_and(contains_any_file);
        self.skip_download = self.state.success && self.exists && self.current;

        if !self.skip_download {
            self.state.success = false;
            self.state.downloaded_cycle_date = None;
        }

        self.phase = if self.skip_download {
            SourcePhase::Skipped
        } else {
            SourcePhase::CacheEvaluated
        };
        self.skip_download
    }

    // -- step 3 --------------------------------------------------------------

    /// Fetch into a fresh edition- or timestamp-named location.
    pub async fn download<H: SourceHandler>(&mut self, handler: &H, progress: &dyn ProgressSink) {
        self.phase = SourcePhase::Downloading;
        self.state.timestamp = Some(Utc::now());
        progress.emit(self.name.as_str(), ProgressPhase::Downloading, None);

        if self.name.is_cycle_tracked() && self.current_cycle.is_none() {
            self.fail("no current edition available to download");
            return;
        }

        let label = match &self.current_cycle {
            Some(edition) => edition.date.clone(),
            None => Utc::now().format("%Y%m%d_%H%M%S").to_string(),
        };
        let location = self.cache_root.join(label);

        if location.exists() {
            if let Err(e) = std::fs::remove_dir_all(&location) {
                self.fail(format!("cannot clear {}: {e}", location.display()));
                return;
            }
        }
        if let Err(e) = std::fs::create_dir_all(&location) {
            self.fail(format!("cannot create {}: {e}", location.display()));
            return;
        }

        match handler
            .download(self.name, self.current_cycle.as_ref(), &location, progress)
            .await
        {
            Ok(()) => {
                self.state.success = true;
                self.state.downloaded_cycle_date = if self.name.is_cycle_tracked() {
                    self.current_cycle.as_ref().map(|e| e.date.clone())
                } else {
                    None
                };
                self.state.download_location = Some(location.clone());
                self.downloaded_now = true;
                self.phase = SourcePhase::Downloaded;
                info!(source = %self.name, location = %location.display(), "download complete");
                self.prune_stale(&location);
            }
            Err(e) => {
                if let Err(rm) = std::fs::remove_dir_all(&location) {
                    debug!(source = %self.name, error = %rm, "partial location not removed");
                }
                self.fail(e.to_string());
            }
        }
    }

    fn fail(&mut self, error: impl Into<String>) {
        let error = error.into();
        warn!(source = %self.name, error = %error, "source failed");
        self.state.success = false;
        self.state.downloaded_cycle_date = None;
        self.state.download_location = None;
        self.last_error = Some(error);
        self.phase = SourcePhase::Failed;
    }

    /// Remove sibling locations left by earlier editions.
    fn prune_stale(&self, keep: &Path) {
        let Ok(entries) = std::fs::read_dir(&self.cache_root) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path == keep || !path.is_dir() {
                continue;
            }
            match std::fs::remove_dir_all(&path) {
                Ok(()) => debug!(source = %self.name, stale = %path.display(), "pruned"),
                Err(e) => warn!(source = %self.name, stale = %path.display(), error = %e, "prune failed"),
            }
        }
    }

    // -- step 4 --------------------------------------------------------------

    /// Deploy the cached artifact. Failures are logged and leave `success` intact.
    pub async fn deploy<H: SourceHandler>(&mut self, handler: &H, progress: &dyn ProgressSink) {
        if !self.state.success {
            return;
        }
        let Some(location) = self.state.download_location.clone() else {
            return;
        };

        progress.emit(self.name.as_str(), ProgressPhase::Deploying, None);
        match handler.deploy(self.name, &location, progress).await {
            Ok(()) => {
                self.deployed = true;
                self.phase = SourcePhase::Deployed;
            }
            Err(e) => {
                warn!(source = %self.name, error = %e, "deployment failed");
                self.last_error = Some(e.to_string());
            }
        }
    }

    // -- full pass -----------------------------------------------------------

    /// Run the whole lifecycle once.
    #[instrument(skip_all, fields(source = %self.name))]
    pub async fn execute<H: SourceHandler>(
        &mut self,
        handler: &H,
        progress: &dyn ProgressSink,
    ) -> SourceReport {
        progress.emit(self.name.as_str(), ProgressPhase::CheckingCycle, None);
        self.check_cycle_status(handler).await;

        if self.should_skip_download() {
            info!(source = %self.name, "cache is current, skipping download");
        } else {
            self.download(handler, progress).await;
        }

        self.deploy(handler, progress).await;

        let report = self.report();
        let phase = if report.outcome == SourceOutcome::Unavailable {
            ProgressPhase::Failed
        } else {
            ProgressPhase::Done
        };
        progress.emit(self.name.as_str(), phase, Some(100));
        report
    }

    /// Summarise this run.
    pub fn report(&self) -> SourceReport {
        let outcome = if self.skip_download {
            SourceOutcome::Cached
        } else if self.downloaded_now && self.state.success {
            SourceOutcome::Fresh
        } else {
            SourceOutcome::Unavailable
        };
        SourceReport {
            source: self.name,
            outcome,
            edition: self.current_cycle.as_ref().map(|e| e.date.clone()),
            error: self.last_error.clone(),
            deployed: self.deployed,
        }
    }

    /// Consume the source, keeping only what is persisted.
    pub fn into_state(self) -> SourceState {
        self.state
    }
}

/// True when `dir` contains at least one regular file at any depth.
fn contains_any_file(dir: &Path) -> bool {
    dir.is_dir()
        && WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .any(|e| e.file_type().is_file())
}
