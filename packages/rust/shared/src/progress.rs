//! Progress reporting interface shared by acquisition and generation.

use std::fmt;

/// Coarse phase of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    CheckingCycle,
    Downloading,
    Extracting,
    Deploying,
    Scanning,
    Generating,
    Done,
    Failed,
}

impl fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CheckingCycle => "checking cycle",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Deploying => "deploying",
            Self::Scanning => "scanning",
            Self::Generating => "generating",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// Progress callback. `source` is a source name or a pipeline stage label;
/// `percent` is `None` when the amount of work is unknown.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, source: &str, phase: ProgressPhase, percent: Option<u8>);
}

/// No-op progress sink for headless/test usage.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn emit(&self, _source: &str, _phase: ProgressPhase, _percent: Option<u8>) {}
}

/// Percentage of `done` over `total`, clamped to 100. `None` when the total is unknown.
pub fn percent_of(done: u64, total: Option<u64>) -> Option<u8> {
    match total {
        Some(0) | None => None,
        Some(total) => Some(((done.min(total) * 100) / total) as u8),
    }
}
