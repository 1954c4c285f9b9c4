//! Shared types, error model, and configuration for PlanAid.
//!
//! This crate is the foundation depended on by all other PlanAid crates.
//! It provides:
//! - [`PlanAidError`] — the unified error type
//! - Domain types ([`SourceName`], [`Edition`], [`SourceOutcome`])
//! - Configuration ([`AppConfig`], [`WorkLayout`], config loading)
//! - Progress reporting ([`ProgressSink`])

pub mod config;
pub mod error;
pub mod progress;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AcquisitionConfig, AppConfig, EndpointsConfig, ExtractionConfig, OutputConfig, PathsConfig,
    PolicyConfig, WorkLayout, config_dir, config_file_path, init_config, load_config,
    load_config_from, validate_config,
};
pub use error::{PlanAidError, Result};
pub use progress::{ProgressPhase, ProgressSink, SilentProgress, percent_of};
pub use types::{CURRENT_SCHEMA_VERSION, Edition, SourceName, SourceOutcome};
