//! Cycle-aware acquisition and caching for PlanAid.
//!
//! Each data source runs through a small state machine ([`state::Source`])
//! that decides whether the cached artifact is still current. The
//! [`CacheManager`] drives all sources once per run and persists their state
//! to a single registry document.

pub mod archive;
pub mod handler;
pub mod manager;
pub mod registry;
pub mod sources;
pub mod state;
pub mod transport;
pub mod workdir;

pub use handler::SourceHandler;
pub use manager::{AcquisitionReport, CacheManager};
pub use registry::RegistryDocument;
pub use sources::RemoteHandler;
pub use state::{Source, SourcePhase, SourceReport, SourceState};
pub use transport::HttpTransport;
pub use workdir::{clear_cache, prepare_data_dir};
