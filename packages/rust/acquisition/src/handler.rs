//! The seam between the cache state machine and the network.

use std::future::Future;
use std::path::Path;

use planaid_shared::{Edition, ProgressSink, Result, SourceName};

/// Source-specific edition lookup, fetch, and deployment.
///
/// The cache manager only decides *whether* to fetch; everything that
/// touches a remote service or the shared working files goes through here.
pub trait SourceHandler: Send + Sync + 'static {
    /// Query the current remote edition. `Ok(None)` for sources that do not
    /// publish one.
    fn lookup_edition(
        &self,
        source: SourceName,
    ) -> impl Future<Output = Result<Option<Edition>>> + Send;

    /// Fetch the source into `dest`, an empty directory owned by this attempt.
    fn download(
        &self,
        source: SourceName,
        edition: Option<&Edition>,
        dest: &Path,
        progress: &dyn ProgressSink,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Copy or transform the cached artifact at `artifact` into the working files.
    fn deploy(
        &self,
        source: SourceName,
        artifact: &Path,
        progress: &dyn ProgressSink,
    ) -> impl Future<Output = Result<()>> + Send;
}
