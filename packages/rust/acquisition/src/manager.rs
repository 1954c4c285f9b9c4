//! Cache manager: drives every source once per run and persists the registry.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument};

use planaid_shared::{
    AcquisitionConfig, ProgressSink, SourceName, SourceOutcome, WorkLayout,
};

use crate::handler::SourceHandler;
use crate::registry::RegistryDocument;
use crate::state::{Source, SourceReport};

/// Per-source outcome of one acquisition run.
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionReport {
    pub sources: Vec<SourceReport>,
}

impl AcquisitionReport {
    pub fn get(&self, source: SourceName) -> Option<&SourceReport> {
        self.sources.iter().find(|r| r.source == source)
    }

    pub fn outcome(&self, source: SourceName) -> SourceOutcome {
        self.get(source)
            .map(|r| r.outcome)
            .unwrap_or(SourceOutcome::Unavailable)
    }

    /// Edition date of the chart supplement, when it was looked up.
    pub fn supplement_edition(&self) -> Option<&str> {
        self.get(SourceName::Dcs).and_then(|r| r.edition.as_deref())
    }
}

/// Owns the sources and the registry document for one working directory.
pub struct CacheManager<H: SourceHandler> {
    handler: Arc<H>,
    layout: WorkLayout,
    config: AcquisitionConfig,
    sources: Vec<SourceName>,
}

impl<H: SourceHandler> CacheManager<H> {
    /// Manage every known source.
    pub fn new(handler: Arc<H>, layout: WorkLayout, config: AcquisitionConfig) -> Self {
        Self::with_sources(handler, layout, config, SourceName::ALL.to_vec())
    }

    /// Manage only `sources`. Registry entries for other sources are dropped
    /// on save.
    pub fn with_sources(
        handler: Arc<H>,
        layout: WorkLayout,
        config: AcquisitionConfig,
        sources: Vec<SourceName>,
    ) -> Self {
        Self {
            handler,
            layout,
            config,
            sources,
        }
    }

    /// Run every source once: small sources on a bounded pool first, then
    /// the large ones in order. The registry is written once at the end.
    #[instrument(skip_all, fields(work_dir = %self.layout.work_dir.display()))]
    pub async fn run(&self, progress: &dyn ProgressSink) -> AcquisitionReport {
        let mut registry = RegistryDocument::load(&self.layout.registry_file);
        let reuse_window = self
            .config
            .reuse_uncycled_for_hours
            .and_then(|h| i64::try_from(h).ok())
            .map(chrono::Duration::hours);

        let (mut small, mut large): (Vec<Source>, Vec<Source>) = self
            .sources
            .iter()
            .map(|&name| {
                let state = registry.sources.remove(&name).unwrap_or_default();
                Source::new(name, state, &self.layout.cache_dir).with_reuse_window(reuse_window)
            })
            .partition(|s| s.name().is_small());

        let handler = self.handler.as_ref();
        let semaphore = Semaphore::new(self.config.small_source_workers.max(1));
        let mut reports: Vec<SourceReport> = join_all(small.iter_mut().map(|source| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await.ok();
                source.execute(handler, progress).await
            }
        }))
        .await;

        for source in large.iter_mut() {
            reports.push(source.execute(handler, progress).await);
        }

        let mut document = RegistryDocument::default();
        for source in small.into_iter().chain(large) {
            document.sources.insert(source.name(), source.into_state());
        }
        if let Err(e) = document.save(&self.layout.registry_file) {
            error!(error = %e, "failed to write cache registry");
        }

        reports.sort_by_key(|r| r.source);
        for r in &reports {
            info!(source = %r.source, outcome = %r.outcome, deployed = r.deployed, "source finished");
        }
        AcquisitionReport { sources: reports }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::path::Path;
    use std::sync::Mutex;

    use planaid_shared::{Edition, PlanAidError, Result, SilentProgress};

    use crate::state::SourceState;

    /// In-memory handler: fixed editions, injectable failures, call counters.
    #[derive(Default)]
    struct FakeHandler {
        editions: Mutex<HashMap<SourceName, String>>,
        failing_lookups: HashSet<SourceName>,
        failing_downloads: HashSet<SourceName>,
        failing_deploys: HashSet<SourceName>,
        downloads: Mutex<HashMap<SourceName, usize>>,
        deploys: Mutex<HashMap<SourceName, usize>>,
    }

    impl FakeHandler {
        fn with_editions(nasr: &str, dcs: &str) -> Self {
            let handler = Self::default();
            handler.set_edition(SourceName::Nasr, nasr);
            handler.set_edition(SourceName::Dcs, dcs);
            handler
        }

        fn set_edition(&self, source: SourceName, date: &str) {
            self.editions
                .lock()
                .expect("lock")
                .insert(source, date.to_string());
        }

        fn downloads(&self, source: SourceName) -> usize {
            *self.downloads.lock().expect("lock").get(&source).unwrap_or(&0)
        }

        fn deploys(&self, source: SourceName) -> usize {
            *self.deploys.lock().expect("lock").get(&source).unwrap_or(&0)
        }
    }

    impl SourceHandler for FakeHandler {
        async fn lookup_edition(&self, source: SourceName) -> Result<Option<Edition>> {
            if self.failing_lookups.contains(&source) {
                return Err(PlanAidError::Network("lookup refused".into()));
            }
            Ok(self
                .editions
                .lock()
                .expect("lock")
                .get(&source)
                .map(|date| Edition {
                    date: date.clone(),
                    url: format!("https://example.test/{source}.zip"),
                }))
        }

        async fn download(
            &self,
            source: SourceName,
            _edition: Option<&Edition>,
            dest: &Path,
            _progress: &dyn ProgressSink,
        ) -> Result<()> {
            *self.downloads.lock().expect("lock").entry(source).or_default() += 1;
            std::fs::write(dest.join("partial.bin"), b"x").map_err(|e| PlanAidError::io(dest, e))?;
            if self.failing_downloads.contains(&source) {
                return Err(PlanAidError::Network("connection reset".into()));
            }
            std::fs::write(dest.join("artifact.csv"), "ICAO\n")
                .map_err(|e| PlanAidError::io(dest, e))
        }

        async fn deploy(
            &self,
            source: SourceName,
            _artifact: &Path,
            _progress: &dyn ProgressSink,
        ) -> Result<()> {
            *self.deploys.lock().expect("lock").entry(source).or_default() += 1;
            if self.failing_deploys.contains(&source) {
                return Err(PlanAidError::validation("table missing"));
            }
            Ok(())
        }
    }

    fn manager(handler: Arc<FakeHandler>, work: &Path, reuse_hours: Option<u64>) -> CacheManager<FakeHandler> {
        let config = AcquisitionConfig {
            reuse_uncycled_for_hours: reuse_hours,
            ..AcquisitionConfig::default()
        };
        CacheManager::new(handler, WorkLayout::new(work, "review_list.csv"), config)
    }

    fn registry(work: &Path) -> RegistryDocument {
        RegistryDocument::load(&work.join("data/cache_registry.json"))
    }

    #[tokio::test]
    async fn first_run_downloads_everything() {
        let work = tempfile::tempdir().expect("tempdir");
        let handler = Arc::new(FakeHandler::with_editions("2025-01-23", "2025-02-20"));

        let report = manager(handler.clone(), work.path(), None)
            .run(&SilentProgress)
            .await;

        for source in SourceName::ALL {
            assert_eq!(report.outcome(source), SourceOutcome::Fresh, "{source}");
            assert!(report.get(source).expect("report").deployed);
            assert_eq!(handler.downloads(source), 1);
        }
        assert_eq!(report.supplement_edition(), Some("2025-02-20"));

        let doc = registry(work.path());
        let nasr = &doc.sources[&SourceName::Nasr];
        assert!(nasr.success);
        assert_eq!(nasr.downloaded_cycle_date.as_deref(), Some("2025-01-23"));
        assert!(
            nasr.download_location
                .as_deref()
                .is_some_and(|p| p.ends_with("cache/nasr/2025-01-23"))
        );
        assert!(doc.sources[&SourceName::Fuel].downloaded_cycle_date.is_none());
    }

    #[tokio::test]
    async fn unchanged_edition_is_skipped_and_registry_is_stable() {
        let work = tempfile::tempdir().expect("tempdir");
        let handler = Arc::new(FakeHandler::with_editions("2025-01-23", "2025-02-20"));
        let manager = manager(handler.clone(), work.path(), Some(24));

        manager.run(&SilentProgress).await;
        let first = std::fs::read(work.path().join("data/cache_registry.json")).expect("read");

        let report = manager.run(&SilentProgress).await;
        let second = std::fs::read(work.path().join("data/cache_registry.json")).expect("read");

        assert_eq!(first, second);
        for source in SourceName::ALL {
            assert_eq!(report.outcome(source), SourceOutcome::Cached, "{source}");
            assert_eq!(handler.downloads(source), 1);
            // Cached artifacts are still deployed.
            assert_eq!(handler.deploys(source), 2);
        }
    }

    #[tokio::test]
    async fn uncycled_sources_refetch_without_reuse_window() {
        let work = tempfile::tempdir().expect("tempdir");
        let handler = Arc::new(FakeHandler::with_editions("2025-01-23", "2025-02-20"));
        let manager = manager(handler.clone(), work.path(), None);

        manager.run(&SilentProgress).await;
        let report = manager.run(&SilentProgress).await;

        assert_eq!(report.outcome(SourceName::Nasr), SourceOutcome::Cached);
        assert_eq!(report.outcome(SourceName::Flights), SourceOutcome::Fresh);
        assert_eq!(handler.downloads(SourceName::Flights), 2);
        assert_eq!(handler.downloads(SourceName::Nasr), 1);
    }

    #[tokio::test]
    async fn new_edition_triggers_download_and_prunes_old_one() {
        let work = tempfile::tempdir().expect("tempdir");
        let handler = Arc::new(FakeHandler::with_editions("2025-01-23", "2025-02-20"));
        let manager = manager(handler.clone(), work.path(), None);

        manager.run(&SilentProgress).await;
        handler.set_edition(SourceName::Nasr, "2025-02-20");
        let report = manager.run(&SilentProgress).await;

        assert_eq!(report.outcome(SourceName::Nasr), SourceOutcome::Fresh);
        assert_eq!(handler.downloads(SourceName::Nasr), 2);
        let cache = work.path().join("data/cache/nasr");
        assert!(cache.join("2025-02-20").is_dir());
        assert!(!cache.join("2025-01-23").exists());
    }

    #[tokio::test]
    async fn missing_artifact_forces_download() {
        let work = tempfile::tempdir().expect("tempdir");
        let handler = Arc::new(FakeHandler::with_editions("2025-01-23", "2025-02-20"));
        let manager = manager(handler.clone(), work.path(), None);

        manager.run(&SilentProgress).await;
        std::fs::remove_dir_all(work.path().join("data/cache/dcs/2025-02-20")).expect("rm");
        let report = manager.run(&SilentProgress).await;

        assert_eq!(report.outcome(SourceName::Dcs), SourceOutcome::Fresh);
        assert_eq!(handler.downloads(SourceName::Dcs), 2);
    }

    #[tokio::test]
    async fn one_failure_does_not_block_the_others() {
        let started = chrono::Utc::now();
        let work = tempfile::tempdir().expect("tempdir");
        let mut fake = FakeHandler::with_editions("2025-01-23", "2025-02-20");
        fake.failing_downloads.insert(SourceName::Fuel);
        fake.failing_lookups.insert(SourceName::Dcs);
        let handler = Arc::new(fake);

        let report = manager(handler.clone(), work.path(), None)
            .run(&SilentProgress)
            .await;

        assert_eq!(report.outcome(SourceName::Fuel), SourceOutcome::Unavailable);
        assert_eq!(report.outcome(SourceName::Dcs), SourceOutcome::Unavailable);
        assert!(report.get(SourceName::Dcs).expect("dcs").error.is_some());
        assert_eq!(handler.downloads(SourceName::Dcs), 0);
        assert_eq!(handler.deploys(SourceName::Fuel), 0);
        for ok in [SourceName::Nasr, SourceName::Flights, SourceName::Comments] {
            assert_eq!(report.outcome(ok), SourceOutcome::Fresh, "{ok}");
        }

        let doc = registry(work.path());
        let fuel = &doc.sources[&SourceName::Fuel];
        assert!(!fuel.success);
        assert!(fuel.download_location.is_none());
        // The failed attempt is still stamped.
        assert!(fuel.timestamp.is_some_and(|at| at >= started));
        // The partial location was removed.
        let fuel_cache = work.path().join("data/cache/fuel");
        let leftovers = std::fs::read_dir(&fuel_cache)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn deploy_failure_keeps_success() {
        let work = tempfile::tempdir().expect("tempdir");
        let mut fake = FakeHandler::with_editions("2025-01-23", "2025-02-20");
        fake.failing_deploys.insert(SourceName::Nasr);
        let handler = Arc::new(fake);

        let report = manager(handler, work.path(), None).run(&SilentProgress).await;
        let nasr = report.get(SourceName::Nasr).expect("nasr");
        assert_eq!(nasr.outcome, SourceOutcome::Fresh);
        assert!(!nasr.deployed);
        assert!(registry(work.path()).sources[&SourceName::Nasr].success);
    }

    #[tokio::test]
    async fn corrupt_registry_starts_empty() {
        let work = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(work.path().join("data")).expect("mkdir");
        std::fs::write(work.path().join("data/cache_registry.json"), "{ not json").expect("write");

        let handler = Arc::new(FakeHandler::with_editions("2025-01-23", "2025-02-20"));
        let report = manager(handler, work.path(), None).run(&SilentProgress).await;

        assert_eq!(report.outcome(SourceName::Nasr), SourceOutcome::Fresh);
        assert_eq!(registry(work.path()).sources.len(), 5);
    }

    #[tokio::test]
    async fn skip_implies_success_exists_and_current() {
        let work = tempfile::tempdir().expect("tempdir");
        let handler = Arc::new(FakeHandler::with_editions("2025-01-23", "2025-02-20"));
        let manager = manager(handler.clone(), work.path(), Some(1));

        // Seed a registry that claims success but points at nothing.
        let mut seeded = RegistryDocument::default();
        seeded.sources.insert(
            SourceName::Nasr,
            SourceState {
                success: true,
                timestamp: None,
                downloaded_cycle_date: Some("2025-01-23".into()),
                download_location: Some(work.path().join("data/cache/nasr/2025-01-23")),
            },
        );
        seeded
            .save(&work.path().join("data/cache_registry.json"))
            .expect("seed");

        for _ in 0..3 {
            let cache = work.path().join("data/cache");
            let report = manager.run(&SilentProgress).await;
            let doc = registry(work.path());
            for source in SourceName::ALL {
                if report.outcome(source) == SourceOutcome::Cached {
                    let state = &doc.sources[&source];
                    assert!(state.success, "{source}");
                    let location = state.download_location.as_deref().expect("location");
                    assert!(location.starts_with(&cache));
                    assert!(location.join("artifact.csv").is_file());
                }
            }
        }
        assert_eq!(handler.downloads(SourceName::Nasr), 1);
    }

    #[tokio::test]
    async fn unknown_sources_are_dropped_from_registry() {
        let work = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(work.path().join("data")).expect("mkdir");
        std::fs::write(
            work.path().join("data/cache_registry.json"),
            r#"{"schema_version": 1, "sources": {"weather": {"success": true}}}"#,
        )
        .expect("write");

        let handler = Arc::new(FakeHandler::with_editions("2025-01-23", "2025-02-20"));
        CacheManager::with_sources(
            handler,
            WorkLayout::new(work.path(), "review_list.csv"),
            AcquisitionConfig::default(),
            vec![SourceName::Nasr],
        )
        .run(&SilentProgress)
        .await;

        let raw = std::fs::read_to_string(work.path().join("data/cache_registry.json")).expect("read");
        assert!(!raw.contains("weather"));
        assert_eq!(registry(work.path()).sources.len(), 1);
    }
}
