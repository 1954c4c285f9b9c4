//! End-to-end runs: acquisition → fusion → classification → outputs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use std::collections::BTreeMap;

use chrono::{Local, NaiveDate, NaiveDateTime};
use tracing::{info, instrument, warn};

use planaid_acquisition::{
    AcquisitionReport, CacheManager, RegistryDocument, RemoteHandler, SourceHandler,
    prepare_data_dir,
};
use planaid_shared::{AppConfig, ProgressPhase, ProgressSink, Result, SourceName, WorkLayout};

use crate::brief::{BriefRequest, write_brief};
use crate::classify::place_markers;
use crate::fusion::{AirportRecord, fuse};
use crate::output::{OutputContext, OutputFile, OutputManifest, write_outputs};
use crate::reference::ReferenceSets;
use crate::tables::{load_base, load_runways};

const GENERATE_STAGE: &str = "generate";

/// Result of the generation half of a run.
#[derive(Debug, Clone)]
pub struct GenerateSummary {
    pub output_dir: PathBuf,
    pub manifest: OutputManifest,
    pub elapsed: Duration,
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub acquisition: AcquisitionReport,
    pub generation: GenerateSummary,
}

/// Prepare the working directory and drive every source once against the
/// live endpoints.
pub async fn acquire(
    config: &AppConfig,
    layout: &WorkLayout,
    progress: &dyn ProgressSink,
) -> Result<AcquisitionReport> {
    let handler = Arc::new(RemoteHandler::new(config, layout.clone())?);
    acquire_with(handler, config, layout, progress).await
}

/// [`acquire`] with an injected handler.
#[instrument(skip_all, fields(work_dir = %layout.work_dir.display()))]
pub async fn acquire_with<H: SourceHandler>(
    handler: Arc<H>,
    config: &AppConfig,
    layout: &WorkLayout,
    progress: &dyn ProgressSink,
) -> Result<AcquisitionReport> {
    prepare_data_dir(layout)?;
    let manager = CacheManager::new(handler, layout.clone(), config.acquisition.clone());
    Ok(manager.run(progress).await)
}

/// Build the output set from the data already deployed in `layout`.
///
/// Missing airport or runway tables abort the run; every other input
/// degrades to empty.
#[instrument(skip_all, fields(work_dir = %layout.work_dir.display()))]
pub fn generate(
    config: &AppConfig,
    layout: &WorkLayout,
    supplement_edition: Option<&str>,
    progress: &dyn ProgressSink,
) -> Result<GenerateSummary> {
    let start = Instant::now();
    progress.emit(GENERATE_STAGE, ProgressPhase::Generating, Some(0));

    let outcome = build_outputs(config, layout, supplement_edition, progress);
    match &outcome {
        Ok(_) => progress.emit(GENERATE_STAGE, ProgressPhase::Done, Some(100)),
        Err(_) => progress.emit(GENERATE_STAGE, ProgressPhase::Failed, None),
    }
    let manifest = outcome?;

    let summary = GenerateSummary {
        output_dir: layout.output_dir.clone(),
        manifest,
        elapsed: start.elapsed(),
    };
    info!(
        records = summary.manifest.record_count,
        included = summary.manifest.included_count,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "generation complete"
    );
    Ok(summary)
}

fn build_outputs(
    config: &AppConfig,
    layout: &WorkLayout,
    supplement_edition: Option<&str>,
    progress: &dyn ProgressSink,
) -> Result<OutputManifest> {
    let (records, refs) = load_records(config, layout)?;
    progress.emit(GENERATE_STAGE, ProgressPhase::Generating, Some(50));

    let placements = place_markers(&records, &config.policy);
    progress.emit(GENERATE_STAGE, ProgressPhase::Generating, Some(75));

    let label = date_label(supplement_edition, Local::now().date_naive());
    let ctx = OutputContext {
        date_label: &label,
        supplement_edition,
        output: &config.output,
        policy: &config.policy,
        change_requests: &refs.review.change_requests,
    };
    write_outputs(&layout.output_dir, &records, &placements, &ctx)
}

/// Fuse the deployed tables and reference sets into one record per airport.
pub fn load_records(
    config: &AppConfig,
    layout: &WorkLayout,
) -> Result<(BTreeMap<String, AirportRecord>, ReferenceSets)> {
    let base = load_base(&layout.apt_data_dir.join("APT_BASE.csv"))?;
    let runways = load_runways(&layout.apt_data_dir)?;
    let refs = ReferenceSets::load(layout);
    let records = fuse(&base, &runways, &refs, &config.policy);
    Ok((records, refs))
}

/// Write a mission brief into the output directory from the deployed data.
#[instrument(skip_all, fields(dep = %request.departure, dest = %request.destination))]
pub fn brief(
    config: &AppConfig,
    layout: &WorkLayout,
    request: &BriefRequest,
    generated: NaiveDateTime,
) -> Result<(OutputFile, String)> {
    let (records, _) = load_records(config, layout)?;
    for icao in [Some(&request.departure), Some(&request.destination), request.alternate.as_ref()]
        .into_iter()
        .flatten()
        .filter(|icao| !records.contains_key(icao.as_str()))
    {
        warn!(icao = %icao, "airfield not in the fused record set");
    }
    write_brief(&layout.output_dir, &records, request, generated)
}

/// Acquire, then generate.
pub async fn run(
    config: &AppConfig,
    layout: &WorkLayout,
    progress: &dyn ProgressSink,
) -> Result<RunSummary> {
    let handler = Arc::new(RemoteHandler::new(config, layout.clone())?);
    run_with(handler, config, layout, progress).await
}

/// [`run`] with an injected handler.
#[instrument(skip_all, fields(work_dir = %layout.work_dir.display()))]
pub async fn run_with<H: SourceHandler>(
    handler: Arc<H>,
    config: &AppConfig,
    layout: &WorkLayout,
    progress: &dyn ProgressSink,
) -> Result<RunSummary> {
    let acquisition = acquire_with(handler, config, layout, progress).await?;
    for report in acquisition.sources.iter().filter(|r| r.error.is_some()) {
        warn!(source = %report.source, outcome = %report.outcome, "source reported an error");
    }

    let edition = acquisition
        .supplement_edition()
        .map(str::to_string)
        .or_else(|| recorded_supplement_edition(layout));
    let generation = generate(config, layout, edition.as_deref(), progress)?;
    Ok(RunSummary {
        acquisition,
        generation,
    })
}

/// Chart-supplement edition of the last successful download, from the
/// registry document.
pub fn recorded_supplement_edition(layout: &WorkLayout) -> Option<String> {
    RegistryDocument::load(&layout.registry_file)
        .sources
        .remove(&SourceName::Dcs)
        .filter(|state| state.success)
        .and_then(|state| state.downloaded_cycle_date)
}

/// `DD Mon YYYY` of the edition date when it parses, else of `today`.
pub fn date_label(edition: Option<&str>, today: NaiveDate) -> String {
    edition
        .and_then(|e| NaiveDate::parse_from_str(e, "%Y-%m-%d").ok())
        .unwrap_or(today)
        .format("%d %b %Y")
        .to_string()
}
