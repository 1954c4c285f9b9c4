//! Output set writer.
//!
//! Every file is written to a temporary name and renamed into place, then
//! listed with its SHA-256 in `output_manifest.json`.

pub mod kml;
pub mod map;
pub mod master;
pub mod summary;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use planaid_shared::{CURRENT_SCHEMA_VERSION, OutputConfig, PlanAidError, PolicyConfig, Result};

use crate::classify::Placement;
use crate::fusion::AirportRecord;

pub const MAP_FILE: &str = "airport_map.html";
pub const SUMMARY_FILE: &str = "airports_summary.txt";
pub const MASTER_FILE: &str = "master_records.csv";
pub const MANIFEST_FILE: &str = "output_manifest.json";

/// Inputs shared by every writer.
#[derive(Debug, Clone)]
pub struct OutputContext<'a> {
    /// `DD Mon YYYY`, used in the export file name.
    pub date_label: &'a str,
    /// Chart-supplement edition the run was built from, when known.
    pub supplement_edition: Option<&'a str>,
    pub output: &'a OutputConfig,
    pub policy: &'a PolicyConfig,
    pub change_requests: &'a [String],
}

/// Metadata for one written file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Contents of `output_manifest.json`.
#[derive(Debug, Clone, Serialize)]
pub struct OutputManifest {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub version_label: String,
    pub date_label: String,
    pub supplement_edition: Option<String>,
    pub record_count: usize,
    pub included_count: usize,
    pub files: Vec<OutputFile>,
}

/// File name of the primary export, e.g. `T38 Apts 01 May 2025.kml`.
pub fn export_file_name(prefix: &str, date_label: &str) -> String {
    format!("{prefix} {date_label}.kml")
}

/// Write the full output set into `dir`.
#[instrument(skip_all, fields(dir = %dir.display(), records = records.len(), placements = placements.len()))]
pub fn write_outputs(
    dir: &Path,
    records: &BTreeMap<String, AirportRecord>,
    placements: &[Placement],
    ctx: &OutputContext<'_>,
) -> Result<OutputManifest> {
    std::fs::create_dir_all(dir).map_err(|e| PlanAidError::io(dir, e))?;

    let export_name = export_file_name(&ctx.output.export_prefix, ctx.date_label);
    let title = export_name.trim_end_matches(".kml");

    let files = vec![
        write_atomic(
            dir,
            &export_name,
            kml::render(placements, &ctx.output.version_label).as_bytes(),
        )?,
        write_atomic(
            dir,
            MAP_FILE,
            map::render(placements, title, ctx.change_requests)?.as_bytes(),
        )?,
        write_atomic(dir, SUMMARY_FILE, summary::render(placements).as_bytes())?,
        write_atomic(dir, MASTER_FILE, &master::render(records, ctx.policy)?)?,
    ];

    let manifest = OutputManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        generated_at: Utc::now(),
        version_label: ctx.output.version_label.clone(),
        date_label: ctx.date_label.to_string(),
        supplement_edition: ctx.supplement_edition.map(str::to_string),
        record_count: records.len(),
        included_count: placements.len(),
        files,
    };
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| PlanAidError::validation(format!("JSON serialization failed: {e}")))?;
    write_atomic(dir, MANIFEST_FILE, json.as_bytes())?;

    info!(
        files = manifest.files.len(),
        included = manifest.included_count,
        "output set written"
    );
    Ok(manifest)
}

pub(crate) fn write_atomic(dir: &Path, filename: &str, content: &[u8]) -> Result<OutputFile> {
    let target = dir.join(filename);
    let temp = dir.join(format!(".{filename}.tmp"));

    std::fs::write(&temp, content).map_err(|e| PlanAidError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| PlanAidError::io(&target, e))?;

    let mut hasher = Sha256::new();
    hasher.update(content);
    let hash = format!("{:x}", hasher.finalize());

    debug!(file = %filename, size = content.len(), "wrote output file");
    Ok(OutputFile {
        filename: filename.to_string(),
        sha256: hash,
        size_bytes: content.len(),
    })
}
