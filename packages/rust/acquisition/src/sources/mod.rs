//! Concrete handlers for the five acquisition sources.

pub mod comments;
pub mod flights;
pub mod tables;

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use planaid_extraction::{equipment_for_edition, write_identifier_list};
use planaid_shared::{
    AppConfig, Edition, EndpointsConfig, ExtractionConfig, PlanAidError, ProgressPhase,
    ProgressSink, Result, SourceName, WorkLayout,
};

use crate::archive::extract_archive;
use crate::handler::SourceHandler;
use crate::transport::HttpTransport;

use self::comments::{COMMENTS_FILE, strip_preamble, write_comments};
use self::flights::{FLIGHTS_FILE, FlightEntry, latest_landings, write_landings};
use self::tables::deploy_tables;

/// File name of the fuel list inside the cache location and the data folder.
pub const FUEL_FILE: &str = "fuel_data.csv";

// ---------------------------------------------------------------------------
// Edition metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EditionResponse {
    edition: Vec<EditionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditionEntry {
    edition_date: String,
    product: EditionProduct,
}

#[derive(Debug, Deserialize)]
struct EditionProduct {
    url: String,
}

/// Parse an edition lookup body. Dates arrive as `MM/DD/YYYY`.
pub fn parse_edition(body: &serde_json::Value) -> Result<Edition> {
    let response: EditionResponse = serde_json::from_value(body.clone())
        .map_err(|e| PlanAidError::parse(format!("unexpected edition response: {e}")))?;
    let entry = response
        .edition
        .into_iter()
        .next()
        .ok_or_else(|| PlanAidError::parse("edition response lists no editions"))?;

    let date = NaiveDate::parse_from_str(entry.edition_date.trim(), "%m/%d/%Y")
        .map_err(|e| PlanAidError::parse(format!("edition date {:?}: {e}", entry.edition_date)))?;

    Ok(Edition {
        date: date.format("%Y-%m-%d").to_string(),
        url: entry.product.url,
    })
}

// ---------------------------------------------------------------------------
// RemoteHandler
// ---------------------------------------------------------------------------

/// Production handler: talks to the configured endpoints and deploys into
/// the working layout.
pub struct RemoteHandler {
    transport: HttpTransport,
    endpoints: EndpointsConfig,
    extraction: ExtractionConfig,
    years_included: u32,
    layout: WorkLayout,
}

impl RemoteHandler {
    pub fn new(config: &AppConfig, layout: WorkLayout) -> Result<Self> {
        Ok(Self {
            transport: HttpTransport::new(&config.acquisition)?,
            endpoints: config.endpoints.clone(),
            extraction: config.extraction.clone(),
            years_included: config.acquisition.years_included,
            layout,
        })
    }

    async fn fetch_archive(
        &self,
        source: SourceName,
        edition: Option<&Edition>,
        dest: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        let edition = edition.ok_or_else(|| {
            PlanAidError::Network(format!("{source}: no edition URL to download"))
        })?;

        let archive = dest.with_extension("zip");
        let result = async {
            self.transport
                .download_to(&edition.url, &archive, source.as_str(), progress)
                .await?;

            progress.emit(source.as_str(), ProgressPhase::Extracting, None);
            let (zip, out) = (archive.clone(), dest.to_path_buf());
            let files = tokio::task::spawn_blocking(move || extract_archive(&zip, &out))
                .await
                .map_err(|e| PlanAidError::Archive(format!("extraction task failed: {e}")))??;
            if files == 0 {
                return Err(PlanAidError::Archive(format!(
                    "{source}: archive contained no usable files"
                )));
            }
            info!(%source, files, edition = %edition.date, "edition extracted");
            Ok::<(), PlanAidError>(())
        }
        .await;

        if archive.exists() {
            if let Err(e) = std::fs::remove_file(&archive) {
                warn!(archive = %archive.display(), error = %e, "archive not removed");
            }
        }
        result
    }

    async fn fetch_flights(&self, dest: &Path) -> Result<()> {
        let entries: Vec<FlightEntry> = self
            .transport
            .get_json(&self.endpoints.flights_api, &[])
            .await?;
        let days = i64::from(self.years_included) * 365;
        let cutoff = (Utc::now() - chrono::Duration::days(days)).date_naive();
        let landings = latest_landings(&entries, cutoff);
        info!(entries = entries.len(), airports = landings.len(), "flight history reduced");
        write_landings(&dest.join(FLIGHTS_FILE), &landings)
    }

    async fn fetch_fuel(&self, dest: &Path, progress: &dyn ProgressSink) -> Result<()> {
        let status = self.transport.touch(&self.endpoints.fuel_check_url).await?;
        if !status.is_success() {
            warn!(%status, "fuel check page returned an error status");
        }
        self.transport
            .download_to(
                &self.endpoints.fuel_download_url,
                &dest.join(FUEL_FILE),
                SourceName::Fuel.as_str(),
                progress,
            )
            .await?;
        Ok(())
    }

    async fn fetch_comments(&self, dest: &Path) -> Result<()> {
        let raw = self.transport.get_text(&self.endpoints.comments_url).await?;
        let rows = strip_preamble(&raw)?;
        write_comments(&dest.join(COMMENTS_FILE), &rows)
    }

    fn copy_into_data(&self, artifact: &Path, name: &str, dest: PathBuf) -> Result<()> {
        let src = artifact.join(name);
        std::fs::copy(&src, &dest).map_err(|e| PlanAidError::io(&src, e))?;
        Ok(())
    }
}

impl SourceHandler for RemoteHandler {
    #[instrument(skip_all, fields(source = %source))]
    async fn lookup_edition(&self, source: SourceName) -> Result<Option<Edition>> {
        let api = match source {
            SourceName::Nasr => &self.endpoints.registry_edition_api,
            SourceName::Dcs => &self.endpoints.supplement_edition_api,
            _ => return Ok(None),
        };
        let body: serde_json::Value = self
            .transport
            .get_json(api, &[("edition", "current")])
            .await?;
        let edition = parse_edition(&body)?;
        info!(%source, edition = %edition.date, "current edition");
        Ok(Some(edition))
    }

    #[instrument(skip_all, fields(source = %source, dest = %dest.display()))]
    async fn download(
        &self,
        source: SourceName,
        edition: Option<&Edition>,
        dest: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        match source {
            SourceName::Nasr | SourceName::Dcs => {
                self.fetch_archive(source, edition, dest, progress).await
            }
            SourceName::Flights => self.fetch_flights(dest).await,
            SourceName::Fuel => self.fetch_fuel(dest, progress).await,
            SourceName::Comments => self.fetch_comments(dest).await,
        }
    }

    #[instrument(skip_all, fields(source = %source, artifact = %artifact.display()))]
    async fn deploy(
        &self,
        source: SourceName,
        artifact: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        match source {
            SourceName::Nasr => deploy_tables(artifact, &self.layout.apt_data_dir),
            SourceName::Dcs => {
                let identifiers =
                    equipment_for_edition(artifact, &self.extraction, progress).await?;
                write_identifier_list(&self.layout.equipment_file(), &identifiers)?;
                info!(identifiers = identifiers.len(), "equipment list deployed");
                Ok(())
            }
            SourceName::Flights => {
                self.copy_into_data(artifact, FLIGHTS_FILE, self.layout.flights_file())
            }
            SourceName::Fuel => self.copy_into_data(artifact, FUEL_FILE, self.layout.fuel_file()),
            SourceName::Comments => {
                self.copy_into_data(artifact, COMMENTS_FILE, self.layout.comments_file())
            }
        }
    }
}
