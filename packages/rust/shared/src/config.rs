//! Application configuration for PlanAid.
//!
//! User config lives at `~/.planaid/planaid.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PlanAidError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "planaid.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".planaid";

// ---------------------------------------------------------------------------
// Config structs (matching planaid.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Filesystem locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Remote endpoints for every acquisition source.
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Acquisition tuning (workers, timeouts, retries, reuse windows).
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Airport inclusion policy.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Chart-supplement equipment extraction settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Output labelling.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root working directory; data, cache, and outputs live beneath it.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// Reviewer override list (CSV export of the review workbook).
    /// Relative paths resolve against `work_dir`.
    #[serde(default = "default_review_list")]
    pub review_list: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            review_list: default_review_list(),
        }
    }
}

fn default_work_dir() -> String {
    "./planaid-work".into()
}
fn default_review_list() -> String {
    "review_list.csv".into()
}

/// `[endpoints]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Edition lookup for the airport/runway registry (28-day cycle).
    #[serde(default = "default_registry_edition_api")]
    pub registry_edition_api: String,

    /// Edition lookup for the chart supplement (56-day cycle).
    #[serde(default = "default_supplement_edition_api")]
    pub supplement_edition_api: String,

    /// Flight-log API returning a JSON array of landings.
    #[serde(default = "default_flights_api")]
    pub flights_api: String,

    /// Comment feed, exported as CSV.
    #[serde(default = "default_comments_url")]
    pub comments_url: String,

    /// Fuel site landing page, contacted before the download.
    #[serde(default = "default_fuel_check_url")]
    pub fuel_check_url: String,

    /// Fuel contract list download.
    #[serde(default = "default_fuel_download_url")]
    pub fuel_download_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            registry_edition_api: default_registry_edition_api(),
            supplement_edition_api: default_supplement_edition_api(),
            flights_api: default_flights_api(),
            comments_url: default_comments_url(),
            fuel_check_url: default_fuel_check_url(),
            fuel_download_url: default_fuel_download_url(),
        }
    }
}

fn default_registry_edition_api() -> String {
    "https://external-api.faa.gov/apra/nfdc/nasr/chart".into()
}
fn default_supplement_edition_api() -> String {
    "https://external-api.faa.gov/apra/supplement/chart".into()
}
fn default_flights_api() -> String {
    "https://ndjsammweb.ndc.nasa.gov/Flightmetrics/api/cbdata/t38airports".into()
}
fn default_comments_url() -> String {
    "https://docs.google.com/spreadsheets/d/1AZypD2UHW65op0CSiMAlxwdjPq71B6LNIKk4n0crovI/export?format=csv&gid=0".into()
}
fn default_fuel_check_url() -> String {
    "https://cis.energy.dla.mil/ipcis/Ipcis".into()
}
fn default_fuel_download_url() -> String {
    "https://cis.energy.dla.mil/ipcis/Download?searchValue=UNITED%20STATES&field=REGION&recordType=100".into()
}

/// `[acquisition]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Concurrent workers for the small sources (flights, fuel, comments).
    #[serde(default = "default_small_source_workers")]
    pub small_source_workers: usize,

    /// Timeout for metadata and small-list requests, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for archive downloads, in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Retry attempts for transient HTTP failures (429/5xx/connect).
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base backoff between retries, in milliseconds (doubled per attempt).
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Flight history window in years.
    #[serde(default = "default_years_included")]
    pub years_included: u32,

    /// Reuse an uncycled source's cached artifact if it is younger than this.
    /// Unset means uncycled sources are always re-fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reuse_uncycled_for_hours: Option<u64>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            small_source_workers: default_small_source_workers(),
            request_timeout_secs: default_request_timeout(),
            download_timeout_secs: default_download_timeout(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
            years_included: default_years_included(),
            reuse_uncycled_for_hours: None,
        }
    }
}

fn default_small_source_workers() -> usize {
    3
}
fn default_request_timeout() -> u64 {
    60
}
fn default_download_timeout() -> u64 {
    300
}
fn default_retries() -> u32 {
    5
}
fn default_backoff_ms() -> u64 {
    1000
}
fn default_years_included() -> u32 {
    4
}

/// `[policy]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Minimum longest usable runway distance, in feet.
    #[serde(default = "default_min_runway")]
    pub min_runway_ft: u32,

    /// National identifier prefix of the serviced region.
    #[serde(default = "default_region_prefix")]
    pub region_prefix: String,

    /// Identifier length of the serviced region.
    #[serde(default = "default_identifier_len")]
    pub identifier_len: usize,

    /// Ownership codes that always have government fuel.
    #[serde(default = "default_government_ownership")]
    pub government_ownership_codes: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_runway_ft: default_min_runway(),
            region_prefix: default_region_prefix(),
            identifier_len: default_identifier_len(),
            government_ownership_codes: default_government_ownership(),
        }
    }
}

fn default_min_runway() -> u32 {
    7000
}
fn default_region_prefix() -> String {
    "K".into()
}
fn default_identifier_len() -> usize {
    4
}
fn default_government_ownership() -> Vec<String> {
    ["CG", "MA", "MN", "MR"].map(String::from).to_vec()
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Identifier prefixes recognised inside parentheses, e.g. `( KXYZ )`.
    #[serde(default = "default_identifier_prefixes")]
    pub identifier_prefixes: Vec<String>,

    /// Token opening the ground-equipment section of a page.
    #[serde(default = "default_marker")]
    pub marker_token: String,

    /// Equipment model codes that confirm a real start cart.
    #[serde(default = "default_equipment_codes")]
    pub equipment_codes: Vec<String>,

    /// Upper bound on concurrent document parsers.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            identifier_prefixes: default_identifier_prefixes(),
            marker_token: default_marker(),
            equipment_codes: default_equipment_codes(),
            max_workers: default_max_workers(),
        }
    }
}

fn default_identifier_prefixes() -> Vec<String> {
    ["K", "PA"].map(String::from).to_vec()
}
fn default_marker() -> String {
    "JASU".into()
}
fn default_equipment_codes() -> Vec<String> {
    ["95", "60A", "MSU", "GTC", "WELLS", "NCPP", "MA-"]
        .map(String::from)
        .to_vec()
}
fn default_max_workers() -> usize {
    8
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Version label shown on the version pin and in file names.
    #[serde(default = "default_version_label")]
    pub version_label: String,

    /// File name prefix for the primary export.
    #[serde(default = "default_export_prefix")]
    pub export_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            version_label: default_version_label(),
            export_prefix: default_export_prefix(),
        }
    }
}

fn default_version_label() -> String {
    "Version 3.0".into()
}
fn default_export_prefix() -> String {
    "T38 Apts".into()
}

// ---------------------------------------------------------------------------
// Work layout (runtime, derived from config + CLI flags)
// ---------------------------------------------------------------------------

/// Resolved on-disk layout of a working directory.
///
/// ```text
/// <work_dir>/
/// ├── review_list.csv
/// ├── data/
/// │   ├── cache_registry.json
/// │   ├── cache/<source>/<edition-or-timestamp>/
/// │   ├── apt_data/APT_BASE.csv, APT_RWY.csv, APT_RWY_END.csv
/// │   ├── flights_data.csv, fuel_data.csv, comments_data.csv
/// │   └── equipment_data.csv
/// └── output/
/// ```
#[derive(Debug, Clone)]
pub struct WorkLayout {
    pub work_dir: PathBuf,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub registry_file: PathBuf,
    pub apt_data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub review_list: PathBuf,
}

impl WorkLayout {
    /// Build the layout rooted at `work_dir`.
    pub fn new(work_dir: impl Into<PathBuf>, review_list: &str) -> Self {
        let work_dir = work_dir.into();
        let data_dir = work_dir.join("data");
        let review = Path::new(review_list);
        let review_list = if review.is_absolute() {
            review.to_path_buf()
        } else {
            work_dir.join(review)
        };
        Self {
            cache_dir: data_dir.join("cache"),
            registry_file: data_dir.join("cache_registry.json"),
            apt_data_dir: data_dir.join("apt_data"),
            output_dir: work_dir.join("output"),
            data_dir,
            work_dir,
            review_list,
        }
    }

    pub fn flights_file(&self) -> PathBuf {
        self.data_dir.join("flights_data.csv")
    }

    pub fn fuel_file(&self) -> PathBuf {
        self.data_dir.join("fuel_data.csv")
    }

    pub fn comments_file(&self) -> PathBuf {
        self.data_dir.join("comments_data.csv")
    }

    pub fn equipment_file(&self) -> PathBuf {
        self.data_dir.join("equipment_data.csv")
    }

    /// Create every directory in the layout.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.work_dir,
            &self.data_dir,
            &self.cache_dir,
            &self.apt_data_dir,
            &self.output_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| PlanAidError::io(dir, e))?;
        }
        Ok(())
    }
}

impl From<&AppConfig> for WorkLayout {
    fn from(config: &AppConfig) -> Self {
        Self::new(&config.paths.work_dir, &config.paths.review_list)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.planaid/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| PlanAidError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.planaid/planaid.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PlanAidError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| PlanAidError::config(format!("failed to parse {}: {e}", path.display())))?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PlanAidError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PlanAidError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PlanAidError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check endpoint URLs and worker counts.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let endpoints = &config.endpoints;
    for (name, value) in [
        ("registry_edition_api", &endpoints.registry_edition_api),
        ("supplement_edition_api", &endpoints.supplement_edition_api),
        ("flights_api", &endpoints.flights_api),
        ("comments_url", &endpoints.comments_url),
        ("fuel_check_url", &endpoints.fuel_check_url),
        ("fuel_download_url", &endpoints.fuel_download_url),
    ] {
        Url::parse(value)
            .map_err(|e| PlanAidError::config(format!("endpoints.{name} is not a URL: {e}")))?;
    }

    if config.acquisition.small_source_workers == 0 {
        return Err(PlanAidError::config(
            "acquisition.small_source_workers must be at least 1",
        ));
    }
    if config.extraction.max_workers == 0 {
        return Err(PlanAidError::config(
            "extraction.max_workers must be at least 1",
        ));
    }
    if config.extraction.identifier_prefixes.is_empty() {
        return Err(PlanAidError::config(
            "extraction.identifier_prefixes must not be empty",
        ));
    }
    Ok(())
}
