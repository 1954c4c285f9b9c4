//! Airport and runway tables from the deployed registry edition.
//!
//! Both tables are required: a run without them cannot produce anything
//! meaningful and aborts.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use planaid_shared::{PlanAidError, Result};

// ---------------------------------------------------------------------------
// CsvTable
// ---------------------------------------------------------------------------

/// A CSV file held as strings with case-insensitive column lookup.
///
/// Registry exports are not always valid UTF-8, so fields are decoded lossily.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Read a CSV whose header is the first row.
    pub fn read(path: &Path) -> Result<Self> {
        Self::read_locating(path, None, 0)
    }

    /// Read a CSV whose header is somewhere in the first `max_skip + 1` rows.
    /// With `column` set, the header is the first row containing it;
    /// otherwise it is row `max_skip`.
    pub fn read_locating(path: &Path, column: Option<&str>, max_skip: usize) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| PlanAidError::parse(format!("{}: {e}", path.display())))?;

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.byte_records() {
            let record = record.map_err(|e| PlanAidError::parse(format!("{}: {e}", path.display())))?;
            rows.push(
                record
                    .iter()
                    .map(|field| String::from_utf8_lossy(field).trim().to_string())
                    .collect(),
            );
        }

        let header_at = match column {
            Some(name) => rows
                .iter()
                .take(max_skip + 1)
                .position(|row| row.iter().any(|h| h.eq_ignore_ascii_case(name)))
                .ok_or_else(|| {
                    PlanAidError::parse(format!("{} has no {name} column", path.display()))
                })?,
            None => max_skip,
        };
        if header_at >= rows.len() {
            return Err(PlanAidError::parse(format!("{} has no header row", path.display())));
        }

        let mut rows = rows.split_off(header_at);
        let headers = rows.remove(0);
        Ok(Self { headers, rows })
    }

    /// Index of a column by name (case-insensitive).
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    /// Index of a column that must exist.
    pub fn require(&self, name: &str, table: &str) -> Result<usize> {
        self.column(name)
            .ok_or_else(|| PlanAidError::validation(format!("{table} has no {name} column")))
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Non-empty values of one column, in row order.
    pub fn values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        let idx = self.column(name);
        self.rows
            .iter()
            .filter_map(move |row| idx.and_then(|i| row.get(i)))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Field `idx` of `row`, empty when short.
pub(crate) fn field(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

// ---------------------------------------------------------------------------
// Base table
// ---------------------------------------------------------------------------

/// One row of the airport base table.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRow {
    pub icao: String,
    pub local_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub ownership: String,
}

/// Load `APT_BASE.csv`. Rows without an ICAO identifier or without a usable
/// position are skipped.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_base(path: &Path) -> Result<Vec<BaseRow>> {
    let table = open_required(path)?;
    let name = "APT_BASE.csv";
    let icao = table.require("ICAO_ID", name)?;
    let local = table.require("ARPT_ID", name)?;
    let lat = table.require("LAT_DECIMAL", name)?;
    let lon = table.require("LONG_DECIMAL", name)?;
    let owner = table.require("OWNERSHIP_TYPE_CODE", name)?;
    let arpt_name = table.column("ARPT_NAME");

    let mut without_position = 0usize;
    let mut rows = Vec::with_capacity(table.len());
    for row in table.rows().iter().filter(|row| !field(row, icao).is_empty()) {
        let position = parse_coordinate(field(row, lat), 90.0)
            .zip(parse_coordinate(field(row, lon), 180.0));
        let Some((latitude, longitude)) = position else {
            debug!(icao = field(row, icao), "no usable position, skipping");
            without_position += 1;
            continue;
        };
        rows.push(BaseRow {
            icao: field(row, icao).to_string(),
            local_id: field(row, local).to_string(),
            name: arpt_name.map(|i| field(row, i).to_string()).unwrap_or_default(),
            latitude,
            longitude,
            ownership: field(row, owner).to_string(),
        });
    }

    if without_position > 0 {
        warn!(skipped = without_position, "base rows without a usable position");
    }
    info!(airports = rows.len(), "base table loaded");
    Ok(rows)
}

/// Decimal degrees within `±limit`.
fn parse_coordinate(raw: &str, limit: f64) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    (value.is_finite() && value.abs() <= limit).then_some(value)
}

// ---------------------------------------------------------------------------
// Runway table
// ---------------------------------------------------------------------------

/// One runway end with its usable landing distance, in feet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunwayEnd {
    pub runway_id: String,
    pub end_id: String,
    pub distance: u32,
}

/// Runway ends keyed by local registry id, in table order.
pub type RunwayLookup = BTreeMap<String, Vec<RunwayEnd>>;

/// Join `APT_RWY.csv` with `APT_RWY_END.csv` on (airport, runway).
///
/// The declared landing distance is used when present, else the physical
/// runway length. Ends with neither are dropped.
#[instrument(skip_all, fields(apt_data = %dir.display()))]
pub fn load_runways(dir: &Path) -> Result<RunwayLookup> {
    let rwy = open_required(&dir.join("APT_RWY.csv"))?;
    let ends = open_required(&dir.join("APT_RWY_END.csv"))?;

    let rwy_arpt = rwy.require("ARPT_ID", "APT_RWY.csv")?;
    let rwy_id = rwy.require("RWY_ID", "APT_RWY.csv")?;
    let rwy_len = rwy.require("RWY_LEN", "APT_RWY.csv")?;

    let end_arpt = ends.require("ARPT_ID", "APT_RWY_END.csv")?;
    let end_rwy = ends.require("RWY_ID", "APT_RWY_END.csv")?;
    let end_id = ends.column("RWY_END_ID");
    let lda = ends.require("LNDG_DIST_AVBL", "APT_RWY_END.csv")?;

    let mut ends_by_runway: BTreeMap<(String, String), Vec<&Vec<String>>> = BTreeMap::new();
    for row in ends.rows() {
        ends_by_runway
            .entry((field(row, end_arpt).to_string(), field(row, end_rwy).to_string()))
            .or_default()
            .push(row);
    }

    let mut lookup = RunwayLookup::new();
    let mut dropped = 0usize;
    for row in rwy.rows() {
        let key = (field(row, rwy_arpt).to_string(), field(row, rwy_id).to_string());
        let Some(runway_ends) = ends_by_runway.get(&key) else {
            continue;
        };
        let length = parse_distance(field(row, rwy_len));

        for end in runway_ends {
            let Some(distance) = parse_distance(field(end, lda)).or(length) else {
                dropped += 1;
                continue;
            };
            lookup.entry(key.0.clone()).or_default().push(RunwayEnd {
                runway_id: key.1.clone(),
                end_id: end_id.map(|i| field(end, i).to_string()).unwrap_or_default(),
                distance,
            });
        }
    }

    if dropped > 0 {
        debug!(dropped, "runway ends without any distance");
    }
    info!(airports = lookup.len(), "runway table loaded");
    Ok(lookup)
}

fn parse_distance(raw: &str) -> Option<u32> {
    let value: f64 = raw.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then(|| value.round() as u32)
}

fn open_required(path: &Path) -> Result<CsvTable> {
    if !path.is_file() {
        return Err(PlanAidError::validation(format!(
            "required table {} is missing",
            path.display()
        )));
    }
    let table = CsvTable::read(path)?;
    if table.is_empty() {
        warn!(path = %path.display(), "table has no rows");
    }
    Ok(table)
}
