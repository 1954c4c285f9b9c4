//! Reference sets joined into every airport record.
//!
//! Every set here is optional input: a missing or malformed file degrades to
//! an empty set with a warning and never stops a run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use planaid_shared::{Result, WorkLayout};

use crate::tables::{CsvTable, field};

/// Rows the fuel list may carry above its header.
const FUEL_MAX_PREAMBLE: usize = 3;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Most recent known landing at an airport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandingRecord {
    pub date: Option<NaiveDate>,
    pub front_seat: String,
    pub back_seat: String,
}

/// Reviewer comment attached to an airport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub date: Option<NaiveDate>,
    pub text: String,
}

/// Per-airport flags and notes from the reviewer's list.
#[derive(Debug, Clone, Default)]
pub struct ReviewList {
    pub blocked: BTreeSet<String>,
    pub allowed: BTreeSet<String>,
    pub tier_one: BTreeSet<String>,
    pub tier_two: BTreeSet<String>,
    pub tier_three: BTreeSet<String>,
    pub known_issue: BTreeSet<String>,
    pub landed: Vec<(String, LandingRecord)>,
    pub comments: Vec<(String, CommentRecord)>,
    pub change_requests: Vec<String>,
}

/// All lookup structures consumed by fusion.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSets {
    pub fuel: BTreeSet<String>,
    pub equipment: BTreeSet<String>,
    pub landed: BTreeMap<String, LandingRecord>,
    pub comments: BTreeMap<String, CommentRecord>,
    pub review: ReviewList,
}

impl ReferenceSets {
    /// Load every reference set from the deployed working files.
    #[instrument(skip_all, fields(data_dir = %layout.data_dir.display()))]
    pub fn load(layout: &WorkLayout) -> Self {
        let fuel = degrade("fuel list", load_fuel(&layout.fuel_file()));
        let equipment = degrade("equipment list", load_identifiers(&layout.equipment_file()));
        let feed_landings = degrade("flight history", load_landings(&layout.flights_file()));
        let feed_comments = degrade("comment feed", load_comments(&layout.comments_file()));
        let review = degrade("review list", load_review_list(&layout.review_list));

        let sets = Self::merge(fuel, equipment, feed_landings, feed_comments, review);
        info!(
            fuel = sets.fuel.len(),
            equipment = sets.equipment.len(),
            landed = sets.landed.len(),
            comments = sets.comments.len(),
            "reference sets loaded"
        );
        sets
    }

    /// Combine the feeds with the review list: the most recent landing wins,
    /// and the first comment seen wins with the feed read before the review list.
    pub fn merge(
        fuel: BTreeSet<String>,
        equipment: BTreeSet<String>,
        feed_landings: Vec<(String, LandingRecord)>,
        feed_comments: Vec<(String, CommentRecord)>,
        review: ReviewList,
    ) -> Self {
        let mut landed: BTreeMap<String, LandingRecord> = BTreeMap::new();
        for (icao, landing) in feed_landings.into_iter().chain(review.landed.iter().cloned()) {
            match landed.get(&icao) {
                Some(seen) if seen.date >= landing.date => {}
                _ => {
                    landed.insert(icao, landing);
                }
            }
        }

        let mut comments: BTreeMap<String, CommentRecord> = BTreeMap::new();
        for (icao, comment) in feed_comments.into_iter().chain(review.comments.iter().cloned()) {
            comments.entry(icao).or_insert(comment);
        }

        Self {
            fuel,
            equipment,
            landed,
            comments,
            review,
        }
    }
}

fn degrade<T: Default>(what: &str, loaded: Result<T>) -> T {
    loaded.unwrap_or_else(|e| {
        warn!(set = what, error = %e, "reference set unavailable, using empty set");
        T::default()
    })
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// Fuel contract identifiers. The header row sits below a short preamble.
pub fn load_fuel(path: &Path) -> Result<BTreeSet<String>> {
    let table = CsvTable::read_locating(path, Some("ICAO"), FUEL_MAX_PREAMBLE)?;
    Ok(table.values("ICAO").map(str::to_string).collect())
}

/// Identifier list with an `ICAO` header.
pub fn load_identifiers(path: &Path) -> Result<BTreeSet<String>> {
    let table = CsvTable::read(path)?;
    table.require("ICAO", &path.display().to_string())?;
    Ok(table.values("ICAO").map(str::to_string).collect())
}

/// Flight history rows: `ICAO,DATE_LANDED,FRONT_SEAT,BACK_SEAT`.
pub fn load_landings(path: &Path) -> Result<Vec<(String, LandingRecord)>> {
    let table = CsvTable::read(path)?;
    landing_rows(&table, "ICAO", &path.display().to_string())
}

/// Comment feed rows: `APT_COMM,COMMENT_DATE,COMMENTS`.
pub fn load_comments(path: &Path) -> Result<Vec<(String, CommentRecord)>> {
    let table = CsvTable::read(path)?;
    comment_rows(&table, &path.display().to_string())
}

/// The reviewer's list exported as CSV. Each column is an independent list;
/// blank cells are ignored.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_review_list(path: &Path) -> Result<ReviewList> {
    let table = CsvTable::read(path)?;
    let name = path.display().to_string();
    let set = |column: &str| -> BTreeSet<String> {
        table.values(column).map(str::to_string).collect()
    };

    let review = ReviewList {
        blocked: set("BLACKLIST"),
        allowed: set("WHITELIST"),
        tier_one: set("CAT_ONE"),
        tier_two: set("CAT_TWO"),
        tier_three: set("CAT_THREE"),
        known_issue: set("ISSUES_WITH_RECENTLY_LANDED"),
        landed: optional(landing_rows(&table, "RECENTLY_LANDED", &name)),
        comments: optional(comment_rows(&table, &name)),
        change_requests: table.values("CHANGE_REQUEST").map(str::to_string).collect(),
    };
    debug!(
        blocked = review.blocked.len(),
        allowed = review.allowed.len(),
        landed = review.landed.len(),
        "review list loaded"
    );
    Ok(review)
}

fn optional<T>(rows: Result<Vec<T>>) -> Vec<T> {
    rows.unwrap_or_default()
}

fn landing_rows(table: &CsvTable, key: &str, name: &str) -> Result<Vec<(String, LandingRecord)>> {
    let icao = table.require(key, name)?;
    let date = table.require("DATE_LANDED", name)?;
    let front = table.column("FRONT_SEAT");
    let back = table.column("BACK_SEAT");

    Ok(table
        .rows()
        .iter()
        .filter(|row| !field(row, icao).is_empty())
        .map(|row| {
            (
                field(row, icao).to_string(),
                LandingRecord {
                    date: parse_date(field(row, date)),
                    front_seat: front.map(|i| field(row, i).to_string()).unwrap_or_default(),
                    back_seat: back.map(|i| field(row, i).to_string()).unwrap_or_default(),
                },
            )
        })
        .collect())
}

fn comment_rows(table: &CsvTable, name: &str) -> Result<Vec<(String, CommentRecord)>> {
    let icao = table.require("APT_COMM", name)?;
    let text = table.require("COMMENTS", name)?;
    let date = table.column("COMMENT_DATE");

    Ok(table
        .rows()
        .iter()
        .filter(|row| !field(row, icao).is_empty() && !field(row, text).is_empty())
        .map(|row| {
            (
                field(row, icao).to_string(),
                CommentRecord {
                    date: date.and_then(|i| parse_date(field(row, i))),
                    text: field(row, text).to_string(),
                },
            )
        })
        .collect())
}

/// Accepts ISO dates (with or without a time part) and US `MM/DD/YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            raw.get(..10)
                .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        })
}
