//! Fusion: one canonical record per airport identifier.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, instrument};

use planaid_shared::PolicyConfig;

use crate::reference::{CommentRecord, LandingRecord, ReferenceSets};
use crate::tables::{BaseRow, RunwayEnd, RunwayLookup};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Reviewer category. Lower tiers are more restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    TierOne,
    TierTwo,
    TierThree,
}

impl Category {
    pub fn number(self) -> u8 {
        match self {
            Self::TierOne => 1,
            Self::TierTwo => 2,
            Self::TierThree => 3,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier-{}", self.number())
    }
}

/// Landing distances at the two ends of one runway, as listed in the table.
/// `second` is `None` when the runway has a single listed end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunwayPair {
    pub runway_id: String,
    pub first: u32,
    pub second: Option<u32>,
}

impl RunwayPair {
    pub fn reaches(&self, minimum: u32) -> bool {
        self.first >= minimum || self.second.is_some_and(|d| d >= minimum)
    }
}

/// Everything known about one airport after fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct AirportRecord {
    pub icao: String,
    pub local_id: String,
    /// Facility name from the base table; may be empty.
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub longest: u32,
    pub runways: Vec<RunwayPair>,
    pub equipment: bool,
    pub fuel: bool,
    pub last_landed: Option<LandingRecord>,
    pub comment: Option<CommentRecord>,
    pub category: Option<Category>,
    pub blocked: bool,
    pub allowed: bool,
    pub known_issue: bool,
}

impl AirportRecord {
    pub fn recently_landed(&self) -> bool {
        self.last_landed.is_some()
    }
}

// ---------------------------------------------------------------------------
// Fusion
// ---------------------------------------------------------------------------

/// Join the base table with runways and reference sets.
///
/// Airports without runway data are skipped. A later base row with the same
/// identifier replaces an earlier one.
#[instrument(skip_all, fields(base = base.len(), runway_airports = runways.len()))]
pub fn fuse(
    base: &[BaseRow],
    runways: &RunwayLookup,
    refs: &ReferenceSets,
    policy: &PolicyConfig,
) -> BTreeMap<String, AirportRecord> {
    let mut records = BTreeMap::new();
    let mut without_runways = 0usize;

    for row in base.iter().filter(|r| !r.icao.is_empty()) {
        let Some(ends) = runways.get(&row.local_id).filter(|e| !e.is_empty()) else {
            without_runways += 1;
            continue;
        };
        let icao = row.icao.as_str();
        let review = &refs.review;

        let record = AirportRecord {
            icao: icao.to_string(),
            local_id: row.local_id.clone(),
            name: row.name.clone(),
            latitude: row.latitude,
            longitude: row.longitude,
            longest: ends.iter().map(|e| e.distance).max().unwrap_or(0),
            runways: pair_ends(ends),
            equipment: refs.equipment.contains(icao),
            fuel: refs.fuel.contains(icao)
                || policy
                    .government_ownership_codes
                    .iter()
                    .any(|code| code == &row.ownership),
            last_landed: refs.landed.get(icao).cloned(),
            comment: refs.comments.get(icao).cloned(),
            category: if review.tier_one.contains(icao) {
                Some(Category::TierOne)
            } else if review.tier_two.contains(icao) {
                Some(Category::TierTwo)
            } else if review.tier_three.contains(icao) {
                Some(Category::TierThree)
            } else {
                None
            },
            blocked: review.blocked.contains(icao),
            allowed: review.allowed.contains(icao),
            known_issue: review.known_issue.contains(icao),
        };
        records.insert(record.icao.clone(), record);
    }

    debug!(without_runways, "airports skipped for missing runway data");
    info!(records = records.len(), "fusion complete");
    records
}

/// Group runway ends two at a time, in table order.
fn pair_ends(ends: &[RunwayEnd]) -> Vec<RunwayPair> {
    ends.chunks(2)
        .map(|pair| RunwayPair {
            runway_id: pair[0].runway_id.clone(),
            first: pair[0].distance,
            second: pair.get(1).map(|e| e.distance),
        })
        .collect()
}
