//! Full record dump, included or not.

use std::collections::BTreeMap;

use planaid_shared::{PlanAidError, PolicyConfig, Result};

use crate::classify::{Verdict, classify};
use crate::fusion::AirportRecord;

const HEADER: [&str; 18] = [
    "ICAO",
    "LOCAL_ID",
    "LATITUDE",
    "LONGITUDE",
    "LONGEST_LDA",
    "RUNWAYS",
    "FUEL",
    "EQUIPMENT",
    "DATE_LANDED",
    "FRONT_SEAT",
    "BACK_SEAT",
    "COMMENT_DATE",
    "COMMENTS",
    "CATEGORY",
    "BLOCKED",
    "ALLOWED",
    "KNOWN_ISSUE",
    "STATUS",
];

/// CSV with one row per fused record. `STATUS` is the marker class or the
/// exclusion reason.
pub fn render(records: &BTreeMap<String, AirportRecord>, policy: &PolicyConfig) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(HEADER)
        .map_err(|e| PlanAidError::parse(e.to_string()))?;

    for r in records.values() {
        let runways = r
            .runways
            .iter()
            .map(|p| match p.second {
                Some(second) => format!("{}:{}/{}", p.runway_id, p.first, second),
                None => format!("{}:{}", p.runway_id, p.first),
            })
            .collect::<Vec<_>>()
            .join(";");
        let status = match classify(r, policy) {
            Verdict::Included { marker, .. } => marker.to_string(),
            Verdict::Excluded(reason) => format!("excluded: {reason}"),
        };
        let landed = r.last_landed.as_ref();
        let comment = r.comment.as_ref();

        writer
            .write_record([
                r.icao.clone(),
                r.local_id.clone(),
                r.latitude.to_string(),
                r.longitude.to_string(),
                r.longest.to_string(),
                runways,
                r.fuel.to_string(),
                r.equipment.to_string(),
                landed.and_then(|l| l.date).map(|d| d.to_string()).unwrap_or_default(),
                landed.map(|l| l.front_seat.clone()).unwrap_or_default(),
                landed.map(|l| l.back_seat.clone()).unwrap_or_default(),
                comment.and_then(|c| c.date).map(|d| d.to_string()).unwrap_or_default(),
                comment.map(|c| c.text.clone()).unwrap_or_default(),
                r.category.map(|c| c.to_string()).unwrap_or_default(),
                r.blocked.to_string(),
                r.allowed.to_string(),
                r.known_issue.to_string(),
                status,
            ])
            .map_err(|e| PlanAidError::parse(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| PlanAidError::parse(format!("master record buffer: {e}")))
}
