//! Classification policy and marker placement.
//!
//! Every renderer consumes the same [`Placement`] list, so labels, marker
//! classes and descriptions always agree between outputs.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{info, instrument};

use planaid_shared::PolicyConfig;

use crate::fusion::{AirportRecord, Category};

const FOOTER: &str = "<br/><br/>To add/edit comments or note errors:\
<br/>Contact CB/AOD T38 rep\
<br/>or\
<br/>Fill out Google sheet:  https://tinyurl.com/NASAT38Comments\
<br/>(Copy/Paste Required)";

const NOTE: &str = "<br/><br/>## NOTE: Aircrew shall confirm the accuracy of\
<br/>runway information in either the A/FD or IFR Supplement.\
<br/>The \"Declared Distances\" section of the\
<br/>A/FD and IFR Supplement is omitted when\
<br/>declared distances equal the runway length.\
<br/>Declared distances may also be reduced via NOTAM.##";

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

/// Why a record is left out of the output set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusion {
    OutsideRegion,
    Blocked,
    ShortRunway,
    NoFuel,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OutsideRegion => "outside region",
            Self::Blocked => "blocked",
            Self::ShortRunway => "short runway",
            Self::NoFuel => "no fuel",
        })
    }
}

/// Support expected at an included airport, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Eligibility {
    KnownGood,
    EquipmentAvailable,
    EquipmentUnconfirmed,
}

/// Marker drawn for an included airport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerClass {
    KnownGood,
    EquipmentAvailable,
    EquipmentUnconfirmed,
    Caution,
    Prohibited,
}

impl MarkerClass {
    pub const ALL: [MarkerClass; 5] = [
        Self::KnownGood,
        Self::EquipmentAvailable,
        Self::EquipmentUnconfirmed,
        Self::Caution,
        Self::Prohibited,
    ];

    /// Shared style identifier in the KML document.
    pub fn style_id(self) -> &'static str {
        match self {
            Self::KnownGood => "prev",
            Self::EquipmentAvailable => "go",
            Self::EquipmentUnconfirmed => "nogo",
            Self::Caution => "cat",
            Self::Prohibited => "cat1",
        }
    }

    /// Icon path below `maps.google.com/mapfiles/kml/`.
    pub fn icon(self) -> &'static str {
        match self {
            Self::KnownGood => "pushpin/grn-pushpin.png",
            Self::EquipmentAvailable => "pushpin/blue-pushpin.png",
            Self::EquipmentUnconfirmed => "pushpin/ylw-pushpin.png",
            Self::Caution => "paddle/red-diamond.png",
            Self::Prohibited => "paddle/red-circle.png",
        }
    }

    /// Pin colour name used in the text summary.
    pub fn pin_color(self) -> &'static str {
        match self {
            Self::KnownGood => "green",
            Self::EquipmentAvailable => "blue",
            Self::EquipmentUnconfirmed => "yellow",
            Self::Caution => "red-diamond",
            Self::Prohibited => "red-circle",
        }
    }

    /// CSS colour for the interactive map.
    pub fn css_color(self) -> &'static str {
        match self {
            Self::KnownGood => "#2e9e44",
            Self::EquipmentAvailable => "#2a62d4",
            Self::EquipmentUnconfirmed => "#e0c020",
            Self::Caution => "#d9342b",
            Self::Prohibited => "#8b0000",
        }
    }
}

impl fmt::Display for MarkerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::KnownGood => "known-good",
            Self::EquipmentAvailable => "equipment-available",
            Self::EquipmentUnconfirmed => "equipment-unconfirmed",
            Self::Caution => "caution",
            Self::Prohibited => "prohibited",
        })
    }
}

/// Outcome of the policy for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Excluded(Exclusion),
    Included {
        eligibility: Eligibility,
        marker: MarkerClass,
    },
}

/// Apply exclusion, eligibility and category override, in that order.
pub fn classify(record: &AirportRecord, policy: &PolicyConfig) -> Verdict {
    let in_region = record.icao.starts_with(policy.region_prefix.as_str())
        && record.icao.chars().count() == policy.identifier_len;
    if !in_region {
        return Verdict::Excluded(Exclusion::OutsideRegion);
    }
    if record.blocked {
        return Verdict::Excluded(Exclusion::Blocked);
    }
    if record.longest < policy.min_runway_ft {
        return Verdict::Excluded(Exclusion::ShortRunway);
    }
    if !record.fuel {
        return Verdict::Excluded(Exclusion::NoFuel);
    }

    let known_good = (record.recently_landed() && !record.known_issue) || record.allowed;
    let eligibility = if known_good {
        Eligibility::KnownGood
    } else if record.equipment {
        Eligibility::EquipmentAvailable
    } else {
        Eligibility::EquipmentUnconfirmed
    };

    let marker = match record.category {
        Some(Category::TierOne) => MarkerClass::Prohibited,
        Some(Category::TierTwo | Category::TierThree) => MarkerClass::Caution,
        None => match eligibility {
            Eligibility::KnownGood => MarkerClass::KnownGood,
            Eligibility::EquipmentAvailable => MarkerClass::EquipmentAvailable,
            Eligibility::EquipmentUnconfirmed => MarkerClass::EquipmentUnconfirmed,
        },
    };

    Verdict::Included { eligibility, marker }
}

// ---------------------------------------------------------------------------
// Placements
// ---------------------------------------------------------------------------

/// One marker ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub icao: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub longest: u32,
    pub eligibility: Eligibility,
    pub marker: MarkerClass,
    /// Description with `<br/>` line breaks.
    pub description: String,
    /// Comment text without markup, empty when there is none.
    pub comment: String,
}

/// Classify every record and build placements for the included ones, in
/// identifier order.
#[instrument(skip_all, fields(records = records.len()))]
pub fn place_markers(
    records: &BTreeMap<String, AirportRecord>,
    policy: &PolicyConfig,
) -> Vec<Placement> {
    let mut excluded: BTreeMap<Exclusion, usize> = BTreeMap::new();
    let mut placements = Vec::new();

    for record in records.values() {
        match classify(record, policy) {
            Verdict::Excluded(reason) => *excluded.entry(reason).or_default() += 1,
            Verdict::Included { eligibility, marker } => {
                let comment = comment_markup(record);
                placements.push(Placement {
                    icao: record.icao.clone(),
                    name: format!("{} {}", record.icao, record.longest),
                    latitude: record.latitude,
                    longitude: record.longitude,
                    longest: record.longest,
                    eligibility,
                    marker,
                    description: describe(record, eligibility, &comment, policy),
                    comment: comment.replace("<br/>", " ").trim().to_string(),
                });
            }
        }
    }

    info!(
        included = placements.len(),
        outside_region = excluded.get(&Exclusion::OutsideRegion).copied().unwrap_or(0),
        blocked = excluded.get(&Exclusion::Blocked).copied().unwrap_or(0),
        short_runway = excluded.get(&Exclusion::ShortRunway).copied().unwrap_or(0),
        no_fuel = excluded.get(&Exclusion::NoFuel).copied().unwrap_or(0),
        "markers placed"
    );
    placements
}

fn category_text(category: Option<Category>) -> &'static str {
    match category {
        Some(Category::TierOne) => "<br/><br/>Category 1 Airport, T38 operations prohibited.",
        Some(Category::TierTwo) => "<br/><br/>Category 2 Airport, Form 740A Required.",
        Some(Category::TierThree) => {
            "<br/><br/>Category 3 Airport, particular caution and prior planning required."
        }
        None => "",
    }
}

fn comment_markup(record: &AirportRecord) -> String {
    match &record.comment {
        Some(c) => match c.date {
            Some(date) => format!("<br/>{}: {}", date.format("%m/%d/%Y"), c.text),
            None => format!("<br/>{}", c.text),
        },
        None => String::new(),
    }
}

/// Popup text for one included record.
fn describe(
    record: &AirportRecord,
    eligibility: Eligibility,
    comment: &str,
    policy: &PolicyConfig,
) -> String {
    // Listed newest-last in the table, shown in reverse.
    let runway_lines: String = record
        .runways
        .iter()
        .rev()
        .filter(|pair| pair.reaches(policy.min_runway_ft))
        .map(|pair| {
            format!(
                "<br/>{}: {}/{}",
                pair.runway_id,
                pair.first,
                pair.second.unwrap_or(0)
            )
        })
        .collect();

    let runway_info = format!(
        "<br/>Longest Landing Distance Available (LDA): {}{}<br/><br/>Runways with Declared LDAs >{}:{}",
        record.longest,
        category_text(record.category),
        policy.min_runway_ft,
        runway_lines
    );

    match eligibility {
        Eligibility::KnownGood => {
            let (date, front, back) = match &record.last_landed {
                Some(l) => (
                    l.date.map(|d| d.format("%d %b %Y").to_string()).unwrap_or_default(),
                    l.front_seat.as_str(),
                    l.back_seat.as_str(),
                ),
                None => (String::new(), "", ""),
            };
            let mut crew = if front.is_empty() { "Not Listed".to_string() } else { front.to_string() };
            if !back.is_empty() {
                crew.push_str(" / ");
                crew.push_str(back);
            }
            format!(
                "{} <br/>Has supported T38s in the past, start cart may or may not be listed on A/FD, Call FBO. \
<br/>Government Contract Gas Available.{runway_info}\
<br/><br/>Date Last Landed: {date}<br/>Crew: {crew}{NOTE}<br/><br/>Comments: {comment}{FOOTER}",
                record.icao
            )
        }
        Eligibility::EquipmentAvailable | Eligibility::EquipmentUnconfirmed => {
            let cart = if eligibility == Eligibility::EquipmentAvailable {
                "Air start cart listed"
            } else {
                "No start cart listed"
            };
            format!(
                "{} <br/>{cart} on A/FD, Call FBO. <br/>Government Contract Gas Available.\
{runway_info}{NOTE}<br/><br/>Comments: {comment}{FOOTER}",
                record.icao
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::fusion::RunwayPair;
    use crate::reference::{CommentRecord, LandingRecord};

    fn scenario() -> AirportRecord {
        AirportRecord {
            icao: "KXYZ".into(),
            local_id: "XYZ".into(),
            name: "XYZ MUNI".into(),
            latitude: 35.25,
            longitude: -97.5,
            longest: 7200,
            runways: vec![
                RunwayPair { runway_id: "18/36".into(), first: 7200, second: Some(7200) },
                RunwayPair { runway_id: "09/27".into(), first: 5000, second: Some(4800) },
            ],
            equipment: false,
            fuel: true,
            last_landed: None,
            comment: None,
            category: None,
            blocked: false,
            allowed: false,
            known_issue: false,
        }
    }

    fn landed() -> Option<LandingRecord> {
        Some(LandingRecord {
            date: NaiveDate::from_ymd_opt(2025, 5, 9),
            front_seat: "AB".into(),
            back_seat: "CD".into(),
        })
    }

    fn policy() -> PolicyConfig {
        PolicyConfig::default()
    }

    #[test]
    fn scenario_is_equipment_unconfirmed() {
        assert_eq!(
            classify(&scenario(), &policy()),
            Verdict::Included {
                eligibility: Eligibility::EquipmentUnconfirmed,
                marker: MarkerClass::EquipmentUnconfirmed,
            }
        );
    }

    #[test]
    fn tier_one_is_prohibited_even_when_known_good() {
        let mut record = scenario();
        record.category = Some(Category::TierOne);
        record.last_landed = landed();

        assert_eq!(
            classify(&record, &policy()),
            Verdict::Included {
                eligibility: Eligibility::KnownGood,
                marker: MarkerClass::Prohibited,
            }
        );
    }

    #[test]
    fn lower_tiers_are_caution() {
        let mut record = scenario();
        record.category = Some(Category::TierThree);
        record.equipment = true;
        assert_eq!(
            classify(&record, &policy()),
            Verdict::Included {
                eligibility: Eligibility::EquipmentAvailable,
                marker: MarkerClass::Caution,
            }
        );
    }

    #[test]
    fn exclusions_in_order() {
        let mut record = scenario();
        record.icao = "PAXX".into();
        record.blocked = true;
        assert_eq!(classify(&record, &policy()), Verdict::Excluded(Exclusion::OutsideRegion));

        record.icao = "KXYZ".into();
        assert_eq!(classify(&record, &policy()), Verdict::Excluded(Exclusion::Blocked));

        record.blocked = false;
        record.longest = 6999;
        record.fuel = false;
        assert_eq!(classify(&record, &policy()), Verdict::Excluded(Exclusion::ShortRunway));

        record.longest = 7000;
        assert_eq!(classify(&record, &policy()), Verdict::Excluded(Exclusion::NoFuel));
    }

    #[test]
    fn blocked_wins_over_every_other_flag() {
        let mut record = scenario();
        record.blocked = true;
        record.allowed = true;
        record.equipment = true;
        record.last_landed = landed();
        record.category = Some(Category::TierOne);

        assert_eq!(classify(&record, &policy()), Verdict::Excluded(Exclusion::Blocked));
        let records = BTreeMap::from([(record.icao.clone(), record)]);
        assert!(place_markers(&records, &policy()).is_empty());
    }

    #[test]
    fn known_issue_falls_back_to_equipment() {
        let mut record = scenario();
        record.last_landed = landed();
        record.known_issue = true;
        record.equipment = true;
        assert!(matches!(
            classify(&record, &policy()),
            Verdict::Included { eligibility: Eligibility::EquipmentAvailable, .. }
        ));

        record.allowed = true;
        assert!(matches!(
            classify(&record, &policy()),
            Verdict::Included { eligibility: Eligibility::KnownGood, .. }
        ));
    }

    #[test]
    fn placement_text() {
        let mut record = scenario();
        record.comment = Some(CommentRecord {
            date: NaiveDate::from_ymd_opt(2025, 4, 2),
            text: "FBO closes 2200L".into(),
        });
        let records = BTreeMap::from([(record.icao.clone(), record)]);

        let placements = place_markers(&records, &policy());
        assert_eq!(placements.len(), 1);
        let p = &placements[0];
        assert_eq!(p.name, "KXYZ 7200");
        assert_eq!(p.comment, "04/02/2025: FBO closes 2200L");
        assert!(p.description.starts_with("KXYZ <br/>No start cart listed on A/FD, Call FBO."));
        assert!(p.description.contains("Runways with Declared LDAs >7000:<br/>18/36: 7200/7200"));
        assert!(!p.description.contains("09/27"));
        assert!(p.description.ends_with("(Copy/Paste Required)"));
    }

    #[test]
    fn known_good_text_lists_crew() {
        let mut record = scenario();
        record.last_landed = landed();
        record.category = Some(Category::TierTwo);
        let records = BTreeMap::from([(record.icao.clone(), record)]);

        let p = &place_markers(&records, &policy())[0];
        assert_eq!(p.marker, MarkerClass::Caution);
        assert!(p.description.contains("Date Last Landed: 09 May 2025<br/>Crew: AB / CD"));
        assert!(p.description.contains("Category 2 Airport, Form 740A Required."));
    }

    #[test]
    fn runway_lines_are_reversed() {
        let mut record = scenario();
        record.runways.push(RunwayPair { runway_id: "04/22".into(), first: 8000, second: None });
        let records = BTreeMap::from([(record.icao.clone(), record)]);

        let p = &place_markers(&records, &policy())[0];
        assert!(p.description.contains(">7000:<br/>04/22: 8000/0<br/>18/36: 7200/7200"));
    }
}
