//! Mission briefing sheet for a departure, destination and optional alternate.
//!
//! The sheet is plain text built from the fused record set: a header with the
//! crew and mission details, the route with a distance and time estimate, one
//! block per airfield, and a closing footer.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{info, instrument};

use planaid_shared::{PlanAidError, Result};

use crate::fusion::{AirportRecord, Category};
use crate::output::{OutputFile, write_atomic};

const WIDTH: usize = 70;
const NOTE_WIDTH: usize = 68;
const EARTH_RADIUS_NM: f64 = 3440.065;

pub const DEFAULT_SORTIE: &str = "Cross-Country Training";
pub const DEFAULT_TRUE_AIRSPEED_KTS: u32 = 350;

/// What to brief.
#[derive(Debug, Clone, PartialEq)]
pub struct BriefRequest {
    pub departure: String,
    pub destination: String,
    pub alternate: Option<String>,
    pub pilot: Option<String>,
    pub instructor: Option<String>,
    pub mission: Option<String>,
    pub sortie: String,
    pub true_airspeed_kts: u32,
    /// Positive for a tailwind.
    pub wind_component_kts: i32,
}

impl BriefRequest {
    /// A request with default sortie and speed. Identifiers are upper-cased.
    pub fn new(departure: &str, destination: &str) -> Self {
        Self {
            departure: departure.trim().to_uppercase(),
            destination: destination.trim().to_uppercase(),
            alternate: None,
            pilot: None,
            instructor: None,
            mission: None,
            sortie: DEFAULT_SORTIE.to_string(),
            true_airspeed_kts: DEFAULT_TRUE_AIRSPEED_KTS,
            wind_component_kts: 0,
        }
    }

    pub fn with_alternate(mut self, alternate: Option<&str>) -> Self {
        self.alternate = alternate
            .map(|a| a.trim().to_uppercase())
            .filter(|a| !a.is_empty());
        self
    }
}

/// Great-circle leg estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightEstimate {
    pub distance_nm: f64,
    pub minutes: u32,
}

impl FlightEstimate {
    /// `H+MM`.
    pub fn duration(&self) -> String {
        format!("{}+{:02}", self.minutes / 60, self.minutes % 60)
    }
}

/// Distance between two airports and the time to fly it at `tas + wind`.
/// `None` when the ground speed is not positive.
pub fn estimate(
    from: &AirportRecord,
    to: &AirportRecord,
    true_airspeed_kts: u32,
    wind_component_kts: i32,
) -> Option<FlightEstimate> {
    let groundspeed = i64::from(true_airspeed_kts) + i64::from(wind_component_kts);
    if groundspeed <= 0 {
        return None;
    }
    let distance_nm = great_circle_nm(from.latitude, from.longitude, to.latitude, to.longitude);
    let minutes = (distance_nm / groundspeed as f64 * 60.0).floor() as u32;
    Some(FlightEstimate {
        distance_nm,
        minutes,
    })
}

fn great_circle_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_NM * a.sqrt().min(1.0).asin()
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the full sheet.
pub fn render(
    records: &BTreeMap<String, AirportRecord>,
    request: &BriefRequest,
    generated: NaiveDateTime,
) -> String {
    let rule = "=".repeat(WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "{:^WIDTH$}", "T-38 MISSION BRIEFING SHEET");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Generated: {}L", generated.format("%d %b %Y %H%M"));
    let _ = writeln!(out, "Mission Type: {}", request.sortie);
    for (label, value) in [
        ("Mission #", &request.mission),
        ("Pilot", &request.pilot),
        ("Instructor", &request.instructor),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            let _ = writeln!(out, "{label}: {value}");
        }
    }
    let _ = writeln!(out, "{rule}");

    let _ = writeln!(out, "\nFLIGHT ROUTE:");
    let _ = writeln!(out, "  Departure: {}", request.departure);
    let _ = writeln!(out, "  Destination: {}", request.destination);
    if let Some(alt) = &request.alternate {
        let _ = writeln!(out, "  Alternate: {alt}");
    }
    let _ = writeln!(out);
    out.push_str(&route_estimate(records, request));

    out.push_str(&airfield_block(records, &request.departure));
    out.push_str(&airfield_block(records, &request.destination));
    if let Some(alt) = &request.alternate {
        out.push_str(&airfield_block(records, alt));
    }

    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "BRIEFING COMPLETE - Verify all NOTAMs and weather prior to flight");
    let _ = writeln!(out, "{rule}");
    out
}

fn route_estimate(records: &BTreeMap<String, AirportRecord>, request: &BriefRequest) -> String {
    let leg = records
        .get(&request.departure)
        .zip(records.get(&request.destination))
        .and_then(|(from, to)| {
            estimate(from, to, request.true_airspeed_kts, request.wind_component_kts)
        });
    match leg {
        Some(leg) => format!(
            "Estimated Distance: {:.0} NM\nEstimated Flight Time: {} (assuming {} kts TAS, {:+} kt wind component)\n",
            leg.distance_nm,
            leg.duration(),
            request.true_airspeed_kts,
            request.wind_component_kts,
        ),
        None => "Time calculation unavailable - missing coordinates\n".to_string(),
    }
}

/// Block for one airfield, or a one-line notice when it is not in the set.
pub fn airfield_block(records: &BTreeMap<String, AirportRecord>, icao: &str) -> String {
    let Some(record) = records.get(icao) else {
        return format!("*** {icao} - DATA NOT AVAILABLE ***\n");
    };

    let rule = "=".repeat(WIDTH);
    let name = if record.name.is_empty() { "Unknown" } else { record.name.as_str() };
    let mut out = String::new();

    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "AIRFIELD: {icao} - {name}");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "COORDINATES: {:.4}, {:.4}", record.latitude, record.longitude);
    let _ = writeln!(out, "LONGEST RUNWAY: {} ft", record.longest);
    let _ = writeln!(
        out,
        "AIR START CART (JASU): {}",
        if record.equipment { "AVAILABLE" } else { "NOT LISTED - COORDINATE WITH FBO" }
    );
    let _ = writeln!(
        out,
        "FUEL: {}",
        if record.fuel { "CONTRACT FUEL AVAILABLE" } else { "Commercial Fuel" }
    );

    if let Some(landing) = &record.last_landed {
        let date = landing
            .date
            .map(|d| d.format("%m/%d/%Y").to_string())
            .unwrap_or_else(|| "date unknown".to_string());
        let crew = [landing.front_seat.as_str(), landing.back_seat.as_str()]
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        if crew.is_empty() {
            let _ = writeln!(out, "RECENT T-38 OPS: {date}");
        } else {
            let _ = writeln!(out, "RECENT T-38 OPS: {date} ({crew})");
        }
    }

    if let Some(category) = record.category {
        let _ = writeln!(out, "\nWARNING: {}", category_warning(category));
    }

    if let Some(comment) = record.comment.as_ref().filter(|c| !c.text.trim().is_empty()) {
        let _ = writeln!(out, "\nNOTES:");
        for line in wrap_text(&comment.text, NOTE_WIDTH - 2) {
            let _ = writeln!(out, "  {line}");
        }
    }
    out
}

fn category_warning(category: Category) -> &'static str {
    match category {
        Category::TierOne => "*** CATEGORY 1 - T-38 OPS PROHIBITED ***",
        Category::TierTwo => "*** CATEGORY 2 - EXTRA PLANNING REQUIRED ***",
        Category::TierThree => "*** CATEGORY 3 - COORDINATION REQUIRED ***",
    }
}

/// Greedy word wrap. Words longer than `max_chars` get a line of their own.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + word.len() + 1 > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// `MissionBrief_<DEP>_<DEST>_<YYYYmmdd_HHMM>.txt`
pub fn file_name(request: &BriefRequest, generated: NaiveDateTime) -> String {
    format!(
        "MissionBrief_{}_{}_{}.txt",
        request.departure,
        request.destination,
        generated.format("%Y%m%d_%H%M")
    )
}

/// Render the sheet and write it into `dir`.
#[instrument(skip_all, fields(dep = %request.departure, dest = %request.destination))]
pub fn write_brief(
    dir: &Path,
    records: &BTreeMap<String, AirportRecord>,
    request: &BriefRequest,
    generated: NaiveDateTime,
) -> Result<(OutputFile, String)> {
    std::fs::create_dir_all(dir).map_err(|e| PlanAidError::io(dir, e))?;
    let text = render(records, request, generated);
    let file = write_atomic(dir, &file_name(request, generated), text.as_bytes())?;
    info!(file = %file.filename, "mission brief written");
    Ok((file, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::fusion::RunwayPair;
    use crate::reference::{CommentRecord, LandingRecord};

    fn record(icao: &str, latitude: f64, longitude: f64) -> AirportRecord {
        AirportRecord {
            icao: icao.into(),
            local_id: icao[1..].into(),
            name: format!("{} FIELD", &icao[1..]),
            latitude,
            longitude,
            longest: 8000,
            runways: vec![RunwayPair { runway_id: "17/35".into(), first: 8000, second: Some(8000) }],
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

    fn records() -> BTreeMap<String, AirportRecord> {
        let mut dep = record("KRND", 29.5295, -98.2789);
        dep.equipment = true;
        dep.last_landed = Some(LandingRecord {
            date: NaiveDate::from_ymd_opt(2025, 5, 9),
            front_seat: "AB".into(),
            back_seat: "CD".into(),
        });
        let mut dest = record("KPNS", 30.4734, -87.1866);
        dest.fuel = false;
        dest.category = Some(Category::TierTwo);
        dest.comment = Some(CommentRecord {
            date: None,
            text: "Transient ramp is limited to four aircraft after 1800L. Call base ops \
                   one hour prior to arrival for parking and expect a short wait for the fuel truck."
                .into(),
        });
        BTreeMap::from([("KRND".to_string(), dep), ("KPNS".to_string(), dest)])
    }

    fn generated() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 12)
            .and_then(|d| d.and_hms_opt(7, 30, 0))
            .expect("datetime")
    }

    #[test]
    fn airfield_block_lists_record_details() {
        let block = airfield_block(&records(), "KRND");
        assert!(block.contains("AIRFIELD: KRND - RND FIELD"));
        assert!(block.contains("COORDINATES: 29.5295, -98.2789"));
        assert!(block.contains("LONGEST RUNWAY: 8000 ft"));
        assert!(block.contains("AIR START CART (JASU): AVAILABLE"));
        assert!(block.contains("FUEL: CONTRACT FUEL AVAILABLE"));
        assert!(block.contains("RECENT T-38 OPS: 05/09/2025 (AB/CD)"));
        assert!(!block.contains("WARNING"));
        assert!(!block.contains("NOTES"));
    }

    #[test]
    fn category_warning_and_wrapped_notes() {
        let block = airfield_block(&records(), "KPNS");
        assert!(block.contains("AIR START CART (JASU): NOT LISTED - COORDINATE WITH FBO"));
        assert!(block.contains("FUEL: Commercial Fuel"));
        assert!(block.contains("\nWARNING: *** CATEGORY 2 - EXTRA PLANNING REQUIRED ***\n"));

        let notes: Vec<&str> = block
            .lines()
            .skip_while(|l| *l != "NOTES:")
            .skip(1)
            .collect();
        assert!(notes.len() > 1);
        assert!(notes.iter().all(|l| l.starts_with("  ") && l.len() <= NOTE_WIDTH));
        assert!(notes[0].starts_with("  Transient ramp"));
    }

    #[test]
    fn missing_airfield_is_flagged() {
        assert_eq!(
            airfield_block(&records(), "KZZZ"),
            "*** KZZZ - DATA NOT AVAILABLE ***\n"
        );
    }

    #[test]
    fn time_math_uses_ground_speed() {
        let from = record("KAAA", 30.0, -90.0);
        let to = record("KBBB", 31.0, -90.0);

        let leg = estimate(&from, &to, 360, 0).expect("leg");
        assert!((leg.distance_nm - 60.04).abs() < 0.1);
        assert_eq!(leg.minutes, 10);
        assert_eq!(leg.duration(), "0+10");

        let long = estimate(&from, &record("KCCC", 30.0, -80.0), 300, -60).expect("leg");
        // ~519 NM at 240 kts
        assert_eq!(long.duration(), "2+09");

        assert_eq!(estimate(&from, &to, 100, -100), None);
    }

    #[test]
    fn full_sheet_layout() {
        let mut request = BriefRequest::new("krnd", " kpns ").with_alternate(Some("kzzz"));
        request.pilot = Some("Lt Smith".into());
        request.mission = Some(String::new());

        let sheet = render(&records(), &request, generated());

        assert!(sheet.contains("T-38 MISSION BRIEFING SHEET"));
        assert!(sheet.contains("Generated: 12 May 2025 0730L"));
        assert!(sheet.contains("Mission Type: Cross-Country Training"));
        assert!(sheet.contains("Pilot: Lt Smith"));
        assert!(!sheet.contains("Mission #"));
        assert!(!sheet.contains("Instructor"));
        assert!(sheet.contains("  Alternate: KZZZ"));
        assert!(sheet.contains("Estimated Distance: "));
        assert!(sheet.contains("(assuming 350 kts TAS, +0 kt wind component)"));

        let dep = sheet.find("AIRFIELD: KRND").expect("dep block");
        let dest = sheet.find("AIRFIELD: KPNS").expect("dest block");
        let alt = sheet.find("*** KZZZ - DATA NOT AVAILABLE ***").expect("alt notice");
        assert!(dep < dest && dest < alt);
        assert!(sheet.trim_end().ends_with(&"=".repeat(WIDTH)));
        assert!(sheet.contains("BRIEFING COMPLETE - Verify all NOTAMs and weather prior to flight"));
    }

    #[test]
    fn estimate_unavailable_without_both_ends() {
        let request = BriefRequest::new("KRND", "KZZZ");
        let sheet = render(&records(), &request, generated());
        assert!(sheet.contains("Time calculation unavailable - missing coordinates"));
    }

    #[test]
    fn writes_named_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let request = BriefRequest::new("KRND", "KPNS");

        let (file, text) = write_brief(dir.path(), &records(), &request, generated()).expect("write");

        assert_eq!(file.filename, "MissionBrief_KRND_KPNS_20250512_0730.txt");
        let on_disk = std::fs::read_to_string(dir.path().join(&file.filename)).expect("read");
        assert_eq!(on_disk, text);
        assert_eq!(file.size_bytes, text.len());
    }
}
