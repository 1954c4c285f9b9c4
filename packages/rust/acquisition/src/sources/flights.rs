//! Flight-log history: keep the latest landing per airport inside the window.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use planaid_shared::{PlanAidError, Result};

/// File name of the flight history inside the cache location and the data folder.
pub const FLIGHTS_FILE: &str = "flights_data.csv";

/// One entry of the flight-log API.
#[derive(Debug, Clone, Deserialize)]
pub struct FlightEntry {
    #[serde(rename = "Airport", default)]
    pub airport: Option<String>,
    #[serde(rename = "FlightDate", default)]
    pub flight_date: Option<String>,
    /// Crew initials, `"front,back"`. Not always a string.
    #[serde(rename = "ABVs", default)]
    pub abvs: Option<serde_json::Value>,
}

/// Most recent landing at one airport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landing {
    pub icao: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub front_seat: String,
    pub back_seat: String,
}

/// Reduce raw entries to one landing per airport, dropping those before `cutoff`.
/// The result is sorted newest first, ties by identifier.
pub fn latest_landings(entries: &[FlightEntry], cutoff: NaiveDate) -> Vec<Landing> {
    let cutoff = cutoff.format("%Y-%m-%d").to_string();
    let mut latest: HashMap<String, Landing> = HashMap::new();

    for entry in entries {
        let icao = entry.airport.as_deref().unwrap_or("").trim();
        if icao.is_empty() {
            continue;
        }
        let date: String = entry
            .flight_date
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(10)
            .collect();
        if date.len() < 10 || date < cutoff {
            continue;
        }

        let (front_seat, back_seat) = match &entry.abvs {
            Some(serde_json::Value::String(abvs)) => {
                let mut crew = abvs.trim().split(',').map(str::trim);
                (
                    crew.next().unwrap_or("").to_string(),
                    crew.next().unwrap_or("").to_string(),
                )
            }
            _ => (String::new(), String::new()),
        };

        let newer = latest.get(icao).is_none_or(|seen| date > seen.date);
        if newer {
            latest.insert(
                icao.to_string(),
                Landing {
                    icao: icao.to_string(),
                    date,
                    front_seat,
                    back_seat,
                },
            );
        }
    }

    let mut landings: Vec<Landing> = latest.into_values().collect();
    landings.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.icao.cmp(&b.icao)));
    landings
}

/// Write `ICAO,DATE_LANDED,FRONT_SEAT,BACK_SEAT`.
pub fn write_landings(path: &Path, landings: &[Landing]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| PlanAidError::parse(format!("{}: {e}", path.display())))?;
    writer
        .write_record(["ICAO", "DATE_LANDED", "FRONT_SEAT", "BACK_SEAT"])
        .map_err(|e| PlanAidError::parse(e.to_string()))?;
    for l in landings {
        writer
            .write_record([&l.icao, &l.date, &l.front_seat, &l.back_seat])
            .map_err(|e| PlanAidError::parse(e.to_string()))?;
    }
    writer.flush().map_err(|e| PlanAidError::io(path, e))
}
