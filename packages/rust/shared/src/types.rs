//! Core domain types shared across PlanAid crates.

use serde::{Deserialize, Serialize};

/// Current schema version of the cache registry document.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// SourceName
// ---------------------------------------------------------------------------

/// One of the five acquisition sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceName {
    /// Airport/runway registry (28-day cycle).
    Nasr,
    /// Chart supplement document corpus (56-day cycle).
    Dcs,
    /// Flight-log history.
    Flights,
    /// Fuel contract list.
    Fuel,
    /// Reviewer comment feed.
    Comments,
}

impl SourceName {
    /// Every source, in registry order.
    pub const ALL: [SourceName; 5] = [
        SourceName::Nasr,
        SourceName::Dcs,
        SourceName::Flights,
        SourceName::Fuel,
        SourceName::Comments,
    ];

    /// Stable key used in the registry document and cache folder names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nasr => "nasr",
            Self::Dcs => "dcs",
            Self::Flights => "flights",
            Self::Fuel => "fuel",
            Self::Comments => "comments",
        }
    }

    /// Sources that publish a remote edition date.
    pub fn is_cycle_tracked(self) -> bool {
        matches!(self, Self::Nasr | Self::Dcs)
    }

    /// Small sources run concurrently ahead of the large ones.
    pub fn is_small(self) -> bool {
        !self.is_cycle_tracked()
    }
}

impl std::fmt::Display for SourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nasr" => Ok(Self::Nasr),
            "dcs" => Ok(Self::Dcs),
            "flights" => Ok(Self::Flights),
            "fuel" => Ok(Self::Fuel),
            "comments" => Ok(Self::Comments),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Edition
// ---------------------------------------------------------------------------

/// A published remote edition: its date and the archive to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edition {
    /// Edition date, `YYYY-MM-DD`.
    pub date: String,
    /// Download URL of the edition's archive.
    pub url: String,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Per-run outcome of one source, as reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOutcome {
    /// Downloaded this run.
    Fresh,
    /// Reused a cached artifact.
    Cached,
    /// Neither downloaded nor reusable.
    Unavailable,
}

impl std::fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Fresh => "fresh",
            Self::Cached => "cached",
            Self::Unavailable => "unavailable",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_name_roundtrip() {
        for name in SourceName::ALL {
            let parsed: SourceName = name.as_str().parse().expect("parse");
            assert_eq!(parsed, name);
        }
        assert!("weather".parse::<SourceName>().is_err());
    }

    #[test]
    fn cycle_tracked_split() {
        let small: Vec<_> = SourceName::ALL.into_iter().filter(|s| s.is_small()).collect();
        assert_eq!(
            small,
            vec![SourceName::Flights, SourceName::Fuel, SourceName::Comments]
        );
        assert!(SourceName::Nasr.is_cycle_tracked());
        assert!(SourceName::Dcs.is_cycle_tracked());
    }

    #[test]
    fn source_name_serializes_lowercase() {
        let json = serde_json::to_string(&SourceName::Dcs).expect("serialize");
        assert_eq!(json, "\"dcs\"");
        let outcome = serde_json::to_string(&SourceOutcome::Unavailable).expect("serialize");
        assert_eq!(outcome, "\"unavailable\"");
    }
}
