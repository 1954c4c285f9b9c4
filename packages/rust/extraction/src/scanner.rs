//! Proximity heuristic that ties ground-equipment entries to airport identifiers.
//!
//! A chart-supplement page lists an airport header like `( KXYZ )` followed by
//! its services. When the page carries the marker token (e.g. `JASU`) and the
//! marker line or the line after it names a recognised equipment model, the
//! equipment belongs to the nearest identifier line above the marker.

use regex::Regex;

use planaid_shared::{ExtractionConfig, PlanAidError, Result};

/// Scans page text for identifier → equipment associations.
#[derive(Debug, Clone)]
pub struct EquipmentScanner {
    identifier: Regex,
    marker: String,
    codes: Vec<String>,
}

impl EquipmentScanner {
    /// Build a scanner from the extraction settings.
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let prefixes = config
            .identifier_prefixes
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"\(\s*({prefixes})\s*(\w{{3,4}})\s*\)");
        let identifier = Regex::new(&pattern).map_err(|e| {
            PlanAidError::config(format!("invalid identifier pattern {pattern}: {e}"))
        })?;

        Ok(Self {
            identifier,
            marker: config.marker_token.clone(),
            codes: config.equipment_codes.clone(),
        })
    }

    /// Identifier on a single line, if any (first match).
    pub fn identifier_in(&self, line: &str) -> Option<String> {
        self.identifier
            .captures(line)
            .map(|caps| format!("{}{}", &caps[1], &caps[2]))
    }

    /// Scan one page. Returns at most one identifier.
    pub fn scan_page(&self, text: &str) -> Vec<String> {
        let lines: Vec<&str> = text.lines().collect();

        let mut last_identifier: Option<usize> = None;
        for (idx, line) in lines.iter().enumerate() {
            if line.contains(&self.marker) {
                let next = lines.get(idx + 1).copied().unwrap_or("");
                if !self.has_equipment(line) && !self.has_equipment(next) {
                    return Vec::new();
                }
                return last_identifier
                    .and_then(|i| self.identifier_in(lines[i]))
                    .into_iter()
                    .collect();
            }
            if self.identifier.is_match(line) {
                last_identifier = Some(idx);
            }
        }

        Vec::new()
    }

    fn has_equipment(&self, line: &str) -> bool {
        self.codes.iter().any(|code| line.contains(code.as_str()))
    }
}
