//! The cache registry document: the only memory carried between runs.
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "sources": {
//!     "nasr": { "success": true, "timestamp": "...", "downloaded_cycle_date": "2025-01-23",
//!               "download_location": "data/cache/nasr/2025-01-23" }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use planaid_shared::{CURRENT_SCHEMA_VERSION, PlanAidError, Result, SourceName};

use crate::state::SourceState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub schema_version: u32,
    pub sources: BTreeMap<SourceName, SourceState>,
}

impl Default for RegistryDocument {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            sources: BTreeMap::new(),
        }
    }
}

impl RegistryDocument {
    /// Load the registry. A missing or unparsable document yields an empty
    /// registry; malformed or unknown entries are dropped individually.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cache registry yet");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache registry unreadable, starting empty");
                return Self::default();
            }
        };
        Self::parse(&content)
    }

    /// Parse registry text with the same tolerance as [`RegistryDocument::load`].
    pub fn parse(content: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "cache registry corrupt, starting empty");
                return Self::default();
            }
        };

        let Some(entries) = value.get("sources").and_then(|s| s.as_object()) else {
            warn!("cache registry has no sources table, starting empty");
            return Self::default();
        };

        if let Some(version) = value.get("schema_version").and_then(|v| v.as_u64()) {
            if version != u64::from(CURRENT_SCHEMA_VERSION) {
                warn!(version, expected = CURRENT_SCHEMA_VERSION, "cache registry schema differs");
            }
        }

        let mut sources = BTreeMap::new();
        for (key, entry) in entries {
            let Ok(name) = key.parse::<SourceName>() else {
                debug!(source = %key, "dropping unknown source from registry");
                continue;
            };
            match serde_json::from_value::<SourceState>(entry.clone()) {
                Ok(state) => {
                    sources.insert(name, state);
                }
                Err(e) => warn!(source = %key, error = %e, "dropping malformed registry entry"),
            }
        }

        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            sources,
        }
    }

    /// Write the document atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PlanAidError::io(parent, e))?;
        }
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| PlanAidError::Cache(format!("failed to serialize registry: {e}")))?;
        json.push('\n');

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| PlanAidError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| PlanAidError::io(path, e))?;
        Ok(())
    }
}
