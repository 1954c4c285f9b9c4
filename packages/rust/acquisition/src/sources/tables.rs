//! Airport/runway registry deployment: pick the three tables out of an edition.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;
use walkdir::WalkDir;

use planaid_shared::{PlanAidError, Result};

/// Tables copied into the working `apt_data` folder.
pub const REGISTRY_TABLES: [&str; 3] = ["APT_BASE.csv", "APT_RWY.csv", "APT_RWY_END.csv"];

/// Locate `name` under `root` (case-insensitive). When several copies exist,
/// the most recently modified wins.
pub fn find_table(root: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .max_by_key(|e| {
            e.metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        })
        .map(|e| e.into_path())
}

/// Copy every registry table from `artifact` into `dest_dir`.
pub fn deploy_tables(artifact: &Path, dest_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_dir).map_err(|e| PlanAidError::io(dest_dir, e))?;

    for name in REGISTRY_TABLES {
        let src = find_table(artifact, name).ok_or_else(|| {
            PlanAidError::validation(format!("{name} not found under {}", artifact.display()))
        })?;
        let dst = dest_dir.join(name);
        std::fs::copy(&src, &dst).map_err(|e| PlanAidError::io(&src, e))?;
        debug!(src = %src.display(), dst = %dst.display(), "table deployed");
    }
    Ok(())
}
