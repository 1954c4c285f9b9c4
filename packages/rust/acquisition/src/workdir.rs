//! Working-directory preparation before an acquisition run.

use tracing::{debug, instrument};

use planaid_shared::{PlanAidError, Result, WorkLayout};

/// Remove everything in the data folder except the cache folder and the
/// registry document, then recreate the layout.
#[instrument(skip_all, fields(data_dir = %layout.data_dir.display()))]
pub fn prepare_data_dir(layout: &WorkLayout) -> Result<()> {
    if layout.data_dir.is_dir() {
        let entries =
            std::fs::read_dir(&layout.data_dir).map_err(|e| PlanAidError::io(&layout.data_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| PlanAidError::io(&layout.data_dir, e))?;
            let path = entry.path();
            if path == layout.cache_dir || path == layout.registry_file {
                continue;
            }
            let removed = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            removed.map_err(|e| PlanAidError::io(&path, e))?;
            debug!(path = %path.display(), "removed stale working file");
        }
    }
    layout.ensure_dirs()
}

/// Remove the cache folder and registry document.
pub fn clear_cache(layout: &WorkLayout) -> Result<()> {
    if layout.cache_dir.exists() {
        std::fs::remove_dir_all(&layout.cache_dir)
            .map_err(|e| PlanAidError::io(&layout.cache_dir, e))?;
    }
    if layout.registry_file.exists() {
        std::fs::remove_file(&layout.registry_file)
            .map_err(|e| PlanAidError::io(&layout.registry_file, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_cache_and_registry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = WorkLayout::new(dir.path(), "review_list.csv");
        layout.ensure_dirs().expect("dirs");

        std::fs::write(layout.fuel_file(), "old").expect("write");
        std::fs::write(layout.apt_data_dir.join("APT_BASE.csv"), "old").expect("write");
        std::fs::create_dir_all(layout.cache_dir.join("nasr/2025-01-23")).expect("mkdir");
        std::fs::write(&layout.registry_file, "{}").expect("write");

        prepare_data_dir(&layout).expect("prepare");

        assert!(!layout.fuel_file().exists());
        assert!(!layout.apt_data_dir.join("APT_BASE.csv").exists());
        assert!(layout.apt_data_dir.is_dir());
        assert!(layout.cache_dir.join("nasr/2025-01-23").is_dir());
        assert!(layout.registry_file.is_file());
    }

    #[test]
    fn clear_removes_cache_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = WorkLayout::new(dir.path(), "review_list.csv");
        layout.ensure_dirs().expect("dirs");
        std::fs::write(&layout.registry_file, "{}").expect("write");

        clear_cache(&layout).expect("clear");
        assert!(!layout.cache_dir.exists());
        assert!(!layout.registry_file.exists());
        // Clearing twice is fine.
        clear_cache(&layout).expect("clear again");
    }
}
