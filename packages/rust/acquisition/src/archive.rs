//! Zip extraction for edition archives.
//!
//! Registry editions wrap their CSV tables in an inner zip; supplement
//! editions ship the volumes alongside XML schemas nobody here reads.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use planaid_shared::{PlanAidError, Result};

/// Path fragments of members that are never extracted.
const SKIPPED_FRAGMENTS: [&str; 3] = ["AIXM", "SAA-AIXM", "Schema"];

/// Inner archives are unpacked at most this deep.
const MAX_NESTING: usize = 3;

fn is_skipped(name: &str) -> bool {
    SKIPPED_FRAGMENTS.iter().any(|f| name.contains(f))
        || name.to_ascii_lowercase().ends_with(".xsd")
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

/// Extract `archive` into `dest`, then unpack any inner `.zip` into a sibling
/// directory named after it (`a/b/inner.zip` → `a/b/inner/`). Returns the
/// number of files written.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<usize> {
    let mut written = extract_one(archive, dest)?;

    for _ in 0..MAX_NESTING {
        let inner: Vec<PathBuf> = WalkDir::new(dest)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_zip(e.path()))
            .map(|e| e.into_path())
            .collect();
        if inner.is_empty() {
            break;
        }

        for nested in inner {
            let target = nested.with_extension("");
            match extract_one(&nested, &target) {
                Ok(n) => written += n,
                Err(e) => warn!(archive = %nested.display(), error = %e, "inner archive skipped"),
            }
            std::fs::remove_file(&nested).map_err(|e| PlanAidError::io(&nested, e))?;
        }
    }

    Ok(written)
}

fn extract_one(archive: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive).map_err(|e| PlanAidError::io(archive, e))?;
    let mut zip = ZipArchive::new(file)
        .map_err(|e| PlanAidError::Archive(format!("{}: {e}", archive.display())))?;
    std::fs::create_dir_all(dest).map_err(|e| PlanAidError::io(dest, e))?;

    let mut written = 0;
    for i in 0..zip.len() {
        let mut member = zip
            .by_index(i)
            .map_err(|e| PlanAidError::Archive(format!("{}: {e}", archive.display())))?;

        let name = member.name().to_string();
        if is_skipped(&name) {
            debug!(member = %name, "skipping schema member");
            continue;
        }
        let Some(relative) = member.enclosed_name() else {
            warn!(member = %name, "skipping member with unsafe path");
            continue;
        };

        let out_path = dest.join(relative);
        if member.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| PlanAidError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PlanAidError::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| PlanAidError::io(&out_path, e))?;
        std::io::copy(&mut member, &mut out).map_err(|e| PlanAidError::io(&out_path, e))?;
        written += 1;
    }

    debug!(archive = %archive.display(), files = written, "archive extracted");
    Ok(written)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build a zip in memory from `(name, bytes)` pairs.
    pub(crate) fn zip_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            for (name, bytes) in members {
                writer
                    .start_file(*name, SimpleFileOptions::default())
                    .expect("start file");
                writer.write_all(bytes).expect("write member");
            }
            writer.finish().expect("finish");
        }
        buf.into_inner()
    }

    #[test]
    fn skips_schema_members() {
        assert!(is_skipped("AIXM/apt.xml"));
        assert!(is_skipped("SAA-AIXM_5_Schema/x.xml"));
        assert!(is_skipped("Schema/readme.txt"));
        assert!(is_skipped("layout/APT.XSD"));
        assert!(!is_skipped("CSV_Data/APT_BASE.csv"));
    }

    #[test]
    fn extracts_nested_archives() {
        let dir = tempfile::tempdir().expect("tempdir");
        let inner = zip_bytes(&[
            ("APT_BASE.csv", b"ICAO_ID\n"),
            ("APT_RWY.csv", b"ARPT_ID\n"),
        ]);
        let outer = zip_bytes(&[
            ("CSV_Data/23_Jan_2025_CSV.zip", &inner),
            ("AIXM/airports.xml", b"<x/>"),
            ("README.txt", b"hello"),
        ]);
        let archive = dir.path().join("edition.zip");
        std::fs::write(&archive, outer).expect("write");

        let dest = dir.path().join("out");
        let written = extract_archive(&archive, &dest).expect("extract");

        assert_eq!(written, 4);
        assert!(dest.join("README.txt").is_file());
        assert!(dest.join("CSV_Data/23_Jan_2025_CSV/APT_BASE.csv").is_file());
        assert!(dest.join("CSV_Data/23_Jan_2025_CSV/APT_RWY.csv").is_file());
        assert!(!dest.join("CSV_Data/23_Jan_2025_CSV.zip").exists());
        assert!(!dest.join("AIXM").exists());
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = dir.path().join("edition.zip");
        std::fs::write(&archive, b"definitely not a zip").expect("write");

        let err = extract_archive(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, PlanAidError::Archive(_)));
    }
}
