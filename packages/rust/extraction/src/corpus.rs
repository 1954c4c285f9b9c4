//! Parallel scan of a chart-supplement corpus and the identifier-list cache.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use planaid_shared::{
    ExtractionConfig, PlanAidError, ProgressPhase, ProgressSink, Result, SourceName, percent_of,
};

use crate::reader::reader_for;
use crate::scanner::EquipmentScanner;

/// Name of the identifier list cached inside an edition location.
pub const EQUIPMENT_LIST_FILE: &str = "equipment_list.csv";

/// Header of every identifier list.
const LIST_HEADER: &str = "ICAO";

/// Regional supplement volumes, e.g. `CS_NE_20250220.pdf`.
static VOLUME_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CS_[A-Z]{2}_\d{8}\.pdf$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Corpus selection
// ---------------------------------------------------------------------------

/// Pick the documents to scan under `root`.
///
/// Regional volumes are preferred. Without any, every `.pdf` and `.txt`
/// page dump is scanned. The result is sorted.
pub fn select_documents(root: &Path) -> Vec<PathBuf> {
    let candidates: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| reader_for(p).is_some())
        .collect();

    let volumes: Vec<PathBuf> = candidates
        .iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| VOLUME_NAME_RE.is_match(n))
        })
        .cloned()
        .collect();

    let mut selected = if volumes.is_empty() {
        candidates
    } else {
        volumes
    };
    selected.sort();
    selected
}

// ---------------------------------------------------------------------------
// Parallel scan
// ---------------------------------------------------------------------------

/// Scan every document on a bounded pool and merge the identifiers found.
///
/// A document that cannot be opened or parsed contributes nothing.
#[instrument(skip_all, fields(documents = documents.len()))]
pub async fn scan_documents(
    documents: Vec<PathBuf>,
    scanner: Arc<EquipmentScanner>,
    max_workers: usize,
    progress: &dyn ProgressSink,
) -> BTreeSet<String> {
    let found = Arc::new(Mutex::new(BTreeSet::<String>::new()));
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let total = documents.len() as u64;

    let mut handles = Vec::with_capacity(documents.len());
    for path in documents {
        let sem = semaphore.clone();
        let scanner = scanner.clone();
        let found = found.clone();

        handles.push(tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };
            let shown = path.display().to_string();
            let result = tokio::task::spawn_blocking(move || scan_document(&path, &scanner)).await;

            match result {
                Ok(Ok(ids)) => {
                    debug!(document = %shown, found = ids.len(), "document scanned");
                    if let Ok(mut set) = found.lock() {
                        set.extend(ids);
                    }
                }
                Ok(Err(e)) => warn!(document = %shown, error = %e, "skipping unreadable document"),
                Err(e) => warn!(document = %shown, error = %e, "document parser aborted"),
            }
        }));
    }

    let mut done = 0u64;
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "scan task failed");
        }
        done += 1;
        progress.emit(SourceName::Dcs.as_str(), ProgressPhase::Scanning, percent_of(done, Some(total)));
    }

    let set = match Arc::try_unwrap(found) {
        Ok(mutex) => mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()),
        Err(shared) => shared
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone()),
    };
    info!(identifiers = set.len(), "corpus scan complete");
    set
}

fn scan_document(path: &Path, scanner: &EquipmentScanner) -> Result<Vec<String>> {
    let reader = reader_for(path)
        .ok_or_else(|| PlanAidError::Extraction(format!("no reader for {}", path.display())))?;
    let pages = reader.read_pages(path)?;
    Ok(pages.iter().flat_map(|page| scanner.scan_page(page)).collect())
}

// ---------------------------------------------------------------------------
// Identifier list
// ---------------------------------------------------------------------------

/// Write a sorted identifier list with an `ICAO` header (temp file + rename).
pub fn write_identifier_list(path: &Path, identifiers: &BTreeSet<String>) -> Result<()> {
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp)
            .map_err(|e| PlanAidError::Extraction(format!("{}: {e}", tmp.display())))?;
        writer
            .write_record([LIST_HEADER])
            .map_err(|e| PlanAidError::Extraction(e.to_string()))?;
        for id in identifiers {
            writer
                .write_record([id])
                .map_err(|e| PlanAidError::Extraction(e.to_string()))?;
        }
        writer.flush().map_err(|e| PlanAidError::io(&tmp, e))?;
    }
    std::fs::rename(&tmp, path).map_err(|e| PlanAidError::io(path, e))?;
    Ok(())
}

/// Read an identifier list written by [`write_identifier_list`] (or any CSV
/// with an `ICAO` column).
pub fn read_identifier_list(path: &Path) -> Result<BTreeSet<String>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| PlanAidError::parse(format!("{}: {e}", path.display())))?;
    let headers = reader
        .headers()
        .map_err(|e| PlanAidError::parse(format!("{}: {e}", path.display())))?;
    let column = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(LIST_HEADER))
        .ok_or_else(|| {
            PlanAidError::parse(format!("{} has no {LIST_HEADER} column", path.display()))
        })?;

    let mut identifiers = BTreeSet::new();
    for record in reader.records() {
        let record = record.map_err(|e| PlanAidError::parse(e.to_string()))?;
        if let Some(id) = record.get(column).map(str::trim).filter(|id| !id.is_empty()) {
            identifiers.insert(id.to_string());
        }
    }
    Ok(identifiers)
}

// ---------------------------------------------------------------------------
// Edition-level entry point
// ---------------------------------------------------------------------------

/// Produce the equipment identifier list for one edition location.
///
/// Reuses `<edition_dir>/equipment_list.csv` when present; otherwise scans the
/// corpus and caches the result there.
#[instrument(skip_all, fields(edition_dir = %edition_dir.display()))]
pub async fn equipment_for_edition(
    edition_dir: &Path,
    config: &ExtractionConfig,
    progress: &dyn ProgressSink,
) -> Result<BTreeSet<String>> {
    let cached = edition_dir.join(EQUIPMENT_LIST_FILE);
    if cached.is_file() {
        match read_identifier_list(&cached) {
            Ok(ids) => {
                info!(identifiers = ids.len(), "reusing cached equipment list");
                return Ok(ids);
            }
            Err(e) => warn!(error = %e, "cached equipment list unreadable, rescanning"),
        }
    }

    let documents = select_documents(edition_dir);
    if documents.is_empty() {
        return Err(PlanAidError::Extraction(format!(
            "no supplement documents under {}",
            edition_dir.display()
        )));
    }

    let scanner = Arc::new(EquipmentScanner::new(config)?);
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(config.max_workers);
    let identifiers = scan_documents(documents, scanner, workers, progress).await;

    write_identifier_list(&cached, &identifiers)?;
    Ok(identifiers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use planaid_shared::SilentProgress;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(&path, content).expect("write");
        path
    }

    #[test]
    fn regional_volumes_preferred() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "CS_NE_20250220.pdf", "");
        write(dir.path(), "nested/CS_SW_20250220.pdf", "");
        write(dir.path(), "legend.pdf", "");
        write(dir.path(), "notes.txt", "");

        let selected = select_documents(dir.path());
        let names: Vec<_> = selected
            .iter()
            .filter_map(|p| p.file_name()?.to_str().map(String::from))
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"CS_NE_20250220.pdf".to_string()));
        assert!(names.contains(&"CS_SW_20250220.pdf".to_string()));
    }

    #[test]
    fn falls_back_to_all_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "legend.pdf", "");
        write(dir.path(), "pages.txt", "");
        write(dir.path(), "schema.xsd", "");

        assert_eq!(select_documents(dir.path()).len(), 2);
    }

    #[test]
    fn identifier_list_roundtrip_is_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("list.csv");
        let ids: BTreeSet<String> = ["KZZZ", "KAAA", "PABC"].map(String::from).into();

        write_identifier_list(&path, &ids).expect("write");
        let content = std::fs::read_to_string(&path).expect("read");
        assert_eq!(content, "ICAO\nKAAA\nKZZZ\nPABC\n");
        assert_eq!(read_identifier_list(&path).expect("read list"), ids);
    }

    #[tokio::test]
    async fn unreadable_documents_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = write(
            dir.path(),
            "good.txt",
            "SPRINGFIELD ( KAAA ) 3 N\n  JASU: 1(AM32A-95)\n\x0cOTHER ( KBBB )\n  JASU: 2(MSU-200)\n",
        );
        let broken = write(dir.path(), "broken.pdf", "garbage");
        let missing = dir.path().join("missing.txt");

        let scanner = Arc::new(EquipmentScanner::new(&ExtractionConfig::default()).expect("scanner"));
        let found = scan_documents(vec![good, broken, missing], scanner, 2, &SilentProgress).await;

        let expected: BTreeSet<String> = ["KAAA", "KBBB"].map(String::from).into();
        assert_eq!(found, expected);
    }

    #[tokio::test]
    async fn edition_scan_is_cached_and_reused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let page = std::fs::read_to_string("../../../fixtures/supplement_pages.txt")
            .expect("fixture");
        write(dir.path(), "supplement/pages.txt", &page);

        let config = ExtractionConfig::default();
        let first = equipment_for_edition(dir.path(), &config, &SilentProgress)
            .await
            .expect("scan");
        let expected: BTreeSet<String> = ["KNBR", "KTRD"].map(String::from).into();
        assert_eq!(first, expected);
        assert!(dir.path().join(EQUIPMENT_LIST_FILE).is_file());

        // Remove the corpus: the cached list must be used.
        std::fs::remove_dir_all(dir.path().join("supplement")).expect("rm");
        let second = equipment_for_edition(dir.path(), &config, &SilentProgress)
            .await
            .expect("reuse");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_edition_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = equipment_for_edition(dir.path(), &ExtractionConfig::default(), &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no supplement documents"));
    }
}
