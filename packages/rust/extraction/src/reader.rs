//! Document readers: turn a file on disk into per-page text.

use std::path::Path;

use planaid_shared::{PlanAidError, Result};

/// Reads a document into its page texts.
pub trait DocumentReader: Send + Sync {
    fn read_pages(&self, path: &Path) -> Result<Vec<String>>;
}

/// PDF reader backed by `pdf-extract`.
pub struct PdfReader;

impl DocumentReader for PdfReader {
    fn read_pages(&self, path: &Path) -> Result<Vec<String>> {
        let bytes = std::fs::read(path).map_err(|e| PlanAidError::io(path, e))?;
        pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|e| PlanAidError::Extraction(format!("{}: {e}", path.display())))
    }
}

/// Plain-text page dump; pages are separated by form feeds.
pub struct PlainTextReader;

impl DocumentReader for PlainTextReader {
    fn read_pages(&self, path: &Path) -> Result<Vec<String>> {
        let text = std::fs::read_to_string(path).map_err(|e| PlanAidError::io(path, e))?;
        Ok(text.split('\x0c').map(str::to_owned).collect())
    }
}

static PDF_READER: PdfReader = PdfReader;
static TEXT_READER: PlainTextReader = PlainTextReader;

/// Pick a reader by file extension.
pub fn reader_for(path: &Path) -> Option<&'static dyn DocumentReader> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(&PDF_READER),
        "txt" => Some(&TEXT_READER),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_splits_on_form_feed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pages.txt");
        std::fs::write(&path, "page one\x0cpage two\x0cpage three").expect("write");

        let pages = PlainTextReader.read_pages(&path).expect("read");
        assert_eq!(pages, vec!["page one", "page two", "page three"]);
    }

    #[test]
    fn broken_pdf_is_an_extraction_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("CS_NE_20250101.pdf");
        std::fs::write(&path, b"not a pdf at all").expect("write");

        assert!(PdfReader.read_pages(&path).is_err());
    }

    #[test]
    fn reader_chosen_by_extension() {
        assert!(reader_for(Path::new("a/CS_NE_20250101.PDF")).is_some());
        assert!(reader_for(Path::new("a/pages.txt")).is_some());
        assert!(reader_for(Path::new("a/schema.xsd")).is_none());
        assert!(reader_for(Path::new("a/README")).is_none());
    }
}
