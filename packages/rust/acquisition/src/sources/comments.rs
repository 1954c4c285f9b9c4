//! Reviewer comment feed: a spreadsheet export with a preamble above the header.

use std::path::Path;

use planaid_shared::{PlanAidError, Result};

/// File name of the comment list inside the cache location and the data folder.
pub const COMMENTS_FILE: &str = "comments_data.csv";

/// Rows above the header in the exported sheet.
const PREAMBLE_ROWS: usize = 3;

/// Drop the preamble and blank trailing rows, keeping header and records.
pub fn strip_preamble(raw: &str) -> Result<Vec<csv::StringRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw.as_bytes());

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| PlanAidError::parse(format!("comment feed: {e}")))?;
        if i < PREAMBLE_ROWS {
            continue;
        }
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        rows.push(record);
    }

    if rows.is_empty() {
        return Err(PlanAidError::parse("comment feed has no header row"));
    }
    Ok(rows)
}

/// Write the header and records, padding short rows to the header width.
pub fn write_comments(path: &Path, rows: &[csv::StringRecord]) -> Result<()> {
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| PlanAidError::parse(format!("{}: {e}", path.display())))?;
    for row in rows {
        let mut fields: Vec<&str> = row.iter().collect();
        fields.resize(width.max(fields.len()), "");
        writer
            .write_record(&fields)
            .map_err(|e| PlanAidError::parse(e.to_string()))?;
    }
    writer.flush().map_err(|e| PlanAidError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "\
T-38 Airport Comments,,
Please keep entries short,,
,,
APT_COMM,COMMENT_DATE,COMMENTS
KXYZ,2025-04-02,\"FBO closes 2200L, call ahead\"
KABC,,Ramp construction
,,
";

    #[test]
    fn preamble_is_removed() {
        let rows = strip_preamble(SHEET).expect("rows");
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][0], "APT_COMM");
        assert_eq!(&rows[1][2], "FBO closes 2200L, call ahead");
    }

    #[test]
    fn header_only_preamble_is_an_error() {
        assert!(strip_preamble("a\nb\nc\n").is_err());
    }

    #[test]
    fn written_file_is_plain_csv() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(COMMENTS_FILE);
        write_comments(&path, &strip_preamble(SHEET).expect("rows")).expect("write");

        let content = std::fs::read_to_string(&path).expect("read");
        assert!(content.starts_with("APT_COMM,COMMENT_DATE,COMMENTS\n"));
        assert!(content.contains("\"FBO closes 2200L, call ahead\""));
    }
}
