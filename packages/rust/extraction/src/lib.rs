//! Chart-supplement equipment extraction for PlanAid.
//!
//! - [`scanner`] — per-page proximity heuristic
//! - [`reader`] — PDF and plain-text page readers
//! - [`corpus`] — parallel corpus scan and the cached identifier list

pub mod corpus;
pub mod reader;
pub mod scanner;

pub use corpus::{
    EQUIPMENT_LIST_FILE, equipment_for_edition, read_identifier_list, scan_documents,
    select_documents, write_identifier_list,
};
pub use reader::{DocumentReader, PdfReader, PlainTextReader, reader_for};
pub use scanner::EquipmentScanner;
