//! Fusion, classification and output generation for PlanAid.
//!
//! This crate turns the deployed working files into the output set:
//! [`tables`] and [`reference`] load the inputs, [`fusion`] builds one record
//! per airport, [`classify`] decides what is drawn, and [`output`] writes it.
//! [`pipeline`] strings these together behind the acquisition step, and
//! [`brief`] writes a mission briefing sheet from the same records.

pub mod brief;
pub mod classify;
pub mod fusion;
pub mod output;
pub mod pipeline;
pub mod reference;
pub mod tables;

pub use brief::{BriefRequest, FlightEstimate};
pub use classify::{Eligibility, Exclusion, MarkerClass, Placement, Verdict, classify, place_markers};
pub use fusion::{AirportRecord, Category, RunwayPair, fuse};
pub use output::{OutputContext, OutputFile, OutputManifest, write_outputs};
pub use pipeline::{
    GenerateSummary, RunSummary, acquire, acquire_with, brief, date_label, generate,
    load_records, recorded_supplement_edition, run, run_with,
};
pub use reference::ReferenceSets;
