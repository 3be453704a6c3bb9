//! Structured event extraction from the Unified Calendar Plan (ЕКП) PDF
//!
//! The calendar is a multi-hundred-page landscape document where every sport
//! has a title line, a "main roster" marker, an optional "youth roster"
//! marker and a ruled table of events that may run over many pages. This
//! crate turns it into per-event records in two stages:
//!
//! 1. Anchor detection, consolidation and table stitching produce one row
//!    per event with raw cell text ([`run_stage_one`], checkpointed as CSV).
//! 2. Attribute and location parsing turn the raw rows into typed
//!    [`StructuredEvent`] records ([`run_stage_two`], written as JSON).

pub mod anchors;
pub mod assemble;
pub mod attributes;
pub mod checkpoint;
pub mod config;
pub mod diagnostics;
pub mod extractor;
pub mod location;
pub mod page;
pub mod pipeline;
pub mod stitcher;
pub mod tables;
pub mod text;
pub mod tounicode;

pub use anchors::{consolidate, detect_anchors, AnchorEvent, AnchorKind, SportAnchor};
pub use assemble::{assemble_events, StructuredEvent};
pub use attributes::{parse_attributes, DisciplineVocabulary, Gender, ParsedAttributes};
pub use config::PipelineConfig;
pub use diagnostics::Diagnostics;
pub use extractor::{extract_pages, extract_pages_mem};
pub use location::{parse_location, CountryIndex, Location};
pub use page::{BBox, PageContent, PageLine, PageView, TextItem};
pub use pipeline::{process_pages, run_stage_one, run_stage_two, StageOneOutput, StageTwoOptions};
pub use stitcher::{stitch_tables, RawTableRow};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Pdf(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document structure error on page {page}: {message}")]
    Structure { page: u32, message: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ExtractError {
    pub(crate) fn structure(page: u32, message: impl Into<String>) -> Self {
        ExtractError::Structure {
            page,
            message: message.into(),
        }
    }
}

impl From<lopdf::Error> for ExtractError {
    fn from(e: lopdf::Error) -> Self {
        ExtractError::Pdf(e.to_string())
    }
}
