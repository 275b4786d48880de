//! Vision Layer
//!
//! Turns a captured card photo into raw recognized text. Two stages:
//! region extraction (crop + contrast stretch of the name and number bands)
//! and the reusable OCR engine that maps a region to text.

pub mod engine;
pub mod regions;

pub use engine::{EngineConfig, EngineError, RecognitionEngine, SegmentationMode, TextRecognizer};
pub use regions::{extract_regions, CardRegion, CardRegions, RegionKind};

/// Raw OCR output for one region pass
#[derive(Debug, Clone)]
pub struct RecognizedText {
    /// Which band produced this text
    pub region: RegionKind,
    /// Verbatim engine output
    pub raw_text: String,
}
