// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod keyword;
pub mod noise;
pub mod normalize;
pub mod rules;
pub mod scoring;

// Resolver + hot-reload handle
pub mod classifier;

// Batch plumbing around the classifier (OCR seam, duplicates, dry-run scan)
pub mod dedup;
pub mod ocr;
pub mod scan;

// ---- Re-exports for stable public API ----
pub use crate::classifier::{
    start_hot_reload_thread, Classification, Classifier, ClassifierHandle, UNASSIGNED,
};
pub use crate::config::ClassifierConfig;
pub use crate::keyword::{matches_keyword, matches_phrase_flexible};
pub use crate::noise::filter_ui_noise;
pub use crate::normalize::{normalize, tokenize};
