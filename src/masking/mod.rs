//! PII masking engine.
//!
//! Two operations: [`MaskingEngine::mask`] replaces every detected PII
//! span with a `[classification]` placeholder token and returns the
//! records needed to reverse it, and [`demask`] splices the original
//! substrings back in. Detection couples an ordered set of structured
//! patterns with a pluggable person-name recognizer; see
//! [`crate::ner`] for the neural implementation.

pub mod engine;
pub mod patterns;
pub mod types;

pub use engine::{demask, MaskingEngine};
pub use patterns::PiiPatterns;
pub use types::{MaskOutcome, PiiClass, PiiEntity};
