//! Parallel PHI detection-and-redaction pipeline.
//!
//! Detects protected health information in clinical text, calibrates each
//! detector's confidence against labeled outcomes, applies context-aware
//! adaptive thresholds, and redacts in place — with a semantic cache that
//! lets structurally similar documents skip re-detection.
//!
//! Loading a policy document, watching it for changes, and writing output
//! to disk are out of scope here; callers own I/O and wire a policy's
//! resolved threshold overrides and detector set into [`engine::RedactionEngine`].

pub mod applier;
pub mod cache;
pub mod calibration;
pub mod cancellation;
pub mod config;
pub mod detector;
pub mod detectors;
pub mod disambiguate;
pub mod document;
pub mod engine;
pub mod error;
pub mod policy;
pub mod postfilter;
pub mod span;
pub mod structure;
pub mod template_mapper;
pub mod threshold;

pub use cancellation::CancellationToken;
pub use document::{Document, Provenance};
pub use engine::{RedactionEngine, RedactionOptions, RedactionOutput};
pub use error::{Error, Result};
pub use policy::PolicyHash;
pub use span::{FilterType, Span};
