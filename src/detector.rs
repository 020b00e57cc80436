//! Detector contract (spec.md #4.B).
//!
//! A detector is a pure function over a document (and optionally the
//! extracted structure): same inputs always produce the same spans, no
//! shared mutable state, and failures are isolated by the orchestrator
//! (`engine::RedactionEngine`) rather than propagated.

use crate::cancellation::CancellationToken;
use crate::document::Document;
use crate::error::Result;
use crate::span::{FilterType, Span};
use crate::structure::DocumentStructure;

/// Implemented by every PHI detector, built-in or externally supplied.
pub trait Detector: Send + Sync {
    /// Stable identifier used to tag emitted spans and attribute failures,
    /// e.g. `"ssn"`, `"name.titled"`.
    fn id(&self) -> &str;

    /// The PHI family this detector targets. Detectors that cover more than
    /// one family tag each span with its own `filter_type` in `scan`.
    fn filter_type(&self) -> FilterType;

    /// Scans the document, returning candidate spans. Must be bounded in
    /// `O(N * k)` where `k` is the detector's pattern count, and must never
    /// panic on malformed input. Reference detectors poll `cancellation`
    /// roughly every [`crate::cancellation::CHECK_INTERVAL_CHARS`]
    /// characters so a long scan can still be aborted mid-flight.
    fn scan(
        &self,
        document: &Document,
        structure: Option<&DocumentStructure>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Span>>;
}

/// A boxed, type-erased detector for use in heterogeneous detector sets.
pub type BoxedDetector = Box<dyn Detector>;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A detector that always fails, to exercise the orchestrator's
    /// per-detector failure isolation.
    pub struct FailingDetector;

    impl Detector for FailingDetector {
        fn id(&self) -> &str {
            "failing"
        }

        fn filter_type(&self) -> FilterType {
            FilterType::Name
        }

        fn scan(
            &self,
            _document: &Document,
            _structure: Option<&DocumentStructure>,
            _cancellation: &CancellationToken,
        ) -> Result<Vec<Span>> {
            Err(crate::error::Error::DetectorError {
                detector: "failing".into(),
                message: "intentional test failure".into(),
            })
        }
    }

    /// A detector that walks every character position and pauses briefly at
    /// each cancellation checkpoint, to give a concurrent canceller a window
    /// to land mid-scan rather than only before or after it.
    pub struct SlowDetector;

    impl Detector for SlowDetector {
        fn id(&self) -> &str {
            "slow"
        }

        fn filter_type(&self) -> FilterType {
            FilterType::Name
        }

        fn scan(
            &self,
            document: &Document,
            _structure: Option<&DocumentStructure>,
            cancellation: &CancellationToken,
        ) -> Result<Vec<Span>> {
            let mut checkpoint = crate::cancellation::CHECK_INTERVAL_CHARS;
            for position in 0..document.len() {
                cancellation.poll(&mut checkpoint, position)?;
                if position % crate::cancellation::CHECK_INTERVAL_CHARS == 0 {
                    std::thread::sleep(std::time::Duration::from_millis(2));
                }
            }
            Ok(Vec::new())
        }
    }
}
