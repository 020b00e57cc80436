//! Redaction Engine orchestrator (spec.md #4.K).

use crate::applier::{ApplierOptions, RedactionApplier, RedactionReport};
use crate::cache::{CacheConfig, SemanticRedactionCache};
use crate::calibration::Calibrator;
use crate::detector::BoxedDetector;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::policy::PolicyHash;
use crate::postfilter::PostFilterService;
use crate::span::{FilterType, Span};
use crate::structure::StructureExtractor;
use crate::threshold::{AdaptiveContext, AdaptiveThresholdService, ThresholdSet};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Re-exported so existing callers that path through `engine::CancellationToken`
/// keep resolving after the type moved to its own module (spec.md #5).
pub use crate::cancellation::CancellationToken;

/// Per-call overrides a caller's resolved policy document hands down: which
/// detectors run at all, and any filter-specific threshold cutoffs that
/// replace the adaptively-computed set for that filter type (spec.md #3,
/// "the core assumes the DSL loader provides a resolved set of per-filter
/// toggles and a threshold override map").
#[derive(Debug, Clone, Default)]
pub struct RedactionOptions {
    pub adaptive_context: AdaptiveContext,
    pub applier: ApplierOptions,
    pub document_timeout: Option<std::time::Duration>,
    pub per_filter_enabled: HashMap<FilterType, bool>,
    pub threshold_overrides: HashMap<FilterType, ThresholdSet>,
}

pub struct RedactionOutput {
    pub text: String,
    pub spans: Vec<Span>,
    pub report: RedactionReport,
    pub from_cache: bool,
    pub cache_confidence: Option<f64>,
}

/// Orchestrates the full detect -> calibrate -> threshold -> post-filter ->
/// disambiguate -> apply -> cache pipeline (spec.md #4.K).
pub struct RedactionEngine {
    detectors: Vec<BoxedDetector>,
    calibrator: RwLock<Arc<Calibrator>>,
    thresholds: RwLock<Arc<AdaptiveThresholdService>>,
    post_filter: PostFilterService,
    cache: SemanticRedactionCache,
}

impl RedactionEngine {
    pub fn new(detectors: Vec<BoxedDetector>) -> Self {
        Self {
            detectors,
            calibrator: RwLock::new(Arc::new(Calibrator::new())),
            thresholds: RwLock::new(Arc::new(AdaptiveThresholdService::default())),
            post_filter: PostFilterService::default(),
            cache: SemanticRedactionCache::new(CacheConfig::default()),
        }
    }

    /// Atomically swaps the calibrator snapshot. Never mutates it mid-`redact`
    /// (spec.md #6.1): the read lock inside `redact` is held only long enough
    /// to clone the `Arc`.
    pub fn reload_calibrator(&self, calibrator: Calibrator) {
        *self.calibrator.write().unwrap() = Arc::new(calibrator);
    }

    pub fn reload_thresholds(&self, thresholds: AdaptiveThresholdService) {
        *self.thresholds.write().unwrap() = Arc::new(thresholds);
    }

    pub fn redact(
        &self,
        document: &Document,
        policy_hash: &PolicyHash,
        options: &RedactionOptions,
        cancellation: &CancellationToken,
    ) -> Result<RedactionOutput> {
        let started = Instant::now();
        let deadline = options.document_timeout.map(|d| started + d);

        if let Some(hit) = self.cache.lookup(document, policy_hash.as_str()) {
            log::debug!("cache hit for policy '{policy_hash}', confidence {:.3}", hit.confidence);
            let (text, applied, report) =
                RedactionApplier::apply(document, &hit.spans, hit.spans.len(), started.elapsed(), &options.applier);
            return Ok(RedactionOutput {
                text,
                spans: applied,
                report,
                from_cache: true,
                cache_confidence: Some(hit.confidence),
            });
        }
        log::debug!("cache miss for policy '{policy_hash}'; running detector fan-out");

        let structure = StructureExtractor::extract(document);

        let candidate_spans = self.run_detectors(document, &structure, &options.per_filter_enabled, cancellation, deadline)?;
        if cancellation.is_cancelled() {
            return Err(Error::OperationCancelled("cancelled during detector fan-out".into()));
        }
        log::debug!("detector fan-out complete: {} candidate span(s)", candidate_spans.len());

        let calibrator = self.calibrator.read().unwrap().clone();
        let total_detected = candidate_spans.len();
        let calibrated: Vec<Span> = candidate_spans
            .into_iter()
            .map(|mut span| {
                span.confidence = calibrator.calibrate(span.confidence, Some(span.filter_type));
                span
            })
            .collect();

        let mut context = options.adaptive_context.clone();
        if context.document_type.is_none() {
            context.document_type = Some(structure.document_type);
        }
        context.is_ocr = context.is_ocr || document.is_ocr();
        let thresholds_service = self.thresholds.read().unwrap().clone();
        let thresholds = thresholds_service.thresholds_for(&context);

        let thresholded = apply_thresholds(calibrated, &thresholds, &options.threshold_overrides);

        log::debug!("post-filtering {} thresholded span(s)", thresholded.len());
        let post_filtered = self.post_filter.apply(thresholded, document, Some(&structure), &thresholds);

        log::debug!("disambiguating {} post-filtered span(s)", post_filtered.len());
        let final_spans = crate::disambiguate::SpanDisambiguator::resolve(document, post_filtered);

        log::debug!("applying {} final span(s)", final_spans.len());
        let (text, applied_spans, report) = RedactionApplier::apply(
            document,
            &final_spans,
            total_detected,
            started.elapsed(),
            &options.applier,
        );

        self.cache.store(document, &applied_spans, &structure, policy_hash.as_str());

        Ok(RedactionOutput {
            text,
            spans: applied_spans,
            report,
            from_cache: false,
            cache_confidence: None,
        })
    }

    fn run_detectors(
        &self,
        document: &Document,
        structure: &crate::structure::DocumentStructure,
        per_filter_enabled: &HashMap<FilterType, bool>,
        cancellation: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<Vec<Span>> {
        let results: Vec<Result<Vec<Span>>> = self
            .detectors
            .par_iter()
            .map(|detector| {
                if per_filter_enabled.get(&detector.filter_type()) == Some(&false) {
                    return Ok(Vec::new());
                }
                if cancellation.is_cancelled() || deadline.map(|d| Instant::now() > d).unwrap_or(false) {
                    return Ok(Vec::new());
                }
                match detector.scan(document, Some(structure), cancellation) {
                    Ok(mut spans) => {
                        for span in &mut spans {
                            span.detector_id = Some(detector.id().to_string());
                        }
                        Ok(spans)
                    }
                    Err(err @ Error::OperationCancelled(_)) => {
                        log::warn!("detector '{}' cancelled mid-scan: {err}", detector.id());
                        Err(err)
                    }
                    Err(err) => {
                        log::warn!("detector '{}' failed: {err}", detector.id());
                        Ok(Vec::new())
                    }
                }
            })
            .collect();

        let mut spans = Vec::new();
        for result in results {
            spans.extend(result?);
        }
        Ok(spans)
    }

    pub fn cache(&self) -> &SemanticRedactionCache {
        &self.cache
    }
}

/// Drops spans below the effective `drop` threshold for their filter type.
/// Spans between `drop` and `minimum` are demoted: kept only if no other
/// surviving span overlaps the same position, since a higher-confidence span
/// there makes the weak one redundant (spec.md #4.K step 6). A filter type
/// present in `overrides` uses its override set in place of the adaptively
/// computed `thresholds` (spec.md #3, per-filter threshold override map).
fn apply_thresholds(
    spans: Vec<Span>,
    thresholds: &ThresholdSet,
    overrides: &HashMap<FilterType, ThresholdSet>,
) -> Vec<Span> {
    let effective = |span: &Span| overrides.get(&span.filter_type).copied().unwrap_or(*thresholds);

    let (strong, weak): (Vec<Span>, Vec<Span>) = spans
        .into_iter()
        .filter(|s| s.confidence >= effective(s).drop)
        .partition(|s| s.confidence >= effective(s).minimum);

    let mut kept = strong;
    for candidate in weak {
        if !kept.iter().any(|s| s.overlaps(&candidate)) {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::test_support::FailingDetector;
    use crate::detectors::default_detectors;

    #[test]
    fn redacts_document_with_reference_detectors() {
        let engine = RedactionEngine::new(default_detectors());
        let document = Document::typed("Patient Name: John Smith\nSSN: 123-45-6789\nPhone: 555-123-4567");
        let output = engine
            .redact(&document, &PolicyHash::from("policy-1"), &RedactionOptions::default(), &CancellationToken::new())
            .unwrap();
        assert!(output.text.contains("[SSN]") || output.text.contains("[SSN-1]"));
        assert!(!output.from_cache);
    }

    #[test]
    fn second_call_on_identical_document_hits_cache() {
        let engine = RedactionEngine::new(default_detectors());
        let document = Document::typed("Patient Name: John Smith\nSSN: 123-45-6789");
        engine
            .redact(&document, &PolicyHash::from("policy-1"), &RedactionOptions::default(), &CancellationToken::new())
            .unwrap();
        let second = engine
            .redact(&document, &PolicyHash::from("policy-1"), &RedactionOptions::default(), &CancellationToken::new())
            .unwrap();
        assert!(second.from_cache);
        assert_eq!(second.cache_confidence, Some(1.0));
    }

    #[test]
    fn failing_detector_does_not_abort_pipeline() {
        let detectors: Vec<BoxedDetector> = vec![Box::new(FailingDetector)];
        let engine = RedactionEngine::new(detectors);
        let document = Document::typed("Nothing interesting here.");
        let output = engine
            .redact(&document, &PolicyHash::from("policy-1"), &RedactionOptions::default(), &CancellationToken::new())
            .unwrap();
        assert_eq!(output.spans.len(), 0);
    }

    #[test]
    fn same_document_and_config_produce_identical_output() {
        let engine_a = RedactionEngine::new(default_detectors());
        let engine_b = RedactionEngine::new(default_detectors());
        let text = "Patient Name: Jane Roe\nSSN: 987-65-4321\nEmail: jane@example.com";
        let document = Document::typed(text);
        let out_a = engine_a
            .redact(&document, &PolicyHash::from("policy-1"), &RedactionOptions::default(), &CancellationToken::new())
            .unwrap();
        let out_b = engine_b
            .redact(&document, &PolicyHash::from("policy-1"), &RedactionOptions::default(), &CancellationToken::new())
            .unwrap();
        assert_eq!(out_a.text, out_b.text);
    }

    #[test]
    fn disabling_a_filter_type_suppresses_its_detector() {
        let engine = RedactionEngine::new(default_detectors());
        let document = Document::typed("Patient Name: John Smith\nSSN: 123-45-6789");
        let mut options = RedactionOptions::default();
        options.per_filter_enabled.insert(FilterType::Ssn, false);
        let output = engine
            .redact(&document, &PolicyHash::from("policy-toggle"), &options, &CancellationToken::new())
            .unwrap();
        assert!(!output.text.contains("[SSN]") && !output.text.contains("[SSN-1]"));
    }

    #[test]
    fn threshold_override_drops_a_filter_type_entirely() {
        let engine = RedactionEngine::new(default_detectors());
        let document = Document::typed("Patient Name: John Smith\nSSN: 123-45-6789");
        let mut options = RedactionOptions::default();
        options.threshold_overrides.insert(
            FilterType::Name,
            ThresholdSet {
                drop: 1.01,
                minimum: 1.01,
                low: 1.01,
                medium: 1.01,
                high: 1.01,
                very_high: 1.01,
            },
        );
        let output = engine
            .redact(&document, &PolicyHash::from("policy-override"), &options, &CancellationToken::new())
            .unwrap();
        assert!(!output.text.contains("[NAME]") && !output.text.contains("[NAME-1]"));
        assert!(output.text.contains("[SSN]") || output.text.contains("[SSN-1]"));
    }

    #[test]
    fn cancellation_mid_scan_aborts_redaction() {
        let long_document = "x ".repeat(crate::cancellation::CHECK_INTERVAL_CHARS * 3);
        let detectors: Vec<BoxedDetector> = vec![Box::new(crate::detector::test_support::SlowDetector)];
        let engine = RedactionEngine::new(detectors);
        let document = Document::typed(&long_document);
        let cancellation = CancellationToken::new();
        let canceller = cancellation.clone();
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(3));
            canceller.cancel();
        });

        let result = engine.redact(
            &document,
            &PolicyHash::from("policy-midscan"),
            &RedactionOptions::default(),
            &cancellation,
        );
        assert!(matches!(result, Err(Error::OperationCancelled(_))));
    }
}
