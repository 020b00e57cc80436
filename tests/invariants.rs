//! Universal invariants (spec.md #8, items 1, 2, 5, 6, 7, 9).

use sentrix_redact_core::cache::{entry::to_cached_span, CacheConfig, SemanticRedactionCache};
use sentrix_redact_core::detectors::default_detectors;
use sentrix_redact_core::document::Document;
use sentrix_redact_core::engine::{CancellationToken, RedactionEngine, RedactionOptions};
use sentrix_redact_core::policy::PolicyHash;
use sentrix_redact_core::span::{FilterType, SpanFactory, SpanOptions};
use sentrix_redact_core::structure::StructureExtractor;
use sentrix_redact_core::threshold::{AdaptiveContext, AdaptiveThresholdService, ContextStrength};

#[test]
fn position_integrity_holds_for_every_applied_span() {
    let engine = RedactionEngine::new(default_detectors());
    let document = Document::typed("Patient: John Smith, DOB 01/15/1980, MRN 12345678.");
    let output = engine
        .redact(&document, &PolicyHash::from("policy-inv-1"), &RedactionOptions::default(), &CancellationToken::new())
        .unwrap();

    for span in &output.spans {
        assert!(span.start() < span.end());
        assert!(span.end() <= document.len());
        assert_eq!(span.text, document.slice(span.start(), span.end()));
    }
}

#[test]
fn no_overlap_after_merge() {
    let engine = RedactionEngine::new(default_detectors());
    let document = Document::typed(
        "Patient: John Smith, DOB 01/15/1980, MRN 12345678, SSN 123-45-6789, phone 555-123-4567.",
    );
    let output = engine
        .redact(&document, &PolicyHash::from("policy-inv-2"), &RedactionOptions::default(), &CancellationToken::new())
        .unwrap();

    for pair in output.spans.windows(2) {
        assert!(pair[0].end() <= pair[1].start());
    }
}

#[test]
fn threshold_clamping_is_always_in_bounds_and_ordered() {
    let service = AdaptiveThresholdService::default();
    let contexts = [
        AdaptiveContext::default(),
        AdaptiveContext {
            context_strength: Some(ContextStrength::Strong),
            is_ocr: true,
            ..Default::default()
        },
        AdaptiveContext {
            context_strength: Some(ContextStrength::None),
            ..Default::default()
        },
    ];

    for context in contexts {
        let thresholds = service.thresholds_for(&context);
        assert!(thresholds.drop >= 0.0 && thresholds.very_high <= 1.0);
        assert!(thresholds.drop <= thresholds.minimum);
        assert!(thresholds.minimum <= thresholds.low);
        assert!(thresholds.low <= thresholds.medium);
        assert!(thresholds.medium <= thresholds.high);
        assert!(thresholds.high <= thresholds.very_high);
    }
}

#[test]
fn cache_entries_never_store_original_document_bytes() {
    let document = Document::typed("Patient Name: John Smith\nSSN: 123-45-6789");
    let structure = StructureExtractor::extract(&document);
    let span = SpanFactory::from_position(&document, 14, 24, FilterType::Name, 0.9, SpanOptions::default()).unwrap();
    let cached = to_cached_span(&span, &structure);

    // The only text retained is the matched span text itself (for
    // validation), never the surrounding document.
    assert_eq!(cached.original_text, "John Smith");
    assert!(!structure.skeleton.contains("John Smith"));
}

#[test]
fn policy_invalidation_clears_hits_until_restored() {
    let cache = SemanticRedactionCache::new(CacheConfig::default());
    let document = Document::typed("Patient Name: John Smith\nMRN: 11111111");
    let structure = StructureExtractor::extract(&document);
    let span = SpanFactory::from_position(&document, 14, 24, FilterType::Name, 0.9, SpanOptions::default()).unwrap();
    cache.store(&document, &[span.clone()], &structure, "policy-x");

    assert!(cache.lookup(&document, "policy-x").is_some());
    cache.invalidate_policy("policy-x");
    assert!(cache.lookup(&document, "policy-x").is_none());

    cache.store(&document, &[span], &structure, "policy-x");
    assert!(cache.lookup(&document, "policy-x").is_some());
}

#[test]
fn structure_similarity_is_reflexive_symmetric_and_identity_on_equal_hash() {
    let a = StructureExtractor::extract(&Document::typed("Patient Name: John Smith\nMRN: 11111111"));
    let b = StructureExtractor::extract(&Document::typed("Patient Name: Jane Roe\nMRN: 22222222"));

    assert_eq!(StructureExtractor::similarity(&a, &a), 1.0);
    assert_eq!(
        StructureExtractor::similarity(&a, &b),
        StructureExtractor::similarity(&b, &a)
    );
    assert_eq!(a.hash, b.hash);
    assert_eq!(StructureExtractor::similarity(&a, &b), 1.0);
}
