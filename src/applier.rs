//! Redaction Applier (spec.md #4.G).

use crate::document::Document;
use crate::span::{FilterType, Span};
use std::collections::HashMap;
use std::time::Duration;

/// Per-filter-type counts and overall timing for one `redact` call.
#[derive(Debug, Clone, Default)]
pub struct RedactionReport {
    pub counts_by_filter: HashMap<FilterType, usize>,
    pub total_detected: usize,
    pub total_applied: usize,
    pub execution_time_ms: u128,
    pub explanations: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ApplierOptions {
    /// Collapse repeated occurrences of identical original text within one
    /// document to the same counter rather than incrementing per occurrence.
    pub collapse_duplicate_text: bool,
    pub include_explanations: bool,
}

/// Scans spans in ascending start order and emits `[FILTER_TYPE]` or
/// `[FILTER_TYPE-N]` tokens in their place.
pub struct RedactionApplier;

impl RedactionApplier {
    pub fn apply(
        document: &Document,
        spans: &[Span],
        total_detected: usize,
        elapsed: Duration,
        options: &ApplierOptions,
    ) -> (String, Vec<Span>, RedactionReport) {
        let mut totals_by_filter: HashMap<FilterType, usize> = HashMap::new();
        for span in spans {
            *totals_by_filter.entry(span.filter_type).or_insert(0) += 1;
        }

        let mut counters: HashMap<FilterType, usize> = HashMap::new();
        let mut text_to_counter: HashMap<(FilterType, String), usize> = HashMap::new();
        let mut report = RedactionReport {
            total_detected,
            ..Default::default()
        };

        let chars = document.chars();
        let mut out = String::with_capacity(chars.len());
        let mut cursor = 0usize;
        let mut applied_spans = Vec::with_capacity(spans.len());

        for span in spans {
            if span.start() < cursor {
                continue;
            }
            out.push_str(&chars[cursor..span.start()].iter().collect::<String>());

            let counter = if options.collapse_duplicate_text {
                let key = (span.filter_type, span.text.clone());
                *text_to_counter.entry(key).or_insert_with(|| {
                    let next = counters.entry(span.filter_type).or_insert(0);
                    *next += 1;
                    *next
                })
            } else {
                let next = counters.entry(span.filter_type).or_insert(0);
                *next += 1;
                *next
            };

            let token = format_token(span.filter_type, counter, totals_by_filter[&span.filter_type]);
            out.push_str(&token);

            let mut applied = span.clone();
            applied.replacement = Some(token);
            applied.applied = true;
            *report.counts_by_filter.entry(span.filter_type).or_insert(0) += 1;

            if options.include_explanations {
                report.explanations.push(format!(
                    "{}@{}..{} -> {}",
                    span.filter_type.tag(),
                    span.start(),
                    span.end(),
                    applied.replacement.as_deref().unwrap_or("")
                ));
            }

            cursor = span.end();
            applied_spans.push(applied);
        }

        if cursor < chars.len() {
            out.push_str(&chars[cursor..].iter().collect::<String>());
        }

        report.total_applied = applied_spans.len();
        report.execution_time_ms = elapsed.as_millis();

        (out, applied_spans, report)
    }
}

/// Uses `[FILTER_TYPE]` only when the type occurs exactly once in the
/// document; otherwise `[FILTER_TYPE-N]`.
fn format_token(filter_type: FilterType, counter: usize, total_for_type: usize) -> String {
    if total_for_type <= 1 && counter == 1 {
        format!("[{}]", filter_type.tag())
    } else {
        format!("[{}-{}]", filter_type.tag(), counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::SpanOptions;

    fn span(document: &Document, start: usize, end: usize, filter_type: FilterType) -> Span {
        crate::span::SpanFactory::from_position(document, start, end, filter_type, 0.9, SpanOptions::default())
            .unwrap()
    }

    #[test]
    fn single_occurrence_uses_bare_token() {
        let document = Document::typed("Call 555-123-4567 now.");
        let spans = vec![span(&document, 5, 17, FilterType::Phone)];
        let (text, _, report) =
            RedactionApplier::apply(&document, &spans, 1, Duration::from_millis(5), &ApplierOptions::default());
        assert_eq!(text, "Call [PHONE] now.");
        assert_eq!(report.total_applied, 1);
    }

    #[test]
    fn multiple_occurrences_are_numbered_in_appearance_order() {
        let document = Document::typed("John Smith and John Smith again");
        let spans = vec![
            span(&document, 0, 10, FilterType::Name),
            span(&document, 15, 25, FilterType::Name),
        ];
        let (text, _, _) = RedactionApplier::apply(
            &document,
            &spans,
            2,
            Duration::from_millis(1),
            &ApplierOptions::default(),
        );
        assert_eq!(text, "[NAME-1] and [NAME-2] again");
    }

    #[test]
    fn collapses_duplicate_text_when_configured() {
        let document = Document::typed("John Smith and John Smith again");
        let spans = vec![
            span(&document, 0, 10, FilterType::Name),
            span(&document, 15, 25, FilterType::Name),
        ];
        let options = ApplierOptions {
            collapse_duplicate_text: true,
            ..Default::default()
        };
        let (text, _, _) = RedactionApplier::apply(&document, &spans, 2, Duration::from_millis(1), &options);
        assert_eq!(text, "[NAME-1] and [NAME-1] again");
    }

    #[test]
    fn report_counts_per_filter_type() {
        let document = Document::typed("SSN 123-45-6789 phone 555-123-4567");
        let spans = vec![
            span(&document, 4, 15, FilterType::Ssn),
            span(&document, 23, 35, FilterType::Phone),
        ];
        let (_, _, report) = RedactionApplier::apply(
            &document,
            &spans,
            2,
            Duration::from_millis(1),
            &ApplierOptions::default(),
        );
        assert_eq!(report.counts_by_filter[&FilterType::Ssn], 1);
        assert_eq!(report.counts_by_filter[&FilterType::Phone], 1);
        assert_eq!(report.total_detected, 2);
    }
}
