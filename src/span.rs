//! Span model and SpanFactory (spec.md #4.A).

use crate::document::Document;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Closed enumeration of the 18 HIPAA Safe Harbor identifier families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterType {
    Name,
    Date,
    Ssn,
    Mrn,
    Phone,
    Fax,
    Email,
    Address,
    Zipcode,
    City,
    State,
    Age,
    Account,
    HealthPlan,
    License,
    Npi,
    Dea,
    Ip,
    Url,
    CreditCard,
    Vehicle,
    Device,
    Biometric,
    Passport,
}

impl FilterType {
    /// The token tag emitted by the applier, e.g. `NAME` for `[NAME-1]`.
    pub fn tag(&self) -> &'static str {
        match self {
            FilterType::Name => "NAME",
            FilterType::Date => "DATE",
            FilterType::Ssn => "SSN",
            FilterType::Mrn => "MRN",
            FilterType::Phone => "PHONE",
            FilterType::Fax => "FAX",
            FilterType::Email => "EMAIL",
            FilterType::Address => "ADDRESS",
            FilterType::Zipcode => "ZIPCODE",
            FilterType::City => "CITY",
            FilterType::State => "STATE",
            FilterType::Age => "AGE",
            FilterType::Account => "ACCOUNT",
            FilterType::HealthPlan => "HEALTH_PLAN",
            FilterType::License => "LICENSE",
            FilterType::Npi => "NPI",
            FilterType::Dea => "DEA",
            FilterType::Ip => "IP",
            FilterType::Url => "URL",
            FilterType::CreditCard => "CREDIT_CARD",
            FilterType::Vehicle => "VEHICLE",
            FilterType::Device => "DEVICE",
            FilterType::Biometric => "BIOMETRIC",
            FilterType::Passport => "PASSPORT",
        }
    }
}

/// A candidate (or, post-pipeline, final) PHI occurrence.
///
/// Identity is `(character_start, character_end, filter_type)`; `replacement`
/// and `applied` are only meaningful after the applier (#4.G) has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub character_start: usize,
    pub character_end: usize,
    pub text: String,
    pub filter_type: FilterType,
    pub confidence: f64,
    pub priority: i32,
    pub pattern: Option<String>,
    pub detector_id: Option<String>,
    pub replacement: Option<String>,
    pub applied: bool,
}

impl Span {
    pub fn start(&self) -> usize {
        self.character_start
    }

    pub fn end(&self) -> usize {
        self.character_end
    }

    pub fn len(&self) -> usize {
        self.character_end - self.character_start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.character_start < other.character_end && other.character_start < self.character_end
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.character_start <= other.character_start && other.character_end <= self.character_end
    }

    /// Ordering key used throughout the pipeline: `(start, end, -priority,
    /// -confidence)`, so `Vec::sort` produces a deterministic sweep order.
    fn sort_key(&self) -> (usize, usize, i32, i64) {
        (
            self.character_start,
            self.character_end,
            -self.priority,
            -(self.confidence * 1_000_000.0) as i64,
        )
    }
}

impl Eq for Span {}

impl PartialOrd for Span {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Span {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Options accepted by [`SpanFactory::from_position`].
#[derive(Debug, Clone, Default)]
pub struct SpanOptions {
    pub priority: i32,
    pub pattern: Option<String>,
    pub detector_id: Option<String>,
}

/// Constructs, clones, and bounds-checks spans against a document.
pub struct SpanFactory;

impl SpanFactory {
    pub fn from_position(
        document: &Document,
        start: usize,
        end: usize,
        filter_type: FilterType,
        confidence: f64,
        opts: SpanOptions,
    ) -> Result<Span> {
        let len = document.len();
        if start >= end || end > len {
            return Err(Error::InvalidSpanPosition { start, end, len });
        }
        Ok(Span {
            character_start: start,
            character_end: end,
            text: document.slice(start, end),
            filter_type,
            confidence: confidence.clamp(0.0, 1.0),
            priority: opts.priority,
            pattern: opts.pattern,
            detector_id: opts.detector_id,
            replacement: None,
            applied: false,
        })
    }

    /// Re-expresses a span against a possibly different document, re-slicing
    /// `text` and re-validating bounds. Used by the template mapper (#4.I).
    pub fn reposition(
        document: &Document,
        span: &Span,
        new_start: usize,
        new_end: usize,
    ) -> Result<Span> {
        let mut out = Self::from_position(
            document,
            new_start,
            new_end,
            span.filter_type,
            span.confidence,
            SpanOptions {
                priority: span.priority,
                pattern: span.pattern.clone(),
                detector_id: span.detector_id.clone(),
            },
        )?;
        out.replacement = span.replacement.clone();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize, priority: i32, confidence: f64) -> Span {
        Span {
            character_start: start,
            character_end: end,
            text: String::new(),
            filter_type: FilterType::Name,
            confidence,
            priority,
            pattern: None,
            detector_id: None,
            replacement: None,
            applied: false,
        }
    }

    #[test]
    fn rejects_out_of_bounds() {
        let doc = Document::typed("hello");
        let err = SpanFactory::from_position(
            &doc,
            0,
            10,
            FilterType::Name,
            0.9,
            SpanOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSpanPosition { .. }));
    }

    #[test]
    fn rejects_empty_range() {
        let doc = Document::typed("hello");
        let err =
            SpanFactory::from_position(&doc, 3, 3, FilterType::Name, 0.9, SpanOptions::default())
                .unwrap_err();
        assert!(matches!(err, Error::InvalidSpanPosition { .. }));
    }

    #[test]
    fn text_matches_document_slice() {
        let doc = Document::typed("John Smith is here");
        let span = SpanFactory::from_position(
            &doc,
            0,
            10,
            FilterType::Name,
            0.9,
            SpanOptions::default(),
        )
        .unwrap();
        assert_eq!(span.text, "John Smith");
    }

    #[test]
    fn sort_order_is_start_end_priority_confidence() {
        let mut spans = vec![
            span(5, 10, 1, 0.5),
            span(0, 5, 2, 0.9),
            span(0, 5, 2, 0.95),
            span(0, 6, 1, 0.99),
        ];
        spans.sort();
        assert_eq!(spans[0].character_start, 0);
        assert_eq!(spans[0].character_end, 5);
        assert!(spans[0].confidence >= spans[1].confidence - 1e-9 || spans[0].confidence == 0.95);
        assert_eq!(spans.last().unwrap().character_start, 5);
    }

    #[test]
    fn overlap_detection() {
        let a = span(0, 10, 0, 0.5);
        let b = span(5, 15, 0, 0.5);
        let c = span(10, 15, 0, 0.5);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
