use super::ssn::char_range;
use super::whitelist::is_medical_term;
use crate::cancellation::CancellationToken;
use crate::detector::Detector;
use crate::document::Document;
use crate::error::Result;
use crate::span::{FilterType, Span, SpanFactory, SpanOptions};
use crate::structure::DocumentStructure;
use once_cell::sync::Lazy;
use regex::Regex;

static LAST_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]+),\s+([A-Z][a-z]+)\b").unwrap());
static TITLED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Dr|Mr|Mrs|Ms|Miss|Prof)\.?\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+){0,2})\b").unwrap()
});
static PATIENT_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bpatient(?:\s*name)?\s*[:=]\s*([A-Z][a-zA-Z'-]+(?:\s+[A-Z][a-zA-Z'-]+){0,2})")
        .unwrap()
});
static GENERAL_FULL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b").unwrap());

/// Per-pattern-family base weights, mirroring the way the original
/// detection ensemble weighted regex pattern families before combining them
/// with context bonuses (see `other_examples`' weighted PHI scorer for the
/// shape of this scheme).
#[derive(Debug, Clone)]
pub struct NameWeights {
    pub last_first_format: f64,
    pub titled_name: f64,
    pub patient_label: f64,
    pub general_full_name: f64,
    pub disease_eponym_penalty: f64,
}

impl Default for NameWeights {
    fn default() -> Self {
        Self {
            last_first_format: 0.95,
            titled_name: 0.92,
            patient_label: 0.90,
            general_full_name: 0.70,
            disease_eponym_penalty: -0.85,
        }
    }
}

/// Titled names, `Patient:`-labeled names, `Last, First` forms, and a
/// lower-confidence general two-word-capitalized fallback, demoted by a
/// disease-eponym whitelist (Parkinson's, Crohn's, ...).
pub struct NameDetector {
    weights: NameWeights,
}

impl Default for NameDetector {
    fn default() -> Self {
        Self {
            weights: NameWeights::default(),
        }
    }
}

impl NameDetector {
    pub fn with_weights(weights: NameWeights) -> Self {
        Self { weights }
    }

    fn push_if_not_medical(
        &self,
        document: &Document,
        spans: &mut Vec<Span>,
        start: usize,
        end: usize,
        base_confidence: f64,
        pattern: &'static str,
    ) -> Result<()> {
        let candidate = document.slice(start, end);
        let is_medical = is_medical_term(&candidate)
            || candidate.split_whitespace().any(is_medical_term);
        let confidence = if is_medical {
            (base_confidence + self.weights.disease_eponym_penalty).clamp(0.0, 1.0)
        } else {
            base_confidence
        };
        if confidence <= 0.0 {
            return Ok(());
        }
        spans.push(SpanFactory::from_position(
            document,
            start,
            end,
            FilterType::Name,
            confidence,
            SpanOptions {
                priority: priority_for(pattern),
                pattern: Some(pattern.into()),
                detector_id: Some("name".into()),
            },
        )?);
        Ok(())
    }
}

fn priority_for(pattern: &str) -> i32 {
    match pattern {
        "name.last_first" => 75,
        "name.titled" => 78,
        "name.patient_labeled" => 82,
        _ => 40,
    }
}

impl Detector for NameDetector {
    fn id(&self) -> &str {
        "name"
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
        let text = document.text();
        let mut spans = Vec::new();
        let mut checkpoint = crate::cancellation::CHECK_INTERVAL_CHARS;

        for caps in PATIENT_LABELED.captures_iter(text) {
            let m = caps.get(1).unwrap();
            let (start, end) = char_range(text, m.start(), m.end());
            cancellation.poll(&mut checkpoint, start)?;
            self.push_if_not_medical(
                document,
                &mut spans,
                start,
                end,
                self.weights.patient_label,
                "name.patient_labeled",
            )?;
        }

        for m in LAST_FIRST.find_iter(text) {
            let (start, end) = char_range(text, m.start(), m.end());
            cancellation.poll(&mut checkpoint, start)?;
            self.push_if_not_medical(
                document,
                &mut spans,
                start,
                end,
                self.weights.last_first_format,
                "name.last_first",
            )?;
        }

        for caps in TITLED_NAME.captures_iter(text) {
            let m = caps.get(1).unwrap();
            let (start, end) = char_range(text, m.start(), m.end());
            cancellation.poll(&mut checkpoint, start)?;
            self.push_if_not_medical(
                document,
                &mut spans,
                start,
                end,
                self.weights.titled_name,
                "name.titled",
            )?;
        }

        for m in GENERAL_FULL_NAME.find_iter(text) {
            let (start, end) = char_range(text, m.start(), m.end());
            cancellation.poll(&mut checkpoint, start)?;
            self.push_if_not_medical(
                document,
                &mut spans,
                start,
                end,
                self.weights.general_full_name,
                "name.general",
            )?;
        }

        Ok(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_patient_labeled_name() {
        let doc = Document::typed("Patient: John Smith, admitted today.");
        let spans = NameDetector::default().scan(&doc, None, &CancellationToken::new()).unwrap();
        assert!(spans.iter().any(|s| s.text == "John Smith" && s.pattern.as_deref() == Some("name.patient_labeled")));
    }

    #[test]
    fn finds_titled_name() {
        let doc = Document::typed("Dr. Jane Doe signed the report.");
        let spans = NameDetector::default().scan(&doc, None, &CancellationToken::new()).unwrap();
        assert!(spans.iter().any(|s| s.text == "Jane Doe"));
    }

    #[test]
    fn demotes_disease_eponym() {
        let doc = Document::typed("History of Marfan Syndrome was noted.");
        let spans = NameDetector::default().scan(&doc, None, &CancellationToken::new()).unwrap();
        // The whitelist penalty drives confidence to (or below) zero, so the
        // demoted span is dropped entirely rather than surviving as a
        // low-confidence false positive.
        assert!(!spans.iter().any(|s| s.text == "Marfan Syndrome"));
    }

    #[test]
    fn finds_last_first_form() {
        let doc = Document::typed("Smith, John was seen in clinic.");
        let spans = NameDetector::default().scan(&doc, None, &CancellationToken::new()).unwrap();
        assert!(spans.iter().any(|s| s.pattern.as_deref() == Some("name.last_first")));
    }
}
