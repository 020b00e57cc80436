use super::ssn::char_range;
use crate::cancellation::CancellationToken;
use crate::detector::Detector;
use crate::document::Document;
use crate::error::Result;
use crate::span::{FilterType, Span, SpanFactory, SpanOptions};
use crate::structure::DocumentStructure;
use once_cell::sync::Lazy;
use regex::Regex;

static MRN_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:mrn|medical record (?:number|no\.?))\s*[:#]?\s*(\d{6,10})\b").unwrap()
});

/// Labeled medical record numbers (6-10 digit identifiers).
pub struct MrnDetector;

impl Detector for MrnDetector {
    fn id(&self) -> &str {
        "mrn"
    }

    fn filter_type(&self) -> FilterType {
        FilterType::Mrn
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
        for caps in MRN_LABELED.captures_iter(text) {
            let m = caps.get(1).unwrap();
            let (start, end) = char_range(text, m.start(), m.end());
            cancellation.poll(&mut checkpoint, start)?;
            spans.push(SpanFactory::from_position(
                document,
                start,
                end,
                FilterType::Mrn,
                0.93,
                SpanOptions {
                    priority: 88,
                    pattern: Some("mrn.labeled".into()),
                    detector_id: Some(self.id().into()),
                },
            )?);
        }
        Ok(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_labeled_mrn() {
        let doc = Document::typed("MRN: 12345678.");
        let spans = MrnDetector.scan(&doc, None, &CancellationToken::new()).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "12345678");
    }

    #[test]
    fn ignores_short_numbers() {
        let doc = Document::typed("MRN: 123");
        let spans = MrnDetector.scan(&doc, None, &CancellationToken::new()).unwrap();
        assert!(spans.is_empty());
    }
}
