use super::ssn::char_range;
use crate::cancellation::CancellationToken;
use crate::detector::Detector;
use crate::document::Document;
use crate::error::Result;
use crate::span::{FilterType, Span, SpanFactory, SpanOptions};
use crate::structure::DocumentStructure;
use once_cell::sync::Lazy;
use regex::Regex;

static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(?\b\d{3}\)?[-.\s]\d{3}[-.\s]\d{4}\b").unwrap()
});

/// NANP phone numbers, labeled or bare.
pub struct PhoneDetector;

impl Detector for PhoneDetector {
    fn id(&self) -> &str {
        "phone"
    }

    fn filter_type(&self) -> FilterType {
        FilterType::Phone
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
        for m in PHONE.find_iter(text) {
            let (start, end) = char_range(text, m.start(), m.end());
            cancellation.poll(&mut checkpoint, start)?;
            spans.push(SpanFactory::from_position(
                document,
                start,
                end,
                FilterType::Phone,
                0.88,
                SpanOptions {
                    priority: 80,
                    pattern: Some("phone.nanp".into()),
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
    fn finds_dashed_phone() {
        let doc = Document::typed("Call 555-123-4567 for results.");
        let spans = PhoneDetector.scan(&doc, None, &CancellationToken::new()).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "555-123-4567");
    }

    #[test]
    fn finds_parenthesized_phone() {
        let doc = Document::typed("Phone: (555) 123-4567");
        let spans = PhoneDetector.scan(&doc, None, &CancellationToken::new()).unwrap();
        assert_eq!(spans.len(), 1);
    }
}
