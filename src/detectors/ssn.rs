use crate::cancellation::CancellationToken;
use crate::detector::Detector;
use crate::document::Document;
use crate::error::Result;
use crate::span::{FilterType, SpanFactory, SpanOptions};
use crate::structure::DocumentStructure;
use once_cell::sync::Lazy;
use regex::Regex;

static SSN_DASHED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
static SSN_LABELED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bssn\s*[:#]?\s*(\d{9})\b").unwrap());

/// Matches dashed (`123-45-6789`) and labeled nine-digit SSNs.
pub struct SsnDetector;

impl Detector for SsnDetector {
    fn id(&self) -> &str {
        "ssn"
    }

    fn filter_type(&self) -> FilterType {
        FilterType::Ssn
    }

    fn scan(
        &self,
        document: &Document,
        _structure: Option<&DocumentStructure>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<crate::span::Span>> {
        let text = document.text();
        let mut spans = Vec::new();
        let mut checkpoint = crate::cancellation::CHECK_INTERVAL_CHARS;

        for m in SSN_DASHED.find_iter(text) {
            let (start, end) = char_range(text, m.start(), m.end());
            cancellation.poll(&mut checkpoint, start)?;
            spans.push(SpanFactory::from_position(
                document,
                start,
                end,
                FilterType::Ssn,
                0.95,
                SpanOptions {
                    priority: 90,
                    pattern: Some("ssn.dashed".into()),
                    detector_id: Some(self.id().into()),
                },
            )?);
        }

        for caps in SSN_LABELED.captures_iter(text) {
            let m = caps.get(1).unwrap();
            let (start, end) = char_range(text, m.start(), m.end());
            cancellation.poll(&mut checkpoint, start)?;
            spans.push(SpanFactory::from_position(
                document,
                start,
                end,
                FilterType::Ssn,
                0.9,
                SpanOptions {
                    priority: 85,
                    pattern: Some("ssn.labeled".into()),
                    detector_id: Some(self.id().into()),
                },
            )?);
        }

        Ok(spans)
    }
}

/// Converts a byte range from a regex match on `text` into a character range.
pub(crate) fn char_range(text: &str, byte_start: usize, byte_end: usize) -> (usize, usize) {
    let start = text[..byte_start].chars().count();
    let end = start + text[byte_start..byte_end].chars().count();
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_dashed_ssn() {
        let doc = Document::typed("SSN: 123-45-6789 on file");
        let spans = SsnDetector.scan(&doc, None, &CancellationToken::new()).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "123-45-6789");
    }

    #[test]
    fn finds_labeled_ssn() {
        let doc = Document::typed("ssn: 123456789");
        let spans = SsnDetector.scan(&doc, None, &CancellationToken::new()).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "123456789");
    }

    #[test]
    fn deterministic() {
        let doc = Document::typed("SSN 123-45-6789 and 987-65-4321");
        let a = SsnDetector.scan(&doc, None, &CancellationToken::new()).unwrap();
        let b = SsnDetector.scan(&doc, None, &CancellationToken::new()).unwrap();
        assert_eq!(a, b);
    }
}
