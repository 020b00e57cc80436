use super::ssn::char_range;
use crate::cancellation::CancellationToken;
use crate::detector::Detector;
use crate::document::Document;
use crate::error::Result;
use crate::span::{FilterType, Span, SpanFactory, SpanOptions};
use crate::structure::DocumentStructure;
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

pub struct EmailDetector;

impl Detector for EmailDetector {
    fn id(&self) -> &str {
        "email"
    }

    fn filter_type(&self) -> FilterType {
        FilterType::Email
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
        for m in EMAIL.find_iter(text) {
            let (start, end) = char_range(text, m.start(), m.end());
            cancellation.poll(&mut checkpoint, start)?;
            spans.push(SpanFactory::from_position(
                document,
                start,
                end,
                FilterType::Email,
                0.97,
                SpanOptions {
                    priority: 95,
                    pattern: Some("email.standard".into()),
                    detector_id: Some(self.id().into()),
                },
            )?);
        }
        Ok(spans)
    }
}
