use super::ssn::char_range;
use crate::cancellation::CancellationToken;
use crate::detector::Detector;
use crate::document::Document;
use crate::error::Result;
use crate::span::{FilterType, Span, SpanFactory, SpanOptions};
use crate::structure::DocumentStructure;
use once_cell::sync::Lazy;
use regex::Regex;

static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(0?[1-9]|1[0-2])[/-](0?[1-9]|[12]\d|3[01])[/-](\d{4}|\d{2})\b").unwrap());
static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap());
static MONTH_NAME_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}\b",
    )
    .unwrap()
});

/// Numeric, ISO-8601, and month-name date formats.
pub struct DateDetector;

impl Detector for DateDetector {
    fn id(&self) -> &str {
        "date"
    }

    fn filter_type(&self) -> FilterType {
        FilterType::Date
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
        let patterns: [(&Regex, &str, f64); 3] = [
            (&NUMERIC_DATE, "date.numeric", 0.9),
            (&ISO_DATE, "date.iso", 0.92),
            (&MONTH_NAME_DATE, "date.month_name", 0.93),
        ];

        for (re, pattern_id, confidence) in patterns {
            for m in re.find_iter(text) {
                let (start, end) = char_range(text, m.start(), m.end());
                cancellation.poll(&mut checkpoint, start)?;
                spans.push(SpanFactory::from_position(
                    document,
                    start,
                    end,
                    FilterType::Date,
                    confidence,
                    SpanOptions {
                        priority: 70,
                        pattern: Some(pattern_id.into()),
                        detector_id: Some(self.id().into()),
                    },
                )?);
            }
        }

        Ok(spans)
    }
}
