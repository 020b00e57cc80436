//! Template Span Mapper (spec.md #4.I).

use crate::cache::entry::{CachedRedactionResult, CachedSpan};
use crate::document::Document;
use crate::span::{Span, SpanFactory, SpanOptions};
use crate::structure::{DocumentStructure, Field, StructureExtractor};
use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_MIN_OVERALL_CONFIDENCE: f64 = 0.8;
pub const DEFAULT_MAX_FAILED_RATIO: f64 = 0.1;
pub const DEFAULT_MAPPED_CONFIDENCE_PENALTY: f64 = 0.05;
const MIN_SIMILARITY_TO_ATTEMPT: f64 = 0.7;
const FIELD_CLIP_PENALTY: f64 = 0.9;
const STANDALONE_PENALTY: f64 = 0.7;
const VALIDATION_FAILURE_PENALTY: f64 = 0.5;

pub struct TemplateSpanMapper {
    pub min_overall_confidence: f64,
    pub max_failed_ratio: f64,
    pub mapped_confidence_penalty: f64,
}

impl Default for TemplateSpanMapper {
    fn default() -> Self {
        Self {
            min_overall_confidence: DEFAULT_MIN_OVERALL_CONFIDENCE,
            max_failed_ratio: DEFAULT_MAX_FAILED_RATIO,
            mapped_confidence_penalty: DEFAULT_MAPPED_CONFIDENCE_PENALTY,
        }
    }
}

pub struct MappingOutcome {
    pub spans: Vec<Span>,
    pub overall_confidence: f64,
    pub failed_ratio: f64,
    pub reliable: bool,
}

impl TemplateSpanMapper {
    pub fn map(&self, document: &Document, cached: &CachedRedactionResult) -> MappingOutcome {
        let new_structure = StructureExtractor::extract(document);
        let similarity = StructureExtractor::similarity(&cached.structure, &new_structure);
        if similarity < MIN_SIMILARITY_TO_ATTEMPT || cached.spans.is_empty() {
            return MappingOutcome {
                spans: Vec::new(),
                overall_confidence: 0.0,
                failed_ratio: 1.0,
                reliable: false,
            };
        }

        let field_map = build_field_index_map(&cached.structure.fields, &new_structure.fields);

        let mut mapped_spans = Vec::new();
        let mut confidence_sum = 0.0;
        let mut success_count = 0usize;
        let total = cached.spans.len();

        for cached_span in &cached.spans {
            match self.map_one(document, cached_span, &new_structure, &field_map) {
                Some((span, multiplier)) => {
                    mapped_spans.push(span);
                    confidence_sum += multiplier;
                    success_count += 1;
                }
                None => {}
            }
        }

        let failed_ratio = 1.0 - (success_count as f64 / total as f64);
        let overall_confidence = if success_count > 0 {
            confidence_sum / success_count as f64
        } else {
            0.0
        };
        let reliable = overall_confidence >= self.min_overall_confidence && failed_ratio <= self.max_failed_ratio;

        MappingOutcome {
            spans: mapped_spans,
            overall_confidence,
            failed_ratio,
            reliable,
        }
    }

    fn map_one(
        &self,
        document: &Document,
        cached_span: &CachedSpan,
        new_structure: &DocumentStructure,
        field_map: &[Option<usize>],
    ) -> Option<(Span, f64)> {
        let mut multiplier = 1.0;

        let (start, end) = if cached_span.is_standalone() {
            multiplier *= STANDALONE_PENALTY;
            let start = cached_span.offset_from_field_start;
            let end = start + cached_span.length;
            if end > document.len() {
                return None;
            }
            (start, end)
        } else {
            let cached_field_index = cached_span.field_index as usize;
            let new_field_index = field_map.get(cached_field_index).copied().flatten()?;
            let new_field = &new_structure.fields[new_field_index];

            let start = new_field.value_start + cached_span.offset_from_field_start;
            let mut end = start + cached_span.length;

            if start >= new_field.value_end {
                return None;
            }
            if end > new_field.value_end {
                end = new_field.value_end;
                if end <= start {
                    return None;
                }
                multiplier *= FIELD_CLIP_PENALTY;
            }
            (start, end)
        };

        if end > document.len() || start >= end {
            return None;
        }

        let mapped_text = document.slice(start, end);
        if !validates_against_pattern(cached_span.filter_type, &mapped_text) {
            multiplier *= VALIDATION_FAILURE_PENALTY;
        }

        let final_confidence = cached_span.confidence * multiplier * (1.0 - self.mapped_confidence_penalty);

        let span = SpanFactory::from_position(
            document,
            start,
            end,
            cached_span.filter_type,
            final_confidence,
            SpanOptions {
                priority: cached_span.priority,
                pattern: Some(format!("cached:{}", cached_span.pattern.as_deref().unwrap_or("unknown"))),
                detector_id: Some("template_mapper".into()),
            },
        )
        .ok()?;

        Some((span, multiplier))
    }
}

/// Maps cached field indices to new-document field indices by
/// `(label, expected_type)` equality.
fn build_field_index_map(cached_fields: &[Field], new_fields: &[Field]) -> Vec<Option<usize>> {
    cached_fields
        .iter()
        .map(|cached_field| {
            new_fields
                .iter()
                .position(|nf| nf.label == cached_field.label && nf.expected_type == cached_field.expected_type)
        })
        .collect()
}

static SSN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3}-\d{2}-\d{4}$|^\d{9}$").unwrap());
static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}$").unwrap());
static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());
static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}[/-]\d{1,2}[/-]\d{2,4}$|^\d{4}-\d{2}-\d{2}$").unwrap());
static MRN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{6,10}$").unwrap());
static ZIP_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}(-\d{4})?$").unwrap());
static AGE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}$").unwrap());

fn validates_against_pattern(filter_type: crate::span::FilterType, text: &str) -> bool {
    use crate::span::FilterType::*;
    match filter_type {
        Ssn => SSN_PATTERN.is_match(text),
        Phone | Fax => PHONE_PATTERN.is_match(text),
        Email => EMAIL_PATTERN.is_match(text),
        Date => DATE_PATTERN.is_match(text),
        Mrn => MRN_PATTERN.is_match(text),
        Zipcode => ZIP_PATTERN.is_match(text),
        Age => AGE_PATTERN.is_match(text),
        // Types without a fixed lexical pattern (names, addresses, ...)
        // are not validated at the regex stage.
        _ => true,
    }
}
