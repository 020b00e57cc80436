//! Cache entry types (spec.md #3, "CachedSpan" / "CachedRedactionResult").

use crate::span::{FilterType, Span};
use crate::structure::DocumentStructure;
use serde::{Deserialize, Serialize};

/// A cacheable re-expression of a span: positions relative to a field (or
/// standalone absolute offset), never the original PHI value beyond the
/// validation-only `original_text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSpan {
    pub filter_type: FilterType,
    pub confidence: f64,
    pub priority: i32,
    pub pattern: Option<String>,
    /// Index into the structure's `fields`, or `-1` for a standalone span.
    pub field_index: i32,
    pub offset_from_field_start: usize,
    pub length: usize,
    pub original_text: String,
}

impl CachedSpan {
    pub fn is_standalone(&self) -> bool {
        self.field_index < 0
    }
}

/// Converts a resolved [`Span`] into its cacheable form, locating the field
/// that contains it (if any) by position.
pub fn to_cached_span(span: &Span, structure: &DocumentStructure) -> CachedSpan {
    let containing_field = structure
        .fields
        .iter()
        .enumerate()
        .find(|(_, f)| f.value_start <= span.start() && span.end() <= f.value_end);

    match containing_field {
        Some((index, field)) => CachedSpan {
            filter_type: span.filter_type,
            confidence: span.confidence,
            priority: span.priority,
            pattern: span.pattern.clone(),
            field_index: index as i32,
            offset_from_field_start: span.start() - field.value_start,
            length: span.len(),
            original_text: span.text.clone(),
        },
        None => CachedSpan {
            filter_type: span.filter_type,
            confidence: span.confidence,
            priority: span.priority,
            pattern: span.pattern.clone(),
            field_index: -1,
            offset_from_field_start: span.start(),
            length: span.len(),
            original_text: span.text.clone(),
        },
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRedactionResult {
    pub structure: DocumentStructure,
    pub spans: Vec<CachedSpan>,
    pub policy_hash: String,
    pub timestamp: i64,
    pub hit_count: u64,
}
