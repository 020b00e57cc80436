//! Post-filter Service (spec.md #4.E).

use crate::detectors::whitelist::{is_medical_term, is_organization, is_section_header};
use crate::document::Document;
use crate::span::{FilterType, Span};
use crate::structure::DocumentStructure;
use crate::threshold::ThresholdSet;
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Remove,
    Demote,
    Boost,
    Reclassify(FilterType),
}

/// Feature flags gating the built-in rule families.
#[derive(Debug, Clone, Copy)]
pub struct PostFilterFlags {
    pub medical_term_whitelist: bool,
    pub field_label_whitelist: bool,
    pub section_heading_filter: bool,
    pub geographic_term_filter: bool,
    pub invalid_ending_filter: bool,
}

impl Default for PostFilterFlags {
    fn default() -> Self {
        Self {
            medical_term_whitelist: true,
            field_label_whitelist: true,
            section_heading_filter: true,
            geographic_term_filter: true,
            invalid_ending_filter: true,
        }
    }
}

const DEMOTE_DELTA: f64 = 0.3;
const BOOST_DELTA: f64 = 0.15;

static FIELD_LABEL_PHRASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(patient(?:\s*name)?|name|dob|mrn|ssn|phone|address|email)$").unwrap());
static TRAILING_PUNCTUATION_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.,;:\-\s]$").unwrap());

/// Runs the built-in rule families over `spans`, re-testing demoted spans
/// against `thresholds.drop`. All `remove` rules run before
/// `demote`/`boost`/`reclassify`, per spec.md #4.E.
pub struct PostFilterService {
    pub flags: PostFilterFlags,
}

impl Default for PostFilterService {
    fn default() -> Self {
        Self {
            flags: PostFilterFlags::default(),
        }
    }
}

impl PostFilterService {
    pub fn apply(
        &self,
        spans: Vec<Span>,
        document: &Document,
        structure: Option<&DocumentStructure>,
        thresholds: &ThresholdSet,
    ) -> Vec<Span> {
        let _ = document;
        let mut remaining = Vec::with_capacity(spans.len());
        for span in spans {
            if self.should_remove(&span, structure) {
                continue;
            }
            remaining.push(span);
        }

        remaining
            .into_iter()
            .filter_map(|span| self.apply_adjustments(span, structure, thresholds))
            .collect()
    }

    fn should_remove(&self, span: &Span, structure: Option<&DocumentStructure>) -> bool {
        if self.flags.field_label_whitelist
            && matches!(span.filter_type, FilterType::Name)
            && FIELD_LABEL_PHRASE.is_match(span.text.trim())
        {
            return true;
        }

        if self.flags.section_heading_filter
            && matches!(span.filter_type, FilterType::Name)
            && (is_section_header(span.text.trim()) || is_all_caps_heading(&span.text))
        {
            return true;
        }

        if self.flags.invalid_ending_filter && TRAILING_PUNCTUATION_NOISE.is_match(&span.text) {
            return true;
        }

        let _ = structure;
        false
    }

    fn apply_adjustments(
        &self,
        mut span: Span,
        structure: Option<&DocumentStructure>,
        thresholds: &ThresholdSet,
    ) -> Option<Span> {
        if let Some(action) = self.classify_adjustment(&span, structure) {
            match action {
                RuleAction::Remove => return None,
                RuleAction::Demote => span.confidence = (span.confidence - DEMOTE_DELTA).clamp(0.0, 1.0),
                RuleAction::Boost => span.confidence = (span.confidence + BOOST_DELTA).clamp(0.0, 1.0),
                RuleAction::Reclassify(new_type) => span.filter_type = new_type,
            }
        }

        if span.confidence < thresholds.drop {
            return None;
        }
        Some(span)
    }

    /// Picks at most one rule action per span: a city-typed span whose
    /// position falls inside a field labeled `Address` resolves to
    /// `FilterType::Address` rather than being boosted as a standalone city
    /// mention (spec.md #4.E).
    fn classify_adjustment(&self, span: &Span, structure: Option<&DocumentStructure>) -> Option<RuleAction> {
        match span.filter_type {
            FilterType::Name
                if self.flags.medical_term_whitelist
                    && (is_medical_term(span.text.trim()) || is_organization(span.text.trim())) =>
            {
                Some(RuleAction::Demote)
            }
            FilterType::City if self.flags.geographic_term_filter => {
                if structure
                    .and_then(|s| containing_field(s, span))
                    .is_some_and(|field| field.expected_type == FilterType::Address)
                {
                    Some(RuleAction::Reclassify(FilterType::Address))
                } else {
                    Some(RuleAction::Boost)
                }
            }
            _ => None,
        }
    }
}

fn containing_field<'a>(structure: &'a DocumentStructure, span: &Span) -> Option<&'a crate::structure::Field> {
    structure
        .fields
        .iter()
        .find(|f| f.value_start <= span.start() && span.end() <= f.value_end)
}

fn is_all_caps_heading(text: &str) -> bool {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    !letters.is_empty() && letters.iter().all(|c| c.is_uppercase())
}
