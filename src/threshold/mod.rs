//! Adaptive Threshold Service (spec.md #4.D).

pub mod persistence;

use crate::span::FilterType;
use crate::structure::DocumentType;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

pub const DEFAULT_MAX_FEEDBACK_ADJUSTMENT: f64 = 0.15;
pub const DEFAULT_MIN_FEEDBACK_SAMPLES: u64 = 50;
pub const DEFAULT_TARGET_SENSITIVITY: f64 = 0.98;
pub const DEFAULT_TARGET_SPECIFICITY: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextStrength {
    Strong,
    Moderate,
    Weak,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PurposeOfUse {
    Treatment,
    Payment,
    Operations,
    Research,
    Marketing,
}

/// Inputs that shape the threshold chain for one document (spec.md #3).
#[derive(Debug, Clone, Default)]
pub struct AdaptiveContext {
    pub document_type: Option<DocumentType>,
    pub context_strength: Option<ContextStrength>,
    pub specialty: Option<String>,
    pub purpose_of_use: Option<PurposeOfUse>,
    pub phi_type: Option<FilterType>,
    pub document_length: Option<usize>,
    pub is_ocr: bool,
}

/// A monotone family of confidence cutoffs: `drop <= minimum <= low <=
/// medium <= high <= very_high <= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub drop: f64,
    pub minimum: f64,
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub very_high: f64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            drop: 0.30,
            minimum: 0.40,
            low: 0.55,
            medium: 0.70,
            high: 0.85,
            very_high: 0.95,
        }
    }
}

impl ThresholdSet {
    fn shifted_by(&self, delta: f64) -> Self {
        Self {
            drop: self.drop + delta,
            minimum: self.minimum + delta,
            low: self.low + delta,
            medium: self.medium + delta,
            high: self.high + delta,
            very_high: self.very_high + delta,
        }
    }

    /// Clamps every field to `[0,1]` and forces nondecreasing order by
    /// raising any field that would otherwise fall below its predecessor.
    fn sanitize(&self) -> Self {
        let mut fields = [self.drop, self.minimum, self.low, self.medium, self.high, self.very_high];
        let mut prev = 0.0;
        for f in fields.iter_mut() {
            *f = f.clamp(0.0, 1.0).max(prev);
            prev = *f;
        }
        Self {
            drop: fields[0],
            minimum: fields[1],
            low: fields[2],
            medium: fields[3],
            high: fields[4],
            very_high: fields[5],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FeedbackStats {
    true_positives: u64,
    false_positives: u64,
    false_negatives: u64,
}

impl FeedbackStats {
    fn samples(&self) -> u64 {
        self.true_positives + self.false_positives + self.false_negatives
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackEvent {
    pub context_key: String,
    pub was_false_positive: bool,
    pub was_false_negative: bool,
}

/// Computes context-aware [`ThresholdSet`]s and learns a bounded per-context
/// offset from recorded feedback (spec.md #4.D).
#[derive(Debug)]
pub struct AdaptiveThresholdService {
    base: ThresholdSet,
    feedback: Mutex<HashMap<String, FeedbackStats>>,
    max_feedback_adjustment: f64,
    min_feedback_samples: u64,
    target_sensitivity: f64,
    target_specificity: f64,
}

impl Default for AdaptiveThresholdService {
    fn default() -> Self {
        Self {
            base: ThresholdSet::default(),
            feedback: Mutex::new(HashMap::new()),
            max_feedback_adjustment: DEFAULT_MAX_FEEDBACK_ADJUSTMENT,
            min_feedback_samples: DEFAULT_MIN_FEEDBACK_SAMPLES,
            target_sensitivity: DEFAULT_TARGET_SENSITIVITY,
            target_specificity: DEFAULT_TARGET_SPECIFICITY,
        }
    }
}

impl AdaptiveThresholdService {
    pub fn with_base(base: ThresholdSet) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    /// Reconstructs a service from a previously persisted base and learned
    /// feedback table (see [`persistence::import`]).
    fn from_parts(base: ThresholdSet, feedback: HashMap<String, FeedbackStats>) -> Self {
        Self {
            base,
            feedback: Mutex::new(feedback),
            ..Self::default()
        }
    }

    fn base(&self) -> ThresholdSet {
        self.base
    }

    fn feedback_snapshot(&self) -> HashMap<String, FeedbackStats> {
        self.feedback.lock().unwrap().clone()
    }

    pub fn thresholds_for(&self, context: &AdaptiveContext) -> ThresholdSet {
        let mut delta = 0.0;
        delta += document_type_modifier(context.document_type);
        delta += context_strength_modifier(context.context_strength);
        delta += specialty_modifier(context.specialty.as_deref(), context.phi_type);
        delta += purpose_of_use_modifier(context.purpose_of_use);
        delta += phi_type_modifier(context.phi_type);
        delta += self.feedback_offset(&context_key(context));

        let mut set = self.base.shifted_by(delta);
        if context.is_ocr {
            set.minimum -= OCR_MINIMUM_MARGIN;
        }
        set.sanitize()
    }

    /// Updates per-context feedback counters; once a context has accumulated
    /// `min_feedback_samples`, its learned offset is recomputed on the next
    /// [`Self::thresholds_for`] call.
    pub fn record_feedback(&self, event: FeedbackEvent) {
        let mut feedback = self.feedback.lock().unwrap();
        let stats = feedback.entry(event.context_key).or_default();
        if event.was_false_positive {
            stats.false_positives += 1;
        } else if event.was_false_negative {
            stats.false_negatives += 1;
        } else {
            stats.true_positives += 1;
        }
    }

    fn feedback_offset(&self, context_key: &str) -> f64 {
        let feedback = self.feedback.lock().unwrap();
        let Some(stats) = feedback.get(context_key) else {
            return 0.0;
        };
        if stats.samples() < self.min_feedback_samples {
            return 0.0;
        }

        let samples = stats.samples() as f64;
        let sensitivity_estimate = if stats.true_positives + stats.false_negatives == 0 {
            1.0
        } else {
            stats.true_positives as f64 / (stats.true_positives + stats.false_negatives) as f64
        };
        let specificity_estimate = (samples - stats.false_positives as f64).max(0.0) / samples;

        // Positive gap => need to move the given direction; a negative
        // sensitivity gap and positive specificity gap both push the
        // threshold up (more conservative), and vice versa.
        let sensitivity_gap = self.target_sensitivity - sensitivity_estimate;
        let specificity_gap = self.target_specificity - specificity_estimate;
        let raw_offset = (specificity_gap - sensitivity_gap) * 0.5;
        raw_offset.clamp(-self.max_feedback_adjustment, self.max_feedback_adjustment)
    }
}

const OCR_MINIMUM_MARGIN: f64 = 0.05;

fn context_key(context: &AdaptiveContext) -> String {
    format!(
        "{:?}|{:?}|{:?}|{:?}",
        context.document_type, context.specialty, context.purpose_of_use, context.phi_type
    )
}

fn document_type_modifier(document_type: Option<DocumentType>) -> f64 {
    match document_type {
        Some(DocumentType::RadiologyReport) => -0.03,
        Some(DocumentType::LabReport) => -0.02,
        Some(DocumentType::DischargeSummary) => 0.01,
        _ => 0.0,
    }
}

fn context_strength_modifier(strength: Option<ContextStrength>) -> f64 {
    match strength {
        Some(ContextStrength::Strong) => -0.05,
        Some(ContextStrength::Moderate) => -0.02,
        Some(ContextStrength::Weak) => 0.02,
        Some(ContextStrength::None) | None => 0.05,
    }
}

struct SpecialtyVocab {
    name: &'static str,
    keywords: &'static [&'static str],
}

static SPECIALTY_VOCAB: Lazy<Vec<SpecialtyVocab>> = Lazy::new(|| {
    vec![
        SpecialtyVocab {
            name: "oncology",
            keywords: &["tumor", "chemotherapy", "oncology", "metastatic", "carcinoma", "radiation"],
        },
        SpecialtyVocab {
            name: "cardiology",
            keywords: &["cardiac", "ecg", "ekg", "arrhythmia", "myocardial", "cardiology"],
        },
        SpecialtyVocab {
            name: "psychiatry",
            keywords: &["psychiatric", "depression", "anxiety", "therapy", "psychotropic"],
        },
    ]
});

/// Keyword-frequency specialty detection: confidence is the top vocabulary's
/// score over the total score across all vocabularies, floored at `0.0`.
pub fn detect_specialty(text: &str) -> Option<(String, f64)> {
    let lower = text.to_lowercase();
    let scores: Vec<(&str, f64)> = SPECIALTY_VOCAB
        .iter()
        .map(|vocab| {
            let score = vocab
                .keywords
                .iter()
                .map(|kw| lower.matches(kw).count() as f64)
                .sum::<f64>();
            (vocab.name, score)
        })
        .collect();

    let total: f64 = scores.iter().map(|(_, s)| s).sum();
    if total <= 0.0 {
        return None;
    }
    let (best_name, best_score) = scores
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .unwrap();
    if best_score <= 0.0 {
        return None;
    }
    Some((best_name.to_string(), (best_score / total).max(0.0)))
}

fn specialty_modifier(specialty: Option<&str>, phi_type: Option<FilterType>) -> f64 {
    match (specialty, phi_type) {
        (Some("oncology"), Some(FilterType::Name)) => -0.03,
        (Some("psychiatry"), Some(FilterType::Name)) => -0.02,
        _ => 0.0,
    }
}

fn purpose_of_use_modifier(purpose: Option<PurposeOfUse>) -> f64 {
    match purpose {
        Some(PurposeOfUse::Research) | Some(PurposeOfUse::Operations) => -0.03,
        Some(PurposeOfUse::Treatment) | Some(PurposeOfUse::Marketing) => 0.03,
        Some(PurposeOfUse::Payment) | None => 0.0,
    }
}

fn phi_type_modifier(phi_type: Option<FilterType>) -> f64 {
    match phi_type {
        Some(FilterType::Ssn) | Some(FilterType::CreditCard) | Some(FilterType::Biometric) => -0.02,
        Some(FilterType::Age) | Some(FilterType::City) => 0.02,
        _ => 0.0,
    }
}
