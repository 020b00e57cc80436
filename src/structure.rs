//! Structure Extractor (spec.md #4.H).

use crate::document::Document;
use crate::span::FilterType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Closed set of document types the extractor recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    AdmissionNote,
    DischargeSummary,
    ProgressNote,
    RadiologyReport,
    LabReport,
    Prescription,
    Referral,
    ClinicalNote,
    Unknown,
}

/// A labeled field detected in the document, e.g. `Patient Name:`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub label: String,
    pub expected_type: FilterType,
    pub label_start: usize,
    pub label_end: usize,
    pub value_start: usize,
    pub value_end: usize,
}

impl Field {
    pub fn value_len(&self) -> usize {
        self.value_end - self.value_start
    }
}

/// The document "skeleton": typed placeholders in place of variable regions,
/// plus its classification, hash, and confidence (spec.md #3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub skeleton: String,
    pub hash: String,
    pub fields: Vec<Field>,
    pub document_type: DocumentType,
    pub confidence: f64,
    pub original_length: usize,
}

const MAX_VALUE_LENGTH: usize = 80;

struct LabelPattern {
    regex: &'static Regex,
    label: &'static str,
    expected_type: FilterType,
}

static NAME_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^(patient(?:\s*name)?)\s*:\s*").unwrap());
static DOB_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^(dob|date of birth)\s*:\s*").unwrap());
static MRN_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^(mrn|medical record (?:number|no\.?))\s*:\s*").unwrap());
static SSN_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^(ssn)\s*:\s*").unwrap());
static PHONE_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^(phone|tel(?:ephone)?)\s*:\s*").unwrap());
static ADDRESS_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^(address)\s*:\s*").unwrap());
static EMAIL_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^(email)\s*:\s*").unwrap());

fn label_patterns() -> Vec<LabelPattern> {
    vec![
        LabelPattern { regex: &NAME_LABEL, label: "Patient Name", expected_type: FilterType::Name },
        LabelPattern { regex: &DOB_LABEL, label: "DOB", expected_type: FilterType::Date },
        LabelPattern { regex: &MRN_LABEL, label: "MRN", expected_type: FilterType::Mrn },
        LabelPattern { regex: &SSN_LABEL, label: "SSN", expected_type: FilterType::Ssn },
        LabelPattern { regex: &PHONE_LABEL, label: "Phone", expected_type: FilterType::Phone },
        LabelPattern { regex: &ADDRESS_LABEL, label: "Address", expected_type: FilterType::Address },
        LabelPattern { regex: &EMAIL_LABEL, label: "Email", expected_type: FilterType::Email },
    ]
}

static DOCUMENT_TYPE_KEYWORDS: Lazy<Vec<(DocumentType, Regex)>> = Lazy::new(|| {
    vec![
        (DocumentType::DischargeSummary, Regex::new(r"(?i)discharge summary").unwrap()),
        (DocumentType::AdmissionNote, Regex::new(r"(?i)admission note").unwrap()),
        (DocumentType::RadiologyReport, Regex::new(r"(?i)radiolog(?:y|ical) report").unwrap()),
        (DocumentType::LabReport, Regex::new(r"(?i)\blab(?:oratory)? report\b").unwrap()),
        (DocumentType::Prescription, Regex::new(r"(?i)\bprescription\b").unwrap()),
        (DocumentType::Referral, Regex::new(r"(?i)\breferral\b").unwrap()),
        (DocumentType::ProgressNote, Regex::new(r"(?i)progress note").unwrap()),
        (DocumentType::ClinicalNote, Regex::new(r"(?i)clinical note").unwrap()),
    ]
});

static GENERIC_SSN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
static GENERIC_PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(?\b\d{3}\)?[-.\s]\d{3}[-.\s]\d{4}\b").unwrap());
static GENERIC_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());
static GENERIC_NUMERIC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{6,}\b").unwrap());
static GENERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b|\b\d{4}-\d{2}-\d{2}\b").unwrap());
static GENERIC_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{1,2}:\d{2}(?::\d{2})?\s*(?:[AaPp][Mm])?\b").unwrap());

pub struct StructureExtractor;

impl StructureExtractor {
    pub fn extract(document: &Document) -> DocumentStructure {
        let text = document.text();
        let document_type = Self::classify(text);
        let fields = Self::extract_fields(text);
        let skeleton_raw = if fields.is_empty() {
            Self::generic_normalize(text)
        } else {
            Self::skeletonize_with_fields(document, &fields)
        };
        let skeleton = Self::normalize_whitespace(&skeleton_raw);
        let hash = sha256_hex(&skeleton);
        let confidence = Self::confidence(&fields, text.len(), &skeleton);

        DocumentStructure {
            skeleton,
            hash,
            fields,
            document_type,
            confidence,
            original_length: document.len(),
        }
    }

    fn classify(text: &str) -> DocumentType {
        for (doc_type, re) in DOCUMENT_TYPE_KEYWORDS.iter() {
            if re.is_match(text) {
                return *doc_type;
            }
        }
        DocumentType::Unknown
    }

    /// Scans labels left-to-right; each field's value region runs from the
    /// label's end to the next label's start, the next newline, or
    /// `MAX_VALUE_LENGTH` chars, whichever comes first.
    fn extract_fields(text: &str) -> Vec<Field> {
        let mut hits: Vec<(usize, usize, &'static str, FilterType)> = Vec::new();
        for pattern in label_patterns() {
            for m in pattern.regex.find_iter(text) {
                let (start, end) = char_range(text, m.start(), m.end());
                hits.push((start, end, pattern.label, pattern.expected_type));
            }
        }
        hits.sort_by_key(|h| h.0);

        let chars: Vec<char> = text.chars().collect();
        let mut fields = Vec::new();
        for (i, &(label_start, label_end, label, expected_type)) in hits.iter().enumerate() {
            let next_label_start = hits.get(i + 1).map(|h| h.0).unwrap_or(chars.len());
            let next_newline = chars[label_end..]
                .iter()
                .position(|&c| c == '\n')
                .map(|p| label_end + p)
                .unwrap_or(chars.len());
            let cap = label_end + MAX_VALUE_LENGTH;
            let value_end = next_label_start.min(next_newline).min(cap).min(chars.len());
            let value_end = value_end.max(label_end);
            fields.push(Field {
                label: label.to_string(),
                expected_type,
                label_start,
                label_end,
                value_start: label_end,
                value_end,
            });
        }
        fields.sort_by_key(|f| f.label_start);
        fields
    }

    fn skeletonize_with_fields(document: &Document, fields: &[Field]) -> String {
        let chars = document.chars();
        let mut out = String::new();
        let mut cursor = 0usize;
        for field in fields {
            if field.value_start > cursor {
                out.push_str(&chars[cursor..field.value_start].iter().collect::<String>());
            }
            out.push_str(&placeholder(field.expected_type));
            cursor = field.value_end;
        }
        if cursor < chars.len() {
            out.push_str(&chars[cursor..].iter().collect::<String>());
        }
        out
    }

    fn generic_normalize(text: &str) -> String {
        let text = GENERIC_EMAIL.replace_all(text, placeholder(FilterType::Email));
        let text = GENERIC_SSN.replace_all(&text, placeholder(FilterType::Ssn));
        let text = GENERIC_PHONE.replace_all(&text, placeholder(FilterType::Phone));
        let text = GENERIC_DATE.replace_all(&text, placeholder(FilterType::Date));
        let text = GENERIC_TIME.replace_all(&text, "{{__TIME__}}");
        let text = GENERIC_NUMERIC_ID.replace_all(&text, "{{__ID__}}");
        text.into_owned()
    }

    fn normalize_whitespace(s: &str) -> String {
        static RUNS_OF_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());
        static RUNS_OF_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
        let crlf_normalized = s.replace("\r\n", "\n").replace('\r', "\n");
        let tabs_to_space = crlf_normalized.replace('\t', " ");
        let spaces_collapsed = RUNS_OF_SPACES.replace_all(&tabs_to_space, " ");
        let newlines_collapsed = RUNS_OF_NEWLINES.replace_all(&spaces_collapsed, "\n\n");
        newlines_collapsed.trim().to_string()
    }

    fn confidence(fields: &[Field], original_len: usize, skeleton: &str) -> f64 {
        let field_density = (fields.len() as f64 / 10.0).min(1.0);
        let covered: usize = fields.iter().map(Field::value_len).sum();
        let coverage_ratio = if original_len == 0 {
            0.0
        } else {
            covered as f64 / original_len as f64
        };
        let coverage_component = (coverage_ratio * 2.0).min(1.0);
        let _ = skeleton;
        (field_density + coverage_component) / 2.0
    }

    /// Jaccard of field-label sets (weight 0.4) plus a line-by-line skeleton
    /// match ratio (weight 0.6). Identical hashes short-circuit to 1;
    /// differing known document types short-circuit to 0.
    pub fn similarity(a: &DocumentStructure, b: &DocumentStructure) -> f64 {
        if a.hash == b.hash {
            return 1.0;
        }
        if a.document_type != DocumentType::Unknown
            && b.document_type != DocumentType::Unknown
            && a.document_type != b.document_type
        {
            return 0.0;
        }

        let labels_a: std::collections::HashSet<&str> =
            a.fields.iter().map(|f| f.label.as_str()).collect();
        let labels_b: std::collections::HashSet<&str> =
            b.fields.iter().map(|f| f.label.as_str()).collect();
        let jaccard = if labels_a.is_empty() && labels_b.is_empty() {
            1.0
        } else {
            let inter = labels_a.intersection(&labels_b).count() as f64;
            let union = labels_a.union(&labels_b).count() as f64;
            if union == 0.0 {
                0.0
            } else {
                inter / union
            }
        };

        let lines_a: Vec<&str> = a.skeleton.lines().collect();
        let lines_b: Vec<&str> = b.skeleton.lines().collect();
        let max_lines = lines_a.len().max(lines_b.len()).max(1);
        let matches = lines_a
            .iter()
            .zip(lines_b.iter())
            .filter(|(x, y)| x == y)
            .count();
        let line_ratio = matches as f64 / max_lines as f64;

        (jaccard * 0.4 + line_ratio * 0.6).clamp(0.0, 1.0)
    }
}

pub fn placeholder(filter_type: FilterType) -> String {
    format!("{{{{__{}__}}}}", filter_type.tag())
}

fn char_range(text: &str, byte_start: usize, byte_end: usize) -> (usize, usize) {
    let start = text[..byte_start].chars().count();
    let end = start + text[byte_start..byte_end].chars().count();
    (start, end)
}

fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_labeled_fields_in_order() {
        let doc = Document::typed("Patient Name: John Smith\nDOB: 01/15/1980\nMRN: 12345678");
        let structure = StructureExtractor::extract(&doc);
        assert_eq!(structure.fields.len(), 3);
        assert_eq!(structure.fields[0].label, "Patient Name");
        assert!(structure.fields.windows(2).all(|w| w[0].label_start < w[1].label_start));
    }

    #[test]
    fn skeleton_replaces_values_with_placeholders() {
        let doc = Document::typed("Patient Name: John Smith\nDOB: 01/15/1980");
        let structure = StructureExtractor::extract(&doc);
        assert!(structure.skeleton.contains("{{__NAME__}}"));
        assert!(structure.skeleton.contains("{{__DATE__}}"));
        assert!(!structure.skeleton.contains("John Smith"));
    }

    #[test]
    fn generic_normalization_without_labels() {
        let doc = Document::typed("Contact me at jane@example.com or 555-123-4567.");
        let structure = StructureExtractor::extract(&doc);
        assert!(structure.fields.is_empty());
        assert!(structure.skeleton.contains("{{__EMAIL__}}"));
        assert!(structure.skeleton.contains("{{__PHONE__}}"));
    }

    #[test]
    fn similarity_reflexive_and_symmetric() {
        let doc = Document::typed("Patient Name: John Smith\nMRN: 11111111");
        let structure_a = StructureExtractor::extract(&doc);
        let doc2 = Document::typed("Patient Name: Jane Roe\nMRN: 22222222");
        let structure_b = StructureExtractor::extract(&doc2);
        assert_eq!(StructureExtractor::similarity(&structure_a, &structure_a), 1.0);
        let ab = StructureExtractor::similarity(&structure_a, &structure_b);
        let ba = StructureExtractor::similarity(&structure_b, &structure_a);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn identical_hash_short_circuits_to_one() {
        let doc = Document::typed("Patient Name: John Smith\nMRN: 11111111");
        let a = StructureExtractor::extract(&doc);
        let b = StructureExtractor::extract(&doc);
        assert_eq!(StructureExtractor::similarity(&a, &b), 1.0);
    }

    #[test]
    fn whitespace_normalization_collapses_runs() {
        let doc = Document::typed("a\r\n\r\n\r\nb   c\t\td");
        let structure = StructureExtractor::extract(&doc);
        assert!(!structure.skeleton.contains("   "));
        assert!(!structure.skeleton.contains("\n\n\n"));
    }
}
