//! Static medical-term dictionaries shared read-only by detectors and the
//! post-filter service (spec.md #4.E, "Medical-term whitelist").

use once_cell::sync::Lazy;
use std::collections::HashSet;

macro_rules! word_set {
    ($($w:expr),* $(,)?) => {{
        let mut s = HashSet::new();
        $(s.insert($w);)*
        s
    }};
}

pub static DISEASE_EPONYMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    word_set![
        "parkinson", "parkinson's", "parkinsons", "alzheimer", "alzheimer's", "alzheimers",
        "hodgkin", "hodgkin's", "hodgkins", "crohn", "crohn's", "crohns", "addison",
        "addison's", "addisons", "cushing", "cushing's", "cushings", "graves", "graves'",
        "hashimoto", "hashimoto's", "hashimotos", "bell's palsy", "raynaud", "raynaud's",
        "raynauds", "tourette", "tourette's", "tourettes", "wilson's disease", "huntington",
        "huntington's", "huntingtons", "marfan", "marfan's", "marfans", "sjogren", "sjogren's",
        "sjogrens", "guillain-barre", "guillain barre", "kaposi", "kaposi's", "kawasaki",
        "paget", "paget's", "pagets",
    ]
});

pub static DISEASE_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    word_set![
        "diabetes", "hypertension", "cancer", "leukemia", "lymphoma", "pneumonia",
        "bronchitis", "asthma", "copd", "emphysema", "arthritis", "osteoporosis",
        "fibromyalgia", "depression", "anxiety", "schizophrenia", "bipolar", "hepatitis",
        "cirrhosis", "pancreatitis", "stroke", "aneurysm", "thrombosis", "embolism",
        "carcinoma", "melanoma", "sarcoma", "tumor", "infection", "sepsis", "abscess",
        "fracture", "dislocation", "sprain", "anemia", "dementia", "neuropathy",
    ]
});

pub static MEDICATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    word_set![
        "lisinopril", "metformin", "amlodipine", "metoprolol", "omeprazole", "simvastatin",
        "losartan", "gabapentin", "atorvastatin", "levothyroxine", "prednisone",
        "amoxicillin", "azithromycin", "alprazolam", "tramadol", "furosemide",
        "sertraline", "fluoxetine", "warfarin", "aspirin", "ibuprofen", "acetaminophen",
        "oxycodone", "morphine", "insulin", "xarelto", "eliquis", "lipitor", "zoloft",
        "prozac", "lexapro", "xanax", "ambien",
    ]
});

pub static PROCEDURES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    word_set![
        "ct scan", "ct", "mri", "x-ray", "xray", "ultrasound", "echocardiogram", "ekg",
        "ecg", "eeg", "colonoscopy", "endoscopy", "biopsy", "surgery", "operation",
        "procedure", "catheterization", "angiogram", "angioplasty", "dialysis",
        "chemotherapy", "radiation", "mammogram", "infusion", "transfusion",
    ]
});

pub static ANATOMICAL: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    word_set![
        "abdomen", "pelvis", "thorax", "chest", "head", "neck", "liver", "kidney",
        "spleen", "pancreas", "gallbladder", "heart", "lung", "brain", "spine", "colon",
        "stomach", "intestine", "bladder", "prostate", "uterus", "ovary", "breast",
        "thyroid", "artery", "vein", "nerve", "muscle", "bone", "joint", "skin", "tissue",
    ]
});

pub static SECTION_HEADERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    word_set![
        "assessment", "plan", "diagnosis", "history", "examination", "medications",
        "allergies", "vitals", "labs", "imaging", "chief complaint", "hpi", "ros",
        "physical exam", "impression", "recommendations", "follow-up", "subjective",
        "objective", "problem list",
    ]
});

pub static ORGANIZATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    word_set![
        "hospital", "clinic", "medical center", "health center", "healthcare",
        "health system", "medical group", "pharmacy", "laboratory", "urgent care",
        "emergency room", "emergency department", "nursing home", "rehabilitation",
        "hospice",
    ]
});

/// True if `word` (case-folded) names a disease, medication, procedure, or
/// anatomical term rather than a person.
pub fn is_medical_term(word: &str) -> bool {
    let lower = word.to_lowercase();
    let lower = lower.trim();
    DISEASE_EPONYMS.contains(lower)
        || DISEASE_NAMES.contains(lower)
        || MEDICATIONS.contains(lower)
        || PROCEDURES.contains(lower)
        || ANATOMICAL.contains(lower)
}

pub fn is_section_header(word: &str) -> bool {
    SECTION_HEADERS.contains(word.to_lowercase().trim())
}

pub fn is_organization(word: &str) -> bool {
    ORGANIZATIONS.contains(word.to_lowercase().trim())
}
