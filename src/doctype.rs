//! Document-type classification.
//!
//! Classification is purely lexical: each type owns a fixed vocabulary and
//! the type with the most case-insensitive substring hits wins. No model call
//! is involved — the classifier only picks which function schema and snippet
//! keywords the rest of the pipeline uses, and the remote extractor receives
//! the guess as exactly that, a guess.
//!
//! Ties break in declaration order (medical, pleading, police, transcript,
//! EOB, imaging). An all-zero score maps to [`DocType::Unknown`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of an intake document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocType {
    #[serde(rename = "medical_record")]
    Medical,
    #[serde(rename = "pleading")]
    Pleading,
    #[serde(rename = "police_report")]
    Police,
    #[serde(rename = "transcript")]
    Transcript,
    #[serde(rename = "insurance_eob")]
    InsuranceEob,
    #[serde(rename = "imaging_report")]
    Imaging,
    #[serde(rename = "unknown")]
    Unknown,
}

impl DocType {
    /// Tie-break order for classification, and the order schemas are listed
    /// for unknown documents.
    pub const ALL: [DocType; 6] = [
        DocType::Medical,
        DocType::Pleading,
        DocType::Police,
        DocType::Transcript,
        DocType::InsuranceEob,
        DocType::Imaging,
    ];

    /// Serialized tag, as it appears in records, prompts, and cache keys.
    pub fn tag(self) -> &'static str {
        match self {
            DocType::Medical => "medical_record",
            DocType::Pleading => "pleading",
            DocType::Police => "police_report",
            DocType::Transcript => "transcript",
            DocType::InsuranceEob => "insurance_eob",
            DocType::Imaging => "imaging_report",
            DocType::Unknown => "unknown",
        }
    }

    /// Classification vocabulary. Every entry must be lowercase — scoring
    /// lowercases the document text, not the keywords.
    fn vocabulary(self) -> &'static [&'static str] {
        match self {
            DocType::Medical => &[
                "diagnosis",
                "treatment",
                "medication",
                "mrn",
                "cpt",
                "icd",
                "history of present illness",
            ],
            DocType::Pleading => &[
                "plaintiff",
                "defendant",
                "index no",
                "caption",
                "verified complaint",
                "affirmation",
                "affidavit",
                "notice of motion",
                "bill of particulars",
            ],
            DocType::Police => &[
                "police report",
                "officer",
                "badge",
                "mv104",
                "collision",
                "accident report",
                "precinct",
            ],
            DocType::Transcript => &[
                "examination before trial",
                "ebt",
                "deposition",
                "q:",
                "a:",
                "court reporter",
                "witness",
            ],
            DocType::InsuranceEob => &[
                "explanation of benefits",
                "eob",
                "claim number",
                "payer",
                "allowed amount",
                "denied",
                "adjustment code",
            ],
            DocType::Imaging => &[
                "impression",
                "findings",
                "radiology",
                "mri",
                "ct",
                "x-ray",
                "ultrasound",
                "images reviewed",
            ],
            DocType::Unknown => &[],
        }
    }

    /// Keywords the snippet selector windows around for this type.
    ///
    /// Broader than the classification vocabulary: once the type is decided
    /// we want every line that could feed the schema fields, not just the
    /// lines that identify the type.
    pub fn snippet_keywords(self) -> &'static [&'static str] {
        match self {
            DocType::Medical => &[
                "diagnosis",
                "dx",
                "treatment",
                "medication",
                "procedure",
                "impression",
                "assessment",
                "plan",
                "chief complaint",
                "history",
            ],
            DocType::Pleading => &[
                "caption",
                "plaintiff",
                "defendant",
                "index no",
                "cause of action",
                "negligence",
                "damages",
                "wherefore",
                "relief",
            ],
            DocType::Police => &[
                "police report",
                "officer",
                "badge",
                "mv104",
                "collision",
                "accident",
                "location",
                "vehicle",
                "license",
                "injury",
            ],
            DocType::Transcript => &[
                "q:",
                "a:",
                "examination before trial",
                "deposition",
                "witness",
                "objection",
                "page",
                "line",
            ],
            DocType::InsuranceEob => &[
                "explanation of benefits",
                "eob",
                "payer",
                "claim",
                "allowed",
                "denied",
                "adjustment",
                "remark code",
                "member",
            ],
            DocType::Imaging => &[
                "impression",
                "findings",
                "technique",
                "comparison",
                "mri",
                "ct",
                "x-ray",
                "ultrasound",
            ],
            DocType::Unknown => &[
                "plaintiff",
                "defendant",
                "diagnosis",
                "mv104",
                "deposition",
                "impression",
                "eob",
            ],
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Classify document text by counting vocabulary hits per type.
///
/// Substring matching, not word matching: "cpt" inside "acceptance" counts.
/// That bias is tolerable because the vocabularies were tuned on real OCR
/// output where token boundaries are unreliable anyway.
pub fn classify(text: &str) -> DocType {
    let lower = text.to_lowercase();
    let mut best = DocType::Unknown;
    let mut best_score = 0usize;
    for dt in DocType::ALL {
        let score = dt
            .vocabulary()
            .iter()
            .filter(|kw| lower.contains(*kw))
            .count();
        // Strict '>' keeps the earlier type on ties.
        if score > best_score {
            best = dt;
            best_score = score;
        }
    }
    best
}
