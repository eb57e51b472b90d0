//! Merge model output with local candidates, then optionally redact PII.
//!
//! The model is authoritative; local candidates only fill fields the model
//! left out. The `patient_name` and `member` fills are independent checks on
//! purpose — a medical record and an EOB spell the same person differently,
//! and one present field must not block the other fill.

use crate::doctype::DocType;
use crate::output::LocalCandidates;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

/// Overlay local candidates onto the model output and stamp the record
/// envelope fields (`doc_type`, `source`, `page_count`, optional
/// `raw_ocr_preview`).
pub fn merge(
    doc_type: DocType,
    local: &LocalCandidates,
    mut model: Map<String, Value>,
    source: &str,
    page_count: usize,
    raw_ocr_preview: Option<String>,
) -> Value {
    if !model.contains_key("snippets") {
        if let Some(snippets) = local.get("important_snippets") {
            model.insert("snippets".into(), snippets.clone());
        }
    }

    if let Some(name) = local.get("name_candidate") {
        if !model.contains_key("patient_name") {
            model.insert("patient_name".into(), name.clone());
        }
        if !model.contains_key("member") {
            model.insert("member".into(), name.clone());
        }
    }

    if doc_type == DocType::Transcript && !model.contains_key("citations") {
        if let Some(citations) = local.get("local_citations") {
            model.insert("citations".into(), citations.clone());
        }
    }

    model.insert("doc_type".into(), json!(doc_type.tag()));
    model.insert("source".into(), json!(source));
    model.insert("page_count".into(), json!(page_count));
    if let Some(preview) = raw_ocr_preview {
        model.insert("raw_ocr_preview".into(), json!(preview));
    }

    Value::Object(model)
}

static RE_SSN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}[- ]?\d{2}[- ]?\d{4}\b").unwrap());

static RE_PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,2}[\s\-.])?(?:\(?\d{3}\)?[\s\-.])?\d{3}[\s\-.]\d{4}").unwrap()
});

static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap());

/// Mask SSNs, NANP phone numbers, and emails in every string of the tree.
///
/// SSNs run first: `123-45-6789` also shapes like a phone number, and the
/// SSN mask is the stricter disclosure. Masks contain no digits, so the pass
/// is idempotent.
pub fn redact_in_place(value: &mut Value) {
    match value {
        Value::String(s) => {
            let masked = redact_str(s);
            if masked != *s {
                *s = masked;
            }
        }
        Value::Array(items) => {
            for item in items {
                redact_in_place(item);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                redact_in_place(v);
            }
        }
        _ => {}
    }
}

fn redact_str(s: &str) -> String {
    let s = RE_SSN.replace_all(s, "***-**-****");
    let s = RE_PHONE.replace_all(&s, "***-***-****");
    RE_EMAIL.replace_all(&s, "***@***.***").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_with(pairs: &[(&str, Value)]) -> LocalCandidates {
        let mut c = LocalCandidates::new();
        for (k, v) in pairs {
            c.insert(*k, v.clone());
        }
        c
    }

    #[test]
    fn envelope_fields_are_always_stamped() {
        let merged = merge(
            DocType::Pleading,
            &LocalCandidates::new(),
            Map::new(),
            "brief.pdf",
            3,
            None,
        );
        assert_eq!(merged["doc_type"], "pleading");
        assert_eq!(merged["source"], "brief.pdf");
        assert_eq!(merged["page_count"], 3);
        assert!(merged.get("raw_ocr_preview").is_none());
    }

    #[test]
    fn snippets_copied_only_when_model_lacks_them() {
        let local = local_with(&[("important_snippets", json!("local text"))]);

        let merged = merge(DocType::Medical, &local, Map::new(), "a.pdf", 1, None);
        assert_eq!(merged["snippets"], "local text");

        let mut model = Map::new();
        model.insert("snippets".into(), json!("model text"));
        let merged = merge(DocType::Medical, &local, model, "a.pdf", 1, None);
        assert_eq!(merged["snippets"], "model text");
    }

    #[test]
    fn name_candidate_fills_patient_name_and_member_independently() {
        let local = local_with(&[("name_candidate", json!("Patient: Jane Smith"))]);

        let merged = merge(DocType::Medical, &local, Map::new(), "a.png", 1, None);
        assert_eq!(merged["patient_name"], "Patient: Jane Smith");
        assert_eq!(merged["member"], "Patient: Jane Smith");

        // A model-provided patient_name must not block the member fill.
        let mut model = Map::new();
        model.insert("patient_name".into(), json!("Jane Smith"));
        let merged = merge(DocType::Medical, &local, model, "a.png", 1, None);
        assert_eq!(merged["patient_name"], "Jane Smith");
        assert_eq!(merged["member"], "Patient: Jane Smith");
    }

    #[test]
    fn transcript_citations_copied_from_local_when_missing() {
        let cites = json!([{"page": 17, "line": "Line 22", "text": "A: Yes. Line 22"}]);
        let local = local_with(&[("local_citations", cites.clone())]);

        let merged = merge(DocType::Transcript, &local, Map::new(), "depo.pdf", 2, None);
        assert_eq!(merged["citations"], cites);

        // Other doc types never receive citations.
        let merged = merge(DocType::Medical, &local, Map::new(), "depo.pdf", 2, None);
        assert!(merged.get("citations").is_none());
    }

    #[test]
    fn audit_preview_is_attached_when_provided() {
        let merged = merge(
            DocType::Imaging,
            &LocalCandidates::new(),
            Map::new(),
            "mri.pdf",
            1,
            Some("RAW OCR".into()),
        );
        assert_eq!(merged["raw_ocr_preview"], "RAW OCR");
    }

    #[test]
    fn redaction_masks_ssn_phone_and_email() {
        let mut v = json!({
            "note": "SSN 123-45-6789 call 555-123-4567 mail a@b.com",
            "nested": {"list": ["reach me at 555-987-6543"]}
        });
        redact_in_place(&mut v);
        let note = v["note"].as_str().unwrap();
        assert!(note.contains("***-**-****"), "{note}");
        assert!(note.contains("***-***-****"), "{note}");
        assert!(note.contains("***@***.***"), "{note}");
        assert!(!note.contains("123-45-6789"));
        assert_eq!(v["nested"]["list"][0], "reach me at ***-***-****");
    }

    #[test]
    fn redaction_is_idempotent() {
        let mut once = json!({
            "s": "SSN 123-45-6789, phone (555) 123-4567, mail a@b.com",
            "arr": ["987-65-4321"]
        });
        redact_in_place(&mut once);
        let mut twice = once.clone();
        redact_in_place(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn redaction_leaves_numbers_and_booleans_alone() {
        let mut v = json!({"page_count": 3, "ok": true, "confidence": 0.9});
        let before = v.clone();
        redact_in_place(&mut v);
        assert_eq!(v, before);
    }
}
