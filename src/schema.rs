//! Per-type function schemas for the remote extractor.
//!
//! Each document type maps to one OpenAI function definition whose
//! `parameters` object constrains the model output. The registry is the
//! single place where field sets live; the merger and tests read the same
//! definitions the request body ships.
//!
//! Unknown documents get the full list of six schemas with the forced call
//! defaulting to `extract_medical_json` — the model sees every shape and the
//! medical schema is the least wrong fallback for intake mail.

use crate::doctype::DocType;
use serde_json::{json, Value};

/// Function name the request forces for the given type.
pub fn function_name_for(doc_type: DocType) -> &'static str {
    match doc_type {
        DocType::Medical | DocType::Unknown => "extract_medical_json",
        DocType::Pleading => "extract_pleading_json",
        DocType::Police => "extract_police_json",
        DocType::Transcript => "extract_transcript_json",
        DocType::InsuranceEob => "extract_eob_json",
        DocType::Imaging => "extract_imaging_json",
    }
}

/// Function definitions attached to the request: the matching schema, or all
/// six for [`DocType::Unknown`].
pub fn functions_for(doc_type: DocType) -> Vec<Value> {
    match doc_type {
        DocType::Medical => vec![schema_medical()],
        DocType::Pleading => vec![schema_pleading()],
        DocType::Police => vec![schema_police()],
        DocType::Transcript => vec![schema_transcript()],
        DocType::InsuranceEob => vec![schema_eob()],
        DocType::Imaging => vec![schema_imaging()],
        DocType::Unknown => vec![
            schema_medical(),
            schema_pleading(),
            schema_police(),
            schema_transcript(),
            schema_eob(),
            schema_imaging(),
        ],
    }
}

fn string_prop() -> Value {
    json!({"type": "string"})
}

fn string_array_prop() -> Value {
    json!({"type": "array", "items": {"type": "string"}})
}

fn schema_medical() -> Value {
    json!({
        "name": "extract_medical_json",
        "description": "Return compact JSON for medical record",
        "parameters": {
            "type": "object",
            "properties": {
                "patient_name": string_prop(),
                "dob": string_prop(),
                "dates_of_service": string_array_prop(),
                "diagnoses": string_array_prop(),
                "procedures": string_array_prop(),
                "medications": string_array_prop(),
                "confidence": {"type": "number"}
            },
            "required": ["patient_name", "confidence"]
        }
    })
}

fn schema_pleading() -> Value {
    json!({
        "name": "extract_pleading_json",
        "description": "Return compact JSON for pleading",
        "parameters": {
            "type": "object",
            "properties": {
                "court": string_prop(),
                "caption": string_prop(),
                "index_number": string_prop(),
                "parties": string_array_prop(),
                "causes_of_action": string_array_prop(),
                "relief_sought": string_prop(),
                "confidence": {"type": "number"}
            },
            "required": ["caption", "confidence"]
        }
    })
}

fn schema_police() -> Value {
    json!({
        "name": "extract_police_json",
        "description": "Return compact JSON for police report",
        "parameters": {
            "type": "object",
            "properties": {
                "report_number": string_prop(),
                "incident_date": string_prop(),
                "location": string_prop(),
                "officer": string_prop(),
                "vehicles": string_array_prop(),
                "injuries": string_array_prop(),
                "violations": string_array_prop(),
                "confidence": {"type": "number"}
            },
            "required": ["incident_date", "confidence"]
        }
    })
}

fn schema_transcript() -> Value {
    json!({
        "name": "extract_transcript_json",
        "description": "Return compact JSON for deposition or 50-h transcript",
        "parameters": {
            "type": "object",
            "properties": {
                "witness_name": string_prop(),
                "date": string_prop(),
                "key_admissions": string_array_prop(),
                "key_inconsistencies": string_array_prop(),
                "credibility_factors": string_array_prop(),
                "citations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "page": {"type": "integer"},
                            "line": {"type": "string"},
                            "text": {"type": "string"}
                        },
                        "required": ["page", "text"]
                    }
                },
                "confidence": {"type": "number"}
            },
            "required": ["confidence"]
        }
    })
}

fn schema_eob() -> Value {
    json!({
        "name": "extract_eob_json",
        "description": "Return compact JSON for insurance explanation of benefits",
        "parameters": {
            "type": "object",
            "properties": {
                "payer": string_prop(),
                "member": string_prop(),
                "claim_number": string_prop(),
                "service_dates": string_array_prop(),
                "allowed_amount": string_prop(),
                "denied_amount": string_prop(),
                "adjustments": string_array_prop(),
                "confidence": {"type": "number"}
            },
            "required": ["payer", "claim_number", "confidence"]
        }
    })
}

fn schema_imaging() -> Value {
    json!({
        "name": "extract_imaging_json",
        "description": "Return compact JSON for imaging report",
        "parameters": {
            "type": "object",
            "properties": {
                "patient_name": string_prop(),
                "study_type": string_prop(),
                "study_date": string_prop(),
                "impression": string_array_prop(),
                "findings": string_array_prop(),
                "confidence": {"type": "number"}
            },
            "required": ["impression", "confidence"]
        }
    })
}
