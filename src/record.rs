use serde::{Deserialize, Serialize};

/// Raw capture result in the source vocabulary. Every field starts out empty
/// and stays empty unless the document carried its signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub bed_number: String,
    pub patient_name: String,
    pub gender: String,
    pub age: String,
    pub patient_number: String,
    pub diagnosis: String,
    pub operation: String,
    pub surgeon: String,
    pub anesthesia: String,
}

/// Caller-facing surgery case, keyed the way the schedule table names its columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SurgeryRecord {
    pub bed_number: String,
    pub patient_name: String,
    pub gender: String,
    pub age: i64,
    pub hospital_number: String,
    pub diagnosis: String,
    pub operation: String,
    pub main_surgeon: String,
    pub anesthesia_doctor: String,
    pub anesthesia_type: String,
}
