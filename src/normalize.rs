use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One exam attempt, flattened from a joined result document. Every field is
/// populated: missing or malformed source values degrade to the declared
/// default here, so nothing downstream branches on "field absent".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub student_id: String,
    pub student_name: String,
    pub subject: String,
    pub score_obtained: f64,
    pub max_score: f64,
    pub feedback_text: String,
    pub evaluation_details: Vec<Value>,
    pub exam_title: String,
    pub created_at: Option<DateTime<Utc>>,
}

fn str_field(doc: &Value, key: &str) -> String {
    doc.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn num_field(doc: &Value, key: &str) -> f64 {
    let v = doc.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn nested_str(doc: &Value, outer: &str, key: &str) -> String {
    doc.get(outer)
        .map(|sub| str_field(sub, key))
        .unwrap_or_default()
}

fn parse_created_at(doc: &Value) -> Option<DateTime<Utc>> {
    doc.get("createdAt")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Flatten one joined result document into an attempt record.
pub fn normalize_attempt(doc: &Value) -> AttemptRecord {
    let first = nested_str(doc, "student", "firstName");
    let last = nested_str(doc, "student", "lastName");
    let full_name = format!("{} {}", first, last).trim().to_string();
    let student_name = if full_name.is_empty() {
        "Unknown Student".to_string()
    } else {
        full_name
    };

    let subject_name = nested_str(doc, "subject", "name");
    let subject = if subject_name.is_empty() {
        "Unknown".to_string()
    } else {
        subject_name
    };

    let evaluation_details = doc
        .get("evaluationDetails")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    AttemptRecord {
        student_id: str_field(doc, "studentId"),
        student_name,
        subject,
        score_obtained: num_field(doc, "totalMarksObtained"),
        max_score: num_field(doc, "totalMaxMarks"),
        feedback_text: str_field(doc, "feedback"),
        evaluation_details,
        exam_title: nested_str(doc, "exam", "title"),
        created_at: parse_created_at(doc),
    }
}

/// Flatten a joined snapshot. Empty input yields an empty output; no record
/// is dropped for a missing join.
pub fn normalize_attempts(docs: &[Value]) -> Vec<AttemptRecord> {
    docs.iter().map(normalize_attempt).collect()
}
