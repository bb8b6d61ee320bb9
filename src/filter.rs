use serde::Serialize;
use serde_json::Value;

use crate::calc::{CalcError, ProfileTable, StudentProfile};

/// Optional predicate set over the profile table. All supplied predicates
/// combine with AND.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileQuery {
    pub subject: Option<String>,
    pub below: Option<f64>,
    pub performance: Option<String>,
    pub risk: Option<String>,
    pub search: Option<String>,
}

fn opt_string(obj: &serde_json::Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(format!("query.{} must be string or null", key));
            };
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
    }
}

/// A threshold that is missing, null, or fails to parse as a number is
/// treated as absent, never as an error.
fn opt_threshold(obj: &serde_json::Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn parse_profile_query(raw: Option<&Value>) -> Result<ProfileQuery, CalcError> {
    let Some(raw) = raw else {
        return Ok(ProfileQuery::default());
    };
    if raw.is_null() {
        return Ok(ProfileQuery::default());
    }
    let Some(obj) = raw.as_object() else {
        return Err(CalcError::new("bad_params", "query must be an object"));
    };

    let subject = opt_string(obj, "subject").map_err(|m| CalcError::new("bad_params", m))?;
    let performance = opt_string(obj, "performance").map_err(|m| CalcError::new("bad_params", m))?;
    let risk = opt_string(obj, "risk").map_err(|m| CalcError::new("bad_params", m))?;
    let search = opt_string(obj, "search").map_err(|m| CalcError::new("bad_params", m))?;
    let below = opt_threshold(obj, "below");

    Ok(ProfileQuery {
        subject,
        below,
        performance,
        risk,
        search,
    })
}

/// Apply the predicate set, preserving source row order.
///
/// The subject predicate is two-part: first keep students with a nonzero
/// score in that subject, then (if a threshold was given) keep only scores
/// strictly below it. A subject missing from the table matches nothing.
pub fn apply_profile_query(table: &ProfileTable, query: &ProfileQuery) -> Vec<StudentProfile> {
    let mut rows: Vec<&StudentProfile> = table.profiles.iter().collect();

    if let Some(subject) = &query.subject {
        if !table.subjects.iter().any(|s| s == subject) {
            return Vec::new();
        }
        rows.retain(|p| p.scores.get(subject).copied().unwrap_or(0.0) > 0.0);
    }
    if let Some(performance) = &query.performance {
        rows.retain(|p| p.performance_level.as_str() == performance.as_str());
    }
    if let Some(risk) = &query.risk {
        rows.retain(|p| p.risk_level.as_str() == risk.as_str());
    }
    if let Some(search) = &query.search {
        let needle = search.to_lowercase();
        rows.retain(|p| {
            p.student_name.to_lowercase().contains(&needle) || p.student_id == *search
        });
    }
    if let (Some(subject), Some(below)) = (&query.subject, query.below) {
        rows.retain(|p| p.scores.get(subject).copied().unwrap_or(0.0) < below);
    }

    rows.into_iter().cloned().collect()
}
