use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::{calc, db, feedback, normalize};
use rusqlite::Connection;
use serde_json::json;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

fn handle_student_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let docs = match db::fetch_joined_results(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:?}"), None),
    };
    let records = normalize::normalize_attempts(&docs);
    let aggregates = calc::aggregate_attempts(&records);
    let table = calc::build_profile_table(&aggregates);

    let Some(profile) = table.find_student(&student_id) else {
        return err(&req.id, "not_found", "student not found", None);
    };

    let wanted = student_id.trim();
    let student_aggregates: Vec<&calc::SubjectAggregate> = aggregates
        .iter()
        .filter(|a| a.student_id.trim() == wanted)
        .collect();
    let text = feedback::generate_student_feedback(profile, &table.subjects);

    ok(
        &req.id,
        json!({
            "profile": profile,
            "aggregates": student_aggregates,
            "feedback": text,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "report.student" => Some(handle_student_report(state, req)),
        _ => None,
    }
}
