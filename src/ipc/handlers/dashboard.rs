use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::{calc, db, filter};
use rusqlite::Connection;
use serde_json::json;

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Run the full pipeline against a fresh snapshot. A fetch failure is fatal
/// for the request; nothing partial is returned.
fn fresh_table(conn: &Connection, req: &Request) -> Result<calc::ProfileTable, serde_json::Value> {
    let docs = db::fetch_joined_results(conn)
        .map_err(|e| err(&req.id, "db_query_failed", format!("{e:?}"), None))?;
    Ok(calc::compute_profile_table(&docs))
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let table = match fresh_table(conn, req) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let performance_levels = table.performance_levels();
    let risk_levels = table.risk_levels();
    ok(
        &req.id,
        json!({
            "subjects": table.subjects,
            "profiles": table.profiles,
            "performanceLevels": performance_levels,
            "riskLevels": risk_levels,
        }),
    )
}

fn handle_filter(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let query = match filter::parse_profile_query(req.params.get("query")) {
        Ok(q) => q,
        Err(e) => return err(&req.id, &e.code, e.message, e.details),
    };
    let table = match fresh_table(conn, req) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let profiles = filter::apply_profile_query(&table, &query);
    let match_count = profiles.len();
    ok(
        &req.id,
        json!({
            "query": query,
            "profiles": profiles,
            "matchCount": match_count,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.open" => Some(handle_open(state, req)),
        "dashboard.filter" => Some(handle_filter(state, req)),
        _ => None,
    }
}
