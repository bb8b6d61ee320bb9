use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

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

/// Bundle keys in the import file mapped to their store collections.
const BUNDLE_COLLECTIONS: [(&str, &str); 4] = [
    ("examResults", "exam_results"),
    ("exams", "exams"),
    ("subjects", "subjects"),
    ("students", "students"),
];

fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let path = match required_str(req, "path") {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    let raw = match std::fs::read_to_string(&path) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "import_failed",
                format!("cannot read {}: {}", path, e),
                None,
            )
        }
    };
    let bundle: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "import_failed",
                format!("invalid bundle json: {}", e),
                None,
            )
        }
    };

    let mut imported = serde_json::Map::new();
    let mut totals = serde_json::Map::new();
    for (key, collection) in BUNDLE_COLLECTIONS {
        let docs = bundle.get(key).and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let mut count = 0_i64;
        for doc in docs {
            // Documents are stored verbatim; ids come from _id or are minted.
            let id = doc
                .get("_id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            if let Err(e) = db::put_doc(conn, collection, &id, &doc) {
                return err(&req.id, "db_query_failed", format!("{e:?}"), None);
            }
            count += 1;
        }
        imported.insert(key.to_string(), json!(count));

        let total = match db::count_docs(conn, collection) {
            Ok(n) => n,
            Err(e) => return err(&req.id, "db_query_failed", format!("{e:?}"), None),
        };
        totals.insert(key.to_string(), json!(total));
    }

    ok(&req.id, json!({ "imported": imported, "totals": totals }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.import" => Some(handle_import(state, req)),
        _ => None,
    }
}
