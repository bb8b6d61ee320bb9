use rusqlite::Connection;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// Source collections mirrored from the upstream results database. Each table
/// stores raw documents verbatim; nothing computed is ever written back.
pub const COLLECTIONS: [&str; 4] = ["exam_results", "exams", "subjects", "students"];

fn table_for(collection: &str) -> Option<&'static str> {
    // Table names cannot be bound as SQL parameters; map through a fixed list.
    match collection {
        "exam_results" => Some("exam_results"),
        "exams" => Some("exams"),
        "subjects" => Some("subjects"),
        "students" => Some("students"),
        _ => None,
    }
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("scoreboard.sqlite3");
    let conn = Connection::open(db_path)?;

    for table in COLLECTIONS {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {}(
                    id TEXT PRIMARY KEY,
                    doc TEXT NOT NULL
                )",
                table
            ),
            [],
        )?;
    }

    Ok(conn)
}

pub fn put_doc(conn: &Connection, collection: &str, id: &str, doc: &Value) -> anyhow::Result<()> {
    let Some(table) = table_for(collection) else {
        anyhow::bail!("unknown collection: {}", collection);
    };
    conn.execute(
        &format!("INSERT OR REPLACE INTO {}(id, doc) VALUES (?, ?)", table),
        (id, serde_json::to_string(doc)?),
    )?;
    Ok(())
}

pub fn count_docs(conn: &Connection, collection: &str) -> anyhow::Result<i64> {
    let Some(table) = table_for(collection) else {
        anyhow::bail!("unknown collection: {}", collection);
    };
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
    Ok(n)
}

fn load_collection(conn: &Connection, collection: &str) -> anyhow::Result<Vec<(String, Value)>> {
    let Some(table) = table_for(collection) else {
        anyhow::bail!("unknown collection: {}", collection);
    };
    let mut stmt = conn.prepare(&format!("SELECT id, doc FROM {} ORDER BY id", table))?;
    let rows = stmt
        .query_map([], |r| {
            let id: String = r.get(0)?;
            let doc: String = r.get(1)?;
            Ok((id, doc))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let mut out = Vec::with_capacity(rows.len());
    for (id, raw) in rows {
        // A row that no longer parses is a corrupt store, not a field defect.
        let doc: Value = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("corrupt document {}/{}: {}", collection, id, e))?;
        out.push((id, doc));
    }
    Ok(out)
}

fn field_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Fetch every exam result joined with its exam, subject and student
/// documents, in the shape the normalizer consumes: the raw result fields at
/// the top level plus nested `exam` / `subject` / `student` sub-objects where
/// the join resolved. Missing joins embed nothing; field-level defaults are
/// the normalizer's job.
///
/// Results are ordered by document id so the snapshot is deterministic
/// regardless of insertion order.
pub fn fetch_joined_results(conn: &Connection) -> anyhow::Result<Vec<Value>> {
    let results = load_collection(conn, "exam_results")?;

    let exams: HashMap<String, Value> = load_collection(conn, "exams")?.into_iter().collect();
    let subjects: HashMap<String, Value> = load_collection(conn, "subjects")?.into_iter().collect();
    let students: HashMap<String, Value> = load_collection(conn, "students")?.into_iter().collect();

    let mut joined = Vec::with_capacity(results.len());
    for (id, doc) in results {
        let mut obj: Map<String, Value> = match doc {
            Value::Object(m) => m,
            // Non-object result docs degrade to an empty record.
            _ => Map::new(),
        };
        obj.insert("_id".to_string(), Value::String(id));

        if let Some(exam) = field_str(&obj, "examId").and_then(|eid| exams.get(&eid)) {
            let subject = exam
                .get("subject")
                .and_then(|v| v.as_str())
                .and_then(|sid| subjects.get(sid));
            obj.insert("exam".to_string(), exam.clone());
            if let Some(subject) = subject {
                obj.insert("subject".to_string(), subject.clone());
            }
        }
        if let Some(student) = field_str(&obj, "studentId").and_then(|sid| students.get(&sid)) {
            obj.insert("student".to_string(), student.clone());
        }

        joined.push(Value::Object(obj));
    }
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_workspace(prefix: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ))
    }

    #[test]
    fn joins_embed_exam_subject_and_student() {
        let ws = temp_workspace("scoreboard-db-join");
        let conn = open_db(&ws).expect("open db");

        put_doc(&conn, "subjects", "sub-1", &json!({ "_id": "sub-1", "name": "Math" }))
            .expect("put subject");
        put_doc(
            &conn,
            "exams",
            "ex-1",
            &json!({ "_id": "ex-1", "title": "Algebra Midterm", "subject": "sub-1" }),
        )
        .expect("put exam");
        put_doc(
            &conn,
            "students",
            "stu-1",
            &json!({ "_id": "stu-1", "firstName": "Ada", "lastName": "Lovelace" }),
        )
        .expect("put student");
        put_doc(
            &conn,
            "exam_results",
            "res-1",
            &json!({
                "examId": "ex-1",
                "studentId": "stu-1",
                "totalMarksObtained": 42,
                "totalMaxMarks": 50
            }),
        )
        .expect("put result");

        let joined = fetch_joined_results(&conn).expect("fetch");
        assert_eq!(joined.len(), 1);
        let doc = &joined[0];
        assert_eq!(
            doc.get("subject").and_then(|s| s.get("name")).and_then(|v| v.as_str()),
            Some("Math")
        );
        assert_eq!(
            doc.get("student")
                .and_then(|s| s.get("firstName"))
                .and_then(|v| v.as_str()),
            Some("Ada")
        );
        assert_eq!(
            doc.get("exam").and_then(|e| e.get("title")).and_then(|v| v.as_str()),
            Some("Algebra Midterm")
        );

        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn missing_joins_leave_sub_documents_absent() {
        let ws = temp_workspace("scoreboard-db-missing-join");
        let conn = open_db(&ws).expect("open db");

        put_doc(
            &conn,
            "exam_results",
            "res-1",
            &json!({ "examId": "ex-gone", "studentId": "stu-gone", "totalMarksObtained": 5 }),
        )
        .expect("put result");

        let joined = fetch_joined_results(&conn).expect("fetch");
        assert_eq!(joined.len(), 1);
        assert!(joined[0].get("exam").is_none());
        assert!(joined[0].get("subject").is_none());
        assert!(joined[0].get("student").is_none());

        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn rejects_unknown_collection() {
        let ws = temp_workspace("scoreboard-db-unknown");
        let conn = open_db(&ws).expect("open db");
        assert!(put_doc(&conn, "grades", "x", &json!({})).is_err());
        let _ = std::fs::remove_dir_all(ws);
    }
}
