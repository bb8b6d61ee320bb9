#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_scoreboardd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn scoreboardd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "expected ok for {}: {}",
        method,
        value
    );
    value.get("result").cloned().expect("result payload")
}

pub fn error_code(response: &serde_json::Value) -> &str {
    response
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

/// Write a results bundle to disk and return its path.
pub fn write_bundle(dir: &std::path::Path, name: &str, bundle: &serde_json::Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(bundle).expect("serialize bundle"))
        .expect("write bundle");
    path
}

/// Two students, two subjects, one exam each per subject: the baseline class
/// used across the dashboard tests.
pub fn sample_bundle() -> serde_json::Value {
    json!({
        "subjects": [
            { "_id": "sub-math", "name": "Math" },
            { "_id": "sub-sci", "name": "Science" }
        ],
        "exams": [
            { "_id": "ex-math", "title": "Math Midterm", "subject": "sub-math" },
            { "_id": "ex-sci", "title": "Science Midterm", "subject": "sub-sci" }
        ],
        "students": [
            { "_id": "stu-1", "firstName": "Ada", "lastName": "Lovelace" },
            { "_id": "stu-2", "firstName": "Grace", "lastName": "Hopper" }
        ],
        "examResults": [
            {
                "_id": "res-1",
                "examId": "ex-math",
                "studentId": "stu-1",
                "totalMarksObtained": 90,
                "totalMaxMarks": 100,
                "feedback": "strong algebra",
                "createdAt": "2024-03-01T09:00:00Z"
            },
            {
                "_id": "res-2",
                "examId": "ex-sci",
                "studentId": "stu-1",
                "totalMarksObtained": 80,
                "totalMaxMarks": 100,
                "feedback": "good lab work",
                "createdAt": "2024-03-02T09:00:00Z"
            },
            {
                "_id": "res-3",
                "examId": "ex-math",
                "studentId": "stu-2",
                "totalMarksObtained": 90,
                "totalMaxMarks": 100,
                "feedback": "",
                "createdAt": "2024-03-01T09:30:00Z"
            },
            {
                "_id": "res-4",
                "examId": "ex-sci",
                "studentId": "stu-2",
                "totalMarksObtained": 80,
                "totalMaxMarks": 100,
                "feedback": "careful observations",
                "createdAt": "2024-03-02T09:30:00Z"
            }
        ]
    })
}
