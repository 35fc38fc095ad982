#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde_json::json;
use uuid::Uuid;

pub fn temp_dir(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}-{}", prefix, Uuid::new_v4()))
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_examdashd"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn sidecar");
    let stdin = child.stdin.take().expect("sidecar stdin");
    let stdout = child.stdout.take().expect("sidecar stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let req = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", req).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response");
    serde_json::from_str(&line).expect("parse response")
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let resp = request(stdin, reader, id, method, params);
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "expected ok response for {}: {}",
        method,
        resp
    );
    resp.get("result").cloned().expect("result")
}

pub fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let resp = request(stdin, reader, id, method, params);
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "expected error response for {}: {}",
        method,
        resp
    );
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

/// One exam-result row in upsert wire shape. Subject marks split the total
/// so that per-subject aggregates stay consistent with it.
pub fn result_row(
    student_id: &str,
    student_name: &str,
    class_name: &str,
    exam_id: &str,
    exam_name: &str,
    exam_date: &str,
    total_marks: i64,
    rank: i64,
) -> serde_json::Value {
    let quarter = total_marks / 4;
    json!({
        "studentId": student_id,
        "studentName": student_name,
        "fatherName": format!("{} Sr.", student_name),
        "rollNo": format!("R-{}", student_id),
        "className": class_name,
        "examId": exam_id,
        "examName": exam_name,
        "examDate": exam_date,
        "totalMarks": total_marks,
        "rank": rank,
        "classRank": rank,
        "physicsMarks": quarter,
        "chemistryMarks": quarter,
        "botanyMarks": quarter,
        "zoologyMarks": total_marks - 3 * quarter
    })
}
