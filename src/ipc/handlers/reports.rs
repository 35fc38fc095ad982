use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::report;
use crate::report::ExamResultRow;
use crate::store::{self, RowsQuery};
use serde_json::json;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .filter(|v| !v.trim().is_empty())
}

/// Row-set fetch through the TTL cache. A query failure is surfaced as
/// `db_query_failed`; an empty row set is a valid result, not an error.
pub fn cached_rows(
    state: &mut AppState,
    req_id: &str,
    key: RowsQuery,
) -> Result<Vec<ExamResultRow>, serde_json::Value> {
    if let Some(rows) = state.cache.get(&key) {
        return Ok(rows);
    }
    let Some(conn) = state.db.as_ref() else {
        return Err(err(req_id, "no_workspace", "select a workspace first", None));
    };
    let fetched = match &key {
        RowsQuery::Student(student_id) => store::student_rows(conn, student_id),
        RowsQuery::Class(class_name, exam_id) => {
            store::class_rows(conn, class_name, exam_id.as_deref())
        }
        RowsQuery::Exam(exam_id) => store::exam_rows(conn, exam_id),
    };
    match fetched {
        Ok(rows) => {
            state.cache.put(key, rows.clone());
            Ok(rows)
        }
        Err(e) => Err(err(req_id, "db_query_failed", e.to_string(), None)),
    }
}

fn handle_report_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let rows = match cached_rows(state, &req.id, RowsQuery::Student(student_id)) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    ok(&req.id, json!({ "report": report::student_report(&rows) }))
}

fn handle_report_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_name = match required_str(req, "className") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let exam_id = optional_str(req, "examId");
    let exam_filtered = exam_id.is_some();
    let rows = match cached_rows(state, &req.id, RowsQuery::Class(class_name, exam_id)) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({ "report": report::class_report(&rows, exam_filtered) }),
    )
}

fn handle_report_comparative(state: &mut AppState, req: &Request) -> serde_json::Value {
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let rows = match cached_rows(state, &req.id, RowsQuery::Exam(exam_id)) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({ "report": report::comparative_analysis(&rows) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "report.student" => Some(handle_report_student(state, req)),
        "report.class" => Some(handle_report_class(state, req)),
        "report.comparative" => Some(handle_report_comparative(state, req)),
        _ => None,
    }
}
