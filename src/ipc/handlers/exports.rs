use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::report::ExamResultRow;
use crate::store::RowsQuery;
use serde_json::json;

use super::reports::cached_rows;

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn class_rows_csv(rows: &[ExamResultRow]) -> String {
    let mut csv = String::from(
        "student_id,student_name,father_name,roll_no,class_name,phone,exam_id,exam_name,exam_date,total_marks,rank,class_rank,physics_marks,chemistry_marks,botany_marks,zoology_marks\n",
    );
    for r in rows {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            csv_quote(&r.student_id),
            csv_quote(&r.student_name),
            csv_quote(&r.father_name),
            csv_quote(&r.roll_no),
            csv_quote(&r.class_name),
            csv_quote(r.phone.as_deref().unwrap_or("")),
            csv_quote(&r.exam_id),
            csv_quote(&r.exam_name),
            csv_quote(&r.exam_date),
            r.total_marks,
            r.rank,
            r.class_rank,
            r.physics_marks,
            r.chemistry_marks,
            r.botany_marks,
            r.zoology_marks,
        ));
    }
    csv
}

fn handle_export_class_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(class_name) = req.params.get("className").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing className", None);
    };
    let Some(out_path) = req.params.get("outPath").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };
    let exam_id = req
        .params
        .get("examId")
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .filter(|v| !v.trim().is_empty());

    let key = RowsQuery::Class(class_name.to_string(), exam_id);
    let rows = match cached_rows(state, &req.id, key) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if rows.is_empty() {
        return err(
            &req.id,
            "no_data",
            "class has no exam results",
            Some(json!({ "className": class_name })),
        );
    }

    let csv = class_rows_csv(&rows);
    if let Some(parent) = std::path::Path::new(out_path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return err(&req.id, "write_failed", e.to_string(), None);
            }
        }
    }
    if let Err(e) = std::fs::write(out_path, &csv) {
        return err(
            &req.id,
            "write_failed",
            e.to_string(),
            Some(json!({ "path": out_path })),
        );
    }

    ok(&req.id, json!({ "path": out_path, "rows": rows.len() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.classCsv" => Some(handle_export_class_csv(state, req)),
        _ => None,
    }
}
