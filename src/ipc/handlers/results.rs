use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::report::ExamResultRow;
use crate::store;
use serde_json::json;

fn parse_rows(req: &Request) -> Result<Vec<ExamResultRow>, serde_json::Value> {
    let Some(raw) = req.params.get("rows") else {
        return Err(err(&req.id, "bad_params", "missing rows", None));
    };
    if !raw.is_array() {
        return Err(err(&req.id, "bad_params", "rows must be an array", None));
    }
    let rows: Vec<ExamResultRow> = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => {
            return Err(err(
                &req.id,
                "bad_params",
                format!("rows did not parse: {}", e),
                None,
            ))
        }
    };
    if rows.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            "rows must contain at least one result",
            None,
        ));
    }
    for (i, row) in rows.iter().enumerate() {
        if let Err(msg) = store::validate_row(row) {
            return Err(err(
                &req.id,
                "bad_params",
                msg,
                Some(json!({ "rowIndex": i })),
            ));
        }
    }
    Ok(rows)
}

fn handle_results_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let rows = match parse_rows(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match store::upsert_rows(conn, &rows) {
        Ok(counts) => {
            // Any write invalidates every memoized row set.
            state.cache.clear();
            ok(
                &req.id,
                json!({ "inserted": counts.inserted, "updated": counts.updated }),
            )
        }
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "exam_results" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.upsert" => Some(handle_results_upsert(state, req)),
        _ => None,
    }
}
