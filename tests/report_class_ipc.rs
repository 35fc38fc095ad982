mod test_support;

use serde_json::json;
use test_support::{request_ok, result_row, spawn_sidecar, temp_dir};

fn seed_class(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
) {
    let mut rows = Vec::new();
    for i in 1..=12 {
        rows.push(result_row(
            &format!("S{}", i),
            &format!("Student {}", i),
            "12A",
            "E1",
            "Weekly 1",
            "2025-01-10",
            500 - (i as i64) * 5,
            i as i64,
        ));
    }
    // A second exam for the same class.
    rows.push(result_row(
        "S1", "Student 1", "12A", "E2", "Weekly 2", "2025-02-10", 470, 4,
    ));
    let _ = request_ok(stdin, reader, "seed", "results.upsert", json!({ "rows": rows }));
}

#[test]
fn report_class_filtered_to_one_exam() {
    let workspace = temp_dir("examdash-report-class");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_class(&mut stdin, &mut reader);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "report.class",
        json!({ "className": "12A", "examId": "E1" }),
    );
    let report = result.get("report").expect("report");

    assert_eq!(
        report.get("examName").and_then(|v| v.as_str()),
        Some("Weekly 1")
    );
    assert_eq!(
        report.get("studentCount").and_then(|v| v.as_u64()),
        Some(12)
    );
    assert_eq!(
        report
            .get("rows")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(12)
    );

    let top = report
        .get("topPerformers")
        .and_then(|v| v.as_array())
        .expect("topPerformers");
    assert_eq!(top.len(), 10);
    for pair in top.windows(2) {
        let a = pair[0].get("rank").and_then(|v| v.as_i64()).expect("rank");
        let b = pair[1].get("rank").and_then(|v| v.as_i64()).expect("rank");
        assert!(a <= b, "top performers must be sorted ascending by rank");
    }

    let scores = report.get("scores").expect("scores");
    let min = scores.get("min").and_then(|v| v.as_i64()).expect("min");
    let max = scores.get("max").and_then(|v| v.as_i64()).expect("max");
    assert_eq!(min, 440);
    assert_eq!(max, 495);
    assert!(scores.get("stdDev").and_then(|v| v.as_f64()).expect("stdDev") > 0.0);

    // Full distribution summary rides along for the class view.
    let dist = report.get("distribution").expect("distribution");
    let q1 = dist.get("q1").and_then(|v| v.as_f64()).expect("q1");
    let median = dist.get("median").and_then(|v| v.as_f64()).expect("median");
    let q3 = dist.get("q3").and_then(|v| v.as_f64()).expect("q3");
    assert!(min as f64 <= q1 && q1 <= median && median <= q3 && q3 <= max as f64);
}

#[test]
fn report_class_unfiltered_uses_all_exams_sentinel() {
    let workspace = temp_dir("examdash-report-class-all");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_class(&mut stdin, &mut reader);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "report.class",
        json!({ "className": "12A" }),
    );
    let report = result.get("report").expect("report");
    assert_eq!(
        report.get("examName").and_then(|v| v.as_str()),
        Some("All Exams")
    );
    // Both exams' rows count.
    assert_eq!(
        report.get("studentCount").and_then(|v| v.as_u64()),
        Some(13)
    );
}

#[test]
fn report_class_absent_for_unknown_class() {
    let workspace = temp_dir("examdash-report-class-absent");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "report.class",
        json!({ "className": "9Z" }),
    );
    assert!(result.get("report").map(|v| v.is_null()).unwrap_or(false));
}
