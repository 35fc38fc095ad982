use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::report::ExamResultRow;

const ROW_COLUMNS: &str = "student_id, student_name, father_name, roll_no, class_name, phone,
     exam_id, exam_name, exam_date, total_marks, rank, class_rank,
     physics_marks, chemistry_marks, botany_marks, zoology_marks";

fn row_from_sql(r: &Row<'_>) -> rusqlite::Result<ExamResultRow> {
    Ok(ExamResultRow {
        student_id: r.get(0)?,
        student_name: r.get(1)?,
        father_name: r.get(2)?,
        roll_no: r.get(3)?,
        class_name: r.get(4)?,
        phone: r.get(5)?,
        exam_id: r.get(6)?,
        exam_name: r.get(7)?,
        exam_date: r.get(8)?,
        total_marks: r.get(9)?,
        rank: r.get(10)?,
        class_rank: r.get(11)?,
        physics_marks: r.get(12)?,
        chemistry_marks: r.get(13)?,
        botany_marks: r.get(14)?,
        zoology_marks: r.get(15)?,
    })
}

/// All rows for one student, newest exam first.
pub fn student_rows(conn: &Connection, student_id: &str) -> rusqlite::Result<Vec<ExamResultRow>> {
    let sql = format!(
        "SELECT {} FROM exam_results
         WHERE student_id = ?
         ORDER BY exam_date DESC, exam_id DESC",
        ROW_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([student_id], row_from_sql)?;
    rows.collect()
}

/// All rows for one class, optionally restricted to one exam, best rank first.
pub fn class_rows(
    conn: &Connection,
    class_name: &str,
    exam_id: Option<&str>,
) -> rusqlite::Result<Vec<ExamResultRow>> {
    if let Some(exam_id) = exam_id {
        let sql = format!(
            "SELECT {} FROM exam_results
             WHERE class_name = ? AND exam_id = ?
             ORDER BY rank",
            ROW_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map((class_name, exam_id), row_from_sql)?;
        rows.collect()
    } else {
        let sql = format!(
            "SELECT {} FROM exam_results
             WHERE class_name = ?
             ORDER BY rank",
            ROW_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([class_name], row_from_sql)?;
        rows.collect()
    }
}

/// All rows for one exam across classes, best rank first.
pub fn exam_rows(conn: &Connection, exam_id: &str) -> rusqlite::Result<Vec<ExamResultRow>> {
    let sql = format!(
        "SELECT {} FROM exam_results
         WHERE exam_id = ?
         ORDER BY rank",
        ROW_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([exam_id], row_from_sql)?;
    rows.collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_id: String,
    pub student_name: String,
    pub father_name: String,
    pub roll_no: String,
    pub class_name: String,
    pub phone: Option<String>,
}

pub fn list_students(conn: &Connection) -> rusqlite::Result<Vec<StudentSummary>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT student_id, student_name, father_name, roll_no, class_name, phone
         FROM exam_results
         ORDER BY student_name",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(StudentSummary {
            student_id: r.get(0)?,
            student_name: r.get(1)?,
            father_name: r.get(2)?,
            roll_no: r.get(3)?,
            class_name: r.get(4)?,
            phone: r.get(5)?,
        })
    })?;
    rows.collect()
}

pub fn list_classes(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT class_name FROM exam_results ORDER BY class_name")?;
    let rows = stmt.query_map([], |r| r.get(0))?;
    rows.collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSummary {
    pub exam_id: String,
    pub exam_name: String,
    pub exam_date: String,
}

pub fn list_exams(conn: &Connection) -> rusqlite::Result<Vec<ExamSummary>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT exam_id, exam_name, exam_date
         FROM exam_results
         ORDER BY exam_date DESC",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(ExamSummary {
            exam_id: r.get(0)?,
            exam_name: r.get(1)?,
            exam_date: r.get(2)?,
        })
    })?;
    rows.collect()
}

/// Accepted source date formats, normalized to ISO so that text ordering
/// in the store is chronological.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

pub fn normalize_exam_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}

/// Row-level invariants enforced on ingest. Returns the first violation.
pub fn validate_row(row: &ExamResultRow) -> Result<(), String> {
    if row.student_id.trim().is_empty() {
        return Err("studentId must not be empty".to_string());
    }
    if row.exam_id.trim().is_empty() {
        return Err("examId must not be empty".to_string());
    }
    for (name, value) in [
        ("totalMarks", row.total_marks),
        ("physicsMarks", row.physics_marks),
        ("chemistryMarks", row.chemistry_marks),
        ("botanyMarks", row.botany_marks),
        ("zoologyMarks", row.zoology_marks),
    ] {
        if value < 0 {
            return Err(format!("{} must be non-negative", name));
        }
    }
    for (name, value) in [("rank", row.rank), ("classRank", row.class_rank)] {
        if value < 1 {
            return Err(format!("{} must be a positive integer", name));
        }
    }
    if normalize_exam_date(&row.exam_date).is_none() {
        return Err(format!("examDate '{}' is not a recognized date", row.exam_date));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

/// Bulk upsert keyed on (student_id, exam_id). Callers validate rows first;
/// exam dates are normalized to ISO here.
pub fn upsert_rows(conn: &Connection, rows: &[ExamResultRow]) -> rusqlite::Result<UpsertCounts> {
    let mut counts = UpsertCounts::default();
    let now = Utc::now().to_rfc3339();

    for row in rows {
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM exam_results WHERE student_id = ? AND exam_id = ?",
                (&row.student_id, &row.exam_id),
                |r| r.get(0),
            )
            .optional()?;
        if existing.is_some() {
            counts.updated += 1;
        } else {
            counts.inserted += 1;
        }

        let exam_date = normalize_exam_date(&row.exam_date)
            .unwrap_or_else(|| row.exam_date.trim().to_string());
        let row_id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO exam_results(
                id, student_id, student_name, father_name, roll_no, class_name, phone,
                exam_id, exam_name, exam_date, total_marks, rank, class_rank,
                physics_marks, chemistry_marks, botany_marks, zoology_marks, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_id, exam_id) DO UPDATE SET
               student_name = excluded.student_name,
               father_name = excluded.father_name,
               roll_no = excluded.roll_no,
               class_name = excluded.class_name,
               phone = excluded.phone,
               exam_name = excluded.exam_name,
               exam_date = excluded.exam_date,
               total_marks = excluded.total_marks,
               rank = excluded.rank,
               class_rank = excluded.class_rank,
               physics_marks = excluded.physics_marks,
               chemistry_marks = excluded.chemistry_marks,
               botany_marks = excluded.botany_marks,
               zoology_marks = excluded.zoology_marks,
               updated_at = excluded.updated_at",
            rusqlite::params![
                row_id,
                row.student_id,
                row.student_name,
                row.father_name,
                row.roll_no,
                row.class_name,
                row.phone,
                row.exam_id,
                row.exam_name,
                exam_date,
                row.total_marks,
                row.rank,
                row.class_rank,
                row.physics_marks,
                row.chemistry_marks,
                row.botany_marks,
                row.zoology_marks,
                now,
            ],
        )?;
    }

    Ok(counts)
}

/// Cache key for one row-set query. One variant per filter shape so that
/// different filter combinations can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowsQuery {
    Student(String),
    Class(String, Option<String>),
    Exam(String),
}

struct CacheEntry {
    expires_at: Instant,
    rows: Vec<ExamResultRow>,
}

/// Time-boxed memoization of row-set queries, cleared on every write.
pub struct RowsCache {
    ttl: Duration,
    entries: HashMap<RowsQuery, CacheEntry>,
}

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

impl Default for RowsCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl RowsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: &RowsQuery) -> Option<Vec<ExamResultRow>> {
        match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.rows.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&mut self, key: RowsQuery, rows: Vec<ExamResultRow>) {
        self.entries.insert(
            key,
            CacheEntry {
                expires_at: Instant::now() + self.ttl,
                rows,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(student_id: &str, exam_id: &str) -> ExamResultRow {
        ExamResultRow {
            student_id: student_id.to_string(),
            student_name: "Asha".to_string(),
            father_name: "Ram".to_string(),
            roll_no: "R-1".to_string(),
            class_name: "12A".to_string(),
            phone: None,
            exam_id: exam_id.to_string(),
            exam_name: "Weekly 1".to_string(),
            exam_date: "2025-01-15".to_string(),
            total_marks: 412,
            rank: 7,
            class_rank: 2,
            physics_marks: 100,
            chemistry_marks: 104,
            botany_marks: 102,
            zoology_marks: 106,
        }
    }

    #[test]
    fn normalize_exam_date_accepts_known_formats() {
        assert_eq!(
            normalize_exam_date("2025-01-15").as_deref(),
            Some("2025-01-15")
        );
        assert_eq!(
            normalize_exam_date("15/01/2025").as_deref(),
            Some("2025-01-15")
        );
        assert_eq!(
            normalize_exam_date("01/15/2025").as_deref(),
            Some("2025-01-15")
        );
        assert_eq!(normalize_exam_date("Jan 15 2025"), None);
    }

    #[test]
    fn validate_row_rejects_invariant_violations() {
        let good = sample_row("S1", "E1");
        assert!(validate_row(&good).is_ok());

        let mut bad = sample_row("S1", "E1");
        bad.total_marks = -1;
        assert!(validate_row(&bad).is_err());

        let mut bad = sample_row("S1", "E1");
        bad.rank = 0;
        assert!(validate_row(&bad).is_err());

        let mut bad = sample_row("", "E1");
        assert!(validate_row(&bad).is_err());
        bad = sample_row("S1", "E1");
        bad.exam_date = "someday".to_string();
        assert!(validate_row(&bad).is_err());
    }

    #[test]
    fn cache_distinguishes_filter_combinations() {
        let mut cache = RowsCache::default();
        let class_all = RowsQuery::Class("12A".to_string(), None);
        let class_one = RowsQuery::Class("12A".to_string(), Some("E1".to_string()));

        cache.put(class_all.clone(), vec![sample_row("S1", "E1"), sample_row("S1", "E2")]);
        cache.put(class_one.clone(), vec![sample_row("S1", "E1")]);

        assert_eq!(cache.get(&class_all).map(|r| r.len()), Some(2));
        assert_eq!(cache.get(&class_one).map(|r| r.len()), Some(1));
        assert_eq!(cache.get(&RowsQuery::Exam("E1".to_string())), None);
    }

    #[test]
    fn cache_expires_and_clears() {
        let mut cache = RowsCache::new(Duration::ZERO);
        let key = RowsQuery::Student("S1".to_string());
        cache.put(key.clone(), vec![sample_row("S1", "E1")]);
        assert_eq!(cache.get(&key), None);

        let mut cache = RowsCache::default();
        cache.put(key.clone(), vec![sample_row("S1", "E1")]);
        assert!(cache.get(&key).is_some());
        cache.clear();
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn upsert_is_keyed_on_student_and_exam() {
        let workspace = std::env::temp_dir().join(format!(
            "examdash-store-upsert-{}",
            Uuid::new_v4()
        ));
        let conn = crate::db::open_db(&workspace).expect("open db");

        let first = upsert_rows(&conn, &[sample_row("S1", "E1"), sample_row("S2", "E1")])
            .expect("upsert");
        assert_eq!(first, UpsertCounts { inserted: 2, updated: 0 });

        let mut replay = sample_row("S1", "E1");
        replay.total_marks = 450;
        let second = upsert_rows(&conn, &[replay]).expect("upsert");
        assert_eq!(second, UpsertCounts { inserted: 0, updated: 1 });

        let rows = student_rows(&conn, "S1").expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_marks, 450);

        let _ = std::fs::remove_dir_all(&workspace);
    }

    #[test]
    fn student_rows_come_back_newest_first() {
        let workspace = std::env::temp_dir().join(format!(
            "examdash-store-order-{}",
            Uuid::new_v4()
        ));
        let conn = crate::db::open_db(&workspace).expect("open db");

        let mut older = sample_row("S1", "E1");
        older.exam_date = "2024-09-01".to_string();
        let mut newer = sample_row("S1", "E2");
        newer.exam_date = "2025-02-01".to_string();
        upsert_rows(&conn, &[older, newer]).expect("upsert");

        let rows = student_rows(&conn, "S1").expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].exam_id, "E2");
        assert_eq!(rows[1].exam_id, "E1");

        let _ = std::fs::remove_dir_all(&workspace);
    }
}
