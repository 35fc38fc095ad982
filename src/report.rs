use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::stats::{self, DistributionSummary, Trend};

/// One student's result record for one exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResultRow {
    pub student_id: String,
    pub student_name: String,
    pub father_name: String,
    pub roll_no: String,
    pub class_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub exam_id: String,
    pub exam_name: String,
    pub exam_date: String,
    pub total_marks: i64,
    pub rank: i64,
    pub class_rank: i64,
    pub physics_marks: i64,
    pub chemistry_marks: i64,
    pub botany_marks: i64,
    pub zoology_marks: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Subject {
    Physics,
    Chemistry,
    Botany,
    Zoology,
}

pub const SUBJECTS: [Subject; 4] = [
    Subject::Physics,
    Subject::Chemistry,
    Subject::Botany,
    Subject::Zoology,
];

impl Subject {
    pub fn label(self) -> &'static str {
        match self {
            Subject::Physics => "Physics",
            Subject::Chemistry => "Chemistry",
            Subject::Botany => "Botany",
            Subject::Zoology => "Zoology",
        }
    }

    pub fn mark(self, row: &ExamResultRow) -> i64 {
        match self {
            Subject::Physics => row.physics_marks,
            Subject::Chemistry => row.chemistry_marks,
            Subject::Botany => row.botany_marks,
            Subject::Zoology => row.zoology_marks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    pub name: String,
    pub father: String,
    pub roll_no: String,
    pub class_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAggregate {
    pub subject: &'static str,
    pub average: f64,
    pub max: i64,
    pub min: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student: StudentInfo,
    pub exam_count: usize,
    pub average_score: f64,
    pub best_score: i64,
    pub worst_score: i64,
    pub average_rank: f64,
    pub best_rank: i64,
    pub subjects: Vec<SubjectAggregate>,
    pub trend: Trend,
    pub exams: Vec<ExamResultRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreStatistics {
    pub average: f64,
    pub median: f64,
    pub std_dev: Option<f64>,
    pub max: i64,
    pub min: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject: &'static str,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformer {
    pub student_name: String,
    pub total_marks: i64,
    pub rank: i64,
}

/// Sentinel exam name for a class report that spans every exam.
pub const ALL_EXAMS: &str = "All Exams";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReport {
    pub class_name: String,
    pub student_count: usize,
    pub exam_name: String,
    pub scores: ScoreStatistics,
    pub distribution: Option<DistributionSummary>,
    pub subject_averages: Vec<SubjectAverage>,
    pub top_performers: Vec<TopPerformer>,
    pub rows: Vec<ExamResultRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPerformance {
    pub class_name: String,
    pub student_count: usize,
    pub average: f64,
    pub median: f64,
    pub std_dev: Option<f64>,
    pub physics_average: f64,
    pub chemistry_average: f64,
    pub botany_average: f64,
    pub zoology_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparativeAnalysis {
    pub exam_name: String,
    pub student_count: usize,
    pub overall_average: f64,
    pub classes: Vec<ClassPerformance>,
}

fn totals(rows: &[ExamResultRow]) -> Vec<f64> {
    rows.iter().map(|r| r.total_marks as f64).collect()
}

fn subject_values(rows: &[ExamResultRow], subject: Subject) -> Vec<f64> {
    rows.iter().map(|r| subject.mark(r) as f64).collect()
}

/// Student report over the student's rows, ordered by exam date descending.
/// `None` when the student has no rows.
pub fn student_report(rows: &[ExamResultRow]) -> Option<StudentReport> {
    let latest = rows.first()?;

    let total_values = totals(rows);
    let rank_values: Vec<f64> = rows.iter().map(|r| r.rank as f64).collect();

    let subjects = SUBJECTS
        .iter()
        .map(|&subject| SubjectAggregate {
            subject: subject.label(),
            average: stats::mean(&subject_values(rows, subject)),
            max: rows.iter().map(|r| subject.mark(r)).max().unwrap_or(0),
            min: rows.iter().map(|r| subject.mark(r)).min().unwrap_or(0),
        })
        .collect();

    // Rows arrive newest-first; the trend wants chronological order.
    let chronological: Vec<f64> = total_values.iter().rev().copied().collect();

    Some(StudentReport {
        student: StudentInfo {
            name: latest.student_name.clone(),
            father: latest.father_name.clone(),
            roll_no: latest.roll_no.clone(),
            class_name: latest.class_name.clone(),
            phone: latest.phone.clone(),
        },
        exam_count: rows.len(),
        average_score: stats::mean(&total_values),
        best_score: rows.iter().map(|r| r.total_marks).max().unwrap_or(0),
        worst_score: rows.iter().map(|r| r.total_marks).min().unwrap_or(0),
        average_rank: stats::mean(&rank_values),
        best_rank: rows.iter().map(|r| r.rank).min().unwrap_or(0),
        subjects,
        trend: stats::classify_trend(&chronological),
        exams: rows.to_vec(),
    })
}

/// Class report over the class's rows, optionally restricted to one exam.
/// `exam_filtered` marks whether the row set was restricted; it controls
/// the report's exam name (`ALL_EXAMS` when unrestricted). `None` when the
/// class has no rows.
pub fn class_report(rows: &[ExamResultRow], exam_filtered: bool) -> Option<ClassReport> {
    let first = rows.first()?;

    let total_values = totals(rows);

    let mut top: Vec<&ExamResultRow> = rows.iter().collect();
    // Stable, so ties keep the fetched row order.
    top.sort_by_key(|r| r.rank);
    top.truncate(10);
    let top_performers = top
        .into_iter()
        .map(|r| TopPerformer {
            student_name: r.student_name.clone(),
            total_marks: r.total_marks,
            rank: r.rank,
        })
        .collect();

    let subject_averages = SUBJECTS
        .iter()
        .map(|&subject| SubjectAverage {
            subject: subject.label(),
            average: stats::mean(&subject_values(rows, subject)),
        })
        .collect();

    Some(ClassReport {
        class_name: first.class_name.clone(),
        student_count: rows.len(),
        exam_name: if exam_filtered {
            first.exam_name.clone()
        } else {
            ALL_EXAMS.to_string()
        },
        scores: ScoreStatistics {
            average: stats::mean(&total_values),
            median: stats::median(&total_values),
            std_dev: stats::sample_std_dev(&total_values),
            max: rows.iter().map(|r| r.total_marks).max().unwrap_or(0),
            min: rows.iter().map(|r| r.total_marks).min().unwrap_or(0),
        },
        distribution: stats::summarize(&total_values),
        subject_averages,
        top_performers,
        rows: rows.to_vec(),
    })
}

/// Cross-class comparison over one exam's rows, grouped by class name.
/// Per-class statistics are rounded to 2 decimal places. `None` when the
/// exam has no rows.
pub fn comparative_analysis(rows: &[ExamResultRow]) -> Option<ComparativeAnalysis> {
    let first = rows.first()?;

    let mut by_class: BTreeMap<&str, Vec<&ExamResultRow>> = BTreeMap::new();
    for row in rows {
        by_class.entry(row.class_name.as_str()).or_default().push(row);
    }

    let classes = by_class
        .into_iter()
        .map(|(class_name, class_rows)| {
            let class_totals: Vec<f64> =
                class_rows.iter().map(|r| r.total_marks as f64).collect();
            let subject_mean = |subject: Subject| {
                let values: Vec<f64> =
                    class_rows.iter().map(|r| subject.mark(r) as f64).collect();
                stats::round2(stats::mean(&values))
            };
            ClassPerformance {
                class_name: class_name.to_string(),
                student_count: class_rows.len(),
                average: stats::round2(stats::mean(&class_totals)),
                median: stats::round2(stats::median(&class_totals)),
                std_dev: stats::sample_std_dev(&class_totals).map(stats::round2),
                physics_average: subject_mean(Subject::Physics),
                chemistry_average: subject_mean(Subject::Chemistry),
                botany_average: subject_mean(Subject::Botany),
                zoology_average: subject_mean(Subject::Zoology),
            }
        })
        .collect();

    Some(ComparativeAnalysis {
        exam_name: first.exam_name.clone(),
        student_count: rows.len(),
        overall_average: stats::mean(&totals(rows)),
        classes,
    })
}
