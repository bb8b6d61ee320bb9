use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::normalize::{self, AttemptRecord};

/// Separator between attempt feedback texts within one (student, subject)
/// aggregate.
pub const ATTEMPT_FEEDBACK_SEP: &str = " ||| ";
/// Separator between distinct exam titles within one aggregate.
pub const EXAM_TITLE_SEP: &str = " | ";
/// Separator between per-subject feedback values in the consolidated
/// per-student string.
pub const STUDENT_FEEDBACK_SEP: &str = " ; ";

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Pass,
    Fail,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pass => "Pass",
            Status::Fail => "Fail",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PerformanceLevel {
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
    Average,
    Good,
    Excellent,
    Outstanding,
    Unknown,
}

impl PerformanceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            PerformanceLevel::NeedsImprovement => "Needs Improvement",
            PerformanceLevel::Average => "Average",
            PerformanceLevel::Good => "Good",
            PerformanceLevel::Excellent => "Excellent",
            PerformanceLevel::Outstanding => "Outstanding",
            PerformanceLevel::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

/// All attempts by one student in one subject, collapsed into a single row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAggregate {
    pub student_id: String,
    pub student_name: String,
    pub subject: String,
    pub total_score: f64,
    pub total_max: f64,
    pub percentage: f64,
    pub feedback: String,
    pub evaluation_details: Vec<Value>,
    pub exam_title: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// One row of the profile table: every subject column present (zero-filled
/// where the student has no attempt) plus the derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub student_id: String,
    pub student_name: String,
    pub scores: BTreeMap<String, f64>,
    pub total: f64,
    pub max_total: f64,
    pub percentage: f64,
    pub status: Status,
    pub rank: i64,
    pub performance_level: PerformanceLevel,
    pub risk_level: RiskLevel,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileTable {
    pub subjects: Vec<String>,
    pub profiles: Vec<StudentProfile>,
}

impl ProfileTable {
    /// Exact lookup by trimmed student id.
    pub fn find_student(&self, student_id: &str) -> Option<&StudentProfile> {
        let wanted = student_id.trim();
        self.profiles.iter().find(|p| p.student_id.trim() == wanted)
    }

    /// Distinct performance level labels present in the table, ascending.
    pub fn performance_levels(&self) -> Vec<String> {
        distinct_sorted(self.profiles.iter().map(|p| p.performance_level.as_str()))
    }

    /// Distinct risk level labels present in the table, ascending.
    pub fn risk_levels(&self) -> Vec<String> {
        distinct_sorted(self.profiles.iter().map(|p| p.risk_level.as_str()))
    }
}

fn distinct_sorted<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = labels.map(|s| s.to_string()).collect();
    out.sort();
    out.dedup();
    out
}

/// Collapse attempts into one aggregate per (studentId, studentName, subject).
///
/// Attempts are stably sorted by (studentId, studentName, subject, createdAt,
/// examTitle) before grouping, so every concatenation below follows that
/// declared order and the output is independent of snapshot document order.
pub fn aggregate_attempts(records: &[AttemptRecord]) -> Vec<SubjectAggregate> {
    let mut sorted: Vec<&AttemptRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        a.student_id
            .cmp(&b.student_id)
            .then_with(|| a.student_name.cmp(&b.student_name))
            .then_with(|| a.subject.cmp(&b.subject))
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.exam_title.cmp(&b.exam_title))
    });

    let mut out: Vec<SubjectAggregate> = Vec::new();
    for rec in sorted {
        let same_group = out
            .last()
            .map(|agg| {
                agg.student_id == rec.student_id
                    && agg.student_name == rec.student_name
                    && agg.subject == rec.subject
            })
            .unwrap_or(false);
        if !same_group {
            out.push(SubjectAggregate {
                student_id: rec.student_id.clone(),
                student_name: rec.student_name.clone(),
                subject: rec.subject.clone(),
                total_score: 0.0,
                total_max: 0.0,
                percentage: 0.0,
                feedback: String::new(),
                evaluation_details: Vec::new(),
                exam_title: String::new(),
                created_at: None,
            });
        }
        let agg = out.last_mut().expect("group row exists");

        agg.total_score += rec.score_obtained;
        agg.total_max += rec.max_score;
        if !rec.feedback_text.is_empty() {
            if !agg.feedback.is_empty() {
                agg.feedback.push_str(ATTEMPT_FEEDBACK_SEP);
            }
            agg.feedback.push_str(&rec.feedback_text);
        }
        agg.evaluation_details
            .extend(rec.evaluation_details.iter().cloned());
        if !rec.exam_title.is_empty() {
            // Distinct titles only, in group order.
            let already = agg
                .exam_title
                .split(EXAM_TITLE_SEP)
                .any(|t| t == rec.exam_title);
            if !already {
                if !agg.exam_title.is_empty() {
                    agg.exam_title.push_str(EXAM_TITLE_SEP);
                }
                agg.exam_title.push_str(&rec.exam_title);
            }
        }
        agg.created_at = agg.created_at.max(rec.created_at);
    }

    for agg in &mut out {
        agg.percentage = if agg.total_max > 0.0 {
            (agg.total_score / agg.total_max) * 100.0
        } else {
            0.0
        };
    }
    out
}

/// Global subject column list: distinct subject names, lexicographic.
pub fn subject_names(aggregates: &[SubjectAggregate]) -> Vec<String> {
    distinct_sorted(aggregates.iter().map(|a| a.subject.as_str()))
}

/// Pivot aggregates into one row per (studentId, studentName) and derive the
/// metrics. Rows are ordered ascending by that key.
pub fn build_profile_table(aggregates: &[SubjectAggregate]) -> ProfileTable {
    let subjects = subject_names(aggregates);

    let mut by_student: BTreeMap<(String, String), Vec<&SubjectAggregate>> = BTreeMap::new();
    for agg in aggregates {
        by_student
            .entry((agg.student_id.clone(), agg.student_name.clone()))
            .or_default()
            .push(agg);
    }

    let mut profiles: Vec<StudentProfile> = Vec::with_capacity(by_student.len());
    for ((student_id, student_name), rows) in by_student {
        // Zero-fill every subject column, then overlay this student's rows.
        let mut scores: BTreeMap<String, f64> =
            subjects.iter().map(|s| (s.clone(), 0.0)).collect();
        for row in &rows {
            scores.insert(row.subject.clone(), row.total_score);
        }

        // Total and MaxTotal are summed from the aggregate rows directly, not
        // re-derived from the zero-filled cells.
        let total: f64 = rows.iter().map(|r| r.total_score).sum();
        let max_total: f64 = rows.iter().map(|r| r.total_max).sum();

        let feedback = rows
            .iter()
            .map(|r| r.feedback.as_str())
            .collect::<Vec<_>>()
            .join(STUDENT_FEEDBACK_SEP);

        profiles.push(StudentProfile {
            student_id,
            student_name,
            scores,
            total,
            max_total,
            percentage: 0.0,
            status: Status::Fail,
            rank: 0,
            performance_level: PerformanceLevel::Unknown,
            risk_level: RiskLevel::High,
            feedback,
        });
    }

    let mut table = ProfileTable { subjects, profiles };
    apply_metrics(&mut table);
    table
}

/// Bucket a percentage; bounds are lower-exclusive, upper-inclusive, so
/// exactly 0 (and anything above 100) falls outside every bucket.
pub fn performance_level_for(percentage: f64) -> PerformanceLevel {
    if !(percentage > 0.0 && percentage <= 100.0) {
        return PerformanceLevel::Unknown;
    }
    if percentage <= 50.0 {
        PerformanceLevel::NeedsImprovement
    } else if percentage <= 65.0 {
        PerformanceLevel::Average
    } else if percentage <= 80.0 {
        PerformanceLevel::Good
    } else if percentage <= 90.0 {
        PerformanceLevel::Excellent
    } else {
        PerformanceLevel::Outstanding
    }
}

/// Risk rule: the status check is OR'd with the 50% threshold, not nested
/// under it.
pub fn risk_level_for(status: Status, percentage: f64) -> RiskLevel {
    if status == Status::Fail || percentage < 50.0 {
        RiskLevel::High
    } else if percentage < 65.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Recompute Percentage, Status, Rank, Performance Level and Risk Level for
/// every row. Pure over the table contents.
pub fn apply_metrics(table: &mut ProfileTable) {
    let subject_count = table.subjects.len();
    // The assume-100-per-subject fallback only applies when no row in the
    // snapshot carries max marks at all.
    let any_max = table.profiles.iter().any(|p| p.max_total > 0.0);

    for p in &mut table.profiles {
        let pct = if p.max_total > 0.0 {
            (p.total / p.max_total) * 100.0
        } else if !any_max && subject_count > 0 {
            (p.total / (subject_count as f64 * 100.0)) * 100.0
        } else {
            0.0
        };
        p.percentage = if pct.is_finite() { pct } else { 0.0 };

        p.status = if p.percentage < 40.0 {
            Status::Fail
        } else {
            Status::Pass
        };
        p.performance_level = performance_level_for(p.percentage);
        p.risk_level = risk_level_for(p.status, p.percentage);
    }

    // Competition ranking, descending, "max" tie style: every member of a tie
    // group gets the ordinal of its lowest member, so a 3-way tie for the top
    // score is ranked 3.
    let percentages: Vec<f64> = table.profiles.iter().map(|p| p.percentage).collect();
    for (i, p) in table.profiles.iter_mut().enumerate() {
        p.rank = percentages
            .iter()
            .filter(|other| **other >= percentages[i])
            .count() as i64;
    }
}

/// The full pipeline over a joined snapshot: normalize, aggregate, pivot,
/// derive. Every caller gets a freshly computed table; nothing is cached.
pub fn compute_profile_table(docs: &[Value]) -> ProfileTable {
    let records = normalize::normalize_attempts(docs);
    let aggregates = aggregate_attempts(&records);
    build_profile_table(&aggregates)
}
