use crate::calc::StudentProfile;

/// Fixed five-tier comment keyed on the raw subject score.
fn subject_comment(score: f64) -> &'static str {
    if score >= 90.0 {
        "Outstanding! Deep understanding and accuracy."
    } else if score >= 75.0 {
        "Very good performance, minor improvement possible."
    } else if score >= 60.0 {
        "Satisfactory, but consistency needed."
    } else if score >= 45.0 {
        "Below average, more practice and focus required."
    } else {
        "Critical zone - needs urgent attention."
    }
}

/// Templated report text for one student: an overall line, a risk line
/// carrying the stored feedback, then one bullet per subject column. Pure
/// string assembly over already-derived values.
pub fn generate_student_feedback(profile: &StudentProfile, subjects: &[String]) -> String {
    let mut lines = Vec::with_capacity(subjects.len() + 2);
    lines.push(format!(
        "Overall performance level: {} ({:.1}%).",
        profile.performance_level.as_str(),
        profile.percentage
    ));
    lines.push(format!(
        "Risk level assessed: {}. {}",
        profile.risk_level.as_str(),
        profile.feedback
    ));
    for subject in subjects {
        let score = profile.scores.get(subject).copied().unwrap_or(0.0);
        lines.push(format!("• {}: {}", subject, subject_comment(score)));
    }
    lines.join("\n")
}
