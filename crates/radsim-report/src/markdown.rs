//! Markdown report generation.
//!
//! [`MarkdownGenerator`] renders a [`Report`] as a human-readable document:
//!
//! - A summary table with score, duration and learner
//! - A per-exercise table comparing target and achieved poses
//! - A footer with the generation timestamp
//!
//! # Example
//!
//! ```rust
//! use radsim_report::{MarkdownGenerator, Report};
//!
//! let report = Report::default();
//! let markdown = MarkdownGenerator::new(&report).generate();
//! assert!(markdown.contains("# Radiography Positioning Report"));
//! ```

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::{ExerciseRecord, PoseRecord, Report};

/// Generates Markdown reports from quiz sessions.
pub struct MarkdownGenerator<'a> {
    report: &'a Report,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a new Markdown generator for the given report.
    #[must_use]
    pub const fn new(report: &'a Report) -> Self {
        Self { report }
    }

    /// Generates the complete Markdown report.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        Self::write_title(&mut output);
        self.write_summary(&mut output);
        self.write_exercises(&mut output);
        Self::write_footer(&mut output);

        output
    }

    fn write_title(output: &mut String) {
        let _ = writeln!(output, "# Radiography Positioning Report\n");
    }

    /// Writes the summary section with metrics table.
    fn write_summary(&self, output: &mut String) {
        let report = self.report;

        let _ = writeln!(output, "## Summary\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(output, "| Status | {} |", report.status.description());
        let _ = writeln!(
            output,
            "| Learner | {} |",
            report
                .user_id
                .as_deref()
                .map_or_else(|| "anonymous".to_string(), escape_markdown)
        );
        let _ = writeln!(
            output,
            "| Score | {}/{} ({:.0}%) |",
            report.passed_count,
            report.total_exercises,
            report.score_percent()
        );
        let _ = writeln!(
            output,
            "| Duration | {} |",
            format_duration(report.duration_seconds())
        );
        let _ = writeln!(
            output,
            "| Started | {} |",
            format_timestamp(&report.started_at)
        );
        let _ = writeln!(output, "| Ended | {} |", format_timestamp(&report.ended_at));
        let _ = writeln!(output);
    }

    /// Writes the per-exercise table.
    fn write_exercises(&self, output: &mut String) {
        let _ = writeln!(output, "## Exercises\n");

        if self.report.records.is_empty() {
            let _ = writeln!(output, "*No exercises recorded.*\n");
            return;
        }

        let _ = writeln!(
            output,
            "| # | Exercise | Outcome | Time | Target | Achieved |"
        );
        let _ = writeln!(
            output,
            "|---|----------|---------|------|--------|----------|"
        );
        for record in &self.report.records {
            Self::write_exercise_row(output, record);
        }
        let _ = writeln!(output);

        let synthesized = self.report.records.iter().filter(|r| r.synthesized).count();
        if synthesized > 0 {
            let _ = writeln!(
                output,
                "*{synthesized} exercise(s) were not reached and are charged the full time budget.*\n"
            );
        }
    }

    fn write_exercise_row(output: &mut String, record: &ExerciseRecord) {
        let achieved = record
            .achieved
            .as_ref()
            .map_or_else(|| "-".to_string(), format_pose);
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} |",
            record.index + 1,
            escape_markdown(&record.title),
            record.outcome.label(),
            format_duration(u64::from(record.seconds_elapsed)),
            format_pose(&record.target),
            achieved
        );
    }

    /// Writes the report footer.
    fn write_footer(output: &mut String) {
        let _ = writeln!(output, "---");
        let timestamp = format_timestamp(&Utc::now());
        let _ = writeln!(output, "*Generated by radsim at {timestamp}*");
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Formats a duration in seconds to a human-readable string.
///
/// Examples:
/// - 65 seconds -> "1m 5s"
/// - 3661 seconds -> "1h 1m 1s"
/// - 45 seconds -> "45s"
fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();

    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{secs}s"));
    }

    parts.join(" ")
}

/// Formats a timestamp as "YYYY-MM-DD HH:MM:SS UTC".
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Formats a pose as position to two decimals and rotation in whole degrees.
fn format_pose(pose: &PoseRecord) -> String {
    let [x, y, z] = pose.position;
    let [rx, ry, rz] = pose.rotation.map(whole_degrees);
    format!("({x:.2}, {y:.2}, {z:.2}) @ ({rx}°, {ry}°, {rz}°)")
}

/// Rounds radians to whole degrees, folding negative zero into zero.
fn whole_degrees(radians: f64) -> f64 {
    let degrees = radians.to_degrees().round();
    if degrees.abs() < f64::EPSILON {
        0.0
    } else {
        degrees
    }
}

/// Escapes special Markdown characters in text.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '(' | ')' | '!' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            '\n' => result.push_str("<br>"),
            _ => result.push(ch),
        }
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{RecordOutcome, SessionStatus};
    use chrono::TimeZone;

    fn deterministic_report() -> Report {
        let started = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        Report {
            user_id: Some("student_42".to_string()),
            status: SessionStatus::EndedEarly,
            total_exercises: 3,
            passed_count: 1,
            started_at: started,
            ended_at: started + chrono::Duration::seconds(332),
            records: vec![
                ExerciseRecord {
                    index: 0,
                    title: "PA Hand".to_string(),
                    model_ref: "/models/hand.glb".to_string(),
                    target: PoseRecord::at([0.61, -8.88, -7.22]),
                    achieved: Some(PoseRecord::at([0.61, -8.89, -7.22])),
                    outcome: RecordOutcome::Passed,
                    seconds_elapsed: 35,
                    synthesized: false,
                },
                ExerciseRecord {
                    index: 1,
                    title: "Lateral Wrist".to_string(),
                    model_ref: "/models/wrist.glb".to_string(),
                    target: PoseRecord::new(
                        [1.39, 0.08, -0.42],
                        [0.0, 0.0, -std::f64::consts::FRAC_PI_2],
                    ),
                    achieved: Some(PoseRecord::default()),
                    outcome: RecordOutcome::TimedOut,
                    seconds_elapsed: 60,
                    synthesized: false,
                },
                ExerciseRecord {
                    index: 2,
                    title: "AP Elbow".to_string(),
                    model_ref: "/models/elbow.glb".to_string(),
                    target: PoseRecord::new([-3.63, -3.33, 4.66], [0.0, 0.0, -std::f64::consts::PI]),
                    achieved: None,
                    outcome: RecordOutcome::NotReached,
                    seconds_elapsed: 60,
                    synthesized: true,
                },
            ],
        }
    }

    /// Generates markdown without the footer (which has dynamic timestamp).
    fn generate_without_footer(report: &Report) -> String {
        let generator = MarkdownGenerator::new(report);
        let mut output = String::new();

        MarkdownGenerator::write_title(&mut output);
        generator.write_summary(&mut output);
        generator.write_exercises(&mut output);

        output
    }

    // ------------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------------

    #[test]
    fn test_full_report_structure() {
        let report = deterministic_report();
        let markdown = generate_without_footer(&report);

        assert!(markdown.starts_with("# Radiography Positioning Report\n"));

        assert!(markdown.contains("## Summary\n"));
        assert!(markdown.contains("| Status | Session ended early |"));
        assert!(markdown.contains("| Learner | student\\_42 |"));
        assert!(markdown.contains("| Score | 1/3 (33%) |"));
        assert!(markdown.contains("| Duration | 5m 32s |"));
        assert!(markdown.contains("| Started | 2026-03-02 09:00:00 UTC |"));
        assert!(markdown.contains("| Ended | 2026-03-02 09:05:32 UTC |"));

        assert!(markdown.contains("## Exercises\n"));
        assert!(markdown.contains(
            "| 1 | PA Hand | Pass | 35s | (0.61, -8.88, -7.22) @ (0°, 0°, 0°) | (0.61, -8.89, -7.22) @ (0°, 0°, 0°) |"
        ));
        assert!(markdown.contains("| 2 | Lateral Wrist | Fail (time up) | 1m |"));
        assert!(markdown.contains("@ (0°, 0°, -90°)"));
        assert!(markdown.contains("| 3 | AP Elbow | Fail (not reached) | 1m | (-3.63, -3.33, 4.66) @ (0°, 0°, -180°) | - |"));
        assert!(markdown.contains("*1 exercise(s) were not reached"));
    }

    #[test]
    fn test_empty_report_structure() {
        let report = Report::default();
        let markdown = generate_without_footer(&report);

        assert!(markdown.contains("| Learner | anonymous |"));
        assert!(markdown.contains("| Score | 0/0 (0%) |"));
        assert!(markdown.contains("| Duration | 0s |"));
        assert!(markdown.contains("*No exercises recorded.*"));
    }

    #[test]
    fn test_generate_contains_footer() {
        let report = deterministic_report();
        let markdown = MarkdownGenerator::new(&report).generate();
        assert!(markdown.contains("---\n*Generated by radsim at "));
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    #[test]
    fn test_format_duration() {
        insta::assert_snapshot!(format_duration(45), @"45s");
        insta::assert_snapshot!(format_duration(65), @"1m 5s");
        insta::assert_snapshot!(format_duration(3661), @"1h 1m 1s");
        insta::assert_snapshot!(format_duration(0), @"0s");
    }

    #[test]
    fn test_format_pose() {
        let pose = PoseRecord::new([-8.25, -0.63, 2.36], [-std::f64::consts::PI, std::f64::consts::FRAC_PI_2, -std::f64::consts::FRAC_PI_2]);
        insta::assert_snapshot!(format_pose(&pose), @"(-8.25, -0.63, 2.36) @ (-180°, 90°, -90°)");
    }

    #[test]
    fn test_whole_degrees_folds_negative_zero() {
        assert_eq!(whole_degrees(-0.001).to_string(), "0");
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a|b"), "a\\|b");
        assert_eq!(escape_markdown("**x**"), "\\*\\*x\\*\\*");
        assert_eq!(escape_markdown("line\nbreak"), "line<br>break");
    }
}
