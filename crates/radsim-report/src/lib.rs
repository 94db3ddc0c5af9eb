//! radsim Session Reporting
//!
//! This crate aggregates per-exercise outcomes of a positioning quiz into a
//! final [`Report`], renders it as JSON or Markdown, and hands it to an export
//! collaborator.
//!
//! # Types
//!
//! - [`SessionReporter`] - Accumulates outcomes and finalizes the report
//! - [`Report`] - The complete session report
//! - [`ExerciseRecord`] - Target vs achieved pose and outcome for one exercise
//! - [`ExercisePlan`] - What the reporter needs to know about each exercise up front
//!
//! # Generators
//!
//! - [`json::JsonGenerator`] - Generate JSON reports with compact or pretty formatting
//! - [`MarkdownGenerator`] - Generate human-readable Markdown reports
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use radsim_report::{
//!     AttemptResult, ExercisePlan, PoseRecord, RecordOutcome, SessionReporter, SessionStatus,
//! };
//!
//! let plans = vec![
//!     ExercisePlan::new(0, "PA Hand", "/models/hand.glb", PoseRecord::at([0.61, -8.88, -7.22]), 60),
//!     ExercisePlan::new(1, "Lateral Wrist", "/models/wrist.glb", PoseRecord::at([1.39, 0.08, -0.42]), 60),
//! ];
//! let mut reporter = SessionReporter::new(plans);
//! reporter
//!     .record_outcome(0, AttemptResult::new(RecordOutcome::Passed, PoseRecord::at([0.61, -8.89, -7.22]), 12))
//!     .unwrap();
//!
//! let report = reporter
//!     .finalize(SessionStatus::EndedEarly, Utc::now(), Utc::now(), None)
//!     .unwrap();
//! assert_eq!(report.records.len(), 2);
//! assert_eq!(report.passed_count, 1);
//! ```

mod export;
mod identity;
pub mod json;
mod markdown;

pub use export::{export_logged, FileExporter, ReportExporter, ReportFormat, REPORT_FILE_STEM};
pub use identity::{Anonymous, IdentitySource, StaticIdentity};
pub use markdown::MarkdownGenerator;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during report generation and export.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to serialize the report to JSON.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write report files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid report data.
    #[error("invalid report data: {0}")]
    InvalidData(String),

    /// The export collaborator rejected the report.
    #[error("export to {target} failed: {message}")]
    Export {
        /// Where the report was being sent.
        target: String,
        /// Failure description.
        message: String,
    },
}

impl ReportError {
    /// Creates a new `Export` error.
    #[must_use]
    pub fn export(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Export {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// ============================================================================
// Pose Record (local copy to avoid cross-crate dependency)
// ============================================================================

/// A pose as recorded in the report.
///
/// Position is in scene units and rotation in radians. This mirrors the
/// engine's live pose without depending on the engine crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    /// Position `[x, y, z]`.
    pub position: [f64; 3],
    /// Rotation `[x, y, z]` in radians.
    pub rotation: [f64; 3],
}

impl PoseRecord {
    /// Creates a pose record.
    #[must_use]
    pub const fn new(position: [f64; 3], rotation: [f64; 3]) -> Self {
        Self { position, rotation }
    }

    /// Creates a pose record at `position` with zero rotation.
    #[must_use]
    pub const fn at(position: [f64; 3]) -> Self {
        Self {
            position,
            rotation: [0.0; 3],
        }
    }
}

// ============================================================================
// Exercise records
// ============================================================================

/// Outcome of one exercise as it appears in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// The learner placed the model correctly in time.
    Passed,
    /// The countdown reached zero before a correct placement.
    TimedOut,
    /// The session ended before the exercise was finished.
    NotReached,
}

impl RecordOutcome {
    /// Returns `true` only for [`RecordOutcome::Passed`].
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Returns a short label for tables.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Passed => "Pass",
            Self::TimedOut => "Fail (time up)",
            Self::NotReached => "Fail (not reached)",
        }
    }
}

impl std::fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Static facts about an exercise, known before the session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExercisePlan {
    /// Catalog index.
    pub index: usize,
    /// Short title, e.g. "PA Hand".
    pub title: String,
    /// Asset path of the exercise model.
    pub model_ref: String,
    /// Target pose.
    pub target: PoseRecord,
    /// Countdown budget in seconds.
    pub time_budget_secs: u32,
}

impl ExercisePlan {
    /// Creates a new exercise plan.
    #[must_use]
    pub fn new(
        index: usize,
        title: impl Into<String>,
        model_ref: impl Into<String>,
        target: PoseRecord,
        time_budget_secs: u32,
    ) -> Self {
        Self {
            index,
            title: title.into(),
            model_ref: model_ref.into(),
            target,
            time_budget_secs,
        }
    }
}

/// What an attempt produced, as handed to [`SessionReporter::record_outcome`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptResult {
    /// Pass or fail classification.
    pub outcome: RecordOutcome,
    /// Pose at the moment the attempt finished.
    pub achieved: PoseRecord,
    /// Seconds spent on the attempt.
    pub seconds_elapsed: u32,
}

impl AttemptResult {
    /// Creates a new attempt result.
    #[must_use]
    pub const fn new(outcome: RecordOutcome, achieved: PoseRecord, seconds_elapsed: u32) -> Self {
        Self {
            outcome,
            achieved,
            seconds_elapsed,
        }
    }
}

/// One exercise's line in the final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseRecord {
    /// Catalog index.
    pub index: usize,
    /// Short exercise title.
    pub title: String,
    /// Asset path of the exercise model.
    pub model_ref: String,
    /// Target pose.
    pub target: PoseRecord,
    /// Achieved pose, absent for exercises never attempted.
    pub achieved: Option<PoseRecord>,
    /// Outcome of the exercise.
    pub outcome: RecordOutcome,
    /// Seconds spent on the exercise.
    pub seconds_elapsed: u32,
    /// `true` when the record was filled in at finalization.
    pub synthesized: bool,
}

impl ExerciseRecord {
    fn from_plan(plan: &ExercisePlan, result: &AttemptResult) -> Self {
        Self {
            index: plan.index,
            title: plan.title.clone(),
            model_ref: plan.model_ref.clone(),
            target: plan.target,
            achieved: Some(result.achieved),
            outcome: result.outcome,
            seconds_elapsed: result.seconds_elapsed,
            synthesized: false,
        }
    }

    fn synthesized(plan: &ExercisePlan) -> Self {
        Self {
            index: plan.index,
            title: plan.title.clone(),
            model_ref: plan.model_ref.clone(),
            target: plan.target,
            achieved: None,
            outcome: RecordOutcome::NotReached,
            seconds_elapsed: plan.time_budget_secs,
            synthesized: true,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Every exercise was played to the end.
    #[default]
    Completed,
    /// The learner finished before the last exercise.
    EndedEarly,
}

impl SessionStatus {
    /// Returns a human-readable description of the status.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Completed => "All exercises completed",
            Self::EndedEarly => "Session ended early",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Complete report of one quiz session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Identifier of the learner, if known.
    pub user_id: Option<String>,
    /// How the session ended.
    pub status: SessionStatus,
    /// Number of exercises in the catalog.
    pub total_exercises: usize,
    /// Number of passed exercises.
    pub passed_count: usize,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// When the session ended.
    pub ended_at: DateTime<Utc>,
    /// One record per catalog index, in order.
    pub records: Vec<ExerciseRecord>,
}

impl Report {
    /// Creates a new report builder.
    #[must_use]
    pub fn builder() -> ReportBuilder {
        ReportBuilder::default()
    }

    /// Serializes the report to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(ReportError::from)
    }

    /// Score as a percentage of passed exercises.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score_percent(&self) -> f64 {
        if self.total_exercises == 0 {
            return 0.0;
        }
        self.passed_count as f64 * 100.0 / self.total_exercises as f64
    }

    /// Wall-clock duration of the session in whole seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> u64 {
        u64::try_from((self.ended_at - self.started_at).num_seconds()).unwrap_or(0)
    }
}

// ============================================================================
// ReportBuilder
// ============================================================================

/// Builder for constructing [`Report`] instances.
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    user_id: Option<String>,
    status: SessionStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    records: Vec<ExerciseRecord>,
}

impl ReportBuilder {
    /// Sets the learner identifier.
    #[must_use]
    pub fn user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Sets the session status.
    #[must_use]
    pub const fn status(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the start timestamp.
    #[must_use]
    pub const fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    /// Sets the end timestamp.
    #[must_use]
    pub const fn ended_at(mut self, at: DateTime<Utc>) -> Self {
        self.ended_at = Some(at);
        self
    }

    /// Adds a record.
    #[must_use]
    pub fn record(mut self, record: ExerciseRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Sets all records at once.
    #[must_use]
    pub fn records(mut self, records: Vec<ExerciseRecord>) -> Self {
        self.records = records;
        self
    }

    /// Builds the report.
    ///
    /// Records are ordered by index; the passed count is derived from them.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::InvalidData` if timestamps are missing, the end
    /// precedes the start, or two records share an index.
    pub fn build(mut self) -> Result<Report> {
        let started_at = self
            .started_at
            .ok_or_else(|| ReportError::InvalidData("started_at is required".to_string()))?;
        let ended_at = self.ended_at.unwrap_or(started_at);
        if ended_at < started_at {
            return Err(ReportError::InvalidData(
                "ended_at precedes started_at".to_string(),
            ));
        }

        self.records.sort_by_key(|r| r.index);
        if self.records.windows(2).any(|w| w[0].index == w[1].index) {
            return Err(ReportError::InvalidData(
                "duplicate record index".to_string(),
            ));
        }

        let passed_count = self.records.iter().filter(|r| r.outcome.is_pass()).count();

        Ok(Report {
            user_id: self.user_id,
            status: self.status,
            total_exercises: self.records.len(),
            passed_count,
            started_at,
            ended_at,
            records: self.records,
        })
    }
}

// ============================================================================
// SessionReporter
// ============================================================================

/// Accumulates exercise outcomes for one session.
///
/// Recording is idempotent per index: a later outcome overwrites an earlier
/// one. [`SessionReporter::finalize`] guarantees exactly one record per plan,
/// filling gaps with "not reached" records that charge the full time budget.
#[derive(Debug, Clone)]
pub struct SessionReporter {
    plans: Vec<ExercisePlan>,
    records: BTreeMap<usize, ExerciseRecord>,
}

impl SessionReporter {
    /// Creates a reporter for the given exercise plans.
    #[must_use]
    pub fn new(plans: Vec<ExercisePlan>) -> Self {
        Self {
            plans,
            records: BTreeMap::new(),
        }
    }

    /// Records the outcome of the exercise at `index`.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::InvalidData` when `index` has no plan.
    pub fn record_outcome(&mut self, index: usize, result: AttemptResult) -> Result<()> {
        let plan = self.plans.get(index).ok_or_else(|| {
            ReportError::InvalidData(format!(
                "no exercise at index {index} (have {})",
                self.plans.len()
            ))
        })?;
        self.records
            .insert(index, ExerciseRecord::from_plan(plan, &result));
        Ok(())
    }

    /// Number of exercises explicitly recorded so far.
    #[must_use]
    pub fn recorded_count(&self) -> usize {
        self.records.len()
    }

    /// Number of planned exercises.
    #[must_use]
    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }

    /// Returns the explicit record at `index`, if any.
    #[must_use]
    pub fn record(&self, index: usize) -> Option<&ExerciseRecord> {
        self.records.get(&index)
    }

    /// Produces the final report.
    pub fn finalize(
        &self,
        status: SessionStatus,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        user_id: Option<String>,
    ) -> Result<Report> {
        let records = self
            .plans
            .iter()
            .map(|plan| {
                self.records
                    .get(&plan.index)
                    .cloned()
                    .unwrap_or_else(|| ExerciseRecord::synthesized(plan))
            })
            .collect();

        Report::builder()
            .user_id(user_id)
            .status(status)
            .started_at(started_at)
            .ended_at(ended_at)
            .records(records)
            .build()
    }
}
