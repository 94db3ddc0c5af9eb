//! Session and attempt state.
//!
//! A [`SessionState`] is created when the learner enters the simulation and
//! owns one [`AttemptState`] per exercise reached so far, plus the reporter
//! that accumulates outcomes for the final report.

use chrono::{DateTime, Utc};
use radsim_report::{
    AttemptResult, ExercisePlan, PoseRecord, RecordOutcome, Report, SessionReporter,
    SessionStatus,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::pose::LivePose;

// ============================================================================
// Attempt Status
// ============================================================================

/// Status of a single exercise attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The attempt is live; the learner can move and verify.
    #[default]
    Pending,
    /// The learner placed the model correctly.
    Passed,
    /// The countdown reached zero first.
    FailedTimeout,
}

impl AttemptStatus {
    /// Returns `true` once the attempt has left `Pending`.
    ///
    /// # Examples
    ///
    /// ```
    /// use radsim_engine::AttemptStatus;
    ///
    /// assert!(!AttemptStatus::Pending.is_final());
    /// assert!(AttemptStatus::Passed.is_final());
    /// assert!(AttemptStatus::FailedTimeout.is_final());
    /// ```
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Passed | Self::FailedTimeout)
    }

    /// Maps a final status onto the report's outcome.
    #[must_use]
    pub const fn outcome(&self) -> RecordOutcome {
        match self {
            Self::Passed => RecordOutcome::Passed,
            Self::FailedTimeout => RecordOutcome::TimedOut,
            Self::Pending => RecordOutcome::NotReached,
        }
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Passed => write!(f, "passed"),
            Self::FailedTimeout => write!(f, "failed_timeout"),
        }
    }
}

// ============================================================================
// Attempt State
// ============================================================================

/// One exercise's lifecycle from becoming current to a final status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptState {
    /// Catalog index of the exercise.
    pub exercise_index: usize,

    /// Seconds left on the countdown.
    pub time_remaining: u32,

    /// Current status.
    pub status: AttemptStatus,

    /// Whether pose input and verification are accepted.
    pub controls_enabled: bool,

    /// Pose captured when the attempt was finalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achieved: Option<LivePose>,

    /// Seconds spent before the attempt was finalized.
    #[serde(default)]
    pub seconds_elapsed: u32,

    /// When the attempt became current.
    pub started_at: DateTime<Utc>,
}

impl AttemptState {
    /// Creates a pending attempt with a full budget and locked controls.
    ///
    /// Controls unlock once the viewport is mounted and the countdown starts.
    #[must_use]
    pub fn new(exercise_index: usize, budget_secs: u32) -> Self {
        Self {
            exercise_index,
            time_remaining: budget_secs,
            status: AttemptStatus::Pending,
            controls_enabled: false,
            achieved: None,
            seconds_elapsed: 0,
            started_at: Utc::now(),
        }
    }

    /// Returns `true` while the attempt can still change outcome.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == AttemptStatus::Pending
    }

    /// Moves the attempt to a final status and locks it.
    pub fn finish(&mut self, status: AttemptStatus, achieved: LivePose, seconds_elapsed: u32) {
        self.status = status;
        self.controls_enabled = false;
        self.achieved = Some(achieved);
        self.seconds_elapsed = seconds_elapsed;
    }

    /// The reporter's view of a finished attempt.
    #[must_use]
    pub fn to_result(&self) -> AttemptResult {
        let achieved = self.achieved.unwrap_or_default();
        AttemptResult::new(
            self.status.outcome(),
            PoseRecord::new(achieved.position.to_array(), achieved.rotation.to_array()),
            self.seconds_elapsed,
        )
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Everything a single run through the catalog accumulates.
#[derive(Debug, Clone)]
pub struct SessionState {
    passed_count: usize,
    attempts: Vec<AttemptState>,
    reporter: SessionReporter,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Creates an empty session over the given exercise plans.
    #[must_use]
    pub fn new(plans: Vec<ExercisePlan>) -> Self {
        Self {
            passed_count: 0,
            attempts: Vec::new(),
            reporter: SessionReporter::new(plans),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Number of passed attempts.
    #[must_use]
    pub const fn passed_count(&self) -> usize {
        self.passed_count
    }

    /// Every attempt created so far, in exercise order.
    #[must_use]
    pub fn attempts(&self) -> &[AttemptState] {
        &self.attempts
    }

    /// When the session was created.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the session was finalized, if it has been.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// The attempt currently in progress or most recently finished.
    #[must_use]
    pub fn current(&self) -> Option<&AttemptState> {
        self.attempts.last()
    }

    /// Mutable access to the current attempt.
    pub fn current_mut(&mut self) -> Option<&mut AttemptState> {
        self.attempts.last_mut()
    }

    /// Opens the attempt for `exercise_index`.
    ///
    /// Indices must increase strictly; an exercise is never revisited.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidStateTransition` when `exercise_index` does
    /// not follow the current attempt.
    pub fn begin_attempt(&mut self, exercise_index: usize, budget_secs: u32) -> Result<&mut AttemptState> {
        if let Some(current) = self.attempts.last() {
            if exercise_index <= current.exercise_index {
                return Err(SimError::invalid_transition(
                    format!("attempt({})", current.exercise_index),
                    format!("attempt({exercise_index})"),
                ));
            }
        }
        self.attempts.push(AttemptState::new(exercise_index, budget_secs));
        let len = self.attempts.len();
        Ok(&mut self.attempts[len - 1])
    }

    /// Finalizes the current attempt and hands its outcome to the reporter.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidStateTransition` when there is no pending
    /// attempt or `status` is not final, and `SimError::Report` when the
    /// reporter has no plan for the attempt's index.
    pub fn finish_current(
        &mut self,
        status: AttemptStatus,
        achieved: LivePose,
        seconds_elapsed: u32,
    ) -> Result<&AttemptState> {
        if !status.is_final() {
            return Err(SimError::invalid_transition("pending", status));
        }
        let attempt = self
            .attempts
            .last_mut()
            .filter(|a| a.is_pending())
            .ok_or_else(|| SimError::invalid_transition("no pending attempt", status))?;

        attempt.finish(status, achieved, seconds_elapsed);
        if status == AttemptStatus::Passed {
            self.passed_count += 1;
        }
        self.reporter
            .record_outcome(attempt.exercise_index, attempt.to_result())?;
        Ok(attempt)
    }

    /// Stamps the end time and produces the report.
    ///
    /// Exercises never reached are synthesized as failures charging the full
    /// budget. Calling this twice keeps the first end time.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Report` if the report cannot be built.
    pub fn finalize(&mut self, status: SessionStatus, user_id: Option<String>) -> Result<Report> {
        let ended_at = *self.ended_at.get_or_insert_with(Utc::now);
        Ok(self
            .reporter
            .finalize(status, self.started_at, ended_at, user_id)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
