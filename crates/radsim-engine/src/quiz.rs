//! Quiz state machine.
//!
//! [`QuizEngine`] drives a session from the intro screen through lab
//! confirmation and one attempt per catalog exercise to completion. Every
//! transition is caller-driven except two: the one-second countdown ticks and
//! the delayed restore of the instruction text after a wrong placement. Both
//! run off a virtual millisecond clock moved forward by
//! [`QuizEngine::advance`], so the engine is fully deterministic and the
//! server only has to feed it wall-clock time.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use radsim_engine::{Catalog, Config, QuizEngine, QuizState};
//! use radsim_scene::HeadlessScene;
//!
//! let mut engine = QuizEngine::new(Config::default(), Catalog::reference(), HeadlessScene::new());
//! engine.start().unwrap();
//! engine.confirm_lab(true).unwrap();
//! engine.advance(Duration::from_secs(3)).unwrap();
//!
//! assert!(matches!(engine.state(), QuizState::Attempt { index: 0, .. }));
//! assert_eq!(engine.time_remaining(), 57);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use radsim_report::{Anonymous, IdentitySource, Report, SessionStatus};
use radsim_scene::{DragBounds, MountOptions, SceneBackend, SceneManager, Viewport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::catalog::{Catalog, ExerciseDefinition};
use crate::config::Config;
use crate::delay::DelayedRestore;
use crate::error::{Result, SimError};
use crate::events::{
    AssetUnavailablePayload, AttemptFinishedPayload, AttemptStartedPayload,
    FeedbackRestoredPayload, QuizEvent, SessionStartedPayload, TickPayload, VerifiedPayload,
};
use crate::geometry::{Axis, Vec3};
use crate::pose::{LivePose, PoseTracker};
use crate::session::{AttemptStatus, SessionState};
use crate::timer::{CountdownTimer, TimerTick};
use crate::verifier::{FailureReason, PlacementVerifier, Verification, VerifyGate};

/// Length of one countdown tick.
const TICK_MS: u64 = 1000;

/// Latest reading of the virtual clock. Deadlines past it never fire.
const CLOCK_HORIZON_MS: u64 = u64::MAX / 2;

/// Where the backdrop prop sits, below the exercise model.
const BACKDROP_POSITION: [f64; 3] = [0.0, -10.0, 0.0];

/// Feedback after a correct placement.
pub const PASS_MESSAGE: &str = "You passed!";

/// Feedback after a wrong placement.
pub const WRONG_PLACEMENT_MESSAGE: &str = "Wrong positioning technique!";

/// Feedback when the last exercise runs out of time.
pub const TIME_UP_MESSAGE: &str = "Time is up!";

/// Feedback when any other exercise runs out of time.
pub const TIME_UP_PROCEED_MESSAGE: &str = "Time is up! Proceed to the next model.";

// ============================================================================
// Quiz State
// ============================================================================

/// Sub-state of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    /// The viewport is mounted and the attempt runs normally.
    Active,
    /// The exercise model failed to load; only a retry can continue.
    AssetUnavailable,
}

/// Where the learner is in the quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuizState {
    /// Before a session exists.
    #[default]
    Intro,
    /// Session created; waiting for the learner to confirm lab readiness.
    LabConfirmation,
    /// Working on the exercise at `index`.
    Attempt {
        /// Catalog index of the current exercise.
        index: usize,
        /// Attempt sub-state.
        phase: AttemptPhase,
    },
    /// Session finished; the report is available.
    Completed,
}

impl QuizState {
    /// Catalog index of the current attempt, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use radsim_engine::{AttemptPhase, QuizState};
    ///
    /// let state = QuizState::Attempt { index: 3, phase: AttemptPhase::Active };
    /// assert_eq!(state.attempt_index(), Some(3));
    /// assert_eq!(QuizState::Intro.attempt_index(), None);
    /// ```
    #[must_use]
    pub const fn attempt_index(&self) -> Option<usize> {
        match self {
            Self::Attempt { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Returns `true` in the terminal state.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for QuizState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intro => write!(f, "intro"),
            Self::LabConfirmation => write!(f, "lab_confirmation"),
            Self::Attempt {
                index,
                phase: AttemptPhase::Active,
            } => write!(f, "attempt({index})"),
            Self::Attempt {
                index,
                phase: AttemptPhase::AssetUnavailable,
            } => write!(f, "attempt({index}, asset_unavailable)"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

// ============================================================================
// Feedback
// ============================================================================

/// Colour class of a feedback message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackTone {
    /// Green.
    Success,
    /// Red.
    Error,
    /// Neutral instruction text.
    Info,
}

/// Message shown under the viewport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Text of the message.
    pub message: String,
    /// How the message is styled.
    pub tone: FeedbackTone,
}

impl Feedback {
    fn new(message: impl Into<String>, tone: FeedbackTone) -> Self {
        Self {
            message: message.into(),
            tone,
        }
    }

    fn success(message: impl Into<String>) -> Self {
        Self::new(message, FeedbackTone::Success)
    }

    fn error(message: impl Into<String>) -> Self {
        Self::new(message, FeedbackTone::Error)
    }

    fn info(message: impl Into<String>) -> Self {
        Self::new(message, FeedbackTone::Info)
    }
}

// ============================================================================
// Commands and Snapshot
// ============================================================================

/// A learner action, as sent by the HTTP surface or read from a replay script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum QuizCommand {
    /// Enter the simulation.
    Start,
    /// Answer the lab readiness question.
    ConfirmLab {
        /// `true` to begin the first attempt, `false` to go back.
        confirmed: bool,
    },
    /// Drag the model to a position.
    SetPosition {
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
        /// Z coordinate.
        z: f64,
    },
    /// Set one rotation axis, in degrees.
    SetRotation {
        /// Axis to rotate.
        axis: Axis,
        /// Angle in degrees.
        degrees: f64,
    },
    /// Check the placement.
    Verify,
    /// Move on to the next exercise.
    Next,
    /// Retry loading an unavailable exercise model.
    RetryAsset,
    /// Show the exit confirmation dialog.
    OpenExitPrompt,
    /// Close the exit confirmation dialog.
    DismissExitPrompt,
    /// End the session now and produce the report.
    FinishEarly,
    /// Discard the session and return to the intro.
    Exit,
    /// Go from the completion screen back to the intro.
    Restart,
    /// Let time pass.
    Wait {
        /// Milliseconds to advance the clock by.
        ms: u64,
    },
}

/// Serializable view of the engine for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSnapshot {
    /// Current state.
    pub state: QuizState,
    /// Catalog index of the current exercise.
    pub exercise_index: Option<usize>,
    /// Number of exercises in the catalog.
    pub total_exercises: usize,
    /// Progress label such as "2/5".
    pub progress: Option<String>,
    /// Short exercise title.
    pub title: Option<String>,
    /// Instruction text of the current exercise.
    pub instruction: Option<String>,
    /// Positioning guide of the current exercise.
    pub guide: Vec<String>,
    /// Seconds left on the countdown.
    pub time_remaining: Option<u32>,
    /// Whether pose input is accepted.
    pub controls_enabled: bool,
    /// Message shown under the viewport.
    pub feedback: Option<Feedback>,
    /// Live position.
    pub position: Vec3,
    /// Live rotation in degrees.
    pub rotation_degrees: Vec3,
    /// Number of passed attempts.
    pub passed_count: usize,
    /// Whether "next" is available.
    pub can_proceed: bool,
    /// Whether "retry" is available.
    pub can_retry_asset: bool,
    /// Whether the exit confirmation dialog is showing.
    pub exit_prompt_open: bool,
    /// Whether a report can be fetched.
    pub report_ready: bool,
}

// ============================================================================
// Quiz Engine
// ============================================================================

/// Runs one learner's positioning quiz.
pub struct QuizEngine<B: SceneBackend> {
    config: Config,
    catalog: Arc<Catalog>,
    verifier: PlacementVerifier,
    scene: SceneManager<B>,
    viewport: Option<Viewport>,
    identity: Arc<dyn IdentitySource>,
    state: QuizState,
    session: Option<SessionState>,
    tracker: PoseTracker,
    timer: CountdownTimer,
    restore: DelayedRestore,
    feedback: Option<Feedback>,
    exit_prompt_open: bool,
    now_ms: u64,
    next_tick_ms: Option<u64>,
    held_tick_ms: Option<u64>,
    report: Option<Report>,
    events: Vec<QuizEvent>,
}

impl<B: SceneBackend> fmt::Debug for QuizEngine<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizEngine")
            .field("state", &self.state)
            .field("now_ms", &self.now_ms)
            .field("time_remaining", &self.timer.remaining())
            .field("feedback", &self.feedback)
            .field("pending_events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl<B: SceneBackend> QuizEngine<B> {
    /// Creates an engine at the intro screen.
    #[must_use]
    pub fn new(config: Config, catalog: Catalog, backend: B) -> Self {
        Self {
            verifier: PlacementVerifier::new(config.rotation_epsilon),
            tracker: PoseTracker::new(config.boundary),
            timer: CountdownTimer::new(config.time_budget_secs),
            config,
            catalog: Arc::new(catalog),
            scene: SceneManager::new(backend),
            viewport: None,
            identity: Arc::new(Anonymous),
            state: QuizState::Intro,
            session: None,
            restore: DelayedRestore::new(),
            feedback: None,
            exit_prompt_open: false,
            now_ms: 0,
            next_tick_ms: None,
            held_tick_ms: None,
            report: None,
            events: Vec::new(),
        }
    }

    /// Sets the source of the learner id stamped on reports.
    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn IdentitySource>) -> Self {
        self.identity = identity;
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> QuizState {
        self.state
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The exercise catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The running session, if any.
    #[must_use]
    pub const fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    /// The most recent report, kept until the next session starts.
    #[must_use]
    pub const fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    /// Current feedback message.
    #[must_use]
    pub const fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    /// Live pose.
    #[must_use]
    pub const fn pose(&self) -> LivePose {
        self.tracker.pose()
    }

    /// Whether pose input is accepted.
    #[must_use]
    pub const fn controls_enabled(&self) -> bool {
        self.tracker.controls_enabled()
    }

    /// Seconds left on the countdown.
    #[must_use]
    pub const fn time_remaining(&self) -> u32 {
        self.timer.remaining()
    }

    /// Whether the exit confirmation dialog is showing.
    #[must_use]
    pub const fn exit_prompt_open(&self) -> bool {
        self.exit_prompt_open
    }

    /// Milliseconds elapsed on the virtual clock.
    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// The viewport of the current attempt.
    #[must_use]
    pub const fn viewport(&self) -> Option<&Viewport> {
        self.viewport.as_ref()
    }

    /// The scene manager.
    #[must_use]
    pub const fn scene(&self) -> &SceneManager<B> {
        &self.scene
    }

    /// Mutable access to the scene manager.
    pub fn scene_mut(&mut self) -> &mut SceneManager<B> {
        &mut self.scene
    }

    /// Takes every event queued since the last call.
    pub fn drain_events(&mut self) -> Vec<QuizEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------------
    // Session transitions
    // ------------------------------------------------------------------------

    /// Creates a session and asks for lab confirmation.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidStateTransition` outside the intro.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<()> {
        if self.state != QuizState::Intro {
            return Err(self.reject("lab_confirmation"));
        }

        self.session = Some(SessionState::new(
            self.catalog.plans(self.config.time_budget_secs),
        ));
        self.report = None;
        self.feedback = None;
        self.tracker.reset();
        self.tracker.disable();
        self.state = QuizState::LabConfirmation;

        let total_exercises = self.catalog.len();
        self.events
            .push(QuizEvent::SessionStarted(SessionStartedPayload { total_exercises }));
        info!(total_exercises, "Session started, awaiting lab confirmation");
        Ok(())
    }

    /// Answers the lab readiness question.
    ///
    /// Confirming opens the first attempt and starts its countdown; declining
    /// discards the session.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidStateTransition` outside lab confirmation or
    /// while the exit prompt is open.
    #[instrument(skip(self))]
    pub fn confirm_lab(&mut self, confirmed: bool) -> Result<()> {
        if self.state != QuizState::LabConfirmation {
            return Err(self.reject(if confirmed { "attempt(0)" } else { "intro" }));
        }
        self.ensure_prompt_closed("lab confirmation")?;

        if !confirmed {
            info!("Lab confirmation declined, discarding session");
            self.discard_session();
            self.events.push(QuizEvent::session_exited(None));
            return Ok(());
        }
        self.begin_attempt(0)
    }

    /// Advances to the next exercise after the current one finished.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidStateTransition` unless the current attempt
    /// has finished and is not the last one.
    #[instrument(skip(self))]
    pub fn next_exercise(&mut self) -> Result<()> {
        let Some(index) = self.state.attempt_index() else {
            return Err(self.reject("next exercise"));
        };
        self.ensure_prompt_closed("next exercise")?;
        if !self.can_proceed() {
            return Err(self.reject(format!("attempt({})", index + 1)));
        }

        self.teardown_viewport();
        self.begin_attempt(index + 1)
    }

    /// Retries loading the model of an attempt stuck on an unavailable asset.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidStateTransition` unless the current attempt
    /// is waiting for its asset.
    #[instrument(skip(self))]
    pub fn retry_asset_load(&mut self) -> Result<()> {
        let QuizState::Attempt {
            index,
            phase: AttemptPhase::AssetUnavailable,
        } = self.state
        else {
            return Err(self.reject("asset retry"));
        };
        self.ensure_prompt_closed("asset retry")?;

        let catalog = Arc::clone(&self.catalog);
        let exercise = catalog.get(index)?;
        info!(index, model = %exercise.model_ref, "Retrying exercise model load");
        self.mount_and_activate(index, exercise);
        Ok(())
    }

    /// Shows the exit confirmation dialog and holds the countdown.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidStateTransition` at the intro.
    pub fn open_exit_prompt(&mut self) -> Result<()> {
        if self.state == QuizState::Intro {
            return Err(self.reject("exit prompt"));
        }
        if self.exit_prompt_open {
            return Ok(());
        }

        self.exit_prompt_open = true;
        if self.timer.pause() {
            self.held_tick_ms = self
                .next_tick_ms
                .take()
                .map(|due| due.saturating_sub(self.now_ms));
            info!(time_remaining = self.timer.remaining(), "Countdown paused");
        }
        Ok(())
    }

    /// Closes the exit confirmation dialog and releases the countdown.
    ///
    /// The fraction of a second that was left before the pause is kept.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidStateTransition` when no prompt is open.
    pub fn dismiss_exit_prompt(&mut self) -> Result<()> {
        if !self.exit_prompt_open {
            return Err(self.reject("dismiss exit prompt"));
        }

        self.exit_prompt_open = false;
        if self.timer.resume() {
            let wait = self.held_tick_ms.take().unwrap_or(TICK_MS).max(1);
            self.next_tick_ms = Some(self.now_ms.saturating_add(wait));
            info!(time_remaining = self.timer.remaining(), "Countdown resumed");
        }
        Ok(())
    }

    /// Ends a running session now.
    ///
    /// Exercises that were never finished appear in the report as failures
    /// charging their full budget.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidStateTransition` unless an attempt is current.
    #[instrument(skip(self))]
    pub fn finish_early(&mut self) -> Result<()> {
        if self.state.attempt_index().is_none() {
            return Err(self.reject("completed"));
        }
        self.exit_prompt_open = false;
        info!("Ending session early");
        self.complete(SessionStatus::EndedEarly)
    }

    /// Discards the session from any state and returns to the intro.
    ///
    /// Exiting mid-attempt still finalizes a report, which the
    /// `session_exited` event carries.
    #[instrument(skip(self))]
    pub fn exit(&mut self) {
        let Some(session) = self.session.as_mut() else {
            self.discard_session();
            return;
        };

        let report = if self.state.attempt_index().is_some() {
            match session.finalize(SessionStatus::EndedEarly, self.identity.current_user()) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(error = %e, "Failed to finalize abandoned session");
                    None
                }
            }
        } else {
            None
        };

        self.discard_session();
        if report.is_some() {
            self.report.clone_from(&report);
        }
        self.events.push(QuizEvent::session_exited(report));
        info!("Session exited");
    }

    /// Returns from the completion screen to the intro.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidStateTransition` unless the session completed.
    #[instrument(skip(self))]
    pub fn restart(&mut self) -> Result<()> {
        if !self.state.is_completed() {
            return Err(self.reject("intro"));
        }
        self.discard_session();
        info!("Session reset for restart");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Pose and verification
    // ------------------------------------------------------------------------

    /// Drags the model. Returns `false` when the input was ignored.
    pub fn set_position(&mut self, position: Vec3) -> bool {
        if self.exit_prompt_open || !position.is_finite() {
            debug!(?position, "Ignoring position update");
            return false;
        }
        if !self.tracker.set_position(position) {
            return false;
        }
        self.mirror_pose();
        true
    }

    /// Sets one rotation axis in degrees. Returns `false` when ignored.
    pub fn set_rotation(&mut self, axis: Axis, degrees: f64) -> bool {
        if self.exit_prompt_open || !degrees.is_finite() {
            debug!(%axis, degrees, "Ignoring rotation update");
            return false;
        }
        if !self.tracker.set_rotation_axis(axis, degrees) {
            return false;
        }
        self.mirror_pose();
        true
    }

    /// Checks the current placement.
    ///
    /// A wrong placement shows feedback immediately and schedules the
    /// instruction text to come back after the restore delay. A pass or a
    /// timeout supersedes any restore still pending.
    ///
    /// Once the last exercise has timed out the session is complete, but
    /// verifying still answers with a time-expired failure like any other
    /// timed-out attempt.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidStateTransition` outside an attempt or while
    /// the exit prompt is open.
    #[instrument(skip(self))]
    pub fn verify(&mut self) -> Result<Verification> {
        let (index, phase) = match self.state {
            QuizState::Attempt { index, phase } => (index, phase),
            QuizState::Completed => return self.verify_after_completion(),
            _ => return Err(self.reject("verify")),
        };
        self.ensure_prompt_closed("verify")?;

        let catalog = Arc::clone(&self.catalog);
        let exercise = catalog.get(index)?;
        let gate = VerifyGate {
            controls_enabled: self.tracker.controls_enabled(),
            time_remaining: self.timer.remaining(),
        };
        let verification = self.verifier.verify(&self.tracker.pose(), exercise, gate);
        self.events.push(QuizEvent::Verified(VerifiedPayload {
            index,
            verification,
        }));

        if verification.pass {
            info!(index, distance = ?verification.distance, "Placement passed");
            self.feedback = Some(Feedback::success(PASS_MESSAGE));
            self.finish_attempt(index, AttemptStatus::Passed)?;
        } else if verification.reason == Some(FailureReason::TimeExpired) {
            debug!(index, "Verification rejected, attempt is locked");
            if phase == AttemptPhase::Active && !self.current_status_is(AttemptStatus::Passed) {
                self.feedback = Some(Feedback::error(self.time_up_message(index)));
            }
        } else {
            debug!(index, distance = ?verification.distance, "Wrong placement");
            self.feedback = Some(Feedback::error(WRONG_PLACEMENT_MESSAGE));
            if self.timer.remaining() > 0 {
                let handle = self
                    .restore
                    .schedule(self.now_ms.saturating_add(self.config.restore_delay_ms));
                debug!(generation = handle.generation(), "Instruction restore scheduled");
            }
        }
        Ok(verification)
    }

    fn verify_after_completion(&mut self) -> Result<Verification> {
        self.ensure_prompt_closed("verify")?;
        let timed_out = self
            .session
            .as_ref()
            .and_then(SessionState::current)
            .filter(|attempt| attempt.status == AttemptStatus::FailedTimeout)
            .map(|attempt| attempt.exercise_index);
        let Some(index) = timed_out else {
            return Err(self.reject("verify"));
        };

        debug!(index, "Verification after the final timeout");
        let verification = Verification::time_expired();
        self.events.push(QuizEvent::Verified(VerifiedPayload {
            index,
            verification,
        }));
        Ok(verification)
    }

    // ------------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------------

    /// Moves the virtual clock forward by `elapsed`.
    ///
    /// Countdown ticks and the delayed restore fire in chronological order.
    /// When both fall on the same millisecond the restore runs first, so a
    /// timeout on that tick always has the last word. The clock stops at a
    /// far horizon instead of overflowing.
    ///
    /// # Errors
    ///
    /// Propagates failures to record a timed-out attempt.
    pub fn advance(&mut self, elapsed: Duration) -> Result<()> {
        let step = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let target = self.now_ms.saturating_add(step).min(CLOCK_HORIZON_MS);

        loop {
            let tick = self.next_tick_ms.filter(|&due| due <= target);
            let restore = self.restore.due_at().filter(|&due| due <= target);
            match (tick, restore) {
                (None, None) => break,
                (Some(tick_at), Some(restore_at)) if restore_at <= tick_at => {
                    self.now_ms = restore_at;
                    self.fire_restore();
                }
                (None, Some(restore_at)) => {
                    self.now_ms = restore_at;
                    self.fire_restore();
                }
                (Some(tick_at), _) => {
                    self.now_ms = tick_at;
                    self.fire_tick()?;
                }
            }
        }

        self.now_ms = target;
        Ok(())
    }

    /// Applies one learner command.
    ///
    /// Pose commands that the engine ignores are not errors.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying operation.
    pub fn apply(&mut self, command: &QuizCommand) -> Result<()> {
        match *command {
            QuizCommand::Start => self.start(),
            QuizCommand::ConfirmLab { confirmed } => self.confirm_lab(confirmed),
            QuizCommand::SetPosition { x, y, z } => {
                self.set_position(Vec3::new(x, y, z));
                Ok(())
            }
            QuizCommand::SetRotation { axis, degrees } => {
                self.set_rotation(axis, degrees);
                Ok(())
            }
            QuizCommand::Verify => self.verify().map(|_| ()),
            QuizCommand::Next => self.next_exercise(),
            QuizCommand::RetryAsset => self.retry_asset_load(),
            QuizCommand::OpenExitPrompt => self.open_exit_prompt(),
            QuizCommand::DismissExitPrompt => self.dismiss_exit_prompt(),
            QuizCommand::FinishEarly => self.finish_early(),
            QuizCommand::Exit => {
                self.exit();
                Ok(())
            }
            QuizCommand::Restart => self.restart(),
            QuizCommand::Wait { ms } => self.advance(Duration::from_millis(ms)),
        }
    }

    /// Builds a display snapshot.
    #[must_use]
    pub fn snapshot(&self) -> QuizSnapshot {
        let index = self.state.attempt_index();
        let exercise = index.and_then(|i| self.catalog.get(i).ok());
        let total_exercises = self.catalog.len();

        QuizSnapshot {
            state: self.state,
            exercise_index: index,
            total_exercises,
            progress: index.map(|i| format!("{}/{total_exercises}", i + 1)),
            title: exercise.map(ExerciseDefinition::title),
            instruction: exercise.map(|e| e.instruction_text.clone()),
            guide: exercise.map(|e| e.guide_content.clone()).unwrap_or_default(),
            time_remaining: index.map(|_| self.timer.remaining()),
            controls_enabled: self.tracker.controls_enabled(),
            feedback: self.feedback.clone(),
            position: self.tracker.pose().position,
            rotation_degrees: self.tracker.rotation_degrees(),
            passed_count: self.session.as_ref().map_or(0, SessionState::passed_count),
            can_proceed: self.can_proceed(),
            can_retry_asset: matches!(
                self.state,
                QuizState::Attempt {
                    phase: AttemptPhase::AssetUnavailable,
                    ..
                }
            ),
            exit_prompt_open: self.exit_prompt_open,
            report_ready: self.report.is_some(),
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn reject(&self, to: impl fmt::Display) -> SimError {
        warn!(from = %self.state, to = %to, "Rejected transition");
        SimError::invalid_transition(self.state, to)
    }

    fn ensure_prompt_closed(&self, action: &str) -> Result<()> {
        if self.exit_prompt_open {
            return Err(self.reject(format!("{action} (exit prompt open)")));
        }
        Ok(())
    }

    fn current_status_is(&self, status: AttemptStatus) -> bool {
        self.session
            .as_ref()
            .and_then(SessionState::current)
            .is_some_and(|attempt| attempt.status == status)
    }

    fn can_proceed(&self) -> bool {
        match self.state {
            QuizState::Attempt {
                index,
                phase: AttemptPhase::Active,
            } => !self.catalog.is_last(index) && !self.current_status_is(AttemptStatus::Pending),
            _ => false,
        }
    }

    fn time_up_message(&self, index: usize) -> &'static str {
        if self.catalog.is_last(index) {
            TIME_UP_MESSAGE
        } else {
            TIME_UP_PROCEED_MESSAGE
        }
    }

    fn begin_attempt(&mut self, index: usize) -> Result<()> {
        let catalog = Arc::clone(&self.catalog);
        let exercise = catalog.get(index)?;
        let budget = exercise.time_budget(self.config.time_budget_secs);

        let Some(session) = self.session.as_mut() else {
            return Err(self.reject(format!("attempt({index})")));
        };
        session.begin_attempt(index, budget)?;

        self.restore.cancel();
        self.timer.reset(budget);
        self.next_tick_ms = None;
        self.held_tick_ms = None;
        self.tracker.reset();
        self.tracker.disable();
        self.feedback = None;
        self.state = QuizState::Attempt {
            index,
            phase: AttemptPhase::Active,
        };
        info!(index, title = %exercise.title(), budget, "Attempt created");

        self.mount_and_activate(index, exercise);
        Ok(())
    }

    fn mount_options(&self, exercise: &ExerciseDefinition) -> MountOptions {
        let target = exercise.target_position;
        let boundary = self.config.boundary;
        let mut options = MountOptions::new(&exercise.model_ref)
            .with_drag_bounds(DragBounds::new(boundary.min, boundary.max))
            .with_camera([target.x, target.y, 0.0], self.config.camera_distance);
        options.scale = exercise.scale.to_array();
        if let Some(backdrop) = &self.config.backdrop_model {
            options = options.with_backdrop(backdrop, BACKDROP_POSITION);
        }
        options
    }

    fn mount_and_activate(&mut self, index: usize, exercise: &ExerciseDefinition) {
        let options = self.mount_options(exercise);
        match self.scene.mount(&options) {
            Ok(viewport) => {
                self.viewport = Some(viewport);
                self.activate(index, exercise);
            }
            Err(e) => {
                let error = SimError::asset_load(&exercise.model_ref, e.to_string());
                warn!(index, error = %error, "Exercise model unavailable");
                self.tracker.disable();
                self.state = QuizState::Attempt {
                    index,
                    phase: AttemptPhase::AssetUnavailable,
                };
                self.feedback = Some(Feedback::error(format!(
                    "Could not load the {} model. Retry to continue.",
                    exercise.title()
                )));
                self.events
                    .push(QuizEvent::AssetUnavailable(AssetUnavailablePayload {
                        index,
                        model_ref: exercise.model_ref.clone(),
                        message: e.to_string(),
                    }));
            }
        }
    }

    fn activate(&mut self, index: usize, exercise: &ExerciseDefinition) {
        self.tracker.enable();
        self.timer.start();
        self.next_tick_ms = Some(self.now_ms.saturating_add(TICK_MS));
        let time_remaining = self.timer.remaining();
        if let Some(attempt) = self.session.as_mut().and_then(SessionState::current_mut) {
            attempt.controls_enabled = true;
            attempt.time_remaining = time_remaining;
        }
        self.state = QuizState::Attempt {
            index,
            phase: AttemptPhase::Active,
        };
        self.feedback = None;
        self.events
            .push(QuizEvent::AttemptStarted(AttemptStartedPayload {
                index,
                title: exercise.title(),
                instruction: exercise.instruction_text.clone(),
                time_remaining,
            }));
        info!(index, time_remaining, "Attempt started");
    }

    fn mirror_pose(&mut self) {
        let Some(viewport) = &self.viewport else {
            return;
        };
        let pose = self.tracker.pose();
        if let Err(e) = self.scene.apply_pose(
            viewport,
            pose.position.to_array(),
            pose.rotation.to_array(),
        ) {
            warn!(error = %e, "Failed to mirror pose onto viewport");
        }
    }

    fn teardown_viewport(&mut self) {
        if let Some(mut viewport) = self.viewport.take() {
            self.scene.teardown(&mut viewport);
        }
    }

    fn stop_clock(&mut self) {
        self.restore.cancel();
        self.timer.stop();
        self.next_tick_ms = None;
        self.held_tick_ms = None;
        self.tracker.disable();
    }

    fn sync_time_remaining(&mut self, time_remaining: u32) {
        if let Some(attempt) = self.session.as_mut().and_then(SessionState::current_mut) {
            attempt.time_remaining = time_remaining;
        }
    }

    fn finish_attempt(&mut self, index: usize, status: AttemptStatus) -> Result<()> {
        self.stop_clock();
        let seconds_elapsed = self.timer.elapsed_secs();
        let achieved = self.tracker.pose();

        let Some(session) = self.session.as_mut() else {
            return Err(self.reject(status));
        };
        session.finish_current(status, achieved, seconds_elapsed)?;
        self.sync_time_remaining(self.timer.remaining());

        let is_last = self.catalog.is_last(index);
        self.events
            .push(QuizEvent::AttemptFinished(AttemptFinishedPayload {
                index,
                status,
                seconds_elapsed,
                is_last,
            }));
        info!(index, %status, seconds_elapsed, "Attempt finished");

        if is_last {
            self.complete(SessionStatus::Completed)?;
        }
        Ok(())
    }

    fn complete(&mut self, status: SessionStatus) -> Result<()> {
        self.teardown_viewport();
        self.stop_clock();

        let user_id = self.identity.current_user();
        let Some(session) = self.session.as_mut() else {
            return Err(self.reject("completed"));
        };
        let report = session.finalize(status, user_id)?;

        self.state = QuizState::Completed;
        info!(
            passed = report.passed_count,
            total = report.total_exercises,
            %status,
            "Session complete"
        );
        self.report = Some(report.clone());
        self.events.push(QuizEvent::session_complete(report));
        Ok(())
    }

    fn discard_session(&mut self) {
        self.teardown_viewport();
        self.stop_clock();
        self.timer.reset(self.config.time_budget_secs);
        self.tracker.reset();
        self.feedback = None;
        self.exit_prompt_open = false;
        self.session = None;
        self.state = QuizState::Intro;
    }

    fn fire_tick(&mut self) -> Result<()> {
        let Some(index) = self.state.attempt_index() else {
            self.next_tick_ms = None;
            return Ok(());
        };

        match self.timer.tick() {
            TimerTick::Idle => self.next_tick_ms = None,
            TimerTick::Decremented(time_remaining) => {
                self.next_tick_ms = Some(self.now_ms.saturating_add(TICK_MS));
                self.sync_time_remaining(time_remaining);
                self.events.push(QuizEvent::Tick(TickPayload {
                    index,
                    time_remaining,
                }));
                debug!(index, time_remaining, "Tick");
            }
            TimerTick::Expired => {
                self.next_tick_ms = None;
                self.sync_time_remaining(0);
                self.events.push(QuizEvent::Tick(TickPayload {
                    index,
                    time_remaining: 0,
                }));
                info!(index, "Time expired");
                self.feedback = Some(Feedback::error(self.time_up_message(index)));
                self.finish_attempt(index, AttemptStatus::FailedTimeout)?;
            }
        }
        Ok(())
    }

    fn fire_restore(&mut self) {
        let Some(handle) = self.restore.take_due(self.now_ms) else {
            return;
        };
        let QuizState::Attempt {
            index,
            phase: AttemptPhase::Active,
        } = self.state
        else {
            return;
        };
        if !self.current_status_is(AttemptStatus::Pending) {
            return;
        }

        match self.catalog.get(index) {
            Ok(exercise) => {
                let message = exercise.instruction_text.clone();
                debug!(generation = handle.generation(), index, "Instruction text restored");
                self.feedback = Some(Feedback::info(message.clone()));
                self.events
                    .push(QuizEvent::FeedbackRestored(FeedbackRestoredPayload {
                        index,
                        message,
                    }));
            }
            Err(e) => warn!(error = %e, "Restore fired for a missing exercise"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
