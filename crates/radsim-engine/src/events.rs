//! Events emitted by the quiz engine.
//!
//! The engine queues events in an outbox as it changes state; the server
//! drains them and forwards them to WebSocket observers. Every event
//! serializes as a JSON object with `event` and `payload` fields.
//!
//! # Event Types
//!
//! - `connected` - Sent to a new observer with the current snapshot
//! - `session_started` - The learner entered the simulation
//! - `attempt_started` - An exercise became current and its countdown runs
//! - `tick` - One second came off the countdown
//! - `verified` - The learner checked a placement
//! - `feedback_restored` - The instruction text replaced a failure message
//! - `attempt_finished` - An attempt passed or timed out
//! - `asset_unavailable` - The exercise model could not be loaded
//! - `session_complete` - The session ended and the report is ready
//! - `session_exited` - The session was discarded

use serde::{Deserialize, Serialize};

use radsim_report::Report;

use crate::quiz::QuizSnapshot;
use crate::session::AttemptStatus;
use crate::verifier::Verification;

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// Snapshot of the engine when the observer connected.
    pub snapshot: QuizSnapshot,
}

/// Payload for the `resync` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResyncPayload {
    /// Number of events the observer missed.
    pub missed: u64,
    /// Snapshot of the engine after the missed events.
    pub snapshot: QuizSnapshot,
}

/// Payload for the `session_started` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartedPayload {
    /// Number of exercises in the session.
    pub total_exercises: usize,
}

/// Payload for the `attempt_started` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptStartedPayload {
    /// Catalog index of the exercise.
    pub index: usize,
    /// Short exercise title.
    pub title: String,
    /// Instruction shown to the learner.
    pub instruction: String,
    /// Countdown budget in seconds.
    pub time_remaining: u32,
}

/// Payload for the `tick` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickPayload {
    /// Catalog index of the exercise.
    pub index: usize,
    /// Seconds left after the tick.
    pub time_remaining: u32,
}

/// Payload for the `verified` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedPayload {
    /// Catalog index of the exercise.
    pub index: usize,
    /// The verification result.
    pub verification: Verification,
}

/// Payload for the `feedback_restored` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRestoredPayload {
    /// Catalog index of the exercise.
    pub index: usize,
    /// The restored instruction text.
    pub message: String,
}

/// Payload for the `attempt_finished` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptFinishedPayload {
    /// Catalog index of the exercise.
    pub index: usize,
    /// Final status of the attempt.
    pub status: AttemptStatus,
    /// Seconds the attempt took.
    pub seconds_elapsed: u32,
    /// Whether this was the last exercise.
    pub is_last: bool,
}

/// Payload for the `asset_unavailable` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetUnavailablePayload {
    /// Catalog index of the exercise.
    pub index: usize,
    /// Asset path that failed to load.
    pub model_ref: String,
    /// Failure description.
    pub message: String,
}

/// Payload for the `session_complete` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCompletePayload {
    /// The finalized report.
    pub report: Report,
}

/// Payload for the `session_exited` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExitedPayload {
    /// Report of the abandoned session, when an attempt had begun.
    pub report: Option<Report>,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Events describing quiz progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum QuizEvent {
    /// Sent when an observer connects.
    Connected(Box<ConnectedPayload>),
    /// Sent to an observer that fell behind and missed events.
    Resync(Box<ResyncPayload>),
    /// Sent when a session is created.
    SessionStarted(SessionStartedPayload),
    /// Sent when an attempt becomes interactive.
    AttemptStarted(AttemptStartedPayload),
    /// Sent once per countdown second.
    Tick(TickPayload),
    /// Sent after every verification.
    Verified(VerifiedPayload),
    /// Sent when the delayed restore fires.
    FeedbackRestored(FeedbackRestoredPayload),
    /// Sent when an attempt leaves pending.
    AttemptFinished(AttemptFinishedPayload),
    /// Sent when an exercise model fails to load.
    AssetUnavailable(AssetUnavailablePayload),
    /// Sent when the session reaches completion.
    SessionComplete(Box<SessionCompletePayload>),
    /// Sent when the session is discarded.
    SessionExited(Box<SessionExitedPayload>),
}

impl QuizEvent {
    /// Creates a `Connected` event.
    #[must_use]
    pub fn connected(snapshot: QuizSnapshot) -> Self {
        Self::Connected(Box::new(ConnectedPayload { snapshot }))
    }

    /// Creates a `Resync` event after `missed` dropped events.
    #[must_use]
    pub fn resync(missed: u64, snapshot: QuizSnapshot) -> Self {
        Self::Resync(Box::new(ResyncPayload { missed, snapshot }))
    }

    /// Creates a `SessionComplete` event.
    #[must_use]
    pub fn session_complete(report: Report) -> Self {
        Self::SessionComplete(Box::new(SessionCompletePayload { report }))
    }

    /// Creates a `SessionExited` event.
    #[must_use]
    pub fn session_exited(report: Option<Report>) -> Self {
        Self::SessionExited(Box::new(SessionExitedPayload { report }))
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::Resync(_) => "resync",
            Self::SessionStarted(_) => "session_started",
            Self::AttemptStarted(_) => "attempt_started",
            Self::Tick(_) => "tick",
            Self::Verified(_) => "verified",
            Self::FeedbackRestored(_) => "feedback_restored",
            Self::AttemptFinished(_) => "attempt_finished",
            Self::AssetUnavailable(_) => "asset_unavailable",
            Self::SessionComplete(_) => "session_complete",
            Self::SessionExited(_) => "session_exited",
        }
    }

    /// The report carried by this event, if any.
    ///
    /// Both completion and an exit from a running session carry one.
    #[must_use]
    pub fn report(&self) -> Option<&Report> {
        match self {
            Self::SessionComplete(payload) => Some(&payload.report),
            Self::SessionExited(payload) => payload.report.as_ref(),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
