//! radsim engine
//!
//! Runs radiography positioning quizzes: the exercise catalog, pose tracking,
//! placement verification, the per-attempt countdown and the quiz state
//! machine, plus the HTTP API and WebSocket events that serve them.

pub mod api;
pub mod catalog;
pub mod config;
pub mod delay;
pub mod driver;
pub mod error;
pub mod events;
pub mod geometry;
pub mod pose;
pub mod quiz;
pub mod session;
pub mod timer;
pub mod verifier;
pub mod websocket;

pub use api::{create_router, AppState, ErrorResponse, SharedEngine};
pub use catalog::{Catalog, ExerciseDefinition, ZRotationRule};
pub use config::Config;
pub use delay::{DelayedRestore, RestoreHandle};
pub use driver::{run_clock, DEFAULT_CLOCK_PERIOD};
pub use error::{Result, SimError};
pub use events::QuizEvent;
pub use geometry::{Axis, Boundary, Vec3};
pub use pose::{LivePose, PoseTracker};
pub use quiz::{
    AttemptPhase, Feedback, FeedbackTone, QuizCommand, QuizEngine, QuizSnapshot, QuizState,
};
pub use session::{AttemptState, AttemptStatus, SessionState};
pub use timer::{CountdownTimer, TimerState, TimerTick};
pub use verifier::{FailureReason, PlacementVerifier, Verification, VerifyGate};
pub use websocket::EventBroadcaster;
