//! Placement verification.
//!
//! A placement passes when the live position is within the exercise's
//! tolerance radius of the target and every rotation axis is within ε of its
//! target angle. The elbow exercise accepts a Z rotation near either `+π` or
//! `-π`, since both describe the same orientation.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::catalog::{ExerciseDefinition, ZRotationRule};
use crate::pose::LivePose;

/// Why a verification failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The pose does not match the target.
    WrongPlacement,
    /// The attempt is over: time ran out or controls are locked.
    TimeExpired,
}

/// Result of one verification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    /// Whether the placement is correct.
    pub pass: bool,
    /// Failure classification, absent on a pass.
    pub reason: Option<FailureReason>,
    /// Distance to the target, absent when verification was rejected.
    pub distance: Option<f64>,
}

impl Verification {
    const fn passed(distance: f64) -> Self {
        Self {
            pass: true,
            reason: None,
            distance: Some(distance),
        }
    }

    const fn wrong_placement(distance: f64) -> Self {
        Self {
            pass: false,
            reason: Some(FailureReason::WrongPlacement),
            distance: Some(distance),
        }
    }

    pub(crate) const fn time_expired() -> Self {
        Self {
            pass: false,
            reason: Some(FailureReason::TimeExpired),
            distance: None,
        }
    }
}

/// Attempt conditions that gate verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyGate {
    /// Whether the attempt's controls are enabled.
    pub controls_enabled: bool,
    /// Seconds left on the countdown.
    pub time_remaining: u32,
}

impl VerifyGate {
    /// A gate that lets verification proceed.
    #[must_use]
    pub const fn open(time_remaining: u32) -> Self {
        Self {
            controls_enabled: true,
            time_remaining,
        }
    }

    const fn is_open(&self) -> bool {
        self.controls_enabled && self.time_remaining > 0
    }
}

/// Judges placements against exercise targets.
#[derive(Debug, Clone, Copy)]
pub struct PlacementVerifier {
    default_epsilon: f64,
}

impl PlacementVerifier {
    /// Creates a verifier using `default_epsilon` unless an exercise overrides it.
    #[must_use]
    pub const fn new(default_epsilon: f64) -> Self {
        Self { default_epsilon }
    }

    /// Verifies `pose` against `exercise`.
    ///
    /// A closed gate yields a `TimeExpired` failure without looking at the pose.
    #[must_use]
    pub fn verify(&self, pose: &LivePose, exercise: &ExerciseDefinition, gate: VerifyGate) -> Verification {
        if !gate.is_open() {
            return Verification::time_expired();
        }

        let distance = pose.position.distance(&exercise.target_position);
        let epsilon = exercise.epsilon(self.default_epsilon);
        let target = exercise.target_rotation;
        let rotation = pose.rotation;

        let x_valid = within(rotation.x, target.x, epsilon);
        let y_valid = within(rotation.y, target.y, epsilon);
        let z_valid = match exercise.z_rotation_rule() {
            ZRotationRule::Exact => within(rotation.z, target.z, epsilon),
            ZRotationRule::EitherSignPi => {
                within(rotation.z, PI, epsilon) || within(rotation.z, -PI, epsilon)
            }
        };

        if distance <= exercise.position_tolerance && x_valid && y_valid && z_valid {
            Verification::passed(distance)
        } else {
            Verification::wrong_placement(distance)
        }
    }
}

fn within(value: f64, target: f64, epsilon: f64) -> bool {
    (value - target).abs() < epsilon
}
