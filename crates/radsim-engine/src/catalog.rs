//! Exercise catalog.
//!
//! An ordered, read-only list of positioning exercises. The order defines the
//! quiz sequence and never changes once a session has started.

use std::f64::consts::{FRAC_PI_2, PI};

use radsim_report::{ExercisePlan, PoseRecord};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::geometry::Vec3;

/// Asset path of the exercise whose Z rotation accepts either sign of π.
pub const ELBOW_MODEL_REF: &str = "/models/elbow.glb";

const INSTRUCTION_PREFIX: &str = "Properly simulate the ";
const INSTRUCTION_SUFFIX: &str = " position";

/// How the Z rotation of an exercise is compared with its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZRotationRule {
    /// `|z - target.z| < ε`, like X and Y.
    Exact,
    /// `z` within ε of either `+π` or `-π`.
    EitherSignPi,
}

/// One positioning exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseDefinition {
    /// Asset path of the 3D model.
    pub model_ref: String,
    /// Target position in scene units.
    pub target_position: Vec3,
    /// Target rotation in radians.
    pub target_rotation: Vec3,
    /// Maximum Euclidean distance from the target for a pass.
    pub position_tolerance: f64,
    /// Scale applied to the loaded model.
    pub scale: Vec3,
    /// Instruction shown while the exercise is active.
    pub instruction_text: String,
    /// Positioning guide shown alongside the exercise.
    #[serde(default)]
    pub guide_content: Vec<String>,
    /// Countdown override; the configured budget applies when absent.
    #[serde(default)]
    pub time_limit_secs: Option<u32>,
    /// Rotation tolerance override; the configured ε applies when absent.
    #[serde(default)]
    pub rotation_epsilon: Option<f64>,
}

impl ExerciseDefinition {
    /// Creates an exercise with unit scale and no overrides.
    #[must_use]
    pub fn new(
        model_ref: impl Into<String>,
        target_position: Vec3,
        target_rotation: Vec3,
        position_tolerance: f64,
        instruction_text: impl Into<String>,
    ) -> Self {
        Self {
            model_ref: model_ref.into(),
            target_position,
            target_rotation,
            position_tolerance,
            scale: Vec3::new(1.0, 1.0, 1.0),
            instruction_text: instruction_text.into(),
            guide_content: Vec::new(),
            time_limit_secs: None,
            rotation_epsilon: None,
        }
    }

    /// Sets a uniform scale.
    #[must_use]
    pub const fn with_scale(mut self, factor: f64) -> Self {
        self.scale = Vec3::new(factor, factor, factor);
        self
    }

    /// Sets the guide content.
    #[must_use]
    pub fn with_guide(mut self, lines: &[&str]) -> Self {
        self.guide_content = lines.iter().map(|l| (*l).to_string()).collect();
        self
    }

    /// Overrides the countdown for this exercise.
    #[must_use]
    pub const fn with_time_limit(mut self, secs: u32) -> Self {
        self.time_limit_secs = Some(secs);
        self
    }

    /// Overrides the rotation tolerance for this exercise.
    #[must_use]
    pub const fn with_rotation_epsilon(mut self, epsilon: f64) -> Self {
        self.rotation_epsilon = Some(epsilon);
        self
    }

    /// Z rotation rule for this exercise.
    #[must_use]
    pub fn z_rotation_rule(&self) -> ZRotationRule {
        if self.model_ref == ELBOW_MODEL_REF {
            ZRotationRule::EitherSignPi
        } else {
            ZRotationRule::Exact
        }
    }

    /// Short title such as "PA Hand", derived from the instruction text.
    #[must_use]
    pub fn title(&self) -> String {
        let text = self.instruction_text.trim();
        let stripped = text.strip_prefix(INSTRUCTION_PREFIX).unwrap_or(text);
        stripped
            .strip_suffix(INSTRUCTION_SUFFIX)
            .unwrap_or(stripped)
            .to_string()
    }

    /// Countdown for this exercise given the configured default.
    #[must_use]
    pub fn time_budget(&self, default_secs: u32) -> u32 {
        self.time_limit_secs.unwrap_or(default_secs)
    }

    /// Rotation tolerance for this exercise given the configured default.
    #[must_use]
    pub fn epsilon(&self, default_epsilon: f64) -> f64 {
        self.rotation_epsilon.unwrap_or(default_epsilon)
    }
}

/// Ordered, validated list of exercises.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    exercises: Vec<ExerciseDefinition>,
}

impl Catalog {
    /// Builds a catalog after validating its content.
    ///
    /// # Errors
    ///
    /// Returns `SimError::CatalogInvalid` if the list is empty or any
    /// exercise has a non-positive tolerance, scale or override.
    pub fn new(exercises: Vec<ExerciseDefinition>) -> Result<Self> {
        if exercises.is_empty() {
            return Err(SimError::catalog_invalid("catalog must contain at least one exercise"));
        }

        for (index, exercise) in exercises.iter().enumerate() {
            if !(exercise.position_tolerance.is_finite() && exercise.position_tolerance > 0.0) {
                return Err(SimError::catalog_invalid(format!(
                    "exercise {index} ({}) has non-positive tolerance {}",
                    exercise.model_ref, exercise.position_tolerance
                )));
            }
            if !(exercise.target_position.is_finite() && exercise.target_rotation.is_finite()) {
                return Err(SimError::catalog_invalid(format!(
                    "exercise {index} ({}) has a non-finite target",
                    exercise.model_ref
                )));
            }
            if exercise.time_limit_secs == Some(0) {
                return Err(SimError::catalog_invalid(format!(
                    "exercise {index} ({}) has a zero time limit",
                    exercise.model_ref
                )));
            }
            if exercise.rotation_epsilon.is_some_and(|e| !(e.is_finite() && e > 0.0)) {
                return Err(SimError::catalog_invalid(format!(
                    "exercise {index} ({}) has a non-positive rotation tolerance",
                    exercise.model_ref
                )));
            }
        }

        Ok(Self { exercises })
    }

    /// The five built-in exercises: PA Hand, Lateral Wrist, AP Elbow,
    /// AP Foot and Lateral Ankle.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            exercises: vec![
                ExerciseDefinition::new(
                    "/models/hand.glb",
                    Vec3::new(0.61, -8.88, -7.22),
                    Vec3::ZERO,
                    0.5,
                    "Properly simulate the PA Hand position",
                )
                .with_guide(&[
                    "Pronate hand with palmar surface in contact with IR; spread fingers slightly.",
                    "Align the long axis of hand and forearm with the long axis of IR.",
                    "CR perpendicular to IR, directed to third MCP joint.",
                ]),
                ExerciseDefinition::new(
                    "/models/wrist.glb",
                    Vec3::new(1.39, 0.08, -0.42),
                    Vec3::new(0.0, 0.0, -FRAC_PI_2),
                    0.1,
                    "Properly simulate the Lateral Wrist position",
                )
                .with_scale(6.0),
                ExerciseDefinition::new(
                    ELBOW_MODEL_REF,
                    Vec3::new(-3.63, -3.33, 4.66),
                    Vec3::new(0.0, 0.0, -PI),
                    0.2,
                    "Properly simulate the AP Elbow position",
                )
                .with_scale(4.0),
                ExerciseDefinition::new(
                    "/models/foot.glb",
                    Vec3::new(-0.08, -7.61, -0.58),
                    Vec3::ZERO,
                    0.3,
                    "Properly simulate the AP Foot position",
                )
                .with_scale(1.2)
                .with_guide(&[
                    "Extend (plantar flex) foot but maintain plantar surface resting flat and firmly on IR.",
                    "Angle CR 10° posteriorly (toward heel) with CR perpendicular to metatarsals.",
                    "Direct CR to base of third metatarsal.",
                ]),
                ExerciseDefinition::new(
                    "/models/foot.glb",
                    Vec3::new(-8.25, -0.63, 2.36),
                    Vec3::new(-PI, FRAC_PI_2, -FRAC_PI_2),
                    0.3,
                    "Properly simulate the Lateral Ankle position",
                )
                .with_guide(&[
                    "Center and align the ankle joint to the CR and the long axis of the IR.",
                    "CR perpendicular to IR, directed to the medial malleolus.",
                ]),
            ],
        }
    }

    /// Returns the exercise at `index`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::OutOfRange` when `index >= len()`.
    pub fn get(&self, index: usize) -> Result<&ExerciseDefinition> {
        self.exercises
            .get(index)
            .ok_or_else(|| SimError::out_of_range(index, self.exercises.len()))
    }

    /// Number of exercises.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    /// Always `false`; a catalog holds at least one exercise.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// Returns `true` if `index` is the final exercise.
    #[must_use]
    pub fn is_last(&self, index: usize) -> bool {
        index + 1 == self.exercises.len()
    }

    /// Iterates over exercises in order.
    pub fn iter(&self) -> impl Iterator<Item = &ExerciseDefinition> {
        self.exercises.iter()
    }

    /// Builds the reporter's view of every exercise.
    #[must_use]
    pub fn plans(&self, default_budget_secs: u32) -> Vec<ExercisePlan> {
        self.exercises
            .iter()
            .enumerate()
            .map(|(index, exercise)| {
                ExercisePlan::new(
                    index,
                    exercise.title(),
                    &exercise.model_ref,
                    PoseRecord::new(
                        exercise.target_position.to_array(),
                        exercise.target_rotation.to_array(),
                    ),
                    exercise.time_budget(default_budget_secs),
                )
            })
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::reference()
    }
}
