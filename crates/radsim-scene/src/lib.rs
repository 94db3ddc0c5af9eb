//! radsim Scene Management
//!
//! Capability surface for the 3D rendering and interaction collaborator.
//!
//! The simulation core never talks to a rendering engine directly. It drives
//! a [`SceneBackend`] (load a model by path, place/rotate/scale it, bound its
//! drag interaction, aim the camera, release it) through a [`SceneManager`],
//! which owns the per-attempt [`Viewport`] lifecycle.

mod headless;
mod manager;

pub use headless::{HeadlessScene, SceneObject};
pub use manager::{MountOptions, SceneManager};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during scene operations.
#[derive(Debug, Error)]
pub enum SceneError {
    /// The backend could not load a model asset.
    #[error("failed to load model '{path}': {message}")]
    LoadFailed {
        /// Asset path that was requested.
        path: String,
        /// Backend-provided failure description.
        message: String,
    },

    /// The backend does not know the referenced model.
    #[error("unknown model handle: {0}")]
    UnknownModel(ModelId),

    /// Invalid viewport state for the requested operation.
    #[error("invalid viewport state: expected {expected}, found {actual}")]
    InvalidState {
        /// The expected viewport state.
        expected: ViewportStatus,
        /// The actual viewport state.
        actual: ViewportStatus,
    },
}

impl SceneError {
    /// Creates a new `LoadFailed` error.
    #[must_use]
    pub fn load_failed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LoadFailed {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Opaque handle to an object living inside a scene backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelId(pub u64);

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "model-{}", self.0)
    }
}

/// Axis-aligned cuboid limiting where a dragged object may be placed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragBounds {
    /// Lower bound applied to every axis.
    pub min: f64,
    /// Upper bound applied to every axis.
    pub max: f64,
}

impl DragBounds {
    /// Creates bounds spanning `[min, max]` on every axis.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamps a position into the bounds.
    #[must_use]
    pub fn clamp(&self, position: [f64; 3]) -> [f64; 3] {
        position.map(|v| v.clamp(self.min, self.max))
    }
}

/// Rendering and interaction capability consumed by the simulation.
///
/// Implementations wrap a concrete engine (or, for the server and tests, an
/// in-memory model of one). Positions and rotations are `[x, y, z]` in scene
/// units and radians respectively.
pub trait SceneBackend {
    /// Loads the asset at `path` and adds it to the scene.
    fn load_model(&mut self, path: &str) -> Result<ModelId, SceneError>;

    /// Sets the model's scale.
    fn set_scale(&mut self, model: ModelId, scale: [f64; 3]) -> Result<(), SceneError>;

    /// Sets the model's position.
    fn set_position(&mut self, model: ModelId, position: [f64; 3]) -> Result<(), SceneError>;

    /// Sets the model's rotation.
    fn set_rotation(&mut self, model: ModelId, rotation: [f64; 3]) -> Result<(), SceneError>;

    /// Enables free drag on the model, restricted to `bounds`.
    fn enable_drag(&mut self, model: ModelId, bounds: DragBounds) -> Result<(), SceneError>;

    /// Points the orbit camera at `target` from `distance` along +Z.
    fn focus_camera(&mut self, target: [f64; 3], distance: f64);

    /// Removes the model, its listeners and GPU resources.
    fn release(&mut self, model: ModelId) -> Result<(), SceneError>;
}

impl<B: SceneBackend + ?Sized> SceneBackend for Box<B> {
    fn load_model(&mut self, path: &str) -> Result<ModelId, SceneError> {
        (**self).load_model(path)
    }

    fn set_scale(&mut self, model: ModelId, scale: [f64; 3]) -> Result<(), SceneError> {
        (**self).set_scale(model, scale)
    }

    fn set_position(&mut self, model: ModelId, position: [f64; 3]) -> Result<(), SceneError> {
        (**self).set_position(model, position)
    }

    fn set_rotation(&mut self, model: ModelId, rotation: [f64; 3]) -> Result<(), SceneError> {
        (**self).set_rotation(model, rotation)
    }

    fn enable_drag(&mut self, model: ModelId, bounds: DragBounds) -> Result<(), SceneError> {
        (**self).enable_drag(model, bounds)
    }

    fn focus_camera(&mut self, target: [f64; 3], distance: f64) {
        (**self).focus_camera(target, distance);
    }

    fn release(&mut self, model: ModelId) -> Result<(), SceneError> {
        (**self).release(model)
    }
}

/// Lifecycle status of a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViewportStatus {
    /// Viewport exists but nothing is loaded yet.
    #[default]
    Created,
    /// The exercise model is loaded and placed.
    Loaded,
    /// Drag and camera interaction are live.
    Interactive,
    /// Every resource has been released.
    TornDown,
}

impl std::fmt::Display for ViewportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Loaded => write!(f, "loaded"),
            Self::Interactive => write!(f, "interactive"),
            Self::TornDown => write!(f, "torn_down"),
        }
    }
}

/// The rendering surface owned by one exercise attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Asset path of the exercise model.
    pub model_ref: String,
    /// Handle of the exercise model, once loaded.
    pub model: Option<ModelId>,
    /// Handle of the backdrop prop, if one was loaded.
    pub backdrop: Option<ModelId>,
    /// Current status of the viewport.
    pub status: ViewportStatus,
    /// Timestamp when the viewport was created.
    pub created_at: DateTime<Utc>,
}

impl Viewport {
    /// Creates a new viewport for the given model reference.
    #[must_use]
    pub fn new(model_ref: impl Into<String>) -> Self {
        Self {
            model_ref: model_ref.into(),
            model: None,
            backdrop: None,
            status: ViewportStatus::default(),
            created_at: Utc::now(),
        }
    }

    /// Sets the viewport status.
    #[must_use]
    pub const fn with_status(mut self, status: ViewportStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns whether the viewport accepts pose updates.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.status == ViewportStatus::Interactive
    }

    /// Returns whether the viewport still holds backend resources.
    #[must_use]
    pub const fn holds_resources(&self) -> bool {
        self.model.is_some() || self.backdrop.is_some()
    }
}
