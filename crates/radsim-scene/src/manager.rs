//! Viewport lifecycle manager.
//!
//! This module provides [`SceneManager`], which wraps a [`SceneBackend`] and
//! turns its low-level capabilities into the mount / pose / teardown cycle
//! each exercise attempt goes through.

use tracing::{debug, info, instrument, warn};

use crate::{DragBounds, ModelId, SceneBackend, SceneError, Viewport, ViewportStatus};

/// Options for mounting an exercise model into a fresh viewport.
///
/// # Example
///
/// ```
/// use radsim_scene::{DragBounds, MountOptions};
///
/// let options = MountOptions::new("/models/wrist.glb")
///     .with_uniform_scale(6.0)
///     .with_backdrop("/models/xray.glb", [0.0, -10.0, 0.0])
///     .with_drag_bounds(DragBounds::new(-10.0, 10.0))
///     .with_camera([1.39, 0.08, -0.42], 60.0);
/// assert_eq!(options.scale, [6.0, 6.0, 6.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MountOptions {
    /// Asset path of the exercise model.
    pub model_ref: String,
    /// Scale applied to the exercise model.
    pub scale: [f64; 3],
    /// Optional backdrop prop and its fixed position.
    pub backdrop: Option<(String, [f64; 3])>,
    /// Drag bounds for the exercise model.
    pub drag_bounds: Option<DragBounds>,
    /// Camera target and distance along +Z.
    pub camera: Option<([f64; 3], f64)>,
}

impl MountOptions {
    /// Creates mount options for the given model with unit scale.
    #[must_use]
    pub fn new(model_ref: impl Into<String>) -> Self {
        Self {
            model_ref: model_ref.into(),
            scale: [1.0; 3],
            backdrop: None,
            drag_bounds: None,
            camera: None,
        }
    }

    /// Applies the same scale factor on every axis.
    #[must_use]
    pub const fn with_uniform_scale(mut self, factor: f64) -> Self {
        self.scale = [factor; 3];
        self
    }

    /// Adds a backdrop prop at a fixed position.
    #[must_use]
    pub fn with_backdrop(mut self, path: impl Into<String>, position: [f64; 3]) -> Self {
        self.backdrop = Some((path.into(), position));
        self
    }

    /// Enables bounded drag on the exercise model.
    #[must_use]
    pub const fn with_drag_bounds(mut self, bounds: DragBounds) -> Self {
        self.drag_bounds = Some(bounds);
        self
    }

    /// Aims the camera at `target` from `distance` along +Z.
    #[must_use]
    pub const fn with_camera(mut self, target: [f64; 3], distance: f64) -> Self {
        self.camera = Some((target, distance));
        self
    }
}

/// Owns a scene backend and the viewports built on it.
#[derive(Debug, Default)]
pub struct SceneManager<B> {
    backend: B,
}

impl<B: SceneBackend> SceneManager<B> {
    /// Creates a manager around the given backend.
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns a reference to the underlying backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns a mutable reference to the underlying backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Loads the exercise model and brings the viewport to interactive.
    ///
    /// A backdrop that fails to load is logged and skipped. A failure on the
    /// exercise model itself releases anything already loaded and returns
    /// the error, so a failed mount never leaves objects behind.
    #[instrument(skip(self, options), fields(model = %options.model_ref))]
    pub fn mount(&mut self, options: &MountOptions) -> Result<Viewport, SceneError> {
        let mut viewport = Viewport::new(&options.model_ref);

        let model = self.backend.load_model(&options.model_ref)?;
        viewport.model = Some(model);

        if let Err(e) = self.place_model(model, options) {
            self.release_all(&mut viewport);
            return Err(e);
        }
        viewport.status = ViewportStatus::Loaded;

        if let Some((path, position)) = &options.backdrop {
            match self.backend.load_model(path) {
                Ok(backdrop) => {
                    if let Err(e) = self.backend.set_position(backdrop, *position) {
                        warn!(error = %e, "Failed to place backdrop");
                    }
                    viewport.backdrop = Some(backdrop);
                }
                Err(e) => warn!(error = %e, "Backdrop unavailable, continuing without it"),
            }
        }

        if let Some(bounds) = options.drag_bounds {
            if let Err(e) = self.backend.enable_drag(model, bounds) {
                self.release_all(&mut viewport);
                return Err(e);
            }
        }
        if let Some((target, distance)) = options.camera {
            self.backend.focus_camera(target, distance);
        }

        viewport.status = ViewportStatus::Interactive;
        info!(%model, "Viewport mounted");
        Ok(viewport)
    }

    /// Mirrors a pose onto the viewport's exercise model.
    pub fn apply_pose(
        &mut self,
        viewport: &Viewport,
        position: [f64; 3],
        rotation: [f64; 3],
    ) -> Result<(), SceneError> {
        if !viewport.is_interactive() {
            return Err(SceneError::InvalidState {
                expected: ViewportStatus::Interactive,
                actual: viewport.status,
            });
        }
        let Some(model) = viewport.model else {
            return Ok(());
        };
        self.backend.set_position(model, position)?;
        self.backend.set_rotation(model, rotation)?;
        debug!(%model, ?position, ?rotation, "Pose applied");
        Ok(())
    }

    /// Releases every resource the viewport holds.
    ///
    /// Tearing down an already torn-down viewport is a no-op.
    #[instrument(skip(self, viewport), fields(model = %viewport.model_ref))]
    pub fn teardown(&mut self, viewport: &mut Viewport) {
        if viewport.status == ViewportStatus::TornDown {
            return;
        }
        self.release_all(viewport);
        viewport.status = ViewportStatus::TornDown;
        debug!("Viewport torn down");
    }

    fn place_model(
        &mut self,
        model: ModelId,
        options: &MountOptions,
    ) -> Result<(), SceneError> {
        self.backend.set_scale(model, options.scale)?;
        self.backend.set_position(model, [0.0; 3])?;
        self.backend.set_rotation(model, [0.0; 3])
    }

    fn release_all(&mut self, viewport: &mut Viewport) {
        for id in [viewport.model.take(), viewport.backdrop.take()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = self.backend.release(id) {
                warn!(error = %e, "Failed to release scene object");
            }
        }
    }
}
