//! In-memory scene backend.
//!
//! [`HeadlessScene`] keeps the same object graph a rendering engine would
//! (loaded models and their transforms) without drawing anything. The server
//! uses it to mirror the browser-side scene; tests use it to observe exactly
//! what the simulation asked of its collaborator.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::{DragBounds, ModelId, SceneBackend, SceneError};

/// An object currently held by the headless scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    /// Asset path the object was loaded from.
    pub path: String,
    /// Position in scene units.
    pub position: [f64; 3],
    /// Rotation in radians.
    pub rotation: [f64; 3],
    /// Scale factors.
    pub scale: [f64; 3],
    /// Drag bounds, when drag interaction is enabled.
    pub drag: Option<DragBounds>,
}

impl SceneObject {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
            drag: None,
        }
    }
}

/// A scene backend that renders nothing and remembers everything.
#[derive(Debug, Default)]
pub struct HeadlessScene {
    objects: BTreeMap<ModelId, SceneObject>,
    failing_paths: BTreeSet<String>,
    camera: Option<([f64; 3], f64)>,
    next_id: u64,
    loads: u64,
}

impl HeadlessScene {
    /// Creates an empty headless scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent load of `path` fail.
    #[must_use]
    pub fn with_failing_path(mut self, path: impl Into<String>) -> Self {
        self.failing_paths.insert(path.into());
        self
    }

    /// Makes loads of `path` fail until [`Self::recover_path`] is called.
    pub fn fail_path(&mut self, path: impl Into<String>) {
        self.failing_paths.insert(path.into());
    }

    /// Lets loads of `path` succeed again.
    pub fn recover_path(&mut self, path: &str) {
        self.failing_paths.remove(path);
    }

    /// Returns the object behind a handle.
    #[must_use]
    pub fn object(&self, id: ModelId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    /// Number of objects still alive in the scene.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    /// Total number of successful loads since creation.
    #[must_use]
    pub const fn load_count(&self) -> u64 {
        self.loads
    }

    /// Last camera target and distance.
    #[must_use]
    pub const fn camera(&self) -> Option<([f64; 3], f64)> {
        self.camera
    }

    fn object_mut(&mut self, id: ModelId) -> Result<&mut SceneObject, SceneError> {
        self.objects.get_mut(&id).ok_or(SceneError::UnknownModel(id))
    }
}

impl SceneBackend for HeadlessScene {
    fn load_model(&mut self, path: &str) -> Result<ModelId, SceneError> {
        if self.failing_paths.contains(path) {
            return Err(SceneError::load_failed(path, "asset unavailable"));
        }
        self.next_id += 1;
        self.loads += 1;
        let id = ModelId(self.next_id);
        self.objects.insert(id, SceneObject::new(path));
        debug!(%id, path, "Model loaded");
        Ok(id)
    }

    fn set_scale(&mut self, model: ModelId, scale: [f64; 3]) -> Result<(), SceneError> {
        self.object_mut(model)?.scale = scale;
        Ok(())
    }

    fn set_position(&mut self, model: ModelId, position: [f64; 3]) -> Result<(), SceneError> {
        let object = self.object_mut(model)?;
        object.position = match object.drag {
            Some(bounds) => bounds.clamp(position),
            None => position,
        };
        Ok(())
    }

    fn set_rotation(&mut self, model: ModelId, rotation: [f64; 3]) -> Result<(), SceneError> {
        self.object_mut(model)?.rotation = rotation;
        Ok(())
    }

    fn enable_drag(&mut self, model: ModelId, bounds: DragBounds) -> Result<(), SceneError> {
        self.object_mut(model)?.drag = Some(bounds);
        Ok(())
    }

    fn focus_camera(&mut self, target: [f64; 3], distance: f64) {
        self.camera = Some((target, distance));
    }

    fn release(&mut self, model: ModelId) -> Result<(), SceneError> {
        self.objects
            .remove(&model)
            .map(|_| ())
            .ok_or(SceneError::UnknownModel(model))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn load_assigns_distinct_handles() {
        let mut scene = HeadlessScene::new();
        let a = scene.load_model("/models/hand.glb").unwrap();
        let b = scene.load_model("/models/xray.glb").unwrap();
        assert_ne!(a, b);
        assert_eq!(scene.live_objects(), 2);
        assert_eq!(scene.load_count(), 2);
    }

    #[test]
    fn failing_path_returns_load_error() {
        let mut scene = HeadlessScene::new().with_failing_path("/models/elbow.glb");
        let err = scene.load_model("/models/elbow.glb").unwrap_err();
        assert!(matches!(err, SceneError::LoadFailed { .. }));
        assert_eq!(scene.live_objects(), 0);

        scene.recover_path("/models/elbow.glb");
        assert!(scene.load_model("/models/elbow.glb").is_ok());
    }

    #[test]
    fn drag_bounds_clamp_positions() {
        let mut scene = HeadlessScene::new();
        let id = scene.load_model("/models/hand.glb").unwrap();
        scene.enable_drag(id, DragBounds::new(-10.0, 10.0)).unwrap();
        scene.set_position(id, [25.0, 0.0, -30.0]).unwrap();
        assert_eq!(scene.object(id).unwrap().position, [10.0, 0.0, -10.0]);
    }

    #[test]
    fn release_removes_object() {
        let mut scene = HeadlessScene::new();
        let id = scene.load_model("/models/hand.glb").unwrap();
        scene.release(id).unwrap();
        assert_eq!(scene.live_objects(), 0);
        assert!(matches!(
            scene.release(id),
            Err(SceneError::UnknownModel(_))
        ));
    }

    #[test]
    fn unknown_model_is_rejected() {
        let mut scene = HeadlessScene::new();
        assert!(scene.set_rotation(ModelId(99), [0.0; 3]).is_err());
    }
}
