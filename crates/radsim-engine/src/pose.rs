//! Live pose of the active exercise model.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{degrees_to_radians, radians_to_degrees, Axis, Boundary, Vec3};

/// Position and rotation of the manipulable object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LivePose {
    /// Position in scene units.
    pub position: Vec3,
    /// Rotation in radians.
    pub rotation: Vec3,
}

impl LivePose {
    /// Creates a pose.
    #[must_use]
    pub const fn new(position: Vec3, rotation: Vec3) -> Self {
        Self { position, rotation }
    }
}

/// Owns the live pose of the current attempt and guards its mutation.
///
/// While controls are disabled every setter is a silent no-op and returns
/// `false`.
#[derive(Debug, Clone)]
pub struct PoseTracker {
    pose: LivePose,
    boundary: Boundary,
    controls_enabled: bool,
}

impl PoseTracker {
    /// Creates a tracker at the origin with controls disabled.
    #[must_use]
    pub const fn new(boundary: Boundary) -> Self {
        Self {
            pose: LivePose::new(Vec3::ZERO, Vec3::ZERO),
            boundary,
            controls_enabled: false,
        }
    }

    /// Current pose.
    #[must_use]
    pub const fn pose(&self) -> LivePose {
        self.pose
    }

    /// Whether the setters currently have any effect.
    #[must_use]
    pub const fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    /// Unlocks the setters.
    pub fn enable(&mut self) {
        self.controls_enabled = true;
    }

    /// Locks the setters.
    pub fn disable(&mut self) {
        self.controls_enabled = false;
    }

    /// Stores `p` clamped into the boundary cuboid.
    pub fn set_position(&mut self, p: Vec3) -> bool {
        if !self.controls_enabled {
            debug!("Ignoring position update while controls are disabled");
            return false;
        }
        self.pose.position = self.boundary.clamp(p);
        true
    }

    /// Stores `degrees` (converted to radians) on one rotation axis.
    ///
    /// No clamping is applied; the full ±180° range is meaningful.
    pub fn set_rotation_axis(&mut self, axis: Axis, degrees: f64) -> bool {
        if !self.controls_enabled {
            debug!(%axis, "Ignoring rotation update while controls are disabled");
            return false;
        }
        self.pose.rotation.set(axis, degrees_to_radians(degrees));
        true
    }

    /// Returns position and rotation to zero.
    pub fn reset(&mut self) {
        self.pose = LivePose::default();
    }

    /// Rotation in degrees, for display.
    #[must_use]
    pub fn rotation_degrees(&self) -> Vec3 {
        self.pose.rotation.map(radians_to_degrees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn enabled_tracker() -> PoseTracker {
        let mut tracker = PoseTracker::new(Boundary::default());
        tracker.enable();
        tracker
    }

    #[test]
    fn test_new_tracker_is_locked_at_origin() {
        let tracker = PoseTracker::new(Boundary::default());
        assert!(!tracker.controls_enabled());
        assert_eq!(tracker.pose(), LivePose::default());
    }

    #[test]
    fn test_set_position_clamps_into_boundary() {
        let mut tracker = enabled_tracker();
        assert!(tracker.set_position(Vec3::new(12.0, -20.0, 3.0)));
        assert_eq!(tracker.pose().position, Vec3::new(10.0, -10.0, 3.0));
    }

    #[test]
    fn test_set_rotation_axis_converts_degrees() {
        let mut tracker = enabled_tracker();
        assert!(tracker.set_rotation_axis(Axis::Z, -180.0));
        assert!((tracker.pose().rotation.z + PI).abs() < 1e-12);
        assert!(tracker.pose().rotation.x.abs() < f64::EPSILON);
    }

    #[test]
    fn test_rotation_is_not_clamped() {
        let mut tracker = enabled_tracker();
        tracker.set_rotation_axis(Axis::X, 179.0);
        assert!((tracker.rotation_degrees().x - 179.0).abs() < 1e-9);
    }

    #[test]
    fn test_setters_are_noops_when_disabled() {
        let mut tracker = enabled_tracker();
        tracker.set_position(Vec3::new(1.0, 2.0, 3.0));
        tracker.disable();

        assert!(!tracker.set_position(Vec3::new(5.0, 5.0, 5.0)));
        assert!(!tracker.set_rotation_axis(Axis::Y, 90.0));
        assert_eq!(tracker.pose().position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(tracker.pose().rotation, Vec3::ZERO);
    }

    #[test]
    fn test_reset_zeroes_pose() {
        let mut tracker = enabled_tracker();
        tracker.set_position(Vec3::new(1.0, 2.0, 3.0));
        tracker.set_rotation_axis(Axis::X, 45.0);
        tracker.reset();
        assert_eq!(tracker.pose(), LivePose::default());
        assert!(tracker.controls_enabled());
    }
}
