//! Scene-space geometry: points, axes and the placement boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A point or angle triple in scene space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// The origin / zero rotation.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a new vector.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dz.mul_add(dz, dx.mul_add(dx, dy * dy)).sqrt()
    }

    /// Returns the component for `axis`.
    #[must_use]
    pub const fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Sets the component for `axis`.
    pub fn set(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
    }

    /// Returns `true` if every component is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Converts to `[x, y, z]`.
    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Builds from `[x, y, z]`.
    #[must_use]
    pub const fn from_array([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }

    /// Applies `f` to every component.
    #[must_use]
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self::new(f(self.x), f(self.y), f(self.z))
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(value: [f64; 3]) -> Self {
        Self::from_array(value)
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(value: Vec3) -> Self {
        value.to_array()
    }
}

/// One of the three scene axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// X axis.
    X,
    /// Y axis.
    Y,
    /// Z axis.
    Z,
}

impl Axis {
    /// All axes in order.
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => write!(f, "x"),
            Self::Y => write!(f, "y"),
            Self::Z => write!(f, "z"),
        }
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x" => Ok(Self::X),
            "y" => Ok(Self::Y),
            "z" => Ok(Self::Z),
            other => Err(format!("invalid axis '{other}', expected one of: x, y, z")),
        }
    }
}

/// Axis-aligned cuboid that positions are clamped into.
///
/// The same `[min, max]` range applies on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl Boundary {
    /// Creates a boundary.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamps every coordinate of `p` into the boundary.
    #[must_use]
    pub fn clamp(&self, p: Vec3) -> Vec3 {
        p.map(|v| v.clamp(self.min, self.max))
    }

    /// Returns `true` if `p` lies inside the boundary (edges included).
    #[must_use]
    pub fn contains(&self, p: &Vec3) -> bool {
        [p.x, p.y, p.z]
            .iter()
            .all(|v| (self.min..=self.max).contains(v))
    }
}

impl Default for Boundary {
    fn default() -> Self {
        Self::new(-10.0, 10.0)
    }
}

/// Converts degrees to radians.
#[must_use]
pub fn degrees_to_radians(degrees: f64) -> f64 {
    degrees.to_radians()
}

/// Converts radians to degrees.
#[must_use]
pub fn radians_to_degrees(radians: f64) -> f64 {
    radians.to_degrees()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_distance() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
        assert!(a.distance(&a).abs() < f64::EPSILON);
    }

    #[test]
    fn test_get_set_axis() {
        let mut v = Vec3::ZERO;
        v.set(Axis::Y, 2.5);
        assert!((v.get(Axis::Y) - 2.5).abs() < f64::EPSILON);
        assert!(v.get(Axis::X).abs() < f64::EPSILON);
    }

    #[test]
    fn test_array_conversion() {
        let v = Vec3::from([1.0, -2.0, 3.0]);
        assert_eq!(v.to_array(), [1.0, -2.0, 3.0]);
        let arr: [f64; 3] = v.into();
        assert_eq!(arr, [1.0, -2.0, 3.0]);
    }

    #[test]
    fn test_axis_from_str_case_insensitive() {
        assert_eq!("x".parse::<Axis>().unwrap(), Axis::X);
        assert_eq!("Y".parse::<Axis>().unwrap(), Axis::Y);
        assert_eq!("z".parse::<Axis>().unwrap(), Axis::Z);
        assert!("w".parse::<Axis>().is_err());
    }

    #[test]
    fn test_axis_serde() {
        assert_eq!(serde_json::to_string(&Axis::Z).unwrap(), r#""z""#);
        let axis: Axis = serde_json::from_str(r#""x""#).unwrap();
        assert_eq!(axis, Axis::X);
    }

    #[test]
    fn test_boundary_clamp() {
        let boundary = Boundary::default();
        let clamped = boundary.clamp(Vec3::new(15.0, -11.0, 4.0));
        assert_eq!(clamped, Vec3::new(10.0, -10.0, 4.0));
        assert!(boundary.contains(&clamped));
        assert!(!boundary.contains(&Vec3::new(10.1, 0.0, 0.0)));
    }

    #[test]
    fn test_degree_conversion() {
        assert!((degrees_to_radians(180.0) - PI).abs() < 1e-12);
        assert!((radians_to_degrees(-PI / 2.0) + 90.0).abs() < 1e-12);
    }
}
