//! Rigid transforms for machine kinematics.
//!
//! The C axis turns the workpiece about −Z and the A axis about +X, each
//! through a configurable center. Angles at this level are in degrees,
//! as they appear in G-code.

use nalgebra::{Matrix4, Point3, Rotation3, Unit, Vector3, Vector4};

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `v`.
    pub fn translation(v: &Vector3<f64>) -> Self {
        Self {
            matrix: Matrix4::new_translation(v),
        }
    }

    /// Rotation about an axis through the origin by `angle` radians.
    pub fn rotation_about_axis(axis: &Unit<Vector3<f64>>, angle: f64) -> Self {
        Self {
            matrix: Rotation3::from_axis_angle(axis, angle).to_homogeneous(),
        }
    }

    /// Rotation by `angle` radians about the line through `center` along `axis`.
    pub fn rotation_about_point(
        axis: &Unit<Vector3<f64>>,
        angle: f64,
        center: &Point3<f64>,
    ) -> Self {
        let to_origin = Transform::translation(&-center.coords);
        let back = Transform::translation(&center.coords);
        back.then(&Transform::rotation_about_axis(axis, angle))
            .then(&to_origin)
    }

    /// C-axis rotation: `degrees` about −Z through `center`.
    pub fn c_axis(degrees: f64, center: &Point3<f64>) -> Self {
        Self::rotation_about_point(&-Vector3::z_axis(), degrees.to_radians(), center)
    }

    /// A-axis rotation: `degrees` about +X through `center`.
    pub fn a_axis(degrees: f64, center: &Point3<f64>) -> Self {
        Self::rotation_about_point(&Vector3::x_axis(), degrees.to_radians(), center)
    }

    /// Compose: `self * other`, so `other` is applied first.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3<f64>) -> Point3<f64> {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vector3<f64>) -> Vector3<f64> {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vector3::new(r.x, r.y, r.z)
    }

    /// True if the transform is exactly the identity.
    pub fn is_identity(&self) -> bool {
        self.matrix == Matrix4::identity()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation() {
        let t = Transform::translation(&Vector3::new(10.0, 20.0, 30.0));
        let result = t.apply_point(&Point3::new(1.0, 2.0, 3.0));
        assert!((result - Point3::new(11.0, 22.0, 33.0)).norm() < 1e-12);
        assert_eq!(t.apply_vec(&Vector3::x()), Vector3::x());
    }

    #[test]
    fn test_c_axis_turns_clockwise_seen_from_above() {
        // Positive C about −Z takes +X toward −Y.
        let t = Transform::c_axis(90.0, &Point3::origin());
        let result = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(result.x.abs() < 1e-12);
        assert!((result.y + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_a_axis_about_center() {
        let center = Point3::new(0.0, 0.0, 5.0);
        let t = Transform::a_axis(90.0, &center);
        // (0, 1, 5) is one unit along +Y from the center; +X rotation takes it to +Z.
        let result = t.apply_point(&Point3::new(0.0, 1.0, 5.0));
        assert!(result.y.abs() < 1e-12);
        assert!((result.z - 6.0).abs() < 1e-12);
        // The center is fixed.
        assert!((t.apply_point(&center) - center).norm() < 1e-12);
    }

    #[test]
    fn test_compose_order() {
        let shift = Transform::translation(&Vector3::new(1.0, 0.0, 0.0));
        let turn = Transform::c_axis(180.0, &Point3::origin());
        // turn.then(shift): shift first, then turn.
        let result = turn.then(&shift).apply_point(&Point3::origin());
        assert!((result.x + 1.0).abs() < 1e-12);
        assert!(Transform::default().is_identity());
    }
}
