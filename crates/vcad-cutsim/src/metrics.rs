//! Cut geometry derived from the volume removed in one substep.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::SimulationMode;
use crate::mesh::TriMesh;

/// Net feed vectors shorter than this count as no relative motion.
const FEED_EPSILON: f64 = 1e-6;

/// Width, depth and cross-section of one cut.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CutMetrics {
    /// Extent across the feed direction (mm).
    pub width: f64,
    /// Extent along the tool axis (mm).
    pub depth: f64,
    /// Removed volume per unit path length (mm²).
    pub cross_section_area: f64,
}

/// Relative motion of tool and workpiece during one substep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubstepMotion {
    /// Tool translation.
    pub tool_step: Vector3<f64>,
    /// Workpiece C rotation (degrees, about −Z).
    pub c_step: f64,
    /// Workpiece A rotation (degrees, about +X).
    pub a_step: f64,
    /// C-axis center.
    pub c_center: Point3<f64>,
    /// A-axis center.
    pub a_center: Point3<f64>,
    /// Path length of the substep (mm).
    pub length: f64,
}

impl SubstepMotion {
    /// Feed direction of the tool through the material at `p`: the
    /// workpiece surface displacement at `p` minus the tool step.
    pub fn net_feed_at(&self, p: &Point3<f64>) -> Vector3<f64> {
        let omega_c = Vector3::new(0.0, 0.0, -self.c_step.to_radians());
        let omega_a = Vector3::new(self.a_step.to_radians(), 0.0, 0.0);
        let surface = omega_c.cross(&(p - self.c_center)) + omega_a.cross(&(p - self.a_center));
        surface - self.tool_step
    }
}

/// Measure the chip `removed` during a substep.
///
/// Depth is the chip's extent along the tool axis (+Z) and the cross
/// section is its volume over the substep length. Width is area over depth
/// in accurate mode, or the chip's extent across the net feed direction in
/// simplified mode (zero for a pure plunge). Without relative motion every
/// metric is zero.
pub fn cut_metrics(removed: &TriMesh, motion: &SubstepMotion, mode: SimulationMode) -> CutMetrics {
    let tool_axis = Vector3::z();
    let feed = motion.net_feed_at(&removed.centroid());
    let feed_norm = feed.norm();
    if feed_norm < FEED_EPSILON || removed.is_empty() {
        return CutMetrics::default();
    }

    let depth = removed.span_along(&tool_axis);
    let cross_section_area = if motion.length > 0.0 {
        removed.volume().abs() / motion.length
    } else {
        0.0
    };

    let width = match mode {
        SimulationMode::Accurate => {
            if depth > 0.0 {
                cross_section_area / depth
            } else {
                0.0
            }
        }
        SimulationMode::Simplified => {
            let across = tool_axis.cross(&(feed / feed_norm));
            let across_norm = across.norm();
            if across_norm < FEED_EPSILON {
                0.0
            } else {
                removed.span_along(&(across / across_norm))
            }
        }
    };

    CutMetrics {
        width,
        depth,
        cross_section_area,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn linear(step: Vector3<f64>) -> SubstepMotion {
        SubstepMotion {
            tool_step: step,
            c_step: 0.0,
            a_step: 0.0,
            c_center: Point3::origin(),
            a_center: Point3::origin(),
            length: step.norm(),
        }
    }

    fn chip() -> TriMesh {
        // 0.5 long in X, 4 wide in Y, 2 deep in Z.
        TriMesh::cuboid(&Point3::new(0.0, -2.0, -2.0), &Point3::new(0.5, 2.0, 0.0)).unwrap()
    }

    #[test]
    fn test_simplified_side_cut() {
        let m = cut_metrics(&chip(), &linear(Vector3::new(0.5, 0.0, 0.0)), SimulationMode::Simplified);
        assert_relative_eq!(m.depth, 2.0, epsilon = 1e-12);
        assert_relative_eq!(m.width, 4.0, epsilon = 1e-12);
        // volume 4 over 0.5 mm of travel
        assert_relative_eq!(m.cross_section_area, 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_accurate_width_is_area_over_depth() {
        let m = cut_metrics(&chip(), &linear(Vector3::new(0.5, 0.0, 0.0)), SimulationMode::Accurate);
        assert_relative_eq!(m.width, 8.0 / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_plunge_has_no_width() {
        let m = cut_metrics(&chip(), &linear(Vector3::new(0.0, 0.0, -0.5)), SimulationMode::Simplified);
        assert_eq!(m.width, 0.0);
        assert_relative_eq!(m.depth, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_no_relative_motion_zeroes_metrics() {
        let m = cut_metrics(&chip(), &linear(Vector3::zeros()), SimulationMode::Simplified);
        assert_eq!(m, CutMetrics::default());
    }

    #[test]
    fn test_rotary_feed_direction() {
        // Workpiece turning about C moves a point on +X toward −Y.
        let motion = SubstepMotion {
            tool_step: Vector3::zeros(),
            c_step: 1.0,
            a_step: 0.0,
            c_center: Point3::origin(),
            a_center: Point3::origin(),
            length: 1.0,
        };
        let feed = motion.net_feed_at(&Point3::new(10.0, 0.0, 0.0));
        assert!(feed.y < 0.0);
        assert_relative_eq!(feed.norm(), 10.0 * 1.0_f64.to_radians(), epsilon = 1e-12);
    }
}
