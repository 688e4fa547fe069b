//! Placing workpiece and tool meshes in the machine frame before a run.

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::config::{RotationOrder, SimulationConfig};
use crate::decimate::simplify;
use crate::error::{Result, SimError};
use crate::mesh::TriMesh;
use crate::transform::Transform;

/// Vertices closer than this are merged when fixturing.
const WELD_TOLERANCE: f64 = 1e-9;

/// A workpiece placed on the rotary table.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    /// The aligned, pre-rotated workpiece.
    pub workpiece: TriMesh,
    /// Resolved C-axis center.
    pub c_center: Point3<f64>,
    /// Resolved A-axis center.
    pub a_center: Point3<f64>,
}

/// Align a workpiece so its max-X / min-Y / min-Z corner is the origin,
/// then apply the configured initial C and A rotations.
///
/// Unset rotation centers default to the centroid of the aligned mesh.
pub fn fixture_workpiece(mesh: &TriMesh, config: &SimulationConfig) -> Result<Fixture> {
    let mut workpiece = mesh.welded(WELD_TOLERANCE);
    let bounds = workpiece
        .bounds()
        .ok_or_else(|| SimError::InvalidMesh("workpiece has no vertices".into()))?;
    workpiece.translate(&Vector3::new(-bounds.max.x, -bounds.min.y, -bounds.min.z));

    let rotary = &config.rotary;
    let (c_center, a_center) = rotary.resolve_centers(&workpiece);
    let c = Transform::c_axis(rotary.initial_c, &c_center);
    let a = Transform::a_axis(rotary.initial_a, &a_center);
    let placement = match rotary.order {
        RotationOrder::CThenA => a.then(&c),
        RotationOrder::AThenC => c.then(&a),
    };
    if !placement.is_identity() {
        workpiece.transform(&placement);
    }

    debug!(
        faces = workpiece.face_count(),
        ?c_center,
        ?a_center,
        "workpiece fixtured"
    );
    Ok(Fixture {
        workpiece,
        c_center,
        a_center,
    })
}

/// Move a tool so its bounding-box minimum is the origin plus the
/// configured offset, simplified to the facet threshold.
pub fn fixture_tool(mesh: &TriMesh, config: &SimulationConfig) -> Result<TriMesh> {
    let mut tool = mesh.welded(WELD_TOLERANCE);
    let bounds = tool
        .bounds()
        .ok_or_else(|| SimError::InvalidMesh("tool has no vertices".into()))?;
    tool.translate(&(config.tool_offset() - bounds.min.coords));
    Ok(simplify(
        &tool,
        config.facet_threshold,
        config.decimation_ratio,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RotaryConfig;
    use approx::assert_relative_eq;

    fn block() -> TriMesh {
        TriMesh::cuboid(&Point3::new(5.0, 5.0, 5.0), &Point3::new(15.0, 9.0, 7.0)).unwrap()
    }

    #[test]
    fn test_workpiece_corner_at_origin() {
        let fixture = fixture_workpiece(&block(), &SimulationConfig::default()).unwrap();
        let bounds = fixture.workpiece.bounds().unwrap();
        assert_relative_eq!(bounds.max.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(bounds.min.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(bounds.min.z, 0.0, epsilon = 1e-12);
        assert_relative_eq!(bounds.min.x, -10.0, epsilon = 1e-12);
        // Centers default to the aligned centroid.
        assert_relative_eq!(fixture.c_center, Point3::new(-5.0, 2.0, 1.0), epsilon = 1e-9);
        assert_eq!(fixture.c_center, fixture.a_center);
    }

    #[test]
    fn test_initial_rotation_order_matters() {
        let rotated = |order| {
            let config = SimulationConfig {
                rotary: RotaryConfig {
                    c_center: Some([0.0, 0.0, 0.0]),
                    a_center: Some([0.0, 0.0, 0.0]),
                    initial_c: 90.0,
                    initial_a: 90.0,
                    order,
                },
                ..Default::default()
            };
            fixture_workpiece(&block(), &config).unwrap().workpiece
        };
        let c_first = rotated(RotationOrder::CThenA).bounds().unwrap();
        let a_first = rotated(RotationOrder::AThenC).bounds().unwrap();
        assert!((c_first.size() - a_first.size()).norm() > 1.0);
    }

    #[test]
    fn test_tool_aligned_and_offset() {
        let cutter = TriMesh::cylinder(3.0, 20.0, 24).unwrap();
        let config = SimulationConfig {
            tool_offset: [1.0, 2.0, 3.0],
            ..Default::default()
        };
        let tool = fixture_tool(&cutter, &config).unwrap();
        let bounds = tool.bounds().unwrap();
        assert_relative_eq!(bounds.min, Point3::new(1.0, 2.0, 3.0), epsilon = 1e-5);
        assert!(tool.face_count() <= config.facet_threshold);
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let config = SimulationConfig::default();
        assert!(matches!(
            fixture_workpiece(&TriMesh::empty(), &config),
            Err(SimError::InvalidMesh(_))
        ));
        assert!(fixture_tool(&TriMesh::empty(), &config).is_err());
    }
}
