//! Circular interpolation geometry (G2/G3) in the XY plane.
//!
//! [`solve_arc`] turns the arc words of a circular move into a center,
//! radius and signed sweep. Arcs that cannot be realized are reported as
//! degenerate and are executed as straight moves by the caller.

use std::f64::consts::{PI, TAU};

use nalgebra::{Point3, Vector2};
use thiserror::Error;

use crate::command::{ArcDirection, ArcParams};

/// Radius words smaller than this are treated as zero.
const RADIUS_EPSILON: f64 = 1e-9;
/// Endpoints closer than this (in XY) are coincident.
const COINCIDENT_EPSILON: f64 = 1e-6;
/// Start/end radius discrepancy that is flagged in IJK mode.
const RADIUS_MISMATCH_TOLERANCE: f64 = 1e-3;

/// Why an arc could not be realized.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum DegenerateArc {
    /// The R word is zero.
    #[error("radius is zero")]
    ZeroRadius,

    /// The endpoints are farther apart than the arc diameter.
    #[error("chord {chord} exceeds diameter of radius {radius}")]
    ChordExceedsDiameter {
        /// XY distance between start and end.
        chord: f64,
        /// Absolute R word.
        radius: f64,
    },

    /// Start and end coincide, which an R word cannot describe.
    #[error("start and end points coincide")]
    CoincidentEndpoints,

    /// I and J are both zero.
    #[error("center offset is zero")]
    MissingCenterOffset,

    /// Neither R nor I/J was given.
    #[error("no arc parameters")]
    NoParameters,
}

/// Resolved arc geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcSolution {
    /// Arc center; Z is the start point's Z.
    pub center: Point3<f64>,
    /// Arc radius in mm.
    pub radius: f64,
    /// Angle of the start point about the center, in `[0, 2π)`.
    pub start_angle: f64,
    /// Signed sweep in radians, negative for clockwise.
    pub sweep_angle: f64,
    /// Planar arc length, `radius · |sweep|`.
    pub arc_length: f64,
    /// IJK start and end radii differ by more than 1e-3.
    pub radius_mismatch: bool,
    /// Set when the arc must be executed as a straight move.
    pub degenerate: Option<DegenerateArc>,
}

impl ArcSolution {
    fn linear(start: &Point3<f64>, reason: DegenerateArc) -> Self {
        Self {
            center: *start,
            radius: 0.0,
            start_angle: 0.0,
            sweep_angle: 0.0,
            arc_length: 0.0,
            radius_mismatch: false,
            degenerate: Some(reason),
        }
    }

    fn from_center(
        start: &Point3<f64>,
        end: &Point3<f64>,
        center: Point3<f64>,
        radius: f64,
        direction: ArcDirection,
        full_circle: bool,
    ) -> Self {
        let start_angle = polar_angle(start, &center);
        let sweep_angle = if full_circle {
            match direction {
                ArcDirection::Ccw => TAU,
                ArcDirection::Cw => -TAU,
            }
        } else {
            let mut sweep = polar_angle(end, &center) - start_angle;
            match direction {
                ArcDirection::Ccw if sweep <= 0.0 => sweep += TAU,
                ArcDirection::Cw if sweep >= 0.0 => sweep -= TAU,
                _ => {}
            }
            sweep
        };

        Self {
            center,
            radius,
            start_angle,
            sweep_angle,
            arc_length: radius * sweep_angle.abs(),
            radius_mismatch: false,
            degenerate: None,
        }
    }

    /// True if the move must be executed as a straight line.
    pub fn degenerates_to_linear(&self) -> bool {
        self.degenerate.is_some()
    }

    /// Path length including the axial (Z) component of a helix.
    pub fn helical_length(&self, start: &Point3<f64>, end: &Point3<f64>) -> f64 {
        if self.degenerates_to_linear() {
            return (end - start).norm();
        }
        let dz = end.z - start.z;
        (self.arc_length * self.arc_length + dz * dz).sqrt()
    }

    /// Point at `fraction ∈ [0, 1]` along the (helical) path.
    ///
    /// `fraction >= 1` returns `end` exactly.
    pub fn point_at(&self, fraction: f64, start: &Point3<f64>, end: &Point3<f64>) -> Point3<f64> {
        if fraction >= 1.0 {
            return *end;
        }
        if self.degenerates_to_linear() {
            return start + (end - start) * fraction;
        }
        let angle = self.start_angle + self.sweep_angle * fraction;
        Point3::new(
            self.center.x + self.radius * angle.cos(),
            self.center.y + self.radius * angle.sin(),
            start.z + (end.z - start.z) * fraction,
        )
    }

    /// I/J center offset relative to `start`.
    pub fn ijk(&self, start: &Point3<f64>) -> Vector2<f64> {
        Vector2::new(self.center.x - start.x, self.center.y - start.y)
    }

    /// R word describing this arc; negative for sweeps beyond 180°.
    pub fn r_word(&self) -> f64 {
        if self.sweep_angle.abs() > PI {
            -self.radius
        } else {
            self.radius
        }
    }
}

/// Resolve the geometry of a circular move.
///
/// An R word takes precedence over I/J. Only the XY plane is supported;
/// a K word is carried but ignored.
pub fn solve_arc(
    start: &Point3<f64>,
    end: &Point3<f64>,
    direction: ArcDirection,
    params: &ArcParams,
) -> ArcSolution {
    let solution = match params.r {
        Some(r) => solve_radius(start, end, direction, r),
        None => solve_center_offset(start, end, direction, params),
    };
    if let Some(reason) = solution.degenerate {
        tracing::debug!("arc from {start:?} to {end:?} runs as a straight move: {reason}");
    }
    solution
}

fn solve_radius(
    start: &Point3<f64>,
    end: &Point3<f64>,
    direction: ArcDirection,
    r: f64,
) -> ArcSolution {
    let radius = r.abs();
    if radius < RADIUS_EPSILON {
        return ArcSolution::linear(start, DegenerateArc::ZeroRadius);
    }

    let chord = Vector2::new(end.x - start.x, end.y - start.y);
    let length = chord.norm();
    if length < COINCIDENT_EPSILON {
        return ArcSolution::linear(start, DegenerateArc::CoincidentEndpoints);
    }
    if length > 2.0 * radius {
        return ArcSolution::linear(
            start,
            DegenerateArc::ChordExceedsDiameter {
                chord: length,
                radius,
            },
        );
    }

    let half = length / 2.0;
    let offset = (radius * radius - half * half).max(0.0).sqrt();
    let normal = Vector2::new(-chord.y, chord.x) / length;
    let turn = match direction {
        ArcDirection::Ccw => 1.0,
        ArcDirection::Cw => -1.0,
    };
    let side = turn * r.signum();
    let center = Point3::new(
        (start.x + end.x) / 2.0 + side * offset * normal.x,
        (start.y + end.y) / 2.0 + side * offset * normal.y,
        start.z,
    );

    ArcSolution::from_center(start, end, center, radius, direction, false)
}

fn solve_center_offset(
    start: &Point3<f64>,
    end: &Point3<f64>,
    direction: ArcDirection,
    params: &ArcParams,
) -> ArcSolution {
    if params.i.is_none() && params.j.is_none() {
        return ArcSolution::linear(start, DegenerateArc::NoParameters);
    }
    let i = params.i.unwrap_or(0.0);
    let j = params.j.unwrap_or(0.0);
    if i == 0.0 && j == 0.0 {
        return ArcSolution::linear(start, DegenerateArc::MissingCenterOffset);
    }

    let center = Point3::new(start.x + i, start.y + j, start.z);
    let start_radius = planar_distance(start, &center);
    let end_radius = planar_distance(end, &center);
    let full_circle = planar_distance(start, end) < COINCIDENT_EPSILON;

    let mut solution = ArcSolution::from_center(
        start,
        end,
        center,
        (start_radius + end_radius) / 2.0,
        direction,
        full_circle,
    );
    if (start_radius - end_radius).abs() > RADIUS_MISMATCH_TOLERANCE {
        tracing::warn!(
            "arc radius mismatch: start {start_radius:.4}, end {end_radius:.4} about {center:?}"
        );
        solution.radius_mismatch = true;
    }
    solution
}

fn planar_distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

fn polar_angle(p: &Point3<f64>, center: &Point3<f64>) -> f64 {
    (p.y - center.y).atan2(p.x - center.x).rem_euclid(TAU)
}
