//! Motion commands produced by the interpreter.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A machine axis addressed by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Linear X.
    X,
    /// Linear Y.
    Y,
    /// Linear Z (tool axis).
    Z,
    /// Rotary C (about Z).
    C,
    /// Rotary A (about X).
    A,
}

impl Axis {
    /// All axes in table column order.
    pub const ALL: [Axis; 5] = [Axis::X, Axis::Y, Axis::Z, Axis::C, Axis::A];

    /// The address letter used in G-code.
    pub fn letter(&self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
            Axis::C => 'C',
            Axis::A => 'A',
        }
    }
}

/// Absolute machine pose: three linear axes (mm) and two rotary axes (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// X position in mm.
    pub x: f64,
    /// Y position in mm.
    pub y: f64,
    /// Z position in mm.
    pub z: f64,
    /// C rotation in degrees.
    pub c: f64,
    /// A rotation in degrees.
    pub a: f64,
}

impl Pose {
    /// Create a pose from all five axis values.
    pub fn new(x: f64, y: f64, z: f64, c: f64, a: f64) -> Self {
        Self { x, y, z, c, a }
    }

    /// Linear part of the pose.
    pub fn position(&self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }

    /// Rotary part of the pose as `[c, a]` in degrees.
    pub fn rotary(&self) -> [f64; 2] {
        [self.c, self.a]
    }

    /// Replace the linear part, keeping the rotary axes.
    pub fn with_position(self, p: &Point3<f64>) -> Self {
        Self {
            x: p.x,
            y: p.y,
            z: p.z,
            ..self
        }
    }

    /// Read one axis.
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::C => self.c,
            Axis::A => self.a,
        }
    }

    /// Write one axis.
    pub fn set(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
            Axis::C => self.c = value,
            Axis::A => self.a = value,
        }
    }

    /// Linear displacement from `self` to `other`.
    pub fn linear_delta(&self, other: &Pose) -> Vector3<f64> {
        other.position() - self.position()
    }

    /// Pose interpolated linearly on every axis.
    pub fn lerp(&self, other: &Pose, t: f64) -> Pose {
        Pose {
            x: self.x + t * (other.x - self.x),
            y: self.y + t * (other.y - self.y),
            z: self.z + t * (other.z - self.z),
            c: self.c + t * (other.c - self.c),
            a: self.a + t * (other.a - self.a),
        }
    }

    /// Whether every axis value is finite.
    pub fn is_finite(&self) -> bool {
        Axis::ALL.iter().all(|&axis| self.get(axis).is_finite())
    }
}

/// Direction of circular interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArcDirection {
    /// Clockwise (G2).
    Cw,
    /// Counter-clockwise (G3).
    Ccw,
}

/// Modal motion mode (G0..G3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionMode {
    /// Rapid positioning (G0).
    #[default]
    Rapid,
    /// Linear interpolation (G1).
    Linear,
    /// Clockwise arc (G2).
    ArcCw,
    /// Counter-clockwise arc (G3).
    ArcCcw,
}

impl MotionMode {
    /// Map a G number to a motion mode.
    pub fn from_g_number(g: u8) -> Option<Self> {
        match g {
            0 => Some(MotionMode::Rapid),
            1 => Some(MotionMode::Linear),
            2 => Some(MotionMode::ArcCw),
            3 => Some(MotionMode::ArcCcw),
            _ => None,
        }
    }

    /// Arc direction, if this is a circular mode.
    pub fn arc_direction(&self) -> Option<ArcDirection> {
        match self {
            MotionMode::ArcCw => Some(ArcDirection::Cw),
            MotionMode::ArcCcw => Some(ArcDirection::Ccw),
            _ => None,
        }
    }

    /// True for G2/G3.
    pub fn is_arc(&self) -> bool {
        self.arc_direction().is_some()
    }
}

/// Arc words found on a circular-mode line.
///
/// `r` is the radius word; `i`, `j`, `k` are center offsets relative to the
/// arc start. Any subset may be present.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ArcParams {
    /// Radius word (negative selects the major arc).
    pub r: Option<f64>,
    /// X center offset.
    pub i: Option<f64>,
    /// Y center offset.
    pub j: Option<f64>,
    /// Z center offset.
    pub k: Option<f64>,
}

impl ArcParams {
    /// Arc given by radius.
    pub fn radius(r: f64) -> Self {
        Self {
            r: Some(r),
            ..Default::default()
        }
    }

    /// Arc given by XY center offset.
    pub fn center_offset(i: f64, j: f64) -> Self {
        Self {
            i: Some(i),
            j: Some(j),
            ..Default::default()
        }
    }

    /// True if no arc word was present.
    pub fn is_empty(&self) -> bool {
        self.r.is_none() && self.i.is_none() && self.j.is_none() && self.k.is_none()
    }
}

/// One resolved motion block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionCommand {
    /// Active motion mode.
    pub mode: MotionMode,
    /// 1-based source line.
    pub line_number: usize,
    /// Absolute target pose.
    pub target: Pose,
    /// Feed rate in mm/min.
    pub feed: f64,
    /// Spindle speed in rpm.
    pub spindle_speed: f64,
    /// Arc words, present only for circular moves that carried any.
    pub arc: Option<ArcParams>,
    /// Active tool id (`T<n>`), if a tool change has been seen.
    pub tool_id: Option<String>,
}
