//! Simulation settings.

use std::path::Path;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::mesh::TriMesh;

/// How cut width is derived from the removed volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    /// Width is the removed chip's extent across the feed direction.
    #[default]
    Simplified,
    /// Width is cross-section area over depth; the tool also spins with
    /// the spindle.
    Accurate,
}

/// Order in which initial rotary angles are applied during fixturing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationOrder {
    /// Rotate about C first, then A.
    #[default]
    CThenA,
    /// Rotate about A first, then C.
    AThenC,
}

/// Rotary table setup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotaryConfig {
    /// C-axis center; the workpiece centroid when unset.
    pub c_center: Option<[f64; 3]>,
    /// A-axis center; the workpiece centroid when unset.
    pub a_center: Option<[f64; 3]>,
    /// Initial C angle applied at fixturing (degrees).
    pub initial_c: f64,
    /// Initial A angle applied at fixturing (degrees).
    pub initial_a: f64,
    /// Order of the initial rotations.
    pub order: RotationOrder,
}

impl RotaryConfig {
    /// C and A centers, falling back to the centroid of `workpiece`.
    pub fn resolve_centers(&self, workpiece: &TriMesh) -> (Point3<f64>, Point3<f64>) {
        let centroid = workpiece.centroid();
        (
            self.c_center.map(Point3::from).unwrap_or(centroid),
            self.a_center.map(Point3::from).unwrap_or(centroid),
        )
    }
}

/// Settings for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Maximum path length per substep for feed moves (mm).
    pub simulation_step: f64,
    /// Width model.
    pub mode: SimulationMode,
    /// Traverse rate used for G0 timing (mm/min).
    pub rapid_rate: f64,
    /// Workpieces with more faces than this are simplified before cutting.
    pub facet_threshold: usize,
    /// Fraction of `facet_threshold` kept by simplification.
    pub decimation_ratio: f64,
    /// Keep a (workpiece, tool) mesh pair for every substep.
    pub record_snapshots: bool,
    /// Commands needing more substeps than this are rejected.
    pub max_substeps: usize,
    /// Rotary axis setup.
    pub rotary: RotaryConfig,
    /// Offset added to the tool after aligning it to the origin (mm).
    pub tool_offset: [f64; 3],
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            simulation_step: 0.9,
            mode: SimulationMode::Simplified,
            rapid_rate: 3000.0,
            facet_threshold: 2000,
            decimation_ratio: 0.5,
            record_snapshots: true,
            max_substeps: 100_000,
            rotary: RotaryConfig::default(),
            tool_offset: [0.0; 3],
        }
    }
}

impl SimulationConfig {
    /// Parse TOML and validate.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SimError::ConfigParse(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(SimError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )))
            }
        };
        positive("simulation_step", self.simulation_step)?;
        positive("rapid_rate", self.rapid_rate)?;

        if !(self.decimation_ratio > 0.0 && self.decimation_ratio <= 1.0) {
            return Err(SimError::InvalidConfig(format!(
                "decimation_ratio must be in (0, 1], got {}",
                self.decimation_ratio
            )));
        }
        if self.facet_threshold == 0 {
            return Err(SimError::InvalidConfig("facet_threshold must be > 0".into()));
        }
        if self.max_substeps == 0 {
            return Err(SimError::InvalidConfig("max_substeps must be > 0".into()));
        }

        let finite = [self.rotary.initial_c, self.rotary.initial_a]
            .into_iter()
            .chain(self.tool_offset)
            .chain(self.rotary.c_center.into_iter().flatten())
            .chain(self.rotary.a_center.into_iter().flatten())
            .all(f64::is_finite);
        if !finite {
            return Err(SimError::InvalidConfig(
                "rotary angles, centers and offsets must be finite".into(),
            ));
        }
        Ok(())
    }

    /// Tool offset as a vector.
    pub fn tool_offset(&self) -> Vector3<f64> {
        Vector3::from(self.tool_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation_step, 0.9);
        assert_eq!(config.rapid_rate, 3000.0);
        assert_eq!(config.mode, SimulationMode::Simplified);
    }

    #[test]
    fn test_from_toml() {
        let config = SimulationConfig::from_toml_str(
            r#"
            simulation_step = 0.5
            mode = "accurate"
            record_snapshots = false

            [rotary]
            c_center = [0.0, 0.0, 10.0]
            initial_a = 15.0
            order = "a_then_c"
            "#,
        )
        .unwrap();

        assert_eq!(config.simulation_step, 0.5);
        assert_eq!(config.mode, SimulationMode::Accurate);
        assert!(!config.record_snapshots);
        assert_eq!(config.rotary.c_center, Some([0.0, 0.0, 10.0]));
        assert_eq!(config.rotary.a_center, None);
        assert_eq!(config.rotary.order, RotationOrder::AThenC);
        // Unspecified values keep their defaults.
        assert_eq!(config.facet_threshold, 2000);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        for text in [
            "simulation_step = 0.0",
            "simulation_step = -1.0",
            "rapid_rate = 0.0",
            "decimation_ratio = 1.5",
            "facet_threshold = 0",
        ] {
            assert!(
                matches!(
                    SimulationConfig::from_toml_str(text),
                    Err(SimError::InvalidConfig(_))
                ),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            SimulationConfig::from_toml_str("mode = \"turbo\""),
            Err(SimError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_resolve_centers_defaults_to_centroid() {
        let cube = TriMesh::cuboid(&Point3::origin(), &Point3::new(2.0, 2.0, 2.0)).unwrap();
        let rotary = RotaryConfig {
            a_center: Some([5.0, 0.0, 0.0]),
            ..Default::default()
        };
        let (c, a) = rotary.resolve_centers(&cube);
        assert!((c - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-12);
        assert_eq!(a, Point3::new(5.0, 0.0, 0.0));
    }
}
