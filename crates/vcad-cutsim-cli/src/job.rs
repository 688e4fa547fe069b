//! Job files: stock, tools, dialect and simulation settings in one TOML.
//!
//! ```toml
//! dialect = "siemens"
//!
//! [variables]
//! 1 = 12.5
//!
//! [stock]
//! min = [0.0, 0.0, 0.0]
//! max = [80.0, 40.0, 20.0]
//!
//! [tool]
//! radius = 3.0
//! height = 40.0
//!
//! [tools.T2]
//! radius = 1.5
//! height = 30.0
//!
//! [simulation]
//! simulation_step = 0.5
//! mode = "accurate"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use nalgebra::Point3;
use serde::Deserialize;
use vcad_cutsim::{Simulation, SimulationConfig, TriMesh};
use vcad_cutsim_gcode::{Dialect, Variables};

fn default_segments() -> u32 {
    32
}

fn default_true() -> bool {
    true
}

/// Rectangular stock.
#[derive(Debug, Clone, Deserialize)]
pub struct StockSpec {
    /// Lowest corner (mm).
    pub min: [f64; 3],
    /// Highest corner (mm).
    pub max: [f64; 3],
}

/// Flat end mill approximated by a cylinder.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSpec {
    /// Cutter radius (mm).
    pub radius: f64,
    /// Flute length (mm).
    pub height: f64,
    /// Facets around the circumference.
    #[serde(default = "default_segments")]
    pub segments: u32,
}

impl ToolSpec {
    fn mesh(&self) -> Result<TriMesh> {
        TriMesh::cylinder(self.radius, self.height, self.segments).context("building tool mesh")
    }
}

/// Everything needed to run one program.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    /// Controller dialect of the program.
    #[serde(default)]
    pub dialect: Dialect,
    /// Preset R/# variables, keyed by number.
    #[serde(default)]
    pub variables: BTreeMap<String, f64>,
    /// Block the program cuts.
    pub stock: StockSpec,
    /// Tool loaded at program start.
    pub tool: ToolSpec,
    /// Tools loaded on `T<n>` changes.
    #[serde(default)]
    pub tools: BTreeMap<String, ToolSpec>,
    /// Align stock and tool to the machine origin before running.
    #[serde(default = "default_true")]
    pub fixture: bool,
    /// Stepping and kinematics settings.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Job {
    /// Read and validate a job file.
    pub fn load(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse and validate job TOML.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let job: Job = toml::from_str(text)?;
        job.simulation.validate()?;
        Ok(job)
    }

    /// Preset variables keyed by number.
    pub fn variables(&self) -> Result<Variables> {
        self.variables
            .iter()
            .map(|(name, &value)| {
                let number = name
                    .trim_start_matches(['R', 'r', '#'])
                    .parse::<u32>()
                    .with_context(|| format!("variable name {name:?} is not a number"))?;
                Ok((number, value))
            })
            .collect()
    }

    /// Build the stock, tools and settings into a [`Simulation`].
    pub fn simulation(&self) -> Result<Simulation> {
        let StockSpec { min, max } = self.stock;
        if !min.iter().zip(&max).all(|(lo, hi)| lo < hi) {
            bail!("stock min {min:?} must be below max {max:?} on every axis");
        }
        let stock = TriMesh::cuboid(&Point3::from(min), &Point3::from(max))?;
        let tool = self.tool.mesh()?;
        let config = self.simulation.clone();

        let mut sim = if self.fixture {
            Simulation::fixtured(&stock, &tool, config)?
        } else {
            Simulation::new(stock, tool, config)?
        };
        for (id, spec) in &self.tools {
            sim = sim.with_tool(id.clone(), &spec.mesh()?)?;
        }
        Ok(sim)
    }
}
