#![warn(missing_docs)]

//! Material removal simulation driven by G-code.
//!
//! A [`Simulation`] holds a workpiece and a tool as triangle meshes. Running
//! it over a list of motion commands steps the tool along the toolpath,
//! subtracts it from the workpiece, and records cut width, depth,
//! cross-section area and an estimated cutting force for every substep.
//!
//! # Modules
//!
//! - [`mesh`], [`csg`], [`decimate`] - triangle meshes and their Booleans
//! - [`setup`] - aligning workpiece and tool in the machine frame
//! - [`stepper`] - the substep loop and background runs
//! - [`plant`] - cutting-force filter
//!
//! # Example
//!
//! ```no_run
//! use vcad_cutsim::{NoProgress, Simulation, SimulationConfig, TriMesh};
//! use vcad_cutsim_gcode::{Dialect, Interpreter};
//! use nalgebra::Point3;
//!
//! let stock = TriMesh::cuboid(&Point3::new(0.0, 0.0, 0.0), &Point3::new(40.0, 40.0, 10.0))?;
//! let cutter = TriMesh::cylinder(3.0, 30.0, 32)?;
//! let sim = Simulation::fixtured(&stock, &cutter, SimulationConfig::default())?;
//!
//! let program = Interpreter::new(Dialect::Fanuc).parse_str("G90\nG0 X-5 Y5 Z8\nG1 X-35 F600 S8000\n");
//! let output = sim.run_program(&program, &mut NoProgress, None);
//! println!("{} frames, {} cutting", output.frames.len(), output.report.cut_frames);
//! # Ok::<(), vcad_cutsim::SimError>(())
//! ```

pub mod config;
pub mod csg;
pub mod decimate;
mod error;
pub mod export;
mod frame;
pub mod mesh;
pub mod metrics;
pub mod plant;
mod progress;
pub mod setup;
pub mod stepper;
pub mod transform;

pub use config::{RotaryConfig, RotationOrder, SimulationConfig, SimulationMode};
pub use error::{Result, SimError};
pub use export::{ArtifactSink, JsonArtifactSink};
pub use frame::{CutStatus, CuttingTable, TableRow, ToolpathFrame, COLUMN_COUNT, COLUMN_NAMES};
pub use mesh::{Aabb, TriMesh};
pub use metrics::CutMetrics;
pub use plant::PlantModel;
pub use progress::{CancelToken, NoProgress, ProgressCounter, ProgressSink, PROGRESS_MAX};
pub use stepper::{
    spawn_simulation, MeshSnapshot, RunFailure, RunReport, Simulation, SimulationHandle,
    SimulationOutput,
};
pub use transform::Transform;
