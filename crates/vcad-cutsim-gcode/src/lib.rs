#![warn(missing_docs)]

//! G-code front end for the vcad cutting simulator.
//!
//! Turns controller programs into an ordered list of [`MotionCommand`]s with
//! resolved absolute poses, and resolves arc geometry for circular moves.
//!
//! # Example
//!
//! ```
//! use vcad_cutsim_gcode::{Dialect, Interpreter, MotionMode};
//!
//! let program = Interpreter::new(Dialect::Fanuc).parse(&[
//!     "G90",
//!     "G0 X0 Y0 Z10",
//!     "G1 X10 Y0 Z0 F300 S1000",
//! ]);
//!
//! assert_eq!(program.commands.len(), 2);
//! assert_eq!(program.commands[1].mode, MotionMode::Linear);
//! assert_eq!(program.commands[1].line_number, 3);
//! ```

pub mod arc;
mod command;
pub mod dialect;
mod error;
pub mod expr;
mod interpreter;

pub use arc::{solve_arc, ArcSolution, DegenerateArc};
pub use command::{ArcDirection, ArcParams, Axis, MotionCommand, MotionMode, Pose};
pub use dialect::Dialect;
pub use error::{GcodeError, Result};
pub use expr::{evaluate, Evaluator, Variables};
pub use interpreter::{Interpreter, ParserState, Program, ToolRecord};
