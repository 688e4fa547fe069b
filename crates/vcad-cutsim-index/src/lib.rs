#![warn(missing_docs)]

//! Aligning external measurements with simulated cut data.
//!
//! A [`CutDataIndex`] is built from a finished cutting-parameter table.
//! Given any 3D point, for example a probe or sensor sample, it finds the
//! closest toolpath segment and interpolates the cut metrics recorded at its
//! two ends.
//!
//! ```
//! use nalgebra::Point3;
//! use vcad_cutsim_index::{CutDataIndex, DEFAULT_THRESHOLD};
//!
//! let rows = [
//!     [0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 1.0, 2.0, 3.0, 0.0, 0.0],
//!     [1.0, 0.0, 0.0, 0.0, 0.0, 4.0, 1.0, 4.0, 3.0, 0.2, 0.0],
//! ];
//! let index = CutDataIndex::from_rows(&rows, DEFAULT_THRESHOLD).unwrap();
//! let sample = index.query(&Point3::new(0.5, 0.0, 0.0)).unwrap();
//! assert_eq!(sample.width, 3.0);
//! assert!(index.query(&Point3::new(0.5, 1.0, 0.0)).is_none());
//! ```

mod error;
mod index;

pub use error::{IndexError, Result};
pub use index::{CutDataIndex, CutSample, MetricKey, DEFAULT_THRESHOLD};
