//! Per-substep results and the cutting-parameter table.

use serde::{Deserialize, Serialize};
use vcad_cutsim_gcode::Pose;

/// Table column names, in row order.
pub const COLUMN_NAMES: [&str; 11] = [
    "X",
    "Y",
    "Z",
    "C",
    "A",
    "Width",
    "Depth",
    "cross_area",
    "GcodeLineNumber",
    "Time",
    "Simulated Cutting Force",
];

/// Number of table columns.
pub const COLUMN_COUNT: usize = COLUMN_NAMES.len();

/// One table row.
pub type TableRow = [f64; COLUMN_COUNT];

/// What happened to the material during a substep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutStatus {
    /// Tool and workpiece did not touch.
    #[default]
    Air,
    /// Material was removed.
    Cut,
    /// The Boolean operation failed; metrics are unknown.
    Unavailable,
}

/// State after one substep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolpathFrame {
    /// Commanded pose at the end of the substep.
    pub pose: Pose,
    /// Cut width (mm).
    pub width: f64,
    /// Cut depth along the tool axis (mm).
    pub depth: f64,
    /// Removed volume per unit path length (mm²).
    pub cross_section_area: f64,
    /// 1-based G-code line of the command.
    pub source_line: usize,
    /// Machining time since run start (s).
    pub elapsed_time: f64,
    /// Estimated cutting force.
    pub cutting_force: f64,
    /// Outcome of the substep.
    pub status: CutStatus,
}

impl ToolpathFrame {
    /// Frame with zero metrics.
    pub fn air(pose: Pose, source_line: usize, elapsed_time: f64) -> Self {
        Self {
            pose,
            width: 0.0,
            depth: 0.0,
            cross_section_area: 0.0,
            source_line,
            elapsed_time,
            cutting_force: 0.0,
            status: CutStatus::Air,
        }
    }

    /// Frame whose metrics could not be computed.
    pub fn unavailable(pose: Pose, source_line: usize, elapsed_time: f64) -> Self {
        Self {
            width: f64::NAN,
            depth: f64::NAN,
            cross_section_area: f64::NAN,
            cutting_force: f64::NAN,
            status: CutStatus::Unavailable,
            ..Self::air(pose, source_line, elapsed_time)
        }
    }

    /// The frame as a table row.
    pub fn row(&self) -> TableRow {
        [
            self.pose.x,
            self.pose.y,
            self.pose.z,
            self.pose.c,
            self.pose.a,
            self.width,
            self.depth,
            self.cross_section_area,
            self.source_line as f64,
            self.elapsed_time,
            self.cutting_force,
        ]
    }
}

/// The cutting-parameter table: one row per substep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CuttingTable {
    /// Column names.
    pub columns: Vec<String>,
    /// Rows in substep order. Unavailable metrics are NaN (`null` in JSON).
    pub rows: Vec<TableRow>,
}

impl CuttingTable {
    /// Build the table from frames.
    pub fn from_frames(frames: &[ToolpathFrame]) -> Self {
        Self {
            columns: COLUMN_NAMES.iter().map(|c| c.to_string()).collect(),
            rows: frames.iter().map(ToolpathFrame::row).collect(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column, by name.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = COLUMN_NAMES.iter().position(|c| *c == name)?;
        Some(self.rows.iter().map(|row| row[index]).collect())
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse from JSON, reading `null` cells back as NaN.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        #[derive(Deserialize)]
        struct RawTable {
            columns: Vec<String>,
            rows: Vec<[Option<f64>; COLUMN_COUNT]>,
        }
        let raw: RawTable = serde_json::from_str(text)?;
        Ok(Self {
            columns: raw.columns,
            rows: raw
                .rows
                .into_iter()
                .map(|row| row.map(|cell| cell.unwrap_or(f64::NAN)))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_layout() {
        let mut frame = ToolpathFrame::air(Pose::new(1.0, 2.0, 3.0, 4.0, 5.0), 7, 1.5);
        frame.width = 0.5;
        frame.cutting_force = 9.0;
        assert_eq!(
            frame.row(),
            [1.0, 2.0, 3.0, 4.0, 5.0, 0.5, 0.0, 0.0, 7.0, 1.5, 9.0]
        );
    }

    #[test]
    fn test_unavailable_metrics_are_nan() {
        let frame = ToolpathFrame::unavailable(Pose::default(), 3, 2.0);
        let row = frame.row();
        assert!(row[5..8].iter().all(|v| v.is_nan()));
        assert!(row[10].is_nan());
        assert_eq!(row[8], 3.0);
        assert_eq!(frame.status, CutStatus::Unavailable);
    }

    #[test]
    fn test_table_json_keeps_nan_rows() {
        let frames = [
            ToolpathFrame::air(Pose::default(), 1, 0.1),
            ToolpathFrame::unavailable(Pose::default(), 2, 0.2),
        ];
        let table = CuttingTable::from_frames(&frames);
        assert_eq!(table.columns.len(), 11);

        let json = table.to_json().unwrap();
        let back = CuttingTable::from_json(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert!(back.rows[1][5].is_nan());
        assert_eq!(back.column("Time"), Some(vec![0.1, 0.2]));
        assert_eq!(back.column("Feed"), None);
    }
}
