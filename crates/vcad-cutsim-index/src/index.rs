//! KD-tree over toolpath positions with segment projection.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;

use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vcad_cutsim::{CuttingTable, TableRow, COLUMN_COUNT};

use crate::error::{IndexError, Result};

/// Largest distance from the path at which a query still matches (mm).
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Nearest recorded positions examined per query.
const NEIGHBOURS: usize = 5;

// Table column positions.
const WIDTH: usize = 5;
const DEPTH: usize = 6;
const AREA: usize = 7;
const LINE: usize = 8;
const TIME: usize = 9;

/// A value that can be read from a [`CutSample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    /// Interpolated cut width.
    Width,
    /// Interpolated cut depth.
    Depth,
    /// Interpolated cross-section area.
    Area,
    /// Interpolated machining time.
    Time,
    /// G-code line of the segment end.
    Line,
    /// Distance from the query point to the path.
    Distance,
    /// Position along the matched segment in `[0, 1]`.
    T,
}

impl MetricKey {
    /// Every key.
    pub const ALL: [MetricKey; 7] = [
        MetricKey::Width,
        MetricKey::Depth,
        MetricKey::Area,
        MetricKey::Time,
        MetricKey::Line,
        MetricKey::Distance,
        MetricKey::T,
    ];

    /// Lower-case name.
    pub fn name(&self) -> &'static str {
        match self {
            MetricKey::Width => "width",
            MetricKey::Depth => "depth",
            MetricKey::Area => "area",
            MetricKey::Time => "time",
            MetricKey::Line => "line",
            MetricKey::Distance => "distance",
            MetricKey::T => "t",
        }
    }

    /// Look a key up by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(name))
    }
}

/// Cut data at a point near the toolpath.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutSample {
    /// Cut width.
    pub width: f64,
    /// Cut depth.
    pub depth: f64,
    /// Cross-section area.
    pub area: f64,
    /// Machining time.
    pub time: f64,
    /// G-code line of the segment's end row (not interpolated).
    pub line: usize,
    /// Distance from the query point to the segment.
    pub distance: f64,
    /// Row indices of the matched segment.
    pub segment: (usize, usize),
    /// Position of the closest point along the segment.
    pub t: f64,
}

impl CutSample {
    /// Read one value.
    pub fn get(&self, key: MetricKey) -> f64 {
        match key {
            MetricKey::Width => self.width,
            MetricKey::Depth => self.depth,
            MetricKey::Area => self.area,
            MetricKey::Time => self.time,
            MetricKey::Line => self.line as f64,
            MetricKey::Distance => self.distance,
            MetricKey::T => self.t,
        }
    }
}

/// Path segment between consecutive rows.
#[derive(Debug, Clone, Copy)]
struct Segment {
    start: Point3<f64>,
    end: Point3<f64>,
    /// Unit direction, zero for a zero-length segment.
    direction: Vector3<f64>,
    length: f64,
}

impl Segment {
    fn new(start: Point3<f64>, end: Point3<f64>) -> Self {
        let delta = end - start;
        let length = delta.norm();
        let direction = if length > 0.0 {
            delta / length
        } else {
            Vector3::zeros()
        };
        Self {
            start,
            end,
            direction,
            length,
        }
    }

    /// Distance from `p` to the segment and the clamped parameter of the
    /// closest point.
    fn project(&self, p: &Point3<f64>) -> (f64, f64) {
        if self.length == 0.0 {
            return ((p - self.start).norm(), 0.0);
        }
        let along = (p - self.start).dot(&self.direction);
        if along < 0.0 {
            ((p - self.start).norm(), 0.0)
        } else if along > self.length {
            ((p - self.end).norm(), 1.0)
        } else {
            let foot = self.start + self.direction * along;
            ((p - foot).norm(), along / self.length)
        }
    }
}

/// Immutable lookup from 3D points to the nearest recorded toolpath segment.
pub struct CutDataIndex {
    /// One entry per distinct position; the item is a slot in `rows_at`.
    tree: ImmutableKdTree<f64, u64, 3, 32>,
    /// Rows recorded at each distinct position, in table order.
    rows_at: Vec<Vec<usize>>,
    segments: Vec<Segment>,
    rows: Vec<TableRow>,
    threshold: f64,
}

impl fmt::Debug for CutDataIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CutDataIndex")
            .field("rows", &self.rows.len())
            .field("positions", &self.rows_at.len())
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl CutDataIndex {
    /// Build from table rows in substep order.
    pub fn from_rows(rows: &[TableRow], threshold: f64) -> Result<Self> {
        if !(threshold >= 0.0) {
            return Err(IndexError::InvalidThreshold(threshold));
        }
        if rows.len() < 2 {
            return Err(IndexError::TooFewRows(rows.len()));
        }
        let positions: Vec<[f64; 3]> = rows.iter().map(|row| [row[0], row[1], row[2]]).collect();
        if let Some(bad) = positions
            .iter()
            .position(|p| !p.iter().all(|c| c.is_finite()))
        {
            return Err(IndexError::NonFinitePosition(bad));
        }

        let segments = positions
            .windows(2)
            .map(|pair| Segment::new(Point3::from(pair[0]), Point3::from(pair[1])))
            .collect();
        // Rotary-only moves and dwells repeat a position for many rows; the
        // tree cannot hold more identical points than fit in one bucket.
        let mut slots: HashMap<[u64; 3], usize> = HashMap::new();
        let mut distinct: Vec<[f64; 3]> = Vec::new();
        let mut rows_at: Vec<Vec<usize>> = Vec::new();
        for (row, p) in positions.iter().enumerate() {
            // `+ 0.0` folds -0.0 into 0.0.
            let key = p.map(|c| (c + 0.0).to_bits());
            let slot = *slots.entry(key).or_insert_with(|| {
                distinct.push(*p);
                rows_at.push(Vec::new());
                distinct.len() - 1
            });
            rows_at[slot].push(row);
        }
        let tree = ImmutableKdTree::new_from_slice(&distinct);
        debug!(
            rows = rows.len(),
            positions = distinct.len(),
            threshold,
            "cut data index built"
        );

        Ok(Self {
            tree,
            rows_at,
            segments,
            rows: rows.to_vec(),
            threshold,
        })
    }

    /// Build from a cutting-parameter table.
    pub fn from_table(table: &CuttingTable, threshold: f64) -> Result<Self> {
        if table.columns.len() != COLUMN_COUNT {
            return Err(IndexError::ColumnMismatch {
                expected: COLUMN_COUNT,
                found: table.columns.len(),
            });
        }
        Self::from_rows(&table.rows, threshold)
    }

    /// Number of indexed rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Always false; an index holds at least two rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Match threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Closest segment to `p` among those touching its nearest rows:
    /// `(segment index, t, distance)`. Ties keep the first candidate.
    fn closest_segment(&self, p: &Point3<f64>) -> Option<(usize, f64, f64)> {
        let query = [p.x, p.y, p.z];
        let count = NonZeroUsize::new(NEIGHBOURS.min(self.rows_at.len()))?;
        let neighbours = self.tree.nearest_n::<SquaredEuclidean>(&query, count);

        let mut best: Option<(usize, f64, f64)> = None;
        let mut consider = |segment: usize| {
            let (distance, t) = self.segments[segment].project(p);
            if best.map_or(true, |(_, _, d)| distance < d) {
                best = Some((segment, t, distance));
            }
        };
        for neighbour in neighbours {
            for &row in &self.rows_at[neighbour.item as usize] {
                // The segment starting here, then the one ending here.
                if row < self.segments.len() {
                    consider(row);
                }
                if row > 0 {
                    consider(row - 1);
                }
            }
        }
        best
    }

    /// Cut data at the path point closest to `point`, or `None` when the
    /// path is farther than the threshold.
    pub fn query(&self, point: &Point3<f64>) -> Option<CutSample> {
        let (segment, t, distance) = self.closest_segment(point)?;
        if distance > self.threshold {
            return None;
        }
        let (start, end) = (&self.rows[segment], &self.rows[segment + 1]);
        let lerp = |column: usize| start[column] + t * (end[column] - start[column]);
        Some(CutSample {
            width: lerp(WIDTH),
            depth: lerp(DEPTH),
            area: lerp(AREA),
            time: lerp(TIME),
            line: end[LINE] as usize,
            distance,
            segment: (segment, segment + 1),
            t,
        })
    }

    /// [`query`](Self::query) for every point.
    pub fn batch_query(&self, points: &[Point3<f64>]) -> Vec<Option<CutSample>> {
        points.iter().map(|p| self.query(p)).collect()
    }

    /// One array per key, each parallel to `points`; unmatched points are
    /// `None`.
    pub fn batch_metrics(&self, points: &[Point3<f64>], keys: &[MetricKey]) -> Vec<Vec<Option<f64>>> {
        let samples = self.batch_query(points);
        keys.iter()
            .map(|&key| {
                samples
                    .iter()
                    .map(|sample| sample.map(|s| s.get(key)))
                    .collect()
            })
            .collect()
    }
}
