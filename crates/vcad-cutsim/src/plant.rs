//! Cutting-force estimate as a discrete-time filter.
//!
//! With chip load `m = width · depth` and spindle speed `n` in rev/s,
//!
//! ```text
//! α = −m / (1 + m) / 1.1
//! β = 1 / (4n) · m / (m + 1)
//! F[i] = −(α + h1)·F[i−1] − α·h1·F[i−2] + β·g0·v[i−2] + β·g1·v[i−3]
//! ```
//!
//! where `v` is the programmed feed. The poles are `−α` and `−h1`, both
//! inside the unit circle, so the output decays once the feed stops.

use serde::{Deserialize, Serialize};

const G0: f64 = 0.8;
const G1: f64 = 0.5;
const H1: f64 = 0.1;

/// Filter state, persisted across every cutting substep of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlantModel {
    /// `[F(i−2), F(i−1)]`.
    force_history: [f64; 2],
    /// `[v(i−3), v(i−2), v(i−1)]`.
    feed_history: [f64; 3],
}

impl PlantModel {
    /// Filter at rest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear both histories.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advance one substep and return the force estimate.
    ///
    /// A stopped spindle yields `0.0`; the histories still advance.
    pub fn step(&mut self, width: f64, depth: f64, spindle_rpm: f64, feed: f64) -> f64 {
        let force = if spindle_rpm == 0.0 {
            0.0
        } else {
            let m = width * depth;
            let alpha = -m / (1.0 + m) / 1.1;
            let beta = 1.0 / (4.0 * spindle_rpm / 60.0) * (m / (m + 1.0));
            let [f2, f1] = self.force_history;
            let [v3, v2, _] = self.feed_history;
            -(alpha + H1) * f1 - alpha * H1 * f2 + beta * G0 * v2 + beta * G1 * v3
        };

        self.force_history = [self.force_history[1], force];
        self.feed_history = [self.feed_history[1], self.feed_history[2], feed];
        force
    }

    /// Most recent force outputs, oldest first.
    pub fn force_history(&self) -> [f64; 2] {
        self.force_history
    }

    /// Most recent feed inputs, oldest first.
    pub fn feed_history(&self) -> [f64; 3] {
        self.feed_history
    }
}
