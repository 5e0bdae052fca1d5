//! Timing loop filter.
//!
//! Second-order IIR section smoothing the instantaneous timing error into a
//! correction of the resampling step. A single bandwidth `bt` in [0, 1] sets
//! the coefficients:
//!
//! ```text
//! alpha = 1 - bt,  beta = 0.22 bt
//! B = [beta, 0, 0]
//! A = [1 - 0.5 alpha, -0.495 alpha, 0]
//! ```
//!
//! `bt = 0` produces a filter whose output is always zero, which leaves the
//! synchronizer running open-loop at its nominal rate.

use crate::error::{Error, Result};

const LOOP_A: f32 = 0.500;
const LOOP_B: f32 = 0.495;
const LOOP_GAIN: f32 = 0.220;

/// Second-order loop filter (direct form II).
#[derive(Debug, Clone)]
pub struct LoopFilter {
    /// Loop bandwidth
    bandwidth: f32,
    /// Feed-forward coefficients, normalized by A[0]
    b: [f32; 3],
    /// Feed-back coefficients, normalized by A[0]
    a: [f32; 3],
    /// Internal state
    v: [f32; 3],
}

impl LoopFilter {
    /// Create a loop filter for bandwidth `bt` with zeroed memory.
    pub fn new(bt: f32) -> Result<Self> {
        let (b, a) = design(bt)?;
        Ok(Self {
            bandwidth: bt,
            b,
            a,
            v: [0.0; 3],
        })
    }

    /// Install the coefficients for a new bandwidth.
    ///
    /// Filter memory is left untouched. On error the filter is unchanged.
    pub fn set_bandwidth(&mut self, bt: f32) -> Result<()> {
        let (b, a) = design(bt)?;
        self.bandwidth = bt;
        self.b = b;
        self.a = a;
        Ok(())
    }

    /// Current bandwidth.
    pub fn bandwidth(&self) -> f32 {
        self.bandwidth
    }

    /// Normalized (feed-forward, feed-back) coefficients.
    pub fn coefficients(&self) -> (&[f32; 3], &[f32; 3]) {
        (&self.b, &self.a)
    }

    /// Clear filter memory, keeping coefficients.
    pub fn reset(&mut self) {
        self.v = [0.0; 3];
    }

    /// Filter one error sample.
    pub fn execute(&mut self, x: f32) -> f32 {
        self.v[2] = self.v[1];
        self.v[1] = self.v[0];
        self.v[0] = x - self.a[1] * self.v[1] - self.a[2] * self.v[2];

        self.b[0] * self.v[0] + self.b[1] * self.v[1] + self.b[2] * self.v[2]
    }
}

/// Compute normalized (B, A) for bandwidth `bt`.
fn design(bt: f32) -> Result<([f32; 3], [f32; 3])> {
    if !(0.0..=1.0).contains(&bt) {
        return Err(Error::InvalidLoopBandwidth(bt));
    }

    let alpha = 1.0 - bt;
    let beta = LOOP_GAIN * bt;

    let b = [beta, 0.0, 0.0];
    let a = [1.0 - LOOP_A * alpha, -LOOP_B * alpha, 0.0];

    // a[0] >= 0.5 for every valid bt
    let a0 = a[0];
    Ok((
        [b[0] / a0, b[1] / a0, b[2] / a0],
        [1.0, a[1] / a0, a[2] / a0],
    ))
}
