/// Digital Signal Processing (DSP) module.
///
/// This module provides the building blocks of a polyphase symbol timing
/// synchronizer: prototype filter design, a polyphase filterbank, the timing
/// loop filter and the synchronizer itself.
///
/// # Overview
///
/// Blocks are generic over the sample type through the [`Sample`] trait, so
/// the same algorithm runs on real (`f32`) and complex (`Complex<f32>`)
/// streams. Filter coefficients may be real or complex as long as samples
/// can be multiplied by them.
///
/// ## Timing Recovery Pipeline
///
/// ```text
/// Oversampled samples ─┬→ Matched PFB ──────→ output (÷k) ──→ symbols
///                      │        ↓ mf
///                      └→ Derivative PFB ─→ TED ─→ Loop filter ─→ del
///                                 ↑                                  │
///                                 └──────── filterbank index b ←─────┘
/// ```
///
/// # Modules
///
/// - [`firdes`]: Root-Nyquist prototype design and derivative filters
/// - [`firpfb`]: Polyphase filterbank with shared input history
/// - [`loopfilter`]: Second-order timing loop filter
/// - [`symsync`]: Symbol timing synchronizer
/// - [`trace`]: Optional diagnostics sink and analysis script export
///
/// # Thread Safety
///
/// DSP blocks maintain internal state and are **not** thread-safe. Each stream
/// should have its own synchronizer instance; calls into one instance must be
/// serialized by the caller.
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Sub};

use num_complex::Complex;

pub mod firdes;
pub mod firpfb;
pub mod loopfilter;
pub mod symsync;
pub mod trace;

/// Numeric field a synchronizer operates on.
///
/// Implemented for `f32` and `Complex<f32>`. The conjugate-multiply of the
/// timing error detector and the output scaling are expressed through this
/// trait so one algorithm body serves every instantiation.
pub trait Sample:
    Copy
    + Default
    + Debug
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Mul<f32, Output = Self>
    + Div<f32, Output = Self>
{
    /// Complex conjugate (identity for reals).
    fn conj(self) -> Self;

    /// Real part.
    fn re(self) -> f32;

    /// Magnitude.
    fn norm(self) -> f32;

    /// Lift a real value into the field.
    fn from_real(x: f32) -> Self;
}

impl Sample for f32 {
    fn conj(self) -> Self {
        self
    }

    fn re(self) -> f32 {
        self
    }

    fn norm(self) -> f32 {
        self.abs()
    }

    fn from_real(x: f32) -> Self {
        x
    }
}

impl Sample for Complex<f32> {
    fn conj(self) -> Self {
        Complex::conj(&self)
    }

    fn re(self) -> f32 {
        self.re
    }

    fn norm(self) -> f32 {
        Complex::norm(self)
    }

    fn from_real(x: f32) -> Self {
        Complex::new(x, 0.0)
    }
}

/// Trait for DSP blocks that turn a block of samples into another block.
///
/// Output length may differ from input length (the synchronizer decimates).
/// Blocks typically keep state between calls to `process()`.
pub trait DspBlock<T> {
    /// Process a block of samples.
    fn process(&mut self, data: &[T]) -> Vec<T>;
}
