//! Polyphase filterbank.
//!
//! A bank of `npfb` sub-filters decomposed from one prototype. All sub-filters
//! share a single input history, so pushing one sample makes every phase
//! available through [`PolyphaseFilterBank::execute`].

use std::fmt;
use std::ops::Mul;

use crate::dsp::Sample;
use crate::error::{Error, Result};

/// Polyphase filter bank.
///
/// Sub-filter `i` holds the prototype taps `h[i + n*npfb]` for
/// `n < h.len() / npfb`; trailing taps that do not complete a sub-filter are
/// dropped.
#[derive(Debug, Clone)]
pub struct PolyphaseFilterBank<T, C = T> {
    /// Number of filter phases
    npfb: usize,
    /// Sub-filter length
    h_sub_len: usize,
    /// Filter coefficients [npfb][h_sub_len]
    filters: Vec<Vec<C>>,
    /// Input history (ring buffer)
    buffer: Vec<T>,
    /// Write index into buffer
    buf_idx: usize,
}

impl<T, C> PolyphaseFilterBank<T, C>
where
    T: Sample + Mul<C, Output = T>,
    C: Sample,
{
    /// Create a new polyphase filter bank from a prototype filter.
    ///
    /// # Arguments
    ///
    /// * `npfb` - Number of sub-filters (phases)
    /// * `h` - Prototype coefficients, at least `npfb` long
    pub fn new(npfb: usize, h: &[C]) -> Result<Self> {
        if npfb == 0 {
            return Err(Error::InvalidFilterBankSize);
        }
        if h.is_empty() || h.len() < npfb {
            return Err(Error::InvalidFilterLength {
                len: h.len(),
                npfb,
            });
        }

        let h_sub_len = h.len() / npfb;
        let filters = (0..npfb)
            .map(|i| (0..h_sub_len).map(|n| h[i + n * npfb]).collect())
            .collect();

        Ok(Self {
            npfb,
            h_sub_len,
            filters,
            buffer: vec![T::default(); h_sub_len],
            buf_idx: 0,
        })
    }

    /// Number of sub-filters.
    pub fn num_filters(&self) -> usize {
        self.npfb
    }

    /// Length of each sub-filter (and of the input history).
    pub fn sub_filter_len(&self) -> usize {
        self.h_sub_len
    }

    /// Taps of sub-filter `index`.
    pub fn sub_filter(&self, index: usize) -> &[C] {
        &self.filters[index]
    }

    /// Push a new sample into the shared history.
    pub fn push(&mut self, x: T) {
        self.buffer[self.buf_idx] = x;
        self.buf_idx = (self.buf_idx + 1) % self.h_sub_len;
    }

    /// Run sub-filter `index` against the current history.
    ///
    /// # Panics
    ///
    /// Panics if `index >= num_filters()`.
    pub fn execute(&self, index: usize) -> T {
        let filter = &self.filters[index];
        let len = self.h_sub_len;

        // newest sample first (convolution order)
        filter.iter().enumerate().fold(T::default(), |acc, (j, &coef)| {
            let idx = (self.buf_idx + len - 1 - j) % len;
            acc + self.buffer[idx] * coef
        })
    }

    /// Clear the input history, keeping coefficients.
    pub fn reset(&mut self) {
        self.buffer.fill(T::default());
        self.buf_idx = 0;
    }
}

impl<T, C> fmt::Display for PolyphaseFilterBank<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "firpfb [{} filters, {} taps each]",
            self.npfb, self.h_sub_len
        )
    }
}
