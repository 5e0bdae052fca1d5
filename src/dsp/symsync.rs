//! Polyphase Symbol Synchronizer
//!
//! This module provides a symbol timing synchronizer for recovering the
//! optimal sampling instants of a digitally modulated, oversampled signal.
//!
//! # Overview
//!
//! Input samples are pushed into two polyphase filterbanks: the matched
//! filter and its derivative. The matched bank is evaluated at a fractional
//! position selected by the accumulated timing phase `tau`, which provides
//! interpolation with a resolution of `1/npfb` sample. Every `k_out`-th output
//! is an on-time symbol instant; there, while unlocked, the timing error
//! detector and a second-order loop filter correct the resampling step.
//!
//! # Design
//!
//! - Polyphase matched filter bank with `npfb` phases
//! - Derivative matched filter bank for timing error detection
//! - Matched filter TED: `error = Re(conj(mf) * dmf)`, clipped to [-1, 1]
//! - Second-order loop filter ([`LoopFilter`]) for smooth timing tracking
//! - Output decimation to `k_out` samples/symbol
//!
//! # Example
//!
//! ```
//! use num_complex::Complex;
//! use symtiming::dsp::firdes::RnyquistType;
//! use symtiming::dsp::symsync::SymSyncCrcf;
//!
//! // 2 samples/symbol, 3 symbols delay, 0.35 rolloff, 32 filter phases
//! let mut symsync = SymSyncCrcf::new_rnyquist(RnyquistType::Rrc, 2, 3, 0.35, 32)?;
//! symsync.set_loop_bandwidth(0.02)?;
//!
//! let input = vec![Complex::new(0.5, 0.3); 64];
//! let symbols = symsync.execute(&input);
//! assert!(symbols.len() <= 33);
//! # Ok::<(), symtiming::Error>(())
//! ```
//!
//! References:
//! - \[Mengali:1997\] Umberto Mengali and Aldo N. D'Andrea,
//!   "Synchronization Techniques for Digital Receivers"
//! - \[harris:2001\] frederic j. harris and Michael Rice,
//!   "Multirate Digital Filters for Symbol Timing Synchronization
//!   in Software Defined Radios"

use std::fmt;
use std::ops::Mul;

use num_complex::Complex;
use tracing::{debug, trace};

use crate::dsp::firdes::{self, RnyquistType};
use crate::dsp::firpfb::PolyphaseFilterBank;
use crate::dsp::loopfilter::LoopFilter;
use crate::dsp::trace::{TraceRecord, TraceSink};
use crate::dsp::{DspBlock, Sample};
use crate::error::{Error, Result};

/// Loop bandwidth installed by the constructors.
pub const DEFAULT_LOOP_BANDWIDTH: f32 = 0.01;

/// Real samples, real coefficients.
pub type SymSyncRrrf = SymSync<f32, f32>;

/// Complex samples, real coefficients.
pub type SymSyncCrcf = SymSync<Complex<f32>, f32>;

/// Complex samples, complex coefficients.
pub type SymSyncCccf = SymSync<Complex<f32>, Complex<f32>>;

/// Timing error detector.
///
/// `Re(conj(mf) * dmf)` \[Mengali:1997\] Eq. (8.3.5), clipped to [-1, 1].
/// Zero at the correct sampling instant; its sign tells early from late.
pub fn timing_error<T: Sample>(mf: T, dmf: T) -> f32 {
    (mf.conj() * dmf).re().clamp(-1.0, 1.0)
}

/// Symbol Synchronizer with polyphase filter bank.
///
/// `T` is the sample type (input and output), `C` the coefficient type and
/// `S` an optional diagnostics sink (see [`crate::dsp::trace`]).
#[derive(Debug, Clone)]
pub struct SymSync<T, C = T, S = ()> {
    /// Samples per symbol (input)
    k: usize,

    /// Samples per symbol (output)
    k_out: usize,

    /// Number of polyphase filter phases
    npfb: usize,

    /// Prototype filter length
    h_len: usize,

    /// Output samples since the last on-time instant
    decim_counter: usize,

    /// Synchronizer locked flag
    is_locked: bool,

    /// Resampling rate (k_out / k unless set manually)
    rate: f32,

    /// Fractional delay step
    del: f32,

    /// Accumulated timing phase
    tau: f32,

    /// Timing phase at the last loop update
    tau_decim: f32,

    /// Soft filterbank index
    bf: f32,

    /// Hard filterbank index
    b: i32,

    /// Instantaneous timing error
    q: f32,

    /// Filtered timing error
    q_hat: f32,

    loop_filter: LoopFilter,

    /// Matched filter bank
    mf: PolyphaseFilterBank<T, C>,

    /// Derivative matched filter bank
    dmf: PolyphaseFilterBank<T, C>,

    trace: S,
}

impl<T, C> SymSync<T, C>
where
    T: Sample + Mul<C, Output = T>,
    C: Sample,
{
    /// Create a symbol synchronizer from external filter coefficients.
    ///
    /// # Arguments
    ///
    /// * `k` - Samples per symbol (at least 2)
    /// * `npfb` - Number of polyphase filter phases (typically 32)
    /// * `h` - Matched filter coefficients, designed at `k * npfb`
    ///   samples/symbol and at least `npfb` long
    ///
    /// The synchronizer starts unlocked, with a loop bandwidth of
    /// [`DEFAULT_LOOP_BANDWIDTH`] and one output sample per symbol.
    pub fn new(k: usize, npfb: usize, h: &[C]) -> Result<Self> {
        if k < 2 {
            return Err(Error::InvalidSamplesPerSymbol(k));
        }
        if h.is_empty() {
            return Err(Error::InvalidFilterLength { len: 0, npfb });
        }
        if npfb == 0 {
            return Err(Error::InvalidFilterBankSize);
        }

        let dh = firdes::derivative(h);
        let mf = PolyphaseFilterBank::new(npfb, h)?;
        let dmf = PolyphaseFilterBank::new(npfb, &dh)?;
        let loop_filter = LoopFilter::new(DEFAULT_LOOP_BANDWIDTH)?;

        let k_out = 1;
        let rate = k_out as f32 / k as f32;

        debug!(
            "symsync created: k={}, npfb={}, h_len={}, sub-filter length={}",
            k,
            npfb,
            h.len(),
            mf.sub_filter_len()
        );

        Ok(Self {
            k,
            k_out,
            npfb,
            h_len: h.len(),
            decim_counter: 0,
            is_locked: false,
            rate,
            del: 1.0 / rate,
            tau: 0.0,
            tau_decim: 0.0,
            bf: 0.0,
            b: 0,
            q: 0.0,
            q_hat: 0.0,
            loop_filter,
            mf,
            dmf,
            trace: (),
        })
    }

    /// Create a symbol synchronizer with a square-root Nyquist matched filter.
    ///
    /// # Arguments
    ///
    /// * `kind` - Filter family (e.g. [`RnyquistType::Rrc`])
    /// * `k` - Samples per symbol (at least 2)
    /// * `m` - Filter delay in symbols (typically 3)
    /// * `beta` - Rolloff factor in (0, 1]
    /// * `npfb` - Number of polyphase filter phases (typically 32)
    ///
    /// # Example
    ///
    /// ```
    /// use symtiming::dsp::firdes::RnyquistType;
    /// use symtiming::dsp::symsync::SymSyncCrcf;
    ///
    /// // RDS symbol synchronizer
    /// let symsync = SymSyncCrcf::new_rnyquist(RnyquistType::Rrc, 3, 3, 0.8, 32).unwrap();
    /// assert_eq!(symsync.samples_per_symbol(), 3);
    /// ```
    pub fn new_rnyquist(
        kind: RnyquistType,
        k: usize,
        m: usize,
        beta: f32,
        npfb: usize,
    ) -> Result<Self> {
        if k < 2 {
            return Err(Error::InvalidSamplesPerSymbol(k));
        }
        if m == 0 {
            return Err(Error::InvalidSymbolDelay);
        }
        if !(beta > 0.0 && beta <= 1.0) {
            return Err(Error::InvalidRolloff(beta));
        }
        if npfb == 0 {
            return Err(Error::InvalidFilterBankSize);
        }

        // design at the upsampled rate so each phase is one fractional delay
        let h = firdes::rnyquist(kind, k * npfb, m, beta, 0.0)?;
        let h: Vec<C> = h.into_iter().map(C::from_real).collect();

        debug!("symsync {} prototype: m={}, beta={}", kind, m, beta);
        Self::new(k, npfb, &h)
    }
}

impl<T, C, S> SymSync<T, C, S>
where
    T: Sample + Mul<C, Output = T>,
    C: Sample,
    S: TraceSink,
{
    /// Replace the diagnostics sink.
    pub fn with_trace_sink<S2: TraceSink>(self, sink: S2) -> SymSync<T, C, S2> {
        SymSync {
            k: self.k,
            k_out: self.k_out,
            npfb: self.npfb,
            h_len: self.h_len,
            decim_counter: self.decim_counter,
            is_locked: self.is_locked,
            rate: self.rate,
            del: self.del,
            tau: self.tau,
            tau_decim: self.tau_decim,
            bf: self.bf,
            b: self.b,
            q: self.q,
            q_hat: self.q_hat,
            loop_filter: self.loop_filter,
            mf: self.mf,
            dmf: self.dmf,
            trace: sink,
        }
    }

    /// Diagnostics sink.
    pub fn trace_sink(&self) -> &S {
        &self.trace
    }

    /// Mutable diagnostics sink.
    pub fn trace_sink_mut(&mut self) -> &mut S {
        &mut self.trace
    }

    /// Reset the synchronizer state.
    ///
    /// Clears timing phase, counters, loop filter memory and both filterbank
    /// histories. Samples/symbol, output rate, resampling rate, loop
    /// bandwidth, coefficients and the lock state are kept; the delay step
    /// returns to `1/rate`.
    pub fn reset(&mut self) {
        self.mf.reset();
        self.dmf.reset();

        self.b = 0;
        self.tau = 0.0;
        self.bf = 0.0;
        self.q = 0.0;
        self.q_hat = 0.0;
        self.decim_counter = 0;
        self.tau_decim = 0.0;
        self.del = 1.0 / self.rate;
        self.loop_filter.reset();

        debug!("symsync reset (rate={})", self.rate);
    }

    /// Lock the synchronizer.
    ///
    /// While locked the loop filter is not updated; interpolation and
    /// decimation continue at the current delay step.
    pub fn lock(&mut self) {
        self.is_locked = true;
        debug!("symsync locked (del={}, tau={})", self.del, self.tau_decim);
    }

    /// Unlock the synchronizer, resuming timing tracking.
    pub fn unlock(&mut self) {
        self.is_locked = false;
        debug!("symsync unlocked");
    }

    /// Check if the synchronizer is locked.
    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    /// Set the resampling rate directly, bypassing the samples/symbol ratio.
    ///
    /// The delay step becomes `1/rate` until the next loop update.
    pub fn set_rate(&mut self, rate: f32) -> Result<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(Error::InvalidRate(rate));
        }
        self.rate = rate;
        self.del = 1.0 / rate;
        debug!("symsync rate set to {} (del={})", self.rate, self.del);
        Ok(())
    }

    /// Set the output rate (samples/symbol).
    pub fn set_output_rate(&mut self, k_out: usize) -> Result<()> {
        if k_out == 0 {
            return Err(Error::InvalidOutputRate);
        }
        self.k_out = k_out;
        self.rate = k_out as f32 / self.k as f32;
        self.del = 1.0 / self.rate;
        debug!("symsync output rate set to {} (del={})", k_out, self.del);
        Ok(())
    }

    /// Set the loop filter bandwidth in [0, 1].
    ///
    /// Lower values give smoother timing but slower adaptation; 0 disables
    /// adaptation. Loop filter memory is kept.
    pub fn set_loop_bandwidth(&mut self, bt: f32) -> Result<()> {
        self.loop_filter.set_bandwidth(bt)?;
        debug!("symsync loop bandwidth set to {}", bt);
        Ok(())
    }

    /// Fractional timing phase committed at the last loop update.
    pub fn tau(&self) -> f32 {
        self.tau_decim
    }

    /// Input samples per symbol.
    pub fn samples_per_symbol(&self) -> usize {
        self.k
    }

    /// Output samples per symbol.
    pub fn output_rate(&self) -> usize {
        self.k_out
    }

    /// Number of polyphase filter phases.
    pub fn num_filters(&self) -> usize {
        self.npfb
    }

    /// Prototype filter length.
    pub fn filter_len(&self) -> usize {
        self.h_len
    }

    /// Configured resampling rate.
    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Current fractional delay step per output sample.
    pub fn delay_step(&self) -> f32 {
        self.del
    }

    /// Hard filterbank index.
    pub fn filter_index(&self) -> i32 {
        self.b
    }

    /// Soft filterbank index.
    pub fn soft_filter_index(&self) -> f32 {
        self.bf
    }

    /// Loop filter bandwidth.
    pub fn loop_bandwidth(&self) -> f32 {
        self.loop_filter.bandwidth()
    }

    /// Last instantaneous (clipped) timing error.
    pub fn timing_error(&self) -> f32 {
        self.q
    }

    /// Last filtered timing error.
    pub fn filtered_timing_error(&self) -> f32 {
        self.q_hat
    }

    /// Matched filterbank.
    pub fn matched_filter(&self) -> &PolyphaseFilterBank<T, C> {
        &self.mf
    }

    /// Derivative matched filterbank.
    pub fn derivative_filter(&self) -> &PolyphaseFilterBank<T, C> {
        &self.dmf
    }

    /// Push one input sample, appending any output samples to `out`.
    ///
    /// Returns the number of samples written. Depending on the timing phase
    /// this is zero, one, or (for `k_out > k`) several samples.
    pub fn step(&mut self, x: T, out: &mut Vec<T>) -> usize {
        self.mf.push(x);
        self.dmf.push(x);

        let npfb = self.npfb as i32;
        let gain = self.k as f32;
        let mut n = 0;

        while self.b < npfb {
            let index = self.b as usize;
            let mf = self.mf.execute(index);

            if self.decim_counter == self.k_out {
                self.decim_counter = 0;

                self.trace.record(&TraceRecord {
                    del: self.del,
                    tau: self.tau,
                    bf: self.bf,
                    b: self.b,
                    q_hat: self.q_hat,
                });

                // Locked: re-run this index without committing the output
                // or advancing the phase.
                if self.is_locked {
                    continue;
                }

                let dmf = self.dmf.execute(index);
                self.advance_internal_loop(mf, dmf);
                self.tau_decim = self.tau;
            }

            out.push(mf / gain);
            n += 1;

            self.decim_counter += 1;
            self.tau += self.del;
            self.bf = self.tau * self.npfb as f32;
            self.b = self.bf.round() as i32;
        }

        self.tau -= 1.0;
        self.bf -= self.npfb as f32;
        self.b -= npfb;

        n
    }

    /// Process a batch of samples.
    ///
    /// # Returns
    ///
    /// Vector of synchronized output samples.
    pub fn execute(&mut self, input: &[T]) -> Vec<T> {
        let mut output = Vec::with_capacity(input.len() * self.k_out / self.k + 2);
        self.execute_into(input, &mut output);
        output
    }

    /// Process a batch of samples, appending outputs to `out`.
    ///
    /// Returns the total number of samples written.
    pub fn execute_into(&mut self, input: &[T], out: &mut Vec<T>) -> usize {
        input.iter().map(|&x| self.step(x, out)).sum()
    }

    /// Update the timing loop from one matched/derivative filter pair.
    fn advance_internal_loop(&mut self, mf: T, dmf: T) {
        self.q = timing_error(mf, dmf);
        self.q_hat = self.loop_filter.execute(self.q);

        // floor keeps del > 0 when k_out > k and the correction is large
        let nominal = self.k as f32 / self.k_out as f32;
        self.del = (nominal + self.q_hat).max(0.5 * nominal);

        trace!(
            "symsync loop: q={:.8}, q_hat={:.8}, del={:.8}",
            self.q, self.q_hat, self.del
        );
    }
}

impl<T, C, S> DspBlock<T> for SymSync<T, C, S>
where
    T: Sample + Mul<C, Output = T>,
    C: Sample,
    S: TraceSink,
{
    fn process(&mut self, data: &[T]) -> Vec<T> {
        self.execute(data)
    }
}

impl<T, C, S> fmt::Display for SymSync<T, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "symsync [rate: {:.6}, k: {}, k_out: {}, bt: {}, {}]",
            self.rate,
            self.k,
            self.k_out,
            self.loop_filter.bandwidth(),
            if self.is_locked { "locked" } else { "unlocked" }
        )?;
        write!(f, "  {}", self.mf)
    }
}

/// Synchronizer configuration for the square-root Nyquist constructor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymSyncConfig {
    /// Prototype filter family
    pub filter: RnyquistType,
    /// Input samples per symbol
    pub samples_per_symbol: usize,
    /// Output samples per symbol
    pub output_rate: usize,
    /// Number of polyphase filter phases
    pub num_filters: usize,
    /// Filter delay in symbols
    pub delay: usize,
    /// Rolloff factor
    pub rolloff: f32,
    /// Loop bandwidth
    pub bandwidth: f32,
}

impl Default for SymSyncConfig {
    fn default() -> Self {
        Self {
            filter: RnyquistType::Rrc,
            samples_per_symbol: 2,
            output_rate: 1,
            num_filters: 32,
            delay: 3,
            rolloff: 0.35,
            bandwidth: DEFAULT_LOOP_BANDWIDTH,
        }
    }
}

impl SymSyncConfig {
    /// Build a synchronizer from this configuration.
    pub fn build<T, C>(&self) -> Result<SymSync<T, C>>
    where
        T: Sample + Mul<C, Output = T>,
        C: Sample,
    {
        let mut sync = SymSync::new_rnyquist(
            self.filter,
            self.samples_per_symbol,
            self.delay,
            self.rolloff,
            self.num_filters,
        )?;
        sync.set_output_rate(self.output_rate)?;
        sync.set_loop_bandwidth(self.bandwidth)?;
        Ok(sync)
    }
}
