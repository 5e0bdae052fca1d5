//! Synchronizer diagnostics.
//!
//! A [`SymSync`] reports its internal timing state to a [`TraceSink`] at every
//! on-time (decimated) instant. The default sink is `()`, which discards
//! everything; [`TraceRecorder`] keeps a bounded window of recent records and
//! renders them, together with the filter impulse responses, as an
//! Octave/MATLAB script for offline analysis.
//!
//! Sinks only observe: nothing written to a sink feeds back into the
//! synchronizer.
//!
//! # Example
//!
//! ```
//! use symtiming::dsp::symsync::SymSyncRrrf;
//! use symtiming::dsp::firdes::RnyquistType;
//! use symtiming::dsp::trace::TraceRecorder;
//!
//! let mut sync = SymSyncRrrf::new_rnyquist(RnyquistType::Rrc, 2, 3, 0.5, 16)
//!     .unwrap()
//!     .with_trace_sink(TraceRecorder::new(256));
//! let _ = sync.execute(&[1.0; 64]);
//!
//! let mut script = Vec::new();
//! sync.trace_sink().write_script(&sync, &mut script).unwrap();
//! assert!(String::from_utf8(script).unwrap().contains("q_hat"));
//! ```

use std::collections::VecDeque;
use std::io::Write;
use std::ops::Mul;

use crate::dsp::Sample;
use crate::dsp::symsync::SymSync;
use crate::error::Result;

/// Default number of records kept by a [`TraceRecorder`].
pub const DEFAULT_TRACE_LEN: usize = 1024;

/// Timing state captured at one on-time instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceRecord {
    /// Fractional delay step
    pub del: f32,
    /// Accumulated timing phase
    pub tau: f32,
    /// Soft filterbank index
    pub bf: f32,
    /// Hard filterbank index
    pub b: i32,
    /// Filtered timing error
    pub q_hat: f32,
}

/// Receiver of synchronizer trace records.
pub trait TraceSink {
    /// Called once per on-time instant, before the loop update.
    fn record(&mut self, record: &TraceRecord);
}

impl TraceSink for () {
    #[inline]
    fn record(&mut self, _record: &TraceRecord) {}
}

impl TraceSink for Vec<TraceRecord> {
    fn record(&mut self, record: &TraceRecord) {
        self.push(*record);
    }
}

impl<S: TraceSink + ?Sized> TraceSink for &mut S {
    fn record(&mut self, record: &TraceRecord) {
        (**self).record(record);
    }
}

impl<S: TraceSink + ?Sized> TraceSink for Box<S> {
    fn record(&mut self, record: &TraceRecord) {
        (**self).record(record);
    }
}

/// Bounded trace window with script export.
///
/// Keeps the most recent `capacity` records; older ones are discarded.
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    capacity: usize,
    records: VecDeque<TraceRecord>,
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_LEN)
    }
}

impl TraceRecorder {
    /// Create a recorder keeping at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    /// Maximum number of records kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Recorded entries, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &TraceRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop all records.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Write an Octave/MATLAB script describing `sync` and the recorded trace.
    ///
    /// The matched and derivative filter impulse responses are measured on
    /// copies of the synchronizer's filterbanks, so `sync` itself is not
    /// disturbed.
    pub fn write_script<T, C, S, W>(&self, sync: &SymSync<T, C, S>, w: &mut W) -> Result<()>
    where
        T: Sample + Mul<C, Output = T>,
        C: Sample,
        S: TraceSink,
        W: Write,
    {
        let npfb = sync.num_filters();
        let k = sync.samples_per_symbol();

        writeln!(w, "% symsync_internal_debug.m, auto-generated file")?;
        writeln!(w)?;
        writeln!(w, "clear all;")?;
        writeln!(w, "close all;")?;
        writeln!(w, "M = {npfb};")?;
        writeln!(w, "k = {k};")?;
        writeln!(w, "n = {};", self.records.len())?;
        writeln!(w)?;

        // impulse responses, interleaved across the bank
        let mut mf = sync.matched_filter().clone();
        let mut dmf = sync.derivative_filter().clone();
        mf.reset();
        dmf.reset();
        let h_len = mf.sub_filter_len();
        writeln!(w, "h = [];")?;
        writeln!(w, "dh = [];")?;
        writeln!(w, "h_len = {h_len};")?;
        for i in 0..h_len {
            let x = if i == 0 { T::from_real(1.0) } else { T::default() };
            mf.push(x);
            dmf.push(x);
            for n in 0..npfb {
                let idx = i * npfb + n + 1;
                writeln!(
                    w,
                    "h({idx:4}) = {:12.8}; dh({idx:4}) = {:12.8};",
                    mf.execute(n).re(),
                    dmf.execute(n).re()
                )?;
            }
        }
        writeln!(w)?;
        writeln!(w, "figure;")?;
        writeln!(w, "th = [0:(h_len*M-1)]/(k*M) - h_len/(2*k);")?;
        writeln!(w, "subplot(3,1,1), plot(th, h);      ylabel('MF');      grid on;")?;
        writeln!(w, "subplot(3,1,2), plot(th, dh);     ylabel('dMF');     grid on;")?;
        writeln!(w, "subplot(3,1,3), plot(th, -h.*dh); ylabel('-MF*dMF'); grid on;")?;
        writeln!(w)?;

        self.write_buffer(w, "del", |r| r.del)?;
        self.write_buffer(w, "tau", |r| r.tau)?;
        self.write_buffer(w, "bf", |r| r.bf)?;
        self.write_buffer(w, "b", |r| r.b as f32)?;
        self.write_buffer(w, "q_hat", |r| r.q_hat)?;

        writeln!(w, "t = 1:n;")?;
        writeln!(w, "figure;")?;
        writeln!(w, "hold on;")?;
        writeln!(w, "plot(t,b,'Color',[0.5 0.5 0.5]);")?;
        writeln!(w, "plot(t,bf,'LineWidth',2,'Color',[0 0.25 0.5]);")?;
        writeln!(w, "hold off;")?;
        writeln!(w, "grid on;")?;
        writeln!(w, "axis([t(1) t(end) -1 M]);")?;
        writeln!(w, "legend('b','b (soft)');")?;
        writeln!(w, "xlabel('Symbol Index')")?;
        writeln!(w, "ylabel('Polyphase Filter Index')")?;
        writeln!(w, "% done.")?;
        Ok(())
    }

    fn write_buffer<W, F>(&self, w: &mut W, name: &str, field: F) -> Result<()>
    where
        W: Write,
        F: Fn(&TraceRecord) -> f32,
    {
        writeln!(w, "{name} = zeros(1,n);")?;
        for (i, record) in self.records.iter().enumerate() {
            writeln!(w, "{name}({:4}) = {:12.8};", i + 1, field(record))?;
        }
        writeln!(w)?;
        Ok(())
    }
}

impl TraceSink for TraceRecorder {
    fn record(&mut self, record: &TraceRecord) {
        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(*record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::symsync::SymSyncRrrf;

    fn record(i: i32) -> TraceRecord {
        TraceRecord {
            del: 2.0,
            tau: 0.1 * i as f32,
            bf: 0.8 * i as f32,
            b: i,
            q_hat: 0.0,
        }
    }

    #[test]
    fn test_recorder_window() {
        let mut rec = TraceRecorder::new(3);
        for i in 0..5 {
            rec.record(&record(i));
        }
        assert_eq!(rec.len(), 3);
        let b: Vec<i32> = rec.records().map(|r| r.b).collect();
        assert_eq!(b, vec![2, 3, 4]);

        rec.clear();
        assert!(rec.is_empty());
    }

    #[test]
    fn test_zero_capacity_recorder() {
        let mut rec = TraceRecorder::new(0);
        rec.record(&record(1));
        assert!(rec.is_empty());
    }

    #[test]
    fn test_forwarding_sinks() {
        fn feed<S: TraceSink>(mut sink: S, i: i32) {
            sink.record(&record(i));
        }

        let mut records: Vec<TraceRecord> = Vec::new();
        feed(&mut records, 7);
        feed(Box::new(&mut records), 8);
        assert_eq!(records, vec![record(7), record(8)]);
    }

    #[test]
    fn test_script_export() {
        let h: Vec<f32> = (0..16).map(|i| (i as f32 * 0.2).sin()).collect();
        let mut sync = SymSyncRrrf::new(2, 4, &h)
            .unwrap()
            .with_trace_sink(TraceRecorder::default());
        let input: Vec<f32> = (0..40).map(|i| if i % 4 < 2 { 1.0 } else { -1.0 }).collect();
        let out = sync.execute(&input);
        let tau_before = sync.tau();

        let mut script = Vec::new();
        sync.trace_sink().write_script(&sync, &mut script).unwrap();
        let script = String::from_utf8(script).unwrap();

        assert!(script.starts_with("% symsync_internal_debug.m"));
        assert!(script.contains("M = 4;"));
        assert!(script.contains("k = 2;"));
        assert!(script.contains("h_len = 4;"));
        // 4 taps * 4 filters interleaved
        assert!(script.contains("h(  16) ="));
        for name in ["del", "tau", "bf", "b", "q_hat"] {
            assert!(script.contains(&format!("{name} = zeros(1,n);")));
        }
        assert!(script.contains(&format!("n = {};", sync.trace_sink().len())));

        // export leaves the synchronizer untouched
        assert_eq!(sync.tau(), tau_before);
        let mut replay = SymSyncRrrf::new(2, 4, &h).unwrap();
        assert_eq!(replay.execute(&input), out);
    }
}
