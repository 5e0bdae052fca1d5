//! Symbol timing recovery for I/Q recordings
//!
//! Reads an oversampled I/Q recording, runs it through a polyphase symbol
//! synchronizer and writes the recovered symbols as little-endian `cf32`.
//!
//! # Usage Examples
//!
//! ## File in, symbols to a file
//! ```bash
//! symrx --file capture.cu8 --format cu8 -k 4 -o symbols.cf32 -v
//! ```
//!
//! ## Piped input, lock the loop after acquisition
//! ```bash
//! rtl_sdr -f 433.92M -s 1M - | symrx --format cu8 -k 8 --lock-after 500 > symbols.cf32
//! ```
//!
//! ## Export the internal timing trace
//! ```bash
//! symrx --file capture.cf32 --format cf32 --trace symsync_debug.m --quiet
//! ```

use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use num_complex::Complex;
use symtiming::dsp::trace::TraceRecorder;
use symtiming::iqread::{IqRead, write_cf32};
use symtiming::{IqFormat, RnyquistType, SymSyncConfig, SymSyncCrcf};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Symbol timing recovery for I/Q recordings", long_about = None)]
struct Args {
    /// Input file path (reads stdin when omitted)
    #[arg(long)]
    file: Option<PathBuf>,

    /// IQ format for input (cu8, cs8, cs16, cf32)
    #[arg(long, default_value = "cu8")]
    format: IqFormat,

    /// Input samples per symbol
    #[arg(short = 'k', long, default_value_t = 2)]
    samples_per_symbol: usize,

    /// Output samples per symbol
    #[arg(long, default_value_t = 1)]
    k_out: usize,

    /// Number of polyphase filter phases
    #[arg(long, default_value_t = 32)]
    npfb: usize,

    /// Matched filter delay in symbols
    #[arg(short = 'm', long, default_value_t = 3)]
    delay: usize,

    /// Matched filter family (rrc)
    #[arg(long, default_value = "rrc")]
    filter: RnyquistType,

    /// Matched filter rolloff factor (0, 1]
    #[arg(long, default_value_t = 0.35)]
    beta: f32,

    /// Timing loop bandwidth [0, 1]
    #[arg(long, default_value_t = 0.01)]
    bandwidth: f32,

    /// Lock the timing loop after this many output samples
    #[arg(long)]
    lock_after: Option<usize>,

    /// Samples read per chunk
    #[arg(long, default_value_t = 4096)]
    chunk_size: usize,

    /// Output file for recovered symbols (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write an Octave script with the internal timing trace to this path
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Do not write symbols to stdout
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Verbosity level (-v=info, -vv=debug, -vvv=trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn config(&self) -> SymSyncConfig {
        SymSyncConfig {
            filter: self.filter,
            samples_per_symbol: self.samples_per_symbol,
            output_rate: self.k_out,
            num_filters: self.npfb,
            delay: self.delay,
            rolloff: self.beta,
            bandwidth: self.bandwidth,
        }
    }
}

fn main() -> symtiming::Result<()> {
    let args = Args::parse();

    // 0 = WARN (quiet), 1 = INFO, 2 = DEBUG, 3+ = TRACE
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .try_init();

    let sync: SymSyncCrcf = args.config().build()?;
    let mut sync = sync.with_trace_sink(TraceRecorder::default());
    info!("{}", sync);

    let source: Box<dyn Iterator<Item = symtiming::Result<Vec<Complex<f32>>>>> = match &args.file
    {
        Some(path) => Box::new(IqRead::from_file(path, args.chunk_size, args.format)?),
        None => Box::new(IqRead::from_stdin(args.chunk_size, args.format)),
    };

    let mut sink: Option<Box<dyn Write>> = match (&args.output, args.quiet) {
        (Some(path), _) => Some(Box::new(BufWriter::new(File::create(path)?))),
        (None, false) => Some(Box::new(BufWriter::new(stdout().lock()))),
        (None, true) => None,
    };

    let mut symbols = Vec::with_capacity(args.chunk_size);
    let mut total_in = 0usize;
    let mut total_out = 0usize;

    for chunk in source {
        let chunk = chunk?;
        total_in += chunk.len();

        symbols.clear();
        for &x in &chunk {
            total_out += sync.step(x, &mut symbols);

            if let Some(limit) = args.lock_after
                && !sync.is_locked()
                && total_out >= limit
            {
                sync.lock();
                info!("timing loop locked after {} symbols (tau={:.6})", total_out, sync.tau());
            }
        }

        debug!(
            "chunk: {} in, {} out, tau={:.6}, del={:.6}",
            chunk.len(),
            symbols.len(),
            sync.tau(),
            sync.delay_step()
        );

        if let Some(w) = sink.as_mut() {
            write_cf32(w, &symbols)?;
        }
    }

    if let Some(mut w) = sink {
        w.flush()?;
    }

    if total_in == 0 {
        warn!("no input samples");
    }
    info!(
        "{} samples in, {} symbols out, tau={:.6}, del={:.6}",
        total_in,
        total_out,
        sync.tau(),
        sync.delay_step()
    );

    if let Some(path) = &args.trace {
        let mut w = BufWriter::new(File::create(path)?);
        sync.trace_sink().write_script(&sync, &mut w)?;
        w.flush()?;
        info!("internal results written to {}", path.display());
    }

    Ok(())
}
