//! Error types for symtiming operations.
//!
//! Every error is raised synchronously, either while constructing a
//! synchronizer or from an explicit setter. Once built, the sample stepping
//! path has no failure modes.

use thiserror::Error;

/// Result type for symtiming operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring a synchronizer or moving samples.
#[derive(Debug, Error)]
pub enum Error {
    /// Input samples per symbol must be at least 2.
    #[error("samples/symbol must be at least 2, got {0}")]
    InvalidSamplesPerSymbol(usize),

    /// Prototype filter is empty or too short to fill every sub-filter.
    #[error("invalid filter length {len} for a bank of {npfb} filters")]
    InvalidFilterLength { len: usize, npfb: usize },

    /// The filterbank needs at least one sub-filter.
    #[error("number of filters in the bank must be greater than zero")]
    InvalidFilterBankSize,

    /// Output samples per symbol must be at least 1.
    #[error("output rate must be greater than zero")]
    InvalidOutputRate,

    /// Loop bandwidth outside [0, 1].
    #[error("loop bandwidth must be in [0,1], got {0}")]
    InvalidLoopBandwidth(f32),

    /// Root-Nyquist excess bandwidth outside (0, 1].
    #[error("rolloff factor must be in (0,1], got {0}")]
    InvalidRolloff(f32),

    /// Root-Nyquist filter delay must be at least one symbol.
    #[error("filter delay (symbols) must be greater than zero")]
    InvalidSymbolDelay,

    /// Manual resampling rate must be finite and positive.
    #[error("resampling rate must be finite and positive, got {0}")]
    InvalidRate(f32),

    /// I/O error (sample files, stdin/stdout, diagnostics export).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown or malformed I/Q sample format.
    #[error("Format error: {0}")]
    Format(String),
}

impl Error {
    /// Create a format error with a custom message
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }
}
