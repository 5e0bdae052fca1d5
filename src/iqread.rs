//! I/Q Data Reading Module
//!
//! Reads interleaved I/Q recordings from files or standard input in chunks of
//! complex samples, and writes complex samples back out as `cf32`.
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use num_complex::Complex;
use tracing::debug;

use crate::error::Result;
use crate::{IqFormat, convert_bytes_to_complex};

/**
 * Synchronous I/Q Reader
 *
 * Iterates over chunks of `chunk_size` samples. The last chunk may be
 * shorter; a trailing partial sample is discarded.
 */
pub struct IqRead<R: Read> {
    reader: R,
    iq_format: IqFormat,
    chunk_size: usize,
    done: bool,
}

impl<R: Read> IqRead<R> {
    pub fn new(reader: R, chunk_size: usize, iq_format: IqFormat) -> Self {
        Self {
            reader,
            iq_format,
            chunk_size: chunk_size.max(1),
            done: false,
        }
    }

    pub fn format(&self) -> IqFormat {
        self.iq_format
    }

    fn read_samples(&mut self) -> Result<Vec<Complex<f32>>> {
        let mut buffer = vec![0u8; self.chunk_size * self.iq_format.bytes_per_sample()];
        let mut filled = 0;

        while filled < buffer.len() {
            match self.reader.read(&mut buffer[filled..]) {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        buffer.truncate(filled);
        Ok(convert_bytes_to_complex(self.iq_format, &buffer))
    }
}

impl IqRead<BufReader<std::fs::File>> {
    pub fn from_file<P: AsRef<Path>>(path: P, chunk_size: usize, iq_format: IqFormat) -> Result<Self> {
        let path = expanduser(path.as_ref().to_path_buf());
        debug!("reading {:?} samples from {}", iq_format, path.display());
        let file = std::fs::File::open(path)?;
        Ok(Self::new(BufReader::new(file), chunk_size, iq_format))
    }
}

impl IqRead<BufReader<std::io::Stdin>> {
    pub fn from_stdin(chunk_size: usize, iq_format: IqFormat) -> Self {
        Self::new(BufReader::new(std::io::stdin()), chunk_size, iq_format)
    }
}

impl<R: Read> Iterator for IqRead<R> {
    type Item = Result<Vec<Complex<f32>>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_samples() {
            Ok(samples) if samples.is_empty() => None,
            Ok(samples) => Some(Ok(samples)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Write complex samples as little-endian `cf32`.
pub fn write_cf32<W: Write>(writer: &mut W, samples: &[Complex<f32>]) -> Result<()> {
    let mut bytes = Vec::with_capacity(samples.len() * 8);
    for s in samples {
        bytes.extend_from_slice(&s.re.to_le_bytes());
        bytes.extend_from_slice(&s.im.to_le_bytes());
    }
    writer.write_all(&bytes)?;
    Ok(())
}

pub(crate) fn expanduser(path: PathBuf) -> PathBuf {
    // Check if the path starts with "~"
    if let Some(stripped) = path.to_str().and_then(|p| p.strip_prefix("~"))
        && let Some(home_dir) = dirs::home_dir()
    {
        return home_dir.join(stripped.trim_start_matches('/'));
    }
    path
}
