//! Prototype filter design for timing recovery.
//!
//! Provides the square-root Nyquist pulse used by
//! [`SymSync::new_rnyquist`](crate::dsp::symsync::SymSync::new_rnyquist) and
//! the normalized derivative filter that feeds the timing error detector.
//!
//! # Example
//!
//! ```
//! use symtiming::dsp::firdes::{rnyquist, RnyquistType};
//!
//! // 4 samples/symbol, 3 symbols delay, 35% excess bandwidth
//! let h = rnyquist(RnyquistType::Rrc, 4, 3, 0.35, 0.0).unwrap();
//! assert_eq!(h.len(), 2 * 4 * 3 + 1);
//! ```

use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::dsp::Sample;
use crate::error::{Error, Result};

/// Square-root Nyquist filter family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RnyquistType {
    /// Root-raised-cosine.
    #[default]
    Rrc,
}

impl fmt::Display for RnyquistType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RnyquistType::Rrc => write!(f, "rrcos"),
        }
    }
}

impl FromStr for RnyquistType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rrc" | "rrcos" => Ok(RnyquistType::Rrc),
            other => Err(Error::format(format!("unknown root-Nyquist filter '{other}'"))),
        }
    }
}

/// Design a square-root Nyquist filter.
///
/// # Arguments
///
/// * `kind` - Filter family
/// * `k` - Samples per symbol
/// * `m` - Filter delay in symbols
/// * `beta` - Excess bandwidth (rolloff) in (0, 1]
/// * `dt` - Fractional sample offset
///
/// # Returns
///
/// `2*k*m + 1` coefficients, not normalized.
pub fn rnyquist(kind: RnyquistType, k: usize, m: usize, beta: f32, dt: f32) -> Result<Vec<f32>> {
    if k == 0 {
        return Err(Error::InvalidSamplesPerSymbol(k));
    }
    if m == 0 {
        return Err(Error::InvalidSymbolDelay);
    }
    if !(beta > 0.0 && beta <= 1.0) {
        return Err(Error::InvalidRolloff(beta));
    }

    Ok(match kind {
        RnyquistType::Rrc => rrcos(k, m, beta, dt),
    })
}

/// Root-raised-cosine coefficients (`2*k*m + 1` taps), parameters unchecked.
fn rrcos(k: usize, m: usize, beta: f32, dt: f32) -> Vec<f32> {
    let h_len = 2 * k * m + 1;
    let kf = k as f32;
    let mf = m as f32;

    (0..h_len)
        .map(|n| {
            // normalized time in symbol periods, centered at m
            let z = n as f32 / kf - mf + dt;

            if z.abs() < 1e-5 {
                return 1.0 - beta + 4.0 * beta / PI;
            }

            let g = 1.0 - 16.0 * beta * beta * z * z;
            if g * g < 1e-5 {
                // 16*beta^2*z^2 == 1
                let g1 = 1.0 + 2.0 / PI;
                let g2 = (0.25 * PI / beta).sin();
                let g3 = 1.0 - 2.0 / PI;
                let g4 = (0.25 * PI / beta).cos();
                return beta / 2.0_f32.sqrt() * (g1 * g2 + g3 * g4);
            }

            let t1 = ((1.0 + beta) * PI * z).cos();
            let t2 = ((1.0 - beta) * PI * z).sin();
            let t3 = 1.0 / (4.0 * beta * z);
            let t4 = 4.0 * beta / (PI * g);
            t4 * (t1 + t2 * t3)
        })
        .collect()
}

/// Compute the derivative of a prototype filter.
///
/// Central differences with circular wrap at both ends, scaled so that the
/// largest `|h[i] * dh[i]|` equals 0.06. A prototype whose product is
/// identically zero (e.g. a single tap) yields an all-zero derivative.
pub fn derivative<C: Sample>(h: &[C]) -> Vec<C> {
    let h_len = h.len();
    if h_len < 2 {
        return vec![C::default(); h_len];
    }

    let mut dh: Vec<C> = (0..h_len)
        .map(|i| {
            let next = h[(i + 1) % h_len];
            let prev = h[(i + h_len - 1) % h_len];
            next - prev
        })
        .collect();

    let hdh_max = h
        .iter()
        .zip(dh.iter())
        .map(|(&a, &b)| (a * b).norm())
        .fold(0.0f32, f32::max);

    if hdh_max > 0.0 {
        let scale = 0.06 / hdh_max;
        for coef in &mut dh {
            *coef = *coef * scale;
        }
    }

    dh
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_complex::Complex;

    #[test]
    fn test_rrc_filter_design() {
        let h = rnyquist(RnyquistType::Rrc, 4, 3, 0.35, 0.0).unwrap();
        assert_eq!(h.len(), 25);
        let mid = h.len() / 2;
        for i in 0..mid {
            assert_relative_eq!(h[i], h[h.len() - 1 - i], epsilon = 1e-5);
        }
        // peak at the center tap
        assert_relative_eq!(h[mid], 1.0 - 0.35 + 4.0 * 0.35 / PI, epsilon = 1e-6);
        assert!(h.iter().all(|&c| c <= h[mid]));
    }

    #[test]
    fn test_rrc_singular_points_are_finite() {
        // beta = 0.25 puts 16*beta^2*z^2 == 1 exactly on a tap (z = 1)
        let h = rnyquist(RnyquistType::Rrc, 4, 2, 0.25, 0.0).unwrap();
        assert!(h.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_rnyquist_validation() {
        assert!(matches!(
            rnyquist(RnyquistType::Rrc, 2, 0, 0.5, 0.0),
            Err(Error::InvalidSymbolDelay)
        ));
        assert!(matches!(
            rnyquist(RnyquistType::Rrc, 2, 3, 0.0, 0.0),
            Err(Error::InvalidRolloff(_))
        ));
        assert!(matches!(
            rnyquist(RnyquistType::Rrc, 2, 3, 1.5, 0.0),
            Err(Error::InvalidRolloff(_))
        ));
        assert!(rnyquist(RnyquistType::Rrc, 2, 3, 1.0, 0.0).is_ok());
    }

    #[test]
    fn test_rnyquist_type_parse() {
        assert_eq!("rrc".parse::<RnyquistType>().unwrap(), RnyquistType::Rrc);
        assert_eq!("RRCOS".parse::<RnyquistType>().unwrap(), RnyquistType::Rrc);
        assert!("gmsk".parse::<RnyquistType>().is_err());
        assert_eq!(RnyquistType::Rrc.to_string(), "rrcos");
    }

    #[test]
    fn test_derivative_filter() {
        let h = vec![1.0f32, 2.0, 3.0, 2.0, 1.0];
        let dh = derivative(&h);
        assert_eq!(dh.len(), h.len());

        // interior taps of a symmetric filter give an antisymmetric derivative
        assert_relative_eq!(dh[1], -dh[3], epsilon = 1e-6);
        assert_relative_eq!(dh[2], 0.0, epsilon = 1e-6);

        let hdh_max = h
            .iter()
            .zip(dh.iter())
            .map(|(a, b)| (a * b).abs())
            .fold(0.0f32, f32::max);
        assert_relative_eq!(hdh_max, 0.06, epsilon = 1e-6);
    }

    #[test]
    fn test_derivative_degenerate() {
        assert_eq!(derivative(&[0.7f32]), vec![0.0]);
        assert_eq!(derivative(&[0.0f32; 4]), vec![0.0; 4]);
        assert!(derivative::<f32>(&[]).is_empty());
    }

    #[test]
    fn test_derivative_complex() {
        let h: Vec<Complex<f32>> = [1.0f32, 2.0, 3.0, 2.0, 1.0]
            .iter()
            .map(|&x| Complex::new(x, 0.0))
            .collect();
        let dh = derivative(&h);
        let real = derivative(&[1.0f32, 2.0, 3.0, 2.0, 1.0]);
        for (c, r) in dh.iter().zip(real.iter()) {
            assert_relative_eq!(c.re, *r, epsilon = 1e-6);
            assert_relative_eq!(c.im, 0.0, epsilon = 1e-6);
        }
    }
}
