//! Test helper utilities for generating synthetic baseband signals

#![allow(dead_code)]

use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use symtiming::RnyquistType;
use symtiming::dsp::firdes::rnyquist;

/// Symmetric real prototype of length 33 (Hann-windowed sinc at 2 samples/symbol)
pub fn prototype33() -> Vec<f32> {
    let len = 33;
    let mid = (len - 1) as f32 / 2.0;
    (0..len)
        .map(|i| {
            let t = (i as f32 - mid) / 8.0;
            let sinc = if t == 0.0 {
                1.0
            } else {
                (std::f32::consts::PI * t).sin() / (std::f32::consts::PI * t)
            };
            let w = 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (len - 1) as f32).cos();
            sinc * w
        })
        .collect()
}

/// Random BPSK symbols (+1/-1)
pub fn bpsk_symbols(num_symbols: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_symbols)
        .map(|_| if rng.random::<bool>() { 1.0 } else { -1.0 })
        .collect()
}

/// Root-raised-cosine shaped BPSK at `k` samples/symbol
///
/// # Arguments
/// * `symbols` - Symbol values
/// * `k` - Samples per symbol
/// * `m` - Pulse delay in symbols
/// * `beta` - Rolloff factor
/// * `dt` - Fractional timing offset of the pulse, in symbols
pub fn rrc_shaped(symbols: &[f32], k: usize, m: usize, beta: f32, dt: f32) -> Vec<f32> {
    let h = rnyquist(RnyquistType::Rrc, k, m, beta, dt).expect("valid pulse");
    let mut upsampled = vec![0.0f32; symbols.len() * k];
    for (i, &s) in symbols.iter().enumerate() {
        upsampled[i * k] = s;
    }
    convolve(&upsampled, &h)
}

/// Causal convolution, truncated to the input length
pub fn convolve(x: &[f32], h: &[f32]) -> Vec<f32> {
    (0..x.len())
        .map(|n| {
            h.iter()
                .enumerate()
                .filter(|(j, _)| *j <= n)
                .map(|(j, &c)| c * x[n - j])
                .sum()
        })
        .collect()
}

/// Add white Gaussian noise with standard deviation `sigma`
pub fn add_noise(x: &[f32], sigma: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0f32, sigma).expect("valid sigma");
    x.iter().map(|&v| v + normal.sample(&mut rng)).collect()
}

/// Complex white Gaussian noise
pub fn complex_noise(num_samples: usize, sigma: f32, seed: u64) -> Vec<Complex<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0f32, sigma).expect("valid sigma");
    (0..num_samples)
        .map(|_| Complex::new(normal.sample(&mut rng), normal.sample(&mut rng)))
        .collect()
}

/// Mean and maximum deviation of `|y|`
pub fn magnitude_stats(y: &[f32]) -> (f32, f32) {
    let mean = y.iter().map(|v| v.abs()).sum::<f32>() / y.len() as f32;
    let spread = y
        .iter()
        .map(|v| (v.abs() - mean).abs())
        .fold(0.0f32, f32::max);
    (mean, spread)
}
