// SignalConditioner - drift removal and smoothing
//
// Prepares a raw intensity sequence for peak search. Fingertip PPG traces
// carry slow drift (breathing, hand motion, exposure adaptation) on top of
// the cardiac modulation, plus per-frame sensor noise.
//
// Pipeline:
// 1. Detrend: subtract a wide moving average (~2 s of measured rate)
// 2. Low-pass: convolve with a small Gaussian kernel, edges renormalized
// 3. Final smoothing: small moving average for cleaner local maxima

use crate::config::ConditioningConfig;

/// SignalConditioner turns a raw sample sequence into a peak-searchable one
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    config: ConditioningConfig,
    // Precomputed Gaussian weights, center at kernel.len() / 2
    kernel: Vec<f32>,
}

impl SignalConditioner {
    pub fn new(config: ConditioningConfig) -> Self {
        let kernel = gaussian_kernel(config.gaussian_width.max(1));
        Self { config, kernel }
    }

    /// Condition a raw sequence. Pure and deterministic, output has the same
    /// length as the input. Inputs shorter than the configured minimum are
    /// returned unmodified rather than failing.
    pub fn condition(&self, samples: &[f32], sample_rate: f32) -> Vec<f32> {
        if samples.len() < self.config.min_input_len {
            return samples.to_vec();
        }

        let detrended = self.detrend(samples, sample_rate);
        let lowpassed = self.convolve_renormalized(&detrended);
        moving_average(&lowpassed, self.config.smooth_window.max(1))
    }

    /// Subtract a centered wide moving average to remove slow drift.
    fn detrend(&self, samples: &[f32], sample_rate: f32) -> Vec<f32> {
        let window = ((self.config.detrend_seconds * sample_rate) as usize)
            .max(self.config.detrend_min_window);
        let half = window / 2;

        // Prefix sums keep the sweep linear in the input length.
        let mut prefix = Vec::with_capacity(samples.len() + 1);
        prefix.push(0.0f64);
        for &s in samples {
            prefix.push(prefix.last().unwrap() + s as f64);
        }

        samples
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                let start = i.saturating_sub(half);
                let end = (i + half + 1).min(samples.len());
                let mean = (prefix[end] - prefix[start]) / (end - start) as f64;
                s - mean as f32
            })
            .collect()
    }

    /// Convolve with the Gaussian kernel; edge samples use only the weights
    /// that fall inside the sequence, renormalized to sum to one.
    fn convolve_renormalized(&self, samples: &[f32]) -> Vec<f32> {
        let half = self.kernel.len() / 2;
        let mut out = Vec::with_capacity(samples.len());

        for i in 0..samples.len() {
            let mut acc = 0.0f32;
            let mut weight_sum = 0.0f32;
            for (k, &w) in self.kernel.iter().enumerate() {
                let offset = k as isize - half as isize;
                let j = i as isize + offset;
                if j >= 0 && (j as usize) < samples.len() {
                    acc += samples[j as usize] * w;
                    weight_sum += w;
                }
            }
            out.push(if weight_sum > 0.0 { acc / weight_sum } else { 0.0 });
        }

        out
    }
}

/// Centered moving average with renormalized edges.
fn moving_average(samples: &[f32], window: usize) -> Vec<f32> {
    let half = window / 2;
    let mut out = Vec::with_capacity(samples.len());

    for i in 0..samples.len() {
        let start = i.saturating_sub(half);
        let end = (i + half + 1).min(samples.len());
        let sum: f32 = samples[start..end].iter().sum();
        out.push(sum / (end - start) as f32);
    }

    out
}

/// Symmetric Gaussian-shaped weights, normalized to sum to one.
fn gaussian_kernel(width: usize) -> Vec<f32> {
    let half = (width / 2) as f32;
    let sigma = (half / 1.5).max(0.5);
    let weights: Vec<f32> = (0..width)
        .map(|i| {
            let x = i as f32 - half;
            (-(x * x) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.iter().map(|w| w / sum).collect()
}
