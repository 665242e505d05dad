//! Per-frame signal conditioning: dither, DC removal, raw energy,
//! pre-emphasis and windowing.
//!
//! The order matches Kaldi's `ProcessWindow` and must not change.

use ndarray::{Array1, Array2, ArrayViewMut1};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::config::FilterbankConfig;

/// Adds `N(0, 1) * amplitude` noise to every sample. No-op for amplitude 0.
pub fn dither<R: Rng + ?Sized>(samples: &mut [f64], amplitude: f64, rng: &mut R) {
    if amplitude <= 0.0 {
        return;
    }
    for s in samples.iter_mut() {
        let n: f64 = StandardNormal.sample(rng);
        *s += n * amplitude;
    }
}

/// Natural log of an energy value, clamped to `eps` and optionally floored.
pub(crate) fn log_energy(energy: f64, eps: f64, floor: f64) -> f64 {
    let e = energy.max(eps).ln();
    if floor > 0.0 { e.max(floor) } else { e }
}

/// Applies DC removal, pre-emphasis and windowing to frames in place.
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    window: Array1<f64>,
    preemph_coeff: f64,
    remove_dc_offset: bool,
    capture_raw_energy: bool,
    eps: f64,
    log_energy_floor: f64,
}

impl SignalConditioner {
    pub fn new(cfg: &FilterbankConfig, window: Vec<f64>) -> Self {
        Self {
            window: Array1::from(window),
            preemph_coeff: cfg.preemph_coeff,
            remove_dc_offset: cfg.remove_dc_offset,
            capture_raw_energy: cfg.use_energy && cfg.raw_energy,
            eps: cfg.eps,
            log_energy_floor: cfg.log_energy_floor,
        }
    }

    pub fn window(&self) -> &Array1<f64> {
        &self.window
    }

    /// Conditions `[frames, win_length]` in place.
    ///
    /// Returns the per-frame raw log-energy (measured after DC removal,
    /// before pre-emphasis) when raw energy is enabled.
    pub fn condition(&self, frames: &mut Array2<f64>) -> Option<Array1<f64>> {
        let mut raw_energy = self
            .capture_raw_energy
            .then(|| Array1::zeros(frames.nrows()));

        for (t, mut frame) in frames.outer_iter_mut().enumerate() {
            if self.remove_dc_offset {
                remove_dc(&mut frame);
            }
            if let Some(energy) = raw_energy.as_mut() {
                let sum: f64 = frame.iter().map(|v| v * v).sum();
                energy[t] = log_energy(sum, self.eps, self.log_energy_floor);
            }
            preemphasize(&mut frame, self.preemph_coeff);
            frame *= &self.window;
        }
        raw_energy
    }
}

fn remove_dc(frame: &mut ArrayViewMut1<f64>) {
    if frame.is_empty() {
        return;
    }
    let mean = frame.sum() / frame.len() as f64;
    *frame -= mean;
}

/// Kaldi frame-level pre-emphasis: `x[i] -= c * x[i-1]` from the end,
/// then `x[0] *= 1 - c`. Skipped entirely for `c <= 0`.
pub fn preemphasize(frame: &mut ArrayViewMut1<f64>, coeff: f64) {
    if coeff <= 0.0 || frame.is_empty() {
        return;
    }
    for i in (1..frame.len()).rev() {
        let prev = frame[i - 1];
        frame[i] -= coeff * prev;
    }
    frame[0] *= 1.0 - coeff;
}
