//! Mel-scale utilities, filterbank generation and log-mel projection.

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::config::{FilterbankConfig, Geometry};

/// Converts frequency in Hz to the HTK mel scale.
pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Converts HTK mel back to Hz.
pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Creates the Kaldi-aligned mel filterbank matrix.
///
/// Returns `[num_mel_bins, n_stft]`. Bin `i` sits at `i * sample_rate / n_fft`
/// Hz and belongs to filter `b` only when its mel value lies strictly between
/// the filter's left and right edges.
pub fn mel_filter_bank(cfg: &FilterbankConfig, geometry: &Geometry) -> Array2<f64> {
    let num_mels = cfg.num_mel_bins;
    let n_stft = geometry.n_stft;
    let fft_bin_width = cfg.sample_rate as f64 / geometry.n_fft as f64;

    let mel_low = hz_to_mel(cfg.low_freq);
    let mel_high = hz_to_mel(cfg.resolved_high_freq());
    let delta = (mel_high - mel_low) / (num_mels + 1) as f64;

    let bin_mels: Vec<f64> = (0..n_stft)
        .map(|i| hz_to_mel(fft_bin_width * i as f64))
        .collect();

    let mut bank = Array2::zeros((num_mels, n_stft));
    for (b, mut row) in bank.outer_iter_mut().enumerate() {
        let left = mel_low + b as f64 * delta;
        let center = left + delta;
        let right = center + delta;

        for (w, &mel) in row.iter_mut().zip(&bin_mels) {
            if mel > left && mel < right {
                *w = if mel <= center {
                    (mel - left) / (center - left)
                } else {
                    (right - mel) / (right - center)
                };
            }
        }
    }
    bank
}

/// Projects power spectra onto the mel filters and takes a floored log.
#[derive(Debug, Clone)]
pub struct MelProjector {
    filters: Array2<f64>,
    eps: f64,
}

impl MelProjector {
    pub fn new(filters: Array2<f64>, eps: f64) -> Self {
        Self { filters, eps }
    }

    /// The `[num_mel_bins, n_stft]` filter matrix.
    pub fn filters(&self) -> &Array2<f64> {
        &self.filters
    }

    /// Maps `[frames, n_stft]` power to `[frames, dim]` log-mel features.
    ///
    /// When `log_energy` is given, it becomes column 0 and the mel bins
    /// follow, so `dim = num_mel_bins + 1`.
    pub fn project(
        &self,
        power: ArrayView2<f64>,
        log_energy: Option<ArrayView1<f64>>,
    ) -> Array2<f32> {
        let mel = power.dot(&self.filters.t());
        let offset = usize::from(log_energy.is_some());
        let mut out = Array2::zeros((mel.nrows(), mel.ncols() + offset));

        for (t, mut row) in out.outer_iter_mut().enumerate() {
            if let Some(energy) = &log_energy {
                row[0] = energy[t] as f32;
            }
            for (m, &v) in mel.row(t).iter().enumerate() {
                row[m + offset] = v.max(self.eps).ln() as f32;
            }
        }
        out
    }
}
