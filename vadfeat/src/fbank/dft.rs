//! Explicit DFT projection matrices.
//!
//! `X[k] = sum_n x[n] * exp(-2πi·k·n / N)` written as two real matmuls, so
//! a runtime with only elementary linear algebra can compute the same
//! spectrum as an FFT. Only `k < N/2` is kept (Nyquist dropped).

use std::f64::consts::PI;

use ndarray::Array2;

/// Cosine and negated sine matrices, each `[n_fft, n_stft]`.
#[derive(Debug, Clone)]
pub struct TransformMatrices {
    /// `cos(2πkn / n_fft)`.
    pub real: Array2<f64>,
    /// `-sin(2πkn / n_fft)`.
    pub imag: Array2<f64>,
}

impl TransformMatrices {
    pub fn new(n_fft: usize, n_stft: usize) -> Self {
        let angle = |n: usize, k: usize| {
            // Reduce k·n mod N first so large products keep full precision.
            2.0 * PI * ((k * n) % n_fft) as f64 / n_fft as f64
        };
        Self {
            real: Array2::from_shape_fn((n_fft, n_stft), |(n, k)| angle(n, k).cos()),
            imag: Array2::from_shape_fn((n_fft, n_stft), |(n, k)| -angle(n, k).sin()),
        }
    }

    pub fn n_fft(&self) -> usize {
        self.real.nrows()
    }

    pub fn n_stft(&self) -> usize {
        self.real.ncols()
    }
}
