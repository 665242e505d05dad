//! Frame window functions.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Window applied to each frame after pre-emphasis.
///
/// All variants are symmetric (`periodic = false`), matching Kaldi.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    #[default]
    Hamming,
    Hann,
    /// Kaldi's default for ASR: `hann^0.85`.
    Povey,
    Rectangular,
}

impl WindowType {
    /// Produces `n` window coefficients.
    pub fn coefficients(self, n: usize) -> Vec<f64> {
        if n <= 1 {
            return vec![1.0; n];
        }
        let a = 2.0 * PI / (n - 1) as f64;
        (0..n)
            .map(|i| {
                let c = (a * i as f64).cos();
                match self {
                    Self::Hamming => 0.54 - 0.46 * c,
                    Self::Hann => 0.5 - 0.5 * c,
                    Self::Povey => (0.5 - 0.5 * c).powf(0.85),
                    Self::Rectangular => 1.0,
                }
            })
            .collect()
    }
}
