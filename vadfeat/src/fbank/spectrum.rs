//! Power spectrum of windowed frames, by FFT or by DFT matrix multiply.

use std::fmt;
use std::sync::Arc;

use ndarray::{s, Array1, Array2, ArrayView2};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::condition::log_energy;
use super::dft::TransformMatrices;

/// Spectral path. Chosen once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumStrategy {
    /// Planned FFT (rustfft), `|X|` with the Nyquist bin dropped, squared.
    Fft,
    /// `re = x · cos`, `im = x · -sin`, power = `re² + im²`.
    Dft,
}

enum Backend {
    Fft(Arc<dyn Fft<f64>>),
    Dft(TransformMatrices),
}

/// Computes `[frames, n_stft]` power spectra from `[frames, win_length]`.
pub struct SpectralAnalyzer {
    n_fft: usize,
    n_stft: usize,
    backend: Backend,
}

impl fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("n_fft", &self.n_fft)
            .field("n_stft", &self.n_stft)
            .field("strategy", &self.strategy())
            .finish()
    }
}

impl SpectralAnalyzer {
    pub fn new(n_fft: usize, strategy: SpectrumStrategy) -> Self {
        let n_stft = n_fft / 2;
        let backend = match strategy {
            SpectrumStrategy::Fft => {
                Backend::Fft(FftPlanner::<f64>::new().plan_fft_forward(n_fft))
            }
            SpectrumStrategy::Dft => Backend::Dft(TransformMatrices::new(n_fft, n_stft)),
        };
        Self {
            n_fft,
            n_stft,
            backend,
        }
    }

    pub fn strategy(&self) -> SpectrumStrategy {
        match self.backend {
            Backend::Fft(_) => SpectrumStrategy::Fft,
            Backend::Dft(_) => SpectrumStrategy::Dft,
        }
    }

    pub fn n_stft(&self) -> usize {
        self.n_stft
    }

    /// Power spectrum of each frame. Frames shorter than `n_fft` are
    /// zero-padded at the end.
    pub fn power_spectrum(&self, windowed: ArrayView2<f64>) -> Array2<f64> {
        match &self.backend {
            Backend::Fft(fft) => self.power_fft(fft.as_ref(), windowed),
            Backend::Dft(m) => self.power_dft(m, windowed),
        }
    }

    fn power_fft(&self, fft: &dyn Fft<f64>, windowed: ArrayView2<f64>) -> Array2<f64> {
        let mut power = Array2::zeros((windowed.nrows(), self.n_stft));
        let mut buf = vec![Complex::new(0.0, 0.0); self.n_fft];
        let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        for (frame, mut out) in windowed.outer_iter().zip(power.outer_iter_mut()) {
            buf.fill(Complex::new(0.0, 0.0));
            for (b, &x) in buf.iter_mut().zip(frame.iter()) {
                b.re = x;
            }
            fft.process_with_scratch(&mut buf, &mut scratch);
            for (p, c) in out.iter_mut().zip(&buf[..self.n_stft]) {
                let magnitude = c.norm();
                *p = magnitude * magnitude;
            }
        }
        power
    }

    fn power_dft(&self, m: &TransformMatrices, windowed: ArrayView2<f64>) -> Array2<f64> {
        let padded = zero_pad(windowed, self.n_fft);
        let re = padded.dot(&m.real);
        let im = padded.dot(&m.imag);
        &re * &re + &im * &im
    }
}

/// Right-pads each frame with zeros to `n_fft` columns.
fn zero_pad(frames: ArrayView2<f64>, n_fft: usize) -> Array2<f64> {
    let mut padded = Array2::zeros((frames.nrows(), n_fft));
    let width = frames.ncols().min(n_fft);
    padded
        .slice_mut(s![.., ..width])
        .assign(&frames.slice(s![.., ..width]));
    padded
}

/// Windowed log-energy per frame: `ln(max(sum(power), eps))`, floored when
/// `floor > 0`.
pub fn windowed_log_energy(power: ArrayView2<f64>, eps: f64, floor: f64) -> Array1<f64> {
    power
        .outer_iter()
        .map(|row| log_energy(row.sum(), eps, floor))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn assert_close(a: &Array2<f64>, b: &Array2<f64>) {
        assert_eq!(a.dim(), b.dim());
        for ((idx, &x), &y) in a.indexed_iter().zip(b.iter()) {
            let tol = 1e-4 * x.abs().max(y.abs()) + 1e-9;
            assert!((x - y).abs() <= tol, "mismatch at {idx:?}: fft={x} dft={y}");
        }
    }

    fn random_frames(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-32768.0..32768.0))
    }

    #[test]
    fn fft_and_dft_agree() {
        for (win, n_fft) in [(400, 512), (200, 256), (400, 400), (7, 8)] {
            let frames = random_frames(6, win, win as u64);
            let fft = SpectralAnalyzer::new(n_fft, SpectrumStrategy::Fft);
            let dft = SpectralAnalyzer::new(n_fft, SpectrumStrategy::Dft);
            let a = fft.power_spectrum(frames.view());
            let b = dft.power_spectrum(frames.view());
            assert_eq!(a.dim(), (6, n_fft / 2));
            assert_close(&a, &b);
        }
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        // 1 kHz at 16 kHz with n_fft 512 lands exactly on bin 32.
        let frame = Array2::from_shape_fn((1, 512), |(_, n)| {
            (2.0 * std::f64::consts::PI * 1000.0 * n as f64 / 16000.0).sin()
        });
        for strategy in [SpectrumStrategy::Fft, SpectrumStrategy::Dft] {
            let power = SpectralAnalyzer::new(512, strategy).power_spectrum(frame.view());
            let peak = (0..256)
                .max_by(|&a, &b| power[[0, a]].total_cmp(&power[[0, b]]))
                .unwrap();
            assert_eq!(peak, 32, "{strategy:?}");
            // |X[k]| = N/2 for a unit sine on-bin.
            assert!((power[[0, 32]] - 256.0 * 256.0).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_frames_have_zero_power() {
        let frames = Array2::<f64>::zeros((3, 400));
        for strategy in [SpectrumStrategy::Fft, SpectrumStrategy::Dft] {
            let power = SpectralAnalyzer::new(512, strategy).power_spectrum(frames.view());
            assert!(power.iter().all(|&p| p == 0.0));
        }
    }

    #[test]
    fn empty_input() {
        let frames = Array2::<f64>::zeros((0, 400));
        for strategy in [SpectrumStrategy::Fft, SpectrumStrategy::Dft] {
            let analyzer = SpectralAnalyzer::new(512, strategy);
            assert_eq!(analyzer.strategy(), strategy);
            assert_eq!(analyzer.power_spectrum(frames.view()).dim(), (0, 256));
        }
    }

    #[test]
    fn windowed_energy_clamps_and_floors() {
        let power = ndarray::array![[1.0, 2.0], [0.0, 0.0]];
        let e = windowed_log_energy(power.view(), 1e-10, 0.0);
        assert!((e[0] - 3f64.ln()).abs() < 1e-12);
        assert!((e[1] - 1e-10f64.ln()).abs() < 1e-12);

        let floored = windowed_log_energy(power.view(), 1e-10, 2.0);
        assert_eq!(floored[0], 2.0);
        assert_eq!(floored[1], 2.0);
    }
}
