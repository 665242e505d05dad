//! Kaldi-compatible log mel filterbank extraction.
//!
//! Input is a `[batch, samples]` waveform already in the 16-bit amplitude
//! domain; output is `[batch, frames, num_mel_bins (+1)]`.
//!
//! Per frame: dither -> framing -> DC removal -> (raw energy) ->
//! pre-emphasis -> window -> power spectrum -> (windowed energy) ->
//! mel projection -> `ln(max(x, eps))`.
//!
//! Two interchangeable computation paths are selected by [`ComputeMode`]:
//! FFT over sliding-window frames, or DFT matrices over index-gathered
//! frames. They produce the same features.

mod condition;
mod dft;
mod frames;
mod mel;
mod spectrum;
mod window;

use ndarray::{Array2, Array3, ArrayView2, Axis};
use rand::Rng;
use tracing::debug;

use crate::config::{ComputeMode, FilterbankConfig, Geometry};
use crate::error::Result;

pub use condition::{dither, preemphasize, SignalConditioner};
pub use dft::TransformMatrices;
pub use frames::{reflect_pad, FrameExtractor, FramingStrategy};
pub use mel::{hz_to_mel, mel_filter_bank, mel_to_hz, MelProjector};
pub use spectrum::{windowed_log_energy, SpectralAnalyzer, SpectrumStrategy};
pub use window::WindowType;

impl ComputeMode {
    /// Framing strategy used by this mode.
    pub fn framing(self) -> FramingStrategy {
        match self {
            Self::Native => FramingStrategy::SlidingWindow,
            Self::GraphCompatible => FramingStrategy::IndexGather,
        }
    }

    /// Spectral strategy used by this mode.
    pub fn spectrum(self) -> SpectrumStrategy {
        match self {
            Self::Native => SpectrumStrategy::Fft,
            Self::GraphCompatible => SpectrumStrategy::Dft,
        }
    }
}

/// Log mel filterbank extractor. All buffers are built in the constructor
/// and never mutated, so one instance can serve many threads.
#[derive(Debug)]
pub struct Filterbank {
    cfg: FilterbankConfig,
    geometry: Geometry,
    mode: ComputeMode,
    frames: FrameExtractor,
    conditioner: SignalConditioner,
    spectrum: SpectralAnalyzer,
    projector: MelProjector,
}

impl Filterbank {
    /// Creates an extractor using the native (FFT) path.
    pub fn new(cfg: FilterbankConfig) -> Result<Self> {
        Self::with_mode(cfg, ComputeMode::Native)
    }

    /// Creates an extractor using the given compute mode.
    pub fn with_mode(cfg: FilterbankConfig, mode: ComputeMode) -> Result<Self> {
        cfg.validate()?;
        let geometry = Geometry::from_config(&cfg);
        let window = cfg.window.coefficients(geometry.win_length);
        let filters = mel_filter_bank(&cfg, &geometry);

        debug!(
            sample_rate = cfg.sample_rate,
            win_length = geometry.win_length,
            hop_length = geometry.hop_length,
            n_fft = geometry.n_fft,
            num_mel_bins = cfg.num_mel_bins,
            ?mode,
            "fbank: built filterbank"
        );

        Ok(Self {
            frames: FrameExtractor::new(&geometry, cfg.snip_edges, mode.framing()),
            conditioner: SignalConditioner::new(&cfg, window),
            spectrum: SpectralAnalyzer::new(geometry.n_fft, mode.spectrum()),
            projector: MelProjector::new(filters, cfg.eps),
            geometry,
            mode,
            cfg,
        })
    }

    pub fn config(&self) -> &FilterbankConfig {
        &self.cfg
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn mode(&self) -> ComputeMode {
        self.mode
    }

    /// Width of one output frame.
    pub fn feature_dim(&self) -> usize {
        self.cfg.feature_dim()
    }

    /// The `[num_mel_bins, n_stft]` mel filter matrix.
    pub fn mel_filters(&self) -> &Array2<f64> {
        self.projector.filters()
    }

    /// The window coefficients, length `win_length`.
    pub fn window(&self) -> &ndarray::Array1<f64> {
        self.conditioner.window()
    }

    /// Frames produced from a waveform of `num_samples`.
    pub fn num_frames(&self, num_samples: usize) -> usize {
        self.frames.num_frames(num_samples)
    }

    /// Extracts features, dithering with the thread-local RNG when dither is
    /// enabled.
    pub fn compute(&self, waveform: ArrayView2<f32>) -> Result<Array3<f32>> {
        self.compute_with_rng(waveform, &mut rand::thread_rng())
    }

    /// Extracts features using `rng` for dither.
    pub fn compute_with_rng<R: Rng + ?Sized>(
        &self,
        waveform: ArrayView2<f32>,
        rng: &mut R,
    ) -> Result<Array3<f32>> {
        let (batch, num_samples) = waveform.dim();
        let num_frames = self.num_frames(num_samples);
        let mut out = Array3::zeros((batch, num_frames, self.feature_dim()));

        for (row, mut dst) in waveform.outer_iter().zip(out.axis_iter_mut(Axis(0))) {
            let samples: Vec<f64> = row.iter().map(|&s| s as f64).collect();
            let feats = self.compute_one(samples, rng)?;
            dst.assign(&feats);
        }
        Ok(out)
    }

    /// Extracts `[frames, feature_dim]` from a single waveform.
    pub fn compute_one<R: Rng + ?Sized>(
        &self,
        mut samples: Vec<f64>,
        rng: &mut R,
    ) -> Result<Array2<f32>> {
        dither(&mut samples, self.cfg.dither, rng);

        let mut frames = self.frames.extract(&samples)?;
        let raw_energy = self.conditioner.condition(&mut frames);
        let power = self.spectrum.power_spectrum(frames.view());

        let energy = if !self.cfg.use_energy {
            None
        } else if self.cfg.raw_energy {
            raw_energy
        } else {
            Some(windowed_log_energy(
                power.view(),
                self.cfg.eps,
                self.cfg.log_energy_floor,
            ))
        };

        Ok(self.projector.project(power.view(), energy.as_ref().map(|e| e.view())))
    }
}
