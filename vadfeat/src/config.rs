//! Front-end configuration and the geometry derived from it.
//!
//! Field names and defaults follow Kaldi's `FbankOptions`, so a config dumped
//! from a Kaldi/FunASR recipe can be loaded as-is from YAML or JSON.

use std::path::Path;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{FeatureError, Result};
use crate::fbank::WindowType;

/// Filterbank parameters. Immutable once handed to a [`crate::Filterbank`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterbankConfig {
    /// Input sample rate in Hz (default: 16000).
    pub sample_rate: u32,
    /// Number of triangular mel filters (default: 80).
    pub num_mel_bins: usize,
    /// Frame length in milliseconds (default: 25).
    pub frame_length_ms: f64,
    /// Frame shift in milliseconds (default: 10).
    pub frame_shift_ms: f64,
    /// Pre-emphasis coefficient; `<= 0` disables it (default: 0.97).
    pub preemph_coeff: f64,
    /// Gaussian dither amplitude; 0 disables it (default: 1.0).
    pub dither: f64,
    /// Window function (default: Hamming).
    pub window: WindowType,
    /// Subtract each frame's mean before pre-emphasis (default: true).
    pub remove_dc_offset: bool,
    /// Round the FFT size up to a power of two (default: true).
    pub round_to_power_of_two: bool,
    /// Only emit frames fully inside the waveform (default: true).
    pub snip_edges: bool,
    /// Prepend a log-energy feature (default: false).
    pub use_energy: bool,
    /// Measure energy before pre-emphasis and windowing (default: true).
    pub raw_energy: bool,
    /// Lower bound applied to log-energy when positive (default: 0).
    pub log_energy_floor: f64,
    /// Lowest mel filter edge in Hz (default: 20).
    pub low_freq: f64,
    /// Highest mel filter edge in Hz; any value `<= 0` means Nyquist
    /// (default: 0).
    pub high_freq: f64,
    /// Clamp floor applied before every logarithm (default: f32 epsilon).
    pub eps: f64,
}

impl Default for FilterbankConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            num_mel_bins: 80,
            frame_length_ms: 25.0,
            frame_shift_ms: 10.0,
            preemph_coeff: 0.97,
            dither: 1.0,
            window: WindowType::Hamming,
            remove_dc_offset: true,
            round_to_power_of_two: true,
            snip_edges: true,
            use_energy: false,
            raw_energy: true,
            log_energy_floor: 0.0,
            low_freq: 20.0,
            high_freq: 0.0,
            eps: f32::EPSILON as f64,
        }
    }
}

impl FilterbankConfig {
    /// Settings used by the FSMN-VAD streaming model (8 kHz or 16 kHz):
    /// 80 bins, 25/10 ms Hamming frames, no dither, snipped edges.
    pub fn fsmn_vad(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            dither: 0.0,
            ..Self::default()
        }
    }

    /// Nyquist frequency in Hz.
    pub fn nyquist(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }

    /// Resolves `high_freq`: non-positive values select Nyquist.
    pub fn resolved_high_freq(&self) -> f64 {
        if self.high_freq > 0.0 {
            self.high_freq
        } else {
            self.nyquist()
        }
    }

    /// Width of one log-mel frame, including the optional energy column.
    pub fn feature_dim(&self) -> usize {
        self.num_mel_bins + usize::from(self.use_energy)
    }

    /// Checks that every derived quantity is well-formed.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(FeatureError::InvalidConfig(msg));

        if self.sample_rate == 0 {
            return bad("sample_rate must be positive".into());
        }
        if self.num_mel_bins == 0 {
            return bad("num_mel_bins must be positive".into());
        }
        if !(self.frame_length_ms > 0.0) || !(self.frame_shift_ms > 0.0) {
            return bad(format!(
                "frame length/shift must be positive, got {}/{} ms",
                self.frame_length_ms, self.frame_shift_ms
            ));
        }
        let g = Geometry::from_config(self);
        if g.win_length == 0 || g.hop_length == 0 {
            return bad(format!(
                "frame geometry rounds to zero samples (win={}, hop={})",
                g.win_length, g.hop_length
            ));
        }
        for (name, v) in [
            ("preemph_coeff", self.preemph_coeff),
            ("dither", self.dither),
            ("log_energy_floor", self.log_energy_floor),
            ("eps", self.eps),
        ] {
            if !v.is_finite() {
                return bad(format!("{name} must be finite, got {v}"));
            }
        }
        if !(self.eps > 0.0) {
            return bad(format!("eps must be positive, got {}", self.eps));
        }
        if self.dither < 0.0 {
            return bad(format!("dither must be non-negative, got {}", self.dither));
        }
        let high = self.resolved_high_freq();
        if self.low_freq < 0.0 || high <= self.low_freq || high > self.nyquist() {
            return bad(format!(
                "mel range [{}, {}] Hz must satisfy 0 <= low < high <= {}",
                self.low_freq,
                high,
                self.nyquist()
            ));
        }
        Ok(())
    }
}

/// Frame and transform sizes derived from a [`FilterbankConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Samples per frame.
    pub win_length: usize,
    /// Samples between frame starts.
    pub hop_length: usize,
    /// Transform size.
    pub n_fft: usize,
    /// Retained spectrum bins (`n_fft / 2`; the Nyquist bin is dropped).
    pub n_stft: usize,
}

impl Geometry {
    pub fn from_config(cfg: &FilterbankConfig) -> Self {
        let sr = cfg.sample_rate as f64;
        let win_length = (cfg.frame_length_ms * sr / 1000.0).round() as usize;
        let hop_length = (cfg.frame_shift_ms * sr / 1000.0).round() as usize;
        let n_fft = if cfg.round_to_power_of_two && win_length > 0 {
            round_up_to_power_of_two(win_length)
        } else {
            win_length
        };
        Self {
            win_length,
            hop_length,
            n_fft,
            n_stft: n_fft / 2,
        }
    }

    /// Number of frames cut from `num_samples` already-padded samples.
    pub fn num_frames(&self, num_samples: usize) -> usize {
        if num_samples < self.win_length {
            0
        } else {
            (num_samples - self.win_length) / self.hop_length + 1
        }
    }
}

/// Returns the smallest power of two `>= n`. `n` must be at least 1.
pub fn round_up_to_power_of_two(n: usize) -> usize {
    debug_assert!(n > 0);
    n.next_power_of_two()
}

/// Selects the spectral and framing strategies at construction time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeMode {
    /// FFT power spectrum over sliding-window frames.
    #[default]
    Native,
    /// DFT-matrix power spectrum over index-gathered frames. Uses only
    /// matmul and gather, so it maps onto static-graph runtimes.
    GraphCompatible,
}

/// Full front-end configuration: filterbank, LFR block and compute mode.
///
/// Fields left out of the `fbank` section take their values from
/// [`FilterbankConfig::fsmn_vad`], so dither stays off unless a file asks
/// for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontEndConfig {
    #[serde(deserialize_with = "fbank_section")]
    pub fbank: FilterbankConfig,
    /// LFR block size. Only 5 is supported.
    pub lfr_m: usize,
    pub mode: ComputeMode,
}

impl Default for FrontEndConfig {
    fn default() -> Self {
        Self {
            fbank: FilterbankConfig::fsmn_vad(16000),
            lfr_m: crate::lfr::LFR_M,
            mode: ComputeMode::Native,
        }
    }
}

/// Overlays a (possibly partial) `fbank` section onto the VAD preset.
fn fbank_section<'de, D: Deserializer<'de>>(
    de: D,
) -> std::result::Result<FilterbankConfig, D::Error> {
    let section = serde_json::Value::deserialize(de)?;
    let mut merged =
        serde_json::to_value(FilterbankConfig::fsmn_vad(16000)).map_err(D::Error::custom)?;
    match (&mut merged, section) {
        (serde_json::Value::Object(fields), serde_json::Value::Object(overrides)) => {
            fields.extend(overrides)
        }
        (_, serde_json::Value::Null) => {}
        (_, other) => {
            return Err(D::Error::custom(format!("fbank must be a map, got {other}")));
        }
    }
    serde_json::from_value(merged).map_err(D::Error::custom)
}

impl FrontEndConfig {
    /// Parses a YAML (or JSON, which is valid YAML) document.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Loads a config file. `.json` files are parsed as JSON, anything else
    /// as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Ok(serde_json::from_str(&data)?)
        } else {
            Self::from_yaml_str(&data)
        }
    }
}
