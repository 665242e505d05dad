//! Splits a waveform into overlapping frames.

use ndarray::Array2;

use crate::config::Geometry;
use crate::error::{FeatureError, Result};

/// How frames are cut out of the waveform. Both produce identical frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingStrategy {
    /// Borrowed overlapping windows over the contiguous sample buffer.
    SlidingWindow,
    /// Explicit `start[i] + offset[j]` index table, then a gather.
    IndexGather,
}

/// Cuts `[num_frames, win_length]` frames from one waveform.
#[derive(Debug, Clone)]
pub struct FrameExtractor {
    geometry: Geometry,
    snip_edges: bool,
    strategy: FramingStrategy,
}

impl FrameExtractor {
    pub fn new(geometry: &Geometry, snip_edges: bool, strategy: FramingStrategy) -> Self {
        Self {
            geometry: *geometry,
            snip_edges,
            strategy,
        }
    }

    pub fn strategy(&self) -> FramingStrategy {
        self.strategy
    }

    /// Samples of reflection added on each side when edges are not snipped.
    pub fn edge_padding(&self) -> usize {
        if self.snip_edges { 0 } else { self.geometry.win_length / 2 }
    }

    /// Frame count for a waveform of `num_samples` (before edge padding).
    ///
    /// Zero when edges are kept and the waveform is too short to
    /// reflect-pad; [`Self::extract`] rejects such input.
    pub fn num_frames(&self, num_samples: usize) -> usize {
        let pad = self.edge_padding();
        if pad > 0 && num_samples <= pad {
            return 0;
        }
        self.geometry.num_frames(num_samples + 2 * pad)
    }

    /// Extracts frames, reflect-padding first when edges are not snipped.
    pub fn extract(&self, samples: &[f64]) -> Result<Array2<f64>> {
        let pad = self.edge_padding();
        if pad == 0 {
            return Ok(self.frame(samples));
        }
        let padded = reflect_pad(samples, pad)?;
        Ok(self.frame(&padded))
    }

    fn frame(&self, samples: &[f64]) -> Array2<f64> {
        match self.strategy {
            FramingStrategy::SlidingWindow => self.frame_sliding(samples),
            FramingStrategy::IndexGather => self.frame_gather(samples),
        }
    }

    fn frame_sliding(&self, samples: &[f64]) -> Array2<f64> {
        let Geometry {
            win_length,
            hop_length,
            ..
        } = self.geometry;
        let num_frames = self.geometry.num_frames(samples.len());
        let mut frames = Array2::zeros((num_frames, win_length));
        let windows = samples
            .windows(win_length)
            .step_by(hop_length)
            .take(num_frames);
        for (mut row, window) in frames.outer_iter_mut().zip(windows) {
            row.assign(&ndarray::aview1(window));
        }
        frames
    }

    fn frame_gather(&self, samples: &[f64]) -> Array2<f64> {
        let num_frames = self.geometry.num_frames(samples.len());
        let indices = self.frame_indices(num_frames);
        indices.mapv(|i| samples[i])
    }

    /// `index[i][j] = i * hop_length + j`, shape `[num_frames, win_length]`.
    pub fn frame_indices(&self, num_frames: usize) -> Array2<usize> {
        let offsets = ndarray::Array1::from_iter(0..self.geometry.win_length);
        let starts =
            ndarray::Array1::from_iter((0..num_frames).map(|i| i * self.geometry.hop_length));
        let starts = starts.insert_axis(ndarray::Axis(1));
        &starts + &offsets
    }
}

/// Mirrors `pad` samples onto each side, excluding the edge sample itself:
/// `[a b c d]` padded by 2 becomes `[c b a b c d c b]`.
pub fn reflect_pad(samples: &[f64], pad: usize) -> Result<Vec<f64>> {
    let n = samples.len();
    if pad == 0 {
        return Ok(samples.to_vec());
    }
    if n <= pad {
        return Err(FeatureError::InsufficientSamples {
            required: pad,
            available: n,
        });
    }
    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| samples[i]));
    out.extend_from_slice(samples);
    out.extend((n - 1 - pad..n - 1).rev().map(|i| samples[i]));
    Ok(out)
}
