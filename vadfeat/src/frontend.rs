//! Streaming front-end: waveform chunk -> normalized LFR features.
//!
//! The front-end keeps no state between calls. Continuity across chunks is
//! expressed only through the [`Padding`] the caller passes with each chunk:
//! the first/last log-mel frame is replicated that many times before LFR
//! stacking, so the 5-frame stacking window stays full at stream edges.

use ndarray::{s, Array3, ArrayView2, ArrayView3, ArrayViewD, Axis, Ix2};
use rand::Rng;
use tracing::{debug, trace};

use crate::cmvn::Cmvn;
use crate::config::{ComputeMode, FrontEndConfig};
use crate::error::{FeatureError, Result};
use crate::fbank::Filterbank;
use crate::lfr::LfrStacker;

/// Scale from `[-1, 1]` floats to the 16-bit amplitude domain the filter
/// weights and CMVN statistics were derived against.
pub const WAVEFORM_SCALE: f32 = (1 << 15) as f32;

/// Edge-replication counts, in log-mel frames, for one chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Padding {
    pub first: usize,
    pub last: usize,
}

impl Padding {
    pub const NONE: Padding = Padding { first: 0, last: 0 };

    pub const fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }

    /// Conventional padding for a chunk at `position`, using the LFR
    /// look-back of 2 frames.
    pub fn for_position(position: ChunkPosition) -> Self {
        let ctx = LfrStacker::default().left_context();
        match position {
            ChunkPosition::First => Self::new(ctx, 0),
            ChunkPosition::Middle => Self::NONE,
            ChunkPosition::Last => Self::new(0, ctx),
            ChunkPosition::Whole => Self::new(ctx, ctx),
        }
    }
}

/// Where a chunk sits in its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPosition {
    /// Opens the stream; more chunks follow.
    First,
    /// Neither first nor last. The caller overlaps audio with its
    /// neighbours to keep LFR context.
    Middle,
    /// Closes the stream.
    Last,
    /// The whole stream in one chunk.
    Whole,
}

/// Replicates the first frame `padding.first` times and the last frame
/// `padding.last` times along the frame axis of `[B, T, D]`.
pub fn replicate_pad(feats: ArrayView3<f32>, padding: Padding) -> Result<Array3<f32>> {
    let (batch, t, dim) = feats.dim();
    if padding == Padding::NONE {
        return Ok(feats.to_owned());
    }
    if t == 0 {
        return Err(FeatureError::InsufficientFrames {
            required: 1,
            available: 0,
        });
    }

    let first = padding.first;
    let mut out = Array3::zeros((batch, first + t + padding.last, dim));
    out.slice_mut(s![.., first..first + t, ..]).assign(&feats);

    let head = feats.slice(s![.., 0..1, ..]);
    let tail = feats.slice(s![.., t - 1..t, ..]);
    out.slice_mut(s![.., ..first, ..]).assign(&head);
    out.slice_mut(s![.., first + t.., ..]).assign(&tail);
    Ok(out)
}

/// Waveform chunk to normalized, LFR-stacked features.
///
/// Output shape is `[batch, frames + first + last - 4, 5 * feature_dim]`.
#[derive(Debug)]
pub struct StreamingFrontEnd {
    fbank: Filterbank,
    lfr: LfrStacker,
    cmvn: Cmvn,
}

impl StreamingFrontEnd {
    /// Builds the front-end. Fails on an invalid filterbank config, an LFR
    /// block other than 5, or CMVN statistics of the wrong width.
    pub fn new(cfg: FrontEndConfig, cmvn: Cmvn) -> Result<Self> {
        let lfr = LfrStacker::new(cfg.lfr_m)?;
        let fbank = Filterbank::with_mode(cfg.fbank, cfg.mode)?;

        let expected = lfr.block_size() * fbank.feature_dim();
        if cmvn.dim() != expected {
            return Err(FeatureError::CmvnDimension {
                expected,
                got: cmvn.dim(),
            });
        }

        debug!(
            output_dim = expected,
            mode = ?fbank.mode(),
            "vadfeat: front-end ready"
        );
        Ok(Self { fbank, lfr, cmvn })
    }

    pub fn filterbank(&self) -> &Filterbank {
        &self.fbank
    }

    pub fn cmvn(&self) -> &Cmvn {
        &self.cmvn
    }

    pub fn mode(&self) -> ComputeMode {
        self.fbank.mode()
    }

    /// Width of one output frame (`5 * feature_dim`).
    pub fn output_dim(&self) -> usize {
        self.cmvn.dim()
    }

    /// Output frames for a chunk of `num_samples` with `padding`, or `None`
    /// exactly when [`Self::compute`] would reject the chunk for its length.
    pub fn output_frames(&self, num_samples: usize, padding: Padding) -> Option<usize> {
        let frames = self.fbank.num_frames(num_samples);
        if frames == 0 {
            return None;
        }
        self.lfr
            .output_frames(frames + padding.first + padding.last)
    }

    /// Computes features for a `[batch, samples]` chunk in `[-1, 1]`.
    pub fn compute(&self, waveform: ArrayView2<f32>, padding: Padding) -> Result<Array3<f32>> {
        self.compute_with_rng(waveform, padding, &mut rand::thread_rng())
    }

    /// Like [`Self::compute`], for waveforms of unchecked rank.
    pub fn compute_dyn(&self, waveform: ArrayViewD<f32>, padding: Padding) -> Result<Array3<f32>> {
        let got = waveform.ndim();
        let waveform = waveform
            .into_dimensionality::<Ix2>()
            .map_err(|_| FeatureError::Shape { expected: 2, got })?;
        self.compute(waveform, padding)
    }

    /// Like [`Self::compute`], using `rng` for dither.
    pub fn compute_with_rng<R: Rng + ?Sized>(
        &self,
        waveform: ArrayView2<f32>,
        padding: Padding,
        rng: &mut R,
    ) -> Result<Array3<f32>> {
        let scaled = waveform.mapv(|v| v * WAVEFORM_SCALE);
        let feats = self.fbank.compute_with_rng(scaled.view(), rng)?;
        let padded = replicate_pad(feats.view(), padding)?;
        let mut out = self.lfr.stack(padded.view())?;
        self.cmvn.apply(&mut out)?;

        trace!(
            batch = waveform.len_of(Axis(0)),
            samples = waveform.len_of(Axis(1)),
            fbank_frames = feats.len_of(Axis(1)),
            first = padding.first,
            last = padding.last,
            out_frames = out.len_of(Axis(1)),
            "vadfeat: chunk"
        );
        Ok(out)
    }
}
