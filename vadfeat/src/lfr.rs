//! Low-frame-rate (LFR) stacking.

use ndarray::{s, Array3, ArrayView3};

use crate::error::{FeatureError, Result};

/// The only supported LFR block size.
pub const LFR_M: usize = 5;

/// Concatenates [`LFR_M`] consecutive frames into one wide frame, stride 1.
///
/// `[B, T, D]` becomes `[B, T - 4, 5 * D]`, where output frame `t` is
/// `in[t] ++ in[t+1] ++ in[t+2] ++ in[t+3] ++ in[t+4]`.
#[derive(Debug, Clone, Copy)]
pub struct LfrStacker {
    m: usize,
}

impl LfrStacker {
    /// Creates a stacker. Any block size other than 5 is rejected.
    pub fn new(m: usize) -> Result<Self> {
        if m != LFR_M {
            return Err(FeatureError::UnsupportedLfr(m));
        }
        Ok(Self { m })
    }

    pub fn block_size(&self) -> usize {
        self.m
    }

    /// Look-back in frames (`m / 2`). A streaming caller replicates the first
    /// frame this many times at stream start, and the last at stream end.
    pub fn left_context(&self) -> usize {
        self.m / 2
    }

    /// Output frames for `num_frames` input frames.
    pub fn output_frames(&self, num_frames: usize) -> Option<usize> {
        num_frames.checked_sub(self.m - 1).filter(|&n| n > 0)
    }

    pub fn stack(&self, feats: ArrayView3<f32>) -> Result<Array3<f32>> {
        let (batch, t_in, dim) = feats.dim();
        let t_out = self
            .output_frames(t_in)
            .ok_or(FeatureError::InsufficientFrames {
                required: self.m,
                available: t_in,
            })?;

        let mut out = Array3::zeros((batch, t_out, self.m * dim));
        for k in 0..self.m {
            out.slice_mut(s![.., .., k * dim..(k + 1) * dim])
                .assign(&feats.slice(s![.., k..k + t_out, ..]));
        }
        Ok(out)
    }
}

impl Default for LfrStacker {
    fn default() -> Self {
        Self { m: LFR_M }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(batch: usize, t: usize) -> Array3<f32> {
        Array3::from_shape_fn((batch, t, 1), |(b, i, _)| (b * 100 + i) as f32)
    }

    #[test]
    fn stacks_consecutive_frames() {
        let lfr = LfrStacker::default();
        let out = lfr.stack(ramp(1, 12).view()).unwrap();
        assert_eq!(out.dim(), (1, 8, 5));
        for t in 0..8 {
            let row: Vec<f32> = out.slice(s![0, t, ..]).to_vec();
            let want: Vec<f32> = (t..t + 5).map(|v| v as f32).collect();
            assert_eq!(row, want);
        }
    }

    #[test]
    fn output_length_is_input_minus_four() {
        let lfr = LfrStacker::default();
        for t in 5..40 {
            assert_eq!(lfr.stack(ramp(2, t).view()).unwrap().dim(), (2, t - 4, 5));
        }
    }

    #[test]
    fn wide_frames_keep_block_order() {
        let feats = Array3::from_shape_fn((1, 6, 3), |(_, t, d)| (t * 10 + d) as f32);
        let out = LfrStacker::default().stack(feats.view()).unwrap();
        assert_eq!(out.dim(), (1, 2, 15));
        assert_eq!(
            out.slice(s![0, 1, ..]).to_vec(),
            vec![10., 11., 12., 20., 21., 22., 30., 31., 32., 40., 41., 42., 50., 51., 52.]
        );
    }

    #[test]
    fn batch_rows_stay_separate() {
        let out = LfrStacker::default().stack(ramp(2, 5).view()).unwrap();
        assert_eq!(out.slice(s![1, 0, ..]).to_vec(), vec![100., 101., 102., 103., 104.]);
    }

    #[test]
    fn too_few_frames() {
        let lfr = LfrStacker::default();
        for t in 0..5 {
            assert!(matches!(
                lfr.stack(ramp(1, t).view()),
                Err(FeatureError::InsufficientFrames { required: 5, available }) if available == t
            ));
        }
    }

    #[test]
    fn only_block_five() {
        assert_eq!(LfrStacker::new(5).unwrap().block_size(), 5);
        assert_eq!(LfrStacker::new(5).unwrap().left_context(), 2);
        for m in [0, 1, 3, 6, 7] {
            assert!(matches!(LfrStacker::new(m), Err(FeatureError::UnsupportedLfr(v)) if v == m));
        }
    }
}
