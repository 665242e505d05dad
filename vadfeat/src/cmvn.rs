//! Global mean/variance normalization with precomputed statistics.
//!
//! Statistics are two rows of equal length: row 0 is the negated mean
//! (added), row 1 the inverse standard deviation (multiplied). The order is
//! fixed: `out = (in + shift) * scale`.
//!
//! Statistics are usually shipped as a Kaldi nnet1 `am.mvn` file:
//!
//! ```text
//! <Nnet>
//! <Splice> 400 400
//! [ 0 ]
//! <AddShift> 400 400
//! <LearnRateCoef> 0 [ -8.31 -8.60 ... ]
//! <Rescale> 400 400
//! <LearnRateCoef> 0 [ 0.155 0.154 ... ]
//! </Nnet>
//! ```

use std::path::Path;

use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

/// Standard deviation floor used by [`Cmvn::fit`].
const STD_FLOOR: f64 = 1e-10;

/// Precomputed CMVN statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Cmvn {
    shift: Array1<f32>,
    scale: Array1<f32>,
}

#[derive(Serialize, Deserialize)]
struct CmvnFile {
    shift: Vec<f32>,
    scale: Vec<f32>,
}

impl Cmvn {
    /// Builds from a `[2, D]` matrix (row 0 shift, row 1 scale).
    pub fn new(stats: Array2<f32>) -> Result<Self> {
        if stats.nrows() != 2 {
            return Err(FeatureError::InvalidCmvn(format!(
                "expected 2 rows, got {}",
                stats.nrows()
            )));
        }
        Self::from_shift_scale(stats.row(0).to_vec(), stats.row(1).to_vec())
    }

    /// Builds from the negated mean and the inverse standard deviation.
    pub fn from_shift_scale(shift: Vec<f32>, scale: Vec<f32>) -> Result<Self> {
        if shift.is_empty() {
            return Err(FeatureError::InvalidCmvn("empty statistics".into()));
        }
        if shift.len() != scale.len() {
            return Err(FeatureError::InvalidCmvn(format!(
                "shift has {} values but scale has {}",
                shift.len(),
                scale.len()
            )));
        }
        if shift.iter().chain(&scale).any(|v| !v.is_finite()) {
            return Err(FeatureError::InvalidCmvn("non-finite value".into()));
        }
        Ok(Self {
            shift: Array1::from(shift),
            scale: Array1::from(scale),
        })
    }

    /// Identity statistics (shift 0, scale 1).
    pub fn identity(dim: usize) -> Self {
        Self {
            shift: Array1::zeros(dim),
            scale: Array1::ones(dim),
        }
    }

    /// Measures `-mean` and `1 / std` per column of `[frames, D]` features.
    pub fn fit(feats: ArrayView2<f32>) -> Result<Self> {
        let n = feats.nrows();
        if n == 0 {
            return Err(FeatureError::InvalidCmvn("cannot fit on zero frames".into()));
        }
        let feats = feats.mapv(f64::from);
        let mean = feats.sum_axis(Axis(0)) / n as f64;
        let var = (&feats - &mean).mapv(|d| d * d).sum_axis(Axis(0)) / n as f64;

        let shift = mean.iter().map(|&m| -m as f32).collect();
        let scale = var
            .iter()
            .map(|&v| (1.0 / v.sqrt().max(STD_FLOOR)) as f32)
            .collect();
        Self::from_shift_scale(shift, scale)
    }

    /// Parses a Kaldi nnet1 `am.mvn` document.
    pub fn from_kaldi_mvn(text: &str) -> Result<Self> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let shift = kaldi_vector(&tokens, "<AddShift>")?;
        let scale = kaldi_vector(&tokens, "<Rescale>")?;
        Self::from_shift_scale(shift, scale)
    }

    /// Parses `{"shift": [...], "scale": [...]}`.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let file: CmvnFile = serde_json::from_str(s)?;
        Self::from_shift_scale(file.shift, file.scale)
    }

    /// Serializes to the JSON layout read by [`Cmvn::from_json_str`].
    pub fn to_json_string(&self) -> Result<String> {
        let file = CmvnFile {
            shift: self.shift.to_vec(),
            scale: self.scale.to_vec(),
        };
        Ok(serde_json::to_string(&file)?)
    }

    /// Loads a statistics file: `.json` as JSON, anything else as Kaldi
    /// `am.mvn`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&text)
        } else {
            Self::from_kaldi_mvn(&text)
        }
    }

    /// Feature width the statistics apply to.
    pub fn dim(&self) -> usize {
        self.shift.len()
    }

    pub fn shift(&self) -> &Array1<f32> {
        &self.shift
    }

    pub fn scale(&self) -> &Array1<f32> {
        &self.scale
    }

    /// The statistics as a `[2, D]` matrix.
    pub fn stats(&self) -> Array2<f32> {
        Array2::from_shape_fn((2, self.dim()), |(r, c)| {
            if r == 0 { self.shift[c] } else { self.scale[c] }
        })
    }

    /// Normalizes `[B, T, D]` features in place.
    pub fn apply(&self, feats: &mut Array3<f32>) -> Result<()> {
        let got = feats.len_of(Axis(2));
        if got != self.dim() {
            return Err(FeatureError::CmvnDimension {
                expected: self.dim(),
                got,
            });
        }
        *feats += &self.shift;
        *feats *= &self.scale;
        Ok(())
    }
}

/// Finds `name` and returns the bracketed vector that follows it.
fn kaldi_vector(tokens: &[&str], name: &str) -> Result<Vec<f32>> {
    let start = tokens
        .iter()
        .position(|&t| t == name)
        .ok_or_else(|| FeatureError::InvalidCmvn(format!("missing {name}")))?;
    let open = tokens[start..]
        .iter()
        .position(|&t| t == "[")
        .map(|i| start + i + 1)
        .ok_or_else(|| FeatureError::InvalidCmvn(format!("{name}: missing '['")))?;

    let mut values = Vec::new();
    for &tok in &tokens[open..] {
        if tok == "]" {
            return Ok(values);
        }
        let v = tok
            .parse::<f32>()
            .map_err(|e| FeatureError::InvalidCmvn(format!("{name}: bad value {tok:?}: {e}")))?;
        values.push(v);
    }
    Err(FeatureError::InvalidCmvn(format!("{name}: missing ']'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const AM_MVN: &str = "<Nnet>
<Splice> 3 3
[ 0 ]
<AddShift> 3 3
<LearnRateCoef> 0 [ -1.5 2 0.25 ]
<Rescale> 3 3
<LearnRateCoef> 0 [ 0.5 1 4 ]
</Nnet>
";

    #[test]
    fn add_then_multiply() {
        let cmvn = Cmvn::new(array![[1.0, -2.0], [2.0, 0.5]]).unwrap();
        let mut feats = Array3::from_shape_vec((1, 2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        cmvn.apply(&mut feats).unwrap();
        assert_eq!(feats.iter().copied().collect::<Vec<_>>(), vec![4.0, 0.0, 8.0, 1.0]);
    }

    #[test]
    fn fit_gives_zero_mean_unit_variance() {
        let mut rng = StdRng::seed_from_u64(3);
        let feats = Array2::from_shape_fn((500, 4), |(_, d)| {
            (d as f32 + 1.0) * 3.0 * rng.gen_range(-1.0f32..1.0) + 10.0 * d as f32
        });
        let cmvn = Cmvn::fit(feats.view()).unwrap();

        let mut batch = feats.clone().insert_axis(Axis(0));
        cmvn.apply(&mut batch).unwrap();
        let normed = batch.index_axis(Axis(0), 0).mapv(f64::from);
        for col in normed.columns() {
            let mean = col.mean().unwrap();
            let var = col.mapv(|v| (v - mean) * (v - mean)).mean().unwrap();
            assert!(mean.abs() < 1e-4, "mean {mean}");
            assert!((var - 1.0).abs() < 1e-3, "var {var}");
        }
    }

    #[test]
    fn fit_floors_constant_columns() {
        let cmvn = Cmvn::fit(array![[2.0f32], [2.0]].view()).unwrap();
        assert_eq!(cmvn.shift()[0], -2.0);
        assert!(cmvn.scale()[0].is_finite());
        assert!(Cmvn::fit(Array2::<f32>::zeros((0, 3)).view()).is_err());
    }

    #[test]
    fn parses_kaldi_mvn() {
        let cmvn = Cmvn::from_kaldi_mvn(AM_MVN).unwrap();
        assert_eq!(cmvn.dim(), 3);
        assert_eq!(cmvn.stats(), array![[-1.5f32, 2.0, 0.25], [0.5, 1.0, 4.0]]);
    }

    #[test]
    fn rejects_malformed_kaldi_mvn() {
        let no_rescale = AM_MVN.replace("<Rescale>", "<Other>");
        assert!(matches!(
            Cmvn::from_kaldi_mvn(&no_rescale),
            Err(FeatureError::InvalidCmvn(_))
        ));
        let bad_value = AM_MVN.replace("0.25", "abc");
        assert!(Cmvn::from_kaldi_mvn(&bad_value).is_err());
        let unterminated = "<AddShift> 1 1 <LearnRateCoef> 0 [ 1.0";
        assert!(Cmvn::from_kaldi_mvn(unterminated).is_err());
    }

    #[test]
    fn rejects_inconsistent_stats() {
        assert!(Cmvn::new(Array2::zeros((3, 4))).is_err());
        assert!(Cmvn::from_shift_scale(vec![1.0], vec![1.0, 2.0]).is_err());
        assert!(Cmvn::from_shift_scale(vec![], vec![]).is_err());
        assert!(Cmvn::from_shift_scale(vec![f32::NAN], vec![1.0]).is_err());
    }

    #[test]
    fn dimension_checked_on_apply() {
        let cmvn = Cmvn::identity(4);
        let mut feats = Array3::zeros((1, 2, 3));
        assert!(matches!(
            cmvn.apply(&mut feats),
            Err(FeatureError::CmvnDimension { expected: 4, got: 3 })
        ));
    }

    #[test]
    fn json_and_files() {
        let cmvn = Cmvn::from_kaldi_mvn(AM_MVN).unwrap();
        let json = cmvn.to_json_string().unwrap();
        assert_eq!(Cmvn::from_json_str(&json).unwrap(), cmvn);

        let dir = tempfile::tempdir().unwrap();
        let mvn_path = dir.path().join("am.mvn");
        let json_path = dir.path().join("cmvn.json");
        std::fs::write(&mvn_path, AM_MVN).unwrap();
        std::fs::write(&json_path, &json).unwrap();
        assert_eq!(Cmvn::from_file(&mvn_path).unwrap(), cmvn);
        assert_eq!(Cmvn::from_file(&json_path).unwrap(), cmvn);
        assert!(matches!(Cmvn::from_json_str("{}"), Err(FeatureError::Json(_))));
    }
}
