//! PCM16 ingestion.

use ndarray::{Array1, Array2, Axis};

use crate::error::{FeatureError, Result};

/// Decodes little-endian 16-bit PCM into a `[1, n]` waveform in `[-1, 1)`.
///
/// A trailing odd byte is ignored.
pub fn waveform_from_pcm16le(audio: &[u8]) -> Array2<f32> {
    let samples: Array1<f32> = audio
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect();
    samples.insert_axis(Axis(0))
}

/// Stacks equal-length channels into a `[channels, samples]` batch.
pub fn batch_from_channels<C: AsRef<[f32]>>(channels: &[C]) -> Result<Array2<f32>> {
    let len = channels.first().map_or(0, |c| c.as_ref().len());
    let mut batch = Array2::zeros((channels.len(), len));
    for (row, (mut dst, ch)) in batch.outer_iter_mut().zip(channels).enumerate() {
        let ch = ch.as_ref();
        if ch.len() != len {
            return Err(FeatureError::RaggedBatch {
                row,
                expected: len,
                got: ch.len(),
            });
        }
        dst.assign(&ndarray::aview1(ch));
    }
    Ok(batch)
}
