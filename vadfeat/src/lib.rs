//! Streaming acoustic front-end for FSMN voice activity detection.
//!
//! # Pipeline
//!
//! ```text
//! waveform [B, N] in [-1, 1]
//!   -> * 2^15
//!   -> log mel filterbank       [B, T, 80]
//!   -> replicate edge frames    [B, T + first + last, 80]
//!   -> LFR stacking (m = 5)     [B, T + first + last - 4, 400]
//!   -> CMVN (x + shift) * scale [B, T + first + last - 4, 400]
//! ```
//!
//! The filterbank follows Kaldi's `compute-fbank-feats`: DC removal,
//! pre-emphasis 0.97, Hamming window, power spectrum, HTK mel filters and
//! `ln(max(x, eps))`.
//!
//! # Compute modes
//!
//! [`ComputeMode::Native`] uses rustfft over sliding-window frames.
//! [`ComputeMode::GraphCompatible`] uses precomputed DFT matrices and an
//! explicit gather index, mirroring what a static inference graph can
//! express. Both produce the same features to within float rounding.
//!
//! # Streaming
//!
//! [`StreamingFrontEnd`] keeps no state. Callers pass a [`Padding`] with each
//! chunk ([`Padding::for_position`] gives the usual values) and overlap the
//! audio of middle chunks themselves.
//!
//! ```no_run
//! use giztoy_vadfeat::{Cmvn, FrontEndConfig, Padding, StreamingFrontEnd};
//!
//! let cmvn = Cmvn::from_file("am.mvn")?;
//! let fe = StreamingFrontEnd::new(FrontEndConfig::default(), cmvn)?;
//! let wave = giztoy_vadfeat::pcm::waveform_from_pcm16le(&std::fs::read("speech.pcm")?);
//! let feats = fe.compute(wave.view(), Padding::new(2, 2))?;
//! assert_eq!(feats.shape()[2], 400);
//! # Ok::<(), giztoy_vadfeat::FeatureError>(())
//! ```

mod cmvn;
mod config;
mod error;
pub mod fbank;
mod frontend;
mod lfr;
pub mod pcm;

pub use cmvn::Cmvn;
pub use config::{round_up_to_power_of_two, ComputeMode, FilterbankConfig, FrontEndConfig, Geometry};
pub use error::{FeatureError, Result};
pub use fbank::{Filterbank, WindowType};
pub use frontend::{replicate_pad, ChunkPosition, Padding, StreamingFrontEnd, WAVEFORM_SCALE};
pub use lfr::{LfrStacker, LFR_M};
