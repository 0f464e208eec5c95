//! Magnitude spectrograms and where they come from.
//!
//! A [`Spectrogram`] is a K×N matrix of non-negative bin magnitudes whose
//! entries never drop below [`EPS`]. Spectrograms are produced elsewhere
//! (STFT is not part of this crate) and handed out by a
//! [`SpectrogramStore`] keyed by source and window size.

mod store;

pub use store::{MemoryStore, NpyStore, SpectrogramKey, SpectrogramStore};

use ndarray::{Array2, ArrayView2, s};

use crate::{Error, Result};

/// Floor added to every denominator and kept under every magnitude (2^-52).
pub const EPS: f64 = f64::EPSILON;

/// Immutable non-negative magnitude spectrogram (bins × frames).
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    data: Array2<f64>,
}

impl Spectrogram {
    /// Wrap a magnitude matrix, lifting entries below [`EPS`] to the floor.
    ///
    /// Negative or non-finite entries are rejected.
    pub fn new(mut data: Array2<f64>) -> Result<Self> {
        if let Some(((row, col), &value)) = data
            .indexed_iter()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(Error::NegativeInput { row, col, value });
        }
        data.mapv_inplace(|v| v.max(EPS));
        Ok(Self { data })
    }

    /// Build from raw STFT magnitudes the way the cache files are written:
    /// `|x| + EPS`.
    pub fn from_magnitude(data: Array2<f64>) -> Result<Self> {
        Self::new(data.mapv(|v| v.abs() + EPS))
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.data
    }

    /// Number of frequency bins (K).
    pub fn n_bins(&self) -> usize {
        self.data.nrows()
    }

    /// Number of time frames (N).
    pub fn n_frames(&self) -> usize {
        self.data.ncols()
    }

    /// View of `len` frames starting at `start`.
    pub fn frames(&self, start: usize, len: usize) -> Result<ArrayView2<'_, f64>> {
        let end = start.checked_add(len).filter(|&e| e <= self.n_frames());
        match end {
            Some(end) => Ok(self.data.slice(s![.., start..end])),
            None => Err(Error::ShapeMismatch {
                expected: format!("frames {}..{} within {}", start, start + len, self.n_frames()),
                got: format!("{} frames", self.n_frames()),
            }),
        }
    }
}
