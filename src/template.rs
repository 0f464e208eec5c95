//! Instrument templates built from isolated-sample spectrograms.
//!
//! Every spectrogram that takes part in a factorization goes through
//! [`log_compress`] first. When interference is requested it is added to the
//! raw magnitudes *before* compression, for the recording and for every
//! instrument alike.

use ndarray::{Array1, Array2, Array3, ArrayView2, Axis, s};
use rand::Rng;

use crate::spectrogram::{EPS, Spectrogram};
use crate::{Error, Result};

/// Fixed compression curve `ln(1 + 10·y)`.
pub fn log_compress(y: &Array2<f64>) -> Array2<f64> {
    y.mapv(|v| (1.0 + 10.0 * v).ln())
}

/// Add a randomly placed window of `noise` to `target`.
///
/// The window start is drawn uniformly from `0..=noise_frames - n - 1`, so the
/// noise recording needs at least `n + 1` frames.
///
/// # Errors
/// [`Error::NoiseTooShort`] if the noise is not long enough, and
/// [`Error::ShapeMismatch`] if the bin counts differ.
pub fn add_noise<R: Rng + ?Sized>(
    target: &Array2<f64>,
    noise: &Spectrogram,
    rng: &mut R,
) -> Result<Array2<f64>> {
    let n = target.ncols();
    if noise.n_bins() != target.nrows() {
        return Err(Error::ShapeMismatch {
            expected: format!("{} bins", target.nrows()),
            got: format!("{} bins", noise.n_bins()),
        });
    }
    if noise.n_frames() < n + 1 {
        return Err(Error::NoiseTooShort {
            noise_frames: noise.n_frames(),
            required: n + 1,
        });
    }
    let start = rng.gen_range(0..=noise.n_frames() - n - 1);
    let window = noise.frames(start, n)?;
    Ok(target + &window)
}

/// Prepared (optionally noised, log-compressed) instrument spectrogram.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentTemplate {
    compressed: Array2<f64>,
}

impl InstrumentTemplate {
    /// Compress an instrument spectrogram as-is.
    pub fn new(spectrogram: &Spectrogram) -> Self {
        Self {
            compressed: log_compress(spectrogram.data()),
        }
    }

    /// Superpose a random noise window, then compress.
    pub fn with_noise<R: Rng + ?Sized>(
        spectrogram: &Spectrogram,
        noise: &Spectrogram,
        rng: &mut R,
    ) -> Result<Self> {
        let noisy = add_noise(spectrogram.data(), noise, rng)?;
        Ok(Self {
            compressed: log_compress(&noisy),
        })
    }

    pub fn compressed(&self) -> &Array2<f64> {
        &self.compressed
    }

    pub fn n_bins(&self) -> usize {
        self.compressed.nrows()
    }

    pub fn n_frames(&self) -> usize {
        self.compressed.ncols()
    }

    /// Mean spectrum over time (length K).
    pub fn template_1d(&self) -> Array1<f64> {
        self.compressed
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::from_elem(self.n_bins(), EPS))
    }

    /// Spectrogram right-padded with [`EPS`] to `t` frames (K × t).
    pub fn template_2d(&self, t: usize) -> Result<Array2<f64>> {
        let n = self.n_frames();
        if t < n {
            return Err(Error::InvalidSize {
                name: "t",
                value: t,
                reason: "shorter than the instrument sample",
            });
        }
        let mut padded = Array2::from_elem((self.n_bins(), t), EPS);
        padded.slice_mut(s![.., ..n]).assign(&self.compressed);
        Ok(padded)
    }
}

fn check_bins(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(Error::ShapeMismatch {
            expected: format!("{} bins", expected),
            got: format!("{} bins", got),
        });
    }
    Ok(())
}

/// Stack 1D templates as columns of a K × R matrix.
pub fn template_matrix(templates: &[InstrumentTemplate]) -> Result<Array2<f64>> {
    let first = templates.first().ok_or(Error::InvalidSize {
        name: "templates",
        value: 0,
        reason: "need at least one instrument",
    })?;
    let k = first.n_bins();
    let mut w = Array2::zeros((k, templates.len()));
    for (r, template) in templates.iter().enumerate() {
        check_bins(k, template.n_bins())?;
        w.column_mut(r).assign(&template.template_1d());
    }
    Ok(w)
}

/// Stack 2D templates into a K × R × T tensor, T being the longest sample.
pub fn template_tensor(templates: &[InstrumentTemplate]) -> Result<Array3<f64>> {
    let first = templates.first().ok_or(Error::InvalidSize {
        name: "templates",
        value: 0,
        reason: "need at least one instrument",
    })?;
    let k = first.n_bins();
    let t = templates.iter().map(InstrumentTemplate::n_frames).max().unwrap_or(0);
    let mut p = Array3::zeros((k, templates.len(), t));
    for (r, template) in templates.iter().enumerate() {
        check_bins(k, template.n_bins())?;
        p.index_axis_mut(Axis(1), r)
            .assign(&template.template_2d(t)?);
    }
    Ok(p)
}

/// First `n` frames of a padded 2D template.
pub fn unpad(template: &Array2<f64>, n: usize) -> ArrayView2<'_, f64> {
    template.slice(s![.., ..n.min(template.ncols())])
}
