//! Template-seeded NMF and NMFD.
//!
//! Both solvers minimise a KL-style reconstruction error with Lee–Seung
//! multiplicative updates, so every template and activation entry stays
//! non-negative without clipping. Every division adds [`EPS`] to its
//! denominator.
//!
//! The solvers stop early once the 2-norms of both the template step and the
//! activation step fall below [`FactorizeOptions::threshold`], otherwise after
//! [`FactorizeOptions::max_iter`] iterations.

mod nmf;
mod nmfd;
mod policy;
mod shift;

pub use nmf::nmf;
pub use nmfd::nmfd;
pub use shift::{conv_model, shift};

use ndarray::{Array1, Array2, Array3, ArrayView2, s};
use rand::Rng;

use crate::config::{FixW, InitH, Params};
use crate::spectrogram::EPS;
use crate::{Error, Result};

/// Solver settings, usually derived from [`Params`].
#[derive(Debug, Clone, PartialEq)]
pub struct FactorizeOptions {
    pub fix_w: FixW,
    /// Extra all-ones template components appended after the instruments.
    pub added_comp_w: usize,
    pub init_h: InitH,
    pub max_iter: usize,
    pub threshold: f64,
}

impl From<&Params> for FactorizeOptions {
    fn from(params: &Params) -> Self {
        Self {
            fix_w: params.fix_w,
            added_comp_w: params.added_comp_w,
            init_h: params.init_h,
            max_iter: params.iteration_cap(),
            threshold: params.threshold,
        }
    }
}

/// Template data, flat (K×R) for NMF or convolutive (K×R×T) for NMFD.
#[derive(Debug, Clone, PartialEq)]
pub enum Templates {
    Flat(Array2<f64>),
    Convolutive(Array3<f64>),
}

impl Templates {
    pub fn n_bins(&self) -> usize {
        match self {
            Templates::Flat(w) => w.nrows(),
            Templates::Convolutive(p) => p.dim().0,
        }
    }

    pub fn n_components(&self) -> usize {
        match self {
            Templates::Flat(w) => w.ncols(),
            Templates::Convolutive(p) => p.dim().1,
        }
    }
}

/// Output of a factorization run.
#[derive(Debug, Clone)]
pub struct Factorization {
    /// Model reconstruction of the input (K×N).
    pub approx: Array2<f64>,
    /// Adapted templates, noise components included.
    pub templates: Templates,
    /// Activations (R×N), noise rows included.
    pub activations: Array2<f64>,
    /// Number of rows of `activations` that belong to instruments.
    pub n_instruments: usize,
    pub iterations: usize,
    pub converged: bool,
}

impl Factorization {
    /// Activation rows of the instruments, noise components dropped.
    pub fn instrument_activations(&self) -> ArrayView2<'_, f64> {
        self.activations.slice(s![..self.n_instruments, ..])
    }

    /// Frobenius norm of `v - approx`.
    pub fn reconstruction_error(&self, v: &Array2<f64>) -> f64 {
        frobenius(&(v - &self.approx))
    }
}

/// Run the solver matching the template kind.
pub fn factorize<R: Rng + ?Sized>(
    v: &Array2<f64>,
    templates: &Templates,
    options: &FactorizeOptions,
    rng: &mut R,
) -> Result<Factorization> {
    match templates {
        Templates::Flat(w) => nmf(v, w, options, rng),
        Templates::Convolutive(p) => nmfd(v, p, options, rng),
    }
}

/// Generalised KL divergence `Σ v·ln(v/a) − v + a`.
pub fn kl_divergence(v: &Array2<f64>, approx: &Array2<f64>) -> f64 {
    v.iter()
        .zip(approx.iter())
        .map(|(&v, &a)| v * ((v + EPS) / (a + EPS)).ln() - v + a)
        .sum()
}

pub(crate) fn frobenius(a: &Array2<f64>) -> f64 {
    a.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Largest singular value, by power iteration on the smaller Gram matrix.
pub(crate) fn spectral_norm(a: &Array2<f64>) -> f64 {
    let (rows, cols) = a.dim();
    if rows == 0 || cols == 0 {
        return 0.0;
    }
    let gram = if rows < cols {
        a.dot(&a.t())
    } else {
        a.t().dot(a)
    };
    let n = gram.nrows();
    // Uneven start so the iterate is not orthogonal to the top eigenvector.
    let mut x = Array1::from_shape_fn(n, |i| 1.0 + i as f64 / n as f64);
    x /= x.dot(&x).sqrt();
    let mut lambda = 0.0;
    for _ in 0..200 {
        let y = gram.dot(&x);
        let norm = y.dot(&y).sqrt();
        if norm == 0.0 {
            return 0.0;
        }
        x = y / norm;
        let done = (norm - lambda).abs() <= 1e-12 * norm;
        lambda = norm;
        if done {
            break;
        }
    }
    lambda.sqrt()
}

pub(crate) fn init_activations<R: Rng + ?Sized>(
    init: InitH,
    shape: (usize, usize),
    rng: &mut R,
) -> Array2<f64> {
    match init {
        InitH::Uniform => Array2::ones(shape),
        InitH::Random => Array2::from_shape_fn(shape, |_| rng.gen_range(0.0..1.0)),
    }
}

pub(crate) fn check_input(v: &Array2<f64>, k: usize, n_instruments: usize) -> Result<()> {
    if v.nrows() == 0 || v.ncols() == 0 {
        return Err(Error::InvalidSize {
            name: "v",
            value: v.len(),
            reason: "spectrogram must be non-empty",
        });
    }
    if n_instruments == 0 {
        return Err(Error::InvalidSize {
            name: "templates",
            value: 0,
            reason: "need at least one instrument",
        });
    }
    if v.nrows() != k {
        return Err(Error::ShapeMismatch {
            expected: format!("{} bins", v.nrows()),
            got: format!("templates with {} bins", k),
        });
    }
    Ok(())
}
