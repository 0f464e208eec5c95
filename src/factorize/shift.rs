use ndarray::{Array2, Array3, ArrayBase, Axis, Data, Ix2, s};

use crate::spectrogram::EPS;
use crate::{Error, Result};

/// Shift the columns of `a` by `amount`, filling the vacated columns with zeros.
///
/// Positive amounts shift to the right, negative to the left, zero leaves the
/// matrix unchanged. The magnitude is clamped to the number of columns, so a
/// shift of at least the width yields all zeros.
///
/// # Example
/// ```
/// use rattle::factorize::shift;
/// use ndarray::array;
///
/// let a = array![[1.0, 2.0, 3.0, 4.0]];
/// assert_eq!(shift(&a, 1), array![[0.0, 1.0, 2.0, 3.0]]);
/// assert_eq!(shift(&a, -2), array![[3.0, 4.0, 0.0, 0.0]]);
/// ```
pub fn shift<S>(a: &ArrayBase<S, Ix2>, amount: isize) -> Array2<f64>
where
    S: Data<Elem = f64>,
{
    let cols = a.ncols();
    let k = amount.unsigned_abs().min(cols);
    let mut out = Array2::zeros(a.raw_dim());
    if amount >= 0 {
        out.slice_mut(s![.., k..]).assign(&a.slice(s![.., ..cols - k]));
    } else {
        out.slice_mut(s![.., ..cols - k]).assign(&a.slice(s![.., k..]));
    }
    out
}

/// Convolutive reconstruction `Σ_t P[:,:,t] · shift(H, t) + ε`.
///
/// `p` is K×R×T, `h` is R×N; the result is K×N.
pub fn conv_model(p: &Array3<f64>, h: &Array2<f64>) -> Result<Array2<f64>> {
    let (_, r, _) = p.dim();
    if h.nrows() != r {
        return Err(Error::ShapeMismatch {
            expected: format!("activations with {} rows", r),
            got: format!("{:?}", h.shape()),
        });
    }
    Ok(conv_model_unchecked(p, h))
}

pub(crate) fn conv_model_unchecked(p: &Array3<f64>, h: &Array2<f64>) -> Array2<f64> {
    let (k, _, t_len) = p.dim();
    let mut approx = Array2::zeros((k, h.ncols()));
    for t in 0..t_len {
        let slab = p.index_axis(Axis(2), t);
        approx += &slab.dot(&shift(h, t as isize));
    }
    approx += EPS;
    approx
}
