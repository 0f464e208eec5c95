use ndarray::{Array2, Axis, s};
use rand::Rng;

use super::{
    FactorizeOptions, Factorization, Templates, check_input, init_activations, spectral_norm,
};
use crate::Result;
use crate::spectrogram::EPS;

/// Non-negative Matrix Factorization seeded with instrument templates.
///
/// Decomposes `v` (K×N) into templates W (K×R) and activations H (R×N) with
/// the KL multiplicative updates
///
/// ```text
/// Q = V / (WH + ε)
/// H ← H ⊙ (WᵀQ) / (WᵀJ + ε)
/// Q = V / (WH + ε)
/// W ← W ⊙ (QHᵀ) / (JHᵀ + ε)
/// ```
///
/// where J is all ones. Q is re-evaluated with the new H before the template
/// update. `w_init` holds one column per instrument; `options.added_comp_w`
/// all-ones columns are appended for unexplained energy. After each update
/// the template-fixing policy is applied to the instrument columns only.
///
/// # Example
/// ```
/// use rattle::factorize::{FactorizeOptions, nmf};
/// use rattle::config::{FixW, InitH};
/// use ndarray::array;
/// use rand::SeedableRng;
///
/// let w = array![[1.0, 0.1], [0.1, 1.0]];
/// let h = array![[1.0, 0.0, 2.0], [0.0, 3.0, 1.0]];
/// let v = w.dot(&h) + 1e-6;
/// let options = FactorizeOptions {
///     fix_w: FixW::Fixed,
///     added_comp_w: 0,
///     init_h: InitH::Uniform,
///     max_iter: 500,
///     threshold: 1e-6,
/// };
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let result = nmf(&v, &w, &options, &mut rng).unwrap();
/// assert_eq!(result.activations.shape(), &[2, 3]);
/// assert!(result.activations.iter().all(|&x| x >= 0.0));
/// ```
pub fn nmf<R: Rng + ?Sized>(
    v: &Array2<f64>,
    w_init: &Array2<f64>,
    options: &FactorizeOptions,
    rng: &mut R,
) -> Result<Factorization> {
    let (k, n_instruments) = w_init.dim();
    check_input(v, k, n_instruments)?;
    let n = v.ncols();
    let r = n_instruments + options.added_comp_w;
    let cap = options.max_iter;

    let mut w = Array2::ones((k, r));
    w.slice_mut(s![.., ..n_instruments]).assign(w_init);
    let mut h = init_activations(options.init_h, (r, n), rng);

    let mut w_prev = w.clone();
    let mut h_prev = h.clone();
    let mut w_step = Array2::zeros((k, r));
    let mut h_step = Array2::zeros((r, n));

    let mut iterations = 0;
    let mut converged = false;
    for iteration in 0..cap {
        let q = v / &(w.dot(&h) + EPS);

        h_prev.assign(&h);
        // WᵀJ repeats the column sums of W along time.
        let w_sums = w.sum_axis(Axis(0)).insert_axis(Axis(1));
        h *= &(w.t().dot(&q) / &(w_sums + EPS));

        w_prev.assign(&w);
        let q = v / &(w.dot(&h) + EPS);
        // JHᵀ repeats the row sums of H along frequency.
        let h_sums = h.sum_axis(Axis(1));
        w *= &(q.dot(&h.t()) / &(h_sums + EPS));

        options.fix_w.apply(
            w.slice_mut(s![.., ..n_instruments]),
            w_init.view(),
            iteration,
            cap,
        );

        iterations = iteration + 1;
        w_step.assign(&w);
        w_step -= &w_prev;
        h_step.assign(&h);
        h_step -= &h_prev;
        let (dw, dh) = (spectral_norm(&w_step), spectral_norm(&h_step));
        log::trace!("nmf iteration {}: |dW|={:.3e} |dH|={:.3e}", iteration, dw, dh);
        if dh < options.threshold && dw < options.threshold {
            converged = true;
            break;
        }
    }
    log::debug!(
        "nmf stopped after {} of {} iterations (converged: {})",
        iterations,
        cap,
        converged
    );

    let approx = w.dot(&h);
    Ok(Factorization {
        approx,
        templates: Templates::Flat(w),
        activations: h,
        n_instruments,
        iterations,
        converged,
    })
}
