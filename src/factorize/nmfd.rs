use ndarray::{Array2, Array3, Axis, s};
use rand::Rng;

use super::shift::{conv_model_unchecked, shift};
use super::{
    FactorizeOptions, Factorization, Templates, check_input, init_activations, spectral_norm,
};
use crate::spectrogram::EPS;
use crate::{Error, Result};

/// Non-negative Matrix Factor Deconvolution seeded with instrument patterns.
///
/// `p_init` is K×R×T: for each of the R instruments a K×T spectro-temporal
/// pattern. The model is `V ≈ Σ_t P[:,:,t] · shift(H, t)`. Each iteration
/// computes `Q = V / (V_approx + ε)`, then walks the offsets `t` in order,
/// updating slab `P[:,:,t]` and applying the template-fixing policy to it.
/// Once every slab is updated, Q is re-evaluated and H is multiplied, once,
/// by the mean over `t` of `(P[:,:,t]ᵀ · shift(Q, -t)) / (P[:,:,t]ᵀ · J + ε)`.
///
/// # Example
/// ```
/// use rattle::factorize::{FactorizeOptions, nmfd};
/// use rattle::config::{FixW, InitH};
/// use ndarray::{Array2, Array3};
/// use rand::SeedableRng;
///
/// let p = Array3::from_elem((4, 2, 3), 0.5);
/// let v = Array2::from_elem((4, 20), 1.0);
/// let options = FactorizeOptions {
///     fix_w: FixW::Adaptive,
///     added_comp_w: 1,
///     init_h: InitH::Uniform,
///     max_iter: 10,
///     threshold: 1e-3,
/// };
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let result = nmfd(&v, &p, &options, &mut rng).unwrap();
/// assert_eq!(result.activations.shape(), &[3, 20]);
/// assert_eq!(result.instrument_activations().shape(), &[2, 20]);
/// ```
pub fn nmfd<R: Rng + ?Sized>(
    v: &Array2<f64>,
    p_init: &Array3<f64>,
    options: &FactorizeOptions,
    rng: &mut R,
) -> Result<Factorization> {
    let (k, n_instruments, t_len) = p_init.dim();
    check_input(v, k, n_instruments)?;
    if t_len == 0 {
        return Err(Error::InvalidSize {
            name: "t",
            value: 0,
            reason: "patterns need at least one frame",
        });
    }
    let n = v.ncols();
    let r = n_instruments + options.added_comp_w;
    let cap = options.max_iter;

    let mut initial = Array3::ones((k, r, t_len));
    initial.slice_mut(s![.., ..n_instruments, ..]).assign(p_init);
    let mut p = initial.clone();
    let mut h = init_activations(options.init_h, (r, n), rng);

    let mut p_prev = p.clone();
    let mut h_prev = h.clone();
    let mut h_step = Array2::zeros((r, n));
    let mut mult_h = Array2::zeros((r, n));

    let mut iterations = 0;
    let mut converged = false;
    for iteration in 0..cap {
        h_prev.assign(&h);
        p_prev.assign(&p);
        let approx = conv_model_unchecked(&p, &h);
        let q = v / &(approx + EPS);

        for t in 0..t_len {
            let shifted_h = shift(&h, t as isize);
            // J·shift(H,t)ᵀ repeats the row sums of the shifted activations.
            let h_sums = shifted_h.sum_axis(Axis(1));
            let factor = q.dot(&shifted_h.t()) / &(h_sums + EPS);
            {
                let mut slab = p.index_axis_mut(Axis(2), t);
                slab *= &factor;
            }
            options.fix_w.apply(
                p.slice_mut(s![.., ..n_instruments, t]),
                initial.slice(s![.., ..n_instruments, t]),
                iteration,
                cap,
            );
        }

        // The activation factor sees every updated slab.
        let q = v / &(conv_model_unchecked(&p, &h) + EPS);
        mult_h.fill(0.0);
        for t in 0..t_len {
            let slab = p.index_axis(Axis(2), t);
            // P[:,:,t]ᵀ·J repeats the column sums of the slab along time.
            let p_sums = slab.sum_axis(Axis(0)).insert_axis(Axis(1));
            mult_h += &(slab.t().dot(&shift(&q, -(t as isize))) / &(p_sums + EPS));
        }
        mult_h /= t_len as f64;
        h *= &mult_h;

        iterations = iteration + 1;
        h_step.assign(&h);
        h_step -= &h_prev;
        h_step.mapv_inplace(f64::abs);
        let p_step = (&p - &p_prev).mapv_into(f64::abs).sum_axis(Axis(2)) / t_len as f64;
        let (dp, dh) = (spectral_norm(&p_step), spectral_norm(&h_step));
        log::trace!("nmfd iteration {}: |dP|={:.3e} |dH|={:.3e}", iteration, dp, dh);
        if dh < options.threshold && dp < options.threshold {
            converged = true;
            break;
        }
    }
    log::debug!(
        "nmfd stopped after {} of {} iterations (converged: {})",
        iterations,
        cap,
        converged
    );

    let approx = conv_model_unchecked(&p, &h);
    Ok(Factorization {
        approx,
        templates: Templates::Convolutive(p),
        activations: h,
        n_instruments,
        iterations,
        converged,
    })
}
