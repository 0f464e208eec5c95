use ndarray::{ArrayView2, ArrayViewMut2, Zip};

use crate::config::FixW;

impl FixW {
    /// Blend weight given to the adapted template at `iteration` of `cap`.
    pub fn alpha(&self, iteration: usize, cap: usize) -> f64 {
        match *self {
            FixW::Fixed => 0.0,
            FixW::Semi { beta } => (iteration as f64 / cap as f64).powf(beta),
            FixW::Adaptive => 1.0,
        }
    }

    /// Pull the instrument part of an updated template back towards its
    /// initial value. Noise components must not be passed in.
    pub(crate) fn apply(
        &self,
        mut current: ArrayViewMut2<'_, f64>,
        initial: ArrayView2<'_, f64>,
        iteration: usize,
        cap: usize,
    ) {
        match self {
            FixW::Fixed => current.assign(&initial),
            FixW::Semi { .. } => {
                let alpha = self.alpha(iteration, cap);
                Zip::from(&mut current)
                    .and(&initial)
                    .for_each(|c, &i| *c = (1.0 - alpha) * i + alpha * *c);
            }
            FixW::Adaptive => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_alpha_curve() {
        let semi = FixW::Semi { beta: 2.0 };
        assert_relative_eq!(semi.alpha(0, 10), 0.0);
        assert_relative_eq!(semi.alpha(5, 10), 0.25);
        assert_relative_eq!(FixW::Semi { beta: 0.0 }.alpha(0, 10), 1.0);
    }

    #[test]
    fn test_apply_policies() {
        let initial = array![[1.0, 1.0]];

        let mut w = array![[3.0, 5.0]];
        FixW::Fixed.apply(w.view_mut(), initial.view(), 3, 10);
        assert_eq!(w, initial);

        let mut w = array![[3.0, 5.0]];
        FixW::Adaptive.apply(w.view_mut(), initial.view(), 3, 10);
        assert_eq!(w, array![[3.0, 5.0]]);

        let mut w = array![[3.0, 5.0]];
        FixW::Semi { beta: 1.0 }.apply(w.view_mut(), initial.view(), 5, 10);
        assert_relative_eq!(w[(0, 0)], 2.0);
        assert_relative_eq!(w[(0, 1)], 3.0);
    }
}
