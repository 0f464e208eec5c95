use ndarray::ArrayView1;

use super::novelty::enhanced_novelty;
use crate::config::Params;

/// Indices of local maxima whose value is at least `height`.
///
/// A peak needs a strict rise on its left and a strict fall on its right.
/// A flat top counts once, at its middle frame (rounded down). The first and
/// last samples are never peaks.
///
/// # Example
/// ```
/// use rattle::onset::find_peaks;
///
/// let x = [0.0, 1.0, 0.0, 2.0, 2.0, 2.0, 0.0, 0.5, 0.0];
/// assert_eq!(find_peaks(&x, 0.0), vec![1, 4, 7]);
/// assert_eq!(find_peaks(&x, 1.0), vec![1, 4]);
/// ```
pub fn find_peaks(x: &[f64], height: f64) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let mut i = 1;
    while i < n - 1 {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let mid = (i + ahead - 1) / 2;
                if x[mid] >= height {
                    peaks.push(mid);
                }
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

/// Peak-picking stage that turns one activation row into onset times.
///
/// # Example
/// ```
/// use rattle::onset::OnsetExtractor;
///
/// let mut activation = vec![0.0; 40];
/// activation[20] = 1.0;
/// let extractor = OnsetExtractor::new().with_fs_feature(100.0);
/// assert_eq!(extractor.frames(&activation), vec![19]);
/// assert_eq!(extractor.times(&activation), vec![0.19]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OnsetExtractor {
    /// Feature rate in frames per second.
    pub fs_feature: f64,
    /// Peaks below `max(enhanced) / theta` are dropped.
    pub theta: f64,
}

impl OnsetExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor matching the frame rate and factorization variant of `params`.
    pub fn from_params(params: &Params) -> Self {
        Self {
            fs_feature: params.fs_feature(),
            theta: params.theta(),
        }
    }

    pub fn with_fs_feature(mut self, fs_feature: f64) -> Self {
        self.fs_feature = fs_feature;
        self
    }

    pub fn with_theta(mut self, theta: f64) -> Self {
        self.theta = theta;
        self
    }

    /// Onset frame indices, ascending.
    pub fn frames(&self, activation: &[f64]) -> Vec<usize> {
        let enhanced = enhanced_novelty(activation);
        let max = enhanced.iter().copied().fold(0.0, f64::max);
        if max <= 0.0 {
            return Vec::new();
        }
        find_peaks(&enhanced, max / self.theta)
    }

    /// Onset times in seconds, ascending.
    pub fn times(&self, activation: &[f64]) -> Vec<f64> {
        self.frames(activation)
            .into_iter()
            .map(|f| f as f64 / self.fs_feature)
            .collect()
    }

    /// Same as [`times`](Self::times) for a row view of an activation matrix.
    pub fn times_for_row(&self, row: ArrayView1<'_, f64>) -> Vec<f64> {
        match row.as_slice() {
            Some(slice) => self.times(slice),
            None => self.times(&row.to_vec()),
        }
    }
}

impl Default for OnsetExtractor {
    fn default() -> Self {
        Self {
            fs_feature: crate::config::DEFAULT_SAMPLE_RATE / 256.0,
            theta: 6.0,
        }
    }
}

/// Onset times, in seconds, of one activation curve.
pub fn extract_onsets(activation: &[f64], fs_feature: f64, theta: f64) -> Vec<f64> {
    OnsetExtractor {
        fs_feature,
        theta,
    }
    .times(activation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NmfType;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn impulses(len: usize, at: &[(usize, f64)]) -> Vec<f64> {
        let mut x = vec![0.0; len];
        for &(i, v) in at {
            x[i] = v;
        }
        x
    }

    #[test]
    fn test_find_peaks_plateau_and_edges() {
        assert!(find_peaks(&[], 0.0).is_empty());
        assert!(find_peaks(&[1.0, 2.0], 0.0).is_empty());
        // Rising edge at the end is not a peak.
        assert!(find_peaks(&[0.0, 1.0, 2.0], 0.0).is_empty());
        // Plateau of even width picks the left middle frame.
        assert_eq!(find_peaks(&[0.0, 1.0, 1.0, 1.0, 1.0, 0.0], 0.0), vec![2]);
        // Plateau that never falls is not a peak.
        assert!(find_peaks(&[0.0, 1.0, 1.0, 1.0], 0.0).is_empty());
        // Plateau followed by a further rise is not a peak.
        assert_eq!(find_peaks(&[0.0, 1.0, 1.0, 2.0, 0.0], 0.0), vec![3]);
    }

    #[test]
    fn test_find_peaks_height_inclusive() {
        let x = [0.0, 0.5, 0.0, 1.0, 0.0];
        assert_eq!(find_peaks(&x, 0.5), vec![1, 3]);
        assert_eq!(find_peaks(&x, 0.51), vec![3]);
    }

    #[test]
    fn test_impulses_recovered_one_frame_early() {
        let x = impulses(64, &[(10, 1.0), (30, 0.9), (50, 1.1)]);
        let extractor = OnsetExtractor::new().with_theta(6.0);
        assert_eq!(extractor.frames(&x), vec![9, 29, 49]);
    }

    #[test]
    fn test_decaying_hits() {
        let mut x = vec![0.0; 48];
        for &start in &[5usize, 20, 35] {
            for (k, v) in [1.0, 0.6, 0.3, 0.1].iter().enumerate() {
                x[start + k] = *v;
            }
        }
        let extractor = OnsetExtractor::new();
        assert_eq!(extractor.frames(&x), vec![4, 19, 34]);
    }

    #[test]
    fn test_weak_bumps_below_threshold_dropped() {
        let x = impulses(64, &[(10, 1.0), (30, 0.1), (50, 1.0)]);
        // 0.1·6/7 is below (6/7)/3 but above (6/7)/12.
        let nmf = OnsetExtractor::new().with_theta(NmfType::Nmf.theta());
        assert_eq!(nmf.frames(&x), vec![9, 49]);
        let loose = OnsetExtractor::new().with_theta(12.0);
        assert_eq!(loose.frames(&x), vec![9, 29, 49]);
    }

    #[test]
    fn test_silent_row_yields_nothing() {
        let extractor = OnsetExtractor::new();
        assert!(extractor.frames(&[0.0; 32]).is_empty());
        assert!(extractor.frames(&[0.7; 32]).is_empty());
        assert!(extractor.frames(&[]).is_empty());
    }

    #[test]
    fn test_times_use_feature_rate() {
        let x = impulses(40, &[(11, 1.0)]);
        let times = extract_onsets(&x, 22050.0 / 256.0, 6.0);
        assert_eq!(times.len(), 1);
        assert_relative_eq!(times[0], 10.0 * 256.0 / 22050.0, epsilon = 1e-12);
    }

    #[test]
    fn test_row_views_match_slices() {
        let mut h = Array2::zeros((12, 2));
        h[(4, 1)] = 1.0;
        let extractor = OnsetExtractor::new().with_fs_feature(10.0);
        // Column views are not contiguous.
        assert_eq!(extractor.times_for_row(h.column(1)), vec![0.3]);
        assert!(extractor.times_for_row(h.column(0)).is_empty());
    }

    #[test]
    fn test_from_params() {
        let params = Params::new()
            .with_nmf_type(NmfType::Nmf)
            .with_window(1024);
        let extractor = OnsetExtractor::from_params(&params);
        assert_relative_eq!(extractor.fs_feature, params.sample_rate / 512.0);
        assert_relative_eq!(extractor.theta, 3.0);
    }
}
