/// Frames on either side of the local average window.
pub const AVERAGE_RADIUS: usize = 3;

/// Half-wave rectified first difference of an activation curve.
///
/// `novelty[i] = max(x[i + 1] - x[i], 0)`, with a trailing zero so the output
/// has the same length as the input. A rise between frames `i` and `i + 1`
/// is reported at frame `i`.
///
/// # Example
/// ```
/// use rattle::onset::novelty;
///
/// assert_eq!(novelty(&[0.0, 2.0, 1.0, 3.0]), vec![2.0, 0.0, 2.0, 0.0]);
/// ```
pub fn novelty(x: &[f64]) -> Vec<f64> {
    if x.is_empty() {
        return Vec::new();
    }
    let mut out: Vec<f64> = x.windows(2).map(|w| (w[1] - w[0]).max(0.0)).collect();
    out.push(0.0);
    out
}

/// Moving average over `2 * AVERAGE_RADIUS + 1` frames.
///
/// Frames outside the curve count as zero, so the divisor is always the full
/// window length, even at the edges.
pub fn local_average(x: &[f64]) -> Vec<f64> {
    let width = 2 * AVERAGE_RADIUS + 1;
    let n = x.len();
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(AVERAGE_RADIUS);
            let hi = (i + AVERAGE_RADIUS + 1).min(n);
            x[lo..hi].iter().sum::<f64>() / width as f64
        })
        .collect()
}

/// Novelty with the local average subtracted and the result rectified again.
pub fn enhanced_novelty(x: &[f64]) -> Vec<f64> {
    let nov = novelty(x);
    let avg = local_average(&nov);
    nov.iter()
        .zip(&avg)
        .map(|(&n, &a)| (n - a).max(0.0))
        .collect()
}
