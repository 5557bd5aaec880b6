//! Frame-wise post-processing: time derivatives and per-frame normalization.

/// Floor for the per-frame standard deviation.
pub const NORM_EPSILON: f64 = 1e-12;

/// Computes delta features over time with a regression window of `n` frames.
///
/// `d[t] = sum_{i=1..n} i * (x[t+i] - x[t-i]) / (2 * sum_{i=1..n} i^2)`,
/// with the first and last frames replicated past the edges.
/// For `n = 1` this is `(x[t+1] - x[t-1]) / 2`.
pub fn delta(features: &[Vec<f64>], n: usize) -> Vec<Vec<f64>> {
    if features.is_empty() || n == 0 {
        return features.to_vec();
    }
    let last = features.len() - 1;
    let dim = features[0].len();
    let denom = 2.0 * (1..=n).map(|i| (i * i) as f64).sum::<f64>();

    let mut out = Vec::with_capacity(features.len());
    for t in 0..features.len() {
        let mut d = vec![0.0f64; dim];
        for i in 1..=n {
            let next = &features[(t + i).min(last)];
            let prev = &features[t.saturating_sub(i)];
            for k in 0..dim {
                d[k] += i as f64 * (next[k] - prev[k]);
            }
        }
        for v in &mut d {
            *v /= denom;
        }
        out.push(d);
    }
    out
}

/// Normalizes every frame vector independently to zero mean and unit variance.
///
/// The standard deviation is floored at [`NORM_EPSILON`] so constant frames
/// come out as zeros instead of NaN.
pub fn normalize_frames(frames: &mut [Vec<f64>]) {
    for v in frames.iter_mut() {
        if v.is_empty() {
            continue;
        }
        let n = v.len() as f64;
        let mean = v.iter().sum::<f64>() / n;
        let var = v.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
        let std = var.sqrt().max(NORM_EPSILON);
        for x in v.iter_mut() {
            *x = (*x - mean) / std;
        }
    }
}
