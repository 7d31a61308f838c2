//! Adaptive rank truncation over a sorted, decreasing composite-score
//! curve (spec 4.10: "apply Kneedle (convex, decreasing)... keep the
//! top-k up to the knee... if no knee detected, keep `max_results`").
//!
//! The curve of interest (relevance score vs. rank) is a textbook
//! convex-decreasing shape: a tight cluster of strong candidates,
//! then a bend into a long shallow tail. We locate the bend by
//! maximizing discrete curvature (the second difference) over the
//! min-max normalized score sequence, which is the same quantity
//! Kneedle's difference-curve construction is built to isolate for a
//! single dominant knee. A straight-line (no-knee) curve has zero
//! curvature everywhere, so the sensitivity threshold below falls out
//! naturally rather than needing a special case.

/// `sensitivity` mirrors Kneedle's `S` parameter: how many multiples
/// of the curve's average step size a bend must exceed before it is
/// treated as a real knee rather than noise. `1.0` is the algorithm's
/// own recommended default.
pub fn kneedle_cutoff(scores: &[f32], min_results: usize, max_results: usize, sensitivity: f32) -> usize {
    let n = scores.len();
    if n == 0 {
        return 0;
    }
    let bounded_max = max_results.min(n);
    if n < 3 {
        return bounded_max.max(min_results.min(n));
    }

    let max_score = scores.iter().cloned().fold(f32::MIN, f32::max);
    let min_score = scores.iter().cloned().fold(f32::MAX, f32::min);
    let range = max_score - min_score;
    if range <= f32::EPSILON {
        // Flat scores carry no ranking signal at all.
        return min_results.clamp(1, bounded_max).min(bounded_max);
    }
    let normalized: Vec<f32> = scores.iter().map(|s| (s - min_score) / range).collect();

    let avg_gap = (normalized[0] - normalized[n - 1]) / (n - 1) as f32;
    let threshold = sensitivity * avg_gap;

    let mut knee_index = None;
    let mut best_curvature = threshold;
    for i in 1..n - 1 {
        let curvature = (normalized[i - 1] - 2.0 * normalized[i] + normalized[i + 1]).abs();
        if curvature > best_curvature {
            best_curvature = curvature;
            knee_index = Some(i);
        }
    }

    let keep = match knee_index {
        Some(i) => i + 1,
        None => bounded_max,
    };
    keep.clamp(min_results.min(bounded_max), bounded_max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sharp_drop_after_fourth_candidate_truncates_to_four() {
        let mut scores = vec![0.95, 0.92, 0.88, 0.85, 0.6, 0.55, 0.52, 0.49];
        scores.extend((0..12).map(|i| 0.46 - i as f32 * 0.03));
        let keep = kneedle_cutoff(&scores, 1, 20, 1.0);
        assert_eq!(keep, 4);
    }

    #[test]
    fn monotonic_linear_decay_returns_max_results() {
        let scores: Vec<f32> = (0..20).map(|i| 0.9 - i as f32 * 0.02).collect();
        let keep = kneedle_cutoff(&scores, 1, 10, 1.0);
        assert_eq!(keep, 10);
    }

    #[test]
    fn respects_min_results_floor() {
        let scores = vec![0.9, 0.1, 0.09, 0.08];
        let keep = kneedle_cutoff(&scores, 3, 10, 1.0);
        assert!(keep >= 3);
    }

    #[test]
    fn empty_input_returns_zero() {
        assert_eq!(kneedle_cutoff(&[], 1, 10, 1.0), 0);
    }
}
