/// Confidence factor computation and session confidence aggregation.
use crate::confidence_engine::iteration::{AnalysisIteration, CleanIteration, ConfidenceFactors};

pub const WEIGHTS: ConfidenceFactors = ConfidenceFactors {
    consistency: 0.30,
    completeness: 0.25,
    validation: 0.20,
    stability: 0.15,
    coverage: 0.10,
};

const NEUTRAL: f64 = 0.5;
const IMPROVING_BONUS: f64 = 1.1;
const DECLINING_PENALTY: f64 = 0.9;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

/// Factors for `next` given the iterations already in the session.
pub fn compute_factors(history: &[AnalysisIteration], next: &CleanIteration) -> ConfidenceFactors {
    let consistency = if history.is_empty() {
        NEUTRAL
    } else {
        let mut scores: Vec<f64> = tail(history, 3).iter().map(|i| i.quality_score).collect();
        scores.push(next.quality_score);
        1.0 - std_dev(&scores)
    };

    let elements = next.ui_elements_detected as f64;
    let completeness = 0.7 * next.quality_score + 0.3 * (elements / 10.0).min(1.0);

    let response_factor = match next.response_time {
        Some(rt) if rt > 0.0 => (1.0 / rt.max(0.1)).min(1.0),
        _ => NEUTRAL,
    };
    let change_factor = (next.change_score * 2.0).min(1.0);
    let validation = (response_factor + change_factor) / 2.0;

    let stability = if history.len() < 2 {
        NEUTRAL
    } else {
        let mut counts: Vec<f64> = tail(history, 2)
            .iter()
            .map(|i| i.ui_elements_detected as f64)
            .collect();
        counts.push(elements);
        1.0 - std_dev(&counts) / mean(&counts).max(1.0)
    };

    let coverage = (elements / 5.0 + next.recommendations.len() as f64 / 3.0) / 2.0;

    ConfidenceFactors {
        consistency: consistency.clamp(0.0, 1.0),
        completeness: completeness.clamp(0.0, 1.0),
        validation: validation.clamp(0.0, 1.0),
        stability: stability.clamp(0.0, 1.0),
        coverage: coverage.clamp(0.0, 1.0),
    }
}

pub fn weighted_sum(factors: &ConfidenceFactors) -> f64 {
    factors
        .iter()
        .zip(WEIGHTS.iter())
        .map(|((_, value), (_, weight))| value * weight)
        .sum()
}

/// 1.1 when the last three trend values never decrease, 0.9 when they never
/// increase, 1.0 otherwise or with fewer than three values. A flat trend
/// counts as improving.
pub fn trend_multiplier(prior_trend: &[f64]) -> f64 {
    if prior_trend.len() < 3 {
        return 1.0;
    }
    let recent = tail(prior_trend, 3);
    if recent.windows(2).all(|w| w[0] <= w[1]) {
        IMPROVING_BONUS
    } else if recent.windows(2).all(|w| w[0] >= w[1]) {
        DECLINING_PENALTY
    } else {
        1.0
    }
}

/// Session confidence after appending an iteration with `factors`;
/// `prior_trend` excludes the value being computed.
pub fn session_confidence(factors: &ConfidenceFactors, prior_trend: &[f64]) -> f64 {
    (weighted_sum(factors) * trend_multiplier(prior_trend)).clamp(0.0, 1.0)
}
