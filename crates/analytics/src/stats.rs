//! Shared numeric helpers.
//!
//! Every ratio in the engine goes through [`ratio`] or [`percentage`], which
//! treat a zero denominator as producing 0 instead of failing.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Rounds to 2 decimals, the precision of every percentage and amount in a report.
///
/// Idempotent: rounding an already rounded value returns it unchanged.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

/// `numerator / denominator`, or 0 when the denominator is zero.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        0.0
    } else {
        numerator / denominator
    }
}

/// `part / total * 100` rounded to 2 decimals, or 0 when the total is zero.
pub fn percentage(part: f64, total: f64) -> f64 {
    round2(ratio(part, total) * 100.0)
}

/// Relative change from `previous` to `current` in percent, or 0 when `previous` is zero.
pub fn change_percent(previous: f64, current: f64) -> f64 {
    ratio(current - previous, previous) * 100.0
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation over the whole population (divides by n).
pub fn population_stdev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Standard deviation of a sample (divides by n - 1). Zero for fewer than two values.
pub fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Coefficient of variation in percent, using the population deviation.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    ratio(population_stdev(values), mean(values)) * 100.0
}

/// Coefficient of variation in percent, using the sample deviation.
pub fn sample_coefficient_of_variation(values: &[f64]) -> f64 {
    ratio(sample_stdev(values), mean(values)) * 100.0
}

/// Clamps a sub-score to the `[0, 100]` range.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Converts a money amount for report output, rounded to 2 decimals.
pub fn money(amount: Decimal) -> f64 {
    round2(amount.round_dp(2).to_f64().unwrap_or_default())
}
