use crate::error::AnalyticsError;
use crate::stats::{round2, sample_stdev};
use crate::trend::TrendDirection;
use serde::Serialize;

/// Periods of history required before projecting.
pub const MIN_FORECAST_HISTORY: usize = 3;

/// Slopes within this band count as a flat trend.
const FLAT_SLOPE: f64 = 1e-9;

const LIMITATIONS: [&str; 3] = [
    "assumes linear trend",
    "ignores seasonality",
    "ignores external shocks",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// High for the next period, medium for the one after, low beyond.
    pub fn for_step(step: usize) -> Self {
        match step {
            0 | 1 => Confidence::High,
            2 => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    /// 1-based distance from the last observed period.
    pub step: usize,
    pub value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastMetadata {
    pub method: &'static str,
    pub history_length: usize,
    pub slope: f64,
    pub intercept: f64,
    pub limitations: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub projections: Vec<Projection>,
    pub trend: TrendDirection,
    pub confidence_per_step: Vec<Confidence>,
    pub metadata: ForecastMetadata,
}

/// Linear-regression projection of time-ordered series.
#[derive(Debug, Default)]
pub struct ForecastEngine {}

impl ForecastEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fits an ordinary least-squares line over positions `1..=n` and projects
    /// `horizon` periods past the end of `series`.
    ///
    /// Projected values are clamped at 0. Each carries an interval of half the
    /// sample standard deviation of the history on both sides.
    ///
    /// # Errors
    ///
    /// `InsufficientData` when `series` holds fewer than 3 periods.
    pub fn forecast(&self, series: &[f64], horizon: usize) -> Result<Forecast, AnalyticsError> {
        let n = series.len();
        if n < MIN_FORECAST_HISTORY {
            return Err(AnalyticsError::insufficient("forecast", MIN_FORECAST_HISTORY, n));
        }

        let (slope, intercept) = least_squares(series);
        let spread = sample_stdev(series) * 0.5;

        let projections: Vec<Projection> = (1..=horizon)
            .map(|step| {
                let x = (n + step) as f64;
                let value = (intercept + slope * x).max(0.0);
                Projection {
                    step,
                    value: round2(value),
                    lower_bound: round2((value - spread).max(0.0)),
                    upper_bound: round2(value + spread),
                    confidence: Confidence::for_step(step),
                }
            })
            .collect();

        let trend = if slope > FLAT_SLOPE {
            TrendDirection::Growing
        } else if slope < -FLAT_SLOPE {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        };

        tracing::debug!(history = n, horizon, slope, intercept, "Linear forecast fitted.");

        Ok(Forecast {
            confidence_per_step: projections.iter().map(|p| p.confidence).collect(),
            projections,
            trend,
            metadata: ForecastMetadata {
                method: "linear_regression",
                history_length: n,
                slope: (slope * 10_000.0).round() / 10_000.0,
                intercept: (intercept * 10_000.0).round() / 10_000.0,
                limitations: LIMITATIONS.to_vec(),
            },
        })
    }
}

/// `(slope, intercept)` of the OLS fit of `series` against `1..=n`.
fn least_squares(series: &[f64]) -> (f64, f64) {
    let n = series.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0, 0.0, 0.0, 0.0);
    for (idx, y) in series.iter().enumerate() {
        let x = idx as f64 + 1.0;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let denominator = n * sum_x2 - sum_x * sum_x;
    let slope = if denominator == 0.0 {
        0.0
    } else {
        (n * sum_xy - sum_x * sum_y) / denominator
    };
    let intercept = (sum_y - slope * sum_x) / n;
    (slope, intercept)
}
