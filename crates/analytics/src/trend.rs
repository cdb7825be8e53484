use crate::error::AnalyticsError;
use crate::stats::{
    change_percent, coefficient_of_variation, mean, percentage, round2, sample_coefficient_of_variation,
};
use chrono::{DateTime, Datelike, Timelike, Utc};
use core_types::{BrandStatus, StatusChangeEvent};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Periods required before a series can be classified.
pub const MIN_TREND_PERIODS: usize = 3;
/// Distinct calendar months required before seasonality is reported.
pub const MIN_SEASONAL_MONTHS: usize = 6;
/// Status flows listed in a transition pattern summary.
pub const TOP_FLOWS: usize = 10;

/// Three-step rating shared by several classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Growing,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Volatility {
    Low,
    Medium,
    High,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendClassification {
    pub direction: TrendDirection,
    /// Second-half mean against first-half mean, in percent.
    pub change_percent: f64,
    pub first_half_mean: f64,
    pub second_half_mean: f64,
    pub volatility: Volatility,
    pub coefficient_of_variation: f64,
    pub periods: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tendency {
    Improving,
    Declining,
    Stable,
}

/// Movement between two consecutive periods.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodComparison {
    pub previous: f64,
    pub current: f64,
    pub absolute_change: f64,
    /// `(current - previous) / previous * 100`, 0 when `previous` is zero.
    pub change_percent: f64,
    pub tendency: Tendency,
    /// Whether the change exceeds 10 % in either direction.
    pub significant: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outlook {
    Positive,
    Negative,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthRate {
    pub cagr: f64,
    pub intervals: usize,
    pub outlook: Outlook,
}

/// One value of a monthly series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPoint {
    pub year: i32,
    pub month: u32,
    pub value: f64,
}

/// Southern-hemisphere season of a calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Summer,
    Autumn,
    Winter,
    Spring,
}

impl Season {
    pub fn of_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Season::Summer,
            3..=5 => Season::Autumn,
            6..=8 => Season::Winter,
            _ => Season::Spring,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalIntensity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthProfile {
    pub month: u32,
    pub season: Season,
    pub average: f64,
    /// Month average against the mean of all month averages, in percent.
    pub relative_intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterAverage {
    pub quarter: u32,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Seasonality {
    pub peak_month: u32,
    pub trough_month: u32,
    pub peak_average: f64,
    pub trough_average: f64,
    /// `(peak - trough) / trough * 100`, 0 when the trough is zero.
    pub variation_percent: f64,
    pub intensity: SeasonalIntensity,
    pub months: Vec<MonthProfile>,
    pub quarters: Vec<QuarterAverage>,
}

/// A brand that went back to a state it had just left (A → B → A).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReversal {
    pub brand_id: u64,
    pub status: BrandStatus,
    pub intermediate: BrandStatus,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencySummary {
    pub reversal_count: usize,
    pub affected_brands: usize,
    /// Affected brands over processed brands, in percent.
    pub reversal_percentage: f64,
    pub level: ConsistencyLevel,
}

/// Spread of a set of values across groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispersion {
    /// Largest value minus smallest.
    pub spread: f64,
    /// Sample coefficient of variation, in percent.
    pub coefficient_of_variation: f64,
    /// `high` above 50 %, `medium` above 25 %.
    pub inequality: Level,
}

/// How many changes went from one status to another.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionFlow {
    pub from: BrandStatus,
    pub to: BrandStatus,
    pub count: usize,
    /// Share of all status changes with a known origin.
    pub percentage: f64,
    pub backward: bool,
}

/// Hours a brand spent in `from` before moving to `to`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowTiming {
    pub from: BrandStatus,
    pub to: BrandStatus,
    pub cases: usize,
    pub avg_hours: f64,
    pub min_hours: f64,
    pub max_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourActivity {
    pub hour: u32,
    pub changes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekdayActivity {
    pub weekday: &'static str,
    pub changes: usize,
}

/// Status changes per calendar week (`YYYY-WW`, weeks starting on Monday).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyProductivity {
    pub weeks: usize,
    pub avg_per_week: f64,
    pub busiest_week: Option<String>,
    pub quietest_week: Option<String>,
    /// `high` when the busiest and quietest weeks differ by more than the average.
    pub variability: Level,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionPatterns {
    pub total_changes: usize,
    pub flows: Vec<TransitionFlow>,
    /// Changes that went against the lifecycle, such as APPROVED to REJECTED.
    pub backward_changes: usize,
    pub time_between_changes: Vec<FlowTiming>,
    pub by_hour: Vec<HourActivity>,
    pub by_weekday: Vec<WeekdayActivity>,
    pub busiest_hour: Option<u32>,
    pub busiest_weekday: Option<&'static str>,
    pub weekly: WeeklyProductivity,
}

/// Classifies period-over-period movement and seasonal patterns.
#[derive(Debug, Default)]
pub struct TrendAnalyzer {}

impl TrendAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies a multi-period series by comparing the mean of its first
    /// half with the mean of its second half.
    ///
    /// A ratio above 1.1 is `growing`, below 0.9 `declining`, anything else
    /// `stable`. For odd lengths the middle period belongs to the second half.
    ///
    /// # Errors
    ///
    /// `InsufficientData` when the series has fewer than 3 periods.
    pub fn classify_trend(&self, series: &[f64]) -> Result<TrendClassification, AnalyticsError> {
        if series.len() < MIN_TREND_PERIODS {
            return Err(AnalyticsError::insufficient(
                "trend classification",
                MIN_TREND_PERIODS,
                series.len(),
            ));
        }

        let (first, second) = series.split_at(series.len() / 2);
        let first_mean = mean(first);
        let second_mean = mean(second);

        let direction = if first_mean == 0.0 {
            if second_mean > 0.0 {
                TrendDirection::Growing
            } else {
                TrendDirection::Stable
            }
        } else {
            match second_mean / first_mean {
                r if r > 1.1 => TrendDirection::Growing,
                r if r < 0.9 => TrendDirection::Declining,
                _ => TrendDirection::Stable,
            }
        };
        let (volatility, cv) = self.volatility(series);

        Ok(TrendClassification {
            direction,
            change_percent: round2(change_percent(first_mean, second_mean)),
            first_half_mean: round2(first_mean),
            second_half_mean: round2(second_mean),
            volatility,
            coefficient_of_variation: cv,
            periods: series.len(),
        })
    }

    /// Volatility class and coefficient of variation (population) of `series`.
    ///
    /// Below 10 % is `low`, up to 25 % inclusive `medium`, above that `high`.
    pub fn volatility(&self, series: &[f64]) -> (Volatility, f64) {
        if series.len() < MIN_TREND_PERIODS {
            return (Volatility::InsufficientData, 0.0);
        }
        let cv = round2(coefficient_of_variation(series));
        let class = if cv < 10.0 {
            Volatility::Low
        } else if cv <= 25.0 {
            Volatility::Medium
        } else {
            Volatility::High
        };
        (class, cv)
    }

    /// Absolute and relative spread of `values`.
    pub fn dispersion(&self, values: &[f64]) -> Dispersion {
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let cv = round2(sample_coefficient_of_variation(values));
        let inequality = if cv > 50.0 {
            Level::High
        } else if cv > 25.0 {
            Level::Medium
        } else {
            Level::Low
        };
        Dispersion {
            spread: if values.is_empty() { 0.0 } else { round2(max - min) },
            coefficient_of_variation: cv,
            inequality,
        }
    }

    /// `(current - previous) / previous * 100` with a tendency label.
    pub fn compare_periods(&self, previous: f64, current: f64) -> PeriodComparison {
        let change = round2(change_percent(previous, current));
        let tendency = if change > 5.0 {
            Tendency::Improving
        } else if change < -5.0 {
            Tendency::Declining
        } else {
            Tendency::Stable
        };
        PeriodComparison {
            previous: round2(previous),
            current: round2(current),
            absolute_change: round2(current - previous),
            change_percent: change,
            tendency,
            significant: change.abs() > 10.0,
        }
    }

    /// Compound growth rate between `first` and `last` over `intervals` periods.
    pub fn cagr(&self, first: f64, last: f64, intervals: usize) -> GrowthRate {
        let cagr = if first <= 0.0 || last < 0.0 || intervals == 0 {
            0.0
        } else {
            round2(((last / first).powf(1.0 / intervals as f64) - 1.0) * 100.0)
        };
        let outlook = if cagr > 2.0 {
            Outlook::Positive
        } else if cagr < -2.0 {
            Outlook::Negative
        } else {
            Outlook::Stable
        };
        GrowthRate {
            cagr,
            intervals,
            outlook,
        }
    }

    /// Averages `points` per calendar month across years and locates the
    /// historically strongest and weakest months.
    ///
    /// # Errors
    ///
    /// `InsufficientData` when fewer than 6 distinct calendar months are present.
    pub fn detect_seasonality(&self, points: &[MonthlyPoint]) -> Result<Seasonality, AnalyticsError> {
        let mut by_month: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for point in points.iter().filter(|p| (1..=12).contains(&p.month) && p.value.is_finite()) {
            by_month.entry(point.month).or_default().push(point.value);
        }
        if by_month.len() < MIN_SEASONAL_MONTHS {
            return Err(AnalyticsError::insufficient(
                "seasonality detection",
                MIN_SEASONAL_MONTHS,
                by_month.len(),
            ));
        }

        let averages: Vec<(u32, f64)> = by_month.iter().map(|(m, v)| (*m, mean(v))).collect();
        // Ties go to the earliest calendar month.
        let mut peak = averages[0];
        let mut trough = averages[0];
        for &(month, avg) in &averages[1..] {
            if avg > peak.1 {
                peak = (month, avg);
            }
            if avg < trough.1 {
                trough = (month, avg);
            }
        }

        let variation = round2(change_percent(trough.1, peak.1));
        let intensity = if variation > 30.0 {
            SeasonalIntensity::High
        } else if variation > 15.0 {
            SeasonalIntensity::Medium
        } else {
            SeasonalIntensity::Low
        };

        let overall = mean(&averages.iter().map(|(_, a)| *a).collect::<Vec<_>>());
        let months = averages
            .iter()
            .map(|&(month, average)| MonthProfile {
                month,
                season: Season::of_month(month),
                average: round2(average),
                relative_intensity: percentage(average, overall),
            })
            .collect();

        let quarters = (1..=4)
            .filter_map(|quarter| {
                let values: Vec<f64> = averages
                    .iter()
                    .filter(|(m, _)| (m - 1) / 3 + 1 == quarter)
                    .map(|(_, a)| *a)
                    .collect();
                (!values.is_empty()).then(|| QuarterAverage {
                    quarter,
                    average: round2(mean(&values)),
                })
            })
            .collect();

        Ok(Seasonality {
            peak_month: peak.0,
            trough_month: trough.0,
            peak_average: round2(peak.1),
            trough_average: round2(trough.1),
            variation_percent: variation,
            intensity,
            months,
            quarters,
        })
    }

    /// Finds A → B → A patterns in the status history of every brand.
    ///
    /// Events are ordered by `changed_at` per brand. The `from_status` of the
    /// first event counts as the state the brand started in, so two events
    /// are enough to reveal a reversal: APPROVED → REJECTED → APPROVED is
    /// caught from its two changes alone.
    pub fn detect_reversals(&self, events: &[StatusChangeEvent]) -> Vec<StatusReversal> {
        let mut by_brand: BTreeMap<u64, Vec<&StatusChangeEvent>> = BTreeMap::new();
        for event in events {
            by_brand.entry(event.brand_id).or_default().push(event);
        }

        let mut reversals = Vec::new();
        for (brand_id, mut history) in by_brand {
            history.sort_by_key(|e| (e.changed_at, e.id));

            let mut path: Vec<(BrandStatus, DateTime<Utc>)> = Vec::with_capacity(history.len() + 1);
            if let Some(first) = history.first() {
                if let Some(from) = first.from_status {
                    path.push((from, first.changed_at));
                }
            }
            path.extend(history.iter().map(|e| (e.to_status, e.changed_at)));

            for window in path.windows(3) {
                let (a, _) = window[0];
                let (b, _) = window[1];
                let (c, at) = window[2];
                if a == c && a != b {
                    reversals.push(StatusReversal {
                        brand_id,
                        status: a,
                        intermediate: b,
                        detected_at: at,
                    });
                }
            }
        }

        if !reversals.is_empty() {
            tracing::debug!(count = reversals.len(), "Status reversals detected.");
        }
        reversals
    }

    /// Summarizes how brands move between statuses: the most common flows,
    /// the time spent before each flow, and when changes happen.
    ///
    /// Events without a `from_status` (a brand's first state) count towards
    /// activity but not towards flows.
    pub fn transition_patterns(&self, events: &[StatusChangeEvent]) -> TransitionPatterns {
        let mut flows: BTreeMap<(BrandStatus, BrandStatus), usize> = BTreeMap::new();
        let mut by_hour: BTreeMap<u32, usize> = BTreeMap::new();
        let mut by_weekday: BTreeMap<u32, usize> = BTreeMap::new();
        let mut by_week: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_brand: BTreeMap<u64, Vec<&StatusChangeEvent>> = BTreeMap::new();

        for event in events {
            if let Some(from) = event.from_status {
                *flows.entry((from, event.to_status)).or_default() += 1;
            }
            *by_hour.entry(event.changed_at.hour()).or_default() += 1;
            *by_weekday
                .entry(event.changed_at.weekday().num_days_from_monday())
                .or_default() += 1;
            *by_week
                .entry(event.changed_at.format("%Y-%W").to_string())
                .or_default() += 1;
            by_brand.entry(event.brand_id).or_default().push(event);
        }

        let flow_changes: usize = flows.values().sum();
        let backward_changes = flows
            .iter()
            .filter(|((from, to), _)| BrandStatus::is_backward(*from, *to))
            .map(|(_, count)| count)
            .sum();
        let mut ranked_flows: Vec<TransitionFlow> = flows
            .into_iter()
            .map(|((from, to), count)| TransitionFlow {
                from,
                to,
                count,
                percentage: percentage(count as f64, flow_changes as f64),
                backward: BrandStatus::is_backward(from, to),
            })
            .collect();
        // Ties follow the lifecycle order of the statuses.
        ranked_flows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| (a.from, a.to).cmp(&(b.from, b.to))));
        ranked_flows.truncate(TOP_FLOWS);

        let by_hour: Vec<HourActivity> = by_hour
            .into_iter()
            .map(|(hour, changes)| HourActivity { hour, changes })
            .collect();
        let by_weekday: Vec<WeekdayActivity> = (0..7)
            .map(|day| WeekdayActivity {
                weekday: weekday_name(day),
                changes: by_weekday.get(&day).copied().unwrap_or_default(),
            })
            .collect();
        // Ties go to the earliest hour and day.
        let busiest_hour = by_hour
            .iter()
            .rev()
            .max_by_key(|a| a.changes)
            .map(|a| a.hour);
        let busiest_weekday = by_weekday
            .iter()
            .rev()
            .filter(|a| a.changes > 0)
            .max_by_key(|a| a.changes)
            .map(|a| a.weekday);

        tracing::debug!(
            events = events.len(),
            flows = ranked_flows.len(),
            backward = backward_changes,
            "Transition patterns computed."
        );

        TransitionPatterns {
            total_changes: events.len(),
            flows: ranked_flows,
            backward_changes,
            time_between_changes: time_between_changes(by_brand),
            by_hour,
            by_weekday,
            busiest_hour,
            busiest_weekday,
            weekly: weekly_productivity(&by_week),
        }
    }

    /// Rates how often processed brands went through a reversal.
    ///
    /// Below 5 % is `high` consistency, below 10 % `medium`, otherwise `low`.
    pub fn consistency(&self, reversals: &[StatusReversal], processed_brands: usize) -> ConsistencySummary {
        let affected: BTreeSet<u64> = reversals.iter().map(|r| r.brand_id).collect();
        let reversal_percentage = percentage(affected.len() as f64, processed_brands as f64);
        let level = if reversal_percentage < 5.0 {
            ConsistencyLevel::High
        } else if reversal_percentage < 10.0 {
            ConsistencyLevel::Medium
        } else {
            ConsistencyLevel::Low
        };
        ConsistencySummary {
            reversal_count: reversals.len(),
            affected_brands: affected.len(),
            reversal_percentage,
            level,
        }
    }
}

/// For every flow, the hours since the brand last reached the flow's origin.
fn time_between_changes(by_brand: BTreeMap<u64, Vec<&StatusChangeEvent>>) -> Vec<FlowTiming> {
    let mut hours: BTreeMap<(BrandStatus, BrandStatus), Vec<f64>> = BTreeMap::new();

    for (_, mut history) in by_brand {
        history.sort_by_key(|e| (e.changed_at, e.id));
        let mut reached: HashMap<BrandStatus, DateTime<Utc>> = HashMap::new();
        for event in history {
            if let Some(from) = event.from_status {
                if let Some(since) = reached.get(&from) {
                    let elapsed = (event.changed_at - *since).num_seconds() as f64 / 3600.0;
                    hours.entry((from, event.to_status)).or_default().push(elapsed);
                }
            }
            reached.insert(event.to_status, event.changed_at);
        }
    }

    let mut timings: Vec<FlowTiming> = hours
        .into_iter()
        .map(|((from, to), values)| FlowTiming {
            from,
            to,
            cases: values.len(),
            avg_hours: round2(mean(&values)),
            min_hours: round2(values.iter().copied().fold(f64::INFINITY, f64::min)),
            max_hours: round2(values.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        })
        .collect();
    timings.sort_by(|a, b| b.cases.cmp(&a.cases).then_with(|| (a.from, a.to).cmp(&(b.from, b.to))));
    timings
}

fn weekly_productivity(by_week: &BTreeMap<String, usize>) -> WeeklyProductivity {
    let counts: Vec<f64> = by_week.values().map(|c| *c as f64).collect();
    let average = mean(&counts);
    // Ties go to the earliest week.
    let busiest = by_week.iter().rev().max_by_key(|(_, c)| **c);
    let quietest = by_week.iter().min_by_key(|(_, c)| **c);
    let variability = match (busiest, quietest) {
        (Some((_, max)), Some((_, min))) if (max - min) as f64 > average => Level::High,
        _ => Level::Low,
    };

    WeeklyProductivity {
        weeks: by_week.len(),
        avg_per_week: round2(average),
        busiest_week: busiest.map(|(week, _)| week.clone()),
        quietest_week: quietest.map(|(week, _)| week.clone()),
        variability,
    }
}

fn weekday_name(days_from_monday: u32) -> &'static str {
    match days_from_monday {
        0 => "monday",
        1 => "tuesday",
        2 => "wednesday",
        3 => "thursday",
        4 => "friday",
        5 => "saturday",
        _ => "sunday",
    }
}
