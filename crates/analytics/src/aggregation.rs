use crate::error::AnalyticsError;
use crate::period::YearMonth;
use crate::stats::{percentage, ratio, round2};
use crate::trend::Level;
use chrono::Datelike;
use core_types::{AiModel, BrandRegistration, BrandStatus, CoreError, LogoGeneration, QualityTier};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Bucket that collects records whose dimension value is missing.
pub const UNKNOWN_KEY: &str = "UNKNOWN";
/// Upper bound of a fast processing time, in hours.
pub const FAST_HOURS: f64 = 24.0;
/// Upper bound of a normal processing time, in hours.
pub const NORMAL_HOURS: f64 = 72.0;

/// The value a record was grouped under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_KEY.to_string())
    }

    /// Maps a missing or blank value to the `UNKNOWN` bucket.
    pub fn from_value<K: fmt::Display>(value: Option<K>) -> Self {
        match value.map(|v| v.to_string()) {
            Some(v) if !v.trim().is_empty() => Self(v),
            _ => Self::unknown(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A grouping key over brand registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Breed,
    Purpose,
    Department,
    Status,
    Municipality,
    Producer,
    Year,
    /// `YYYY-MM` of the registration date.
    Month,
    /// `01`..`12` of the registration date, across years.
    CalendarMonth,
}

impl Dimension {
    pub const ALL: &'static [Dimension] = &[
        Dimension::Breed,
        Dimension::Purpose,
        Dimension::Department,
        Dimension::Status,
        Dimension::Municipality,
        Dimension::Producer,
        Dimension::Year,
        Dimension::Month,
        Dimension::CalendarMonth,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Dimension::Breed => "breed",
            Dimension::Purpose => "purpose",
            Dimension::Department => "department",
            Dimension::Status => "status",
            Dimension::Municipality => "municipality",
            Dimension::Producer => "producer",
            Dimension::Year => "year",
            Dimension::Month => "month",
            Dimension::CalendarMonth => "calendar_month",
        }
    }

    /// The value `record` is grouped under, `None` when it is missing.
    pub fn value_of(&self, record: &BrandRegistration) -> Option<String> {
        let value = match self {
            Dimension::Breed => record.breed.code().to_string(),
            Dimension::Purpose => record.purpose.code().to_string(),
            Dimension::Department => record.department.code().to_string(),
            Dimension::Status => record.status.code().to_string(),
            Dimension::Municipality => record.municipality.clone(),
            Dimension::Producer => record.producer_id.clone(),
            Dimension::Year => record.registered_at.year().to_string(),
            Dimension::Month => YearMonth::of(&record.registered_at).to_string(),
            Dimension::CalendarMonth => format!("{:02}", record.registered_at.month()),
        };
        (!value.trim().is_empty()).then_some(value)
    }

    /// Whether groups of this dimension are periods, listed in time order.
    pub fn is_temporal(&self) -> bool {
        matches!(self, Dimension::Year | Dimension::Month | Dimension::CalendarMonth)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Dimension {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        Dimension::ALL
            .iter()
            .copied()
            .find(|d| d.key().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = Dimension::ALL.iter().map(|d| d.key()).collect();
                AnalyticsError::InvalidDimension(format!(
                    "unknown grouping key '{s}', expected one of {}",
                    known.join(", ")
                ))
            })
    }
}

/// A numeric field that can be summed per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    HeadCount,
    CertificationAmount,
    ProcessingHours,
    GenerationSeconds,
}

impl Metric {
    pub const ALL: &'static [Metric] = &[
        Metric::HeadCount,
        Metric::CertificationAmount,
        Metric::ProcessingHours,
        Metric::GenerationSeconds,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Metric::HeadCount => "head_count",
            Metric::CertificationAmount => "certification_amount",
            Metric::ProcessingHours => "processing_hours",
            Metric::GenerationSeconds => "generation_seconds",
        }
    }

    /// Metrics a brand registration carries.
    pub fn applies_to_registrations(&self) -> bool {
        !matches!(self, Metric::GenerationSeconds)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Metric {
    type Err = AnalyticsError;

    /// Accepts `head_count`, `head-count` and `headCount` alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', '_'], "").to_ascii_lowercase();
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.key().replace('_', "") == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Metric::ALL.iter().map(|m| m.key()).collect();
                AnalyticsError::InvalidDimension(format!(
                    "unknown metric '{s}', expected one of {}",
                    known.join(", ")
                ))
            })
    }
}

/// A record the aggregation engine can group and measure.
pub trait Measured {
    /// The value of `metric` for this record, `None` when it does not apply.
    fn measure(&self, metric: Metric) -> Option<f64>;

    /// Rejects records that must be excluded from aggregation.
    fn check(&self) -> Result<(), CoreError>;
}

impl Measured for BrandRegistration {
    fn measure(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::HeadCount => Some(f64::from(self.head_count)),
            Metric::CertificationAmount => self.certification_amount.to_f64(),
            Metric::ProcessingHours => self.processing_hours(),
            Metric::GenerationSeconds => None,
        }
    }

    fn check(&self) -> Result<(), CoreError> {
        self.validate()
    }
}

impl Measured for LogoGeneration {
    fn measure(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::GenerationSeconds => Some(self.generation_seconds as f64),
            _ => None,
        }
    }

    fn check(&self) -> Result<(), CoreError> {
        self.validate()
    }
}

/// count/sum/avg/min/max of one numeric field within a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStats {
    pub count: usize,
    pub sum: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl FieldStats {
    fn first(value: f64) -> Self {
        Self {
            count: 1,
            sum: value,
            avg: value,
            min: value,
            max: value,
        }
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.avg = self.sum / self.count as f64;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// The same statistics at report precision.
    pub fn rounded(&self) -> Self {
        Self {
            count: self.count,
            sum: round2(self.sum),
            avg: round2(self.avg),
            min: round2(self.min),
            max: round2(self.max),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub count: usize,
    pub fields: BTreeMap<Metric, FieldStats>,
}

impl GroupStats {
    fn push<R: Measured>(&mut self, record: &R, metrics: &[Metric]) {
        self.count += 1;
        for &metric in metrics {
            let Some(value) = record.measure(metric).filter(|v| v.is_finite()) else {
                continue;
            };
            self.fields
                .entry(metric)
                .and_modify(|stats| stats.push(value))
                .or_insert_with(|| FieldStats::first(value));
        }
    }

    pub fn field(&self, metric: Metric) -> Option<&FieldStats> {
        self.fields.get(&metric)
    }

    /// Sum of `metric`, 0 when no record in the group carried it.
    pub fn sum(&self, metric: Metric) -> f64 {
        self.field(metric).map(|f| f.sum).unwrap_or_default()
    }

    pub fn value(&self, basis: RankBy) -> f64 {
        match basis {
            RankBy::Count => self.count as f64,
            RankBy::Sum(metric) => self.sum(metric),
        }
    }
}

/// What a share or a ranking is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBy {
    Count,
    Sum(Metric),
}

/// The result of [`AggregationEngine::group_by`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grouping {
    pub groups: BTreeMap<GroupKey, GroupStats>,
    pub total: GroupStats,
    /// Records skipped because they failed validation.
    pub excluded: usize,
}

impl Grouping {
    pub fn get(&self, key: &str) -> Option<&GroupStats> {
        self.groups.get(&GroupKey::new(key))
    }

    /// Fraction of the total held by `key`, 0 when the total is zero.
    pub fn share(&self, key: &GroupKey, basis: RankBy) -> f64 {
        let part = self.groups.get(key).map(|g| g.value(basis)).unwrap_or_default();
        ratio(part, self.total.value(basis))
    }

    /// Shares of every group, in key order.
    pub fn shares(&self, basis: RankBy) -> Vec<f64> {
        self.groups.keys().map(|key| self.share(key, basis)).collect()
    }

    /// Share of `key` as a percentage rounded to 2 decimals.
    pub fn percentage(&self, key: &GroupKey, basis: RankBy) -> f64 {
        let part = self.groups.get(key).map(|g| g.value(basis)).unwrap_or_default();
        percentage(part, self.total.value(basis))
    }

    /// Groups ordered by `basis` descending, ties by key ascending.
    pub fn ranked(&self, basis: RankBy) -> Vec<(&GroupKey, &GroupStats)> {
        let mut rows: Vec<_> = self.groups.iter().collect();
        sort_ranked(&mut rows, |(_, g)| g.value(basis), |(k, _)| k.as_str());
        rows
    }
}

/// Orders `items` by `metric` descending, breaking ties by `name` ascending.
///
/// Every list-valued report section is sorted through this function.
pub fn sort_ranked<T>(items: &mut [T], metric: impl Fn(&T) -> f64, name: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| {
        metric(b)
            .total_cmp(&metric(a))
            .then_with(|| name(a).cmp(name(b)))
    });
}

/// Registration statistics of one group (a period, a department, a breed...).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStats {
    pub key: GroupKey,
    pub count: usize,
    pub head_count: u64,
    pub avg_head_count: f64,
    pub approved: usize,
    pub rejected: usize,
    /// Registrations not yet approved or rejected.
    pub pending: usize,
    /// approved / (approved + rejected) in percent.
    pub approval_rate: f64,
    /// Certification amounts of the approved registrations.
    pub revenue: Decimal,
    /// Mean certification amount over every registration of the group.
    pub avg_certification_amount: f64,
    pub avg_processing_hours: f64,
    /// Registrations that contributed to `avg_processing_hours`.
    pub timed: usize,
    pub distinct_producers: usize,
}

impl PeriodStats {
    pub fn empty(key: GroupKey) -> Self {
        PeriodAccumulator::default().finish(key)
    }

    pub fn processed(&self) -> usize {
        self.approved + self.rejected
    }

    pub fn revenue_f64(&self) -> f64 {
        self.revenue.to_f64().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct PeriodAccumulator {
    count: usize,
    head_count: u64,
    approved: usize,
    rejected: usize,
    pending: usize,
    revenue: Decimal,
    certified: Decimal,
    hours_sum: f64,
    timed: usize,
    producers: BTreeSet<String>,
}

impl PeriodAccumulator {
    fn push(&mut self, record: &BrandRegistration) {
        self.count += 1;
        self.head_count += u64::from(record.head_count);
        self.certified += record.certification_amount;
        match record.status {
            BrandStatus::Approved => {
                self.approved += 1;
                self.revenue += record.certification_amount;
            }
            BrandStatus::Rejected => self.rejected += 1,
            BrandStatus::Pending | BrandStatus::InProgress => self.pending += 1,
        }
        if let Some(hours) = record.processing_hours() {
            self.hours_sum += hours;
            self.timed += 1;
        }
        self.producers.insert(record.producer_id.clone());
    }

    fn finish(self, key: GroupKey) -> PeriodStats {
        PeriodStats {
            key,
            count: self.count,
            head_count: self.head_count,
            avg_head_count: round2(ratio(self.head_count as f64, self.count as f64)),
            approved: self.approved,
            rejected: self.rejected,
            pending: self.pending,
            approval_rate: percentage(self.approved as f64, (self.approved + self.rejected) as f64),
            revenue: self.revenue,
            avg_certification_amount: round2(ratio(
                self.certified.to_f64().unwrap_or_default(),
                self.count as f64,
            )),
            avg_processing_hours: round2(ratio(self.hours_sum, self.timed as f64)),
            timed: self.timed,
            distinct_producers: self.producers.len(),
        }
    }
}

/// The result of [`AggregationEngine::summarize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub groups: BTreeMap<GroupKey, PeriodStats>,
    pub total: PeriodStats,
    pub excluded: usize,
}

impl Summary {
    pub fn get(&self, key: &str) -> Option<&PeriodStats> {
        self.groups.get(&GroupKey::new(key))
    }

    /// Statistics of `key`, empty when no record fell in it.
    pub fn get_or_empty(&self, key: &str) -> PeriodStats {
        self.get(key)
            .cloned()
            .unwrap_or_else(|| PeriodStats::empty(GroupKey::new(key)))
    }

    /// Groups ordered by `metric` descending, ties by key ascending.
    pub fn ranked(&self, metric: impl Fn(&PeriodStats) -> f64) -> Vec<&PeriodStats> {
        let mut rows: Vec<&PeriodStats> = self.groups.values().collect();
        sort_ranked(&mut rows, |s| metric(*s), |s| s.key.as_str());
        rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentileBand {
    Top10,
    UpperQuartile,
    UpperAverage,
    LowerAverage,
    LowerQuartile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileRank {
    pub percentile: f64,
    pub classification: PercentileBand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityShare {
    pub tier: QualityTier,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStats {
    pub model: AiModel,
    pub total: usize,
    pub successful: usize,
    pub success_rate: f64,
    pub avg_generation_seconds: f64,
}

/// Outcome of the AI logo generations in a period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoStats {
    pub total: usize,
    pub successful: usize,
    pub success_rate: f64,
    pub avg_generation_seconds: f64,
    pub by_quality: Vec<QualityShare>,
    pub by_model: Vec<ModelStats>,
    pub excluded: usize,
}

/// Processing time buckets: fast up to 24 h, normal up to 72 h, slow beyond.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingTimes {
    pub fast: usize,
    pub normal: usize,
    pub slow: usize,
}

impl ProcessingTimes {
    pub fn timed(&self) -> usize {
        self.fast + self.normal + self.slow
    }

    /// `high` when more than 60 % were fast, `medium` when more than half
    /// were normal, `low` otherwise.
    pub fn efficiency(&self) -> Level {
        let timed = self.timed() as f64;
        if ratio(self.fast as f64, timed) > 0.6 {
            Level::High
        } else if ratio(self.normal as f64, timed) > 0.5 {
            Level::Medium
        } else {
            Level::Low
        }
    }
}

/// A stateless calculator that groups record snapshots.
///
/// Every method is a single pass over its input. Records that fail validation
/// are skipped and reported through the `excluded` counters, never as errors.
#[derive(Debug, Default)]
pub struct AggregationEngine {}

impl AggregationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups `records` by the value `selector` returns and computes
    /// count/sum/avg/min/max of every requested metric per group.
    ///
    /// # Arguments
    ///
    /// * `records` - The snapshot to group.
    /// * `selector` - Returns the group of a record. `None` and blank values land
    ///   in the `UNKNOWN` bucket.
    /// * `metrics` - The numeric fields to summarise.
    pub fn group_by<R, K, F>(&self, records: &[R], selector: F, metrics: &[Metric]) -> Grouping
    where
        R: Measured,
        K: fmt::Display,
        F: Fn(&R) -> Option<K>,
    {
        let mut grouping = Grouping::default();

        for record in records {
            if let Err(reason) = record.check() {
                tracing::debug!(%reason, "Excluding record from aggregation.");
                grouping.excluded += 1;
                continue;
            }
            let key = GroupKey::from_value(selector(record));
            grouping.groups.entry(key).or_default().push(record, metrics);
            grouping.total.push(record, metrics);
        }

        grouping
    }

    pub fn group_by_dimension(
        &self,
        records: &[BrandRegistration],
        dimension: Dimension,
        metrics: &[Metric],
    ) -> Grouping {
        self.group_by(records, |r| dimension.value_of(r), metrics)
    }

    /// Builds the registration statistics of every value of `dimension`, plus the total.
    pub fn summarize(&self, records: &[BrandRegistration], dimension: Dimension) -> Summary {
        self.summarize_by(records, |r| dimension.value_of(r))
    }

    /// Like [`Self::summarize`] with an arbitrary selector.
    pub fn summarize_by<K, F>(&self, records: &[BrandRegistration], selector: F) -> Summary
    where
        K: fmt::Display,
        F: Fn(&BrandRegistration) -> Option<K>,
    {
        self.accumulate(records, |_| true, selector)
    }

    /// Summarizes the records `keep` accepts without copying them out first.
    pub fn summarize_where<P>(&self, records: &[BrandRegistration], keep: P, dimension: Dimension) -> Summary
    where
        P: Fn(&BrandRegistration) -> bool,
    {
        self.accumulate(records, keep, |r| dimension.value_of(r))
    }

    /// Totals over the records `keep` accepts.
    pub fn totals_where<P>(&self, records: &[BrandRegistration], keep: P) -> PeriodStats
    where
        P: Fn(&BrandRegistration) -> bool,
    {
        self.accumulate(records, keep, |_| Some("TOTAL")).total
    }

    /// Counts the timed registrations of `records` per processing-time bucket.
    pub fn processing_times(&self, records: &[BrandRegistration]) -> ProcessingTimes {
        let mut times = ProcessingTimes::default();
        for hours in records.iter().filter_map(|r| r.processing_hours()) {
            if hours <= FAST_HOURS {
                times.fast += 1;
            } else if hours <= NORMAL_HOURS {
                times.normal += 1;
            } else {
                times.slow += 1;
            }
        }
        times
    }

    fn accumulate<K, F, P>(&self, records: &[BrandRegistration], keep: P, selector: F) -> Summary
    where
        K: fmt::Display,
        F: Fn(&BrandRegistration) -> Option<K>,
        P: Fn(&BrandRegistration) -> bool,
    {
        let mut groups: BTreeMap<GroupKey, PeriodAccumulator> = BTreeMap::new();
        let mut total = PeriodAccumulator::default();
        let mut excluded = 0;

        for record in records.iter().filter(|r| keep(r)) {
            if let Err(reason) = record.validate() {
                tracing::debug!(brand_id = record.id, %reason, "Excluding registration from summary.");
                excluded += 1;
                continue;
            }
            groups
                .entry(GroupKey::from_value(selector(record)))
                .or_default()
                .push(record);
            total.push(record);
        }

        Summary {
            groups: groups
                .into_iter()
                .map(|(key, acc)| (key.clone(), acc.finish(key)))
                .collect(),
            total: total.finish(GroupKey::new("TOTAL")),
            excluded,
        }
    }

    /// Totals over every valid record, ignoring dimensions.
    pub fn totals(&self, records: &[BrandRegistration]) -> PeriodStats {
        self.totals_where(records, |_| true)
    }

    /// Percentage of `population` strictly below `value`.
    ///
    /// An empty population places the value at the 50th percentile.
    pub fn percentile_rank(&self, value: f64, population: &[f64]) -> PercentileRank {
        let percentile = if population.is_empty() {
            50.0
        } else {
            let below = population.iter().filter(|&&p| p < value).count();
            percentage(below as f64, population.len() as f64)
        };

        let classification = match percentile {
            p if p >= 90.0 => PercentileBand::Top10,
            p if p >= 75.0 => PercentileBand::UpperQuartile,
            p if p >= 50.0 => PercentileBand::UpperAverage,
            p if p >= 25.0 => PercentileBand::LowerAverage,
            _ => PercentileBand::LowerQuartile,
        };

        PercentileRank {
            percentile,
            classification,
        }
    }

    pub fn logo_stats(&self, logos: &[LogoGeneration]) -> LogoStats {
        let mut excluded = 0;
        let mut total = 0;
        let mut successful = 0;
        let mut seconds = 0.0;
        let mut by_quality: BTreeMap<QualityTier, usize> = BTreeMap::new();
        // (total, successful, seconds)
        let mut by_model: BTreeMap<AiModel, (usize, usize, f64)> = BTreeMap::new();

        for logo in logos {
            if let Err(reason) = logo.validate() {
                tracing::debug!(logo_id = logo.id, %reason, "Excluding logo generation.");
                excluded += 1;
                continue;
            }
            total += 1;
            seconds += logo.generation_seconds as f64;
            *by_quality.entry(logo.quality_tier).or_default() += 1;

            let model = by_model.entry(logo.ai_model).or_default();
            model.0 += 1;
            model.2 += logo.generation_seconds as f64;
            if logo.success {
                successful += 1;
                model.1 += 1;
            }
        }

        let by_quality = QualityTier::ALL
            .iter()
            .map(|&tier| {
                let count = by_quality.get(&tier).copied().unwrap_or_default();
                QualityShare {
                    tier,
                    count,
                    percentage: percentage(count as f64, total as f64),
                }
            })
            .collect();

        let mut by_model: Vec<ModelStats> = by_model
            .into_iter()
            .map(|(model, (count, ok, secs))| ModelStats {
                model,
                total: count,
                successful: ok,
                success_rate: percentage(ok as f64, count as f64),
                avg_generation_seconds: round2(ratio(secs, count as f64)),
            })
            .collect();
        sort_ranked(&mut by_model, |m| m.total as f64, |m| m.model.code());

        LogoStats {
            total,
            successful,
            success_rate: percentage(successful as f64, total as f64),
            avg_generation_seconds: round2(ratio(seconds, total as f64)),
            by_quality,
            by_model,
            excluded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::{Breed, Department, Purpose};
    use rust_decimal_macros::dec;

    fn brand(id: u64, breed: Breed, heads: u32, status: BrandStatus) -> BrandRegistration {
        BrandRegistration {
            id,
            brand_number: format!("BR-{id}"),
            producer_name: format!("Producer {id}"),
            producer_id: format!("P{}", id % 2),
            breed,
            purpose: Purpose::Meat,
            head_count: heads,
            department: Department::Beni,
            municipality: "Trinidad".into(),
            community: None,
            status,
            certification_amount: dec!(100.50),
            registered_at: Utc.with_ymd_and_hms(2024, 4, id as u32, 9, 0, 0).unwrap(),
            processed_at: None,
            processing_hours: Some(10.0 * id as f64),
        }
    }

    fn herd() -> Vec<BrandRegistration> {
        vec![
            brand(1, Breed::Nelore, 50, BrandStatus::Approved),
            brand(2, Breed::Nelore, 30, BrandStatus::Rejected),
            brand(3, Breed::Criollo, 20, BrandStatus::Approved),
        ]
    }

    #[test]
    fn group_by_breed_sums_head_counts() {
        let engine = AggregationEngine::new();
        let grouping = engine.group_by_dimension(&herd(), Dimension::Breed, &[Metric::HeadCount]);

        let nelore = grouping.get("NELORE").unwrap();
        assert_eq!(nelore.count, 2);
        assert_eq!(nelore.sum(Metric::HeadCount), 80.0);
        assert_eq!(nelore.field(Metric::HeadCount).unwrap().min, 30.0);
        assert_eq!(nelore.field(Metric::HeadCount).unwrap().avg, 40.0);
        assert_eq!(grouping.get("CRIOLLO").unwrap().sum(Metric::HeadCount), 20.0);

        let shares = grouping.shares(RankBy::Sum(Metric::HeadCount));
        // Key order: CRIOLLO, NELORE.
        assert_eq!(shares, vec![0.2, 0.8]);
    }

    #[test]
    fn partition_holds_for_every_dimension() {
        let engine = AggregationEngine::new();
        let records = herd();
        for &dimension in Dimension::ALL {
            let grouping =
                engine.group_by_dimension(&records, dimension, &[Metric::HeadCount, Metric::ProcessingHours]);
            let count: usize = grouping.groups.values().map(|g| g.count).sum();
            let heads: f64 = grouping.groups.values().map(|g| g.sum(Metric::HeadCount)).sum();
            assert_eq!(count, grouping.total.count, "{dimension}");
            assert_eq!(heads, grouping.total.sum(Metric::HeadCount), "{dimension}");
        }
    }

    #[test]
    fn blank_values_land_in_the_unknown_bucket() {
        let mut records = herd();
        records[0].municipality = "  ".into();
        let grouping = AggregationEngine::new().group_by_dimension(&records, Dimension::Municipality, &[]);
        assert_eq!(grouping.get(UNKNOWN_KEY).unwrap().count, 1);
        assert_eq!(grouping.get("Trinidad").unwrap().count, 2);
    }

    #[test]
    fn invalid_records_are_excluded_not_fatal() {
        let mut records = herd();
        records[1].head_count = 0;
        let engine = AggregationEngine::new();

        let grouping = engine.group_by_dimension(&records, Dimension::Breed, &[Metric::HeadCount]);
        assert_eq!(grouping.excluded, 1);
        assert_eq!(grouping.total.count, 2);

        let summary = engine.summarize(&records, Dimension::Breed);
        assert_eq!(summary.excluded, 1);
        assert_eq!(summary.total.head_count, 70);
    }

    #[test]
    fn ranking_breaks_ties_by_key() {
        let records = vec![
            brand(1, Breed::Nelore, 10, BrandStatus::Pending),
            brand(2, Breed::Angus, 10, BrandStatus::Pending),
            brand(3, Breed::Criollo, 40, BrandStatus::Pending),
        ];
        let grouping = AggregationEngine::new().group_by_dimension(&records, Dimension::Breed, &[Metric::HeadCount]);
        let order: Vec<&str> = grouping
            .ranked(RankBy::Sum(Metric::HeadCount))
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(order, vec!["CRIOLLO", "ANGUS", "NELORE"]);
    }

    #[test]
    fn summary_counts_revenue_from_approved_only() {
        let summary = AggregationEngine::new().summarize(&herd(), Dimension::Breed);
        let nelore = summary.get("NELORE").unwrap();
        assert_eq!(nelore.approved, 1);
        assert_eq!(nelore.rejected, 1);
        assert_eq!(nelore.approval_rate, 50.0);
        assert_eq!(nelore.revenue, dec!(100.50));
        assert_eq!(nelore.avg_processing_hours, 15.0);
        assert_eq!(summary.total.revenue, dec!(201.00));
        assert_eq!(summary.total.distinct_producers, 2);
    }

    #[test]
    fn approval_rate_without_processed_brands_is_zero() {
        let records = vec![brand(1, Breed::Nelore, 5, BrandStatus::Pending)];
        let totals = AggregationEngine::new().totals(&records);
        assert_eq!(totals.pending, 1);
        assert_eq!(totals.approval_rate, 0.0);
    }

    #[test]
    fn percentile_rank_bands() {
        let engine = AggregationEngine::new();
        let population = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(engine.percentile_rank(35.0, &population).percentile, 75.0);
        assert_eq!(
            engine.percentile_rank(35.0, &population).classification,
            PercentileBand::UpperQuartile
        );
        assert_eq!(
            engine.percentile_rank(5.0, &population).classification,
            PercentileBand::LowerQuartile
        );
        assert_eq!(engine.percentile_rank(1.0, &[]).percentile, 50.0);
    }

    #[test]
    fn unknown_dimension_is_rejected() {
        assert_eq!("calendar-month".parse::<Dimension>().unwrap(), Dimension::CalendarMonth);
        let err = "color".parse::<Dimension>().unwrap_err();
        assert_eq!(err.kind(), "invalid_dimension");
    }

    #[test]
    fn processing_times_are_bucketed() {
        let mut records = herd();
        records[0].processing_hours = Some(24.0);
        records[1].processing_hours = Some(72.5);
        records.push(brand(4, Breed::Angus, 10, BrandStatus::Pending));
        records[3].processing_hours = None;

        let times = AggregationEngine::new().processing_times(&records);
        assert_eq!(times, ProcessingTimes { fast: 1, normal: 1, slow: 1 });
        assert_eq!(times.timed(), 3);
        assert_eq!(times.efficiency(), Level::Low);
        assert_eq!(ProcessingTimes { fast: 7, normal: 3, slow: 0 }.efficiency(), Level::High);
        assert_eq!(ProcessingTimes { fast: 2, normal: 6, slow: 2 }.efficiency(), Level::Medium);
        assert_eq!(ProcessingTimes::default().efficiency(), Level::Low);
    }

    #[test]
    fn filtered_summaries_match_a_copied_subset() {
        let engine = AggregationEngine::new();
        let records = herd();
        let approved: Vec<BrandRegistration> = records
            .iter()
            .filter(|r| r.status == BrandStatus::Approved)
            .cloned()
            .collect();

        let filtered = engine.summarize_where(&records, |r| r.status == BrandStatus::Approved, Dimension::Breed);
        assert_eq!(filtered, engine.summarize(&approved, Dimension::Breed));
        assert_eq!(
            engine.totals_where(&records, |r| r.status == BrandStatus::Approved),
            engine.totals(&approved)
        );
        assert_eq!(filtered.get_or_empty("ANGUS"), PeriodStats::empty(GroupKey::new("ANGUS")));
        assert_eq!(filtered.total.avg_certification_amount, 100.5);
    }

    #[test]
    fn metric_names_parse_in_every_case_style() {
        for input in ["head_count", "head-count", "headCount", " HEADCOUNT "] {
            assert_eq!(input.parse::<Metric>().unwrap(), Metric::HeadCount);
        }
        assert_eq!("certificationAmount".parse::<Metric>().unwrap(), Metric::CertificationAmount);
        assert_eq!("weight".parse::<Metric>().unwrap_err().kind(), "invalid_dimension");
        assert!(!Metric::GenerationSeconds.applies_to_registrations());
    }

    #[test]
    fn logo_stats_by_model_and_quality() {
        let at = Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap();
        let logo = |id, model, success, tier, secs| LogoGeneration {
            id,
            brand_id: id,
            ai_model: model,
            success,
            quality_tier: tier,
            generation_seconds: secs,
            generated_at: at,
            prompt_text: String::new(),
        };
        let logos = vec![
            logo(1, AiModel::DallE3, true, QualityTier::High, 10),
            logo(2, AiModel::DallE3, false, QualityTier::Low, 20),
            logo(3, AiModel::Midjourney, true, QualityTier::High, 30),
            logo(4, AiModel::Midjourney, true, QualityTier::High, -1),
        ];
        let stats = AggregationEngine::new().logo_stats(&logos);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.excluded, 1);
        assert_eq!(stats.success_rate, 66.67);
        assert_eq!(stats.avg_generation_seconds, 20.0);
        assert_eq!(stats.by_quality[0].count, 2);
        assert_eq!(stats.by_model[0].model, AiModel::DallE3);
        assert_eq!(stats.by_model[0].success_rate, 50.0);
        assert_eq!(stats.by_model[1].success_rate, 100.0);
    }
}
