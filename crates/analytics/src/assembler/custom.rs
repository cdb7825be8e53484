use super::{Input, ReportAssembler, Warnings};
use crate::aggregation::{sort_ranked, Dimension, Metric};
use crate::error::AnalyticsError;
use crate::report::{CustomGroup, CustomReport, CustomSummary};
use crate::stats::{mean, money, percentage, round2};
use chrono::NaiveDate;

/// Groups whose registrations make up the top share.
const TOP_GROUPS: usize = 3;

impl ReportAssembler {
    /// Registrations dated between `from` and `to` grouped by `dimension`,
    /// with count/sum/avg/min/max of each metric in `metrics`.
    ///
    /// # Errors
    ///
    /// `InvalidDimension` when a metric is not recorded on brand registrations.
    pub(super) fn custom(
        &self,
        dimension: Dimension,
        metrics: &[Metric],
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        input: &Input<'_>,
        warnings: &mut Warnings,
    ) -> Result<CustomReport, AnalyticsError> {
        if let Some(metric) = metrics.iter().find(|m| !m.applies_to_registrations()) {
            return Err(AnalyticsError::InvalidDimension(format!(
                "metric {metric} is not recorded on brand registrations"
            )));
        }

        let records = input.registered_between(from, to);
        let summary = self.aggregation.summarize(&records, dimension);
        let measured = self.aggregation.group_by_dimension(&records, dimension, metrics);
        let total = summary.total.count as f64;

        let mut groups: Vec<CustomGroup> = summary
            .groups
            .values()
            .map(|stats| CustomGroup {
                key: stats.key.to_string(),
                registrations: stats.count,
                head_count: stats.head_count,
                avg_head_count: stats.avg_head_count,
                approval_rate: stats.approval_rate,
                revenue: money(stats.revenue),
                avg_processing_hours: stats.avg_processing_hours,
                producers: stats.distinct_producers,
                share_percent: percentage(stats.count as f64, total),
                metrics: measured
                    .groups
                    .get(&stats.key)
                    .map(|g| g.fields.iter().map(|(m, f)| (*m, f.rounded())).collect())
                    .unwrap_or_default(),
            })
            .collect();
        if !dimension.is_temporal() {
            sort_ranked(&mut groups, |g| g.registrations as f64, |g| g.key.as_str());
        }

        let statistics = warnings.degrade("summary", self.custom_summary(&groups));

        tracing::debug!(
            dimension = %dimension,
            metrics = metrics.len(),
            groups = groups.len(),
            records = records.len(),
            "Custom report computed."
        );

        Ok(CustomReport {
            dimension: dimension.key(),
            metrics: metrics.to_vec(),
            from,
            to,
            total_registrations: summary.total.count,
            groups,
            summary: statistics,
        })
    }

    /// Spread of the registrations across `groups`.
    ///
    /// # Errors
    ///
    /// `InsufficientData` when there are no groups.
    fn custom_summary(&self, groups: &[CustomGroup]) -> Result<CustomSummary, AnalyticsError> {
        if groups.is_empty() {
            return Err(AnalyticsError::insufficient("custom report summary", 1, 0));
        }

        let counts: Vec<f64> = groups.iter().map(|g| g.registrations as f64).collect();
        let mut largest = counts.clone();
        largest.sort_by(|a, b| b.total_cmp(a));
        let top: f64 = largest.iter().take(TOP_GROUPS).sum();

        let mut by_heads: Vec<&CustomGroup> = groups.iter().collect();
        sort_ranked(&mut by_heads, |g| g.head_count as f64, |g| g.key.as_str());

        Ok(CustomSummary {
            groups: groups.len(),
            leader: by_heads.first().map(|g| g.key.clone()).unwrap_or_default(),
            max_registrations: groups.iter().map(|g| g.registrations).max().unwrap_or_default(),
            min_registrations: groups.iter().map(|g| g.registrations).min().unwrap_or_default(),
            avg_registrations: round2(mean(&counts)),
            top3_share: percentage(top, counts.iter().sum()),
            concentration: self.concentration.concentration_of_values(&counts),
        })
    }
}
