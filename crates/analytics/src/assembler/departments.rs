use super::{department_name, Input, ReportAssembler, Warnings};
use crate::aggregation::{sort_ranked, Dimension, PeriodStats, Summary};
use crate::error::AnalyticsError;
use crate::report::{
    BasicMetrics, BreedHeads, DepartmentComparisonReport, DepartmentProfile, DepartmentRankings,
    EconomicMetrics, EfficiencyMetrics, GapAnalysis, NationalSummary, PurposeShare,
};
use crate::scoring::RegionalIndicators;
use crate::stats::{money, percentage, ratio, round2};
use chrono::NaiveDate;

/// Departments needed before gaps between them mean anything.
const MIN_GAP_DEPARTMENTS: usize = 2;

impl ReportAssembler {
    /// Side-by-side comparison of the departments with registrations between
    /// `from` and `to` (registration dates, both inclusive).
    pub(super) fn departments(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        input: &Input<'_>,
        warnings: &mut Warnings,
    ) -> DepartmentComparisonReport {
        let records = input.registered_between(from, to);

        let summary = self.aggregation.summarize(&records, Dimension::Department);
        let purposes = self
            .aggregation
            .summarize_by(&records, |r| Some(format!("{}/{}", r.department.code(), r.purpose.code())));
        let breeds = self
            .aggregation
            .summarize_by(&records, |r| Some(format!("{}/{}", r.department.code(), r.breed.code())));

        let national = &summary.total;
        let mut profiles: Vec<DepartmentProfile> = summary
            .groups
            .values()
            .map(|stats| {
                let code = stats.key.as_str();
                let basic = BasicMetrics {
                    registrations: stats.count,
                    head_count: stats.head_count,
                    avg_head_count: stats.avg_head_count,
                    registration_share: percentage(stats.count as f64, national.count as f64),
                    head_share: percentage(stats.head_count as f64, national.head_count as f64),
                };
                let economics = EconomicMetrics {
                    revenue: money(stats.revenue),
                    avg_certification_amount: stats.avg_certification_amount,
                    revenue_per_head: round2(ratio(stats.revenue_f64(), stats.head_count as f64)),
                };
                let competitiveness = warnings.degrade(
                    &format!("competitiveness.{code}"),
                    self.scoring.competitiveness(&RegionalIndicators {
                        registration_share: basic.registration_share,
                        head_share: basic.head_share,
                        approval_rate: stats.approval_rate,
                        avg_head_count: stats.avg_head_count,
                        revenue_per_head: economics.revenue_per_head,
                    }),
                );

                DepartmentProfile {
                    department: code.to_string(),
                    display_name: department_name(code),
                    efficiency: efficiency_metrics(stats),
                    purposes: purpose_mix(&purposes, code, stats.count),
                    top_breeds: leading_breeds(&breeds, code, self.settings.ranking.breeds_per_department),
                    basic,
                    economics,
                    competitiveness,
                }
            })
            .collect();
        sort_ranked(&mut profiles, |p| p.basic.head_count as f64, |p| p.department.as_str());

        let rankings = rankings(&profiles);
        let gaps = warnings.degrade("gaps", self.gap_analysis(&profiles, &rankings));

        tracing::debug!(departments = profiles.len(), records = records.len(), "Department comparison computed.");

        DepartmentComparisonReport {
            from,
            to,
            national: NationalSummary {
                active_departments: profiles.len(),
                total_registrations: national.count,
                total_head_count: national.head_count,
            },
            departments: profiles,
            rankings,
            gaps,
        }
    }

    /// Absolute and relative spread between departments.
    ///
    /// # Errors
    ///
    /// `InsufficientData` with fewer than 2 departments.
    fn gap_analysis(
        &self,
        profiles: &[DepartmentProfile],
        rankings: &DepartmentRankings,
    ) -> Result<GapAnalysis, AnalyticsError> {
        if profiles.len() < MIN_GAP_DEPARTMENTS {
            return Err(AnalyticsError::insufficient("gap analysis", MIN_GAP_DEPARTMENTS, profiles.len()));
        }

        let heads: Vec<f64> = profiles.iter().map(|p| p.basic.head_count as f64).collect();
        let revenue: Vec<f64> = profiles.iter().map(|p| p.economics.revenue).collect();
        let approval: Vec<f64> = profiles.iter().map(|p| p.efficiency.approval_rate).collect();

        let head_counts = self.trends.dispersion(&heads);
        let revenues = self.trends.dispersion(&revenue);
        let index = self.concentration.concentration_of_values(&heads);

        Ok(GapAnalysis {
            // Head counts are whole numbers, so their spread is too.
            head_count_gap: head_counts.spread as u64,
            revenue_gap: revenues.spread,
            approval_rate_gap: self.trends.dispersion(&approval).spread,
            head_count_cv: head_counts.coefficient_of_variation,
            revenue_cv: revenues.coefficient_of_variation,
            inequality: head_counts.inequality,
            gini: index.gini,
            hhi: index.hhi,
            concentration: index.classification,
            leader: rankings.by_competitiveness.first().cloned().unwrap_or_default(),
            laggard: rankings.by_competitiveness.last().cloned().unwrap_or_default(),
        })
    }
}

fn efficiency_metrics(stats: &PeriodStats) -> EfficiencyMetrics {
    EfficiencyMetrics {
        approval_rate: stats.approval_rate,
        avg_processing_hours: stats.avg_processing_hours,
        active_producers: stats.distinct_producers,
        brands_per_producer: round2(ratio(stats.count as f64, stats.distinct_producers as f64)),
    }
}

/// Groups of a `department/value` summary that belong to `department`.
fn within<'a>(summary: &'a Summary, department: &str) -> impl Iterator<Item = (&'a str, &'a PeriodStats)> {
    let prefix = format!("{department}/");
    summary.groups.values().filter_map(move |stats| {
        stats
            .key
            .as_str()
            .strip_prefix(prefix.as_str())
            .map(|value| (value, stats))
    })
}

fn purpose_mix(summary: &Summary, department: &str, total: usize) -> Vec<PurposeShare> {
    let mut mix: Vec<PurposeShare> = within(summary, department)
        .map(|(purpose, stats)| PurposeShare {
            purpose: purpose.to_string(),
            total: stats.count,
            percentage: percentage(stats.count as f64, total as f64),
        })
        .collect();
    sort_ranked(&mut mix, |p| p.total as f64, |p| p.purpose.as_str());
    mix
}

fn leading_breeds(summary: &Summary, department: &str, limit: usize) -> Vec<BreedHeads> {
    let mut breeds: Vec<BreedHeads> = within(summary, department)
        .map(|(breed, stats)| BreedHeads {
            breed: breed.to_string(),
            registrations: stats.count,
            head_count: stats.head_count,
        })
        .collect();
    sort_ranked(&mut breeds, |b| b.head_count as f64, |b| b.breed.as_str());
    breeds.truncate(limit);
    breeds
}

fn rankings(profiles: &[DepartmentProfile]) -> DepartmentRankings {
    let ranked_by = |metric: fn(&DepartmentProfile) -> f64| -> Vec<String> {
        let mut order: Vec<&DepartmentProfile> = profiles.iter().collect();
        sort_ranked(&mut order, |p| metric(p), |p| p.department.as_str());
        order.into_iter().map(|p| p.department.clone()).collect()
    };

    DepartmentRankings {
        by_head_count: ranked_by(|p| p.basic.head_count as f64),
        by_approval_rate: ranked_by(|p| p.efficiency.approval_rate),
        by_revenue: ranked_by(|p| p.economics.revenue),
        by_competitiveness: ranked_by(|p| p.competitiveness.as_ref().map_or(0.0, |c| c.score)),
    }
}
