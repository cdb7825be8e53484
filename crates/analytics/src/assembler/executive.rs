use super::{department_rows, month_series, registrations_series, since, Input, ReportAssembler, Warnings};
use crate::aggregation::{Dimension, LogoStats, Metric, RankBy, Summary};
use crate::error::AnalyticsError;
use crate::period::YearMonth;
use crate::report::{
    Alert, BreedPerformer, ExecutiveDashboard, KpiVariation, Kpis, PreviousMonth, ProducerPerformer,
    Severity, TopPerformers,
};
use crate::scoring::{HealthIndicators, SustainabilityScore, SystemHealth};
use crate::stats::{money, percentage, ratio, round2};
use chrono::{DateTime, Datelike, Duration, Utc};
use core_types::{BrandRegistration, Department};

/// Length of the window system health is measured over.
const HEALTH_WINDOW_DAYS: i64 = 30;

impl ReportAssembler {
    /// Dashboard of the month containing `as_of`, up to `as_of` itself.
    pub(super) fn executive(&self, as_of: DateTime<Utc>, input: &Input<'_>, warnings: &mut Warnings) -> ExecutiveDashboard {
        let period = YearMonth::of(&as_of);
        let previous = period.previous();
        let month_start = period.start().unwrap_or(as_of);

        let current = input.registrations_where(|r| r.registered_at >= month_start && r.registered_at <= as_of);
        let departments = self.aggregation.summarize(&current, Dimension::Department);
        let breeds = self.aggregation.summarize(&current, Dimension::Breed);
        let logos = self
            .aggregation
            .logo_stats(&input.logos_where(|l| l.generated_at >= month_start && l.generated_at <= as_of));
        let kpis = self.kpis(&departments, breeds.groups.len(), &logos, f64::from(as_of.day()));

        let previous_days = match (previous.start(), period.start()) {
            (Some(from), Some(to)) => (to - from).num_days() as f64,
            _ => 30.0,
        };
        let in_previous = |r: &BrandRegistration| previous.contains(&r.registered_at);
        let previous_breeds = self
            .aggregation
            .summarize_where(&input.registrations, in_previous, Dimension::Breed);
        let previous_kpis = self.kpis(
            &self
                .aggregation
                .summarize_where(&input.registrations, in_previous, Dimension::Department),
            previous_breeds.groups.len(),
            &self
                .aggregation
                .logo_stats(&input.logos_where(|l| previous.contains(&l.generated_at))),
            previous_days,
        );

        let purposes = self.aggregation.summarize(&current, Dimension::Purpose).groups.len();
        let momentum = warnings.degrade(
            "momentum",
            self.scoring
                .momentum(kpis.active_departments, kpis.breeds, purposes, kpis.total_registrations),
        );

        let history_months = since(
            previous.trailing(self.settings.forecast.history_months),
            input.first_month(),
        );
        let by_month = self.aggregation.summarize(&input.registrations, Dimension::Month);
        let history = registrations_series(&month_series(&by_month, &history_months));
        let forecast = warnings.degrade(
            "forecast",
            self.forecasts.forecast(&history, self.settings.forecast.horizon),
        );

        tracing::debug!(as_of = %as_of, registrations = kpis.total_registrations, "Executive dashboard computed.");

        ExecutiveDashboard {
            as_of,
            alerts: self.dashboard_alerts(as_of, input, &kpis),
            top_performers: self.top_performers(&current, &departments, &breeds),
            system_health: warnings.degrade("systemHealth", self.health(as_of, input)),
            sustainability: warnings.degrade("sustainability", self.sustainability(as_of, input)),
            previous_month: PreviousMonth {
                period: previous.to_string(),
                variations: self.variations(&previous_kpis, &kpis),
                kpis: previous_kpis,
            },
            current_month: kpis,
            momentum,
            forecast,
        }
    }

    /// KPIs of a period from its by-department summary.
    fn kpis(&self, departments: &Summary, breeds: usize, logos: &LogoStats, days: f64) -> Kpis {
        let stats = &departments.total;
        let active_departments = departments.groups.len();
        let revenue = stats.revenue_f64();

        Kpis {
            total_registrations: stats.count,
            total_head_count: stats.head_count,
            avg_head_per_brand: stats.avg_head_count,
            registrations_per_day: round2(ratio(stats.count as f64, days)),
            processed: stats.processed(),
            approved: stats.approved,
            rejected: stats.rejected,
            pending: stats.pending,
            approval_rate: stats.approval_rate,
            rejection_rate: percentage(stats.rejected as f64, stats.processed() as f64),
            pending_rate: percentage(stats.pending as f64, stats.count as f64),
            revenue: money(stats.revenue),
            revenue_per_approved: round2(ratio(revenue, stats.approved as f64)),
            revenue_per_head: round2(ratio(revenue, stats.head_count as f64)),
            avg_processing_hours: stats.avg_processing_hours,
            active_departments,
            breeds,
            unique_producers: stats.distinct_producers,
            geographic_diversity: percentage(active_departments as f64, Department::ALL.len() as f64),
            logos: logos.total,
            successful_logos: logos.successful,
            logo_success_rate: logos.success_rate,
            ai_adoption: percentage(logos.total as f64, stats.count as f64),
        }
    }

    fn variations(&self, previous: &Kpis, current: &Kpis) -> Vec<KpiVariation> {
        let pairs: [(&'static str, f64, f64); 6] = [
            ("registrations", previous.total_registrations as f64, current.total_registrations as f64),
            ("headCount", previous.total_head_count as f64, current.total_head_count as f64),
            ("approved", previous.approved as f64, current.approved as f64),
            ("revenue", previous.revenue, current.revenue),
            ("avgProcessingHours", previous.avg_processing_hours, current.avg_processing_hours),
            ("approvalRate", previous.approval_rate, current.approval_rate),
        ];
        pairs
            .into_iter()
            .map(|(metric, before, now)| KpiVariation {
                metric,
                comparison: self.trends.compare_periods(before, now),
            })
            .collect()
    }

    fn dashboard_alerts(&self, as_of: DateTime<Utc>, input: &Input<'_>, kpis: &Kpis) -> Vec<Alert> {
        let thresholds = &self.settings.alerts;
        let mut alerts = Vec::new();

        let stale_before = as_of - Duration::days(thresholds.stale_pending_days);
        let stale = input
            .registrations
            .iter()
            .filter(|r| !r.status.is_processed() && r.registered_at < stale_before)
            .count();
        if stale > thresholds.max_stale_pending {
            alerts.push(Alert {
                severity: Severity::Critical,
                category: "backlog",
                title: "Pending backlog".to_string(),
                message: format!(
                    "{stale} registrations have waited more than {} days",
                    thresholds.stale_pending_days
                ),
            });
        }

        let recent_from = as_of - Duration::days(thresholds.recent_window_days);
        let recent = self.aggregation.totals_where(&input.registrations, |r| {
            r.status.is_processed() && r.processed_at.is_some_and(|p| p >= recent_from && p <= as_of)
        });
        if recent.processed() > 0 && recent.approval_rate < thresholds.min_recent_approval_rate {
            alerts.push(Alert {
                severity: Severity::Warning,
                category: "approval",
                title: "Low recent approval rate".to_string(),
                message: format!(
                    "{:.2}% approved in the last {} days",
                    recent.approval_rate, thresholds.recent_window_days
                ),
            });
        }
        if recent.timed > 0 && recent.avg_processing_hours > thresholds.max_recent_processing_hours {
            alerts.push(Alert {
                severity: Severity::Warning,
                category: "processing",
                title: "Slow recent processing".to_string(),
                message: format!(
                    "Average processing time of {:.2} h in the last {} days",
                    recent.avg_processing_hours, thresholds.recent_window_days
                ),
            });
        }

        let logo_from = as_of - Duration::days(thresholds.logo_window_days);
        let logos = self
            .aggregation
            .logo_stats(&input.logos_where(|l| l.generated_at >= logo_from && l.generated_at <= as_of));
        let failure_rate = round2(100.0 - logos.success_rate);
        if logos.total > 0 && failure_rate > thresholds.max_logo_failure_rate {
            alerts.push(Alert {
                severity: Severity::Info,
                category: "logos",
                title: "Logo generation failures".to_string(),
                message: format!(
                    "{failure_rate:.2}% of logo generations failed in the last {} days",
                    thresholds.logo_window_days
                ),
            });
        }

        let inactive = Department::ALL.len().saturating_sub(kpis.active_departments);
        if inactive > thresholds.max_inactive_departments {
            alerts.push(Alert {
                severity: Severity::Info,
                category: "coverage",
                title: "Inactive departments".to_string(),
                message: format!("{inactive} departments have no registrations this month"),
            });
        }

        alerts.sort_by_key(|a| a.severity);
        alerts
    }

    fn top_performers(&self, records: &[BrandRegistration], departments: &Summary, breeds: &Summary) -> TopPerformers {
        let ranking = &self.settings.ranking;

        let total = breeds.total.count as f64;
        let breeds = breeds
            .ranked(|s| s.count as f64)
            .into_iter()
            .take(ranking.top_breeds)
            .map(|s| BreedPerformer {
                breed: s.key.as_str().to_string(),
                total_registrations: s.count,
                total_head_count: s.head_count,
                market_share_percent: percentage(s.count as f64, total),
            })
            .collect();

        let producers = self
            .aggregation
            .summarize_by(records, |r| Some(format!("{}/{}", r.producer_id, r.department.code())));
        let producers = producers
            .ranked(|s| s.head_count as f64)
            .into_iter()
            .take(ranking.top_producers)
            .enumerate()
            .map(|(idx, s)| {
                let (producer_id, department) = s.key.as_str().rsplit_once('/').unwrap_or((s.key.as_str(), ""));
                ProducerPerformer {
                    rank: idx + 1,
                    identifier: anonymize(producer_id),
                    department: department.to_string(),
                    total_brands: s.count,
                    total_head_count: s.head_count,
                    avg_head_per_brand: s.avg_head_count,
                }
            })
            .collect();

        TopPerformers {
            departments: department_rows(departments, ranking.top_departments),
            breeds,
            producers,
        }
    }

    /// Operational health over the 30 days up to `as_of`.
    fn health(
        &self,
        as_of: DateTime<Utc>,
        input: &Input<'_>,
    ) -> Result<SystemHealth, AnalyticsError> {
        let from = as_of - Duration::days(HEALTH_WINDOW_DAYS);
        let window = self
            .aggregation
            .totals_where(&input.registrations, |r| r.registered_at > from && r.registered_at <= as_of);
        let logos = input
            .logos
            .iter()
            .filter(|l| l.generated_at > from && l.generated_at <= as_of)
            .count();

        self.scoring.system_health(&HealthIndicators {
            avg_processing_hours: (window.timed > 0).then_some(window.avg_processing_hours),
            approval_rate: (window.processed() > 0).then_some(window.approval_rate),
            daily_registrations: window.count as f64 / HEALTH_WINDOW_DAYS as f64,
            logos,
            registrations: window.count,
        })
    }

    /// Sustainability of the year to date.
    fn sustainability(
        &self,
        as_of: DateTime<Utc>,
        input: &Input<'_>,
    ) -> Result<SustainabilityScore, AnalyticsError> {
        let year = input.registrations_where(|r| r.registered_at.year() == as_of.year() && r.registered_at <= as_of);

        let purposes = self.aggregation.group_by_dimension(&year, Dimension::Purpose, &[]);
        let breeds = self
            .aggregation
            .group_by_dimension(&year, Dimension::Breed, &[Metric::HeadCount]);
        let departments = self.aggregation.summarize(&year, Dimension::Department).groups.len();

        self.scoring.sustainability(
            &purposes.shares(RankBy::Count),
            departments,
            &breeds.shares(RankBy::Sum(Metric::HeadCount)),
        )
    }
}

/// `Producer-` followed by the last 4 characters of the producer id.
fn anonymize(producer_id: &str) -> String {
    let chars: Vec<char> = producer_id.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("Producer-{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::ReportRequest;
    use crate::report::ReportBody;
    use crate::trend::Tendency;
    use chrono::TimeZone;
    use core_types::{AiModel, BrandStatus, Breed, LogoGeneration, Purpose, QualityTier, Snapshot};
    use rust_decimal::Decimal;

    fn brand(id: u64, department: Department, registered_at: DateTime<Utc>, status: BrandStatus) -> BrandRegistration {
        BrandRegistration {
            id,
            brand_number: format!("EX-{id:04}"),
            producer_name: format!("Producer {id}"),
            producer_id: format!("CI-00{}", 12345 + id),
            breed: Breed::Nelore,
            purpose: Purpose::Meat,
            head_count: 10 * id as u32,
            department,
            municipality: "Municipio".to_string(),
            community: None,
            status,
            certification_amount: Decimal::from(100),
            registered_at,
            processed_at: status
                .is_processed()
                .then(|| registered_at + Duration::hours(12)),
            processing_hours: None,
        }
    }

    fn logo(id: u64, success: bool, generated_at: DateTime<Utc>) -> LogoGeneration {
        LogoGeneration {
            id,
            brand_id: id,
            ai_model: AiModel::DallE3,
            success,
            quality_tier: QualityTier::Medium,
            generation_seconds: 15,
            generated_at,
            prompt_text: String::new(),
        }
    }

    fn dashboard(snapshot: &Snapshot, as_of: DateTime<Utc>) -> ExecutiveDashboard {
        let structure = ReportAssembler::default()
            .assemble(&ReportRequest::Executive { as_of }, snapshot)
            .unwrap();
        match structure.report {
            ReportBody::Executive(report) => *report,
            other => panic!("unexpected report body: {other:?}"),
        }
    }

    #[test]
    fn anonymizes_to_the_last_four_characters() {
        assert_eq!(anonymize("CI-0012346"), "Producer-2346");
        assert_eq!(anonymize("77"), "Producer-77");
    }

    #[test]
    fn current_month_kpis_and_variations() {
        let as_of = Utc.with_ymd_and_hms(2024, 6, 10, 18, 0, 0).unwrap();
        let day = |d: u32| Utc.with_ymd_and_hms(2024, 6, d, 9, 0, 0).unwrap();
        let snapshot = Snapshot {
            registrations: vec![
                brand(1, Department::SantaCruz, day(2), BrandStatus::Approved),
                brand(2, Department::SantaCruz, day(3), BrandStatus::Rejected),
                brand(3, Department::Beni, day(4), BrandStatus::Approved),
                brand(4, Department::Beni, day(5), BrandStatus::Pending),
                brand(5, Department::LaPaz, Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap(), BrandStatus::Approved),
                // After the reference instant.
                brand(6, Department::LaPaz, day(20), BrandStatus::Pending),
            ],
            logos: vec![logo(1, true, day(2)), logo(2, false, day(3))],
            ..Snapshot::default()
        };

        let dashboard = dashboard(&snapshot, as_of);
        let kpis = &dashboard.current_month;
        assert_eq!(kpis.total_registrations, 4);
        assert_eq!(kpis.registrations_per_day, 0.4);
        assert_eq!(kpis.approval_rate, 66.67);
        assert_eq!(kpis.pending_rate, 25.0);
        assert_eq!(kpis.active_departments, 2);
        assert_eq!(kpis.geographic_diversity, 22.22);
        assert_eq!(kpis.ai_adoption, 50.0);
        assert_eq!(kpis.revenue_per_approved, 100.0);

        assert_eq!(dashboard.previous_month.period, "2024-05");
        assert_eq!(dashboard.previous_month.kpis.total_registrations, 1);
        let registrations = &dashboard.previous_month.variations[0];
        assert_eq!(registrations.metric, "registrations");
        assert_eq!(registrations.comparison.tendency, Tendency::Improving);

        let producers = &dashboard.top_performers.producers;
        assert_eq!(producers[0].rank, 1);
        assert_eq!(producers[0].total_head_count, 40);
        assert_eq!(producers[0].identifier, "Producer-2349");
        assert_eq!(dashboard.top_performers.departments[0].department, "BENI");
    }

    #[test]
    fn alerts_are_sorted_by_severity() {
        let as_of = Utc.with_ymd_and_hms(2024, 6, 28, 12, 0, 0).unwrap();
        let mut registrations: Vec<BrandRegistration> = (1..=51)
            .map(|id| brand(id, Department::Oruro, Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(), BrandStatus::Pending))
            .collect();
        registrations.push(brand(100, Department::Oruro, Utc.with_ymd_and_hms(2024, 6, 26, 8, 0, 0).unwrap(), BrandStatus::Rejected));
        let snapshot = Snapshot {
            registrations,
            ..Snapshot::default()
        };

        let dashboard = dashboard(&snapshot, as_of);
        let categories: Vec<&str> = dashboard.alerts.iter().map(|a| a.category).collect();
        assert_eq!(categories, vec!["backlog", "approval", "coverage"]);
        let severities: Vec<Severity> = dashboard.alerts.iter().map(|a| a.severity).collect();
        assert_eq!(severities, vec![Severity::Critical, Severity::Warning, Severity::Info]);
    }
}
