use super::{
    department_name, department_rows, month_series, purpose_rows, registrations_series, since, Input,
    ReportAssembler, Warnings,
};
use crate::aggregation::{sort_ranked, Dimension, LogoStats, PeriodStats, Summary};
use crate::period::YearMonth;
use crate::report::{
    Alert, DepartmentTrend, MainMetrics, MonthComparison, MonthlyReport, QualityMetrics,
    RegionalEfficiency, Severity,
};
use core_types::{BrandRegistration, StatusChangeEvent};
use std::collections::{BTreeSet, HashSet};

impl ReportAssembler {
    /// Monthly report for `period`.
    ///
    /// Volume figures count brands registered in the month. Approvals,
    /// rejections, revenue and processing time count brands processed in it.
    pub(super) fn monthly(&self, period: YearMonth, input: &Input<'_>, warnings: &mut Warnings) -> MonthlyReport {
        let previous = period.previous();

        let by_month = self.aggregation.summarize(&input.registrations, Dimension::Month);
        let by_processed_month = self
            .aggregation
            .summarize_by(&input.registrations, |r| r.processed_at.map(|p| YearMonth::of(&p)));
        let registered_stats = by_month.get_or_empty(&period.to_string());
        let processed_stats = by_processed_month.get_or_empty(&period.to_string());
        let previous_registered_stats = by_month.get_or_empty(&previous.to_string());
        let previous_processed_stats = by_processed_month.get_or_empty(&previous.to_string());

        let registered = input.registrations_where(|r| period.contains(&r.registered_at));
        let breeds = self.aggregation.summarize(&registered, Dimension::Breed);
        let departments = self.aggregation.summarize(&registered, Dimension::Department);
        let previous_departments = self.aggregation.summarize_where(
            &input.registrations,
            |r| previous.contains(&r.registered_at),
            Dimension::Department,
        );

        let main_metrics = MainMetrics::new(&registered_stats, &processed_stats);
        let logos = self
            .aggregation
            .logo_stats(&input.logos_where(|l| period.contains(&l.generated_at)));

        let previous_month = MonthComparison {
            previous_period: previous.to_string(),
            registrations: self
                .trends
                .compare_periods(previous_registered_stats.count as f64, registered_stats.count as f64),
            head_count: self.trends.compare_periods(
                previous_registered_stats.head_count as f64,
                registered_stats.head_count as f64,
            ),
            revenue: self
                .trends
                .compare_periods(previous_processed_stats.revenue_f64(), processed_stats.revenue_f64()),
        };

        let efficiency = warnings.degrade(
            "efficiency",
            self.scoring.efficiency(
                processed_stats.avg_processing_hours,
                processed_stats.approval_rate,
                registered_stats.count,
            ),
        );

        let history_months = since(
            period.trailing(self.settings.forecast.history_months),
            input.first_month(),
        );
        let history = registrations_series(&month_series(&by_month, &history_months));
        let forecast = warnings.degrade(
            "forecast",
            self.forecasts.forecast(&history, self.settings.forecast.horizon),
        );

        let month_events: Vec<StatusChangeEvent> = input
            .events
            .iter()
            .filter(|e| period.contains(&e.changed_at))
            .cloned()
            .collect();

        let alerts = self.monthly_alerts(&main_metrics, &previous_month, &logos);

        tracing::debug!(
            period = %period,
            registered = registered_stats.count,
            processed = processed_stats.processed(),
            status_changes = month_events.len(),
            "Monthly report computed."
        );

        MonthlyReport {
            period: period.to_string(),
            by_breed: self.breed_rows(&breeds),
            by_purpose: purpose_rows(&self.aggregation.summarize(&registered, Dimension::Purpose)),
            top_departments: department_rows(&departments, self.settings.ranking.top_departments),
            breed_concentration: self.breed_concentration(&breeds),
            regional_efficiency: self.regional_efficiency(&departments, warnings),
            department_trends: self.department_trends(&previous_departments, &departments),
            quality: self.quality(&registered, &registered_stats, &month_events),
            status_patterns: self.trends.transition_patterns(&month_events),
            main_metrics,
            logos,
            previous_month,
            efficiency,
            alerts,
            forecast,
        }
    }

    /// Efficiency of every department with registrations, best first.
    fn regional_efficiency(&self, departments: &Summary, warnings: &mut Warnings) -> Vec<RegionalEfficiency> {
        let mut rows: Vec<RegionalEfficiency> = departments
            .groups
            .values()
            .map(|stats| {
                let section = format!("regionalEfficiency.{}", stats.key.as_str());
                RegionalEfficiency {
                    department: stats.key.as_str().to_string(),
                    display_name: department_name(stats.key.as_str()),
                    registrations: stats.count,
                    approval_rate: stats.approval_rate,
                    avg_processing_hours: stats.avg_processing_hours,
                    efficiency: warnings.degrade(
                        &section,
                        self.scoring
                            .efficiency(stats.avg_processing_hours, stats.approval_rate, stats.count),
                    ),
                }
            })
            .collect();
        sort_ranked(
            &mut rows,
            |r| r.efficiency.as_ref().map_or(0.0, |e| e.score),
            |r| r.department.as_str(),
        );
        rows
    }

    /// Registrations per department against the previous month, busiest first.
    fn department_trends(&self, before: &Summary, now: &Summary) -> Vec<DepartmentTrend> {
        let keys: BTreeSet<&str> = before
            .groups
            .keys()
            .chain(now.groups.keys())
            .map(|k| k.as_str())
            .collect();

        let mut rows: Vec<DepartmentTrend> = keys
            .into_iter()
            .map(|key| {
                let count = |summary: &Summary| summary.get(key).map_or(0.0, |s| s.count as f64);
                DepartmentTrend {
                    department: key.to_string(),
                    display_name: department_name(key),
                    registrations: self.trends.compare_periods(count(before), count(now)),
                }
            })
            .collect();
        sort_ranked(&mut rows, |r| r.registrations.current, |r| r.department.as_str());
        rows
    }

    /// Outcome quality of the brands registered in the month.
    fn quality(
        &self,
        registered: &[BrandRegistration],
        stats: &PeriodStats,
        month_events: &[StatusChangeEvent],
    ) -> QualityMetrics {
        let ids: HashSet<u64> = registered.iter().map(|r| r.id).collect();
        let own_events: Vec<StatusChangeEvent> = month_events
            .iter()
            .filter(|e| ids.contains(&e.brand_id))
            .cloned()
            .collect();
        let reversals = self.trends.detect_reversals(&own_events);
        let processing_times = self.aggregation.processing_times(registered);

        QualityMetrics {
            processed: stats.processed(),
            approval_rate: stats.approval_rate,
            consistency: self.trends.consistency(&reversals, stats.processed()),
            temporal_efficiency: processing_times.efficiency(),
            processing_times,
        }
    }

    fn monthly_alerts(&self, metrics: &MainMetrics, previous: &MonthComparison, logos: &LogoStats) -> Vec<Alert> {
        let thresholds = &self.settings.alerts;
        let mut alerts = Vec::new();

        if metrics.approved + metrics.rejected > 0 && metrics.approval_rate < thresholds.min_approval_rate {
            alerts.push(Alert {
                severity: Severity::Critical,
                category: "approval",
                title: "Low approval rate".to_string(),
                message: format!(
                    "Approval rate of {:.2}% is below the {:.2}% threshold",
                    metrics.approval_rate, thresholds.min_approval_rate
                ),
            });
        }
        if metrics.avg_processing_hours > thresholds.max_processing_hours {
            alerts.push(Alert {
                severity: Severity::Warning,
                category: "processing",
                title: "Slow processing".to_string(),
                message: format!(
                    "Average processing time of {:.2} h exceeds {:.2} h",
                    metrics.avg_processing_hours, thresholds.max_processing_hours
                ),
            });
        }
        if previous.registrations.previous > 0.0
            && previous.registrations.change_percent < thresholds.registration_drop_pct
        {
            alerts.push(Alert {
                severity: Severity::Warning,
                category: "volume",
                title: "Registrations dropped".to_string(),
                message: format!(
                    "Registrations changed {:.2}% against {}",
                    previous.registrations.change_percent, previous.previous_period
                ),
            });
        }
        if logos.total > 0 && logos.success_rate < thresholds.min_logo_success_rate {
            alerts.push(Alert {
                severity: Severity::Info,
                category: "logos",
                title: "Low logo success rate".to_string(),
                message: format!(
                    "{:.2}% of logo generations succeeded, below {:.2}%",
                    logos.success_rate, thresholds.min_logo_success_rate
                ),
            });
        }

        alerts.sort_by_key(|a| a.severity);
        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::ProcessingTimes;
    use crate::assembler::ReportRequest;
    use crate::report::{Level, ReportBody};
    use crate::trend::Tendency;
    use chrono::{TimeZone, Utc};
    use core_types::{BrandStatus, Breed, Department, Purpose, Snapshot};
    use rust_decimal_macros::dec;

    fn brand(id: u64, department: Department, day: u32, status: BrandStatus, hours: Option<f64>) -> BrandRegistration {
        let registered_at = Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap();
        BrandRegistration {
            id,
            brand_number: format!("BR-{id:04}"),
            producer_name: format!("Producer {id}"),
            producer_id: format!("{}", 1000 + id),
            breed: Breed::Nelore,
            purpose: Purpose::Meat,
            head_count: 10,
            department,
            municipality: "Warnes".to_string(),
            community: None,
            status,
            certification_amount: dec!(100),
            registered_at,
            processed_at: hours.map(|h| registered_at + chrono::Duration::minutes((h * 60.0) as i64)),
            processing_hours: hours,
        }
    }

    fn monthly(snapshot: &Snapshot) -> MonthlyReport {
        let structure = ReportAssembler::default()
            .assemble(&ReportRequest::Monthly { year: 2024, month: 3 }, snapshot)
            .unwrap();
        match structure.report {
            ReportBody::Monthly(report) => *report,
            other => panic!("unexpected report body: {other:?}"),
        }
    }

    #[test]
    fn processing_times_are_bucketed() {
        let snapshot = Snapshot {
            registrations: vec![
                brand(1, Department::SantaCruz, 1, BrandStatus::Approved, Some(12.0)),
                brand(2, Department::SantaCruz, 2, BrandStatus::Approved, Some(24.0)),
                brand(3, Department::Beni, 3, BrandStatus::Rejected, Some(48.0)),
                brand(4, Department::Beni, 4, BrandStatus::Approved, Some(100.0)),
                brand(5, Department::Beni, 5, BrandStatus::Pending, None),
            ],
            ..Snapshot::default()
        };
        let report = monthly(&snapshot);
        assert_eq!(report.quality.processing_times, ProcessingTimes { fast: 2, normal: 1, slow: 1 });
        assert_eq!(report.quality.temporal_efficiency, Level::Low);
        assert_eq!(report.quality.processed, 4);
        assert_eq!(report.main_metrics.total_registrations, 5);
        assert_eq!(report.main_metrics.pending, 1);
        assert_eq!(report.main_metrics.approval_rate, 75.0);
    }

    #[test]
    fn low_approval_raises_a_critical_alert() {
        let snapshot = Snapshot {
            registrations: vec![
                brand(1, Department::LaPaz, 1, BrandStatus::Approved, Some(10.0)),
                brand(2, Department::LaPaz, 2, BrandStatus::Rejected, Some(10.0)),
            ],
            ..Snapshot::default()
        };
        let report = monthly(&snapshot);
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].severity, Severity::Critical);
        assert_eq!(report.alerts[0].category, "approval");
    }

    #[test]
    fn departments_are_compared_with_the_previous_month() {
        let mut earlier = brand(9, Department::Beni, 1, BrandStatus::Pending, None);
        earlier.registered_at = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        let snapshot = Snapshot {
            registrations: vec![
                earlier,
                brand(1, Department::SantaCruz, 1, BrandStatus::Pending, None),
                brand(2, Department::SantaCruz, 2, BrandStatus::Pending, None),
            ],
            ..Snapshot::default()
        };
        let report = monthly(&snapshot);
        let trends: Vec<&str> = report.department_trends.iter().map(|t| t.department.as_str()).collect();
        assert_eq!(trends, vec!["SANTA_CRUZ", "BENI"]);
        assert_eq!(report.department_trends[1].registrations.tendency, Tendency::Declining);
        assert_eq!(report.previous_month.previous_period, "2024-02");
        assert_eq!(report.previous_month.registrations.change_percent, 100.0);
    }

    fn change(id: u64, brand_id: u64, from: Option<BrandStatus>, to: BrandStatus, month: u32, day: u32) -> StatusChangeEvent {
        StatusChangeEvent {
            id,
            brand_id,
            from_status: from,
            to_status: to,
            changed_at: Utc.with_ymd_and_hms(2024, month, day, 10, 0, 0).unwrap(),
            responsible_user: "registrar".to_string(),
            note: None,
        }
    }

    #[test]
    fn status_patterns_cover_every_change_in_the_month() {
        let mut earlier = brand(9, Department::Beni, 1, BrandStatus::Rejected, None);
        earlier.registered_at = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        let snapshot = Snapshot {
            registrations: vec![earlier, brand(1, Department::Beni, 1, BrandStatus::InProgress, None)],
            status_events: vec![
                change(1, 9, Some(BrandStatus::Approved), BrandStatus::Rejected, 3, 12),
                change(2, 1, None, BrandStatus::Pending, 3, 1),
                change(3, 1, Some(BrandStatus::Pending), BrandStatus::InProgress, 3, 2),
                change(4, 1, Some(BrandStatus::InProgress), BrandStatus::Approved, 4, 2),
            ],
            ..Snapshot::default()
        };

        let report = monthly(&snapshot);
        let patterns = &report.status_patterns;
        assert_eq!(patterns.total_changes, 3);
        assert_eq!(patterns.flows.len(), 2);
        assert_eq!(patterns.backward_changes, 1);
        assert!(patterns.flows.iter().any(|f| f.backward && f.to == BrandStatus::Rejected));
        assert_eq!(report.quality.consistency.reversal_count, 0);
    }

    #[test]
    fn short_history_omits_the_forecast() {
        let snapshot = Snapshot {
            registrations: vec![brand(1, Department::Oruro, 1, BrandStatus::Pending, None)],
            ..Snapshot::default()
        };
        let structure = ReportAssembler::default()
            .assemble(&ReportRequest::Monthly { year: 2024, month: 3 }, &snapshot)
            .unwrap();
        assert_eq!(structure.metadata.warnings.len(), 1);
        assert_eq!(structure.metadata.warnings[0].section, "forecast");
        assert_eq!(structure.metadata.warnings[0].kind, "insufficient_data");
        match structure.report {
            ReportBody::Monthly(report) => assert!(report.forecast.is_none()),
            other => panic!("unexpected report body: {other:?}"),
        }
    }
}
