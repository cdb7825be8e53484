use super::{department_rows, month_series, months_between, registrations_series, Input, ReportAssembler, Warnings};
use crate::aggregation::{sort_ranked, Dimension, PeriodStats, Summary};
use crate::period::YearMonth;
use crate::report::{AnnualReport, GrowthInterpretation, MainMetrics, MonthEfficiency, MonthRow, YearOverYear};
use crate::stats::{money, ratio, round2};
use crate::trend::{GrowthRate, MonthlyPoint};
use chrono::Datelike;
use core_types::BrandRegistration;

impl ReportAssembler {
    /// Annual report for `year`, over brands registered during that year.
    pub(super) fn annual(&self, year: i32, input: &Input<'_>, warnings: &mut Warnings) -> AnnualReport {
        let by_year = self.aggregation.summarize(&input.registrations, Dimension::Year);
        let by_month = self.aggregation.summarize(&input.registrations, Dimension::Month);
        let stats = by_year.get_or_empty(&year.to_string());
        let previous = by_year.get_or_empty(&(year - 1).to_string());

        let in_year = input.registrations_where(|r| r.registered_at.year() == year);
        let monthly = month_series(&by_month, &YearMonth::months_of(year));
        let series = registrations_series(&monthly);

        let registrations = self
            .trends
            .compare_periods(previous.count as f64, stats.count as f64);
        let year_over_year = YearOverYear {
            previous_year: year - 1,
            interpretation: GrowthInterpretation::of(&registrations),
            registrations,
            head_count: self
                .trends
                .compare_periods(previous.head_count as f64, stats.head_count as f64),
            revenue: self
                .trends
                .compare_periods(previous.revenue_f64(), stats.revenue_f64()),
        };

        let efficiency = warnings.degrade(
            "efficiency",
            self.scoring
                .efficiency(stats.avg_processing_hours, stats.approval_rate, stats.count),
        );
        let trend = warnings.degrade("trend", self.trends.classify_trend(&series));
        let seasonality = warnings.degrade(
            "seasonality",
            self.trends
                .detect_seasonality(&seasonal_points(year, input, &by_month)),
        );
        let forecast = warnings.degrade(
            "forecast",
            self.forecasts
                .forecast(&series, self.settings.forecast.annual_horizon),
        );

        tracing::debug!(year, registrations = stats.count, "Annual report computed.");

        AnnualReport {
            year,
            main_metrics: MainMetrics::new(&stats, &stats),
            revenue_per_brand: round2(ratio(stats.revenue_f64(), stats.count as f64)),
            months: self.month_rows(&in_year, &monthly),
            by_department: department_rows(
                &self.aggregation.summarize(&in_year, Dimension::Department),
                usize::MAX,
            ),
            by_breed: self.breed_rows(&self.aggregation.summarize(&in_year, Dimension::Breed)),
            year_over_year,
            efficiency,
            monthly_efficiency: monthly_efficiency(&monthly),
            logos: self
                .aggregation
                .logo_stats(&input.logos_where(|l| l.generated_at.year() == year)),
            trend,
            seasonality,
            growth: self.growth(year, input, &by_year),
            forecast,
        }
    }

    /// One row per calendar month with the department that registered most.
    fn month_rows(&self, records: &[BrandRegistration], monthly: &[PeriodStats]) -> Vec<MonthRow> {
        let by_department = self.aggregation.summarize_by(records, |r| {
            Some(format!("{}/{}", YearMonth::of(&r.registered_at), r.department.code()))
        });

        monthly
            .iter()
            .enumerate()
            .map(|(idx, stats)| {
                let prefix = format!("{}/", stats.key.as_str());
                let mut candidates: Vec<&PeriodStats> = by_department
                    .groups
                    .values()
                    .filter(|s| s.key.as_str().starts_with(&prefix))
                    .collect();
                sort_ranked(&mut candidates, |s| s.count as f64, |s| s.key.as_str());

                MonthRow {
                    month: idx as u32 + 1,
                    registrations: stats.count,
                    head_count: stats.head_count,
                    revenue: money(stats.revenue),
                    leading_department: candidates
                        .first()
                        .map(|s| s.key.as_str()[prefix.len()..].to_string()),
                }
            })
            .collect()
    }

    /// CAGR of yearly registrations from the first year on record to `year`.
    fn growth(&self, year: i32, input: &Input<'_>, by_year: &Summary) -> GrowthRate {
        let Some(first) = input.first_month().filter(|m| m.year < year) else {
            return self.trends.cagr(0.0, 0.0, 0);
        };
        let count = |y: i32| by_year.get(&y.to_string()).map_or(0.0, |s| s.count as f64);
        self.trends
            .cagr(count(first.year), count(year), (year - first.year) as usize)
    }
}

/// Monthly registration counts from the first month on record up to the
/// end of `year`, skipping months without registrations.
fn seasonal_points(year: i32, input: &Input<'_>, by_month: &Summary) -> Vec<MonthlyPoint> {
    let Some(first) = input.first_month() else {
        return Vec::new();
    };
    months_between(first, YearMonth { year, month: 12 })
        .into_iter()
        .filter_map(|ym| {
            by_month.get(&ym.to_string()).map(|s| MonthlyPoint {
                year: ym.year,
                month: ym.month,
                value: s.count as f64,
            })
        })
        .collect()
}

fn monthly_efficiency(monthly: &[PeriodStats]) -> Vec<MonthEfficiency> {
    monthly
        .iter()
        .enumerate()
        .filter(|(_, s)| s.processed() > 0)
        .map(|(idx, s)| MonthEfficiency {
            month: idx as u32 + 1,
            processed: s.processed(),
            approval_rate: s.approval_rate,
            avg_processing_hours: s.avg_processing_hours,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::ReportRequest;
    use crate::report::ReportBody;
    use crate::trend::{Outlook, TrendDirection};
    use chrono::{TimeZone, Utc};
    use core_types::{BrandStatus, Breed, Department, Purpose, Snapshot};
    use rust_decimal_macros::dec;

    fn brand(id: u64, year: i32, month: u32, department: Department) -> BrandRegistration {
        let registered_at = Utc.with_ymd_and_hms(year, month, 5, 10, 0, 0).unwrap();
        BrandRegistration {
            id,
            brand_number: format!("BR-{id:04}"),
            producer_name: format!("Producer {id}"),
            producer_id: format!("{}", 5000 + id),
            breed: Breed::Brahman,
            purpose: Purpose::Dual,
            head_count: 20,
            department,
            municipality: "Trinidad".to_string(),
            community: None,
            status: BrandStatus::Approved,
            certification_amount: dec!(250),
            registered_at,
            processed_at: Some(registered_at + chrono::Duration::hours(30)),
            processing_hours: None,
        }
    }

    fn annual(snapshot: &Snapshot, year: i32) -> (AnnualReport, usize) {
        let structure = ReportAssembler::default()
            .assemble(&ReportRequest::Annual { year }, snapshot)
            .unwrap();
        let warnings = structure.metadata.warnings.len();
        match structure.report {
            ReportBody::Annual(report) => (*report, warnings),
            other => panic!("unexpected report body: {other:?}"),
        }
    }

    #[test]
    fn months_and_year_over_year() {
        let mut registrations = vec![brand(1, 2023, 6, Department::Beni)];
        let mut id = 10;
        for month in 1..=12 {
            for _ in 0..month {
                registrations.push(brand(id, 2024, month, Department::Beni));
                id += 1;
            }
        }
        registrations.push(brand(999, 2024, 12, Department::Pando));
        let snapshot = Snapshot {
            registrations,
            ..Snapshot::default()
        };

        let (report, warnings) = annual(&snapshot, 2024);
        assert_eq!(warnings, 0);
        assert_eq!(report.months.len(), 12);
        assert_eq!(report.months[11].registrations, 13);
        assert_eq!(report.months[11].leading_department.as_deref(), Some("BENI"));
        assert_eq!(report.main_metrics.total_registrations, 79);
        assert_eq!(report.year_over_year.previous_year, 2023);
        assert_eq!(
            report.year_over_year.interpretation,
            GrowthInterpretation::ExceptionalGrowth
        );
        assert_eq!(report.trend.as_ref().unwrap().direction, TrendDirection::Growing);
        assert_eq!(report.seasonality.as_ref().unwrap().peak_month, 12);
        assert_eq!(report.growth.intervals, 1);
        assert_eq!(report.growth.outlook, Outlook::Positive);
        assert_eq!(report.monthly_efficiency.len(), 12);
        assert_eq!(report.forecast.as_ref().unwrap().projections.len(), 12);
        assert_eq!(report.revenue_per_brand, 250.0);
    }

    #[test]
    fn sparse_year_degrades_seasonality() {
        let snapshot = Snapshot {
            registrations: vec![
                brand(1, 2024, 1, Department::Tarija),
                brand(2, 2024, 2, Department::Tarija),
            ],
            ..Snapshot::default()
        };
        let (report, warnings) = annual(&snapshot, 2024);
        assert_eq!(warnings, 1);
        assert!(report.seasonality.is_none());
        assert_eq!(
            report.year_over_year.interpretation,
            GrowthInterpretation::FirstYear
        );
        assert_eq!(report.growth.cagr, 0.0);
        assert_eq!(report.months[0].leading_department.as_deref(), Some("TARIJA"));
        assert_eq!(report.months[5].leading_department, None);
    }
}
