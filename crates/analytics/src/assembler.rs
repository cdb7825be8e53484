use crate::aggregation::{sort_ranked, AggregationEngine, Dimension, Metric, PeriodStats, Summary};
use crate::concentration::{ConcentrationAnalyzer, ConcentrationIndex};
use crate::error::{AnalyticsError, ReportWarning};
use crate::forecast::ForecastEngine;
use crate::period::YearMonth;
use crate::report::{
    BreedRow, DepartmentRow, PurposeRow, ReportBody, ReportMetadata, ReportStructure, ReportType,
};
use crate::scoring::ScoringEngine;
use crate::stats::{money, percentage, ratio};
use crate::trend::TrendAnalyzer;
use chrono::{DateTime, NaiveDate, Utc};
use configuration::ReportSettings;
use core_types::{BrandRegistration, Department, LogoGeneration, Snapshot, StatusChangeEvent};

mod annual;
mod custom;
mod departments;
mod executive;
mod monthly;
mod producer;

/// What to build, with every parameter the report depends on.
///
/// The engine has no clock: the executive dashboard receives its reference
/// instant explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportRequest {
    Monthly { year: i32, month: u32 },
    Annual { year: i32 },
    Departments { from: Option<NaiveDate>, to: Option<NaiveDate> },
    Producer { brand_id: u64 },
    Executive { as_of: DateTime<Utc> },
    /// Registrations between `from` and `to` grouped by `dimension`, with
    /// statistics of each requested metric.
    Custom {
        dimension: Dimension,
        metrics: Vec<Metric>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

impl ReportRequest {
    pub fn report_type(&self) -> ReportType {
        match self {
            ReportRequest::Monthly { .. } => ReportType::Monthly,
            ReportRequest::Annual { .. } => ReportType::Annual,
            ReportRequest::Departments { .. } => ReportType::Departments,
            ReportRequest::Producer { .. } => ReportType::Producer,
            ReportRequest::Executive { .. } => ReportType::Executive,
            ReportRequest::Custom { .. } => ReportType::Custom,
        }
    }
}

/// Composes the outputs of the calculation components into report structures.
///
/// Component failures never fail a report. The affected section is left
/// `null` and the failure is listed in `metadata.warnings`.
#[derive(Debug, Default)]
pub struct ReportAssembler {
    settings: ReportSettings,
    aggregation: AggregationEngine,
    concentration: ConcentrationAnalyzer,
    trends: TrendAnalyzer,
    forecasts: ForecastEngine,
    scoring: ScoringEngine,
}

impl ReportAssembler {
    pub fn new(settings: ReportSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Builds the report described by `request` from `snapshot`.
    ///
    /// Invalid records are dropped once, up front, and counted in
    /// `metadata.excludedRecords`.
    ///
    /// # Errors
    ///
    /// * `RecordNotFound` when a producer report names a brand absent from the snapshot.
    /// * `InvalidDimension` when a monthly report names a month outside `1..=12`,
    ///   or a custom report asks for a metric registrations do not carry.
    pub fn assemble(
        &self,
        request: &ReportRequest,
        snapshot: &Snapshot,
    ) -> Result<ReportStructure, AnalyticsError> {
        let input = Input::from_snapshot(snapshot);
        let mut warnings = Warnings::default();
        let report_type = request.report_type();

        let report = match request {
            ReportRequest::Monthly { year, month } => {
                let period = YearMonth::new(*year, *month).ok_or_else(|| {
                    AnalyticsError::InvalidDimension(format!("month {month} is outside 1..=12"))
                })?;
                ReportBody::Monthly(Box::new(self.monthly(period, &input, &mut warnings)))
            }
            ReportRequest::Annual { year } => {
                ReportBody::Annual(Box::new(self.annual(*year, &input, &mut warnings)))
            }
            ReportRequest::Departments { from, to } => ReportBody::Departments(Box::new(
                self.departments(*from, *to, &input, &mut warnings),
            )),
            ReportRequest::Producer { brand_id } => {
                ReportBody::Producer(Box::new(self.producer(*brand_id, &input)?))
            }
            ReportRequest::Executive { as_of } => {
                ReportBody::Executive(Box::new(self.executive(*as_of, &input, &mut warnings)))
            }
            ReportRequest::Custom {
                dimension,
                metrics,
                from,
                to,
            } => ReportBody::Custom(Box::new(
                self.custom(*dimension, metrics, *from, *to, &input, &mut warnings)?,
            )),
        };

        let warnings = warnings.into_inner();
        tracing::info!(
            report_type = ?report_type,
            excluded = input.excluded,
            warnings = warnings.len(),
            "Report assembled."
        );

        Ok(ReportStructure {
            metadata: ReportMetadata {
                report_type,
                excluded_records: input.excluded,
                warnings,
            },
            report,
        })
    }

    /// By-breed rows ranked by head count.
    fn breed_rows(&self, breeds: &Summary) -> Vec<BreedRow> {
        let total_heads = breeds.total.head_count as f64;
        let mut rows: Vec<BreedRow> = breeds
            .groups
            .values()
            .map(|stats| {
                let share = ratio(stats.head_count as f64, total_heads);
                BreedRow {
                    breed: stats.key.as_str().to_string(),
                    total_registrations: stats.count,
                    total_head_count: stats.head_count,
                    approval_rate: stats.approval_rate,
                    market_share_percent: percentage(stats.head_count as f64, total_heads),
                    hhi_contribution: self.concentration.hhi_contribution(share),
                }
            })
            .collect();
        sort_ranked(&mut rows, |r| r.total_head_count as f64, |r| r.breed.as_str());
        rows
    }

    /// Concentration of the head count across breeds.
    fn breed_concentration(&self, breeds: &Summary) -> ConcentrationIndex {
        let heads: Vec<f64> = breeds.groups.values().map(|s| s.head_count as f64).collect();
        self.concentration.concentration_of_values(&heads)
    }
}

/// By-purpose rows ranked by registrations.
fn purpose_rows(purposes: &Summary) -> Vec<PurposeRow> {
    let total = purposes.total.count as f64;
    let mut rows: Vec<PurposeRow> = purposes
        .groups
        .values()
        .map(|stats| PurposeRow {
            purpose: stats.key.as_str().to_string(),
            total_registrations: stats.count,
            total_head_count: stats.head_count,
            revenue: money(stats.revenue),
            percentage: percentage(stats.count as f64, total),
        })
        .collect();
    sort_ranked(&mut rows, |r| r.total_registrations as f64, |r| r.purpose.as_str());
    rows
}

/// Department rows ranked by head count, truncated to `limit`.
fn department_rows(departments: &Summary, limit: usize) -> Vec<DepartmentRow> {
    let total_heads = departments.total.head_count as f64;
    departments
        .ranked(|s| s.head_count as f64)
        .into_iter()
        .take(limit)
        .map(|stats| DepartmentRow {
            department: stats.key.as_str().to_string(),
            display_name: department_name(stats.key.as_str()),
            total_registrations: stats.count,
            total_head_count: stats.head_count,
            avg_head_count: stats.avg_head_count,
            approval_rate: stats.approval_rate,
            revenue: money(stats.revenue),
            share_percent: percentage(stats.head_count as f64, total_heads),
        })
        .collect()
}

/// Statistics of each month in `months`, taken from a by-month summary.
///
/// Months without registrations produce empty statistics, so the result
/// always has one entry per requested month.
fn month_series(by_month: &Summary, months: &[YearMonth]) -> Vec<PeriodStats> {
    months.iter().map(|ym| by_month.get_or_empty(&ym.to_string())).collect()
}

/// The validated contents of a snapshot.
struct Input<'a> {
    registrations: Vec<BrandRegistration>,
    logos: Vec<LogoGeneration>,
    events: &'a [StatusChangeEvent],
    excluded: usize,
}

impl<'a> Input<'a> {
    /// Records the snapshot reader already dropped count as excluded too.
    fn from_snapshot(snapshot: &'a Snapshot) -> Self {
        let mut excluded = snapshot.unreadable;

        let registrations = snapshot
            .registrations
            .iter()
            .filter(|r| match r.validate() {
                Ok(()) => true,
                Err(reason) => {
                    tracing::debug!(brand_id = r.id, %reason, "Excluding registration from report input.");
                    excluded += 1;
                    false
                }
            })
            .cloned()
            .collect();

        let logos = snapshot
            .logos
            .iter()
            .filter(|l| match l.validate() {
                Ok(()) => true,
                Err(reason) => {
                    tracing::debug!(logo_id = l.id, %reason, "Excluding logo generation from report input.");
                    excluded += 1;
                    false
                }
            })
            .cloned()
            .collect();

        if excluded > 0 {
            tracing::warn!(excluded, "Snapshot contains invalid records.");
        }

        Self {
            registrations,
            logos,
            events: &snapshot.status_events,
            excluded,
        }
    }

    fn registrations_where(&self, keep: impl Fn(&BrandRegistration) -> bool) -> Vec<BrandRegistration> {
        self.registrations.iter().filter(|r| keep(r)).cloned().collect()
    }

    /// Registrations dated between `from` and `to`, both inclusive and optional.
    fn registered_between(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Vec<BrandRegistration> {
        self.registrations_where(|r| {
            let day = r.registered_at.date_naive();
            from.is_none_or(|f| day >= f) && to.is_none_or(|t| day <= t)
        })
    }

    fn logos_where(&self, keep: impl Fn(&LogoGeneration) -> bool) -> Vec<LogoGeneration> {
        self.logos.iter().filter(|l| keep(l)).cloned().collect()
    }

    /// Month of the earliest registration, the start of every trailing series.
    fn first_month(&self) -> Option<YearMonth> {
        self.registrations
            .iter()
            .map(|r| YearMonth::of(&r.registered_at))
            .min()
    }
}

/// Collects the sections a report had to leave out.
#[derive(Debug, Default)]
struct Warnings(Vec<ReportWarning>);

impl Warnings {
    /// `Some` on success. On failure records the warning and returns `None`.
    fn degrade<T>(&mut self, section: &str, result: Result<T, AnalyticsError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(section, error = %err, "Report section omitted.");
                self.0.push(ReportWarning::from_error(section, &err));
                None
            }
        }
    }

    fn into_inner(self) -> Vec<ReportWarning> {
        self.0
    }
}

fn department_name(code: &str) -> String {
    code.parse::<Department>()
        .map(|d| d.display_name().to_string())
        .unwrap_or_else(|_| code.to_string())
}

/// Drops the months before `first`, so series do not start with idle history.
fn since(months: Vec<YearMonth>, first: Option<YearMonth>) -> Vec<YearMonth> {
    match first {
        Some(first) => months.into_iter().filter(|m| *m >= first).collect(),
        None => Vec::new(),
    }
}

fn registrations_series(stats: &[PeriodStats]) -> Vec<f64> {
    stats.iter().map(|s| s.count as f64).collect()
}

/// Every month from `first` to `last`, both included.
fn months_between(first: YearMonth, last: YearMonth) -> Vec<YearMonth> {
    let mut months = Vec::new();
    let mut cursor = first;
    while cursor <= last {
        months.push(cursor);
        cursor = cursor.next();
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concentration::ConcentrationLevel;
    use chrono::TimeZone;
    use core_types::{BrandStatus, Breed, Purpose};
    use rust_decimal_macros::dec;

    fn brand(id: u64, breed: Breed, head_count: u32) -> BrandRegistration {
        BrandRegistration {
            id,
            brand_number: format!("SC-{id:04}"),
            producer_name: format!("Producer {id}"),
            producer_id: format!("{}", 9000 + id),
            breed,
            purpose: Purpose::Meat,
            head_count,
            department: Department::SantaCruz,
            municipality: "Warnes".to_string(),
            community: None,
            status: BrandStatus::Approved,
            certification_amount: dec!(500),
            registered_at: Utc.with_ymd_and_hms(2024, 4, id as u32, 10, 0, 0).unwrap(),
            processed_at: None,
            processing_hours: None,
        }
    }

    fn scenario() -> Snapshot {
        Snapshot {
            registrations: vec![
                brand(1, Breed::Nelore, 50),
                brand(2, Breed::Nelore, 30),
                brand(3, Breed::Criollo, 20),
            ],
            ..Snapshot::default()
        }
    }

    #[test]
    fn breed_market_shares_and_concentration() {
        let structure = ReportAssembler::default()
            .assemble(&ReportRequest::Monthly { year: 2024, month: 4 }, &scenario())
            .unwrap();
        let ReportBody::Monthly(report) = structure.report else {
            panic!("unexpected report body");
        };

        let breeds: Vec<(&str, usize, u64, f64, f64)> = report
            .by_breed
            .iter()
            .map(|r| {
                (
                    r.breed.as_str(),
                    r.total_registrations,
                    r.total_head_count,
                    r.market_share_percent,
                    r.hhi_contribution,
                )
            })
            .collect();
        assert_eq!(
            breeds,
            vec![("NELORE", 2, 80, 80.0, 6400.0), ("CRIOLLO", 1, 20, 20.0, 400.0)]
        );
        assert_eq!(report.breed_concentration.hhi, 6800.0);
        assert_eq!(
            report.breed_concentration.classification,
            ConcentrationLevel::HighConcentration
        );
    }

    #[test]
    fn invalid_records_are_counted_not_fatal() {
        let mut snapshot = scenario();
        snapshot.registrations.push(brand(4, Breed::Angus, 0));
        let structure = ReportAssembler::default()
            .assemble(&ReportRequest::Monthly { year: 2024, month: 4 }, &snapshot)
            .unwrap();
        assert_eq!(structure.metadata.excluded_records, 1);
        let ReportBody::Monthly(report) = structure.report else {
            panic!("unexpected report body");
        };
        assert_eq!(report.main_metrics.total_registrations, 3);
    }

    #[test]
    fn unreadable_snapshot_records_count_as_excluded() {
        let json = r#"{
            "registrations": [
                {"id": 1, "brandNumber": "SC-0001", "producerName": "Producer 1",
                 "producerId": "9001", "breed": "NELORE", "purpose": "MEAT",
                 "headCount": 40, "department": "SANTA_CRUZ", "municipality": "Warnes",
                 "status": "APPROVED", "certificationAmount": 500,
                 "registeredAt": "2024-04-02T10:00:00Z"},
                {"id": 2, "brandNumber": "SC-0002", "producerName": "Producer 2",
                 "producerId": "9002", "breed": "ZEBU", "purpose": "MEAT",
                 "headCount": 10, "department": "SANTA_CRUZ", "municipality": "Warnes",
                 "status": "APPROVED", "certificationAmount": 500,
                 "registeredAt": "2024-04-03T10:00:00Z"}
            ]
        }"#;
        let mut snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.unreadable, 1);
        snapshot.registrations.push(brand(4, Breed::Angus, 0));

        let structure = ReportAssembler::default()
            .assemble(&ReportRequest::Monthly { year: 2024, month: 4 }, &snapshot)
            .unwrap();
        assert_eq!(structure.metadata.excluded_records, 2);
        let ReportBody::Monthly(report) = structure.report else {
            panic!("unexpected report body");
        };
        assert_eq!(report.main_metrics.total_registrations, 1);
    }

    #[test]
    fn out_of_range_month_is_rejected() {
        let err = ReportAssembler::default()
            .assemble(&ReportRequest::Monthly { year: 2024, month: 13 }, &scenario())
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_dimension");
    }

    #[test]
    fn report_serializes_with_stable_field_names() {
        let structure = ReportAssembler::default()
            .assemble(&ReportRequest::Monthly { year: 2024, month: 4 }, &scenario())
            .unwrap();
        let json = serde_json::to_value(&structure).unwrap();

        assert_eq!(json["metadata"]["reportType"], "monthly");
        let warnings = json["metadata"]["warnings"].as_array().unwrap();
        assert!(warnings.iter().any(|w| w["section"] == "forecast"));
        let row = &json["report"]["byBreed"][0];
        for field in [
            "breed",
            "totalRegistrations",
            "totalHeadCount",
            "approvalRate",
            "marketSharePercent",
            "hhiContribution",
        ] {
            assert!(row.get(field).is_some(), "missing {field}");
        }
        // Degraded sections stay in the output as null.
        assert!(json["report"]["forecast"].is_null());
    }

    #[test]
    fn month_ranges_are_inclusive() {
        let first = YearMonth::new(2023, 11).unwrap();
        let last = YearMonth::new(2024, 2).unwrap();
        assert_eq!(months_between(first, last).len(), 4);
        assert!(months_between(last, first).is_empty());
        assert_eq!(since(last.trailing(6), Some(first)).len(), 4);
        assert!(since(last.trailing(6), None).is_empty());
    }
}
