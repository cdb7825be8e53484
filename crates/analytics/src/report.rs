use crate::aggregation::{FieldStats, LogoStats, Metric, PercentileRank, PeriodStats, ProcessingTimes};
use crate::concentration::{ConcentrationIndex, ConcentrationLevel};
use crate::error::ReportWarning;
use crate::forecast::Forecast;
use crate::scoring::{
    CompetitivenessScore, EfficiencyScore, SectorMomentum, SustainabilityScore, SystemHealth,
};
use crate::stats::money;
use crate::trend::{
    ConsistencySummary, GrowthRate, PeriodComparison, Seasonality, StatusReversal,
    TransitionPatterns, TrendClassification,
};
use chrono::{DateTime, NaiveDate, Utc};
use core_types::{AiModel, BrandStatus, QualityTier};
use serde::Serialize;
use std::collections::BTreeMap;

pub use crate::trend::Level;

/// The kinds of report the assembler can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Monthly,
    Annual,
    Departments,
    Producer,
    Executive,
    Custom,
}

/// Envelope of every report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStructure {
    pub metadata: ReportMetadata,
    pub report: ReportBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub report_type: ReportType,
    /// Snapshot records that failed validation and were left out.
    pub excluded_records: usize,
    /// Sections that could not be computed, with the reason.
    pub warnings: Vec<ReportWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportBody {
    Monthly(Box<MonthlyReport>),
    Annual(Box<AnnualReport>),
    Departments(Box<DepartmentComparisonReport>),
    Producer(Box<ProducerReport>),
    Executive(Box<ExecutiveDashboard>),
    Custom(Box<CustomReport>),
}

// ==============================================================================
// Shared sections
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MainMetrics {
    pub total_registrations: usize,
    pub total_head_count: u64,
    pub avg_head_per_brand: f64,
    pub approved: usize,
    pub rejected: usize,
    pub pending: usize,
    pub approval_rate: f64,
    pub revenue: f64,
    pub avg_processing_hours: f64,
}

impl MainMetrics {
    /// Volume from `registered`, outcome figures from `processed`.
    ///
    /// The two differ in the monthly report, where outcomes are counted by
    /// processing date rather than registration date.
    pub fn new(registered: &PeriodStats, processed: &PeriodStats) -> Self {
        Self {
            total_registrations: registered.count,
            total_head_count: registered.head_count,
            avg_head_per_brand: registered.avg_head_count,
            approved: processed.approved,
            rejected: processed.rejected,
            pending: registered.pending,
            approval_rate: processed.approval_rate,
            revenue: money(processed.revenue),
            avg_processing_hours: processed.avg_processing_hours,
        }
    }
}

/// One row of a by-breed breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreedRow {
    pub breed: String,
    pub total_registrations: usize,
    pub total_head_count: u64,
    pub approval_rate: f64,
    /// Share of the head count, in percent.
    pub market_share_percent: f64,
    pub hhi_contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurposeRow {
    pub purpose: String,
    pub total_registrations: usize,
    pub total_head_count: u64,
    pub revenue: f64,
    /// Share of the registrations, in percent.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRow {
    pub department: String,
    pub display_name: String,
    pub total_registrations: usize,
    pub total_head_count: u64,
    pub avg_head_count: f64,
    pub approval_rate: f64,
    pub revenue: f64,
    /// Share of the head count, in percent.
    pub share_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub severity: Severity,
    pub category: &'static str,
    pub title: String,
    pub message: String,
}

// ==============================================================================
// Monthly report
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    /// `YYYY-MM`.
    pub period: String,
    pub main_metrics: MainMetrics,
    pub by_breed: Vec<BreedRow>,
    pub by_purpose: Vec<PurposeRow>,
    pub top_departments: Vec<DepartmentRow>,
    /// Over breed head-count shares.
    pub breed_concentration: ConcentrationIndex,
    pub logos: LogoStats,
    pub regional_efficiency: Vec<RegionalEfficiency>,
    pub department_trends: Vec<DepartmentTrend>,
    pub previous_month: MonthComparison,
    pub efficiency: Option<EfficiencyScore>,
    pub quality: QualityMetrics,
    /// Over every status change made during the month.
    pub status_patterns: TransitionPatterns,
    pub alerts: Vec<Alert>,
    pub forecast: Option<Forecast>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalEfficiency {
    pub department: String,
    pub display_name: String,
    pub registrations: usize,
    pub approval_rate: f64,
    pub avg_processing_hours: f64,
    pub efficiency: Option<EfficiencyScore>,
}

/// Registrations of a department against the previous month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentTrend {
    pub department: String,
    pub display_name: String,
    pub registrations: PeriodComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthComparison {
    pub previous_period: String,
    pub registrations: PeriodComparison,
    pub head_count: PeriodComparison,
    pub revenue: PeriodComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub processed: usize,
    pub approval_rate: f64,
    pub consistency: ConsistencySummary,
    pub processing_times: ProcessingTimes,
    pub temporal_efficiency: Level,
}

// ==============================================================================
// Annual report
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualReport {
    pub year: i32,
    pub main_metrics: MainMetrics,
    pub revenue_per_brand: f64,
    pub months: Vec<MonthRow>,
    pub by_department: Vec<DepartmentRow>,
    pub by_breed: Vec<BreedRow>,
    pub year_over_year: YearOverYear,
    pub efficiency: Option<EfficiencyScore>,
    pub monthly_efficiency: Vec<MonthEfficiency>,
    pub logos: LogoStats,
    pub trend: Option<TrendClassification>,
    pub seasonality: Option<Seasonality>,
    pub growth: GrowthRate,
    pub forecast: Option<Forecast>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRow {
    pub month: u32,
    pub registrations: usize,
    pub head_count: u64,
    pub revenue: f64,
    pub leading_department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthEfficiency {
    pub month: u32,
    pub processed: usize,
    pub approval_rate: f64,
    pub avg_processing_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthInterpretation {
    FirstYear,
    ExceptionalGrowth,
    SolidGrowth,
    ModerateGrowth,
    ModerateDecline,
    SignificantDecline,
}

impl GrowthInterpretation {
    pub fn of(comparison: &PeriodComparison) -> Self {
        if comparison.previous == 0.0 {
            return GrowthInterpretation::FirstYear;
        }
        match comparison.change_percent {
            p if p > 25.0 => GrowthInterpretation::ExceptionalGrowth,
            p if p > 10.0 => GrowthInterpretation::SolidGrowth,
            p if p > 0.0 => GrowthInterpretation::ModerateGrowth,
            p if p > -10.0 => GrowthInterpretation::ModerateDecline,
            _ => GrowthInterpretation::SignificantDecline,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearOverYear {
    pub previous_year: i32,
    pub registrations: PeriodComparison,
    pub head_count: PeriodComparison,
    pub revenue: PeriodComparison,
    pub interpretation: GrowthInterpretation,
}

// ==============================================================================
// Comparative report by department
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentComparisonReport {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub national: NationalSummary,
    pub departments: Vec<DepartmentProfile>,
    pub rankings: DepartmentRankings,
    pub gaps: Option<GapAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NationalSummary {
    pub active_departments: usize,
    pub total_registrations: usize,
    pub total_head_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentProfile {
    pub department: String,
    pub display_name: String,
    pub basic: BasicMetrics,
    pub efficiency: EfficiencyMetrics,
    pub economics: EconomicMetrics,
    pub purposes: Vec<PurposeShare>,
    pub top_breeds: Vec<BreedHeads>,
    pub competitiveness: Option<CompetitivenessScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicMetrics {
    pub registrations: usize,
    pub head_count: u64,
    pub avg_head_count: f64,
    pub registration_share: f64,
    pub head_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyMetrics {
    pub approval_rate: f64,
    pub avg_processing_hours: f64,
    pub active_producers: usize,
    pub brands_per_producer: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomicMetrics {
    pub revenue: f64,
    pub avg_certification_amount: f64,
    pub revenue_per_head: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurposeShare {
    pub purpose: String,
    pub total: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreedHeads {
    pub breed: String,
    pub registrations: usize,
    pub head_count: u64,
}

/// Department codes ordered by each ranking metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRankings {
    pub by_head_count: Vec<String>,
    pub by_approval_rate: Vec<String>,
    pub by_revenue: Vec<String>,
    pub by_competitiveness: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GapAnalysis {
    pub head_count_gap: u64,
    pub revenue_gap: f64,
    pub approval_rate_gap: f64,
    pub head_count_cv: f64,
    pub revenue_cv: f64,
    pub inequality: Level,
    pub gini: f64,
    pub hhi: f64,
    pub concentration: ConcentrationLevel,
    pub leader: String,
    pub laggard: String,
}

// ==============================================================================
// Producer report
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerReport {
    pub brand: BrandSummary,
    /// Newest first.
    pub history: Vec<HistoryEntry>,
    pub logos: Vec<LogoEntry>,
    pub regional_comparison: RegionalComparison,
    pub benchmark: Benchmark,
    pub reversals: Vec<StatusReversal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandSummary {
    pub id: u64,
    pub brand_number: String,
    pub producer_name: String,
    pub breed: String,
    pub purpose: String,
    pub head_count: u32,
    pub department: String,
    /// `municipality, department name`.
    pub location: String,
    pub status: BrandStatus,
    pub certification_amount: f64,
    pub registered_at: DateTime<Utc>,
    pub processing_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub changed_at: DateTime<Utc>,
    pub from_status: Option<BrandStatus>,
    pub to_status: BrandStatus,
    pub responsible_user: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoEntry {
    pub ai_model: AiModel,
    pub quality_tier: QualityTier,
    pub success: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Above,
    Below,
}

impl Position {
    /// `Above` only when strictly greater than the reference.
    pub fn of(value: f64, reference: f64) -> Self {
        if value > reference {
            Position::Above
        } else {
            Position::Below
        }
    }
}

/// The brand against the other brands of its department and purpose.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalComparison {
    pub peers: usize,
    pub avg_head_count: f64,
    pub avg_certification_amount: f64,
    pub head_count_position: Position,
    pub certification_position: Position,
}

/// Percentiles among brands of the same department, breed and purpose.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Benchmark {
    pub compared_brands: usize,
    pub reference_market: String,
    pub head_count: PercentileRank,
    pub certification_amount: PercentileRank,
}

// ==============================================================================
// Executive dashboard
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutiveDashboard {
    pub as_of: DateTime<Utc>,
    pub current_month: Kpis,
    pub previous_month: PreviousMonth,
    pub alerts: Vec<Alert>,
    pub top_performers: TopPerformers,
    pub system_health: Option<SystemHealth>,
    pub momentum: Option<SectorMomentum>,
    pub sustainability: Option<SustainabilityScore>,
    pub forecast: Option<Forecast>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total_registrations: usize,
    pub total_head_count: u64,
    pub avg_head_per_brand: f64,
    pub registrations_per_day: f64,
    pub processed: usize,
    pub approved: usize,
    pub rejected: usize,
    pub pending: usize,
    pub approval_rate: f64,
    pub rejection_rate: f64,
    pub pending_rate: f64,
    pub revenue: f64,
    pub revenue_per_approved: f64,
    pub revenue_per_head: f64,
    pub avg_processing_hours: f64,
    pub active_departments: usize,
    pub breeds: usize,
    pub unique_producers: usize,
    /// Active departments over the nine covered, in percent.
    pub geographic_diversity: f64,
    pub logos: usize,
    pub successful_logos: usize,
    pub logo_success_rate: f64,
    pub ai_adoption: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousMonth {
    pub period: String,
    pub kpis: Kpis,
    pub variations: Vec<KpiVariation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiVariation {
    pub metric: &'static str,
    pub comparison: PeriodComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformers {
    /// By head count.
    pub departments: Vec<DepartmentRow>,
    /// By registrations.
    pub breeds: Vec<BreedPerformer>,
    /// By head count, identified only by the last 4 characters of the producer id.
    pub producers: Vec<ProducerPerformer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreedPerformer {
    pub breed: String,
    pub total_registrations: usize,
    pub total_head_count: u64,
    /// Share of the month's registrations, in percent.
    pub market_share_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerPerformer {
    pub rank: usize,
    pub identifier: String,
    pub department: String,
    pub total_brands: usize,
    pub total_head_count: u64,
    pub avg_head_per_brand: f64,
}

// ==============================================================================
// Custom report
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomReport {
    pub dimension: &'static str,
    pub metrics: Vec<Metric>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub total_registrations: usize,
    /// Periods in time order, everything else by registrations.
    pub groups: Vec<CustomGroup>,
    pub summary: Option<CustomSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomGroup {
    pub key: String,
    pub registrations: usize,
    pub head_count: u64,
    pub avg_head_count: f64,
    pub approval_rate: f64,
    pub revenue: f64,
    pub avg_processing_hours: f64,
    pub producers: usize,
    /// Share of the registrations, in percent.
    pub share_percent: f64,
    /// count/sum/avg/min/max of each requested metric.
    pub metrics: BTreeMap<Metric, FieldStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSummary {
    pub groups: usize,
    /// Group with the largest head count.
    pub leader: String,
    pub max_registrations: usize,
    pub min_registrations: usize,
    pub avg_registrations: f64,
    /// Share of the registrations held by the three largest groups, in percent.
    pub top3_share: f64,
    /// Over registration shares.
    pub concentration: ConcentrationIndex,
}
