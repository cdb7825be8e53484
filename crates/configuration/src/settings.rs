use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Fewest trailing months a projection can be fitted on.
pub const MIN_HISTORY_MONTHS: usize = 3;
/// Longest alert window, in days.
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// The root settings structure handed to the report assembler.
///
/// Every section falls back to its defaults, so an empty file (or no file at
/// all) reproduces the registry's documented behaviour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    #[serde(default)]
    pub ranking: Ranking,
    #[serde(default)]
    pub forecast: Forecast,
    #[serde(default)]
    pub alerts: Alerts,
}

/// Sizes of the "top N" sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ranking {
    pub top_departments: usize,
    pub top_breeds: usize,
    pub top_producers: usize,
    /// Breeds listed per department in the comparative report.
    pub breeds_per_department: usize,
}

/// Parameters of the projection sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Forecast {
    /// Periods projected by the monthly report and the executive dashboard.
    pub horizon: usize,
    /// Months projected by the annual report.
    pub annual_horizon: usize,
    /// Trailing months fed to the monthly projection, at least 3.
    pub history_months: usize,
}

/// Thresholds that raise executive alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alerts {
    /// Approval rate (%) below which the monthly report raises a critical alert.
    pub min_approval_rate: f64,
    /// Average processing time (h) above which a warning is raised.
    pub max_processing_hours: f64,
    /// Month-over-month change (%) in registrations below which a warning is raised.
    pub registration_drop_pct: f64,
    /// Logo success rate (%) below which an informational alert is raised.
    pub min_logo_success_rate: f64,
    /// Days a registration may stay unprocessed before it counts as stale.
    pub stale_pending_days: i64,
    /// Number of stale registrations that triggers a critical alert.
    pub max_stale_pending: usize,
    /// Window (days) for the recent approval and processing checks.
    pub recent_window_days: i64,
    pub min_recent_approval_rate: f64,
    pub max_recent_processing_hours: f64,
    /// Window (days) for the logo failure check.
    pub logo_window_days: i64,
    pub max_logo_failure_rate: f64,
    /// Departments without registrations this month tolerated before alerting.
    pub max_inactive_departments: usize,
}

impl Default for Ranking {
    fn default() -> Self {
        Self {
            top_departments: 5,
            top_breeds: 3,
            top_producers: 5,
            breeds_per_department: 3,
        }
    }
}

impl Default for Forecast {
    fn default() -> Self {
        Self {
            horizon: 3,
            annual_horizon: 12,
            history_months: 6,
        }
    }
}

impl Default for Alerts {
    fn default() -> Self {
        Self {
            min_approval_rate: 70.0,
            max_processing_hours: 72.0,
            registration_drop_pct: -15.0,
            min_logo_success_rate: 80.0,
            stale_pending_days: 7,
            max_stale_pending: 50,
            recent_window_days: 7,
            min_recent_approval_rate: 60.0,
            max_recent_processing_hours: 96.0,
            logo_window_days: 3,
            max_logo_failure_rate: 25.0,
            max_inactive_departments: 2,
        }
    }
}

impl ReportSettings {
    /// Rejects settings no report could be built with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.forecast.horizon == 0 || self.forecast.annual_horizon == 0 {
            return Err(ConfigError::ValidationError(
                "forecast horizons must be at least 1".to_string(),
            ));
        }
        if self.forecast.history_months < MIN_HISTORY_MONTHS {
            return Err(ConfigError::ValidationError(format!(
                "forecast.history_months must be at least {MIN_HISTORY_MONTHS}"
            )));
        }
        let percentages = [
            ("alerts.min_approval_rate", self.alerts.min_approval_rate),
            ("alerts.min_logo_success_rate", self.alerts.min_logo_success_rate),
            ("alerts.min_recent_approval_rate", self.alerts.min_recent_approval_rate),
            ("alerts.max_logo_failure_rate", self.alerts.max_logo_failure_rate),
        ];
        for (name, value) in percentages {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be a percentage between 0 and 100, got {value}"
                )));
            }
        }
        let windows = [
            ("alerts.stale_pending_days", self.alerts.stale_pending_days, 0),
            ("alerts.recent_window_days", self.alerts.recent_window_days, 1),
            ("alerts.logo_window_days", self.alerts.logo_window_days, 1),
        ];
        for (name, days, min) in windows {
            if !(min..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between {min} and {MAX_WINDOW_DAYS} days, got {days}"
                )));
            }
        }
        Ok(())
    }
}
