use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{Alerts, Forecast, Ranking, ReportSettings, MAX_WINDOW_DAYS, MIN_HISTORY_MONTHS};

/// Prefix of the environment variables that override file settings,
/// e.g. `GANADERIA_FORECAST__HORIZON=6`.
pub const ENV_PREFIX: &str = "GANADERIA";

/// Loads the report settings from an optional TOML file plus environment overrides.
///
/// A missing file is not an error: every section falls back to its defaults.
/// The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<ReportSettings, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        tracing::debug!(path = %path.display(), "Loading report settings file.");
        builder = builder.add_source(config::File::from(path).required(false));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize::<ReportSettings>()?;

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(settings, ReportSettings::default());
        assert_eq!(settings.ranking.top_departments, 5);
        assert_eq!(settings.forecast.horizon, 3);
    }

    #[test]
    fn file_overrides_only_the_listed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            "[ranking]\ntop_departments = 3\n\n[alerts]\nmin_approval_rate = 65.0\n",
        )
        .unwrap();

        let settings = load_config(Some(&path)).unwrap();
        assert_eq!(settings.ranking.top_departments, 3);
        assert_eq!(settings.ranking.top_producers, 5);
        assert_eq!(settings.alerts.min_approval_rate, 65.0);
        assert_eq!(settings.alerts.max_processing_hours, 72.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[forecast]\nhorizon = 0\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn history_shorter_than_three_months_is_rejected() {
        let mut settings = ReportSettings::default();
        assert_eq!(settings.forecast.history_months, 6);
        settings.forecast.history_months = 3;
        assert!(settings.validate().is_ok());
        settings.forecast.history_months = 2;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn alert_windows_are_bounded() {
        let mut settings = ReportSettings::default();
        settings.alerts.stale_pending_days = MAX_WINDOW_DAYS;
        assert!(settings.validate().is_ok());

        settings.alerts.stale_pending_days = i64::MAX;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("alerts.stale_pending_days"));

        settings.alerts.stale_pending_days = 7;
        settings.alerts.logo_window_days = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn out_of_range_percentage_fails_validation() {
        let mut settings = ReportSettings::default();
        settings.alerts.min_logo_success_rate = 140.0;
        assert!(settings.validate().is_err());
    }
}
