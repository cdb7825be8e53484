//! # Ganaderia Analytics Engine
//!
//! This crate turns snapshots of the livestock brand registry into business
//! intelligence reports: aggregates per dimension, market concentration,
//! trends, forecasts, composite scores and the report structures that carry them.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of storage,
//!   HTTP or exporters. It depends only on `core-types` (Layer 0) and the
//!   `configuration` settings handed to the assembler.
//! - **Stateless Calculation:** Every component is a stateless calculator. It takes
//!   an immutable snapshot as input and allocates its own output, so concurrent
//!   report requests share nothing.
//! - **Visible Degradation:** Malformed records are excluded and counted, short
//!   series fail with `InsufficientData`, and the `ReportAssembler` turns component
//!   failures into report warnings instead of failing the whole report.
//!
//! ## Public API
//!
//! - `AggregationEngine`: Group-by with count/sum/avg/min/max, period statistics,
//!   percentiles and logo statistics.
//! - `ConcentrationAnalyzer`: HHI, Gini and effective diversity count.
//! - `TrendAnalyzer`: Trend and volatility classification, period comparison, CAGR,
//!   dispersion, seasonality, status reversals and status transition patterns.
//! - `ForecastEngine`: Linear-regression projections with intervals.
//! - `ScoringEngine`: Weighted composite scores and their tiers.
//! - `ReportAssembler`: Builds the monthly, annual, departmental, producer,
//!   executive and custom reports.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod aggregation;
pub mod assembler;
pub mod concentration;
pub mod error;
pub mod forecast;
pub mod period;
pub mod report;
pub mod scoring;
pub mod stats;
pub mod trend;

// Re-export the key components to create a clean, public-facing API.
pub use aggregation::{AggregationEngine, Dimension, Grouping, Metric, PeriodStats, RankBy, Summary};
pub use assembler::{ReportAssembler, ReportRequest};
pub use concentration::{ConcentrationAnalyzer, ConcentrationIndex, ConcentrationLevel};
pub use error::{AnalyticsError, ReportWarning};
pub use forecast::{Forecast, ForecastEngine};
pub use period::YearMonth;
pub use report::{ReportBody, ReportStructure, ReportType};
pub use scoring::ScoringEngine;
pub use trend::{TransitionPatterns, TrendAnalyzer};
