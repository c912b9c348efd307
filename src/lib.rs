//! Cleaning, resampling and correlation of French electricity time series.
//!
//! ```text
//!  source ──► data::loader ──► Dataset ──► data::filter ──► analysis ──► views
//!                       ▲
//!                 data::cache (one Dataset per source)
//! ```
//!
//! The crate installs no logger; it reports through the `log` facade.

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod views;

pub use analysis::aggregate::{
    percent_change, resample, resample_annual_mean, rolling_mean, Aggregation, Period,
};
pub use analysis::correlation::{
    correlate, correlate_variations, CorrelationResult, LinearFit, VariationTable,
};
pub use config::{DuplicatePolicy, PipelineConfig, SourceOptions};
pub use data::cache::{DatasetCache, SourceId};
pub use data::filter::{filter_by_year_range, validate_year_range, years_present};
pub use data::loader::{load, load_with_report, LoadReport, SourceFormat};
pub use data::model::{Dataset, Series};
pub use error::{PipelineError, Result};
