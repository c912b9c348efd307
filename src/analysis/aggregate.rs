//! Derived views of a series: trailing averages, period resampling and
//! period-over-period change. Nothing here mutates its input.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::data::model::{Dataset, Series};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Rolling mean
// ---------------------------------------------------------------------------

/// Trailing mean over the `window` entries ending at each position.
///
/// The first `window - 1` entries are missing, as is any window that contains
/// a missing value. Only past and current entries are used.
pub fn rolling_mean(series: &Series, window: usize) -> Result<Series> {
    if window == 0 {
        return Err(PipelineError::InvalidParameter(
            "rolling window must be at least 1".into(),
        ));
    }
    let values = series.values();
    let means = (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            values[i + 1 - window..=i]
                .iter()
                .copied()
                .sum::<Option<f64>>()
                .map(|total| total / window as f64)
        })
        .collect();
    Ok(series.with_values(format!("{} rolling mean ({window})", series.name()), means))
}

// ---------------------------------------------------------------------------
// Resampling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Month,
    Quarter,
    Year,
}

impl Period {
    /// Sequential number of the period containing `date`.
    fn ordinal(self, date: NaiveDate) -> i64 {
        let year = i64::from(date.year());
        match self {
            Period::Year => year,
            Period::Quarter => year * 4 + i64::from(date.month0() / 3),
            Period::Month => year * 12 + i64::from(date.month0()),
        }
    }

    /// Last calendar day of the period numbered `ordinal`.
    fn end_of(self, ordinal: i64) -> Option<NaiveDate> {
        let (year, month) = match self {
            Period::Year => (ordinal, 12),
            Period::Quarter => (ordinal.div_euclid(4), ordinal.rem_euclid(4) as u32 * 3 + 3),
            Period::Month => (ordinal.div_euclid(12), ordinal.rem_euclid(12) as u32 + 1),
        };
        last_day_of_month(i32::try_from(year).ok()?, month)
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Mean,
    Sum,
}

impl Aggregation {
    /// `None` for a period without any valid value, for both aggregations.
    fn apply(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let total: f64 = values.iter().sum();
        match self {
            Aggregation::Sum => Some(total),
            Aggregation::Mean => Some(total / values.len() as f64),
        }
    }
}

/// One point per period, from the first to the last period touched by the
/// series, labelled with the period's last day.
pub fn resample(series: &Series, period: Period, aggregation: Aggregation) -> Series {
    let mut buckets: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for (date, value) in series.iter() {
        let bucket = buckets.entry(period.ordinal(date)).or_default();
        bucket.extend(value);
    }

    let mut index = Vec::new();
    let mut values = Vec::new();
    if let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) {
        for ordinal in first..=last {
            let Some(end) = period.end_of(ordinal) else {
                continue;
            };
            index.push(end);
            values.push(buckets.get(&ordinal).and_then(|vals| aggregation.apply(vals)));
        }
    }
    Series::from_sorted(series.name().to_string(), index, values)
}

/// Annual means labelled on 31 December.
pub fn resample_annual_mean(series: &Series) -> Series {
    resample(series, Period::Year, Aggregation::Mean)
}

/// Resample every column of a dataset.
pub fn resample_dataset(dataset: &Dataset, period: Period, aggregation: Aggregation) -> Dataset {
    dataset.map_series(|s| resample(s, period, aggregation))
}

// ---------------------------------------------------------------------------
// Percent change
// ---------------------------------------------------------------------------

/// Name of the variation series derived from `metric`.
pub fn variation_name(metric: &str) -> String {
    format!("variation {metric}")
}

/// `(current - previous) / previous` against the preceding entry.
///
/// The first entry is missing. A missing neighbour, a zero previous value or a
/// non-finite result also gives a missing entry.
pub fn percent_change(series: &Series) -> Series {
    let values = series.values();
    let changes = (0..values.len())
        .map(|i| {
            let previous = values[i.checked_sub(1)?]?;
            let current = values[i]?;
            if previous == 0.0 {
                return None;
            }
            Some((current - previous) / previous).filter(|c| c.is_finite())
        })
        .collect();
    series.with_values(variation_name(series.name()), changes)
}

/// Copy of `dataset` extended with the variation series of each metric.
pub fn with_percent_changes(dataset: &Dataset, metrics: &[&str]) -> Result<Dataset> {
    metrics.iter().try_fold(dataset.clone(), |extended, metric| {
        let variation = percent_change(&dataset.series(metric)?);
        Ok(extended.with_series(&variation))
    })
}
