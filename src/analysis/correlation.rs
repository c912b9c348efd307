//! Relationship between two variation series: alignment on common dates and
//! an ordinary least-squares trendline.

use chrono::NaiveDate;
use serde::Serialize;

use super::aggregate::{percent_change, variation_name};
use crate::data::model::{Dataset, Series};
use crate::error::{PipelineError, Result};

/// Fewest aligned points a fit is defined for.
pub const MIN_FIT_POINTS: usize = 2;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One date present and non-missing in both inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlignedPair {
    pub date: NaiveDate,
    pub x: f64,
    pub y: f64,
}

/// `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient; `None` when y is constant.
    pub r: Option<f64>,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn r_squared(&self) -> Option<f64> {
        self.r.map(|r| r * r)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationResult {
    pub x_name: String,
    pub y_name: String,
    /// The sample the fit was computed on, in date order.
    pub pairs: Vec<AlignedPair>,
    pub fit: LinearFit,
}

impl CorrelationResult {
    pub fn slope(&self) -> f64 {
        self.fit.slope
    }

    pub fn intercept(&self) -> f64 {
        self.fit.intercept
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Least squares
// ---------------------------------------------------------------------------

/// Ordinary least squares of y on x.
///
/// Needs at least two points and two distinct x values; anything less is
/// reported as [`PipelineError::InsufficientData`].
pub fn least_squares(points: &[(f64, f64)]) -> Result<LinearFit> {
    let n = points.len();
    if n < MIN_FIT_POINTS {
        return Err(PipelineError::InsufficientData {
            context: "least-squares fit",
            needed: MIN_FIT_POINTS,
            found: n,
        });
    }

    // Rounding in the mean can leave Sxx slightly above zero for a constant x,
    // so distinctness is judged on the inputs.
    let first_x = points[0].0;
    if points.iter().all(|(x, _)| *x == first_x) {
        return Err(PipelineError::InsufficientData {
            context: "least-squares fit (distinct x values)",
            needed: MIN_FIT_POINTS,
            found: 1,
        });
    }

    let count = n as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / count;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / count;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    let slope = sxy / sxx;
    Ok(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
        r: (syy > 0.0).then(|| (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)),
    })
}

// ---------------------------------------------------------------------------
// Pairwise correlation
// ---------------------------------------------------------------------------

/// Fit `y` against `x` on the dates where both have a value.
pub fn correlate(x: &Series, y: &Series) -> Result<CorrelationResult> {
    let pairs: Vec<AlignedPair> = x
        .iter()
        .filter_map(|(date, xv)| {
            Some(AlignedPair {
                date,
                x: xv?,
                y: y.get(date)?,
            })
        })
        .collect();

    let points: Vec<(f64, f64)> = pairs.iter().map(|p| (p.x, p.y)).collect();
    let fit = least_squares(&points)?;

    Ok(CorrelationResult {
        x_name: x.name().to_string(),
        y_name: y.name().to_string(),
        pairs,
        fit,
    })
}

// ---------------------------------------------------------------------------
// Variation table
// ---------------------------------------------------------------------------

/// Percent-change series of several metrics laid out on one date index.
#[derive(Debug, Clone, PartialEq)]
pub struct VariationTable {
    metrics: Vec<String>,
    table: Dataset,
}

impl VariationTable {
    /// Compute the variation of every metric over the dataset's index.
    pub fn from_dataset(dataset: &Dataset, metrics: &[&str]) -> Result<Self> {
        let mut table = Dataset::from_columns(dataset.index().to_vec(), Vec::new());
        let mut names: Vec<String> = Vec::with_capacity(metrics.len());
        for metric in metrics {
            if names.iter().any(|n| n.as_str() == *metric) {
                continue;
            }
            table = table.with_series(&percent_change(&dataset.series(metric)?));
            names.push(metric.to_string());
        }
        Ok(VariationTable {
            metrics: names,
            table,
        })
    }

    /// Drop every date where any variation is missing, so all metrics share
    /// the same sample.
    pub fn drop_incomplete(&self) -> Self {
        VariationTable {
            metrics: self.metrics.clone(),
            table: self.table.drop_incomplete_rows(),
        }
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn index(&self) -> &[NaiveDate] {
        self.table.index()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Variation series of `metric`.
    pub fn variation(&self, metric: &str) -> Result<Series> {
        self.table
            .series(&variation_name(metric))
            .map_err(|_| PipelineError::UnknownMetric(metric.to_string()))
    }

    /// Fit the variation of `y_metric` against the variation of `x_metric`.
    pub fn correlate(&self, x_metric: &str, y_metric: &str) -> Result<CorrelationResult> {
        correlate(&self.variation(x_metric)?, &self.variation(y_metric)?)
    }
}

/// Variations of `x_metric`, `y_metric` and `companions`, restricted to the
/// dates where all of them are defined, then fitted y on x.
pub fn correlate_variations(
    dataset: &Dataset,
    x_metric: &str,
    y_metric: &str,
    companions: &[&str],
) -> Result<CorrelationResult> {
    let mut metrics = vec![x_metric, y_metric];
    metrics.extend_from_slice(companions);
    VariationTable::from_dataset(dataset, &metrics)?
        .drop_incomplete()
        .correlate(x_metric, y_metric)
}
