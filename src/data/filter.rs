use std::collections::BTreeSet;

use chrono::Datelike;

use super::model::{Dataset, Series};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Year extraction
// ---------------------------------------------------------------------------

/// Distinct calendar years present in the index.
pub fn years_present(dataset: &Dataset) -> BTreeSet<i32> {
    dataset.index().iter().map(|d| d.year()).collect()
}

/// `(first, last)` observed year, `None` for an empty dataset.
pub fn year_bounds(dataset: &Dataset) -> Option<(i32, i32)> {
    // The index is ascending, so the ends carry the extreme years.
    let first = dataset.index().first()?.year();
    let last = dataset.index().last()?.year();
    Some((first, last))
}

// ---------------------------------------------------------------------------
// Range selection
// ---------------------------------------------------------------------------

/// Rows whose year lies in `start_year..=end_year`, in index order.
///
/// An inverted range is an error. A range that misses the observed years
/// simply selects nothing.
pub fn filter_by_year_range(dataset: &Dataset, start_year: i32, end_year: i32) -> Result<Dataset> {
    check_order(dataset, start_year, end_year)?;
    Ok(dataset.select_rows(|d| (start_year..=end_year).contains(&d.year())))
}

/// Same selection on a single series.
pub fn filter_series_by_year_range(
    series: &Series,
    start_year: i32,
    end_year: i32,
) -> Result<Series> {
    if start_year > end_year {
        return Err(PipelineError::Range {
            start: start_year,
            end: end_year,
            observed: series
                .index()
                .first()
                .zip(series.index().last())
                .map(|(a, b)| (a.year(), b.year())),
        });
    }
    let points = series
        .iter()
        .filter(|(d, _)| (start_year..=end_year).contains(&d.year()));
    Ok(Series::from_points(series.name(), points))
}

/// Strict check used to bound user selections: the range must be ordered and
/// both ends must fall inside the observed year span.
pub fn validate_year_range(dataset: &Dataset, start_year: i32, end_year: i32) -> Result<()> {
    check_order(dataset, start_year, end_year)?;
    match year_bounds(dataset) {
        Some((min, max)) if min <= start_year && end_year <= max => Ok(()),
        observed => Err(PipelineError::Range {
            start: start_year,
            end: end_year,
            observed,
        }),
    }
}

fn check_order(dataset: &Dataset, start_year: i32, end_year: i32) -> Result<()> {
    if start_year > end_year {
        return Err(PipelineError::Range {
            start: start_year,
            end: end_year,
            observed: year_bounds(dataset),
        });
    }
    Ok(())
}
