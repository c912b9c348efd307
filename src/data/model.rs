use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// RawValue – a single cell of a source table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell, as read from a source before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    /// Native date cell (spreadsheet date, Parquet `Date32`, ...).
    Date(NaiveDate),
    Empty,
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(s) => write!(f, "{s}"),
            RawValue::Number(v) => write!(f, "{v}"),
            RawValue::Date(d) => write!(f, "{d}"),
            RawValue::Empty => write!(f, "<empty>"),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        if s.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(s.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Observation – one row of a raw source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Observation {
    /// Raw content of the date column.
    pub date: RawValue,
    /// Every other column: source column name → raw cell.
    pub fields: BTreeMap<String, RawValue>,
}

// ---------------------------------------------------------------------------
// Series – one named metric over a strictly ascending date index
// ---------------------------------------------------------------------------

/// A single metric. `None` marks a missing value; non-finite values are never
/// stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    name: String,
    index: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
}

impl Series {
    /// Build a series from an index that must already be strictly ascending.
    pub fn new(
        name: impl Into<String>,
        index: Vec<NaiveDate>,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        if index.len() != values.len() {
            return Err(PipelineError::InvalidParameter(format!(
                "index has {} dates but {} values",
                index.len(),
                values.len()
            )));
        }
        if let Some(w) = index.windows(2).find(|w| w[0] >= w[1]) {
            return Err(if w[0] == w[1] {
                PipelineError::DuplicateTimestamp(w[0])
            } else {
                PipelineError::InvalidParameter(format!(
                    "index is not ascending: {} precedes {}",
                    w[0], w[1]
                ))
            });
        }
        Ok(Self::from_sorted(name.into(), index, values))
    }

    /// Build a series from unordered points. Sorts by date and keeps the last
    /// point given for a date.
    pub fn from_points(
        name: impl Into<String>,
        points: impl IntoIterator<Item = (NaiveDate, Option<f64>)>,
    ) -> Self {
        let by_date: BTreeMap<NaiveDate, Option<f64>> = points.into_iter().collect();
        let (index, values) = by_date.into_iter().unzip();
        Self::from_sorted(name.into(), index, values)
    }

    /// Caller guarantees a strictly ascending index of matching length.
    pub(crate) fn from_sorted(
        name: String,
        index: Vec<NaiveDate>,
        values: Vec<Option<f64>>,
    ) -> Self {
        debug_assert_eq!(index.len(), values.len());
        let values = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        Series {
            name,
            index,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// `(date, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.index.iter().copied().zip(self.values.iter().copied())
    }

    /// Value at `date`; `None` when the date is absent or the value missing.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.index
            .binary_search(&date)
            .ok()
            .and_then(|i| self.values[i])
    }

    /// Number of non-missing values.
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// New series on the same index.
    pub(crate) fn with_values(&self, name: String, values: Vec<Option<f64>>) -> Self {
        Self::from_sorted(name, self.index.clone(), values)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded source
// ---------------------------------------------------------------------------

/// Named metric columns sharing one strictly ascending date index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    index: Vec<NaiveDate>,
    /// Column names in source order.
    column_names: Vec<String>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl Dataset {
    /// Assemble a dataset from an ascending, duplicate-free index and columns
    /// of matching length (in source order).
    pub(crate) fn from_columns(
        index: Vec<NaiveDate>,
        columns: Vec<(String, Vec<Option<f64>>)>,
    ) -> Self {
        let mut dataset = Dataset {
            index,
            column_names: Vec::with_capacity(columns.len()),
            columns: BTreeMap::new(),
        };
        for (name, values) in columns {
            debug_assert_eq!(values.len(), dataset.index.len());
            dataset.insert_column(name, values);
        }
        dataset
    }

    /// Outer-join several series on their dates.
    pub fn from_series(series: impl IntoIterator<Item = Series>) -> Self {
        let series: Vec<Series> = series.into_iter().collect();
        let mut index: Vec<NaiveDate> = series
            .iter()
            .flat_map(|s| s.index().iter().copied())
            .collect();
        index.sort_unstable();
        index.dedup();

        let mut dataset = Dataset {
            index,
            ..Dataset::default()
        };
        for s in &series {
            dataset = dataset.with_series(s);
        }
        dataset
    }

    fn insert_column(&mut self, name: String, values: Vec<Option<f64>>) {
        let values = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        if self.columns.insert(name.clone(), values).is_none() {
            self.column_names.push(name);
        }
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Raw values of one column, aligned with [`index`](Self::index).
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Copy one column out as a [`Series`].
    pub fn series(&self, name: &str) -> Result<Series> {
        let values = self
            .columns
            .get(name)
            .ok_or_else(|| PipelineError::UnknownMetric(name.to_string()))?;
        Ok(Series::from_sorted(
            name.to_string(),
            self.index.clone(),
            values.clone(),
        ))
    }

    /// Number of dates in the index.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Return a copy extended with `series`, aligned on this dataset's index.
    ///
    /// Dates of `series` absent from the index are ignored; index dates absent
    /// from `series` become missing. A column with the same name is replaced.
    pub fn with_series(&self, series: &Series) -> Dataset {
        let values = self.index.iter().map(|d| series.get(*d)).collect();
        let mut extended = self.clone();
        extended.insert_column(series.name().to_string(), values);
        extended
    }

    /// Keep only the rows whose date satisfies `keep`.
    pub fn select_rows(&self, keep: impl Fn(NaiveDate) -> bool) -> Dataset {
        let rows: Vec<usize> = (0..self.index.len())
            .filter(|&i| keep(self.index[i]))
            .collect();
        self.take_rows(&rows)
    }

    /// Keep only the rows where every column has a value. Rows are judged
    /// across all columns at once, so the survivors share one index.
    pub fn drop_incomplete_rows(&self) -> Dataset {
        let rows: Vec<usize> = (0..self.index.len())
            .filter(|&i| self.columns.values().all(|values| values[i].is_some()))
            .collect();
        self.take_rows(&rows)
    }

    fn take_rows(&self, rows: &[usize]) -> Dataset {
        let index = rows.iter().map(|&i| self.index[i]).collect();
        let columns = self
            .column_names
            .iter()
            .map(|name| {
                let values = &self.columns[name];
                (name.clone(), rows.iter().map(|&i| values[i]).collect())
            })
            .collect();
        Dataset::from_columns(index, columns)
    }

    /// Apply `f` to every column, producing a new dataset from the results.
    pub fn map_series(&self, f: impl Fn(&Series) -> Series) -> Dataset {
        let derived: Vec<Series> = self
            .column_names
            .iter()
            .filter_map(|name| self.series(name).ok())
            .map(|s| f(&s))
            .collect();
        Dataset::from_series(derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn from_points_sorts_and_keeps_last_duplicate() {
        let s = Series::from_points(
            "load",
            vec![
                (d(2020, 3, 1), Some(3.0)),
                (d(2020, 1, 1), Some(1.0)),
                (d(2020, 3, 1), Some(30.0)),
            ],
        );
        assert_eq!(s.index(), &[d(2020, 1, 1), d(2020, 3, 1)]);
        assert_eq!(s.values(), &[Some(1.0), Some(30.0)]);
    }

    #[test]
    fn new_rejects_unsorted_and_duplicate_index() {
        let unsorted = vec![d(2020, 2, 1), d(2020, 1, 1)];
        let err = Series::new("x", unsorted, vec![None, None]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter(_)));

        let repeated = vec![d(2020, 1, 1), d(2020, 1, 1)];
        let err = Series::new("x", repeated, vec![None, None]).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateTimestamp(_)));

        let err = Series::new("x", vec![d(2020, 1, 1)], vec![]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter(_)));
    }

    #[test]
    fn non_finite_values_are_stored_as_missing() {
        let s = Series::from_points(
            "x",
            vec![
                (d(2020, 1, 1), Some(f64::NAN)),
                (d(2020, 2, 1), Some(f64::INFINITY)),
            ],
        );
        assert_eq!(s.valid_count(), 0);
    }

    #[test]
    fn with_series_aligns_on_existing_index() {
        let base = Series::from_points(
            "a",
            vec![(d(2020, 1, 1), Some(1.0)), (d(2020, 2, 1), Some(2.0))],
        );
        let ds = Dataset::from_series(vec![base]);
        let extra = Series::from_points(
            "b",
            vec![(d(2020, 2, 1), Some(5.0)), (d(2021, 1, 1), Some(9.0))],
        );

        let extended = ds.with_series(&extra);
        assert_eq!(extended.len(), 2);
        assert_eq!(extended.column("b").unwrap(), &[None, Some(5.0)]);
        assert_eq!(extended.column_names(), &["a".to_string(), "b".to_string()]);
        // the source dataset is untouched
        assert!(!ds.has_column("b"));
    }

    #[test]
    fn from_series_outer_joins_dates() {
        let a = Series::from_points("a", vec![(d(2020, 1, 1), Some(1.0))]);
        let b = Series::from_points("b", vec![(d(2020, 2, 1), Some(2.0))]);
        let ds = Dataset::from_series(vec![a, b]);
        assert_eq!(ds.index(), &[d(2020, 1, 1), d(2020, 2, 1)]);
        assert_eq!(ds.column("a").unwrap(), &[Some(1.0), None]);
        assert_eq!(ds.column("b").unwrap(), &[None, Some(2.0)]);
    }

    #[test]
    fn incomplete_rows_are_dropped_jointly() {
        let a = Series::from_points(
            "a",
            vec![
                (d(2020, 1, 1), Some(1.0)),
                (d(2020, 2, 1), Some(2.0)),
                (d(2020, 3, 1), None),
            ],
        );
        let b = Series::from_points(
            "b",
            vec![
                (d(2020, 1, 1), None),
                (d(2020, 2, 1), Some(5.0)),
                (d(2020, 3, 1), Some(6.0)),
            ],
        );
        let complete = Dataset::from_series(vec![a, b]).drop_incomplete_rows();
        assert_eq!(complete.index(), &[d(2020, 2, 1)]);
        assert_eq!(complete.column("a").unwrap(), &[Some(2.0)]);
        assert_eq!(complete.column("b").unwrap(), &[Some(5.0)]);
    }

    #[test]
    fn unknown_metric_is_reported() {
        let ds = Dataset::default();
        assert!(matches!(ds.series("nope"), Err(PipelineError::UnknownMetric(_))));
    }
}
