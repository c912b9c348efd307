use std::collections::BTreeMap;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Date32Type, Float64Type};
use calamine::{open_workbook_auto_from_rs, Data, DataType as _, Range, Reader};
use chrono::NaiveDate;
use log::{debug, info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::model::{Dataset, Observation, RawValue};
use super::parse::{coerce_numeric, detect_style, parse_date, NumericStyle};
use crate::config::{DuplicatePolicy, PipelineConfig, SourceOptions};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Source formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// `.xlsx` / `.xlsm` / `.xls` / `.ods` workbook.
    Spreadsheet,
    /// Delimited text (`.csv`, `.txt`).
    Delimited,
    Parquet,
    /// `[{ "date": ..., "metric": ... }, ...]`
    Json,
}

impl SourceFormat {
    /// Dispatch by extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(SourceFormat::Spreadsheet),
            "csv" | "txt" => Ok(SourceFormat::Delimited),
            "parquet" | "pq" => Ok(SourceFormat::Parquet),
            "json" => Ok(SourceFormat::Json),
            other => Err(PipelineError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn options<'a>(&self, config: &'a PipelineConfig) -> &'a SourceOptions {
        match self {
            SourceFormat::Spreadsheet => &config.spreadsheet,
            SourceFormat::Delimited => &config.delimited,
            SourceFormat::Parquet | SourceFormat::Json => &config.columnar,
        }
    }
}

// ---------------------------------------------------------------------------
// Load report
// ---------------------------------------------------------------------------

/// Row-level outcome of one load. Nothing counted here aborts a load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Data rows seen after the skipped legend rows.
    pub rows_read: usize,
    pub rows_kept: usize,
    /// Records the reader could not decode at all.
    pub unreadable_rows: usize,
    /// Rows dropped because their date did not parse.
    pub invalid_dates: usize,
    /// Non-empty cells that could not be coerced to a number.
    pub invalid_cells: usize,
    /// Rows folded into another row with the same date.
    pub duplicate_dates: usize,
}

impl LoadReport {
    pub fn dropped_rows(&self) -> usize {
        self.unreadable_rows + self.invalid_dates + self.duplicate_dates
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a source file into a [`Dataset`].
pub fn load(path: &Path, config: &PipelineConfig) -> Result<Dataset> {
    load_with_report(path, config).map(|(dataset, _)| dataset)
}

/// Load a source file, also returning the row-level [`LoadReport`].
pub fn load_with_report(path: &Path, config: &PipelineConfig) -> Result<(Dataset, LoadReport)> {
    let format = SourceFormat::from_path(path)?;
    let opts = format.options(config);

    let table = match format {
        SourceFormat::Spreadsheet => read_spreadsheet(path, opts)?,
        SourceFormat::Delimited => read_delimited(path, opts)?,
        SourceFormat::Parquet => read_parquet(path)?,
        SourceFormat::Json => read_json(path, opts)?,
    };

    let (dataset, report) = dataset_from_table(table, opts, config.duplicate_policy)
        .map_err(|e| match e {
            PipelineError::MalformedSource { reason, .. } => PipelineError::malformed(path, reason),
            other => other,
        })?;

    info!(
        "loaded {} ({format:?}): {} rows kept of {}, {} metrics",
        path.display(),
        report.rows_kept,
        report.rows_read,
        dataset.column_names().len()
    );
    if report.dropped_rows() > 0 || report.invalid_cells > 0 {
        warn!(
            "{}: dropped {} rows ({} unreadable, {} bad dates, {} duplicate dates), \
             {} invalid cells",
            path.display(),
            report.dropped_rows(),
            report.unreadable_rows,
            report.invalid_dates,
            report.duplicate_dates,
            report.invalid_cells
        );
    }
    Ok((dataset, report))
}

// ---------------------------------------------------------------------------
// Table → observations → dataset
// ---------------------------------------------------------------------------

/// A source read as-is: header names plus raw rows.
#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
    pub unreadable_rows: usize,
}

pub(crate) fn dataset_from_table(
    table: Table,
    opts: &SourceOptions,
    policy: DuplicatePolicy,
) -> Result<(Dataset, LoadReport)> {
    let headers = unique_headers(&table.headers);
    if headers.is_empty() {
        return Err(PipelineError::malformed("", "no header row"));
    }

    let date_idx = match &opts.date_column {
        Some(name) => headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::malformed("", format!("missing date column '{name}'")))?,
        None => 0,
    };
    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != date_idx)
        .map(|(_, h)| h.clone())
        .collect();

    let observations: Vec<Observation> = table
        .rows
        .into_iter()
        .skip(opts.skip_leading_rows)
        .map(|row| {
            let cell = |i: usize| row.get(i).cloned().unwrap_or(RawValue::Empty);
            Observation {
                date: cell(date_idx),
                fields: headers
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != date_idx)
                    .map(|(i, h)| (h.clone(), cell(i)))
                    .collect(),
            }
        })
        .collect();

    let mut report = LoadReport {
        unreadable_rows: table.unreadable_rows,
        ..LoadReport::default()
    };
    let dataset = normalize(&columns, observations, opts, policy, &mut report)?;
    Ok((dataset, report))
}

/// Parse dates, order and de-duplicate rows, then coerce every metric column.
pub fn normalize(
    columns: &[String],
    observations: Vec<Observation>,
    opts: &SourceOptions,
    policy: DuplicatePolicy,
    report: &mut LoadReport,
) -> Result<Dataset> {
    report.rows_read = observations.len() + report.unreadable_rows;

    let mut dated: Vec<(NaiveDate, Observation)> = Vec::with_capacity(observations.len());
    for (row_no, obs) in observations.into_iter().enumerate() {
        match parse_date(&obs.date, &opts.date_formats) {
            Some(date) => dated.push((date, obs)),
            None => {
                report.invalid_dates += 1;
                debug!("row {row_no}: unparseable date '{}'", obs.date);
            }
        }
    }

    let styles: Vec<NumericStyle> = columns
        .iter()
        .map(|col| {
            detect_style(
                dated.iter().filter_map(|(_, obs)| obs.fields.get(col)),
                opts.decimal_comma,
            )
        })
        .collect();

    // Stable sort: equal dates keep file order, so "last" means last in the file.
    dated.sort_by_key(|(date, _)| *date);
    let mut rows: Vec<(NaiveDate, Observation)> = Vec::with_capacity(dated.len());
    for (date, obs) in dated {
        match rows.last_mut() {
            Some((last, kept)) if *last == date => {
                report.duplicate_dates += 1;
                match policy {
                    DuplicatePolicy::KeepFirst => {}
                    DuplicatePolicy::KeepLast => *kept = obs,
                    DuplicatePolicy::Reject => return Err(PipelineError::DuplicateTimestamp(date)),
                }
            }
            _ => rows.push((date, obs)),
        }
    }

    let mut values: Vec<(String, Vec<Option<f64>>)> = Vec::with_capacity(columns.len());
    for (col, style) in columns.iter().zip(styles) {
        let mut column = Vec::with_capacity(rows.len());
        for (date, obs) in &rows {
            let value = match obs.fields.get(col) {
                Some(raw) => coerce_numeric(raw, style).unwrap_or_else(|()| {
                    report.invalid_cells += 1;
                    debug!("{date} / '{col}': '{raw}' is not a number");
                    None
                }),
                None => None,
            };
            column.push(value);
        }
        values.push((col.clone(), column));
    }

    let index = rows.into_iter().map(|(date, _)| date).collect::<Vec<_>>();
    report.rows_kept = index.len();
    Ok(Dataset::from_columns(index, values))
}

/// Blank header cells get a positional name; repeated names get a `.N` suffix.
fn unique_headers(raw: &[String]) -> Vec<String> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    raw.iter()
        .enumerate()
        .map(|(i, h)| {
            let base = match h.trim() {
                "" => format!("column_{i}"),
                trimmed => trimmed.to_string(),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Spreadsheet reader
// ---------------------------------------------------------------------------

fn read_spreadsheet(path: &Path, opts: &SourceOptions) -> Result<Table> {
    let bytes = std::fs::read(path).map_err(|source| PipelineError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| PipelineError::malformed(path, e))?;

    let range = match &opts.sheet {
        Some(name) => workbook.worksheet_range(name),
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| PipelineError::malformed(path, "workbook has no worksheet"))?,
    }
    .map_err(|e| PipelineError::malformed(path, e))?;

    Ok(table_from_range(&range))
}

/// First row → headers, remaining rows → raw cells.
pub(crate) fn table_from_range(range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|r| {
            r.iter()
                .map(|c| match cell_to_raw(c) {
                    RawValue::Empty => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    let rows = rows.map(|r| r.iter().map(cell_to_raw).collect()).collect();
    Table {
        headers,
        rows,
        unreadable_rows: 0,
    }
}

fn cell_to_raw(cell: &Data) -> RawValue {
    match cell {
        Data::Int(i) => RawValue::Number(*i as f64),
        Data::Float(f) => RawValue::Number(*f),
        Data::String(s) | Data::DateTimeIso(s) => RawValue::from(s.as_str()),
        Data::Bool(b) => RawValue::Text(b.to_string()),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| RawValue::Date(dt.date()))
            .unwrap_or(RawValue::Empty),
        Data::DurationIso(s) => RawValue::Text(s.clone()),
        _ => RawValue::Empty,
    }
}

// ---------------------------------------------------------------------------
// Delimited-text reader
// ---------------------------------------------------------------------------

fn read_delimited(path: &Path, opts: &SourceOptions) -> Result<Table> {
    let file = File::open(path).map_err(|source| PipelineError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(opts.delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::malformed(path, format!("reading headers: {e}")))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut table = Table {
        headers,
        ..Table::default()
    };
    for (row_no, result) in reader.records().enumerate() {
        match result {
            Ok(record) => table.rows.push(record.iter().map(RawValue::from).collect()),
            Err(e) => {
                table.unreadable_rows += 1;
                debug!("{}: skipping record {row_no}: {e}", path.display());
            }
        }
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

/// Expected schema: one date-like column (`Date32`, `Date64`, `Timestamp` or
/// ISO text) and numeric or text metric columns.
fn read_parquet(path: &Path) -> Result<Table> {
    let file = File::open(path).map_err(|source| PipelineError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| PipelineError::malformed(path, e))?;
    // Headers come from the schema: a file without rows is an empty dataset.
    let mut table = Table {
        headers: builder.schema().fields().iter().map(|f| f.name().clone()).collect(),
        ..Table::default()
    };
    let reader = builder.build().map_err(|e| PipelineError::malformed(path, e))?;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let columns = batch
            .columns()
            .iter()
            .map(normalize_arrow_column)
            .collect::<anyhow::Result<Vec<_>>>()?;

        for row in 0..batch.num_rows() {
            table.rows.push(columns.iter().map(|col| arrow_cell(col, row)).collect());
        }
    }
    Ok(table)
}

/// Cast temporal columns to `Date32` and numeric columns to `Float64` so that
/// [`arrow_cell`] only has a handful of layouts to handle.
fn normalize_arrow_column(col: &ArrayRef) -> anyhow::Result<ArrayRef> {
    let target = match col.data_type() {
        DataType::Date64 | DataType::Timestamp(_, _) => DataType::Date32,
        DataType::Float64 => return Ok(Arc::clone(col)),
        dt if dt.is_numeric() => DataType::Float64,
        _ => return Ok(Arc::clone(col)),
    };
    arrow::compute::cast(col.as_ref(), &target)
        .with_context(|| format!("casting {} column to {target}", col.data_type()))
}

fn arrow_cell(col: &ArrayRef, row: usize) -> RawValue {
    if col.is_null(row) {
        return RawValue::Empty;
    }
    match col.data_type() {
        DataType::Utf8 => RawValue::from(col.as_string::<i32>().value(row)),
        DataType::LargeUtf8 => RawValue::from(col.as_string::<i64>().value(row)),
        DataType::Float64 => RawValue::Number(col.as_primitive::<Float64Type>().value(row)),
        DataType::Date32 => col
            .as_primitive::<Date32Type>()
            .value_as_date(row)
            .map(RawValue::Date)
            .unwrap_or(RawValue::Empty),
        _ => RawValue::Empty,
    }
}

// ---------------------------------------------------------------------------
// JSON records reader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, as written by `df.to_json(orient='records')`.
/// The date column (default `date`) comes first; other keys follow in the
/// order they are first seen.
fn read_json(path: &Path, opts: &SourceOptions) -> Result<Table> {
    let text = std::fs::read_to_string(path).map_err(|source| PipelineError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let root: JsonValue =
        serde_json::from_str(&text).map_err(|e| PipelineError::malformed(path, e))?;
    let records = root
        .as_array()
        .ok_or_else(|| PipelineError::malformed(path, "expected top-level JSON array"))?;

    let date_column = opts.date_column.clone().unwrap_or_else(|| "date".to_string());
    let mut headers = vec![date_column];
    for obj in records.iter().filter_map(JsonValue::as_object) {
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let mut table = Table {
        headers,
        ..Table::default()
    };
    for (i, rec) in records.iter().enumerate() {
        let Some(obj) = rec.as_object() else {
            table.unreadable_rows += 1;
            debug!("{}: record {i} is not a JSON object", path.display());
            continue;
        };
        let row = table.headers.iter().map(|h| json_to_raw(obj.get(h))).collect();
        table.rows.push(row);
    }
    Ok(table)
}

fn json_to_raw(val: Option<&JsonValue>) -> RawValue {
    match val {
        None | Some(JsonValue::Null) => RawValue::Empty,
        Some(JsonValue::String(s)) => RawValue::from(s.as_str()),
        Some(JsonValue::Number(n)) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Empty),
        Some(other) => RawValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    /// Header row, legend row, Jan–Dec 2020 with one garbage row in between.
    fn production_range() -> Range<Data> {
        let mut range = Range::new((0, 0), (14, 2));
        range.set_value((0, 0), Data::String("Période".into()));
        range.set_value((0, 1), Data::String("Production totale".into()));
        range.set_value((0, 2), Data::String("Production nucléaire".into()));
        range.set_value((1, 1), Data::String("en GWh".into()));
        range.set_value((1, 2), Data::String("en GWh".into()));
        let mut r = 2;
        for month in (1..=12).rev() {
            if month == 6 {
                range.set_value((r, 0), Data::String("total annuel".into()));
                range.set_value((r, 1), Data::Float(1.0));
                r += 1;
            }
            range.set_value((r, 0), Data::String(format!("2020-{month:02}-01")));
            range.set_value((r, 1), Data::Float(40_000.0 + month as f64));
            range.set_value((r, 2), Data::Int(30_000 + month as i64));
            r += 1;
        }
        range
    }

    #[test]
    fn spreadsheet_skips_legend_and_bad_dates() {
        let table = table_from_range(&production_range());
        assert_eq!(table.headers[0], "Période");

        let (ds, report) = dataset_from_table(
            table,
            &SourceOptions::spreadsheet(),
            DuplicatePolicy::KeepLast,
        )
        .unwrap();

        assert_eq!(ds.len(), 12);
        assert!(ds.index().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ds.index()[0], d(2020, 1, 1));
        assert_eq!(ds.index()[11], d(2020, 12, 1));
        assert_eq!(ds.column("Production totale").unwrap()[0], Some(40_001.0));
        assert_eq!(ds.column("Production nucléaire").unwrap()[11], Some(30_012.0));
        assert_eq!(report.rows_read, 13);
        assert_eq!(report.invalid_dates, 1);
        assert_eq!(report.rows_kept, 12);
    }

    /// Workbook with the production sheet first (real date cells, a legend
    /// row, months in reverse and one bad period) and a trade sheet second.
    fn write_workbook(path: &Path) {
        use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

        let mut workbook = Workbook::new();
        let date_format = Format::new().set_num_format("dd/mm/yyyy");

        let production = workbook.add_worksheet().set_name("Production").unwrap();
        production.write_string(0, 0, "Période").unwrap();
        production.write_string(0, 1, "Production totale").unwrap();
        production.write_string(1, 1, "en GWh").unwrap();
        let mut row = 2;
        for month in (1..=12u8).rev() {
            if month == 6 {
                production.write_string(row, 0, "total annuel").unwrap();
                production.write_number(row, 1, 1.0).unwrap();
                row += 1;
            }
            let date = ExcelDateTime::from_ymd(2020, month, 1).unwrap();
            production.write_with_format(row, 0, &date, &date_format).unwrap();
            production.write_number(row, 1, 40_000.0 + f64::from(month)).unwrap();
            row += 1;
        }

        let trade = workbook.add_worksheet().set_name("Échanges").unwrap();
        trade.write_string(0, 0, "Période").unwrap();
        trade.write_string(0, 1, "fr_gb").unwrap();
        trade.write_string(1, 1, "en GWh").unwrap();
        trade.write_string(2, 0, "2021-02").unwrap();
        trade.write_number(2, 1, 12.5).unwrap();
        trade.write_string(3, 0, "2021-01").unwrap();
        trade.write_number(3, 1, 10.0).unwrap();

        workbook.save(path).unwrap();
    }

    #[test]
    fn workbook_first_sheet_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("production.xlsx");
        write_workbook(&path);

        let (ds, report) = load_with_report(&path, &PipelineConfig::default()).unwrap();
        assert_eq!(ds.len(), 12);
        assert!(ds.index().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ds.index()[0], d(2020, 1, 1));
        assert_eq!(ds.index()[11], d(2020, 12, 1));
        assert_eq!(ds.column("Production totale").unwrap()[0], Some(40_001.0));
        assert_eq!(report.rows_read, 13);
        assert_eq!(report.invalid_dates, 1);
    }

    #[test]
    fn workbook_named_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("production.xlsx");
        write_workbook(&path);

        let mut config = PipelineConfig::default();
        config.spreadsheet.sheet = Some("Échanges".into());
        let ds = load(&path, &config).unwrap();
        assert_eq!(ds.index(), &[d(2021, 1, 1), d(2021, 2, 1)]);
        assert_eq!(ds.column("fr_gb").unwrap(), &[Some(10.0), Some(12.5)]);

        config.spreadsheet.sheet = Some("Absente".into());
        let err = load(&path, &config).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedSource { .. }));
    }

    #[test]
    fn parquet_without_rows_is_an_empty_dataset() {
        use arrow::datatypes::{Field, Schema};
        use parquet::arrow::ArrowWriter;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.parquet");
        let schema = Arc::new(Schema::new(vec![
            Field::new("date", DataType::Date32, false),
            Field::new("load", DataType::Float64, true),
        ]));
        let file = File::create(&path).unwrap();
        ArrowWriter::try_new(file, schema, None).unwrap().close().unwrap();

        let (ds, report) = load_with_report(&path, &PipelineConfig::default()).unwrap();
        assert!(ds.is_empty());
        assert_eq!(ds.column_names(), &["load".to_string()]);
        assert_eq!(report.rows_read, 0);
    }

    #[test]
    fn delimited_trade_file() {
        let file = write_temp(
            ".csv",
            "date;fr_gb;gb_fr;flag\n\
             02/01/2021;1.234,5;10.5;1\n\
             01/01/2021;2.000;3.25;0\n\
             2021-01-03;9;9;9\n\
             03/01/2021;n/a;;1\n",
        );
        let (ds, report) = load_with_report(file.path(), &PipelineConfig::default()).unwrap();

        assert_eq!(ds.index(), &[d(2021, 1, 1), d(2021, 1, 2), d(2021, 1, 3)]);
        // text column: thousands stripped, decimal comma converted
        assert_eq!(ds.column("fr_gb").unwrap(), &[Some(2000.0), Some(1234.5), None]);
        // already numeric column: untouched
        assert_eq!(ds.column("gb_fr").unwrap(), &[Some(3.25), Some(10.5), None]);
        assert_eq!(report.invalid_dates, 1);
        assert_eq!(report.invalid_cells, 1);
    }

    #[test]
    fn duplicate_dates_follow_policy() {
        let content = "date;load\n01/01/2021;1\n01/01/2021;2\n02/01/2021;3\n";
        let file = write_temp(".csv", content);

        let mut config = PipelineConfig::default();
        let (ds, report) = load_with_report(file.path(), &config).unwrap();
        assert_eq!(ds.column("load").unwrap(), &[Some(2.0), Some(3.0)]);
        assert_eq!(report.duplicate_dates, 1);

        config.duplicate_policy = DuplicatePolicy::KeepFirst;
        let ds = load(file.path(), &config).unwrap();
        assert_eq!(ds.column("load").unwrap(), &[Some(1.0), Some(3.0)]);

        config.duplicate_policy = DuplicatePolicy::Reject;
        let err = load(file.path(), &config).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateTimestamp(date) if date == d(2021, 1, 1)));
    }

    #[test]
    fn missing_date_column_is_malformed() {
        let file = write_temp(".csv", "when;load\n01/01/2021;1\n");
        let err = load(file.path(), &PipelineConfig::default()).unwrap_err();
        match err {
            PipelineError::MalformedSource { path, reason } => {
                assert_eq!(path, file.path());
                assert!(reason.contains("date"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let missing = Path::new("/definitely/not/here.csv");
        let err = load(missing, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load(Path::new("data.xml"), &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat(ext) if ext == "xml"));
    }

    #[test]
    fn garbage_workbook_is_malformed() {
        let file = write_temp(".xlsx", "this is not a zip archive");
        let err = load(file.path(), &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedSource { .. }));
    }

    #[test]
    fn json_records() {
        let file = write_temp(
            ".json",
            r#"[
                {"date": "2021-02-01", "nuclear": 30000, "wind": "3500.5"},
                {"date": "2021-01-01", "nuclear": 31000, "wind": null},
                "not a record",
                {"date": "garbage", "nuclear": 1}
            ]"#,
        );
        let (ds, report) = load_with_report(file.path(), &PipelineConfig::default()).unwrap();
        assert_eq!(ds.index(), &[d(2021, 1, 1), d(2021, 2, 1)]);
        assert_eq!(ds.column("nuclear").unwrap(), &[Some(31000.0), Some(30000.0)]);
        assert_eq!(ds.column("wind").unwrap(), &[None, Some(3500.5)]);
        assert_eq!(report.unreadable_rows, 1);
        assert_eq!(report.invalid_dates, 1);
        assert_eq!(report.rows_read, 4);
    }

    #[test]
    fn headers_are_made_unique() {
        let raw = vec!["date".to_string(), "x".into(), "x".into(), "".into()];
        assert_eq!(unique_headers(&raw), vec!["date", "x", "x.1", "column_3"]);
    }
}
