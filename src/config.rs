use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Duplicate-date policy
// ---------------------------------------------------------------------------

/// What to do when two rows of a source carry the same observation date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    KeepFirst,
    /// Later rows overwrite earlier ones (file order).
    #[default]
    KeepLast,
    Reject,
}

// ---------------------------------------------------------------------------
// Per-format options
// ---------------------------------------------------------------------------

/// How to read one family of source files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceOptions {
    /// Column holding the observation date. `None` → first column.
    pub date_column: Option<String>,
    /// `chrono` formats tried in order on textual dates.
    pub date_formats: Vec<String>,
    /// Data rows discarded right after the header (legend rows).
    pub skip_leading_rows: usize,
    /// Field delimiter for delimited text.
    pub delimiter: char,
    /// Normalise `1.234,5`-style numbers in columns that are not already numeric.
    pub decimal_comma: bool,
    /// Worksheet name; `None` → first sheet.
    pub sheet: Option<String>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            date_column: None,
            date_formats: vec!["%Y-%m-%d".into()],
            skip_leading_rows: 0,
            delimiter: ',',
            decimal_comma: false,
            sheet: None,
        }
    }
}

impl SourceOptions {
    /// The national production workbook: a legend row under the header and a
    /// period label in the first column.
    pub fn spreadsheet() -> Self {
        Self {
            date_formats: [
                "%Y-%m-%d",
                "%Y-%m-%dT%H:%M:%S",
                "%Y-%m-%d %H:%M:%S",
                "%d/%m/%Y",
                "%Y/%m/%d",
                "%Y-%m",
                "%m/%Y",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            skip_leading_rows: 1,
            ..Self::default()
        }
    }

    /// The cross-border trade export: `;`-separated, `dd/mm/yyyy` dates,
    /// French number formatting.
    pub fn delimited() -> Self {
        Self {
            date_column: Some("date".into()),
            date_formats: vec!["%d/%m/%Y".into()],
            delimiter: ';',
            decimal_comma: true,
            ..Self::default()
        }
    }

    /// Parquet and JSON-records exports.
    pub fn columnar() -> Self {
        Self {
            date_formats: vec!["%Y-%m-%d".into(), "%Y-%m-%dT%H:%M:%S".into(), "%Y-%m".into()],
            ..Self::default()
        }
    }

    /// Replace the fields present in `overrides`, keeping the rest.
    fn merged(mut self, overrides: SourceOverrides) -> Self {
        if let Some(column) = overrides.date_column {
            self.date_column = Some(column);
        }
        if let Some(formats) = overrides.date_formats {
            self.date_formats = formats;
        }
        if let Some(rows) = overrides.skip_leading_rows {
            self.skip_leading_rows = rows;
        }
        if let Some(delimiter) = overrides.delimiter {
            self.delimiter = delimiter;
        }
        if let Some(decimal_comma) = overrides.decimal_comma {
            self.decimal_comma = decimal_comma;
        }
        if let Some(sheet) = overrides.sheet {
            self.sheet = Some(sheet);
        }
        self
    }

    fn validate(&self, family: &str) -> Result<()> {
        if self.date_formats.is_empty() {
            return Err(PipelineError::Config(format!(
                "{family}: at least one date format is required"
            )));
        }
        if !self.delimiter.is_ascii() {
            return Err(PipelineError::Config(format!(
                "{family}: delimiter must be a single ASCII character"
            )));
        }
        Ok(())
    }
}

/// One source section as written in a configuration file. Absent fields keep
/// the defaults of that source family.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SourceOverrides {
    date_column: Option<String>,
    date_formats: Option<Vec<String>>,
    skip_leading_rows: Option<usize>,
    delimiter: Option<char>,
    decimal_comma: Option<bool>,
    sheet: Option<String>,
}

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

/// Top-level configuration file layout.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PipelineConfigFile {
    spreadsheet: SourceOverrides,
    delimited: SourceOverrides,
    columnar: SourceOverrides,
    duplicate_policy: Option<DuplicatePolicy>,
    rolling_window: Option<usize>,
}

impl From<PipelineConfigFile> for PipelineConfig {
    fn from(file: PipelineConfigFile) -> Self {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            spreadsheet: defaults.spreadsheet.merged(file.spreadsheet),
            delimited: defaults.delimited.merged(file.delimited),
            columnar: defaults.columnar.merged(file.columnar),
            duplicate_policy: file.duplicate_policy.unwrap_or(defaults.duplicate_policy),
            rolling_window: file.rolling_window.unwrap_or(defaults.rolling_window),
        }
    }
}

/// Deserializing merges each source section over the defaults of its own
/// family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PipelineConfigFile")]
pub struct PipelineConfig {
    pub spreadsheet: SourceOptions,
    pub delimited: SourceOptions,
    pub columnar: SourceOptions,
    pub duplicate_policy: DuplicatePolicy,
    /// Trailing window (in observations) of the production trend curve.
    pub rolling_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            spreadsheet: SourceOptions::spreadsheet(),
            delimited: SourceOptions::delimited(),
            columnar: SourceOptions::columnar(),
            duplicate_policy: DuplicatePolicy::default(),
            rolling_window: 12,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON configuration; absent keys keep their family defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: PipelineConfig =
            serde_json::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            PipelineError::SourceUnavailable {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rolling_window == 0 {
            return Err(PipelineError::Config(
                "rolling_window must be at least 1".into(),
            ));
        }
        self.spreadsheet.validate("spreadsheet")?;
        self.delimited.validate("delimited")?;
        self.columnar.validate("columnar")
    }
}
