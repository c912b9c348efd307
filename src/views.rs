use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::aggregate::{resample, resample_annual_mean, rolling_mean, Aggregation, Period};
use crate::analysis::correlation::{correlate_variations, CorrelationResult};
use crate::config::PipelineConfig;
use crate::data::filter::{filter_by_year_range, validate_year_range, year_bounds};
use crate::data::model::{Dataset, Series};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Production source columns
// ---------------------------------------------------------------------------

pub const TOTAL_PRODUCTION: &str = "Production totale nette d'électricité (en GWh)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergySource {
    Nuclear,
    Hydro,
    Wind,
    Solar,
    Thermal,
}

impl EnergySource {
    pub const ALL: [EnergySource; 5] = [
        EnergySource::Nuclear,
        EnergySource::Hydro,
        EnergySource::Wind,
        EnergySource::Solar,
        EnergySource::Thermal,
    ];

    /// Column name in the national production workbook.
    pub fn column(self) -> &'static str {
        match self {
            EnergySource::Nuclear => "Production nette d'électricité nucléaire (en GWh)",
            EnergySource::Hydro => "Production nette d'électricité hydraulique (en GWh)",
            EnergySource::Wind => "Production nette d'électricité éolienne (en GWh)",
            EnergySource::Solar => "Production nette d'électricité photovoltaïque (en GWh)",
            EnergySource::Thermal => "Production nette d'électricité thermique (en GWh)",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EnergySource::Nuclear => "nucléaire",
            EnergySource::Hydro => "hydraulique",
            EnergySource::Wind => "éolienne",
            EnergySource::Solar => "photovoltaïque",
            EnergySource::Thermal => "thermique",
        }
    }
}

impl fmt::Display for EnergySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Production overview
// ---------------------------------------------------------------------------

/// Either a fitted trendline or the number of aligned points that were
/// available when there were too few.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CorrelationOutcome {
    Fitted(CorrelationResult),
    InsufficientData { found: usize },
}

impl CorrelationOutcome {
    fn from_result(result: Result<CorrelationResult>) -> Result<Self> {
        match result {
            Ok(fitted) => Ok(CorrelationOutcome::Fitted(fitted)),
            Err(PipelineError::InsufficientData { found, .. }) => {
                Ok(CorrelationOutcome::InsufficientData { found })
            }
            Err(e) => Err(e),
        }
    }

    pub fn fitted(&self) -> Option<&CorrelationResult> {
        match self {
            CorrelationOutcome::Fitted(result) => Some(result),
            CorrelationOutcome::InsufficientData { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionQuery {
    pub start_year: i32,
    pub end_year: i32,
    pub rolling_window: usize,
    /// Source whose variation is set against nuclear variation.
    pub compare_with: EnergySource,
}

impl ProductionQuery {
    /// Whole observed span, configured trend window, compared with wind.
    pub fn full_span(dataset: &Dataset, config: &PipelineConfig) -> Result<Self> {
        let (start_year, end_year) = year_bounds(dataset).ok_or(PipelineError::InsufficientData {
            context: "production overview",
            needed: 1,
            found: 0,
        })?;
        Ok(ProductionQuery {
            start_year,
            end_year,
            rolling_window: config.rolling_window,
            compare_with: EnergySource::Wind,
        })
    }
}

/// Everything the production page shows, minus the drawing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionOverview {
    pub start_year: i32,
    pub end_year: i32,
    /// Total net production over the selected years.
    pub total: Series,
    /// Trailing mean of `total`.
    pub trend: Series,
    /// Annual means of each energy source present in the dataset.
    pub annual: Vec<(EnergySource, Series)>,
    /// Nuclear variation against `compare_with` variation, over the full
    /// history, on the dates where every source's variation is defined.
    pub correlation: CorrelationOutcome,
}

impl ProductionOverview {
    pub fn build(dataset: &Dataset, query: &ProductionQuery) -> Result<Self> {
        validate_year_range(dataset, query.start_year, query.end_year)?;
        let filtered = filter_by_year_range(dataset, query.start_year, query.end_year)?;

        let total = filtered.series(TOTAL_PRODUCTION)?;
        let trend = rolling_mean(&total, query.rolling_window)?;

        let annual = EnergySource::ALL
            .into_iter()
            .filter(|source| filtered.has_column(source.column()))
            .map(|source| -> Result<(EnergySource, Series)> {
                Ok((source, resample_annual_mean(&filtered.series(source.column())?)))
            })
            .collect::<Result<Vec<_>>>()?;

        let companions: Vec<&str> = EnergySource::ALL
            .into_iter()
            .map(EnergySource::column)
            .filter(|column| dataset.has_column(column))
            .collect();
        let correlation = CorrelationOutcome::from_result(correlate_variations(
            dataset,
            EnergySource::Nuclear.column(),
            query.compare_with.column(),
            &companions,
        ))?;

        Ok(ProductionOverview {
            start_year: query.start_year,
            end_year: query.end_year,
            total,
            trend,
            annual,
            correlation,
        })
    }
}

// ---------------------------------------------------------------------------
// Cross-border trade
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Counterpart {
    GreatBritain,
    /// Central-western Europe coupling (Belgium, Germany).
    Cwe,
    Switzerland,
    Italy,
    Spain,
}

impl Counterpart {
    pub const ALL: [Counterpart; 5] = [
        Counterpart::GreatBritain,
        Counterpart::Cwe,
        Counterpart::Switzerland,
        Counterpart::Italy,
        Counterpart::Spain,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Counterpart::GreatBritain => "GB",
            Counterpart::Cwe => "CWE",
            Counterpart::Switzerland => "CH",
            Counterpart::Italy => "IT",
            Counterpart::Spain => "ES",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Counterpart::GreatBritain => "Grande-Bretagne",
            Counterpart::Cwe => "CWE",
            Counterpart::Switzerland => "Suisse",
            Counterpart::Italy => "Italie",
            Counterpart::Spain => "Espagne",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code.trim()))
    }

    /// France → counterpart column, e.g. `fr_gb`.
    pub fn export_column(self) -> String {
        format!("fr_{}", self.code().to_ascii_lowercase())
    }

    /// Counterpart → France column, e.g. `gb_fr`.
    pub fn import_column(self) -> String {
        format!("{}_fr", self.code().to_ascii_lowercase())
    }
}

impl fmt::Display for Counterpart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Annual trade with one counterpart over a year range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeOverview {
    pub counterpart: Counterpart,
    pub start_year: i32,
    pub end_year: i32,
    /// Yearly totals, labelled on 31 December.
    pub exports: Series,
    pub imports: Series,
    /// `exports - imports` per year; missing when either side is.
    pub balance: Series,
}

impl TradeOverview {
    pub fn build(
        dataset: &Dataset,
        counterpart: Counterpart,
        start_year: i32,
        end_year: i32,
    ) -> Result<Self> {
        validate_year_range(dataset, start_year, end_year)?;
        let filtered = filter_by_year_range(dataset, start_year, end_year)?;

        let annual_sum = |column: String| -> Result<Series> {
            Ok(resample(&filtered.series(&column)?, Period::Year, Aggregation::Sum))
        };
        let exports = annual_sum(counterpart.export_column())?;
        let imports = annual_sum(counterpart.import_column())?;
        let balance = Series::from_points(
            format!("net {}", counterpart.code()),
            exports.iter().map(|(date, exported)| {
                let net = exported.zip(imports.get(date)).map(|(e, i)| e - i);
                (date, net)
            }),
        );

        Ok(TradeOverview {
            counterpart,
            start_year,
            end_year,
            exports,
            imports,
            balance,
        })
    }
}
