use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Date32Array, Float64Array};
use arrow::datatypes::{DataType, Date32Type, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use chrono::{Datelike, NaiveDate};
use log::{info, warn};
use parquet::arrow::ArrowWriter;

use elec_france::views::{
    CorrelationOutcome, Counterpart, EnergySource, ProductionOverview, ProductionQuery,
    TradeOverview, TOTAL_PRODUCTION,
};
use elec_france::{DatasetCache, PipelineConfig};

const FIRST_YEAR: i32 = 2012;
const LAST_YEAR: i32 = 2023;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn months() -> Vec<NaiveDate> {
    (FIRST_YEAR..=LAST_YEAR)
        .flat_map(|y| (1..=12).filter_map(move |m| NaiveDate::from_ymd_opt(y, m, 1)))
        .collect()
}

/// Winter peak = 1, summer trough = -1.
fn season(date: NaiveDate) -> f64 {
    (2.0 * std::f64::consts::PI * date.month0() as f64 / 12.0).cos()
}

/// `1234.5` → `1.234,5`
fn format_fr(value: f64) -> String {
    let text = format!("{:.1}", value.abs());
    let (int_part, frac) = text.split_once('.').unwrap_or((text.as_str(), "0"));
    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped},{frac}")
}

fn write_production(path: &Path, rng: &mut SimpleRng) -> Result<()> {
    let dates = months();
    let mut by_source: Vec<(EnergySource, Vec<f64>)> = EnergySource::ALL
        .iter()
        .map(|s| (*s, Vec::new()))
        .collect();

    for (i, date) in dates.iter().enumerate() {
        let years = i as f64 / 12.0;
        let s = season(*date);
        for (source, values) in &mut by_source {
            let value = match source {
                EnergySource::Nuclear => 31_000.0 + 4_000.0 * s + rng.gauss(0.0, 900.0),
                EnergySource::Hydro => 5_200.0 + 900.0 * s + rng.gauss(0.0, 600.0),
                EnergySource::Wind => 1_200.0 + 280.0 * years + 500.0 * s + rng.gauss(0.0, 300.0),
                EnergySource::Solar => 300.0 + 120.0 * years - 250.0 * s + rng.gauss(0.0, 60.0),
                EnergySource::Thermal => 3_000.0 + 1_500.0 * s + rng.gauss(0.0, 400.0),
            };
            values.push(value.max(1.0));
        }
    }
    let total: Vec<f64> = (0..dates.len())
        .map(|i| by_source.iter().map(|(_, values)| values[i]).sum())
        .collect();

    let mut fields = vec![
        Field::new("Période", DataType::Date32, false),
        Field::new(TOTAL_PRODUCTION, DataType::Float64, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(Date32Array::from(
            dates.iter().map(|d| Date32Type::from_naive_date(*d)).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(total)),
    ];
    for (source, values) in by_source {
        fields.push(Field::new(source.column(), DataType::Float64, false));
        columns.push(Arc::new(Float64Array::from(values)));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building production batch")?;
    info!(
        "production preview:\n{}",
        pretty_format_batches(&[batch.slice(0, 3)]).context("formatting preview")?
    );

    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing production batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn write_trade(path: &Path, rng: &mut SimpleRng) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let mut header = vec!["date".to_string()];
    for c in Counterpart::ALL {
        header.push(c.export_column());
        header.push(c.import_column());
    }
    writer.write_record(&header)?;

    for date in months() {
        let s = season(date);
        let mut record = vec![date.format("%d/%m/%Y").to_string()];
        for (k, _) in Counterpart::ALL.iter().enumerate() {
            let scale = 1_000.0 + 400.0 * k as f64;
            let exports = (scale * (1.0 - 0.3 * s) + rng.gauss(0.0, 120.0)).max(0.0);
            let imports = (scale * 0.4 * (1.0 + 0.5 * s) + rng.gauss(0.0, 80.0)).max(0.0);
            record.push(format_fr(exports));
            record.push(format_fr(imports));
        }
        writer.write_record(&record)?;
    }
    // A row with a date the loader must reject.
    let mut garbage = vec!["total".to_string()];
    garbage.extend(std::iter::repeat(String::new()).take(Counterpart::ALL.len() * 2));
    writer.write_record(&garbage)?;
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let production_path = out_dir.join("production_sample.parquet");
    let trade_path = out_dir.join("imports_exports_sample.csv");
    write_production(&production_path, &mut rng)?;
    write_trade(&trade_path, &mut rng)?;

    // Read both back through the pipeline.
    let config = PipelineConfig::default();
    let mut cache = DatasetCache::new(config.clone());

    let production = cache.get_or_load(&production_path)?;
    let query = ProductionQuery::full_span(&production, &config)?;
    let overview = ProductionOverview::build(&production, &query)?;
    for (source, annual) in &overview.annual {
        info!("{source}: {} annual means", annual.valid_count());
    }
    match &overview.correlation {
        CorrelationOutcome::Fitted(result) => info!(
            "nuclear vs {} variation: slope {:.4}, intercept {:.4} over {} months",
            query.compare_with,
            result.slope(),
            result.intercept(),
            result.len()
        ),
        CorrelationOutcome::InsufficientData { found } => {
            warn!("not enough aligned variations for a fit ({found})")
        }
    }

    let trade = cache.get_or_load(&trade_path)?;
    if let Some(report) = cache.report(&trade_path) {
        info!("trade file: {} rows kept, {} dropped", report.rows_kept, report.dropped_rows());
    }
    for counterpart in Counterpart::ALL {
        let overview = TradeOverview::build(&trade, counterpart, FIRST_YEAR, LAST_YEAR)?;
        let net: f64 = overview.balance.values().iter().flatten().sum();
        info!("{counterpart}: net balance {net:.1} GWh over {FIRST_YEAR}-{LAST_YEAR}");
    }

    println!(
        "Wrote {} and {} ({} months each)",
        production_path.display(),
        trade_path.display(),
        production.len()
    );
    Ok(())
}
