use crate::output::CsvOutput;
use crate::visualization::ChartRenderer;
use anyhow::{bail, Context, Result};
use eval_core::alignment::align_to_model;
use eval_core::data_loader::HISTORICAL_PRICE;
use eval_core::{
    error_metrics, AnalysisConfig, CsvDialect, DataLoader, ErrorMetrics, HistoricalFormat, HourlySeries,
    StatsCalculator, SummaryStats,
};
use glob::glob;
use log::{info, warn};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub struct PriceValidationRequest {
    pub year: i32,
    pub historical_files: Vec<PathBuf>,
    pub format: HistoricalFormat,
    pub dialect: CsvDialect,
    pub price_column: Option<String>,
    pub model_path: PathBuf,
    pub model_column: Option<String>,
    pub weekly_plots: bool,
}

#[derive(Debug, Serialize)]
pub struct PriceComparison {
    pub year: i32,
    pub stats: Vec<SummaryStats>,
    pub metrics: ErrorMetrics,
    #[serde(skip)]
    pub historical: HourlySeries,
    #[serde(skip)]
    pub model: HourlySeries,
}

/// Historical day-ahead prices against the dispatch model's prices for one year.
pub struct PriceValidator {
    config: AnalysisConfig,
    output: CsvOutput,
}

impl PriceValidator {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let output = CsvOutput::new(&config.paths.output_dir, config.paths.delimiter_byte())?;

        Ok(Self {
            config: config.clone(),
            output,
        })
    }

    pub fn run(&self, request: &PriceValidationRequest) -> Result<PriceComparison> {
        println!("\n💶 Price validation for {}", request.year);
        println!("{}", "=".repeat(60));

        // Step 1: Load and align both series
        let comparison = self.compare(request)?;
        print_comparison(&comparison);

        // Step 2: Write statistics
        let stats_path = self
            .output
            .write_summary(&format!("price_stats_{}.csv", request.year), &comparison.stats)?;
        self.output
            .write_json(&format!("price_validation_{}.json", request.year), &comparison)?;
        println!("\n✅ Saved statistics to: {}", stats_path.display());

        // Step 3: Render charts
        self.render(&comparison, request.weekly_plots)?;

        Ok(comparison)
    }

    pub fn compare(&self, request: &PriceValidationRequest) -> Result<PriceComparison> {
        if request.historical_files.is_empty() {
            bail!("No historical price files given for {}", request.year);
        }

        let mut loader = DataLoader::new(request.dialect);
        if let Some(column) = &request.price_column {
            loader = loader.with_price_column(column);
        }

        let historical = loader
            .load_historical_prices(request.year, &request.historical_files, request.format)
            .with_context(|| format!("loading historical prices for {}", request.year))?;
        info!("Loaded {} historical hours", historical.len());

        let mut model = loader
            .load_model_prices(&request.model_path, request.model_column.as_deref())
            .with_context(|| format!("loading model prices from {}", request.model_path.display()))?;
        if model.years().len() > 1 {
            model = model.slice_year(request.year);
        }
        if model.is_empty() {
            bail!("Model prices contain no hours of {}", request.year);
        }

        let historical = align_to_model(historical, &model)?;

        let calculator = StatsCalculator::new(self.config.prices.price_cap);
        let stats = calculator.compare(&[&historical, &model])?;
        let metrics = error_metrics(&historical, &model)?;

        Ok(PriceComparison {
            year: request.year,
            stats,
            metrics,
            historical,
            model,
        })
    }

    fn render(&self, comparison: &PriceComparison, weekly_plots: bool) -> Result<()> {
        let charts = ChartRenderer::new(&self.config.paths.plot_dir, &self.config.labels)?;
        let series = [&comparison.historical, &comparison.model];
        let limits = self.config.prices.plot_limits;
        let year = comparison.year;

        charts.line_chart(
            &format!("power_prices_{}", year),
            &format!("Power price time series comparison for {}", year),
            "power price in €/MWh",
            &series,
            Some(limits),
        )?;
        charts.duration_curve(&format!("price_duration_curve_{}", year), &series, None)?;
        charts.negative_histogram(
            &format!("negative_prices_histogram_{}", year),
            &series,
            self.config.prices.histogram_bins,
        )?;

        if weekly_plots {
            if comparison.model.len() < 52 * 168 + 1 {
                warn!("Less than 52 full weeks of prices; skipping weekly plots");
            } else {
                charts.weekly_plots("power_prices", year, &series, limits)?;
            }
        }

        println!("✅ Saved charts to: {}", charts.plot_dir().display());
        Ok(())
    }
}

fn print_comparison(comparison: &PriceComparison) {
    println!("\n📊 Descriptive statistics");
    print!("{:<16}", "");
    for s in &comparison.stats {
        print!("{:>18}", s.name);
    }
    println!();
    for (row, label) in SummaryStats::ROW_LABELS.iter().enumerate() {
        print!("{:<16}", label);
        for s in &comparison.stats {
            print!("{:>18.2}", s.as_row()[row]);
        }
        println!();
    }

    println!("\n📏 Error metrics ({} vs. model)", HISTORICAL_PRICE);
    println!("  MAE:   {:.2}", comparison.metrics.mae);
    println!("  RMSE:  {:.2}", comparison.metrics.rmse);
    println!("  NRMSE: {:.4}", comparison.metrics.nrmse);
}

/// Historical price files in `dir` whose file name carries `year`.
pub fn discover_historical_files(dir: &Path, year: i32) -> Result<Vec<PathBuf>> {
    let year_pattern = Regex::new(r"(?:^|\D)((?:19|20)\d{2})(?:\D|$)")?;
    let pattern = dir.join("*.csv");
    let pattern = pattern
        .to_str()
        .with_context(|| format!("non UTF-8 path {}", dir.display()))?;

    let mut files: Vec<PathBuf> = glob(pattern)?
        .filter_map(Result::ok)
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            year_pattern
                .captures_iter(name)
                .any(|c| c[1].parse::<i32>().map(|y| y == year).unwrap_or(false))
        })
        .collect();
    files.sort();

    Ok(files)
}
