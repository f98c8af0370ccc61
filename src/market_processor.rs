use crate::output::CsvOutput;
use crate::visualization::ChartRenderer;
use anyhow::{Context, Result};
use eval_core::{AnalysisConfig, CsvDialect, FlowTable, MeritOrder, MonthlyMarketValues};
use log::info;
use polars::prelude::*;
use std::path::Path;

/// Merit order of the dispatchable fleet and hourly market values.
pub struct MarketProcessor {
    config: AnalysisConfig,
    output: CsvOutput,
}

impl MarketProcessor {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            output: CsvOutput::new(&config.paths.output_dir, config.paths.delimiter_byte())?,
        })
    }

    /// Sort the unit blocks into a merit order, write the steps and plot
    /// them as a step chart.
    pub fn merit_order(
        &self,
        blocks_path: &Path,
        dialect: CsvDialect,
        y_limits: Option<(f64, f64)>,
    ) -> Result<MeritOrder> {
        println!("\n📶 Merit order");
        println!("{}", "=".repeat(60));

        let blocks = MeritOrder::load_blocks(blocks_path, dialect.delimiter)
            .with_context(|| format!("loading merit order blocks from {}", blocks_path.display()))?;
        let merit_order = MeritOrder::from_blocks(blocks)?;
        info!(
            "{} units with {:.1} MW in the merit order",
            merit_order.steps().len(),
            merit_order.total_capacity()
        );

        let path = self.write_steps("merit_order.csv", &merit_order)?;
        let charts = ChartRenderer::new(&self.config.paths.plot_dir, &self.config.labels)?;
        charts.merit_order("merit_order", &merit_order, y_limits)?;

        for fuel in merit_order.fuels() {
            let capacity: f64 = merit_order
                .steps()
                .iter()
                .filter(|s| s.fuel == fuel)
                .map(|s| s.capacity_cumulated - s.capacity_start)
                .sum();
            println!("  {:<16} {:>12.1} MW", fuel, capacity);
        }

        println!("✅ Saved merit order to: {}", path.display());
        Ok(merit_order)
    }

    /// Spread monthly market values over the hours of `year`.
    pub fn market_values(&self, path: &Path, dialect: CsvDialect, year: i32) -> Result<FlowTable> {
        println!("\n🏷️  Market values {}", year);
        println!("{}", "=".repeat(60));

        let monthly = MonthlyMarketValues::load(path, dialect.delimiter, dialect.decimal_comma)
            .with_context(|| format!("loading market values from {}", path.display()))?;
        let hourly = monthly.to_hourly(year)?;

        for (technology, values) in hourly.columns() {
            let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
            println!("  {:<16} mean {:>10.2} €/MWh", technology, mean);
        }

        let written = self
            .output
            .write_table(&format!("market_values_hourly_{}.csv", year), &hourly)?;
        println!("✅ Saved {} hourly market values to: {}", hourly.height(), written.display());
        Ok(hourly)
    }

    fn write_steps(&self, file_name: &str, merit_order: &MeritOrder) -> Result<std::path::PathBuf> {
        let steps = merit_order.steps();
        let mut df = DataFrame::new(vec![
            Series::new("unit".into(), steps.iter().map(|s| s.unit.as_str()).collect::<Vec<_>>()),
            Series::new("fuel".into(), steps.iter().map(|s| s.fuel.as_str()).collect::<Vec<_>>()),
            Series::new(
                "costs_marginal".into(),
                steps.iter().map(|s| s.marginal_cost).collect::<Vec<_>>(),
            ),
            Series::new(
                "capacity_start".into(),
                steps.iter().map(|s| s.capacity_start).collect::<Vec<_>>(),
            ),
            Series::new(
                "capacity_cumulated".into(),
                steps.iter().map(|s| s.capacity_cumulated).collect::<Vec<_>>(),
            ),
        ])?;
        self.output.write_dataframe(file_name, &mut df)
    }
}
