use crate::output::CsvOutput;
use crate::visualization::ChartRenderer;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use eval_core::{AnalysisConfig, CostTrajectories, FlowTable, Resolution};
use std::path::Path;

pub struct CostProcessor {
    config: AnalysisConfig,
    output: CsvOutput,
}

impl CostProcessor {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            output: CsvOutput::new(&config.paths.output_dir, config.paths.delimiter_byte())?,
        })
    }

    /// Resample the cost indices, write and plot them, and report the values
    /// at `at` when given.
    pub fn process(
        &self,
        costs_path: &Path,
        delimiter: u8,
        resolution: Resolution,
        at: Option<NaiveDateTime>,
    ) -> Result<FlowTable> {
        println!("\n💰 Fuel and emission cost trajectories");
        println!("{}", "=".repeat(60));

        let costs = CostTrajectories::load(costs_path, delimiter, &self.config.vocabulary.market_area)
            .with_context(|| format!("loading cost trajectories from {}", costs_path.display()))?;
        let resampled = costs.resample(resolution)?;

        let suffix = match resolution {
            Resolution::Hourly => "hourly",
            Resolution::Annual => "annual",
        };
        let path = self.output.write_table(&format!("costs_{}.csv", suffix), &resampled)?;

        let charts = ChartRenderer::new(&self.config.paths.plot_dir, &self.config.labels)?;
        let series = resampled
            .column_names()
            .map(|name| resampled.series(name))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<_> = series.iter().collect();
        charts.line_chart(
            &format!("costs_{}", suffix),
            "Fuel and emission cost trajectories",
            "cost index",
            &refs,
            None,
        )?;

        if let Some(time) = at {
            println!("\nCosts at {}:", time);
            for (carrier, value) in costs.values_at(resolution, time)? {
                println!("  {:<16} {:>10.3}", carrier, value);
            }
        }

        println!("✅ Saved {} cost trajectories to: {}", suffix, path.display());
        Ok(resampled)
    }
}
