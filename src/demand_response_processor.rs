use crate::output::CsvOutput;
use anyhow::{Context, Result};
use eval_core::demand_response::{DrBalance, DrVolumes};
use eval_core::{AnalysisConfig, CsvDialect, DataLoader, DemandResponseAccounting};
use std::path::Path;

pub struct DemandResponseProcessor {
    config: AnalysisConfig,
    output: CsvOutput,
}

impl DemandResponseProcessor {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            output: CsvOutput::new(&config.paths.output_dir, config.paths.delimiter_byte())?,
        })
    }

    /// Annual shift/shed volumes per cluster; aborts when a cluster's shifts
    /// do not balance over the horizon.
    pub fn process(&self, results_path: &Path, dialect: CsvDialect) -> Result<(Vec<DrVolumes>, Vec<DrBalance>)> {
        println!("\n🔄 Demand response utilization");
        println!("{}", "=".repeat(60));

        let table = DataLoader::new(dialect)
            .load_flow_table(results_path)
            .with_context(|| format!("loading demand response results from {}", results_path.display()))?;

        let accounting = DemandResponseAccounting::new(&self.config.demand_response)?;
        let volumes = accounting.annual_volumes(&table)?;
        let volumes_path = self.output.write_dr_volumes("demand_response_volumes.csv", &volumes)?;

        println!(
            "\n{:<6} {:<36} {:>14} {:>14} {:>12}",
            "year", "cluster", "shift_down", "shift_up", "shed"
        );
        for row in &volumes {
            println!(
                "{:<6} {:<36} {:>14.2} {:>14.2} {:>12.2}",
                row.year, row.cluster, row.shift_down, row.shift_up, row.shed
            );
        }

        let balance = accounting
            .check_balance(&volumes)
            .context("demand response shifts are not balanced")?;
        self.output.write_dr_balance("demand_response_balance.csv", &balance)?;

        println!("\n✅ Shifts balanced for {} clusters", balance.len());
        println!("✅ Saved volumes to: {}", volumes_path.display());
        Ok((volumes, balance))
    }
}
