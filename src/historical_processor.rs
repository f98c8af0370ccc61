use crate::flow_balance_processor::annual_totals;
use crate::output::CsvOutput;
use crate::visualization::ChartRenderer;
use anyhow::{Context, Result};
use eval_core::flows::net_exchange_by_country;
use eval_core::{AnalysisConfig, CsvDialect, DataLoader, FlowTable};
use std::path::Path;

/// Historical generation and cross-border exchange of one year, reduced to
/// the same categories as the model results.
pub struct HistoricalProcessor {
    config: AnalysisConfig,
    output: CsvOutput,
    loader: DataLoader,
}

impl HistoricalProcessor {
    pub fn new(config: &AnalysisConfig, dialect: CsvDialect) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            output: CsvOutput::new(&config.paths.output_dir, config.paths.delimiter_byte())?,
            loader: DataLoader::new(dialect),
        })
    }

    pub fn process_generation(&self, path: &Path, year: i32) -> Result<FlowTable> {
        println!("\n🏭 Historical generation {}", year);
        println!("{}", "=".repeat(60));

        let generation = self
            .loader
            .load_entsoe_generation(path, year)
            .with_context(|| format!("loading generation from {}", path.display()))?;
        self.output
            .write_table(&format!("historical_generation_{}.csv", year), &generation)?;

        let totals = annual_totals(&generation, "generation")?;
        for (category, values) in totals.categories.iter().zip(&totals.values) {
            println!("  {:<24} {:>16.1} MWh", category, values.iter().sum::<f64>());
        }
        self.output
            .write_pivot(&format!("historical_generation_annual_{}.csv", year), &totals)?;

        Ok(generation)
    }

    pub fn process_exchange(&self, path: &Path, year: i32) -> Result<FlowTable> {
        println!("\n🔌 Historical cross-border exchange {}", year);
        println!("{}", "=".repeat(60));

        let exchange = self
            .loader
            .load_historical_exchange(path, year)
            .with_context(|| format!("loading exchange from {}", path.display()))?;
        self.output
            .write_table(&format!("historical_exchange_{}.csv", year), &exchange)?;

        let net = net_exchange_by_country(&exchange)?;
        for (country, values) in &net {
            println!("  {:<6} net export {:>14.1} MWh", country, values.iter().sum::<f64>());
        }

        let imports: Vec<(String, Vec<f64>)> = net
            .iter()
            .map(|(country, values)| (country.clone(), values.iter().map(|v| -v).collect()))
            .collect();
        ChartRenderer::new(&self.config.paths.plot_dir, &self.config.labels)?.stacked_area(
            &format!("historical_imports_and_exports_{}", year),
            &format!("Imports and exports breakdown {}", year),
            exchange.timestamps(),
            &imports,
        )?;
        let columns = net
            .into_iter()
            .map(|(country, values)| (format!("net_export_{}", country), values))
            .collect();
        let net_table = FlowTable::new(exchange.timestamps().to_vec(), columns)?;
        self.output
            .write_table(&format!("historical_net_export_{}.csv", year), &net_table)?;

        Ok(net_table)
    }
}
