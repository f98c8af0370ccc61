use crate::output::CsvOutput;
use crate::visualization::ChartRenderer;
use anyhow::{bail, Context, Result};
use eval_core::investment::{pivot, AggregatedResult, PivotTable, INVESTMENT_VARIABLES};
use eval_core::{Aggregation, AnalysisConfig, InvestmentInspector};
use log::info;
use polars::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;

pub struct InvestmentRequest<'a> {
    pub results_path: &'a Path,
    pub variable: &'a str,
    pub by: Aggregation,
    /// Field delimiter of the results file.
    pub delimiter: u8,
    /// Production results (MWh) instead of capacity results (MW).
    pub production: bool,
}

pub struct InvestmentProcessor {
    config: AnalysisConfig,
    output: CsvOutput,
}

impl InvestmentProcessor {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            output: CsvOutput::new(&config.paths.output_dir, config.paths.delimiter_byte())?,
        })
    }

    fn energy_carriers(&self) -> Vec<String> {
        let vocab = &self.config.vocabulary;
        vocab.fuels.iter().chain(&vocab.renewables).cloned().collect()
    }

    pub fn process(&self, request: &InvestmentRequest) -> Result<Vec<PivotTable>> {
        println!("\n🏗️  Investment results inspection");
        println!("{}", "=".repeat(60));

        let investments = !request.production;
        if investments && !INVESTMENT_VARIABLES.contains(&request.variable) {
            bail!(
                "Unknown investment variable '{}', expected one of {:?}",
                request.variable,
                INVESTMENT_VARIABLES
            );
        }

        // Step 1: Load and relabel
        let inspector = InvestmentInspector::new(&self.config.vocabulary)?;
        let raw = inspector
            .load_raw(request.results_path, request.delimiter)
            .with_context(|| format!("loading investment results from {}", request.results_path.display()))?;
        let units = inspector.preprocess(&raw, investments);

        // Step 2: Aggregate
        let (rows, storages) = inspector.aggregate(&units, &self.energy_carriers(), request.by, investments);
        info!("{} aggregated rows, {} storage rows", rows.len(), storages.len());

        if !investments {
            let path = self.write_totals("production_totals.csv", &rows)?;
            println!("✅ Saved production totals to: {}", path.display());
            return Ok(Vec::new());
        }

        // Step 3: Pivot and plot
        let charts = ChartRenderer::new(&self.config.paths.plot_dir, &self.config.labels)?;
        let mut pivots = Vec::new();
        for (name, group) in [("investments", &rows), ("storage_investments", &storages)] {
            if group.is_empty() {
                continue;
            }
            let table = pivot(group, request.variable)?;
            let file_name = format!("{}_{}", name, request.variable);
            self.output.write_pivot(&format!("{}.csv", file_name), &table)?;
            charts.stacked_bar(
                &file_name,
                &format!("{} ({})", name.replace('_', " "), request.variable),
                "Capacity [MW]",
                &table,
            )?;

            for (year, total) in table.years.iter().zip(table.year_totals()) {
                println!("  {} {:<20} {:>12.1} MW", year, name, total);
            }
            pivots.push(table);
        }

        println!("✅ Saved investment pivots to: {}", self.output.output_dir().display());
        Ok(pivots)
    }

    /// Totals over the horizon: one row per key, one column per variable.
    fn write_totals(&self, file_name: &str, rows: &[AggregatedResult]) -> Result<std::path::PathBuf> {
        let variables: BTreeSet<&String> = rows.iter().flat_map(|r| r.values.keys()).collect();
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();

        let mut columns = vec![Series::new("key".into(), keys)];
        for variable in variables {
            let values: Vec<f64> = rows
                .iter()
                .map(|r| r.values.get(variable).copied().unwrap_or(0.0))
                .collect();
            columns.push(Series::new(variable.as_str().into(), values));
        }

        let mut df = DataFrame::new(columns)?;
        self.output.write_dataframe(file_name, &mut df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_production_totals() {
        let dir = TempDir::new().unwrap();
        let results = dir.path().join("production.csv");
        fs::write(
            &results,
            "id;flow\n\
             ('DE_transformer_natgas_CC', 'DE_bus_el', 2030);10.0\n\
             ('DE_transformer_natgas_GT', 'DE_bus_el', 2031);5.0\n\
             ('DE_source_solarPV', 'DE_bus_el', 2030);7.0\n",
        )
        .unwrap();

        let mut config = AnalysisConfig::default();
        config.paths.output_dir = dir.path().join("out");
        let processor = InvestmentProcessor::new(&config).unwrap();
        let request = InvestmentRequest {
            results_path: &results,
            variable: "flow",
            by: Aggregation::EnergyCarrier,
            delimiter: b';',
            production: true,
        };

        assert!(processor.process(&request).unwrap().is_empty());
        let written = fs::read_to_string(dir.path().join("out/production_totals.csv")).unwrap();
        assert!(written.starts_with("key;flow"));
        assert!(written.contains("natgas;15.0"));
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = AnalysisConfig::default();
        config.paths.output_dir = dir.path().to_path_buf();
        let processor = InvestmentProcessor::new(&config).unwrap();
        let request = InvestmentRequest {
            results_path: &dir.path().join("missing.csv"),
            variable: "capex",
            by: Aggregation::Technology,
            delimiter: b',',
            production: false,
        };

        assert!(processor.process(&request).is_err());
    }

    #[test]
    fn test_comma_separated_results_with_semicolon_output() {
        let dir = TempDir::new().unwrap();
        let results = dir.path().join("production.csv");
        fs::write(
            &results,
            "id,flow\n\
             \"('DE_transformer_natgas_GT_new_built', 'DE_bus_el', 2025)\",100.0\n\
             \"('DE_transformer_natgas_CC', 'DE_bus_el', 2030)\",50.0\n",
        )
        .unwrap();

        let mut config = AnalysisConfig::default();
        config.paths.output_dir = dir.path().join("out");
        config.paths.csv_delimiter = ';';
        let processor = InvestmentProcessor::new(&config).unwrap();
        let request = InvestmentRequest {
            results_path: &results,
            variable: "flow",
            by: Aggregation::EnergyCarrier,
            delimiter: b',',
            production: true,
        };

        processor.process(&request).unwrap();
        let written = fs::read_to_string(dir.path().join("out/production_totals.csv")).unwrap();
        assert!(written.starts_with("key;flow"));
        assert!(written.contains("natgas;150.0"));
    }
}
