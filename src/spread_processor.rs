use crate::output::CsvOutput;
use anyhow::{Context, Result};
use eval_core::{AnalysisConfig, CsvDialect, DataLoader, SpreadAnalyzer, SpreadRow, StatsCalculator, SummaryStats};
use log::info;
use std::path::Path;

/// Yearly spread indicators and describe statistics of a (multi-year) price series.
pub struct SpreadProcessor {
    config: AnalysisConfig,
    output: CsvOutput,
}

impl SpreadProcessor {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            output: CsvOutput::new(&config.paths.output_dir, config.paths.delimiter_byte())?,
        })
    }

    pub fn process(&self, prices_path: &Path, column: Option<&str>, dialect: CsvDialect) -> Result<Vec<SpreadRow>> {
        println!("\n📐 Price spread analysis");
        println!("{}", "=".repeat(60));

        // Step 1: Load the price series
        let prices = DataLoader::new(dialect)
            .load_model_prices(prices_path, column)
            .with_context(|| format!("loading prices from {}", prices_path.display()))?;
        info!("Loaded {} hours covering {} years", prices.len(), prices.years().len());

        // Step 2: Spreads per year
        let analyzer = SpreadAnalyzer::new(self.config.spreads.windows.clone());
        let rows = analyzer.analyze(&prices)?;
        let spreads_path = self.output.write_spreads("price_spreads.csv", &analyzer, &rows)?;

        println!("\n{:<6} {:>14} {:>14} {:>12}", "year", "diff_1h_min", "diff_1h_max", "std");
        for row in &rows {
            println!(
                "{:<6} {:>14.2} {:>14.2} {:>12.2}",
                row.year, row.diff_1h_min, row.diff_1h_max, row.std
            );
        }

        // Step 3: Describe statistics per year
        let calculator = StatsCalculator::new(self.config.prices.price_cap);
        let annual: Vec<SummaryStats> = calculator
            .annual_stats(&prices)?
            .into_iter()
            .map(|(year, mut stats)| {
                stats.name = year.to_string();
                stats
            })
            .collect();
        let stats_path = self.output.write_summary("price_stats_annual.csv", &annual)?;

        println!("\n✅ Saved spreads to: {}", spreads_path.display());
        println!("✅ Saved annual statistics to: {}", stats_path.display());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_spreads_per_year() {
        let dir = TempDir::new().unwrap();
        let prices = dir.path().join("prices.csv");
        let mut file = fs::File::create(&prices).unwrap();
        writeln!(file, "timestamp,price").unwrap();
        for (stamp, value) in [
            ("2030-12-31 22:00:00", 10.0),
            ("2030-12-31 23:00:00", 40.0),
            ("2031-01-01 00:00:00", 5.0),
            ("2031-01-01 01:00:00", -5.0),
            ("2031-01-01 02:00:00", 20.0),
        ] {
            writeln!(file, "{},{}", stamp, value).unwrap();
        }
        drop(file);

        let mut config = AnalysisConfig::default();
        config.paths.output_dir = dir.path().join("out");
        config.spreads.windows = vec![1, 2];
        let processor = SpreadProcessor::new(&config).unwrap();

        let rows = processor.process(&prices, None, CsvDialect::default()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].year, 2030);
        assert_eq!(rows[0].windows[0].max, 30.0);
        assert_eq!(rows[1].diff_1h_min, -10.0);
        assert_eq!(rows[1].diff_1h_max, 25.0);
        assert_eq!(rows[1].windows[1].max, 25.0);

        let written = fs::read_to_string(dir.path().join("out/price_spreads.csv")).unwrap();
        assert!(written.starts_with("year;spread_1h_min;spread_1h_max;spread_2h_min"));
        assert!(dir.path().join("out/price_stats_annual.csv").exists());
    }
}
