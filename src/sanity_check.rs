use crate::output::CsvOutput;
use anyhow::{Context, Result};
use eval_core::{AnalysisConfig, CsvDialect, DataLoader, StatsCalculator, SummaryStats};
use log::{info, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Describe statistics of the model input time series in a folder.
pub struct SanityChecker {
    config: AnalysisConfig,
    output: CsvOutput,
}

impl SanityChecker {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            output: CsvOutput::new(&config.paths.output_dir, config.paths.delimiter_byte())?,
        })
    }

    /// Returns the checked files with their whole-file statistics.
    pub fn check_folder(
        &self,
        folder: &Path,
        exclusions: &[String],
        dialect: CsvDialect,
    ) -> Result<Vec<(PathBuf, SummaryStats)>> {
        println!("\n🔍 Input time series sanity check: {}", folder.display());
        println!("{}", "=".repeat(60));

        let files = input_files(folder, exclusions);
        if files.is_empty() {
            warn!("No input time series found in {}", folder.display());
        }

        let loader = DataLoader::new(dialect);
        let calculator = StatsCalculator::new(self.config.prices.price_cap);
        let mut checked = Vec::with_capacity(files.len());

        for file in files {
            let series = loader
                .load_input_time_series(&file)
                .with_context(|| format!("loading {}", file.display()))?;

            let whole = calculator.describe(&series)?;
            let mut table = vec![whole.clone()];
            for (year, mut stats) in calculator.annual_stats(&series)? {
                stats.name = year.to_string();
                table.push(stats);
            }

            println!(
                "  {:<40} n={:<7} mean={:>10.3} min={:>10.3} max={:>10.3}",
                series.name(),
                whole.count,
                whole.mean,
                whole.min,
                whole.max
            );
            self.output
                .write_summary(&format!("sanity_check_{}.csv", series.name()), &table)?;
            checked.push((file, whole));
        }

        info!("Checked {} input files", checked.len());
        Ok(checked)
    }
}

/// CSV files below `folder` whose file name is not excluded, sorted.
pub fn input_files(folder: &Path, exclusions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            !exclusions.iter().any(|excluded| excluded == name)
        })
        .collect();
    files.sort();
    files
}
