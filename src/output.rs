use anyhow::{Context, Result};
use eval_core::demand_response::{DrBalance, DrVolumes};
use eval_core::investment::PivotTable;
use eval_core::spreads::SpreadAnalyzer;
use eval_core::{FlowTable, SpreadRow, SummaryStats};
use polars::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes derived tables into the output directory.
pub struct CsvOutput {
    output_dir: PathBuf,
    delimiter: u8,
}

impl CsvOutput {
    pub fn new(output_dir: &Path, delimiter: u8) -> Result<Self> {
        fs::create_dir_all(output_dir)?;

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            delimiter,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write_frame(&self, file_name: &str, df: &mut DataFrame) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        CsvWriter::new(file)
            .include_header(true)
            .with_separator(self.delimiter)
            .finish(df)?;
        Ok(path)
    }

    /// Timestamp index plus one column per table column.
    pub fn write_table(&self, file_name: &str, table: &FlowTable) -> Result<PathBuf> {
        let stamps: Vec<String> = table
            .timestamps()
            .iter()
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            .collect();

        let mut columns = vec![Series::new("timestamp".into(), stamps)];
        for (name, values) in table.columns() {
            columns.push(Series::new(name.into(), values));
        }

        let mut df = DataFrame::new(columns)?;
        self.write_frame(file_name, &mut df)
    }

    /// Describe table with one row per statistic and one column per series.
    pub fn write_summary(&self, file_name: &str, stats: &[SummaryStats]) -> Result<PathBuf> {
        let labels: Vec<&str> = SummaryStats::ROW_LABELS.to_vec();
        let mut columns = vec![Series::new("statistic".into(), labels)];
        for s in stats {
            columns.push(Series::new(s.name.as_str().into(), s.as_row().to_vec()));
        }

        let mut df = DataFrame::new(columns)?;
        self.write_frame(file_name, &mut df)
    }

    pub fn write_spreads(&self, file_name: &str, analyzer: &SpreadAnalyzer, rows: &[SpreadRow]) -> Result<PathBuf> {
        let years: Vec<i32> = rows.iter().map(|r| r.year).collect();
        let values: Vec<Vec<f64>> = rows.iter().map(SpreadAnalyzer::row_values).collect();

        let mut columns = vec![Series::new("year".into(), years)];
        for (idx, name) in analyzer.column_names().iter().enumerate() {
            let column: Vec<f64> = values.iter().map(|row| row[idx]).collect();
            columns.push(Series::new(name.as_str().into(), column));
        }

        let mut df = DataFrame::new(columns)?;
        self.write_frame(file_name, &mut df)
    }

    /// Category rows, one column per year.
    pub fn write_pivot(&self, file_name: &str, pivot: &PivotTable) -> Result<PathBuf> {
        let mut columns = vec![Series::new("category".into(), pivot.categories.clone())];
        for (y, year) in pivot.years.iter().enumerate() {
            let column: Vec<f64> = pivot.values.iter().map(|row| row[y]).collect();
            columns.push(Series::new(year.to_string().as_str().into(), column));
        }

        let mut df = DataFrame::new(columns)?;
        self.write_frame(file_name, &mut df)
    }

    pub fn write_dr_volumes(&self, file_name: &str, volumes: &[DrVolumes]) -> Result<PathBuf> {
        let mut df = DataFrame::new(vec![
            Series::new("year".into(), volumes.iter().map(|v| v.year).collect::<Vec<_>>()),
            Series::new(
                "cluster".into(),
                volumes.iter().map(|v| v.cluster.clone()).collect::<Vec<_>>(),
            ),
            Series::new("shift_down".into(), volumes.iter().map(|v| v.shift_down).collect::<Vec<_>>()),
            Series::new("shift_up".into(), volumes.iter().map(|v| v.shift_up).collect::<Vec<_>>()),
            Series::new("shed".into(), volumes.iter().map(|v| v.shed).collect::<Vec<_>>()),
        ])?;
        self.write_frame(file_name, &mut df)
    }

    pub fn write_dr_balance(&self, file_name: &str, balance: &[DrBalance]) -> Result<PathBuf> {
        let mut df = DataFrame::new(vec![
            Series::new(
                "cluster".into(),
                balance.iter().map(|b| b.cluster.clone()).collect::<Vec<_>>(),
            ),
            Series::new("shift_down".into(), balance.iter().map(|b| b.shift_down).collect::<Vec<_>>()),
            Series::new("shift_up".into(), balance.iter().map(|b| b.shift_up).collect::<Vec<_>>()),
            Series::new("deviation".into(), balance.iter().map(|b| b.deviation).collect::<Vec<_>>()),
        ])?;
        self.write_frame(file_name, &mut df)
    }

    pub fn write_dataframe(&self, file_name: &str, df: &mut DataFrame) -> Result<PathBuf> {
        self.write_frame(file_name, df)
    }

    pub fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}
