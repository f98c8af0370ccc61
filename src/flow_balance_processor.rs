use crate::output::CsvOutput;
use crate::visualization::ChartRenderer;
use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDateTime};
use eval_core::investment::PivotTable;
use eval_core::{AnalysisConfig, CsvDialect, DataLoader, FlowBalance, FlowClassifier, FlowTable, HourlySeries};
use log::info;
use polars::prelude::*;
use std::ops::Range;
use std::path::Path;

/// Dispatch excerpt for the stacked area chart.
pub struct Excerpt {
    pub start: NaiveDateTime,
    pub hours: usize,
}

/// Groups a dispatch result table into balance categories and checks the
/// bus energy balance.
pub struct FlowBalanceProcessor {
    config: AnalysisConfig,
    output: CsvOutput,
}

impl FlowBalanceProcessor {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            output: CsvOutput::new(&config.paths.output_dir, config.paths.delimiter_byte())?,
        })
    }

    /// With an excerpt, model `prices` are drawn over the dispatch on a
    /// secondary axis.
    pub fn process(
        &self,
        results_path: &Path,
        dialect: CsvDialect,
        excerpt: Option<&Excerpt>,
        prices: Option<&HourlySeries>,
    ) -> Result<FlowBalance> {
        println!("\n⚡ Flow balance of {}", self.config.vocabulary.bus);
        println!("{}", "=".repeat(60));

        // Step 1: Load and classify flows
        let table = DataLoader::new(dialect)
            .load_flow_table(results_path)
            .with_context(|| format!("loading flows from {}", results_path.display()))?;
        let classifier = FlowClassifier::new(&self.config.vocabulary)?;
        let balance = FlowBalance::from_table(&table, &classifier)?;
        info!(
            "{} carriers, {} import links, {} export links",
            balance.generation.len(),
            balance.imports.len(),
            balance.exports.len()
        );

        // Step 2: Write categories and flagged hours
        let categories_path = self.output.write_table("flow_balance.csv", &balance.to_table()?)?;
        let flagged = balance.unbalanced_hours(self.config.balance.tolerance);
        if flagged.is_empty() {
            println!("✅ Energy balance holds in all {} hours", balance.timestamps().len());
        } else {
            println!(
                "⚠️  {} hours with residual below -{}",
                flagged.len(),
                self.config.balance.tolerance
            );
            let (stamps, residuals): (Vec<_>, Vec<_>) = flagged.into_iter().unzip();
            let flagged_table = FlowTable::new(stamps, vec![("residual".to_string(), residuals)])?;
            self.output.write_table("unbalanced_hours.csv", &flagged_table)?;
        }

        // Step 3: Annual generation mix
        let generation = generation_table(&balance)?;
        let mix = annual_totals(&generation, "generation")?;
        self.output.write_pivot("generation_mix_annual.csv", &mix)?;

        let charts = ChartRenderer::new(&self.config.paths.plot_dir, &self.config.labels)?;
        charts.stacked_bar("generation_mix", "Annual generation mix", "Energy [MWh]", &mix)?;

        // Step 4: Dispatch excerpt
        if let Some(excerpt) = excerpt {
            let (stamps, columns) = excerpt_columns(&balance, excerpt)?;
            let suffix = excerpt.start.format("%Y%m%d%H");
            let title = format!("Dispatch from {} ({} hours)", excerpt.start, stamps.len());
            match prices {
                Some(prices) => {
                    let excerpt_prices = prices_at(prices, &stamps)?;
                    charts.dispatch_with_price(
                        &format!("dispatch_and_price_{}", suffix),
                        &format!("Dispatch and price situation from {}", excerpt.start),
                        &stamps,
                        &columns,
                        &excerpt_prices,
                    )?;
                }
                None => {
                    charts.stacked_area(&format!("dispatch_{}", suffix), &title, &stamps, &columns)?;
                }
            }

            let (stamps, exchange) = exchange_columns(&balance, excerpt)?;
            charts.stacked_area(
                &format!("imports_and_exports_{}", suffix),
                "Imports and exports breakdown",
                &stamps,
                &exchange,
            )?;
        }

        println!("✅ Saved flow categories to: {}", categories_path.display());
        Ok(balance)
    }
}

fn generation_table(balance: &FlowBalance) -> Result<FlowTable> {
    let columns = balance
        .generation
        .iter()
        .map(|(carrier, values)| (carrier.clone(), values.clone()))
        .collect();
    Ok(FlowTable::new(balance.timestamps().to_vec(), columns)?)
}

/// Sum every column of `table` per calendar year.
pub fn annual_totals(table: &FlowTable, variable: &str) -> Result<PivotTable> {
    let years: Vec<i32> = table.timestamps().iter().map(|ts| ts.year()).collect();
    let mut columns = vec![Series::new("year".into(), years)];
    for (name, values) in table.columns() {
        columns.push(Series::new(name.into(), values));
    }

    let annual = DataFrame::new(columns)?
        .lazy()
        .group_by([col("year")])
        .agg([col("*").exclude(["year"]).sum()])
        .sort(["year"], Default::default())
        .collect()?;

    let years: Vec<i32> = annual.column("year")?.i32()?.into_no_null_iter().collect();
    let categories: Vec<String> = table.column_names().map(String::from).collect();
    let mut values = Vec::with_capacity(categories.len());
    for category in &categories {
        let sums = annual
            .column(category)?
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(0.0))
            .collect();
        values.push(sums);
    }

    Ok(PivotTable {
        variable: variable.to_string(),
        categories,
        years,
        values,
    })
}

fn excerpt_range(balance: &FlowBalance, excerpt: &Excerpt) -> Result<Range<usize>> {
    let Some(start) = balance.timestamps().iter().position(|ts| *ts == excerpt.start) else {
        bail!("Excerpt start {} is not part of the results", excerpt.start);
    };
    let end = (start + excerpt.hours).min(balance.timestamps().len());
    Ok(start..end)
}

/// Generation per carrier plus net storage and net imports over the excerpt.
fn excerpt_columns(balance: &FlowBalance, excerpt: &Excerpt) -> Result<(Vec<NaiveDateTime>, Vec<(String, Vec<f64>)>)> {
    let Range { start, end } = excerpt_range(balance, excerpt)?;
    let stamps = balance.timestamps()[start..end].to_vec();

    let mut columns: Vec<(String, Vec<f64>)> = balance
        .generation
        .iter()
        .map(|(carrier, values)| (carrier.clone(), values[start..end].to_vec()))
        .collect();
    columns.push(("storage".to_string(), balance.net_storage()[start..end].to_vec()));
    let imports = balance.net_export()[start..end].iter().map(|v| -v).collect();
    columns.push(("import".to_string(), imports));

    Ok((stamps, columns))
}

/// Net imports per neighbouring country over the excerpt; exports are negative.
fn exchange_columns(balance: &FlowBalance, excerpt: &Excerpt) -> Result<(Vec<NaiveDateTime>, Vec<(String, Vec<f64>)>)> {
    let range = excerpt_range(balance, excerpt)?;
    let stamps = balance.timestamps()[range.clone()].to_vec();
    let columns = balance
        .net_export_by_country()
        .into_iter()
        .map(|(country, values)| (country, values[range.clone()].iter().map(|v| -v).collect()))
        .collect();
    Ok((stamps, columns))
}

/// Price of every excerpt hour; the price series must cover the excerpt.
fn prices_at(prices: &HourlySeries, stamps: &[NaiveDateTime]) -> Result<Vec<f64>> {
    let by_time: std::collections::HashMap<NaiveDateTime, f64> = prices.points().collect();
    stamps
        .iter()
        .map(|ts| match by_time.get(ts) {
            Some(value) => Ok(*value),
            None => bail!("No power price at {}", ts),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn two_year_table() -> FlowTable {
        let start = NaiveDate::from_ymd_opt(2030, 12, 31)
            .unwrap()
            .and_hms_opt(22, 0, 0)
            .unwrap();
        let stamps = (0..4).map(|h| start + Duration::hours(h)).collect();
        FlowTable::new(
            stamps,
            vec![
                ("natgas".to_string(), vec![1.0, 2.0, 3.0, 4.0]),
                ("solarPV".to_string(), vec![0.0, 0.5, 0.5, 0.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_prices_at_excerpt_hours() {
        let table = two_year_table();
        let prices = HourlySeries::new("model_price", table.timestamps().to_vec(), vec![10.0, 20.0, 30.0, 40.0]).unwrap();

        let stamps = &table.timestamps()[1..3];
        assert_eq!(prices_at(&prices, stamps).unwrap(), vec![20.0, 30.0]);

        let later = vec![table.timestamps()[3] + Duration::hours(1)];
        assert!(prices_at(&prices, &later).is_err());
    }

    #[test]
    fn test_annual_totals_group_by_year() {
        let pivot = annual_totals(&two_year_table(), "generation").unwrap();

        assert_eq!(pivot.years, vec![2030, 2031]);
        assert_eq!(pivot.categories, vec!["natgas", "solarPV"]);
        assert_eq!(pivot.values[0], vec![3.0, 7.0]);
        assert_eq!(pivot.values[1], vec![0.5, 0.5]);
        assert_eq!(pivot.year_totals(), vec![3.5, 7.5]);
    }

    #[test]
    fn test_excerpt_columns() {
        let config = AnalysisConfig::default();
        let classifier = FlowClassifier::new(&config.vocabulary).unwrap();
        let start = NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let stamps: Vec<NaiveDateTime> = (0..3).map(|h| start + Duration::hours(h)).collect();
        let table = FlowTable::new(
            stamps.clone(),
            vec![
                ("(('DE_source_solarPV', 'DE_bus_el'), 'flow')".to_string(), vec![5.0, 6.0, 7.0]),
                ("(('DE_bus_el', 'DE_link_AT'), 'flow')".to_string(), vec![0.0, 2.0, 0.0]),
                ("(('AT_link_DE', 'DE_bus_el'), 'flow')".to_string(), vec![1.0, 0.0, 0.0]),
                ("(('DE_bus_el', 'DE_sink_el_load'), 'flow')".to_string(), vec![6.0, 4.0, 7.0]),
            ],
        )
        .unwrap();
        let balance = FlowBalance::from_table(&table, &classifier).unwrap();

        let excerpt = Excerpt {
            start: stamps[1],
            hours: 5,
        };
        let (window, columns) = excerpt_columns(&balance, &excerpt).unwrap();

        assert_eq!(window, stamps[1..].to_vec());
        assert_eq!(columns[0], ("solarPV".to_string(), vec![6.0, 7.0]));
        assert_eq!(columns[2], ("import".to_string(), vec![-2.0, 0.0]));

        let (_, exchange) = exchange_columns(&balance, &excerpt).unwrap();
        assert_eq!(exchange, vec![("AT".to_string(), vec![-2.0, 0.0])]);

        let late = Excerpt {
            start: start + Duration::hours(10),
            hours: 2,
        };
        assert!(excerpt_columns(&balance, &late).is_err());
    }
}
