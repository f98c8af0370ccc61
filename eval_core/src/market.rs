//! Merit order of the dispatchable fleet and monthly market values of
//! renewable technologies.

use crate::alignment::cut_leap_days_table;
use crate::data_loader::parse_number;
use crate::error::{EvalError, EvalResult};
use crate::models::FlowTable;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One unit's bid: available capacity in MW at its marginal cost in €/MWh.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeritOrderBlock {
    pub unit: String,
    pub fuel: String,
    pub capacity: f64,
    #[serde(rename = "costs_marginal")]
    pub marginal_cost: f64,
}

/// A block placed on the capacity axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeritOrderStep {
    pub unit: String,
    pub fuel: String,
    pub marginal_cost: f64,
    pub capacity_start: f64,
    pub capacity_cumulated: f64,
}

/// Units sorted by marginal cost with their cumulated capacity.
#[derive(Debug, Clone)]
pub struct MeritOrder {
    steps: Vec<MeritOrderStep>,
}

impl MeritOrder {
    /// Read blocks from a CSV with the columns `unit`, `fuel`, `capacity`
    /// and `costs_marginal`.
    pub fn load_blocks(path: &Path, delimiter: u8) -> EvalResult<Vec<MeritOrderBlock>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let blocks = reader
            .deserialize()
            .collect::<Result<Vec<MeritOrderBlock>, _>>()?;
        info!("Loaded {} merit order blocks from {}", blocks.len(), path.display());
        Ok(blocks)
    }

    /// Sort by marginal cost (ties keep input order) and stack the
    /// capacities. Units without capacity take no room on the axis.
    pub fn from_blocks(mut blocks: Vec<MeritOrderBlock>) -> EvalResult<Self> {
        if let Some(bad) = blocks
            .iter()
            .find(|b| !b.marginal_cost.is_finite() || !b.capacity.is_finite() || b.capacity < 0.0)
        {
            return Err(EvalError::Parse(format!(
                "unit '{}': capacity {} at {} €/MWh",
                bad.unit, bad.capacity, bad.marginal_cost
            )));
        }

        blocks.retain(|b| b.capacity > 0.0);
        blocks.sort_by(|a, b| a.marginal_cost.total_cmp(&b.marginal_cost));

        let mut cumulated = 0.0;
        let steps = blocks
            .into_iter()
            .map(|block| {
                let start = cumulated;
                cumulated += block.capacity;
                MeritOrderStep {
                    unit: block.unit,
                    fuel: block.fuel,
                    marginal_cost: block.marginal_cost,
                    capacity_start: start,
                    capacity_cumulated: cumulated,
                }
            })
            .collect();

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[MeritOrderStep] {
        &self.steps
    }

    pub fn total_capacity(&self) -> f64 {
        self.steps.last().map(|s| s.capacity_cumulated).unwrap_or(0.0)
    }

    /// Fuels in order of their first appearance along the merit order.
    pub fn fuels(&self) -> Vec<&str> {
        let mut fuels: Vec<&str> = Vec::new();
        for step in &self.steps {
            if !fuels.contains(&step.fuel.as_str()) {
                fuels.push(&step.fuel);
            }
        }
        fuels
    }

    /// Marginal cost of the unit that covers `demand`; `None` when the
    /// fleet cannot.
    pub fn clearing_price(&self, demand: f64) -> Option<f64> {
        self.steps
            .iter()
            .find(|s| s.capacity_cumulated >= demand)
            .map(|s| s.marginal_cost)
    }
}

/// Market values of one simulation year, one row per month.
#[derive(Debug, Clone)]
pub struct MonthlyMarketValues {
    months: Vec<u32>,
    columns: Vec<(String, Vec<f64>)>,
}

impl MonthlyMarketValues {
    pub fn new(months: Vec<u32>, columns: Vec<(String, Vec<f64>)>) -> EvalResult<Self> {
        if months.is_empty() {
            return Err(EvalError::EmptySeries("monthly market values".to_string()));
        }
        if let Some(month) = months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(EvalError::Parse(format!("month {} out of range", month)));
        }
        if let Some(position) = months.windows(2).position(|w| w[1] <= w[0]) {
            return Err(EvalError::NonMonotonicIndex {
                name: "monthly market values".to_string(),
                position: position + 1,
            });
        }
        for (name, values) in &columns {
            if values.len() != months.len() {
                return Err(EvalError::LengthMismatch {
                    left: "month".to_string(),
                    left_len: months.len(),
                    right: name.clone(),
                    right_len: values.len(),
                });
            }
        }

        Ok(Self { months, columns })
    }

    /// Read a table whose first column is the month number (1-12) and whose
    /// other columns are market values per technology.
    pub fn load(path: &Path, delimiter: u8, decimal_comma: bool) -> EvalResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut columns: Vec<(String, Vec<f64>)> = reader
            .headers()?
            .iter()
            .skip(1)
            .map(|name| (name.to_string(), Vec::new()))
            .collect();
        if columns.is_empty() {
            return Err(EvalError::missing_column("<market value>", &path.display().to_string()));
        }

        let mut months = Vec::new();
        for record in reader.records() {
            let record = record?;
            let raw = record.get(0).unwrap_or("");
            let month = raw
                .parse::<u32>()
                .map_err(|_| EvalError::Parse(format!("{}: bad month '{}'", path.display(), raw)))?;
            months.push(month);

            for (idx, (name, values)) in columns.iter_mut().enumerate() {
                let value = parse_number(record.get(idx + 1).unwrap_or(""), decimal_comma)?.ok_or_else(|| {
                    EvalError::Parse(format!("{}: missing '{}' in month {}", path.display(), name, month))
                })?;
                values.push(value);
            }
        }

        Self::new(months, columns)
    }

    /// Hourly values of `year`, each month's value held until the next listed
    /// month starts and the last one until the end of the year. December 31st
    /// of a leap year is dropped to match the 8760-hour model year.
    pub fn to_hourly(&self, year: i32) -> EvalResult<FlowTable> {
        let month_start = |month: u32| -> EvalResult<NaiveDateTime> {
            NaiveDate::from_ymd_opt(year, month, 1)
                .and_then(|day| day.and_hms_opt(0, 0, 0))
                .ok_or_else(|| EvalError::Parse(format!("no date for {}-{:02}", year, month)))
        };
        let start = month_start(self.months[0])?;
        let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .ok_or_else(|| EvalError::Parse(format!("no year after {}", year)))?;

        let hours = (end - start).num_hours();
        let grid: Vec<NaiveDateTime> = (0..hours).map(|h| start + Duration::hours(h)).collect();
        let rows: Vec<usize> = grid
            .iter()
            .map(|ts| self.months.iter().rposition(|m| *m <= ts.month()).unwrap_or(0))
            .collect();

        let columns = self
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), rows.iter().map(|row| values[*row]).collect()))
            .collect();

        Ok(cut_leap_days_table(&FlowTable::new(grid, columns)?))
    }
}
