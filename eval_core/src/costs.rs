use crate::alignment::cut_leap_days_table;
use crate::data_loader::{parse_number, parse_timestamp};
use crate::error::{EvalError, EvalResult};
use crate::models::FlowTable;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use log::info;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Hourly,
    Annual,
}

/// Annual fuel and emission cost indices of the modelled market area.
pub struct CostTrajectories {
    table: FlowTable,
}

impl CostTrajectories {
    /// Read an annual cost table (rows `YYYY-01-01`, columns `DE_<carrier>`),
    /// keep the market area columns and rename them to the carrier suffix.
    pub fn load(path: &Path, delimiter: u8, market_area: &str) -> EvalResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_path(path)?;

        let prefix = format!("{}_", market_area);
        let selected: Vec<(usize, String)> = reader
            .headers()?
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, name)| name.contains(&prefix))
            .map(|(idx, name)| (idx, name.rsplit('_').next().unwrap_or(name).to_string()))
            .collect();
        if selected.is_empty() {
            return Err(EvalError::missing_column(&prefix, &path.display().to_string()));
        }

        let mut timestamps = Vec::new();
        let mut columns: Vec<(String, Vec<f64>)> = selected
            .iter()
            .map(|(_, name)| (name.clone(), Vec::new()))
            .collect();

        for record in reader.records() {
            let record = record?;
            let raw = record.get(0).unwrap_or("");
            let stamp = parse_timestamp(raw)
                .ok_or_else(|| EvalError::Parse(format!("{}: bad index '{}'", path.display(), raw)))?;
            timestamps.push(stamp);

            for ((idx, name), (_, values)) in selected.iter().zip(columns.iter_mut()) {
                let value = parse_number(record.get(*idx).unwrap_or(""), false)?.ok_or_else(|| {
                    EvalError::Parse(format!("{}: missing '{}' at {}", path.display(), name, raw))
                })?;
                values.push(value);
            }
        }

        info!("Loaded {} cost trajectories from {}", columns.len(), path.display());
        Ok(Self {
            table: FlowTable::new(timestamps, columns)?,
        })
    }

    pub fn from_table(table: FlowTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &FlowTable {
        &self.table
    }

    /// Repeat the last year's values at the start of the following year so
    /// the final year is covered when interpolating.
    pub fn extend_last_year(&self) -> EvalResult<FlowTable> {
        let last = *self
            .table
            .timestamps()
            .last()
            .ok_or_else(|| EvalError::EmptySeries("cost trajectories".to_string()))?;
        let next = NaiveDate::from_ymd_opt(last.year() + 1, 1, 1)
            .ok_or_else(|| EvalError::Parse(format!("no year after {}", last)))?
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| EvalError::Parse(format!("no year after {}", last)))?;

        let mut timestamps = self.table.timestamps().to_vec();
        timestamps.push(next);
        let columns = self
            .table
            .columns()
            .map(|(name, values)| {
                let mut extended = values.to_vec();
                extended.push(values[values.len() - 1]);
                (name.to_string(), extended)
            })
            .collect();

        FlowTable::new(timestamps, columns)
    }

    /// Cost values on the requested grid, without the appended extension
    /// point and with December 31st of leap years removed.
    pub fn resample(&self, resolution: Resolution) -> EvalResult<FlowTable> {
        let extended = self.extend_last_year()?;
        let resampled = match resolution {
            Resolution::Annual => {
                let end = extended.timestamps()[extended.height() - 1];
                extended.filter(|ts| *ts < end)
            }
            Resolution::Hourly => interpolate_hourly(&extended)?,
        };
        Ok(cut_leap_days_table(&resampled))
    }

    /// Values of every carrier at `time`, e.g. the costs of one simulation year.
    pub fn values_at(&self, resolution: Resolution, time: NaiveDateTime) -> EvalResult<Vec<(String, f64)>> {
        let resampled = self.resample(resolution)?;
        let row = resampled
            .timestamps()
            .iter()
            .position(|ts| *ts == time)
            .ok_or_else(|| EvalError::Parse(format!("no cost values at {}", time)))?;

        Ok(resampled
            .columns()
            .map(|(name, values)| (name.to_string(), values[row]))
            .collect())
    }
}

/// Linear interpolation between the knots onto an hourly grid that ends one
/// hour before the last knot.
fn interpolate_hourly(knots: &FlowTable) -> EvalResult<FlowTable> {
    let stamps = knots.timestamps();
    if stamps.len() < 2 {
        return Err(EvalError::EmptySeries("cost trajectory knots".to_string()));
    }
    let start = stamps[0];
    let end = stamps[stamps.len() - 1];
    let hours = (end - start).num_hours() as usize;
    let grid: Vec<NaiveDateTime> = (0..hours).map(|h| start + Duration::hours(h as i64)).collect();

    let columns = knots
        .columns()
        .map(|(name, values)| {
            let mut segment = 0;
            let interpolated = grid
                .iter()
                .map(|ts| {
                    while stamps[segment + 1] <= *ts {
                        segment += 1;
                    }
                    let span = (stamps[segment + 1] - stamps[segment]).num_seconds() as f64;
                    let offset = (*ts - stamps[segment]).num_seconds() as f64;
                    values[segment] + (values[segment + 1] - values[segment]) * offset / span
                })
                .collect();
            (name.to_string(), interpolated)
        })
        .collect();

    FlowTable::new(grid, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn cost_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, ",DE_natgas,DE_co2,FR_natgas").unwrap();
        writeln!(file, "2019-01-01,20.0,25.0,1.0").unwrap();
        writeln!(file, "2020-01-01,30.0,35.0,1.0").unwrap();
        writeln!(file, "2021-01-01,40.0,45.0,1.0").unwrap();
        file
    }

    fn at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_load_keeps_market_area_columns() {
        let file = cost_file();
        let costs = CostTrajectories::load(file.path(), b',', "DE").unwrap();

        let names: Vec<&str> = costs.table().column_names().collect();
        assert_eq!(names, vec!["natgas", "co2"]);
        assert_eq!(costs.table().height(), 3);
    }

    #[test]
    fn test_annual_resolution_drops_extension() {
        let file = cost_file();
        let costs = CostTrajectories::load(file.path(), b',', "DE").unwrap();

        let annual = costs.resample(Resolution::Annual).unwrap();
        assert_eq!(annual.height(), 3);
        assert_eq!(annual.column("natgas").unwrap(), &[20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_hourly_interpolation() {
        let file = cost_file();
        let costs = CostTrajectories::load(file.path(), b',', "DE").unwrap();

        let hourly = costs.resample(Resolution::Hourly).unwrap();
        // 2019 + 2020 (leap, Dec 31st cut) + 2021
        assert_eq!(hourly.height(), 3 * 8760);

        let natgas = hourly.column("natgas").unwrap();
        assert_eq!(natgas[0], 20.0);
        let mid_2019 = hourly.timestamps().iter().position(|ts| *ts == at(2019, 7, 2, 12)).unwrap();
        assert!((natgas[mid_2019] - 25.0).abs() < 0.01);

        // final year holds its value
        let values = costs.values_at(Resolution::Hourly, at(2021, 6, 1, 0)).unwrap();
        assert_eq!(values[0], ("natgas".to_string(), 40.0));

        assert!(!hourly.timestamps().contains(&at(2020, 12, 31, 12)));
    }

    #[test]
    fn test_values_at_missing_time() {
        let file = cost_file();
        let costs = CostTrajectories::load(file.path(), b',', "DE").unwrap();

        assert!(costs.values_at(Resolution::Annual, at(2030, 1, 1, 0)).is_err());
        let values = costs.values_at(Resolution::Annual, at(2020, 1, 1, 0)).unwrap();
        assert_eq!(values[1], ("co2".to_string(), 35.0));
    }

    #[test]
    fn test_missing_market_area() {
        let file = cost_file();
        assert!(matches!(
            CostTrajectories::load(file.path(), b',', "PL"),
            Err(EvalError::MissingColumn { .. })
        ));
    }
}
