use crate::error::{EvalError, EvalResult};
use crate::models::{FlowTable, HourlySeries};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use log::{debug, info};
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const HISTORICAL_PRICE: &str = "historical_price";
pub const MODEL_PRICE: &str = "model_price";

/// Price column of the consolidated market-data export.
pub const CONSOLIDATED_PRICE_COLUMN: &str = "Deutschland/Luxemburg [€/MWh]";

/// Hour columns of the auction format: 1, 2, 3A, 3B, 4 ... 24.
/// Hour 3B only carries a value on the day clocks are set back.
const AUCTION_HOUR_SLOTS: [u32; 25] = [
    1, 2, 3, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
];

const ENTSOE_GENERATION_COLUMNS: [(&str, &str); 19] = [
    ("Biomass  - Actual Aggregated [MW]", "biomass"),
    ("Nuclear  - Actual Aggregated [MW]", "uranium"),
    ("Fossil Brown coal/Lignite  - Actual Aggregated [MW]", "lignite"),
    ("Fossil Hard coal  - Actual Aggregated [MW]", "hardcoal"),
    ("Fossil Gas  - Actual Aggregated [MW]", "natgas"),
    ("Fossil Coal-derived gas  - Actual Aggregated [MW]", "minegas"),
    ("Fossil Oil  - Actual Aggregated [MW]", "oil"),
    ("Fossil Oil shale  - Actual Aggregated [MW]", "shale_oil"),
    ("Fossil Peat  - Actual Aggregated [MW]", "peat"),
    ("Geothermal  - Actual Aggregated [MW]", "geothermal"),
    ("Hydro Pumped Storage  - Actual Aggregated [MW]", "storage_el_out"),
    ("Hydro Run-of-river and poundage  - Actual Aggregated [MW]", "ROR"),
    ("Hydro Water Reservoir  - Actual Aggregated [MW]", "reservoir"),
    ("Other  - Actual Aggregated [MW]", "otherfossil"),
    ("Other renewable  - Actual Aggregated [MW]", "otherrenewables"),
    ("Solar  - Actual Aggregated [MW]", "solarPV"),
    ("Waste  - Actual Aggregated [MW]", "waste"),
    ("Wind Offshore  - Actual Aggregated [MW]", "windoffshore"),
    ("Wind Onshore  - Actual Aggregated [MW]", "windonshore"),
];

/// Neighbour names in the commercial exchange export (German, English, code).
const EXCHANGE_NEIGHBOURS: [(&str, &str, &str); 14] = [
    ("Dänemark 1", "Denmark 1", "DK1"),
    ("Dänemark 2", "Denmark 2", "DK2"),
    ("Niederlande", "Netherlands", "NL"),
    ("Italien Nord", "Italy North", "IT"),
    ("Schweiz", "Switzerland", "CH"),
    ("Tschechien", "Czech Republic", "CZ"),
    ("Frankreich", "France", "FR"),
    ("Schweden 4", "Sweden 4", "SE4"),
    ("Ungarn", "Hungary", "HU"),
    ("Slowenien", "Slovenia", "SL"),
    ("Polen", "Poland", "PL"),
    ("Österreich", "Austria", "AT"),
    ("Norwegen 2", "Norway 2", "NO2"),
    ("Belgien", "Belgium", "BE"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoricalFormat {
    /// Day rows with one column per delivery hour.
    AuctionCsv,
    /// One row per hour with separate date and start-time columns.
    Consolidated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvDialect {
    pub delimiter: u8,
    pub decimal_comma: bool,
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            decimal_comma: false,
        }
    }
}

impl CsvDialect {
    pub fn semicolon_decimal_comma() -> Self {
        Self {
            delimiter: b';',
            decimal_comma: true,
        }
    }
}

/// One delivery hour before re-indexing; `slot` orders hours within a day
/// and is stable across files, so `(day, slot)` identifies a delivery hour.
#[derive(Debug, Clone, Copy)]
struct HourRecord {
    day: NaiveDate,
    slot: usize,
    stamp: NaiveDateTime,
    value: f64,
}

pub struct DataLoader {
    dialect: CsvDialect,
    price_column: String,
}

impl DataLoader {
    pub fn new(dialect: CsvDialect) -> Self {
        Self {
            dialect,
            price_column: CONSOLIDATED_PRICE_COLUMN.to_string(),
        }
    }

    /// Use another price column of the consolidated export.
    pub fn with_price_column(mut self, column: &str) -> Self {
        self.price_column = column.to_string();
        self
    }

    /// Load one calendar year of historical day-ahead prices.
    ///
    /// Several files for the same year are merged in chronological order;
    /// hours present in more than one file are kept once.
    pub fn load_historical_prices(
        &self,
        year: i32,
        files: &[PathBuf],
        format: HistoricalFormat,
    ) -> EvalResult<HourlySeries> {
        let mut records = Vec::new();
        for file in files {
            let parsed = match format {
                HistoricalFormat::AuctionCsv => self.parse_auction_file(file, year)?,
                HistoricalFormat::Consolidated => self.parse_consolidated_file(file, year)?,
            };
            debug!("{}: {} hours for {}", file.display(), parsed.len(), year);
            records.extend(parsed);
        }

        records.sort_by_key(|r| (r.day, r.slot));
        let mut seen = HashSet::new();
        records.retain(|r| seen.insert((r.day, r.slot)));

        let start = records
            .first()
            .map(|r| r.stamp)
            .ok_or_else(|| EvalError::EmptySeries(format!("{} {}", HISTORICAL_PRICE, year)))?;

        info!("Loaded {} historical hours for {}", records.len(), year);
        Ok(HourlySeries::from_start(
            HISTORICAL_PRICE,
            start,
            records.into_iter().map(|r| r.value).collect(),
        ))
    }

    fn parse_auction_file(&self, path: &Path, year: i32) -> EvalResult<Vec<HourRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.dialect.delimiter)
            .from_path(path)?;

        let mut records = Vec::new();
        // Line 1 is a title line, line 2 the header.
        for row in reader.records().skip(2) {
            let row = row?;
            let day_field = row.get(0).unwrap_or("").trim();
            if day_field.is_empty() {
                continue;
            }
            let day = parse_day(day_field).ok_or_else(|| {
                EvalError::Parse(format!("{}: bad delivery day '{}'", path.display(), day_field))
            })?;
            if day.year() != year {
                continue;
            }

            for (slot, hour) in AUCTION_HOUR_SLOTS.iter().enumerate() {
                let Some(value) = parse_number(row.get(slot + 1).unwrap_or(""), self.dialect.decimal_comma)? else {
                    continue;
                };
                let stamp = day.and_time(NaiveTime::MIN) + Duration::hours(*hour as i64 - 1);
                records.push(HourRecord {
                    day,
                    slot,
                    stamp,
                    value,
                });
            }
        }

        Ok(records)
    }

    fn parse_consolidated_file(&self, path: &Path, year: i32) -> EvalResult<Vec<HourRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.dialect.delimiter)
            .from_path(path)?;

        let mut rows = reader.records();
        let mut columns = None;
        for row in rows.by_ref() {
            let row = row?;
            let header: Vec<String> = row.iter().map(clean_header).collect();
            let date_idx = header.iter().position(|h| h == "Datum" || h == "Date");
            let start_idx = header.iter().position(|h| h == "Anfang" || h == "Start");
            if let (Some(date_idx), Some(start_idx)) = (date_idx, start_idx) {
                let price_idx = header
                    .iter()
                    .position(|h| *h == self.price_column)
                    .ok_or_else(|| EvalError::missing_column(&self.price_column, &path.display().to_string()))?;
                columns = Some((date_idx, start_idx, price_idx));
                break;
            }
        }
        let (date_idx, start_idx, price_idx) =
            columns.ok_or_else(|| EvalError::missing_column("Datum", &path.display().to_string()))?;

        let mut records = Vec::new();
        let mut seen = HashSet::new();
        for row in rows {
            let row = row?;
            let date_field = row.get(date_idx).unwrap_or("").trim();
            if date_field.is_empty() {
                continue;
            }
            let day = parse_day(date_field).ok_or_else(|| {
                EvalError::Parse(format!("{}: bad date '{}'", path.display(), date_field))
            })?;
            let time_field = row.get(start_idx).unwrap_or("").trim();
            let time = parse_time(time_field).ok_or_else(|| {
                EvalError::Parse(format!("{}: bad start time '{}'", path.display(), time_field))
            })?;

            // The hour repeated when clocks go back sorts right after its first occurrence.
            let repeated = !seen.insert((day, time));
            let slot = time.hour() as usize * 2 + usize::from(repeated);

            if day.year() != year {
                continue;
            }
            let Some(value) = parse_number(row.get(price_idx).unwrap_or(""), self.dialect.decimal_comma)? else {
                continue;
            };

            records.push(HourRecord {
                day,
                slot,
                stamp: day.and_time(time),
                value,
            });
        }

        Ok(records)
    }

    /// Load a model price series: timestamp in the first column, price in
    /// `column` or in the first value column when none is given.
    pub fn load_model_prices(&self, path: &Path, column: Option<&str>) -> EvalResult<HourlySeries> {
        let df = self.read_frame(path)?;
        let timestamps = timestamp_column(&df, path)?;

        let value_name = match column {
            Some(name) => name.to_string(),
            None => df
                .get_columns()
                .get(1)
                .map(|s| s.name().to_string())
                .ok_or_else(|| EvalError::missing_column("<price>", &path.display().to_string()))?,
        };
        let values = float_column(&df, &value_name, path)?;

        HourlySeries::new(MODEL_PRICE, timestamps, values)
    }

    /// Load a wide model result table; every column after the index is a flow.
    pub fn load_flow_table(&self, path: &Path) -> EvalResult<FlowTable> {
        let df = self.read_frame(path)?;
        let timestamps = timestamp_column(&df, path)?;

        let names: Vec<String> = df
            .get_columns()
            .iter()
            .skip(1)
            .map(|s| s.name().to_string())
            .collect();
        let columns = names
            .into_iter()
            .map(|name| float_column(&df, &name, path).map(|values| (name, values)))
            .collect::<EvalResult<Vec<_>>>()?;

        info!("Loaded {} flow columns x {} hours from {}", columns.len(), df.height(), path.display());
        FlowTable::new(timestamps, columns)
    }

    fn read_frame(&self, path: &Path) -> EvalResult<DataFrame> {
        let delimiter = self.dialect.delimiter;
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(10_000))
            .map_parse_options(|opts| opts.with_separator(delimiter))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Ok(df)
    }

    /// Headerless `timestamp;value` input series as fed to the dispatch model.
    pub fn load_input_time_series(&self, path: &Path) -> EvalResult<HourlySeries> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.dialect.delimiter)
            .from_path(path)?;

        let mut timestamps = Vec::new();
        let mut values = Vec::new();
        for row in reader.records() {
            let row = row?;
            let stamp_field = row.get(0).unwrap_or("").trim();
            let stamp = parse_timestamp(stamp_field).ok_or_else(|| {
                EvalError::Parse(format!("{}: bad timestamp '{}'", path.display(), stamp_field))
            })?;
            let value = parse_number(row.get(1).unwrap_or(""), self.dialect.decimal_comma)?
                .unwrap_or(f64::NAN);
            timestamps.push(stamp);
            values.push(value);
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("time_series");
        HourlySeries::new(name, timestamps, values)
    }

    /// Quarter-hourly generation per production type, averaged to hours.
    ///
    /// Rows without any value (the repeated hour when clocks go back) are
    /// dropped before the quarter hours of the year are laid out.
    pub fn load_entsoe_generation(&self, path: &Path, year: i32) -> EvalResult<FlowTable> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.dialect.delimiter)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let mapped: Vec<(usize, &str)> = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, header)| {
                let header = clean_header(header);
                ENTSOE_GENERATION_COLUMNS
                    .iter()
                    .find(|(raw, _)| *raw == header)
                    .map(|(_, canonical)| (idx, *canonical))
            })
            .collect();
        if mapped.is_empty() {
            return Err(EvalError::missing_column("Actual Aggregated [MW]", &path.display().to_string()));
        }
        let value_indices: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| {
                let h = clean_header(h);
                h != "Area" && !h.starts_with("MTU")
            })
            .map(|(idx, _)| idx)
            .collect();

        let mut quarter_hours: Vec<Vec<f64>> = Vec::new();
        for row in reader.records() {
            let row = row?;
            let all_empty = value_indices
                .iter()
                .all(|idx| row.get(*idx).map_or(true, |v| v.trim().is_empty()));
            if all_empty {
                continue;
            }
            let values = mapped
                .iter()
                .map(|(idx, _)| Ok(parse_number(row.get(*idx).unwrap_or(""), self.dialect.decimal_comma)?.unwrap_or(f64::NAN)))
                .collect::<EvalResult<Vec<f64>>>()?;
            quarter_hours.push(values);
        }

        let hours = hours_in_year(year);
        if quarter_hours.len() != hours * 4 {
            return Err(EvalError::LengthMismatch {
                left: path.display().to_string(),
                left_len: quarter_hours.len(),
                right: format!("quarter hours of {}", year),
                right_len: hours * 4,
            });
        }

        let columns = mapped
            .iter()
            .enumerate()
            .map(|(col, (_, canonical))| {
                let hourly = quarter_hours
                    .chunks(4)
                    .map(|chunk| nan_mean(chunk.iter().map(|row| row[col])))
                    .collect();
                (canonical.to_string(), hourly)
            })
            .collect();

        FlowTable::new(year_index(year, hours), columns)
    }

    /// Commercial cross-border exchange, summed to hours and renamed to
    /// `net_export_<code>_pos` (exports) and `net_export_<code>_neg` (imports).
    pub fn load_historical_exchange(&self, path: &Path, year: i32) -> EvalResult<FlowTable> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.dialect.delimiter)
            .from_path(path)?;

        let mut rows = reader.records();
        let mut layout = None;
        for row in rows.by_ref() {
            let row = row?;
            let header: Vec<String> = row.iter().map(clean_header).collect();
            let date_idx = header.iter().position(|h| h == "Datum" || h == "Date");
            let time_idx = header.iter().position(|h| h == "Uhrzeit" || h == "Time of day");
            if let (Some(date_idx), Some(time_idx)) = (date_idx, time_idx) {
                let mapped: Vec<(usize, String)> = header
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, h)| exchange_column_name(h).map(|name| (idx, name)))
                    .collect();
                layout = Some((date_idx, time_idx, mapped));
                break;
            }
        }
        let (date_idx, time_idx, mapped) =
            layout.ok_or_else(|| EvalError::missing_column("Datum", &path.display().to_string()))?;
        if mapped.is_empty() {
            return Err(EvalError::missing_column("(Export)[MWh]", &path.display().to_string()));
        }

        // (month, day, hour, repeated) keeps the two passes of the hour
        // clocks are set back apart, in chronological order.
        let mut hourly: BTreeMap<(u32, u32, u32, bool), Vec<f64>> = BTreeMap::new();
        let mut seen = HashSet::new();
        for row in rows {
            let row = row?;
            let date_field = row.get(date_idx).unwrap_or("").trim();
            if date_field.is_empty() {
                continue;
            }
            let day = parse_day(date_field)
                .ok_or_else(|| EvalError::Parse(format!("{}: bad date '{}'", path.display(), date_field)))?;
            let time_field = row.get(time_idx).unwrap_or("").trim();
            let time = parse_time(time_field)
                .ok_or_else(|| EvalError::Parse(format!("{}: bad time '{}'", path.display(), time_field)))?;
            if day.year() != year {
                continue;
            }

            let stamp = day.and_time(time);
            let repeated = !seen.insert(stamp);
            let entry = hourly
                .entry((day.month(), day.day(), time.hour(), repeated))
                .or_insert_with(|| vec![0.0; mapped.len()]);
            for (slot, (idx, _)) in mapped.iter().enumerate() {
                entry[slot] += parse_number(row.get(*idx).unwrap_or(""), self.dialect.decimal_comma)?.unwrap_or(0.0);
            }
        }

        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| EvalError::Parse(format!("invalid year {}", year)))?
            .and_time(NaiveTime::MIN);
        let timestamps = (0..hourly.len())
            .map(|h| start + Duration::hours(h as i64))
            .collect();
        let columns = mapped
            .iter()
            .enumerate()
            .map(|(slot, (_, name))| (name.clone(), hourly.values().map(|row| row[slot]).collect()))
            .collect();

        FlowTable::new(timestamps, columns)
    }
}

fn timestamp_column(df: &DataFrame, path: &Path) -> EvalResult<Vec<NaiveDateTime>> {
    let index = df
        .get_columns()
        .first()
        .ok_or_else(|| EvalError::missing_column("<index>", &path.display().to_string()))?
        .cast(&DataType::String)?;

    index
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.and_then(parse_timestamp).ok_or_else(|| {
                EvalError::Parse(format!(
                    "{}: bad timestamp in row {}: {:?}",
                    path.display(),
                    row + 1,
                    value
                ))
            })
        })
        .collect()
}

fn float_column(df: &DataFrame, name: &str, path: &Path) -> EvalResult<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| EvalError::missing_column(name, &path.display().to_string()))?
        .cast(&DataType::Float64)?;

    column
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| {
                EvalError::Parse(format!(
                    "{}: missing value in column '{}', row {}",
                    path.display(),
                    name,
                    row + 1
                ))
            })
        })
        .collect()
}

fn exchange_column_name(header: &str) -> Option<String> {
    let compact: String = header.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase();
    if compact == "nettoexport[mwh]" || compact == "netexport[mwh]" {
        return Some("overall_net_export".to_string());
    }

    EXCHANGE_NEIGHBOURS.iter().find_map(|(german, english, code)| {
        [german, english].iter().find_map(|name| {
            let base: String = name.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase();
            if compact == format!("{}(export)[mwh]", base) {
                Some(format!("net_export_{}_pos", code))
            } else if compact == format!("{}(import)[mwh]", base) {
                Some(format!("net_export_{}_neg", code))
            } else {
                None
            }
        })
    })
}

fn clean_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

fn hours_in_year(year: i32) -> usize {
    if crate::alignment::is_leap_year(year) {
        8784
    } else {
        8760
    }
}

fn year_index(year: i32, hours: usize) -> Vec<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN);
    (0..hours).map(|h| start + Duration::hours(h as i64)).collect()
}

pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    ["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw.trim(), fmt).ok())
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    ["%H:%M", "%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw.trim(), fmt).ok())
}

/// Parse the timestamp layouts found in model inputs and outputs,
/// including the `YYYY-MM-DD_hh:mm:ss` form and offset-qualified stamps.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    const FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d_%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d.%m.%Y %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z")
                .ok()
                .map(|dt| dt.naive_local())
        })
        .or_else(|| parse_day(raw).map(|day| day.and_time(NaiveTime::MIN)))
}

/// Parse a numeric cell; blanks and `-` are missing values.
pub fn parse_number(raw: &str, decimal_comma: bool) -> EvalResult<Option<f64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed.eq_ignore_ascii_case("n/e") {
        return Ok(None);
    }

    let normalized = if decimal_comma {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };

    normalized
        .parse::<f64>()
        .map(Some)
        .map_err(|_| EvalError::Parse(format!("not a number: '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn auction_row(day: &str, base: f64, with_3b: bool) -> String {
        let mut cells = vec![day.to_string()];
        for slot in 0..25 {
            if slot == 3 && !with_3b {
                cells.push(String::new());
            } else {
                cells.push(format!("{}", base + slot as f64));
            }
        }
        cells.join(",")
    }

    fn auction_file(rows: &[String]) -> String {
        let mut hours: Vec<String> = vec!["Hour 1".into(), "Hour 2".into(), "Hour 3A".into(), "Hour 3B".into()];
        hours.extend((4..=24).map(|h| format!("Hour {}", h)));
        format!(
            "Auction prices,,\nDelivery day,{}\n{}\n",
            hours.join(","),
            rows.join("\n")
        )
    }

    #[test]
    fn test_parse_number_variants() {
        assert_eq!(parse_number("1.234,5", true).unwrap(), Some(1234.5));
        assert_eq!(parse_number("-12.5", false).unwrap(), Some(-12.5));
        assert_eq!(parse_number(" - ", true).unwrap(), None);
        assert_eq!(parse_number("", false).unwrap(), None);
        assert!(parse_number("12,5", false).is_err());
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap().and_hms_opt(5, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2030-01-01 05:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2030-01-01_05:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2030-01-01T05:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2030-01-01 05:00:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_auction_reshape_skips_empty_3b_and_other_years() {
        let dir = TempDir::new().unwrap();
        let content = auction_file(&[
            auction_row("2016-12-31", 100.0, false),
            auction_row("2017-01-01", 0.0, false),
            auction_row("2017-01-02", 50.0, false),
        ]);
        let path = write_file(&dir, "auction_2017.csv", &content);

        let loader = DataLoader::new(CsvDialect::default());
        let series = loader
            .load_historical_prices(2017, &[path], HistoricalFormat::AuctionCsv)
            .unwrap();

        assert_eq!(series.name(), HISTORICAL_PRICE);
        assert_eq!(series.len(), 48);
        assert_eq!(
            series.first_timestamp(),
            Some(NaiveDate::from_ymd_opt(2017, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap())
        );
        // slot 3 (hour 3B) is empty, so hour 4 follows hour 3A
        assert_eq!(&series.values()[..4], &[0.0, 1.0, 2.0, 4.0]);
        assert_eq!(series.values()[24], 50.0);
    }

    #[test]
    fn test_auction_files_merge_without_duplicates() {
        let dir = TempDir::new().unwrap();
        let first = write_file(
            &dir,
            "part_a.csv",
            &auction_file(&[auction_row("2018-01-02", 10.0, false), auction_row("2018-01-03", 20.0, false)]),
        );
        let second = write_file(
            &dir,
            "part_b.csv",
            &auction_file(&[auction_row("2018-01-01", 0.0, false), auction_row("2018-01-02", 10.0, false)]),
        );

        let loader = DataLoader::new(CsvDialect::default());
        let series = loader
            .load_historical_prices(2018, &[first, second], HistoricalFormat::AuctionCsv)
            .unwrap();

        assert_eq!(series.len(), 72);
        assert_eq!(series.values()[0], 0.0);
        assert_eq!(series.values()[24], 10.0);
        assert_eq!(series.values()[48], 20.0);
    }

    #[test]
    fn test_daylight_saving_3b_hour_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "auction_2019.csv",
            &auction_file(&[auction_row("27/10/2019", 0.0, true)]),
        );

        let loader = DataLoader::new(CsvDialect::default());
        let series = loader
            .load_historical_prices(2019, &[path], HistoricalFormat::AuctionCsv)
            .unwrap();

        assert_eq!(series.len(), 25);
        assert_eq!(series.values()[3], 3.0);
    }

    #[test]
    fn test_consolidated_format() {
        let dir = TempDir::new().unwrap();
        let content = "\
Großhandelspreise;;;\n\
Export;;;\n\
Datum;Anfang;Ende;Deutschland/Luxemburg [€/MWh]\n\
31.12.2020;23:00;00:00;48,19\n\
01.01.2021;00:00;01:00;50,87\n\
01.01.2021;01:00;02:00;-\n\
01.01.2021;02:00;03:00;1.044,5\n";
        let path = write_file(&dir, "consolidated_2021.csv", content);

        let loader = DataLoader::new(CsvDialect::semicolon_decimal_comma());
        let series = loader
            .load_historical_prices(2021, &[path], HistoricalFormat::Consolidated)
            .unwrap();

        assert_eq!(series.values(), &[50.87, 1044.5]);
        assert_eq!(
            series.timestamps()[1],
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap().and_hms_opt(1, 0, 0).unwrap()
        );
    }

    fn consolidated_file(rows: &[(&str, u32, f64)]) -> String {
        let mut content = String::from("Großhandelspreise;;;\nDatum;Anfang;Ende;Deutschland/Luxemburg [€/MWh]\n");
        for (day, hour, value) in rows {
            content.push_str(&format!("{};{:02}:00;{:02}:00;{}\n", day, hour, (hour + 1) % 24, value));
        }
        content
    }

    #[test]
    fn test_consolidated_files_split_within_a_day() {
        let dir = TempDir::new().unwrap();
        let morning: Vec<(&str, u32, f64)> = (0..12).map(|h| ("01.01.2021", h, h as f64)).collect();
        let afternoon: Vec<(&str, u32, f64)> = (12..24).map(|h| ("01.01.2021", h, h as f64)).collect();
        let first = write_file(&dir, "prices_2021_a.csv", &consolidated_file(&morning));
        let second = write_file(&dir, "prices_2021_b.csv", &consolidated_file(&afternoon));

        let loader = DataLoader::new(CsvDialect::semicolon_decimal_comma());
        let series = loader
            .load_historical_prices(2021, &[second, first], HistoricalFormat::Consolidated)
            .unwrap();

        assert_eq!(series.len(), 24);
        let expected: Vec<f64> = (0..24).map(|h| h as f64).collect();
        assert_eq!(series.values(), expected.as_slice());
    }

    #[test]
    fn test_consolidated_overlapping_days_are_kept_once() {
        let dir = TempDir::new().unwrap();
        let mut early: Vec<(&str, u32, f64)> = (0..24).map(|h| ("01.01.2021", h, 1.0)).collect();
        early.extend((0..24).map(|h| ("02.01.2021", h, 2.0)));
        let mut late: Vec<(&str, u32, f64)> = (0..24).map(|h| ("02.01.2021", h, 2.0)).collect();
        late.extend((0..24).map(|h| ("03.01.2021", h, 3.0)));
        let first = write_file(&dir, "early.csv", &consolidated_file(&early));
        let second = write_file(&dir, "late.csv", &consolidated_file(&late));

        let loader = DataLoader::new(CsvDialect::semicolon_decimal_comma());
        let series = loader
            .load_historical_prices(2021, &[first, second], HistoricalFormat::Consolidated)
            .unwrap();

        assert_eq!(series.len(), 72);
        assert_eq!(series.values()[23], 1.0);
        assert_eq!(series.values()[24], 2.0);
        assert_eq!(series.values()[71], 3.0);
    }

    #[test]
    fn test_consolidated_repeated_autumn_hour() {
        let dir = TempDir::new().unwrap();
        let rows = [
            ("31.10.2021", 1, 10.0),
            ("31.10.2021", 2, 20.0),
            ("31.10.2021", 2, 21.0),
            ("31.10.2021", 3, 30.0),
        ];
        let path = write_file(&dir, "autumn.csv", &consolidated_file(&rows));

        let loader = DataLoader::new(CsvDialect::semicolon_decimal_comma());
        let series = loader
            .load_historical_prices(2021, &[path], HistoricalFormat::Consolidated)
            .unwrap();

        assert_eq!(series.values(), &[10.0, 20.0, 21.0, 30.0]);
    }

    #[test]
    fn test_consolidated_missing_price_column() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "bad.csv", "Datum;Anfang;Ende;Frankreich [€/MWh]\n01.01.2021;00:00;01:00;1,0\n");

        let loader = DataLoader::new(CsvDialect::semicolon_decimal_comma());
        let result = loader.load_historical_prices(2021, &[path], HistoricalFormat::Consolidated);
        assert!(matches!(result, Err(EvalError::MissingColumn { .. })));
    }

    #[test]
    fn test_model_prices_and_flow_table() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "results.csv",
            "time,price,other\n2030-01-01 00:00:00,12.5,1.0\n2030-01-01 01:00:00,-3.0,2.0\n2030-01-01 02:00:00,40.0,3.0\n",
        );

        let loader = DataLoader::new(CsvDialect::default());
        let prices = loader.load_model_prices(&path, None).unwrap();
        assert_eq!(prices.name(), MODEL_PRICE);
        assert_eq!(prices.values(), &[12.5, -3.0, 40.0]);

        let table = loader.load_flow_table(&path).unwrap();
        assert_eq!(table.height(), 3);
        assert_eq!(table.column("other").unwrap(), &[1.0, 2.0, 3.0]);

        assert!(matches!(
            loader.load_model_prices(&path, Some("missing")),
            Err(EvalError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_input_time_series() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "demand_ts.csv",
            "2030-01-01_00:00:00;100.5\n2030-01-01_01:00:00;99.0\n",
        );

        let loader = DataLoader::new(CsvDialect {
            delimiter: b';',
            decimal_comma: false,
        });
        let series = loader.load_input_time_series(&path).unwrap();
        assert_eq!(series.name(), "demand_ts");
        assert_eq!(series.values(), &[100.5, 99.0]);
    }

    #[test]
    fn test_exchange_columns_are_renamed_and_summed() {
        let dir = TempDir::new().unwrap();
        let content = "\
Kommerzieller Außenhandel;;;;\n\
Datum;Uhrzeit;Nettoexport[MWh];Österreich (Export)[MWh];Österreich (Import)[MWh]\n\
01.01.2019;00:00;10;5;-1\n\
01.01.2019;00:15;10;5;-1\n\
01.01.2019;01:00;20;6;0\n";
        let path = write_file(&dir, "exchange_2019.csv", content);

        let loader = DataLoader::new(CsvDialect::semicolon_decimal_comma());
        let table = loader.load_historical_exchange(&path, 2019).unwrap();

        assert_eq!(table.height(), 2);
        assert_eq!(table.column("overall_net_export").unwrap(), &[20.0, 20.0]);
        assert_eq!(table.column("net_export_AT_pos").unwrap(), &[10.0, 6.0]);
        assert_eq!(table.column("net_export_AT_neg").unwrap(), &[-2.0, 0.0]);
    }

    #[test]
    fn test_entsoe_generation_rejects_incomplete_year() {
        let dir = TempDir::new().unwrap();
        let content = "\
Area,MTU,Solar  - Actual Aggregated [MW]\n\
BZN|DE-LU,01.01.2019 00:00 - 01.01.2019 00:15,10\n";
        let path = write_file(&dir, "entsoe.csv", content);

        let loader = DataLoader::new(CsvDialect::default());
        assert!(matches!(
            loader.load_entsoe_generation(&path, 2019),
            Err(EvalError::LengthMismatch { .. })
        ));
    }
}
