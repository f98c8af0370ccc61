use crate::error::{EvalError, EvalResult};
use chrono::{Datelike, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Hourly time series with a strictly increasing timestamp index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    name: String,
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl HourlySeries {
    pub fn new(name: &str, timestamps: Vec<NaiveDateTime>, values: Vec<f64>) -> EvalResult<Self> {
        if timestamps.len() != values.len() {
            return Err(EvalError::LengthMismatch {
                left: format!("{} index", name),
                left_len: timestamps.len(),
                right: format!("{} values", name),
                right_len: values.len(),
            });
        }

        if let Some(position) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(EvalError::NonMonotonicIndex {
                name: name.to_string(),
                position: position + 1,
            });
        }

        Ok(Self {
            name: name.to_string(),
            timestamps,
            values,
        })
    }

    /// Build a series on a contiguous hourly index starting at `start`,
    /// discarding whatever timestamps the raw values originally carried.
    pub fn from_start(name: &str, start: NaiveDateTime, values: Vec<f64>) -> Self {
        let timestamps = (0..values.len())
            .map(|h| start + Duration::hours(h as i64))
            .collect();

        Self {
            name: name.to_string(),
            timestamps,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn points(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.timestamps.iter().copied().zip(self.values.iter().copied())
    }

    /// Calendar years present in the index, ascending.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.timestamps.iter().map(|t| t.year()).collect();
        years.dedup();
        years
    }

    pub fn slice_year(&self, year: i32) -> HourlySeries {
        self.filter(|ts| ts.year() == year)
    }

    pub fn filter(&self, keep: impl Fn(&NaiveDateTime) -> bool) -> HourlySeries {
        let (timestamps, values) = self
            .points()
            .filter(|(ts, _)| keep(ts))
            .unzip();

        HourlySeries {
            name: self.name.clone(),
            timestamps,
            values,
        }
    }

    /// Keep the first `len` entries. Longer requests leave the series as is.
    pub fn truncate(mut self, len: usize) -> Self {
        self.timestamps.truncate(len);
        self.values.truncate(len);
        self
    }

    /// Excerpt of `len` hours beginning at position `start`, clamped to the series end.
    pub fn window(&self, start: usize, len: usize) -> HourlySeries {
        let start = start.min(self.len());
        let end = start.saturating_add(len).min(self.len());

        HourlySeries {
            name: self.name.clone(),
            timestamps: self.timestamps[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
        }
    }

    /// Values ordered from highest to lowest, i.e. the duration curve.
    pub fn sorted_descending(&self) -> Vec<f64> {
        let mut sorted = self.values.clone();
        sorted.sort_by(|a, b| b.total_cmp(a));
        sorted
    }
}

/// Descriptive statistics of one series plus the price-specific counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
    pub negative_hours: usize,
    pub scarcity_hours: usize,
}

impl SummaryStats {
    pub const ROW_LABELS: [&'static str; 10] = [
        "count",
        "mean",
        "std",
        "min",
        "25%",
        "50%",
        "75%",
        "max",
        "negative_hours",
        "scarcity_hours",
    ];

    /// Values in the order of [`SummaryStats::ROW_LABELS`].
    pub fn as_row(&self) -> [f64; 10] {
        [
            self.count as f64,
            self.mean,
            self.std,
            self.min,
            self.p25,
            self.median,
            self.p75,
            self.max,
            self.negative_hours as f64,
            self.scarcity_hours as f64,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// RMSE normalized by the value range of the reference series.
    pub nrmse: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSpread {
    pub window_hours: usize,
    pub min: f64,
    pub max: f64,
}

/// Spread indicators of one calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadRow {
    pub year: i32,
    pub windows: Vec<WindowSpread>,
    pub diff_1h_min: f64,
    pub diff_1h_max: f64,
    pub std: f64,
}

/// Wide table of timestamped values, one column per identifier
/// (model flows, exchange links, cost carriers).
#[derive(Debug, Clone, PartialEq)]
pub struct FlowTable {
    timestamps: Vec<NaiveDateTime>,
    columns: Vec<(String, Vec<f64>)>,
}

impl FlowTable {
    pub fn new(timestamps: Vec<NaiveDateTime>, columns: Vec<(String, Vec<f64>)>) -> EvalResult<Self> {
        if let Some(position) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(EvalError::NonMonotonicIndex {
                name: "flow table".to_string(),
                position: position + 1,
            });
        }

        for (name, values) in &columns {
            if values.len() != timestamps.len() {
                return Err(EvalError::LengthMismatch {
                    left: name.clone(),
                    left_len: values.len(),
                    right: "flow table index".to_string(),
                    right_len: timestamps.len(),
                });
            }
        }

        Ok(Self { timestamps, columns })
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn height(&self) -> usize {
        self.timestamps.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn column(&self, name: &str) -> EvalResult<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
            .ok_or_else(|| EvalError::missing_column(name, "flow table"))
    }

    /// Keep the rows whose timestamp satisfies `keep`.
    pub fn filter(&self, keep: impl Fn(&NaiveDateTime) -> bool) -> FlowTable {
        let rows: Vec<usize> = (0..self.timestamps.len())
            .filter(|&i| keep(&self.timestamps[i]))
            .collect();

        FlowTable {
            timestamps: rows.iter().map(|&i| self.timestamps[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), rows.iter().map(|&i| values[i]).collect()))
                .collect(),
        }
    }

    pub fn series(&self, name: &str) -> EvalResult<HourlySeries> {
        let values = self.column(name)?.to_vec();
        Ok(HourlySeries {
            name: name.to_string(),
            timestamps: self.timestamps.clone(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 12, 31)
            .unwrap()
            .and_hms_opt(22, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_rejects_unsorted_index() {
        let t0 = start();
        let result = HourlySeries::new(
            "prices",
            vec![t0, t0 + Duration::hours(2), t0 + Duration::hours(1)],
            vec![1.0, 2.0, 3.0],
        );

        assert!(matches!(
            result,
            Err(EvalError::NonMonotonicIndex { position: 2, .. })
        ));
    }

    #[test]
    fn test_year_slicing_across_new_year() {
        let series = HourlySeries::from_start("prices", start(), vec![1.0, 2.0, 3.0, 4.0]);

        assert_eq!(series.years(), vec![2019, 2020]);
        assert_eq!(series.slice_year(2019).values(), &[1.0, 2.0]);
        assert_eq!(series.slice_year(2020).values(), &[3.0, 4.0]);
    }

    #[test]
    fn test_window_is_clamped() {
        let series = HourlySeries::from_start("prices", start(), vec![1.0, 2.0, 3.0]);
        let excerpt = series.window(2, 168);

        assert_eq!(excerpt.values(), &[3.0]);
        assert_eq!(excerpt.first_timestamp(), Some(start() + Duration::hours(2)));
    }

    #[test]
    fn test_flow_table_column_lookup() {
        let t0 = start();
        let table = FlowTable::new(
            vec![t0, t0 + Duration::hours(1)],
            vec![("a".to_string(), vec![1.0, 2.0])],
        )
        .unwrap();

        assert_eq!(table.column("a").unwrap(), &[1.0, 2.0]);
        assert!(matches!(
            table.column("b"),
            Err(EvalError::MissingColumn { .. })
        ));
    }
}
