use crate::calculator::std_dev;
use crate::error::{EvalError, EvalResult};
use crate::models::{HourlySeries, SpreadRow, WindowSpread};
use std::collections::VecDeque;

/// Yearly price spread indicators over a set of rolling windows.
pub struct SpreadAnalyzer {
    windows: Vec<usize>,
}

impl SpreadAnalyzer {
    pub fn new(windows: Vec<usize>) -> Self {
        Self { windows }
    }

    /// One row per calendar year present in `series`.
    pub fn analyze(&self, series: &HourlySeries) -> EvalResult<Vec<SpreadRow>> {
        if series.is_empty() {
            return Err(EvalError::EmptySeries(series.name().to_string()));
        }

        Ok(series
            .years()
            .into_iter()
            .map(|year| self.analyze_year(year, series.slice_year(year).values()))
            .collect())
    }

    fn analyze_year(&self, year: i32, values: &[f64]) -> SpreadRow {
        let windows = self
            .windows
            .iter()
            .map(|&window| {
                let (min, max) = extrema(rolling_spread(values, window).into_iter().flatten());
                WindowSpread {
                    window_hours: window,
                    min,
                    max,
                }
            })
            .collect();

        let (diff_1h_min, diff_1h_max) = extrema(first_differences(values).into_iter());

        SpreadRow {
            year,
            windows,
            diff_1h_min,
            diff_1h_max,
            std: std_dev(values),
        }
    }

    /// Column headers matching [`SpreadAnalyzer::row_values`].
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .windows
            .iter()
            .flat_map(|w| [format!("spread_{}h_min", w), format!("spread_{}h_max", w)])
            .collect();
        names.extend(["diff_1h_min", "diff_1h_max", "std"].map(String::from));
        names
    }

    pub fn row_values(row: &SpreadRow) -> Vec<f64> {
        let mut values: Vec<f64> = row.windows.iter().flat_map(|w| [w.min, w.max]).collect();
        values.extend([row.diff_1h_min, row.diff_1h_max, row.std]);
        values
    }
}

/// Trailing max - min over the current sample and the `window` preceding ones.
///
/// The first `window` positions have no complete window and yield `None`.
pub fn rolling_spread(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut max_idx: VecDeque<usize> = VecDeque::new();
    let mut min_idx: VecDeque<usize> = VecDeque::new();
    let mut spreads = Vec::with_capacity(values.len());

    for (t, &value) in values.iter().enumerate() {
        while max_idx.back().is_some_and(|&i| values[i] <= value) {
            max_idx.pop_back();
        }
        max_idx.push_back(t);

        while min_idx.back().is_some_and(|&i| values[i] >= value) {
            min_idx.pop_back();
        }
        min_idx.push_back(t);

        if t < window {
            spreads.push(None);
            continue;
        }

        let oldest = t - window;
        while max_idx.front().is_some_and(|&i| i < oldest) {
            max_idx.pop_front();
        }
        while min_idx.front().is_some_and(|&i| i < oldest) {
            min_idx.pop_front();
        }

        // Both deques hold at least `t` itself.
        spreads.push(Some(values[max_idx[0]] - values[min_idx[0]]));
    }

    spreads
}

pub fn first_differences(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

fn extrema(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::NAN, f64::NAN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
