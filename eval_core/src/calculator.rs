use crate::error::{EvalError, EvalResult};
use crate::models::{ErrorMetrics, HourlySeries, SummaryStats};

/// Descriptive statistics and error metrics for price and flow series.
pub struct StatsCalculator {
    price_cap: f64,
}

impl StatsCalculator {
    pub fn new(price_cap: f64) -> Self {
        Self { price_cap }
    }

    pub fn describe(&self, series: &HourlySeries) -> EvalResult<SummaryStats> {
        self.describe_values(series.name(), series.values())
    }

    /// Describe statistics over the non-NaN values of a column.
    pub fn describe_values(&self, name: &str, values: &[f64]) -> EvalResult<SummaryStats> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return Err(EvalError::EmptySeries(name.to_string()));
        }
        sorted.sort_by(f64::total_cmp);

        let negative_hours = sorted.iter().filter(|v| **v < 0.0).count();
        let scarcity_hours = sorted.iter().filter(|v| **v >= self.price_cap).count();

        Ok(SummaryStats {
            name: name.to_string(),
            count: sorted.len(),
            mean: mean(&sorted),
            std: std_dev(&sorted),
            min: sorted[0],
            p25: quantile_sorted(&sorted, 0.25),
            median: quantile_sorted(&sorted, 0.5),
            p75: quantile_sorted(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
            negative_hours,
            scarcity_hours,
        })
    }

    /// Statistics for several aligned series, e.g. historical next to model prices.
    pub fn compare(&self, series: &[&HourlySeries]) -> EvalResult<Vec<SummaryStats>> {
        if let Some(first) = series.first() {
            for other in &series[1..] {
                ensure_same_length(first, other)?;
            }
        }
        series.iter().map(|s| self.describe(s)).collect()
    }

    /// Statistics per calendar year of a multi-year series.
    pub fn annual_stats(&self, series: &HourlySeries) -> EvalResult<Vec<(i32, SummaryStats)>> {
        series
            .years()
            .into_iter()
            .map(|year| {
                let chunk = series.slice_year(year);
                let name = format!("{}_{}", series.name(), year);
                self.describe_values(&name, chunk.values())
                    .map(|stats| (year, stats))
            })
            .collect()
    }
}

/// MAE, RMSE and range-normalized RMSE of `model` against `reference`.
pub fn error_metrics(reference: &HourlySeries, model: &HourlySeries) -> EvalResult<ErrorMetrics> {
    ensure_same_length(reference, model)?;
    if reference.is_empty() {
        return Err(EvalError::EmptySeries(reference.name().to_string()));
    }

    let n = reference.len() as f64;
    let (abs_sum, sq_sum) = reference
        .values()
        .iter()
        .zip(model.values())
        .fold((0.0, 0.0), |(abs_sum, sq_sum), (a, b)| {
            let err = a - b;
            (abs_sum + err.abs(), sq_sum + err * err)
        });

    let mae = abs_sum / n;
    let rmse = (sq_sum / n).sqrt();

    let (lo, hi) = reference
        .values()
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let range = hi - lo;
    let nrmse = if range > 0.0 { rmse / range } else { f64::NAN };

    Ok(ErrorMetrics { mae, rmse, nrmse })
}

fn ensure_same_length(left: &HourlySeries, right: &HourlySeries) -> EvalResult<()> {
    if left.len() != right.len() {
        return Err(EvalError::LengthMismatch {
            left: left.name().to_string(),
            left_len: left.len(),
            right: right.name().to_string(),
            right_len: right.len(),
        });
    }
    Ok(())
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 in the denominator).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// Quantile with linear interpolation between the neighbouring order statistics.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}
