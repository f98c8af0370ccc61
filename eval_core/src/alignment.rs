use crate::error::{EvalError, EvalResult};
use crate::models::{FlowTable, HourlySeries};
use chrono::NaiveDateTime;
use chrono::Datelike;
use log::debug;

pub const HOURS_PER_YEAR: usize = 8760;
const HOURS_PER_DAY: usize = 24;

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Align a historical year with a model year.
///
/// The model works on synthetic 8760-hour years, so a historical leap year
/// loses its last 24 hours. Any other length difference is an error.
pub fn align_to_model(historical: HourlySeries, model: &HourlySeries) -> EvalResult<HourlySeries> {
    if historical.len() == model.len() {
        return Ok(historical);
    }

    let leap_year = historical
        .first_timestamp()
        .is_some_and(|ts| is_leap_year(ts.year()));
    if !leap_year || historical.len() != model.len() + HOURS_PER_DAY {
        return Err(EvalError::LengthMismatch {
            left: historical.name().to_string(),
            left_len: historical.len(),
            right: model.name().to_string(),
            right_len: model.len(),
        });
    }

    debug!(
        "Dropping the last day of leap year '{}' ({} -> {} hours)",
        historical.name(),
        historical.len(),
        model.len()
    );
    Ok(historical.truncate(model.len()))
}

/// Drop December 31st of every leap year so each year has 8760 hours.
pub fn cut_leap_days(series: &HourlySeries) -> HourlySeries {
    series.filter(|ts| !is_cut_day(ts))
}

pub fn cut_leap_days_table(table: &FlowTable) -> FlowTable {
    table.filter(|ts| !is_cut_day(ts))
}

fn is_cut_day(ts: &NaiveDateTime) -> bool {
    is_leap_year(ts.year()) && ts.month() == 12 && ts.day() == 31
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn year_series(name: &str, year: i32, hours: usize) -> HourlySeries {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        HourlySeries::from_start(name, start, (0..hours).map(|h| h as f64).collect())
    }

    #[test]
    fn test_leap_year_rules() {
        assert!(is_leap_year(2020));
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2019));
    }

    #[test]
    fn test_leap_year_truncation_drops_last_day() {
        let historical = year_series("historical_price", 2020, 8784);
        let model = year_series("model_price", 2020, HOURS_PER_YEAR);
        let original = historical.clone();

        let aligned = align_to_model(historical, &model).unwrap();

        assert_eq!(aligned.len(), HOURS_PER_YEAR);
        assert_eq!(aligned.timestamps(), &original.timestamps()[..HOURS_PER_YEAR]);
        assert_eq!(aligned.values(), &original.values()[..HOURS_PER_YEAR]);
        let last = *aligned.timestamps().last().unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2020, 12, 30).unwrap().and_hms_opt(23, 0, 0).unwrap());
    }

    #[test]
    fn test_shorter_historical_series_fails() {
        let historical = year_series("historical_price", 2019, 100);
        let model = year_series("model_price", 2019, 200);

        assert!(align_to_model(historical, &model).is_err());
    }

    #[test]
    fn test_non_leap_year_is_not_truncated() {
        let historical = year_series("historical_price", 2019, HOURS_PER_YEAR);
        let model = year_series("model_price", 2019, 5000);

        assert!(matches!(
            align_to_model(historical, &model),
            Err(EvalError::LengthMismatch { left_len: 8760, right_len: 5000, .. })
        ));

        let historical = year_series("historical_price", 2019, HOURS_PER_YEAR + 24);
        let model = year_series("model_price", 2019, HOURS_PER_YEAR);
        assert!(align_to_model(historical, &model).is_err());
    }

    #[test]
    fn test_leap_year_with_other_excess_fails() {
        let historical = year_series("historical_price", 2020, 8784);
        let model = year_series("model_price", 2020, 8700);

        assert!(align_to_model(historical, &model).is_err());
    }

    #[test]
    fn test_equal_lengths_pass_unchanged() {
        let historical = year_series("historical_price", 2019, 48);
        let model = year_series("model_price", 2019, 48);

        assert_eq!(align_to_model(historical.clone(), &model).unwrap(), historical);
    }

    #[test]
    fn test_cut_leap_days_only_touches_leap_years() {
        let start = NaiveDate::from_ymd_opt(2019, 12, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let hours = 24 + 8784 + 24;
        let series = HourlySeries::from_start("ts", start, vec![1.0; hours]);

        let cut = cut_leap_days(&series);
        assert_eq!(cut.len(), hours - 24);
        assert_eq!(cut.slice_year(2020).len(), HOURS_PER_YEAR);
        assert_eq!(cut.slice_year(2019).len(), 24);
        assert_eq!(cut.slice_year(2021).len(), 24);
        assert!(!cut
            .timestamps()
            .contains(&(start + Duration::days(366) - Duration::hours(1))));
    }
}
