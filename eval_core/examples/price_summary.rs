use chrono::NaiveDate;
use eval_core::{error_metrics, HourlySeries, SpreadAnalyzer, StatsCalculator};

fn main() {
    let start = NaiveDate::from_ymd_opt(2019, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    // One day of historical prices and a model run that flattens the peaks
    let historical = vec![
        35.0, 32.5, 30.1, 28.7, 29.9, 33.4, 41.2, 52.8, 58.0, 55.3, 49.9, 47.0,
        44.6, 42.1, 43.8, 48.5, 56.9, 68.4, 74.2, 65.0, 54.3, 46.7, 40.2, -3.5,
    ];
    let model: Vec<f64> = historical.iter().map(|p| 0.8 * p + 9.0).collect();

    let historical = HourlySeries::from_start("historical_price", start, historical);
    let model = HourlySeries::from_start("model_price", start, model);

    let calculator = StatsCalculator::new(3000.0);
    let stats = calculator.compare(&[&historical, &model]).unwrap();

    println!("Price Validation Summary");
    println!("========================");
    for s in &stats {
        println!(
            "{:<18} mean {:>7.2}  std {:>6.2}  min {:>6.2}  max {:>6.2}  negative {}",
            s.name, s.mean, s.std, s.min, s.max, s.negative_hours
        );
    }

    let metrics = error_metrics(&historical, &model).unwrap();
    println!();
    println!("MAE:   {:.2} €/MWh", metrics.mae);
    println!("RMSE:  {:.2} €/MWh", metrics.rmse);
    println!("NRMSE: {:.3}", metrics.nrmse);

    let analyzer = SpreadAnalyzer::new(vec![1, 4, 8]);
    let rows = analyzer.analyze(&model).unwrap();
    println!();
    for (name, value) in analyzer
        .column_names()
        .iter()
        .zip(SpreadAnalyzer::row_values(&rows[0]))
    {
        println!("{:<16} {:>8.2}", name, value);
    }
}
