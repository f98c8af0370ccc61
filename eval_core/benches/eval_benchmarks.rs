use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use eval_core::{HourlySeries, SpreadAnalyzer, StatsCalculator};

fn synthetic_prices(years: usize) -> HourlySeries {
    let start = NaiveDate::from_ymd_opt(2030, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    // Daily cycle with a weekly swing and occasional negative hours
    let values = (0..years * 8760)
        .map(|h| {
            let hour = (h % 24) as f64;
            let day = ((h / 24) % 7) as f64;
            let base = 50.0 + 30.0 * (hour / 24.0 * std::f64::consts::TAU).sin() - 5.0 * day;
            if h % 97 == 0 {
                -20.0
            } else {
                base
            }
        })
        .collect();

    HourlySeries::from_start("model_price", start, values)
}

fn benchmark_describe(c: &mut Criterion) {
    let prices = synthetic_prices(1);
    let calculator = StatsCalculator::new(3000.0);

    c.bench_function("describe_one_year", |b| {
        b.iter(|| black_box(calculator.describe(&prices)))
    });
}

fn benchmark_spreads(c: &mut Criterion) {
    let prices = synthetic_prices(30);
    let analyzer = SpreadAnalyzer::new(vec![1, 2, 4, 8, 12, 24]);

    c.bench_function("spreads_thirty_years", |b| {
        b.iter(|| black_box(analyzer.analyze(&prices)))
    });
}

criterion_group!(benches, benchmark_describe, benchmark_spreads);
criterion_main!(benches);
