use anyhow::Result;
use chrono::NaiveDateTime;
use eval_core::config::LabelConfig;
use eval_core::investment::PivotTable;
use eval_core::market::MeritOrder;
use eval_core::HourlySeries;
use indicatif::{ProgressBar, ProgressStyle};
use plotters::prelude::*;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

const HOURS_PER_WEEK: usize = 168;
const WEEKS_PER_YEAR: usize = 52;

/// Line colours of compared series, historical first.
const SERIES_COLORS: [RGBColor; 4] = [BLUE, RED, GREEN, MAGENTA];

pub struct ChartRenderer {
    plot_dir: PathBuf,
    labels: LabelConfig,
}

impl ChartRenderer {
    pub fn new(plot_dir: &Path, labels: &LabelConfig) -> Result<Self> {
        std::fs::create_dir_all(plot_dir)?;

        Ok(Self {
            plot_dir: plot_dir.to_path_buf(),
            labels: labels.clone(),
        })
    }

    pub fn plot_dir(&self) -> &Path {
        &self.plot_dir
    }

    fn category_color(&self, key: &str, index: usize) -> RGBColor {
        match self.labels.rgb(key) {
            Some((r, g, b)) => RGBColor(r, g, b),
            None => {
                let fallback = Palette99::pick(index).to_rgba();
                RGBColor(fallback.0, fallback.1, fallback.2)
            }
        }
    }

    /// Time series chart of one or more aligned series.
    pub fn line_chart(
        &self,
        file_name: &str,
        title: &str,
        y_desc: &str,
        series: &[&HourlySeries],
        y_limits: Option<(f64, f64)>,
    ) -> Result<PathBuf> {
        let output_path = self.plot_dir.join(format!("{}.png", file_name));
        draw_lines(&output_path, title, y_desc, series, y_limits)?;
        Ok(output_path)
    }

    /// 52 weekly excerpts of a year, rendered in parallel.
    ///
    /// Each excerpt spans 169 hours so consecutive weeks share their
    /// boundary hour.
    pub fn weekly_plots(
        &self,
        file_prefix: &str,
        year: i32,
        series: &[&HourlySeries],
        y_limits: (f64, f64),
    ) -> Result<usize> {
        println!("\n📈 Rendering weekly plots for {}...", year);

        let pb = ProgressBar::new(WEEKS_PER_YEAR as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")?,
        );

        let title_prefix = if series.len() > 1 {
            format!("Power price time series comparison for {}", year)
        } else {
            format!("Power price pattern for {}", year)
        };

        let results: Vec<Result<()>> = (0..WEEKS_PER_YEAR)
            .into_par_iter()
            .map(|week| {
                let excerpts: Vec<HourlySeries> = series
                    .iter()
                    .map(|s| s.window(week * HOURS_PER_WEEK, HOURS_PER_WEEK + 1))
                    .collect();
                let refs: Vec<&HourlySeries> = excerpts.iter().collect();

                let output_path = self
                    .plot_dir
                    .join(format!("{}_{}_week_{}.png", file_prefix, year, week + 1));
                let title = format!("{}; week: {}", title_prefix, week + 1);
                let result = draw_lines(&output_path, &title, "power price in €/MWh", &refs, Some(y_limits));
                pb.inc(1);
                result
            })
            .collect();

        pb.finish_with_message("done");
        for result in results {
            result?;
        }

        Ok(WEEKS_PER_YEAR)
    }

    /// Values of each series sorted from highest to lowest.
    pub fn duration_curve(
        &self,
        file_name: &str,
        series: &[&HourlySeries],
        y_limits: Option<(f64, f64)>,
    ) -> Result<PathBuf> {
        let output_path = self.plot_dir.join(format!("{}.png", file_name));
        let curves: Vec<(String, Vec<f64>)> = series
            .iter()
            .map(|s| (s.name().to_string(), s.sorted_descending()))
            .collect();
        draw_duration_curves(&output_path, &curves, y_limits)?;
        Ok(output_path)
    }

    /// Histogram of the negative values of each series on shared bins.
    pub fn negative_histogram(&self, file_name: &str, series: &[&HourlySeries], bins: usize) -> Result<PathBuf> {
        let output_path = self.plot_dir.join(format!("{}.png", file_name));
        let negatives: Vec<(String, Vec<f64>)> = series
            .iter()
            .map(|s| {
                let values = s.values().iter().copied().filter(|v| *v < 0.0).collect();
                (s.name().to_string(), values)
            })
            .collect();
        let title = if series.len() > 1 {
            "Comparison of negative price distribution"
        } else {
            "Negative price distribution"
        };
        draw_histogram(&output_path, title, &negatives, bins.max(1))?;
        Ok(output_path)
    }

    /// Stacked bars of a category x year matrix; negative values stack downwards.
    pub fn stacked_bar(&self, file_name: &str, title: &str, y_desc: &str, pivot: &PivotTable) -> Result<PathBuf> {
        let output_path = self.plot_dir.join(format!("{}.png", file_name));
        self.draw_stacked_bar(&output_path, title, y_desc, pivot)?;
        Ok(output_path)
    }

    fn draw_stacked_bar(&self, output_path: &Path, title: &str, y_desc: &str, pivot: &PivotTable) -> Result<()> {
        let years = pivot.years.len();

        let mut positive = vec![0.0; years];
        let mut negative = vec![0.0; years];
        let mut bars = Vec::new();
        for (i, category) in pivot.categories.iter().enumerate() {
            let color = self.category_color(category, i);
            for (y, value) in pivot.values[i].iter().enumerate() {
                let stack = if *value >= 0.0 { &mut positive } else { &mut negative };
                let bottom = stack[y];
                stack[y] += value;
                bars.push((y, bottom, stack[y], color));
            }
        }

        let y_max = positive.iter().copied().fold(0.0, f64::max) * 1.1;
        let y_min = negative.iter().copied().fold(0.0, f64::min) * 1.1;
        let y_max = if y_max <= y_min { y_min + 1.0 } else { y_max };

        let root = BitMapBackend::new(output_path, (1200, 600)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 30).into_font())
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(90)
            .build_cartesian_2d(-0.5f64..(years as f64 - 0.5), y_min..y_max)?;

        let year_labels = pivot.years.clone();
        chart
            .configure_mesh()
            .x_desc("year")
            .y_desc(y_desc)
            .x_labels(years)
            .x_label_formatter(&|x| {
                let idx = x.round();
                if idx >= 0.0 && (idx - x).abs() < 1e-6 {
                    year_labels.get(idx as usize).map(|y| y.to_string()).unwrap_or_default()
                } else {
                    String::new()
                }
            })
            .draw()?;

        chart.draw_series(bars.iter().map(|(y, bottom, top, color)| {
            let x = *y as f64;
            Rectangle::new([(x - 0.35, *bottom), (x + 0.35, *top)], color.filled())
        }))?;

        for (i, category) in pivot.categories.iter().enumerate() {
            let color = self.category_color(category, i);
            let label = self.labels.display_name(category).to_string();
            chart
                .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())?
                .label(label)
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }

    /// Stacked area chart of a dispatch excerpt. Positive values stack
    /// upwards from zero, negative ones (charging, exports) downwards.
    pub fn stacked_area(
        &self,
        file_name: &str,
        title: &str,
        timestamps: &[NaiveDateTime],
        columns: &[(String, Vec<f64>)],
    ) -> Result<PathBuf> {
        let output_path = self.plot_dir.join(format!("{}.png", file_name));
        self.draw_stacked_area(&output_path, title, timestamps, columns)?;
        Ok(output_path)
    }

    fn draw_stacked_area(
        &self,
        output_path: &Path,
        title: &str,
        timestamps: &[NaiveDateTime],
        columns: &[(String, Vec<f64>)],
    ) -> Result<()> {
        let hours = timestamps.len();
        let layers = stack_layers(columns, hours);
        let (y_min, y_max) = stack_range(&layers);

        let root = BitMapBackend::new(output_path, (1500, 1000)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 30).into_font())
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(0f64..(hours.max(2) - 1) as f64, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_desc("Time")
            .y_desc("Energy [MWh/h]")
            .x_label_formatter(&|x| time_label(timestamps, *x))
            .draw()?;

        for (label, color, outline) in self.layer_polygons(&layers) {
            chart
                .draw_series(std::iter::once(Polygon::new(outline, color.mix(0.8).filled())))?
                .label(label)
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }

    /// Dispatch excerpt as stacked areas with the power price on a
    /// secondary axis.
    pub fn dispatch_with_price(
        &self,
        file_name: &str,
        title: &str,
        timestamps: &[NaiveDateTime],
        columns: &[(String, Vec<f64>)],
        prices: &[f64],
    ) -> Result<PathBuf> {
        let output_path = self.plot_dir.join(format!("{}.png", file_name));
        self.draw_dispatch_with_price(&output_path, title, timestamps, columns, prices)?;
        Ok(output_path)
    }

    fn draw_dispatch_with_price(
        &self,
        output_path: &Path,
        title: &str,
        timestamps: &[NaiveDateTime],
        columns: &[(String, Vec<f64>)],
        prices: &[f64],
    ) -> Result<()> {
        let hours = timestamps.len();
        let x_range = 0f64..(hours.max(2) - 1) as f64;
        let layers = stack_layers(columns, hours);
        let (y_min, y_max) = stack_range(&layers);
        let (price_min, price_max) = value_range(prices.iter().copied());

        let root = BitMapBackend::new(output_path, (1500, 1000)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 30).into_font())
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .right_y_label_area_size(80)
            .build_cartesian_2d(x_range.clone(), y_min..y_max)?
            .set_secondary_coord(x_range, price_min..price_max);

        chart
            .configure_mesh()
            .x_desc("Time")
            .y_desc("Energy [MWh/h]")
            .x_label_formatter(&|x| time_label(timestamps, *x))
            .draw()?;
        chart.configure_secondary_axes().y_desc("Power price [€/MWh]").draw()?;

        for (label, color, outline) in self.layer_polygons(&layers) {
            chart
                .draw_series(std::iter::once(Polygon::new(outline, color.mix(0.5).filled())))?
                .label(label)
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        chart
            .draw_secondary_series(LineSeries::new(
                prices.iter().take(hours).enumerate().map(|(h, v)| (h as f64, *v)),
                BLACK.stroke_width(3),
            ))?
            .label(self.labels.display_name("power_prices").to_string())
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], BLACK.stroke_width(3)));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }

    /// Merit order as a step chart: each unit is a block as wide as its
    /// capacity and as high as its marginal cost, coloured by fuel.
    pub fn merit_order(&self, file_name: &str, merit_order: &MeritOrder, y_limits: Option<(f64, f64)>) -> Result<PathBuf> {
        let output_path = self.plot_dir.join(format!("{}.png", file_name));
        self.draw_merit_order(&output_path, merit_order, y_limits)?;
        Ok(output_path)
    }

    fn draw_merit_order(&self, output_path: &Path, merit_order: &MeritOrder, y_limits: Option<(f64, f64)>) -> Result<()> {
        let fuels = merit_order.fuels();
        let color_of = |fuel: &str| {
            let index = fuels.iter().position(|f| *f == fuel).unwrap_or(0);
            self.category_color(fuel, index)
        };

        let total = merit_order.total_capacity();
        let pad = (total * 0.02).max(1.0);
        let (y_min, y_max) = y_limits.unwrap_or_else(|| {
            value_range(
                merit_order
                    .steps()
                    .iter()
                    .map(|s| s.marginal_cost)
                    .chain(std::iter::once(0.0)),
            )
        });

        let root = BitMapBackend::new(output_path, (1200, 500)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Merit order", ("sans-serif", 30).into_font())
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(-pad..(total + pad), y_min..y_max)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc("Cumulated power [MW]")
            .y_desc("marginal costs resp. opportunity costs [€/MWh]")
            .x_label_formatter(&|x| format!("{:.0}", x))
            .draw()?;

        chart.draw_series(merit_order.steps().iter().map(|step| {
            let top = step.marginal_cost.clamp(y_min, y_max);
            let base = 0.0_f64.clamp(y_min, y_max);
            Rectangle::new(
                [(step.capacity_start, base), (step.capacity_cumulated, top)],
                color_of(step.fuel.as_str()).filled(),
            )
        }))?;

        for fuel in &fuels {
            let color = color_of(*fuel);
            chart
                .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())?
                .label(self.labels.display_name(*fuel).to_string())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }

    /// Legend label, colour and closed outline of each stacked layer.
    fn layer_polygons(&self, layers: &[Layer<'_>]) -> Vec<(String, RGBColor, Vec<(f64, f64)>)> {
        layers
            .iter()
            .enumerate()
            .map(|(i, layer)| {
                let outline = layer
                    .top
                    .iter()
                    .enumerate()
                    .map(|(h, v)| (h as f64, *v))
                    .chain(layer.base.iter().enumerate().rev().map(|(h, v)| (h as f64, *v)))
                    .collect();
                (
                    self.labels.display_name(layer.name).to_string(),
                    self.category_color(layer.name, i),
                    outline,
                )
            })
            .collect()
    }
}

/// One band of a stacked area chart, between `base` and `top` in every hour.
#[derive(Debug, PartialEq)]
struct Layer<'a> {
    name: &'a str,
    base: Vec<f64>,
    top: Vec<f64>,
}

/// Stack columns hour by hour: positive values on the positive running
/// total, negative values on the negative one.
fn stack_layers(columns: &[(String, Vec<f64>)], hours: usize) -> Vec<Layer<'_>> {
    let mut positive = vec![0.0; hours];
    let mut negative = vec![0.0; hours];

    columns
        .iter()
        .map(|(name, values)| {
            let mut base = Vec::with_capacity(hours);
            let mut top = Vec::with_capacity(hours);
            for h in 0..hours {
                let value = values.get(h).copied().unwrap_or(0.0);
                let stack = if value >= 0.0 { &mut positive[h] } else { &mut negative[h] };
                base.push(*stack);
                *stack += value;
                top.push(*stack);
            }
            Layer { name, base, top }
        })
        .collect()
}

/// Padded y range covering every layer and the zero line.
fn stack_range(layers: &[Layer<'_>]) -> (f64, f64) {
    let (lo, hi) = layers
        .iter()
        .flat_map(|layer| layer.top.iter().copied())
        .fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if hi - lo < 1.0 {
        return (lo * 1.05, lo * 1.05 + 1.0);
    }
    (lo * 1.05, hi * 1.05)
}

fn draw_duration_curves(output_path: &Path, curves: &[(String, Vec<f64>)], y_limits: Option<(f64, f64)>) -> Result<()> {
    let root = BitMapBackend::new(output_path, (1600, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let hours = curves.iter().map(|(_, c)| c.len()).max().unwrap_or(0).max(1);
    let (y_min, y_max) = y_limits.unwrap_or_else(|| value_range(curves.iter().flat_map(|(_, c)| c.iter().copied())));

    let mut chart = ChartBuilder::on(&root)
        .caption("Power price duration curve comparison", ("sans-serif", 30).into_font())
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..hours as f64, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("hours")
        .y_desc("power price in €/MWh")
        .draw()?;

    for (i, (name, curve)) in curves.iter().enumerate() {
        let color = SERIES_COLORS[i % SERIES_COLORS.len()];
        chart
            .draw_series(LineSeries::new(
                curve.iter().enumerate().map(|(h, v)| (h as f64, v.clamp(y_min, y_max))),
                &color,
            ))?
            .label(name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn draw_histogram(output_path: &Path, title: &str, negatives: &[(String, Vec<f64>)], bins: usize) -> Result<()> {
    let lowest = negatives
        .iter()
        .flat_map(|(_, v)| v.iter().copied())
        .fold(0.0_f64, f64::min);

    let root = BitMapBackend::new(output_path, (1000, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    if lowest >= 0.0 {
        root.titled(&format!("{} (no negative prices)", title), ("sans-serif", 30))?;
        root.present()?;
        return Ok(());
    }

    let width = -lowest / bins as f64;
    let counts: Vec<Vec<usize>> = negatives
        .iter()
        .map(|(_, values)| {
            let mut counts = vec![0usize; bins];
            for v in values {
                let bin = (((v - lowest) / width) as usize).min(bins - 1);
                counts[bin] += 1;
            }
            counts
        })
        .collect();
    let max_count = counts.iter().flatten().copied().max().unwrap_or(0).max(1);

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30).into_font())
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(lowest..0.0, 0f64..(max_count as f64 * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("power price")
        .y_desc("Frequency")
        .draw()?;

    for (i, ((name, _), counts)) in negatives.iter().zip(&counts).enumerate() {
        let color = SERIES_COLORS[i % SERIES_COLORS.len()];
        chart
            .draw_series(counts.iter().enumerate().map(|(bin, count)| {
                let left = lowest + bin as f64 * width;
                Rectangle::new([(left, 0.0), (left + width, *count as f64)], color.mix(0.3).filled())
            }))?
            .label(name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.mix(0.3).filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn draw_lines(
    output_path: &Path,
    title: &str,
    y_desc: &str,
    series: &[&HourlySeries],
    y_limits: Option<(f64, f64)>,
) -> Result<()> {
    let root = BitMapBackend::new(output_path, (1600, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let timestamps = series.first().map(|s| s.timestamps()).unwrap_or(&[]);
    let hours = series.iter().map(|s| s.len()).max().unwrap_or(0).max(2);
    let (y_min, y_max) =
        y_limits.unwrap_or_else(|| value_range(series.iter().flat_map(|s| s.values().iter().copied())));

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30).into_font())
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..(hours - 1) as f64, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("time")
        .y_desc(y_desc)
        .x_label_formatter(&|x| time_label(timestamps, *x))
        .draw()?;

    for (i, s) in series.iter().enumerate() {
        let color = SERIES_COLORS[i % SERIES_COLORS.len()];
        chart
            .draw_series(LineSeries::new(
                s.values()
                    .iter()
                    .enumerate()
                    .map(|(h, v)| (h as f64, v.clamp(y_min, y_max))),
                &color,
            ))?
            .label(s.name())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], color));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn time_label(timestamps: &[NaiveDateTime], x: f64) -> String {
    timestamps
        .get(x.round().max(0.0) as usize)
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Padded (min, max) of finite values; a flat or empty input gets a unit span.
fn value_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(0.5);
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn test_value_range_pads_flat_series() {
        assert_eq!(value_range([5.0, 5.0].into_iter()), (4.5, 5.5));
        assert_eq!(value_range(std::iter::empty()), (0.0, 1.0));
        let (lo, hi) = value_range([-10.0, f64::NAN, 90.0].into_iter());
        assert_eq!((lo, hi), (-15.0, 95.0));
    }

    #[test]
    fn test_time_label_uses_index() {
        let start = NaiveDate::from_ymd_opt(2019, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let stamps = vec![start, start + chrono::Duration::hours(1)];
        assert_eq!(time_label(&stamps, 0.9), "2019-03-01 01:00");
        assert_eq!(time_label(&stamps, 7.0), "");
    }

    #[test]
    fn test_stack_layers_keep_signs_apart() {
        let columns = vec![
            ("natgas".to_string(), vec![1.0, -2.0]),
            ("storage".to_string(), vec![-1.0, 3.0]),
            ("import".to_string(), vec![2.0, -1.0]),
        ];
        let layers = stack_layers(&columns, 2);

        assert_eq!((layers[0].base.clone(), layers[0].top.clone()), (vec![0.0, 0.0], vec![1.0, -2.0]));
        assert_eq!((layers[1].base.clone(), layers[1].top.clone()), (vec![0.0, 0.0], vec![-1.0, 3.0]));
        assert_eq!((layers[2].base.clone(), layers[2].top.clone()), (vec![1.0, -2.0], vec![3.0, -3.0]));

        let (lo, hi) = stack_range(&layers);
        assert!((lo + 3.15).abs() < 1e-9);
        assert!((hi - 3.15).abs() < 1e-9);
    }

    #[test]
    fn test_stack_layers_pad_short_columns() {
        let columns = vec![("solarPV".to_string(), vec![4.0])];
        let layers = stack_layers(&columns, 3);

        assert_eq!(layers[0].top, vec![4.0, 0.0, 0.0]);
        assert_eq!(stack_range(&[]), (0.0, 1.0));
    }

    #[test]
    fn test_renderer_creates_plot_dir() {
        let dir = TempDir::new().unwrap();
        let plot_dir = dir.path().join("plots");
        let renderer = ChartRenderer::new(&plot_dir, &LabelConfig::default()).unwrap();

        assert!(plot_dir.is_dir());
        assert_eq!(renderer.category_color("natgas", 0), RGBColor(0xff, 0xd9, 0x66));
    }
}
