use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand, ValueEnum};
use eval_core::data_loader::parse_timestamp;
use eval_core::{Aggregation, AnalysisConfig, CsvDialect, DataLoader, HistoricalFormat, Resolution};
use log::info;
use std::path::{Path, PathBuf};

mod cost_processor;
mod demand_response_processor;
mod flow_balance_processor;
mod historical_processor;
mod investment_processor;
mod market_processor;
mod output;
mod price_validation;
mod sanity_check;
mod spread_processor;
mod visualization;

use flow_balance_processor::Excerpt;
use investment_processor::InvestmentRequest;
use price_validation::{discover_historical_files, PriceValidationRequest};

#[derive(Parser)]
#[command(name = "market_model_eval")]
#[command(about = "Evaluate dispatch and investment model results against historical market data")]
struct Cli {
    /// Analysis configuration (TOML); built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Input files use `;` and a decimal comma
    #[arg(long, global = true)]
    semicolon: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare historical and model day-ahead prices of one year
    PriceValidation {
        #[arg(short, long)]
        year: i32,
        /// Historical files; discovered in the input directory by year when omitted
        #[arg(long, num_args = 1..)]
        historical: Vec<PathBuf>,
        #[arg(long, value_enum, default_value = "auction-csv")]
        format: FormatArg,
        /// Price column of the consolidated export
        #[arg(long)]
        price_column: Option<String>,
        #[arg(short, long)]
        model: PathBuf,
        #[arg(long)]
        model_column: Option<String>,
        /// Render the 52 weekly comparison plots
        #[arg(long)]
        weekly: bool,
    },
    /// Yearly price spreads and statistics of a price series
    Spreads {
        prices: PathBuf,
        #[arg(long)]
        column: Option<String>,
    },
    /// Group dispatch flows into categories and check the bus balance
    FlowBalance {
        results: PathBuf,
        /// First hour of a stacked area excerpt, e.g. "2030-01-15 00:00:00"
        #[arg(long)]
        excerpt_start: Option<String>,
        #[arg(long, default_value_t = 168)]
        excerpt_hours: usize,
        /// Model prices drawn over the excerpt on a secondary axis
        #[arg(long, requires = "excerpt_start")]
        prices: Option<PathBuf>,
        #[arg(long, requires = "prices")]
        price_column: Option<String>,
    },
    /// Historical generation and cross-border exchange of one year
    Historical {
        #[arg(short, long)]
        year: i32,
        #[arg(long)]
        generation: Option<PathBuf>,
        #[arg(long)]
        exchange: Option<PathBuf>,
    },
    /// Merit order of the dispatchable units as a step chart
    MeritOrder {
        /// Unit table with the columns unit, fuel, capacity, costs_marginal
        blocks: PathBuf,
        /// Lower and upper marginal cost shown
        #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
        y_limits: Vec<f64>,
    },
    /// Spread monthly market values over the hours of a year
    MarketValues {
        file: PathBuf,
        #[arg(short, long)]
        year: i32,
    },
    /// Demand response shift and shed volumes with balance check
    DemandResponse { results: PathBuf },
    /// Pivot and plot investment model results
    Investment {
        results: PathBuf,
        #[arg(long, default_value = "invest")]
        variable: String,
        #[arg(long, value_enum, default_value = "energy-carrier")]
        by: AggregationArg,
        /// Results are production (MWh) rather than capacities (MW)
        #[arg(long)]
        production: bool,
    },
    /// Resample fuel and emission cost trajectories
    Costs {
        file: PathBuf,
        #[arg(long, value_enum, default_value = "annual")]
        resolution: ResolutionArg,
        /// Report the values at this time, e.g. "2030-01-01 00:00:00"
        #[arg(long)]
        at: Option<String>,
    },
    /// Describe statistics of model input time series
    SanityCheck {
        folder: PathBuf,
        /// File names to skip
        #[arg(long)]
        exclude: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    AuctionCsv,
    Consolidated,
}

impl From<FormatArg> for HistoricalFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::AuctionCsv => HistoricalFormat::AuctionCsv,
            FormatArg::Consolidated => HistoricalFormat::Consolidated,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AggregationArg {
    EnergyCarrier,
    Technology,
}

impl From<AggregationArg> for Aggregation {
    fn from(arg: AggregationArg) -> Self {
        match arg {
            AggregationArg::EnergyCarrier => Aggregation::EnergyCarrier,
            AggregationArg::Technology => Aggregation::Technology,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ResolutionArg {
    Hourly,
    Annual,
}

impl From<ResolutionArg> for Resolution {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::Hourly => Resolution::Hourly,
            ResolutionArg::Annual => Resolution::Annual,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::from_toml_file(path)
            .with_context(|| format!("reading configuration {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn parse_time_arg(raw: &str) -> Result<NaiveDateTime> {
    parse_timestamp(raw).with_context(|| format!("invalid time '{}'", raw))
}

fn main() -> Result<()> {
    env_logger::init();

    // Independent charts render on all available cores
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build_global()?;

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let dialect = if cli.semicolon {
        CsvDialect::semicolon_decimal_comma()
    } else {
        CsvDialect::default()
    };
    info!("Input dialect: {:?}", dialect);

    match cli.command {
        Command::PriceValidation {
            year,
            historical,
            format,
            price_column,
            model,
            model_column,
            weekly,
        } => {
            let historical_files = if historical.is_empty() {
                discover_historical_files(&config.paths.input_dir, year)?
            } else {
                historical
            };
            let request = PriceValidationRequest {
                year,
                historical_files,
                format: format.into(),
                dialect,
                price_column,
                model_path: model,
                model_column,
                weekly_plots: weekly,
            };
            price_validation::PriceValidator::new(&config)?.run(&request)?;
        }
        Command::Spreads { prices, column } => {
            spread_processor::SpreadProcessor::new(&config)?.process(&prices, column.as_deref(), dialect)?;
        }
        Command::FlowBalance {
            results,
            excerpt_start,
            excerpt_hours,
            prices,
            price_column,
        } => {
            let excerpt = excerpt_start
                .as_deref()
                .map(|raw| {
                    parse_time_arg(raw).map(|start| Excerpt {
                        start,
                        hours: excerpt_hours,
                    })
                })
                .transpose()?;
            let prices = prices
                .map(|path| {
                    DataLoader::new(dialect)
                        .load_model_prices(&path, price_column.as_deref())
                        .with_context(|| format!("loading prices from {}", path.display()))
                })
                .transpose()?;
            flow_balance_processor::FlowBalanceProcessor::new(&config)?.process(
                &results,
                dialect,
                excerpt.as_ref(),
                prices.as_ref(),
            )?;
        }
        Command::Historical {
            year,
            generation,
            exchange,
        } => {
            if generation.is_none() && exchange.is_none() {
                anyhow::bail!("Nothing to do: pass --generation and/or --exchange");
            }
            let processor = historical_processor::HistoricalProcessor::new(&config, dialect)?;
            if let Some(path) = generation {
                processor.process_generation(&path, year)?;
            }
            if let Some(path) = exchange {
                processor.process_exchange(&path, year)?;
            }
        }
        Command::MeritOrder { blocks, y_limits } => {
            let y_limits = match y_limits.as_slice() {
                [low, high] => Some((*low, *high)),
                _ => None,
            };
            market_processor::MarketProcessor::new(&config)?.merit_order(&blocks, dialect, y_limits)?;
        }
        Command::MarketValues { file, year } => {
            market_processor::MarketProcessor::new(&config)?.market_values(&file, dialect, year)?;
        }
        Command::DemandResponse { results } => {
            demand_response_processor::DemandResponseProcessor::new(&config)?.process(&results, dialect)?;
        }
        Command::Investment {
            results,
            variable,
            by,
            production,
        } => {
            let request = InvestmentRequest {
                results_path: &results,
                variable: &variable,
                by: by.into(),
                delimiter: dialect.delimiter,
                production,
            };
            investment_processor::InvestmentProcessor::new(&config)?.process(&request)?;
        }
        Command::Costs { file, resolution, at } => {
            let at = at.as_deref().map(parse_time_arg).transpose()?;
            cost_processor::CostProcessor::new(&config)?.process(
                &file,
                dialect.delimiter,
                resolution.into(),
                at,
            )?;
        }
        Command::SanityCheck { folder, exclude } => {
            sanity_check::SanityChecker::new(&config)?.check_folder(&folder, &exclude, dialect)?;
        }
    }

    println!("\n✨ Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommand() {
        let cli = Cli::try_parse_from([
            "market_model_eval",
            "--semicolon",
            "investment",
            "results.csv",
            "--by",
            "technology",
        ])
        .unwrap();

        assert!(cli.semicolon);
        match cli.command {
            Command::Investment { variable, by, .. } => {
                assert_eq!(variable, "invest");
                assert!(matches!(Aggregation::from(by), Aggregation::Technology));
            }
            _ => panic!("expected investment subcommand"),
        }
    }

    #[test]
    fn test_parse_merit_order_limits() {
        let cli = Cli::try_parse_from(["market_model_eval", "merit-order", "units.csv", "--y-limits", "-100", "200"])
            .unwrap();

        match cli.command {
            Command::MeritOrder { y_limits, .. } => assert_eq!(y_limits, vec![-100.0, 200.0]),
            _ => panic!("expected merit-order subcommand"),
        }
    }

    #[test]
    fn test_missing_config_file() {
        assert!(load_config(Some(Path::new("/nonexistent/eval.toml"))).is_err());
        assert_eq!(load_config(None).unwrap().prices.price_cap, 3000.0);
    }
}
