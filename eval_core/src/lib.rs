pub mod alignment;
pub mod calculator;
pub mod config;
pub mod costs;
pub mod data_loader;
pub mod demand_response;
pub mod error;
pub mod flows;
pub mod investment;
pub mod market;
pub mod models;
pub mod spreads;

pub use calculator::{error_metrics, StatsCalculator};
pub use config::AnalysisConfig;
pub use costs::{CostTrajectories, Resolution};
pub use data_loader::{CsvDialect, DataLoader, HistoricalFormat};
pub use demand_response::{DemandResponseAccounting, DrOperation};
pub use error::{EvalError, EvalResult};
pub use flows::{FlowBalance, FlowCategory, FlowClassifier};
pub use investment::{Aggregation, InvestmentInspector};
pub use market::{MeritOrder, MonthlyMarketValues};
pub use models::{ErrorMetrics, FlowTable, HourlySeries, SpreadRow, SummaryStats};
pub use spreads::SpreadAnalyzer;
