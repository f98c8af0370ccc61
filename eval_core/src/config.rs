//! TOML-based analysis configuration.
//!
//! Every constant the evaluation routines depend on (paths, price cap,
//! tolerances, the flow vocabulary, colour maps and label translations)
//! lives here and is passed into the functions that need it. Missing
//! sections fall back to the defaults below.

use crate::error::{EvalError, EvalResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub prices: PriceConfig,
    #[serde(default)]
    pub spreads: SpreadConfig,
    #[serde(default)]
    pub balance: BalanceConfig,
    #[serde(default)]
    pub demand_response: DemandResponseConfig,
    #[serde(default)]
    pub vocabulary: FlowVocabulary,
    #[serde(default)]
    pub labels: LabelConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub plot_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Field delimiter of written CSV files.
    pub csv_delimiter: char,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data"),
            plot_dir: PathBuf::from("plots"),
            output_dir: PathBuf::from("data_out"),
            csv_delimiter: ';',
        }
    }
}

impl PathsConfig {
    pub fn delimiter_byte(&self) -> u8 {
        // Only ASCII delimiters survive `validate`.
        self.csv_delimiter as u8
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriceConfig {
    /// Administrative price cap in €/MWh; hours at the cap count as scarcity.
    pub price_cap: f64,
    /// Y axis limits of price plots.
    pub plot_limits: (f64, f64),
    pub histogram_bins: usize,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            price_cap: 3000.0,
            plot_limits: (-100.0, 200.0),
            histogram_bins: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpreadConfig {
    pub windows: Vec<usize>,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            windows: vec![1, 2, 4, 8, 12, 24],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BalanceConfig {
    /// Residual (MWh) below `-tolerance` marks an hour as unbalanced.
    pub tolerance: f64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self { tolerance: 1e-3 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemandResponseConfig {
    pub relative_tolerance: f64,
    pub absolute_tolerance: f64,
}

impl Default for DemandResponseConfig {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-4,
            absolute_tolerance: 1e-6,
        }
    }
}

/// Labels used by the dispatch model to name nodes and components.
///
/// Column identifiers are classified against these lists only; anything
/// outside them is rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowVocabulary {
    /// Electricity bus all flows are balanced at.
    pub bus: String,
    /// Prefix of the modelled market area, e.g. `DE`.
    pub market_area: String,
    pub countries: Vec<String>,
    pub fuels: Vec<String>,
    pub renewables: Vec<String>,
    pub storages: Vec<String>,
    /// Sinks counted as demand. A label also matches components named
    /// `<label>_<suffix>`, e.g. demand response clusters.
    pub demand_labels: Vec<String>,
    pub shortage_label: String,
    pub excess_label: String,
    /// Infix of interconnector components, e.g. `DE_link_AT`.
    pub link_infix: String,
    pub storage_prefix: String,
    pub transformer_prefix: String,
    pub source_prefix: String,
}

impl Default for FlowVocabulary {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();

        Self {
            bus: "DE_bus_el".to_string(),
            market_area: "DE".to_string(),
            countries: strings(&[
                "AT", "BE", "CH", "CZ", "DK1", "DK2", "FR", "IT", "NL", "NO2", "PL", "SE4",
            ]),
            fuels: strings(&[
                "biomass",
                "uranium",
                "lignite",
                "hardcoal",
                "natgas",
                "hydrogen",
                "mixedfuels",
                "otherfossil",
                "waste",
                "oil",
            ]),
            renewables: strings(&[
                "solarPV",
                "windonshore",
                "windoffshore",
                "biomassEEG",
                "ROR",
                "landfillgas",
                "geothermal",
                "minegas",
                "larga",
            ]),
            storages: strings(&["PHS", "battery"]),
            demand_labels: strings(&[
                "DE_sink_el_load",
                "DE_sink_el_ind",
                "DE_sink_el_hoho",
                "DE_sink_el_tcs",
                "DE_transformer_hydrogen_electrolyzer",
            ]),
            shortage_label: "DE_source_el_shortage".to_string(),
            excess_label: "DE_sink_el_excess".to_string(),
            link_infix: "_link_".to_string(),
            storage_prefix: "DE_storage_el_".to_string(),
            transformer_prefix: "DE_transformer_".to_string(),
            source_prefix: "DE_source_".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Language {
    English,
    German,
}

/// Colour maps and translated display names for plots.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabelConfig {
    pub language: Language,
    /// Hex colour per category key, e.g. `natgas = "#ffd966"`.
    pub colors: BTreeMap<String, String>,
    pub english: BTreeMap<String, String>,
    pub german: BTreeMap<String, String>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        let map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>()
        };

        Self {
            language: Language::English,
            colors: map(&[
                ("biomass", "#15b01a"),
                ("uranium", "#e50000"),
                ("lignite", "#7f2b0a"),
                ("hardcoal", "#000000"),
                ("natgas", "#ffd966"),
                ("hydrogen", "#6fa8dc"),
                ("mixedfuels", "#a57e52"),
                ("otherfossil", "#d8dcd6"),
                ("waste", "#c04e01"),
                ("oil", "#aaa662"),
                ("solarPV", "#fcb001"),
                ("windonshore", "#82cafc"),
                ("windoffshore", "#0504aa"),
                ("biomassEEG", "#15b01a"),
                ("ROR", "#c79fef"),
                ("other RES", "#757575"),
                ("PHS", "#0c2aac"),
                ("battery", "#f7e09a"),
            ]),
            english: map(&[
                ("biomass", "biomass"),
                ("uranium", "uranium"),
                ("lignite", "lignite"),
                ("hardcoal", "hard coal"),
                ("natgas", "natural gas"),
                ("hydrogen", "hydrogen"),
                ("mixedfuels", "mixed conventionals"),
                ("otherfossil", "other conventionals"),
                ("waste", "waste"),
                ("oil", "oil"),
                ("solarPV", "solar PV"),
                ("windonshore", "wind onshore"),
                ("windoffshore", "wind offshore"),
                ("ROR", "run of river"),
                ("PHS", "pumped hydro"),
                ("battery", "battery"),
                ("power_prices", "power price"),
            ]),
            german: map(&[
                ("biomass", "Biomasse"),
                ("uranium", "Kernenergie"),
                ("lignite", "Braunkohle"),
                ("hardcoal", "Steinkohle"),
                ("natgas", "Erdgas"),
                ("hydrogen", "Wasserstoff"),
                ("mixedfuels", "gemischte Brennstoffe"),
                ("otherfossil", "sonstige Konventionelle"),
                ("waste", "Abfall"),
                ("oil", "Erdöl"),
                ("solarPV", "Solarenergie"),
                ("windonshore", "Wind onshore"),
                ("windoffshore", "Wind offshore"),
                ("ROR", "Laufwasser"),
                ("PHS", "Pumpspeicher"),
                ("battery", "Batterien"),
                ("power_prices", "Strompreis"),
            ]),
        }
    }
}

impl LabelConfig {
    /// Display name in the configured language, falling back to the key.
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        let names = match self.language {
            Language::English => &self.english,
            Language::German => &self.german,
        };
        names.get(key).map(String::as_str).unwrap_or(key)
    }

    /// RGB colour of a category, parsed from its `#rrggbb` entry.
    pub fn rgb(&self, key: &str) -> Option<(u8, u8, u8)> {
        let hex = self.colors.get(key)?.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some((channel(0)?, channel(2)?, channel(4)?))
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            prices: PriceConfig::default(),
            spreads: SpreadConfig::default(),
            balance: BalanceConfig::default(),
            demand_response: DemandResponseConfig::default(),
            vocabulary: FlowVocabulary::default(),
            labels: LabelConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_file(path: &Path) -> EvalResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> EvalResult<Self> {
        let config: AnalysisConfig =
            toml::from_str(s).map_err(|e| EvalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EvalResult<()> {
        if !self.paths.csv_delimiter.is_ascii() {
            return Err(EvalError::Config(format!(
                "csv_delimiter must be an ASCII character, got '{}'",
                self.paths.csv_delimiter
            )));
        }
        if self.spreads.windows.is_empty() || self.spreads.windows.contains(&0) {
            return Err(EvalError::Config(
                "spread windows must be non-empty and positive".to_string(),
            ));
        }
        if self.balance.tolerance < 0.0 {
            return Err(EvalError::Config("balance tolerance must be >= 0".to_string()));
        }
        if self.demand_response.relative_tolerance < 0.0
            || self.demand_response.absolute_tolerance < 0.0
        {
            return Err(EvalError::Config(
                "demand response tolerances must be >= 0".to_string(),
            ));
        }
        if self.prices.histogram_bins == 0 {
            return Err(EvalError::Config("histogram_bins must be > 0".to_string()));
        }
        Ok(())
    }
}
