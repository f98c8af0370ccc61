use crate::config::FlowVocabulary;
use crate::demand_response::DrOperation;
use crate::error::{EvalError, EvalResult};
use crate::models::FlowTable;
use chrono::NaiveDateTime;
use log::{debug, warn};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

/// Structured identifier of a model result column.
///
/// Columns are named like `(('DE_bus_el', 'DE_link_AT'), 'flow')` or
/// `('DE_bus_el', 'DE_link_AT')`; the second form carries no kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowId {
    pub from: String,
    pub to: String,
    pub kind: Option<String>,
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "(('{}', '{}'), '{}')", self.from, self.to, kind),
            None => write!(f, "('{}', '{}')", self.from, self.to),
        }
    }
}

pub struct FlowIdParser {
    nested: Regex,
    pair: Regex,
}

impl FlowIdParser {
    pub fn new() -> EvalResult<Self> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(|e| EvalError::Config(e.to_string()));
        Ok(Self {
            nested: compile(r"^\(\s*\(\s*'([^']*)'\s*,\s*'?([^',()]*)'?\s*\)\s*,\s*'([^']*)'\s*\)$")?,
            pair: compile(r"^\(\s*'([^']*)'\s*,\s*'?([^',()]*)'?\s*\)$")?,
        })
    }

    pub fn parse(&self, raw: &str) -> EvalResult<FlowId> {
        let raw = raw.trim();
        if let Some(caps) = self.nested.captures(raw) {
            return Ok(FlowId {
                from: caps[1].to_string(),
                to: caps[2].trim().to_string(),
                kind: Some(caps[3].to_string()),
            });
        }
        if let Some(caps) = self.pair.captures(raw) {
            return Ok(FlowId {
                from: caps[1].to_string(),
                to: caps[2].trim().to_string(),
                kind: None,
            });
        }
        Err(EvalError::unrecognized(raw, "not a tuple identifier"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlowCategory {
    Import { country: String },
    Export { country: String },
    StorageCharge { unit: String },
    StorageDischarge { unit: String },
    Generation { carrier: String },
    Demand,
    Shortage,
    Excess,
    /// Demand response variable; accounted separately, not part of the balance.
    DemandResponse { cluster: String, operation: DrOperation },
}

/// Maps column identifiers onto flow categories using an explicit vocabulary.
pub struct FlowClassifier {
    vocabulary: FlowVocabulary,
    parser: FlowIdParser,
}

impl FlowClassifier {
    pub fn new(vocabulary: &FlowVocabulary) -> EvalResult<Self> {
        Ok(Self {
            vocabulary: vocabulary.clone(),
            parser: FlowIdParser::new()?,
        })
    }

    pub fn classify_column(&self, column: &str) -> EvalResult<FlowCategory> {
        let id = self.parser.parse(column)?;
        self.classify(&id)
            .map_err(|reason| EvalError::unrecognized(column, reason))
    }

    fn classify(&self, id: &FlowId) -> Result<FlowCategory, String> {
        let vocab = &self.vocabulary;

        match id.kind.as_deref() {
            None | Some("flow") => {}
            Some(kind) => {
                return DrOperation::from_kind(kind)
                    .map(|operation| FlowCategory::DemandResponse {
                        cluster: id.from.clone(),
                        operation,
                    })
                    .ok_or_else(|| format!("unknown variable kind '{}'", kind));
            }
        }

        if id.from == vocab.bus {
            let to = id.to.as_str();
            if to == vocab.excess_label {
                Ok(FlowCategory::Excess)
            } else if let Some((origin, country)) = self.split_link(to) {
                self.ensure_market_area(origin)?;
                self.country(country).map(|country| FlowCategory::Export { country })
            } else if let Some(rest) = to.strip_prefix(&vocab.storage_prefix) {
                self.storage_unit(rest).map(|unit| FlowCategory::StorageCharge { unit })
            } else if self.is_demand(to) {
                Ok(FlowCategory::Demand)
            } else {
                Err(format!("unknown sink '{}' of bus '{}'", to, vocab.bus))
            }
        } else if id.to == vocab.bus {
            let from = id.from.as_str();
            if from == vocab.shortage_label {
                Ok(FlowCategory::Shortage)
            } else if let Some((country, destination)) = self.split_link(from) {
                self.ensure_market_area(destination)?;
                self.country(country).map(|country| FlowCategory::Import { country })
            } else if let Some(rest) = from.strip_prefix(&vocab.storage_prefix) {
                self.storage_unit(rest).map(|unit| FlowCategory::StorageDischarge { unit })
            } else {
                self.carrier(from).map(|carrier| FlowCategory::Generation { carrier })
            }
        } else {
            Err(format!("flow does not touch bus '{}'", vocab.bus))
        }
    }

    fn split_link<'a>(&self, component: &'a str) -> Option<(&'a str, &'a str)> {
        component.split_once(self.vocabulary.link_infix.as_str())
    }

    fn ensure_market_area(&self, area: &str) -> Result<(), String> {
        if area == self.vocabulary.market_area {
            Ok(())
        } else {
            Err(format!("link does not connect market area '{}'", self.vocabulary.market_area))
        }
    }

    fn country(&self, code: &str) -> Result<String, String> {
        if self.vocabulary.countries.iter().any(|c| c == code) {
            Ok(code.to_string())
        } else {
            Err(format!("unknown neighbour country '{}'", code))
        }
    }

    fn storage_unit(&self, rest: &str) -> Result<String, String> {
        self.vocabulary
            .storages
            .iter()
            .find(|tech| matches_label(rest, tech))
            .cloned()
            .ok_or_else(|| format!("unknown storage technology '{}'", rest))
    }

    fn is_demand(&self, component: &str) -> bool {
        self.vocabulary
            .demand_labels
            .iter()
            .any(|label| matches_label(component, label))
    }

    /// Energy carrier of a generating component such as `DE_source_solarPV`
    /// or `DE_transformer_natgas_CC`.
    fn carrier(&self, component: &str) -> Result<String, String> {
        let vocab = &self.vocabulary;
        let market_prefix = format!("{}_", vocab.market_area);
        let rest = component
            .strip_prefix(&vocab.source_prefix)
            .or_else(|| component.strip_prefix(&vocab.transformer_prefix))
            .or_else(|| component.strip_prefix(&market_prefix))
            .ok_or_else(|| format!("unknown source '{}'", component))?;

        let known = || vocab.renewables.iter().chain(vocab.fuels.iter());
        known()
            .find(|carrier| rest == carrier.as_str())
            .or_else(|| known().find(|carrier| matches_label(rest, carrier)))
            .cloned()
            .ok_or_else(|| format!("unknown energy carrier in '{}'", component))
    }
}

/// `label` itself or `label` followed by an underscore-separated suffix.
fn matches_label(component: &str, label: &str) -> bool {
    component == label
        || component
            .strip_prefix(label)
            .is_some_and(|rest| rest.starts_with('_'))
}

/// Hourly flows of one table grouped into balance categories.
#[derive(Debug, Clone)]
pub struct FlowBalance {
    timestamps: Vec<NaiveDateTime>,
    pub generation: BTreeMap<String, Vec<f64>>,
    pub imports: BTreeMap<String, Vec<f64>>,
    pub exports: BTreeMap<String, Vec<f64>>,
    pub storage_charge: BTreeMap<String, Vec<f64>>,
    pub storage_discharge: BTreeMap<String, Vec<f64>>,
    pub demand: Vec<f64>,
    pub shortage: Vec<f64>,
    pub excess: Vec<f64>,
}

impl FlowBalance {
    /// Classify every column and sum it into its category.
    ///
    /// Any column the vocabulary cannot place aborts the aggregation.
    pub fn from_table(table: &FlowTable, classifier: &FlowClassifier) -> EvalResult<Self> {
        let hours = table.height();
        let mut balance = Self {
            timestamps: table.timestamps().to_vec(),
            generation: BTreeMap::new(),
            imports: BTreeMap::new(),
            exports: BTreeMap::new(),
            storage_charge: BTreeMap::new(),
            storage_discharge: BTreeMap::new(),
            demand: vec![0.0; hours],
            shortage: vec![0.0; hours],
            excess: vec![0.0; hours],
        };

        for (name, values) in table.columns() {
            let category = classifier.classify_column(name)?;
            debug!("{} -> {:?}", name, category);

            let target = match category {
                FlowCategory::Generation { carrier } => entry(&mut balance.generation, carrier, hours),
                FlowCategory::Import { country } => entry(&mut balance.imports, country, hours),
                FlowCategory::Export { country } => entry(&mut balance.exports, country, hours),
                FlowCategory::StorageCharge { unit } => entry(&mut balance.storage_charge, unit, hours),
                FlowCategory::StorageDischarge { unit } => entry(&mut balance.storage_discharge, unit, hours),
                FlowCategory::Demand => &mut balance.demand,
                FlowCategory::Shortage => &mut balance.shortage,
                FlowCategory::Excess => &mut balance.excess,
                FlowCategory::DemandResponse { .. } => continue,
            };
            add_assign(target, values);
        }

        Ok(balance)
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn total_generation(&self) -> Vec<f64> {
        sum_columns(self.generation.values(), self.timestamps.len())
    }

    /// Exports minus imports, per hour.
    pub fn net_export(&self) -> Vec<f64> {
        let exports = sum_columns(self.exports.values(), self.timestamps.len());
        let imports = sum_columns(self.imports.values(), self.timestamps.len());
        exports.iter().zip(&imports).map(|(e, i)| e - i).collect()
    }

    /// Net export per neighbour country over the union of import and export links.
    pub fn net_export_by_country(&self) -> BTreeMap<String, Vec<f64>> {
        let hours = self.timestamps.len();
        let mut net: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (country, values) in &self.exports {
            add_assign(entry(&mut net, country.clone(), hours), values);
        }
        for (country, values) in &self.imports {
            let target = entry(&mut net, country.clone(), hours);
            for (t, v) in target.iter_mut().zip(values) {
                *t -= v;
            }
        }
        net
    }

    /// Storage discharge minus storage charge, per hour.
    pub fn net_storage(&self) -> Vec<f64> {
        let hours = self.timestamps.len();
        let discharge = sum_columns(self.storage_discharge.values(), hours);
        let charge = sum_columns(self.storage_charge.values(), hours);
        discharge.iter().zip(&charge).map(|(d, c)| d - c).collect()
    }

    /// `generation + net storage - net export - demand`, per hour.
    pub fn residual(&self) -> Vec<f64> {
        let generation = self.total_generation();
        let storage = self.net_storage();
        let export = self.net_export();

        (0..self.timestamps.len())
            .map(|h| generation[h] + storage[h] - export[h] - self.demand[h])
            .collect()
    }

    /// Hours whose residual falls below `-tolerance`.
    pub fn unbalanced_hours(&self, tolerance: f64) -> Vec<(NaiveDateTime, f64)> {
        let flagged: Vec<(NaiveDateTime, f64)> = self
            .timestamps
            .iter()
            .copied()
            .zip(self.residual())
            .filter(|(_, residual)| *residual < -tolerance)
            .collect();

        if !flagged.is_empty() {
            warn!("{} hours with negative energy balance residual", flagged.len());
        }
        flagged
    }

    /// Category table for writing: one column per carrier, country and aggregate.
    pub fn to_table(&self) -> EvalResult<FlowTable> {
        let mut columns: Vec<(String, Vec<f64>)> = self
            .generation
            .iter()
            .map(|(carrier, values)| (carrier.clone(), values.clone()))
            .collect();
        columns.extend(
            self.net_export_by_country()
                .into_iter()
                .map(|(country, values)| (format!("net_export_{}", country), values)),
        );
        columns.push(("net_export".to_string(), self.net_export()));
        columns.push(("net_storage".to_string(), self.net_storage()));
        columns.push(("demand".to_string(), self.demand.clone()));
        columns.push(("shortage".to_string(), self.shortage.clone()));
        columns.push(("excess".to_string(), self.excess.clone()));
        columns.push(("residual".to_string(), self.residual()));

        FlowTable::new(self.timestamps.clone(), columns)
    }
}

/// Net export per country from historical exchange columns
/// `net_export_<code>_pos` (exports) and `net_export_<code>_neg` (imports,
/// reported as negative values).
pub fn net_exchange_by_country(table: &FlowTable) -> EvalResult<BTreeMap<String, Vec<f64>>> {
    let hours = table.height();
    let mut net: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for (name, values) in table.columns() {
        if name == "overall_net_export" {
            continue;
        }
        let country = name
            .strip_prefix("net_export_")
            .and_then(|rest| rest.strip_suffix("_pos").or_else(|| rest.strip_suffix("_neg")))
            .ok_or_else(|| EvalError::unrecognized(name, "not an exchange column"))?;
        add_assign(entry(&mut net, country.to_string(), hours), values);
    }

    Ok(net)
}

fn entry(map: &mut BTreeMap<String, Vec<f64>>, key: String, hours: usize) -> &mut Vec<f64> {
    map.entry(key).or_insert_with(|| vec![0.0; hours])
}

fn add_assign(target: &mut [f64], values: &[f64]) {
    for (t, v) in target.iter_mut().zip(values) {
        *t += v;
    }
}

fn sum_columns<'a>(columns: impl Iterator<Item = &'a Vec<f64>>, hours: usize) -> Vec<f64> {
    let mut total = vec![0.0; hours];
    for values in columns {
        add_assign(&mut total, values);
    }
    total
}
