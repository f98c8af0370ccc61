use crate::config::FlowVocabulary;
use crate::error::{EvalError, EvalResult};
use log::{debug, info};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Variables reported per unit and year by the investment model.
pub const INVESTMENT_VARIABLES: [&str; 5] = ["invest", "old", "old_end", "old_exo", "total"];

const DR_VARIABLES: [&str; 4] = ["dsm_up", "dsm_do_shift", "dsm_do_shed", "dsm_storage_level"];
const STORAGE_ELEMENTS: [&str; 2] = ["_capacity", "_outflow"];
const TECHNOLOGY_PATTERN: &str = r"GT|ST|CC|FC";

/// One raw result row, keyed by `(from, to, year)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawInvestmentRow {
    pub from: String,
    pub to: String,
    pub year: i32,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitResult {
    pub unit: String,
    pub year: i32,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Aggregation {
    EnergyCarrier,
    Technology,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResult {
    pub key: String,
    /// Only set when investments are aggregated per year.
    pub year: Option<i32>,
    pub values: BTreeMap<String, f64>,
}

/// Category x year matrix of one variable; missing cells are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub variable: String,
    pub categories: Vec<String>,
    pub years: Vec<i32>,
    /// `values[category][year]`
    pub values: Vec<Vec<f64>>,
}

impl PivotTable {
    /// Sum over all categories per year, e.g. total installed capacity.
    pub fn year_totals(&self) -> Vec<f64> {
        (0..self.years.len())
            .map(|y| self.values.iter().map(|row| row[y]).sum())
            .collect()
    }
}

pub struct InvestmentInspector {
    vocabulary: FlowVocabulary,
    row_id: Regex,
    technology: Regex,
}

impl InvestmentInspector {
    pub fn new(vocabulary: &FlowVocabulary) -> EvalResult<Self> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(|e| EvalError::Config(e.to_string()));
        Ok(Self {
            vocabulary: vocabulary.clone(),
            row_id: compile(r"^\(\s*'([^']*)'\s*,\s*'?([^',()]*?)'?\s*,\s*'?(\d{4})'?\s*\)$")?,
            technology: compile(TECHNOLOGY_PATTERN)?,
        })
    }

    /// Read raw results: identifier in the first column, one column per variable.
    pub fn load_raw(&self, path: &Path, delimiter: u8) -> EvalResult<Vec<RawInvestmentRow>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_path(path)?;
        let variables: Vec<String> = reader
            .headers()?
            .iter()
            .skip(1)
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let raw_id = record.get(0).unwrap_or("").trim();
            let (from, to, year) = self.parse_row_id(raw_id)?;

            let mut values = BTreeMap::new();
            for (variable, cell) in variables.iter().zip(record.iter().skip(1)) {
                let cell = cell.trim();
                let value = if cell.is_empty() {
                    0.0
                } else {
                    cell.parse::<f64>().map_err(|_| {
                        EvalError::Parse(format!("{}: '{}' in column '{}'", path.display(), cell, variable))
                    })?
                };
                values.insert(variable.clone(), value);
            }
            rows.push(RawInvestmentRow { from, to, year, values });
        }

        info!("Loaded {} investment result rows from {}", rows.len(), path.display());
        Ok(rows)
    }

    fn parse_row_id(&self, raw: &str) -> EvalResult<(String, String, i32)> {
        let caps = self
            .row_id
            .captures(raw)
            .ok_or_else(|| EvalError::unrecognized(raw, "expected ('from', 'to', year)"))?;
        let year = caps[3]
            .parse::<i32>()
            .map_err(|_| EvalError::unrecognized(raw, "invalid year"))?;
        Ok((caps[1].to_string(), caps[2].trim().to_string(), year))
    }

    /// Relabel raw rows into unit names.
    ///
    /// `investments` selects capacity results (MW), which also drop the
    /// `_new_built` suffix; otherwise rows are production results (MWh).
    pub fn preprocess(&self, rows: &[RawInvestmentRow], investments: bool) -> Vec<UnitResult> {
        rows.iter()
            .map(|row| UnitResult {
                unit: self.unit_label(&row.from, &row.to, investments),
                year: row.year,
                values: row.values.clone(),
            })
            .collect()
    }

    fn unit_label(&self, from: &str, to: &str, investments: bool) -> String {
        let vocab = &self.vocabulary;
        let bus = vocab.bus.as_str();
        let sink_prefix = format!("{}_sink_el", vocab.market_area);

        let label = if from.contains("storage") && to == "None" {
            format!("{}_capacity", from)
        } else if from.contains("storage") && to.contains(bus) {
            format!("{}_inflow", from)
        } else if from.contains(bus) && to.contains("storage") {
            format!("{}_outflow", to)
        } else if from.contains(bus) && (to.contains(&sink_prefix) || to.contains("electrolyzer")) {
            to.to_string()
        } else if from.contains(bus) {
            format!("{}_demand_after", to)
        } else if DR_VARIABLES.contains(&to) {
            format!("{}_{}", from, to)
        } else {
            from.to_string()
        };

        let mut unit = label
            .replace(&vocab.storage_prefix, "")
            .replace(&vocab.transformer_prefix, "");
        if investments {
            unit = unit.replace("_new_built", "");
        }
        unit
    }

    /// Group unit results by energy carrier or technology.
    ///
    /// Investments are grouped per year and returned together with the
    /// separated storage capacity and outflow rows; production results are
    /// summed over all years and the second list is empty.
    pub fn aggregate(
        &self,
        results: &[UnitResult],
        energy_carriers: &[String],
        by: Aggregation,
        investments: bool,
    ) -> (Vec<AggregatedResult>, Vec<AggregatedResult>) {
        let mut groups: BTreeMap<(String, Option<i32>), BTreeMap<String, f64>> = BTreeMap::new();

        for result in results {
            let key = match by {
                Aggregation::EnergyCarrier => self.carrier_key(&result.unit, energy_carriers),
                Aggregation::Technology => self.technology_key(&result.unit),
            };
            let year = investments.then_some(result.year);
            let sums = groups.entry((key, year)).or_default();
            for (variable, value) in &result.values {
                *sums.entry(variable.clone()).or_insert(0.0) += value;
            }
        }

        let storages: BTreeSet<String> = self
            .vocabulary
            .storages
            .iter()
            .flat_map(|tech| STORAGE_ELEMENTS.iter().map(move |element| format!("{}{}", tech, element)))
            .collect();

        let (storage_rows, other_rows): (Vec<_>, Vec<_>) = groups
            .into_iter()
            .map(|((key, year), values)| AggregatedResult { key, year, values })
            .partition(|row| investments && storages.contains(&row.key));

        debug!(
            "Aggregated into {} rows plus {} storage rows",
            other_rows.len(),
            storage_rows.len()
        );
        (other_rows, storage_rows)
    }

    fn carrier_key(&self, unit: &str, energy_carriers: &[String]) -> String {
        let (mut fuel, tech) = split_unit(unit);
        if fuel == "transformer" {
            fuel = tech.split('_').next().unwrap_or("").to_string();
        }
        if fuel == "hydrogen" && tech.contains("electrolyzer") {
            fuel = format!("hydrogen_{}", tech);
        }

        if energy_carriers.iter().any(|c| *c == fuel) {
            fuel
        } else {
            unit.to_string()
        }
    }

    fn technology_key(&self, unit: &str) -> String {
        let (_, tech) = split_unit(unit);
        if self.technology.is_match(&tech) {
            tech.split('_').next().unwrap_or("").to_string()
        } else {
            unit.to_string()
        }
    }
}

fn split_unit(unit: &str) -> (String, String) {
    match unit.split_once('_') {
        Some((fuel, tech)) => (fuel.to_string(), tech.to_string()),
        None => (unit.to_string(), String::new()),
    }
}

/// Pivot one variable of per-year aggregates into a category x year matrix.
pub fn pivot(rows: &[AggregatedResult], variable: &str) -> EvalResult<PivotTable> {
    let categories: Vec<String> = rows
        .iter()
        .map(|r| r.key.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let years: Vec<i32> = rows
        .iter()
        .filter_map(|r| r.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if years.is_empty() {
        return Err(EvalError::EmptySeries(format!("yearly results for '{}'", variable)));
    }

    let mut values = vec![vec![0.0; years.len()]; categories.len()];
    for row in rows {
        let Some(year) = row.year else { continue };
        let value = *row
            .values
            .get(variable)
            .ok_or_else(|| EvalError::missing_column(variable, "investment results"))?;
        // Both lookups hit since the axes were built from these rows.
        if let (Ok(c), Ok(y)) = (categories.binary_search(&row.key), years.binary_search(&year)) {
            values[c][y] += value;
        }
    }

    Ok(PivotTable {
        variable: variable.to_string(),
        categories,
        years,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn inspector() -> InvestmentInspector {
        InvestmentInspector::new(&FlowVocabulary::default()).unwrap()
    }

    fn raw(from: &str, to: &str, year: i32, invest: f64) -> RawInvestmentRow {
        RawInvestmentRow {
            from: from.to_string(),
            to: to.to_string(),
            year,
            values: BTreeMap::from([("invest".to_string(), invest), ("total".to_string(), invest * 2.0)]),
        }
    }

    #[test]
    fn test_load_raw_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, ",invest,old,total").unwrap();
        writeln!(file, "\"('DE_transformer_natgas_GT_new_built', 'DE_bus_el', 2025)\",100.0,0.0,100.0").unwrap();
        writeln!(file, "\"('DE_storage_el_PHS_new_built', None, 2030)\",50.0,,50.0").unwrap();

        let rows = inspector().load_raw(file.path(), b',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].from, "DE_transformer_natgas_GT_new_built");
        assert_eq!(rows[0].year, 2025);
        assert_eq!(rows[1].to, "None");
        assert_eq!(rows[1].values["old"], 0.0);
    }

    #[test]
    fn test_bad_row_identifier() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, ",invest").unwrap();
        writeln!(file, "natgas_GT,1.0").unwrap();

        assert!(matches!(
            inspector().load_raw(file.path(), b','),
            Err(EvalError::UnrecognizedIdentifier { .. })
        ));
    }

    #[test]
    fn test_relabel_rules() {
        let inspector = inspector();
        let label = |from: &str, to: &str| inspector.unit_label(from, to, true);

        assert_eq!(label("DE_storage_el_PHS_new_built", "None"), "PHS_capacity");
        assert_eq!(label("DE_storage_el_battery_new_built", "DE_bus_el"), "battery_inflow");
        assert_eq!(label("DE_bus_el", "DE_storage_el_PHS_new_built"), "PHS_outflow");
        assert_eq!(label("DE_bus_el", "DE_sink_el_load"), "DE_sink_el_load");
        assert_eq!(
            label("DE_bus_el", "DE_transformer_hydrogen_electrolyzer"),
            "hydrogen_electrolyzer"
        );
        assert_eq!(label("DE_bus_el", "DE_heatpump"), "DE_heatpump_demand_after");
        assert_eq!(label("DE_sink_el_ind_cluster", "dsm_up"), "DE_sink_el_ind_cluster_dsm_up");
        assert_eq!(label("DE_transformer_natgas_CC_new_built", "DE_bus_el"), "natgas_CC");

        assert_eq!(
            inspector.unit_label("DE_transformer_natgas_CC_new_built", "DE_bus_el", false),
            "natgas_CC_new_built"
        );
    }

    #[test]
    fn test_aggregate_by_carrier_splits_storages() {
        let inspector = inspector();
        let rows = vec![
            raw("DE_transformer_natgas_GT_new_built", "DE_bus_el", 2025, 100.0),
            raw("DE_transformer_natgas_CC_new_built", "DE_bus_el", 2025, 50.0),
            raw("DE_transformer_natgas_CC_new_built", "DE_bus_el", 2030, 20.0),
            raw("DE_transformer_hydrogen_FC_new_built", "DE_bus_el", 2030, 5.0),
            raw("DE_storage_el_PHS_new_built", "None", 2025, 800.0),
            raw("DE_storage_el_PHS_new_built", "DE_bus_el", 2025, 100.0),
        ];
        let units = inspector.preprocess(&rows, true);
        let carriers = FlowVocabulary::default().fuels;

        let (aggregated, storages) =
            inspector.aggregate(&units, &carriers, Aggregation::EnergyCarrier, true);

        let natgas_2025 = aggregated
            .iter()
            .find(|r| r.key == "natgas" && r.year == Some(2025))
            .unwrap();
        assert_eq!(natgas_2025.values["invest"], 150.0);
        assert_eq!(natgas_2025.values["total"], 300.0);
        assert!(aggregated.iter().any(|r| r.key == "PHS_inflow"));
        assert_eq!(storages.len(), 1);
        assert_eq!(storages[0].key, "PHS_capacity");

        let pivot = pivot(&aggregated, "invest").unwrap();
        assert_eq!(pivot.years, vec![2025, 2030]);
        let natgas = pivot.categories.iter().position(|c| c == "natgas").unwrap();
        assert_eq!(pivot.values[natgas], vec![150.0, 20.0]);
        assert_eq!(pivot.year_totals(), vec![250.0, 25.0]);
    }

    #[test]
    fn test_aggregate_by_technology() {
        let inspector = inspector();
        let rows = vec![
            raw("DE_transformer_natgas_GT_new_built", "DE_bus_el", 2025, 10.0),
            raw("DE_transformer_hydrogen_GT_new_built", "DE_bus_el", 2025, 5.0),
            raw("DE_transformer_lignite_ST", "DE_bus_el", 2025, 7.0),
        ];
        let units = inspector.preprocess(&rows, true);

        let (aggregated, _) = inspector.aggregate(&units, &[], Aggregation::Technology, true);
        let gt = aggregated.iter().find(|r| r.key == "GT").unwrap();
        assert_eq!(gt.values["invest"], 15.0);
        assert!(aggregated.iter().any(|r| r.key == "ST"));
    }

    #[test]
    fn test_dispatch_results_sum_over_years() {
        let inspector = inspector();
        let rows = vec![
            raw("DE_transformer_lignite_ST", "DE_bus_el", 2025, 7.0),
            raw("DE_transformer_lignite_ST", "DE_bus_el", 2026, 3.0),
        ];
        let units = inspector.preprocess(&rows, false);
        let carriers = FlowVocabulary::default().fuels;

        let (aggregated, storages) =
            inspector.aggregate(&units, &carriers, Aggregation::EnergyCarrier, false);
        assert_eq!(aggregated.len(), 1);
        assert_eq!(aggregated[0].year, None);
        assert_eq!(aggregated[0].values["invest"], 10.0);
        assert!(storages.is_empty());
        assert!(pivot(&aggregated, "invest").is_err());
    }
}
