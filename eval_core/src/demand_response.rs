use crate::config::DemandResponseConfig;
use crate::error::{EvalError, EvalResult};
use crate::flows::FlowIdParser;
use crate::models::FlowTable;
use chrono::Datelike;
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

/// Demand response variables reported per cluster and hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DrOperation {
    ShiftDown,
    ShiftUp,
    Shed,
    /// Fictitious storage level; not an energy volume.
    StorageLevel,
}

impl DrOperation {
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "dsm_do_shift" => Some(Self::ShiftDown),
            "dsm_up" => Some(Self::ShiftUp),
            "dsm_do_shed" => Some(Self::Shed),
            "dsm_storage_level" => Some(Self::StorageLevel),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ShiftDown => "dsm_do_shift",
            Self::ShiftUp => "dsm_up",
            Self::Shed => "dsm_do_shed",
            Self::StorageLevel => "dsm_storage_level",
        }
    }
}

/// Annual shift and shed volumes of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrVolumes {
    pub year: i32,
    pub cluster: String,
    pub shift_down: f64,
    pub shift_up: f64,
    pub shed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrBalance {
    pub cluster: String,
    pub shift_down: f64,
    pub shift_up: f64,
    pub deviation: f64,
}

pub struct DemandResponseAccounting {
    parser: FlowIdParser,
    config: DemandResponseConfig,
}

impl DemandResponseAccounting {
    pub fn new(config: &DemandResponseConfig) -> EvalResult<Self> {
        Ok(Self {
            parser: FlowIdParser::new()?,
            config: config.clone(),
        })
    }

    /// Sum shift down, shift up and shed per calendar year and cluster.
    pub fn annual_volumes(&self, table: &FlowTable) -> EvalResult<Vec<DrVolumes>> {
        let mut volumes: BTreeMap<(i32, String), DrVolumes> = BTreeMap::new();
        let mut found = false;

        for (name, values) in table.columns() {
            let id = self.parser.parse(name)?;
            let Some(operation) = id.kind.as_deref().and_then(DrOperation::from_kind) else {
                continue;
            };
            found = true;
            if operation == DrOperation::StorageLevel {
                continue;
            }

            for (timestamp, value) in table.timestamps().iter().zip(values) {
                let year = timestamp.year();
                let row = volumes
                    .entry((year, id.from.clone()))
                    .or_insert_with(|| DrVolumes {
                        year,
                        cluster: id.from.clone(),
                        shift_down: 0.0,
                        shift_up: 0.0,
                        shed: 0.0,
                    });
                match operation {
                    DrOperation::ShiftDown => row.shift_down += value,
                    DrOperation::ShiftUp => row.shift_up += value,
                    DrOperation::Shed => row.shed += value,
                    DrOperation::StorageLevel => {}
                }
            }
        }

        if !found {
            return Err(EvalError::EmptySeries("demand response columns".to_string()));
        }

        Ok(volumes.into_values().collect())
    }

    /// Energy shifted down must return as shift up within each cluster.
    ///
    /// The check runs over the whole horizon, since shifts may cross a
    /// year boundary. The first violating cluster aborts with an error.
    pub fn check_balance(&self, volumes: &[DrVolumes]) -> EvalResult<Vec<DrBalance>> {
        let mut totals: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
        for row in volumes {
            let total = totals.entry(row.cluster.as_str()).or_insert((0.0, 0.0));
            total.0 += row.shift_down;
            total.1 += row.shift_up;
        }

        let mut balances = Vec::with_capacity(totals.len());
        for (cluster, (shift_down, shift_up)) in totals {
            let deviation = (shift_down - shift_up).abs();
            let allowed = (self.config.relative_tolerance * shift_down.max(shift_up))
                .max(self.config.absolute_tolerance);

            if deviation > allowed {
                warn!(
                    "Cluster {}: shifted down {:.3} vs. up {:.3} (allowed deviation {:.3e})",
                    cluster, shift_down, shift_up, allowed
                );
                return Err(EvalError::DemandResponseImbalance {
                    cluster: cluster.to_string(),
                    shift_down,
                    shift_up,
                });
            }

            balances.push(DrBalance {
                cluster: cluster.to_string(),
                shift_down,
                shift_up,
                deviation,
            });
        }

        info!("Demand response balance holds for {} clusters", balances.len());
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn index(start: NaiveDateTime, n: usize) -> Vec<NaiveDateTime> {
        (0..n).map(|h| start + Duration::hours(h as i64)).collect()
    }

    fn dr_column(cluster: &str, kind: &str, values: Vec<f64>) -> (String, Vec<f64>) {
        (format!("(('{}', 'None'), '{}')", cluster, kind), values)
    }

    fn accounting() -> DemandResponseAccounting {
        DemandResponseAccounting::new(&DemandResponseConfig::default()).unwrap()
    }

    /// Shift down at hour h mirrored by shift up at hour h + k.
    fn mirrored(n: usize, k: usize) -> (Vec<f64>, Vec<f64>) {
        let mut down = vec![0.0; n];
        let mut up = vec![0.0; n];
        for h in (0..n - k).step_by(5) {
            let volume = 10.0 + (h % 7) as f64 * 3.5;
            down[h] += volume;
            up[h + k] += volume;
        }
        (down, up)
    }

    #[test]
    fn test_mirrored_shifts_pass_balance_check() {
        let start = NaiveDate::from_ymd_opt(2030, 12, 30)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let (down, up) = mirrored(96, 3);
        let table = FlowTable::new(
            index(start, 96),
            vec![
                dr_column("DE_sink_el_ind_cluster", "dsm_do_shift", down),
                dr_column("DE_sink_el_ind_cluster", "dsm_up", up),
                dr_column("DE_sink_el_ind_cluster", "dsm_do_shed", vec![1.0; 96]),
                dr_column("DE_sink_el_ind_cluster", "dsm_storage_level", vec![99.0; 96]),
                ("(('DE_source_solarPV', 'DE_bus_el'), 'flow')".to_string(), vec![5.0; 96]),
            ],
        )
        .unwrap();

        let dr = accounting();
        let volumes = dr.annual_volumes(&table).unwrap();
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[0].year, 2030);
        assert_eq!(volumes[0].shed, 48.0);
        assert_eq!(volumes[1].shed, 48.0);

        let balances = dr.check_balance(&volumes).unwrap();
        assert_eq!(balances.len(), 1);
        assert!(balances[0].deviation < 1e-9);
        assert!(balances[0].shift_down > 0.0);
    }

    #[test]
    fn test_unbalanced_cluster_is_fatal() {
        let start = NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let table = FlowTable::new(
            index(start, 4),
            vec![
                dr_column("DE_sink_el_hoho_cluster", "dsm_do_shift", vec![10.0, 0.0, 0.0, 0.0]),
                dr_column("DE_sink_el_hoho_cluster", "dsm_up", vec![0.0, 0.0, 9.0, 0.0]),
            ],
        )
        .unwrap();

        let dr = accounting();
        let volumes = dr.annual_volumes(&table).unwrap();
        match dr.check_balance(&volumes) {
            Err(EvalError::DemandResponseImbalance { cluster, shift_down, shift_up }) => {
                assert_eq!(cluster, "DE_sink_el_hoho_cluster");
                assert_eq!(shift_down, 10.0);
                assert_eq!(shift_up, 9.0);
            }
            other => panic!("expected imbalance, got {:?}", other),
        }
    }

    #[test]
    fn test_table_without_dr_columns_fails() {
        let start = NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let table = FlowTable::new(
            index(start, 1),
            vec![("(('DE_source_solarPV', 'DE_bus_el'), 'flow')".to_string(), vec![1.0])],
        )
        .unwrap();

        assert!(matches!(
            accounting().annual_volumes(&table),
            Err(EvalError::EmptySeries(_))
        ));
    }

    #[test]
    fn test_operation_kinds_round_trip() {
        for op in [
            DrOperation::ShiftDown,
            DrOperation::ShiftUp,
            DrOperation::Shed,
            DrOperation::StorageLevel,
        ] {
            assert_eq!(DrOperation::from_kind(op.kind()), Some(op));
        }
        assert_eq!(DrOperation::from_kind("flow"), None);
    }
}
