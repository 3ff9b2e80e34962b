//! Parameter Store: named, time-indexed exogenous series.
//!
//! Every series carries one numeric value per hourly step. The simulator
//! tolerates absent names or short series by falling back to the documented
//! defaults below; the optimization model builder treats a missing required
//! series as a fatal modeling error instead.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::Path;

/// Canonical series names, in the fixed order used for observations and
/// scenario export. These double as the CSV file/column names of the data
/// contract (one file per series, one value column).
pub const PARAM_NAMES: [&str; 33] = [
    "load",
    "price_import",
    "price_export",
    "price_ev",
    "rho_gas",
    "Cop_ma_wt",
    "Cop_ma_pv",
    "rho_fuel",
    "C_startup",
    "C_degrad_es",
    "eta_chp",
    "eta_dg",
    "eta_ch_es",
    "eta_dis_es",
    "eta_ch_ev",
    "alpha_chp",
    "H_demand",
    "P_grid_import_max",
    "P_grid_export_max",
    "PWT_max",
    "PPV_max",
    "PCHP_max",
    "PDG_max",
    "Pdis_es_max",
    "Pch_es_max",
    "PEV_max",
    "Ees_min",
    "Ees_max",
    "Eev_max",
    "Eev_required",
    "A",
    "session_start",
    "leave_possible",
];

/// Documented default for a series value when the name or step is absent.
///
/// Capacity and efficiency defaults match the reference instance; prices,
/// costs, demands, and EV flags default to zero.
pub fn default_value(name: &str) -> f64 {
    match name {
        "P_grid_import_max" => 100.0,
        "P_grid_export_max" => 100.0,
        "PWT_max" => 50.0,
        "PPV_max" => 50.0,
        "PCHP_max" => 25.0,
        "PDG_max" => 30.0,
        "Pch_es_max" => 50.0,
        "Pdis_es_max" => 50.0,
        "PEV_max" => 60.0,
        "eta_chp" => 0.9,
        "eta_dg" => 0.9,
        "eta_ch_es" => 0.9,
        "eta_dis_es" => 0.9,
        "eta_ch_ev" => 0.95,
        "alpha_chp" => 0.8,
        "Ees_max" => 300.0,
        "Eev_max" => 70.0,
        _ => 0.0,
    }
}

/// Error raised while ingesting parameter files.
#[derive(Debug)]
pub struct ParamError {
    /// Series name (or file) the error refers to.
    pub name: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parameter error: {} — {}", self.name, self.message)
    }
}

impl std::error::Error for ParamError {}

/// Collection of named time-indexed series.
///
/// Instances are immutable once handed to a simulator or model builder;
/// sharing across episode instances is done via `Arc<ParameterSet>`.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    series: BTreeMap<String, Vec<f64>>,
}

impl ParameterSet {
    /// Creates an empty set; every lookup resolves to the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) one named series.
    pub fn insert(&mut self, name: &str, values: Vec<f64>) {
        self.series.insert(name.to_string(), values);
    }

    /// Builds a set where every canonical series is a constant line of
    /// `horizon` values: the documented default, overridden by `overrides`.
    ///
    /// Intended for synthetic instances and tests.
    pub fn constant(horizon: usize, overrides: &[(&str, f64)]) -> Self {
        let mut set = Self::new();
        for name in PARAM_NAMES {
            let value = overrides
                .iter()
                .find_map(|(n, v)| (*n == name).then_some(*v))
                .unwrap_or_else(|| default_value(name));
            set.insert(name, vec![value; horizon]);
        }
        set
    }

    /// Loads every canonical series found under `dir` as `<name>.csv`.
    ///
    /// Each file must hold an index column followed by one value column and
    /// at least `horizon` data rows. Files for names not present in the
    /// directory are skipped (the simulator resolves them via defaults).
    ///
    /// # Errors
    ///
    /// Returns a `ParamError` for unreadable files, non-numeric values, or
    /// series shorter than `horizon`.
    pub fn from_csv_dir(dir: &Path, horizon: usize) -> Result<Self, ParamError> {
        let mut set = Self::new();
        for name in PARAM_NAMES {
            let path = dir.join(format!("{name}.csv"));
            if !path.exists() {
                continue;
            }
            let file = File::open(&path).map_err(|e| ParamError {
                name: name.to_string(),
                message: format!("cannot open \"{}\": {e}", path.display()),
            })?;
            let values = read_series(file, name)?;
            if values.len() < horizon {
                return Err(ParamError {
                    name: name.to_string(),
                    message: format!(
                        "series has {} rows, horizon requires at least {horizon}",
                        values.len()
                    ),
                });
            }
            set.insert(name, values);
        }
        Ok(set)
    }

    /// Returns the value of `name` at step `t`, falling back to the
    /// documented default when the series or the step is absent.
    pub fn value(&self, name: &str, t: usize) -> f64 {
        match self.series.get(name) {
            Some(values) if t < values.len() => values[t],
            _ => default_value(name),
        }
    }

    /// Returns the raw series if present.
    pub fn series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    /// Returns the series, or a `ParamError` naming the absent parameter.
    /// Used by consumers for which every series is required.
    pub fn require(&self, name: &str, horizon: usize) -> Result<&[f64], ParamError> {
        let values = self.series.get(name).ok_or_else(|| ParamError {
            name: name.to_string(),
            message: "required series is absent".to_string(),
        })?;
        if values.len() < horizon {
            return Err(ParamError {
                name: name.to_string(),
                message: format!(
                    "series has {} rows, horizon requires at least {horizon}",
                    values.len()
                ),
            });
        }
        Ok(values)
    }

    /// Returns a copy where every canonical series is materialized to
    /// exactly `horizon` values, gaps filled from the defaults. Scenario
    /// generation and export operate on materialized sets.
    pub fn materialized(&self, horizon: usize) -> Self {
        let mut set = Self::new();
        for name in PARAM_NAMES {
            let values = (0..horizon).map(|t| self.value(name, t)).collect();
            set.insert(name, values);
        }
        set
    }

    /// Typed view of one step, gap-filled via the defaults.
    pub fn step(&self, t: usize) -> StepParams {
        StepParams {
            load: self.value("load", t),
            price_import: self.value("price_import", t),
            price_export: self.value("price_export", t),
            price_ev: self.value("price_ev", t),
            gas_price: self.value("rho_gas", t),
            diesel_price: self.value("rho_fuel", t),
            om_cost_wind: self.value("Cop_ma_wt", t),
            om_cost_solar: self.value("Cop_ma_pv", t),
            startup_cost: self.value("C_startup", t),
            degradation_cost: self.value("C_degrad_es", t),
            chp_efficiency: self.value("eta_chp", t),
            diesel_efficiency: self.value("eta_dg", t),
            storage_charge_eff: self.value("eta_ch_es", t),
            storage_discharge_eff: self.value("eta_dis_es", t),
            ev_charge_eff: self.value("eta_ch_ev", t),
            chp_heat_ratio: self.value("alpha_chp", t),
            heat_demand: self.value("H_demand", t),
            import_cap: self.value("P_grid_import_max", t),
            export_cap: self.value("P_grid_export_max", t),
            wind_cap: self.value("PWT_max", t),
            solar_cap: self.value("PPV_max", t),
            chp_cap: self.value("PCHP_max", t),
            diesel_cap: self.value("PDG_max", t),
            storage_discharge_cap: self.value("Pdis_es_max", t),
            storage_charge_cap: self.value("Pch_es_max", t),
            ev_charge_cap: self.value("PEV_max", t),
            storage_energy_min: self.value("Ees_min", t),
            storage_energy_max: self.value("Ees_max", t),
            ev_energy_max: self.value("Eev_max", t),
            ev_energy_required: self.value("Eev_required", t),
            ev_available: self.value("A", t) > 0.5,
            ev_session_start: self.value("session_start", t) > 0.5,
            ev_leave_possible: self.value("leave_possible", t) > 0.5,
        }
    }
}

/// All parameter values for one step, under their domain names.
#[derive(Debug, Clone)]
pub struct StepParams {
    /// Electrical load (kW).
    pub load: f64,
    /// Grid import price per kWh.
    pub price_import: f64,
    /// Grid export price per kWh.
    pub price_export: f64,
    /// Revenue per kWh delivered to the EV.
    pub price_ev: f64,
    /// Gas price per kWh of CHP fuel.
    pub gas_price: f64,
    /// Diesel price per kWh of generator fuel.
    pub diesel_price: f64,
    /// Wind O&M cost per kWh.
    pub om_cost_wind: f64,
    /// Solar O&M cost per kWh.
    pub om_cost_solar: f64,
    /// Cost of one off-to-on transition of a dispatchable unit.
    pub startup_cost: f64,
    /// Storage degradation cost per discharged kWh.
    pub degradation_cost: f64,
    /// CHP electrical efficiency (0..1).
    pub chp_efficiency: f64,
    /// Diesel generator efficiency (0..1).
    pub diesel_efficiency: f64,
    /// Battery charge efficiency (0..1).
    pub storage_charge_eff: f64,
    /// Battery discharge efficiency (0..1).
    pub storage_discharge_eff: f64,
    /// EV charge efficiency (0..1).
    pub ev_charge_eff: f64,
    /// Heat produced per unit of CHP electrical power.
    pub chp_heat_ratio: f64,
    /// Heat demand (kW thermal).
    pub heat_demand: f64,
    /// Grid import capacity (kW).
    pub import_cap: f64,
    /// Grid export capacity (kW).
    pub export_cap: f64,
    /// Wind capacity (kW).
    pub wind_cap: f64,
    /// Solar capacity (kW).
    pub solar_cap: f64,
    /// CHP capacity (kW).
    pub chp_cap: f64,
    /// Diesel capacity (kW).
    pub diesel_cap: f64,
    /// Battery discharge capacity (kW).
    pub storage_discharge_cap: f64,
    /// Battery charge capacity (kW).
    pub storage_charge_cap: f64,
    /// EV charge capacity (kW).
    pub ev_charge_cap: f64,
    /// Battery energy lower bound (kWh).
    pub storage_energy_min: f64,
    /// Battery energy upper bound (kWh).
    pub storage_energy_max: f64,
    /// EV battery energy ceiling (kWh).
    pub ev_energy_max: f64,
    /// Energy the EV must hold when leaving (kWh).
    pub ev_energy_required: f64,
    /// EV plugged in and chargeable this step.
    pub ev_available: bool,
    /// A new EV charging session begins this step.
    pub ev_session_start: bool,
    /// The EV may leave at this step; its requirement is enforced here.
    pub ev_leave_possible: bool,
}

fn read_series(file: File, name: &str) -> Result<Vec<f64>, ParamError> {
    let mut rdr = csv::ReaderBuilder::new().from_reader(file);
    let mut values = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| ParamError {
            name: name.to_string(),
            message: format!("row {row}: {e}"),
        })?;
        // Index column first, value column second; a single column is
        // accepted as value-only.
        let field = if record.len() >= 2 {
            &record[1]
        } else {
            &record[0]
        };
        let value: f64 = field.trim().parse().map_err(|_| ParamError {
            name: name.to_string(),
            message: format!("row {row}: \"{field}\" is not numeric"),
        })?;
        values.push(value);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_series_resolves_to_default() {
        let set = ParameterSet::new();
        assert_eq!(set.value("load", 0), 0.0);
        assert_eq!(set.value("P_grid_import_max", 12), 100.0);
        assert_eq!(set.value("eta_ch_ev", 3), 0.95);
    }

    #[test]
    fn short_series_falls_back_past_its_end() {
        let mut set = ParameterSet::new();
        set.insert("load", vec![5.0, 6.0]);
        assert_eq!(set.value("load", 1), 6.0);
        assert_eq!(set.value("load", 2), 0.0);
    }

    #[test]
    fn constant_set_honors_overrides() {
        let set = ParameterSet::constant(4, &[("load", 10.0), ("PWT_max", 0.0)]);
        assert_eq!(set.value("load", 3), 10.0);
        assert_eq!(set.value("PWT_max", 0), 0.0);
        // Untouched names keep their defaults
        assert_eq!(set.value("PCHP_max", 2), 25.0);
    }

    #[test]
    fn require_reports_absent_series() {
        let set = ParameterSet::new();
        let err = set.require("price_import", 4).expect_err("must fail");
        assert!(err.name.contains("price_import"));
    }

    #[test]
    fn require_reports_short_series() {
        let mut set = ParameterSet::new();
        set.insert("load", vec![1.0, 2.0]);
        let err = set.require("load", 8).expect_err("must fail");
        assert!(err.message.contains("2 rows"));
    }

    #[test]
    fn materialized_fills_every_name_to_horizon() {
        let mut set = ParameterSet::new();
        set.insert("load", vec![3.0]);
        let full = set.materialized(3);
        for name in PARAM_NAMES {
            assert_eq!(full.series(name).map(<[f64]>::len), Some(3), "{name}");
        }
        assert_eq!(full.value("load", 0), 3.0);
        assert_eq!(full.value("load", 2), 0.0);
    }

    #[test]
    fn step_view_matches_raw_lookups() {
        let set = ParameterSet::constant(2, &[("load", 42.0), ("A", 1.0)]);
        let p = set.step(1);
        assert_eq!(p.load, 42.0);
        assert!(p.ev_available);
        assert!(!p.ev_session_start);
        assert_eq!(p.chp_heat_ratio, 0.8);
    }
}
