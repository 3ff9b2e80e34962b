//! Declarative dispatch model for an external MILP solver.
//!
//! The builder turns a parameter set and run configuration into plain
//! variable, constraint, and objective data. Nothing here solves; the
//! model is handed to a [`crate::opt::solution::MilpSolver`] or exported
//! in LP format for an external backend.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::{EvLeave, RunConfig, SocStart};
use crate::params::{ParamError, ParameterSet, PARAM_NAMES};

/// Handle to one model variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VarId(pub usize);

/// Variable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// Continuous within its bounds.
    Continuous,
    /// Binary {0, 1}.
    Binary,
}

/// One decision variable with its bounds.
#[derive(Debug, Clone)]
pub struct Variable {
    /// Unique name, stable across builds of the same instance.
    pub name: String,
    /// Domain kind.
    pub kind: VarKind,
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

/// Sparse linear expression over model variables.
#[derive(Debug, Clone, Default)]
pub struct LinExpr {
    /// `(variable, coefficient)` terms.
    pub terms: Vec<(VarId, f64)>,
    /// Constant offset.
    pub constant: f64,
}

impl LinExpr {
    /// Empty expression.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `coeff * var` and returns the expression (builder style).
    pub fn term(mut self, coeff: f64, var: VarId) -> Self {
        self.add(coeff, var);
        self
    }

    /// Adds `coeff * var` in place. Zero coefficients are dropped.
    pub fn add(&mut self, coeff: f64, var: VarId) {
        if coeff != 0.0 {
            self.terms.push((var, coeff));
        }
    }

    /// Evaluates the expression against a dense value vector indexed by
    /// [`VarId`].
    pub fn eval(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|(var, coeff)| coeff * values[var.0])
                .sum::<f64>()
    }
}

/// Constraint comparison sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// Expression <= rhs.
    Le,
    /// Expression >= rhs.
    Ge,
    /// Expression == rhs.
    Eq,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eq => "=",
        })
    }
}

/// One named linear constraint.
#[derive(Debug, Clone)]
pub struct Constraint {
    /// Unique name, used in diagnostics and LP export.
    pub name: String,
    /// Left-hand side.
    pub expr: LinExpr,
    /// Comparison sense.
    pub sense: Sense,
    /// Right-hand side.
    pub rhs: f64,
}

impl Constraint {
    /// Violation magnitude of the constraint at a dense value vector;
    /// 0 when satisfied.
    pub fn violation(&self, values: &[f64]) -> f64 {
        let lhs = self.expr.eval(values);
        match self.sense {
            Sense::Le => (lhs - self.rhs).max(0.0),
            Sense::Ge => (self.rhs - lhs).max(0.0),
            Sense::Eq => (lhs - self.rhs).abs(),
        }
    }
}

/// Error raised while building a model.
#[derive(Debug)]
pub enum ModelError {
    /// A required parameter series is absent or too short.
    MissingParameter(ParamError),
    /// The run configuration failed validation.
    InvalidConfig(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter(e) => write!(f, "model error: {e}"),
            Self::InvalidConfig(msg) => write!(f, "model error: invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {}

impl From<ParamError> for ModelError {
    fn from(e: ParamError) -> Self {
        Self::MissingParameter(e)
    }
}

/// Complete dispatch model: variables, constraints, minimized objective.
#[derive(Debug, Clone)]
pub struct DispatchModel {
    horizon: usize,
    vars: Vec<Variable>,
    index: BTreeMap<String, VarId>,
    /// All constraints in build order.
    pub constraints: Vec<Constraint>,
    /// Objective expression, to be minimized.
    pub objective: LinExpr,
}

impl DispatchModel {
    /// Model horizon in steps.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// All variables, indexed by [`VarId`].
    pub fn vars(&self) -> &[Variable] {
        &self.vars
    }

    /// Looks a variable up by name.
    pub fn var(&self, name: &str) -> Option<VarId> {
        self.index.get(name).copied()
    }

    fn add_var(&mut self, name: String, kind: VarKind, lower: f64, upper: f64) -> VarId {
        let id = VarId(self.vars.len());
        self.index.insert(name.clone(), id);
        self.vars.push(Variable {
            name,
            kind,
            lower,
            upper,
        });
        id
    }

    fn add_binary(&mut self, name: String) -> VarId {
        self.add_var(name, VarKind::Binary, 0.0, 1.0)
    }

    fn constrain(&mut self, name: String, expr: LinExpr, sense: Sense, rhs: f64) {
        self.constraints.push(Constraint {
            name,
            expr,
            sense,
            rhs,
        });
    }

    /// Builds the dispatch model for `params` over the configured horizon.
    ///
    /// Unlike the simulator, the builder never falls back to defaults:
    /// every canonical series must be present and cover the horizon.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::MissingParameter` when any series in
    /// [`PARAM_NAMES`] is absent or shorter than the horizon, and
    /// `ModelError::InvalidConfig` for an invalid run configuration.
    pub fn build(params: &ParameterSet, config: &RunConfig) -> Result<Self, ModelError> {
        let errors = config.validate();
        if let Some(first) = errors.first() {
            return Err(ModelError::InvalidConfig(first.to_string()));
        }
        let horizon = config.simulation.horizon;
        for name in PARAM_NAMES {
            params.require(name, horizon)?;
        }

        let mut model = Self {
            horizon,
            vars: Vec::new(),
            index: BTreeMap::new(),
            constraints: Vec::new(),
            objective: LinExpr::new(),
        };

        // Per-step variable ids, filled first so recursions can refer back.
        let mut p_imp = Vec::with_capacity(horizon);
        let mut p_exp = Vec::with_capacity(horizon);
        let mut u_imp = Vec::with_capacity(horizon);
        let mut u_exp = Vec::with_capacity(horizon);
        let mut p_wt = Vec::with_capacity(horizon);
        let mut p_pv = Vec::with_capacity(horizon);
        let mut p_chp = Vec::with_capacity(horizon);
        let mut u_chp = Vec::with_capacity(horizon);
        let mut s_chp = Vec::with_capacity(horizon);
        let mut p_dg = Vec::with_capacity(horizon);
        let mut u_dg = Vec::with_capacity(horizon);
        let mut s_dg = Vec::with_capacity(horizon);
        let mut p_ch = Vec::with_capacity(horizon);
        let mut p_dis = Vec::with_capacity(horizon);
        let mut u_ch = Vec::with_capacity(horizon);
        let mut u_dis = Vec::with_capacity(horizon);
        let mut e_es = Vec::with_capacity(horizon);
        let mut p_ev = Vec::with_capacity(horizon);
        let mut e_ev = Vec::with_capacity(horizon);

        for t in 0..horizon {
            let p = params.step(t);
            let c = VarKind::Continuous;
            p_imp.push(model.add_var(format!("p_imp_{t}"), c, 0.0, p.import_cap));
            p_exp.push(model.add_var(format!("p_exp_{t}"), c, 0.0, p.export_cap));
            u_imp.push(model.add_binary(format!("u_imp_{t}")));
            u_exp.push(model.add_binary(format!("u_exp_{t}")));
            p_wt.push(model.add_var(format!("p_wt_{t}"), c, 0.0, p.wind_cap));
            p_pv.push(model.add_var(format!("p_pv_{t}"), c, 0.0, p.solar_cap));
            p_chp.push(model.add_var(format!("p_chp_{t}"), c, 0.0, p.chp_cap));
            u_chp.push(model.add_binary(format!("u_chp_{t}")));
            s_chp.push(model.add_binary(format!("s_chp_{t}")));
            p_dg.push(model.add_var(format!("p_dg_{t}"), c, 0.0, p.diesel_cap));
            u_dg.push(model.add_binary(format!("u_dg_{t}")));
            s_dg.push(model.add_binary(format!("s_dg_{t}")));
            p_ch.push(model.add_var(format!("p_ch_{t}"), c, 0.0, p.storage_charge_cap));
            p_dis.push(model.add_var(format!("p_dis_{t}"), c, 0.0, p.storage_discharge_cap));
            u_ch.push(model.add_binary(format!("u_ch_{t}")));
            u_dis.push(model.add_binary(format!("u_dis_{t}")));
            e_es.push(model.add_var(
                format!("e_es_{t}"),
                c,
                p.storage_energy_min,
                p.storage_energy_max.max(p.storage_energy_min),
            ));
            let ev_cap = if p.ev_available { p.ev_charge_cap } else { 0.0 };
            p_ev.push(model.add_var(format!("p_ev_{t}"), c, 0.0, ev_cap));
            e_ev.push(model.add_var(format!("e_ev_{t}"), c, 0.0, p.ev_energy_max));
        }

        let battery_start = match config.model.soc_start() {
            SocStart::MinBound => params.step(0).storage_energy_min,
            SocStart::Empty => 0.0,
        };

        for t in 0..horizon {
            let p = params.step(t);

            // Exclusive grid exchange, capacity gated by the binaries.
            model.constrain(
                format!("grid_excl_{t}"),
                LinExpr::new().term(1.0, u_imp[t]).term(1.0, u_exp[t]),
                Sense::Le,
                1.0,
            );
            model.constrain(
                format!("imp_cap_{t}"),
                LinExpr::new()
                    .term(1.0, p_imp[t])
                    .term(-p.import_cap, u_imp[t]),
                Sense::Le,
                0.0,
            );
            model.constrain(
                format!("exp_cap_{t}"),
                LinExpr::new()
                    .term(1.0, p_exp[t])
                    .term(-p.export_cap, u_exp[t]),
                Sense::Le,
                0.0,
            );

            // Commitment gating and startup detection for CHP and diesel.
            model.constrain(
                format!("chp_cap_{t}"),
                LinExpr::new().term(1.0, p_chp[t]).term(-p.chp_cap, u_chp[t]),
                Sense::Le,
                0.0,
            );
            model.constrain(
                format!("dg_cap_{t}"),
                LinExpr::new().term(1.0, p_dg[t]).term(-p.diesel_cap, u_dg[t]),
                Sense::Le,
                0.0,
            );
            let mut chp_start = LinExpr::new().term(1.0, s_chp[t]).term(-1.0, u_chp[t]);
            let mut dg_start = LinExpr::new().term(1.0, s_dg[t]).term(-1.0, u_dg[t]);
            if t > 0 {
                chp_start.add(1.0, u_chp[t - 1]);
                dg_start.add(1.0, u_dg[t - 1]);
            }
            model.constrain(format!("chp_start_{t}"), chp_start, Sense::Ge, 0.0);
            model.constrain(format!("dg_start_{t}"), dg_start, Sense::Ge, 0.0);

            // Exclusive battery charge/discharge with gated capacities.
            model.constrain(
                format!("es_excl_{t}"),
                LinExpr::new().term(1.0, u_ch[t]).term(1.0, u_dis[t]),
                Sense::Le,
                1.0,
            );
            model.constrain(
                format!("ch_cap_{t}"),
                LinExpr::new()
                    .term(1.0, p_ch[t])
                    .term(-p.storage_charge_cap, u_ch[t]),
                Sense::Le,
                0.0,
            );
            model.constrain(
                format!("dis_cap_{t}"),
                LinExpr::new()
                    .term(1.0, p_dis[t])
                    .term(-p.storage_discharge_cap, u_dis[t]),
                Sense::Le,
                0.0,
            );

            // Battery energy recursion.
            let dis_eff = if p.storage_discharge_eff > 0.0 {
                p.storage_discharge_eff
            } else {
                1.0
            };
            let mut soc = LinExpr::new()
                .term(1.0, e_es[t])
                .term(-p.storage_charge_eff, p_ch[t])
                .term(1.0 / dis_eff, p_dis[t]);
            let soc_rhs = if t > 0 {
                soc.add(-1.0, e_es[t - 1]);
                0.0
            } else {
                battery_start
            };
            model.constrain(format!("soc_{t}"), soc, Sense::Eq, soc_rhs);

            // EV energy recursion: a session start restarts from zero, as
            // does the horizon itself.
            let mut ev = LinExpr::new()
                .term(1.0, e_ev[t])
                .term(-p.ev_charge_eff, p_ev[t]);
            if !p.ev_session_start && t > 0 {
                ev.add(-1.0, e_ev[t - 1]);
            }
            model.constrain(format!("ev_soc_{t}"), ev, Sense::Eq, 0.0);

            // Departure readiness, per-step variant.
            if config.model.ev_leave() == EvLeave::PerStep && p.ev_leave_possible {
                model.constrain(
                    format!("ev_ready_{t}"),
                    LinExpr::new().term(1.0, e_ev[t]),
                    Sense::Ge,
                    p.ev_energy_required,
                );
            }

            // Heat demand is hard: CHP thermal output must cover it.
            model.constrain(
                format!("heat_{t}"),
                LinExpr::new().term(p.chp_heat_ratio, p_chp[t]),
                Sense::Ge,
                p.heat_demand,
            );

            // Exact power balance.
            model.constrain(
                format!("balance_{t}"),
                LinExpr::new()
                    .term(1.0, p_imp[t])
                    .term(1.0, p_wt[t])
                    .term(1.0, p_pv[t])
                    .term(1.0, p_chp[t])
                    .term(1.0, p_dg[t])
                    .term(1.0, p_dis[t])
                    .term(-1.0, p_exp[t])
                    .term(-1.0, p_ch[t])
                    .term(-1.0, p_ev[t]),
                Sense::Eq,
                p.load,
            );

            // Objective: same economics the simulator prices per step.
            let chp_eff = if p.chp_efficiency > 0.0 { p.chp_efficiency } else { 1.0 };
            let dg_eff = if p.diesel_efficiency > 0.0 { p.diesel_efficiency } else { 1.0 };
            model.objective.add(p.price_import, p_imp[t]);
            model.objective.add(-p.price_export, p_exp[t]);
            model.objective.add(-p.price_ev, p_ev[t]);
            model.objective.add(p.om_cost_wind, p_wt[t]);
            model.objective.add(p.om_cost_solar, p_pv[t]);
            model.objective.add(p.gas_price / chp_eff, p_chp[t]);
            model.objective.add(p.diesel_price / dg_eff, p_dg[t]);
            model.objective.add(p.degradation_cost, p_dis[t]);
            model.objective.add(p.startup_cost, s_chp[t]);
            model.objective.add(p.startup_cost, s_dg[t]);
        }

        // Departure readiness, cumulative variant: total delivered energy
        // must reach the largest requirement over the horizon.
        if config.model.ev_leave() == EvLeave::Cumulative {
            let mut delivered = LinExpr::new();
            let mut required: f64 = 0.0;
            for (t, &var) in p_ev.iter().enumerate() {
                let p = params.step(t);
                delivered.add(p.ev_charge_eff, var);
                required = required.max(p.ev_energy_required);
            }
            model.constrain("ev_ready_total".to_string(), delivered, Sense::Ge, required);
        }

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(horizon: usize) -> (ParameterSet, RunConfig) {
        let params = ParameterSet::constant(horizon, &[("load", 40.0), ("price_import", 0.2)]);
        let mut config = RunConfig::baseline();
        config.simulation.horizon = horizon;
        (params, config)
    }

    #[test]
    fn missing_series_is_fatal() {
        let (_, config) = instance(4);
        let empty = ParameterSet::new();
        let err = DispatchModel::build(&empty, &config).expect_err("must fail");
        assert!(matches!(err, ModelError::MissingParameter(_)));
    }

    #[test]
    fn builder_never_defaults_a_series() {
        // load and prices alone are not enough: the builder wants every
        // canonical series spelled out, the defaults are simulator-only
        let (_, config) = instance(2);
        let mut partial = ParameterSet::new();
        partial.insert("load", vec![10.0; 2]);
        partial.insert("price_import", vec![0.2; 2]);
        let err = DispatchModel::build(&partial, &config).expect_err("must fail");
        match err {
            ModelError::MissingParameter(e) => assert!(!e.name.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn variable_counts_scale_with_horizon() {
        let (params, config) = instance(3);
        let model = DispatchModel::build(&params, &config).expect("build");
        // 19 variables per step
        assert_eq!(model.vars().len(), 3 * 19);
        assert!(model.var("p_imp_0").is_some());
        assert!(model.var("e_ev_2").is_some());
        assert!(model.var("p_imp_3").is_none());
    }

    #[test]
    fn binaries_are_binary() {
        let (params, config) = instance(2);
        let model = DispatchModel::build(&params, &config).expect("build");
        for name in ["u_imp_0", "u_exp_1", "u_chp_0", "s_dg_1", "u_ch_0", "u_dis_1"] {
            let id = model.var(name).expect(name);
            let v = &model.vars()[id.0];
            assert_eq!(v.kind, VarKind::Binary, "{name}");
            assert_eq!((v.lower, v.upper), (0.0, 1.0), "{name}");
        }
    }

    #[test]
    fn ev_absent_forces_zero_cap() {
        let params = ParameterSet::constant(
            2,
            &[("load", 10.0), ("price_import", 0.1), ("A", 0.0)],
        );
        let mut config = RunConfig::baseline();
        config.simulation.horizon = 2;
        let model = DispatchModel::build(&params, &config).expect("build");
        let id = model.var("p_ev_0").expect("p_ev_0");
        assert_eq!(model.vars()[id.0].upper, 0.0);
    }

    #[test]
    fn per_step_leave_emits_conditional_constraints() {
        let params = ParameterSet::constant(
            3,
            &[
                ("load", 10.0),
                ("price_import", 0.1),
                ("A", 1.0),
                ("leave_possible", 1.0),
                ("Eev_required", 40.0),
            ],
        );
        let mut config = RunConfig::baseline();
        config.simulation.horizon = 3;
        let model = DispatchModel::build(&params, &config).expect("build");
        let ready: Vec<_> = model
            .constraints
            .iter()
            .filter(|c| c.name.starts_with("ev_ready_"))
            .collect();
        assert_eq!(ready.len(), 3);
        assert!(ready.iter().all(|c| c.sense == Sense::Ge && c.rhs == 40.0));
    }

    #[test]
    fn cumulative_leave_emits_one_constraint() {
        let params = ParameterSet::constant(
            3,
            &[
                ("load", 10.0),
                ("price_import", 0.1),
                ("A", 1.0),
                ("leave_possible", 1.0),
                ("Eev_required", 40.0),
            ],
        );
        let mut config = RunConfig::baseline();
        config.simulation.horizon = 3;
        config.model.ev_leave = "cumulative".to_string();
        let model = DispatchModel::build(&params, &config).expect("build");
        let ready: Vec<_> = model
            .constraints
            .iter()
            .filter(|c| c.name.starts_with("ev_ready"))
            .collect();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].name, "ev_ready_total");
        assert!((ready[0].rhs - 40.0).abs() < 1e-9);
    }

    #[test]
    fn soc_start_convention_sets_first_rhs() {
        let params = ParameterSet::constant(
            2,
            &[("load", 10.0), ("price_import", 0.1), ("Ees_min", 30.0)],
        );
        let mut config = RunConfig::baseline();
        config.simulation.horizon = 2;
        let model = DispatchModel::build(&params, &config).expect("build");
        let soc0 = model
            .constraints
            .iter()
            .find(|c| c.name == "soc_0")
            .expect("soc_0");
        assert_eq!(soc0.rhs, 30.0);

        config.model.soc_start = "empty".to_string();
        let model = DispatchModel::build(&params, &config).expect("build");
        let soc0 = model
            .constraints
            .iter()
            .find(|c| c.name == "soc_0")
            .expect("soc_0");
        assert_eq!(soc0.rhs, 0.0);
    }

    #[test]
    fn constraint_violation_measures_distance() {
        let c = Constraint {
            name: "test".to_string(),
            expr: LinExpr::new().term(1.0, VarId(0)),
            sense: Sense::Le,
            rhs: 5.0,
        };
        assert_eq!(c.violation(&[4.0]), 0.0);
        assert_eq!(c.violation(&[7.0]), 2.0);
        let eq = Constraint {
            sense: Sense::Eq,
            ..c
        };
        assert_eq!(eq.violation(&[4.0]), 1.0);
    }

    #[test]
    fn objective_prices_match_economics() {
        let params = ParameterSet::constant(
            1,
            &[("load", 10.0), ("price_import", 0.25), ("rho_gas", 0.9)],
        );
        let mut config = RunConfig::baseline();
        config.simulation.horizon = 1;
        let model = DispatchModel::build(&params, &config).expect("build");
        let imp = model.var("p_imp_0").expect("p_imp_0");
        let chp = model.var("p_chp_0").expect("p_chp_0");
        let coeff_of = |id: VarId| {
            model
                .objective
                .terms
                .iter()
                .find_map(|(v, c)| (*v == id).then_some(*c))
                .unwrap_or(0.0)
        };
        assert!((coeff_of(imp) - 0.25).abs() < 1e-12);
        // gas price divided by eta_chp = 0.9
        assert!((coeff_of(chp) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (params, mut config) = instance(2);
        config.risk.cvar_alpha = 2.0;
        assert!(matches!(
            DispatchModel::build(&params, &config),
            Err(ModelError::InvalidConfig(_))
        ));
    }
}
