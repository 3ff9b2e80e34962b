//! Economics kernel and per-step reward.
//!
//! The cost terms here are the same ones the solver model sums in its
//! objective; the reward adds normalized constraint penalties on top, so a
//! dispatch with a smaller residual or cheaper energy mix always scores a
//! strictly better reward.

use crate::config::PenaltyWeights;
use crate::params::StepParams;
use crate::sim::dynamics::EnergyOutcome;
use crate::sim::types::Flows;

/// Guard against division by a zero normalizer.
pub const EPS: f64 = 1e-6;

/// Monetary cost terms for one step. Revenues are stored positive and
/// subtracted in [`CostBreakdown::total`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostBreakdown {
    /// Grid import energy cost.
    pub import_cost: f64,
    /// Grid export revenue.
    pub export_revenue: f64,
    /// EV charging revenue.
    pub ev_revenue: f64,
    /// Wind operation and maintenance cost.
    pub wind_om: f64,
    /// Solar operation and maintenance cost.
    pub solar_om: f64,
    /// CHP fuel cost.
    pub chp_fuel: f64,
    /// Diesel fuel cost.
    pub diesel_fuel: f64,
    /// Battery degradation cost on discharged energy.
    pub degradation: f64,
    /// Startup cost for off-to-on transitions.
    pub startup: f64,
}

impl CostBreakdown {
    /// Net cost: all costs minus both revenues.
    pub fn total(&self) -> f64 {
        self.import_cost
            + self.wind_om
            + self.solar_om
            + self.chp_fuel
            + self.diesel_fuel
            + self.degradation
            + self.startup
            - self.export_revenue
            - self.ev_revenue
    }
}

/// Computes the step's monetary cost terms from realized flows.
///
/// Fuel costs divide by unit efficiency, so a less efficient unit burns
/// more fuel per delivered kWh. Zero efficiencies are treated as 1 to keep
/// degenerate parameter sets finite.
pub fn step_cost(flows: &Flows, startups: u32, p: &StepParams) -> CostBreakdown {
    let chp_eff = if p.chp_efficiency > 0.0 { p.chp_efficiency } else { 1.0 };
    let dg_eff = if p.diesel_efficiency > 0.0 { p.diesel_efficiency } else { 1.0 };
    CostBreakdown {
        import_cost: p.price_import * flows.grid_import,
        export_revenue: p.price_export * flows.grid_export,
        ev_revenue: p.price_ev * flows.ev_charge,
        wind_om: p.om_cost_wind * flows.wind,
        solar_om: p.om_cost_solar * flows.solar,
        chp_fuel: p.gas_price * flows.chp / chp_eff,
        diesel_fuel: p.diesel_price * flows.diesel / dg_eff,
        degradation: p.degradation_cost * flows.storage_discharge,
        startup: p.startup_cost * f64::from(startups),
    }
}

/// Full reward decomposition for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RewardBreakdown {
    /// Net monetary cost before normalization.
    pub true_cost: f64,
    /// Cost normalized by the step's total (electrical + heat) demand.
    pub normalized_cost: f64,
    /// Power-balance residual, normalized by load.
    pub penalty_load: f64,
    /// Heat deficit, normalized by heat demand.
    pub penalty_heat: f64,
    /// Battery band violation, normalized by the band width.
    pub penalty_batt: f64,
    /// EV overflow plus departure shortfall, normalized by the requirement.
    pub penalty_ev: f64,
    /// Scalar reward: negative weighted sum of cost and penalties.
    pub reward: f64,
}

/// Computes the reward for one realized step.
///
/// Storage violations are the unclamped out-of-band magnitudes from the
/// recursions. The EV penalty only counts on steps where the EV may
/// leave; its requirement is what makes a shortfall meaningful there.
pub fn compute(
    flows: &Flows,
    battery: &EnergyOutcome,
    ev: &EnergyOutcome,
    startups: u32,
    p: &StepParams,
    weights: &PenaltyWeights,
) -> RewardBreakdown {
    let true_cost = step_cost(flows, startups, p).total();
    let normalized_cost = true_cost / (p.load + p.heat_demand + EPS);

    let residual = flows.supply() - p.load - flows.sinks();
    let penalty_load = residual.abs() / (p.load + EPS);

    let deficit = (p.heat_demand - flows.heat_output).max(0.0);
    let penalty_heat = deficit / (p.heat_demand + EPS);

    let band = (p.storage_energy_max - p.storage_energy_min).max(0.0);
    let penalty_batt = battery.violation / (band + EPS);

    let penalty_ev = if p.ev_leave_possible {
        let shortfall = (p.ev_energy_required - ev.energy).max(0.0);
        (ev.violation + shortfall) / (p.ev_energy_required + EPS)
    } else {
        0.0
    };

    let reward = -normalized_cost
        - weights.load_balance * penalty_load
        - weights.heat_balance * penalty_heat
        - weights.battery_bounds * penalty_batt
        - weights.ev_bounds * penalty_ev;

    RewardBreakdown {
        true_cost,
        normalized_cost,
        penalty_load,
        penalty_heat,
        penalty_batt,
        penalty_ev,
        reward,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterSet;

    fn params(overrides: &[(&str, f64)]) -> StepParams {
        ParameterSet::constant(1, overrides).step(0)
    }

    fn balanced_flows(load: f64) -> Flows {
        Flows {
            grid_import: load,
            ..Flows::default()
        }
    }

    #[test]
    fn cost_sums_terms_and_subtracts_revenue() {
        let c = CostBreakdown {
            import_cost: 10.0,
            export_revenue: 3.0,
            ev_revenue: 1.0,
            chp_fuel: 2.0,
            ..CostBreakdown::default()
        };
        assert!((c.total() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn fuel_cost_divides_by_efficiency() {
        let p = params(&[("rho_gas", 0.5), ("rho_fuel", 1.0)]);
        let flows = Flows {
            chp: 9.0,
            diesel: 9.0,
            ..Flows::default()
        };
        let c = step_cost(&flows, 0, &p);
        // eta 0.9 for both units
        assert!((c.chp_fuel - 5.0).abs() < 1e-12);
        assert!((c.diesel_fuel - 10.0).abs() < 1e-12);
    }

    #[test]
    fn startup_cost_scales_with_transitions() {
        let p = params(&[("C_startup", 7.0)]);
        let c = step_cost(&Flows::default(), 2, &p);
        assert!((c.startup - 14.0).abs() < 1e-12);
    }

    #[test]
    fn balanced_step_has_no_load_penalty() {
        let p = params(&[("load", 20.0), ("price_import", 0.1)]);
        let flows = balanced_flows(20.0);
        let r = compute(
            &flows,
            &EnergyOutcome { energy: 0.0, violation: 0.0 },
            &EnergyOutcome { energy: 14.0, violation: 0.0 },
            0,
            &p,
            &PenaltyWeights::default(),
        );
        assert_eq!(r.penalty_load, 0.0);
        assert!((r.true_cost - 2.0).abs() < 1e-12);
        assert!(r.reward < 0.0);
    }

    #[test]
    fn imbalance_is_penalized_proportionally() {
        let p = params(&[("load", 10.0)]);
        let flows = Flows {
            grid_import: 5.0,
            ..Flows::default()
        };
        let r = compute(
            &flows,
            &EnergyOutcome { energy: 0.0, violation: 0.0 },
            &EnergyOutcome { energy: 14.0, violation: 0.0 },
            0,
            &p,
            &PenaltyWeights::default(),
        );
        assert!((r.penalty_load - 0.5).abs() < 1e-4);
    }

    #[test]
    fn heat_deficit_penalized_surplus_not() {
        let p = params(&[("H_demand", 10.0)]);
        let short = Flows { heat_output: 6.0, ..Flows::default() };
        let r = compute(
            &short,
            &EnergyOutcome { energy: 0.0, violation: 0.0 },
            &EnergyOutcome { energy: 14.0, violation: 0.0 },
            0,
            &p,
            &PenaltyWeights::default(),
        );
        assert!((r.penalty_heat - 0.4).abs() < 1e-4);

        let surplus = Flows { heat_output: 15.0, ..Flows::default() };
        let r = compute(
            &surplus,
            &EnergyOutcome { energy: 0.0, violation: 0.0 },
            &EnergyOutcome { energy: 14.0, violation: 0.0 },
            0,
            &p,
            &PenaltyWeights::default(),
        );
        assert_eq!(r.penalty_heat, 0.0);
    }

    #[test]
    fn ev_shortfall_counts_only_on_leave_steps() {
        let ev = EnergyOutcome { energy: 30.0, violation: 0.0 };
        let battery = EnergyOutcome { energy: 0.0, violation: 0.0 };
        let weights = PenaltyWeights::default();

        let stay = params(&[("Eev_required", 50.0), ("leave_possible", 0.0)]);
        let r = compute(&Flows::default(), &battery, &ev, 0, &stay, &weights);
        assert_eq!(r.penalty_ev, 0.0);

        let leave = params(&[("Eev_required", 50.0), ("leave_possible", 1.0)]);
        let r = compute(&Flows::default(), &battery, &ev, 0, &leave, &weights);
        assert!((r.penalty_ev - 20.0 / (50.0 + EPS)).abs() < 1e-9);
    }

    #[test]
    fn battery_violation_flows_into_penalty() {
        let p = params(&[]);
        let battery = EnergyOutcome { energy: 300.0, violation: 30.0 };
        let r = compute(
            &Flows::default(),
            &battery,
            &EnergyOutcome { energy: 14.0, violation: 0.0 },
            0,
            &p,
            &PenaltyWeights::default(),
        );
        // band width: Ees_max 300 minus Ees_min 0
        assert!((r.penalty_batt - 30.0 / (300.0 + EPS)).abs() < 1e-9);
    }

    #[test]
    fn reward_is_monotone_in_each_penalty() {
        let p = params(&[("load", 10.0)]);
        let weights = PenaltyWeights::default();
        let ev = EnergyOutcome { energy: 14.0, violation: 0.0 };
        let clean = compute(
            &balanced_flows(10.0),
            &EnergyOutcome { energy: 0.0, violation: 0.0 },
            &ev,
            0,
            &p,
            &weights,
        );
        let violated = compute(
            &balanced_flows(10.0),
            &EnergyOutcome { energy: 0.0, violation: 50.0 },
            &ev,
            0,
            &p,
            &weights,
        );
        assert!(violated.reward < clean.reward);
    }
}
