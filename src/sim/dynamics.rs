//! Shared physics kernel: setpoint realization and storage recursions.
//!
//! Both the episode simulator and the solver model express the same
//! physics; the functions here are the single authority for how setpoints
//! become flows and how stored energy evolves. Violations are measured on
//! the unclamped candidate energy so that an infeasible request is visible
//! to the penalty terms even though the realized state stays in bounds.

use crate::params::StepParams;
use crate::sim::types::{Decision, Flows};

/// EV battery floor as a fraction of its energy ceiling. The pack is never
/// drained below this level, and a fresh session starts here.
pub const EV_FLOOR_FRAC: f64 = 0.2;

/// Result of one storage recursion: the realized (clamped) energy and the
/// amount by which the unclamped candidate left the feasible band (kWh).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyOutcome {
    /// Energy after clamping to the feasible band (kWh).
    pub energy: f64,
    /// Out-of-band magnitude of the unclamped candidate (kWh, >= 0).
    pub violation: f64,
}

/// Realized flows plus both storage recursions for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// Physical flows after capacity gating.
    pub flows: Flows,
    /// Battery recursion outcome.
    pub battery: EnergyOutcome,
    /// EV recursion outcome.
    pub ev: EnergyOutcome,
}

/// Maps a signed grid setpoint onto exclusive (import, export) powers.
///
/// Positive setpoints scale the import capacity, negative ones the export
/// capacity; exactly one side is nonzero.
pub fn split_grid(setpoint: f64, import_cap: f64, export_cap: f64) -> (f64, f64) {
    if setpoint >= 0.0 {
        (setpoint * import_cap, 0.0)
    } else {
        (0.0, -setpoint * export_cap)
    }
}

/// Maps a signed battery setpoint onto exclusive (charge, discharge) powers.
pub fn split_storage(setpoint: f64, charge_cap: f64, discharge_cap: f64) -> (f64, f64) {
    if setpoint >= 0.0 {
        (setpoint * charge_cap, 0.0)
    } else {
        (0.0, -setpoint * discharge_cap)
    }
}

/// Realizes a decision into physical flows under the step's capacities.
///
/// EV charging is forced to zero when the EV is not plugged in. CHP heat
/// follows electrical output through the fixed heat ratio.
pub fn realize_flows(decision: &Decision, p: &StepParams) -> Flows {
    let (grid_import, grid_export) = split_grid(decision.grid, p.import_cap, p.export_cap);
    let (storage_charge, storage_discharge) =
        split_storage(decision.storage, p.storage_charge_cap, p.storage_discharge_cap);
    let chp = decision.chp * p.chp_cap;
    let ev_charge = if p.ev_available {
        decision.ev * p.ev_charge_cap
    } else {
        0.0
    };
    Flows {
        grid_import,
        grid_export,
        wind: decision.wind * p.wind_cap,
        solar: decision.solar * p.solar_cap,
        chp,
        diesel: decision.diesel * p.diesel_cap,
        storage_charge,
        storage_discharge,
        ev_charge,
        heat_output: p.chp_heat_ratio * chp,
    }
}

/// Battery energy recursion over one hourly step.
///
/// Candidate energy is `prev + eta_ch * charge - discharge / eta_dis`; the
/// realized energy is the candidate clamped to the step's band, and the
/// violation is the candidate's distance outside it.
pub fn next_battery_energy(prev: f64, charge: f64, discharge: f64, p: &StepParams) -> EnergyOutcome {
    let discharge_eff = if p.storage_discharge_eff > 0.0 {
        p.storage_discharge_eff
    } else {
        1.0
    };
    let candidate = prev + p.storage_charge_eff * charge - discharge / discharge_eff;
    let lo = p.storage_energy_min;
    let hi = p.storage_energy_max.max(lo);
    EnergyOutcome {
        energy: candidate.clamp(lo, hi),
        violation: (lo - candidate).max(0.0) + (candidate - hi).max(0.0),
    }
}

/// EV battery energy recursion over one hourly step.
///
/// A session start restarts the pack from zero before charging. When the
/// EV is absent the energy holds (charging was already gated off in
/// [`realize_flows`]). The realized energy clamps to `[floor, ceiling]`;
/// the violation only measures overflow above the ceiling, the
/// departure-readiness shortfall is a reward concern, not a physics one.
pub fn next_ev_energy(prev: f64, charge: f64, p: &StepParams) -> EnergyOutcome {
    let floor = EV_FLOOR_FRAC * p.ev_energy_max;
    let base = if p.ev_session_start { 0.0 } else { prev };
    let candidate = if p.ev_available {
        base + p.ev_charge_eff * charge
    } else {
        base
    };
    EnergyOutcome {
        energy: candidate.clamp(floor, p.ev_energy_max.max(floor)),
        violation: (candidate - p.ev_energy_max).max(0.0),
    }
}

/// Applies one full transition: decision to flows to both recursions.
pub fn transition(
    decision: &Decision,
    battery_energy: f64,
    ev_energy: f64,
    p: &StepParams,
) -> Transition {
    let flows = realize_flows(decision, p);
    let battery = next_battery_energy(
        battery_energy,
        flows.storage_charge,
        flows.storage_discharge,
        p,
    );
    let ev = next_ev_energy(ev_energy, flows.ev_charge, p);
    Transition { flows, battery, ev }
}
