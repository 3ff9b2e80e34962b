//! Core dispatch types: actions, setpoints, flows, and the per-step state.

use std::fmt;

use crate::params::PARAM_NAMES;

/// Action vector length: grid, storage, wind, CHP, diesel, EV, solar.
pub const ACTION_DIM: usize = 7;

/// Number of state components appended to the observation.
pub const STATE_DIM: usize = 16;

/// Observation vector length: all parameter values for the current step
/// followed by the previous step's dispatch state.
pub const OBS_DIM: usize = PARAM_NAMES.len() + STATE_DIM;

/// Normalized control setpoints decoded from one action vector.
///
/// `grid` and `storage` are signed fractions in `[-1, 1]` (positive means
/// import / charge); the rest are unit-output fractions in `[0, 1]`.
/// Out-of-range components are clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// Grid exchange fraction: positive scales import, negative export.
    pub grid: f64,
    /// Battery fraction: positive scales charging, negative discharging.
    pub storage: f64,
    /// Wind output as a fraction of capacity.
    pub wind: f64,
    /// CHP output as a fraction of capacity.
    pub chp: f64,
    /// Diesel output as a fraction of capacity.
    pub diesel: f64,
    /// EV charging as a fraction of capacity.
    pub ev: f64,
    /// Solar output as a fraction of capacity.
    pub solar: f64,
}

impl Decision {
    /// Decodes an action slice of length [`ACTION_DIM`], clamping each
    /// component to its documented range.
    ///
    /// # Panics
    ///
    /// Panics if `action` does not have exactly [`ACTION_DIM`] entries;
    /// the environment validates dimensions before decoding.
    pub fn from_action(action: &[f64]) -> Self {
        assert_eq!(action.len(), ACTION_DIM, "action must have {ACTION_DIM} entries");
        Self {
            grid: action[0].clamp(-1.0, 1.0),
            storage: action[1].clamp(-1.0, 1.0),
            wind: action[2].clamp(0.0, 1.0),
            chp: action[3].clamp(0.0, 1.0),
            diesel: action[4].clamp(0.0, 1.0),
            ev: action[5].clamp(0.0, 1.0),
            solar: action[6].clamp(0.0, 1.0),
        }
    }

    /// Re-encodes the decision as an action vector.
    pub fn to_action(self) -> [f64; ACTION_DIM] {
        [
            self.grid,
            self.storage,
            self.wind,
            self.chp,
            self.diesel,
            self.ev,
            self.solar,
        ]
    }
}

/// Physical power flows realized for one step (kW, all non-negative).
///
/// Import/export and charge/discharge are mutually exclusive by
/// construction: a signed setpoint maps onto exactly one side.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Flows {
    /// Power drawn from the grid.
    pub grid_import: f64,
    /// Power sold to the grid.
    pub grid_export: f64,
    /// Wind generation.
    pub wind: f64,
    /// Solar generation.
    pub solar: f64,
    /// CHP electrical output.
    pub chp: f64,
    /// Diesel generator output.
    pub diesel: f64,
    /// Battery charging power.
    pub storage_charge: f64,
    /// Battery discharging power.
    pub storage_discharge: f64,
    /// EV charging power.
    pub ev_charge: f64,
    /// CHP thermal output (kW thermal).
    pub heat_output: f64,
}

impl Flows {
    /// Total supply into the bus: generation, import, and discharge.
    pub fn supply(&self) -> f64 {
        self.grid_import
            + self.wind
            + self.solar
            + self.chp
            + self.diesel
            + self.storage_discharge
    }

    /// Total draw from the bus: load-side sinks excluding the load itself.
    pub fn sinks(&self) -> f64 {
        self.grid_export + self.storage_charge + self.ev_charge
    }
}

/// On/off status of the startup-costed dispatchable units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Commitment {
    /// CHP is producing this step.
    pub chp_on: bool,
    /// Diesel generator is producing this step.
    pub diesel_on: bool,
}

impl Commitment {
    /// Derives the commitment from realized flows; any strictly positive
    /// output counts as on.
    pub fn from_flows(flows: &Flows) -> Self {
        Self {
            chp_on: flows.chp > 0.0,
            diesel_on: flows.diesel > 0.0,
        }
    }

    /// Number of off-to-on transitions relative to the previous step.
    pub fn startups(&self, prev: &Commitment) -> u32 {
        u32::from(self.chp_on && !prev.chp_on) + u32::from(self.diesel_on && !prev.diesel_on)
    }
}

/// Complete record of one dispatch step, kept as the trailing part of the
/// next observation: nine electrical flows, CHP heat, both stored
/// energies, and four mode/commitment binaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchState {
    /// Realized power flows.
    pub flows: Flows,
    /// Battery energy after the step (kWh).
    pub battery_energy: f64,
    /// EV battery energy after the step (kWh).
    pub ev_energy: f64,
    /// CHP/diesel commitment this step.
    pub commitment: Commitment,
    /// Grid mode: the import side was selected. A zero grid setpoint
    /// counts as import mode, only a strictly negative one as export.
    pub grid_importing: bool,
    /// Storage mode: the step charged (rather than discharged or idled).
    pub storage_charging: bool,
}

impl DispatchState {
    /// Flattens the state into its fixed [`STATE_DIM`]-component layout;
    /// binaries render as 0/1.
    pub fn as_vector(&self) -> [f64; STATE_DIM] {
        let f = &self.flows;
        [
            f.grid_import,
            f.grid_export,
            f.wind,
            f.solar,
            f.chp,
            f.diesel,
            f.storage_charge,
            f.storage_discharge,
            f.ev_charge,
            f.heat_output,
            self.battery_energy,
            self.ev_energy,
            f64::from(u8::from(self.commitment.chp_on)),
            f64::from(u8::from(self.commitment.diesel_on)),
            f64::from(u8::from(self.grid_importing)),
            f64::from(u8::from(self.storage_charging)),
        ]
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fl = &self.flows;
        write!(
            f,
            "grid={:>6.2}/{:>6.2} kW | wt={:.2} pv={:.2} chp={:.2} dg={:.2} | \
             es={:.2}/{:.2} ({:.1} kWh) | ev={:.2} ({:.1} kWh) | heat={:.2}",
            fl.grid_import,
            fl.grid_export,
            fl.wind,
            fl.solar,
            fl.chp,
            fl.diesel,
            fl.storage_charge,
            fl.storage_discharge,
            self.battery_energy,
            fl.ev_charge,
            self.ev_energy,
            fl.heat_output,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obs_dim_covers_params_and_state() {
        assert_eq!(OBS_DIM, 33 + STATE_DIM);
        assert_eq!(OBS_DIM, 49);
    }

    #[test]
    fn decision_clamps_out_of_range_components() {
        let d = Decision::from_action(&[2.0, -3.0, 1.5, -0.5, 0.3, 0.9, 1.0]);
        assert_eq!(d.grid, 1.0);
        assert_eq!(d.storage, -1.0);
        assert_eq!(d.wind, 1.0);
        assert_eq!(d.chp, 0.0);
        assert_eq!(d.diesel, 0.3);
        assert_eq!(d.ev, 0.9);
        assert_eq!(d.solar, 1.0);
    }

    #[test]
    #[should_panic]
    fn decision_wrong_length_panics() {
        Decision::from_action(&[0.0; 3]);
    }

    #[test]
    fn decision_roundtrip() {
        let d = Decision::from_action(&[0.5, -0.25, 0.1, 0.2, 0.3, 0.4, 0.5]);
        let a = d.to_action();
        assert_eq!(Decision::from_action(&a), d);
    }

    #[test]
    fn commitment_counts_startups() {
        let prev = Commitment {
            chp_on: false,
            diesel_on: true,
        };
        let next = Commitment {
            chp_on: true,
            diesel_on: true,
        };
        assert_eq!(next.startups(&prev), 1);
        assert_eq!(prev.startups(&next), 0);
        assert_eq!(next.startups(&Commitment::default()), 2);
    }

    #[test]
    fn commitment_from_flows() {
        let flows = Flows {
            chp: 5.0,
            diesel: 0.0,
            ..Flows::default()
        };
        let c = Commitment::from_flows(&flows);
        assert!(c.chp_on);
        assert!(!c.diesel_on);
    }

    #[test]
    fn state_vector_has_fixed_layout() {
        let state = DispatchState {
            flows: Flows {
                grid_import: 1.0,
                wind: 2.0,
                ..Flows::default()
            },
            battery_energy: 10.0,
            ev_energy: 14.0,
            commitment: Commitment {
                chp_on: true,
                diesel_on: false,
            },
            grid_importing: true,
            storage_charging: false,
        };
        let v = state.as_vector();
        assert_eq!(v.len(), STATE_DIM);
        assert_eq!(v[0], 1.0);
        assert_eq!(v[2], 2.0);
        assert_eq!(v[10], 10.0);
        assert_eq!(v[11], 14.0);
        assert_eq!(v[12], 1.0);
        assert_eq!(v[13], 0.0);
        assert_eq!(v[14], 1.0);
        assert_eq!(v[15], 0.0);
    }

    #[test]
    fn flows_supply_and_sinks() {
        let f = Flows {
            grid_import: 10.0,
            grid_export: 2.0,
            wind: 5.0,
            solar: 3.0,
            chp: 4.0,
            diesel: 1.0,
            storage_charge: 6.0,
            storage_discharge: 2.5,
            ev_charge: 7.0,
            heat_output: 3.2,
        };
        assert!((f.supply() - 25.5).abs() < 1e-12);
        assert!((f.sinks() - 15.0).abs() < 1e-12);
    }

    #[test]
    fn display_does_not_panic() {
        let s = format!("{}", DispatchState::default());
        assert!(!s.is_empty());
    }
}
