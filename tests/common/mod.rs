//! Shared test fixtures for integration tests.

use microgrid_dispatch::config::RunConfig;
use microgrid_dispatch::params::ParameterSet;

/// Run configuration with a short horizon and no scenario events.
pub fn quiet_config(horizon: usize) -> RunConfig {
    let mut config = RunConfig::baseline();
    config.simulation.horizon = horizon;
    config.events.clear();
    config
}

/// Flat instance: constant load and prices, heat demand, EV present all
/// horizon with a departure requirement.
pub fn flat_instance(horizon: usize, load: f64) -> ParameterSet {
    ParameterSet::constant(
        horizon,
        &[
            ("load", load),
            ("price_import", 0.25),
            ("price_export", 0.08),
            ("price_ev", 0.30),
            ("rho_gas", 0.12),
            ("rho_fuel", 0.45),
            ("H_demand", 12.0),
            ("Eev_required", 40.0),
            ("A", 1.0),
        ],
    )
}
