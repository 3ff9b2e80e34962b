//! TOML-based run configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::sim::types::{ACTION_DIM, OBS_DIM};

/// Top-level run configuration parsed from TOML.
///
/// All fields have defaults matching the baseline instance. Load from TOML
/// with [`RunConfig::from_toml_file`] or use [`RunConfig::baseline`]. The
/// configuration is immutable once handed to an environment or model
/// builder; nothing reads weights or horizon from process-wide state.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Horizon, seed, and declared vector dimensions.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Penalty weights combined into the per-step reward.
    #[serde(default)]
    pub weights: PenaltyWeights,
    /// Tail-risk (CVaR) settings.
    #[serde(default)]
    pub risk: RiskConfig,
    /// Formulation variants shared by simulator and solver model.
    #[serde(default)]
    pub model: ModelConfig,
    /// Scenario event menu applied by the generator.
    #[serde(default)]
    pub events: Vec<EventConfig>,
}

/// Horizon, seed, and declared vector dimensions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of hourly steps per episode (must be > 0).
    pub horizon: usize,
    /// Master random seed.
    pub seed: u64,
    /// Declared observation vector length; checked at env construction.
    pub obs_dim: usize,
    /// Declared action vector length; checked at env construction.
    pub action_dim: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            horizon: 48,
            seed: 19,
            obs_dim: OBS_DIM,
            action_dim: ACTION_DIM,
        }
    }
}

/// Weights applied to the four normalized constraint penalties.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PenaltyWeights {
    /// Power-balance residual weight.
    pub load_balance: f64,
    /// Heat-deficit weight.
    pub heat_balance: f64,
    /// Battery bound-violation weight.
    pub battery_bounds: f64,
    /// EV bound-violation weight (active on leave-possible steps).
    pub ev_bounds: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            load_balance: 5.0,
            heat_balance: 2.0,
            battery_bounds: 1.0,
            ev_bounds: 1.0,
        }
    }
}

/// Tail-risk settings for the end-of-episode CVaR adjustment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskConfig {
    /// Tail probability: CVaR averages the worst `cvar_alpha` fraction.
    pub cvar_alpha: f64,
    /// Weight of the CVaR term subtracted from the terminal reward.
    pub cvar_weight: f64,
    /// Breakdown signals pooled per step before CVaR aggregation.
    pub signals: Vec<String>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            cvar_alpha: 0.05,
            cvar_weight: 5.0,
            signals: vec![
                "penalty_load".to_string(),
                "penalty_heat".to_string(),
                "penalty_batt".to_string(),
                "penalty_ev".to_string(),
            ],
        }
    }
}

/// Battery state-of-charge initial condition at episode/model start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocStart {
    /// Start at the step-0 lower energy bound.
    MinBound,
    /// Start empty (zero energy).
    Empty,
}

/// Encoding of the EV departure-readiness requirement in the solver model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvLeave {
    /// Conditional per-step constraint on leave-possible steps.
    PerStep,
    /// One cumulative delivered-energy constraint over the horizon.
    Cumulative,
}

/// Formulation variants shared by the simulator and the solver model.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Battery SOC start convention: `"min_bound"` or `"empty"`.
    pub soc_start: String,
    /// EV leave-requirement strategy: `"per_step"` or `"cumulative"`.
    pub ev_leave: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            soc_start: "min_bound".to_string(),
            ev_leave: "per_step".to_string(),
        }
    }
}

impl ModelConfig {
    /// Parsed SOC start convention. `"empty"` selects [`SocStart::Empty`];
    /// any other validated value means [`SocStart::MinBound`].
    pub fn soc_start(&self) -> SocStart {
        if self.soc_start == "empty" {
            SocStart::Empty
        } else {
            SocStart::MinBound
        }
    }

    /// Parsed EV leave strategy.
    pub fn ev_leave(&self) -> EvLeave {
        if self.ev_leave == "cumulative" {
            EvLeave::Cumulative
        } else {
            EvLeave::PerStep
        }
    }
}

/// One entry of the scenario event menu.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventConfig {
    /// Event kind: `"outage"`, `"storage_failure"`, or `"load_spike"`.
    pub kind: String,
    /// Number of non-overlapping windows to insert.
    pub count: usize,
    /// Minimum window duration in steps (inclusive).
    pub min_duration: usize,
    /// Maximum window duration in steps (inclusive).
    pub max_duration: usize,
    /// Lower bound of the load multiplication factor (load_spike only).
    pub spike_min: f64,
    /// Upper bound of the load multiplication factor (load_spike only).
    pub spike_max: f64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            kind: "outage".to_string(),
            count: 1,
            min_duration: 2,
            max_duration: 6,
            spike_min: 1.5,
            spike_max: 2.5,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.horizon"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Signal names accepted in `risk.signals`.
pub const RISK_SIGNALS: &[&str] = &[
    "penalty_load",
    "penalty_heat",
    "penalty_batt",
    "penalty_ev",
    "normalized_cost",
    "true_cost",
];

impl RunConfig {
    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "stress"];

    /// Returns the baseline configuration: 48-hour horizon, one short
    /// outage window, default weights and risk settings.
    pub fn baseline() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            weights: PenaltyWeights::default(),
            risk: RiskConfig::default(),
            model: ModelConfig::default(),
            events: vec![EventConfig::default()],
        }
    }

    /// Returns the stress preset: week-long horizon, more and longer
    /// adverse windows, heavier tail-risk weighting.
    pub fn stress() -> Self {
        Self {
            simulation: SimulationConfig {
                horizon: 168,
                ..SimulationConfig::default()
            },
            risk: RiskConfig {
                cvar_alpha: 0.1,
                cvar_weight: 10.0,
                ..RiskConfig::default()
            },
            events: vec![
                EventConfig {
                    kind: "outage".to_string(),
                    count: 2,
                    min_duration: 6,
                    max_duration: 24,
                    ..EventConfig::default()
                },
                EventConfig {
                    kind: "storage_failure".to_string(),
                    count: 1,
                    min_duration: 6,
                    max_duration: 12,
                    ..EventConfig::default()
                },
                EventConfig {
                    kind: "load_spike".to_string(),
                    count: 2,
                    min_duration: 1,
                    max_duration: 3,
                    spike_min: 1.8,
                    spike_max: 3.0,
                },
            ],
            ..Self::baseline()
        }
    }

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "stress" => Ok(Self::stress()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is
    /// invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown
    /// fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let s = &self.simulation;

        if s.horizon == 0 {
            errors.push(ConfigError {
                field: "simulation.horizon".into(),
                message: "must be > 0".into(),
            });
        }
        if s.obs_dim != OBS_DIM {
            errors.push(ConfigError {
                field: "simulation.obs_dim".into(),
                message: format!("must be {OBS_DIM}, got {}", s.obs_dim),
            });
        }
        if s.action_dim != ACTION_DIM {
            errors.push(ConfigError {
                field: "simulation.action_dim".into(),
                message: format!("must be {ACTION_DIM}, got {}", s.action_dim),
            });
        }

        let w = &self.weights;
        for (field, value) in [
            ("weights.load_balance", w.load_balance),
            ("weights.heat_balance", w.heat_balance),
            ("weights.battery_bounds", w.battery_bounds),
            ("weights.ev_bounds", w.ev_bounds),
        ] {
            if !(value >= 0.0) {
                errors.push(ConfigError {
                    field: field.into(),
                    message: "must be >= 0".into(),
                });
            }
        }

        let r = &self.risk;
        if !(r.cvar_alpha > 0.0 && r.cvar_alpha < 1.0) {
            errors.push(ConfigError {
                field: "risk.cvar_alpha".into(),
                message: "must be in (0.0, 1.0)".into(),
            });
        }
        if !(r.cvar_weight >= 0.0) {
            errors.push(ConfigError {
                field: "risk.cvar_weight".into(),
                message: "must be >= 0".into(),
            });
        }
        for signal in &r.signals {
            if !RISK_SIGNALS.contains(&signal.as_str()) {
                errors.push(ConfigError {
                    field: "risk.signals".into(),
                    message: format!(
                        "unknown signal \"{signal}\", available: {}",
                        RISK_SIGNALS.join(", ")
                    ),
                });
            }
        }

        let m = &self.model;
        if m.soc_start != "min_bound" && m.soc_start != "empty" {
            errors.push(ConfigError {
                field: "model.soc_start".into(),
                message: format!(
                    "must be \"min_bound\" or \"empty\", got \"{}\"",
                    m.soc_start
                ),
            });
        }
        if m.ev_leave != "per_step" && m.ev_leave != "cumulative" {
            errors.push(ConfigError {
                field: "model.ev_leave".into(),
                message: format!(
                    "must be \"per_step\" or \"cumulative\", got \"{}\"",
                    m.ev_leave
                ),
            });
        }

        for (i, e) in self.events.iter().enumerate() {
            if !matches!(e.kind.as_str(), "outage" | "storage_failure" | "load_spike") {
                errors.push(ConfigError {
                    field: format!("events[{i}].kind"),
                    message: format!(
                        "must be \"outage\", \"storage_failure\", or \"load_spike\", got \"{}\"",
                        e.kind
                    ),
                });
            }
            if e.min_duration == 0 {
                errors.push(ConfigError {
                    field: format!("events[{i}].min_duration"),
                    message: "must be > 0".into(),
                });
            }
            if e.min_duration > e.max_duration {
                errors.push(ConfigError {
                    field: format!("events[{i}].min_duration"),
                    message: "must be <= max_duration".into(),
                });
            }
            if e.kind == "load_spike" && e.spike_min > e.spike_max {
                errors.push(ConfigError {
                    field: format!("events[{i}].spike_min"),
                    message: "must be <= spike_max".into(),
                });
            }
        }

        errors
    }
}
