//! Episode simulator with a reset/step interface.
//!
//! One environment owns one episode at a time. Parameters are shared
//! immutably, so running many environments in parallel over the same
//! `Arc<ParameterSet>` needs no locking.

use std::fmt;
use std::sync::Arc;

use crate::config::{RunConfig, SocStart};
use crate::params::{ParameterSet, PARAM_NAMES};
use crate::sim::dynamics;
use crate::sim::reward::{self, RewardBreakdown};
use crate::sim::risk::RiskTracker;
use crate::sim::types::{Commitment, Decision, DispatchState, ACTION_DIM, OBS_DIM};

/// Error raised by environment construction or stepping.
#[derive(Debug)]
pub enum EnvError {
    /// Action or observation length differs from the declared dimension.
    DimensionMismatch {
        /// What was being sized.
        what: &'static str,
        /// Declared dimension.
        expected: usize,
        /// Observed dimension.
        got: usize,
    },
    /// Configuration failed validation.
    InvalidConfig(String),
    /// `step` was called after the episode ended.
    EpisodeOver,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { what, expected, got } => {
                write!(f, "{what} dimension mismatch: expected {expected}, got {got}")
            }
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::EpisodeOver => write!(f, "episode is over, call reset first"),
        }
    }
}

impl std::error::Error for EnvError {}

/// Everything returned by one environment step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Observation for the next step (or the terminal observation).
    pub observation: Vec<f64>,
    /// Scalar reward; includes the CVaR settlement on the final step.
    pub reward: f64,
    /// Episode reached its horizon with this step.
    pub terminated: bool,
    /// Episode was cut short externally; never set by `step` itself,
    /// reserved for drivers that end episodes via [`MicrogridEnv::truncate`].
    pub truncated: bool,
    /// Reward decomposition for this step.
    pub breakdown: RewardBreakdown,
    /// Realized dispatch state after this step.
    pub state: DispatchState,
}

/// Initial conditions reported by `reset`.
#[derive(Debug, Clone, Copy)]
pub struct ResetInfo {
    /// Battery energy at episode start (kWh).
    pub battery_energy: f64,
    /// EV battery energy at episode start (kWh).
    pub ev_energy: f64,
    /// Episode length in steps.
    pub horizon: usize,
}

/// One completed step kept for history export.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// Step index within the episode.
    pub step: usize,
    /// Realized dispatch state.
    pub state: DispatchState,
    /// Reward decomposition.
    pub breakdown: RewardBreakdown,
    /// Reward delivered to the caller (settlement included on the last step).
    pub reward: f64,
}

/// Hourly microgrid dispatch environment.
pub struct MicrogridEnv {
    config: RunConfig,
    params: Arc<ParameterSet>,
    t: usize,
    done: bool,
    state: DispatchState,
    commitment: Commitment,
    risk: RiskTracker,
    history: Vec<StepRecord>,
}

impl MicrogridEnv {
    /// Creates an environment over a validated configuration and a shared
    /// parameter set. Call [`MicrogridEnv::reset`] before stepping.
    ///
    /// # Errors
    ///
    /// Returns `EnvError::InvalidConfig` if the configuration fails
    /// validation, including declared observation or action dimensions
    /// that differ from [`OBS_DIM`] and [`ACTION_DIM`].
    pub fn new(config: RunConfig, params: Arc<ParameterSet>) -> Result<Self, EnvError> {
        let errors = config.validate();
        if let Some(first) = errors.first() {
            return Err(EnvError::InvalidConfig(format!(
                "{} ({} problem(s) total)",
                first,
                errors.len()
            )));
        }
        let risk = RiskTracker::new(&config.risk);
        let mut env = Self {
            config,
            params,
            t: 0,
            done: true,
            state: DispatchState::default(),
            commitment: Commitment::default(),
            risk,
            history: Vec::new(),
        };
        env.state = env.initial_state();
        Ok(env)
    }

    /// Episode length in steps.
    pub fn horizon(&self) -> usize {
        self.config.simulation.horizon
    }

    /// Current step index (number of completed steps this episode).
    pub fn elapsed(&self) -> usize {
        self.t
    }

    /// Records of every completed step this episode.
    pub fn history(&self) -> &[StepRecord] {
        &self.history
    }

    /// Parameters of the step about to be taken.
    pub fn current_params(&self) -> crate::params::StepParams {
        self.params.step(self.t.min(self.horizon().saturating_sub(1)))
    }

    /// Dispatch state after the last completed step.
    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    fn initial_state(&self) -> DispatchState {
        let p0 = self.params.step(0);
        let battery_energy = match self.config.model.soc_start() {
            SocStart::MinBound => p0.storage_energy_min,
            SocStart::Empty => 0.0,
        };
        // EV starts from zero; the recursion's clamp floor takes over at
        // the first step.
        DispatchState {
            battery_energy,
            ev_energy: 0.0,
            ..DispatchState::default()
        }
    }

    /// Starts a new episode and returns the first observation.
    pub fn reset(&mut self) -> (Vec<f64>, ResetInfo) {
        self.t = 0;
        self.done = false;
        self.state = self.initial_state();
        self.commitment = Commitment::default();
        self.risk.reset();
        self.history.clear();
        let info = ResetInfo {
            battery_energy: self.state.battery_energy,
            ev_energy: self.state.ev_energy,
            horizon: self.horizon(),
        };
        (self.observation(), info)
    }

    /// Observation layout: every parameter value for the current step in
    /// canonical order, then the previous dispatch state.
    pub fn observation(&self) -> Vec<f64> {
        let t = self.t.min(self.horizon().saturating_sub(1));
        let mut obs = Vec::with_capacity(OBS_DIM);
        for name in PARAM_NAMES {
            obs.push(self.params.value(name, t));
        }
        obs.extend_from_slice(&self.state.as_vector());
        debug_assert_eq!(obs.len(), OBS_DIM);
        obs
    }

    /// Advances the episode by one step.
    ///
    /// # Errors
    ///
    /// Returns `EnvError::DimensionMismatch` for a wrong-length action and
    /// `EnvError::EpisodeOver` after the horizon was reached.
    pub fn step(&mut self, action: &[f64]) -> Result<StepOutcome, EnvError> {
        if self.done {
            return Err(EnvError::EpisodeOver);
        }
        if action.len() != ACTION_DIM {
            return Err(EnvError::DimensionMismatch {
                what: "action",
                expected: ACTION_DIM,
                got: action.len(),
            });
        }

        let p = self.params.step(self.t);
        let decision = Decision::from_action(action);
        let transition = dynamics::transition(
            &decision,
            self.state.battery_energy,
            self.state.ev_energy,
            &p,
        );

        let commitment = Commitment::from_flows(&transition.flows);
        let startups = commitment.startups(&self.commitment);
        let breakdown = reward::compute(
            &transition.flows,
            &transition.battery,
            &transition.ev,
            startups,
            &p,
            &self.config.weights,
        );
        self.risk.record(&breakdown);

        self.state = DispatchState {
            battery_energy: transition.battery.energy,
            ev_energy: transition.ev.energy,
            commitment,
            grid_importing: decision.grid >= 0.0,
            storage_charging: transition.flows.storage_charge > 0.0,
            flows: transition.flows,
        };
        self.commitment = commitment;
        self.t += 1;

        let terminated = self.t >= self.horizon();
        let mut reward = breakdown.reward;
        if terminated {
            self.done = true;
            reward -= self.risk.terminal_adjustment();
        }

        self.history.push(StepRecord {
            step: self.t - 1,
            state: self.state.clone(),
            breakdown,
            reward,
        });

        Ok(StepOutcome {
            observation: self.observation(),
            reward,
            terminated,
            truncated: false,
            breakdown,
            state: self.state.clone(),
        })
    }

    /// Ends the episode before the horizon and settles the tail-risk
    /// adjustment that a terminal step would have applied. Returns that
    /// adjustment (0 for an episode with no recorded steps or losses).
    pub fn truncate(&mut self) -> f64 {
        if self.done {
            return 0.0;
        }
        self.done = true;
        self.risk.terminal_adjustment()
    }
}
