//! Tail-risk tracking: per-step loss pooling and CVaR aggregation.

use crate::config::RiskConfig;
use crate::sim::reward::RewardBreakdown;

/// Conditional value-at-risk of a loss sample at tail probability `alpha`.
///
/// Returns the mean of the worst `ceil(alpha * n)` losses (at least one),
/// so shrinking any tail loss never increases the result. An empty sample
/// has no tail and scores 0.
pub fn cvar(losses: &[f64], alpha: f64) -> f64 {
    if losses.is_empty() {
        return 0.0;
    }
    let mut sorted = losses.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let tail = ((alpha * n as f64).ceil() as usize).clamp(1, n);
    let worst = &sorted[n - tail..];
    worst.iter().sum::<f64>() / tail as f64
}

/// One loss channel pooled into the per-step risk sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Power-balance residual penalty.
    PenaltyLoad,
    /// Heat-deficit penalty.
    PenaltyHeat,
    /// Battery bound-violation penalty.
    PenaltyBatt,
    /// EV bound-violation penalty.
    PenaltyEv,
    /// Load-normalized monetary cost.
    NormalizedCost,
    /// Raw monetary cost.
    TrueCost,
}

impl Signal {
    /// Parses a configuration signal name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "penalty_load" => Some(Self::PenaltyLoad),
            "penalty_heat" => Some(Self::PenaltyHeat),
            "penalty_batt" => Some(Self::PenaltyBatt),
            "penalty_ev" => Some(Self::PenaltyEv),
            "normalized_cost" => Some(Self::NormalizedCost),
            "true_cost" => Some(Self::TrueCost),
            _ => None,
        }
    }

    /// Reads this channel out of a step's reward decomposition.
    pub fn extract(self, breakdown: &RewardBreakdown) -> f64 {
        match self {
            Self::PenaltyLoad => breakdown.penalty_load,
            Self::PenaltyHeat => breakdown.penalty_heat,
            Self::PenaltyBatt => breakdown.penalty_batt,
            Self::PenaltyEv => breakdown.penalty_ev,
            Self::NormalizedCost => breakdown.normalized_cost,
            Self::TrueCost => breakdown.true_cost,
        }
    }
}

/// Accumulates one pooled loss per step and settles a CVaR adjustment at
/// episode end.
#[derive(Debug, Clone)]
pub struct RiskTracker {
    alpha: f64,
    weight: f64,
    signals: Vec<Signal>,
    losses: Vec<f64>,
}

impl RiskTracker {
    /// Builds a tracker from validated risk settings; unknown signal names
    /// were already rejected by configuration validation and are skipped.
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            alpha: config.cvar_alpha,
            weight: config.cvar_weight,
            signals: config
                .signals
                .iter()
                .filter_map(|name| Signal::from_name(name))
                .collect(),
            losses: Vec::new(),
        }
    }

    /// Records the pooled loss of one step.
    pub fn record(&mut self, breakdown: &RewardBreakdown) {
        let loss = self
            .signals
            .iter()
            .map(|s| s.extract(breakdown))
            .sum::<f64>();
        self.losses.push(loss);
    }

    /// Number of steps recorded so far.
    pub fn len(&self) -> usize {
        self.losses.len()
    }

    /// Whether any step has been recorded.
    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }

    /// Weighted CVaR of the recorded losses; subtract this from the final
    /// step's reward. A violation-free episode settles to 0.
    pub fn terminal_adjustment(&self) -> f64 {
        self.weight * cvar(&self.losses, self.alpha)
    }

    /// Clears the recorded sample for a new episode.
    pub fn reset(&mut self) {
        self.losses.clear();
    }
}
