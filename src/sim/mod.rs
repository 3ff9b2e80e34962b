/// Shared physics kernel: setpoint realization and storage recursions.
pub mod dynamics;
pub mod env;
/// Economics kernel and per-step reward.
pub mod reward;
/// Tail-risk pooling and CVaR aggregation.
pub mod risk;
pub mod types;
