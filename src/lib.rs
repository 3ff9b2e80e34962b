//! Hybrid microgrid dispatch kernel.
//!
//! One shared physics and economics core serves two consumers: a
//! declarative MILP model handed to an external solver, and a reset/step
//! episode simulator with penalty-shaped rewards and a terminal tail-risk
//! adjustment. Scenario generation perturbs a parameter set with seeded
//! adverse event windows.

pub mod config;
/// CSV export for scenarios and episode histories.
pub mod io;
pub mod params;
/// Dispatch policies and rollout helper.
pub mod policy;
/// Seeded adverse-event scenario generation.
pub mod scenario;
/// Episode simulator, physics, reward, and risk modules.
pub mod sim;
/// Declarative solver model, solution handling, and LP export.
pub mod opt;
