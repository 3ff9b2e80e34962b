/// LP-format export for external solvers.
pub mod lp;
pub mod model;
/// Solution container and the solver backend seam.
pub mod solution;
