//! Solver seam: solution container, feasibility checks, and the backend
//! trait an external MILP solver implements.

use std::collections::BTreeMap;
use std::fmt;

use crate::opt::model::DispatchModel;

/// Error raised by a solver backend.
#[derive(Debug)]
pub enum SolveError {
    /// The instance has no feasible point.
    Infeasible,
    /// The backend failed for its own reasons.
    Backend(String),
    /// The returned assignment lacks a model variable.
    MissingValue(String),
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infeasible => write!(f, "solve error: model is infeasible"),
            Self::Backend(msg) => write!(f, "solve error: backend: {msg}"),
            Self::MissingValue(name) => {
                write!(f, "solve error: no value for variable \"{name}\"")
            }
        }
    }
}

impl std::error::Error for SolveError {}

/// Backend seam: anything that can solve a [`DispatchModel`].
pub trait MilpSolver {
    /// Solves the model to a variable assignment.
    ///
    /// # Errors
    ///
    /// Returns `SolveError::Infeasible` when no assignment satisfies the
    /// constraints, or `SolveError::Backend` for backend failures.
    fn solve(&mut self, model: &DispatchModel) -> Result<Solution, SolveError>;
}

/// One constraint violated by an assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintViolation {
    /// Constraint name from the model.
    pub name: String,
    /// Violation magnitude.
    pub amount: f64,
}

/// Variable assignment keyed by variable name, as returned by an external
/// solver.
#[derive(Debug, Clone, Default)]
pub struct Solution {
    values: BTreeMap<String, f64>,
}

impl Solution {
    /// Empty assignment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an assignment from `(name, value)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        Self {
            values: pairs.into_iter().collect(),
        }
    }

    /// Sets one variable value.
    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    /// Value of one variable, if assigned.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Number of assigned variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no variable is assigned.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Densifies the assignment into the model's [`crate::opt::model::VarId`]
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `SolveError::MissingValue` naming the first unassigned
    /// model variable.
    pub fn dense(&self, model: &DispatchModel) -> Result<Vec<f64>, SolveError> {
        model
            .vars()
            .iter()
            .map(|v| {
                self.value(&v.name)
                    .ok_or_else(|| SolveError::MissingValue(v.name.clone()))
            })
            .collect()
    }

    /// Objective value of the assignment under the model's objective.
    ///
    /// # Errors
    ///
    /// Returns `SolveError::MissingValue` for an incomplete assignment.
    pub fn objective_value(&self, model: &DispatchModel) -> Result<f64, SolveError> {
        Ok(model.objective.eval(&self.dense(model)?))
    }

    /// All constraints violated by more than `tolerance`, with magnitudes.
    ///
    /// # Errors
    ///
    /// Returns `SolveError::MissingValue` for an incomplete assignment.
    pub fn violations(
        &self,
        model: &DispatchModel,
        tolerance: f64,
    ) -> Result<Vec<ConstraintViolation>, SolveError> {
        let values = self.dense(model)?;
        Ok(model
            .constraints
            .iter()
            .filter_map(|c| {
                let amount = c.violation(&values);
                (amount > tolerance).then(|| ConstraintViolation {
                    name: c.name.clone(),
                    amount,
                })
            })
            .collect())
    }

    /// Whether the assignment satisfies every constraint within
    /// `tolerance` and stays inside every variable's bounds.
    ///
    /// # Errors
    ///
    /// Returns `SolveError::MissingValue` for an incomplete assignment.
    pub fn is_feasible(&self, model: &DispatchModel, tolerance: f64) -> Result<bool, SolveError> {
        let values = self.dense(model)?;
        let in_bounds = model.vars().iter().zip(&values).all(|(v, &x)| {
            x >= v.lower - tolerance && x <= v.upper + tolerance
        });
        Ok(in_bounds && self.violations(model, tolerance)?.is_empty())
    }
}
