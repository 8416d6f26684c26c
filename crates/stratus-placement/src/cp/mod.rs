//! A small integer constraint solver.
//!
//! Interval domains over non-negative integers, linear and product
//! constraints propagated to a bounds-consistent fixpoint, and a parallel
//! branch-and-bound search driven by ordered decision strategies.
//!
//! ```text
//! CpModel ──validate──▶ root propagation ──▶ N workers (scoped threads)
//!                                              ├── own Domains + trail
//!                                              └── shared incumbent / stop flag
//! ```

mod domain;
pub mod model;
mod propagate;
pub mod search;

pub use model::{CpModel, DecisionStrategy, LinearExpr, ValueSelection, VarId, VariableSelection};
pub use search::{
    CpSolver, SolutionEvent, SolveOutcome, SolveStats, SolveStatus, SolverParams, default_workers,
    effective_workers,
};
