//! Placement engine error types.

use stratus_core::CoreError;
use thiserror::Error;

/// Errors that stop an optimization before search.
///
/// Infeasible and timed-out searches are not errors; they are reported as a
/// [`crate::SearchState`] on the solution.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error(transparent)]
    Input(#[from] CoreError),

    #[error("model error: {0}")]
    Model(String),
}

pub type PlacementResult<T> = Result<T, PlacementError>;
