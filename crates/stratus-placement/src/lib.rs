//! stratus-placement: cost-optimal workload placement across cloud
//! providers.
//!
//! ```text
//! PlacementRequest ─▶ PlacementModel::build ─▶ SearchOrchestrator::run ─▶ build_report
//!                     (variables, constraints,   (parallel bounded-time       (per-unit tree,
//!                      objective, diagnostics)    branch and bound)            metrics)
//! ```
//!
//! Every call builds a fresh model and a fresh orchestrator; nothing is
//! shared between requests, so [`optimize`] may run concurrently from any
//! number of threads.

pub mod constraints;
pub mod cp;
pub mod error;
pub mod model;
pub mod objective;
pub mod report;
pub mod search;

use tracing::info;

pub use error::{PlacementError, PlacementResult};
pub use model::{ModelBounds, PlacementModel};
pub use objective::PresolveReport;
pub use report::{FailureReport, PlacementOutcome, PlacementReport, build_report, format_report};
pub use search::{
    Assignment, ElapsedTime, ModelComplexity, PlacementSolution, SearchListener, SearchOrchestrator,
    SearchProgress, SearchState, TracingListener, gap_pct,
};

use stratus_core::PlacementRequest;

use crate::cp::{SolverParams, effective_workers};

/// Per-call engine options that are not part of the request.
#[derive(Debug, Clone, Default)]
pub struct OptimizeOptions {
    /// Parallel search workers; hardware concurrency when `None`. Larger
    /// values are capped at the hardware concurrency.
    pub workers: Option<usize>,
}

/// Build, search and return the terminal solution for `request`.
///
/// Blocks for up to the request's time budget. Infeasible and timed-out
/// searches are returned as solutions with the matching [`SearchState`];
/// only malformed input is an error.
pub fn optimize(
    request: &PlacementRequest,
    options: &OptimizeOptions,
    listener: &dyn SearchListener,
) -> PlacementResult<PlacementSolution> {
    info!(
        scenario = %request.scenario_label(),
        providers = request.providers.len(),
        machine_types = request.machine_types.len(),
        workloads = request.workloads.len(),
        redundancy = request.redundancy.label(),
        "optimizing placement"
    );
    let model = PlacementModel::build(request)?;
    let warnings = model.presolve.warnings(request.workloads.len());
    let params = SolverParams {
        time_limit: request.time_budget,
        workers: effective_workers(options.workers),
    };
    let mut solution = SearchOrchestrator::new(model, params).run(listener)?;
    solution.warnings = warnings;
    Ok(solution)
}

/// [`optimize`] followed by [`build_report`], logging progress through
/// `tracing`.
pub fn plan(request: &PlacementRequest, options: &OptimizeOptions) -> PlacementResult<PlacementOutcome> {
    let solution = optimize(request, options, &TracingListener)?;
    Ok(build_report(request, &solution))
}
