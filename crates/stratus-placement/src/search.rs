//! Search orchestrator. Runs one bounded-time search over a built model.
//!
//! An orchestrator is created per request, moves through
//! `Built → Searching → terminal` exactly once and is consumed by
//! [`SearchOrchestrator::run`]. Nothing survives the call.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use stratus_core::scale::minor_to_cost;
use tracing::{debug, info, warn};

use crate::cp::{
    CpSolver, SolutionEvent, SolveOutcome, SolveStats, SolveStatus, SolverParams, ValueSelection,
    VarId, VariableSelection,
};
use crate::error::{PlacementError, PlacementResult};
use crate::model::PlacementModel;

/// Lifecycle of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    /// Model built, search not started.
    Built,
    Searching,
    /// Best solution found and proven optimal.
    Optimal,
    /// Time budget exhausted with a feasible incumbent.
    FeasibleTimedOut,
    /// Proven that no placement satisfies every constraint.
    Infeasible,
    /// Time budget exhausted before any feasible placement was found.
    NoSolutionTimedOut,
}

impl SearchState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Built | Self::Searching)
    }

    /// True when the state carries a placement.
    pub fn has_solution(self) -> bool {
        matches!(self, Self::Optimal | Self::FeasibleTimedOut)
    }

    pub fn can_transition_to(self, next: SearchState) -> bool {
        match (self, next) {
            (Self::Built, Self::Searching) => true,
            (Self::Searching, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Status label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Built => "BUILT",
            Self::Searching => "SEARCHING",
            Self::Optimal => "OPTIMAL",
            Self::FeasibleTimedOut => "FEASIBLE",
            Self::Infeasible => "INFEASIBLE",
            Self::NoSolutionTimedOut => "UNKNOWN",
        }
    }

    fn from_status(status: SolveStatus) -> Self {
        match status {
            SolveStatus::Optimal => Self::Optimal,
            SolveStatus::Feasible => Self::FeasibleTimedOut,
            SolveStatus::Infeasible => Self::Infeasible,
            SolveStatus::Unknown => Self::NoSolutionTimedOut,
        }
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Optimality gap in percent: `(incumbent − bound) / incumbent × 100`.
///
/// Zero when the incumbent is zero, since nothing can be cheaper.
pub fn gap_pct(incumbent: i64, bound: i64) -> f64 {
    if incumbent <= 0 {
        return 0.0;
    }
    ((incumbent - bound) as f64 / incumbent as f64 * 100.0).max(0.0)
}

/// Wall time split into clock components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElapsedTime {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub milliseconds: u64,
}

impl From<Duration> for ElapsedTime {
    fn from(elapsed: Duration) -> Self {
        let millis = elapsed.as_millis() as u64;
        Self {
            hours: millis / 3_600_000,
            minutes: millis / 60_000 % 60,
            seconds: millis / 1000 % 60,
            milliseconds: millis % 1000,
        }
    }
}

impl fmt::Display for ElapsedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:03}",
            self.hours, self.minutes, self.seconds, self.milliseconds
        )
    }
}

/// One improved incumbent, as seen by a [`SearchListener`].
#[derive(Debug, Clone)]
pub struct SearchProgress {
    pub solution_index: u64,
    /// Objective in minor units.
    pub objective: i64,
    /// Objective as a decimal cost.
    pub cost: f64,
    pub best_bound: i64,
    pub gap_pct: f64,
    pub elapsed: Duration,
    pub worker: usize,
}

impl SearchProgress {
    fn from_event(event: &SolutionEvent) -> Self {
        Self {
            solution_index: event.index,
            objective: event.objective,
            cost: minor_to_cost(event.objective),
            best_bound: event.best_bound,
            gap_pct: gap_pct(event.objective, event.best_bound),
            elapsed: event.elapsed,
            worker: event.worker,
        }
    }
}

/// Observation hook for improved incumbents. Called from search worker
/// threads; must not block for long.
pub trait SearchListener: Send + Sync {
    fn on_improvement(&self, progress: &SearchProgress);
}

impl<F> SearchListener for F
where
    F: Fn(&SearchProgress) + Send + Sync,
{
    fn on_improvement(&self, progress: &SearchProgress) {
        self(progress)
    }
}

/// Logs every improvement through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl SearchListener for TracingListener {
    fn on_improvement(&self, progress: &SearchProgress) {
        info!(
            solution = progress.solution_index,
            cost = %format!("{:.2}", progress.cost),
            best_bound = %format!("{:.2}", minor_to_cost(progress.best_bound)),
            gap = %format!("{:.2}%", progress.gap_pct),
            elapsed = %ElapsedTime::from(progress.elapsed),
            worker = progress.worker,
            "improved solution"
        );
    }
}

/// Model size, as reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelComplexity {
    pub int_vars: usize,
    pub bool_vars: usize,
    pub total_vars: usize,
    pub constraints: usize,
}

/// Variable values of a feasible placement, indexed like the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// `z[k]`
    pub provider_active: Vec<bool>,
    /// `y[t]`
    pub units: Vec<u64>,
    /// `x[t][j]`
    pub per_unit: Vec<Vec<u64>>,
    /// `p[t][j]`
    pub on_type: Vec<Vec<u64>>,
    /// `v[k][j]`
    pub provider_app: Vec<Vec<bool>>,
}

impl Assignment {
    fn extract(model: &PlacementModel, outcome: &SolveOutcome) -> Option<Self> {
        if !outcome.has_solution() {
            return None;
        }
        let int = |var: VarId| outcome.value(var).map_or(0, |v| v.max(0) as u64);
        let grid = |rows: &[Vec<VarId>]| -> Vec<Vec<u64>> {
            rows.iter().map(|row| row.iter().map(|&v| int(v)).collect()).collect()
        };
        let vars = &model.vars;
        Some(Self {
            provider_active: vars.provider_active.iter().map(|&v| outcome.bool_value(v)).collect(),
            units: vars.units.iter().map(|&v| int(v)).collect(),
            per_unit: grid(vars.per_unit.as_slice()),
            on_type: grid(vars.on_type.as_slice()),
            provider_app: vars
                .provider_app
                .iter()
                .map(|row| row.iter().map(|&v| outcome.bool_value(v)).collect())
                .collect(),
        })
    }

    pub fn active_providers(&self) -> usize {
        self.provider_active.iter().filter(|&&a| a).count()
    }
}

/// Terminal result of one optimization.
#[derive(Debug, Clone)]
pub struct PlacementSolution {
    pub state: SearchState,
    /// Objective in minor units, when a placement exists.
    pub objective: Option<i64>,
    pub best_bound: i64,
    /// Analytical lower bound posted as a cut.
    pub lower_bound: i64,
    pub cost_ceiling: i64,
    pub assignment: Option<Assignment>,
    pub stats: SolveStats,
    pub complexity: ModelComplexity,
    /// Pre-solve diagnostics.
    pub warnings: Vec<String>,
}

impl PlacementSolution {
    pub fn gap_pct(&self) -> Option<f64> {
        self.objective.map(|obj| gap_pct(obj, self.best_bound))
    }

    pub fn cost(&self) -> Option<f64> {
        self.objective.map(minor_to_cost)
    }
}

/// Drives a single search. Consumed by [`run`](Self::run).
pub struct SearchOrchestrator {
    model: PlacementModel,
    params: SolverParams,
    state: SearchState,
}

impl SearchOrchestrator {
    /// Take ownership of a freshly built model and install the branching
    /// heuristics: providers first (first unfixed, try active), then unit
    /// counts (largest domain first, try the maximum).
    pub fn new(mut model: PlacementModel, params: SolverParams) -> Self {
        model.cp.add_decision_strategy(
            model.vars.provider_active.clone(),
            VariableSelection::ChooseFirst,
            ValueSelection::SelectMaxValue,
        );
        model.cp.add_decision_strategy(
            model.vars.units.clone(),
            VariableSelection::ChooseHighestMax,
            ValueSelection::SelectMaxValue,
        );
        Self {
            model,
            params,
            state: SearchState::Built,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    fn transition(&mut self, next: SearchState) -> PlacementResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(PlacementError::Model(format!(
                "invalid search transition {} -> {}",
                self.state, next
            )));
        }
        debug!(from = %self.state, to = %next, "search state transition");
        self.state = next;
        Ok(())
    }

    /// Search until optimality is proven, infeasibility is proven or the
    /// time budget runs out. Improved incumbents go to `listener`.
    pub fn run(mut self, listener: &dyn SearchListener) -> PlacementResult<PlacementSolution> {
        self.transition(SearchState::Searching)?;
        info!(
            time_budget_secs = self.params.time_limit.as_secs_f64(),
            workers = self.params.workers,
            "starting placement search"
        );

        let solver = CpSolver::new(self.params.clone());
        let on_solution = |event: &SolutionEvent| listener.on_improvement(&SearchProgress::from_event(event));
        let outcome = solver.solve(&self.model.cp, &on_solution)?;

        let terminal = SearchState::from_status(outcome.status);
        self.transition(terminal)?;

        let cp = &self.model.cp;
        let complexity = ModelComplexity {
            int_vars: cp.num_int_vars(),
            bool_vars: cp.num_bool_vars(),
            total_vars: cp.num_vars(),
            constraints: cp.num_constraints(),
        };
        let solution = PlacementSolution {
            state: terminal,
            objective: outcome.objective,
            best_bound: outcome.best_bound,
            lower_bound: self.model.bounds.lower_bound,
            cost_ceiling: self.model.bounds.cost_ceiling,
            assignment: Assignment::extract(&self.model, &outcome),
            stats: outcome.stats,
            complexity,
            warnings: Vec::new(),
        };

        match solution.objective {
            Some(objective) => info!(
                status = %terminal,
                cost = %format!("{:.2}", minor_to_cost(objective)),
                best_bound = %format!("{:.2}", minor_to_cost(solution.best_bound)),
                gap = %format!("{:.2}%", gap_pct(objective, solution.best_bound)),
                elapsed = %ElapsedTime::from(solution.stats.wall_time),
                branches = solution.stats.branches,
                "placement search finished"
            ),
            None => warn!(
                status = %terminal,
                elapsed = %ElapsedTime::from(solution.stats.wall_time),
                branches = solution.stats.branches,
                "placement search found no solution"
            ),
        }
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::model::tests::{machine, provider, request, workload};

    fn params() -> SolverParams {
        SolverParams {
            time_limit: Duration::from_secs(10),
            workers: 1,
        }
    }

    #[test]
    fn only_forward_transitions_are_valid() {
        use SearchState::*;
        assert!(Built.can_transition_to(Searching));
        assert!(Searching.can_transition_to(Optimal));
        assert!(Searching.can_transition_to(NoSolutionTimedOut));
        assert!(!Built.can_transition_to(Optimal));
        assert!(!Optimal.can_transition_to(Searching));
        assert!(!Infeasible.can_transition_to(FeasibleTimedOut));
        assert!(!Searching.can_transition_to(Built));
    }

    #[test]
    fn labels_match_report_statuses() {
        assert_eq!(SearchState::Optimal.label(), "OPTIMAL");
        assert_eq!(SearchState::FeasibleTimedOut.label(), "FEASIBLE");
        assert_eq!(SearchState::Infeasible.label(), "INFEASIBLE");
        assert_eq!(SearchState::NoSolutionTimedOut.label(), "UNKNOWN");
    }

    #[test]
    fn gap_uses_incumbent_denominator() {
        assert_eq!(gap_pct(200, 150), 25.0);
        assert_eq!(gap_pct(100, 100), 0.0);
        assert_eq!(gap_pct(0, 0), 0.0);
    }

    #[test]
    fn elapsed_splits_into_clock_fields() {
        let elapsed = ElapsedTime::from(Duration::from_millis(3_723_045));
        assert_eq!(
            elapsed,
            ElapsedTime {
                hours: 1,
                minutes: 2,
                seconds: 3,
                milliseconds: 45
            }
        );
        assert_eq!(elapsed.to_string(), "01:02:03:045");
    }

    #[test]
    fn orchestrator_installs_heuristics_and_solves() {
        let req = request(
            vec![provider(0, "aws", 0)],
            vec![machine(0, 0, 4000, 8192, 100)],
            vec![workload(0, 1000, 1024, 2)],
        );
        let model = PlacementModel::build(&req).unwrap();
        let orchestrator = SearchOrchestrator::new(model, params());
        assert_eq!(orchestrator.state(), SearchState::Built);
        assert_eq!(orchestrator.model.cp.strategies.len(), 2);

        let improvements = AtomicU64::new(0);
        let listener = |_: &SearchProgress| {
            improvements.fetch_add(1, Ordering::Relaxed);
        };
        let solution = orchestrator.run(&listener).unwrap();
        assert_eq!(solution.state, SearchState::Optimal);
        assert!(improvements.load(Ordering::Relaxed) >= 1);
        assert_eq!(solution.gap_pct(), Some(0.0));

        let assignment = solution.assignment.unwrap();
        assert_eq!(assignment.provider_active, vec![true]);
        assert_eq!(assignment.on_type[0][0], 2);
    }

    #[test]
    fn infeasible_search_has_no_assignment() {
        let req = request(
            vec![provider(0, "aws", 0)],
            vec![machine(0, 0, 1000, 1024, 100)],
            vec![workload(0, 2000, 1024, 1)],
        );
        let model = PlacementModel::build(&req).unwrap();
        let solution = SearchOrchestrator::new(model, params())
            .run(&TracingListener)
            .unwrap();
        assert_eq!(solution.state, SearchState::Infeasible);
        assert!(solution.assignment.is_none());
        assert_eq!(solution.gap_pct(), None);
    }
}
