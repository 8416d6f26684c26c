//! Parallel depth-first branch and bound.
//!
//! Every worker owns a copy of the root domains and searches the full tree
//! with its own decision strategies. Workers share the incumbent, so an
//! improvement found by one immediately tightens the objective bound of all
//! others. The first worker that exhausts its tree proves the result.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use super::domain::Domains;
use super::model::{CpModel, DecisionStrategy, ValueSelection, VarId, VariableSelection};
use super::propagate::{Propagator, build_watches};
use crate::error::PlacementResult;

const NO_INCUMBENT: i64 = i64::MAX;

#[derive(Debug, Clone)]
pub struct SolverParams {
    pub time_limit: Duration,
    pub workers: usize,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(20),
            workers: default_workers(),
        }
    }
}

/// Hardware concurrency, falling back to a single worker.
pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

/// Worker count for a search: the requested value clamped to
/// `1..=default_workers()`, or all cores when nothing was asked for.
pub fn effective_workers(requested: Option<usize>) -> usize {
    let available = default_workers();
    requested.unwrap_or(available).clamp(1, available)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Tree exhausted with an incumbent.
    Optimal,
    /// Time ran out with an incumbent.
    Feasible,
    /// Tree exhausted without any solution.
    Infeasible,
    /// Time ran out before any solution.
    Unknown,
}

/// Emitted on every improving solution.
#[derive(Debug, Clone)]
pub struct SolutionEvent {
    /// 1-based count of improving solutions.
    pub index: u64,
    pub objective: i64,
    pub best_bound: i64,
    pub elapsed: Duration,
    pub worker: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SolveStats {
    pub branches: u64,
    pub propagations: u64,
    pub wall_time: Duration,
    pub workers: usize,
}

impl SolveStats {
    /// Propagation work in units of 10⁶ constraint runs.
    pub fn deterministic_time(&self) -> f64 {
        self.propagations as f64 * 1e-6
    }
}

#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub objective: Option<i64>,
    pub best_bound: i64,
    pub stats: SolveStats,
    values: Option<Vec<i64>>,
}

impl SolveOutcome {
    pub fn has_solution(&self) -> bool {
        self.values.is_some()
    }

    pub fn value(&self, var: VarId) -> Option<i64> {
        self.values.as_ref().map(|v| v[var.0])
    }

    pub fn bool_value(&self, var: VarId) -> bool {
        self.value(var).is_some_and(|v| v != 0)
    }

    pub fn values(&self) -> Option<&[i64]> {
        self.values.as_deref()
    }
}

struct Shared {
    best: AtomicI64,
    incumbent: Mutex<Option<Vec<i64>>>,
    solutions: AtomicU64,
    stop: AtomicBool,
    exhausted: AtomicBool,
    branches: AtomicU64,
    propagations: AtomicU64,
}

struct Frame {
    mark: usize,
    var: VarId,
    value: i64,
    refuted: bool,
}

pub struct CpSolver {
    params: SolverParams,
}

impl CpSolver {
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }

    /// Search `model`, calling `on_solution` for each improving solution.
    pub fn solve(
        &self,
        model: &CpModel,
        on_solution: &(dyn Fn(&SolutionEvent) + Sync),
    ) -> PlacementResult<SolveOutcome> {
        model.validate()?;
        let start = Instant::now();
        // Budgets too large for the platform clock run until exhausted.
        let deadline = start.checked_add(self.params.time_limit);
        let workers = self.params.workers.max(1);

        let watches = build_watches(model);
        let mut root = Domains::from_model(model);
        let mut prop = Propagator::new(model, &watches);
        prop.enqueue_all();
        let root_ok = root.first_empty().is_none() && prop.propagate(&mut root).is_ok();
        if !root_ok {
            debug!("root propagation failed, model is infeasible");
            return Ok(SolveOutcome {
                status: SolveStatus::Infeasible,
                objective: None,
                best_bound: 0,
                stats: SolveStats {
                    branches: 0,
                    propagations: prop.propagations,
                    wall_time: start.elapsed(),
                    workers,
                },
                values: None,
            });
        }
        let root_bound = model.objective.map_or(0, |o| root.lo(o));
        debug!(root_bound, workers, "root propagation done");

        let shared = Shared {
            best: AtomicI64::new(NO_INCUMBENT),
            incumbent: Mutex::new(None),
            solutions: AtomicU64::new(0),
            stop: AtomicBool::new(false),
            exhausted: AtomicBool::new(false),
            branches: AtomicU64::new(0),
            propagations: AtomicU64::new(prop.propagations),
        };

        thread::scope(|scope| {
            for id in 0..workers {
                let worker = Worker {
                    id,
                    model,
                    strategies: worker_strategies(&model.strategies, id),
                    doms: root.clone(),
                    prop: Propagator::new(model, &watches),
                    shared: &shared,
                    start,
                    deadline,
                    root_bound,
                    on_solution,
                };
                scope.spawn(move || worker.run());
            }
        });

        let exhausted = shared.exhausted.load(Ordering::SeqCst);
        let values = shared.incumbent.into_inner();
        let objective = values
            .as_ref()
            .and_then(|v| model.objective.map(|o| v[o.0]));
        let status = match (exhausted, values.is_some()) {
            (true, true) => SolveStatus::Optimal,
            (true, false) => SolveStatus::Infeasible,
            (false, true) => SolveStatus::Feasible,
            (false, false) => SolveStatus::Unknown,
        };
        let best_bound = match (status, objective) {
            (SolveStatus::Optimal, Some(obj)) => obj,
            (_, Some(obj)) => root_bound.min(obj),
            _ => root_bound,
        };

        Ok(SolveOutcome {
            status,
            objective,
            best_bound,
            stats: SolveStats {
                branches: shared.branches.load(Ordering::Relaxed),
                propagations: shared.propagations.load(Ordering::Relaxed),
                wall_time: start.elapsed(),
                workers,
            },
            values,
        })
    }
}

/// Diversify the portfolio: odd workers flip the value order of the last
/// strategy, other non-zero workers rotate the first strategy's variables.
fn worker_strategies(base: &[DecisionStrategy], worker: usize) -> Vec<DecisionStrategy> {
    let mut strategies = base.to_vec();
    if worker == 0 {
        return strategies;
    }
    if worker % 2 == 1 {
        if let Some(last) = strategies.last_mut() {
            last.value = last.value.flipped();
        }
    } else if let Some(first) = strategies.first_mut() {
        if !first.vars.is_empty() {
            let shift = (worker / 2) % first.vars.len();
            first.vars.rotate_left(shift);
        }
    }
    strategies
}

struct Worker<'a> {
    id: usize,
    model: &'a CpModel,
    strategies: Vec<DecisionStrategy>,
    doms: Domains,
    prop: Propagator<'a>,
    shared: &'a Shared,
    start: Instant,
    deadline: Option<Instant>,
    root_bound: i64,
    on_solution: &'a (dyn Fn(&SolutionEvent) + Sync),
}

impl Worker<'_> {
    fn run(mut self) {
        let mut stack: Vec<Frame> = Vec::new();
        let mut branches = 0u64;
        let mut exhausted = false;

        loop {
            if self.shared.stop.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }

            if !self.tighten_objective() {
                if !self.backtrack(&mut stack) {
                    exhausted = true;
                    break;
                }
                continue;
            }

            match self.next_decision() {
                None => {
                    if self.record_solution() {
                        exhausted = true;
                        break;
                    }
                    if !self.backtrack(&mut stack) {
                        exhausted = true;
                        break;
                    }
                }
                Some((var, value)) => {
                    branches += 1;
                    stack.push(Frame {
                        mark: self.doms.mark(),
                        var,
                        value,
                        refuted: false,
                    });
                    let applied = self.doms.fix(var, value).is_ok() && self.prop.propagate(&mut self.doms).is_ok();
                    if !applied && !self.backtrack(&mut stack) {
                        exhausted = true;
                        break;
                    }
                }
            }
        }

        if exhausted {
            self.shared.exhausted.store(true, Ordering::SeqCst);
            self.shared.stop.store(true, Ordering::SeqCst);
        }
        self.shared.branches.fetch_add(branches, Ordering::Relaxed);
        self.shared
            .propagations
            .fetch_add(self.prop.propagations, Ordering::Relaxed);
        debug!(worker = self.id, branches, exhausted, "search worker finished");
    }

    /// Keep the objective strictly below the shared incumbent.
    fn tighten_objective(&mut self) -> bool {
        let Some(objective) = self.model.objective else {
            return true;
        };
        let best = self.shared.best.load(Ordering::Acquire);
        if best == NO_INCUMBENT || self.doms.hi(objective) < best {
            return true;
        }
        self.doms.set_hi(objective, i128::from(best) - 1).is_ok() && self.prop.propagate(&mut self.doms).is_ok()
    }

    fn next_decision(&self) -> Option<(VarId, i64)> {
        for strategy in &self.strategies {
            let mut open = strategy.vars.iter().copied().filter(|&v| !self.doms.is_fixed(v));
            let pick = match strategy.variable {
                VariableSelection::ChooseFirst => open.next(),
                VariableSelection::ChooseHighestMax => open.fold(None, |best: Option<VarId>, v| match best {
                    Some(b) if self.doms.hi(b) >= self.doms.hi(v) => Some(b),
                    _ => Some(v),
                }),
                VariableSelection::ChooseLowestMin => open.fold(None, |best: Option<VarId>, v| match best {
                    Some(b) if self.doms.lo(b) <= self.doms.lo(v) => Some(b),
                    _ => Some(v),
                }),
            };
            if let Some(var) = pick {
                let value = match strategy.value {
                    ValueSelection::SelectMaxValue => self.doms.hi(var),
                    ValueSelection::SelectMinValue => self.doms.lo(var),
                };
                return Some((var, value));
            }
        }
        (0..self.doms.len())
            .map(VarId)
            .find(|&v| !self.doms.is_fixed(v))
            .map(|v| (v, self.doms.lo(v)))
    }

    /// Store a leaf if it improves the incumbent. Returns true when the
    /// search can stop (satisfaction models stop at the first solution).
    fn record_solution(&mut self) -> bool {
        let values = self.doms.values();
        let Some(objective) = self.model.objective else {
            let mut incumbent = self.shared.incumbent.lock();
            if incumbent.is_none() {
                *incumbent = Some(values);
            }
            return true;
        };

        let value = values[objective.0];
        let mut incumbent = self.shared.incumbent.lock();
        if value >= self.shared.best.load(Ordering::Acquire) {
            return false;
        }
        *incumbent = Some(values);
        self.shared.best.store(value, Ordering::Release);
        let index = self.shared.solutions.fetch_add(1, Ordering::Relaxed) + 1;
        (self.on_solution)(&SolutionEvent {
            index,
            objective: value,
            best_bound: self.root_bound.min(value),
            elapsed: self.start.elapsed(),
            worker: self.id,
        });
        false
    }

    /// Undo to the deepest open choice point and take its other branch.
    /// Returns false once the tree is exhausted.
    fn backtrack(&mut self, stack: &mut Vec<Frame>) -> bool {
        while let Some(frame) = stack.pop() {
            self.doms.undo_to(frame.mark);
            if frame.refuted {
                continue;
            }
            let mark = self.doms.mark();
            let refute = if frame.value >= self.doms.hi(frame.var) {
                self.doms.set_hi(frame.var, i128::from(frame.value) - 1)
            } else {
                self.doms.set_lo(frame.var, i128::from(frame.value) + 1)
            };
            stack.push(Frame {
                mark,
                refuted: true,
                ..frame
            });
            if refute.is_ok() && self.prop.propagate(&mut self.doms).is_ok() {
                return true;
            }
        }
        false
    }
}
