//! Bounds propagation to a fixpoint.

use std::collections::VecDeque;

use super::domain::{Conflict, Domains, ceil_div, floor_div};
use super::model::{Constraint, CpModel, VarId};

/// Constraint indices watching each variable.
pub(crate) fn build_watches(model: &CpModel) -> Vec<Vec<usize>> {
    let mut watches = vec![Vec::new(); model.vars.len()];
    for (idx, constraint) in model.constraints.iter().enumerate() {
        let mut vars = constraint.vars();
        vars.sort_unstable();
        vars.dedup();
        for var in vars {
            watches[var.0].push(idx);
        }
    }
    watches
}

pub(crate) struct Propagator<'m> {
    model: &'m CpModel,
    watches: &'m [Vec<usize>],
    queue: VecDeque<usize>,
    queued: Vec<bool>,
    scratch: Vec<(i128, i128)>,
    pub propagations: u64,
}

impl<'m> Propagator<'m> {
    pub fn new(model: &'m CpModel, watches: &'m [Vec<usize>]) -> Self {
        Self {
            model,
            watches,
            queue: VecDeque::new(),
            queued: vec![false; model.constraints.len()],
            scratch: Vec::new(),
            propagations: 0,
        }
    }

    /// Queue every constraint; used once at the root.
    pub fn enqueue_all(&mut self) {
        for idx in 0..self.model.constraints.len() {
            self.push(idx);
        }
    }

    fn push(&mut self, idx: usize) {
        if !self.queued[idx] {
            self.queued[idx] = true;
            self.queue.push_back(idx);
        }
    }

    fn enqueue_changed(&mut self, doms: &mut Domains) {
        for var in doms.drain_changed() {
            for i in 0..self.watches[var].len() {
                let idx = self.watches[var][i];
                self.push(idx);
            }
        }
    }

    /// Run queued constraints (and those woken by pending domain changes)
    /// until nothing changes or a domain empties.
    pub fn propagate(&mut self, doms: &mut Domains) -> Result<(), Conflict> {
        self.enqueue_changed(doms);
        while let Some(idx) = self.queue.pop_front() {
            self.queued[idx] = false;
            self.propagations += 1;
            if let Err(conflict) = self.run(idx, doms) {
                self.clear();
                doms.drain_changed();
                return Err(conflict);
            }
            self.enqueue_changed(doms);
        }
        Ok(())
    }

    fn clear(&mut self) {
        while let Some(idx) = self.queue.pop_front() {
            self.queued[idx] = false;
        }
    }

    fn run(&mut self, idx: usize, doms: &mut Domains) -> Result<(), Conflict> {
        let model = self.model;
        match &model.constraints[idx] {
            Constraint::Linear { terms, lo, hi, .. } => self.linear(terms, *lo, *hi, doms),
            Constraint::Product {
                target,
                left,
                right,
                ..
            } => product(*target, *left, *right, doms),
        }
    }

    fn linear(
        &mut self,
        terms: &[(VarId, i64)],
        lo: Option<i128>,
        hi: Option<i128>,
        doms: &mut Domains,
    ) -> Result<(), Conflict> {
        self.scratch.clear();
        let mut min_sum: i128 = 0;
        let mut max_sum: i128 = 0;
        for &(var, coef) in terms {
            let c = i128::from(coef);
            let (a, b) = (c * i128::from(doms.lo(var)), c * i128::from(doms.hi(var)));
            let (tmin, tmax) = if coef > 0 { (a, b) } else { (b, a) };
            min_sum += tmin;
            max_sum += tmax;
            self.scratch.push((tmin, tmax));
        }

        if hi.is_some_and(|h| min_sum > h) || lo.is_some_and(|l| max_sum < l) {
            return Err(Conflict);
        }

        for (i, &(var, coef)) in terms.iter().enumerate() {
            let c = i128::from(coef);
            let (tmin, tmax) = self.scratch[i];
            if let Some(h) = hi {
                // c·x <= h - (rest at its minimum)
                let slack = h - (min_sum - tmin);
                if coef > 0 {
                    doms.set_hi(var, floor_div(slack, c))?;
                } else {
                    doms.set_lo(var, ceil_div(slack, c))?;
                }
            }
            if let Some(l) = lo {
                // c·x >= l - (rest at its maximum)
                let need = l - (max_sum - tmax);
                if coef > 0 {
                    doms.set_lo(var, ceil_div(need, c))?;
                } else {
                    doms.set_hi(var, floor_div(need, c))?;
                }
            }
        }
        Ok(())
    }
}

fn product(target: VarId, left: VarId, right: VarId, doms: &mut Domains) -> Result<(), Conflict> {
    let bounds = |doms: &Domains, v: VarId| (i128::from(doms.lo(v)), i128::from(doms.hi(v)));

    let (llo, lhi) = bounds(doms, left);
    let (rlo, rhi) = bounds(doms, right);
    doms.set_lo(target, llo * rlo)?;
    doms.set_hi(target, lhi * rhi)?;

    narrow_factor(target, left, right, doms)?;
    narrow_factor(target, right, left, doms)?;

    let (llo, lhi) = bounds(doms, left);
    let (rlo, rhi) = bounds(doms, right);
    doms.set_lo(target, llo * rlo)?;
    doms.set_hi(target, lhi * rhi)?;
    Ok(())
}

/// Tighten `factor` from `target = factor × other`.
fn narrow_factor(target: VarId, factor: VarId, other: VarId, doms: &mut Domains) -> Result<(), Conflict> {
    let (tlo, thi) = (i128::from(doms.lo(target)), i128::from(doms.hi(target)));
    let (olo, ohi) = (i128::from(doms.lo(other)), i128::from(doms.hi(other)));
    if olo > 0 {
        doms.set_hi(factor, floor_div(thi, olo))?;
    }
    if ohi > 0 {
        doms.set_lo(factor, ceil_div(tlo, ohi))?;
    } else if tlo > 0 {
        return Err(Conflict);
    }
    Ok(())
}
