//! Interval domains with an undo trail.

use super::model::{CpModel, VarId};

/// Raised when a domain becomes empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Conflict;

#[derive(Debug, Clone)]
pub(crate) struct Domains {
    lo: Vec<i64>,
    hi: Vec<i64>,
    trail: Vec<(usize, i64, i64)>,
    changed: Vec<usize>,
}

impl Domains {
    pub fn from_model(model: &CpModel) -> Self {
        Self {
            lo: model.vars.iter().map(|v| v.lo).collect(),
            hi: model.vars.iter().map(|v| v.hi).collect(),
            trail: Vec::new(),
            changed: Vec::new(),
        }
    }

    pub fn lo(&self, var: VarId) -> i64 {
        self.lo[var.0]
    }

    pub fn hi(&self, var: VarId) -> i64 {
        self.hi[var.0]
    }

    pub fn is_fixed(&self, var: VarId) -> bool {
        self.lo[var.0] == self.hi[var.0]
    }

    pub fn len(&self) -> usize {
        self.lo.len()
    }

    /// Index of the first empty domain, if any.
    pub fn first_empty(&self) -> Option<usize> {
        (0..self.lo.len()).find(|&i| self.lo[i] > self.hi[i])
    }

    pub fn mark(&self) -> usize {
        self.trail.len()
    }

    pub fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some((idx, lo, hi)) = self.trail.pop() {
                self.lo[idx] = lo;
                self.hi[idx] = hi;
            }
        }
        self.changed.clear();
    }

    /// Raise the lower bound. Returns whether the domain changed.
    pub fn set_lo(&mut self, var: VarId, value: i128) -> Result<bool, Conflict> {
        let idx = var.0;
        if value <= i128::from(self.lo[idx]) {
            return Ok(false);
        }
        if value > i128::from(self.hi[idx]) {
            return Err(Conflict);
        }
        // value lies in (lo, hi], so it fits in i64.
        self.trail.push((idx, self.lo[idx], self.hi[idx]));
        self.lo[idx] = value as i64;
        self.changed.push(idx);
        Ok(true)
    }

    /// Lower the upper bound. Returns whether the domain changed.
    pub fn set_hi(&mut self, var: VarId, value: i128) -> Result<bool, Conflict> {
        let idx = var.0;
        if value >= i128::from(self.hi[idx]) {
            return Ok(false);
        }
        if value < i128::from(self.lo[idx]) {
            return Err(Conflict);
        }
        self.trail.push((idx, self.lo[idx], self.hi[idx]));
        self.hi[idx] = value as i64;
        self.changed.push(idx);
        Ok(true)
    }

    pub fn fix(&mut self, var: VarId, value: i64) -> Result<(), Conflict> {
        self.set_lo(var, i128::from(value))?;
        self.set_hi(var, i128::from(value))?;
        Ok(())
    }

    /// Variables touched since the last drain.
    pub fn drain_changed(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.changed)
    }

    /// Lower bounds as an assignment; only meaningful once every domain is fixed.
    pub fn values(&self) -> Vec<i64> {
        self.lo.clone()
    }
}

pub(crate) fn floor_div(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q }
}

pub(crate) fn ceil_div(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && ((a < 0) == (b < 0)) { q + 1 } else { q }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_division() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(ceil_div(7, 2), 4);
        assert_eq!(ceil_div(-7, 2), -3);
        assert_eq!(ceil_div(7, -2), -3);
        assert_eq!(floor_div(6, 3), 2);
    }

    #[test]
    fn trail_restores_bounds() {
        let mut model = CpModel::new();
        let x = model.new_int_var(0, 10, "x");
        let mut doms = Domains::from_model(&model);
        let mark = doms.mark();
        assert_eq!(doms.set_hi(x, 4), Ok(true));
        assert_eq!(doms.set_lo(x, 2), Ok(true));
        assert_eq!(doms.set_lo(x, 5), Err(Conflict));
        doms.undo_to(mark);
        assert_eq!((doms.lo(x), doms.hi(x)), (0, 10));
    }
}
