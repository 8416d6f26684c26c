//! Model definition: variables, constraints and decision strategies.

use crate::error::{PlacementError, PlacementResult};

/// Handle to a variable inside a [`CpModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VarDef {
    pub name: String,
    pub lo: i64,
    pub hi: i64,
    pub is_bool: bool,
}

/// `Σ coef·var + constant`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinearExpr {
    pub(crate) terms: Vec<(VarId, i64)>,
    pub(crate) constant: i64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of `vars` with unit coefficients.
    pub fn sum(vars: impl IntoIterator<Item = VarId>) -> Self {
        Self {
            terms: vars.into_iter().map(|v| (v, 1)).collect(),
            constant: 0,
        }
    }

    pub fn term(mut self, var: VarId, coef: i64) -> Self {
        self.add_term(var, coef);
        self
    }

    pub fn add_term(&mut self, var: VarId, coef: i64) {
        if coef != 0 {
            self.terms.push((var, coef));
        }
    }

    pub fn constant(mut self, value: i64) -> Self {
        self.constant = self.constant.saturating_add(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate against a full assignment.
    pub fn evaluate(&self, values: &[i64]) -> i128 {
        self.terms
            .iter()
            .map(|&(v, c)| i128::from(c) * i128::from(values[v.0]))
            .sum::<i128>()
            + i128::from(self.constant)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Constraint {
    /// `lo <= Σ coef·var <= hi`; a missing side is unbounded.
    Linear {
        name: String,
        terms: Vec<(VarId, i64)>,
        lo: Option<i128>,
        hi: Option<i128>,
    },
    /// `target = left × right` over non-negative domains.
    Product {
        name: String,
        target: VarId,
        left: VarId,
        right: VarId,
    },
}

impl Constraint {
    pub fn name(&self) -> &str {
        match self {
            Self::Linear { name, .. } | Self::Product { name, .. } => name,
        }
    }

    pub fn vars(&self) -> Vec<VarId> {
        match self {
            Self::Linear { terms, .. } => terms.iter().map(|(v, _)| *v).collect(),
            Self::Product {
                target,
                left,
                right,
                ..
            } => vec![*target, *left, *right],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableSelection {
    /// First unfixed variable in list order.
    ChooseFirst,
    /// Unfixed variable with the largest upper bound.
    ChooseHighestMax,
    /// Unfixed variable with the smallest lower bound.
    ChooseLowestMin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSelection {
    SelectMaxValue,
    SelectMinValue,
}

impl ValueSelection {
    pub fn flipped(self) -> Self {
        match self {
            Self::SelectMaxValue => Self::SelectMinValue,
            Self::SelectMinValue => Self::SelectMaxValue,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecisionStrategy {
    pub vars: Vec<VarId>,
    pub variable: VariableSelection,
    pub value: ValueSelection,
}

/// An integer model over non-negative interval domains.
#[derive(Debug, Clone, Default)]
pub struct CpModel {
    pub(crate) vars: Vec<VarDef>,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) strategies: Vec<DecisionStrategy>,
    pub(crate) objective: Option<VarId>,
}

impl CpModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_int_var(&mut self, lo: i64, hi: i64, name: impl Into<String>) -> VarId {
        self.push_var(lo, hi, name.into(), false)
    }

    pub fn new_bool_var(&mut self, name: impl Into<String>) -> VarId {
        self.push_var(0, 1, name.into(), true)
    }

    fn push_var(&mut self, lo: i64, hi: i64, name: String, is_bool: bool) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(VarDef {
            name,
            lo,
            hi,
            is_bool,
        });
        id
    }

    /// `expr <= rhs`.
    pub fn add_le(&mut self, expr: LinearExpr, rhs: i64, name: impl Into<String>) {
        let shift = i128::from(rhs) - i128::from(expr.constant);
        self.push_linear(expr.terms, None, Some(shift), name.into());
    }

    /// `expr >= rhs`.
    pub fn add_ge(&mut self, expr: LinearExpr, rhs: i64, name: impl Into<String>) {
        let shift = i128::from(rhs) - i128::from(expr.constant);
        self.push_linear(expr.terms, Some(shift), None, name.into());
    }

    /// `expr == rhs`.
    pub fn add_eq(&mut self, expr: LinearExpr, rhs: i64, name: impl Into<String>) {
        let shift = i128::from(rhs) - i128::from(expr.constant);
        self.push_linear(expr.terms, Some(shift), Some(shift), name.into());
    }

    /// `left <= right`, both sides linear.
    pub fn add_le_expr(&mut self, left: LinearExpr, right: LinearExpr, name: impl Into<String>) {
        let diff = Self::difference(left, right);
        self.add_le(diff, 0, name);
    }

    /// `left == right`, both sides linear.
    pub fn add_eq_expr(&mut self, left: LinearExpr, right: LinearExpr, name: impl Into<String>) {
        let diff = Self::difference(left, right);
        self.add_eq(diff, 0, name);
    }

    fn difference(left: LinearExpr, right: LinearExpr) -> LinearExpr {
        let mut diff = left;
        for (var, coef) in right.terms {
            diff.add_term(var, -coef);
        }
        diff.constant = diff.constant.saturating_sub(right.constant);
        diff
    }

    fn push_linear(&mut self, terms: Vec<(VarId, i64)>, lo: Option<i128>, hi: Option<i128>, name: String) {
        self.constraints.push(Constraint::Linear { name, terms, lo, hi });
    }

    /// `target == left × right`.
    pub fn add_product(&mut self, target: VarId, left: VarId, right: VarId, name: impl Into<String>) {
        self.constraints.push(Constraint::Product {
            name: name.into(),
            target,
            left,
            right,
        });
    }

    pub fn add_decision_strategy(
        &mut self,
        vars: Vec<VarId>,
        variable: VariableSelection,
        value: ValueSelection,
    ) {
        self.strategies.push(DecisionStrategy {
            vars,
            variable,
            value,
        });
    }

    pub fn minimize(&mut self, objective: VarId) {
        self.objective = Some(objective);
    }

    pub fn var_name(&self, var: VarId) -> &str {
        &self.vars[var.0].name
    }

    pub fn bounds(&self, var: VarId) -> (i64, i64) {
        let def = &self.vars[var.0];
        (def.lo, def.hi)
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_bool_vars(&self) -> usize {
        self.vars.iter().filter(|v| v.is_bool).count()
    }

    pub fn num_int_vars(&self) -> usize {
        self.num_vars() - self.num_bool_vars()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Check the model can be searched: non-negative domains, valid handles.
    pub fn validate(&self) -> PlacementResult<()> {
        for def in &self.vars {
            if def.lo < 0 {
                return Err(PlacementError::Model(format!(
                    "variable {} has a negative lower bound {}",
                    def.name, def.lo
                )));
            }
        }
        let in_range = |v: &VarId| v.0 < self.vars.len();
        for constraint in &self.constraints {
            if !constraint.vars().iter().all(in_range) {
                return Err(PlacementError::Model(format!(
                    "constraint {} references an unknown variable",
                    constraint.name()
                )));
            }
        }
        if let Some(objective) = self.objective {
            if !in_range(&objective) {
                return Err(PlacementError::Model("objective is not a model variable".into()));
            }
        }
        Ok(())
    }
}
