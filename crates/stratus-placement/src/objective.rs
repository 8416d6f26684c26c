//! Objective, bound cuts and pre-solve diagnostics.

use serde::Serialize;
use stratus_core::{MachineType, PlacementRequest};
use tracing::{debug, info, warn};

use crate::cp::{CpModel, LinearExpr, VarId};
use crate::model::{ModelBounds, PlacementVars};

/// Range multiplier between the cost ceiling and the objective variable's
/// upper bound.
const OBJECTIVE_RANGE_FACTOR: i64 = 10;

/// Analytical lower bound on the total cost (minor units).
///
/// Resource cost can be no lower than the total demand priced at the
/// cheapest cost per vCPU (or per MiB, whichever binds harder), replicated
/// once per mirrored provider. Add the cheapest activation costs for that
/// many providers plus the fixed cost.
pub fn lower_bound(request: &PlacementRequest) -> i64 {
    let multiplier: u32 = if request.redundancy.is_mirrored() {
        request.target_providers.max(1)
    } else {
        1
    };

    let (vcpu_total, memory_total) = request.workloads.iter().fold((0i128, 0i128), |(c, m), w| {
        let n = i128::from(w.instances);
        (c + n * i128::from(w.vcpu), m + n * i128::from(w.memory))
    });
    let vcpu_total = vcpu_total * i128::from(multiplier);
    let memory_total = memory_total * i128::from(multiplier);

    let lb_cpu = cheapest_cover(request, vcpu_total, |m| m.vcpu);
    let lb_memory = cheapest_cover(request, memory_total, |m| m.memory);
    let lb_resources = lb_cpu.max(lb_memory);

    let mut activation: Vec<i64> = request.providers.iter().map(|p| p.activation_cost).collect();
    activation.sort_unstable();
    let lb_activation: i128 = activation
        .iter()
        .take(multiplier as usize)
        .map(|&c| i128::from(c))
        .sum();

    let bound = lb_resources + lb_activation + i128::from(request.fixed_cost);
    debug!(
        %vcpu_total,
        %lb_cpu,
        %lb_memory,
        %lb_activation,
        %bound,
        "lower bound computed"
    );
    i64::try_from(bound).unwrap_or(i64::MAX)
}

/// Cost of `total` resource units at the best price per unit over all types.
fn cheapest_cover(request: &PlacementRequest, total: i128, capacity: impl Fn(&MachineType) -> u64) -> i128 {
    request
        .machine_types
        .iter()
        .map(|m| total * i128::from(m.unit_cost) / i128::from(capacity(m).max(1)))
        .min()
        .unwrap_or(0)
}

/// `fixed + Σ_k z[k]·activation_k + Σ_t y[t]·unitCost_t`.
pub fn cost_expression(request: &PlacementRequest, vars: &PlacementVars) -> LinearExpr {
    let mut expr = LinearExpr::new().constant(request.fixed_cost);
    for (k, provider) in request.providers.iter().enumerate() {
        expr.add_term(vars.provider_active[k], provider.activation_cost);
    }
    for (t, machine) in request.machine_types.iter().enumerate() {
        expr.add_term(vars.units[t], machine.unit_cost);
    }
    expr
}

/// Post the cost ceiling, the objective variable, the lower-bound cut and
/// the minimization goal. Returns the objective variable.
pub fn install(
    cp: &mut CpModel,
    request: &PlacementRequest,
    vars: &PlacementVars,
    bounds: &ModelBounds,
) -> VarId {
    info!("adding objective function");
    let cost = cost_expression(request, vars);
    cp.add_le(cost.clone(), bounds.cost_ceiling, "cost_ceiling");

    let objective = cp.new_int_var(
        0,
        bounds.cost_ceiling.saturating_mul(OBJECTIVE_RANGE_FACTOR),
        "total_objective",
    );
    cp.add_ge(LinearExpr::new().term(objective, 1), bounds.lower_bound, "lower_bound_cut");
    cp.add_eq_expr(LinearExpr::new().term(objective, 1), cost, "objective_definition");
    cp.minimize(objective);
    info!(
        lower_bound = bounds.lower_bound,
        cost_ceiling = bounds.cost_ceiling,
        "objective installed"
    );
    objective
}

/// Non-fatal findings about the request, gathered before search.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresolveReport {
    /// Workloads no single machine type can host.
    pub oversized_workloads: Vec<String>,
    /// Per provider: how many workloads at least one of its types can host.
    pub hostable_workloads: Vec<(String, usize)>,
}

impl PresolveReport {
    pub fn inspect(request: &PlacementRequest) -> Self {
        let mut report = Self::default();

        for workload in &request.workloads {
            if !request.machine_types.iter().any(|m| m.fits(workload)) {
                warn!(
                    workload = %workload.name,
                    vcpu = workload.vcpu,
                    memory = workload.memory,
                    "workload exceeds the capacity of every machine type"
                );
                report.oversized_workloads.push(workload.name.clone());
            }
        }

        for provider in &request.providers {
            let hostable = request
                .workloads
                .iter()
                .filter(|w| request.machine_types_of(provider.id).any(|m| m.fits(w)))
                .count();
            info!(
                provider = %provider.name,
                hostable,
                workloads = request.workloads.len(),
                "provider workload coverage"
            );
            report.hostable_workloads.push((provider.name.clone(), hostable));
        }

        report
    }

    /// Human-readable warnings for the report.
    pub fn warnings(&self, total_workloads: usize) -> Vec<String> {
        let mut warnings: Vec<String> = self
            .oversized_workloads
            .iter()
            .map(|w| format!("workload '{w}' does not fit on any machine type"))
            .collect();
        for (provider, hostable) in &self.hostable_workloads {
            if *hostable < total_workloads {
                warnings.push(format!(
                    "provider '{provider}' can host {hostable} of {total_workloads} workloads"
                ));
            }
        }
        warnings
    }
}
