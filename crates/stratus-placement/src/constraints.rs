//! Constraint generator.
//!
//! Everything here is linear; the one bilinear relation `p = y × x` is
//! posted by the model builder when `p` is created.

use stratus_core::{PlacementRequest, RedundancyMode};
use tracing::{debug, info};

use crate::cp::{CpModel, LinearExpr, VarId};
use crate::model::{ModelBounds, PlacementVars, to_i64};

/// Post every structural constraint. Objective-related cuts live in
/// [`crate::objective`].
pub fn add_all(cp: &mut CpModel, request: &PlacementRequest, vars: &PlacementVars, bounds: &ModelBounds) {
    add_capacity(cp, request, vars);
    add_anti_affinity(cp, request, vars);
    add_provider_hierarchy(cp, request, vars, bounds);
    add_provider_count(cp, request, vars);
    add_redundancy(cp, request, vars);
    add_provider_app_linkage(cp, request, vars);
    add_carbon_budget(cp, request, vars);
}

/// Machine types owned by provider `k`, as indices.
fn types_of(request: &PlacementRequest, k: usize) -> Vec<usize> {
    request
        .machine_types
        .iter()
        .enumerate()
        .filter(|(_, m)| m.provider == k)
        .map(|(t, _)| t)
        .collect()
}

/// Per unit: `Σ_j x[t][j]·req_j <= capacity_t` for vCPU and memory.
fn add_capacity(cp: &mut CpModel, request: &PlacementRequest, vars: &PlacementVars) {
    info!("adding machine capacity constraints");
    for (t, machine) in request.machine_types.iter().enumerate() {
        let mut vcpu = LinearExpr::new();
        let mut memory = LinearExpr::new();
        for (j, workload) in request.workloads.iter().enumerate() {
            vcpu.add_term(vars.per_unit[t][j], to_i64(workload.vcpu));
            memory.add_term(vars.per_unit[t][j], to_i64(workload.memory));
        }
        cp.add_le(vcpu, to_i64(machine.vcpu), format!("vcpu_capacity_{t}"));
        cp.add_le(memory, to_i64(machine.memory), format!("memory_capacity_{t}"));
    }
}

/// At most one instance of a workload per unit.
fn add_anti_affinity(cp: &mut CpModel, request: &PlacementRequest, vars: &PlacementVars) {
    info!("adding anti-affinity constraints");
    for t in 0..request.machine_types.len() {
        for j in 0..request.workloads.len() {
            cp.add_le(
                LinearExpr::new().term(vars.per_unit[t][j], 1),
                1,
                format!("anti_affinity_{t}_{j}"),
            );
        }
    }
}

/// A type is provisioned only under an active owner, and an active provider
/// provisions at least one unit.
fn add_provider_hierarchy(
    cp: &mut CpModel,
    request: &PlacementRequest,
    vars: &PlacementVars,
    bounds: &ModelBounds,
) {
    info!("adding provider hierarchy constraints");
    let big_m = to_i64(bounds.total_demand);
    for (t, machine) in request.machine_types.iter().enumerate() {
        // y[t] - M·z[owner] <= 0
        let expr = LinearExpr::new()
            .term(vars.units[t], 1)
            .term(vars.provider_active[machine.provider], -big_m);
        cp.add_le(expr, 0, format!("hierarchy_{t}"));
    }

    for k in 0..request.providers.len() {
        // Σ_{t∈k} y[t] - z[k] >= 0
        let mut expr = LinearExpr::sum(types_of(request, k).into_iter().map(|t| vars.units[t]));
        expr.add_term(vars.provider_active[k], -1);
        cp.add_ge(expr, 0, format!("provider_consistency_{k}"));
    }
}

fn add_provider_count(cp: &mut CpModel, request: &PlacementRequest, vars: &PlacementVars) {
    let active = LinearExpr::sum(vars.provider_active.iter().copied());
    if request.target_providers > 0 {
        info!(target = request.target_providers, "adding target provider count constraint");
        cp.add_eq(active, i64::from(request.target_providers), "target_provider_count");
    } else {
        info!("adding at-least-one provider constraint");
        cp.add_ge(active, 1, "at_least_one_provider");
    }
}

/// Mirrored: every active provider carries the full demand of every
/// workload. Distributed: demand is met once across all types.
fn add_redundancy(cp: &mut CpModel, request: &PlacementRequest, vars: &PlacementVars) {
    match request.redundancy {
        RedundancyMode::Mirrored => {
            info!("adding mirrored demand constraints");
            for k in 0..request.providers.len() {
                let types = types_of(request, k);
                for (j, workload) in request.workloads.iter().enumerate() {
                    // Σ_{t∈k} p[t][j] - demand_j·z[k] == 0
                    let mut expr = LinearExpr::sum(types.iter().map(|&t| vars.on_type[t][j]));
                    expr.add_term(vars.provider_active[k], -to_i64(workload.instances));
                    cp.add_eq(expr, 0, format!("mirrored_demand_{k}_{j}"));
                }
            }
        }
        RedundancyMode::Distributed => {
            info!("adding distributed demand constraints");
            for (j, workload) in request.workloads.iter().enumerate() {
                let expr = LinearExpr::sum(vars.on_type.iter().map(|row| row[j]));
                cp.add_eq(expr, to_i64(workload.instances), format!("distributed_demand_{j}"));
            }
        }
    }
}

fn add_provider_app_linkage(cp: &mut CpModel, request: &PlacementRequest, vars: &PlacementVars) {
    info!("adding provider/application linkage constraints");
    let mirrored = request.redundancy.is_mirrored();
    for k in 0..request.providers.len() {
        let types = types_of(request, k);
        for j in 0..request.workloads.len() {
            let hosts: VarId = vars.provider_app[k][j];
            let active = vars.provider_active[k];

            // Σ_{t∈k} p[t][j] - v[k][j] >= 0
            let mut expr = LinearExpr::sum(types.iter().map(|&t| vars.on_type[t][j]));
            expr.add_term(hosts, -1);
            cp.add_ge(expr, 0, format!("hosts_{k}_{j}"));

            if mirrored {
                cp.add_le_expr(
                    LinearExpr::new().term(active, 1),
                    LinearExpr::new().term(hosts, 1),
                    format!("mirrored_serves_all_{k}_{j}"),
                );
            } else {
                cp.add_le_expr(
                    LinearExpr::new().term(hosts, 1),
                    LinearExpr::new().term(active, 1),
                    format!("hosted_on_active_{k}_{j}"),
                );
            }
        }
    }
}

fn add_carbon_budget(cp: &mut CpModel, request: &PlacementRequest, vars: &PlacementVars) {
    let Some(budget) = request.carbon_budget else {
        debug!("no carbon budget, skipping carbon constraint");
        return;
    };
    info!(budget, "adding carbon budget constraint");
    let mut expr = LinearExpr::new();
    for (t, machine) in request.machine_types.iter().enumerate() {
        expr.add_term(vars.units[t], machine.carbon);
    }
    cp.add_le(expr, budget, "carbon_budget");
}
