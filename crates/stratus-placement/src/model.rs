//! Model builder: derived bounds and decision variables.
//!
//! Variable families, indexed by provider `k`, machine type `t` and
//! workload `j`:
//!
//! - `z[k]` bool: provider is active
//! - `y[t]`: provisioned units of the type
//! - `x[t][j]`: instances of `j` on each unit of `t` (homogeneous packing)
//! - `p[t][j] = y[t] × x[t][j]`: instances of `j` on the type overall
//! - `v[k][j]` bool: provider hosts at least one instance of `j`

use stratus_core::PlacementRequest;
use tracing::{debug, info};

use crate::constraints;
use crate::cp::{CpModel, VarId};
use crate::error::PlacementResult;
use crate::objective::{self, PresolveReport};

/// Multiplier applied to the per-type unit estimate so the domain of `y`
/// never cuts a feasible packing.
const UNIT_CAP_HEADROOM: u64 = 100;

/// Numbers derived from the request before any variable exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelBounds {
    pub total_demand: u64,
    /// Upper bound of `y[t]`.
    pub unit_caps: Vec<i64>,
    /// Largest number of instances of any single workload one unit of any
    /// type can hold.
    pub max_instances_per_unit: u64,
    /// Pessimistic cost ceiling (minor units).
    pub cost_ceiling: i64,
    /// Analytical lower bound on the objective (minor units).
    pub lower_bound: i64,
}

impl ModelBounds {
    /// Derive the bounds for `request`.
    ///
    /// A machine type that cannot host a single instance of any workload
    /// gets a unit cap of 0. Together with `Σ y[t∈k] >= z[k]` this means a
    /// provider whose types are all unusable can never be active, so an
    /// exact provider target that counts it is infeasible.
    pub fn compute(request: &PlacementRequest) -> Self {
        let total_demand = request.total_demand();

        let unit_caps = request
            .machine_types
            .iter()
            .map(|machine| {
                let smallest_fit = request
                    .workloads
                    .iter()
                    .map(|w| machine.instances_of(w))
                    .filter(|&cap| cap > 0)
                    .min();
                match smallest_fit {
                    Some(cap) => to_i64((total_demand / cap + 1).saturating_mul(UNIT_CAP_HEADROOM)),
                    None => 0,
                }
            })
            .collect();

        let max_instances_per_unit = request
            .machine_types
            .iter()
            .flat_map(|m| request.workloads.iter().map(move |w| m.instances_of(w)))
            .max()
            .unwrap_or(0);

        Self {
            total_demand,
            unit_caps,
            max_instances_per_unit,
            cost_ceiling: cost_ceiling(request),
            lower_bound: objective::lower_bound(request),
        }
    }
}

/// `fixed + maxActivation·K + totalDemand·K·maxUnitCost`, saturating.
pub fn cost_ceiling(request: &PlacementRequest) -> i64 {
    let providers = request.providers.len() as i64;
    let max_activation = request
        .providers
        .iter()
        .map(|p| p.activation_cost)
        .max()
        .unwrap_or(0);
    let max_unit_cost = request
        .machine_types
        .iter()
        .map(|m| m.unit_cost)
        .max()
        .unwrap_or(0);
    let demand = to_i64(request.total_demand());

    request
        .fixed_cost
        .saturating_add(max_activation.saturating_mul(providers))
        .saturating_add(demand.saturating_mul(providers).saturating_mul(max_unit_cost))
}

pub(crate) fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Handles to every decision variable.
#[derive(Debug, Clone)]
pub struct PlacementVars {
    pub provider_active: Vec<VarId>,
    pub units: Vec<VarId>,
    pub per_unit: Vec<Vec<VarId>>,
    pub on_type: Vec<Vec<VarId>>,
    pub provider_app: Vec<Vec<VarId>>,
}

/// A fully built model for one request.
#[derive(Debug, Clone)]
pub struct PlacementModel {
    pub cp: CpModel,
    pub vars: PlacementVars,
    pub objective: VarId,
    pub bounds: ModelBounds,
    pub presolve: PresolveReport,
}

impl PlacementModel {
    /// Build variables, constraints and objective for `request`.
    pub fn build(request: &PlacementRequest) -> PlacementResult<Self> {
        request.validate()?;
        let bounds = ModelBounds::compute(request);
        debug!(
            total_demand = bounds.total_demand,
            max_instances_per_unit = bounds.max_instances_per_unit,
            cost_ceiling = bounds.cost_ceiling,
            lower_bound = bounds.lower_bound,
            "model bounds computed"
        );

        let presolve = PresolveReport::inspect(request);
        let mut cp = CpModel::new();

        info!("adding provider activation variables");
        let provider_active: Vec<VarId> = (0..request.providers.len())
            .map(|k| cp.new_bool_var(format!("z_{k}")))
            .collect();

        info!("adding provisioned unit variables");
        let units: Vec<VarId> = bounds
            .unit_caps
            .iter()
            .enumerate()
            .map(|(t, &cap)| cp.new_int_var(0, cap, format!("y_{t}")))
            .collect();

        info!("adding per-unit instance variables");
        let per_unit: Vec<Vec<VarId>> = request
            .machine_types
            .iter()
            .map(|machine| {
                request
                    .workloads
                    .iter()
                    .map(|w| {
                        let cap = to_i64(machine.instances_of(w));
                        cp.new_int_var(0, cap, format!("x_{}_{}", machine.id, w.id))
                    })
                    .collect()
            })
            .collect();

        info!("adding per-type instance totals");
        let providers = request.providers.len() as i64;
        let mut on_type = Vec::with_capacity(request.machine_types.len());
        for (t, machine) in request.machine_types.iter().enumerate() {
            let mut row = Vec::with_capacity(request.workloads.len());
            for (j, workload) in request.workloads.iter().enumerate() {
                let cap = to_i64(workload.instances).saturating_mul(providers);
                let total = cp.new_int_var(0, cap, format!("p_{}_{}", machine.id, workload.id));
                cp.add_product(total, units[t], per_unit[t][j], format!("p_{t}_{j}=y*x"));
                row.push(total);
            }
            on_type.push(row);
        }

        info!("adding provider application activation variables");
        let provider_app: Vec<Vec<VarId>> = (0..request.providers.len())
            .map(|k| {
                (0..request.workloads.len())
                    .map(|j| cp.new_bool_var(format!("v_{k}_{j}")))
                    .collect()
            })
            .collect();

        let vars = PlacementVars {
            provider_active,
            units,
            per_unit,
            on_type,
            provider_app,
        };

        constraints::add_all(&mut cp, request, &vars, &bounds);
        let objective = objective::install(&mut cp, request, &vars, &bounds);

        info!(
            int_vars = cp.num_int_vars(),
            bool_vars = cp.num_bool_vars(),
            constraints = cp.num_constraints(),
            "placement model built"
        );

        Ok(Self {
            cp,
            vars,
            objective,
            bounds,
            presolve,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use stratus_core::{CloudProvider, MachineType, RedundancyMode, Workload};

    use super::*;

    pub(crate) fn provider(id: usize, name: &str, activation_cost: i64) -> CloudProvider {
        CloudProvider {
            id,
            name: name.into(),
            activation_cost,
        }
    }

    pub(crate) fn machine(id: usize, provider: usize, vcpu: u64, memory: u64, unit_cost: i64) -> MachineType {
        MachineType {
            id,
            name: format!("type-{id}"),
            provider,
            vcpu,
            memory,
            unit_cost,
            carbon: 0,
        }
    }

    pub(crate) fn workload(id: usize, vcpu: u64, memory: u64, instances: u64) -> Workload {
        Workload {
            id,
            name: format!("app-{id}"),
            vcpu,
            memory,
            instances,
        }
    }

    pub(crate) fn request(
        providers: Vec<CloudProvider>,
        machine_types: Vec<MachineType>,
        workloads: Vec<Workload>,
    ) -> PlacementRequest {
        PlacementRequest {
            providers,
            machine_types,
            workloads,
            redundancy: RedundancyMode::Distributed,
            carbon_budget: None,
            target_providers: 1,
            fixed_cost: 0,
            time_budget: Duration::from_secs(10),
            scenario: None,
        }
    }

    #[test]
    fn unit_caps_follow_smallest_fit() {
        // 4000m / 1000m = 4 per unit; 2 instances → (2/4 + 1) * 100.
        let req = request(
            vec![provider(0, "aws", 0)],
            vec![machine(0, 0, 4000, 8192, 100)],
            vec![workload(0, 1000, 1024, 2)],
        );
        let bounds = ModelBounds::compute(&req);
        assert_eq!(bounds.total_demand, 2);
        assert_eq!(bounds.unit_caps, vec![100]);
        assert_eq!(bounds.max_instances_per_unit, 4);
    }

    #[test]
    fn type_hosting_nothing_gets_zero_cap() {
        let req = request(
            vec![provider(0, "aws", 0)],
            vec![machine(0, 0, 500, 512, 10), machine(1, 0, 4000, 8192, 100)],
            vec![workload(0, 1000, 1024, 2)],
        );
        assert_eq!(ModelBounds::compute(&req).unit_caps[0], 0);
    }

    #[test]
    fn ceiling_covers_every_provider() {
        let mut req = request(
            vec![provider(0, "aws", 300), provider(1, "gcp", 500)],
            vec![machine(0, 0, 4000, 8192, 100), machine(1, 1, 4000, 8192, 80)],
            vec![workload(0, 1000, 1024, 3)],
        );
        req.fixed_cost = 50;
        // 50 + 500*2 + 3*2*100
        assert_eq!(cost_ceiling(&req), 1650);
    }

    #[test]
    fn builds_expected_variable_counts() {
        let req = request(
            vec![provider(0, "aws", 0), provider(1, "gcp", 0)],
            vec![machine(0, 0, 4000, 8192, 100), machine(1, 1, 2000, 4096, 60)],
            vec![workload(0, 1000, 1024, 2), workload(1, 500, 512, 1)],
        );
        let model = PlacementModel::build(&req).unwrap();
        // bools: z (2) + v (2*2); ints: y (2) + x (4) + p (4) + objective (1)
        assert_eq!(model.cp.num_bool_vars(), 6);
        assert_eq!(model.cp.num_int_vars(), 11);
        assert_eq!(model.vars.per_unit.len(), 2);
        assert_eq!(model.vars.on_type[1].len(), 2);
    }

    #[test]
    fn invalid_request_is_an_input_error() {
        let req = request(vec![provider(0, "aws", 0)], vec![], vec![workload(0, 1, 1, 1)]);
        assert!(matches!(
            PlacementModel::build(&req),
            Err(crate::error::PlacementError::Input(_))
        ));
    }
}
