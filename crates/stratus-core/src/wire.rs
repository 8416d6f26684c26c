//! Inbound JSON wire format.
//!
//! The vector form accepted by the REST boundary. Resource and cost vectors
//! are already in model units: vCPU in millicores, memory in MiB, costs in
//! minor currency units and per-machine carbon in fixed point. Only the
//! carbon ceiling arrives as a decimal and is scaled here.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::scale;
use crate::types::{CloudProvider, MachineType, PlacementRequest, RedundancyMode, Workload};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationRequest {
    pub cloud_providers_quantity: usize,
    pub machine_types_quantity: usize,
    pub applications_quantity: usize,
    /// Owning provider index for every machine type.
    #[serde(alias = "distribuitionMachineTypesPerCloudProvider")]
    pub distribution_machine_types_per_cloud_provider: Vec<usize>,
    pub vcpu_per_machine_type: Vec<u64>,
    pub memory_per_machine_type: Vec<u64>,
    pub cost_per_machine_type: Vec<i64>,
    pub carbon_footprint_per_machine_type: Vec<i64>,
    pub vcpu_per_application: Vec<u64>,
    pub memory_per_application: Vec<u64>,
    pub instances_per_application: Vec<u64>,
    #[serde(default)]
    pub application_names: Vec<String>,
    /// Activation cost per provider; empty means free.
    #[serde(default)]
    pub cluster_cost_per_cloud_provider: Vec<i64>,
    #[serde(default)]
    pub fixed_cost: i64,
    /// gCO2e as a decimal; absent leaves carbon unconstrained.
    #[serde(default)]
    pub max_total_carbon_footprint: Option<f64>,
    #[serde(default)]
    pub is_mirroring_enabled: bool,
    #[serde(default)]
    pub target_cloud_count: u32,
    pub max_time_in_seconds: f64,
    #[serde(default)]
    pub machine_model_names: Vec<String>,
    #[serde(default)]
    pub cloud_provider_names: Vec<String>,
    #[serde(default)]
    pub scenario: Option<String>,
    /// Parallel search workers; absent uses the host's parallelism.
    #[serde(default)]
    pub workers: Option<usize>,
}

fn check_len(field: &str, actual: usize, expected: usize) -> CoreResult<()> {
    if actual != expected {
        return Err(CoreError::invalid(format!(
            "{field} has {actual} entries, expected {expected}"
        )));
    }
    Ok(())
}

impl OptimizationRequest {
    /// Validate vector shapes and convert into a [`PlacementRequest`].
    pub fn into_request(self) -> CoreResult<PlacementRequest> {
        let providers = self.cloud_providers_quantity;
        let machines = self.machine_types_quantity;
        let apps = self.applications_quantity;

        check_len(
            "distributionMachineTypesPerCloudProvider",
            self.distribution_machine_types_per_cloud_provider.len(),
            machines,
        )?;
        check_len("vcpuPerMachineType", self.vcpu_per_machine_type.len(), machines)?;
        check_len("memoryPerMachineType", self.memory_per_machine_type.len(), machines)?;
        check_len("costPerMachineType", self.cost_per_machine_type.len(), machines)?;
        check_len(
            "carbonFootprintPerMachineType",
            self.carbon_footprint_per_machine_type.len(),
            machines,
        )?;
        check_len("vcpuPerApplication", self.vcpu_per_application.len(), apps)?;
        check_len("memoryPerApplication", self.memory_per_application.len(), apps)?;
        check_len("instancesPerApplication", self.instances_per_application.len(), apps)?;
        if !self.application_names.is_empty() {
            check_len("applicationNames", self.application_names.len(), apps)?;
        }
        if !self.cluster_cost_per_cloud_provider.is_empty() {
            check_len(
                "clusterCostPerCloudProvider",
                self.cluster_cost_per_cloud_provider.len(),
                providers,
            )?;
        }
        if !self.machine_model_names.is_empty() {
            check_len("machineModelNames", self.machine_model_names.len(), machines)?;
        }
        if !self.cloud_provider_names.is_empty() {
            check_len("cloudProviderNames", self.cloud_provider_names.len(), providers)?;
        }
        if let Some(&bad) = self
            .distribution_machine_types_per_cloud_provider
            .iter()
            .find(|&&p| p >= providers)
        {
            return Err(CoreError::invalid(format!(
                "machine type references provider {bad}, only {providers} declared"
            )));
        }
        if !(self.max_time_in_seconds.is_finite() && self.max_time_in_seconds > 0.0) {
            return Err(CoreError::invalid("maxTimeInSeconds must be positive"));
        }
        let time_budget = Duration::try_from_secs_f64(self.max_time_in_seconds).map_err(|e| {
            CoreError::invalid(format!(
                "maxTimeInSeconds {} is out of range: {e}",
                self.max_time_in_seconds
            ))
        })?;
        let carbon_budget = match self.max_total_carbon_footprint {
            Some(c) if !c.is_finite() || c < 0.0 => {
                return Err(CoreError::invalid(format!(
                    "maxTotalCarbonFootprint must be a non-negative number, got {c}"
                )));
            }
            Some(c) => Some(scale::carbon_to_fixed(c)),
            None => None,
        };

        let providers = (0..providers)
            .map(|id| CloudProvider {
                id,
                name: self
                    .cloud_provider_names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| format!("provider-{id}")),
                activation_cost: self.cluster_cost_per_cloud_provider.get(id).copied().unwrap_or(0),
            })
            .collect();

        let machine_types = (0..machines)
            .map(|id| MachineType {
                id,
                name: self
                    .machine_model_names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| format!("machine-{id}")),
                provider: self.distribution_machine_types_per_cloud_provider[id],
                vcpu: self.vcpu_per_machine_type[id],
                memory: self.memory_per_machine_type[id],
                unit_cost: self.cost_per_machine_type[id],
                carbon: self.carbon_footprint_per_machine_type[id],
            })
            .collect();

        let workloads = (0..apps)
            .map(|id| Workload {
                id,
                name: self
                    .application_names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| format!("app-{id}")),
                vcpu: self.vcpu_per_application[id],
                memory: self.memory_per_application[id],
                instances: self.instances_per_application[id],
            })
            .collect();

        let request = PlacementRequest {
            providers,
            machine_types,
            workloads,
            redundancy: RedundancyMode::from_mirroring(self.is_mirroring_enabled),
            carbon_budget,
            target_providers: self.target_cloud_count,
            fixed_cost: self.fixed_cost,
            time_budget,
            scenario: self.scenario,
        };
        request.validate()?;
        Ok(request)
    }
}
