//! Domain types for a placement request.
//!
//! All quantities that enter the optimization model are integers: resources
//! in millicores and MiB, costs in minor currency units and carbon in fixed
//! point (see [`crate::scale`]). Every record here is immutable once a
//! [`PlacementRequest`] has been assembled.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Index of a provider inside [`PlacementRequest::providers`].
pub type ProviderIndex = usize;

/// Upper limit on the summed instance count of a request. Keeps every
/// derived model bound (big-M, unit caps, per-type totals) inside `i64`.
pub const MAX_TOTAL_INSTANCES: u64 = i32::MAX as u64;

// ── Catalog ────────────────────────────────────────────────────────

/// A cloud provider that owns machine types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudProvider {
    pub id: ProviderIndex,
    pub name: String,
    /// Fixed cost paid once if any machine of this provider is used (minor units).
    pub activation_cost: i64,
}

/// A machine type offered by one provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MachineType {
    pub id: usize,
    pub name: String,
    /// Owning provider.
    pub provider: ProviderIndex,
    /// vCPU capacity in millicores.
    pub vcpu: u64,
    /// Memory capacity in MiB.
    pub memory: u64,
    /// Cost of one provisioned unit (minor units).
    pub unit_cost: i64,
    /// Carbon footprint of one provisioned unit (fixed point, ×10¹⁰).
    pub carbon: i64,
}

impl MachineType {
    /// True if a single unit can host one instance of `workload`.
    pub fn fits(&self, workload: &Workload) -> bool {
        workload.vcpu <= self.vcpu && workload.memory <= self.memory
    }

    /// How many instances of `workload` one unit can hold on its own.
    pub fn instances_of(&self, workload: &Workload) -> u64 {
        if workload.vcpu == 0 || workload.memory == 0 {
            return 0;
        }
        (self.vcpu / workload.vcpu).min(self.memory / workload.memory)
    }
}

// ── Workloads ──────────────────────────────────────────────────────

/// An application to place, with per-instance requirements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workload {
    pub id: usize,
    pub name: String,
    /// vCPU per instance in millicores.
    pub vcpu: u64,
    /// Memory per instance in MiB.
    pub memory: u64,
    /// Required instance count.
    pub instances: u64,
}

// ── Request ────────────────────────────────────────────────────────

/// How demand is replicated across active providers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RedundancyMode {
    /// Every active provider carries a full replica of every workload.
    #[serde(alias = "mirror")]
    Mirrored,
    /// Demand is satisfied once, split freely across active providers.
    #[default]
    Distributed,
}

impl RedundancyMode {
    pub fn from_mirroring(enabled: bool) -> Self {
        if enabled { Self::Mirrored } else { Self::Distributed }
    }

    pub fn is_mirrored(self) -> bool {
        matches!(self, Self::Mirrored)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Mirrored => "Mirroring",
            Self::Distributed => "Distribution",
        }
    }
}

/// Everything one optimization run needs. Built once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlacementRequest {
    pub providers: Vec<CloudProvider>,
    pub machine_types: Vec<MachineType>,
    pub workloads: Vec<Workload>,
    pub redundancy: RedundancyMode,
    /// Maximum total carbon (fixed point). `None` leaves carbon unconstrained.
    pub carbon_budget: Option<i64>,
    /// Exact number of active providers; 0 means "at least one".
    pub target_providers: u32,
    /// Baseline cost always paid (minor units).
    pub fixed_cost: i64,
    /// Wall-clock budget for the search.
    pub time_budget: Duration,
    /// Optional label echoed in the report.
    pub scenario: Option<String>,
}

impl PlacementRequest {
    /// Total required instances over all workloads, saturating at
    /// `u64::MAX`. [`validate`](Self::validate) caps it at
    /// [`MAX_TOTAL_INSTANCES`].
    pub fn total_demand(&self) -> u64 {
        self.workloads
            .iter()
            .fold(0u64, |acc, w| acc.saturating_add(w.instances))
    }

    /// Machine types owned by `provider`, in catalog order.
    pub fn machine_types_of(&self, provider: ProviderIndex) -> impl Iterator<Item = &MachineType> {
        self.machine_types
            .iter()
            .filter(move |m| m.provider == provider)
    }

    /// Report label: the explicit scenario, or `Test_NN` with NN = apps / 10.
    pub fn scenario_label(&self) -> String {
        self.scenario
            .clone()
            .unwrap_or_else(|| format!("Test_{:02}", self.workloads.len() / 10))
    }

    /// Reject malformed requests before any model is built.
    pub fn validate(&self) -> CoreResult<()> {
        if self.providers.is_empty() {
            return Err(CoreError::invalid("no cloud providers"));
        }
        if self.machine_types.is_empty() {
            return Err(CoreError::invalid("no machine types"));
        }
        if self.workloads.is_empty() {
            return Err(CoreError::invalid("no workloads"));
        }
        if self.time_budget.is_zero() {
            return Err(CoreError::invalid("time budget must be positive"));
        }
        if self.fixed_cost < 0 {
            return Err(CoreError::invalid("fixed cost must not be negative"));
        }
        if self.carbon_budget.is_some_and(|c| c < 0) {
            return Err(CoreError::invalid("carbon budget must not be negative"));
        }

        for (idx, provider) in self.providers.iter().enumerate() {
            if provider.id != idx {
                return Err(CoreError::invalid(format!(
                    "provider '{}' has id {} at position {idx}",
                    provider.name, provider.id
                )));
            }
            if provider.activation_cost < 0 {
                return Err(CoreError::invalid(format!(
                    "provider '{}' has a negative activation cost",
                    provider.name
                )));
            }
        }

        for (idx, machine) in self.machine_types.iter().enumerate() {
            if machine.id != idx {
                return Err(CoreError::invalid(format!(
                    "machine type '{}' has id {} at position {idx}",
                    machine.name, machine.id
                )));
            }
            if machine.provider >= self.providers.len() {
                return Err(CoreError::invalid(format!(
                    "machine type '{}' references unknown provider {}",
                    machine.name, machine.provider
                )));
            }
            if machine.vcpu == 0 || machine.memory == 0 {
                return Err(CoreError::invalid(format!(
                    "machine type '{}' has zero capacity",
                    machine.name
                )));
            }
            if machine.unit_cost < 0 || machine.carbon < 0 {
                return Err(CoreError::invalid(format!(
                    "machine type '{}' has a negative cost or carbon footprint",
                    machine.name
                )));
            }
        }

        let mut demand = 0u64;
        for workload in &self.workloads {
            if workload.vcpu == 0 || workload.memory == 0 || workload.instances == 0 {
                return Err(CoreError::invalid(format!(
                    "workload '{}' requirements must be strictly positive",
                    workload.name
                )));
            }
            demand = demand
                .checked_add(workload.instances)
                .filter(|&d| d <= MAX_TOTAL_INSTANCES)
                .ok_or_else(|| {
                    CoreError::invalid(format!(
                        "total instance demand exceeds {MAX_TOTAL_INSTANCES}"
                    ))
                })?;
        }

        Ok(())
    }
}
