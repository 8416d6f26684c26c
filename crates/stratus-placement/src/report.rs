//! Solution reporter.
//!
//! Turns a [`PlacementSolution`] back into decimal, per-unit terms: which
//! providers are active, how many units of each machine type run, which
//! instances every unit carries, plus solver metrics. Failed searches become
//! a [`FailureReport`] instead of an error.

use serde::Serialize;
use stratus_core::PlacementRequest;
use stratus_core::scale::{fixed_to_carbon, minor_to_cost};

use crate::search::{Assignment, ElapsedTime, ModelComplexity, PlacementSolution, SearchState};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InputMetrics {
    pub apps: usize,
    pub target_cloud_providers: u32,
    pub analyzed_cloud_providers: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolverResults {
    pub status: String,
    pub cost_z: f64,
    pub best_bound: f64,
    /// Percent.
    pub gap: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub wall_time_seconds: f64,
    pub elapsed: ElapsedTime,
    pub det_time: f64,
    pub branches: u64,
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationTotal {
    pub app: String,
    pub instances: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineTypeSummary {
    pub name: String,
    pub units: u64,
    pub applications: Vec<ApplicationTotal>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub name: String,
    pub active: bool,
    pub activation_cost: f64,
    pub machine_types: Vec<MachineTypeSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub app: String,
    /// Millicores.
    pub vcpu_used: u64,
    /// MiB.
    pub mem_used: u64,
}

/// One provisioned machine unit.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnitReport {
    pub cloud_provider: String,
    #[serde(rename = "type")]
    pub machine_type: String,
    pub carbon_emission: f64,
    pub cpu_utilization_pct: f64,
    pub mem_utilization_pct: f64,
    pub allocations: Vec<Allocation>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Infrastructure {
    pub instances: Vec<UnitReport>,
    pub global_cpu_utilization_pct: f64,
    pub global_mem_utilization_pct: f64,
}

/// Report for a search that produced a placement.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlacementReport {
    pub scenario: String,
    pub input_metrics: InputMetrics,
    pub solver_results: SolverResults,
    pub performance_metrics: PerformanceMetrics,
    pub model_complexity: ModelComplexity,
    pub total_carbon: f64,
    pub warnings: Vec<String>,
    pub providers: Vec<ProviderSummary>,
    pub infrastructure: Infrastructure,
}

/// Report for an infeasible or fruitless search.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub status: String,
    pub error_message: String,
    pub warnings: Vec<String>,
}

/// Either report, serialized without a tag.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PlacementOutcome {
    Solved(Box<PlacementReport>),
    Failed(FailureReport),
}

impl PlacementOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, Self::Solved(_))
    }

    pub fn status(&self) -> &str {
        match self {
            Self::Solved(report) => &report.solver_results.status,
            Self::Failed(failure) => &failure.status,
        }
    }
}

/// Build the outbound report for `solution`.
pub fn build_report(request: &PlacementRequest, solution: &PlacementSolution) -> PlacementOutcome {
    match (&solution.assignment, solution.objective) {
        (Some(assignment), Some(objective)) if solution.state.has_solution() => {
            PlacementOutcome::Solved(Box::new(solved(request, solution, assignment, objective)))
        }
        _ => PlacementOutcome::Failed(failure(request, solution)),
    }
}

fn failure(request: &PlacementRequest, solution: &PlacementSolution) -> FailureReport {
    let error_message = match solution.state {
        SearchState::NoSolutionTimedOut => format!(
            "no feasible placement found within the {:.1}s time budget",
            request.time_budget.as_secs_f64()
        ),
        _ => "no placement satisfies every capacity, redundancy, provider and carbon constraint".to_string(),
    };
    FailureReport {
        status: solution.state.label().to_string(),
        error_message,
        warnings: solution.warnings.clone(),
    }
}

fn pct(used: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        return 0.0;
    }
    used as f64 / capacity as f64 * 100.0
}

/// Realized carbon footprint of `assignment`, fixed point.
pub fn total_carbon(request: &PlacementRequest, assignment: &Assignment) -> i64 {
    request
        .machine_types
        .iter()
        .zip(&assignment.units)
        .map(|(m, &units)| m.carbon.saturating_mul(units as i64))
        .fold(0i64, i64::saturating_add)
}

fn solved(
    request: &PlacementRequest,
    solution: &PlacementSolution,
    assignment: &Assignment,
    objective: i64,
) -> PlacementReport {
    let mut providers = Vec::with_capacity(request.providers.len());
    let mut instances = Vec::new();
    let (mut cpu_used, mut cpu_capacity, mut mem_used, mut mem_capacity) = (0u64, 0u64, 0u64, 0u64);

    for (k, provider) in request.providers.iter().enumerate() {
        let active = assignment.provider_active[k];
        let mut machine_types = Vec::new();

        for (t, machine) in request.machine_types.iter().enumerate() {
            let units = assignment.units[t];
            if machine.provider != k || units == 0 {
                continue;
            }
            let applications = request
                .workloads
                .iter()
                .enumerate()
                .filter(|(j, _)| assignment.on_type[t][*j] > 0)
                .map(|(j, w)| ApplicationTotal {
                    app: w.name.clone(),
                    instances: assignment.on_type[t][j],
                })
                .collect();
            machine_types.push(MachineTypeSummary {
                name: machine.name.clone(),
                units,
                applications,
            });

            let allocations: Vec<Allocation> = request
                .workloads
                .iter()
                .enumerate()
                .filter(|(j, _)| assignment.per_unit[t][*j] > 0)
                .map(|(j, w)| Allocation {
                    app: w.name.clone(),
                    vcpu_used: assignment.per_unit[t][j] * w.vcpu,
                    mem_used: assignment.per_unit[t][j] * w.memory,
                })
                .collect();
            let unit_cpu: u64 = allocations.iter().map(|a| a.vcpu_used).sum();
            let unit_mem: u64 = allocations.iter().map(|a| a.mem_used).sum();

            // Homogeneous packing: every unit of the type carries the same load.
            for _ in 0..units {
                instances.push(UnitReport {
                    cloud_provider: provider.name.clone(),
                    machine_type: machine.name.clone(),
                    carbon_emission: fixed_to_carbon(machine.carbon),
                    cpu_utilization_pct: pct(unit_cpu, machine.vcpu),
                    mem_utilization_pct: pct(unit_mem, machine.memory),
                    allocations: allocations.clone(),
                });
            }
            cpu_used += unit_cpu * units;
            mem_used += unit_mem * units;
            cpu_capacity += machine.vcpu * units;
            mem_capacity += machine.memory * units;
        }

        providers.push(ProviderSummary {
            name: provider.name.clone(),
            active,
            activation_cost: minor_to_cost(provider.activation_cost),
            machine_types,
        });
    }

    PlacementReport {
        scenario: request.scenario_label(),
        input_metrics: InputMetrics {
            apps: request.workloads.len(),
            target_cloud_providers: request.target_providers,
            analyzed_cloud_providers: request.providers.len(),
        },
        solver_results: SolverResults {
            status: solution.state.label().to_string(),
            cost_z: minor_to_cost(objective),
            best_bound: minor_to_cost(solution.best_bound),
            gap: solution.gap_pct().unwrap_or(0.0),
        },
        performance_metrics: PerformanceMetrics {
            wall_time_seconds: solution.stats.wall_time.as_secs_f64(),
            elapsed: ElapsedTime::from(solution.stats.wall_time),
            det_time: solution.stats.deterministic_time(),
            branches: solution.stats.branches,
            workers: solution.stats.workers,
        },
        model_complexity: solution.complexity,
        total_carbon: fixed_to_carbon(total_carbon(request, assignment)),
        warnings: solution.warnings.clone(),
        providers,
        infrastructure: Infrastructure {
            instances,
            global_cpu_utilization_pct: pct(cpu_used, cpu_capacity),
            global_mem_utilization_pct: pct(mem_used, mem_capacity),
        },
    }
}

/// Plain-text rendering for terminals.
pub fn format_report(outcome: &PlacementOutcome) -> String {
    let mut out = String::new();
    match outcome {
        PlacementOutcome::Failed(failure) => {
            out.push_str(&format!("Status: {}\n", failure.status));
            out.push_str(&format!("{}\n", failure.error_message));
            for warning in &failure.warnings {
                out.push_str(&format!("warning: {warning}\n"));
            }
        }
        PlacementOutcome::Solved(report) => {
            let r = &report.solver_results;
            let perf = &report.performance_metrics;
            out.push_str(&format!("Scenario: {}\n", report.scenario));
            out.push_str(&format!("Status: {}\n", r.status));
            out.push_str(&format!("Total cost: {:.2}\n", r.cost_z));
            out.push_str(&format!("Best bound: {:.2} (gap {:.2}%)\n", r.best_bound, r.gap));
            out.push_str(&format!(
                "Execution time: {} ({} branches, det. time {:.3}, {} workers)\n",
                perf.elapsed, perf.branches, perf.det_time, perf.workers
            ));
            out.push_str(&"-".repeat(48));
            out.push('\n');

            for provider in &report.providers {
                if !provider.active {
                    out.push_str(&format!("{}: inactive\n", provider.name));
                    continue;
                }
                out.push_str(&format!(
                    "{}: active (activation cost {:.2})\n",
                    provider.name, provider.activation_cost
                ));
                for machine in &provider.machine_types {
                    out.push_str(&format!("  {} x {}\n", machine.units, machine.name));
                    for app in &machine.applications {
                        out.push_str(&format!("    -> {}: {} instances\n", app.app, app.instances));
                    }
                }
            }

            let infra = &report.infrastructure;
            out.push_str(&"-".repeat(48));
            out.push('\n');
            out.push_str(&format!(
                "Utilization: vCPU {:.2}% | memory {:.2}%\n",
                infra.global_cpu_utilization_pct, infra.global_mem_utilization_pct
            ));
            out.push_str(&format!("Total carbon footprint: {} gCO2e\n", report.total_carbon));
            let c = &report.model_complexity;
            out.push_str(&format!(
                "Model: {} int vars, {} bool vars, {} constraints\n",
                c.int_vars, c.bool_vars, c.constraints
            ));
            for warning in &report.warnings {
                out.push_str(&format!("warning: {warning}\n"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cp::SolveStats;
    use crate::model::tests::{machine, provider, request, workload};

    fn complexity() -> ModelComplexity {
        ModelComplexity {
            int_vars: 4,
            bool_vars: 2,
            total_vars: 6,
            constraints: 9,
        }
    }

    fn two_unit_solution() -> (PlacementRequest, PlacementSolution) {
        let mut req = request(
            vec![provider(0, "aws", 500), provider(1, "gcp", 300)],
            vec![machine(0, 0, 4000, 8192, 10_000), machine(1, 1, 4000, 8192, 9_000)],
            vec![workload(0, 1000, 2048, 2)],
        );
        req.machine_types[0].carbon = 25_000_000_000;
        let solution = PlacementSolution {
            state: SearchState::Optimal,
            objective: Some(20_500),
            best_bound: 20_500,
            lower_bound: 1_000,
            cost_ceiling: 100_000,
            assignment: Some(Assignment {
                provider_active: vec![true, false],
                units: vec![2, 0],
                per_unit: vec![vec![1], vec![0]],
                on_type: vec![vec![2], vec![0]],
                provider_app: vec![vec![true], vec![false]],
            }),
            stats: SolveStats {
                branches: 12,
                propagations: 3_000_000,
                wall_time: Duration::from_millis(1500),
                workers: 2,
            },
            complexity: complexity(),
            warnings: vec![],
        };
        (req, solution)
    }

    #[test]
    fn solved_report_expands_units() {
        let (req, solution) = two_unit_solution();
        let PlacementOutcome::Solved(report) = build_report(&req, &solution) else {
            panic!("expected a solved report");
        };
        assert_eq!(report.scenario, "Test_00");
        assert_eq!(report.solver_results.status, "OPTIMAL");
        assert_eq!(report.solver_results.cost_z, 205.0);
        assert_eq!(report.solver_results.gap, 0.0);
        assert_eq!(report.performance_metrics.det_time, 3.0);
        assert_eq!(report.performance_metrics.elapsed.seconds, 1);
        assert_eq!(report.total_carbon, 5.0);

        let units = &report.infrastructure.instances;
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].cloud_provider, "aws");
        assert_eq!(units[0].carbon_emission, 2.5);
        assert_eq!(units[0].cpu_utilization_pct, 25.0);
        assert_eq!(units[0].mem_utilization_pct, 25.0);
        assert_eq!(units[0].allocations[0].vcpu_used, 1000);

        assert!(report.providers[0].active);
        assert!(!report.providers[1].active);
        assert_eq!(report.providers[0].machine_types[0].applications[0].instances, 2);
        assert_eq!(report.infrastructure.global_cpu_utilization_pct, 25.0);
    }

    #[test]
    fn report_serializes_camel_case() {
        let (req, solution) = two_unit_solution();
        let json = serde_json::to_value(build_report(&req, &solution)).unwrap();
        assert_eq!(json["solverResults"]["costZ"], 205.0);
        assert_eq!(json["modelComplexity"]["boolVars"], 2);
        assert_eq!(json["infrastructure"]["instances"][0]["type"], "type-0");
        assert_eq!(json["performanceMetrics"]["detTime"], 3.0);
        assert!(json.get("status").is_none());
    }

    #[test]
    fn failed_search_becomes_failure_report() {
        let (req, mut solution) = two_unit_solution();
        solution.state = SearchState::NoSolutionTimedOut;
        solution.objective = None;
        solution.assignment = None;
        solution.warnings = vec!["workload 'app-0' does not fit on any machine type".into()];

        let outcome = build_report(&req, &solution);
        assert!(!outcome.is_solved());
        assert_eq!(outcome.status(), "UNKNOWN");

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "UNKNOWN");
        assert!(json["errorMessage"].as_str().unwrap().contains("time budget"));
        assert_eq!(json["warnings"].as_array().unwrap().len(), 1);

        let text = format_report(&outcome);
        assert_eq!(text.lines().next(), Some("Status: UNKNOWN"));
        assert!(text.contains("warning: workload 'app-0'"));
    }

    #[test]
    fn text_report_lists_active_providers() {
        let (req, solution) = two_unit_solution();
        let text = format_report(&build_report(&req, &solution));
        assert!(text.contains("Total cost: 205.00"));
        assert!(text.contains("aws: active"));
        assert!(text.contains("gcp: inactive"));
        assert!(text.contains("2 x type-0"));
        assert!(text.contains("Total carbon footprint: 5 gCO2e"));
        assert!(text.lines().any(|line| line == "gcp: inactive"));
        assert!(text.lines().any(|line| line == "-".repeat(48)));
        assert!(text.ends_with('\n'));
    }
}
