//! Builds a [`PlacementRequest`] from a catalog, a topology and resolved
//! settings.

use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::error::{CoreError, CoreResult};
use crate::scale;
use crate::settings::{ActivationCosts, PlanningSettings};
use crate::topology::Topology;
use crate::types::PlacementRequest;

/// Assemble and validate a request.
///
/// The catalog is narrowed to the distribution policy's allow-list first, so
/// positional activation costs refer to the providers that remain.
pub fn assemble_request(
    catalog: Catalog,
    topology: &Topology,
    settings: &PlanningSettings,
    scenario: Option<String>,
) -> CoreResult<PlacementRequest> {
    let catalog = catalog.retain_providers(&settings.allowed_providers)?;
    let workloads = topology.workloads();
    if workloads.is_empty() {
        return Err(CoreError::Topology("template declares no application nodes".into()));
    }

    let activation = activation_costs(&catalog.providers, &settings.activation_costs.value)?;
    let carbon_budget = match settings.max_carbon.value {
        Some(limit) if !limit.is_finite() || limit < 0.0 => {
            return Err(CoreError::invalid(format!(
                "carbon ceiling must be a non-negative number, got {limit}"
            )));
        }
        Some(limit) => Some(scale::carbon_to_fixed(limit)),
        None => None,
    };
    let fixed_cost = settings.fixed_cost.value;
    if !fixed_cost.is_finite() || fixed_cost < 0.0 {
        return Err(CoreError::invalid(format!(
            "fixed cost must be a non-negative number, got {fixed_cost}"
        )));
    }

    let request = PlacementRequest {
        providers: catalog.cloud_providers(&activation),
        machine_types: catalog.machine_types,
        workloads,
        redundancy: settings.redundancy.value,
        carbon_budget,
        target_providers: settings.target_providers.value,
        fixed_cost: scale::cost_to_minor(fixed_cost),
        time_budget: settings.time_budget.value,
        scenario,
    };
    request.validate()?;

    info!(
        providers = request.providers.len(),
        machine_types = request.machine_types.len(),
        workloads = request.workloads.len(),
        total_demand = request.total_demand(),
        mode = request.redundancy.label(),
        "placement request assembled"
    );
    Ok(request)
}

fn activation_costs(providers: &[String], costs: &ActivationCosts) -> CoreResult<Vec<i64>> {
    let raw: Vec<f64> = match costs {
        ActivationCosts::Positional(list) => {
            if list.len() != providers.len() {
                return Err(CoreError::invalid(format!(
                    "{} activation costs given for {} analyzed cloud providers",
                    list.len(),
                    providers.len()
                )));
            }
            list.clone()
        }
        ActivationCosts::Named(named) => providers
            .iter()
            .map(|p| {
                named
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(p))
                    .map_or(0.0, |(_, cost)| *cost)
            })
            .collect(),
        ActivationCosts::Free => vec![0.0; providers.len()],
    };

    if let Some(bad) = raw.iter().find(|c| !c.is_finite() || **c < 0.0) {
        return Err(CoreError::invalid(format!(
            "activation cost must be a non-negative number, got {bad}"
        )));
    }
    debug!(?providers, ?raw, "resolved activation costs");
    Ok(raw.into_iter().map(scale::cost_to_minor).collect())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::StratusConfig;
    use crate::settings::PlanningOverrides;
    use crate::types::RedundancyMode;

    const CATALOG: &str = "\
Provider,Model,RAM,vCPUs,Price,CarbonFootprint
aws,m5.large,8,2,0.10,0.002
gcp,e2-standard-2,8,2,0.07,0.001
";

    const TEMPLATE: &str = r#"
service_template:
  node_templates:
    api:
      type: cloud_native.nodes.Service
      properties:
        containers:
          - resources: { cpu_min: 1, mem_min: 1Gi }
        scalability: { default_instances: 2 }
"#;

    fn catalog() -> Catalog {
        Catalog::from_reader(CATALOG.as_bytes(), Path::new("c.csv")).unwrap()
    }

    fn settings(cli: PlanningOverrides, topology: &Topology) -> PlanningSettings {
        PlanningSettings::resolve(&cli, topology, &StratusConfig::default())
    }

    #[test]
    fn assembles_scaled_request() {
        let topology = Topology::parse(TEMPLATE).unwrap();
        let cli = PlanningOverrides {
            activation_costs: Some(vec![1.5, 0.0]),
            max_carbon: Some(0.5),
            fixed_cost: Some(2.0),
            ..Default::default()
        };
        let req = assemble_request(catalog(), &topology, &settings(cli, &topology), None).unwrap();
        assert_eq!(req.providers.len(), 2);
        assert_eq!(req.providers[0].activation_cost, 150);
        assert_eq!(req.fixed_cost, 200);
        assert_eq!(req.carbon_budget, Some(5_000_000_000));
        assert_eq!(req.workloads[0].vcpu, 1000);
        assert_eq!(req.workloads[0].memory, 1024);
        assert_eq!(req.redundancy, RedundancyMode::Distributed);
    }

    #[test]
    fn activation_list_must_match_providers() {
        let topology = Topology::parse(TEMPLATE).unwrap();
        let cli = PlanningOverrides {
            activation_costs: Some(vec![1.0]),
            ..Default::default()
        };
        let err = assemble_request(catalog(), &topology, &settings(cli, &topology), None).unwrap_err();
        assert!(matches!(err, CoreError::InputValidation(_)));
    }

    #[test]
    fn named_activation_costs_match_case_insensitively() {
        let costs = ActivationCosts::Named(vec![("GCP".into(), 4.0)]);
        let resolved = activation_costs(&["aws".into(), "gcp".into()], &costs).unwrap();
        assert_eq!(resolved, vec![0, 400]);
    }

    #[test]
    fn empty_template_is_rejected() {
        let topology = Topology::parse("service_template: { node_templates: {} }").unwrap();
        let settings = settings(PlanningOverrides::default(), &topology);
        assert!(assemble_request(catalog(), &topology, &settings, None).is_err());
    }
}
