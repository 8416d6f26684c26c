//! Integration tests for loading planning inputs from disk.
//!
//! Writes a catalog, a template and a config file into a temp directory and
//! checks the request that comes out the other end.

use std::fs;
use std::path::Path;
use std::time::Duration;

use stratus_core::{
    Catalog, PlanningOverrides, PlanningSettings, RedundancyMode, StratusConfig, Topology,
    ValueSource, assemble_request,
};

const CATALOG: &str = "\
Provider,Model,RAM,vCPUs,Price,CarbonFootprint
aws,m5.large,8,2,0.096,0.0021
aws,m5.xlarge,16,4,0.192,0.0042
gcp,e2-standard-2,8,2,0.067,0.0018
azure,D2s_v5,8,2,0.096,0.0025
";

const TEMPLATE: &str = r#"
service_template:
  node_templates:
    frontend:
      type: cloud_native.nodes.Service
      properties:
        containers:
          - resources: { cpu_min: 250m, mem_min: 256Mi }
        scalability: { default_instances: 2 }
    cache:
      type: cloud_native.nodes.BackingService
      properties:
        containers:
          - resources: { cpu_min: 500m, mem_min: 1Gi }
        scalability: { default_instances: 1 }
    lb:
      type: cloud_native.nodes.LoadBalancer
policies:
  - spread:
      type: cloud_native.policies.CloudDistribution
      properties:
        strategy: mirror
        min_providers: 2
        allowed_providers: [aws, gcp]
"#;

const CONFIG: &str = r#"
[solver]
time_budget_secs = 7.5

[providers.gcp]
activation_cost = 12.0
"#;

#[test]
fn disk_inputs_assemble_into_request() {
    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("machines.csv");
    let template_path = dir.path().join("topology.yaml");
    let config_path = dir.path().join("stratus.toml");
    fs::write(&catalog_path, CATALOG).unwrap();
    fs::write(&template_path, TEMPLATE).unwrap();
    fs::write(&config_path, CONFIG).unwrap();

    let catalog = Catalog::from_path(&catalog_path).unwrap();
    let topology = Topology::from_path(&template_path).unwrap();
    let config = StratusConfig::from_file(&config_path).unwrap();
    let settings = PlanningSettings::resolve(&PlanningOverrides::default(), &topology, &config);

    assert_eq!(settings.time_budget.value, Duration::from_millis(7500));
    assert_eq!(settings.time_budget.source, ValueSource::ConfigFile);
    assert_eq!(settings.redundancy.source, ValueSource::Template);

    let request = assemble_request(catalog, &topology, &settings, Some("disk".into())).unwrap();

    // azure is filtered out by the allow-list.
    let names: Vec<_> = request.providers.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["aws", "gcp"]);
    assert_eq!(request.machine_types.len(), 3);
    assert_eq!(request.providers[0].activation_cost, 0);
    assert_eq!(request.providers[1].activation_cost, 1200);

    assert_eq!(request.workloads.len(), 2);
    assert_eq!(request.workloads[0].name, "frontend");
    assert_eq!(request.workloads[0].vcpu, 250);
    assert_eq!(request.workloads[1].memory, 1024);
    assert_eq!(request.total_demand(), 3);

    assert_eq!(request.redundancy, RedundancyMode::Mirrored);
    assert_eq!(request.target_providers, 2);
    assert_eq!(request.carbon_budget, None);
    assert_eq!(request.scenario_label(), "disk");
}

#[test]
fn cli_flags_win_over_every_other_source() {
    let topology = Topology::parse(TEMPLATE).unwrap();
    let config = StratusConfig::parse(CONFIG).unwrap();
    let cli = PlanningOverrides {
        time_budget_secs: Some(1.0),
        mirroring: Some(false),
        target_providers: Some(0),
        activation_costs: Some(vec![3.0, 4.0]),
        ..Default::default()
    };
    let settings = PlanningSettings::resolve(&cli, &topology, &config);
    let catalog = Catalog::from_reader(CATALOG.as_bytes(), Path::new("inline.csv")).unwrap();
    let request = assemble_request(catalog, &topology, &settings, None).unwrap();

    assert_eq!(request.time_budget, Duration::from_secs(1));
    assert_eq!(request.redundancy, RedundancyMode::Distributed);
    assert_eq!(request.target_providers, 0);
    assert_eq!(request.providers[0].activation_cost, 300);
    assert_eq!(request.providers[1].activation_cost, 400);
}

#[test]
fn missing_catalog_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let err = Catalog::from_path(&dir.path().join("absent.csv")).unwrap_err();
    assert!(err.to_string().contains("absent.csv"));
}
