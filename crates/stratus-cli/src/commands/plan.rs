use std::path::{Path, PathBuf};

use anyhow::Context;
use stratus_core::{
    Catalog, PlacementRequest, PlanningOverrides, PlanningSettings, StratusConfig, Topology,
    assemble_request,
};
use stratus_placement::{OptimizeOptions, PlacementOutcome, format_report, plan};
use tracing::info;

const DEFAULT_CONFIG: &str = "stratus.toml";

pub struct PlanArgs {
    pub template: PathBuf,
    pub catalog: PathBuf,
    pub overrides: PlanningOverrides,
    pub config: Option<PathBuf>,
    pub scenario: Option<String>,
    pub output: Option<PathBuf>,
    pub format: String,
}

/// Replace a leading `~` or `$HOME` component with the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    expand_with(path, dirs::home_dir().as_deref())
}

fn expand_with(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    ["~", "$HOME"]
        .iter()
        .find_map(|prefix| path.strip_prefix(prefix).ok())
        .map_or_else(|| path.to_path_buf(), |rest| home.join(rest))
}

pub fn run(args: PlanArgs) -> anyhow::Result<()> {
    let (request, settings) = prepare(&args, Path::new(DEFAULT_CONFIG))?;

    if args.format == "json" {
        info!("planning settings:\n{}", settings.summary_table());
    } else {
        println!("{}", settings.summary_table());
    }

    let options = OptimizeOptions {
        workers: settings.workers.value,
    };
    let outcome = plan(&request, &options)?;

    if let Some(path) = args.output.as_deref().map(expand_home) {
        write_report(&path, &outcome)?;
        info!(path = %path.display(), "report written");
    }

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&outcome)?),
        _ => println!("{}", format_report(&outcome)),
    }
    Ok(())
}

/// Load every input, resolve settings and assemble the request.
///
/// `fallback_config` is read only when no `--config` was given and it exists.
pub fn prepare(args: &PlanArgs, fallback_config: &Path) -> anyhow::Result<(PlacementRequest, PlanningSettings)> {
    let config = match args.config.as_deref().map(expand_home) {
        Some(path) => StratusConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None if fallback_config.is_file() => StratusConfig::from_file(fallback_config)
            .with_context(|| format!("loading config {}", fallback_config.display()))?,
        None => StratusConfig::default(),
    };
    let template_path = expand_home(&args.template);
    let catalog_path = expand_home(&args.catalog);
    let topology = Topology::from_path(&template_path)
        .with_context(|| format!("loading template {}", template_path.display()))?;
    let catalog = Catalog::from_path(&catalog_path)
        .with_context(|| format!("loading catalog {}", catalog_path.display()))?;

    let settings = PlanningSettings::resolve(&args.overrides, &topology, &config);
    let request = assemble_request(catalog, &topology, &settings, args.scenario.clone())?;
    Ok((request, settings))
}

fn write_report(path: &Path, outcome: &PlacementOutcome) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(outcome)?;
    std::fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use stratus_core::{RedundancyMode, ValueSource};

    use super::*;

    const CATALOG: &str = "\
Provider,Model,RAM,vCPUs,Price,CarbonFootprint
aws,m5.xlarge,16,4,0.20,0.004
gcp,e2-standard-4,16,4,0.15,0.003
";

    const TEMPLATE: &str = r#"
service_template:
  node_templates:
    web:
      type: cloud_native.nodes.Service
      properties:
        containers:
          - resources: { cpu_min: 1, mem_min: 1Gi }
        scalability: { default_instances: 2 }
policies:
  - distribution:
      type: cloud_native.policies.CloudDistribution
      properties:
        strategy: mirror
        min_providers: 2
"#;

    fn args(dir: &Path) -> PlanArgs {
        let template = dir.join("app.yaml");
        let catalog = dir.join("machines.csv");
        fs::write(&template, TEMPLATE).unwrap();
        fs::write(&catalog, CATALOG).unwrap();
        PlanArgs {
            template,
            catalog,
            overrides: PlanningOverrides {
                workers: Some(1),
                ..Default::default()
            },
            config: None,
            scenario: Some("cli".into()),
            output: Some(dir.join("report.json")),
            format: "json".into(),
        }
    }

    #[test]
    fn template_policy_reaches_the_request() {
        let dir = tempfile::tempdir().unwrap();
        let (request, settings) = prepare(&args(dir.path()), &dir.path().join("missing.toml")).unwrap();
        assert_eq!(request.redundancy, RedundancyMode::Mirrored);
        assert_eq!(request.target_providers, 2);
        assert_eq!(settings.target_providers.source, ValueSource::Template);
        assert_eq!(request.workloads[0].vcpu, 1000);
        assert_eq!(request.scenario.as_deref(), Some("cli"));
    }

    #[test]
    fn fallback_config_is_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("stratus.toml");
        fs::write(&fallback, "[solver]\ntime_budget_secs = 7.5\n").unwrap();
        let (request, settings) = prepare(&args(dir.path()), &fallback).unwrap();
        assert_eq!(request.time_budget.as_secs_f64(), 7.5);
        assert_eq!(settings.time_budget.source, ValueSource::ConfigFile);
    }

    #[test]
    fn cli_flags_win_over_template() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(dir.path());
        args.overrides.mirroring = Some(false);
        args.overrides.target_providers = Some(1);
        let (request, settings) = prepare(&args, &dir.path().join("missing.toml")).unwrap();
        assert_eq!(request.redundancy, RedundancyMode::Distributed);
        assert_eq!(request.target_providers, 1);
        assert_eq!(settings.redundancy.source, ValueSource::Cli);
    }

    #[test]
    fn run_writes_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(dir.path());
        let output = args.output.clone().unwrap();
        run(args).unwrap();

        let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(report["scenario"], "cli");
        assert_eq!(report["inputMetrics"]["targetCloudProviders"], 2);
        assert_eq!(report["infrastructure"]["instances"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn missing_catalog_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(dir.path());
        args.catalog = dir.path().join("nope.csv");
        let err = prepare(&args, &dir.path().join("missing.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("nope.csv"));
    }

    #[test]
    fn home_prefixes_are_expanded() {
        let home = Path::new("/home/ops");
        assert_eq!(
            expand_with(Path::new("~/plans/app.yaml"), Some(home)),
            home.join("plans/app.yaml")
        );
        assert_eq!(expand_with(Path::new("$HOME/machines.csv"), Some(home)), home.join("machines.csv"));
        assert_eq!(expand_with(Path::new("~"), Some(home)), home.to_path_buf());
    }

    #[test]
    fn other_paths_are_left_alone() {
        let home = Path::new("/home/ops");
        assert_eq!(expand_with(Path::new("plans/~/app.yaml"), Some(home)), PathBuf::from("plans/~/app.yaml"));
        assert_eq!(expand_with(Path::new("~ops/app.yaml"), Some(home)), PathBuf::from("~ops/app.yaml"));
        assert_eq!(expand_with(Path::new("~/app.yaml"), None), PathBuf::from("~/app.yaml"));
    }

    #[test]
    fn prepare_reads_inputs_under_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let Ok(dir) = tempfile::tempdir_in(&home) else {
            return;
        };
        let mut args = args(dir.path());
        let relative = dir.path().strip_prefix(&home).unwrap();
        args.template = Path::new("~").join(relative).join("app.yaml");
        args.catalog = Path::new("$HOME").join(relative).join("machines.csv");
        let (request, _) = prepare(&args, &dir.path().join("missing.toml")).unwrap();
        assert_eq!(request.workloads.len(), 1);
        assert_eq!(request.providers.len(), 2);
    }
}
