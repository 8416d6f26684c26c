//! Planning settings resolution.
//!
//! Each knob is resolved in priority order: CLI flag, template policy,
//! config file, built-in default. The source of every value is kept so the
//! CLI can show where a setting came from.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::config::StratusConfig;
use crate::topology::{Policy, Topology};
use crate::types::RedundancyMode;

pub const DEFAULT_TIME_BUDGET_SECS: f64 = 20.0;
pub const DEFAULT_TARGET_PROVIDERS: u32 = 1;

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ValueSource {
    Cli,
    Template,
    ConfigFile,
    Default,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cli => "CLI",
            Self::Template => "Template",
            Self::ConfigFile => "Config file",
            Self::Default => "System default",
        };
        f.write_str(label)
    }
}

/// A value together with its origin.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

fn resolve<T>(cli: Option<T>, template: Option<T>, config: Option<T>, default: T) -> Resolved<T> {
    if let Some(value) = cli {
        return Resolved { value, source: ValueSource::Cli };
    }
    if let Some(value) = template {
        return Resolved { value, source: ValueSource::Template };
    }
    if let Some(value) = config {
        return Resolved { value, source: ValueSource::ConfigFile };
    }
    Resolved { value: default, source: ValueSource::Default }
}

/// Values given explicitly on the command line (or by any other caller).
#[derive(Debug, Clone, Default)]
pub struct PlanningOverrides {
    pub time_budget_secs: Option<f64>,
    pub mirroring: Option<bool>,
    /// gCO2e.
    pub max_carbon: Option<f64>,
    pub target_providers: Option<u32>,
    /// Currency units.
    pub fixed_cost: Option<f64>,
    /// Currency units, one per provider in catalog order.
    pub activation_costs: Option<Vec<f64>>,
    pub workers: Option<usize>,
}

/// Activation costs before they are matched against catalog providers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum ActivationCosts {
    /// Positional list, one per provider.
    Positional(Vec<f64>),
    /// Keyed by provider name.
    Named(Vec<(String, f64)>),
    /// Every provider is free to activate.
    Free,
}

/// Fully resolved planning settings.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanningSettings {
    pub time_budget: Resolved<Duration>,
    pub redundancy: Resolved<RedundancyMode>,
    /// gCO2e; `None` is unbounded.
    pub max_carbon: Resolved<Option<f64>>,
    pub target_providers: Resolved<u32>,
    /// Currency units.
    pub fixed_cost: Resolved<f64>,
    pub activation_costs: Resolved<ActivationCosts>,
    /// `None` uses the machine's available parallelism.
    pub workers: Resolved<Option<usize>>,
    /// Provider allow-list from the distribution policy; empty allows all.
    pub allowed_providers: Vec<String>,
}

impl PlanningSettings {
    pub fn resolve(cli: &PlanningOverrides, topology: &Topology, config: &StratusConfig) -> Self {
        let (template_mode, template_target, allowed_providers) = match topology.distribution() {
            Some(Policy::CloudDistribution {
                strategy,
                min_providers,
                allowed_providers,
                ..
            }) => (Some(*strategy), *min_providers, allowed_providers.clone()),
            _ => (None, None, Vec::new()),
        };

        let time_budget = resolve(
            cli.time_budget_secs,
            None,
            config.solver.time_budget_secs,
            DEFAULT_TIME_BUDGET_SECS,
        );
        let time_budget = Resolved {
            value: Duration::try_from_secs_f64(time_budget.value.max(0.001)).unwrap_or(Duration::MAX),
            source: time_budget.source,
        };

        let redundancy = resolve(
            cli.mirroring.map(RedundancyMode::from_mirroring),
            template_mode,
            config.defaults.mirroring.map(RedundancyMode::from_mirroring),
            RedundancyMode::Distributed,
        );

        let max_carbon = resolve(
            cli.max_carbon.map(Some),
            topology.carbon_limit(),
            config.defaults.max_carbon.map(Some),
            None,
        );

        let target_providers = resolve(
            cli.target_providers,
            template_target,
            config.defaults.target_providers,
            DEFAULT_TARGET_PROVIDERS,
        );

        let fixed_cost = resolve(cli.fixed_cost, None, config.defaults.fixed_cost, 0.0);

        let named: Vec<(String, f64)> = config
            .providers
            .iter()
            .filter_map(|(name, p)| p.activation_cost.map(|c| (name.clone(), c)))
            .collect();
        let activation_costs = resolve(
            cli.activation_costs.clone().map(ActivationCosts::Positional),
            None,
            (!named.is_empty()).then_some(ActivationCosts::Named(named)),
            ActivationCosts::Free,
        );

        let workers = resolve(cli.workers.map(Some), None, config.solver.workers.map(Some), None);

        Self {
            time_budget,
            redundancy,
            max_carbon,
            target_providers,
            fixed_cost,
            activation_costs,
            workers,
            allowed_providers,
        }
    }

    /// Render a `PARAMETER | VALUE | SOURCE` table.
    pub fn summary_table(&self) -> String {
        let carbon = self
            .max_carbon
            .value
            .map_or_else(|| "unbounded".to_string(), |c| format!("{c}"));
        let workers = self
            .workers
            .value
            .map_or_else(|| "auto".to_string(), |w| w.to_string());
        let activation = match &self.activation_costs.value {
            ActivationCosts::Positional(costs) => format!("{costs:?}"),
            ActivationCosts::Named(named) => named
                .iter()
                .map(|(n, c)| format!("{n}={c}"))
                .collect::<Vec<_>>()
                .join(","),
            ActivationCosts::Free => "0".to_string(),
        };

        let rows = [
            ("Max Carbon", carbon, self.max_carbon.source),
            (
                "Target Clouds",
                self.target_providers.value.to_string(),
                self.target_providers.source,
            ),
            (
                "Mirroring",
                self.redundancy.value.is_mirrored().to_string(),
                self.redundancy.source,
            ),
            (
                "Timeout (s)",
                format!("{}", self.time_budget.value.as_secs_f64()),
                self.time_budget.source,
            ),
            ("Fixed Cost", format!("{}", self.fixed_cost.value), self.fixed_cost.source),
            ("Activation Costs", activation, self.activation_costs.source),
            ("Workers", workers, self.workers.source),
        ];

        let rule = "-".repeat(60);
        let mut out = String::new();
        out.push_str(&rule);
        out.push('\n');
        out.push_str(&format!("{:<25} | {:<15} | {:<15}\n", "PARAMETER", "VALUE", "SOURCE"));
        out.push_str(&rule);
        out.push('\n');
        for (label, value, source) in rows {
            out.push_str(&format!("{label:<25} | {value:<15} | {source:<15}\n"));
        }
        out.push_str(&rule);
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirrored_topology() -> Topology {
        Topology::parse(
            r#"
service_template: { node_templates: {} }
policies:
  - carbon:
      type: cloud_native.policies.Sustainability
      properties: { max_total_carbon_footprint: 90 }
  - spread:
      type: cloud_native.policies.CloudDistribution
      properties: { strategy: mirror, min_providers: 2, allowed_providers: [aws] }
"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_without_inputs() {
        let settings = PlanningSettings::resolve(
            &PlanningOverrides::default(),
            &Topology::default(),
            &StratusConfig::default(),
        );
        assert_eq!(settings.time_budget.value, Duration::from_secs(20));
        assert_eq!(settings.time_budget.source, ValueSource::Default);
        assert_eq!(settings.redundancy.value, RedundancyMode::Distributed);
        assert_eq!(settings.max_carbon.value, None);
        assert_eq!(settings.target_providers.value, 1);
        assert_eq!(settings.activation_costs.value, ActivationCosts::Free);
    }

    #[test]
    fn huge_time_budget_saturates() {
        let cli = PlanningOverrides {
            time_budget_secs: Some(1e30),
            ..Default::default()
        };
        let settings = PlanningSettings::resolve(&cli, &Topology::default(), &StratusConfig::default());
        assert_eq!(settings.time_budget.value, Duration::MAX);
        assert_eq!(settings.time_budget.source, ValueSource::Cli);
    }

    #[test]
    fn template_overrides_config() {
        let config = StratusConfig::parse("[defaults]\nmirroring = false\ntarget_providers = 3\n").unwrap();
        let settings =
            PlanningSettings::resolve(&PlanningOverrides::default(), &mirrored_topology(), &config);
        assert_eq!(settings.redundancy.value, RedundancyMode::Mirrored);
        assert_eq!(settings.redundancy.source, ValueSource::Template);
        assert_eq!(settings.target_providers.value, 2);
        assert_eq!(settings.max_carbon.value, Some(90.0));
        assert_eq!(settings.allowed_providers, vec!["aws".to_string()]);
    }

    #[test]
    fn cli_overrides_template() {
        let cli = PlanningOverrides {
            mirroring: Some(false),
            target_providers: Some(1),
            max_carbon: Some(10.0),
            ..Default::default()
        };
        let settings = PlanningSettings::resolve(&cli, &mirrored_topology(), &StratusConfig::default());
        assert_eq!(settings.redundancy.value, RedundancyMode::Distributed);
        assert_eq!(settings.redundancy.source, ValueSource::Cli);
        assert_eq!(settings.target_providers.value, 1);
        assert_eq!(settings.max_carbon.value, Some(10.0));
    }

    #[test]
    fn config_fills_gaps() {
        let config = StratusConfig::parse(
            "[solver]\ntime_budget_secs = 5.0\nworkers = 2\n[providers.aws]\nactivation_cost = 3.5\n",
        )
        .unwrap();
        let settings =
            PlanningSettings::resolve(&PlanningOverrides::default(), &Topology::default(), &config);
        assert_eq!(settings.time_budget.value, Duration::from_secs(5));
        assert_eq!(settings.time_budget.source, ValueSource::ConfigFile);
        assert_eq!(settings.workers.value, Some(2));
        assert_eq!(
            settings.activation_costs.value,
            ActivationCosts::Named(vec![("aws".to_string(), 3.5)])
        );
    }

    #[test]
    fn summary_lists_sources() {
        let settings = PlanningSettings::resolve(
            &PlanningOverrides::default(),
            &mirrored_topology(),
            &StratusConfig::default(),
        );
        let table = settings.summary_table();
        assert!(table.contains("Mirroring"));
        assert!(table.contains("Template"));
        assert!(table.contains("System default"));
    }
}
