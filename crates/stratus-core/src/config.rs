//! stratus.toml configuration parser.
//!
//! The config file supplies site-wide defaults for planning knobs. Template
//! policies and CLI flags override it (see [`crate::settings`]).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StratusConfig {
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Per-provider settings keyed by provider name.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SolverConfig {
    pub time_budget_secs: Option<f64>,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DefaultsConfig {
    pub mirroring: Option<bool>,
    pub target_providers: Option<u32>,
    /// Currency units.
    pub fixed_cost: Option<f64>,
    /// gCO2e.
    pub max_carbon: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Currency units.
    pub activation_cost: Option<f64>,
}

impl StratusConfig {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let config = Self::parse(&content)?;
        Ok(config)
    }

    pub fn parse(content: &str) -> CoreResult<Self> {
        let config: StratusConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Activation cost configured for `provider` (case-insensitive), in currency units.
    pub fn activation_cost(&self, provider: &str) -> Option<f64> {
        self.providers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(provider))
            .and_then(|(_, p)| p.activation_cost)
    }

    fn validate(&self) -> CoreResult<()> {
        if let Some(secs) = self.solver.time_budget_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(CoreError::Config(format!(
                    "solver.time_budget_secs must be positive, got {secs}"
                )));
            }
        }
        if self.solver.workers == Some(0) {
            return Err(CoreError::Config("solver.workers must be at least 1".into()));
        }
        for (name, provider) in &self.providers {
            if provider.activation_cost.is_some_and(|c| c < 0.0) {
                return Err(CoreError::Config(format!(
                    "providers.{name}.activation_cost must not be negative"
                )));
            }
        }
        Ok(())
    }
}
