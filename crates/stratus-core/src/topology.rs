//! Service-topology template parser.
//!
//! Extracts workloads and placement policies from a YAML template shaped
//! like:
//!
//! ```yaml
//! service_template:
//!   node_templates:
//!     checkout:
//!       type: cloud_native.nodes.Service
//!       properties:
//!         containers:
//!           - resources: { cpu_min: 500m, mem_min: 512Mi }
//!         scalability: { default_instances: 3 }
//! policies:
//!   - carbon:
//!       type: cloud_native.policies.Sustainability
//!       properties: { max_total_carbon_footprint: 180.0 }
//!   - spread:
//!       type: cloud_native.policies.CloudDistribution
//!       properties: { strategy: mirror, min_providers: 2, allowed_providers: [aws, gcp] }
//! ```

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::types::{RedundancyMode, Workload};

/// Node types that describe a placeable application.
pub const APPLICATION_NODE_TYPES: &[&str] = &[
    "cloud_native.nodes.Service",
    "cloud_native.nodes.BackingService",
    "cloud_native.nodes.StorageBackingService",
    "cloud_native.nodes.AbstractComponent",
    "cloud_native.nodes.Kubernetes.KubernetesApplication",
    "cloud_native.nodes.Kubernetes.KubernetesDependency",
    "cloud_native.nodes.Kubernetes.KubernetesStorageDependency",
];

const SUSTAINABILITY_POLICY: &str = "cloud_native.policies.Sustainability";
const DISTRIBUTION_POLICY: &str = "cloud_native.policies.CloudDistribution";

const RESOURCE_PATTERN: &str = r"^(\d+\.?\d*)\s*([a-zA-Z]*)";

/// A service extracted from the template, in normalized units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSpec {
    pub name: String,
    /// Summed container CPU in millicores.
    pub cpu_millis: f64,
    /// Summed container memory in MiB.
    pub memory_mib: f64,
    pub instances: u64,
}

impl ServiceSpec {
    /// Round requirements up to whole model units.
    pub fn to_workload(&self, id: usize) -> Workload {
        Workload {
            id,
            name: self.name.clone(),
            vcpu: self.cpu_millis.ceil().max(0.0) as u64,
            memory: self.memory_mib.ceil().max(0.0) as u64,
            instances: self.instances,
        }
    }
}

/// A placement policy declared in the template.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum Policy {
    Sustainability {
        name: String,
        /// gCO2e ceiling; `None` when the template value is not a number.
        max_total_carbon: Option<f64>,
    },
    CloudDistribution {
        name: String,
        strategy: RedundancyMode,
        min_providers: Option<u32>,
        allowed_providers: Vec<String>,
    },
}

/// Parsed template: services plus policies.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Topology {
    pub services: Vec<ServiceSpec>,
    pub policies: Vec<Policy>,
}

// ── Raw YAML shapes ────────────────────────────────────────────────

#[derive(Deserialize)]
struct TemplateDoc {
    service_template: ServiceTemplateDoc,
    #[serde(default)]
    policies: Option<Vec<serde_yaml::Mapping>>,
}

#[derive(Deserialize)]
struct ServiceTemplateDoc {
    #[serde(default)]
    node_templates: serde_yaml::Mapping,
}

#[derive(Deserialize)]
struct NodeDoc {
    #[serde(rename = "type", default)]
    node_type: String,
    #[serde(default)]
    properties: Option<NodePropertiesDoc>,
}

#[derive(Deserialize)]
struct NodePropertiesDoc {
    #[serde(default)]
    containers: Vec<ContainerDoc>,
    #[serde(default)]
    scalability: Option<ScalabilityDoc>,
}

#[derive(Deserialize)]
struct ContainerDoc {
    #[serde(default)]
    resources: Option<ResourcesDoc>,
}

#[derive(Deserialize)]
struct ResourcesDoc {
    #[serde(default)]
    cpu_min: Option<serde_yaml::Value>,
    #[serde(default)]
    mem_min: Option<serde_yaml::Value>,
}

#[derive(Deserialize)]
struct ScalabilityDoc {
    default_instances: Option<u64>,
}

#[derive(Deserialize)]
struct PolicyDoc {
    #[serde(rename = "type")]
    policy_type: Option<String>,
    #[serde(default)]
    properties: serde_yaml::Mapping,
}

// ── Parsing ────────────────────────────────────────────────────────

impl Topology {
    pub fn from_path(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let topology = Self::parse(&content)?;
        info!(
            template = %path.display(),
            services = topology.services.len(),
            policies = topology.policies.len(),
            "topology template parsed"
        );
        Ok(topology)
    }

    pub fn parse(content: &str) -> CoreResult<Self> {
        let doc: TemplateDoc = serde_yaml::from_str(content)?;
        let units = UnitParser::new()?;

        let mut services = Vec::new();
        for (key, value) in doc.service_template.node_templates {
            let name = yaml_to_string(&key)
                .ok_or_else(|| CoreError::Topology("node template name must be a string".into()))?;
            let node: NodeDoc = serde_yaml::from_value(value)?;
            if !APPLICATION_NODE_TYPES.contains(&node.node_type.as_str()) {
                debug!(node = %name, node_type = %node.node_type, "skipping non-application node");
                continue;
            }
            services.push(parse_service(&name, node, &units)?);
        }

        let mut policies = Vec::new();
        for wrapper in doc.policies.unwrap_or_default() {
            for (key, value) in wrapper {
                let name = yaml_to_string(&key).unwrap_or_default();
                let policy: PolicyDoc = serde_yaml::from_value(value)?;
                if let Some(parsed) = parse_policy(&name, policy)? {
                    policies.push(parsed);
                }
            }
        }

        Ok(Self { services, policies })
    }

    /// Workloads in template order.
    pub fn workloads(&self) -> Vec<Workload> {
        self.services
            .iter()
            .enumerate()
            .map(|(id, s)| s.to_workload(id))
            .collect()
    }

    /// Carbon ceiling from the last sustainability policy, if any.
    ///
    /// `Some(None)` means the policy exists but carries no usable number.
    pub fn carbon_limit(&self) -> Option<Option<f64>> {
        self.policies.iter().rev().find_map(|p| match p {
            Policy::Sustainability {
                max_total_carbon, ..
            } => Some(*max_total_carbon),
            _ => None,
        })
    }

    /// The last cloud distribution policy, if any.
    pub fn distribution(&self) -> Option<&Policy> {
        self.policies
            .iter()
            .rev()
            .find(|p| matches!(p, Policy::CloudDistribution { .. }))
    }
}

fn parse_service(name: &str, node: NodeDoc, units: &UnitParser) -> CoreResult<ServiceSpec> {
    let props = node
        .properties
        .ok_or_else(|| CoreError::Topology(format!("service '{name}' has no properties")))?;
    if props.containers.is_empty() {
        return Err(CoreError::Topology(format!("service '{name}' declares no containers")));
    }

    let mut cpu_millis = 0.0;
    let mut memory_mib = 0.0;
    for container in &props.containers {
        if let Some(resources) = &container.resources {
            cpu_millis += resources
                .cpu_min
                .as_ref()
                .and_then(yaml_to_string)
                .map_or(0.0, |v| units.cpu_to_millis(&v));
            memory_mib += resources
                .mem_min
                .as_ref()
                .and_then(yaml_to_string)
                .map_or(0.0, |v| units.memory_to_mib(&v));
        }
    }

    let instances = props
        .scalability
        .and_then(|s| s.default_instances)
        .ok_or_else(|| {
            CoreError::Topology(format!("service '{name}' has no scalability.default_instances"))
        })?;

    debug!(service = %name, cpu_millis, memory_mib, instances, "parsed service");
    Ok(ServiceSpec {
        name: name.to_string(),
        cpu_millis,
        memory_mib,
        instances,
    })
}

fn parse_policy(name: &str, policy: PolicyDoc) -> CoreResult<Option<Policy>> {
    let Some(policy_type) = policy.policy_type else {
        return Ok(None);
    };
    let props = &policy.properties;

    match policy_type.as_str() {
        SUSTAINABILITY_POLICY => {
            let value = props.get("max_total_carbon_footprint");
            let max_total_carbon = value.and_then(serde_yaml::Value::as_f64);
            if max_total_carbon.is_none() {
                warn!(policy = %name, "carbon ceiling is not a literal number, treating as unbounded");
            }
            Ok(Some(Policy::Sustainability {
                name: name.to_string(),
                max_total_carbon,
            }))
        }
        DISTRIBUTION_POLICY => {
            let strategy = match props.get("strategy").and_then(serde_yaml::Value::as_str) {
                Some("mirror") => RedundancyMode::Mirrored,
                Some("distributed") => RedundancyMode::Distributed,
                other => {
                    return Err(CoreError::invalid(format!(
                        "policy '{name}': strategy {other:?} is not one of mirror, distributed"
                    )));
                }
            };
            let min_providers = props
                .get("min_providers")
                .and_then(serde_yaml::Value::as_u64)
                .map(|n| n as u32);
            let allowed_providers = props
                .get("allowed_providers")
                .and_then(serde_yaml::Value::as_sequence)
                .map(|seq| seq.iter().filter_map(yaml_to_string).collect())
                .unwrap_or_default();
            Ok(Some(Policy::CloudDistribution {
                name: name.to_string(),
                strategy,
                min_providers,
                allowed_providers,
            }))
        }
        other => {
            warn!(policy = %name, policy_type = %other, "unknown policy type, ignoring");
            Ok(None)
        }
    }
}

fn yaml_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalizes Kubernetes-style quantities.
struct UnitParser {
    pattern: Regex,
}

impl UnitParser {
    fn new() -> CoreResult<Self> {
        let pattern = Regex::new(RESOURCE_PATTERN).map_err(|e| CoreError::Topology(e.to_string()))?;
        Ok(Self { pattern })
    }

    fn split<'a>(&self, input: &'a str) -> Option<(f64, &'a str)> {
        let caps = self.pattern.captures(input.trim())?;
        let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
        let unit = caps.get(2).map_or("", |m| m.as_str());
        Some((value, unit))
    }

    /// `"250m"` → 250, `"2"` → 2000.
    fn cpu_to_millis(&self, input: &str) -> f64 {
        match self.split(input) {
            Some((value, unit)) if unit.eq_ignore_ascii_case("m") => value,
            Some((value, _)) => value * 1000.0,
            None => 0.0,
        }
    }

    /// `"512Mi"` → 512, `"1Gi"` → 1024, `"2048Ki"` → 2.
    fn memory_to_mib(&self, input: &str) -> f64 {
        match self.split(input) {
            Some((value, "Ki")) => value / 1024.0,
            Some((value, "Gi")) => value * 1024.0,
            Some((value, "Ti")) => value * 1024.0 * 1024.0,
            Some((value, _)) => value,
            None => 0.0,
        }
    }
}
