//! Machine catalog loader.
//!
//! Reads a CSV file with the columns `Provider, Model, RAM, vCPUs, Price,
//! CarbonFootprint` and turns every row into a scaled [`MachineType`].
//! Providers are numbered in order of first appearance.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};
use crate::scale;
use crate::types::{CloudProvider, MachineType};

/// One raw catalog row, in input units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogRow {
    #[serde(rename = "Provider")]
    pub provider: String,
    #[serde(rename = "Model")]
    pub model: String,
    /// Memory in GiB.
    #[serde(rename = "RAM")]
    pub ram: f64,
    #[serde(rename = "vCPUs")]
    pub vcpus: f64,
    /// Price per unit in currency units.
    #[serde(rename = "Price")]
    pub price: f64,
    /// gCO2e per provisioned unit.
    #[serde(rename = "CarbonFootprint")]
    pub carbon_footprint: f64,
}

/// A loaded catalog: provider names plus scaled machine types.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Catalog {
    pub source: PathBuf,
    pub providers: Vec<String>,
    pub machine_types: Vec<MachineType>,
    pub rows: Vec<CatalogRow>,
}

impl Catalog {
    /// Load a catalog from a CSV file.
    pub fn from_path(path: &Path) -> CoreResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| CoreError::io(path, e))?;
        Self::from_reader(file, path)
    }

    /// Load a catalog from any CSV reader. `source` is only used in messages.
    pub fn from_reader<R: Read>(reader: R, source: &Path) -> CoreResult<Self> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut rows = Vec::new();
        for (line, record) in csv.deserialize::<CatalogRow>().enumerate() {
            let row = record.map_err(|e| CoreError::Catalog {
                path: source.to_path_buf(),
                reason: format!("row {}: {e}", line + 1),
            })?;
            validate_row(&row).map_err(|reason| CoreError::Catalog {
                path: source.to_path_buf(),
                reason: format!("row {}: {reason}", line + 1),
            })?;
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(CoreError::Catalog {
                path: source.to_path_buf(),
                reason: "catalog has no machine types".into(),
            });
        }

        let catalog = Self::from_rows(rows, source);
        info!(
            source = %source.display(),
            providers = catalog.providers.len(),
            machine_types = catalog.machine_types.len(),
            "machine catalog loaded"
        );
        Ok(catalog)
    }

    fn from_rows(rows: Vec<CatalogRow>, source: &Path) -> Self {
        let mut providers: Vec<String> = Vec::new();
        let mut machine_types = Vec::with_capacity(rows.len());

        for (id, row) in rows.iter().enumerate() {
            let provider = match providers.iter().position(|p| p == &row.provider) {
                Some(idx) => idx,
                None => {
                    providers.push(row.provider.clone());
                    providers.len() - 1
                }
            };
            machine_types.push(MachineType {
                id,
                name: row.model.clone(),
                provider,
                vcpu: scale::vcpus_to_millicores(row.vcpus),
                memory: scale::gib_to_mib(row.ram),
                unit_cost: scale::cost_to_minor(row.price),
                carbon: scale::carbon_to_fixed(row.carbon_footprint),
            });
        }

        Self {
            source: source.to_path_buf(),
            providers,
            machine_types,
            rows,
        }
    }

    /// Keep only rows whose provider is in `allowed` (case-insensitive).
    ///
    /// Providers and machine types are renumbered. An empty allow-list keeps
    /// everything.
    pub fn retain_providers(self, allowed: &[String]) -> CoreResult<Self> {
        if allowed.is_empty() {
            return Ok(self);
        }
        let source = self.source.clone();
        let before = self.rows.len();
        let rows: Vec<CatalogRow> = self
            .rows
            .into_iter()
            .filter(|r| allowed.iter().any(|a| a.eq_ignore_ascii_case(&r.provider)))
            .collect();
        debug!(before, after = rows.len(), ?allowed, "filtered catalog by allowed providers");

        if rows.is_empty() {
            return Err(CoreError::Catalog {
                path: source,
                reason: format!("no machine types left for allowed providers {allowed:?}"),
            });
        }
        Ok(Self::from_rows(rows, &source))
    }

    /// Build provider records, pairing each provider with its activation cost.
    ///
    /// `activation_costs` is indexed by provider position; missing entries
    /// cost nothing.
    pub fn cloud_providers(&self, activation_costs: &[i64]) -> Vec<CloudProvider> {
        self.providers
            .iter()
            .enumerate()
            .map(|(id, name)| CloudProvider {
                id,
                name: name.clone(),
                activation_cost: activation_costs.get(id).copied().unwrap_or(0),
            })
            .collect()
    }
}

fn validate_row(row: &CatalogRow) -> Result<(), String> {
    if row.provider.is_empty() {
        return Err("empty Provider".into());
    }
    if row.model.is_empty() {
        return Err("empty Model".into());
    }
    let numeric = [
        ("RAM", row.ram),
        ("vCPUs", row.vcpus),
        ("Price", row.price),
        ("CarbonFootprint", row.carbon_footprint),
    ];
    for (column, value) in numeric {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{column} must be a non-negative number, got {value}"));
        }
    }
    if row.ram == 0.0 || row.vcpus == 0.0 {
        return Err(format!("machine '{}' has zero capacity", row.model));
    }
    Ok(())
}
