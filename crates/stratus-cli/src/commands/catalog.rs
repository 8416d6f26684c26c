use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use stratus_core::Catalog;

pub fn show(path: &Path, format: &str) -> anyhow::Result<()> {
    let catalog = Catalog::from_path(path).with_context(|| format!("loading catalog {}", path.display()))?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&catalog)?),
        _ => print!("{}", render(&catalog)),
    }
    Ok(())
}

/// One line per machine type, in model units.
fn render(catalog: &Catalog) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<4} {:<10} {:<24} {:>10} {:>10} {:>10} {:>14}",
        "ID", "PROVIDER", "MODEL", "VCPU (m)", "MEM (MiB)", "COST", "CARBON (e-10)"
    );
    for machine in &catalog.machine_types {
        let provider = catalog
            .providers
            .get(machine.provider)
            .map_or("?", String::as_str);
        let _ = writeln!(
            out,
            "{:<4} {:<10} {:<24} {:>10} {:>10} {:>10} {:>14}",
            machine.id, provider, machine.name, machine.vcpu, machine.memory, machine.unit_cost, machine.carbon
        );
    }
    let _ = writeln!(
        out,
        "{} machine types across {} providers ({})",
        catalog.machine_types.len(),
        catalog.providers.len(),
        catalog.providers.join(", ")
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_scaled_rows() {
        let csv = "Provider,Model,RAM,vCPUs,Price,CarbonFootprint\naws,m5.large,8,2,0.096,0.0021\n";
        let catalog = Catalog::from_reader(csv.as_bytes(), Path::new("inline.csv")).unwrap();
        let text = render(&catalog);
        assert!(text.contains("m5.large"));
        assert!(text.contains("2000"));
        assert!(text.contains("8192"));
        assert!(text.contains("1 machine types across 1 providers (aws)"));
    }
}
