//! Fixed-point conversions between decimal inputs and model integers.
//!
//! The optimization model works on integers only. Decimal inputs are scaled
//! once, when a request is assembled, and scaled back only when a report is
//! produced. These factors are part of the public request/response contract:
//!
//! | Quantity | Input unit | Model unit | Factor |
//! |---|---|---|---|
//! | cost | currency | minor units (cents) | ×100, rounded up |
//! | carbon | gCO2e | fixed point | ×10¹⁰, truncated |
//! | vCPU | cores | millicores | ×1000 |
//! | memory | GiB | MiB | ×1024 |

/// Cost scale: one currency unit is 100 minor units.
pub const COST_SCALE: i64 = 100;

/// Carbon scale: footprints carry ten decimal places.
pub const CARBON_SCALE: i64 = 10_000_000_000;

/// Millicores per vCPU.
pub const MILLICORES_PER_VCPU: u64 = 1000;

/// MiB per GiB.
pub const MIB_PER_GIB: u64 = 1024;

/// Relative distance under which a scaled value snaps to the nearest integer.
/// Absorbs binary representation noise such as `0.1 * 100 = 10.000000000000002`.
const SNAP_TOLERANCE: f64 = 1e-12;

fn snap(scaled: f64) -> Option<f64> {
    let nearest = scaled.round();
    let tolerance = SNAP_TOLERANCE * scaled.abs().max(1.0);
    ((scaled - nearest).abs() <= tolerance).then_some(nearest)
}

/// Convert a decimal cost to minor units, rounding up partial cents.
pub fn cost_to_minor(value: f64) -> i64 {
    let scaled = value * COST_SCALE as f64;
    snap(scaled).unwrap_or_else(|| scaled.ceil()) as i64
}

/// Convert minor units back to a decimal cost.
pub fn minor_to_cost(minor: i64) -> f64 {
    minor as f64 / COST_SCALE as f64
}

/// Convert a decimal carbon footprint to fixed point, truncating extra digits.
pub fn carbon_to_fixed(value: f64) -> i64 {
    let scaled = value * CARBON_SCALE as f64;
    snap(scaled).unwrap_or_else(|| scaled.trunc()) as i64
}

/// Convert a fixed-point carbon footprint back to a decimal.
pub fn fixed_to_carbon(fixed: i64) -> f64 {
    fixed as f64 / CARBON_SCALE as f64
}

/// Convert whole or fractional vCPUs to millicores, rounding up.
pub fn vcpus_to_millicores(vcpus: f64) -> u64 {
    let scaled = vcpus * MILLICORES_PER_VCPU as f64;
    snap(scaled).unwrap_or_else(|| scaled.ceil()).max(0.0) as u64
}

/// Convert GiB to MiB, rounding up.
pub fn gib_to_mib(gib: f64) -> u64 {
    let scaled = gib * MIB_PER_GIB as f64;
    snap(scaled).unwrap_or_else(|| scaled.ceil()).max(0.0) as u64
}
