//! stratus-core: inputs of a placement run.
//!
//! Domain types, fixed-point scaling, the machine catalog loader, the
//! service-topology parser, planning settings resolution and the inbound
//! wire format. Everything here produces or validates a
//! [`PlacementRequest`]; the optimization itself lives in
//! `stratus-placement`.

pub mod assemble;
pub mod catalog;
pub mod config;
pub mod error;
pub mod scale;
pub mod settings;
pub mod topology;
pub mod types;
pub mod wire;

pub use assemble::assemble_request;
pub use catalog::Catalog;
pub use config::StratusConfig;
pub use error::{CoreError, CoreResult};
pub use settings::{PlanningOverrides, PlanningSettings, ValueSource};
pub use topology::Topology;
pub use types::*;
pub use wire::OptimizationRequest;
