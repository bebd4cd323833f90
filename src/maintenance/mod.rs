//! Periodic upkeep of the distributed tier (negative-marker sweeps, stats reports).

pub mod task;
pub mod types;


pub use task::MaintenanceTask;
pub use types::{NamespaceSweep, SweepReport};
