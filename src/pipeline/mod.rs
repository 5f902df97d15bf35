// =====================================================
// ORACLE → SQL SERVER LOAD PIPELINE
// =====================================================

pub mod coerce;
pub mod controller;
pub mod driver;
pub mod notify;
pub mod queries;
pub mod reconcile;
pub mod schema;
pub mod systems;
pub mod writer;

#[cfg(test)]
pub mod testing;

pub use controller::{ControllerSettings, PipelineController, RunReport, RunState};
pub use systems::{DestinationSystem, RunFlagStore, SourceSystem};
