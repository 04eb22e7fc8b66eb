pub mod schema;
pub mod simulation;

pub use schema::write_schemas;
pub use simulation::{CommanderReport, SimulationConfig, SimulationReport, run_simulation};
