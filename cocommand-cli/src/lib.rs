pub mod application;
pub mod infrastructure;

pub use application::{SimulationConfig, SimulationReport, run_simulation, write_schemas};
pub use infrastructure::{CliError, LogConfig, Result};
