//! Port traits for the external collaborators of the simulation.

pub mod config_port;
pub mod data_port;
pub mod execution_port;
pub mod report_port;
