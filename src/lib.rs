//! `gas-demand` library crate.
//!
//! The binary (`gasdemand`) is a thin wrapper around this library so that:
//!
//! - estimation and surplus logic is testable without spawning processes
//! - the pipeline can be driven from other tools with in-memory tables
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod estimate;
pub mod io;
pub mod math;
pub mod report;
pub mod surplus;
pub mod taxsim;
