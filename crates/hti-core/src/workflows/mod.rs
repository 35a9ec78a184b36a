//! # Workflows Module
//!
//! End-to-end procedures built on the engine.
//!
//! - **Generation** ([`generate`]) - Validates a job configuration and lays out the
//!   three stage directories with one simulator input per lambda point.
//! - **Computation** ([`compute`]) - Reads the simulator output of a finished job,
//!   block-averages and integrates every stage and adds the reference free energy.
//! - **Equilibration** ([`equilibrate`]) - Prepares a plain model run at the target
//!   conditions and extracts its final configuration as the starting point of a job.

pub mod compute;
pub mod equilibrate;
pub mod generate;
mod job_dir;
