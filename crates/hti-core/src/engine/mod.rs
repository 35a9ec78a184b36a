//! # Engine Module
//!
//! Configuration, error taxonomy and the procedures that connect the stateless
//! [`crate::core`] building blocks to a job directory on disk.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Typed job parameters, TOML persistence and validation
//! - **Error Handling** ([`error`]) - Configuration, insufficient-data and data-availability failures with stage context
//! - **Progress Monitoring** ([`progress`]) - Stage and lambda-point events for a caller-supplied sink
//! - **Sequencing** ([`sequencer`]) - Per-stage task plans and their materialization as task directories
//! - **Tasks** ([`tasks`]) - Per-stage analysis of simulator output

pub mod config;
pub mod error;
pub mod progress;
pub mod sequencer;
pub(crate) mod tasks;
