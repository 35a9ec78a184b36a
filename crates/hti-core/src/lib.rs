//! # HTI Core Library
//!
//! Free energies of condensed phases from staged Hamiltonian thermodynamic integration.
//!
//! A decoupled reference system is brought to the fully interacting model in three
//! stages: a soft-core pair potential is switched on, the model interaction is activated
//! on top of it, and the soft-core term is removed again. For every stage a series of
//! simulations at increasing coupling strength produces `dU/dlambda` time series which
//! are block averaged, integrated over lambda and summed with the reference free energy.
//!
//! ## Architecture
//!
//! - **[`core`]: The Foundation.** Lambda paths, the stage model, block averaging,
//!   quadrature, thermodynamic bookkeeping and file formats. Everything here is stateless.
//!
//! - **[`engine`]: The Logic Core.** Configuration, error taxonomy, progress reporting,
//!   the stage sequencer that lays out simulation tasks, and the per-stage analysis task.
//!
//! - **[`workflows`]: The Public API.** `generate` builds a job directory ready for the
//!   simulator; `compute` turns a finished job into a free energy with error bars;
//!   `equilibrate` prepares the starting configuration.

pub mod core;
pub mod engine;
pub mod workflows;
