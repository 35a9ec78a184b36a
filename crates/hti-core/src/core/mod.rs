//! # Core Module
//!
//! Stateless building blocks of the thermodynamic-integration pipeline.
//!
//! - **Coupling paths** ([`lambda`]) - Parsing compact range specifications into ordered lambda values
//! - **Alchemical stages** ([`stage`]) - The three-stage protocol and its per-stage potential forms
//! - **Statistics** ([`statistics`]) - Block averaging of autocorrelated time series
//! - **Quadrature** ([`quadrature`]) - Trapezoidal integration with statistical and discretization errors
//! - **Thermodynamics** ([`thermo`], [`free_energy`]) - Derived observables and stage aggregation rules
//! - **Simulation settings** ([`md`]) - Ensemble and integrator parameters shared by all tasks
//! - **File I/O** ([`io`]) - Simulator logs, data files, input decks and persisted tables

pub mod free_energy;
pub mod io;
pub mod lambda;
pub mod md;
pub mod quadrature;
pub mod stage;
pub mod statistics;
pub mod thermo;
