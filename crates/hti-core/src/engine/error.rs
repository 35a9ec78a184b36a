use crate::core::io::lammps_data::DataFileError;
use crate::core::io::lammps_dump::DumpError;
use crate::core::io::lammps_log::ThermoLogError;
use crate::core::io::tables::TableWriteError;
use crate::core::quadrature::QuadratureError;
use crate::core::stage::Stage;
use crate::core::statistics::StatsError;
use crate::engine::config::{ConfigError, ConfigLoadError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Cannot load job configuration: {0}")]
    ConfigLoad(#[from] ConfigLoadError),

    #[error(
        "Insufficient data in stage '{stage}', task {task_index} (lambda = {lambda}): {source}"
    )]
    InsufficientData {
        stage: Stage,
        task_index: usize,
        lambda: f64,
        #[source]
        source: StatsError,
    },

    #[error("Cannot integrate stage '{stage}': {source}")]
    InsufficientPoints {
        stage: Stage,
        #[source]
        source: QuadratureError,
    },

    /// Lambda points that cannot form a quadrature path, e.g. a repeated value.
    #[error("Invalid lambda path in stage '{stage}': {source}")]
    Integration {
        stage: Stage,
        #[source]
        source: QuadratureError,
    },

    #[error("Stage '{0}' produced no analysis")]
    MissingStage(Stage),

    #[error("Cannot read trajectory '{path}': {source}", path = path.display())]
    Trajectory {
        path: PathBuf,
        #[source]
        source: DumpError,
    },

    #[error("Data unavailable for stage '{stage}', task {task_index} (lambda = {lambda}): {source}")]
    DataUnavailable {
        stage: Stage,
        task_index: usize,
        lambda: f64,
        #[source]
        source: ThermoLogError,
    },

    #[error("Cannot determine the particle count: {0}")]
    SystemData(#[from] DataFileError),

    #[error("Failed to write output: {0}")]
    Output(#[from] TableWriteError),

    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}
