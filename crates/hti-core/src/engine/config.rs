use crate::core::lambda::{LambdaParseError, LambdaPath};
use crate::core::md::MdSettings;
use crate::core::stage::{SoftCoreParams, SoftParamError, Stage};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid lambda path for stage '{stage}': {source}")]
    Lambda {
        stage: Stage,
        #[source]
        source: LambdaParseError,
    },

    #[error("Invalid soft-core parameters: {0}")]
    SoftParam(#[from] SoftParamError),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}", path = path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("TOML serialization error for '{path}': {source}", path = path.display())]
    Serialize {
        path: PathBuf,
        source: toml::ser::Error,
    },
}

/// Lambda path specifications of the three stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LambdaSchedule {
    pub soft_on: String,
    pub deep_on: String,
    pub soft_off: String,
}

impl LambdaSchedule {
    pub fn spec(&self, stage: Stage) -> &str {
        match stage {
            Stage::SoftOn => &self.soft_on,
            Stage::DeepOn => &self.deep_on,
            Stage::SoftOff => &self.soft_off,
        }
    }

    pub fn path(&self, stage: Stage) -> Result<LambdaPath, ConfigError> {
        LambdaPath::parse(self.spec(stage)).map_err(|source| ConfigError::Lambda { stage, source })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct StatisticsConfig {
    /// Leading samples discarded as equilibration.
    pub skip: usize,
    pub block_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReferenceConfig {
    /// Reference free energy per particle, eV.
    pub free_energy: f64,
}

/// Fully resolved parameters of one thermodynamic-integration job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct HtiConfig {
    /// Equilibrated starting configuration (LAMMPS data file).
    pub equi_conf: PathBuf,
    pub model: PathBuf,
    /// Atomic masses by type index, g/mol.
    pub mass_map: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copies: Option<[u32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    pub md: MdSettings,
    pub lambda: LambdaSchedule,
    pub statistics: StatisticsConfig,
    pub soft_param: SoftCoreParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceConfig>,
}

fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigLoadError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| ConfigLoadError::Toml {
        path: path.to_path_buf(),
        source: e,
    })
}

fn save_toml<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigLoadError> {
    let content = toml::to_string_pretty(value).map_err(|e| ConfigLoadError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::write(path, content).map_err(|e| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn validate_masses(mass_map: &[f64]) -> Result<(), ConfigError> {
    if mass_map.is_empty() {
        return Err(ConfigError::InvalidValue {
            name: "mass-map",
            reason: "at least one atom type mass is required".to_string(),
        });
    }
    if mass_map.iter().any(|m| !m.is_finite() || *m <= 0.0) {
        return Err(ConfigError::InvalidValue {
            name: "mass-map",
            reason: "masses must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_md(md: &MdSettings) -> Result<(), ConfigError> {
    let positive = [
        ("md.dt", md.dt),
        ("md.temperature", md.temperature),
        ("md.pressure", md.pressure),
        ("md.tau-t", md.tau_t),
        ("md.tau-p", md.tau_p),
    ];
    if let Some(&(name, _)) = positive.iter().find(|(_, v)| !v.is_finite() || *v <= 0.0) {
        return Err(ConfigError::InvalidValue {
            name,
            reason: "must be a positive number".to_string(),
        });
    }
    if md.nsteps == 0 || md.stat_freq == 0 {
        return Err(ConfigError::InvalidValue {
            name: if md.nsteps == 0 { "md.nsteps" } else { "md.stat-freq" },
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

impl HtiConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        load_toml(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigLoadError> {
        save_toml(self, path)
    }

    pub fn lambda_path(&self, stage: Stage) -> Result<LambdaPath, ConfigError> {
        self.lambda.path(stage)
    }

    /// Replication factor applied to the starting configuration.
    pub fn replicas(&self) -> usize {
        self.copies
            .map(|c| c.iter().map(|&n| n as usize).product())
            .unwrap_or(1)
    }

    /// Checks everything that can be checked without touching the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.soft_param.validate()?;
        for stage in Stage::ALL {
            self.lambda_path(stage)?;
        }

        validate_masses(&self.mass_map)?;
        if self.statistics.block_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "statistics.block-size",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(copies) = self.copies {
            if copies.contains(&0) {
                return Err(ConfigError::InvalidValue {
                    name: "copies",
                    reason: "replication counts must be at least 1".to_string(),
                });
            }
        }

        validate_md(&self.md)
    }
}

fn default_dump_freq() -> u64 {
    1000
}

/// Parameters of a plain model-potential run that equilibrates a starting
/// configuration at the target temperature and pressure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct EquilibrationConfig {
    pub equi_conf: PathBuf,
    pub model: PathBuf,
    pub mass_map: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    pub md: MdSettings,
    /// Trajectory output interval in steps.
    #[serde(default = "default_dump_freq")]
    pub dump_freq: u64,
}

impl EquilibrationConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        load_toml(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigLoadError> {
        save_toml(self, path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_masses(&self.mass_map)?;
        if self.dump_freq == 0 {
            return Err(ConfigError::InvalidValue {
                name: "dump-freq",
                reason: "must be at least 1".to_string(),
            });
        }
        validate_md(&self.md)
    }
}

#[derive(Default)]
pub struct HtiConfigBuilder {
    equi_conf: Option<PathBuf>,
    model: Option<PathBuf>,
    mass_map: Option<Vec<f64>>,
    copies: Option<[u32; 3]>,
    seed: Option<u32>,
    md: Option<MdSettings>,
    lambda: Option<LambdaSchedule>,
    statistics: Option<StatisticsConfig>,
    soft_param: Option<SoftCoreParams>,
    reference_free_energy: Option<f64>,
}

impl HtiConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equi_conf(mut self, path: PathBuf) -> Self {
        self.equi_conf = Some(path);
        self
    }
    pub fn model(mut self, path: PathBuf) -> Self {
        self.model = Some(path);
        self
    }
    pub fn mass_map(mut self, masses: Vec<f64>) -> Self {
        self.mass_map = Some(masses);
        self
    }
    pub fn copies(mut self, copies: Option<[u32; 3]>) -> Self {
        self.copies = copies;
        self
    }
    pub fn seed(mut self, seed: Option<u32>) -> Self {
        self.seed = seed;
        self
    }
    pub fn md(mut self, md: MdSettings) -> Self {
        self.md = Some(md);
        self
    }
    pub fn lambda(mut self, schedule: LambdaSchedule) -> Self {
        self.lambda = Some(schedule);
        self
    }
    pub fn statistics(mut self, statistics: StatisticsConfig) -> Self {
        self.statistics = Some(statistics);
        self
    }
    pub fn soft_param(mut self, params: SoftCoreParams) -> Self {
        self.soft_param = Some(params);
        self
    }
    pub fn reference_free_energy(mut self, value: Option<f64>) -> Self {
        self.reference_free_energy = value;
        self
    }

    pub fn build(self) -> Result<HtiConfig, ConfigError> {
        let config = HtiConfig {
            equi_conf: self
                .equi_conf
                .ok_or(ConfigError::MissingParameter("equi-conf"))?,
            model: self.model.ok_or(ConfigError::MissingParameter("model"))?,
            mass_map: self
                .mass_map
                .ok_or(ConfigError::MissingParameter("mass-map"))?,
            copies: self.copies,
            seed: self.seed,
            md: self.md.ok_or(ConfigError::MissingParameter("md"))?,
            lambda: self.lambda.ok_or(ConfigError::MissingParameter("lambda"))?,
            statistics: self
                .statistics
                .ok_or(ConfigError::MissingParameter("statistics"))?,
            soft_param: self
                .soft_param
                .ok_or(ConfigError::MissingParameter("soft-param"))?,
            reference: self
                .reference_free_energy
                .map(|free_energy| ReferenceConfig { free_energy }),
        };
        config.validate()?;
        Ok(config)
    }
}
