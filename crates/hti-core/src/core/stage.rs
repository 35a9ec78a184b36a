use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// One leg of the three-stage alchemical path.
///
/// The order is fixed: a soft-core pair potential is switched on first so that the
/// model interaction is never coupled in against overlapping particles, the model is
/// then activated on top of it, and finally the soft-core term is removed again.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SoftOn,
    DeepOn,
    SoftOff,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::SoftOn, Stage::DeepOn, Stage::SoftOff];

    pub fn name(self) -> &'static str {
        match self {
            Stage::SoftOn => "soft_on",
            Stage::DeepOn => "deep_on",
            Stage::SoftOff => "soft_off",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Stage::SoftOn => 0,
            Stage::DeepOn => 1,
            Stage::SoftOff => 2,
        }
    }

    /// Directory holding the stage's tasks inside a job, e.g. `01.deep_on`.
    pub fn directory_name(self) -> String {
        format!("{:02}.{}", self.index(), self.name())
    }

    pub fn potential_form(self) -> PotentialForm {
        match self {
            Stage::SoftOn => PotentialForm {
                includes_model: false,
                coupled_term: CoupledTerm::SoftCore,
                coupling: Coupling::Forward,
            },
            Stage::DeepOn => PotentialForm {
                includes_model: true,
                coupled_term: CoupledTerm::Model,
                coupling: Coupling::Forward,
            },
            Stage::SoftOff => PotentialForm {
                includes_model: true,
                coupled_term: CoupledTerm::SoftCore,
                coupling: Coupling::Reverse,
            },
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Unknown stage '{0}'. Expected one of 'soft_on', 'deep_on', 'soft_off'.")]
pub struct UnknownStageError(pub String);

impl FromStr for Stage {
    type Err = UnknownStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| UnknownStageError(s.to_string()))
    }
}

/// The interaction term whose strength follows the coupling parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoupledTerm {
    SoftCore,
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coupling {
    /// Term scaled by `lambda`.
    Forward,
    /// Term scaled by `1 - lambda`.
    Reverse,
}

/// Potential-energy decomposition used by one stage.
///
/// The soft-core pair term is present in every stage; `includes_model` says whether the
/// model interaction is overlaid on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PotentialForm {
    pub includes_model: bool,
    pub coupled_term: CoupledTerm,
    pub coupling: Coupling,
}

impl PotentialForm {
    /// Strength of the coupled term at `lambda`.
    pub fn scale(&self, lambda: f64) -> f64 {
        match self.coupling {
            Coupling::Forward => lambda,
            Coupling::Reverse => 1.0 - lambda,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SoftParamError {
    #[error("Soft-core parameters need at least one element type (element-num = 0)")]
    NoElements,

    #[error("Missing soft-core pair parameter '{key}'")]
    MissingPair { key: String },

    #[error("Soft-core pair parameter '{key}' must be a positive finite number")]
    InvalidPair { key: String },

    #[error("Unrecognized soft-core parameter '{key}'")]
    UnknownKey { key: String },
}

fn default_element_num() -> usize {
    1
}

/// Parameters of the soft-core Lennard-Jones pair potential, passed through to the
/// input scripts unchanged apart from validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SoftCoreParams {
    pub n: f64,
    pub alpha_lj: f64,
    pub rcut: f64,
    pub epsilon: f64,
    pub activation: f64,
    #[serde(default = "default_element_num")]
    pub element_num: usize,
    /// Pair interaction strengths keyed `sigma_<i>_<j>` with `i <= j`.
    #[serde(flatten)]
    pub sigmas: BTreeMap<String, f64>,
}

impl SoftCoreParams {
    pub fn pair_key(i: usize, j: usize) -> String {
        let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
        format!("sigma_{}_{}", lo, hi)
    }

    /// Unordered type pairs `(i, j)`, `1 <= i <= j <= element_num`.
    pub fn type_pairs(element_num: usize) -> impl Iterator<Item = (usize, usize)> {
        (1..=element_num).flat_map(move |i| (i..=element_num).map(move |j| (i, j)))
    }

    pub fn required_pair_keys(element_num: usize) -> Vec<String> {
        Self::type_pairs(element_num)
            .map(|(i, j)| Self::pair_key(i, j))
            .collect()
    }

    pub fn sigma(&self, i: usize, j: usize) -> Option<f64> {
        self.sigmas.get(&Self::pair_key(i, j)).copied()
    }

    pub fn validate(&self) -> Result<(), SoftParamError> {
        if self.element_num == 0 {
            return Err(SoftParamError::NoElements);
        }

        let required = Self::required_pair_keys(self.element_num);
        for key in &required {
            match self.sigmas.get(key) {
                None => return Err(SoftParamError::MissingPair { key: key.clone() }),
                Some(v) if !v.is_finite() || *v <= 0.0 => {
                    return Err(SoftParamError::InvalidPair { key: key.clone() });
                }
                Some(_) => {}
            }
        }

        if let Some(key) = self.sigmas.keys().find(|k| !is_pair_key(k)) {
            return Err(SoftParamError::UnknownKey { key: key.clone() });
        }
        for key in self.unused_pair_keys() {
            warn!(
                key,
                element_num = self.element_num,
                "Pair parameter ignored: type index above element-num."
            );
        }
        Ok(())
    }

    /// Well-formed pair keys naming a type beyond `element_num`.
    pub fn unused_pair_keys(&self) -> Vec<&str> {
        let required = Self::required_pair_keys(self.element_num);
        self.sigmas
            .keys()
            .filter(|k| is_pair_key(k) && !required.contains(k))
            .map(String::as_str)
            .collect()
    }
}

fn is_pair_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix("sigma_") else {
        return false;
    };
    match rest.split_once('_') {
        Some((i, j)) => i.parse::<usize>().is_ok() && j.parse::<usize>().is_ok(),
        None => false,
    }
}
