use crate::core::quadrature::IntegrationResult;
use crate::core::thermo::Estimate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreeEnergyKind {
    #[default]
    Helmholtz,
    Gibbs,
}

impl fmt::Display for FreeEnergyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreeEnergyKind::Helmholtz => f.write_str("helmholtz"),
            FreeEnergyKind::Gibbs => f.write_str("gibbs"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Unknown free energy type '{0}'. Expected 'helmholtz' or 'gibbs'.")]
pub struct UnknownKindError(pub String);

impl FromStr for FreeEnergyKind {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "helmholtz" => Ok(FreeEnergyKind::Helmholtz),
            "gibbs" => Ok(FreeEnergyKind::Gibbs),
            other => Err(UnknownKindError(other.to_string())),
        }
    }
}

/// A free energy per particle with its statistical and systematic errors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FreeEnergyEstimate {
    pub value: f64,
    pub statistical_error: f64,
    pub systematic_error: f64,
}

impl From<IntegrationResult> for FreeEnergyEstimate {
    fn from(r: IntegrationResult) -> Self {
        Self {
            value: r.value,
            statistical_error: r.statistical_error,
            systematic_error: r.systematic_error,
        }
    }
}

/// Adds the stage differences to the reference free energy.
///
/// Statistical errors are independent between stages and add in quadrature. Systematic
/// errors are discretization biases and add linearly.
pub fn combine_stages(reference: f64, stages: &[IntegrationResult]) -> FreeEnergyEstimate {
    let value = reference + stages.iter().map(|s| s.value).sum::<f64>();
    let statistical_error = stages
        .iter()
        .map(|s| s.statistical_error.powi(2))
        .sum::<f64>()
        .sqrt();
    let systematic_error = stages.iter().map(|s| s.systematic_error).sum();
    FreeEnergyEstimate {
        value,
        statistical_error,
        systematic_error,
    }
}

/// `G = F + PV`; the PV error joins the statistical error only.
pub fn gibbs_from_helmholtz(helmholtz: FreeEnergyEstimate, pv: Estimate) -> FreeEnergyEstimate {
    FreeEnergyEstimate {
        value: helmholtz.value + pv.value,
        statistical_error: helmholtz.statistical_error.hypot(pv.error),
        systematic_error: helmholtz.systematic_error,
    }
}
