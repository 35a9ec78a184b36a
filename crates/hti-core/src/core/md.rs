use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Thermodynamic ensemble of a simulation.
///
/// The anisotropic and triclinic barostats relax the cell shape and are meant for
/// equilibration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ensemble {
    #[default]
    #[serde(rename = "nvt")]
    Nvt,
    #[serde(rename = "npt", alias = "npt-iso")]
    NptIso,
    #[serde(rename = "npt-aniso")]
    NptAniso,
    #[serde(rename = "npt-tri")]
    NptTri,
    #[serde(rename = "nve")]
    Nve,
}

impl Ensemble {
    pub fn name(self) -> &'static str {
        match self {
            Ensemble::Nvt => "nvt",
            Ensemble::NptIso => "npt",
            Ensemble::NptAniso => "npt-aniso",
            Ensemble::NptTri => "npt-tri",
            Ensemble::Nve => "nve",
        }
    }

    /// Pressure-coupling keyword of the barostat, `None` at constant volume.
    pub fn barostat(self) -> Option<&'static str> {
        match self {
            Ensemble::NptIso => Some("iso"),
            Ensemble::NptAniso => Some("aniso"),
            Ensemble::NptTri => Some("tri"),
            Ensemble::Nvt | Ensemble::Nve => None,
        }
    }
}

impl fmt::Display for Ensemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error(
    "Unknown ensemble '{0}'. Expected one of 'nvt', 'npt', 'npt-iso', 'npt-aniso', 'npt-tri', 'nve'."
)]
pub struct UnknownEnsembleError(pub String);

impl FromStr for Ensemble {
    type Err = UnknownEnsembleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nvt" => Ok(Ensemble::Nvt),
            "npt" | "npt-iso" => Ok(Ensemble::NptIso),
            "npt-aniso" => Ok(Ensemble::NptAniso),
            "npt-tri" => Ok(Ensemble::NptTri),
            "nve" => Ok(Ensemble::Nve),
            other => Err(UnknownEnsembleError(other.to_string())),
        }
    }
}

fn default_pressure() -> f64 {
    1.0
}

fn default_tau_t() -> f64 {
    0.1
}

fn default_tau_p() -> f64 {
    0.5
}

/// Molecular-dynamics settings shared by every task of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MdSettings {
    pub nsteps: u64,
    /// Time step in ps.
    pub dt: f64,
    /// Thermo output interval in steps.
    pub stat_freq: u64,
    /// K
    pub temperature: f64,
    /// bar
    #[serde(default = "default_pressure")]
    pub pressure: f64,
    #[serde(default = "default_tau_t")]
    pub tau_t: f64,
    #[serde(default = "default_tau_p")]
    pub tau_p: f64,
    #[serde(default)]
    pub ensemble: Ensemble,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensemble_accepts_known_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            ensemble: Ensemble,
        }
        let parse = |s: &str| toml::from_str::<Wrapper>(&format!("ensemble = \"{s}\""));
        assert_eq!(parse("nvt").unwrap().ensemble, Ensemble::Nvt);
        assert_eq!(parse("npt").unwrap().ensemble, Ensemble::NptIso);
        assert_eq!(parse("npt-iso").unwrap().ensemble, Ensemble::NptIso);
        assert_eq!(parse("npt-aniso").unwrap().ensemble, Ensemble::NptAniso);
        assert_eq!(parse("npt-tri").unwrap().ensemble, Ensemble::NptTri);
        assert_eq!(parse("nve").unwrap().ensemble, Ensemble::Nve);
        assert!(parse("npt-xy").is_err());
    }

    #[test]
    fn ensemble_names_parse_like_the_config_file() {
        assert_eq!("npt-iso".parse::<Ensemble>(), Ok(Ensemble::NptIso));
        assert_eq!(Ensemble::NptIso.to_string(), "npt");
        for ensemble in [Ensemble::NptAniso, Ensemble::NptTri] {
            assert_eq!(ensemble.name().parse::<Ensemble>(), Ok(ensemble));
        }
        assert_eq!(
            "langevin".parse::<Ensemble>(),
            Err(UnknownEnsembleError("langevin".to_string()))
        );
    }

    #[test]
    fn only_npt_ensembles_have_a_barostat() {
        assert_eq!(Ensemble::NptIso.barostat(), Some("iso"));
        assert_eq!(Ensemble::NptAniso.barostat(), Some("aniso"));
        assert_eq!(Ensemble::NptTri.barostat(), Some("tri"));
        assert_eq!(Ensemble::Nvt.barostat(), None);
        assert_eq!(Ensemble::Nve.barostat(), None);
    }

    #[test]
    fn md_settings_fill_in_coupling_defaults() {
        let md: MdSettings = toml::from_str(
            r#"
            nsteps = 200000
            dt = 0.0005
            stat-freq = 10
            temperature = 300.0
            "#,
        )
        .unwrap();
        assert_eq!(md.pressure, 1.0);
        assert_eq!(md.tau_t, 0.1);
        assert_eq!(md.tau_p, 0.5);
        assert_eq!(md.ensemble, Ensemble::Nvt);
    }
}
