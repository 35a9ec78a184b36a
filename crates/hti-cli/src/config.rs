use crate::cli::{EquilibrateGenArgs, GenerateArgs};
use crate::error::{CliError, Result};
use hti::core::md::{Ensemble, MdSettings};
use hti::core::stage::SoftCoreParams;
use hti::engine::config as core_config;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

const DEFAULT_PRESSURE_BAR: f64 = 1.0;
const DEFAULT_TAU_T_PS: f64 = 0.1;
const DEFAULT_TAU_P_PS: f64 = 0.5;
const DEFAULT_ELEMENT_NUM: usize = 1;
const DEFAULT_DUMP_FREQ: u64 = 1000;

/// A lambda path written either as one string or as a list of range strings.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
enum PartialLambdaSpec {
    Single(String),
    Ranges(Vec<String>),
}

impl PartialLambdaSpec {
    fn into_spec(self) -> String {
        match self {
            PartialLambdaSpec::Single(s) => s,
            PartialLambdaSpec::Ranges(ranges) => ranges.join(", "),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialMdConfig {
    nsteps: Option<u64>,
    dt: Option<f64>,
    stat_freq: Option<u64>,
    temperature: Option<f64>,
    pressure: Option<f64>,
    tau_t: Option<f64>,
    tau_p: Option<f64>,
    ensemble: Option<String>,
}

impl PartialMdConfig {
    /// Sets the `[md]` entry `param`; `false` when no such entry exists.
    fn set(&mut self, key: &str, param: &str, value: &str) -> Result<bool> {
        match param {
            "nsteps" => self.nsteps = Some(parse_value(key, value)?),
            "dt" => self.dt = Some(parse_value(key, value)?),
            "stat-freq" => self.stat_freq = Some(parse_value(key, value)?),
            "temperature" => self.temperature = Some(parse_value(key, value)?),
            "pressure" => self.pressure = Some(parse_value(key, value)?),
            "tau-t" => self.tau_t = Some(parse_value(key, value)?),
            "tau-p" => self.tau_p = Some(parse_value(key, value)?),
            "ensemble" => self.ensemble = Some(value.trim().to_string()),
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn merge(self) -> Result<MdSettings> {
        let ensemble = match self.ensemble {
            Some(name) => Ensemble::from_str(&name).map_err(|e| CliError::Config(e.to_string()))?,
            None => Ensemble::default(),
        };
        Ok(MdSettings {
            nsteps: required(self.nsteps, "md.nsteps")?,
            dt: required(self.dt, "md.dt")?,
            stat_freq: required(self.stat_freq, "md.stat-freq")?,
            temperature: required(self.temperature, "md.temperature")?,
            pressure: self.pressure.unwrap_or(DEFAULT_PRESSURE_BAR),
            tau_t: self.tau_t.unwrap_or(DEFAULT_TAU_T_PS),
            tau_p: self.tau_p.unwrap_or(DEFAULT_TAU_P_PS),
            ensemble,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialLambdaConfig {
    soft_on: Option<PartialLambdaSpec>,
    deep_on: Option<PartialLambdaSpec>,
    soft_off: Option<PartialLambdaSpec>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialStatisticsConfig {
    skip: Option<usize>,
    block_size: Option<usize>,
}

// `sigma_i_j` keys are open-ended, so unknown keys are caught by the core validation.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
struct PartialSoftParamConfig {
    n: Option<f64>,
    alpha_lj: Option<f64>,
    rcut: Option<f64>,
    epsilon: Option<f64>,
    activation: Option<f64>,
    element_num: Option<usize>,
    #[serde(flatten)]
    sigmas: BTreeMap<String, f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialReferenceConfig {
    free_energy: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialHtiConfig {
    equi_conf: Option<PathBuf>,
    model: Option<PathBuf>,
    mass_map: Option<Vec<f64>>,
    copies: Option<[u32; 3]>,
    seed: Option<u32>,
    md: Option<PartialMdConfig>,
    lambda: Option<PartialLambdaConfig>,
    statistics: Option<PartialStatisticsConfig>,
    soft_param: Option<PartialSoftParamConfig>,
    reference: Option<PartialReferenceConfig>,
}

/// Parameter file of an equilibration run.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialEquilibrationConfig {
    equi_conf: Option<PathBuf>,
    model: Option<PathBuf>,
    mass_map: Option<Vec<f64>>,
    seed: Option<u32>,
    md: Option<PartialMdConfig>,
    dump_freq: Option<u64>,
}

fn read_partial<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Loading parameters from file: {:?}", path);
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

fn unsupported_key(key: &str) -> CliError {
    CliError::Config(format!(
        "Unsupported configuration key for --set: '{}'",
        key
    ))
}

fn split_set_value(kv_pair: &str) -> Result<(&str, &str)> {
    kv_pair
        .split_once('=')
        .map(|(key, value)| (key.trim(), value))
        .ok_or_else(|| {
            CliError::Argument(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            ))
        })
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| {
        CliError::Config(format!(
            "A value for '{}' is required in the parameter file or via --set.",
            key
        ))
    })
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CliError::Config(format!("Invalid value for {}: '{}'", key, value))
    })
}

/// Relative input paths in a parameter file are relative to that file.
fn resolve_path(path: PathBuf, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

impl PartialHtiConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        read_partial(path)
    }

    /// Applies `--set` overrides and dedicated flags and builds the core configuration.
    ///
    /// `base_dir` anchors relative `equi-conf` and `model` paths.
    pub fn merge_with_cli(
        mut self,
        args: &GenerateArgs,
        base_dir: &Path,
    ) -> Result<core_config::HtiConfig> {
        self.apply_set_values(&args.set_values)?;

        let md = self.md.take().unwrap_or_default().merge()?;
        let lambda = Self::merge_lambda(self.lambda.take().unwrap_or_default())?;
        let statistics = self.statistics.take().unwrap_or_default();
        let soft_param = Self::merge_soft_param(self.soft_param.take().unwrap_or_default())?;

        let equi_conf = resolve_path(required(self.equi_conf, "equi-conf")?, base_dir);
        let model = resolve_path(required(self.model, "model")?, base_dir);

        core_config::HtiConfigBuilder::new()
            .equi_conf(equi_conf)
            .model(model)
            .mass_map(required(self.mass_map, "mass-map")?)
            .copies(self.copies)
            .seed(args.seed.or(self.seed))
            .md(md)
            .lambda(lambda)
            .statistics(core_config::StatisticsConfig {
                skip: statistics.skip.unwrap_or(0),
                block_size: required(statistics.block_size, "statistics.block-size")?,
            })
            .soft_param(soft_param)
            .reference_free_energy(self.reference.and_then(|r| r.free_energy))
            .build()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_lambda(partial: PartialLambdaConfig) -> Result<core_config::LambdaSchedule> {
        Ok(core_config::LambdaSchedule {
            soft_on: required(partial.soft_on, "lambda.soft-on")?.into_spec(),
            deep_on: required(partial.deep_on, "lambda.deep-on")?.into_spec(),
            soft_off: required(partial.soft_off, "lambda.soft-off")?.into_spec(),
        })
    }

    fn merge_soft_param(partial: PartialSoftParamConfig) -> Result<SoftCoreParams> {
        Ok(SoftCoreParams {
            n: required(partial.n, "soft-param.n")?,
            alpha_lj: required(partial.alpha_lj, "soft-param.alpha-lj")?,
            rcut: required(partial.rcut, "soft-param.rcut")?,
            epsilon: required(partial.epsilon, "soft-param.epsilon")?,
            activation: required(partial.activation, "soft-param.activation")?,
            element_num: partial.element_num.unwrap_or(DEFAULT_ELEMENT_NUM),
            sigmas: partial.sigmas,
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) = split_set_value(kv_pair)?;

            match key {
                "equi-conf" => self.equi_conf = Some(PathBuf::from(value)),
                "model" => self.model = Some(PathBuf::from(value)),
                "seed" => self.seed = Some(parse_value(key, value)?),
                "lambda.soft-on" => {
                    self.lambda().soft_on = Some(PartialLambdaSpec::Single(value.to_string()))
                }
                "lambda.deep-on" => {
                    self.lambda().deep_on = Some(PartialLambdaSpec::Single(value.to_string()))
                }
                "lambda.soft-off" => {
                    self.lambda().soft_off = Some(PartialLambdaSpec::Single(value.to_string()))
                }
                "statistics.skip" => self.statistics().skip = Some(parse_value(key, value)?),
                "statistics.block-size" => {
                    self.statistics().block_size = Some(parse_value(key, value)?)
                }
                "reference.free-energy" => {
                    self.reference
                        .get_or_insert_with(Default::default)
                        .free_energy = Some(parse_value(key, value)?)
                }
                _ => {
                    if let Some(param) = key.strip_prefix("soft-param.") {
                        self.set_soft_param(key, param, value)?;
                    } else if let Some(param) = key.strip_prefix("md.") {
                        let md = self.md.get_or_insert_with(Default::default);
                        if !md.set(key, param, value)? {
                            return Err(unsupported_key(key));
                        }
                    } else {
                        return Err(unsupported_key(key));
                    }
                }
            }
        }
        Ok(())
    }

    fn set_soft_param(&mut self, key: &str, param: &str, value: &str) -> Result<()> {
        let soft = self.soft_param.get_or_insert_with(Default::default);
        match param {
            "n" => soft.n = Some(parse_value(key, value)?),
            "alpha-lj" => soft.alpha_lj = Some(parse_value(key, value)?),
            "rcut" => soft.rcut = Some(parse_value(key, value)?),
            "epsilon" => soft.epsilon = Some(parse_value(key, value)?),
            "activation" => soft.activation = Some(parse_value(key, value)?),
            "element-num" => soft.element_num = Some(parse_value(key, value)?),
            pair if pair.starts_with("sigma_") => {
                soft.sigmas.insert(pair.to_string(), parse_value(key, value)?);
            }
            _ => return Err(unsupported_key(key)),
        }
        Ok(())
    }

    fn lambda(&mut self) -> &mut PartialLambdaConfig {
        self.lambda.get_or_insert_with(Default::default)
    }

    fn statistics(&mut self) -> &mut PartialStatisticsConfig {
        self.statistics.get_or_insert_with(Default::default)
    }
}

impl PartialEquilibrationConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        read_partial(path)
    }

    /// Applies `--set` overrides and `--seed`; `-t`/`-p` are applied by the workflow so
    /// they are reported against the file values.
    pub fn merge_with_cli(
        mut self,
        args: &EquilibrateGenArgs,
        base_dir: &Path,
    ) -> Result<core_config::EquilibrationConfig> {
        self.apply_set_values(&args.set_values)?;
        // `-t` alone is enough when the file leaves the temperature out
        if let Some(temperature) = args.temperature {
            self.md
                .get_or_insert_with(Default::default)
                .temperature
                .get_or_insert(temperature);
        }

        let config = core_config::EquilibrationConfig {
            equi_conf: resolve_path(required(self.equi_conf, "equi-conf")?, base_dir),
            model: resolve_path(required(self.model, "model")?, base_dir),
            mass_map: required(self.mass_map, "mass-map")?,
            seed: args.seed.or(self.seed),
            md: self.md.unwrap_or_default().merge()?,
            dump_freq: self.dump_freq.unwrap_or(DEFAULT_DUMP_FREQ),
        };
        config
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(config)
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) = split_set_value(kv_pair)?;
            match key {
                "equi-conf" => self.equi_conf = Some(PathBuf::from(value)),
                "model" => self.model = Some(PathBuf::from(value)),
                "seed" => self.seed = Some(parse_value(key, value)?),
                "dump-freq" => self.dump_freq = Some(parse_value(key, value)?),
                _ => {
                    let known = match key.strip_prefix("md.") {
                        Some(param) => self
                            .md
                            .get_or_insert_with(Default::default)
                            .set(key, param, value)?,
                        None => false,
                    };
                    if !known {
                        return Err(unsupported_key(key));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands, EquilibrateCommand};
    use clap::Parser;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    const PARAM: &str = r#"
equi-conf = "conf.lmp"
model = "graph.pb"
mass-map = [1.008, 15.999]
copies = [2, 2, 2]
seed = 17

[md]
nsteps = 100000
dt = 0.0005
stat-freq = 10
temperature = 300.0
ensemble = "npt"

[lambda]
soft-on = "0:11:1"
deep-on = ["0.00:5:0.10", "0.10:10:1.00"]
soft-off = "0:11:1"

[statistics]
skip = 100
block-size = 50

[soft-param]
n = 1.0
alpha-lj = 0.5
rcut = 6.0
epsilon = 0.02
activation = 0.5
element-num = 2
sigma_1_1 = 2.0
sigma_1_2 = 2.5
sigma_2_2 = 3.0
"#;

    fn write_param(content: &str) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("param.toml");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn generate_args(param: &Path, extra: &[&str]) -> GenerateArgs {
        let mut argv = vec!["hti", "generate", param.to_str().unwrap()];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Generate(args) => args,
            other => panic!("Expected 'generate' subcommand, got {other:?}"),
        }
    }

    #[test]
    fn file_values_are_merged_with_defaults() {
        let (dir, path) = write_param(PARAM);
        let args = generate_args(&path, &[]);

        let config = PartialHtiConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args, dir.path())
            .unwrap();

        assert_eq!(config.equi_conf, dir.path().join("conf.lmp"));
        assert_eq!(config.model, dir.path().join("graph.pb"));
        assert_eq!(config.replicas(), 8);
        assert_eq!(config.seed, Some(17));
        assert_eq!(config.md.ensemble, Ensemble::NptIso);
        assert_eq!(config.md.pressure, 1.0);
        assert_eq!(config.md.tau_p, 0.5);
        assert_eq!(config.lambda.deep_on, "0.00:5:0.10, 0.10:10:1.00");
        assert_eq!(config.statistics.skip, 100);
        assert_eq!(config.soft_param.sigma(2, 1), Some(2.5));
        assert!(config.reference.is_none());
    }

    #[test]
    fn set_values_and_flags_override_the_file() {
        let (dir, path) = write_param(PARAM);
        let args = generate_args(
            &path,
            &[
                "-S",
                "md.temperature=350",
                "-S",
                "lambda.soft-off=0:3:1",
                "-S",
                "soft-param.sigma_2_2=3.5",
                "-S",
                "reference.free-energy=-4.5",
                "--seed",
                "99",
            ],
        );

        let config = PartialHtiConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args, dir.path())
            .unwrap();

        assert_eq!(config.md.temperature, 350.0);
        assert_eq!(config.lambda.soft_off, "0:3:1");
        assert_eq!(config.soft_param.sigma(2, 2), Some(3.5));
        assert_eq!(config.reference.map(|r| r.free_energy), Some(-4.5));
        assert_eq!(config.seed, Some(99));
    }

    #[test]
    fn missing_pair_key_is_a_configuration_error() {
        let (dir, path) = write_param(&PARAM.replace("sigma_1_2 = 2.5\n", ""));
        let args = generate_args(&path, &[]);

        let result = PartialHtiConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args, dir.path());
        match result {
            Err(CliError::Config(msg)) => assert!(msg.contains("sigma_1_2")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unknown_ensemble_is_a_configuration_error() {
        let (dir, path) = write_param(PARAM);
        let args = generate_args(&path, &["-S", "md.ensemble=npt-xy"]);

        let result = PartialHtiConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args, dir.path());
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("npt-xy")));
    }

    #[test]
    fn malformed_and_unsupported_set_values_are_rejected() {
        let mut partial = PartialHtiConfig::default();
        assert!(matches!(
            partial.apply_set_values(&["md.dt".to_string()]),
            Err(CliError::Argument(_))
        ));
        assert!(matches!(
            partial.apply_set_values(&["md.thermostat=nose".to_string()]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            partial.apply_set_values(&["md.nsteps=many".to_string()]),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn unknown_top_level_key_fails_to_parse() {
        let (_dir, path) = write_param(&format!("mass_map = [1.0]\n{}", PARAM));
        assert!(matches!(
            PartialHtiConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }

    const EQUI_PARAM: &str = r#"
equi-conf = "ice.lmp"
model = "graph.pb"
mass-map = [15.999, 1.008]

[md]
nsteps = 200000
dt = 0.0005
stat-freq = 100
temperature = 200.0
pressure = 1.0
ensemble = "npt-tri"
"#;

    fn equilibrate_gen_args(param: &Path, extra: &[&str]) -> EquilibrateGenArgs {
        let mut argv = vec!["hti", "equilibrate", "gen", param.to_str().unwrap()];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Equilibrate(EquilibrateCommand::Gen(args)) => args,
            other => panic!("Expected 'equilibrate gen' subcommand, got {other:?}"),
        }
    }

    #[test]
    fn equilibration_file_merges_set_values_and_seed() {
        let (dir, path) = write_param(EQUI_PARAM);
        let args = equilibrate_gen_args(
            &path,
            &["-S", "md.tau-p=1.0", "-S", "dump-freq=250", "--seed", "5"],
        );

        let config = PartialEquilibrationConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args, dir.path())
            .unwrap();

        assert_eq!(config.equi_conf, dir.path().join("ice.lmp"));
        assert_eq!(config.md.ensemble, Ensemble::NptTri);
        assert_eq!(config.md.tau_p, 1.0);
        assert_eq!(config.md.tau_t, 0.1);
        assert_eq!(config.dump_freq, 250);
        assert_eq!(config.seed, Some(5));
    }

    #[test]
    fn temperature_flag_fills_a_missing_file_value() {
        let (dir, path) = write_param(&EQUI_PARAM.replace("temperature = 200.0\n", ""));
        let args = equilibrate_gen_args(&path, &["-t", "180"]);

        let config = PartialEquilibrationConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args, dir.path())
            .unwrap();
        assert_eq!(config.md.temperature, 180.0);
    }

    #[test]
    fn equilibration_rejects_integration_only_keys() {
        let mut partial = PartialEquilibrationConfig::default();
        assert!(matches!(
            partial.apply_set_values(&["lambda.soft-on=0:3:1".to_string()]),
            Err(CliError::Config(msg)) if msg.contains("lambda.soft-on")
        ));

        let (_dir, path) = write_param(&format!("{}\n[statistics]\nskip = 1\n", EQUI_PARAM));
        assert!(matches!(
            PartialEquilibrationConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }
}
