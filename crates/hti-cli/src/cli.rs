use clap::{Args, Parser, Subcommand, ValueEnum};
use hti::core::free_energy::FreeEnergyKind;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "HTI CLI - Free energies of condensed phases from staged Hamiltonian thermodynamic integration.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used to analyze lambda points.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a job directory with one simulator input per stage and lambda point.
    Generate(GenerateArgs),
    /// Compute the free energy of a job whose simulations have finished.
    Compute(ComputeArgs),
    /// Prepare an equilibration run or extract its final configuration.
    #[command(subcommand)]
    Equilibrate(EquilibrateCommand),
}

#[derive(Subcommand, Debug)]
pub enum EquilibrateCommand {
    /// Generate a single-run job that equilibrates a configuration with the model.
    Gen(EquilibrateGenArgs),
    /// Write the last trajectory frame of an equilibration job as a data file.
    Extract(EquilibrateExtractArgs),
}

/// Arguments for `equilibrate gen`.
#[derive(Args, Debug)]
pub struct EquilibrateGenArgs {
    /// Path to the equilibration parameter file in TOML format.
    #[arg(required = true, value_name = "PARAM")]
    pub param: PathBuf,

    /// Temperature in K, overriding the parameter file.
    #[arg(short, long, value_name = "K")]
    pub temperature: Option<f64>,

    /// Pressure in bar, overriding the parameter file. Ignored at constant volume.
    #[arg(short, long, value_name = "BAR", allow_negative_numbers = true)]
    pub pressure: Option<f64>,

    /// Directory the job is generated in. An existing directory is moved aside.
    #[arg(short, long, default_value = "new_job", value_name = "DIR")]
    pub output: PathBuf,

    /// Override the velocity seed from the parameter file.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u32>,

    /// Set a specific configuration value, overriding the parameter file.
    /// Example: -S md.ensemble=npt-aniso
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,
}

/// Arguments for `equilibrate extract`.
#[derive(Args, Debug)]
pub struct EquilibrateExtractArgs {
    /// Path to an equilibration job whose run has finished.
    #[arg(required = true, value_name = "JOB")]
    pub job: PathBuf,

    /// Data file the final configuration is written to.
    #[arg(short, long, default_value = "conf.lmp", value_name = "FILE")]
    pub output: PathBuf,
}

/// Arguments for the `generate` subcommand.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Path to the job parameter file in TOML format.
    #[arg(required = true, value_name = "PARAM")]
    pub param: PathBuf,

    /// Directory the job is generated in. An existing directory is moved aside.
    #[arg(short, long, default_value = "new_job", value_name = "DIR")]
    pub output: PathBuf,

    /// Override the velocity seed from the parameter file.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u32>,

    /// Set a specific configuration value, overriding the parameter file.
    /// Can be used multiple times. Example: -S md.temperature=300
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,
}

/// Arguments for the `compute` subcommand.
#[derive(Args, Debug)]
pub struct ComputeArgs {
    /// Path to a job directory produced by `generate`.
    #[arg(required = true, value_name = "JOB")]
    pub job: PathBuf,

    /// Free energy to report.
    #[arg(short = 't', long = "type", value_enum, default_value_t = FreeEnergyType::Helmholtz)]
    pub kind: FreeEnergyType,

    /// Reference free energy per particle in eV, overriding `[reference] free-energy`.
    #[arg(long, value_name = "EV", allow_negative_numbers = true)]
    pub reference: Option<f64>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeEnergyType {
    Helmholtz,
    Gibbs,
}

impl From<FreeEnergyType> for FreeEnergyKind {
    fn from(t: FreeEnergyType) -> Self {
        match t {
            FreeEnergyType::Helmholtz => FreeEnergyKind::Helmholtz,
            FreeEnergyType::Gibbs => FreeEnergyKind::Gibbs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_accepts_type_and_negative_reference() {
        let cli = Cli::parse_from([
            "hti",
            "-vv",
            "compute",
            "job",
            "-t",
            "gibbs",
            "--reference",
            "-4.25",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Compute(args) => {
                assert_eq!(args.job, PathBuf::from("job"));
                assert_eq!(args.kind, FreeEnergyType::Gibbs);
                assert_eq!(args.reference, Some(-4.25));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn generate_defaults_output_and_collects_set_values() {
        let cli = Cli::parse_from([
            "hti",
            "generate",
            "-S",
            "md.nsteps=1000",
            "param.toml",
            "-S",
            "seed=3",
        ]);
        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.param, PathBuf::from("param.toml"));
                assert_eq!(args.output, PathBuf::from("new_job"));
                assert_eq!(args.set_values, vec!["md.nsteps=1000", "seed=3"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["hti", "-q", "-v", "compute", "job"]).is_err());
    }

    #[test]
    fn equilibrate_gen_takes_conditions() {
        let cli = Cli::parse_from([
            "hti", "equilibrate", "gen", "equi.toml", "-t", "250", "-p", "-100", "-o", "ice",
        ]);
        match cli.command {
            Commands::Equilibrate(EquilibrateCommand::Gen(args)) => {
                assert_eq!(args.param, PathBuf::from("equi.toml"));
                assert_eq!(args.temperature, Some(250.0));
                assert_eq!(args.pressure, Some(-100.0));
                assert_eq!(args.output, PathBuf::from("ice"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn equilibrate_extract_defaults_to_conf_lmp() {
        let cli = Cli::parse_from(["hti", "equilibrate", "extract", "ice"]);
        match cli.command {
            Commands::Equilibrate(EquilibrateCommand::Extract(args)) => {
                assert_eq!(args.job, PathBuf::from("ice"));
                assert_eq!(args.output, PathBuf::from("conf.lmp"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
