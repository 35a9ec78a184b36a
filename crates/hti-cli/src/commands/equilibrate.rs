use crate::cli::{EquilibrateCommand, EquilibrateExtractArgs, EquilibrateGenArgs};
use crate::config::PartialEquilibrationConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use hti::engine::progress::ProgressReporter;
use hti::workflows::equilibrate::{self, Conditions};
use std::path::Path;
use tracing::info;

pub fn run(command: EquilibrateCommand) -> Result<()> {
    match command {
        EquilibrateCommand::Gen(args) => generate(args),
        EquilibrateCommand::Extract(args) => extract(args),
    }
}

fn generate(args: EquilibrateGenArgs) -> Result<()> {
    let partial_config = PartialEquilibrationConfig::from_file(&args.param)?;
    info!("Merging equilibration parameters from file and CLI arguments...");
    let base_dir = args.param.parent().unwrap_or(Path::new("."));
    let config = partial_config.merge_with_cli(&args, base_dir)?;
    let conditions = Conditions {
        temperature: args.temperature,
        pressure: args.pressure,
    };

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_sink(progress_handler.sink());

    println!("Generating equilibration job in {}...", args.output.display());
    let job = equilibrate::generate(&config, &args.output, conditions, &reporter)?;

    if let Some(backup) = &job.backup {
        println!(
            "Existing directory {} was moved to {}",
            job.job_dir.display(),
            backup.display()
        );
    }
    let md = &job.config.md;
    match md.ensemble.barostat() {
        Some(_) => println!(
            "  {} at T = {} K, P = {} bar, {} steps",
            md.ensemble, md.temperature, md.pressure, md.nsteps
        ),
        None => println!(
            "  {} at T = {} K, {} steps",
            md.ensemble, md.temperature, md.nsteps
        ),
    }
    if let Some(seed) = job.config.seed {
        println!("Velocity seed: {}", seed);
    }
    Ok(())
}

fn extract(args: EquilibrateExtractArgs) -> Result<()> {
    info!("Extracting final configuration of job {:?}", &args.job);
    let frame = equilibrate::extract(&args.job, &args.output)?;
    println!(
        "Wrote {} atoms from timestep {} to {}",
        frame.atoms.len(),
        frame.timestep,
        args.output.display()
    );
    Ok(())
}
