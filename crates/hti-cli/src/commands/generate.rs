use crate::cli::GenerateArgs;
use crate::config::PartialHtiConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use hti::core::io::lammps_input::LammpsInput;
use hti::engine::progress::ProgressReporter;
use hti::workflows;
use std::path::Path;
use tracing::info;

pub fn run(args: GenerateArgs) -> Result<()> {
    let partial_config = PartialHtiConfig::from_file(&args.param)?;
    info!("Merging parameters from file and CLI arguments...");
    let base_dir = args.param.parent().unwrap_or(Path::new("."));
    let final_config = partial_config.merge_with_cli(&args, base_dir)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_sink(progress_handler.sink());

    println!("Generating job in {}...", args.output.display());
    let job = workflows::generate::run(&final_config, &args.output, &LammpsInput, &reporter)?;

    if let Some(backup) = &job.backup {
        println!(
            "Existing directory {} was moved to {}",
            job.job_dir.display(),
            backup.display()
        );
    }
    for plan in &job.stages {
        println!(
            "  {:<10} {:>4} lambda point(s)  {}",
            plan.stage.name(),
            plan.tasks.len(),
            plan.directory.display()
        );
    }
    println!("Velocity seed: {}", job.seed);
    Ok(())
}
