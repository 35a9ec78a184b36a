use crate::core::io::traits::ScriptGenerator;
use crate::engine::config::HtiConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::sequencer::{
    CONF_FILE_NAME, CONFIG_FILE_NAME, MODEL_FILE_NAME, StagePlan, StageSequencer, seed_rng,
};
use crate::workflows::job_dir::{back_up_existing, copy_into, require_files};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct GeneratedJob {
    pub job_dir: PathBuf,
    /// Where a previous directory of the same name was moved to.
    pub backup: Option<PathBuf>,
    /// Velocity seed the job was generated with.
    pub seed: u32,
    pub stages: Vec<StagePlan>,
}

/// Builds a job directory ready for the simulator.
///
/// All checks that do not need the filesystem run first, then the input files are
/// checked; nothing is created or moved until every check passed. The stored
/// `in.toml` refers to the copied configuration and model and records the seed, so
/// regenerating from it reproduces the job.
#[instrument(skip_all, name = "generate_workflow")]
pub fn run(
    config: &HtiConfig,
    output_dir: &Path,
    generator: &impl ScriptGenerator,
    reporter: &ProgressReporter,
) -> Result<GeneratedJob, EngineError> {
    // === Phase 0: Validation ===
    reporter.step("Validation");
    config.validate()?;
    let sequencer = StageSequencer::new(config, output_dir);
    let plans = sequencer.plan_all()?;
    require_files([&config.equi_conf, &config.model])?;
    reporter.finished();

    // === Phase 1: Job layout ===
    reporter.step("Job Layout");
    let backup = back_up_existing(output_dir)?;
    fs::create_dir_all(output_dir).map_err(|e| EngineError::io(output_dir, e))?;
    copy_into(&config.equi_conf, &output_dir.join(CONF_FILE_NAME))?;
    copy_into(&config.model, &output_dir.join(MODEL_FILE_NAME))?;

    let seed = config.seed.unwrap_or_else(rand::random);
    let stored = HtiConfig {
        equi_conf: PathBuf::from(CONF_FILE_NAME),
        model: PathBuf::from(MODEL_FILE_NAME),
        seed: Some(seed),
        ..config.clone()
    };
    stored.save(&output_dir.join(CONFIG_FILE_NAME))?;
    reporter.finished();

    // === Phase 2: Stage tasks ===
    let mut rng = seed_rng(seed);
    for plan in &plans {
        reporter.stage(plan.stage, plan.tasks.len());
        sequencer.materialize(plan, generator, &mut rng, reporter)?;
        reporter.finished();
    }

    info!(
        job = %output_dir.display(),
        seed,
        tasks = plans.iter().map(|p| p.tasks.len()).sum::<usize>(),
        "Job generated."
    );
    Ok(GeneratedJob {
        job_dir: output_dir.to_path_buf(),
        backup,
        seed,
        stages: plans,
    })
}
