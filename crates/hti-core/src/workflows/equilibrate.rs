use crate::core::io::lammps_data::write_data_to_path;
use crate::core::io::lammps_dump::{DumpFrame, read_last_frame_from_path};
use crate::core::io::lammps_input::{
    DUMP_FILE_NAME, EquilibrationScript, INPUT_FILE_NAME, LammpsInput,
};
use crate::engine::config::EquilibrationConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::sequencer::{
    CONF_FILE_NAME, CONFIG_FILE_NAME, MODEL_FILE_NAME, draw_velocity_seed, seed_rng,
};
use crate::workflows::job_dir::{back_up_existing, copy_into, require_files};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Target conditions that take precedence over the parameter file.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Conditions {
    /// K
    pub temperature: Option<f64>,
    /// bar; only meaningful for ensembles with a barostat.
    pub pressure: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct EquilibrationJob {
    pub job_dir: PathBuf,
    pub backup: Option<PathBuf>,
    /// The parameters as stored in the job directory.
    pub config: EquilibrationConfig,
}

/// Returns `config` with the given conditions written into its MD settings.
///
/// A pressure is dropped with a warning when the ensemble keeps the volume fixed.
pub fn apply_conditions(config: &EquilibrationConfig, conditions: Conditions) -> EquilibrationConfig {
    let mut config = config.clone();
    if let Some(temperature) = conditions.temperature {
        info!(
            file = config.md.temperature,
            temperature, "Temperature overrides the parameter file."
        );
        config.md.temperature = temperature;
    }
    if let Some(pressure) = conditions.pressure {
        if config.md.ensemble.barostat().is_some() {
            info!(
                file = config.md.pressure,
                pressure, "Pressure overrides the parameter file."
            );
            config.md.pressure = pressure;
        } else {
            warn!(
                ensemble = %config.md.ensemble,
                pressure,
                "Pressure ignored: the ensemble keeps the volume fixed."
            );
        }
    }
    config
}

/// Lays out a single-run job that equilibrates `equi-conf` with the bare model.
///
/// The stored `in.toml` carries the applied conditions and the velocity seed, so it
/// describes the run exactly and regenerates it.
#[instrument(skip_all, name = "equilibration_generate_workflow")]
pub fn generate(
    config: &EquilibrationConfig,
    output_dir: &Path,
    conditions: Conditions,
    reporter: &ProgressReporter,
) -> Result<EquilibrationJob, EngineError> {
    // === Phase 0: Validation ===
    reporter.step("Validation");
    let config = apply_conditions(config, conditions);
    config.validate()?;
    require_files([&config.equi_conf, &config.model])?;
    reporter.finished();

    // === Phase 1: Job layout ===
    reporter.step("Job Layout");
    let backup = back_up_existing(output_dir)?;
    fs::create_dir_all(output_dir).map_err(|e| EngineError::io(output_dir, e))?;
    copy_into(&config.equi_conf, &output_dir.join(CONF_FILE_NAME))?;
    copy_into(&config.model, &output_dir.join(MODEL_FILE_NAME))?;

    let seed = config.seed.unwrap_or_else(rand::random);
    let stored = EquilibrationConfig {
        equi_conf: PathBuf::from(CONF_FILE_NAME),
        model: PathBuf::from(MODEL_FILE_NAME),
        seed: Some(seed),
        ..config
    };
    stored.save(&output_dir.join(CONFIG_FILE_NAME))?;

    let script = LammpsInput.render_equilibration(&EquilibrationScript {
        conf_file: CONF_FILE_NAME,
        model_file: MODEL_FILE_NAME,
        masses: &stored.mass_map,
        md: &stored.md,
        dump_freq: stored.dump_freq,
        velocity_seed: draw_velocity_seed(&mut seed_rng(seed)),
    });
    let input_path = output_dir.join(INPUT_FILE_NAME);
    fs::write(&input_path, script).map_err(|e| EngineError::io(&input_path, e))?;
    reporter.finished();

    info!(
        job = %output_dir.display(),
        ensemble = %stored.md.ensemble,
        temperature = stored.md.temperature,
        seed,
        "Equilibration job generated."
    );
    Ok(EquilibrationJob {
        job_dir: output_dir.to_path_buf(),
        backup,
        config: stored,
    })
}

/// Writes the last trajectory frame of a finished equilibration job to `output` as a
/// data file, ready to serve as the starting configuration of an integration job.
#[instrument(skip_all, name = "equilibration_extract_workflow")]
pub fn extract(job_dir: &Path, output: &Path) -> Result<DumpFrame, EngineError> {
    let config = EquilibrationConfig::load(&job_dir.join(CONFIG_FILE_NAME))?;
    let dump = job_dir.join(DUMP_FILE_NAME);
    let frame = read_last_frame_from_path(&dump)
        .map_err(|source| EngineError::Trajectory { path: dump, source })?;
    write_data_to_path(output, &frame, config.mass_map.len())?;
    info!(
        timestep = frame.timestep,
        atoms = frame.atoms.len(),
        output = %output.display(),
        "Final configuration extracted."
    );
    Ok(frame)
}
