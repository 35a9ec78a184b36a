use crate::core::io::format::sci;
use crate::core::io::lammps_input::TaskScript;
use crate::core::io::traits::ScriptGenerator;
use crate::core::stage::Stage;
use crate::engine::config::{ConfigError, HtiConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_FILE_NAME: &str = "in.toml";
pub const CONF_FILE_NAME: &str = "conf.lmp";
pub const MODEL_FILE_NAME: &str = "graph.pb";
pub const LAMBDA_FILE_NAME: &str = "lambda.out";

// Task directories sit two levels below the job root.
const CONF_FROM_TASK: &str = "../../conf.lmp";
const MODEL_FROM_TASK: &str = "../../graph.pb";

const MAX_VELOCITY_SEED: u32 = 1 << 16;

/// One simulation at a fixed coupling strength.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaTask {
    pub index: usize,
    pub lambda: f64,
    pub directory: PathBuf,
}

impl LambdaTask {
    pub fn directory_name(index: usize) -> String {
        format!("task.{:06}", index)
    }
}

/// The ordered tasks of one stage, lambda ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct StagePlan {
    pub stage: Stage,
    pub directory: PathBuf,
    pub tasks: Vec<LambdaTask>,
}

impl StagePlan {
    pub fn lambdas(&self) -> Vec<f64> {
        self.tasks.iter().map(|t| t.lambda).collect()
    }

    /// The fully coupled end point of the stage.
    pub fn last_task(&self) -> Option<&LambdaTask> {
        self.tasks.last()
    }
}

/// Lays out the three-stage protocol of a job directory.
///
/// Planning is pure; only [`StageSequencer::materialize`] touches the filesystem.
pub struct StageSequencer<'a> {
    config: &'a HtiConfig,
    job_dir: &'a Path,
}

impl<'a> StageSequencer<'a> {
    pub fn new(config: &'a HtiConfig, job_dir: &'a Path) -> Self {
        Self { config, job_dir }
    }

    pub fn plan(&self, stage: Stage) -> Result<StagePlan, ConfigError> {
        // every stage carries the soft-core term, so every stage needs all pairs
        self.config.soft_param.validate()?;
        let path = self.config.lambda_path(stage)?;

        let directory = self.job_dir.join(stage.directory_name());
        let tasks = path
            .iter()
            .enumerate()
            .map(|(index, &lambda)| LambdaTask {
                index,
                lambda,
                directory: directory.join(LambdaTask::directory_name(index)),
            })
            .collect();

        Ok(StagePlan {
            stage,
            directory,
            tasks,
        })
    }

    /// Plans all stages in protocol order, failing before any of them is returned.
    pub fn plan_all(&self) -> Result<Vec<StagePlan>, ConfigError> {
        Stage::ALL.iter().map(|&stage| self.plan(stage)).collect()
    }

    /// Creates the stage and task directories of `plan` and writes each task's input.
    ///
    /// Velocity seeds are drawn from `rng` in task order, so a seeded generator
    /// reproduces the same job.
    pub fn materialize(
        &self,
        plan: &StagePlan,
        generator: &impl ScriptGenerator,
        rng: &mut StdRng,
        reporter: &ProgressReporter,
    ) -> Result<(), EngineError> {
        info!(
            stage = %plan.stage,
            tasks = plan.tasks.len(),
            "Materializing stage."
        );
        let form = plan.stage.potential_form();
        debug!(
            includes_model = form.includes_model,
            coupled_term = ?form.coupled_term,
            coupling = ?form.coupling,
            "Stage potential form."
        );

        for task in &plan.tasks {
            fs::create_dir_all(&task.directory)
                .map_err(|e| EngineError::io(&task.directory, e))?;

            let script = TaskScript {
                stage: plan.stage,
                lambda: task.lambda,
                conf_file: CONF_FROM_TASK,
                model_file: MODEL_FROM_TASK,
                masses: &self.config.mass_map,
                copies: self.config.copies,
                soft: &self.config.soft_param,
                md: &self.config.md,
                velocity_seed: draw_velocity_seed(rng),
            };
            let input_path = task.directory.join(generator.file_name());
            fs::write(&input_path, generator.render(&script))
                .map_err(|e| EngineError::io(&input_path, e))?;

            let lambda_path = task.directory.join(LAMBDA_FILE_NAME);
            fs::write(&lambda_path, format!("{}\n", sci(task.lambda, 16)))
                .map_err(|e| EngineError::io(&lambda_path, e))?;
            reporter.lambda_done(plan.stage, task.index, task.lambda);
        }
        Ok(())
    }
}

/// Deterministic random source for velocity seeds.
pub fn seed_rng(seed: u32) -> StdRng {
    StdRng::seed_from_u64(u64::from(seed))
}

pub(crate) fn draw_velocity_seed(rng: &mut StdRng) -> u32 {
    rng.random_range(1..MAX_VELOCITY_SEED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::lammps_input::{INPUT_FILE_NAME, LammpsInput};
    use crate::core::stage::SoftParamError;
    use crate::engine::config::tests::sample_config;
    use tempfile::tempdir;

    #[test]
    fn plan_lists_tasks_in_lambda_order() {
        let config = sample_config();
        let job = Path::new("/jobs/argon");
        let plan = StageSequencer::new(&config, job)
            .plan(Stage::DeepOn)
            .unwrap();

        assert_eq!(plan.stage, Stage::DeepOn);
        assert_eq!(plan.directory, job.join("01.deep_on"));
        assert_eq!(plan.lambdas(), vec![0.0, 0.5, 0.75, 1.0]);
        assert_eq!(
            plan.tasks[2].directory,
            job.join("01.deep_on").join("task.000002")
        );
        assert_eq!(plan.last_task().map(|t| t.index), Some(3));
    }

    #[test]
    fn plan_all_follows_protocol_order() {
        let config = sample_config();
        let plans = StageSequencer::new(&config, Path::new("job"))
            .plan_all()
            .unwrap();
        let stages: Vec<_> = plans.iter().map(|p| p.stage).collect();
        assert_eq!(stages, Stage::ALL.to_vec());
    }

    #[test]
    fn missing_pair_fails_before_any_directory_exists() {
        let dir = tempdir().unwrap();
        let job = dir.path().join("job");
        let mut config = sample_config();
        config.soft_param.element_num = 2;

        let err = StageSequencer::new(&config, &job).plan_all().unwrap_err();
        assert_eq!(
            err,
            ConfigError::SoftParam(SoftParamError::MissingPair {
                key: "sigma_1_2".to_string()
            })
        );
        assert!(!job.exists());
    }

    #[test]
    fn materialize_writes_inputs_and_lambda_files() {
        let dir = tempdir().unwrap();
        let config = sample_config();
        let sequencer = StageSequencer::new(&config, dir.path());
        let plan = sequencer.plan(Stage::SoftOff).unwrap();

        sequencer
            .materialize(
                &plan,
                &LammpsInput,
                &mut seed_rng(7),
                &ProgressReporter::silent(),
            )
            .unwrap();

        for task in &plan.tasks {
            let script = fs::read_to_string(task.directory.join(INPUT_FILE_NAME)).unwrap();
            assert!(script.contains("read_data       ../../conf.lmp"));
            assert!(script.contains("../../graph.pb"));
            let lambda: f64 = fs::read_to_string(task.directory.join(LAMBDA_FILE_NAME))
                .unwrap()
                .trim()
                .parse()
                .unwrap();
            assert_eq!(lambda, task.lambda);
        }
    }

    #[test]
    fn seeded_jobs_are_reproducible() {
        let config = sample_config();
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        for dir in [&a, &b] {
            let sequencer = StageSequencer::new(&config, dir.path());
            let plan = sequencer.plan(Stage::SoftOn).unwrap();
            sequencer
                .materialize(
                    &plan,
                    &LammpsInput,
                    &mut seed_rng(42),
                    &ProgressReporter::silent(),
                )
                .unwrap();
        }
        let script = |root: &Path| {
            fs::read_to_string(
                root.join("00.soft_on")
                    .join("task.000001")
                    .join(INPUT_FILE_NAME),
            )
            .unwrap()
        };
        assert_eq!(script(a.path()), script(b.path()));
    }
}
