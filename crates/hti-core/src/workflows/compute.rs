use crate::core::free_energy::{
    FreeEnergyEstimate, FreeEnergyKind, combine_stages, gibbs_from_helmholtz,
};
use crate::core::io::lammps_data::read_atom_count_from_path;
use crate::core::io::traits::{ObservableSource, ReferenceFreeEnergy};
use crate::core::quadrature::{IntegrationResult, StageResult};
use crate::core::stage::Stage;
use crate::core::thermo::ThermoSummary;
use crate::engine::config::{ConfigError, HtiConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::sequencer::{CONFIG_FILE_NAME, StageSequencer};
use crate::engine::tasks::stage_analysis::StageAnalysis;
use crate::engine::tasks::{end_state, stage_analysis};
use std::path::Path;
use tracing::{info, instrument};

/// Reference free energy taken from the job configuration or given explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConfiguredReference {
    value: Option<f64>,
}

impl ConfiguredReference {
    pub fn new(value: Option<f64>) -> Self {
        Self { value }
    }

    /// `override_value` wins over `[reference] free-energy`.
    pub fn from_config(config: &HtiConfig, override_value: Option<f64>) -> Self {
        Self {
            value: override_value.or(config.reference.map(|r| r.free_energy)),
        }
    }
}

impl ReferenceFreeEnergy for ConfiguredReference {
    fn free_energy(&self, _natoms: usize) -> Option<f64> {
        self.value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    pub result: StageResult,
    pub integration: IntegrationResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreeEnergyResult {
    pub natoms: usize,
    /// Reference free energy per particle the stages were added to.
    pub reference: f64,
    pub stages: Vec<StageReport>,
    pub helmholtz: FreeEnergyEstimate,
    /// Thermodynamic state of the final soft_off task.
    pub thermo: ThermoSummary,
}

impl FreeEnergyResult {
    pub fn gibbs(&self) -> FreeEnergyEstimate {
        gibbs_from_helmholtz(self.helmholtz, self.thermo.pv)
    }

    pub fn free_energy(&self, kind: FreeEnergyKind) -> FreeEnergyEstimate {
        match kind {
            FreeEnergyKind::Helmholtz => self.helmholtz,
            FreeEnergyKind::Gibbs => self.gibbs(),
        }
    }
}

/// Computes the free energy of a finished job directory.
///
/// Reads the stored `in.toml`, counts particles in the copied configuration and writes
/// `hti.out` per stage and `data` per task next to the simulator output.
#[instrument(skip_all, name = "compute_workflow")]
pub fn run(
    job_dir: &Path,
    source: &impl ObservableSource,
    reference_override: Option<f64>,
    reporter: &ProgressReporter,
) -> Result<FreeEnergyResult, EngineError> {
    reporter.step("Preparation");
    let config = HtiConfig::load(&job_dir.join(CONFIG_FILE_NAME))?;
    config.validate()?;
    let natoms = read_atom_count_from_path(&job_dir.join(&config.equi_conf))? * config.replicas();
    info!(natoms, replicas = config.replicas(), "Particle count determined.");
    let reference = ConfiguredReference::from_config(&config, reference_override);
    reporter.finished();

    aggregate(&config, job_dir, natoms, source, &reference, true, reporter)
}

/// Integrates every stage of `job_dir` and adds the reference free energy.
///
/// Stages are analyzed in protocol order; the first failing task aborts the
/// computation.
#[instrument(skip_all, name = "aggregate_workflow")]
pub fn aggregate(
    config: &HtiConfig,
    job_dir: &Path,
    natoms: usize,
    source: &impl ObservableSource,
    reference: &impl ReferenceFreeEnergy,
    write_artifacts: bool,
    reporter: &ProgressReporter,
) -> Result<FreeEnergyResult, EngineError> {
    let reference = reference
        .free_energy(natoms)
        .ok_or(ConfigError::MissingParameter("reference.free-energy"))?;
    let plans = StageSequencer::new(config, job_dir).plan_all()?;
    let options = stage_analysis::AnalysisOptions {
        statistics: config.statistics,
        natoms,
        write_artifacts,
    };

    let mut analyses = Vec::with_capacity(plans.len());
    for plan in &plans {
        reporter.stage(plan.stage, plan.tasks.len());
        let analysis = stage_analysis::run(plan, source, options, reporter)?;
        reporter.finished();
        analyses.push(analysis);
    }

    reporter.step("End State");
    let thermo = end_state_of(&analyses, config, natoms)?;
    reporter.finished();

    let integrations: Vec<IntegrationResult> = analyses.iter().map(|a| a.integration).collect();
    let helmholtz = combine_stages(reference, &integrations);
    info!(
        value = helmholtz.value,
        statistical_error = helmholtz.statistical_error,
        systematic_error = helmholtz.systematic_error,
        "Helmholtz free energy computed."
    );

    let stages = analyses
        .into_iter()
        .map(|a| StageReport {
            stage: a.stage,
            result: a.result,
            integration: a.integration,
        })
        .collect();

    Ok(FreeEnergyResult {
        natoms,
        reference,
        stages,
        helmholtz,
        thermo,
    })
}

/// Thermodynamic summary of the fully coupled end of the soft_off stage.
fn end_state_of(
    analyses: &[StageAnalysis],
    config: &HtiConfig,
    natoms: usize,
) -> Result<ThermoSummary, EngineError> {
    let soft_off = analyses
        .iter()
        .find(|a| a.stage == Stage::SoftOff)
        .ok_or(EngineError::MissingStage(Stage::SoftOff))?;
    end_state::run(Stage::SoftOff, &soft_off.final_task, config.statistics, natoms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::lammps_input::LammpsInput;
    use crate::core::io::lammps_log::{LOG_FILE_NAME, LammpsLogSource, ThermoLogError, ThermoTable};
    use crate::core::io::tables::{STAGE_TABLE_FILE_NAME, THERMO_DUMP_FILE_NAME};
    use crate::core::thermo::BAR_ANGSTROM3_TO_EV;
    use crate::engine::config::tests::sample_config;
    use crate::workflows::generate;
    use std::fs;
    use tempfile::tempdir;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    /// Constant `dU/dlambda` per stage with a fixed thermodynamic state.
    struct ConstantSource;

    impl ConstantSource {
        fn derivative(task_dir: &Path) -> f64 {
            let stage_dir = task_dir
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            match stage_dir {
                "00.soft_on" => 10.0,
                "01.deep_on" => 20.0,
                "02.soft_off" => -5.0,
                _ => f64::NAN,
            }
        }
    }

    impl ObservableSource for ConstantSource {
        fn read_observables(&self, task_dir: &Path) -> Result<ThermoTable, ThermoLogError> {
            let du = [Self::derivative(task_dir); 6];
            Ok(ThermoTable::from_columns(
                9,
                &[
                    (3, &[-2.0; 6][..]),
                    (4, &[-1.5; 6][..]),
                    (5, &[300.0; 6][..]),
                    (6, &[2000.0; 6][..]),
                    (7, &[50.0; 6][..]),
                    (8, &du[..]),
                ],
            ))
        }
    }

    #[test]
    fn stages_and_reference_add_up() {
        let config = sample_config();
        let reference = ConfiguredReference::new(Some(100.0));
        let result = aggregate(
            &config,
            Path::new("job"),
            1,
            &ConstantSource,
            &reference,
            false,
            &ProgressReporter::silent(),
        )
        .unwrap();

        assert_eq!(result.stages.len(), 3);
        assert!(f64_approx_equal(result.stages[0].integration.value, 10.0));
        assert!(f64_approx_equal(result.stages[1].integration.value, 20.0));
        assert!(f64_approx_equal(result.stages[2].integration.value, -5.0));
        assert!(f64_approx_equal(result.helmholtz.value, 125.0));
        assert!(f64_approx_equal(result.helmholtz.statistical_error, 0.0));
        assert!(f64_approx_equal(result.helmholtz.systematic_error, 0.0));

        let pv = 2000.0 * 50.0 * BAR_ANGSTROM3_TO_EV;
        assert!(f64_approx_equal(result.thermo.pv.value, pv));
        let gibbs = result.free_energy(FreeEnergyKind::Gibbs);
        assert!(f64_approx_equal(gibbs.value, 125.0 + pv));
        assert_eq!(
            result.free_energy(FreeEnergyKind::Helmholtz),
            result.helmholtz
        );
    }

    #[test]
    fn missing_reference_is_a_configuration_error() {
        let err = aggregate(
            &sample_config(),
            Path::new("job"),
            1,
            &ConstantSource,
            &ConfiguredReference::default(),
            false,
            &ProgressReporter::silent(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Configuration(ConfigError::MissingParameter("reference.free-energy"))
        ));
    }

    #[test]
    fn override_wins_over_configured_reference() {
        let mut config = sample_config();
        config.reference = Some(crate::engine::config::ReferenceConfig { free_energy: -1.0 });
        assert_eq!(
            ConfiguredReference::from_config(&config, Some(2.0)).free_energy(1),
            Some(2.0)
        );
        assert_eq!(
            ConfiguredReference::from_config(&config, None).free_energy(1),
            Some(-1.0)
        );
    }

    fn write_log(task_dir: &Path, derivative: f64) {
        let mut log = String::from(
            "LAMMPS (29 Sep 2021)\nStep KinEng PotEng TotEng Enthalpy Temp Press Volume c_e_diff[1]\n",
        );
        for step in 0..8 {
            log.push_str(&format!(
                "{} 1.0 -9.0 -8.0 -7.5 150.0 1.0 400.0 {}\n",
                step * 10,
                derivative
            ));
        }
        log.push_str("Loop time of 1.0 on 1 procs for 70 steps with 4 atoms\n");
        fs::write(task_dir.join(LOG_FILE_NAME), log).unwrap();
    }

    #[test]
    fn computes_generated_job_from_simulator_logs() {
        let dir = tempdir().unwrap();
        let conf = dir.path().join("equi.lmp");
        let model = dir.path().join("frozen.pb");
        fs::write(&conf, "argon\n\n4 atoms\n1 atom types\n").unwrap();
        fs::write(&model, b"model").unwrap();
        let mut config = sample_config();
        config.equi_conf = conf;
        config.model = model;
        config.reference = Some(crate::engine::config::ReferenceConfig { free_energy: -3.0 });
        config.statistics.skip = 2;
        config.statistics.block_size = 2;

        let job = dir.path().join("job");
        let generated =
            generate::run(&config, &job, &LammpsInput, &ProgressReporter::silent()).unwrap();
        for plan in &generated.stages {
            for task in &plan.tasks {
                // extensive derivative; 4 atoms
                write_log(&task.directory, 4.0 * (plan.stage.index() as f64 + 1.0));
            }
        }

        let result = run(&job, &LammpsLogSource, None, &ProgressReporter::silent()).unwrap();

        assert_eq!(result.natoms, 4);
        assert!(f64_approx_equal(result.helmholtz.value, -3.0 + 1.0 + 2.0 + 3.0));
        assert!(f64_approx_equal(result.thermo.energy.value, -2.0));
        assert!(f64_approx_equal(result.thermo.temperature.value, 150.0));
        for plan in &generated.stages {
            assert!(plan.directory.join(STAGE_TABLE_FILE_NAME).is_file());
            for task in &plan.tasks {
                assert!(task.directory.join(THERMO_DUMP_FILE_NAME).is_file());
            }
        }
    }

    #[test]
    fn absent_log_fails_the_owning_stage() {
        let dir = tempdir().unwrap();
        let conf = dir.path().join("equi.lmp");
        let model = dir.path().join("frozen.pb");
        fs::write(&conf, "argon\n\n4 atoms\n").unwrap();
        fs::write(&model, b"model").unwrap();
        let mut config = sample_config();
        config.equi_conf = conf;
        config.model = model;

        let job = dir.path().join("job");
        generate::run(&config, &job, &LammpsInput, &ProgressReporter::silent()).unwrap();

        let err = run(&job, &LammpsLogSource, Some(0.0), &ProgressReporter::silent()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DataUnavailable {
                stage: Stage::SoftOn,
                ..
            }
        ));
    }

    #[test]
    fn end_state_requires_the_soft_off_stage() {
        let err = end_state_of(&[], &sample_config(), 1).unwrap_err();
        assert!(matches!(err, EngineError::MissingStage(Stage::SoftOff)));
    }

    #[test]
    fn crashed_simulation_fails_its_stage() {
        let dir = tempdir().unwrap();
        let conf = dir.path().join("equi.lmp");
        let model = dir.path().join("frozen.pb");
        fs::write(&conf, "argon\n\n4 atoms\n").unwrap();
        fs::write(&model, b"model").unwrap();
        let mut config = sample_config();
        config.equi_conf = conf;
        config.model = model;

        let job = dir.path().join("job");
        let generated =
            generate::run(&config, &job, &LammpsInput, &ProgressReporter::silent()).unwrap();
        for plan in &generated.stages {
            for task in &plan.tasks {
                write_log(&task.directory, 1.0);
            }
        }
        let crashed = &generated.stages[1].tasks[2];
        fs::write(
            crashed.directory.join(LOG_FILE_NAME),
            "Step KinEng PotEng TotEng Enthalpy Temp Press Volume c_e_diff[1]\n\
             0 1.0 -9.0 -8.0 -7.5 150.0 1.0 400.0 1.0\n\
             10 1.0 -9.0 -8.0 -7.5 150.0 1.0 400.0 1.0\n\
             ERROR: Lost atoms: original 4 current 3\n\
             Last command: run ${NSTEPS}\n",
        )
        .unwrap();

        let err = run(&job, &LammpsLogSource, Some(0.0), &ProgressReporter::silent()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DataUnavailable {
                stage: Stage::DeepOn,
                task_index: 2,
                source: ThermoLogError::TruncatedRun { line: 4, .. },
                ..
            }
        ));
    }
}
