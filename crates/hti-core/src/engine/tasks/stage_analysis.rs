use crate::core::io::lammps_log::ThermoTable;
use crate::core::io::tables::{
    STAGE_TABLE_FILE_NAME, THERMO_DUMP_FILE_NAME, write_stage_table_to_path,
    write_thermo_dump_to_path,
};
use crate::core::io::traits::ObservableSource;
use crate::core::quadrature::{IntegrationResult, QuadratureError, StageResult};
use crate::core::stage::Stage;
use crate::core::statistics::{BlockEstimate, block_average};
use crate::core::thermo::Observable;
use crate::engine::config::StatisticsConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::sequencer::{LambdaTask, StagePlan};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone, Copy)]
pub struct AnalysisOptions {
    pub statistics: StatisticsConfig,
    pub natoms: usize,
    /// Persist `hti.out` and the per-task `data` dumps.
    pub write_artifacts: bool,
}

/// Parsed output of one task together with its coordinates in the stage.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub index: usize,
    pub lambda: f64,
    pub table: ThermoTable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageAnalysis {
    pub stage: Stage,
    pub result: StageResult,
    pub integration: IntegrationResult,
    /// The highest-lambda task of the stage.
    pub final_task: TaskRecord,
}

/// Per-task outcome; only the final task keeps its table.
struct TaskOutcome {
    lambda: f64,
    estimate: BlockEstimate,
    table: Option<ThermoTable>,
}

#[instrument(skip_all, name = "stage_analysis_task", fields(stage = %plan.stage))]
pub fn run(
    plan: &StagePlan,
    source: &impl ObservableSource,
    options: AnalysisOptions,
    reporter: &ProgressReporter,
) -> Result<StageAnalysis, EngineError> {
    let stage = plan.stage;
    let no_tasks = || EngineError::InsufficientPoints {
        stage,
        source: QuadratureError::InsufficientPoints { points: 0 },
    };
    let last = plan.last_task().ok_or_else(no_tasks)?;
    info!(tasks = plan.tasks.len(), "Analyzing stage.");

    #[cfg(not(feature = "parallel"))]
    let iterator = plan.tasks.iter();

    #[cfg(feature = "parallel")]
    let iterator = plan.tasks.par_iter();

    let outcomes = iterator
        .map(|task| -> Result<TaskOutcome, EngineError> {
            let outcome = analyze_task(stage, task, source, &options, task.index == last.index)?;
            reporter.lambda_done(stage, task.index, task.lambda);
            Ok(outcome)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut lambdas = Vec::with_capacity(outcomes.len());
    let mut means = Vec::with_capacity(outcomes.len());
    let mut errors = Vec::with_capacity(outcomes.len());
    let mut final_table = None;
    for outcome in outcomes {
        lambdas.push(outcome.lambda);
        means.push(outcome.estimate.mean);
        errors.push(outcome.estimate.standard_error);
        if outcome.table.is_some() {
            final_table = outcome.table;
        }
    }

    let final_table = final_table.ok_or_else(no_tasks)?;

    let result = StageResult::new(lambdas, means, errors)
        .map_err(|source| integration_error(stage, source))?;
    let integration = result
        .integrate()
        .map_err(|source| integration_error(stage, source))?;

    if options.write_artifacts {
        write_stage_table_to_path(&plan.directory.join(STAGE_TABLE_FILE_NAME), &result)?;
    }

    info!(
        value = integration.value,
        statistical_error = integration.statistical_error,
        systematic_error = integration.systematic_error,
        "Stage integrated."
    );

    Ok(StageAnalysis {
        stage,
        result,
        integration,
        final_task: TaskRecord {
            index: last.index,
            lambda: last.lambda,
            table: final_table,
        },
    })
}

fn integration_error(stage: Stage, source: QuadratureError) -> EngineError {
    match source {
        QuadratureError::InsufficientPoints { .. } => {
            EngineError::InsufficientPoints { stage, source }
        }
        other => EngineError::Integration {
            stage,
            source: other,
        },
    }
}

fn analyze_task(
    stage: Stage,
    task: &LambdaTask,
    source: &impl ObservableSource,
    options: &AnalysisOptions,
    keep_table: bool,
) -> Result<TaskOutcome, EngineError> {
    let unavailable = |source| EngineError::DataUnavailable {
        stage,
        task_index: task.index,
        lambda: task.lambda,
        source,
    };

    let table = source
        .read_observables(&task.directory)
        .map_err(unavailable)?;
    let series = table
        .column(Observable::EnergyDerivative.column())
        .map_err(unavailable)?;

    let stats = options.statistics;
    let estimate = block_average(&series, stats.skip, stats.block_size)
        .map_err(|source| EngineError::InsufficientData {
            stage,
            task_index: task.index,
            lambda: task.lambda,
            source,
        })?
        .per_particle(options.natoms);

    if options.write_artifacts {
        write_thermo_dump_to_path(&task.directory.join(THERMO_DUMP_FILE_NAME), &table)?;
    }

    debug!(
        task = task.index,
        lambda = task.lambda,
        mean = estimate.mean,
        error = estimate.standard_error,
        blocks = estimate.blocks,
        "Task estimated."
    );

    Ok(TaskOutcome {
        lambda: task.lambda,
        estimate,
        table: keep_table.then_some(table),
    })
}
