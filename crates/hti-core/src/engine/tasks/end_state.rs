use crate::core::stage::Stage;
use crate::core::statistics::{BlockEstimate, block_average};
use crate::core::thermo::{Observable, RawThermo, ThermoSummary};
use crate::engine::config::StatisticsConfig;
use crate::engine::error::EngineError;
use crate::engine::tasks::stage_analysis::TaskRecord;
use tracing::{info, instrument};

/// Block-averages the thermo columns of the fully coupled end point.
#[instrument(skip_all, name = "end_state_task", fields(stage = %stage))]
pub fn run(
    stage: Stage,
    record: &TaskRecord,
    statistics: StatisticsConfig,
    natoms: usize,
) -> Result<ThermoSummary, EngineError> {
    let estimate = |observable: Observable| -> Result<BlockEstimate, EngineError> {
        let series = record
            .table
            .column(observable.column())
            .map_err(|source| EngineError::DataUnavailable {
                stage,
                task_index: record.index,
                lambda: record.lambda,
                source,
            })?;
        block_average(&series, statistics.skip, statistics.block_size).map_err(|source| {
            EngineError::InsufficientData {
                stage,
                task_index: record.index,
                lambda: record.lambda,
                source,
            }
        })
    };

    let raw = RawThermo {
        energy: estimate(Observable::Energy)?,
        enthalpy: estimate(Observable::Enthalpy)?,
        temperature: estimate(Observable::Temperature)?,
        pressure: estimate(Observable::Pressure)?,
        volume: estimate(Observable::Volume)?,
    };
    let summary = ThermoSummary::from_raw(&raw, natoms);
    info!(
        task = record.index,
        temperature = summary.temperature.value,
        pv = summary.pv.value,
        "End state summarized."
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::lammps_log::ThermoTable;
    use crate::core::thermo::BAR_ANGSTROM3_TO_EV;

    const TOLERANCE: f64 = 1e-12;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn record(table: ThermoTable) -> TaskRecord {
        TaskRecord {
            index: 4,
            lambda: 1.0,
            table,
        }
    }

    const STATS: StatisticsConfig = StatisticsConfig {
        skip: 1,
        block_size: 2,
    };

    #[test]
    fn columns_are_normalized_per_particle() {
        let energy = [0.0, -400.0, -400.0, -400.0, -400.0];
        let enthalpy = [0.0, -390.0, -390.0, -390.0, -390.0];
        let temperature = [0.0, 300.0, 300.0, 300.0, 300.0];
        let pressure = [0.0, 1000.0, 1000.0, 1000.0, 1000.0];
        let volume = [0.0, 8000.0, 8000.0, 8000.0, 8000.0];
        let table = ThermoTable::from_columns(
            9,
            &[
                (3, &energy[..]),
                (4, &enthalpy[..]),
                (5, &temperature[..]),
                (6, &pressure[..]),
                (7, &volume[..]),
            ],
        );

        let summary = run(Stage::SoftOff, &record(table), STATS, 100).unwrap();
        assert!(f64_approx_equal(summary.energy.value, -4.0));
        assert!(f64_approx_equal(summary.enthalpy.value, -3.9));
        assert!(f64_approx_equal(summary.temperature.value, 300.0));
        assert!(f64_approx_equal(summary.pressure.value, 1000.0));
        assert!(f64_approx_equal(summary.volume.value, 80.0));
        assert!(f64_approx_equal(
            summary.pv.value,
            1000.0 * 8000.0 * BAR_ANGSTROM3_TO_EV / 100.0
        ));
        assert_eq!(summary.pv.error, 0.0);
    }

    #[test]
    fn narrow_table_is_data_unavailable() {
        let table = ThermoTable::from_columns(5, &[(3, &[1.0, 2.0, 3.0, 4.0, 5.0][..])]);
        let err = run(Stage::SoftOff, &record(table), STATS, 1).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DataUnavailable {
                stage: Stage::SoftOff,
                task_index: 4,
                ..
            }
        ));
    }
}
