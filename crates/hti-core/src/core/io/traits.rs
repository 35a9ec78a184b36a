use crate::core::io::lammps_log::{ThermoLogError, ThermoTable};
use crate::core::io::lammps_input::TaskScript;
use std::path::Path;

/// Reads the thermo time series a simulator produced inside one task directory.
pub trait ObservableSource: Sync {
    fn read_observables(&self, task_dir: &Path) -> Result<ThermoTable, ThermoLogError>;
}

/// Renders the simulator input for one task.
pub trait ScriptGenerator {
    /// File name the script is written to inside the task directory.
    fn file_name(&self) -> &str;

    fn render(&self, task: &TaskScript<'_>) -> String;
}

/// Free energy per particle of the non-interacting reference state.
pub trait ReferenceFreeEnergy {
    fn free_energy(&self, natoms: usize) -> Option<f64>;
}
