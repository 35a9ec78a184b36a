pub mod format;
pub mod lammps_data;
pub mod lammps_dump;
pub mod lammps_input;
pub mod lammps_log;
pub mod tables;
pub mod traits;
