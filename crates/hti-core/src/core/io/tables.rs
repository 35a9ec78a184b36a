use crate::core::io::format::sci;
use crate::core::io::lammps_log::ThermoTable;
use crate::core::quadrature::StageResult;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const STAGE_TABLE_FILE_NAME: &str = "hti.out";
pub const THERMO_DUMP_FILE_NAME: &str = "data";

#[derive(Debug, Error)]
pub enum TableWriteError {
    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("CSV writing error for '{path}': {source}", path = path.display())]
    Csv { path: PathBuf, source: csv::Error },
}

fn space_delimited<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .from_writer(writer)
}

fn write_rows<W, I>(writer: W, rows: I, path: &Path) -> Result<(), TableWriteError>
where
    W: Write,
    I: IntoIterator<Item = Vec<String>>,
{
    let mut csv_writer = space_delimited(writer);
    for record in rows {
        csv_writer
            .write_record(&record)
            .map_err(|e| TableWriteError::Csv {
                path: path.to_path_buf(),
                source: e,
            })?;
    }
    csv_writer.flush().map_err(|e| TableWriteError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Writes `(lambda, dU, dU_err)` rows of one stage.
pub fn write_stage_table(
    writer: &mut impl Write,
    stage: &StageResult,
    path: &Path,
) -> Result<(), TableWriteError> {
    writeln!(writer, "# lmbda dU dU_err").map_err(|e| TableWriteError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let rows = stage
        .rows()
        .map(|(l, m, e)| vec![sci(l, 8), sci(m, 8), sci(e, 8)]);
    write_rows(writer, rows, path)
}

/// Dumps a parsed thermo table, one row per thermo output line.
pub fn write_thermo_dump(
    writer: &mut impl Write,
    table: &ThermoTable,
    path: &Path,
) -> Result<(), TableWriteError> {
    if !table.headers().is_empty() {
        writeln!(writer, "# {}", table.headers().join(" ")).map_err(|e| TableWriteError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    let rows = table
        .rows()
        .iter()
        .map(|row| row.iter().map(|v| sci(*v, 6)).collect::<Vec<_>>());
    write_rows(writer, rows, path)
}

pub fn write_stage_table_to_path(path: &Path, stage: &StageResult) -> Result<(), TableWriteError> {
    let mut file = create(path)?;
    write_stage_table(&mut file, stage, path)
}

pub fn write_thermo_dump_to_path(path: &Path, table: &ThermoTable) -> Result<(), TableWriteError> {
    let mut file = create(path)?;
    write_thermo_dump(&mut file, table, path)
}

fn create(path: &Path) -> Result<File, TableWriteError> {
    File::create(path).map_err(|e| TableWriteError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
