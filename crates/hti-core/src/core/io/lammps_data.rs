use crate::core::io::lammps_dump::DumpFrame;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataFileError {
    #[error("Cannot read data file '{path}': {source}", path = path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Data file '{path}' has no 'atoms' count in its header", path = path.display())]
    MissingAtomCount { path: PathBuf },

    #[error("Invalid atom count '{value}' in data file '{path}'", path = path.display())]
    InvalidAtomCount { path: PathBuf, value: String },
}

/// Reads the `<N> atoms` header entry of a LAMMPS data file.
pub fn read_atom_count(reader: &mut impl BufRead, path: &Path) -> Result<usize, DataFileError> {
    // the first line is a free-form title
    for line_res in reader.lines().skip(1) {
        let line = line_res.map_err(|e| DataFileError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let content = line.split('#').next().unwrap_or("").trim();
        let mut words = content.split_whitespace();
        if let (Some(value), Some("atoms"), None) = (words.next(), words.next(), words.next()) {
            return match value.parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(DataFileError::InvalidAtomCount {
                    path: path.to_path_buf(),
                    value: value.to_string(),
                }),
            };
        }
        if content.starts_with("Atoms") {
            break;
        }
    }
    Err(DataFileError::MissingAtomCount {
        path: path.to_path_buf(),
    })
}

pub fn read_atom_count_from_path(path: &Path) -> Result<usize, DataFileError> {
    let file = File::open(path).map_err(|e| DataFileError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    read_atom_count(&mut BufReader::new(file), path)
}

/// Writes `frame` as an atomic-style data file declaring `atom_types` types.
///
/// The declared type count never drops below the highest type present in the frame.
pub fn write_data(writer: &mut impl Write, frame: &DumpFrame, atom_types: usize) -> io::Result<()> {
    let cell = &frame.cell;
    writeln!(writer, "LAMMPS data file from timestep {}", frame.timestep)?;
    writeln!(writer)?;
    writeln!(writer, "{} atoms", frame.atoms.len())?;
    writeln!(writer, "{} atom types", atom_types.max(frame.max_atom_type()))?;
    writeln!(writer)?;
    for (axis, name) in ["x", "y", "z"].iter().enumerate() {
        writeln!(
            writer,
            "{:.10} {:.10} {}lo {}hi",
            cell.lo[axis], cell.hi[axis], name, name
        )?;
    }
    if cell.is_triclinic() {
        let [xy, xz, yz] = cell.tilt;
        writeln!(writer, "{:.10} {:.10} {:.10} xy xz yz", xy, xz, yz)?;
    }
    writeln!(writer)?;
    writeln!(writer, "Atoms # atomic")?;
    writeln!(writer)?;
    for atom in &frame.atoms {
        let [x, y, z] = atom.position;
        writeln!(writer, "{} {} {:.10} {:.10} {:.10}", atom.id, atom.atom_type, x, y, z)?;
    }
    writer.flush()
}

pub fn write_data_to_path(
    path: &Path,
    frame: &DumpFrame,
    atom_types: usize,
) -> Result<(), DataFileError> {
    let to_error = |e: io::Error| DataFileError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let file = File::create(path).map_err(to_error)?;
    write_data(&mut BufWriter::new(file), frame, atom_types).map_err(to_error)
}
