use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: DumpParseErrorKind },
    #[error("Trajectory ends inside a frame after line {line}")]
    Truncated { line: usize },
    #[error("Trajectory contains no frame")]
    Empty,
}

#[derive(Debug, Error)]
pub enum DumpParseErrorKind {
    #[error("expected '{expected}', found '{found}'")]
    UnexpectedLine { expected: &'static str, found: String },
    #[error("invalid number '{value}'")]
    InvalidNumber { value: String },
    #[error("atom records lack the '{0}' column")]
    MissingColumn(&'static str),
    #[error("row has fewer fields than the ITEM: ATOMS header")]
    ShortRow,
}

/// Simulation cell in LAMMPS data-file convention: the bounds of the parallelepiped's
/// edges along each axis plus the `xy xz yz` tilt factors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimulationBox {
    pub lo: [f64; 3],
    pub hi: [f64; 3],
    pub tilt: [f64; 3],
}

impl SimulationBox {
    /// Converts dump `BOX BOUNDS` rows, which hold the bounding box of a tilted cell,
    /// into cell bounds.
    fn from_bounds(rows: [[f64; 3]; 3], triclinic: bool) -> Self {
        if !triclinic {
            return Self {
                lo: rows.map(|r| r[0]),
                hi: rows.map(|r| r[1]),
                tilt: [0.0; 3],
            };
        }
        let [xy, xz, yz] = rows.map(|r| r[2]);
        let x_shifts = [0.0, xy, xz, xy + xz];
        let x_min = x_shifts.iter().copied().fold(f64::INFINITY, f64::min);
        let x_max = x_shifts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            lo: [rows[0][0] - x_min, rows[1][0] - yz.min(0.0), rows[2][0]],
            hi: [rows[0][1] - x_max, rows[1][1] - yz.max(0.0), rows[2][1]],
            tilt: [xy, xz, yz],
        }
    }

    pub fn is_triclinic(&self) -> bool {
        self.tilt != [0.0; 3]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DumpAtom {
    pub id: usize,
    pub atom_type: usize,
    pub position: [f64; 3],
}

/// One snapshot of a custom-style dump, atoms ordered by id.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpFrame {
    pub timestep: u64,
    pub cell: SimulationBox,
    pub atoms: Vec<DumpAtom>,
}

impl DumpFrame {
    pub fn max_atom_type(&self) -> usize {
        self.atoms.iter().map(|a| a.atom_type).max().unwrap_or(0)
    }
}

struct NumberedLines<R> {
    inner: io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> NumberedLines<R> {
    fn next_line(&mut self) -> Result<Option<String>, DumpError> {
        match self.inner.next() {
            Some(line) => {
                self.line_no += 1;
                Ok(Some(line?))
            }
            None => Ok(None),
        }
    }

    fn require_line(&mut self) -> Result<String, DumpError> {
        self.next_line()?
            .ok_or(DumpError::Truncated { line: self.line_no })
    }

    fn require_item(&mut self, item: &'static str) -> Result<String, DumpError> {
        let line = self.require_line()?;
        match line.trim().strip_prefix(item) {
            Some(rest) => Ok(rest.trim().to_string()),
            None => Err(self.unexpected(item, &line)),
        }
    }

    fn unexpected(&self, expected: &'static str, found: &str) -> DumpError {
        DumpError::Parse {
            line: self.line_no,
            kind: DumpParseErrorKind::UnexpectedLine {
                expected,
                found: found.trim().to_string(),
            },
        }
    }

    fn parse<T: std::str::FromStr>(&self, value: &str) -> Result<T, DumpError> {
        value.parse().map_err(|_| DumpError::Parse {
            line: self.line_no,
            kind: DumpParseErrorKind::InvalidNumber {
                value: value.to_string(),
            },
        })
    }
}

const TIMESTEP: &str = "ITEM: TIMESTEP";
const NUMBER_OF_ATOMS: &str = "ITEM: NUMBER OF ATOMS";
const BOX_BOUNDS: &str = "ITEM: BOX BOUNDS";
const ATOMS: &str = "ITEM: ATOMS";

/// Reads every frame of a dump and returns the last one.
///
/// A frame cut short by the end of the file is an error, not a shorter frame.
pub fn read_last_frame(reader: &mut impl BufRead) -> Result<DumpFrame, DumpError> {
    let mut lines = NumberedLines {
        inner: reader.lines(),
        line_no: 0,
    };
    let mut last = None;
    while let Some(frame) = read_frame(&mut lines)? {
        last = Some(frame);
    }
    last.ok_or(DumpError::Empty)
}

pub fn read_last_frame_from_path(path: &Path) -> Result<DumpFrame, DumpError> {
    let file = File::open(path)?;
    read_last_frame(&mut BufReader::new(file))
}

fn read_frame<R: BufRead>(lines: &mut NumberedLines<R>) -> Result<Option<DumpFrame>, DumpError> {
    let header = loop {
        match lines.next_line()? {
            None => return Ok(None),
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => break line,
        }
    };
    if header.trim() != TIMESTEP {
        return Err(lines.unexpected(TIMESTEP, &header));
    }
    let line = lines.require_line()?;
    let timestep = lines.parse(line.trim())?;

    lines.require_item(NUMBER_OF_ATOMS)?;
    let line = lines.require_line()?;
    let natoms: usize = lines.parse(line.trim())?;

    let flags = lines.require_item(BOX_BOUNDS)?;
    let triclinic = flags.split_whitespace().any(|f| f == "xy");
    let mut rows = [[0.0; 3]; 3];
    for row in rows.iter_mut() {
        let line = lines.require_line()?;
        for (slot, value) in row.iter_mut().zip(line.split_whitespace()) {
            *slot = lines.parse(value)?;
        }
    }

    let columns = lines.require_item(ATOMS)?;
    let columns: Vec<&str> = columns.split_whitespace().collect();
    let position = |name: &'static str| {
        columns
            .iter()
            .position(|c| *c == name)
            .ok_or(DumpError::Parse {
                line: lines.line_no,
                kind: DumpParseErrorKind::MissingColumn(name),
            })
    };
    let wanted = [
        position("id")?,
        position("type")?,
        position("x")?,
        position("y")?,
        position("z")?,
    ];

    let mut atoms = Vec::with_capacity(natoms);
    for _ in 0..natoms {
        let line = lines.require_line()?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        let field = |index: usize| {
            fields.get(index).copied().ok_or(DumpError::Parse {
                line: lines.line_no,
                kind: DumpParseErrorKind::ShortRow,
            })
        };
        let [id, atom_type, x, y, z] = wanted;
        atoms.push(DumpAtom {
            id: lines.parse(field(id)?)?,
            atom_type: lines.parse(field(atom_type)?)?,
            position: [
                lines.parse(field(x)?)?,
                lines.parse(field(y)?)?,
                lines.parse(field(z)?)?,
            ],
        });
    }
    atoms.sort_by_key(|a| a.id);

    Ok(Some(DumpFrame {
        timestep,
        cell: SimulationBox::from_bounds(rows, triclinic),
        atoms,
    }))
}
