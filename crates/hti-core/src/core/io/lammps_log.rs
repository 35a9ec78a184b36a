use crate::core::io::traits::ObservableSource;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LOG_FILE_NAME: &str = "log.lammps";

#[derive(Debug, Error)]
pub enum ThermoLogError {
    #[error("Cannot read thermo log '{path}': {source}", path = path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("No thermo output found in '{path}'", path = path.display())]
    NoThermoData { path: PathBuf },

    #[error("Invalid number '{value}' on line {line} of '{path}'", path = path.display())]
    InvalidNumber {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("Line {line} of '{path}' has {found} columns, expected {expected}", path = path.display())]
    RaggedRow {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    /// A thermo block that never reached its `Loop time` line.
    #[error("Run in '{path}' did not finish: thermo block interrupted at line {line}", path = path.display())]
    TruncatedRun { path: PathBuf, line: usize },

    #[error("Column {column} is out of range for a table with {width} columns")]
    MissingColumn { column: usize, width: usize },
}

/// Thermo output of one simulation, all runs concatenated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThermoTable {
    headers: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ThermoTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self { headers, rows }
    }

    /// A table whose every listed column holds `values`, other columns zero.
    pub fn from_columns(width: usize, columns: &[(usize, &[f64])]) -> Self {
        let len = columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let mut rows = vec![vec![0.0; width]; len];
        for (column, values) in columns {
            for (row, value) in rows.iter_mut().zip(values.iter()) {
                row[*column] = *value;
            }
        }
        Self {
            headers: Vec::new(),
            rows,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.rows
            .first()
            .map(Vec::len)
            .unwrap_or(self.headers.len())
    }

    pub fn column(&self, column: usize) -> Result<Vec<f64>, ThermoLogError> {
        let width = self.width();
        if column >= width {
            return Err(ThermoLogError::MissingColumn { column, width });
        }
        Ok(self.rows.iter().map(|row| row[column]).collect())
    }

    /// Parses the thermo blocks of a LAMMPS log.
    ///
    /// A block starts at a header line whose first word is `Step` and ends at the
    /// `Loop time` line. Other text inside a block is skipped, except that an `ERROR` or
    /// `Last command` line, or the end of the log, before `Loop time` means the run died
    /// and fails with [`ThermoLogError::TruncatedRun`]. Rows of later runs are appended
    /// to those of earlier ones.
    pub fn read_from(reader: &mut impl BufRead, path: &Path) -> Result<Self, ThermoLogError> {
        let mut headers: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut in_block = false;
        let mut last_line = 0;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res.map_err(|e| ThermoLogError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            let line_num = line_num + 1;
            last_line = line_num;
            let trimmed = line.trim();

            if trimmed.starts_with("Step") {
                headers = trimmed.split_whitespace().map(str::to_string).collect();
                in_block = true;
                continue;
            }
            if !in_block {
                continue;
            }
            if trimmed.starts_with("Loop time") {
                in_block = false;
                continue;
            }
            if trimmed.starts_with("ERROR") || trimmed.starts_with("Last command") {
                return Err(ThermoLogError::TruncatedRun {
                    path: path.to_path_buf(),
                    line: line_num,
                });
            }

            // warnings and other messages interleaved with thermo rows
            let first = trimmed.split_whitespace().next().unwrap_or("");
            if first.parse::<f64>().is_err() {
                continue;
            }

            let row = trimmed
                .split_whitespace()
                .map(|token| {
                    token
                        .parse::<f64>()
                        .map_err(|_| ThermoLogError::InvalidNumber {
                            path: path.to_path_buf(),
                            line: line_num,
                            value: token.to_string(),
                        })
                })
                .collect::<Result<Vec<f64>, _>>()?;

            if row.len() != headers.len() {
                return Err(ThermoLogError::RaggedRow {
                    path: path.to_path_buf(),
                    line: line_num,
                    expected: headers.len(),
                    found: row.len(),
                });
            }
            rows.push(row);
        }

        if in_block {
            return Err(ThermoLogError::TruncatedRun {
                path: path.to_path_buf(),
                line: last_line,
            });
        }
        if rows.is_empty() {
            return Err(ThermoLogError::NoThermoData {
                path: path.to_path_buf(),
            });
        }
        Ok(Self { headers, rows })
    }

    pub fn read_from_path(path: &Path) -> Result<Self, ThermoLogError> {
        let file = File::open(path).map_err(|e| ThermoLogError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader, path)
    }
}

/// Reads `log.lammps` from each task directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct LammpsLogSource;

impl ObservableSource for LammpsLogSource {
    fn read_observables(&self, task_dir: &Path) -> Result<ThermoTable, ThermoLogError> {
        ThermoTable::read_from_path(&task_dir.join(LOG_FILE_NAME))
    }
}
