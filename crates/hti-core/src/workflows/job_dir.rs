//! Filesystem steps shared by the workflows that lay out a job directory.

use crate::engine::error::EngineError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

const MAX_BACKUPS: u32 = 1000;

pub(crate) fn require_files<'p>(
    inputs: impl IntoIterator<Item = &'p PathBuf>,
) -> Result<(), EngineError> {
    for input in inputs {
        if !input.is_file() {
            return Err(EngineError::io(
                input,
                io::Error::new(io::ErrorKind::NotFound, "input file does not exist"),
            ));
        }
    }
    Ok(())
}

pub(crate) fn copy_into(from: &Path, to: &Path) -> Result<(), EngineError> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| EngineError::io(from, e))
}

/// Moves an existing `dir` aside to the first free `<dir>.bkNNN`.
pub(crate) fn back_up_existing(dir: &Path) -> Result<Option<PathBuf>, EngineError> {
    if !dir.exists() {
        return Ok(None);
    }
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let backup = (0..MAX_BACKUPS)
        .map(|i| dir.with_file_name(format!("{}.bk{:03}", name, i)))
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| {
            EngineError::io(
                dir,
                io::Error::new(io::ErrorKind::AlreadyExists, "no free backup name left"),
            )
        })?;
    fs::rename(dir, &backup).map_err(|e| EngineError::io(dir, e))?;
    warn!(
        from = %dir.display(),
        to = %backup.display(),
        "Existing job directory moved aside."
    );
    Ok(Some(backup))
}
