use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("record store is malformed: {0}")]
    Malformed(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Create `dir` (and parents) if needed and check that files can be created
/// in it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    let output_dir_err = |err: io::Error| PersistError::OutputDir(format!("{}: {err}", dir.display()));

    if dir.exists() && !dir.is_dir() {
        return Err(PersistError::OutputDir(format!(
            "{} is not a directory",
            dir.display()
        )));
    }
    fs::create_dir_all(dir).map_err(output_dir_err)?;
    // Anonymous file, removed on drop.
    tempfile::tempfile_in(dir).map_err(output_dir_err)?;
    Ok(())
}
