//! Small filesystem helpers shared across modules.

use color_eyre::eyre::{Report, Result, WrapErr};
use std::fmt::Debug;
use std::path::Path;

/// Create the parent directories of a path, if they don't exist yet.
pub fn create_parent_dir<P>(path: &P) -> Result<(), Report>
where
    P: AsRef<Path> + Debug,
{
    if let Some(parent) = path.as_ref().parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)
                .wrap_err(format!("Failed to create directory: {parent:?}"))?;
        }
    }
    Ok(())
}

/// Create a directory, removing any leftovers from a prior run first.
pub fn create_clean_dir<P>(path: &P) -> Result<(), Report>
where
    P: AsRef<Path> + Debug,
{
    let path = path.as_ref();
    if path.exists() {
        log::warn!("Directory exists and will be replaced: {path:?}");
        std::fs::remove_dir_all(path).wrap_err(format!("Failed to remove: {path:?}"))?;
    }
    std::fs::create_dir_all(path).wrap_err(format!("Failed to create directory: {path:?}"))?;
    Ok(())
}

/// Read a file into a vector of trimmed, non-empty lines.
pub fn read_lines<P>(path: &P) -> Result<Vec<String>, Report>
where
    P: AsRef<Path> + Debug,
{
    let content = std::fs::read_to_string(path.as_ref())
        .wrap_err(format!("Failed to read: {path:?}"))?;
    let lines = content
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    Ok(lines)
}
