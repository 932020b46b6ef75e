//! Genome discovery: fasta file listing, identifiers, and explicit ordering.

use crate::utils;

use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use itertools::Itertools;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Recognized fasta file extensions.
const FASTA_EXTENSIONS: &[&str] = &["fa", "fasta", "fas", "fna"];

/// Returns all fasta files in a directory, sorted by file name.
pub fn find_fasta_files<P>(dir: &P) -> Result<Vec<PathBuf>, Report>
where
    P: AsRef<Path> + Debug,
{
    let entries = std::fs::read_dir(dir.as_ref())
        .wrap_err(format!("Failed to read directory: {dir:?}"))?;

    let mut files = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| FASTA_EXTENSIONS.contains(&ext))
                    .unwrap_or(false)
        })
        .collect_vec();

    if files.is_empty() {
        return Err(eyre!("No fasta files found in: {dir:?}")
            .suggestion(format!("Recognized extensions: {FASTA_EXTENSIONS:?}")));
    }

    files.sort();
    Ok(files)
}

/// Derive a stable genome identifier from a fasta file path.
///
/// The identifier is the file stem up to the first `_`, or the whole stem
/// when no `_` is present.
///
/// ## Examples
///
/// ```rust
/// use hitmap::genome::genome_id;
/// use std::path::Path;
///
/// assert_eq!(genome_id(Path::new("assemblies/EC958_assembly.fa"))?, "EC958");
/// assert_eq!(genome_id(Path::new("assemblies/MS2066.fasta"))?, "MS2066");
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn genome_id(path: &Path) -> Result<String, Report> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| eyre!("Failed to get file stem: {path:?}"))?;
    let id = stem.split('_').next().unwrap_or(stem).trim();
    if id.is_empty() {
        return Err(eyre!("Genome identifier is empty for: {path:?}"));
    }
    Ok(id.to_string())
}

/// Reorder genome files according to an explicit index file.
///
/// The index file holds one genome identifier per line. Every line must match
/// exactly one file (by [`genome_id`]) and every file must be matched, so the
/// result is a permutation of the input listing. Used instead of clustering
/// when the row order is already known, ex. from a phylogenetic tree.
pub fn order_genomes<P>(index_file: &P, files: &[PathBuf]) -> Result<Vec<PathBuf>, Report>
where
    P: AsRef<Path> + Debug,
{
    let lines = utils::read_lines(index_file)?;
    if lines.len() != files.len() {
        return Err(eyre!(
            "Index file has {} entries but {} genome files were found.",
            lines.len(),
            files.len()
        ));
    }

    let ordered = lines
        .iter()
        .map(|line| {
            files
                .iter()
                .find(|file| genome_id(file).map(|id| id == *line).unwrap_or(false))
                .cloned()
                .ok_or_else(|| {
                    eyre!("Index file entry {line:?} matches no genome file.")
                        .suggestion("Check the index file for typos.")
                })
        })
        .collect::<Result<Vec<_>, Report>>()?;

    // each file must be used exactly once
    let unique = ordered.iter().unique().count();
    if unique != files.len() {
        return Err(eyre!(
            "Index file entries do not match genome files 1:1 ({unique} of {} files matched).",
            files.len()
        ));
    }

    Ok(ordered)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
