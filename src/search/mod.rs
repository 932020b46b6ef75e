//! The similarity-search collaborator: BLAST+ invocation and hit parsing.
//!
//! Each genome is formatted into a nucleotide BLAST database, searched with
//! the query features, and the tabular results are filtered by a minimum
//! identity threshold into a list of accepted feature identifiers.

use clap::Args as ClapArgs;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Tabular output columns requested from BLAST.
const OUTFMT: &str = "6 qseqid nident qlen";

// ----------------------------------------------------------------------------
// BlastArgs
// ----------------------------------------------------------------------------

/// Options passed through to the BLAST+ binaries.
#[derive(ClapArgs, Clone, Debug, Deserialize, Serialize)]
pub struct BlastArgs {
    /// Run tBLASTx rather than BLASTn.
    #[clap(long)]
    pub tblastx: bool,
    /// Optimize for short queries (ex. PCR primers).
    #[clap(long)]
    pub short: bool,
    /// Number of BLAST threads.
    #[clap(long, default_value_t = BlastArgs::default().threads)]
    pub threads: usize,
}

impl Default for BlastArgs {
    fn default() -> Self {
        BlastArgs { tblastx: false, short: false, threads: 1 }
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Format a genome fasta into a nucleotide BLAST database.
///
/// The database files are written under `db_dir` with the fasta file stem as
/// the prefix, which is returned for use as `-db` in [`run_blast`].
pub fn make_blast_db(fasta: &Path, db_dir: &Path) -> Result<PathBuf, Report> {
    let stem = fasta
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| eyre!("Failed to get file stem: {fasta:?}"))?;
    let prefix = db_dir.join(stem);

    debug!("Formatting BLAST database: {prefix:?}");
    let output = Command::new("makeblastdb")
        .arg("-in")
        .arg(fasta)
        .args(["-dbtype", "nucl"])
        .arg("-out")
        .arg(&prefix)
        .output()
        .wrap_err("Failed to execute makeblastdb.")
        .suggestion("Is BLAST+ installed and on your PATH?")?;

    if !output.status.success() {
        return Err(eyre!(
            "makeblastdb failed for {fasta:?}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(prefix)
}

/// Search a BLAST database for the query features.
///
/// The program is chosen from the query type and options: `tblastn` for
/// protein queries, `tblastx` when requested, otherwise `blastn` (with the
/// dust filter off and only the top target sequence kept). Results are
/// written as tabular output (`qseqid nident qlen`) to `out`.
pub fn run_blast(
    query: &Path,
    db: &Path,
    protein: bool,
    args: &BlastArgs,
    out: &Path,
) -> Result<PathBuf, Report> {
    let program = match (protein, args.tblastx) {
        (true, _) => "tblastn",
        (false, true) => "tblastx",
        (false, false) => "blastn",
    };
    info!("Searching {db:?} with {program}.");

    let mut command = Command::new(program);
    command
        .arg("-query")
        .arg(query)
        .arg("-db")
        .arg(db)
        .arg("-out")
        .arg(out)
        .args(["-outfmt", OUTFMT])
        .args(["-max_target_seqs", "1"])
        .args(["-num_threads", &args.threads.to_string()]);

    match program {
        // mask low-complexity with seg for the translated searches
        "tblastn" | "tblastx" => {
            command.args(["-seg", "no"]);
        }
        _ => {
            command.args(["-dust", "no"]);
            if args.short {
                info!("Optimising for short query sequences.");
                command.args(["-word_size", "7", "-evalue", "1000"]);
            }
        }
    }

    let output = command
        .output()
        .wrap_err(format!("Failed to execute {program}."))
        .suggestion("Is BLAST+ installed and on your PATH?")?;

    if !output.status.success() {
        return Err(eyre!(
            "{program} failed for {db:?}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(out.to_path_buf())
}

/// Parse tabular BLAST results into accepted feature identifiers.
///
/// A hit is accepted when `nident / qlen >= tol`. With a non-zero `careful`,
/// hits down to `tol - careful` are also accepted, each with a warning, so
/// borderline results can be inspected in the log. Identifiers are
/// whitespace-trimmed and deduplicated, preserving first-occurrence order.
pub fn parse_hits<P>(path: &P, tol: f64, careful: f64) -> Result<Vec<String>, Report>
where
    P: AsRef<Path> + Debug,
{
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path.as_ref())
        .wrap_err(format!("Failed to read BLAST results: {path:?}"))?;

    let mut hits = Vec::new();
    for result in reader.deserialize() {
        let (qseqid, nident, qlen): (String, f64, f64) =
            result.wrap_err(format!("Failed to parse BLAST results: {path:?}"))?;
        if qlen <= 0.0 {
            return Err(eyre!("BLAST hit for {qseqid:?} has query length {qlen}: {path:?}"));
        }
        let identity = nident / qlen;
        let id = qseqid.trim().to_string();
        if identity >= tol {
            hits.push(id);
        } else if identity >= tol - careful {
            warn!("Borderline hit accepted: {id} at identity {identity:.3} (tolerance {tol}).");
            hits.push(id);
        }
    }

    Ok(hits.into_iter().unique().collect_vec())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn accepted_hits_above_tolerance() -> Result<(), Report> {
        let dir = TempDir::new()?;
        let path = dir.path().join("blast.tsv");
        std::fs::write(&path, "mcbA\t95\t100\nfimH\t80\t100\nmcbA\t99\t100\n")?;

        let hits = parse_hits(&path, 0.95, 0.0)?;
        assert_eq!(hits, vec!["mcbA"]);
        Ok(())
    }

    #[test]
    fn careful_widens_the_window() -> Result<(), Report> {
        let dir = TempDir::new()?;
        let path = dir.path().join("blast.tsv");
        std::fs::write(&path, "mcbA\t95\t100\nfimH\t80\t100\n")?;

        let hits = parse_hits(&path, 0.95, 0.2)?;
        assert_eq!(hits, vec!["mcbA", "fimH"]);
        Ok(())
    }

    #[test]
    fn no_hits_is_empty() -> Result<(), Report> {
        let dir = TempDir::new()?;
        let path = dir.path().join("blast.tsv");
        std::fs::write(&path, "")?;

        let hits = parse_hits(&path, 0.95, 0.0)?;
        assert!(hits.is_empty());
        Ok(())
    }

    #[test]
    fn malformed_results_rejected() -> Result<(), Report> {
        let dir = TempDir::new()?;
        let path = dir.path().join("blast.tsv");
        std::fs::write(&path, "mcbA\tnot_a_number\t100\n")?;

        assert!(parse_hits(&path, 0.95, 0.0).is_err());
        Ok(())
    }
}
