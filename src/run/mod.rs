//! Run the full search-score-cluster-plot pipeline.

use crate::database::{self, FeatureSet};
use crate::genome;
use crate::matrix::{self, Matrix, ScoredGenome};
use crate::plot::{self, PlotArgs};
use crate::search::{self, BlastArgs};
use crate::utils;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use hitmap_cluster::Linkage;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::path::{Path, PathBuf};

// ----------------------------------------------------------------------------
// RunArgs
// ----------------------------------------------------------------------------

/// Build a presence/absence heatmap of query features across genomes.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct RunArgs {
    /// Feature database (multi-FASTA of query sequences).
    #[clap(short = 'd', long, required = true)]
    pub database: PathBuf,

    /// Directory of genome assemblies in FASTA format.
    #[clap(short = 'a', long, required = true)]
    pub assembly_dir: PathBuf,

    /// Directory of mapping consensuses.
    #[clap(short = 'm', long)]
    pub cons: Option<PathBuf>,

    /// Similarity cutoff for accepting a hit.
    #[clap(short = 't', long, default_value_t = RunArgs::default().tol)]
    pub tol: f64,

    /// Also accept hits down to (tol - careful), each with a warning.
    #[clap(short = 'c', long, default_value_t = RunArgs::default().careful)]
    pub careful: f64,

    /// Number of border bases to strip from consensuses and the database.
    #[clap(short = 's', long, default_value_t = RunArgs::default().strip)]
    pub strip: usize,

    /// Keep the row order given in this file (one genome id per line)
    /// instead of clustering.
    #[clap(long, conflicts_with = "cluster_columns")]
    pub index_file: Option<PathBuf>,

    /// Cluster by column similarity rather than row similarity.
    #[clap(long)]
    pub cluster_columns: bool,

    /// Linkage criterion for hierarchical clustering.
    #[clap(long, value_enum, default_value_t = LinkageArg::Average)]
    pub linkage: LinkageArg,

    /// Keep raw scores, differentiating assembly and consensus hits in the
    /// figure.
    #[clap(short = 'r', long)]
    pub raw_scores: bool,

    /// Invert the shading so that missing hits are dark.
    #[clap(long)]
    pub invert: bool,

    /// Remove columns that have no hits in any genome.
    #[clap(long)]
    pub remove_empty_cols: bool,

    /// Disable grid lines in the figure.
    #[clap(long)]
    pub no_grid: bool,

    /// Shade all class regions with this single color index.
    #[clap(long)]
    pub color: Option<usize>,

    /// Color generation seed.
    #[clap(long, default_value_t = RunArgs::default().seed)]
    pub seed: u64,

    /// Heatmap cell size in pixels.
    #[clap(long, default_value_t = RunArgs::default().cell_size)]
    pub cell_size: u32,

    /// Output directory.
    ///
    /// If the directory does not exist, it will be created.
    #[clap(short = 'o', long, required = true)]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub blast: BlastArgs,
}

impl Default for RunArgs {
    fn default() -> Self {
        RunArgs {
            database: PathBuf::new(),
            assembly_dir: PathBuf::new(),
            cons: None,
            tol: 0.95,
            careful: 0.0,
            strip: 10,
            index_file: None,
            cluster_columns: false,
            linkage: LinkageArg::Average,
            raw_scores: false,
            invert: false,
            remove_empty_cols: false,
            no_grid: false,
            color: None,
            seed: 99,
            cell_size: 12,
            output_dir: PathBuf::new(),
            blast: BlastArgs::default(),
        }
    }
}

impl RunArgs {
    /// Write the effective run arguments to a JSON file.
    pub fn write<P>(&self, path: &P) -> Result<(), Report>
    where
        P: AsRef<Path> + Debug,
    {
        utils::create_parent_dir(path)?;
        let output = serde_json::to_string_pretty(self)
            .wrap_err(format!("Failed to serialize run arguments: {self:?}"))?;
        std::fs::write(path, output)
            .wrap_err(format!("Failed to write run arguments: {path:?}"))?;
        Ok(())
    }
}

/// CLI-facing [`Linkage`] selection.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, ValueEnum)]
pub enum LinkageArg {
    Average,
    Single,
}

impl From<LinkageArg> for Linkage {
    fn from(arg: LinkageArg) -> Self {
        match arg {
            LinkageArg::Average => Linkage::Average,
            LinkageArg::Single => Linkage::Single,
        }
    }
}

impl Display for LinkageArg {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let lowercase = format!("{:?}", self).to_lowercase();
        write!(f, "{lowercase}")
    }
}

// ----------------------------------------------------------------------------
// Pipeline
// ----------------------------------------------------------------------------

/// Run the pipeline: build the hit matrix, merge consensus evidence, cluster,
/// reshape, validate, and render.
///
/// Every stage error aborts the whole run; this is a single-pass batch
/// pipeline with no partial-result recovery.
pub fn run(args: &RunArgs) -> Result<(), Report> {
    let output_dir = &args.output_dir;
    std::fs::create_dir_all(output_dir)
        .wrap_err(format!("Failed to create output directory: {output_dir:?}"))?;
    // search intermediates must never be reused from a prior run
    let dbs_dir = output_dir.join("DBs");
    let blast_dir = output_dir.join("blast");
    utils::create_clean_dir(&dbs_dir)?;
    utils::create_clean_dir(&blast_dir)?;

    let features = FeatureSet::read(&args.database)?;
    let protein = features.is_protein();
    if protein {
        info!("Query features contain protein sequences.");
    }
    let mut ids = features.ids();
    let mut classes = features.classes();

    // ------------------------------------------------------------------------
    // Build and merge

    let query_file = output_dir.join("queries.fa");
    features.write(&query_file)?;
    info!("Building the assembly hit matrix.");
    let assembly_rows = score_genomes(
        &args.assembly_dir,
        &query_file,
        matrix::ASSEMBLY_WEIGHT,
        &ids,
        protein,
        args,
        &dbs_dir,
        &blast_dir,
    )?;

    let cons = args.cons.is_some();
    let (mut scores, mut row_labels) = match &args.cons {
        Some(cons_dir) => {
            info!("Building the consensus hit matrix.");
            let trimmed = features.strip(args.strip)?;
            let trimmed_query = output_dir.join("queries_trimmed.fa");
            trimmed.write(&trimmed_query)?;
            let stripped_dir = database::strip_fasta_dir(cons_dir, args.strip)?;

            let consensus_rows = score_genomes(
                &stripped_dir,
                &trimmed_query,
                matrix::CONSENSUS_WEIGHT,
                &ids,
                protein,
                args,
                &dbs_dir,
                &blast_dir,
            )?;
            info!("Merging assembly and consensus evidence.");
            matrix::merge(&assembly_rows, &consensus_rows)?
        }
        None => Matrix::from_scored(&assembly_rows),
    };

    // differentiation between assembly and consensus hits only exists with
    // consensus data, so binarization is a consensus-mode transform
    let binarized = cons && !args.raw_scores;
    if !cons && !args.raw_scores {
        debug!("Binarization is inactive without consensus data.");
    }

    // ------------------------------------------------------------------------
    // Cluster

    if args.index_file.is_none() {
        let linkage = Linkage::from(args.linkage);
        let dendrogram = if !args.cluster_columns {
            info!("Clustering matrix rows.");
            let (clustered, labels, dendrogram) =
                matrix::cluster_rows(&scores, &row_labels, linkage)?;
            scores = clustered;
            row_labels = labels;
            dendrogram
        } else {
            info!("Clustering matrix columns.");
            let (clustered, new_ids, new_classes, dendrogram) =
                matrix::cluster_columns(&scores, &ids, &classes, linkage)?;
            scores = clustered;
            ids = new_ids;
            classes = new_classes;
            dendrogram
        };
        let newick_path = output_dir.join("dendrogram.nwk");
        std::fs::write(&newick_path, dendrogram.to_newick() + "\n")
            .wrap_err(format!("Failed to write: {newick_path:?}"))?;
    }

    scores.write_csv(&output_dir.join("matrix.csv"))?;

    // ------------------------------------------------------------------------
    // Reshape and validate

    let (reshaped, row_labels, ids, classes) = reshape(
        scores,
        row_labels,
        ids,
        classes,
        cons,
        binarized,
        args.invert,
        args.remove_empty_cols,
    )?;

    // ------------------------------------------------------------------------
    // Render

    let plot_args = PlotArgs {
        cell_width: args.cell_size,
        cell_height: args.cell_size,
        grid: !args.no_grid,
        color_index: args.color,
        seed: args.seed,
        single_region: args.cluster_columns,
    };
    let image = output_dir.join("results.png");
    plot::render(&reshaped, &classes, &plot_args, &image)?;
    plot::write_label_sidecars(&image, &row_labels, &ids, &classes)?;

    args.write(&output_dir.join("run_args.json"))?;
    Ok(())
}

/// Search one directory of genomes and build one weighted score row per
/// genome.
#[allow(clippy::too_many_arguments)]
fn score_genomes(
    data_dir: &Path,
    query_file: &Path,
    weight: f64,
    feature_ids: &[String],
    protein: bool,
    args: &RunArgs,
    dbs_dir: &Path,
    blast_dir: &Path,
) -> Result<Vec<ScoredGenome>, Report> {
    let mut files = genome::find_fasta_files(&data_dir.to_path_buf())?;
    if let Some(index_file) = &args.index_file {
        files = genome::order_genomes(index_file, &files)?;
    }

    let rows = files
        .iter()
        .map(|file| {
            let id = genome::genome_id(file)?;
            let db = search::make_blast_db(file, dbs_dir)?;
            let stem = file
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| eyre!("Failed to get file stem: {file:?}"))?;
            let results = blast_dir.join(format!("{stem}.tsv"));
            search::run_blast(query_file, &db, protein, &args.blast, &results)?;
            let hits = search::parse_hits(&results, args.tol, args.careful)?;
            debug!("Genome {id}: {} accepted hits.", hits.len());
            let scores = matrix::build_row(feature_ids, &hits, weight)?;
            Ok(ScoredGenome { id, scores })
        })
        .collect::<Result<Vec<_>, Report>>()?;

    // duplicate genome identifiers would silently shadow each other later
    use itertools::Itertools;
    if let Some(id) = rows.iter().map(|r| r.id.as_str()).duplicates().next() {
        return Err(eyre!("Duplicate genome identifier in {data_dir:?}: {id:?}"));
    }

    Ok(rows)
}

/// Apply the post-clustering transforms in their fixed order: buffer row,
/// binarize, invert, strip, singularity check.
///
/// Returns the reshaped matrix with its row labels (buffer row labelled
/// empty) and the possibly-stripped feature ids and class labels.
#[allow(clippy::too_many_arguments)]
fn reshape(
    mut matrix: Matrix,
    mut row_labels: Vec<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    cons: bool,
    binarized: bool,
    invert: bool,
    remove_empty_cols: bool,
) -> Result<(Matrix, Vec<String>, Vec<String>, Vec<String>), Report> {
    let sentinel = matrix::no_hit_score(cons, false);
    matrix::prepend_buffer_row(&mut matrix, sentinel)?;
    row_labels.insert(0, String::new());

    let cutoff = match binarized {
        true => {
            matrix::binarize(&mut matrix, matrix::BINARIZE_CUTOFF);
            matrix::BINARIZE_CUTOFF
        }
        false => matrix::RAW_CUTOFF,
    };

    if invert {
        matrix::invert(&mut matrix, cutoff, binarized);
    }

    let (matrix, classes, ids) = match remove_empty_cols {
        true => matrix::strip_uninteresting(&matrix, &classes, &ids, cons, invert)?,
        false => (matrix, classes, ids),
    };

    matrix::check_singularity(&matrix, cons, invert)?;
    Ok((matrix, row_labels, ids, classes))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests;
