//! Score matrix construction, merging, and reshaping.
//!
//! Cell values are drawn from a small fixed alphabet of meaningful scores,
//! not arbitrary floats. A single-source run uses [`NO_HIT`] (0.5) for absent
//! features and a negative weight for present ones. When consensus evidence
//! is merged in, the two weighted matrices are summed element-wise, giving a
//! 4-state alphabet: both hit, assembly-only, consensus-only, or neither
//! (0.5 + 0.5 = 1.0, redefining the "no hit" sentinel). Every stage that
//! tests for "no hit" must go through [`no_hit_score`] rather than hardcode
//! a constant.

use crate::utils;

use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use hitmap_cluster::{Dendrogram, Linkage};
use itertools::Itertools;
use log::info;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;

/// Matrix value for a feature with no accepted hit (single-source runs).
pub const NO_HIT: f64 = 0.5;
/// Match score for hits against genome assemblies.
pub const ASSEMBLY_WEIGHT: f64 = -0.15;
/// Match score for hits against mapping consensuses.
pub const CONSENSUS_WEIGHT: f64 = -0.85;
/// Binarization cutoff: cells below it collapse to -1.0.
pub const BINARIZE_CUTOFF: f64 = 0.99;
/// Looser cutoff used by invert/strip when binarization is disabled.
pub const RAW_CUTOFF: f64 = 0.49;

// The score alphabet (0.5, 1.0, -0.5, -1.0, and the weights) is exact in f64,
// so sentinel comparisons below use plain equality, as the alphabet demands.

/// Returns the matrix value that presently means "no hit".
///
/// The sentinel depends on whether consensus data was merged in (0.5 becomes
/// 1.0) and whether the matrix was inverted (sign flips).
///
/// ## Examples
///
/// ```rust
/// use hitmap::matrix::no_hit_score;
///
/// assert_eq!(no_hit_score(false, false), 0.5);
/// assert_eq!(no_hit_score(true, false), 1.0);
/// assert_eq!(no_hit_score(false, true), -0.5);
/// assert_eq!(no_hit_score(true, true), -1.0);
/// ```
pub fn no_hit_score(cons: bool, invert: bool) -> f64 {
    let no_hit = if cons { 1.0 } else { NO_HIT };
    if invert {
        -no_hit
    } else {
        no_hit
    }
}

/// Build one matrix row: `weight` for each accepted feature, [`NO_HIT`]
/// otherwise, in feature (column) order.
pub fn build_row(
    feature_ids: &[String],
    accepted_hits: &[String],
    weight: f64,
) -> Result<Vec<f64>, Report> {
    if feature_ids.is_empty() {
        return Err(eyre!("Cannot build a matrix row from an empty feature set."));
    }
    let row = feature_ids
        .iter()
        .map(|id| if accepted_hits.contains(id) { weight } else { NO_HIT })
        .collect();
    Ok(row)
}

// ----------------------------------------------------------------------------
// ScoredGenome
// ----------------------------------------------------------------------------

/// One genome's identifier and weighted score vector, the intermediate row
/// form used for merging.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredGenome {
    pub id: String,
    pub scores: Vec<f64>,
}

// ----------------------------------------------------------------------------
// Matrix
// ----------------------------------------------------------------------------

/// A 2-D grid of scores: rows are genomes, columns are features.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Matrix {
    pub values: Vec<Vec<f64>>,
}

impl Matrix {
    /// Assemble a matrix from scored genomes, dropping the identifier column.
    ///
    /// Returns the matrix and the genome identifiers as row labels.
    pub fn from_scored(rows: &[ScoredGenome]) -> (Self, Vec<String>) {
        let values = rows.iter().map(|r| r.scores.clone()).collect();
        let labels = rows.iter().map(|r| r.id.clone()).collect();
        (Matrix { values }, labels)
    }

    pub fn num_rows(&self) -> usize {
        self.values.len()
    }

    pub fn num_cols(&self) -> usize {
        self.values.first().map(|row| row.len()).unwrap_or(0)
    }

    /// Returns the transposed matrix.
    pub fn transpose(&self) -> Self {
        let values = (0..self.num_cols())
            .map(|col| self.values.iter().map(|row| row[col]).collect())
            .collect();
        Matrix { values }
    }

    /// Returns a new matrix with rows permuted by `order`.
    pub fn reorder_rows(&self, order: &[usize]) -> Self {
        let values = order.iter().map(|i| self.values[*i].clone()).collect();
        Matrix { values }
    }

    /// Persist the matrix as comma-separated numeric rows.
    ///
    /// Two decimal digits round-trip the score alphabet exactly.
    pub fn write_csv<P>(&self, path: &P) -> Result<(), Report>
    where
        P: AsRef<Path> + Debug,
    {
        utils::create_parent_dir(path)?;
        let mut writer = csv::Writer::from_path(path.as_ref())
            .wrap_err(format!("Failed to create: {path:?}"))?;
        for row in &self.values {
            let record = row.iter().map(|cell| format!("{cell:.2}")).collect_vec();
            writer.write_record(&record).wrap_err(format!("Failed to write: {path:?}"))?;
        }
        writer.flush().wrap_err(format!("Failed to write: {path:?}"))?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Merging
// ----------------------------------------------------------------------------

/// Merge assembly-weighted and consensus-weighted score rows into one matrix.
///
/// Rows are matched by genome identifier through a map lookup. Both sets must
/// describe the same genome collection: differing counts, a missing
/// counterpart, or a duplicate identifier are all fatal. The result is
/// aligned to the assembly ordering, identifier columns dropped, and the two
/// score vectors summed element-wise.
pub fn merge(
    assembly: &[ScoredGenome],
    consensus: &[ScoredGenome],
) -> Result<(Matrix, Vec<String>), Report> {
    if assembly.len() != consensus.len() {
        return Err(eyre!(
            "Assembly and consensus genome counts do not match ({} vs {}).",
            assembly.len(),
            consensus.len()
        )
        .suggestion("Both directories must contain the same genome collection."));
    }

    let mut by_id: HashMap<&str, &ScoredGenome> = HashMap::new();
    for row in consensus {
        if by_id.insert(row.id.as_str(), row).is_some() {
            return Err(eyre!("Duplicate genome identifier in consensus rows: {:?}", row.id));
        }
    }
    if let Some(id) = assembly.iter().map(|r| r.id.as_str()).duplicates().next() {
        return Err(eyre!("Duplicate genome identifier in assembly rows: {id:?}"));
    }

    let mut values = Vec::with_capacity(assembly.len());
    let mut labels = Vec::with_capacity(assembly.len());
    for row in assembly {
        let counterpart = by_id.get(row.id.as_str()).ok_or_else(|| {
            eyre!("Genome {:?} has no consensus counterpart.", row.id)
                .suggestion("Assembly and consensus file names must yield the same identifiers.")
        })?;
        if counterpart.scores.len() != row.scores.len() {
            return Err(eyre!(
                "Score vectors for genome {:?} differ in length ({} vs {}).",
                row.id,
                row.scores.len(),
                counterpart.scores.len()
            ));
        }
        let summed =
            row.scores.iter().zip(counterpart.scores.iter()).map(|(a, c)| a + c).collect();
        values.push(summed);
        labels.push(row.id.clone());
    }

    Ok((Matrix { values }, labels))
}

// ----------------------------------------------------------------------------
// Reshaping
// ----------------------------------------------------------------------------

/// Collapse every cell below `cutoff` to -1.0, hiding the distinction between
/// assembly and consensus hits in the figure.
pub fn binarize(matrix: &mut Matrix, cutoff: f64) {
    matrix.values.iter_mut().flatten().for_each(|cell| {
        if *cell < cutoff {
            *cell = -1.0;
        }
    });
}

/// Prepend exactly one all-sentinel buffer row, a rendering margin between
/// the axis and the first genome.
pub fn prepend_buffer_row(matrix: &mut Matrix, sentinel: f64) -> Result<(), Report> {
    let width = matrix.num_cols();
    if width == 0 {
        return Err(eyre!("Cannot buffer an empty matrix."));
    }
    matrix.values.insert(0, vec![sentinel; width]);
    Ok(())
}

/// Flip the visual polarity so missing hits render dark.
///
/// Cells below the active `cutoff` are re-mapped to `-cutoff - 0.01` (the new
/// distinguishable "no hit" value), the buffer row is negated specially to
/// keep its margin semantics (and reset to -0.5 when binarization was off),
/// then every cell is negated.
pub fn invert(matrix: &mut Matrix, cutoff: f64, binarized: bool) {
    matrix.values.iter_mut().flatten().for_each(|cell| {
        if *cell < cutoff {
            *cell = -cutoff - 0.01;
        }
    });
    if let Some(buffer) = matrix.values.first_mut() {
        buffer.iter_mut().for_each(|cell| *cell *= -1.0);
        if !binarized {
            buffer.iter_mut().for_each(|cell| *cell = -0.5);
        }
    }
    matrix.values.iter_mut().flatten().for_each(|cell| *cell *= -1.0);
}

/// Remove every column where all rows equal the current "no hit" sentinel.
///
/// The feature identifier and class label at the same index are removed from
/// their parallel lists, preserving alignment. Idempotent.
pub fn strip_uninteresting(
    matrix: &Matrix,
    classes: &[String],
    ids: &[String],
    cons: bool,
    invert: bool,
) -> Result<(Matrix, Vec<String>, Vec<String>), Report> {
    let num_cols = matrix.num_cols();
    if classes.len() != num_cols || ids.len() != num_cols {
        return Err(eyre!(
            "Column labels are out of alignment: {num_cols} columns, {} ids, {} classes.",
            ids.len(),
            classes.len()
        ));
    }

    let no_hit = no_hit_score(cons, invert);
    let keep = (0..num_cols)
        .filter(|col| matrix.values.iter().any(|row| row[*col] != no_hit))
        .collect_vec();

    if keep.len() < num_cols {
        info!("Stripping {} uninformative columns.", num_cols - keep.len());
    }

    let values = matrix
        .values
        .iter()
        .map(|row| keep.iter().map(|col| row[*col]).collect())
        .collect();
    let classes = keep.iter().map(|col| classes[*col].clone()).collect();
    let ids = keep.iter().map(|col| ids[*col].clone()).collect();
    Ok((Matrix { values }, classes, ids))
}

/// Reject a matrix with no informative sites at all.
///
/// After all transforms, a matrix where every cell equals the "no hit"
/// sentinel has nothing to plot.
pub fn check_singularity(matrix: &Matrix, cons: bool, invert: bool) -> Result<(), Report> {
    if matrix.num_rows() == 0 || matrix.num_cols() == 0 {
        return Err(eyre!("The matrix is empty."));
    }
    let no_hit = no_hit_score(cons, invert);
    if matrix.values.iter().flatten().all(|cell| *cell == no_hit) {
        return Err(eyre!("There are no informative sites (no hits) in the matrix.")
            .suggestion("Consider lowering the hit tolerance (-t/--tol)."));
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Clustering glue
// ----------------------------------------------------------------------------

/// Cluster matrix rows and reorder the matrix and row labels by the
/// dendrogram leaf ordering.
pub fn cluster_rows(
    matrix: &Matrix,
    labels: &[String],
    linkage: Linkage,
) -> Result<(Matrix, Vec<String>, Dendrogram), Report> {
    let dendrogram = hitmap_cluster::cluster(&matrix.values, labels, linkage)?;
    let order = dendrogram.order();
    let reordered = matrix.reorder_rows(&order);
    let labels = order.iter().map(|i| labels[*i].clone()).collect();
    Ok((reordered, labels, dendrogram))
}

/// Cluster matrix columns by similarity, reordering the matrix and the
/// parallel feature identifier and class label lists.
///
/// The matrix is transposed before and after, so row semantics are preserved
/// for the caller. Note that class labels are generally no longer contiguous
/// afterwards.
pub fn cluster_columns(
    matrix: &Matrix,
    ids: &[String],
    classes: &[String],
    linkage: Linkage,
) -> Result<(Matrix, Vec<String>, Vec<String>, Dendrogram), Report> {
    let transposed = matrix.transpose();
    let dendrogram = hitmap_cluster::cluster(&transposed.values, ids, linkage)?;
    let order = dendrogram.order();
    let reordered = transposed.reorder_rows(&order).transpose();
    let ids = order.iter().map(|i| ids[*i].clone()).collect();
    let classes = order.iter().map(|i| classes[*i].clone()).collect();
    Ok((reordered, ids, classes, dendrogram))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests;
