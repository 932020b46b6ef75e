//! `hitmap` builds presence/absence heatmaps of query features across genome assemblies.
//!
//! ## Overview
//!
//! Given a database of query features (ex. virulence factors) and a directory
//! of genome assemblies, `hitmap` searches each genome for each feature with
//! BLAST, scores the results into a numeric matrix (one row per genome, one
//! column per feature), and renders the matrix as a heatmap.
//!
//! 1. `hitmap` combines evidence from _assemblies_ and _mapping consensuses_.
//!
//!    When a consensus directory is supplied, each genome contributes two
//!    score vectors built with different weights, which are merged into a
//!    4-state matrix that distinguishes assembly-only, consensus-only, and
//!    double-supported hits.
//!
//! 2. `hitmap` orders rows by similarity.
//!
//!    Rows (or columns) are ordered by agglomerative hierarchical clustering
//!    ([`hitmap_cluster`]), or by an explicit index file when the order is
//!    already known (ex. from a phylogenetic tree).
//!
//! 3. `hitmap` strips the noise.
//!
//!    Columns with no accepted hit in any genome can be removed, and a final
//!    validation rejects matrices with no informative sites at all.

pub mod cli;
pub mod database;
pub mod genome;
pub mod matrix;
pub mod plot;
pub mod run;
pub mod search;
pub mod utils;

#[doc(inline)]
pub use crate::cli::Cli;
#[doc(inline)]
pub use crate::database::FeatureSet;
#[doc(inline)]
pub use crate::matrix::Matrix;
#[doc(inline)]
pub use crate::run::RunArgs;
