//! Agglomerative hierarchical clustering for `hitmap` score matrices.
//!
//! Rows of a numeric matrix are clustered bottom-up into a binary merge tree
//! (a [`Dendrogram`]), from which a leaf ordering is extracted. The ordering
//! respects the dendrogram structure (no crossing branches), so reordering a
//! heatmap by it groups similar rows together.
//!
//! ```rust
//! use hitmap_cluster::{cluster, Linkage};
//!
//! let matrix = vec![
//!     vec![0.0, 0.0],
//!     vec![0.0, 1.0],
//!     vec![10.0, 10.0],
//! ];
//! let labels = ["A", "B", "C"];
//! let dendrogram = cluster(&matrix, &labels, Linkage::Average)?;
//!
//! // The two nearby rows end up adjacent.
//! assert_eq!(dendrogram.order(), vec![2, 0, 1]);
//! assert_eq!(dendrogram.ordered_labels(), vec!["C", "A", "B"]);
//! # Ok::<(), color_eyre::eyre::Report>(())
//! ```

use color_eyre::eyre::{eyre, ContextCompat, Report, Result};
use itertools::Itertools;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

// ----------------------------------------------------------------------------
// Linkage
// ----------------------------------------------------------------------------

/// The criterion for the distance between two clusters.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub enum Linkage {
    /// Mean of all pairwise member distances (UPGMA).
    #[default]
    Average,
    /// Minimum pairwise member distance (nearest neighbour).
    Single,
}

impl Display for Linkage {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let lowercase = format!("{:?}", self).to_lowercase();
        write!(f, "{lowercase}")
    }
}

// ----------------------------------------------------------------------------
// Distances
// ----------------------------------------------------------------------------

/// Condensed pairwise Euclidean distances between matrix rows.
///
/// Only the upper triangle is stored, row-major, as a flat vector of
/// `n * (n - 1) / 2` values.
///
/// ## Examples
///
/// ```rust
/// use hitmap_cluster::pairwise_distances;
///
/// let matrix = vec![vec![0.0, 0.0], vec![3.0, 4.0]];
/// let distances = pairwise_distances(&matrix)?;
/// assert_eq!(distances.get(0, 1), 5.0);
/// assert_eq!(distances.get(1, 0), 5.0);
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
#[derive(Clone, Debug)]
pub struct Distances {
    n: usize,
    values: Vec<f64>,
}

impl Distances {
    /// Returns the distance between rows `i` and `j`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return 0.0;
        }
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        // index into the condensed upper triangle
        let offset = i * self.n - (i * (i + 1)) / 2;
        self.values[offset + (j - i - 1)]
    }
}

/// Computes condensed pairwise Euclidean [`Distances`] between matrix rows.
///
/// Fails if the matrix has fewer than 2 rows, or if the rows are ragged.
pub fn pairwise_distances(matrix: &[Vec<f64>]) -> Result<Distances, Report> {
    let n = matrix.len();
    if n < 2 {
        return Err(eyre!("Cannot compute pairwise distances, the matrix has {n} row(s)."));
    }
    let width = matrix[0].len();
    if let Some((i, row)) = matrix.iter().find_position(|row| row.len() != width) {
        return Err(eyre!(
            "Cannot compute pairwise distances, row {i} has {} column(s), expected {width}.",
            row.len()
        ));
    }

    let values = (0..n)
        .tuple_combinations()
        .map(|(i, j)| {
            let sum_sq: f64 =
                matrix[i].iter().zip(matrix[j].iter()).map(|(a, b)| (a - b) * (a - b)).sum();
            sum_sq.sqrt()
        })
        .collect();

    Ok(Distances { n, values })
}

// ----------------------------------------------------------------------------
// Dendrogram
// ----------------------------------------------------------------------------

/// A node in the [`Dendrogram`]: either a labelled leaf or an internal merge.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Node {
    /// Row label, present only on leaves.
    pub label: Option<String>,
    /// Original row index, present only on leaves.
    pub row: Option<usize>,
    /// Merge height (the linkage distance); 0.0 for leaves.
    pub height: f64,
}

/// The binary merge tree produced by agglomerative clustering.
///
/// Backed by a directed [`petgraph`] graph, with edges pointing from a merge
/// node to its two children and weighted by branch length (the difference in
/// merge heights).
#[derive(Clone, Debug)]
pub struct Dendrogram {
    /// Merge tree of [`Node`]s, edge weights are branch lengths.
    pub graph: DiGraph<Node, f64>,
    root: NodeIndex,
}

impl Dendrogram {
    /// Returns the leaf ordering as original row indices.
    ///
    /// The ordering is a depth-first traversal of the merge tree, so leaves of
    /// one subtree are never interleaved with leaves of another (the
    /// no-crossing-branches property of a dendrogram).
    pub fn order(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if let Some(row) = self.graph[node].row {
                order.push(row);
                continue;
            }
            // petgraph lists neighbors in reverse insertion order, so pushing
            // them onto the stack as-is restores insertion order on pop
            stack.extend(self.graph.neighbors(node));
        }
        order
    }

    /// Returns the leaf labels in dendrogram order.
    pub fn ordered_labels(&self) -> Vec<String> {
        self.order()
            .into_iter()
            .filter_map(|row| self.leaf(row))
            .filter_map(|node| self.graph[node].label.clone())
            .collect()
    }

    /// Returns the number of leaves.
    pub fn num_leaves(&self) -> usize {
        self.graph.node_weights().filter(|n| n.row.is_some()).count()
    }

    /// Serializes the dendrogram to a Newick string.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use hitmap_cluster::{cluster, Linkage};
    ///
    /// let matrix = vec![vec![0.0, 0.0], vec![3.0, 4.0]];
    /// let dendrogram = cluster(&matrix, &["A", "B"], Linkage::Average)?;
    /// assert_eq!(dendrogram.to_newick(), "(A:5,B:5);");
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn to_newick(&self) -> String {
        format!("{};", self.node_to_newick(self.root))
    }

    fn node_to_newick(&self, node: NodeIndex) -> String {
        if let Some(label) = &self.graph[node].label {
            // newick reserved characters are replaced in leaf labels
            return label.replace([',', '(', ')', ':', ';', ' '], "_");
        }
        let children = {
            let mut c = self.graph.neighbors(node).collect_vec();
            c.reverse();
            c
        };
        let inner = children
            .into_iter()
            .map(|child| {
                let length = self.graph[node].height - self.graph[child].height;
                format!("{}:{}", self.node_to_newick(child), length)
            })
            .join(",");
        format!("({inner})")
    }

    fn leaf(&self, row: usize) -> Option<NodeIndex> {
        self.graph.node_indices().find(|n| self.graph[*n].row == Some(row))
    }
}

// ----------------------------------------------------------------------------
// Clustering
// ----------------------------------------------------------------------------

// An active cluster during agglomeration.
struct Cluster {
    node: NodeIndex,
    members: Vec<usize>,
    height: f64,
    active: bool,
}

/// Performs agglomerative hierarchical clustering on matrix rows.
///
/// Pairwise Euclidean distances are computed between rows, then clusters are
/// merged bottom-up under the given [`Linkage`] criterion until a single tree
/// remains. Ties are broken by the lowest cluster pair index, so the result is
/// deterministic.
///
/// Fails (before any distance computation) if the matrix has fewer than 2
/// rows, or if the label count does not match the row count.
pub fn cluster<L>(matrix: &[Vec<f64>], labels: &[L], linkage: Linkage) -> Result<Dendrogram, Report>
where
    L: AsRef<str>,
{
    let n = matrix.len();
    if n < 2 {
        return Err(eyre!(
            "Clustering is undefined for a matrix with {n} row(s), at least 2 are required."
        ));
    }
    if labels.len() != n {
        return Err(eyre!(
            "Cannot cluster, {} label(s) were provided for {n} matrix row(s).",
            labels.len()
        ));
    }

    let distances = pairwise_distances(matrix)?;

    let mut graph = DiGraph::new();
    let mut clusters = labels
        .iter()
        .enumerate()
        .map(|(row, label)| Cluster {
            node: graph.add_node(Node {
                label: Some(label.as_ref().to_string()),
                row: Some(row),
                height: 0.0,
            }),
            members: vec![row],
            height: 0.0,
            active: true,
        })
        .collect_vec();

    // n - 1 merges leave a single root
    for _ in 1..n {
        let active =
            clusters.iter().enumerate().filter(|(_, c)| c.active).map(|(i, _)| i).collect_vec();
        let (a, b) = active
            .iter()
            .copied()
            .tuple_combinations()
            .map(|(a, b)| {
                let d = cluster_distance(
                    &distances,
                    &clusters[a].members,
                    &clusters[b].members,
                    linkage,
                );
                (a, b, d)
            })
            // strict comparison keeps the first (lowest index) pair on ties
            .fold(None, |best: Option<(usize, usize, f64)>, (a, b, d)| match best {
                Some((_, _, best_d)) if best_d <= d => best,
                _ => Some((a, b, d)),
            })
            .map(|(a, b, _)| (a, b))
            .wrap_err("Clustering failed to find a cluster pair to merge.")?;

        let height = cluster_distance(&distances, &clusters[a].members, &clusters[b].members, linkage);
        let node = graph.add_node(Node { label: None, row: None, height });
        for child in [a, b] {
            let length = height - clusters[child].height;
            graph.add_edge(node, clusters[child].node, length);
        }

        let members =
            clusters[a].members.iter().chain(clusters[b].members.iter()).copied().collect_vec();
        clusters[a].active = false;
        clusters[b].active = false;
        clusters.push(Cluster { node, members, height, active: true });
    }

    let root = clusters.last().map(|c| c.node).wrap_err("Clustering produced no root.")?;
    Ok(Dendrogram { graph, root })
}

fn cluster_distance(
    distances: &Distances,
    a: &[usize],
    b: &[usize],
    linkage: Linkage,
) -> f64 {
    let pairs = a.iter().flat_map(|i| b.iter().map(move |j| distances.get(*i, *j)));
    match linkage {
        Linkage::Average => {
            let count = (a.len() * b.len()) as f64;
            pairs.sum::<f64>() / count
        }
        Linkage::Single => pairs.fold(f64::INFINITY, f64::min),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
