use crate::matrix::*;
use color_eyre::eyre::{Report, Result};
use tempfile::TempDir;

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

// ----------------------------------------------------------------------------
// build_row
// ----------------------------------------------------------------------------

#[test]
fn row_scores_match_accepted_hits() -> Result<(), Report> {
    let features = strings(&["mcbA", "mcbB", "fimH"]);
    let accepted = strings(&["mcbB"]);

    let row = build_row(&features, &accepted, ASSEMBLY_WEIGHT)?;
    assert_eq!(row, vec![NO_HIT, ASSEMBLY_WEIGHT, NO_HIT]);

    let row = build_row(&features, &[], CONSENSUS_WEIGHT)?;
    assert_eq!(row, vec![NO_HIT, NO_HIT, NO_HIT]);
    Ok(())
}

#[test]
fn empty_feature_set_rejected() {
    assert!(build_row(&[], &strings(&["mcbA"]), ASSEMBLY_WEIGHT).is_err());
}

// ----------------------------------------------------------------------------
// no_hit_score
// ----------------------------------------------------------------------------

#[test]
fn no_hit_sentinel_is_mode_dependent() {
    assert_eq!(no_hit_score(false, false), 0.5);
    assert_eq!(no_hit_score(true, false), 1.0);
    assert_eq!(no_hit_score(false, true), -0.5);
    assert_eq!(no_hit_score(true, true), -1.0);
}

// ----------------------------------------------------------------------------
// merge
// ----------------------------------------------------------------------------

fn scored(id: &str, scores: &[f64]) -> ScoredGenome {
    ScoredGenome { id: id.to_string(), scores: scores.to_vec() }
}

#[test]
fn merge_aligns_by_identifier() -> Result<(), Report> {
    let assembly = vec![
        scored("g1", &[ASSEMBLY_WEIGHT, NO_HIT]),
        scored("g2", &[NO_HIT, NO_HIT]),
    ];
    // consensus rows arrive in a different order
    let consensus = vec![
        scored("g2", &[CONSENSUS_WEIGHT, NO_HIT]),
        scored("g1", &[CONSENSUS_WEIGHT, NO_HIT]),
    ];

    let (matrix, labels) = merge(&assembly, &consensus)?;
    assert_eq!(labels, vec!["g1", "g2"]);
    // both hit, neither, consensus-only
    assert_eq!(matrix.values[0], vec![ASSEMBLY_WEIGHT + CONSENSUS_WEIGHT, 1.0]);
    assert_eq!(matrix.values[1], vec![NO_HIT + CONSENSUS_WEIGHT, 1.0]);
    Ok(())
}

#[test]
fn merge_is_order_insensitive_in_content() -> Result<(), Report> {
    let a = vec![scored("g1", &[ASSEMBLY_WEIGHT]), scored("g2", &[NO_HIT])];
    let b = vec![scored("g2", &[CONSENSUS_WEIGHT]), scored("g1", &[NO_HIT])];

    let (forward, _) = merge(&a, &b)?;
    let (backward, _) = merge(&b, &a)?;

    let mut forward = forward.values;
    let mut backward = backward.values;
    forward.sort_by(|x, y| x.partial_cmp(y).unwrap());
    backward.sort_by(|x, y| x.partial_cmp(y).unwrap());
    assert_eq!(forward, backward);
    Ok(())
}

#[test]
fn merge_count_mismatch_rejected() {
    let a = vec![scored("g1", &[NO_HIT]), scored("g2", &[NO_HIT])];
    let b = vec![scored("g1", &[NO_HIT])];
    assert!(merge(&a, &b).is_err());
}

#[test]
fn merge_missing_counterpart_rejected() {
    let a = vec![scored("g1", &[NO_HIT])];
    let b = vec![scored("g9", &[NO_HIT])];
    assert!(merge(&a, &b).is_err());
}

#[test]
fn merge_duplicate_identifier_rejected() {
    let a = vec![scored("g1", &[NO_HIT]), scored("g1", &[NO_HIT])];
    let b = vec![scored("g1", &[NO_HIT]), scored("g2", &[NO_HIT])];
    assert!(merge(&a, &b).is_err());
    assert!(merge(&b, &a).is_err());
}

// ----------------------------------------------------------------------------
// strip_uninteresting
// ----------------------------------------------------------------------------

#[test]
fn strip_all_nohit_column() -> Result<(), Report> {
    let matrix = Matrix { values: vec![vec![0.5, 2.0, 3.0], vec![0.5, 5.0, 6.0]] };
    let classes = strings(&["a", "b", "c"]);
    let ids = strings(&["a1", "b1", "c1"]);

    let (stripped, classes, ids) = strip_uninteresting(&matrix, &classes, &ids, false, false)?;
    assert_eq!(stripped.values, vec![vec![2.0, 3.0], vec![5.0, 6.0]]);
    assert_eq!(classes, strings(&["b", "c"]));
    assert_eq!(ids, strings(&["b1", "c1"]));
    Ok(())
}

#[test]
fn strip_uses_consensus_sentinel() -> Result<(), Report> {
    let matrix = Matrix { values: vec![vec![1.0, 1.0, 3.0], vec![0.5, 1.0, 6.0]] };
    let classes = strings(&["a", "b", "c"]);
    let ids = strings(&["a1", "b1", "c1"]);

    let (stripped, classes, ids) = strip_uninteresting(&matrix, &classes, &ids, true, false)?;
    assert_eq!(stripped.values, vec![vec![1.0, 3.0], vec![0.5, 6.0]]);
    assert_eq!(classes, strings(&["a", "c"]));
    assert_eq!(ids, strings(&["a1", "c1"]));
    Ok(())
}

#[test]
fn strip_inverted_consensus_sentinel() -> Result<(), Report> {
    let matrix = Matrix { values: vec![vec![-1.0, -1.0, -3.0], vec![-0.5, -1.0, -6.0]] };
    let classes = strings(&["a", "b", "c"]);
    let ids = strings(&["a1", "b1", "c1"]);

    let (stripped, classes, ids) = strip_uninteresting(&matrix, &classes, &ids, true, true)?;
    assert_eq!(stripped.values, vec![vec![-1.0, -3.0], vec![-0.5, -6.0]]);
    assert_eq!(classes, strings(&["a", "c"]));
    assert_eq!(ids, strings(&["a1", "c1"]));
    Ok(())
}

#[test]
fn strip_is_idempotent() -> Result<(), Report> {
    let matrix = Matrix { values: vec![vec![0.5, 2.0, 3.0], vec![0.5, 5.0, 6.0]] };
    let classes = strings(&["a", "b", "c"]);
    let ids = strings(&["a1", "b1", "c1"]);

    let (once, classes, ids) = strip_uninteresting(&matrix, &classes, &ids, false, false)?;
    let (twice, classes2, ids2) = strip_uninteresting(&once, &classes, &ids, false, false)?;
    assert_eq!(once, twice);
    assert_eq!(classes, classes2);
    assert_eq!(ids, ids2);
    Ok(())
}

#[test]
fn strip_misaligned_labels_rejected() {
    let matrix = Matrix { values: vec![vec![0.5, 2.0]] };
    assert!(strip_uninteresting(&matrix, &strings(&["a"]), &strings(&["a1", "b1"]), false, false)
        .is_err());
}

// ----------------------------------------------------------------------------
// singularity
// ----------------------------------------------------------------------------

#[test]
fn all_nohit_matrix_rejected() {
    let matrix = Matrix { values: vec![vec![0.5, 0.5], vec![0.5, 0.5]] };
    assert!(check_singularity(&matrix, false, false).is_err());
    // same cells are informative under the consensus sentinel
    assert!(check_singularity(&matrix, true, false).is_ok());
}

#[test]
fn empty_matrix_rejected() {
    let matrix = Matrix::default();
    assert!(check_singularity(&matrix, false, false).is_err());
}

// ----------------------------------------------------------------------------
// binarize / buffer / invert
// ----------------------------------------------------------------------------

#[test]
fn binarize_collapses_hits() {
    let mut matrix = Matrix { values: vec![vec![1.0, -1.0, 0.35, -0.35]] };
    binarize(&mut matrix, BINARIZE_CUTOFF);
    assert_eq!(matrix.values, vec![vec![1.0, -1.0, -1.0, -1.0]]);
}

#[test]
fn buffer_row_prepended_once() -> Result<(), Report> {
    let mut matrix = Matrix { values: vec![vec![0.5, -0.15]] };
    prepend_buffer_row(&mut matrix, 0.5)?;
    assert_eq!(matrix.num_rows(), 2);
    assert_eq!(matrix.values[0], vec![0.5, 0.5]);
    assert_eq!(matrix.values[1], vec![0.5, -0.15]);
    Ok(())
}

#[test]
fn buffer_on_empty_matrix_rejected() {
    let mut matrix = Matrix::default();
    assert!(prepend_buffer_row(&mut matrix, 0.5).is_err());
}

#[test]
fn invert_binarized_consensus_matrix() -> Result<(), Report> {
    // one genome: no hit (1.0) and a binarized hit (-1.0)
    let mut matrix = Matrix { values: vec![vec![1.0, -1.0]] };
    prepend_buffer_row(&mut matrix, 1.0)?;
    invert(&mut matrix, BINARIZE_CUTOFF, true);

    // margin keeps the opposite polarity, no-hit becomes -1.0, hit becomes 1.0
    assert_eq!(matrix.values[0], vec![1.0, 1.0]);
    assert_eq!(matrix.values[1], vec![no_hit_score(true, true), 1.0]);
    Ok(())
}

#[test]
fn invert_raw_assembly_matrix() -> Result<(), Report> {
    let mut matrix = Matrix { values: vec![vec![NO_HIT, ASSEMBLY_WEIGHT]] };
    prepend_buffer_row(&mut matrix, NO_HIT)?;
    invert(&mut matrix, RAW_CUTOFF, false);

    assert_eq!(matrix.values[0], vec![0.5, 0.5]);
    assert_eq!(matrix.values[1], vec![no_hit_score(false, true), 0.5]);
    Ok(())
}

// ----------------------------------------------------------------------------
// persistence
// ----------------------------------------------------------------------------

#[test]
fn csv_round_trips_score_alphabet() -> Result<(), Report> {
    let dir = TempDir::new()?;
    let path = dir.path().join("matrix.csv");
    let matrix = Matrix { values: vec![vec![0.5, -0.15], vec![1.0, -1.0]] };
    matrix.write_csv(&path)?;

    let content = std::fs::read_to_string(&path)?;
    assert_eq!(content, "0.50,-0.15\n1.00,-1.00\n");
    Ok(())
}

// ----------------------------------------------------------------------------
// clustering glue
// ----------------------------------------------------------------------------

#[test]
fn cluster_rows_reorders_labels_with_matrix() -> Result<(), Report> {
    let matrix = Matrix {
        values: vec![
            vec![0.5, 0.5],
            vec![-0.15, -0.15],
            vec![0.5, 0.45],
        ],
    };
    let labels = strings(&["g1", "g2", "g3"]);

    let (reordered, labels, dendrogram) =
        cluster_rows(&matrix, &labels, hitmap_cluster::Linkage::Average)?;
    assert_eq!(dendrogram.num_leaves(), 3);

    // labels stay attached to their rows
    let original = [("g1", vec![0.5, 0.5]), ("g2", vec![-0.15, -0.15]), ("g3", vec![0.5, 0.45])];
    for (label, row) in labels.iter().zip(reordered.values.iter()) {
        let expected = &original.iter().find(|(l, _)| l == label).unwrap().1;
        assert_eq!(row, expected);
    }

    // the similar genomes g1 and g3 are adjacent
    let pos = |l: &str| labels.iter().position(|x| x == l).unwrap();
    assert_eq!(pos("g1").abs_diff(pos("g3")), 1);
    Ok(())
}

#[test]
fn cluster_single_row_rejected() {
    let matrix = Matrix { values: vec![vec![0.5, 0.5]] };
    let labels = strings(&["g1"]);
    assert!(cluster_rows(&matrix, &labels, hitmap_cluster::Linkage::Average).is_err());
}

#[test]
fn cluster_columns_preserves_row_semantics() -> Result<(), Report> {
    let matrix = Matrix {
        values: vec![
            vec![0.5, -0.15, 0.5],
            vec![0.5, -0.15, 0.45],
        ],
    };
    let ids = strings(&["a1", "b1", "c1"]);
    let classes = strings(&["a", "b", "c"]);

    let (reordered, ids, classes, _dendrogram) =
        cluster_columns(&matrix, &ids, &classes, hitmap_cluster::Linkage::Average)?;

    // still two genome rows, columns permuted together with their labels
    assert_eq!(reordered.num_rows(), 2);
    assert_eq!(reordered.num_cols(), 3);
    let col = ids.iter().position(|id| id == "b1").unwrap();
    assert_eq!(classes[col], "b");
    assert_eq!(reordered.values[0][col], -0.15);
    assert_eq!(reordered.values[1][col], -0.15);
    Ok(())
}
