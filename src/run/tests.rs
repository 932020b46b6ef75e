use super::*;
use crate::matrix::Matrix;
use tempfile::TempDir;

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn run_args_round_trip() -> Result<(), Report> {
    let dir = TempDir::new()?;
    let path = dir.path().join("run_args.json");

    let mut args = RunArgs::default();
    args.database = PathBuf::from("vfdb.fa");
    args.tol = 0.9;
    args.cluster_columns = true;
    args.write(&path)?;

    let content = std::fs::read_to_string(&path)?;
    let restored: RunArgs = serde_json::from_str(&content)?;
    assert_eq!(restored.database, PathBuf::from("vfdb.fa"));
    assert_eq!(restored.tol, 0.9);
    assert!(restored.cluster_columns);
    Ok(())
}

#[test]
fn linkage_arg_conversion() {
    assert!(matches!(Linkage::from(LinkageArg::Average), Linkage::Average));
    assert!(matches!(Linkage::from(LinkageArg::Single), Linkage::Single));
    assert_eq!(LinkageArg::Single.to_string(), "single");
}

#[test]
fn reshape_binarized_consensus_run() -> Result<(), Report> {
    // two genomes, merged scores: both-hit (-1.0), assembly-only (0.35),
    // neither (1.0)
    let matrix = Matrix { values: vec![vec![-1.0, 1.0], vec![0.35, 1.0]] };
    let (reshaped, row_labels, ids, classes) = reshape(
        matrix,
        labels(&["A", "B"]),
        labels(&["gene1", "gene2"]),
        labels(&["toxins", "toxins"]),
        true,
        true,
        false,
        false,
    )?;

    // buffer row prepended with the consensus sentinel, labelled empty
    assert_eq!(row_labels, labels(&["", "A", "B"]));
    assert_eq!(
        reshaped.values,
        vec![vec![1.0, 1.0], vec![-1.0, 1.0], vec![-1.0, 1.0]]
    );
    assert_eq!(ids, labels(&["gene1", "gene2"]));
    assert_eq!(classes, labels(&["toxins", "toxins"]));
    Ok(())
}

#[test]
fn reshape_strips_empty_columns() -> Result<(), Report> {
    let matrix = Matrix { values: vec![vec![0.5, -0.15], vec![0.5, 0.5]] };
    let (reshaped, _, ids, classes) = reshape(
        matrix,
        labels(&["A", "B"]),
        labels(&["gene1", "gene2"]),
        labels(&["toxins", "adhesins"]),
        false,
        false,
        false,
        true,
    )?;

    assert_eq!(reshaped.num_cols(), 1);
    assert_eq!(ids, labels(&["gene2"]));
    assert_eq!(classes, labels(&["adhesins"]));
    Ok(())
}

#[test]
fn reshape_all_nohit_run_rejected() {
    let matrix = Matrix { values: vec![vec![0.5, 0.5], vec![0.5, 0.5]] };
    let result = reshape(
        matrix,
        labels(&["A", "B"]),
        labels(&["gene1", "gene2"]),
        labels(&["toxins", "toxins"]),
        false,
        false,
        false,
        false,
    );
    assert!(result.is_err());
}

#[test]
fn reshape_inverted_raw_assembly_run() -> Result<(), Report> {
    let matrix = Matrix { values: vec![vec![-0.15, 0.5]] };
    let (reshaped, _, _, _) = reshape(
        matrix,
        labels(&["A"]),
        labels(&["gene1", "gene2"]),
        labels(&["toxins", "toxins"]),
        false,
        false,
        true,
        false,
    )?;

    // buffer stays a margin (0.5), hit stays bright, miss goes dark
    assert_eq!(reshaped.values, vec![vec![0.5, 0.5], vec![0.5, -0.5]]);
    Ok(())
}
