//! The query feature database: parsing, validation, and border stripping.
//!
//! A feature database is a multi-FASTA file where each header describes one
//! feature of interest:
//!
//! ```text
//! >ident, gene id, annotation, organism [class]
//! ```
//!
//! NCBI-style headers (`>gi|1234|...`) are also accepted, with the second
//! pipe field as the identifier and an `unclassified` class.

use crate::genome;
use crate::utils;

use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use itertools::Itertools;
use log::{info, warn};
use noodles::fasta;
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

// ----------------------------------------------------------------------------
// Feature
// ----------------------------------------------------------------------------

/// One query feature: an identifier, a class label, and its sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    /// Gene identifier, unique within the database.
    pub id: String,
    /// Class label (grouping tag), ex. `Toxin`.
    pub class: String,
    /// Sequence bases.
    pub sequence: Vec<u8>,
}

// ----------------------------------------------------------------------------
// FeatureSet
// ----------------------------------------------------------------------------

/// The ordered set of query features, defining the matrix column order.
///
/// Construction validates the database: headers must parse, identifiers must
/// be unique, and all features of one class must form one unbroken block
/// (class regions are shaded contiguously in the figure).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureSet {
    pub features: Vec<Feature>,
}

impl FeatureSet {
    /// Read and validate a feature database from a multi-FASTA file.
    pub fn read<P>(path: &P) -> Result<Self, Report>
    where
        P: AsRef<Path> + Debug,
    {
        let mut reader = File::open(path.as_ref())
            .map(BufReader::new)
            .map(fasta::Reader::new)
            .wrap_err(format!("Failed to read feature database: {path:?}"))?;

        let mut features = Vec::new();
        for result in reader.records() {
            let record = result.wrap_err(format!("Failed to parse fasta record: {path:?}"))?;
            let header = match record.description() {
                Some(description) => format!("{} {description}", record.name()),
                None => record.name().to_string(),
            };
            let (id, class) = parse_header(&header)?;
            features.push(Feature { id, class, sequence: record.sequence().as_ref().to_vec() });
        }

        if features.is_empty() {
            return Err(eyre!("Feature database contains no fasta records: {path:?}"));
        }

        // identifiers must be unique, duplicates would shadow each other in
        // hit matching
        let duplicates = features
            .iter()
            .map(|f| &f.id)
            .duplicates()
            .cloned()
            .collect_vec();
        if !duplicates.is_empty() {
            return Err(eyre!("Duplicate feature identifiers found: {duplicates:?}")
                .suggestion("Remove or rename the duplicate records in the database."));
        }

        let feature_set = FeatureSet { features };
        feature_set.check_contiguous_classes()?;
        info!("Investigating {} features.", feature_set.len());
        Ok(feature_set)
    }

    /// Write the features as a normalized multi-FASTA, with the identifier as
    /// the full record name.
    ///
    /// BLAST reports the first whitespace-separated token of a header as
    /// `qseqid`, so search results from the normalized file match feature
    /// identifiers by plain string equality.
    pub fn write<P>(&self, path: &P) -> Result<(), Report>
    where
        P: AsRef<Path> + Debug,
    {
        utils::create_parent_dir(path)?;
        let mut writer = File::create(path.as_ref())
            .map(fasta::Writer::new)
            .wrap_err(format!("Failed to create: {path:?}"))?;
        for feature in &self.features {
            let definition = fasta::record::Definition::new(feature.id.clone(), None);
            let sequence = fasta::record::Sequence::from(feature.sequence.clone());
            let record = fasta::Record::new(definition, sequence);
            writer
                .write_record(&record)
                .wrap_err(format!("Failed to write record {}: {path:?}", feature.id))?;
        }
        Ok(())
    }

    /// Returns a copy with the first and last `n` bases removed from every
    /// feature sequence.
    ///
    /// Used alongside consensus stripping to avoid lead-in / lead-out
    /// coverage artifacts near sequence borders.
    pub fn strip(&self, n: usize) -> Result<Self, Report> {
        let features = self
            .features
            .iter()
            .map(|feature| {
                let len = feature.sequence.len();
                if len <= 2 * n {
                    return Err(eyre!(
                        "Feature {} is too short ({len} bases) to strip {n} border bases from each end.",
                        feature.id
                    )
                    .suggestion("Lower --strip or remove the short feature."));
                }
                Ok(Feature {
                    id: feature.id.clone(),
                    class: feature.class.clone(),
                    sequence: feature.sequence[n..len - n].to_vec(),
                })
            })
            .collect::<Result<Vec<_>, Report>>()?;
        Ok(FeatureSet { features })
    }

    /// Feature identifiers, in database (column) order.
    pub fn ids(&self) -> Vec<String> {
        self.features.iter().map(|f| f.id.clone()).collect()
    }

    /// Class labels, parallel to [`ids`](FeatureSet::ids).
    pub fn classes(&self) -> Vec<String> {
        self.features.iter().map(|f| f.class.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// True if any sequence contains a non-nucleotide character.
    pub fn is_protein(&self) -> bool {
        self.features.iter().any(|f| {
            f.sequence.iter().any(|b| !b"ATCGNatcgn-".contains(b))
        })
    }

    // All features of one class must form one unbroken block.
    fn check_contiguous_classes(&self) -> Result<(), Report> {
        let classes = self.classes();
        let blocks = classes.iter().dedup().count();
        let unique = classes.iter().unique().count();
        if blocks != unique {
            return Err(eyre!(
                "Feature classes are not contiguous: {unique} classes appear in {blocks} separate blocks."
            )
            .suggestion("Group the database records so that each [class] forms one block."));
        }
        Ok(())
    }
}

/// Parse a fasta header into a feature identifier and class label.
///
/// ## Examples
///
/// ```rust
/// use hitmap::database::parse_header;
///
/// let (id, class) = parse_header("ident, mcbA, microcin B17, E. coli [Toxin]")?;
/// assert_eq!((id.as_str(), class.as_str()), ("mcbA", "Toxin"));
///
/// let (id, class) = parse_header("gi|1234|ref|NC_000913.3|")?;
/// assert_eq!((id.as_str(), class.as_str()), ("1234", "unclassified"));
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn parse_header(header: &str) -> Result<(String, String), Report> {
    // Well-formed database input: >ident, gene id, annotation, organism [class]
    if header.contains(',') {
        let fields = header.split(',').collect_vec();
        let id = fields
            .get(1)
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .ok_or_else(|| eyre!("Malformed database header, no gene id field: {header:?}"))?;
        let class = header
            .rsplit_once('[')
            .and_then(|(_, rest)| rest.split(']').next())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                eyre!("Malformed database header, no [class] tag: {header:?}")
                    .suggestion("Expected: >ident, gene id, annotation, organism [class]")
            })?;
        return Ok((id, class));
    }

    // NCBI-formatted input: >gi|1234|...
    if header.contains('|') {
        let fields = header.split('|').collect_vec();
        let id = fields
            .get(1)
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .ok_or_else(|| eyre!("Malformed NCBI header, no identifier field: {header:?}"))?;
        return Ok((id, String::from("unclassified")));
    }

    Err(eyre!("Failed to parse database header: {header:?}")
        .suggestion("Expected: >ident, gene id, annotation, organism [class]"))
}

/// Write border-stripped copies of every fasta file in a consensus directory.
///
/// The first and last `n` bases of every record are removed, and the trimmed
/// files are written to a `stripped/` subdirectory, which is returned.
pub fn strip_fasta_dir<P>(dir: &P, n: usize) -> Result<PathBuf, Report>
where
    P: AsRef<Path> + Debug,
{
    let stripped_dir = dir.as_ref().join("stripped");
    utils::create_clean_dir(&stripped_dir)?;

    let fasta_files = genome::find_fasta_files(dir)?;
    for input in &fasta_files {
        let file_name = input
            .file_name()
            .ok_or_else(|| eyre!("Failed to get file name: {input:?}"))?;
        let output = stripped_dir.join(file_name);

        let mut reader = File::open(input)
            .map(BufReader::new)
            .map(fasta::Reader::new)
            .wrap_err(format!("Failed to read consensus: {input:?}"))?;
        let mut writer = File::create(&output)
            .map(fasta::Writer::new)
            .wrap_err(format!("Failed to create: {output:?}"))?;

        for result in reader.records() {
            let record = result.wrap_err(format!("Failed to parse fasta record: {input:?}"))?;
            let bases: &[u8] = record.sequence().as_ref();
            if bases.len() <= 2 * n {
                warn!(
                    "Skipping record {} in {input:?}, too short ({} bases) to strip {n} from each end.",
                    record.name(),
                    bases.len()
                );
                continue;
            }
            let definition = record.definition().clone();
            let sequence = fasta::record::Sequence::from(bases[n..bases.len() - n].to_vec());
            writer
                .write_record(&fasta::Record::new(definition, sequence))
                .wrap_err(format!("Failed to write record: {output:?}"))?;
        }
    }

    Ok(stripped_dir)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
