use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};

use camino::Utf8Path;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::domain::SampleKey;
use crate::error::CardLiveError;
use crate::table::ToolTable;

pub const RGI_KMER_PREDICTION: &str = "rgi_kmer.CARD*kmer Prediction";
pub const LMAT_COUNT: &str = "lmat.count";
pub const LMAT_LABEL: &str = "lmat.taxonomy_label";
pub const LMAT_TAXON_ID: &str = "lmat.ncbi_taxon_id";

pub const DEFAULT_MIN_RANK: &str = "species";

/// Access to a taxonomy database for lifting fine-grained assignments to a rank.
pub trait TaxonomyLookup: Send + Sync {
    /// The ancestor of `taxon_id` (inclusive) with the given rank, or `taxon_id`
    /// itself when its lineage has no such rank or the id is unknown.
    fn limit_to_rank(&self, taxon_id: u64, min_rank: &str) -> u64;

    fn scientific_name(&self, taxon_id: u64) -> Option<String>;

    fn adjusted_label(&self, taxon_id: u64, min_rank: &str) -> Option<String> {
        self.scientific_name(self.limit_to_rank(taxon_id, min_rank))
    }
}

/// Keeps LMAT labels as reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTaxonomyLookup;

impl TaxonomyLookup for NoTaxonomyLookup {
    fn limit_to_rank(&self, taxon_id: u64, _min_rank: &str) -> u64 {
        taxon_id
    }

    fn scientific_name(&self, _taxon_id: u64) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
struct TaxNode {
    parent: u64,
    rank: String,
}

/// NCBI taxonomy loaded from a taxdump directory (`nodes.dmp`, `names.dmp` and,
/// when present, `merged.dmp`).
#[derive(Debug, Clone, Default)]
pub struct NcbiTaxdump {
    nodes: HashMap<u64, TaxNode>,
    names: HashMap<u64, String>,
    merged: HashMap<u64, u64>,
}

impl NcbiTaxdump {
    pub fn load(dir: &Utf8Path) -> Result<Self, CardLiveError> {
        let open = |name: &str| {
            let path = dir.join(name);
            File::open(&path)
                .map(BufReader::new)
                .map_err(|err| CardLiveError::Taxonomy(format!("{path}: {err}")))
        };
        let mut taxdump = Self::from_readers(open("nodes.dmp")?, open("names.dmp")?)?;
        if dir.join("merged.dmp").is_file() {
            taxdump.merged = parse_merged(open("merged.dmp")?)?;
        }
        debug!(
            nodes = taxdump.nodes.len(),
            names = taxdump.names.len(),
            merged = taxdump.merged.len(),
            "loaded NCBI taxdump"
        );
        Ok(taxdump)
    }

    pub fn from_readers(nodes: impl BufRead, names: impl BufRead) -> Result<Self, CardLiveError> {
        let mut taxdump = Self::default();
        for line in nodes.lines() {
            let line = line.map_err(|err| CardLiveError::Taxonomy(err.to_string()))?;
            let fields = dmp_fields(&line);
            let [id, parent, rank, ..] = fields.as_slice() else {
                continue;
            };
            taxdump.nodes.insert(
                parse_taxon_id(id)?,
                TaxNode {
                    parent: parse_taxon_id(parent)?,
                    rank: (*rank).to_string(),
                },
            );
        }
        for line in names.lines() {
            let line = line.map_err(|err| CardLiveError::Taxonomy(err.to_string()))?;
            let fields = dmp_fields(&line);
            if let [id, name, _, "scientific name", ..] = fields.as_slice() {
                taxdump.names.insert(parse_taxon_id(id)?, (*name).to_string());
            }
        }
        Ok(taxdump)
    }

    fn current_id(&self, taxon_id: u64) -> u64 {
        self.merged.get(&taxon_id).copied().unwrap_or(taxon_id)
    }

    /// Lineage from `taxon_id` up to the root, both included.
    pub fn lineage(&self, taxon_id: u64) -> Vec<u64> {
        let mut lineage = Vec::new();
        let mut current = self.current_id(taxon_id);
        while let Some(node) = self.nodes.get(&current) {
            if lineage.contains(&current) {
                break;
            }
            lineage.push(current);
            if node.parent == current {
                break;
            }
            current = node.parent;
        }
        lineage
    }

    pub fn rank(&self, taxon_id: u64) -> Option<&str> {
        self.nodes
            .get(&self.current_id(taxon_id))
            .map(|node| node.rank.as_str())
    }
}

impl TaxonomyLookup for NcbiTaxdump {
    fn limit_to_rank(&self, taxon_id: u64, min_rank: &str) -> u64 {
        let lineage = self.lineage(taxon_id);
        if lineage.is_empty() {
            debug!(taxon_id, "taxon not found in NCBI taxdump");
        }
        lineage
            .into_iter()
            .find(|id| self.rank(*id) == Some(min_rank))
            .unwrap_or(taxon_id)
    }

    fn scientific_name(&self, taxon_id: u64) -> Option<String> {
        self.names.get(&self.current_id(taxon_id)).cloned()
    }
}

fn dmp_fields(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\t', '|', '\n', '\r'])
        .split("\t|\t")
        .map(str::trim)
        .collect()
}

fn parse_taxon_id(raw: &str) -> Result<u64, CardLiveError> {
    raw.trim()
        .parse()
        .map_err(|_| CardLiveError::Taxonomy(format!("invalid taxon id '{raw}'")))
}

fn parse_merged(reader: impl BufRead) -> Result<HashMap<u64, u64>, CardLiveError> {
    let mut merged = HashMap::new();
    for line in reader.lines() {
        let line = line.map_err(|err| CardLiveError::Taxonomy(err.to_string()))?;
        if let [old, new, ..] = dmp_fields(&line).as_slice() {
            merged.insert(parse_taxon_id(old)?, parse_taxon_id(new)?);
        }
    }
    Ok(merged)
}

/// Best label per sample for both taxonomic methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTaxonomy {
    pub sample: SampleKey,
    pub rgi_kmer: Option<String>,
    pub lmat: Option<String>,
}

impl FileTaxonomy {
    /// `None` when neither method produced a label.
    pub fn matches(&self) -> Option<bool> {
        if self.rgi_kmer.is_none() && self.lmat.is_none() {
            return None;
        }
        Some(self.rgi_kmer == self.lmat)
    }
}

/// Per-taxon agreement between the two methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonCounts {
    pub taxon: String,
    /// Samples where both methods chose this taxon.
    pub both: usize,
    /// Samples where only the k-mer method chose this taxon.
    pub rgi_kmer_only: usize,
    /// Samples where only LMAT chose this taxon.
    pub lmat_only: usize,
}

impl TaxonCounts {
    pub fn total(&self) -> usize {
        self.both + self.rgi_kmer_only + self.lmat_only
    }
}

pub struct TaxonomicParser<'a> {
    rgi_kmer: &'a ToolTable,
    lmat: &'a ToolTable,
    lookup: &'a dyn TaxonomyLookup,
    min_rank: &'a str,
    parenthetical: Regex,
}

impl<'a> TaxonomicParser<'a> {
    pub fn new(
        rgi_kmer: &'a ToolTable,
        lmat: &'a ToolTable,
        lookup: &'a dyn TaxonomyLookup,
        min_rank: &'a str,
    ) -> Result<Self, CardLiveError> {
        let parenthetical =
            Regex::new(r" *\(.*\)").map_err(|err| CardLiveError::Taxonomy(err.to_string()))?;
        Ok(Self {
            rgi_kmer,
            lmat,
            lookup,
            min_rank,
            parenthetical,
        })
    }

    /// Most frequent k-mer prediction per sample, with text such as `(chromosome)` removed.
    pub fn rgi_kmer_labels(&self) -> BTreeMap<SampleKey, String> {
        let mut weights = BTreeMap::<&SampleKey, BTreeMap<String, f64>>::new();
        for row in self.rgi_kmer.rows() {
            let Some(prediction) = row.get(RGI_KMER_PREDICTION) else {
                continue;
            };
            let label = self.parenthetical.replace_all(prediction, "").trim().to_string();
            if label.is_empty() {
                continue;
            }
            *weights
                .entry(&row.sample)
                .or_default()
                .entry(label)
                .or_insert(0.0) += 1.0;
        }
        best_labels(weights)
    }

    /// LMAT label with the largest share of the sample's counts.
    pub fn lmat_labels(&self) -> BTreeMap<SampleKey, String> {
        let mut totals = BTreeMap::<&SampleKey, f64>::new();
        let mut scored = Vec::new();
        for row in self.lmat.rows() {
            let Some(count) = row.get(LMAT_COUNT).and_then(|count| count.parse::<f64>().ok()) else {
                continue;
            };
            *totals.entry(&row.sample).or_insert(0.0) += count;
            if let Some(label) = self.lmat_label(row.get(LMAT_TAXON_ID), row.get(LMAT_LABEL)) {
                scored.push((&row.sample, label, count));
            }
        }

        let mut weights = BTreeMap::<&SampleKey, BTreeMap<String, f64>>::new();
        for (sample, label, count) in scored {
            let total = totals.get(sample).copied().unwrap_or_default();
            let weight = if total > 0.0 { count / total } else { 0.0 };
            let entry = weights.entry(sample).or_default().entry(label).or_insert(weight);
            *entry = entry.max(weight);
        }
        best_labels(weights)
    }

    fn lmat_label(&self, taxon_id: Option<&str>, label: Option<&str>) -> Option<String> {
        taxon_id
            .and_then(|raw| raw.parse::<f64>().ok())
            .filter(|id| *id >= 0.0)
            .and_then(|id| self.lookup.adjusted_label(id as u64, self.min_rank))
            .or_else(|| label.map(str::to_string))
    }

    /// One entry per sample that has a label from at least one method.
    pub fn file_matches(&self) -> Vec<FileTaxonomy> {
        let mut rgi_kmer = self.rgi_kmer_labels();
        let mut lmat = self.lmat_labels();
        let mut samples = rgi_kmer.keys().cloned().collect::<Vec<_>>();
        samples.extend(lmat.keys().cloned());
        samples.sort();
        samples.dedup();
        samples
            .into_iter()
            .map(|sample| FileTaxonomy {
                rgi_kmer: rgi_kmer.remove(&sample),
                lmat: lmat.remove(&sample),
                sample,
            })
            .collect()
    }

    /// Per-taxon counts of samples where the methods agree and where each method's
    /// label was not shared by the other. Sorted by total (descending), then taxon.
    pub fn rgi_lmat_comparison(&self) -> Vec<TaxonCounts> {
        let mut counts = BTreeMap::<String, TaxonCounts>::new();
        for file in self.file_matches() {
            if file.matches() == Some(true) {
                if let Some(taxon) = &file.rgi_kmer {
                    counter(&mut counts, taxon).both += 1;
                }
                continue;
            }
            if let Some(taxon) = &file.rgi_kmer {
                counter(&mut counts, taxon).rgi_kmer_only += 1;
            }
            if let Some(taxon) = &file.lmat {
                counter(&mut counts, taxon).lmat_only += 1;
            }
        }

        let mut counts = counts.into_values().collect::<Vec<_>>();
        counts.sort_by(|a, b| b.total().cmp(&a.total()).then_with(|| a.taxon.cmp(&b.taxon)));
        counts
    }
}

fn counter<'m>(counts: &'m mut BTreeMap<String, TaxonCounts>, taxon: &str) -> &'m mut TaxonCounts {
    counts
        .entry(taxon.to_string())
        .or_insert_with(|| TaxonCounts {
            taxon: taxon.to_string(),
            both: 0,
            rgi_kmer_only: 0,
            lmat_only: 0,
        })
}

/// Highest weight wins; ties go to the alphabetically first label.
fn best_labels(weights: BTreeMap<&SampleKey, BTreeMap<String, f64>>) -> BTreeMap<SampleKey, String> {
    weights
        .into_iter()
        .filter_map(|(sample, labels)| {
            labels
                .into_iter()
                .max_by(|(label_a, weight_a), (label_b, weight_b)| {
                    weight_a
                        .partial_cmp(weight_b)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| label_b.cmp(label_a))
                })
                .map(|(label, _)| (sample.clone(), label))
        })
        .collect()
}
