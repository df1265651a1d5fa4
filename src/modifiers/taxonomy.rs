use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::SnapshotModifier;
use crate::error::CardLiveError;
use crate::snapshot::Snapshot;
use crate::taxonomy::{DEFAULT_MIN_RANK, TaxonomicParser, TaxonomyLookup};

/// Writes the per-sample LMAT and k-mer taxonomy labels onto the main table.
pub struct TaxonomyModifier {
    lookup: Arc<dyn TaxonomyLookup>,
    min_rank: String,
}

impl TaxonomyModifier {
    pub fn new(lookup: Arc<dyn TaxonomyLookup>) -> Self {
        Self::with_min_rank(lookup, DEFAULT_MIN_RANK)
    }

    pub fn with_min_rank(lookup: Arc<dyn TaxonomyLookup>, min_rank: impl Into<String>) -> Self {
        Self {
            lookup,
            min_rank: min_rank.into(),
        }
    }
}

impl SnapshotModifier for TaxonomyModifier {
    fn name(&self) -> &'static str {
        "taxonomy"
    }

    fn modify(&self, snapshot: &Snapshot) -> Result<Snapshot, CardLiveError> {
        let parser = TaxonomicParser::new(
            snapshot.rgi_kmer(),
            snapshot.lmat(),
            self.lookup.as_ref(),
            &self.min_rank,
        )?;
        let labels = parser
            .file_matches()
            .into_iter()
            .map(|file| (file.sample.clone(), file))
            .collect::<BTreeMap<_, _>>();
        debug!(labelled = labels.len(), "assigned taxonomy labels");

        let main = snapshot.main().map_rows(|row| {
            let mut row = row.clone();
            let file = labels.get(&row.sample);
            row.lmat_taxonomy = file.and_then(|file| file.lmat.clone());
            row.rgi_kmer_taxonomy = file.and_then(|file| file.rgi_kmer.clone());
            row.taxonomy_matches = file.and_then(|file| file.matches());
            row
        });
        snapshot.with_main(main)
    }
}
