use std::collections::{BTreeMap, BTreeSet};
use std::io::{Seek, Write};
use std::sync::Arc;

use tracing::{debug, info, warn};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::config::ResolvedConfig;
use crate::domain::{SampleKey, Tool};
use crate::error::CardLiveError;
use crate::geo::RegionCodes;
use crate::modifiers::{
    GeographicNamesModifier, HistoricalRegionModifier, SnapshotModifier, TaxonomyModifier,
};
use crate::record::{ParsedRecord, parse_record};
use crate::rgi::{RgiParser, RgiRow};
use crate::snapshot::Snapshot;
use crate::store::{DirectoryStore, RecordStore};
use crate::table::{MainTable, ToolRow, ToolTable};
use crate::taxonomy::{NcbiTaxdump, NoTaxonomyLookup, TaxonomyLookup};

pub const DEFAULT_ARCHIVE_PREFIX: &str = "card_live";

/// Reads records from a store into a [`Snapshot`] and runs the enrichment steps.
pub struct RecordLoader<S> {
    store: S,
    modifiers: Vec<Box<dyn SnapshotModifier>>,
    archive_prefix: String,
}

impl RecordLoader<DirectoryStore> {
    /// Directory store with the standard enrichment steps: historical region
    /// correction, region names, then taxonomy.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, CardLiveError> {
        let codes = match &config.region_codes_csv {
            Some(path) => RegionCodes::from_unsd_csv(path, config.region_fallbacks)?,
            None => RegionCodes::builtin(config.region_fallbacks),
        };
        let lookup: Arc<dyn TaxonomyLookup> = match &config.taxonomy_dir {
            Some(dir) => Arc::new(NcbiTaxdump::load(dir)?),
            None => {
                info!("no taxonomy database configured, keeping LMAT labels as reported");
                Arc::new(NoTaxonomyLookup)
            }
        };

        let mut loader = Self::new(DirectoryStore::new(config.data_dir.clone()))
            .with_archive_prefix(config.archive_prefix.clone());
        loader.add_modifier(HistoricalRegionModifier::from_date(
            config.region_correction_cutoff,
        ));
        loader.add_modifier(GeographicNamesModifier::new(Arc::new(codes)));
        loader.add_modifier(TaxonomyModifier::with_min_rank(
            lookup,
            config.taxonomy_min_rank.clone(),
        ));
        Ok(loader)
    }
}

impl<S: RecordStore> RecordLoader<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            modifiers: Vec::new(),
            archive_prefix: DEFAULT_ARCHIVE_PREFIX.to_string(),
        }
    }

    pub fn with_archive_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.archive_prefix = prefix.into();
        self
    }

    pub fn add_modifier(&mut self, modifier: impl SnapshotModifier + 'static) {
        self.modifiers.push(Box::new(modifier));
    }

    /// Modifiers run in insertion order after every full load.
    pub fn add_modifiers(&mut self, modifiers: impl IntoIterator<Item = Box<dyn SnapshotModifier>>) {
        self.modifiers.extend(modifiers);
    }

    pub fn modifier_names(&self) -> Vec<&'static str> {
        self.modifiers.iter().map(|modifier| modifier.name()).collect()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn list_keys(&self) -> Result<Vec<SampleKey>, CardLiveError> {
        self.store.list()
    }

    pub fn read_all(&self) -> Result<Snapshot, CardLiveError> {
        let keys = self.list_keys()?;
        self.read_data(&keys)
    }

    /// Full load of `keys`. Records that fail to parse are logged and left out.
    pub fn read_data(&self, keys: &[SampleKey]) -> Result<Snapshot, CardLiveError> {
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let content = self.store.read(key)?;
            match parse_record(key, &content) {
                Ok(record) => records.push(record),
                Err(err) => warn!(key = %key, error = %err, "skipping record"),
            }
        }
        info!(read = records.len(), listed = keys.len(), "loaded records");

        let mut snapshot = build_snapshot(records)?;
        for modifier in &self.modifiers {
            debug!(modifier = modifier.name(), "applying modifier");
            snapshot = modifier.modify(&snapshot)?;
        }
        Ok(snapshot)
    }

    /// Zips the raw records for `keys` under `<prefix>/<key>`. Records that cannot be
    /// read or fail validation are skipped. Returns the number of entries written.
    pub fn write_archive<W: Write + Seek>(
        &self,
        keys: &BTreeSet<SampleKey>,
        writer: W,
    ) -> Result<usize, CardLiveError> {
        let mut zip = zip::ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut written = 0;
        for key in keys {
            let content = match self.store.read(key) {
                Ok(content) => content,
                Err(err) => {
                    warn!(key = %key, error = %err, "skipping unreadable record in archive");
                    continue;
                }
            };
            if let Err(err) = parse_record(key, &content) {
                warn!(key = %key, error = %err, "skipping invalid record in archive");
                continue;
            }
            zip.start_file(format!("{}/{key}", self.archive_prefix), options)
                .map_err(|err| CardLiveError::Archive(err.to_string()))?;
            zip.write_all(&content)
                .map_err(|err| CardLiveError::Archive(err.to_string()))?;
            written += 1;
        }
        zip.finish()
            .map_err(|err| CardLiveError::Archive(err.to_string()))?;
        Ok(written)
    }
}

fn build_snapshot(records: Vec<ParsedRecord>) -> Result<Snapshot, CardLiveError> {
    let samples = records
        .iter()
        .map(|record| record.main.sample.clone())
        .collect::<BTreeSet<_>>();

    let mut main_rows = Vec::with_capacity(records.len());
    let mut sections = BTreeMap::<Tool, Vec<ToolRow>>::new();
    for record in records {
        for (tool, rows) in record.sections {
            sections.entry(tool).or_default().extend(rows);
        }
        main_rows.push(record.main);
    }
    let mut take = |tool: Tool| sections.remove(&tool).unwrap_or_default();

    let rgi_rows = take(Tool::RgiMain)
        .into_iter()
        .map(RgiRow::from)
        .collect::<Vec<_>>();
    let rgi = RgiParser::from_rows(samples.clone(), rgi_rows)?;
    let rgi_kmer = ToolTable::new(Tool::RgiKmer.section(), samples.clone(), take(Tool::RgiKmer))?;
    let mlst = ToolTable::new(Tool::Mlst.section(), samples.clone(), take(Tool::Mlst))?;
    let lmat = ToolTable::new(Tool::Lmat.section(), samples.clone(), take(Tool::Lmat))?;
    let main = MainTable::new("main", samples, main_rows)?;

    Snapshot::new(main, rgi, rgi_kmer, lmat, mlst)
}
