use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::domain::SampleKey;
use crate::error::CardLiveError;

pub trait Keyed {
    fn sample(&self) -> &SampleKey;
}

/// Rows indexed by sample key.
///
/// The covered key set is stored next to the rows: a sample with no rows in this
/// table (for example no resistance hits) is still a member of the table.
#[derive(Debug, Clone)]
pub struct KeyedTable<R> {
    name: &'static str,
    samples: BTreeSet<SampleKey>,
    rows: Vec<R>,
}

impl<R: Keyed + Clone> KeyedTable<R> {
    pub fn new(
        name: &'static str,
        samples: BTreeSet<SampleKey>,
        rows: Vec<R>,
    ) -> Result<Self, CardLiveError> {
        let orphaned = rows
            .iter()
            .map(Keyed::sample)
            .filter(|sample| !samples.contains(*sample))
            .map(|sample| sample.to_string())
            .collect::<BTreeSet<_>>();
        if !orphaned.is_empty() {
            return Err(CardLiveError::KeyConsistencyViolation {
                table: format!("{name} (key set)"),
                missing: orphaned.into_iter().collect(),
            });
        }
        Ok(Self {
            name,
            samples,
            rows,
        })
    }

    /// Builds a table covering exactly the samples that appear in `rows`.
    pub fn from_rows(name: &'static str, rows: Vec<R>) -> Self {
        let samples = rows.iter().map(|row| row.sample().clone()).collect();
        Self {
            name,
            samples,
            rows,
        }
    }

    pub fn empty(name: &'static str) -> Self {
        Self {
            name,
            samples: BTreeSet::new(),
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn samples(&self) -> &BTreeSet<SampleKey> {
        &self.samples
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    /// Number of rows, not samples.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table covers no samples at all.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples_with_rows(&self) -> BTreeSet<SampleKey> {
        self.rows.iter().map(|row| row.sample().clone()).collect()
    }

    pub fn rows_for<'a>(&'a self, sample: &'a SampleKey) -> impl Iterator<Item = &'a R> + 'a {
        self.rows.iter().filter(move |row| row.sample() == sample)
    }

    /// Restricts the table to exactly `keys`. Every key must already be covered.
    pub fn select_by_files(&self, keys: &BTreeSet<SampleKey>) -> Result<Self, CardLiveError> {
        let missing = keys
            .difference(&self.samples)
            .map(|key| key.to_string())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(CardLiveError::KeyConsistencyViolation {
                table: self.name.to_string(),
                missing,
            });
        }
        let rows = self
            .rows
            .iter()
            .filter(|row| keys.contains(row.sample()))
            .cloned()
            .collect();
        Ok(Self {
            name: self.name,
            samples: keys.clone(),
            rows,
        })
    }

    /// Keeps the rows accepted by `keep` and shrinks the key set to `samples`.
    pub(crate) fn retain(
        &self,
        samples: BTreeSet<SampleKey>,
        mut keep: impl FnMut(&R) -> bool,
    ) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|row| samples.contains(row.sample()) && keep(row))
            .cloned()
            .collect();
        Self {
            name: self.name,
            samples,
            rows,
        }
    }

    pub(crate) fn map_rows(&self, f: impl FnMut(&R) -> R) -> Self {
        Self {
            name: self.name,
            samples: self.samples.clone(),
            rows: self.rows.iter().map(f).collect(),
        }
    }
}

/// One row of a flattened tool section. Columns are prefixed with the tool name
/// (`lmat.count`); cells without a value are absent from `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolRow {
    pub sample: SampleKey,
    pub fields: BTreeMap<String, String>,
}

impl ToolRow {
    pub fn new(sample: SampleKey) -> Self {
        Self {
            sample,
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: &str) -> Self {
        if let Some(value) = normalize_cell(value, None) {
            self.fields.insert(column.to_string(), value);
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

impl Keyed for ToolRow {
    fn sample(&self) -> &SampleKey {
        &self.sample
    }
}

/// One row per sample with submission details and the labels added by enrichment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MainRow {
    pub sample: SampleKey,
    pub timestamp: DateTime<Utc>,
    pub geo_area_code: Option<i64>,
    pub geo_area_name_standard: Option<String>,
    pub analysis_valid: String,
    pub lmat_taxonomy: Option<String>,
    pub rgi_kmer_taxonomy: Option<String>,
    pub taxonomy_matches: Option<bool>,
    pub attributes: BTreeMap<String, String>,
}

impl MainRow {
    pub fn new(sample: SampleKey, timestamp: DateTime<Utc>) -> Self {
        Self {
            sample,
            timestamp,
            geo_area_code: None,
            geo_area_name_standard: None,
            analysis_valid: "None".to_string(),
            lmat_taxonomy: None,
            rgi_kmer_taxonomy: None,
            taxonomy_matches: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Cell value of a named column as text, `None` when the cell has no value.
    pub fn value(&self, column: &str) -> Option<String> {
        match column {
            "filename" => Some(self.sample.to_string()),
            "timestamp" => Some(self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            "geo_area_code" => self.geo_area_code.map(|code| code.to_string()),
            "geo_area_name_standard" => self.geo_area_name_standard.clone(),
            "analysis_valid" => Some(self.analysis_valid.clone()),
            "lmat_taxonomy" => self.lmat_taxonomy.clone(),
            "rgi_kmer_taxonomy" => self.rgi_kmer_taxonomy.clone(),
            "taxonomy_matches" => self.taxonomy_matches.map(|matches| matches.to_string()),
            other => self.attributes.get(other).cloned(),
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        MAIN_COLUMNS.contains(&column) || self.attributes.contains_key(column)
    }
}

impl Keyed for MainRow {
    fn sample(&self) -> &SampleKey {
        &self.sample
    }
}

pub const MAIN_COLUMNS: [&str; 8] = [
    "filename",
    "timestamp",
    "geo_area_code",
    "geo_area_name_standard",
    "analysis_valid",
    "lmat_taxonomy",
    "rgi_kmer_taxonomy",
    "taxonomy_matches",
];

pub type MainTable = KeyedTable<MainRow>;
pub type ToolTable = KeyedTable<ToolRow>;

/// Maps empty or whitespace-only cells, and the tool's sentinel, to "no value".
pub fn normalize_cell(value: &str, sentinel: Option<&str>) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || sentinel.is_some_and(|sentinel| trimmed == sentinel) {
        return None;
    }
    Some(trimmed.to_string())
}
