use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;

use crate::domain::{CutoffTier, SampleKey, SelectionScope, Tool};
use crate::error::CardLiveError;
use crate::selection::RgiSelection;
use crate::table::{Keyed, KeyedTable, ToolRow, normalize_cell};

pub const DEFAULT_SEPARATOR: &str = ";";

/// Categorical columns of the resistance-results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RgiColumn {
    CutOff,
    DrugClass,
    AmrGeneFamily,
    ResistanceMechanism,
    BestHitAro,
}

impl RgiColumn {
    pub fn name(&self) -> &'static str {
        match self {
            RgiColumn::CutOff => "rgi_main.Cut_Off",
            RgiColumn::DrugClass => "rgi_main.Drug Class",
            RgiColumn::AmrGeneFamily => "rgi_main.AMR Gene Family",
            RgiColumn::ResistanceMechanism => "rgi_main.Resistance Mechanism",
            RgiColumn::BestHitAro => "rgi_main.Best_Hit_ARO",
        }
    }

    /// Whether cells hold several `;`-separated values.
    pub fn is_delimited(&self) -> bool {
        matches!(
            self,
            RgiColumn::DrugClass | RgiColumn::AmrGeneFamily | RgiColumn::ResistanceMechanism
        )
    }
}

/// One resistance hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RgiRow {
    pub sample: SampleKey,
    pub cutoff: Option<CutoffTier>,
    pub fields: BTreeMap<String, String>,
}

impl RgiRow {
    pub fn new(sample: SampleKey) -> Self {
        Self {
            sample,
            cutoff: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: RgiColumn, value: &str) -> Self {
        if let Some(value) = normalize_cell(value, Some(Tool::RgiMain.sentinel())) {
            if column == RgiColumn::CutOff {
                self.cutoff = value.parse().ok();
            }
            self.fields.insert(column.name().to_string(), value);
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Values of a cell, split on `sep` and trimmed. Empty pieces are dropped.
    pub fn split_values<'a>(&'a self, column: &str, sep: &'a str) -> impl Iterator<Item = &'a str> {
        self.get(column)
            .into_iter()
            .flat_map(move |cell| cell.split(sep))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn column_values(&self, column: RgiColumn) -> BTreeSet<&str> {
        if column.is_delimited() {
            self.split_values(column.name(), DEFAULT_SEPARATOR).collect()
        } else {
            self.get(column.name()).into_iter().collect()
        }
    }
}

impl From<ToolRow> for RgiRow {
    fn from(row: ToolRow) -> Self {
        let cutoff = row
            .get(RgiColumn::CutOff.name())
            .and_then(|value| value.parse().ok());
        Self {
            sample: row.sample,
            cutoff,
            fields: row.fields,
        }
    }
}

impl Keyed for RgiRow {
    fn sample(&self) -> &SampleKey {
        &self.sample
    }
}

pub type RgiTable = KeyedTable<RgiRow>;

/// Selection algebra over the resistance-results table.
///
/// Cloning is cheap and every selection returns a new parser; a selection that
/// keeps everything hands back a parser sharing the same table.
#[derive(Debug, Clone)]
pub struct RgiParser {
    table: Arc<RgiTable>,
}

impl RgiParser {
    pub fn new(table: RgiTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn from_rows(
        samples: BTreeSet<SampleKey>,
        rows: Vec<RgiRow>,
    ) -> Result<Self, CardLiveError> {
        Ok(Self::new(RgiTable::new(Tool::RgiMain.section(), samples, rows)?))
    }

    pub fn table(&self) -> &RgiTable {
        &self.table
    }

    pub fn rows(&self) -> &[RgiRow] {
        self.table.rows()
    }

    /// Samples covered by this parser, including those without resistance hits.
    pub fn files(&self) -> &BTreeSet<SampleKey> {
        self.table.samples()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// True when both parsers share the same underlying table.
    pub fn same_as(&self, other: &RgiParser) -> bool {
        Arc::ptr_eq(&self.table, &other.table)
    }

    pub fn select(&self, selection: &RgiSelection) -> RgiParser {
        if self.is_empty() || selection.is_noop() {
            return self.clone();
        }
        match selection {
            RgiSelection::Cutoff { scope, level } => self.select_by_cutoff(*scope, *level),
            RgiSelection::DrugClass { scope, elements } => {
                self.select_by_elements(*scope, RgiColumn::DrugClass, elements)
            }
            RgiSelection::AmrGene { scope, elements } => {
                self.select_by_elements(*scope, RgiColumn::BestHitAro, elements)
            }
            RgiSelection::AmrGeneFamily { scope, elements } => {
                self.select_by_elements(*scope, RgiColumn::AmrGeneFamily, elements)
            }
            RgiSelection::ResistanceMechanism { scope, elements } => {
                self.select_by_elements(*scope, RgiColumn::ResistanceMechanism, elements)
            }
        }
    }

    pub fn select_by_cutoff(&self, scope: SelectionScope, level: Option<CutoffTier>) -> RgiParser {
        let Some(level) = level else {
            return self.clone();
        };
        if self.is_empty() {
            return self.clone();
        }
        let matches = |row: &RgiRow| row.cutoff == Some(level);
        let matched = self
            .rows()
            .iter()
            .filter(|row| row.cutoff == Some(level))
            .map(|row| row.sample.clone())
            .collect::<BTreeSet<_>>();
        let table = match scope {
            SelectionScope::Row => self.table.retain(matched, matches),
            SelectionScope::File => self.table.retain(matched, |_| true),
        };
        Self::new(table)
    }

    /// Keeps samples whose values in `column`, unioned over all their rows, contain
    /// every requested element. An empty request keeps everything.
    pub fn select_by_elements(
        &self,
        scope: SelectionScope,
        column: RgiColumn,
        elements: &BTreeSet<String>,
    ) -> RgiParser {
        if elements.is_empty() || self.is_empty() {
            return self.clone();
        }

        let mut per_sample = BTreeMap::<&SampleKey, BTreeSet<&str>>::new();
        for row in self.rows() {
            per_sample
                .entry(&row.sample)
                .or_default()
                .extend(row.column_values(column));
        }
        let matched = per_sample
            .into_iter()
            .filter(|(_, values)| elements.iter().all(|element| values.contains(element.as_str())))
            .map(|(sample, _)| sample.clone())
            .collect::<BTreeSet<_>>();

        let table = match scope {
            SelectionScope::File => self.table.retain(matched, |_| true),
            SelectionScope::Row => self.table.retain(matched, |row| {
                row.column_values(column)
                    .iter()
                    .any(|value| elements.contains(*value))
            }),
        };
        Self::new(table)
    }

    pub fn select_by_files(&self, keys: &BTreeSet<SampleKey>) -> Result<RgiParser, CardLiveError> {
        if keys == self.files() {
            return Ok(self.clone());
        }
        Ok(Self::new(self.table.select_by_files(keys)?))
    }

    /// One `(sample, value)` pair per separated value; cells without a value
    /// produce nothing.
    pub fn explode_column(&self, column: &str, sep: &str) -> Vec<(SampleKey, String)> {
        self.rows()
            .iter()
            .flat_map(|row| {
                row.split_values(column, sep)
                    .map(|value| (row.sample.clone(), value.to_string()))
            })
            .collect()
    }

    pub fn all_values(&self, column: &str) -> BTreeSet<String> {
        self.rows()
            .iter()
            .filter_map(|row| row.get(column))
            .map(str::to_string)
            .collect()
    }

    pub fn all_values_split(&self, column: &str, sep: &str) -> BTreeSet<String> {
        self.explode_column(column, sep)
            .into_iter()
            .map(|(_, value)| value)
            .collect()
    }

    pub fn all_drugs(&self) -> BTreeSet<String> {
        self.all_values_split(RgiColumn::DrugClass.name(), DEFAULT_SEPARATOR)
    }

    pub fn all_amr_gene_families(&self) -> BTreeSet<String> {
        self.all_values_split(RgiColumn::AmrGeneFamily.name(), DEFAULT_SEPARATOR)
    }

    pub fn all_resistance_mechanisms(&self) -> BTreeSet<String> {
        self.all_values_split(RgiColumn::ResistanceMechanism.name(), DEFAULT_SEPARATOR)
    }

    pub fn all_amr_genes(&self) -> BTreeSet<String> {
        self.all_values(RgiColumn::BestHitAro.name())
    }

    /// Distinct samples with at least one resistance hit.
    pub fn count_samples(&self) -> usize {
        self.table.samples_with_rows().len()
    }

    /// Number of samples per value, taking each sample's first non-empty cell.
    pub fn value_counts(&self, column: &str) -> BTreeMap<String, usize> {
        let mut first = BTreeMap::<&SampleKey, &str>::new();
        for row in self.rows() {
            if let Some(value) = row.get(column) {
                first.entry(&row.sample).or_insert(value);
            }
        }
        let mut counts = BTreeMap::new();
        for value in first.into_values() {
            *counts.entry(value.to_string()).or_insert(0) += 1;
        }
        counts
    }
}
