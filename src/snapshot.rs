use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{SampleKey, Tool};
use crate::error::CardLiveError;
use crate::rgi::{RgiParser, RgiTable};
use crate::selection::Selection;
use crate::table::{Keyed, KeyedTable, MAIN_COLUMNS, MainTable, ToolRow, ToolTable};

/// Number of samples sharing one combination of column values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub values: Vec<String>,
    pub count: usize,
}

/// Immutable, mutually consistent view of every table for one set of samples.
///
/// Tables sit behind `Arc`s, so cloning a snapshot or deriving one through a
/// selection that keeps everything costs nothing.
#[derive(Debug, Clone)]
pub struct Snapshot {
    main: Arc<MainTable>,
    rgi: RgiParser,
    rgi_kmer: Arc<ToolTable>,
    lmat: Arc<ToolTable>,
    mlst: Arc<ToolTable>,
}

impl Snapshot {
    pub fn new(
        main: MainTable,
        rgi: RgiParser,
        rgi_kmer: ToolTable,
        lmat: ToolTable,
        mlst: ToolTable,
    ) -> Result<Self, CardLiveError> {
        Self::from_parts(
            Arc::new(main),
            rgi,
            Arc::new(rgi_kmer),
            Arc::new(lmat),
            Arc::new(mlst),
        )
    }

    fn from_parts(
        main: Arc<MainTable>,
        rgi: RgiParser,
        rgi_kmer: Arc<ToolTable>,
        lmat: Arc<ToolTable>,
        mlst: Arc<ToolTable>,
    ) -> Result<Self, CardLiveError> {
        let keys = main.samples();
        if main.len() != keys.len() {
            return Err(CardLiveError::KeyConsistencyViolation {
                table: "main (one row per sample)".to_string(),
                missing: keys
                    .difference(&main.samples_with_rows())
                    .map(ToString::to_string)
                    .collect(),
            });
        }
        for table in [rgi_kmer.as_ref(), lmat.as_ref(), mlst.as_ref()] {
            check_same_keys(keys, table)?;
        }
        let outside = rgi
            .files()
            .difference(keys)
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        if !outside.is_empty() {
            return Err(CardLiveError::KeyConsistencyViolation {
                table: "main".to_string(),
                missing: outside,
            });
        }
        Ok(Self {
            main,
            rgi,
            rgi_kmer,
            lmat,
            mlst,
        })
    }

    pub fn empty() -> Self {
        Self {
            main: Arc::new(MainTable::empty("main")),
            rgi: RgiParser::new(RgiTable::empty(Tool::RgiMain.section())),
            rgi_kmer: Arc::new(ToolTable::empty(Tool::RgiKmer.section())),
            lmat: Arc::new(ToolTable::empty(Tool::Lmat.section())),
            mlst: Arc::new(ToolTable::empty(Tool::Mlst.section())),
        }
    }

    /// Same auxiliary tables with a replaced main table. The key set must not change.
    pub fn with_main(&self, main: MainTable) -> Result<Self, CardLiveError> {
        Self::from_parts(
            Arc::new(main),
            self.rgi.clone(),
            Arc::clone(&self.rgi_kmer),
            Arc::clone(&self.lmat),
            Arc::clone(&self.mlst),
        )
    }

    pub fn main(&self) -> &MainTable {
        &self.main
    }

    pub fn rgi_parser(&self) -> &RgiParser {
        &self.rgi
    }

    pub fn rgi_kmer(&self) -> &ToolTable {
        &self.rgi_kmer
    }

    pub fn lmat(&self) -> &ToolTable {
        &self.lmat
    }

    pub fn mlst(&self) -> &ToolTable {
        &self.mlst
    }

    pub fn tool_table(&self, tool: Tool) -> Option<&ToolTable> {
        match tool {
            Tool::RgiMain => None,
            Tool::RgiKmer => Some(&self.rgi_kmer),
            Tool::Mlst => Some(&self.mlst),
            Tool::Lmat => Some(&self.lmat),
        }
    }

    pub fn files(&self) -> &BTreeSet<SampleKey> {
        self.main.samples()
    }

    pub fn samples_count(&self) -> usize {
        self.main.samples().len()
    }

    pub fn is_empty(&self) -> bool {
        self.main.is_empty()
    }

    pub fn latest_update(&self) -> Option<DateTime<Utc>> {
        self.main.rows().iter().map(|row| row.timestamp).max()
    }

    pub fn select(&self, selection: &Selection) -> Result<Snapshot, CardLiveError> {
        match selection {
            Selection::Rgi(rgi_selection) => {
                let rgi = self.rgi.select(rgi_selection);
                if rgi.same_as(&self.rgi) {
                    return Ok(self.clone());
                }
                let keys = rgi.files().clone();
                let projected = self.select_by_files(&keys)?;
                Self::from_parts(
                    projected.main,
                    rgi,
                    projected.rgi_kmer,
                    projected.lmat,
                    projected.mlst,
                )
            }
            Selection::Time { start, end } => {
                let keys = self
                    .main
                    .rows()
                    .iter()
                    .filter(|row| *start <= row.timestamp && row.timestamp <= *end)
                    .map(|row| row.sample.clone())
                    .collect();
                self.select_by_files(&keys)
            }
            Selection::Taxonomy { method, taxonomy } => {
                let Some(taxonomy) = taxonomy.as_deref().filter(|label| !label.is_empty()) else {
                    return Ok(self.clone());
                };
                let keys = self
                    .main
                    .rows()
                    .iter()
                    .filter(|row| row.value(method.column()).as_deref() == Some(taxonomy))
                    .map(|row| row.sample.clone())
                    .collect();
                self.select_by_files(&keys)
            }
        }
    }

    /// Restricts every table to exactly `keys`.
    pub fn select_by_files(&self, keys: &BTreeSet<SampleKey>) -> Result<Snapshot, CardLiveError> {
        if keys == self.files() {
            return Ok(self.clone());
        }
        let main = self.main.select_by_files(keys)?;
        let rgi_keys = keys
            .intersection(self.rgi.files())
            .cloned()
            .collect::<BTreeSet<_>>();
        let rgi = self.rgi.select_by_files(&rgi_keys)?;
        Self::from_parts(
            Arc::new(main),
            rgi,
            Arc::new(self.rgi_kmer.select_by_files(keys)?),
            Arc::new(self.lmat.select_by_files(keys)?),
            Arc::new(self.mlst.select_by_files(keys)?),
        )
    }

    /// Distinct values of a main-table column; cells without a value are skipped.
    pub fn unique_values(&self, column: &str) -> Result<BTreeSet<String>, CardLiveError> {
        self.check_columns(&[column], None)?;
        Ok(self
            .main
            .rows()
            .iter()
            .filter_map(|row| row.value(column))
            .collect())
    }

    /// Counts distinct samples per combination of `columns`.
    ///
    /// `join` is left-joined onto the main table by sample first; columns are looked
    /// up in the main table, then in the joined row. Combinations with a missing value
    /// are dropped. Results are ordered by count (descending), then by values.
    pub fn value_counts(
        &self,
        columns: &[&str],
        join: Option<&[ToolRow]>,
    ) -> Result<Vec<ValueCount>, CardLiveError> {
        self.check_columns(columns, join)?;

        let mut joined = BTreeMap::<&SampleKey, Vec<&ToolRow>>::new();
        for row in join.unwrap_or_default() {
            joined.entry(&row.sample).or_default().push(row);
        }

        let mut seen = BTreeSet::<(Vec<String>, &SampleKey)>::new();
        for row in self.main.rows() {
            let extra = joined.get(&row.sample).map(Vec::as_slice).unwrap_or_default();
            let candidates = if extra.is_empty() {
                vec![None]
            } else {
                extra.iter().map(|extra_row| Some(*extra_row)).collect()
            };
            for extra_row in candidates {
                let values = columns
                    .iter()
                    .map(|column| {
                        if row.has_column(column) {
                            row.value(column)
                        } else {
                            extra_row.and_then(|extra_row| extra_row.get(column)).map(str::to_string)
                        }
                    })
                    .collect::<Option<Vec<_>>>();
                if let Some(values) = values {
                    seen.insert((values, &row.sample));
                }
            }
        }

        let mut counts = BTreeMap::<Vec<String>, usize>::new();
        for (values, _) in seen {
            *counts.entry(values).or_insert(0) += 1;
        }
        let mut counts = counts
            .into_iter()
            .map(|(values, count)| ValueCount { values, count })
            .collect::<Vec<_>>();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.values.cmp(&b.values)));
        Ok(counts)
    }

    fn check_columns(&self, columns: &[&str], join: Option<&[ToolRow]>) -> Result<(), CardLiveError> {
        for column in columns {
            let known = MAIN_COLUMNS.contains(column)
                || self.main.is_empty()
                || self.main.rows().iter().any(|row| row.has_column(column))
                || join.is_some_and(|rows| rows.iter().any(|row| row.get(column).is_some()));
            if !known {
                return Err(CardLiveError::UnknownColumn((*column).to_string()));
            }
        }
        Ok(())
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

fn check_same_keys<R>(keys: &BTreeSet<SampleKey>, table: &KeyedTable<R>) -> Result<(), CardLiveError>
where
    R: Keyed + Clone,
{
    if table.samples() == keys {
        return Ok(());
    }
    let missing = keys
        .symmetric_difference(table.samples())
        .map(ToString::to_string)
        .collect();
    Err(CardLiveError::KeyConsistencyViolation {
        table: table.name().to_string(),
        missing,
    })
}
