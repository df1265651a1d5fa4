use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::domain::{CutoffTier, SelectionScope, TaxonomyMethod};
use crate::error::CardLiveError;
use crate::record::parse_timestamp;
use crate::rgi::RgiColumn;

/// A filter over the resistance-results table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RgiSelection {
    /// `level: None` keeps every tier.
    Cutoff {
        scope: SelectionScope,
        level: Option<CutoffTier>,
    },
    DrugClass {
        scope: SelectionScope,
        elements: BTreeSet<String>,
    },
    AmrGene {
        scope: SelectionScope,
        elements: BTreeSet<String>,
    },
    AmrGeneFamily {
        scope: SelectionScope,
        elements: BTreeSet<String>,
    },
    ResistanceMechanism {
        scope: SelectionScope,
        elements: BTreeSet<String>,
    },
}

impl RgiSelection {
    pub fn cutoff(scope: SelectionScope, level: Option<CutoffTier>) -> Self {
        RgiSelection::Cutoff { scope, level }
    }

    pub fn drug_classes<I, S>(scope: SelectionScope, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        RgiSelection::DrugClass {
            scope,
            elements: element_set(elements),
        }
    }

    pub fn amr_genes<I, S>(scope: SelectionScope, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        RgiSelection::AmrGene {
            scope,
            elements: element_set(elements),
        }
    }

    pub fn amr_gene_families<I, S>(scope: SelectionScope, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        RgiSelection::AmrGeneFamily {
            scope,
            elements: element_set(elements),
        }
    }

    pub fn resistance_mechanisms<I, S>(scope: SelectionScope, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        RgiSelection::ResistanceMechanism {
            scope,
            elements: element_set(elements),
        }
    }

    /// Builds a selection from the string tags used by UI controls. `scope`
    /// defaults to `row` for cutoffs and `file` for the element filters.
    pub fn parse(by: &str, scope: Option<&str>, values: &[&str]) -> Result<Self, CardLiveError> {
        let default_scope = match by {
            "cutoff" => SelectionScope::Row,
            "drug" | "amr_gene" | "amr_gene_family" | "resistance_mechanism" => {
                SelectionScope::File
            }
            _ => return Err(CardLiveError::InvalidSelectionKind(by.to_string())),
        };
        let scope = scope
            .map(str::parse::<SelectionScope>)
            .transpose()?
            .unwrap_or(default_scope);

        match by {
            "cutoff" => {
                let level = match values.first().map(|level| level.trim()) {
                    None | Some("") => None,
                    Some(level) if level.eq_ignore_ascii_case("all") => None,
                    Some(level) => Some(level.parse()?),
                };
                Ok(Self::cutoff(scope, level))
            }
            "drug" => Ok(Self::drug_classes(scope, values)),
            "amr_gene" => Ok(Self::amr_genes(scope, values)),
            "amr_gene_family" => Ok(Self::amr_gene_families(scope, values)),
            _ => Ok(Self::resistance_mechanisms(scope, values)),
        }
    }

    pub fn scope(&self) -> SelectionScope {
        match self {
            RgiSelection::Cutoff { scope, .. }
            | RgiSelection::DrugClass { scope, .. }
            | RgiSelection::AmrGene { scope, .. }
            | RgiSelection::AmrGeneFamily { scope, .. }
            | RgiSelection::ResistanceMechanism { scope, .. } => *scope,
        }
    }

    /// The column an element filter matches against; `None` for cutoffs.
    pub fn column(&self) -> Option<RgiColumn> {
        match self {
            RgiSelection::Cutoff { .. } => None,
            RgiSelection::DrugClass { .. } => Some(RgiColumn::DrugClass),
            RgiSelection::AmrGene { .. } => Some(RgiColumn::BestHitAro),
            RgiSelection::AmrGeneFamily { .. } => Some(RgiColumn::AmrGeneFamily),
            RgiSelection::ResistanceMechanism { .. } => Some(RgiColumn::ResistanceMechanism),
        }
    }

    pub fn elements(&self) -> Option<&BTreeSet<String>> {
        match self {
            RgiSelection::Cutoff { .. } => None,
            RgiSelection::DrugClass { elements, .. }
            | RgiSelection::AmrGene { elements, .. }
            | RgiSelection::AmrGeneFamily { elements, .. }
            | RgiSelection::ResistanceMechanism { elements, .. } => Some(elements),
        }
    }

    /// True when the selection keeps every row unchanged.
    pub fn is_noop(&self) -> bool {
        match self {
            RgiSelection::Cutoff { level, .. } => level.is_none(),
            _ => self.elements().is_none_or(BTreeSet::is_empty),
        }
    }
}

/// A filter over a whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Rgi(RgiSelection),
    /// Inclusive on both ends.
    Time {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// `taxonomy: None` keeps every sample.
    Taxonomy {
        method: TaxonomyMethod,
        taxonomy: Option<String>,
    },
}

impl Selection {
    pub fn time(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Selection::Time { start, end }
    }

    pub fn taxonomy(method: TaxonomyMethod, taxonomy: Option<&str>) -> Self {
        let taxonomy = taxonomy
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string);
        Selection::Taxonomy { method, taxonomy }
    }

    /// Builds a selection from `(table, by)` string tags.
    ///
    /// * `main`/`time`: `values` holds the start and end timestamps.
    /// * `main`/`lmat_taxonomy` or `rgi_kmer_taxonomy`: optional label in `values[0]`.
    /// * `rgi`/`<kind>`: see [`RgiSelection::parse`].
    pub fn parse(
        table: &str,
        by: &str,
        scope: Option<&str>,
        values: &[&str],
    ) -> Result<Self, CardLiveError> {
        match table {
            "rgi" => Ok(Selection::Rgi(RgiSelection::parse(by, scope, values)?)),
            "main" if by == "time" => {
                let [start, end] = values else {
                    return Err(CardLiveError::InvalidTimestamp(format!(
                        "time selection needs a start and an end, got {} value(s)",
                        values.len()
                    )));
                };
                Ok(Self::time(parse_timestamp(start)?, parse_timestamp(end)?))
            }
            "main" => {
                let method = by.parse::<TaxonomyMethod>()?;
                Ok(Self::taxonomy(method, values.first().copied()))
            }
            _ => Err(CardLiveError::InvalidSelectionTable(table.to_string())),
        }
    }
}

fn element_set<I, S>(elements: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    elements
        .into_iter()
        .map(|element| element.as_ref().trim().to_string())
        .filter(|element| !element.is_empty())
        .collect()
}
