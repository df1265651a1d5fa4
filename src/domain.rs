use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CardLiveError;

/// Identifier of one submitted sample. For directory-backed stores this is the
/// record's file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SampleKey(String);

impl SampleKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SampleKey {
    type Err = CardLiveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && normalized != "."
            && normalized != ".."
            && !normalized.contains(['/', '\\']);
        if !is_valid {
            return Err(CardLiveError::InvalidSampleKey(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// Strictness of a resistance hit, ordered `Loose < Strict < Perfect`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
pub enum CutoffTier {
    Loose,
    Strict,
    Perfect,
}

impl fmt::Display for CutoffTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CutoffTier::Loose => write!(f, "Loose"),
            CutoffTier::Strict => write!(f, "Strict"),
            CutoffTier::Perfect => write!(f, "Perfect"),
        }
    }
}

impl FromStr for CutoffTier {
    type Err = CardLiveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "loose" => Ok(CutoffTier::Loose),
            "strict" => Ok(CutoffTier::Strict),
            "perfect" => Ok(CutoffTier::Perfect),
            _ => Err(CardLiveError::InvalidCutoffLevel(value.to_string())),
        }
    }
}

/// The analysis tools whose output sections make up a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tool {
    RgiMain,
    RgiKmer,
    Mlst,
    Lmat,
}

impl Tool {
    /// Fixed order used for loading and for the completeness label.
    pub const ALL: [Tool; 4] = [Tool::RgiMain, Tool::RgiKmer, Tool::Mlst, Tool::Lmat];

    pub fn section(&self) -> &'static str {
        match self {
            Tool::RgiMain => "rgi_main",
            Tool::RgiKmer => "rgi_kmer",
            Tool::Mlst => "mlst",
            Tool::Lmat => "lmat",
        }
    }

    /// Placeholder the tool writes instead of leaving a field empty.
    pub fn sentinel(&self) -> &'static str {
        match self {
            Tool::Mlst => "-",
            Tool::RgiMain | Tool::RgiKmer | Tool::Lmat => "n/a",
        }
    }

    pub fn column(&self, field: &str) -> String {
        format!("{}.{field}", self.section())
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.section())
    }
}

/// Taxonomic classification methods that assign one label per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyMethod {
    Lmat,
    RgiKmer,
}

impl TaxonomyMethod {
    /// Main-table column holding the label assigned by this method.
    pub fn column(&self) -> &'static str {
        match self {
            TaxonomyMethod::Lmat => "lmat_taxonomy",
            TaxonomyMethod::RgiKmer => "rgi_kmer_taxonomy",
        }
    }
}

impl FromStr for TaxonomyMethod {
    type Err = CardLiveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "lmat" | "lmat_taxonomy" => Ok(TaxonomyMethod::Lmat),
            "rgi_kmer" | "rgi_kmer_taxonomy" => Ok(TaxonomyMethod::RgiKmer),
            _ => Err(CardLiveError::InvalidSelectionKind(value.to_string())),
        }
    }
}

/// How a resistance-table filter treats the rows of a matching sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionScope {
    /// Keep only the rows that matched.
    #[default]
    Row,
    /// Keep every row of a sample as soon as one row matched.
    File,
}

impl FromStr for SelectionScope {
    type Err = CardLiveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "row" => Ok(SelectionScope::Row),
            "file" => Ok(SelectionScope::File),
            _ => Err(CardLiveError::InvalidSelectionScope(value.to_string())),
        }
    }
}
