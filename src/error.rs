use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CardLiveError {
    #[error("invalid sample key: {0:?}")]
    InvalidSampleKey(String),

    #[error("record {key} is not a proper CARD:Live record: {reason}")]
    MalformedRecord { key: String, reason: String },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unknown selection kind: {0} (expected one of cutoff, drug, amr_gene, amr_gene_family, resistance_mechanism)")]
    InvalidSelectionKind(String),

    #[error("unknown selection scope: {0} (expected row or file)")]
    InvalidSelectionScope(String),

    #[error("unknown selection table: {0} (expected main or rgi)")]
    InvalidSelectionTable(String),

    #[error("unknown cutoff level: {0} (expected loose, strict, perfect or all)")]
    InvalidCutoffLevel(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("table {table} is missing {} requested sample(s): {}", .missing.len(), .missing.join(", "))]
    #[diagnostic(help("every table of a snapshot must cover the same samples; this is a loader or modifier bug"))]
    KeyConsistencyViolation { table: String, missing: Vec<String> },

    #[error("refresh failed: {0}")]
    RefreshFailure(String),

    #[error("data directory does not exist: {0}")]
    MissingDataDirectory(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("failed to load region codes: {0}")]
    RegionCodes(String),

    #[error("failed to load taxonomy database: {0}")]
    Taxonomy(String),
}
