use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CardLiveError;
use crate::snapshot::{Snapshot, ValueCount};

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub samples: usize,
    pub latest_update: Option<DateTime<Utc>>,
    pub samples_with_resistance_hits: usize,
    pub drug_classes: usize,
    pub amr_gene_families: usize,
    pub analysis_valid: Vec<ValueCount>,
    pub regions: Vec<ValueCount>,
    pub lmat_taxonomy: Vec<ValueCount>,
    pub rgi_kmer_taxonomy: Vec<ValueCount>,
}

impl SnapshotSummary {
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, CardLiveError> {
        let rgi = snapshot.rgi_parser();
        Ok(Self {
            samples: snapshot.samples_count(),
            latest_update: snapshot.latest_update(),
            samples_with_resistance_hits: rgi.count_samples(),
            drug_classes: rgi.all_drugs().len(),
            amr_gene_families: rgi.all_amr_gene_families().len(),
            analysis_valid: snapshot.value_counts(&["analysis_valid"], None)?,
            regions: snapshot.value_counts(&["geo_area_name_standard"], None)?,
            lmat_taxonomy: snapshot.value_counts(&["lmat_taxonomy"], None)?,
            rgi_kmer_taxonomy: snapshot.value_counts(&["rgi_kmer_taxonomy"], None)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub path: String,
    pub records: usize,
    /// Entry names read back from the written archive.
    pub entries: Vec<String>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &SnapshotSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_export(result: &ExportResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
