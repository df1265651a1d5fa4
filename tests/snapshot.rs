use std::collections::BTreeSet;
use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, NaiveDate, Utc};

use cardlive_data::domain::{CutoffTier, SampleKey, SelectionScope, TaxonomyMethod};
use cardlive_data::error::CardLiveError;
use cardlive_data::geo::RegionCodes;
use cardlive_data::modifiers::{GeographicNamesModifier, HistoricalRegionModifier, SnapshotModifier};
use cardlive_data::record::parse_timestamp;
use cardlive_data::rgi::{RgiColumn, RgiParser, RgiRow};
use cardlive_data::selection::{RgiSelection, Selection};
use cardlive_data::snapshot::{Snapshot, ValueCount};
use cardlive_data::table::{MainRow, MainTable, ToolRow, ToolTable};

fn key(value: &str) -> SampleKey {
    value.parse().unwrap()
}

fn keys(values: &[&str]) -> BTreeSet<SampleKey> {
    values.iter().map(|value| key(value)).collect()
}

fn ts(value: &str) -> DateTime<Utc> {
    parse_timestamp(value).unwrap()
}

fn main_row(sample: &str, timestamp: &str, geo: i64, lmat: &str, rgi_kmer: &str) -> MainRow {
    let mut row = MainRow::new(key(sample), ts(timestamp));
    row.geo_area_code = Some(geo);
    row.lmat_taxonomy = Some(lmat.to_string());
    row.rgi_kmer_taxonomy = Some(rgi_kmer.to_string());
    row
}

fn rgi_row(sample: &str, cutoff: &str, drugs: &str, gene: &str) -> RgiRow {
    RgiRow::new(key(sample))
        .with(RgiColumn::CutOff, cutoff)
        .with(RgiColumn::DrugClass, drugs)
        .with(RgiColumn::BestHitAro, gene)
}

fn scenario() -> Snapshot {
    let samples = keys(&["file1", "file2", "file3"]);
    let main = MainTable::new(
        "main",
        samples.clone(),
        vec![
            main_row("file1", "2020-08-05 16:27:32", 10, "Salmonella enterica", "Enterobacteriaceae"),
            main_row("file2", "2020-08-06 16:27:32", 10, "Enterobacteriaceae", "Salmonella enterica"),
            main_row("file3", "2020-08-07 16:27:32", 1, "Salmonella enterica", "Enterobacteriaceae"),
        ],
    )
    .unwrap();
    let rgi = RgiParser::from_rows(
        samples.clone(),
        vec![
            rgi_row("file1", "Perfect", "class1; class2", "gene1"),
            rgi_row("file1", "Strict", "class1; class2; class3", "gene2"),
            rgi_row("file2", "Perfect", "class1; class2; class4", "gene1"),
        ],
    )
    .unwrap();
    let mlst = ToolTable::new(
        "mlst",
        samples.clone(),
        vec![
            ToolRow::new(key("file1")).with("mlst.scheme", "senterica"),
            ToolRow::new(key("file2")).with("mlst.scheme", "senterica"),
        ],
    )
    .unwrap();
    let empty = |name| ToolTable::new(name, samples.clone(), Vec::new()).unwrap();
    Snapshot::new(main, rgi, empty("rgi_kmer"), empty("lmat"), mlst).unwrap()
}

fn assert_consistent(snapshot: &Snapshot) {
    let files = snapshot.files();
    assert_eq!(snapshot.main().rows().len(), files.len());
    assert_eq!(snapshot.rgi_kmer().samples(), files);
    assert_eq!(snapshot.lmat().samples(), files);
    assert_eq!(snapshot.mlst().samples(), files);
    assert!(snapshot.rgi_parser().files().is_subset(files));
}

fn perfect() -> Selection {
    Selection::Rgi(RgiSelection::cutoff(SelectionScope::Row, Some(CutoffTier::Perfect)))
}

fn drugs(scope: SelectionScope, values: &[&str]) -> Selection {
    Selection::Rgi(RgiSelection::drug_classes(scope, values))
}

#[test]
fn cutoff_perfect_keeps_matching_rows() {
    let subset = scenario().select(&perfect()).unwrap();
    assert_eq!(subset.files(), &keys(&["file1", "file2"]));
    assert_eq!(subset.rgi_parser().rows().len(), 2);
    assert_eq!(
        subset.rgi_parser().all_drugs(),
        ["class1", "class2", "class4"].iter().map(|v| v.to_string()).collect::<BTreeSet<_>>()
    );
    assert_consistent(&subset);
}

#[test]
fn cutoff_file_scope_keeps_all_rows_of_matched_samples() {
    let selection = Selection::Rgi(RgiSelection::cutoff(SelectionScope::File, Some(CutoffTier::Strict)));
    let subset = scenario().select(&selection).unwrap();
    assert_eq!(subset.files(), &keys(&["file1"]));
    assert_eq!(subset.rgi_parser().rows().len(), 2);
}

#[test]
fn drug_filter_requires_every_class() {
    let snapshot = scenario();
    let subset = snapshot
        .select(&drugs(SelectionScope::File, &["class1", "class2", "class4"]))
        .unwrap();
    assert_eq!(subset.files(), &keys(&["file2"]));

    let shared = snapshot.select(&drugs(SelectionScope::File, &["class1", "class2"])).unwrap();
    assert_eq!(shared.files(), &keys(&["file1", "file2"]));
    assert_consistent(&shared);
}

#[test]
fn amr_gene_filter_unions_rows_per_sample() {
    let selection = Selection::Rgi(RgiSelection::amr_genes(SelectionScope::File, ["gene1", "gene2"]));
    let subset = scenario().select(&selection).unwrap();
    assert_eq!(subset.files(), &keys(&["file1"]));
}

#[test]
fn time_range_is_inclusive() {
    let snapshot = scenario();
    let subset = snapshot
        .select(&Selection::time(ts("2020-08-05"), ts("2020-08-06")))
        .unwrap();
    assert_eq!(subset.files(), &keys(&["file1"]));

    let exact = snapshot
        .select(&Selection::time(ts("2020-08-05 16:27:32"), ts("2020-08-06 16:27:32")))
        .unwrap();
    assert_eq!(exact.files(), &keys(&["file1", "file2"]));
}

#[test]
fn taxonomy_filters_match_labels_exactly() {
    let snapshot = scenario();
    let rgi_kmer = snapshot
        .select(&Selection::taxonomy(TaxonomyMethod::RgiKmer, Some("Salmonella enterica")))
        .unwrap();
    assert_eq!(rgi_kmer.files(), &keys(&["file2"]));

    let lmat = snapshot
        .select(&Selection::taxonomy(TaxonomyMethod::Lmat, Some("Salmonella enterica")))
        .unwrap();
    assert_eq!(lmat.files(), &keys(&["file1", "file3"]));
    assert_consistent(&lmat);
}

#[test]
fn no_op_selections_keep_everything() {
    let snapshot = scenario();
    let noops = [
        Selection::Rgi(RgiSelection::cutoff(SelectionScope::Row, None)),
        drugs(SelectionScope::File, &[]),
        Selection::Rgi(RgiSelection::amr_gene_families(SelectionScope::Row, [" "])),
        Selection::taxonomy(TaxonomyMethod::Lmat, None),
        Selection::taxonomy(TaxonomyMethod::RgiKmer, Some("")),
    ];
    for selection in &noops {
        let subset = snapshot.select(selection).unwrap();
        assert_eq!(subset.files(), snapshot.files());
        assert!(subset.rgi_parser().same_as(snapshot.rgi_parser()));
    }
}

#[test]
fn file_scoped_selections_commute() {
    let snapshot = scenario();
    let drug = drugs(SelectionScope::File, &["class1"]);
    let time = Selection::time(ts("2020-08-05"), ts("2020-08-06"));

    let drug_then_time = snapshot.select(&drug).unwrap().select(&time).unwrap();
    let time_then_drug = snapshot.select(&time).unwrap().select(&drug).unwrap();
    assert_eq!(drug_then_time.files(), time_then_drug.files());
    assert_eq!(drug_then_time.files(), &keys(&["file1"]));
}

#[test]
fn row_scoped_cutoff_narrows_later_filters() {
    let snapshot = scenario();
    let strict_only = drugs(SelectionScope::File, &["class3"]);
    let subset = snapshot.select(&perfect()).unwrap().select(&strict_only).unwrap();
    assert!(subset.is_empty());

    let subset = snapshot.select(&strict_only).unwrap().select(&perfect()).unwrap();
    assert_eq!(subset.files(), &keys(&["file1"]));
}

#[test]
fn unique_values_and_value_counts() {
    let snapshot = scenario();
    let geo = snapshot.unique_values("geo_area_code").unwrap();
    assert_eq!(geo, ["1", "10"].iter().map(|v| v.to_string()).collect::<BTreeSet<_>>());

    let counts = snapshot.value_counts(&["geo_area_code"], None).unwrap();
    assert_eq!(
        counts,
        vec![
            ValueCount { values: vec!["10".to_string()], count: 2 },
            ValueCount { values: vec!["1".to_string()], count: 1 },
        ]
    );
}

#[test]
fn value_counts_joins_per_sample_table_and_drops_missing() {
    let snapshot = scenario();
    let counts = snapshot
        .value_counts(&["geo_area_code", "mlst.scheme"], Some(snapshot.mlst().rows()))
        .unwrap();
    assert_eq!(
        counts,
        vec![ValueCount {
            values: vec!["10".to_string(), "senterica".to_string()],
            count: 2,
        }]
    );
}

#[test]
fn unknown_columns_are_rejected() {
    let snapshot = scenario();
    assert_matches!(
        snapshot.unique_values("continent"),
        Err(CardLiveError::UnknownColumn(column)) if column == "continent"
    );
    assert_matches!(
        snapshot.value_counts(&["mlst.scheme"], None),
        Err(CardLiveError::UnknownColumn(_))
    );
}

#[test]
fn select_by_files_rejects_unknown_samples() {
    let err = scenario().select_by_files(&keys(&["file1", "file9"])).unwrap_err();
    assert_matches!(err, CardLiveError::KeyConsistencyViolation { ref missing, .. } if missing == &vec!["file9".to_string()]);
}

#[test]
fn select_by_files_keeps_samples_without_hits() {
    let subset = scenario().select_by_files(&keys(&["file2", "file3"])).unwrap();
    assert_eq!(subset.samples_count(), 2);
    assert_eq!(subset.rgi_parser().files(), &keys(&["file2", "file3"]));
    assert_eq!(subset.rgi_parser().count_samples(), 1);
    assert_consistent(&subset);
}

#[test]
fn inconsistent_tables_are_rejected() {
    let samples = keys(&["file1", "file2"]);
    let main = MainTable::new(
        "main",
        samples.clone(),
        vec![
            MainRow::new(key("file1"), ts("2020-08-05")),
            MainRow::new(key("file2"), ts("2020-08-06")),
        ],
    )
    .unwrap();
    let rgi = RgiParser::from_rows(samples.clone(), Vec::new()).unwrap();
    let table = |name, samples| ToolTable::new(name, samples, Vec::new()).unwrap();
    let err = Snapshot::new(
        main,
        rgi,
        table("rgi_kmer", samples.clone()),
        table("lmat", keys(&["file1"])),
        table("mlst", samples.clone()),
    )
    .unwrap_err();
    assert_matches!(err, CardLiveError::KeyConsistencyViolation { ref table, .. } if table == "lmat");
}

#[test]
fn empty_snapshot_tolerates_every_selection() {
    let empty = Snapshot::empty();
    let selections = [
        perfect(),
        drugs(SelectionScope::Row, &["class1"]),
        Selection::time(ts("2020-01-01"), ts("2021-01-01")),
        Selection::taxonomy(TaxonomyMethod::Lmat, Some("Salmonella enterica")),
    ];
    for selection in &selections {
        let subset = empty.select(selection).unwrap();
        assert!(subset.is_empty());
        assert!(subset.rgi_parser().same_as(empty.rgi_parser()));
        assert_eq!(subset.samples_count(), 0);
    }
    assert_eq!(empty.latest_update(), None);
    assert!(empty.rgi_parser().all_drugs().is_empty());
    assert!(empty.value_counts(&["geo_area_code"], None).unwrap().is_empty());
}

#[test]
fn latest_update_is_newest_timestamp() {
    assert_eq!(scenario().latest_update(), Some(ts("2020-08-07 16:27:32")));
}

#[test]
fn historical_region_correction_then_names() {
    let cutoff = NaiveDate::from_ymd_opt(2020, 8, 6).unwrap();
    let corrected = HistoricalRegionModifier::from_date(cutoff)
        .modify(&scenario())
        .unwrap();
    let codes = corrected
        .main()
        .rows()
        .iter()
        .map(|row| (row.sample.to_string(), row.geo_area_code))
        .collect::<Vec<_>>();
    assert_eq!(
        codes,
        vec![
            ("file1".to_string(), Some(-10)),
            ("file2".to_string(), Some(10)),
            ("file3".to_string(), Some(1)),
        ]
    );

    let named = GeographicNamesModifier::new(Arc::new(RegionCodes::default()))
        .modify(&corrected)
        .unwrap();
    let names = named
        .main()
        .rows()
        .iter()
        .map(|row| row.geo_area_name_standard.clone().unwrap_or_default())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["N/A", "Antarctica", "World"]);
    assert!(named.rgi_parser().same_as(corrected.rgi_parser()));
}
