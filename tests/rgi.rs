use std::collections::BTreeSet;

use assert_matches::assert_matches;

use cardlive_data::domain::{CutoffTier, SampleKey, SelectionScope};
use cardlive_data::error::CardLiveError;
use cardlive_data::rgi::{DEFAULT_SEPARATOR, RgiColumn, RgiParser, RgiRow};
use cardlive_data::selection::RgiSelection;

fn key(value: &str) -> SampleKey {
    value.parse().unwrap()
}

fn keys(values: &[&str]) -> BTreeSet<SampleKey> {
    values.iter().map(|value| key(value)).collect()
}

fn row(sample: &str, cutoff: &str, drugs: &str, family: &str, aro: &str) -> RgiRow {
    RgiRow::new(key(sample))
        .with(RgiColumn::CutOff, cutoff)
        .with(RgiColumn::DrugClass, drugs)
        .with(RgiColumn::AmrGeneFamily, family)
        .with(RgiColumn::ResistanceMechanism, "antibiotic efflux")
        .with(RgiColumn::BestHitAro, aro)
}

fn parser() -> RgiParser {
    RgiParser::from_rows(
        keys(&["file1", "file2", "file3"]),
        vec![
            row("file1", "Perfect", "class1; class2", "family1", "gene1"),
            row("file1", "Strict", "class1; class2; class3", "family2", "gene2"),
            row("file2", "Perfect", "class1; class2; class4", "family1", "gene1"),
        ],
    )
    .unwrap()
}

#[test]
fn samples_without_hits_are_tracked_but_not_counted() {
    let parser = parser();
    assert_eq!(parser.files(), &keys(&["file1", "file2", "file3"]));
    assert_eq!(parser.count_samples(), 2);
}

#[test]
fn explode_splits_and_trims_values() {
    let exploded = parser().explode_column(RgiColumn::DrugClass.name(), DEFAULT_SEPARATOR);
    assert_eq!(exploded.len(), 8);
    assert_eq!(exploded[0], (key("file1"), "class1".to_string()));
    assert_eq!(exploded[1], (key("file1"), "class2".to_string()));
}

#[test]
fn all_values_are_distinct() {
    let parser = parser();
    let strings = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<BTreeSet<_>>();
    assert_eq!(parser.all_drugs(), strings(&["class1", "class2", "class3", "class4"]));
    assert_eq!(parser.all_amr_gene_families(), strings(&["family1", "family2"]));
    assert_eq!(parser.all_resistance_mechanisms(), strings(&["antibiotic efflux"]));
    assert_eq!(parser.all_amr_genes(), strings(&["gene1", "gene2"]));
}

#[test]
fn cutoff_scopes_differ_in_kept_rows() {
    let parser = parser();
    let rows = parser.select(&RgiSelection::cutoff(SelectionScope::Row, Some(CutoffTier::Strict)));
    assert_eq!(rows.rows().len(), 1);
    assert_eq!(rows.files(), &keys(&["file1"]));

    let files = parser.select(&RgiSelection::cutoff(SelectionScope::File, Some(CutoffTier::Strict)));
    assert_eq!(files.rows().len(), 2);
    assert_eq!(files.files(), &keys(&["file1"]));

    let none = parser.select(&RgiSelection::cutoff(SelectionScope::Row, Some(CutoffTier::Loose)));
    assert!(none.is_empty());
    assert!(none.files().is_empty());
}

#[test]
fn gene_family_filter_requires_every_family() {
    let selection = RgiSelection::amr_gene_families(SelectionScope::File, ["family1", "family2"]);
    let subset = parser().select(&selection);
    assert_eq!(subset.files(), &keys(&["file1"]));
    assert_eq!(subset.rows().len(), 2);
}

#[test]
fn noop_selection_shares_table() {
    let parser = parser();
    let same = parser.select(&RgiSelection::drug_classes(SelectionScope::File, Vec::<String>::new()));
    assert!(same.same_as(&parser));
    let same = parser.select_by_files(&keys(&["file1", "file2", "file3"])).unwrap();
    assert!(same.same_as(&parser));
}

#[test]
fn select_by_files_keeps_requested_samples() {
    let subset = parser().select_by_files(&keys(&["file2", "file3"])).unwrap();
    assert_eq!(subset.files(), &keys(&["file2", "file3"]));
    assert_eq!(subset.rows().len(), 1);
    assert_eq!(subset.count_samples(), 1);

    assert_matches!(
        parser().select_by_files(&keys(&["file9"])),
        Err(CardLiveError::KeyConsistencyViolation { .. })
    );
}

#[test]
fn each_element_filter_reads_its_own_column() {
    let parser = parser();
    let gene = parser.select(&RgiSelection::amr_genes(SelectionScope::Row, ["gene2"]));
    assert_eq!(gene.files(), &keys(&["file1"]));
    assert_eq!(gene.rows().len(), 1);

    let mechanism = parser.select(&RgiSelection::resistance_mechanisms(
        SelectionScope::File,
        ["antibiotic efflux"],
    ));
    assert_eq!(mechanism.files(), &keys(&["file1", "file2"]));

    let drug_as_gene = parser.select(&RgiSelection::amr_genes(SelectionScope::File, ["class1"]));
    assert!(drug_as_gene.files().is_empty());
    let family_as_drug = parser.select(&RgiSelection::drug_classes(SelectionScope::File, ["family1"]));
    assert!(family_as_drug.files().is_empty());
}
