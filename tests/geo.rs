use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use cardlive_data::error::CardLiveError;
use cardlive_data::geo::RegionCodes;

const UNSD_OVERVIEW: &str = "\
Global Code,Global Name,Region Code,Region Name,Sub-region Code,Sub-region Name,Intermediate Region Code,Intermediate Region Name,Country or Area,M49 Code,ISO-alpha3 Code
1,World,2,Africa,15,Northern Africa,,,Algeria,12,DZA
1,World,2,Africa,15,Northern Africa,,,Egypt,818,EGY
1,World,,,,,,,Antarctica,10,ATA
1,World,142,Asia,30,Eastern Asia,,,Japan,392,JPN
";

fn codes() -> RegionCodes {
    RegionCodes::from_reader(UNSD_OVERVIEW.as_bytes(), true).unwrap()
}

#[test]
fn unsd_overview_names_every_level() {
    let codes = codes();
    assert_eq!(codes.standard_name(1), Some("World"));
    assert_eq!(codes.standard_name(2), Some("Africa"));
    assert_eq!(codes.standard_name(15), Some("Northern Africa"));
    assert_eq!(codes.standard_name(12), Some("Algeria"));
    assert_eq!(codes.standard_name(10), Some("Antarctica"));
    assert_eq!(codes.standard_name(30), Some("Eastern Asia"));
    assert_eq!(codes.len(), 9);
}

#[test]
fn unknown_codes_use_fallbacks() {
    let codes = codes();
    assert_eq!(
        codes.resolve(Some(223)).as_deref(),
        Some("Eastern Asia (excluding Japan and China)")
    );
    assert_eq!(codes.resolve(Some(0)).as_deref(), Some("Multiple regions"));
    assert_eq!(codes.resolve(Some(-10)).as_deref(), Some("N/A"));
    assert_eq!(codes.resolve(Some(999)).as_deref(), Some("N/A [code=999]"));
    assert_eq!(codes.resolve(None).as_deref(), Some("N/A"));
}

#[test]
fn custom_fallback_runs_after_standard_names() {
    let mut codes = RegionCodes::from_reader(UNSD_OVERVIEW.as_bytes(), false).unwrap();
    assert_eq!(codes.resolve(Some(999)), None);
    codes.insert_fallback(|code| (code > 900).then(|| "Reserved".to_string()));
    assert_eq!(codes.resolve(Some(999)).as_deref(), Some("Reserved"));
    assert_eq!(codes.resolve(Some(12)).as_deref(), Some("Algeria"));
}

#[test]
fn csv_file_is_read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("unsd.csv")).unwrap();
    fs::write(&path, UNSD_OVERVIEW).unwrap();
    let codes = RegionCodes::from_unsd_csv(&path, true).unwrap();
    assert_eq!(codes.resolve(Some(818)).as_deref(), Some("Egypt"));
}

#[test]
fn missing_columns_are_rejected() {
    let csv = "Global Code,Global Name\n1,World\n";
    assert_matches!(
        RegionCodes::from_reader(csv.as_bytes(), true),
        Err(CardLiveError::RegionCodes(_))
    );
}
