use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;

use camino::Utf8Path;
use csv::{ReaderBuilder, StringRecord};

use crate::error::CardLiveError;

/// Maps a code without a standard name to a display name, or passes with `None`.
pub type NameFallback = Box<dyn Fn(i64) -> Option<String> + Send + Sync>;

pub const MISSING_REGION_NAME: &str = "N/A";

/// UN M49 region names; code 10 (Antarctica) is the only country-level entry.
const BUILTIN_M49: &[(i64, &str)] = &[
    (1, "World"),
    (2, "Africa"),
    (5, "South America"),
    (9, "Oceania"),
    (10, "Antarctica"),
    (11, "Western Africa"),
    (13, "Central America"),
    (14, "Eastern Africa"),
    (15, "Northern Africa"),
    (17, "Middle Africa"),
    (18, "Southern Africa"),
    (19, "Americas"),
    (21, "Northern America"),
    (29, "Caribbean"),
    (30, "Eastern Asia"),
    (34, "Southern Asia"),
    (35, "South-eastern Asia"),
    (39, "Southern Europe"),
    (53, "Australia and New Zealand"),
    (54, "Melanesia"),
    (57, "Micronesia"),
    (61, "Polynesia"),
    (142, "Asia"),
    (143, "Central Asia"),
    (145, "Western Asia"),
    (150, "Europe"),
    (151, "Eastern Europe"),
    (154, "Northern Europe"),
    (155, "Western Europe"),
    (202, "Sub-Saharan Africa"),
    (419, "Latin America and the Caribbean"),
    (830, "Channel Islands"),
];

/// Code and name column pairs of the UNSD M49 overview, most general first.
const UNSD_LEVELS: [(&str, &str); 5] = [
    ("Global Code", "Global Name"),
    ("Region Code", "Region Name"),
    ("Sub-region Code", "Sub-region Name"),
    ("Intermediate Region Code", "Intermediate Region Name"),
    ("M49 Code", "Country or Area"),
];

pub struct RegionCodes {
    names: BTreeMap<i64, String>,
    fallbacks: Vec<NameFallback>,
    missing_name: Option<String>,
}

impl RegionCodes {
    pub fn builtin(use_default_fallbacks: bool) -> Self {
        let names = BUILTIN_M49
            .iter()
            .map(|(code, name)| (*code, (*name).to_string()))
            .collect();
        Self::with_names(names, use_default_fallbacks)
    }

    pub fn from_unsd_csv(path: &Utf8Path, use_default_fallbacks: bool) -> Result<Self, CardLiveError> {
        let file = File::open(path).map_err(|err| CardLiveError::RegionCodes(format!("{path}: {err}")))?;
        Self::from_reader(file, use_default_fallbacks)
    }

    /// Reads a UNSD "overview" CSV. When a code appears at several levels the first
    /// name seen wins.
    pub fn from_reader<R: Read>(reader: R, use_default_fallbacks: bool) -> Result<Self, CardLiveError> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = rdr
            .headers()
            .map_err(|err| CardLiveError::RegionCodes(err.to_string()))?
            .clone();

        let mut columns = Vec::with_capacity(UNSD_LEVELS.len());
        for (code_column, name_column) in UNSD_LEVELS {
            let code = column_index(&headers, code_column)?;
            let name = column_index(&headers, name_column)?;
            columns.push((code, name));
        }

        let mut names = BTreeMap::new();
        for record in rdr.records() {
            let record = record.map_err(|err| CardLiveError::RegionCodes(err.to_string()))?;
            for (code, name) in &columns {
                let (Some(code), Some(name)) = (record.get(*code), record.get(*name)) else {
                    continue;
                };
                let (Ok(code), name) = (code.trim().parse::<i64>(), name.trim()) else {
                    continue;
                };
                if !name.is_empty() {
                    names.entry(code).or_insert_with(|| name.to_string());
                }
            }
        }
        if names.is_empty() {
            return Err(CardLiveError::RegionCodes("no region codes found".to_string()));
        }
        Ok(Self::with_names(names, use_default_fallbacks))
    }

    fn with_names(names: BTreeMap<i64, String>, use_default_fallbacks: bool) -> Self {
        let mut codes = Self {
            names,
            fallbacks: Vec::new(),
            missing_name: None,
        };
        if use_default_fallbacks {
            codes.missing_name = Some(MISSING_REGION_NAME.to_string());
            codes.insert_fallback(|code| (code == 0).then(|| "Multiple regions".to_string()));
            codes.insert_fallback(|code| (code < 0).then(|| MISSING_REGION_NAME.to_string()));
            codes.insert_fallback(|code| {
                (code == 223).then(|| "Eastern Asia (excluding Japan and China)".to_string())
            });
            codes.insert_fallback(|code| Some(format!("{MISSING_REGION_NAME} [code={code}]")));
        }
        codes
    }

    /// Appends a fallback; fallbacks run in insertion order for codes without a
    /// standard name and the first answer wins.
    pub fn insert_fallback(&mut self, fallback: impl Fn(i64) -> Option<String> + Send + Sync + 'static) {
        self.fallbacks.push(Box::new(fallback));
    }

    pub fn standard_name(&self, code: i64) -> Option<&str> {
        self.names.get(&code).map(String::as_str)
    }

    pub fn resolve(&self, code: Option<i64>) -> Option<String> {
        let Some(code) = code else {
            return self.missing_name.clone();
        };
        if let Some(name) = self.standard_name(code) {
            return Some(name.to_string());
        }
        self.fallbacks.iter().find_map(|fallback| fallback(code))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for RegionCodes {
    fn default() -> Self {
        Self::builtin(true)
    }
}

impl fmt::Debug for RegionCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionCodes")
            .field("names", &self.names.len())
            .field("fallbacks", &self.fallbacks.len())
            .finish()
    }
}

fn column_index(headers: &StringRecord, column: &str) -> Result<usize, CardLiveError> {
    headers
        .iter()
        .position(|header| header.trim() == column)
        .ok_or_else(|| CardLiveError::RegionCodes(format!("missing column '{column}'")))
}
