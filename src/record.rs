use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::domain::{SampleKey, Tool};
use crate::error::CardLiveError;
use crate::table::{MainRow, ToolRow, normalize_cell};

const TIMESTAMP_FIELD: &str = "timestamp";
const GEO_FIELD: &str = "geo_area_code";

/// One raw record split into its main-table row and one row list per tool.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    pub main: MainRow,
    pub sections: BTreeMap<Tool, Vec<ToolRow>>,
}

impl ParsedRecord {
    pub fn rows(&self, tool: Tool) -> &[ToolRow] {
        self.sections.get(&tool).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub fn parse_record(key: &SampleKey, content: &[u8]) -> Result<ParsedRecord, CardLiveError> {
    let malformed = |reason: String| CardLiveError::MalformedRecord {
        key: key.to_string(),
        reason,
    };

    let value: Value = serde_json::from_slice(content).map_err(|err| malformed(err.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| malformed("top level is not a JSON object".to_string()))?;

    let timestamp = object
        .get(TIMESTAMP_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing timestamp".to_string()))
        .and_then(|raw| parse_timestamp(raw).map_err(|err| malformed(err.to_string())))?;

    let mut sections = BTreeMap::new();
    for tool in Tool::ALL {
        let entries = object
            .get(tool.section())
            .ok_or_else(|| malformed(format!("missing section {tool}")))?
            .as_array()
            .ok_or_else(|| malformed(format!("section {tool} is not a list")))?;
        let rows = entries
            .iter()
            .map(|entry| {
                entry
                    .as_object()
                    .map(|fields| flatten_entry(key, tool, fields))
                    .ok_or_else(|| malformed(format!("section {tool} holds a non-object entry")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        sections.insert(tool, rows);
    }

    let mut main = MainRow::new(key.clone(), timestamp);
    main.geo_area_code = object.get(GEO_FIELD).and_then(geo_code);
    main.analysis_valid = analysis_valid_label(&sections);
    main.attributes = object
        .iter()
        .filter(|(name, _)| !is_reserved_field(name))
        .filter_map(|(name, value)| scalar_text(value, None).map(|text| (name.clone(), text)))
        .collect();

    Ok(ParsedRecord { main, sections })
}

/// Accepts RFC 3339 as well as the naive `YYYY-MM-DD HH:MM:SS[.ffffff]` form
/// written by the submission service, which is read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CardLiveError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|parsed| parsed.and_utc())
        .ok_or_else(|| CardLiveError::InvalidTimestamp(raw.to_string()))
}

/// Tools with at least one result, joined in `Tool::ALL` order.
pub fn analysis_valid_label(sections: &BTreeMap<Tool, Vec<ToolRow>>) -> String {
    let present = Tool::ALL
        .iter()
        .filter(|tool| sections.get(*tool).is_some_and(|rows| !rows.is_empty()))
        .map(|tool| tool.section())
        .collect::<Vec<_>>();
    if present.is_empty() {
        "None".to_string()
    } else if present.len() == Tool::ALL.len() {
        "all".to_string()
    } else {
        present.join(" and ")
    }
}

fn flatten_entry(key: &SampleKey, tool: Tool, fields: &Map<String, Value>) -> ToolRow {
    let fields = fields
        .iter()
        .filter_map(|(name, value)| {
            scalar_text(value, Some(tool.sentinel())).map(|text| (tool.column(name), text))
        })
        .collect();
    ToolRow {
        sample: key.clone(),
        fields,
    }
}

fn scalar_text(value: &Value, sentinel: Option<&str>) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => normalize_cell(text, sentinel),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(items) if items.is_empty() => None,
        Value::Object(items) if items.is_empty() => None,
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn geo_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|code| code as i64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn is_reserved_field(name: &str) -> bool {
    name == TIMESTAMP_FIELD
        || name == GEO_FIELD
        || name == "filename"
        || Tool::ALL.iter().any(|tool| tool.section() == name)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Datelike, Timelike};

    use super::*;

    fn key() -> SampleKey {
        "file1".parse().unwrap()
    }

    const RECORD: &str = r#"{
        "timestamp": "2020-08-05 16:27:32.996157",
        "geo_area_code": 10,
        "version": "1.0",
        "rgi_main": [{"Cut_Off": "Perfect", "Drug Class": "macrolide antibiotic; cephalosporin", "SNPs_in_Best_Hit_ARO": "n/a"}],
        "rgi_kmer": [{"CARD*kmer Prediction": "Salmonella enterica (chromosome)"}],
        "mlst": [{"scheme": "senterica", "sequence_type": "-"}],
        "lmat": []
    }"#;

    #[test]
    fn parse_flattens_sections_with_prefixes() {
        let record = parse_record(&key(), RECORD.as_bytes()).unwrap();
        let rgi = record.rows(Tool::RgiMain);
        assert_eq!(rgi.len(), 1);
        assert_eq!(rgi[0].get("rgi_main.Cut_Off"), Some("Perfect"));
        assert_eq!(rgi[0].get("rgi_main.SNPs_in_Best_Hit_ARO"), None);
        assert_eq!(record.rows(Tool::Mlst)[0].get("mlst.scheme"), Some("senterica"));
        assert_eq!(record.rows(Tool::Mlst)[0].get("mlst.sequence_type"), None);
        assert!(record.rows(Tool::Lmat).is_empty());
    }

    #[test]
    fn parse_fills_main_row() {
        let record = parse_record(&key(), RECORD.as_bytes()).unwrap();
        assert_eq!(record.main.geo_area_code, Some(10));
        assert_eq!(record.main.timestamp.day(), 5);
        assert_eq!(record.main.timestamp.hour(), 16);
        assert_eq!(record.main.analysis_valid, "rgi_main and rgi_kmer and mlst");
        assert_eq!(record.main.attributes.get("version").map(String::as_str), Some("1.0"));
    }

    #[test]
    fn parse_rejects_missing_section() {
        let content = r#"{"timestamp": "2020-08-05 16:27:32", "rgi_main": [], "rgi_kmer": [], "mlst": []}"#;
        let err = parse_record(&key(), content.as_bytes()).unwrap_err();
        assert_matches!(err, CardLiveError::MalformedRecord { ref reason, .. } if reason.contains("lmat"));
    }

    #[test]
    fn parse_rejects_bad_json_and_timestamp() {
        assert_matches!(
            parse_record(&key(), b"{not json"),
            Err(CardLiveError::MalformedRecord { .. })
        );
        let content = r#"{"timestamp": "yesterday", "rgi_main": [], "rgi_kmer": [], "mlst": [], "lmat": []}"#;
        assert_matches!(
            parse_record(&key(), content.as_bytes()),
            Err(CardLiveError::MalformedRecord { .. })
        );
    }

    #[test]
    fn completeness_label_edges() {
        let mut sections = BTreeMap::new();
        assert_eq!(analysis_valid_label(&sections), "None");
        for tool in Tool::ALL {
            sections.insert(tool, vec![ToolRow::new(key())]);
        }
        assert_eq!(analysis_valid_label(&sections), "all");
        sections.insert(Tool::RgiKmer, Vec::new());
        assert_eq!(analysis_valid_label(&sections), "rgi_main and mlst and lmat");
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2020-08-05T16:27:32Z").is_ok());
        assert!(parse_timestamp("2020-08-05 16:27:32").is_ok());
        assert!(parse_timestamp("2020-08-05").is_ok());
        assert_matches!(parse_timestamp("08/05/2020"), Err(CardLiveError::InvalidTimestamp(_)));
    }
}
