//! Loading record collections from JSON, JSON-lines and GeoJSON.

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use geojson::GeoJson;
use serde_json::Value as JsonValue;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::filter::FieldAccess;

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum InputFormat {
    /// A JSON array of records (or a single object)
    #[value(name = "json")]
    Json,
    /// One JSON record per line
    #[value(name = "jsonl", alias = "geojsonl")]
    Jsonl,
    /// A GeoJSON FeatureCollection or Feature
    #[value(name = "geojson")]
    GeoJson,
}

impl InputFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext.to_lowercase().as_str() {
            "json" => Some(InputFormat::Json),
            "jsonl" | "ndjson" | "geojsonl" => Some(InputFormat::Jsonl),
            "geojson" => Some(InputFormat::GeoJson),
            _ => None,
        }
    }

    /// Where this format usually keeps attribute fields.
    pub fn default_access(self) -> FieldAccess {
        match self {
            InputFormat::GeoJson => FieldAccess::Properties,
            InputFormat::Json | InputFormat::Jsonl => FieldAccess::Flat,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            InputFormat::Json => "json",
            InputFormat::Jsonl => "jsonl",
            InputFormat::GeoJson => "geojson",
        }
    }
}

/// Load records from a file, or stdin for `-`.
pub fn load_records(path: &Path, format: InputFormat) -> Result<Vec<JsonValue>> {
    if path == Path::new("-") {
        return read_records(std::io::stdin().lock(), format);
    }

    let file =
        File::open(path).with_context(|| format!("Input: Failed to open {:?}", path))?;
    read_records(BufReader::new(file), format)
        .with_context(|| format!("Input: Failed to read {:?}", path))
}

pub fn read_records<R: BufRead>(reader: R, format: InputFormat) -> Result<Vec<JsonValue>> {
    match format {
        InputFormat::Json => match serde_json::from_reader::<_, JsonValue>(reader)? {
            JsonValue::Array(items) => Ok(items),
            value @ JsonValue::Object(_) => Ok(vec![value]),
            other => bail!("Input: expected a JSON array or object, got {}", other),
        },
        InputFormat::Jsonl => {
            let mut records = Vec::new();
            for (i, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: JsonValue = serde_json::from_str(&line)
                    .with_context(|| format!("Input: Invalid JSON on line {}", i + 1))?;
                records.push(record);
            }
            Ok(records)
        }
        InputFormat::GeoJson => {
            let value: JsonValue = serde_json::from_reader(reader)?;
            match GeoJson::from_json_value(value)? {
                GeoJson::FeatureCollection(collection) => collection
                    .features
                    .into_iter()
                    .map(|feature| serde_json::to_value(feature).map_err(Into::into))
                    .collect(),
                GeoJson::Feature(feature) => Ok(vec![serde_json::to_value(feature)?]),
                GeoJson::Geometry(_) => {
                    bail!("Input: a bare GeoJSON geometry has no attributes to filter")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(
            InputFormat::from_path(Path::new("cities.GeoJSON")),
            Some(InputFormat::GeoJson)
        );
        assert_eq!(
            InputFormat::from_path(Path::new("rows.ndjson")),
            Some(InputFormat::Jsonl)
        );
        assert_eq!(InputFormat::from_path(Path::new("rows.csv")), None);
        assert_eq!(InputFormat::from_path(Path::new("-")), None);
    }

    #[test]
    fn reads_json_array() {
        let input = br#"[{"a": 1}, {"a": 2}]"#;
        let records = read_records(&input[..], InputFormat::Json).unwrap();
        assert_eq!(records, vec![json!({ "a": 1 }), json!({ "a": 2 })]);
    }

    #[test]
    fn reads_json_lines_skipping_blanks() {
        let input = b"{\"a\": 1}\n\n{\"a\": 2}\n";
        let records = read_records(&input[..], InputFormat::Jsonl).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn reports_bad_json_line() {
        let input = b"{\"a\": 1}\n{oops\n";
        let err = read_records(&input[..], InputFormat::Jsonl).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn reads_feature_collection() {
        let input = br#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [-75.7, 45.4] },
                    "properties": { "name": "Ottawa" }
                },
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [-79.4, 43.7] },
                    "properties": { "name": "Toronto" }
                }
            ]
        }"#;
        let records = read_records(&input[..], InputFormat::GeoJson).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["properties"]["name"], json!("Toronto"));
        assert_eq!(records[0]["type"], json!("Feature"));
    }

    #[test]
    fn rejects_bare_geometry() {
        let input = br#"{ "type": "Point", "coordinates": [0.0, 0.0] }"#;
        assert!(read_records(&input[..], InputFormat::GeoJson).is_err());
    }
}
