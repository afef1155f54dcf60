use super::{Output, RecordSink, open_output};
use anyhow::{Context, Result, bail};
use geojson::{Feature, GeoJson};
use serde_json::Value as JsonValue;
use std::io::Write;
use std::path::Path;

/// Streams records into a FeatureCollection.
///
/// Records that are already features are validated and written as-is. Plain
/// attribute records become features without geometry.
pub struct GeoJsonSink {
    writer: Output,
    first_feature: bool,
    written: usize,
}

impl GeoJsonSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut writer = open_output(path.as_ref())?;

        writeln!(writer, "{{")?;
        writeln!(writer, "  \"type\": \"FeatureCollection\",")?;
        writeln!(writer, "  \"features\": [")?;

        Ok(Self {
            writer,
            first_feature: true,
            written: 0,
        })
    }

    fn to_feature(&self, record: &JsonValue) -> Result<Feature> {
        if record.get("type").and_then(JsonValue::as_str) == Some("Feature") {
            return Feature::from_json_value(record.clone()).with_context(|| {
                format!("Output: record {} is not a valid GeoJSON feature", self.written)
            });
        }

        match record.as_object() {
            Some(attributes) => Ok(Feature {
                bbox: None,
                geometry: None,
                id: None,
                properties: Some(attributes.clone()),
                foreign_members: None,
            }),
            None => bail!(
                "Output: record {} cannot be written as a GeoJSON feature: {}",
                self.written,
                record
            ),
        }
    }
}

impl RecordSink for GeoJsonSink {
    fn add_record(&mut self, record: &JsonValue) -> Result<()> {
        let feature = self.to_feature(record)?;

        if !self.first_feature {
            writeln!(self.writer, ",")?;
        }
        self.first_feature = false;

        let geojson = GeoJson::Feature(feature);
        serde_json::to_writer(&mut self.writer, &geojson)?;
        self.written += 1;

        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        writeln!(self.writer)?;
        writeln!(self.writer, "  ]")?;
        writeln!(self.writer, "}}")?;
        self.writer.flush()?;
        Ok(())
    }
}
