use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::Value as JsonValue;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub mod geojson;
pub mod json;
pub mod jsonl;

pub use self::geojson::GeoJsonSink;
pub use self::json::JsonSink;
pub use self::jsonl::JsonlSink;

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum OutputFormat {
    /// One JSON record per line
    #[value(name = "jsonl", alias = "geojsonl")]
    Jsonl,
    /// A single JSON array
    #[value(name = "json")]
    Json,
    /// A GeoJSON FeatureCollection
    #[value(name = "geojson")]
    GeoJson,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext.to_lowercase().as_str() {
            "jsonl" | "ndjson" | "geojsonl" => Some(OutputFormat::Jsonl),
            "json" => Some(OutputFormat::Json),
            "geojson" => Some(OutputFormat::GeoJson),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Json => "json",
            OutputFormat::GeoJson => "geojson",
        }
    }
}

pub trait RecordSink: Send {
    fn add_record(&mut self, record: &JsonValue) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

pub(crate) type Output = BufWriter<Box<dyn Write + Send>>;

/// Open a buffered writer on a file, or stdout for `-`.
pub(crate) fn open_output(path: &Path) -> Result<Output> {
    let inner: Box<dyn Write + Send> = if path == Path::new("-") {
        Box::new(std::io::stdout())
    } else {
        let file = File::create(path)
            .with_context(|| format!("Output: Failed to create {:?}", path))?;
        Box::new(file)
    };
    Ok(BufWriter::new(inner))
}

/// Build the sink for `format` writing to `path`.
pub fn create_sink(path: &Path, format: OutputFormat) -> Result<Box<dyn RecordSink>> {
    let sink: Box<dyn RecordSink> = match format {
        OutputFormat::Jsonl => Box::new(JsonlSink::new(path)?),
        OutputFormat::Json => Box::new(JsonSink::new(path)?),
        OutputFormat::GeoJson => Box::new(GeoJsonSink::new(path)?),
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_output_format() {
        assert_eq!(
            OutputFormat::from_path(Path::new("out.geojsonl")),
            Some(OutputFormat::Jsonl)
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("out.JSON")),
            Some(OutputFormat::Json)
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("out.geojson")),
            Some(OutputFormat::GeoJson)
        );
        assert_eq!(OutputFormat::from_path(Path::new("out.parquet")), None);
    }
}
