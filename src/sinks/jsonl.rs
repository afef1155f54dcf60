use super::{Output, RecordSink, open_output};
use anyhow::Result;
use serde_json::Value as JsonValue;
use std::io::Write;
use std::path::Path;

pub struct JsonlSink {
    writer: Output,
}

impl JsonlSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            writer: open_output(path.as_ref())?,
        })
    }
}

impl RecordSink for JsonlSink {
    fn add_record(&mut self, record: &JsonValue) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    #[test]
    fn writes_one_record_per_line() {
        let temp_file = NamedTempFile::with_suffix(".jsonl").unwrap();
        let mut sink = JsonlSink::new(temp_file.path()).unwrap();

        sink.add_record(&json!({ "name": "Ottawa", "pop": 1017449 }))
            .unwrap();
        sink.add_record(&json!({ "name": "Gatineau" })).unwrap();
        sink.finish().unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: JsonValue = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["pop"], 1017449);
        let second: JsonValue = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["name"], "Gatineau");
    }

    #[test]
    fn empty_output_has_no_lines() {
        let temp_file = NamedTempFile::with_suffix(".jsonl").unwrap();
        let mut sink = JsonlSink::new(temp_file.path()).unwrap();
        sink.finish().unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.is_empty());
    }
}
