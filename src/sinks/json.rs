use super::{Output, RecordSink, open_output};
use anyhow::Result;
use serde_json::Value as JsonValue;
use std::io::Write;
use std::path::Path;

/// Streams records into a single JSON array.
pub struct JsonSink {
    writer: Output,
    first_record: bool,
}

impl JsonSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut writer = open_output(path.as_ref())?;
        writeln!(writer, "[")?;

        Ok(Self {
            writer,
            first_record: true,
        })
    }
}

impl RecordSink for JsonSink {
    fn add_record(&mut self, record: &JsonValue) -> Result<()> {
        if !self.first_record {
            writeln!(self.writer, ",")?;
        }
        self.first_record = false;

        write!(self.writer, "  ")?;
        serde_json::to_writer(&mut self.writer, record)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if !self.first_record {
            writeln!(self.writer)?;
        }
        writeln!(self.writer, "]")?;
        self.writer.flush()?;
        Ok(())
    }
}
