use crate::distill::aggregate::aggregate_record;
use crate::error::DistillError;
use crate::models::AggregatedRecord;
use crate::store::KeyValueStore;
use itertools::Itertools;
use log::{info, warn};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::io::Write;

const INDENT: &[u8] = b"  ";

/// Writes records as the elements of one JSON array, each indented by two spaces.
///
/// ```text
/// [
///   {
///     "AutonomousSystem": 6830,
///     ...
///   },
///   {
///     ...
///   }
/// ]
/// ```
pub struct JsonArrayWriter<W: Write> {
    writer: W,
    written: usize,
    buffer: Vec<u8>,
}

impl<W: Write> JsonArrayWriter<W> {
    pub fn new(mut writer: W) -> Result<Self, DistillError> {
        writer.write_all(b"[\n")?;
        Ok(JsonArrayWriter {
            writer,
            written: 0,
            buffer: Vec::new(),
        })
    }

    pub fn write_record(&mut self, record: &AggregatedRecord) -> Result<(), DistillError> {
        self.buffer.clear();
        let mut serializer = serde_json::Serializer::with_formatter(
            &mut self.buffer,
            PrettyFormatter::with_indent(INDENT),
        );
        record.serialize(&mut serializer)?;

        if self.written > 0 {
            self.writer.write_all(b",\n")?;
        }
        self.writer.write_all(INDENT)?;
        // JSON strings never contain raw newlines, so every newline is a line break
        for (i, line) in self.buffer.split(|b| *b == b'\n').enumerate() {
            if i > 0 {
                self.writer.write_all(b"\n")?;
                self.writer.write_all(INDENT)?;
            }
            self.writer.write_all(line)?;
        }
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Close the array and flush, handing back the writer.
    pub fn finish(mut self) -> Result<W, DistillError> {
        if self.written > 0 {
            self.writer.write_all(b"\n")?;
        }
        self.writer.write_all(b"]\n")?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Aggregate every key in `keys` from `store` and write the results to `writer`.
///
/// Keys are emitted in ascending numeric order. Keys that are not AS numbers are logged and
/// skipped. Returns the number of records written.
pub fn dump_store<'a, I, W>(
    store: &KeyValueStore,
    keys: I,
    writer: W,
) -> Result<usize, DistillError>
where
    I: IntoIterator<Item = &'a String>,
    W: Write,
{
    let mut output = JsonArrayWriter::new(writer)?;

    let keys = keys
        .into_iter()
        .sorted_by_cached_key(|key| (key.parse::<u64>().unwrap_or(u64::MAX), (*key).clone()));
    for key in keys {
        let blob = store.get_string(key)?;
        match aggregate_record(key, &blob) {
            Ok(record) => output.write_record(&record)?,
            Err(DistillError::InvalidAsn(key)) => {
                warn!("skipping key {:?}: not an AS number", key);
            }
            Err(e) => return Err(e),
        }
    }

    let written = output.written();
    output.finish()?;
    info!("wrote {} autonomous systems", written);
    Ok(written)
}
