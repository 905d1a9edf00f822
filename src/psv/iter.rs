use crate::error::DistillError;
use crate::psv::DumpRecord;
use std::io::BufRead;

/// Iterator over the records of a pipe-separated dump.
///
/// Blank lines are skipped. Lines that are not valid UTF-8 are decoded lossily. Malformed lines
/// are yielded as [DistillError::MalformedRecord] so the caller can decide to skip them; read
/// failures are yielded as [DistillError::Io].
pub struct DumpRecordIter<R> {
    reader: R,
    buffer: Vec<u8>,
    line_number: u64,
}

impl<R: BufRead> DumpRecordIter<R> {
    pub fn new(reader: R) -> Self {
        DumpRecordIter {
            reader,
            buffer: Vec::with_capacity(512),
            line_number: 0,
        }
    }

    /// Number of lines read so far.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }
}

impl<R: BufRead> Iterator for DumpRecordIter<R> {
    type Item = Result<DumpRecord, DistillError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(DistillError::Io(e))),
            }
            self.line_number += 1;

            let line = String::from_utf8_lossy(&self.buffer);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }

            return Some(line.parse::<DumpRecord>().map_err(|e| match e {
                DistillError::MalformedRecord(msg) => {
                    DistillError::MalformedRecord(format!("line {}: {}", self.line_number, msg))
                }
                other => other,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_iterate_records() {
        let input = "TABLE_DUMP2|1|B|10.0.0.1|1|10.0.0.0/8|1 2|IGP\n\
                     \n\
                     TABLE_DUMP2|2|B|10.0.0.1|1|10.1.0.0/16\r\n\
                     TABLE_DUMP2|3|B|10.0.0.1|1|10.2.0.0/16|1 3|IGP";
        let mut iter = DumpRecordIter::new(Cursor::new(input));

        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.grouping_key(), Some("2"));

        let second = iter.next().unwrap();
        match second {
            Err(DistillError::MalformedRecord(msg)) => assert!(msg.starts_with("line 3:")),
            other => panic!("expected malformed record, got {:?}", other),
        }

        let third = iter.next().unwrap().unwrap();
        assert_eq!(third.grouping_key(), Some("3"));
        assert!(iter.next().is_none());
        assert_eq!(iter.line_number(), 4);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut input = b"TABLE_DUMP2|1|B|10.0.0.1|1|10.0.0.0/8|1 2|".to_vec();
        input.extend_from_slice(&[0xff, b'\n']);
        let record = DumpRecordIter::new(Cursor::new(input))
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(record.grouping_key(), Some("2"));
    }
}
