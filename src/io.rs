use crate::error::DistillError;
use log::debug;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// create a [BufRead] on heap for a local dump file. `.gz` and `.bz2` files are decompressed on
/// the fly, anything else is read as-is.
pub fn get_reader(path: &Path) -> Result<Box<dyn BufRead + Send>, DistillError> {
    let path = path.to_string_lossy();
    debug!("opening input {}", path);
    let raw_reader = oneio::get_reader(path.as_ref())?;
    Ok(Box::new(BufReader::new(raw_reader)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "first").unwrap();
        writeln!(file, "second").unwrap();
        drop(file);

        let lines: Vec<String> = get_reader(&path)
            .unwrap()
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(get_reader(&dir.path().join("missing.csv")).is_err());
    }
}
