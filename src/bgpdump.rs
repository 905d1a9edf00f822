/*!
Conversion of raw MRT dumps with the external `bgpdump` tool.

`bgpdump -t change -m` prints one pipe-separated line per route, stamped with the time the route
last changed, which is the input format read by [crate::psv].
*/
use crate::error::DistillError;
use crate::utils::swap_extension;
use log::info;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const BGPDUMP: &str = "bgpdump";

/// Convert `source` with `bgpdump`, writing `<base name>.csv` to the current directory.
///
/// Returns the path of the converted file.
pub fn bgpdump_to_psv(source: &Path) -> Result<PathBuf, DistillError> {
    bgpdump_to_psv_with(BGPDUMP, source)
}

/// Same as [bgpdump_to_psv] with an explicit `bgpdump` executable.
pub fn bgpdump_to_psv_with(program: &str, source: &Path) -> Result<PathBuf, DistillError> {
    let psv_file = swap_extension(source, "csv");
    info!(
        "running `{}` on file {} to {}",
        program,
        source.display(),
        psv_file.display()
    );

    let output = Command::new(program)
        .args(["-t", "change", "-m", "-O"])
        .arg(&psv_file)
        .arg(source)
        .output()
        .map_err(|e| DistillError::Bgpdump {
            source_file: source.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        return Err(DistillError::bgpdump_status(
            source.to_path_buf(),
            output.status,
            &combined,
        ));
    }
    Ok(psv_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program() {
        let result = bgpdump_to_psv_with("bgpdump-does-not-exist", Path::new("rib.bz2"));
        assert!(matches!(result, Err(DistillError::Bgpdump { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program() {
        let result = bgpdump_to_psv_with("false", Path::new("rib.bz2"));
        match result {
            Err(DistillError::Bgpdump { source_file, .. }) => {
                assert_eq!(source_file, PathBuf::from("rib.bz2"))
            }
            other => panic!("expected bgpdump failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_program() {
        let result = bgpdump_to_psv_with("true", Path::new("/tmp/rib.20160927.bz2")).unwrap();
        assert_eq!(result, PathBuf::from("rib.20160927.csv"));
    }
}
