/*!
Helpers for deriving the names of the files a run produces.
*/
use std::path::{Path, PathBuf};

/// The base name of `path` with its last extension replaced by `extension`.
pub fn swap_extension(path: &Path, extension: &str) -> PathBuf {
    match path.file_name() {
        Some(name) => PathBuf::from(name).with_extension(extension),
        None => PathBuf::from("distill").with_extension(extension),
    }
}

/// Default output file for an input: its base name with a `.json` extension, in the current
/// directory.
pub fn output_path(input: &Path) -> PathBuf {
    swap_extension(input, "json")
}

/// Scratch store location for an output file, next to it with a `.db` extension.
pub fn store_path(output: &Path) -> PathBuf {
    output.with_extension("db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_extension() {
        assert_eq!(
            swap_extension(Path::new("/data/updates.20160927.csv"), "json"),
            PathBuf::from("updates.20160927.json")
        );
        assert_eq!(
            swap_extension(Path::new("rib.csv.gz"), "json"),
            PathBuf::from("rib.csv.json")
        );
        assert_eq!(
            swap_extension(Path::new("bview"), "csv"),
            PathBuf::from("bview.csv")
        );
        assert_eq!(
            swap_extension(Path::new("rib.20160927.bz2"), "csv"),
            PathBuf::from("rib.20160927.csv")
        );
    }

    #[test]
    fn test_output_and_store_paths() {
        let output = output_path(Path::new("dumps/rib.csv"));
        assert_eq!(output, PathBuf::from("rib.json"));
        assert_eq!(
            store_path(Path::new("out/rib.json")),
            PathBuf::from("out/rib.db")
        );
    }
}
