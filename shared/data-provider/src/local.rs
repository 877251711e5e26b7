use anyhow::{anyhow, bail, Result};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// Lists every file under `dir`, recursively, so a checked-out model or dataset repo can be used
/// in place of one fetched from the hub.
pub fn local_repo_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = std::fs::canonicalize(&dir)
        .map_err(|e| anyhow!("Failed to open directory {:?}: {e}", dir.as_ref()))?;
    let mut files = Vec::new();
    for entry in WalkDir::new(&dir).follow_links(true) {
        let entry = entry.map_err(|e| anyhow!("couldn't list {}: {e}", dir.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    if files.is_empty() {
        bail!("No files in directory {}", dir.display());
    }
    files.sort();
    info!("Found {} files in {}", files.len(), dir.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lists_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("anatomy").join("test")).unwrap();
        std::fs::write(dir.path().join("anatomy/test/0000.parquet"), b"").unwrap();
        std::fs::write(dir.path().join("config.json"), b"{}").unwrap();

        let files = local_repo_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|x| x.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["0000.parquet", "config.json"]);
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(local_repo_files(dir.path()).is_err());
    }
}
