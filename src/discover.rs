// src/discover.rs

use anyhow::{Context, Result};
use glob::glob;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Files under `input_dir` matching `pattern` (e.g. `*.csv` or
/// `**/acidentes_*.csv`), sorted so runs are reproducible.
pub fn discover_sources<P: AsRef<Path>>(input_dir: P, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!("{}/{}", input_dir.as_ref().display(), pattern);
    let mut paths = Vec::new();
    for entry in glob(&full).with_context(|| format!("invalid glob pattern {}", full))? {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => warn!("unreadable path while scanning {}: {}", full, e),
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn finds_matching_files_sorted() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("acidentes_2023.csv"), "A\n")?;
        fs::write(dir.path().join("acidentes_2021.csv"), "A\n")?;
        fs::write(dir.path().join("notes.txt"), "x")?;
        fs::create_dir(dir.path().join("sub.csv"))?;

        let found = discover_sources(dir.path(), "*.csv")?;
        let names: Vec<_> = found
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["acidentes_2021.csv", "acidentes_2023.csv"]);
        Ok(())
    }

    #[test]
    fn bad_pattern_is_an_error() {
        assert!(discover_sources(".", "[").is_err());
    }
}
