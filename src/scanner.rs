use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::classifier::Classifier;
use crate::config::Config;
use crate::error::Error;
use crate::marker::Marker;
use crate::parser;

/// Whether a walk entry is a dot-file or dot-directory below the root.
fn is_hidden(entry: &DirEntry) -> bool {
    return entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| return name.starts_with('.'));
}

/// List every regular file under `root` the config allows scanning, sorted.
/// Hidden files and directories (`.git`, `.weasel.yaml`, temp files) are skipped.
pub fn candidate_files(root: &Path, config: &Config) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| return !is_hidden(e))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            },
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if config.should_scan(&relative.to_string_lossy()) {
            files.push(path.to_path_buf());
        }
    }

    return files;
}

/// Scan all candidate files under `root` and extract markers.
/// Returns markers grouped by file; files without markers are omitted.
///
/// # Errors
///
/// Returns `Error::Io` if a candidate file cannot be read.
pub fn scan(
    root: &Path,
    config: &Config,
    classifier: &Classifier,
) -> Result<BTreeMap<PathBuf, Vec<Marker>>, Error> {
    let mut grouped = BTreeMap::new();

    for path in candidate_files(root, config) {
        let markers = scan_file(&path, classifier, &config.repo_url)?;
        if !markers.is_empty() {
            grouped.insert(path, markers);
        }
    }

    return Ok(grouped);
}

/// Parse one file. Files that are not valid UTF-8 are treated as having no markers.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read.
pub fn scan_file(path: &Path, classifier: &Classifier, remote_addr: &str) -> Result<Vec<Marker>, Error> {
    let bytes = std::fs::read(path)?;
    let Ok(content) = String::from_utf8(bytes) else {
        tracing::debug!(path = %path.display(), "skipping non-UTF-8 file");
        return Ok(Vec::new());
    };
    return Ok(parser::parse(&content, path, classifier, remote_addr));
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/generated")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("src/main.go"), "// TODO: a\n// FIXME: b\n").unwrap();
        fs::write(root.join("src/generated/api.go"), "// TODO: generated\n").unwrap();
        fs::write(root.join("src/clean.go"), "package main\n").unwrap();
        fs::write(root.join("src/blob.bin"), b"\xff// TODO: x\n").unwrap();
        fs::write(root.join(".git/HEAD"), "// TODO: never\n").unwrap();
        return dir;
    }

    #[test]
    fn groups_markers_by_file_and_skips_hidden() {
        let dir = tree();
        let config = Config::default();
        let classifier = Classifier::new(&config.prefix, &config.keyword_names()).unwrap();

        let grouped = scan(dir.path(), &config, &classifier).unwrap();
        let files: Vec<_> = grouped
            .keys()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(files, vec![PathBuf::from("src/generated/api.go"), PathBuf::from("src/main.go")]);
        assert_eq!(grouped[&dir.path().join("src/main.go")].len(), 2);
    }

    #[test]
    fn exclude_prefix_is_honoured() {
        let dir = tree();
        let config = Config {
            exclude: vec!["src/generated/".to_string()],
            ..Config::default()
        };
        let files = candidate_files(dir.path(), &config);
        assert!(files.iter().all(|p| !p.ends_with("api.go")));
        assert!(files.iter().any(|p| p.ends_with("main.go")));
    }

    #[test]
    fn non_utf8_file_has_no_markers() {
        let dir = tree();
        let classifier = Classifier::new("// ", &["TODO"]).unwrap();
        let markers = scan_file(&dir.path().join("src/blob.bin"), &classifier, "").unwrap();
        assert!(markers.is_empty());
    }
}
