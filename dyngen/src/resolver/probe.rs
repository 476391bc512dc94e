//! Hint-path probing for units without an on-disk location.
//!
//! Hint directories are searched in the order given, each one recursively with
//! entries sorted by file name, and the first `<name>.<extension>` file wins.
//! Unreadable directories and entries count as "not found".

use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

pub fn probe_hint_paths(hint_paths: &[PathBuf], name: &str, extension: &str) -> Option<PathBuf> {
    let file_name = format!("{}.{}", name, extension);
    hint_paths
        .iter()
        .find_map(|hint_path| find_file(hint_path, &file_name))
}

fn find_file(hint_path: &Path, file_name: &str) -> Option<PathBuf> {
    debug!("Find {} in {}", file_name, hint_path.display());
    let found = WalkDir::new(hint_path)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| entry.file_type().is_file() && entry.file_name() == file_name)
        .map(|entry| entry.into_path());

    if let Some(path) = &found {
        info!("Found {} in {}", file_name, path.display());
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_first_hint_path_wins() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        fs::write(dir_a.path().join("Foo.wasm"), b"a").unwrap();
        fs::write(dir_b.path().join("Foo.wasm"), b"b").unwrap();

        let hints = vec![dir_b.path().to_path_buf(), dir_a.path().to_path_buf()];
        let found = probe_hint_paths(&hints, "Foo", "wasm").unwrap();
        assert_eq!(found, dir_b.path().join("Foo.wasm"));
    }

    #[test]
    fn test_search_is_recursive_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/deep")).unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("b/deep/Foo.wasm"), b"b").unwrap();
        fs::write(dir.path().join("a/Foo.wasm"), b"a").unwrap();

        let found = probe_hint_paths(&[dir.path().to_path_buf()], "Foo", "wasm").unwrap();
        assert_eq!(found, dir.path().join("a/Foo.wasm"));
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let hints = vec![PathBuf::from("/definitely/not/a/real/hint/dir")];
        assert!(probe_hint_paths(&hints, "Foo", "wasm").is_none());
    }

    #[test]
    fn test_extension_must_match() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Foo.wat"), b"(module)").unwrap();
        assert!(probe_hint_paths(&[dir.path().to_path_buf()], "Foo", "wasm").is_none());
    }
}
