use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use super::models::FileHandle;

/// Turns a dropped path into file handles. Directories are walked
/// recursively; entries are visited in name order so results are stable.
pub fn collect_files(root: impl AsRef<Path>) -> Result<Vec<FileHandle>> {
    let root = root.as_ref();
    let mut paths = Vec::new();

    if root.is_dir() {
        visit_dir(root, &mut paths)?;
    } else {
        paths.push(root.to_path_buf());
    }

    let files = paths
        .iter()
        .map(FileHandle::from_path)
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!("Collected {} files from {}", files.len(), root.display());
    Ok(files)
}

/// Symlinked directories are skipped so link cycles cannot recurse forever;
/// symlinks to files are kept.
fn visit_dir(dir: &Path, paths: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?))))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (path, file_type) in entries {
        if file_type.is_dir() {
            visit_dir(&path, paths)?;
        } else if file_type.is_symlink() && path.is_dir() {
            tracing::debug!("Skipping symlinked directory {}", path.display());
        } else {
            paths.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_nested_directories() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), b"bb").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("a.png"), b"a").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();

        let files = collect_files(dir.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name()).collect();

        assert_eq!(names, vec!["b.txt", "a.png"]);
        assert_eq!(files[0].size(), 2);
    }

    #[test]
    fn test_collect_single_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("one.mp3");
        fs::write(&path, b"xyz").unwrap();

        let files = collect_files(&path).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].mime_type(), Some("audio/mpeg"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_are_skipped() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("b.txt"), b"b").unwrap();
        symlink(dir.path(), dir.path().join("sub").join("loop")).unwrap();
        symlink(dir.path().join("a.txt"), dir.path().join("link.txt")).unwrap();

        let files = collect_files(dir.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name()).collect();

        assert_eq!(names, vec!["a.txt", "link.txt", "b.txt"]);
    }

    #[test]
    fn test_collect_missing_path() {
        let dir = TempDir::new().unwrap();
        assert!(collect_files(dir.path().join("nope")).is_err());
    }
}
