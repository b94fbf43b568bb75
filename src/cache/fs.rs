//! Filesystem helpers shared by file-backed tiers.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Read a file, mapping "not found" to `None`.
pub async fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write via a temporary sibling and rename, so readers never observe a
/// partially written file. Missing parent directories are created.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = path.with_file_name(format!(".{file_name}.{:016x}.tmp", fastrand::u64(..)));

    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Join a relative key under `root`, refusing anything that would escape it.
pub fn resolve_under(root: &Path, relative: &str) -> io::Result<PathBuf> {
    let rel = Path::new(relative);
    let safe = !relative.is_empty()
        && rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !safe {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsafe storage key '{relative}'"),
        ));
    }
    Ok(root.join(rel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_atomic_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books/nested/abc.json");
        write_atomic(&path, b"{}").await.unwrap();
        assert_eq!(read_optional(&path).await.unwrap().unwrap(), b"{}");

        // Overwrite in place; no temp files left behind.
        write_atomic(&path, b"[]").await.unwrap();
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_optional(&dir.path().join("nope.json")).await.unwrap().is_none());
    }

    #[test]
    fn test_resolve_under_rejects_traversal() {
        let root = Path::new("/data");
        assert_eq!(
            resolve_under(root, "books/a.json").unwrap(),
            PathBuf::from("/data/books/a.json")
        );
        assert!(resolve_under(root, "../etc/passwd").is_err());
        assert!(resolve_under(root, "/abs").is_err());
        assert!(resolve_under(root, "").is_err());
    }
}
