//! Crash-safe file helpers.
//!
//! Whole-file stores are replaced with write-temp, fsync, rename, so a
//! reader either sees the old file or the new one. Append-only stores are
//! written one line at a time and synced before the append returns.

use crate::error::StorageResult;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Sibling path with `suffix` appended to the file name.
pub fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Replace `path` with `bytes` atomically.
pub async fn atomic_write(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let tmp = sibling(path, ".tmp");
    {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
    }
    fs::rename(&tmp, path).await?;
    sync_parent_dir(path).await
}

/// Append `lines` to `path`, creating it if needed, and sync to disk.
pub async fn append_lines(path: &Path, lines: &[String]) -> StorageResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;

    let mut buf = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        buf.push_str(line);
        buf.push('\n');
    }
    file.write_all(buf.as_bytes()).await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(())
}

/// Read `path`, returning `None` if it does not exist.
pub async fn read_optional(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Create `dir` and its parents.
pub async fn ensure_dir(dir: &Path) -> StorageResult<()> {
    fs::create_dir_all(dir).await?;
    Ok(())
}

async fn sync_parent_dir(path: &Path) -> StorageResult<()> {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::File::open(parent).await?.sync_all().await?;
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_atomic_write_replaces_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");

        atomic_write(&path, b"old").await.unwrap();
        atomic_write(&path, b"new").await.unwrap();

        assert_eq!(fs::read(&path).await.unwrap(), b"new");
        assert!(!sibling(&path, ".tmp").exists());
    }

    #[tokio::test]
    async fn test_append_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");

        append_lines(&path, &["a".to_string()]).await.unwrap();
        append_lines(&path, &["b".to_string(), "c".to_string()])
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "a\nb\nc\n");
    }

    #[tokio::test]
    async fn test_read_optional_missing() {
        let dir = tempdir().unwrap();
        assert!(
            read_optional(&dir.path().join("nope"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_sibling() {
        assert_eq!(
            sibling(Path::new("/data/registry.json"), ".backup"),
            PathBuf::from("/data/registry.json.backup")
        );
    }
}
