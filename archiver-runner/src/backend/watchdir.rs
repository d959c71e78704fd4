//! Watch directory backend
//!
//! Drops `.torrent` files into a directory that a torrent client polls.

use async_trait::async_trait;
use nix::sys::statvfs::statvfs;
use std::path::PathBuf;
use tracing::debug;

use super::{AddOptions, BackendKind, FreeSpace, TorrentBackend};
use crate::error::BackendError;

/// Writes torrents into a watched directory
#[derive(Debug, Clone)]
pub struct WatchDirBackend {
    dir: PathBuf,
}

impl WatchDirBackend {
    /// Opens the directory, creating it if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| BackendError::io("create directory", &dir, e))?;
        Ok(Self { dir })
    }

    /// Path the torrent is written to; path separators in the name are
    /// replaced so the file always lands directly in the directory
    fn torrent_path(&self, name: &str) -> PathBuf {
        let file_name: String = name
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir.join(format!("{file_name}.torrent"))
    }
}

#[async_trait]
impl TorrentBackend for WatchDirBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::WatchDir
    }

    async fn add(
        &self,
        torrent: &[u8],
        name: &str,
        options: &AddOptions,
    ) -> Result<(), BackendError> {
        debug!(name, ?options, dir = %self.dir.display(), "writing torrent to watch directory");

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BackendError::io("create directory", &self.dir, e))?;

        let path = self.torrent_path(name);
        tokio::fs::write(&path, torrent)
            .await
            .map_err(|e| BackendError::io("write", &path, e))?;

        Ok(())
    }

    async fn free_space(&self) -> Result<FreeSpace, BackendError> {
        let stats = statvfs(self.dir.as_path())
            .map_err(|e| BackendError::io("statvfs", &self.dir, e.into()))?;

        #[allow(clippy::unnecessary_cast)]
        let available = stats.blocks_available() as u64 * stats.fragment_size() as u64;
        Ok(FreeSpace::Available(available))
    }

    async fn count_stalled(&self, _category: &str) -> Result<usize, BackendError> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_add_writes_torrent_file() -> Result<()> {
        let temp = TempDir::new()?;
        let backend = WatchDirBackend::open(temp.path()).await?;

        backend
            .add(b"d4:infodee", "foo", &AddOptions::default())
            .await?;

        let written = std::fs::read(temp.path().join("foo.torrent"))?;
        assert_eq!(written, b"d4:infodee");
        Ok(())
    }

    #[tokio::test]
    async fn test_add_creates_missing_directory() -> Result<()> {
        let temp = TempDir::new()?;
        let dir = temp.path().join("nested").join("watch");
        let backend = WatchDirBackend {
            dir: dir.clone(),
        };

        backend
            .add(b"d4:infodee", "foo", &AddOptions::default())
            .await?;

        assert!(dir.join("foo.torrent").is_file());
        Ok(())
    }

    #[tokio::test]
    async fn test_add_sanitises_separators() -> Result<()> {
        let temp = TempDir::new()?;
        let backend = WatchDirBackend::open(temp.path()).await?;

        backend
            .add(b"d4:infodee", "a/b\\c", &AddOptions::default())
            .await?;

        assert!(temp.path().join("a_b_c.torrent").is_file());
        Ok(())
    }

    #[tokio::test]
    async fn test_free_space_and_stalled() -> Result<()> {
        let temp = TempDir::new()?;
        let backend = WatchDirBackend::open(temp.path()).await?;

        assert!(matches!(backend.free_space().await?, FreeSpace::Available(_)));
        assert_eq!(backend.count_stalled("anything").await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_free_space_missing_directory_fails() -> Result<()> {
        let temp = TempDir::new()?;
        let backend = WatchDirBackend {
            dir: temp.path().join("gone"),
        };

        assert!(matches!(
            backend.free_space().await,
            Err(BackendError::Io { action: "statvfs", .. })
        ));
        Ok(())
    }
}
