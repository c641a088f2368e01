// On-disk audio artifacts keyed by fingerprint
use std::path::{Path, PathBuf};

use super::fingerprint::Fingerprint;
use crate::types::Result;

const ARTIFACT_EXTENSION: &str = "wav";

#[derive(Debug, Clone)]
pub struct AudioCache {
    dir: PathBuf,
}

impl AudioCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the cache directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let cache = Self::new(dir);
        tokio::fs::create_dir_all(&cache.dir).await?;
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir
            .join(fingerprint.as_str())
            .with_extension(ARTIFACT_EXTENSION)
    }

    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Option<PathBuf> {
        let path = self.artifact_path(fingerprint);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    /// Write an artifact. The final path only ever holds a complete file:
    /// bytes land in a sibling temp file that is then renamed into place.
    pub async fn store(&self, fingerprint: &Fingerprint, audio: &[u8]) -> Result<PathBuf> {
        let path = self.artifact_path(fingerprint);
        let partial = self.dir.join(format!("{fingerprint}.partial"));
        tokio::fs::write(&partial, audio).await?;
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_then_lookup() {
        let tmp = TempDir::new().unwrap();
        let cache = AudioCache::open(tmp.path().join("audio")).await.unwrap();
        let fp = Fingerprint::of("Hello", "voice");

        assert!(cache.lookup(&fp).await.is_none());
        let path = cache.store(&fp, b"RIFF").await.unwrap();

        assert_eq!(path, cache.artifact_path(&fp));
        assert_eq!(cache.lookup(&fp).await, Some(path.clone()));
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF");
        assert!(!cache.dir().join(format!("{fp}.partial")).exists());
    }

    #[test]
    fn test_artifact_named_by_fingerprint() {
        let cache = AudioCache::new("/tmp/cache");
        let fp = Fingerprint::of("x", "y");
        assert_eq!(
            cache.artifact_path(&fp),
            PathBuf::from(format!("/tmp/cache/{}.wav", fp.as_str()))
        );
    }
}
