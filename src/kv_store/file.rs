// File-backed snapshot storage: one file per (key, chain)

use super::{KeyValueStore, KvError};
use async_trait::async_trait;
use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Stores each value as `<dir>/<key>_<chain_id>.bin`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous value readable.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, KvError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str, chain_id: u64) -> PathBuf {
        let file_key: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}_{}.bin", file_key, chain_id))
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn save(&self, key: &str, chain_id: u64, value: Vec<u8>) -> Result<(), KvError> {
        let path = self.path_for(key, chain_id);
        let tmp = path.with_extension("bin.tmp");
        fs::write(&tmp, &value).await?;
        fs::rename(&tmp, &path).await?;
        debug!("💾 Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    async fn load(&self, key: &str, chain_id: u64) -> Result<Vec<u8>, KvError> {
        let path = self.path_for(key, chain_id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(KvError::NotFound(super::storage_key(key, chain_id)))
            }
            Err(e) => Err(KvError::Io(e)),
        }
    }
}
