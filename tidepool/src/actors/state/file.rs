use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::StateStore;
use crate::actors::types::ActorId;
use crate::error::StateStoreError;

/// Durable state store keeping one file per actor in a directory.
///
/// File names are the hex encoding of the storage key, so arbitrary keys
/// (slashes, empty strings, unicode) map to valid names. A save writes a
/// temporary file, syncs it, then renames it over the record.
#[derive(Debug)]
pub struct FileStateStore {
    root: PathBuf,
    next_temp: AtomicU64,
}

impl FileStateStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            next_temp: AtomicU64::new(0),
        })
    }

    /// Directory holding the records.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &ActorId) -> PathBuf {
        let key = id.storage_key();
        let mut name = String::with_capacity(key.len() * 2 + 5);
        for byte in key.as_bytes() {
            let _ = write!(name, "{byte:02x}");
        }
        name.push_str(".json");
        self.root.join(name)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, id: &ActorId) -> Result<Option<Vec<u8>>, StateStoreError> {
        match tokio::fs::read(self.record_path(id)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, id: &ActorId, data: Vec<u8>) -> Result<(), StateStoreError> {
        let path = self.record_path(id);
        let temp_path = path.with_extension(format!(
            "tmp-{}",
            self.next_temp.fetch_add(1, Ordering::Relaxed)
        ));

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}
