//! Filesystem piece storage.
//!
//! Each configured store is a directory of pieces named by piece id. The
//! `/resource` route reads through this store.

use futures_util::future::BoxFuture;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tokio::fs;

use crate::config::schema::FsStoreConfig;
use crate::rpc::resource::{is_valid_id, Resource, ResourceStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreInfo {
    pub name: String,
    pub path: PathBuf,
    pub read_only: bool,
}

pub struct FsPieceStore {
    stores: Vec<FsStoreConfig>,
}

impl FsPieceStore {
    pub fn new(stores: Vec<FsStoreConfig>) -> Self {
        Self { stores }
    }

    pub fn info(&self) -> Vec<StoreInfo> {
        self.stores
            .iter()
            .map(|s| StoreInfo {
                name: s.name.clone(),
                path: s.path.clone(),
                read_only: s.read_only,
            })
            .collect()
    }

    /// Create every writable store directory.
    pub async fn ensure_dirs(&self) -> io::Result<()> {
        for store in self.stores.iter().filter(|s| !s.read_only) {
            fs::create_dir_all(&store.path).await?;
            tracing::debug!(store = %store.name, path = %store.path.display(), "Piece store ready");
        }
        for store in self.stores.iter().filter(|s| s.read_only) {
            if !fs::try_exists(&store.path).await? {
                tracing::warn!(store = %store.name, path = %store.path.display(), "Read-only piece store is missing");
            }
        }
        Ok(())
    }

    /// First store holding a regular file named `id`.
    pub async fn locate(&self, id: &str) -> io::Result<Option<PathBuf>> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        for store in &self.stores {
            let candidate = store.path.join(id);
            match fs::metadata(&candidate).await {
                Ok(meta) if meta.is_file() => return Ok(Some(candidate)),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

impl ResourceStore for FsPieceStore {
    fn open<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Resource>, io::Error>> {
        Box::pin(async move {
            let Some(path) = self.locate(id).await? else {
                return Ok(None);
            };
            let file = fs::File::open(&path).await?;
            let len = file.metadata().await?.len();
            Ok(Some(Resource {
                reader: Box::pin(file),
                len: Some(len),
            }))
        })
    }
}
