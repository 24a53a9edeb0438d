//! Asset store adapter.
//!
//! The persistent asset service is external; the pipelines only need
//! content-addressed get/put by 128-bit id. [`MemoryAssetStore`] backs
//! imports and tests, [`FsAssetStore`] backs the CLI.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::model::{Asset, AssetKind};
use crate::util::{Error, Result};

/// Content-addressed asset storage.
///
/// Implementations are shared across worker threads during export
/// fetches, so `put` takes `&self` and interior mutability is the
/// implementor's concern.
pub trait AssetStore: Send + Sync {
    /// Fetch an asset. `Error::AssetMissing` when the id is unknown.
    fn get(&self, id: Uuid) -> Result<Asset>;

    /// Store an asset, replacing any previous content for the id.
    fn put(&self, asset: Asset) -> Result<()>;

    /// True when the id is present.
    fn contains(&self, id: Uuid) -> Result<bool>;
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryAssetStore {
    assets: RwLock<HashMap<Uuid, Asset>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored assets.
    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }
}

impl AssetStore for MemoryAssetStore {
    fn get(&self, id: Uuid) -> Result<Asset> {
        self.assets
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::AssetMissing(id))
    }

    fn put(&self, asset: Asset) -> Result<()> {
        self.assets.write().insert(asset.id, asset);
        Ok(())
    }

    fn contains(&self, id: Uuid) -> Result<bool> {
        Ok(self.assets.read().contains_key(&id))
    }
}

/// Directory-backed store: one file per asset, named
/// `<uuid><extension>` with the archive extension table, so the kind
/// survives a round-trip through the filesystem.
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn find(&self, id: Uuid) -> Result<Option<(PathBuf, AssetKind)>> {
        let prefix = id.to_string();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(ext) = name.strip_prefix(&prefix) {
                if let Ok(kind) = AssetKind::from_extension(ext) {
                    return Ok(Some((entry.path(), kind)));
                }
            }
        }
        Ok(None)
    }
}

impl AssetStore for FsAssetStore {
    fn get(&self, id: Uuid) -> Result<Asset> {
        match self.find(id)? {
            Some((path, kind)) => Ok(Asset::new(id, kind, fs::read(path)?)),
            None => Err(Error::AssetMissing(id)),
        }
    }

    fn put(&self, asset: Asset) -> Result<()> {
        // Drop any previous file for the id; the kind may have changed.
        if let Some((old, _)) = self.find(asset.id)? {
            fs::remove_file(old)?;
        }
        let name = format!("{}{}", asset.id, asset.kind.extension());
        fs::write(self.root.join(name), &asset.data)?;
        Ok(())
    }

    fn contains(&self, id: Uuid) -> Result<bool> {
        Ok(self.find(id)?.is_some())
    }
}
