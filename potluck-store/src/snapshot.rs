use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use potluck_catalog::Restaurant;
use potluck_core::StoreResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

/// A JSON file holding the full contents of one store
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/<name>.json`
    pub fn in_dir(dir: impl AsRef<Path>, name: &str) -> Self {
        Self::new(dir.as_ref().join(format!("{}.json", name)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means an empty store
    pub async fn load<T: DeserializeOwned + Default>(&self) -> StoreResult<T> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temporary file so readers never see a partial snapshot
    pub async fn save<T: Serialize + ?Sized>(&self, value: &T) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec_pretty(value)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Snapshot written");
        Ok(())
    }
}

/// Load scraped menus written by the menu population job
pub async fn load_menus(path: impl AsRef<Path>) -> StoreResult<Vec<Restaurant>> {
    let menus: Vec<Restaurant> = SnapshotFile::new(path.as_ref()).load().await?;
    info!(path = %path.as_ref().display(), restaurants = menus.len(), "Loaded menus");
    Ok(menus)
}
