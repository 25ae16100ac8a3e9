use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

/// Content cache for loader installer jars, keyed by `loader:version`
/// (e.g. `net.minecraftforge:installer:1.20.1-47.2.0`).
#[derive(Debug, Clone)]
pub struct InstallerCache {
    dir: PathBuf,
}

impl InstallerCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<cache dir>/mcinstall/installers`, or the system temp dir when the
    /// platform has no cache dir.
    pub fn default_location() -> Self {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self::new(base.join("mcinstall").join("installers"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.jar", hex::encode(digest)))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entry_path(key).is_file()
    }

    /// Copy the cached entry to `dest`. Returns `false` on a miss.
    pub async fn copy_to(&self, key: &str, dest: &Path) -> LauncherResult<bool> {
        let entry = self.entry_path(key);
        if !entry.is_file() {
            return Ok(false);
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::copy(&entry, dest)
            .await
            .map_err(|e| LauncherError::io(&entry, e))?;
        debug!("Installer cache hit for {}", key);
        Ok(true)
    }

    /// Store `src` under `key`. Failures only cost a future download, so
    /// they are logged and swallowed.
    pub async fn store(&self, key: &str, src: &Path) {
        match self.try_store(key, src).await {
            Ok(entry) => debug!("Cached installer {} at {:?}", key, entry),
            Err(e) => warn!("Could not cache installer {}: {}", key, e),
        }
    }

    /// Copy into a sibling temp file and rename it over the entry, so a
    /// reader never sees a half-written jar. The temp file is removed on
    /// any failure.
    async fn try_store(&self, key: &str, src: &Path) -> LauncherResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| LauncherError::io(&self.dir, e))?;

        let staged = tempfile::Builder::new()
            .prefix(".store-")
            .suffix(".part")
            .tempfile_in(&self.dir)
            .map_err(|e| LauncherError::io(&self.dir, e))?;
        tokio::fs::copy(src, staged.path())
            .await
            .map_err(|e| LauncherError::io(src, e))?;

        let entry = self.entry_path(key);
        staged
            .persist(&entry)
            .map_err(|e| LauncherError::io(&entry, e.error))?;
        Ok(entry)
    }
}
