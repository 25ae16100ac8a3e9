use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

/// Private working directory removed when dropped, whether the install
/// that used it succeeded or not.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create `<parent>/<prefix>-<random>`.
    pub async fn create_in(parent: &Path, prefix: &str) -> LauncherResult<Self> {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", prefix))
            .tempdir_in(parent)
            .map_err(|e| LauncherError::io(parent, e))?;
        debug!("Created scratch directory {:?}", dir.path());
        Ok(Self { dir })
    }

    /// Create a scratch directory under the system temp dir.
    pub async fn create(prefix: &str) -> LauncherResult<Self> {
        Self::create_in(&std::env::temp_dir(), prefix).await
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a jar-internal entry (`/data/client.lzma`) inside the
    /// scratch directory.
    pub fn entry_path(&self, jar_path: &str) -> PathBuf {
        jar_path
            .split('/')
            .filter(|part| !part.is_empty() && *part != "..")
            .fold(self.path().to_path_buf(), |path, part| path.join(part))
    }
}
