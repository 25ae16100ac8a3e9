use std::path::{Path, PathBuf};

use crate::core::downloader::{DownloadSource, Downloader};
use crate::core::install::task::InstallTask;
use crate::core::instance::layout::MinecraftDirectory;

use super::cache::InstallerCache;

/// Everything a loader installer needs to splice itself into one instance.
pub struct InstallContext<'a> {
    pub minecraft_version: &'a str,
    pub loader_version: &'a str,
    /// Version folder the loader is installed into.
    pub instance_name: &'a str,
    pub dir: &'a MinecraftDirectory,
    pub downloader: &'a Downloader,
    pub source: DownloadSource,
    pub cache: &'a InstallerCache,
    /// Java used for installer processors. Looked up when absent.
    pub java: Option<&'a Path>,
    /// Receives stage percentage while processors run.
    pub task: Option<&'a InstallTask>,
}

impl InstallContext<'_> {
    pub fn instance_dir(&self) -> PathBuf {
        self.dir.instance_dir(self.instance_name)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.manifest_path(self.instance_name)
    }

    pub fn client_jar(&self) -> PathBuf {
        self.dir.client_jar_path(self.instance_name)
    }
}
