use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::downloader::Fetcher;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::layout::MinecraftDirectory;
use crate::core::instance::LoaderType;

use super::{
    context::InstallContext, fabric::FabricInstaller, forge::ForgeInstaller,
    neoforge::NeoForgeInstaller,
};

/// Outcome of a loader install.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderInstallResult {
    pub loader: LoaderType,
    pub loader_version: String,
    /// Where the loader manifest was written.
    pub manifest_path: PathBuf,
    pub main_class: String,
    /// Coordinates of the libraries the loader brought in.
    pub libraries: Vec<String>,
}

#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult>;

    /// Loader versions available for `minecraft_version`, newest first.
    async fn list_versions(&self, minecraft_version: &str) -> LauncherResult<Vec<String>>;
}

/// Dispatcher without `Box<dyn>`.
pub enum Installer {
    Fabric(FabricInstaller),
    Forge(ForgeInstaller),
    NeoForge(NeoForgeInstaller),
}

impl Installer {
    /// `None` for vanilla, which has nothing to install.
    pub fn new(loader: LoaderType, fetcher: Arc<dyn Fetcher>) -> Option<Self> {
        match loader {
            LoaderType::Vanilla => None,
            LoaderType::Fabric => Some(Self::Fabric(FabricInstaller::new(fetcher))),
            LoaderType::Forge => Some(Self::Forge(ForgeInstaller::new(fetcher))),
            LoaderType::NeoForge => Some(Self::NeoForge(NeoForgeInstaller::new(fetcher))),
        }
    }

    pub fn loader(&self) -> LoaderType {
        match self {
            Installer::Fabric(_) => LoaderType::Fabric,
            Installer::Forge(_) => LoaderType::Forge,
            Installer::NeoForge(_) => LoaderType::NeoForge,
        }
    }

    pub async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult> {
        match self {
            Installer::Fabric(i) => i.install(ctx).await,
            Installer::Forge(i) => i.install(ctx).await,
            Installer::NeoForge(i) => i.install(ctx).await,
        }
    }

    pub async fn list_versions(&self, minecraft_version: &str) -> LauncherResult<Vec<String>> {
        match self {
            Installer::Fabric(i) => i.list_versions(minecraft_version).await,
            Installer::Forge(i) => i.list_versions(minecraft_version).await,
            Installer::NeoForge(i) => i.list_versions(minecraft_version).await,
        }
    }
}

/// Refuse to stack a loader on an instance whose manifest already inherits
/// from another version.
pub async fn ensure_vanilla_instance(ctx: &InstallContext<'_>) -> LauncherResult<()> {
    let path = ctx.manifest_path();
    let raw = tokio::fs::read(&path)
        .await
        .map_err(|e| LauncherError::io(&path, e))?;
    let value: serde_json::Value = serde_json::from_slice(&raw)?;

    if let Some(parent) = value.get("inheritsFrom").and_then(|v| v.as_str()) {
        return Err(LauncherError::Loader(format!(
            "instance {} already has a mod loader (inherits from {})",
            ctx.instance_name, parent
        )));
    }
    Ok(())
}

/// Install `manifest` as the active descriptor of instance `name`.
///
/// The current descriptor is moved aside as the hidden copy of `base_id`
/// unless such a copy already exists.
pub async fn splice_manifest(
    dir: &MinecraftDirectory,
    name: &str,
    base_id: &str,
    manifest: &[u8],
) -> LauncherResult<PathBuf> {
    let active = dir.manifest_path(name);
    let hidden = dir.base_manifest_copy(name, base_id);

    let hidden_exists = tokio::fs::try_exists(&hidden)
        .await
        .map_err(|e| LauncherError::io(&hidden, e))?;
    let active_exists = tokio::fs::try_exists(&active)
        .await
        .map_err(|e| LauncherError::io(&active, e))?;

    if !hidden_exists && active_exists {
        if let Some(parent) = hidden.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::rename(&active, &hidden)
            .await
            .map_err(|e| LauncherError::io(&active, e))?;
        info!("Moved base manifest of {} to {:?}", name, hidden);
    }

    if let Some(parent) = active.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
    }
    tokio::fs::write(&active, manifest)
        .await
        .map_err(|e| LauncherError::io(&active, e))?;

    Ok(active)
}
