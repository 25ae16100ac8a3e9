use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::context::InstallContext;
use super::installer::{
    ensure_vanilla_instance, splice_manifest, LoaderInstallResult, LoaderInstaller,
};
use crate::core::downloader::{fetch_mirrored, CollisionPolicy, DownloadItem, Fetcher};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::LoaderType;
use crate::core::maven::{compare_versions, MavenArtifact, FABRIC_MAVEN};

const FABRIC_META_BASE: &str = "https://meta.fabricmc.net/v2";

/// The parts of a Fabric launcher profile the installer checks. The profile
/// itself is spliced in verbatim.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricProfile {
    pub id: Option<String>,
    pub inherits_from: Option<String>,
    #[serde(default)]
    pub main_class: String,
    #[serde(default)]
    pub libraries: Vec<FabricLibrary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FabricLibrary {
    pub name: String,
    pub url: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LoaderListEntry {
    loader: LoaderVersion,
}

#[derive(Debug, Deserialize)]
struct LoaderVersion {
    version: String,
}

pub struct FabricInstaller {
    fetcher: Arc<dyn Fetcher>,
}

impl FabricInstaller {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    fn profile_url(minecraft_version: &str, loader_version: &str) -> String {
        format!(
            "{}/versions/loader/{}/{}/profile/json",
            FABRIC_META_BASE, minecraft_version, loader_version
        )
    }

    /// Loader versions published for `minecraft_version`, newest first.
    pub async fn list_loader_versions(
        &self,
        minecraft_version: &str,
    ) -> LauncherResult<Vec<String>> {
        let url = format!("{}/versions/loader/{}", FABRIC_META_BASE, minecraft_version);
        let raw = self.fetcher.fetch(&url).await?;
        let entries: Vec<LoaderListEntry> = serde_json::from_slice(&raw)
            .map_err(|e| LauncherError::LoaderApi(format!("Fabric Meta list: {}", e)))?;
        let mut versions: Vec<String> = entries.into_iter().map(|e| e.loader.version).collect();
        versions.sort_by(|a, b| compare_versions(b, a));
        versions.dedup();
        Ok(versions)
    }

    fn parse_profile(raw: &[u8]) -> LauncherResult<FabricProfile> {
        let profile: FabricProfile = serde_json::from_slice(raw)
            .map_err(|e| LauncherError::LoaderApi(format!("Fabric profile: {}", e)))?;

        if profile.main_class.is_empty() {
            return Err(LauncherError::LoaderApi(
                "Fabric profile missing mainClass".into(),
            ));
        }
        Ok(profile)
    }

    fn library_items(
        profile: &FabricProfile,
        ctx: &InstallContext<'_>,
    ) -> LauncherResult<Vec<DownloadItem>> {
        let libs_dir = ctx.dir.libraries_dir();
        profile
            .libraries
            .iter()
            .map(|lib| {
                let artifact = MavenArtifact::parse(&lib.name)?;
                let repo = lib.url.as_deref().unwrap_or(FABRIC_MAVEN);
                Ok(DownloadItem::mirrored(
                    ctx.source,
                    artifact.url(repo),
                    libs_dir.join(artifact.local_path()),
                )
                .with_sha1(lib.sha1.clone())
                .with_size(lib.size))
            })
            .collect()
    }
}

#[async_trait]
impl LoaderInstaller for FabricInstaller {
    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult> {
        info!(
            "Installing Fabric {} for Minecraft {}",
            ctx.loader_version, ctx.minecraft_version
        );
        ensure_vanilla_instance(&ctx).await?;

        let raw = fetch_mirrored(
            self.fetcher.as_ref(),
            ctx.source,
            &Self::profile_url(ctx.minecraft_version, ctx.loader_version),
        )
        .await?;
        let profile = Self::parse_profile(&raw)?;

        let items = Self::library_items(&profile, &ctx)?;
        ctx.downloader.run_batch(items, CollisionPolicy::Skip).await?;

        let base_id = profile
            .inherits_from
            .as_deref()
            .unwrap_or(ctx.minecraft_version);
        let manifest_path = splice_manifest(ctx.dir, ctx.instance_name, base_id, &raw).await?;

        info!(
            "Fabric installed as {}",
            profile.id.as_deref().unwrap_or(ctx.instance_name)
        );

        Ok(LoaderInstallResult {
            loader: LoaderType::Fabric,
            loader_version: ctx.loader_version.to_string(),
            manifest_path,
            main_class: profile.main_class,
            libraries: profile.libraries.into_iter().map(|l| l.name).collect(),
        })
    }

    async fn list_versions(&self, minecraft_version: &str) -> LauncherResult<Vec<String>> {
        self.list_loader_versions(minecraft_version).await
    }
}
