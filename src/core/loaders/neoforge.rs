use std::path::PathBuf;

use serde::Deserialize;

use super::forge::{ForgeDistribution, ForgeFamilyInstaller, BMCLAPI};
use crate::core::downloader::{DownloadItem, DownloadSource};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::LoaderType;
use crate::core::maven::NEOFORGE_MAVEN;

/// The only Minecraft version NeoForge shipped under the old `forge`
/// artifact name.
const LEGACY_FORGE_ARTIFACT_MC: &str = "1.20.1";

pub struct NeoForge;

pub type NeoForgeInstaller = ForgeFamilyInstaller<NeoForge>;

#[derive(Debug, Deserialize)]
struct NeoForgeListEntry {
    version: String,
}

impl NeoForge {
    fn installer_url(minecraft_version: &str, version: &str) -> String {
        if minecraft_version == LEGACY_FORGE_ARTIFACT_MC {
            let version = version
                .strip_prefix("1.20.1-")
                .unwrap_or(version);
            format!(
                "{}/net/neoforged/forge/1.20.1-{}/forge-1.20.1-{}-installer.jar",
                NEOFORGE_MAVEN, version, version
            )
        } else {
            format!(
                "{}/net/neoforged/neoforge/{}/neoforge-{}-installer.jar",
                NEOFORGE_MAVEN, version, version
            )
        }
    }
}

impl ForgeDistribution for NeoForge {
    const NAME: &'static str = "NeoForge";
    const LOADER: LoaderType = LoaderType::NeoForge;

    fn cache_key(_minecraft_version: &str, version: &str) -> String {
        format!("net.neoforged:installer:{}", version)
    }

    fn installer_item(
        source: DownloadSource,
        minecraft_version: &str,
        version: &str,
        dest: PathBuf,
    ) -> DownloadItem {
        DownloadItem::mirrored(source, Self::installer_url(minecraft_version, version), dest)
    }

    fn list_url(minecraft_version: &str) -> String {
        format!("{}/neoforge/list/{}", BMCLAPI, minecraft_version)
    }

    fn parse_versions(raw: &[u8]) -> LauncherResult<Vec<String>> {
        let entries: Vec<NeoForgeListEntry> = serde_json::from_slice(raw)
            .map_err(|e| LauncherError::LoaderApi(format!("NeoForge version list: {}", e)))?;
        Ok(entries.into_iter().map(|e| e.version).collect())
    }
}
