use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::context::InstallContext;
use super::installer::{
    ensure_vanilla_instance, splice_manifest, LoaderInstallResult, LoaderInstaller,
};
use super::processor::ProcessorRunner;
use super::profile::{
    materialize_data, path_string, InstallProfile, InstallerJar, LegacyProfile, ModernProfile,
};
use crate::core::downloader::{CollisionPolicy, DownloadItem, DownloadSource, Fetcher};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::install::scratch::ScratchDir;
use crate::core::instance::LoaderType;
use crate::core::maven::{compare_versions, FORGE_MAVEN};
use crate::core::version::client_manifest::RawManifest;
use crate::core::version::{ClientManifest, FeatureSet, Library, Platform};

pub(crate) const BMCLAPI: &str = "https://bmclapi2.bangbang93.com";

/// What differs between Forge and its NeoForge fork: where installers and
/// version lists live. The install flow itself is shared.
pub trait ForgeDistribution: Send + Sync + 'static {
    const NAME: &'static str;
    const LOADER: LoaderType;

    /// Installer cache key, `loader:version`.
    fn cache_key(minecraft_version: &str, version: &str) -> String;

    fn installer_item(
        source: DownloadSource,
        minecraft_version: &str,
        version: &str,
        dest: PathBuf,
    ) -> DownloadItem;

    fn list_url(minecraft_version: &str) -> String;

    /// Version strings out of the list response, in any order.
    fn parse_versions(raw: &[u8]) -> LauncherResult<Vec<String>>;
}

pub struct Forge;

#[derive(Debug, Deserialize)]
struct ForgeListEntry {
    version: String,
}

impl ForgeDistribution for Forge {
    const NAME: &'static str = "Forge";
    const LOADER: LoaderType = LoaderType::Forge;

    fn cache_key(minecraft_version: &str, version: &str) -> String {
        format!("net.minecraftforge:installer:{}-{}", minecraft_version, version)
    }

    fn installer_item(
        source: DownloadSource,
        minecraft_version: &str,
        version: &str,
        dest: PathBuf,
    ) -> DownloadItem {
        let mc = minecraft_version.to_string();
        let version = version.to_string();
        DownloadItem::from_source(
            source,
            move |s| match s {
                DownloadSource::Official => {
                    let forge_id = format!("{}-{}", mc, version);
                    format!(
                        "{}/net/minecraftforge/forge/{}/forge-{}-installer.jar",
                        FORGE_MAVEN, forge_id, forge_id
                    )
                }
                DownloadSource::Bmclapi => format!(
                    "{}/forge/download?mcversion={}&version={}&category=installer&format=jar",
                    BMCLAPI, mc, version
                ),
            },
            dest,
        )
    }

    fn list_url(minecraft_version: &str) -> String {
        format!("{}/forge/minecraft/{}", BMCLAPI, minecraft_version)
    }

    fn parse_versions(raw: &[u8]) -> LauncherResult<Vec<String>> {
        let entries: Vec<ForgeListEntry> = serde_json::from_slice(raw)
            .map_err(|e| LauncherError::LoaderApi(format!("Forge version list: {}", e)))?;
        Ok(entries.into_iter().map(|e| e.version).collect())
    }
}

/// Installs Forge-style loaders by running their installer's profile:
/// acquire the installer, read `install_profile.json`, materialize data,
/// download libraries, run client processors, splice the manifest.
pub struct ForgeFamilyInstaller<D> {
    fetcher: Arc<dyn Fetcher>,
    _distribution: PhantomData<D>,
}

pub type ForgeInstaller = ForgeFamilyInstaller<Forge>;

impl<D: ForgeDistribution> ForgeFamilyInstaller<D> {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            _distribution: PhantomData,
        }
    }

    /// Versions published for `minecraft_version`, newest first.
    pub async fn list_versions(&self, minecraft_version: &str) -> LauncherResult<Vec<String>> {
        let raw = self.fetcher.fetch(&D::list_url(minecraft_version)).await?;
        let mut versions = D::parse_versions(&raw)?;
        versions.sort_by(|a, b| compare_versions(b, a));
        versions.dedup();
        Ok(versions)
    }

    async fn acquire_installer(
        &self,
        ctx: &InstallContext<'_>,
        dest: &Path,
    ) -> LauncherResult<InstallerJar> {
        let key = D::cache_key(ctx.minecraft_version, ctx.loader_version);
        if !ctx.cache.copy_to(&key, dest).await? {
            info!("Downloading {} installer {}", D::NAME, ctx.loader_version);
            let item = D::installer_item(
                ctx.source,
                ctx.minecraft_version,
                ctx.loader_version,
                dest.to_path_buf(),
            );
            ctx.downloader
                .run_batch(vec![item], CollisionPolicy::Replace)
                .await?;
            ctx.cache.store(&key, dest).await;
        }
        InstallerJar::open(dest).await
    }

    async fn install_modern(
        &self,
        ctx: &InstallContext<'_>,
        profile: ModernProfile,
        jar: &InstallerJar,
        scratch: &ScratchDir,
        base: &ClientManifest,
    ) -> LauncherResult<Vec<u8>> {
        let mut values = default_values(ctx, jar.path());
        values.extend(materialize_data(&profile.data, ctx.dir, jar, scratch).await?);

        let libraries = profile.libraries()?;
        download_libraries(ctx, &libraries).await?;

        let processors: Vec<_> = profile.client_processors().collect();
        if !processors.is_empty() {
            let java = match ctx.java {
                Some(java) => java.to_path_buf(),
                None => crate::core::java::find_java(base.required_java_major()).await?,
            };
            ProcessorRunner {
                java: &java,
                dir: ctx.dir,
                values: &values,
                working_dir: scratch.path(),
                mappings: base.client_mappings.as_ref(),
                downloader: ctx.downloader,
                source: ctx.source,
            }
            .run_all(&processors, ctx.task)
            .await?;
        }

        jar.read_entry(profile.version_entry())
    }

    async fn install_legacy(
        &self,
        ctx: &InstallContext<'_>,
        profile: LegacyProfile,
        jar: &InstallerJar,
    ) -> LauncherResult<Vec<u8>> {
        let universal = profile.install_universal(jar, ctx.dir).await?;
        debug!("Installed legacy universal jar at {:?}", universal);
        profile.manifest_bytes()
    }
}

#[async_trait]
impl<D: ForgeDistribution> LoaderInstaller for ForgeFamilyInstaller<D> {
    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult> {
        info!(
            "Installing {} {} for Minecraft {}",
            D::NAME,
            ctx.loader_version,
            ctx.minecraft_version
        );
        ensure_vanilla_instance(&ctx).await?;

        let base_path = ctx.manifest_path();
        let base_raw = tokio::fs::read(&base_path)
            .await
            .map_err(|e| LauncherError::io(&base_path, e))?;
        let base = ClientManifest::parse(&base_raw, &base_path.to_string_lossy())?;

        // Removed on every exit path.
        let scratch = ScratchDir::create(&format!("{}-install", D::NAME.to_lowercase())).await?;
        let jar = self
            .acquire_installer(&ctx, &scratch.path().join("installer.jar"))
            .await?;

        let manifest = match jar.install_profile()? {
            InstallProfile::Modern(profile) => {
                self.install_modern(&ctx, profile, &jar, &scratch, &base)
                    .await?
            }
            InstallProfile::Legacy(profile) => self.install_legacy(&ctx, profile, &jar).await?,
        };

        let raw = RawManifest::from_slice(&manifest, "version.json")?;
        let libraries: Vec<Library> = raw
            .libraries
            .iter()
            .cloned()
            .map(|l| l.normalize())
            .collect::<LauncherResult<_>>()?;
        download_libraries(&ctx, &libraries).await?;

        let manifest_path =
            splice_manifest(ctx.dir, ctx.instance_name, ctx.minecraft_version, &manifest).await?;
        info!("{} {} installed", D::NAME, ctx.loader_version);

        Ok(LoaderInstallResult {
            loader: D::LOADER,
            loader_version: ctx.loader_version.to_string(),
            manifest_path,
            main_class: raw.main_class.unwrap_or_default(),
            libraries: libraries.into_iter().map(|l| l.name).collect(),
        })
    }

    async fn list_versions(&self, minecraft_version: &str) -> LauncherResult<Vec<String>> {
        ForgeFamilyInstaller::list_versions(self, minecraft_version).await
    }
}

/// Values every profile can reference, before its own `data`.
fn default_values(ctx: &InstallContext<'_>, installer: &Path) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("SIDE".to_string(), "client".to_string()),
        ("MINECRAFT_JAR".to_string(), path_string(&ctx.client_jar())),
        ("MINECRAFT_VERSION".to_string(), ctx.minecraft_version.to_string()),
        ("ROOT".to_string(), path_string(ctx.dir.root())),
        ("INSTALLER".to_string(), path_string(installer)),
        (
            "LIBRARY_DIR".to_string(),
            path_string(&ctx.dir.libraries_dir()),
        ),
    ])
}

/// Download every library with a remote URL. Entries with an empty URL are
/// produced by processors and skipped.
async fn download_libraries(ctx: &InstallContext<'_>, libraries: &[Library]) -> LauncherResult<()> {
    let platform = Platform::current();
    let features = FeatureSet::new();
    let items: Vec<DownloadItem> = libraries
        .iter()
        .filter(|lib| lib.is_allowed(&platform, &features))
        .filter_map(|lib| lib.artifact.as_ref())
        .filter(|artifact| !artifact.url.is_empty())
        .map(|artifact| {
            DownloadItem::mirrored(ctx.source, artifact.url.clone(), ctx.dir.library_path(&artifact.path))
                .with_sha1(artifact.sha1.clone())
                .with_size(artifact.size)
        })
        .collect();

    if items.is_empty() {
        return Ok(());
    }
    ctx.downloader.run_batch(items, CollisionPolicy::Skip).await?;
    Ok(())
}
