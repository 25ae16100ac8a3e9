// ─── Vanilla Install Pipeline ───
// version json → asset index → client jar → (Fabric) → assets → libraries
// → natives, each stage reported through one InstallTask.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use super::stage::InstallStage;
use super::task::InstallTask;
use crate::core::assets::AssetIndex;
use crate::core::downloader::{
    fetch_mirrored, BatchObserver, CollisionPolicy, DownloadItem, DownloadSource, Downloader,
    Fetcher,
};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::layout::MinecraftDirectory;
use crate::core::launch::extract_natives;
use crate::core::loaders::{FabricInstaller, InstallContext, InstallerCache, LoaderInstaller};
use crate::core::remap;
use crate::core::version::{Artifact, ClientManifest, FeatureSet, Platform, VersionEntry};

/// One vanilla install, optionally with Fabric on top.
#[derive(Debug, Clone)]
pub struct MinecraftInstall {
    pub version: VersionEntry,
    /// Version folder the game is installed into.
    pub instance_name: String,
    pub fabric_loader: Option<String>,
    pub skip_resources: bool,
}

impl MinecraftInstall {
    pub fn new(version: VersionEntry, instance_name: impl Into<String>) -> Self {
        Self {
            version,
            instance_name: instance_name.into(),
            fabric_loader: None,
            skip_resources: false,
        }
    }

    pub fn with_fabric(mut self, loader_version: impl Into<String>) -> Self {
        self.fabric_loader = Some(loader_version.into());
        self
    }

    /// Stages this install walks through.
    pub fn stages(&self) -> Vec<InstallStage> {
        let mut stages = vec![
            InstallStage::ClientJson,
            InstallStage::ClientIndex,
            InstallStage::ClientJar,
        ];
        if self.fabric_loader.is_some() {
            stages.push(InstallStage::InstallFabric);
        }
        if !self.skip_resources {
            stages.push(InstallStage::ClientResources);
        }
        stages.extend([
            InstallStage::ClientLibraries,
            InstallStage::Natives,
            InstallStage::End,
        ]);
        stages
    }
}

pub struct MinecraftInstaller {
    fetcher: Arc<dyn Fetcher>,
    downloader: Downloader,
    dir: MinecraftDirectory,
    source: DownloadSource,
    platform: Platform,
    cache: InstallerCache,
}

impl MinecraftInstaller {
    pub fn new(fetcher: Arc<dyn Fetcher>, dir: MinecraftDirectory) -> Self {
        Self {
            downloader: Downloader::new(Arc::clone(&fetcher)),
            fetcher,
            dir,
            source: DownloadSource::default(),
            platform: Platform::current(),
            cache: InstallerCache::default_location(),
        }
    }

    pub fn with_source(mut self, source: DownloadSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.downloader = self.downloader.with_concurrency(limit);
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_cache(mut self, cache: InstallerCache) -> Self {
        self.cache = cache;
        self
    }

    /// A fresh task titled after the install.
    pub fn create_task(request: &MinecraftInstall) -> Arc<InstallTask> {
        InstallTask::new(
            format!("Install {} as {}", request.version.id, request.instance_name),
            request.stages(),
        )
    }

    /// Run every stage on `task`, which ends in `End` or in a failure.
    pub async fn install(
        &self,
        task: &Arc<InstallTask>,
        request: &MinecraftInstall,
    ) -> LauncherResult<()> {
        task.run(move |task| async move { self.run_stages(&task, request).await })
            .await
    }

    async fn run_stages(&self, task: &InstallTask, request: &MinecraftInstall) -> LauncherResult<()> {
        let name = request.instance_name.as_str();
        info!("Installing Minecraft {} into {}", request.version.id, name);

        task.update_stage(InstallStage::ClientJson);
        let manifest = self.client_json(request).await?;
        task.set_stage_percentage(1.0);

        task.update_stage(InstallStage::ClientIndex);
        let assets = self.client_index(&manifest).await?;
        task.set_stage_percentage(1.0);

        task.update_stage(InstallStage::ClientJar);
        self.client_jar(&manifest, name).await?;
        task.set_stage_percentage(1.0);

        if let Some(loader_version) = &request.fabric_loader {
            task.update_stage(InstallStage::InstallFabric);
            let ctx = InstallContext {
                minecraft_version: &request.version.id,
                loader_version,
                instance_name: name,
                dir: &self.dir,
                downloader: &self.downloader,
                source: self.source,
                cache: &self.cache,
                java: None,
                task: Some(task),
            };
            FabricInstaller::new(Arc::clone(&self.fetcher))
                .install(ctx)
                .await?;
        }

        if !request.skip_resources {
            task.update_stage(InstallStage::ClientResources);
            if let Some(index) = &assets {
                let items = index.download_items(&self.dir, self.source);
                self.download_stage(task, items).await?;
            }
        }

        let features = FeatureSet::new();

        task.update_stage(InstallStage::ClientLibraries);
        let items = manifest
            .needed_libraries(&self.platform, &features)
            .into_iter()
            .filter_map(|lib| lib.artifact.as_ref())
            .filter_map(|artifact| self.library_item(artifact))
            .collect();
        self.download_stage(task, items).await?;

        task.update_stage(InstallStage::Natives);
        let items = manifest
            .needed_natives(&self.platform)
            .into_iter()
            .filter_map(|(_, artifact)| self.library_item(artifact))
            .collect();
        self.download_stage(task, items).await?;
        let natives_dir = self.dir.natives_dir(name);
        let count = extract_natives(&manifest, &self.dir, &natives_dir, &self.platform).await?;
        debug!("{} native files in {:?}", count, natives_dir);

        info!("Minecraft {} installed into {}", request.version.id, name);
        Ok(())
    }

    /// Fetch and store `<name>.json`. The returned manifest is already
    /// remapped for this platform.
    async fn client_json(&self, request: &MinecraftInstall) -> LauncherResult<ClientManifest> {
        let raw = fetch_mirrored(self.fetcher.as_ref(), self.source, &request.version.url).await?;
        let manifest = ClientManifest::parse(&raw, &request.version.id)?;

        let path = self.dir.manifest_path(&request.instance_name);
        write_file(&path, &raw).await?;
        debug!("Wrote {:?}", path);

        Ok(remap::remap(manifest, &self.platform))
    }

    async fn client_index(&self, manifest: &ClientManifest) -> LauncherResult<Option<AssetIndex>> {
        let Some(index_ref) = &manifest.asset_index else {
            debug!("{} has no asset index", manifest.id);
            return Ok(None);
        };

        let path = self.dir.asset_index_path(&index_ref.id);
        let item = DownloadItem::mirrored(self.source, index_ref.url.clone(), path.clone())
            .with_sha1(index_ref.sha1.clone())
            .with_size(index_ref.size);
        self.downloader
            .run_batch(vec![item], CollisionPolicy::Skip)
            .await?;

        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| LauncherError::io(&path, e))?;
        AssetIndex::from_slice(&raw, &index_ref.id).map(Some)
    }

    async fn client_jar(&self, manifest: &ClientManifest, name: &str) -> LauncherResult<()> {
        let download = manifest
            .client_download
            .as_ref()
            .ok_or_else(|| LauncherError::MalformedManifest {
                source_name: manifest.id.clone(),
                message: "no client download".into(),
            })?;

        let item = DownloadItem::mirrored(
            self.source,
            download.url.clone(),
            self.dir.client_jar_path(name),
        )
        .with_sha1(download.sha1.clone())
        .with_size(download.size);
        self.downloader
            .run_batch(vec![item], CollisionPolicy::Skip)
            .await?;
        Ok(())
    }

    /// `None` for artifacts that are produced locally and have no URL.
    fn library_item(&self, artifact: &Artifact) -> Option<DownloadItem> {
        if artifact.url.is_empty() {
            return None;
        }
        Some(
            DownloadItem::mirrored(
                self.source,
                artifact.url.clone(),
                self.dir.library_path(&artifact.path),
            )
            .with_sha1(artifact.sha1.clone())
            .with_size(artifact.size),
        )
    }

    /// Download `items` as the current stage, one `complete_one_file` per
    /// finished item.
    async fn download_stage(&self, task: &InstallTask, items: Vec<DownloadItem>) -> LauncherResult<()> {
        let total = items.len();
        task.set_total_files(total);
        if total == 0 {
            task.set_stage_percentage(1.0);
            return Ok(());
        }

        // Item callbacks are 'static; completions reach the task through a channel.
        let done = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<usize>();
        let counter = Arc::clone(&done);
        let observer = BatchObserver {
            progress: None,
            on_item_done: Some(Arc::new(move |_: &Path| {
                let finished = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = tx.send(finished);
            })),
        };

        let batch = self
            .downloader
            .run_batch_observed(items, CollisionPolicy::Skip, observer);
        tokio::pin!(batch);

        let report = loop {
            tokio::select! {
                result = &mut batch => break result?,
                Some(finished) = rx.recv() => {
                    task.complete_one_file();
                    task.set_stage_percentage(finished as f64 / total as f64);
                }
            }
        };
        while let Ok(finished) = rx.try_recv() {
            task.complete_one_file();
            task.set_stage_percentage(finished as f64 / total as f64);
        }

        debug!(
            "Stage {}: {} fetched, {} skipped",
            task.stage(),
            report.fetched,
            report.skipped
        );
        Ok(())
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> LauncherResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| LauncherError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::sha1_hex;
    use crate::core::downloader::testing::MemoryFetcher;
    use crate::core::version::{Arch, OsName, VersionType};

    const VERSION_URL: &str = "https://piston-meta.mojang.com/v1/packages/abc/1.20.1.json";
    const INDEX_URL: &str = "https://piston-meta.mojang.com/v1/packages/def/5.json";
    const CLIENT_URL: &str = "https://piston-data.mojang.com/v1/objects/123/client.jar";
    const LIB_URL: &str = "https://libraries.minecraft.net/com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar";

    fn entry() -> VersionEntry {
        VersionEntry {
            id: "1.20.1".into(),
            version_type: VersionType::Release,
            url: VERSION_URL.into(),
            time: chrono::Utc::now(),
            release_time: chrono::Utc::now(),
            sha1: None,
        }
    }

    fn fetcher() -> MemoryFetcher {
        let index = serde_json::json!({
            "objects": {
                "icons/icon_16x16.png": {"hash": sha1_hex(b"icon"), "size": 4},
                "icons/copy.png": {"hash": sha1_hex(b"icon"), "size": 4},
                "lang/en_us.json": {"hash": sha1_hex(b"{}"), "size": 2}
            }
        })
        .to_string();
        let version = serde_json::json!({
            "id": "1.20.1",
            "mainClass": "net.minecraft.client.main.Main",
            "arguments": {"game": [], "jvm": []},
            "assetIndex": {"id": "5", "url": INDEX_URL, "sha1": sha1_hex(index.as_bytes())},
            "downloads": {"client": {"url": CLIENT_URL, "sha1": sha1_hex(b"client")}},
            "libraries": [
                {
                    "name": "com.mojang:brigadier:1.1.8",
                    "downloads": {"artifact": {
                        "path": "com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar",
                        "url": LIB_URL,
                        "sha1": sha1_hex(b"brigadier")
                    }}
                },
                {
                    "name": "ca.weblite:java-objc-bridge:1.1",
                    "downloads": {"artifact": {
                        "path": "ca/weblite/java-objc-bridge/1.1/java-objc-bridge-1.1.jar",
                        "url": "https://libraries.minecraft.net/ca/weblite/java-objc-bridge/1.1/java-objc-bridge-1.1.jar"
                    }},
                    "rules": [{"action": "allow", "os": {"name": "osx"}}]
                }
            ]
        })
        .to_string();

        MemoryFetcher::new()
            .with_file(VERSION_URL, version.as_bytes())
            .with_file(INDEX_URL, index.as_bytes())
            .with_file(CLIENT_URL, b"client")
            .with_file(LIB_URL, b"brigadier")
            .with_file(
                &format!("https://resources.download.minecraft.net/{}/{}", &sha1_hex(b"icon")[..2], sha1_hex(b"icon")),
                b"icon",
            )
            .with_file(
                &format!("https://resources.download.minecraft.net/{}/{}", &sha1_hex(b"{}")[..2], sha1_hex(b"{}")),
                b"{}",
            )
    }

    fn installer(root: &Path, fetcher: Arc<MemoryFetcher>) -> MinecraftInstaller {
        MinecraftInstaller::new(fetcher, MinecraftDirectory::new(root))
            .with_source(DownloadSource::Official)
            .with_platform(Platform::new(OsName::Linux, Arch::X86_64))
            .with_cache(InstallerCache::new(root.join("cache")))
    }

    #[tokio::test]
    async fn vanilla_install_walks_every_stage() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(fetcher());
        let installer = installer(tmp.path(), Arc::clone(&fetcher));
        let request = MinecraftInstall::new(entry(), "pack");
        let task = MinecraftInstaller::create_task(&request);

        installer.install(&task, &request).await.unwrap();

        let dir = MinecraftDirectory::new(tmp.path());
        assert!(dir.manifest_path("pack").is_file());
        assert!(dir.asset_index_path("5").is_file());
        assert_eq!(std::fs::read(dir.client_jar_path("pack")).unwrap(), b"client");
        assert!(dir.asset_object_path(&sha1_hex(b"icon")).is_file());
        assert!(dir
            .library_path("com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar")
            .is_file());
        assert!(!dir
            .library_path("ca/weblite/java-objc-bridge/1.1/java-objc-bridge-1.1.jar")
            .exists());
        assert!(dir.natives_dir("pack").is_dir());

        let snapshot = task.snapshot();
        assert_eq!(snapshot.stage, InstallStage::End);
        assert!(snapshot.failure.is_none());
        assert_eq!(snapshot.remaining_files, 0);
    }

    #[tokio::test]
    async fn skipped_resources_fetch_no_objects() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(fetcher());
        let installer = installer(tmp.path(), Arc::clone(&fetcher));
        let mut request = MinecraftInstall::new(entry(), "pack");
        request.skip_resources = true;
        assert!(!request.stages().contains(&InstallStage::ClientResources));

        let task = MinecraftInstaller::create_task(&request);
        installer.install(&task, &request).await.unwrap();

        assert!(fetcher
            .attempts()
            .iter()
            .all(|url| !url.starts_with("https://resources.download.minecraft.net")));
    }

    #[tokio::test]
    async fn missing_client_jar_fails_in_its_stage() {
        let tmp = tempfile::tempdir().unwrap();
        let version = serde_json::json!({
            "id": "1.20.1",
            "mainClass": "net.minecraft.client.main.Main",
            "arguments": {"game": [], "jvm": []},
            "libraries": []
        })
        .to_string();
        let fetcher = Arc::new(MemoryFetcher::new().with_file(VERSION_URL, version.as_bytes()));
        let installer = installer(tmp.path(), fetcher);
        let request = MinecraftInstall::new(entry(), "pack");
        let task = MinecraftInstaller::create_task(&request);

        let err = installer.install(&task, &request).await.unwrap_err();
        assert!(matches!(err, LauncherError::MalformedManifest { .. }));

        let snapshot = task.snapshot();
        assert_eq!(snapshot.stage, InstallStage::ClientJar);
        assert!(snapshot.failure.is_some());
    }

    #[test]
    fn fabric_adds_its_stage() {
        let request = MinecraftInstall::new(entry(), "pack").with_fabric("0.15.0");
        let stages = request.stages();
        let fabric = stages
            .iter()
            .position(|s| *s == InstallStage::InstallFabric)
            .unwrap();
        assert_eq!(stages[fabric - 1], InstallStage::ClientJar);
        assert_eq!(stages[fabric + 1], InstallStage::ClientResources);
    }
}
