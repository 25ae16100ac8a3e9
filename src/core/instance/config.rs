use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::layout::MinecraftDirectory;
use super::model::{LoaderType, ProcessPriority};
use crate::core::downloader::DownloadSource;
use crate::core::error::{LauncherError, LauncherResult};

const APP_DIR_NAME: &str = "mcinstall";
const CONFIG_FILE: &str = "launcher_config.json";

pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_MAX_MEMORY_MB: u32 = 2048;

/// Launcher-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LauncherConfig {
    pub minecraft_dir: PathBuf,
    pub concurrency: usize,
    pub download_source: DownloadSource,
    pub launcher_name: String,
    pub launcher_version: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            minecraft_dir: default_base_dir().join(".minecraft"),
            concurrency: DEFAULT_CONCURRENCY,
            download_source: DownloadSource::Official,
            launcher_name: APP_DIR_NAME.to_string(),
            launcher_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl LauncherConfig {
    /// `<data dir>/mcinstall/launcher_config.json`.
    pub fn default_path() -> PathBuf {
        default_base_dir().join(CONFIG_FILE)
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub async fn load(path: &Path) -> LauncherResult<Self> {
        load_or_default(path).await
    }

    pub async fn save(&self, path: &Path) -> LauncherResult<()> {
        save_pretty(self, path).await
    }

    pub fn directory(&self) -> MinecraftDirectory {
        MinecraftDirectory::new(&self.minecraft_dir)
    }
}

/// Settings local to one instance, stored hidden next to its manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct InstanceConfig {
    pub name: String,
    pub minecraft_version: Option<String>,
    pub main_class: Option<String>,
    /// Coordinates appended to the classpath, overriding manifest versions.
    pub additional_libraries: Vec<String>,
    pub java_path: Option<PathBuf>,
    pub max_memory_mb: u32,
    pub priority: ProcessPriority,
    pub client_brand: LoaderType,
    pub skip_resource_check: bool,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            minecraft_version: None,
            main_class: None,
            additional_libraries: Vec::new(),
            java_path: None,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            priority: ProcessPriority::Normal,
            client_brand: LoaderType::Vanilla,
            skip_resource_check: false,
        }
    }
}

impl InstanceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Load the config of instance `name`; defaults when it has none yet.
    pub async fn load(dir: &MinecraftDirectory, name: &str) -> LauncherResult<Self> {
        let mut config: Self = load_or_default(&dir.instance_config_path(name)).await?;
        if config.name.is_empty() {
            config.name = name.to_string();
        }
        Ok(config)
    }

    pub async fn save(&self, dir: &MinecraftDirectory) -> LauncherResult<()> {
        save_pretty(self, &dir.instance_config_path(&self.name)).await
    }
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

async fn load_or_default<T>(path: &Path) -> LauncherResult<T>
where
    T: Default + for<'de> Deserialize<'de>,
{
    match tokio::fs::read(path).await {
        Ok(raw) => Ok(serde_json::from_slice(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No config at {:?}, using defaults", path);
            Ok(T::default())
        }
        Err(e) => Err(LauncherError::io(path, e)),
    }
}

async fn save_pretty<T: Serialize>(value: &T, path: &Path) -> LauncherResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| LauncherError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_instance_config_loads_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = MinecraftDirectory::new(tmp.path());

        let config = InstanceConfig::load(&dir, "pack").await.unwrap();
        assert_eq!(config.name, "pack");
        assert_eq!(config.max_memory_mb, DEFAULT_MAX_MEMORY_MB);
        assert_eq!(config.client_brand, LoaderType::Vanilla);
    }

    #[tokio::test]
    async fn instance_config_round_trips_through_hidden_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = MinecraftDirectory::new(tmp.path());

        let mut config = InstanceConfig::new("pack");
        config.client_brand = LoaderType::Fabric;
        config.priority = ProcessPriority::High;
        config.additional_libraries = vec!["org.lwjgl:lwjgl:3.3.3".into()];
        config.save(&dir).await.unwrap();

        let raw = std::fs::read_to_string(dir.instance_config_path("pack")).unwrap();
        assert!(raw.contains("\"clientBrand\": \"fabric\""));
        assert_eq!(InstanceConfig::load(&dir, "pack").await.unwrap(), config);
    }

    #[tokio::test]
    async fn partial_launcher_config_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("launcher_config.json");
        std::fs::write(&path, br#"{"download_source":"bmclapi"}"#).unwrap();

        let config = LauncherConfig::load(&path).await.unwrap();
        assert_eq!(config.download_source, DownloadSource::Bmclapi);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    }
}
