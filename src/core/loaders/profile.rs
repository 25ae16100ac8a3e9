// ─── Install Profile ───
// `install_profile.json` as shipped inside Forge and NeoForge installer jars,
// in both the modern (data + processors) and legacy (install + versionInfo)
// schema, plus materialization of the `data` templates.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::install::scratch::ScratchDir;
use crate::core::instance::layout::MinecraftDirectory;
use crate::core::maven::MavenArtifact;
use crate::core::version::client_manifest::RawLibrary;
use crate::core::version::Library;

pub const INSTALL_PROFILE_ENTRY: &str = "install_profile.json";
const DEFAULT_VERSION_ENTRY: &str = "/version.json";

/// An installer jar held in memory.
pub struct InstallerJar {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl InstallerJar {
    pub async fn open(path: &Path) -> LauncherResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        Ok(Self::from_bytes(path, bytes))
    }

    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one entry. Leading `/` is ignored.
    pub fn read_entry(&self, name: &str) -> LauncherResult<Vec<u8>> {
        let name = name.trim_start_matches('/');
        let mut archive = zip::ZipArchive::new(Cursor::new(self.bytes.as_slice()))?;
        let mut file = archive.by_name(name).map_err(|e| {
            LauncherError::MalformedProfile(format!(
                "{} missing from {}: {}",
                name,
                self.path.display(),
                e
            ))
        })?;

        let mut out = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut out)
            .map_err(|e| LauncherError::io(&self.path, e))?;
        Ok(out)
    }

    /// Copy one entry out of the jar to `dest`.
    pub async fn extract_entry(&self, name: &str, dest: &Path) -> LauncherResult<()> {
        let bytes = self.read_entry(name)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::write(dest, bytes)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;
        debug!("Extracted {} -> {:?}", name, dest);
        Ok(())
    }

    pub fn install_profile(&self) -> LauncherResult<InstallProfile> {
        InstallProfile::from_slice(&self.read_entry(INSTALL_PROFILE_ENTRY)?)
    }
}

/// Parsed `install_profile.json`.
#[derive(Debug)]
pub enum InstallProfile {
    /// 1.12.2+ installers: libraries, templated data and processors.
    Modern(ModernProfile),
    /// Older installers embedding a ready-made manifest.
    Legacy(LegacyProfile),
}

impl InstallProfile {
    pub fn from_slice(raw: &[u8]) -> LauncherResult<Self> {
        let value: serde_json::Value = serde_json::from_slice(raw)
            .map_err(|e| LauncherError::MalformedProfile(e.to_string()))?;

        let legacy = value.get("install").is_some() && value.get("versionInfo").is_some();
        let profile = if legacy {
            serde_json::from_value(value).map(InstallProfile::Legacy)
        } else {
            serde_json::from_value(value).map(InstallProfile::Modern)
        };
        profile.map_err(|e| LauncherError::MalformedProfile(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModernProfile {
    #[serde(default)]
    pub minecraft: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Jar-internal path of the manifest to splice in.
    #[serde(default)]
    pub json: Option<String>,
    #[serde(default)]
    pub data: BTreeMap<String, DataEntry>,
    #[serde(default)]
    pub processors: Vec<Processor>,
    #[serde(default)]
    pub(crate) libraries: Vec<RawLibrary>,
}

impl ModernProfile {
    pub fn version_entry(&self) -> &str {
        self.json.as_deref().unwrap_or(DEFAULT_VERSION_ENTRY)
    }

    pub fn libraries(&self) -> LauncherResult<Vec<Library>> {
        self.libraries
            .iter()
            .cloned()
            .map(RawLibrary::normalize)
            .collect()
    }

    /// Processors that run on the client, in declared order.
    pub fn client_processors(&self) -> impl Iterator<Item = &Processor> {
        self.processors.iter().filter(|p| p.is_client_available())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataEntry {
    pub client: String,
    #[serde(default)]
    pub server: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Processor {
    /// Maven coordinate of the processor jar.
    pub jar: String,
    #[serde(default)]
    pub classpath: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Absent means every side.
    #[serde(default)]
    pub sides: Option<Vec<String>>,
}

impl Processor {
    pub fn is_client_available(&self) -> bool {
        self.sides
            .as_ref()
            .map_or(true, |sides| sides.iter().any(|s| s == "client"))
    }

    /// The step that fetches the official mappings through the installer tool.
    pub fn is_download_mojmaps(&self) -> bool {
        self.args.iter().any(|a| a == "DOWNLOAD_MOJMAPS")
    }

    /// Raw value following `flag`, e.g. `--output`.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        let idx = self.args.iter().position(|a| a == flag)?;
        self.args.get(idx + 1).map(String::as_str)
    }

    /// Short label for logs: the `--task` value when present, else the jar.
    pub fn label(&self) -> &str {
        self.arg_after("--task").unwrap_or(&self.jar)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyProfile {
    pub install: LegacyInstall,
    pub version_info: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyInstall {
    /// Maven coordinate the universal jar is installed as.
    pub path: String,
    /// Name of the universal jar inside the installer.
    pub file_path: String,
    #[serde(default)]
    pub minecraft: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

impl LegacyProfile {
    /// Extract the universal jar to its library path. Returns that path.
    pub async fn install_universal(
        &self,
        jar: &InstallerJar,
        dir: &MinecraftDirectory,
    ) -> LauncherResult<PathBuf> {
        let artifact = MavenArtifact::parse(&self.install.path)?;
        let dest = dir.libraries_dir().join(artifact.local_path());
        jar.extract_entry(&self.install.file_path, &dest).await?;
        Ok(dest)
    }

    pub fn manifest_bytes(&self) -> LauncherResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.version_info)?)
    }
}

fn unwrap_delimited(raw: &str, open: char, close: char) -> Option<&str> {
    raw.strip_prefix(open)?.strip_suffix(close)
}

pub(crate) fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Resolve every client-side `data` entry into a key → value map:
///
/// - `[coord]` → absolute path of that library under `libraries/`
/// - `'text'` → `text`
/// - `/path/in/jar` → extracted into `scratch`, value is the extracted path
///
/// Values in any other format are skipped with a warning.
pub async fn materialize_data(
    data: &BTreeMap<String, DataEntry>,
    dir: &MinecraftDirectory,
    jar: &InstallerJar,
    scratch: &ScratchDir,
) -> LauncherResult<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();

    for (key, entry) in data {
        let raw = entry.client.as_str();
        if let Some(coord) = unwrap_delimited(raw, '[', ']') {
            let artifact = MavenArtifact::parse(coord)?;
            let path = dir.libraries_dir().join(artifact.local_path());
            values.insert(key.clone(), path_string(&path));
        } else if let Some(literal) = unwrap_delimited(raw, '\'', '\'') {
            values.insert(key.clone(), literal.to_string());
        } else if raw.starts_with('/') {
            let dest = scratch.entry_path(raw);
            jar.extract_entry(raw, &dest).await?;
            values.insert(key.clone(), path_string(&dest));
        } else {
            warn!("Unrecognized install profile value for {}: {}", key, raw);
        }
    }

    Ok(values)
}
