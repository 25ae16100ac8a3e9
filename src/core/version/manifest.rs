// ─── Version Manifest ───
// Handles fetching and parsing the Mojang version manifest.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::downloader::{fetch_mirrored, DownloadSource, Fetcher, VERSION_MANIFEST_URL};
use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Release,
    Snapshot,
    OldBeta,
    OldAlpha,
    AprilFool,
}

/// Top-level Mojang version manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionManifest {
    pub latest: LatestVersions,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// A single entry in the manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: VersionType,
    pub url: String,
    pub time: DateTime<Utc>,
    pub release_time: DateTime<Utc>,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionEntry {
    /// Joke versions are published on April 1st (UTC+2).
    pub fn is_april_fool(&self) -> bool {
        let shifted = self.release_time + Duration::hours(2);
        shifted.month() == 4 && shifted.day() == 1
    }
}

impl VersionManifest {
    pub fn from_slice(raw: &[u8]) -> LauncherResult<Self> {
        let mut manifest: VersionManifest =
            serde_json::from_slice(raw).map_err(|e| LauncherError::MalformedManifest {
                source_name: "version_manifest.json".into(),
                message: e.to_string(),
            })?;

        for entry in &mut manifest.versions {
            if entry.id.contains(" Pre-Release ") {
                entry.id = entry.id.replace(" Pre-Release ", "-pre");
            }
            if entry.is_april_fool() {
                entry.version_type = VersionType::AprilFool;
            }
        }
        Ok(manifest)
    }

    /// Fetch the version list from `source`, falling back to the official
    /// host once when a mirror fails.
    pub async fn fetch(fetcher: &dyn Fetcher, source: DownloadSource) -> LauncherResult<Self> {
        info!("Fetching Minecraft version manifest from {:?}...", source);

        let raw = fetch_mirrored(fetcher, source, VERSION_MANIFEST_URL).await?;
        let manifest = Self::from_slice(&raw)?;
        info!("Loaded {} versions from manifest", manifest.versions.len());
        Ok(manifest)
    }

    /// Find a specific version entry by ID (e.g. "1.20.4").
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    pub fn latest_release(&self) -> Option<&VersionEntry> {
        self.find_version(&self.latest.release)
    }

    pub fn latest_snapshot(&self) -> Option<&VersionEntry> {
        self.find_version(&self.latest.snapshot)
    }

    /// List all official stable versions (release only).
    pub fn releases(&self) -> Vec<&VersionEntry> {
        self.versions
            .iter()
            .filter(|v| v.version_type == VersionType::Release)
            .collect()
    }
}
