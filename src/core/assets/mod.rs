// ─── Asset Index ───
// Maps the asset index of a version onto download items for
// `assets/objects/<xx>/<hash>`.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::core::downloader::{DownloadItem, DownloadSource};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::layout::MinecraftDirectory;

const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

/// Top-level asset index JSON structure.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: BTreeMap<String, AssetObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    pub fn official_url(&self) -> String {
        let prefix = self.hash.get(..2).unwrap_or(&self.hash);
        format!("{}/{}/{}", RESOURCES_URL, prefix, self.hash)
    }
}

impl AssetIndex {
    pub fn from_slice(raw: &[u8], id: &str) -> LauncherResult<Self> {
        serde_json::from_slice(raw).map_err(|e| LauncherError::MalformedManifest {
            source_name: format!("assets/indexes/{}.json", id),
            message: e.to_string(),
        })
    }

    /// One item per distinct object. Objects shared by several names are
    /// listed once.
    pub fn download_items(
        &self,
        dir: &MinecraftDirectory,
        source: DownloadSource,
    ) -> Vec<DownloadItem> {
        let mut seen = std::collections::HashSet::new();
        self.objects
            .values()
            .filter(|obj| seen.insert(obj.hash.clone()))
            .map(|obj| {
                DownloadItem::mirrored(source, obj.official_url(), dir.asset_object_path(&obj.hash))
                    .with_sha1(Some(obj.hash.clone()))
                    .with_size(Some(obj.size))
            })
            .collect()
    }

    pub fn total_size(&self) -> u64 {
        self.objects.values().map(|o| o.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn objects_map_to_hashed_paths_and_mirror_urls() {
        let raw = serde_json::json!({
            "objects": {
                "icons/icon_16x16.png": {"hash": "bdf48ef6b5d0d23bbb02e17d04865216179f510a", "size": 3665},
                "icons/copy_of_icon.png": {"hash": "bdf48ef6b5d0d23bbb02e17d04865216179f510a", "size": 3665},
                "minecraft/sounds/ambient/cave/cave1.ogg": {"hash": "abc123", "size": 10}
            }
        });
        let index = AssetIndex::from_slice(raw.to_string().as_bytes(), "5").unwrap();
        let dir = MinecraftDirectory::new("/mc");

        let items = index.download_items(&dir, DownloadSource::Bmclapi);
        assert_eq!(items.len(), 2);

        let icon = items
            .iter()
            .find(|i| i.sha1.as_deref() == Some("bdf48ef6b5d0d23bbb02e17d04865216179f510a"))
            .unwrap();
        assert_eq!(
            icon.dest,
            PathBuf::from("/mc/assets/objects/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a")
        );
        assert_eq!(
            icon.url,
            "https://bmclapi2.bangbang93.com/assets/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a"
        );
        assert!(icon.has_fallback());
        assert_eq!(index.total_size(), 3665 * 2 + 10);
    }
}
