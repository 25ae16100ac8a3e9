use serde::{Deserialize, Serialize};

const BMCLAPI_ROOT: &str = "https://bmclapi2.bangbang93.com";

/// Official host → BMCLAPI mirror path. Order matters: longer roots first.
const BMCLAPI_ROOTS: &[(&str, &str)] = &[
    ("https://piston-meta.mojang.com", ""),
    ("https://piston-data.mojang.com", ""),
    ("https://launchermeta.mojang.com", ""),
    ("https://launcher.mojang.com", ""),
    ("https://libraries.minecraft.net", "/maven"),
    ("https://resources.download.minecraft.net", "/assets"),
    ("https://maven.minecraftforge.net", "/maven"),
    ("https://files.minecraftforge.net/maven", "/maven"),
    ("https://maven.neoforged.net/releases", "/maven"),
    ("https://maven.fabricmc.net", "/maven"),
    ("https://meta.fabricmc.net", "/fabric-meta"),
];

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

/// Where downloads are fetched from. Every URL in the engine is expressed
/// against the official hosts and rewritten per source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DownloadSource {
    #[default]
    Official,
    Bmclapi,
}

impl DownloadSource {
    /// Rewrite an official URL for this source. URLs on unknown hosts pass
    /// through unchanged.
    pub fn rewrite(self, official_url: &str) -> String {
        match self {
            DownloadSource::Official => official_url.to_string(),
            DownloadSource::Bmclapi => {
                for (root, mirror_path) in BMCLAPI_ROOTS {
                    if let Some(rest) = official_url.strip_prefix(root) {
                        return format!("{}{}{}", BMCLAPI_ROOT, mirror_path, rest);
                    }
                }
                official_url.to_string()
            }
        }
    }

    pub fn version_manifest_url(self) -> String {
        self.rewrite(VERSION_MANIFEST_URL)
    }

    /// Source to retry against when this one fails. `None` for the
    /// official source itself.
    pub fn fallback(self) -> Option<DownloadSource> {
        match self {
            DownloadSource::Official => None,
            DownloadSource::Bmclapi => Some(DownloadSource::Official),
        }
    }
}
