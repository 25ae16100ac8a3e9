use std::path::{Path, PathBuf};

/// Per-instance hidden directory holding the base-version manifest copy.
pub const HIDDEN_DIR: &str = ".mcinstall";

/// Per-instance hidden config file.
pub const INSTANCE_CONFIG_FILE: &str = ".mcinstall.json";

/// On-disk layout of a `.minecraft` root.
///
/// ```text
/// <root>/versions/<name>/<name>.json   manifest
/// <root>/versions/<name>/<name>.jar    primary artifact
/// <root>/versions/<name>/natives/      extracted natives
/// <root>/libraries/<maven path>
/// <root>/assets/{indexes,objects}/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinecraftDirectory {
    root: PathBuf,
}

impl MinecraftDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn asset_index_path(&self, id: &str) -> PathBuf {
        self.assets_dir().join("indexes").join(format!("{}.json", id))
    }

    /// `assets/objects/<first two hex chars>/<hash>`
    pub fn asset_object_path(&self, hash: &str) -> PathBuf {
        let prefix = hash.get(..2).unwrap_or(hash);
        self.assets_dir().join("objects").join(prefix).join(hash)
    }

    pub fn instance_dir(&self, name: &str) -> PathBuf {
        self.versions_dir().join(name)
    }

    pub fn manifest_path(&self, name: &str) -> PathBuf {
        self.instance_dir(name).join(format!("{}.json", name))
    }

    pub fn client_jar_path(&self, name: &str) -> PathBuf {
        self.instance_dir(name).join(format!("{}.jar", name))
    }

    pub fn natives_dir(&self, name: &str) -> PathBuf {
        self.instance_dir(name).join("natives")
    }

    pub fn instance_config_path(&self, name: &str) -> PathBuf {
        self.instance_dir(name).join(INSTANCE_CONFIG_FILE)
    }

    /// Hidden copy of the base manifest an instance was spliced from.
    pub fn base_manifest_copy(&self, name: &str, base_id: &str) -> PathBuf {
        hidden_base_copy(&self.instance_dir(name), base_id)
    }

    /// Resolve a `/`-separated library path under `libraries/`.
    pub fn library_path(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.libraries_dir(), |path, part| path.join(part))
    }
}

pub fn hidden_base_copy(instance_dir: &Path, base_id: &str) -> PathBuf {
    instance_dir.join(HIDDEN_DIR).join(format!("{}.json", base_id))
}
