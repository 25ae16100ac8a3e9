// ─── Manifest Resolver ───
// Resolves `inheritsFrom` chains against the shared version store and keeps
// a memoization map of resolved manifests keyed by path.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::layout::hidden_base_copy;

use super::client_manifest::{ClientManifest, RawManifest};

/// Inheritance chains longer than this are treated as malformed.
const MAX_INHERITANCE_DEPTH: usize = 8;

pub struct ManifestResolver {
    versions_dir: PathBuf,
    cache: HashMap<PathBuf, Arc<ClientManifest>>,
}

impl ManifestResolver {
    pub fn new(versions_dir: impl Into<PathBuf>) -> Self {
        Self {
            versions_dir: versions_dir.into(),
            cache: HashMap::new(),
        }
    }

    /// Parse raw manifest bytes, merging every ancestor named through
    /// `inheritsFrom`.
    ///
    /// Parents are looked up in the hidden base copy inside `instance_dir`
    /// (left there by a loader splice) first, then in `<versions>/<id>/<id>.json`.
    pub async fn parse(
        &self,
        raw: &[u8],
        source_name: &str,
        instance_dir: Option<&Path>,
    ) -> LauncherResult<ClientManifest> {
        let mut merged = RawManifest::from_slice(raw, source_name)?;
        let child = merged.id.clone().unwrap_or_else(|| source_name.to_string());

        // Keyed by file, since an instance may legitimately inherit from a
        // hidden copy of a version with its own id.
        let mut visited = HashSet::new();
        while let Some(parent_id) = merged.inherits_from.clone() {
            if visited.len() >= MAX_INHERITANCE_DEPTH {
                return Err(LauncherError::MalformedManifest {
                    source_name: source_name.to_string(),
                    message: "inheritance chain too deep".into(),
                });
            }

            let (parent_path, bytes) = self.read_parent(&child, &parent_id, instance_dir).await?;
            if !visited.insert(parent_path.clone()) {
                return Err(LauncherError::MalformedManifest {
                    source_name: source_name.to_string(),
                    message: format!("inheritance cycle through {}", parent_id),
                });
            }
            debug!("Merging {} over parent {:?}", child, parent_path);

            let parent = RawManifest::from_slice(&bytes, &parent_path.to_string_lossy())?;
            merged = merged.inherit(parent);
        }

        merged.normalize(source_name)
    }

    /// Load and resolve the manifest at `path`, memoized by path.
    pub async fn load(&mut self, path: &Path) -> LauncherResult<Arc<ClientManifest>> {
        if let Some(hit) = self.cache.get(path) {
            return Ok(Arc::clone(hit));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        let manifest = Arc::new(
            self.parse(&bytes, &path.to_string_lossy(), path.parent())
                .await?,
        );

        self.cache.insert(path.to_path_buf(), Arc::clone(&manifest));
        Ok(manifest)
    }

    /// Drop the memoized manifest for `path` (after a splice rewrote it).
    pub fn invalidate(&mut self, path: &Path) {
        self.cache.remove(path);
    }

    async fn read_parent(
        &self,
        child: &str,
        parent_id: &str,
        instance_dir: Option<&Path>,
    ) -> LauncherResult<(PathBuf, Vec<u8>)> {
        let shared = self
            .versions_dir
            .join(parent_id)
            .join(format!("{}.json", parent_id));

        // The instance's own copy wins; an instance named after its base
        // version would otherwise resolve to itself.
        let mut candidates = Vec::with_capacity(2);
        if let Some(dir) = instance_dir {
            candidates.push(hidden_base_copy(dir, parent_id));
        }
        candidates.push(shared.clone());

        for candidate in candidates {
            match tokio::fs::read(&candidate).await {
                Ok(bytes) => return Ok((candidate, bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(LauncherError::io(candidate, e)),
            }
        }

        Err(LauncherError::ParentNotFound {
            child: child.to_string(),
            parent: parent_id.to_string(),
            path: shared,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::rules::{Arch, FeatureSet, OsName, Platform};

    const LINUX: Platform = Platform::new(OsName::Linux, Arch::X86_64);

    fn write_json(path: &Path, value: serde_json::Value) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, value.to_string()).unwrap();
    }

    fn base(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "mainClass": "net.minecraft.client.main.Main",
            "arguments": {"game": ["--version", "${version_name}"], "jvm": ["-cp", "${classpath}"]},
            "libraries": [
                {"name": "org.ow2.asm:asm:9.3"},
                {"name": "com.mojang:brigadier:1.1.8"}
            ]
        })
    }

    #[tokio::test]
    async fn child_libraries_shadow_parent_and_arguments_concatenate() {
        let tmp = tempfile::tempdir().unwrap();
        let versions = tmp.path().join("versions");
        write_json(&versions.join("1.20.1/1.20.1.json"), base("1.20.1"));

        let child = serde_json::json!({
            "id": "fabric-loader-0.15.0-1.20.1",
            "inheritsFrom": "1.20.1",
            "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
            "arguments": {"game": [], "jvm": ["-DFabricMcEmu= net.minecraft.client.main.Main "]},
            "libraries": [{"name": "org.ow2.asm:asm:9.6", "url": "https://maven.fabricmc.net/"}]
        });

        let resolver = ManifestResolver::new(&versions);
        let m = resolver
            .parse(child.to_string().as_bytes(), "fabric.json", None)
            .await
            .unwrap();

        assert_eq!(m.main_class, "net.fabricmc.loader.impl.launch.knot.KnotClient");
        assert_eq!(m.inherits_from.as_deref(), Some("1.20.1"));
        let names: Vec<&str> = m
            .needed_libraries(&LINUX, &FeatureSet::new())
            .iter()
            .map(|l| l.name.as_str())
            .collect();
        assert_eq!(names, vec!["org.ow2.asm:asm:9.6", "com.mojang:brigadier:1.1.8"]);
        assert_eq!(
            m.jvm_arguments(&LINUX, &FeatureSet::new()),
            vec!["-cp", "${classpath}", "-DFabricMcEmu= net.minecraft.client.main.Main "]
        );
    }

    #[tokio::test]
    async fn missing_parent_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = ManifestResolver::new(tmp.path().join("versions"));
        let child = serde_json::json!({"id": "forge", "inheritsFrom": "1.20.1"});

        let err = resolver
            .parse(child.to_string().as_bytes(), "forge.json", None)
            .await
            .unwrap_err();
        match err {
            LauncherError::ParentNotFound { parent, .. } => assert_eq!(parent, "1.20.1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn cyclic_inheritance_is_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        let versions = tmp.path().join("versions");
        for (id, parent) in [("a", "b"), ("b", "a")] {
            let mut manifest = base(id);
            manifest["inheritsFrom"] = serde_json::json!(parent);
            write_json(&versions.join(id).join(format!("{id}.json")), manifest);
        }

        let mut resolver = ManifestResolver::new(&versions);
        let err = resolver
            .load(&versions.join("a").join("a.json"))
            .await
            .unwrap_err();
        match err {
            LauncherError::MalformedManifest { message, .. } => {
                assert!(message.contains("cycle"), "{message}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn self_named_instance_inherits_its_hidden_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let versions = tmp.path().join("versions");
        let instance = versions.join("1.20.1");
        write_json(&hidden_base_copy(&instance, "1.20.1"), base("1.20.1"));

        let child = serde_json::json!({
            "id": "1.20.1",
            "inheritsFrom": "1.20.1",
            "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient"
        });
        let m = ManifestResolver::new(&versions)
            .parse(child.to_string().as_bytes(), "1.20.1.json", Some(&instance))
            .await
            .unwrap();
        assert_eq!(m.main_class, "net.fabricmc.loader.impl.launch.knot.KnotClient");
    }

    #[tokio::test]
    async fn resolves_parent_from_hidden_base_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let versions = tmp.path().join("versions");
        let instance = versions.join("my-forge");
        write_json(&hidden_base_copy(&instance, "1.20.1"), base("1.20.1"));
        write_json(
            &instance.join("my-forge.json"),
            serde_json::json!({
                "id": "my-forge",
                "inheritsFrom": "1.20.1",
                "mainClass": "cpw.mods.bootstraplauncher.BootstrapLauncher",
                "arguments": {"game": ["--launchTarget", "forgeclient"]}
            }),
        );

        let mut resolver = ManifestResolver::new(&versions);
        let path = instance.join("my-forge.json");
        let first = resolver.load(&path).await.unwrap();
        assert_eq!(first.id, "my-forge");
        assert_eq!(
            first.game_arguments(&LINUX, &FeatureSet::new()),
            vec!["--version", "${version_name}", "--launchTarget", "forgeclient"]
        );

        let second = resolver.load(&path).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        resolver.invalidate(&path);
        let third = resolver.load(&path).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }
}
