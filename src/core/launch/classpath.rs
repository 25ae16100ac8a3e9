// ─── Classpath Builder ───
// Deterministic launch classpath: one jar per library coordinate, the
// numerically newest version winning, the instance's own jar last.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::layout::MinecraftDirectory;
use crate::core::maven::{compare_versions, MavenArtifact};
use crate::core::version::{ClientManifest, FeatureSet, Platform};

/// Platform-specific Java classpath separator.
pub fn classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

/// Newest-version-wins reducer keyed by `group:artifact[:classifier]`.
/// Entries keep the position of the first coordinate seen for their key.
#[derive(Debug, Default)]
struct ClasspathReducer {
    index: HashMap<String, usize>,
    entries: Vec<(String, PathBuf)>,
}

impl ClasspathReducer {
    fn offer(&mut self, coord: &MavenArtifact, path: PathBuf) {
        let key = match &coord.classifier {
            Some(classifier) => format!("{}:{}", coord.key(), classifier),
            None => coord.key(),
        };

        match self.index.get(&key) {
            Some(&slot) => {
                let (current, _) = &self.entries[slot];
                if compare_versions(&coord.version, current).is_gt() {
                    debug!("Classpath: {} {} replaces {}", key, coord.version, current);
                    self.entries[slot] = (coord.version.clone(), path);
                }
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((coord.version.clone(), path));
            }
        }
    }

    fn into_paths(self) -> Vec<PathBuf> {
        self.entries.into_iter().map(|(_, path)| path).collect()
    }
}

/// Ordered classpath entries for `manifest`.
///
/// `extra_coords` go through the same reducer and can override manifest
/// versions. `client_jar` is always appended last.
pub fn classpath_entries(
    manifest: &ClientManifest,
    dir: &MinecraftDirectory,
    client_jar: &Path,
    extra_coords: &[String],
    platform: &Platform,
    features: &FeatureSet,
) -> LauncherResult<Vec<PathBuf>> {
    let mut reducer = ClasspathReducer::default();

    for lib in manifest.needed_libraries(platform, features) {
        let Some(artifact) = &lib.artifact else {
            continue;
        };
        let coord = lib.coordinate()?;
        reducer.offer(&coord, dir.library_path(&artifact.path));
    }

    for raw in extra_coords {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        match MavenArtifact::parse(trimmed) {
            Ok(coord) => {
                let path = dir.library_path(&coord.relative_path());
                reducer.offer(&coord, path);
            }
            Err(e) => warn!("Ignoring additional library {}: {}", trimmed, e),
        }
    }

    let mut entries = reducer.into_paths();
    entries.push(client_jar.to_path_buf());
    Ok(entries)
}

/// [`classpath_entries`] joined with the platform separator.
pub fn build_classpath(
    manifest: &ClientManifest,
    dir: &MinecraftDirectory,
    client_jar: &Path,
    extra_coords: &[String],
    platform: &Platform,
    features: &FeatureSet,
) -> LauncherResult<String> {
    let entries = classpath_entries(manifest, dir, client_jar, extra_coords, platform, features)?;
    Ok(entries
        .iter()
        .map(|p| safe_path_str(p))
        .collect::<Vec<_>>()
        .join(classpath_separator()))
}

/// Extract every native jar of `manifest` into `natives_dir`, replacing
/// its previous content. `META-INF/` entries are skipped.
pub async fn extract_natives(
    manifest: &ClientManifest,
    dir: &MinecraftDirectory,
    natives_dir: &Path,
    platform: &Platform,
) -> LauncherResult<usize> {
    if tokio::fs::try_exists(natives_dir).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(natives_dir)
            .await
            .map_err(|e| LauncherError::io(natives_dir, e))?;
    }
    tokio::fs::create_dir_all(natives_dir)
        .await
        .map_err(|e| LauncherError::io(natives_dir, e))?;

    let mut extracted = 0;
    for (lib, artifact) in manifest.needed_natives(platform) {
        let jar_path = dir.library_path(&artifact.path);
        let bytes = tokio::fs::read(&jar_path)
            .await
            .map_err(|e| LauncherError::io(&jar_path, e))?;

        let dest = natives_dir.to_path_buf();
        let count = tokio::task::spawn_blocking(move || extract_jar(&bytes, &dest))
            .await
            .map_err(|e| LauncherError::Other(format!("Task join error: {}", e)))??;
        debug!("Extracted {} native files from {}", count, lib.name);
        extracted += count;
    }
    Ok(extracted)
}

fn extract_jar(bytes: &[u8], dest: &Path) -> LauncherResult<usize> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;
    let mut count = 0;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() || file.name().starts_with("META-INF/") {
            continue;
        }
        let Some(relative) = file.enclosed_name() else {
            warn!("Skipping native entry with unsafe path: {}", file.name());
            continue;
        };

        let out_path = dest.join(relative);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)
            .map_err(|e| LauncherError::io(&out_path, e))?;
        std::fs::write(&out_path, buf).map_err(|e| LauncherError::io(&out_path, e))?;
        count += 1;
    }
    Ok(count)
}

/// Path as a classpath string. Windows extended-length prefixes are
/// stripped since Java fails to resolve classes through them.
pub fn safe_path_str(path: &Path) -> String {
    let text = path.to_string_lossy().to_string();

    #[cfg(target_os = "windows")]
    {
        if let Some(stripped) = text.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::{Arch, OsName};

    const LINUX: Platform = Platform::new(OsName::Linux, Arch::X86_64);

    fn manifest(libraries: serde_json::Value) -> ClientManifest {
        let raw = serde_json::json!({
            "id": "1.20.1",
            "mainClass": "net.minecraft.client.main.Main",
            "arguments": {"game": [], "jvm": []},
            "libraries": libraries,
        });
        ClientManifest::parse(raw.to_string().as_bytes(), "test").unwrap()
    }

    fn lib(name: &str) -> serde_json::Value {
        let coord = MavenArtifact::parse(name).unwrap();
        serde_json::json!({
            "name": name,
            "downloads": {"artifact": {"path": coord.relative_path(), "url": ""}}
        })
    }

    fn entries(m: &ClientManifest, extra: &[String]) -> Vec<PathBuf> {
        let dir = MinecraftDirectory::new("/mc");
        classpath_entries(
            m,
            &dir,
            Path::new("/mc/versions/pack/pack.jar"),
            extra,
            &LINUX,
            &FeatureSet::new(),
        )
        .unwrap()
    }

    #[test]
    fn numerically_newest_duplicate_wins() {
        let m = manifest(serde_json::json!([lib("foo:bar:1.2"), lib("foo:bar:1.10")]));
        let paths = entries(&m, &[]);

        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("foo/bar/1.10/bar-1.10.jar"));
        assert_eq!(paths[1], PathBuf::from("/mc/versions/pack/pack.jar"));
    }

    #[test]
    fn extra_coordinates_override_older_manifest_versions() {
        let m = manifest(serde_json::json!([
            lib("org.ow2.asm:asm:9.5"),
            lib("com.mojang:brigadier:1.1.8")
        ]));
        let paths = entries(&m, &["org.ow2.asm:asm:9.7".into(), "org.ow2.asm:asm:9.1".into()]);

        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("org/ow2/asm/asm/9.7/asm-9.7.jar"));
        assert!(paths[1].ends_with("com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar"));
    }

    #[test]
    fn classifier_jars_are_kept_beside_the_main_jar() {
        let m = manifest(serde_json::json!([
            lib("org.lwjgl:lwjgl:3.3.1"),
            lib("org.lwjgl:lwjgl:3.3.1:natives-linux")
        ]));
        assert_eq!(entries(&m, &[]).len(), 3);
    }

    #[test]
    fn joined_with_platform_separator() {
        let m = manifest(serde_json::json!([lib("foo:bar:1.0")]));
        let dir = MinecraftDirectory::new("/mc");
        let cp = build_classpath(
            &m,
            &dir,
            Path::new("/mc/versions/pack/pack.jar"),
            &[],
            &LINUX,
            &FeatureSet::new(),
        )
        .unwrap();
        assert_eq!(cp.split(classpath_separator()).count(), 2);
    }

    #[tokio::test]
    async fn natives_are_extracted_without_meta_inf() {
        use std::io::Write;

        let tmp = tempfile::tempdir().unwrap();
        let dir = MinecraftDirectory::new(tmp.path());
        let jar_rel = "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar";

        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("META-INF/MANIFEST.MF", options).unwrap();
        writer.write_all(b"Manifest-Version: 1.0").unwrap();
        writer.start_file("linux/x64/org/lwjgl/liblwjgl.so", options).unwrap();
        writer.write_all(b"elf").unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        let jar_path = dir.library_path(jar_rel);
        std::fs::create_dir_all(jar_path.parent().unwrap()).unwrap();
        std::fs::write(&jar_path, bytes).unwrap();

        let m = manifest(serde_json::json!([{
            "name": "org.lwjgl:lwjgl:3.3.1",
            "natives": {"linux": "natives-linux"},
            "downloads": {"classifiers": {"natives-linux": {"path": jar_rel, "url": ""}}}
        }]));

        let natives = tmp.path().join("natives");
        std::fs::create_dir_all(&natives).unwrap();
        std::fs::write(natives.join("stale.so"), b"old").unwrap();

        let count = extract_natives(&m, &dir, &natives, &LINUX).await.unwrap();
        assert_eq!(count, 1);
        assert!(natives.join("linux/x64/org/lwjgl/liblwjgl.so").is_file());
        assert!(!natives.join("META-INF").exists());
        assert!(!natives.join("stale.so").exists());
    }
}
