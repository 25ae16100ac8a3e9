// ─── Client Manifest ───
// Parses a version JSON (vanilla, Fabric, Forge/NeoForge derivatives) into a
// normalized model. Rule filtering happens at query time.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::{compare_versions, MavenArtifact, MOJANG_LIBRARIES};

use super::rules::{rules_allow, FeatureSet, OsName, Platform, Rule};

/// JVM arguments synthesized for manifests that only carry the legacy
/// `minecraftArguments` string.
const LEGACY_JVM_ARGUMENTS: [&str; 3] = [
    "-Djava.library.path=${natives_directory}",
    "-cp",
    "${classpath}",
];

// ─── Normalized model ───

#[derive(Debug, Clone, PartialEq)]
pub struct ClientManifest {
    pub id: String,
    pub main_class: String,
    /// Root-most base version this manifest was merged with, if any.
    pub inherits_from: Option<String>,
    pub version_type: Option<String>,
    pub libraries: Vec<Library>,
    pub asset_index: Option<AssetIndexRef>,
    pub arguments: Arguments,
    pub client_download: Option<DownloadInfo>,
    pub client_mappings: Option<DownloadInfo>,
    pub java_major: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub name: String,
    /// Primary, platform-independent jar.
    pub artifact: Option<Artifact>,
    /// OS name → classifier template (`natives-linux`, `natives-windows-${arch}`).
    pub natives: BTreeMap<String, String>,
    pub classifiers: BTreeMap<String, Artifact>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Path relative to the libraries root, `/` separated.
    #[serde(default)]
    pub path: String,
    /// Empty for artifacts produced locally (e.g. by Forge processors).
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadInfo {
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexRef {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub total_size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Argument>,
    #[serde(default)]
    pub jvm: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Plain(String),
    Conditional { rules: Vec<Rule>, value: ArgumentValue },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    One(String),
    Many(Vec<String>),
}

impl Argument {
    fn values(&self, platform: &Platform, features: &FeatureSet) -> Vec<String> {
        match self {
            Argument::Plain(value) => vec![value.clone()],
            Argument::Conditional { rules, value } => {
                if !rules_allow(rules, platform, features) {
                    return vec![];
                }
                match value {
                    ArgumentValue::One(v) => vec![v.clone()],
                    ArgumentValue::Many(vs) => vs.clone(),
                }
            }
        }
    }
}

impl Library {
    pub fn coordinate(&self) -> LauncherResult<MavenArtifact> {
        MavenArtifact::parse(&self.name)
    }

    pub fn is_allowed(&self, platform: &Platform, features: &FeatureSet) -> bool {
        rules_allow(&self.rules, platform, features)
    }

    /// Classifier of the native jar for `platform`, with `${arch}` expanded.
    pub fn native_classifier(&self, platform: &Platform) -> Option<String> {
        if platform.os == OsName::Osx && !platform.is_default_arch() {
            let arm = "natives-macos-arm64";
            if self.classifiers.contains_key(arm) {
                return Some(arm.to_string());
            }
        }
        self.natives
            .get(platform.os.mojang_name())
            .map(|c| c.replace("${arch}", platform.arch.bits()))
    }

    pub fn native_artifact(&self, platform: &Platform) -> Option<&Artifact> {
        let classifier = self.native_classifier(platform)?;
        self.classifiers.get(&classifier)
    }
}

impl ClientManifest {
    /// Parse a manifest that has no parent. Manifests with `inheritsFrom`
    /// go through [`super::ManifestResolver`].
    pub fn parse(raw: &[u8], source_name: &str) -> LauncherResult<Self> {
        let raw = RawManifest::from_slice(raw, source_name)?;
        if let Some(parent) = &raw.inherits_from {
            return Err(LauncherError::MalformedManifest {
                source_name: source_name.to_string(),
                message: format!("inherits from {} and needs a resolver", parent),
            });
        }
        raw.normalize(source_name)
    }

    /// Libraries with a primary artifact that apply to `platform`.
    pub fn needed_libraries(&self, platform: &Platform, features: &FeatureSet) -> Vec<&Library> {
        self.libraries
            .iter()
            .filter(|lib| lib.artifact.is_some() && lib.is_allowed(platform, features))
            .collect()
    }

    /// Native jars to extract for `platform`.
    pub fn needed_natives(&self, platform: &Platform) -> Vec<(&Library, &Artifact)> {
        let features = FeatureSet::new();
        self.libraries
            .iter()
            .filter(|lib| lib.is_allowed(platform, &features))
            .filter_map(|lib| lib.native_artifact(platform).map(|a| (lib, a)))
            .collect()
    }

    pub fn jvm_arguments(&self, platform: &Platform, features: &FeatureSet) -> Vec<String> {
        self.arguments
            .jvm
            .iter()
            .flat_map(|arg| arg.values(platform, features))
            .collect()
    }

    pub fn game_arguments(&self, platform: &Platform, features: &FeatureSet) -> Vec<String> {
        self.arguments
            .game
            .iter()
            .flat_map(|arg| arg.values(platform, features))
            .collect()
    }

    /// Java major required by this version. Falls back to a guess from the
    /// version id when `javaVersion` is absent.
    pub fn required_java_major(&self) -> u32 {
        if let Some(major) = self.java_major {
            return major;
        }
        let id = self.inherits_from.as_deref().unwrap_or(&self.id);
        if !id.starts_with("1.") {
            return 17;
        }
        // Pre-releases need the Java of the release they lead up to.
        let id = id.split('-').next().unwrap_or(id);
        if compare_versions(id, "1.20.5").is_ge() {
            21
        } else if compare_versions(id, "1.18").is_ge() {
            17
        } else if compare_versions(id, "1.17").is_ge() {
            16
        } else {
            8
        }
    }
}

// ─── Raw wire format ───

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawManifest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub main_class: Option<String>,
    #[serde(default)]
    pub inherits_from: Option<String>,
    #[serde(default, rename = "type")]
    pub version_type: Option<String>,
    #[serde(default)]
    pub libraries: Vec<RawLibrary>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexRef>,
    #[serde(default)]
    pub arguments: Option<Arguments>,
    /// Pre-1.13 space separated game arguments.
    #[serde(default)]
    pub minecraft_arguments: Option<String>,
    #[serde(default)]
    pub downloads: Option<RawDownloads>,
    #[serde(default)]
    pub java_version: Option<RawJavaVersion>,
    /// Root-most ancestor id, filled in while merging.
    #[serde(skip)]
    pub base_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawDownloads {
    #[serde(default)]
    pub client: Option<DownloadInfo>,
    #[serde(default)]
    pub client_mappings: Option<DownloadInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawJavaVersion {
    pub major_version: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawLibrary {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<RawLibraryDownloads>,
    #[serde(default)]
    pub natives: BTreeMap<String, String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Repository base for libraries declared Fabric style (`name` + `url`).
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawLibraryDownloads {
    #[serde(default)]
    pub artifact: Option<Artifact>,
    #[serde(default)]
    pub classifiers: BTreeMap<String, Artifact>,
}

/// Identity used when a child manifest overrides a parent library:
/// `group:artifact[:classifier]`.
fn library_key(name: &str) -> String {
    match MavenArtifact::parse(name) {
        Ok(coord) => match coord.classifier {
            Some(ref c) => format!("{}:{}", coord.key(), c),
            None => coord.key(),
        },
        Err(_) => name.to_string(),
    }
}

impl RawManifest {
    pub fn from_slice(raw: &[u8], source_name: &str) -> LauncherResult<Self> {
        serde_json::from_slice(raw).map_err(|e| LauncherError::MalformedManifest {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }

    /// Merge `self` (child) over `parent`. Child libraries come first and
    /// shadow parent libraries with the same coordinate; argument lists are
    /// concatenated parent first. The result inherits from the parent's own
    /// parent, if any.
    pub fn inherit(self, parent: RawManifest) -> RawManifest {
        let shadowed: HashSet<String> = self
            .libraries
            .iter()
            .map(|l| library_key(&l.name))
            .collect();

        let mut libraries = self.libraries;
        libraries.extend(
            parent
                .libraries
                .into_iter()
                .filter(|l| !shadowed.contains(&library_key(&l.name))),
        );

        let arguments = match (parent.arguments, self.arguments) {
            (Some(mut base), Some(child)) => {
                base.game.extend(child.game);
                base.jvm.extend(child.jvm);
                Some(base)
            }
            (base, child) => child.or(base),
        };

        let downloads = match (self.downloads, parent.downloads) {
            (Some(child), Some(base)) => Some(RawDownloads {
                client: child.client.or(base.client),
                client_mappings: child.client_mappings.or(base.client_mappings),
            }),
            (child, base) => child.or(base),
        };

        let base_id = parent.base_id.or_else(|| parent.id.clone());

        RawManifest {
            id: self.id.or(parent.id),
            main_class: self.main_class.or(parent.main_class),
            inherits_from: parent.inherits_from,
            base_id,
            version_type: self.version_type.or(parent.version_type),
            libraries,
            asset_index: self.asset_index.or(parent.asset_index),
            arguments,
            minecraft_arguments: self.minecraft_arguments.or(parent.minecraft_arguments),
            downloads,
            java_version: self.java_version.or(parent.java_version),
        }
    }

    pub fn normalize(self, source_name: &str) -> LauncherResult<ClientManifest> {
        let malformed = |message: &str| LauncherError::MalformedManifest {
            source_name: source_name.to_string(),
            message: message.to_string(),
        };

        let id = self.id.filter(|id| !id.is_empty()).ok_or_else(|| malformed("missing id"))?;
        let main_class = self
            .main_class
            .filter(|c| !c.is_empty())
            .ok_or_else(|| malformed("missing mainClass"))?;

        if self.arguments.is_none() && self.minecraft_arguments.is_none() {
            return Err(malformed("no arguments or minecraftArguments"));
        }

        let mut arguments = self.arguments.unwrap_or_default();
        if let Some(legacy) = &self.minecraft_arguments {
            let mut game: Vec<Argument> = legacy
                .split_whitespace()
                .map(|s| Argument::Plain(s.to_string()))
                .collect();
            game.append(&mut arguments.game);
            arguments.game = game;

            let mut jvm: Vec<Argument> = LEGACY_JVM_ARGUMENTS
                .iter()
                .map(|s| Argument::Plain(s.to_string()))
                .collect();
            jvm.append(&mut arguments.jvm);
            arguments.jvm = jvm;
        }

        let libraries = self
            .libraries
            .into_iter()
            .map(RawLibrary::normalize)
            .collect::<LauncherResult<Vec<_>>>()?;

        let (client_download, client_mappings) = match self.downloads {
            Some(d) => (d.client, d.client_mappings),
            None => (None, None),
        };

        Ok(ClientManifest {
            id,
            main_class,
            inherits_from: self.base_id,
            version_type: self.version_type,
            libraries,
            asset_index: self.asset_index,
            arguments,
            client_download,
            client_mappings,
            java_major: self.java_version.map(|j| j.major_version),
        })
    }
}

impl RawLibrary {
    pub(crate) fn normalize(self) -> LauncherResult<Library> {
        let coord = MavenArtifact::parse(&self.name)?;

        let (artifact, classifiers) = match self.downloads {
            Some(downloads) => (downloads.artifact, downloads.classifiers),
            None if self.natives.is_empty() => {
                let base = self.url.as_deref().unwrap_or(MOJANG_LIBRARIES);
                let artifact = Artifact {
                    path: coord.relative_path(),
                    url: coord.url(base),
                    sha1: None,
                    size: None,
                };
                (Some(artifact), BTreeMap::new())
            }
            None => (None, BTreeMap::new()),
        };

        let artifact = artifact.map(|mut a| {
            if a.path.is_empty() {
                a.path = coord.relative_path();
            }
            a
        });

        Ok(Library {
            name: self.name,
            artifact,
            natives: self.natives,
            classifiers,
            rules: self.rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::rules::Arch;

    const LINUX: Platform = Platform::new(OsName::Linux, Arch::X86_64);
    const WINDOWS: Platform = Platform::new(OsName::Windows, Arch::X86_64);
    const MAC_ARM: Platform = Platform::new(OsName::Osx, Arch::Arm64);

    fn vanilla() -> serde_json::Value {
        serde_json::json!({
            "id": "1.20.1",
            "type": "release",
            "mainClass": "net.minecraft.client.main.Main",
            "assetIndex": {"id": "5", "url": "https://piston-meta.mojang.com/v1/packages/x/5.json", "sha1": "x", "size": 1, "totalSize": 2},
            "downloads": {
                "client": {"url": "https://piston-data.mojang.com/v1/objects/c/client.jar", "sha1": "c", "size": 10},
                "client_mappings": {"url": "https://piston-data.mojang.com/v1/objects/m/client.txt", "sha1": "m", "size": 5}
            },
            "javaVersion": {"component": "java-runtime-gamma", "majorVersion": 17},
            "arguments": {
                "game": [
                    "--username", "${auth_player_name}",
                    {"rules": [{"action": "allow", "features": {"is_demo_user": true}}], "value": "--demo"}
                ],
                "jvm": [
                    {"rules": [{"action": "allow", "os": {"name": "osx"}}], "value": ["-XstartOnFirstThread"]},
                    "-cp", "${classpath}"
                ]
            },
            "libraries": [
                {
                    "name": "org.ow2.asm:asm:9.3",
                    "downloads": {"artifact": {"path": "org/ow2/asm/asm/9.3/asm-9.3.jar", "url": "https://libraries.minecraft.net/org/ow2/asm/asm/9.3/asm-9.3.jar", "sha1": "a", "size": 1}}
                },
                {
                    "name": "org.lwjgl:lwjgl:3.3.1:natives-windows",
                    "downloads": {"artifact": {"path": "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-windows.jar", "url": "https://libraries.minecraft.net/org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-windows.jar", "sha1": "w", "size": 1}},
                    "rules": [{"action": "allow", "os": {"name": "windows"}}]
                }
            ]
        })
    }

    fn parse(value: serde_json::Value) -> LauncherResult<ClientManifest> {
        ClientManifest::parse(value.to_string().as_bytes(), "test.json")
    }

    #[test]
    fn parses_modern_manifest() {
        let m = parse(vanilla()).unwrap();
        assert_eq!(m.id, "1.20.1");
        assert_eq!(m.asset_index.as_ref().unwrap().total_size, Some(2));
        assert_eq!(m.required_java_major(), 17);
        assert!(m.client_mappings.is_some());
        assert_eq!(m.libraries.len(), 2);
    }

    #[test]
    fn library_filtering_happens_at_query_time() {
        let m = parse(vanilla()).unwrap();
        assert_eq!(m.needed_libraries(&LINUX, &FeatureSet::new()).len(), 1);
        assert_eq!(m.needed_libraries(&WINDOWS, &FeatureSet::new()).len(), 2);
    }

    #[test]
    fn argument_rules_are_evaluated_per_platform() {
        let m = parse(vanilla()).unwrap();
        assert_eq!(m.jvm_arguments(&LINUX, &FeatureSet::new()), vec!["-cp", "${classpath}"]);
        assert_eq!(m.jvm_arguments(&MAC_ARM, &FeatureSet::new())[0], "-XstartOnFirstThread");

        let demo = FeatureSet::new().with("is_demo_user");
        assert!(m.game_arguments(&LINUX, &demo).contains(&"--demo".to_string()));
        assert!(!m.game_arguments(&LINUX, &FeatureSet::new()).contains(&"--demo".to_string()));
    }

    #[test]
    fn missing_required_fields_are_malformed() {
        let err = parse(serde_json::json!({"mainClass": "a.B", "minecraftArguments": ""})).unwrap_err();
        assert!(matches!(err, LauncherError::MalformedManifest { .. }));

        let err = parse(serde_json::json!({"id": "x", "mainClass": "a.B"})).unwrap_err();
        assert!(matches!(err, LauncherError::MalformedManifest { .. }));

        let err = ClientManifest::parse(b"{not json", "broken.json").unwrap_err();
        assert!(matches!(err, LauncherError::MalformedManifest { .. }));
    }

    #[test]
    fn legacy_arguments_get_default_jvm_set() {
        let m = parse(serde_json::json!({
            "id": "1.12.2",
            "mainClass": "net.minecraft.client.main.Main",
            "minecraftArguments": "--username ${auth_player_name} --version ${version_name}",
            "libraries": []
        }))
        .unwrap();
        assert_eq!(m.game_arguments(&LINUX, &FeatureSet::new()).len(), 4);
        assert_eq!(
            m.jvm_arguments(&LINUX, &FeatureSet::new()),
            vec!["-Djava.library.path=${natives_directory}", "-cp", "${classpath}"]
        );
        assert_eq!(m.required_java_major(), 8);
    }

    #[test]
    fn pre_releases_guess_the_java_of_their_release() {
        let java_for = |id: &str| {
            parse(serde_json::json!({
                "id": id,
                "mainClass": "net.minecraft.client.main.Main",
                "arguments": {"game": [], "jvm": []}
            }))
            .unwrap()
            .required_java_major()
        };
        assert_eq!(java_for("1.20.5-pre1"), 21);
        assert_eq!(java_for("1.20.4"), 17);
        assert_eq!(java_for("1.17-rc1"), 16);
    }

    #[test]
    fn fabric_style_library_gets_synthesized_artifact() {
        let m = parse(serde_json::json!({
            "id": "fabric",
            "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
            "arguments": {"game": [], "jvm": []},
            "libraries": [
                {"name": "net.fabricmc:sponge-mixin:0.12.5+mixin.0.8.5", "url": "https://maven.fabricmc.net/"},
                {"name": "org.ow2.asm:asm:9.6"}
            ]
        }))
        .unwrap();

        let mixin = m.libraries[0].artifact.as_ref().unwrap();
        assert_eq!(
            mixin.path,
            "net/fabricmc/sponge-mixin/0.12.5+mixin.0.8.5/sponge-mixin-0.12.5+mixin.0.8.5.jar"
        );
        assert_eq!(
            mixin.url,
            "https://maven.fabricmc.net/net/fabricmc/sponge-mixin/0.12.5+mixin.0.8.5/sponge-mixin-0.12.5+mixin.0.8.5.jar"
        );
        assert!(m.libraries[1]
            .artifact
            .as_ref()
            .unwrap()
            .url
            .starts_with("https://libraries.minecraft.net/"));
    }

    #[test]
    fn legacy_natives_resolve_classifier_with_arch() {
        let m = parse(serde_json::json!({
            "id": "1.8.9",
            "mainClass": "net.minecraft.client.main.Main",
            "minecraftArguments": "",
            "libraries": [{
                "name": "tv.twitch:twitch-platform:6.5",
                "natives": {"linux": "natives-linux", "windows": "natives-windows-${arch}"},
                "downloads": {
                    "classifiers": {
                        "natives-linux": {"path": "tv/twitch/l.jar", "url": "https://x/l.jar"},
                        "natives-windows-64": {"path": "tv/twitch/w64.jar", "url": "https://x/w64.jar"}
                    }
                }
            }]
        }))
        .unwrap();

        assert!(m.needed_libraries(&LINUX, &FeatureSet::new()).is_empty());
        let natives = m.needed_natives(&WINDOWS);
        assert_eq!(natives.len(), 1);
        assert_eq!(natives[0].1.path, "tv/twitch/w64.jar");
        assert!(m.needed_natives(&MAC_ARM).is_empty());
    }
}
