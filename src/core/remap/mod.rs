// ─── Platform Artifact Remapper ───
// Substitutes libraries that ship no Apple Silicon natives with compatible
// builds. A fixed table keyed by groupId (+ artifactId), not a resolver.

use tracing::debug;

use crate::core::maven::{MavenArtifact, MAVEN_CENTRAL, MOJANG_LIBRARIES};
use crate::core::version::{Arch, Artifact, ClientManifest, FeatureSet, Library, OsName, Platform};

const LWJGL3_PINNED: &str = "3.3.1";
const LWJGL3_NATIVE_BUILD: &str = "3.3.3";
const JNA_LEGACY: &str = "4.4.0";
const JNA_PINNED: &str = "5.14.0";
const OBJC_BRIDGE: &str = "org.glavo.hmcl.mmachina:java-objc-bridge:1.1.0-mmachina.1";
const LWJGL2_NATIVES: &str = "org.glavo.hmcl:lwjgl2-natives:2.9.3-rc1-osx-arm64";
const ARM_NATIVES_CLASSIFIER: &str = "natives-macos-arm64";

/// What a matching library is rewritten to.
#[derive(Debug, Clone, Copy)]
enum Target {
    /// Keep the coordinate, optionally pinning the version, and serve it
    /// from `repo`. Natives use `native_classifier`.
    Pinned {
        pin: fn(&str) -> Option<&'static str>,
        repo: &'static str,
        native_classifier: Option<&'static str>,
    },
    /// Swap the whole coordinate for a fork hosted on `repo`.
    Replace {
        coordinate: &'static str,
        repo: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
struct RemapRule {
    group: &'static str,
    /// `None` matches every artifact of the group.
    artifact: Option<&'static str>,
    target: Target,
}

impl RemapRule {
    fn matches(&self, coord: &MavenArtifact) -> bool {
        coord.group_id == self.group
            && self.artifact.map_or(true, |a| a == coord.artifact_id)
    }
}

/// `3.x` other than 3.3.3 → 3.3.1.
fn pin_lwjgl3(version: &str) -> Option<&'static str> {
    (version.starts_with("3.") && version != LWJGL3_NATIVE_BUILD).then_some(LWJGL3_PINNED)
}

/// 4.4.0 → 5.14.0.
fn pin_jna(version: &str) -> Option<&'static str> {
    (version == JNA_LEGACY).then_some(JNA_PINNED)
}

/// Rules for primary artifacts.
///
/// | match                          | version             | repository        |
/// |--------------------------------|---------------------|-------------------|
/// | `org.lwjgl:*`                  | 3.x (≠3.3.3) → 3.3.1 | Mojang libraries  |
/// | `net.java.dev.jna:*`           | 4.4.0 → 5.14.0      | Mojang libraries  |
/// | `ca.weblite:java-objc-bridge`  | → `org.glavo.hmcl.mmachina:java-objc-bridge:1.1.0-mmachina.1` | Maven Central |
const LIBRARY_RULES: &[RemapRule] = &[
    RemapRule {
        group: "org.lwjgl",
        artifact: None,
        target: Target::Pinned {
            pin: pin_lwjgl3,
            repo: MOJANG_LIBRARIES,
            native_classifier: None,
        },
    },
    RemapRule {
        group: "net.java.dev.jna",
        artifact: None,
        target: Target::Pinned {
            pin: pin_jna,
            repo: MOJANG_LIBRARIES,
            native_classifier: None,
        },
    },
    RemapRule {
        group: "ca.weblite",
        artifact: Some("java-objc-bridge"),
        target: Target::Replace {
            coordinate: OBJC_BRIDGE,
            repo: MAVEN_CENTRAL,
        },
    },
];

/// Rules for native classifier jars.
///
/// | match                            | result                                           |
/// |----------------------------------|--------------------------------------------------|
/// | `org.lwjgl:*`                    | pinned as above, classifier `natives-macos-arm64` |
/// | `org.lwjgl.lwjgl:lwjgl-platform` | `org.glavo.hmcl:lwjgl2-natives:2.9.3-rc1-osx-arm64` |
/// | `ca.weblite:java-objc-bridge`    | same fork as the primary artifact                |
const NATIVE_RULES: &[RemapRule] = &[
    RemapRule {
        group: "org.lwjgl",
        artifact: None,
        target: Target::Pinned {
            pin: pin_lwjgl3,
            repo: MOJANG_LIBRARIES,
            native_classifier: Some(ARM_NATIVES_CLASSIFIER),
        },
    },
    RemapRule {
        group: "org.lwjgl.lwjgl",
        artifact: Some("lwjgl-platform"),
        target: Target::Replace {
            coordinate: LWJGL2_NATIVES,
            repo: MAVEN_CENTRAL,
        },
    },
    RemapRule {
        group: "ca.weblite",
        artifact: Some("java-objc-bridge"),
        target: Target::Replace {
            coordinate: OBJC_BRIDGE,
            repo: MAVEN_CENTRAL,
        },
    },
];

/// Whether `platform` needs remapping at all.
pub fn applies_to(platform: &Platform) -> bool {
    platform.os == OsName::Osx && platform.arch == Arch::Arm64
}

/// Rewrite affected libraries for `platform`. Returns the manifest
/// untouched on platforms that need no substitution.
///
/// Takes the manifest by value: the remapped value replaces the original,
/// so nothing can observe it half-rewritten.
pub fn remap(mut manifest: ClientManifest, platform: &Platform) -> ClientManifest {
    if !applies_to(platform) {
        return manifest;
    }

    let features = FeatureSet::new();
    for library in manifest.libraries.iter_mut() {
        if !library.is_allowed(platform, &features) {
            continue;
        }
        remap_library(library);
        remap_native(library, platform);
    }
    manifest
}

fn remap_library(library: &mut Library) {
    let Ok(coord) = library.coordinate() else {
        return;
    };
    let Some(rule) = LIBRARY_RULES.iter().find(|r| r.matches(&coord)) else {
        return;
    };

    let (new_coord, repo) = match rule.target {
        Target::Pinned { pin, repo, .. } => match pin(&coord.version) {
            Some(version) => (coord.with_version(version), repo),
            None => (coord.clone(), repo),
        },
        Target::Replace { coordinate, repo } => match MavenArtifact::parse(coordinate) {
            Ok(replacement) => (replacement, repo),
            Err(_) => return,
        },
    };

    debug!("Remapping library {} -> {}", library.name, new_coord);
    library.name = new_coord.to_string();
    if let Some(artifact) = library.artifact.as_mut() {
        rewrite_artifact(artifact, &new_coord, repo);
    }
}

fn remap_native(library: &mut Library, platform: &Platform) {
    let Some(classifier) = library.native_classifier(platform) else {
        return;
    };
    if !library.classifiers.contains_key(&classifier) {
        return;
    }
    let Ok(coord) = library.coordinate() else {
        return;
    };
    let Some(rule) = NATIVE_RULES.iter().find(|r| r.matches(&coord)) else {
        return;
    };

    let (new_name, native_coord, repo) = match rule.target {
        Target::Pinned {
            pin,
            repo,
            native_classifier,
        } => {
            let pinned = match pin(&coord.version) {
                Some(version) => coord.with_version(version),
                None => coord.clone(),
            };
            let mut native = pinned.clone();
            native.classifier = native_classifier.map(str::to_string).or(native.classifier);
            (pinned, native, repo)
        }
        Target::Replace { coordinate, repo } => match MavenArtifact::parse(coordinate) {
            Ok(replacement) => (replacement.clone(), replacement, repo),
            Err(_) => return,
        },
    };

    debug!("Remapping natives {} -> {}", library.name, native_coord);
    library.name = new_name.to_string();
    if let Some(artifact) = library.classifiers.get_mut(&classifier) {
        rewrite_artifact(artifact, &native_coord, repo);
    }
}

/// Point `artifact` at `coord` under `repo`. Checksums only describe the
/// old file, so they are dropped when the URL changes.
fn rewrite_artifact(artifact: &mut Artifact, coord: &MavenArtifact, repo: &str) {
    let url = coord.url(repo);
    if artifact.url != url {
        artifact.sha1 = None;
        artifact.size = None;
    }
    artifact.url = url;
    artifact.path = coord.relative_path();
}
