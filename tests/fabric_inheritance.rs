use std::path::Path;

use mcinstall_lib::core::instance::MinecraftDirectory;
use mcinstall_lib::core::launch::{build_classpath, classpath_entries, classpath_separator};
use mcinstall_lib::core::version::{Arch, FeatureSet, ManifestResolver, OsName, Platform};

const LINUX: Platform = Platform::new(OsName::Linux, Arch::X86_64);

fn write_json(path: &Path, value: serde_json::Value) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, value.to_string()).unwrap();
}

fn mojang_lib(name: &str, path: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "downloads": {"artifact": {
            "path": path,
            "url": format!("https://libraries.minecraft.net/{}", path)
        }}
    })
}

/// Vanilla 1.20.1 in the shared store and a Fabric instance inheriting it.
fn fabric_instance(dir: &MinecraftDirectory) {
    write_json(
        &dir.manifest_path("1.20.1"),
        serde_json::json!({
            "id": "1.20.1",
            "type": "release",
            "mainClass": "net.minecraft.client.main.Main",
            "assetIndex": {"id": "5", "url": "https://piston-meta.mojang.com/v1/packages/x/5.json"},
            "arguments": {
                "game": ["--version", "${version_name}"],
                "jvm": ["-cp", "${classpath}"]
            },
            "libraries": [
                mojang_lib("org.ow2.asm:asm:9.3", "org/ow2/asm/asm/9.3/asm-9.3.jar"),
                mojang_lib("com.mojang:brigadier:1.1.8", "com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar"),
            ],
            "javaVersion": {"component": "java-runtime-gamma", "majorVersion": 17}
        }),
    );

    write_json(
        &dir.manifest_path("fabric-pack"),
        serde_json::json!({
            "id": "fabric-loader-0.15.0-1.20.1",
            "inheritsFrom": "1.20.1",
            "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
            "arguments": {"game": [], "jvm": ["-DFabricMcEmu= net.minecraft.client.main.Main "]},
            "libraries": [
                {"name": "org.ow2.asm:asm:9.6", "url": "https://maven.fabricmc.net/"},
                {"name": "net.fabricmc:fabric-loader:0.15.0", "url": "https://maven.fabricmc.net/"}
            ]
        }),
    );
}

#[tokio::test]
async fn fabric_manifest_merges_over_vanilla() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = MinecraftDirectory::new(tmp.path());
    fabric_instance(&dir);

    let mut resolver = ManifestResolver::new(dir.versions_dir());
    let manifest = resolver.load(&dir.manifest_path("fabric-pack")).await.unwrap();

    assert_eq!(manifest.main_class, "net.fabricmc.loader.impl.launch.knot.KnotClient");
    assert_eq!(manifest.inherits_from.as_deref(), Some("1.20.1"));
    assert_eq!(manifest.required_java_major(), 17);
    assert_eq!(manifest.asset_index.as_ref().map(|a| a.id.as_str()), Some("5"));

    let names: Vec<&str> = manifest
        .needed_libraries(&LINUX, &FeatureSet::new())
        .into_iter()
        .map(|lib| lib.name.as_str())
        .collect();
    assert!(names.contains(&"net.fabricmc:fabric-loader:0.15.0"));
    assert!(names.contains(&"com.mojang:brigadier:1.1.8"));
    assert!(names.contains(&"org.ow2.asm:asm:9.6"));
    assert!(!names.contains(&"org.ow2.asm:asm:9.3"));

    let asm = manifest
        .libraries
        .iter()
        .find(|lib| lib.name == "org.ow2.asm:asm:9.6")
        .and_then(|lib| lib.artifact.as_ref())
        .unwrap();
    assert_eq!(
        asm.url,
        "https://maven.fabricmc.net/org/ow2/asm/asm/9.6/asm-9.6.jar"
    );

    let jvm = manifest.jvm_arguments(&LINUX, &FeatureSet::new());
    assert_eq!(jvm[0], "-cp");
    assert!(jvm.iter().any(|arg| arg.starts_with("-DFabricMcEmu")));
}

#[tokio::test]
async fn fabric_classpath_has_one_jar_per_library() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = MinecraftDirectory::new(tmp.path());
    fabric_instance(&dir);

    let mut resolver = ManifestResolver::new(dir.versions_dir());
    let manifest = resolver.load(&dir.manifest_path("fabric-pack")).await.unwrap();
    let client_jar = dir.client_jar_path("fabric-pack");

    let entries = classpath_entries(
        &manifest,
        &dir,
        &client_jar,
        &["com.mojang:brigadier:1.2.9".to_string()],
        &LINUX,
        &FeatureSet::new(),
    )
    .unwrap();

    assert_eq!(entries.len(), 4);
    assert_eq!(entries.last(), Some(&client_jar));
    assert!(entries
        .iter()
        .any(|p| p.ends_with("com/mojang/brigadier/1.2.9/brigadier-1.2.9.jar")));
    assert!(!entries.iter().any(|p| p.ends_with("asm-9.3.jar")));

    let joined = build_classpath(&manifest, &dir, &client_jar, &[], &LINUX, &FeatureSet::new())
        .unwrap();
    assert_eq!(joined.split(classpath_separator()).count(), 4);
}
