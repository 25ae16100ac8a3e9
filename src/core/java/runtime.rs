use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JavaInstallation {
    pub path: PathBuf,
    pub version: String,
    pub major: u32,
    pub is_64bit: bool,
    pub vendor: String,
}

/// Find a Java binary able to run code that needs `required_major`.
///
/// Prefers an installation on the same runtime track (8, 17, 21), then any
/// newer one.
pub async fn find_java(required_major: u32) -> LauncherResult<PathBuf> {
    let installations = detect_java_installations().await;

    let same_track = installations
        .iter()
        .filter(|j| is_java_compatible_major(j.major, required_major))
        .min_by_key(|j| j.major);
    let newer = installations
        .iter()
        .filter(|j| j.major >= required_major)
        .min_by_key(|j| j.major);

    match same_track.or(newer) {
        Some(java) => {
            info!("Using Java {} at {:?}", java.version, java.path);
            Ok(java.path.clone())
        }
        None => Err(LauncherError::JavaNotFound(required_major)),
    }
}

/// Probe every candidate location. Unusable binaries are dropped.
pub async fn detect_java_installations() -> Vec<JavaInstallation> {
    let mut detected = Vec::new();
    for candidate in candidate_binaries() {
        if let Some(java) = probe_java(&candidate).await {
            detected.push(java);
        }
    }
    detected.sort_by(|a, b| a.path.cmp(&b.path));
    detected.dedup_by(|a, b| a.path == b.path);
    detected
}

fn candidate_binaries() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(home) = std::env::var_os("JAVA_HOME") {
        candidates.push(locate_java_binary(Path::new(&home)));
    }
    if let Some(path) = std::env::var_os("PATH") {
        candidates.extend(
            std::env::split_paths(&path)
                .map(|dir| dir.join(java_exe()))
                .filter(|bin| bin.is_file()),
        );
    }
    for root in runtime_roots() {
        if let Ok(entries) = std::fs::read_dir(root) {
            candidates.extend(
                entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.path())
                    .filter(|path| path.is_dir())
                    .map(|runtime_root| locate_java_binary(&runtime_root)),
            );
        }
    }
    candidates
}

fn runtime_roots() -> Vec<PathBuf> {
    if cfg!(target_os = "macos") {
        vec![PathBuf::from("/Library/Java/JavaVirtualMachines")]
    } else if cfg!(windows) {
        vec![
            PathBuf::from(r"C:\Program Files\Java"),
            PathBuf::from(r"C:\Program Files\Eclipse Adoptium"),
        ]
    } else {
        vec![PathBuf::from("/usr/lib/jvm")]
    }
}

pub fn is_java_compatible_major(installed_major: u32, required_major: u32) -> bool {
    installed_major >= required_major
        && runtime_track(installed_major) == runtime_track(required_major)
}

fn runtime_track(major: u32) -> u32 {
    match major {
        0..=8 => 8,
        9..=17 => 17,
        _ => 21,
    }
}

#[instrument]
pub async fn probe_java(path: &Path) -> Option<JavaInstallation> {
    let output = Command::new(path)
        .args(["-XshowSettings:properties", "-version"])
        .output()
        .await
        .ok()?;

    let version_output = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    );
    debug!(
        "Probing {:?}: {}",
        path,
        version_output.lines().next().unwrap_or("")
    );
    parse_probe_output(path, &version_output)
}

fn parse_probe_output(path: &Path, output: &str) -> Option<JavaInstallation> {
    let version = parse_version_string(output)?;
    let major = parse_major_version(&version);
    let lower = output.to_ascii_lowercase();
    let is_64bit = lower.contains("sun.arch.data.model = 64")
        || lower.contains("os.arch = amd64")
        || lower.contains("os.arch = x86_64")
        || lower.contains("os.arch = aarch64");

    Some(JavaInstallation {
        path: std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()),
        version,
        major,
        is_64bit,
        vendor: parse_vendor(output),
    })
}

fn parse_version_string(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let start = line.find('"')?;
        let end = line[start + 1..].find('"')?;
        Some(line[start + 1..start + 1 + end].to_string())
    })
}

fn parse_vendor(output: &str) -> String {
    for vendor in ["Temurin", "Adoptium", "Zulu", "GraalVM", "OpenJDK"] {
        if output.contains(vendor) {
            return vendor.to_string();
        }
    }
    "unknown".to_string()
}

/// `1.8.0_392` → 8, `17.0.8` → 17.
pub fn parse_major_version(version: &str) -> u32 {
    let mut parts = version.split(|c: char| c == '.' || c == '_' || c == '-' || c == '+');
    let first: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);

    if first == 1 {
        parts.next().and_then(|p| p.parse().ok()).unwrap_or(first)
    } else {
        first
    }
}

pub fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// `bin/java` of a runtime directory, also checking the macOS bundle layout.
pub fn locate_java_binary(runtime_root: &Path) -> PathBuf {
    let primary = runtime_root.join("bin").join(java_exe());
    if primary.exists() {
        return primary;
    }

    let mac_layout = runtime_root
        .join("Contents")
        .join("Home")
        .join("bin")
        .join(java_exe());
    if mac_layout.exists() {
        return mac_layout;
    }
    primary
}
