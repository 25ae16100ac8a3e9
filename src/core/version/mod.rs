pub mod client_manifest;
pub mod manifest;
pub mod resolver;
pub mod rules;

pub use client_manifest::{
    Argument, ArgumentValue, Arguments, Artifact, AssetIndexRef, ClientManifest, DownloadInfo,
    Library,
};
pub use manifest::{VersionEntry, VersionManifest, VersionType};
pub use resolver::ManifestResolver;
pub use rules::{Arch, FeatureSet, OsName, Platform, Rule};
