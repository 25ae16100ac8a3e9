pub mod cache;
pub mod context;
pub mod fabric;
pub mod forge;
pub mod installer;
pub mod neoforge;
pub mod processor;
pub mod profile;

pub use cache::InstallerCache;
pub use context::InstallContext;
pub use fabric::FabricInstaller;
pub use forge::{ForgeDistribution, ForgeFamilyInstaller, ForgeInstaller};
pub use installer::{Installer, LoaderInstallResult, LoaderInstaller};
pub use neoforge::NeoForgeInstaller;
