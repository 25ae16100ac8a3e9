pub mod config;
pub mod layout;
pub mod model;

pub use config::{InstanceConfig, LauncherConfig};
pub use layout::MinecraftDirectory;
pub use model::{LoaderType, ProcessPriority};
