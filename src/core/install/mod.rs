pub mod minecraft;
pub mod scratch;
pub mod stage;
pub mod task;
pub mod tasks;

pub use minecraft::{MinecraftInstall, MinecraftInstaller};
pub use scratch::ScratchDir;
pub use stage::{InstallStage, InstallState};
pub use task::{InstallTask, TaskSnapshot};
pub use tasks::InstallTasks;
