use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of an install task. Orthogonal task families are numbered far
/// apart; `End` is terminal for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallStage {
    Before,
    ClientJson,
    ClientIndex,
    ClientJar,
    InstallFabric,
    ClientResources,
    ClientLibraries,
    Natives,
    End,
    CustomFile,
    InstallLoader,
    Mods,
    ResourcePacks,
    JavaDownload,
    JavaInstall,
}

impl InstallStage {
    /// Stable numeric code.
    pub fn code(self) -> u16 {
        match self {
            InstallStage::Before => 0,
            InstallStage::ClientJson => 1,
            InstallStage::ClientIndex => 2,
            InstallStage::ClientJar => 3,
            InstallStage::InstallFabric => 4,
            InstallStage::ClientResources => 5,
            InstallStage::ClientLibraries => 6,
            InstallStage::Natives => 7,
            InstallStage::End => 8,
            InstallStage::CustomFile => 1000,
            InstallStage::InstallLoader => 1500,
            InstallStage::Mods => 2000,
            InstallStage::ResourcePacks => 2001,
            InstallStage::JavaDownload => 3000,
            InstallStage::JavaInstall => 3001,
        }
    }

    /// Position in the forward-only ordering. `End` sorts after everything.
    fn rank(self) -> u32 {
        match self {
            InstallStage::End => u32::MAX,
            other => other.code() as u32,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == InstallStage::End
    }

    pub fn display_name(self) -> &'static str {
        match self {
            InstallStage::Before => "Not started",
            InstallStage::ClientJson => "Download version json",
            InstallStage::ClientIndex => "Download asset index",
            InstallStage::ClientJar => "Download client jar",
            InstallStage::InstallFabric => "Install Fabric",
            InstallStage::ClientResources => "Download assets",
            InstallStage::ClientLibraries => "Download libraries",
            InstallStage::Natives => "Download natives",
            InstallStage::End => "Finished",
            InstallStage::CustomFile => "Download custom file",
            InstallStage::InstallLoader => "Install mod loader",
            InstallStage::Mods => "Download mods",
            InstallStage::ResourcePacks => "Download resource packs",
            InstallStage::JavaDownload => "Download Java",
            InstallStage::JavaInstall => "Install Java",
        }
    }
}

impl PartialOrd for InstallStage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InstallStage {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Per-stage status shown next to each step of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallState {
    Waiting,
    InProgress,
    Finished,
    Failed,
}
