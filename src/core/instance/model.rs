use serde::{Deserialize, Serialize};

/// Supported mod loaders. Also the client brand recorded per instance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoaderType {
    #[default]
    Vanilla,
    Fabric,
    Forge,
    NeoForge,
}

impl LoaderType {
    pub fn as_str(self) -> &'static str {
        match self {
            LoaderType::Vanilla => "vanilla",
            LoaderType::Fabric => "fabric",
            LoaderType::Forge => "forge",
            LoaderType::NeoForge => "neoforge",
        }
    }
}

impl std::fmt::Display for LoaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling hint for the game process.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl ProcessPriority {
    /// `nice` increment for the priority, `None` when unchanged.
    pub fn nice_increment(self) -> Option<i32> {
        match self {
            ProcessPriority::Low => Some(10),
            ProcessPriority::Normal => None,
            ProcessPriority::High => Some(-5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&LoaderType::NeoForge).unwrap(), "\"neoforge\"");
        let parsed: LoaderType = serde_json::from_str("\"fabric\"").unwrap();
        assert_eq!(parsed, LoaderType::Fabric);
    }
}
