// ─── Rule Predicates ───
// Mojang-style allow/disallow rules gated on OS, architecture and features.
// Evaluated at query time so one manifest serves several target platforms.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsName {
    Windows,
    Osx,
    Linux,
}

impl OsName {
    /// Name used by version JSON rules and `natives` maps.
    pub fn mojang_name(self) -> &'static str {
        match self {
            OsName::Windows => "windows",
            OsName::Osx => "osx",
            OsName::Linux => "linux",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86,
    X86_64,
    Arm64,
}

impl Arch {
    pub fn mojang_name(self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "x86_64",
            Arch::Arm64 => "arm64",
        }
    }

    /// Value substituted for `${arch}` in native classifiers.
    pub fn bits(self) -> &'static str {
        match self {
            Arch::X86 => "32",
            Arch::X86_64 | Arch::Arm64 => "64",
        }
    }
}

/// Target platform a manifest is queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: OsName,
    pub arch: Arch,
}

impl Platform {
    pub const fn new(os: OsName, arch: Arch) -> Self {
        Self { os, arch }
    }

    pub fn current() -> Self {
        let os = if cfg!(target_os = "windows") {
            OsName::Windows
        } else if cfg!(target_os = "macos") {
            OsName::Osx
        } else {
            OsName::Linux
        };

        let arch = if cfg!(target_arch = "aarch64") {
            Arch::Arm64
        } else if cfg!(target_arch = "x86") {
            Arch::X86
        } else {
            Arch::X86_64
        };

        Self { os, arch }
    }

    /// Everything except x86/x86_64 needs remapped native artifacts.
    pub fn is_default_arch(&self) -> bool {
        matches!(self.arch, Arch::X86 | Arch::X86_64)
    }
}

/// Feature flags referenced by argument rules (`is_demo_user`,
/// `has_custom_resolution`, ...). Unlisted features count as disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet(BTreeSet<String>);

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, feature: &str) -> Self {
        self.0.insert(feature.to_string());
        self
    }

    pub fn is_enabled(&self, feature: &str) -> bool {
        self.0.contains(feature)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Kernel version regex. Not evaluated; treated as matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<BTreeMap<String, bool>>,
}

impl Rule {
    fn matches(&self, platform: &Platform, features: &FeatureSet) -> bool {
        if let Some(os) = &self.os {
            if let Some(name) = &os.name {
                if name != platform.os.mojang_name() {
                    return false;
                }
            }
            if let Some(arch) = &os.arch {
                if arch != platform.arch.mojang_name() {
                    return false;
                }
            }
        }

        if let Some(required) = &self.features {
            for (feature, expected) in required {
                if features.is_enabled(feature) != *expected {
                    return false;
                }
            }
        }

        true
    }
}

/// Evaluate a rule list.
///
/// - No rules → allowed.
/// - Otherwise start disallowed; every matching rule overwrites the verdict
///   with its own action, so the last matching rule wins.
pub fn rules_allow(rules: &[Rule], platform: &Platform, features: &FeatureSet) -> bool {
    if rules.is_empty() {
        return true;
    }

    let mut allowed = false;
    for rule in rules {
        if rule.matches(platform, features) {
            allowed = rule.action == RuleAction::Allow;
        }
    }
    allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX: Platform = Platform::new(OsName::Linux, Arch::X86_64);
    const MAC_ARM: Platform = Platform::new(OsName::Osx, Arch::Arm64);

    fn os_rule(action: RuleAction, name: &str) -> Rule {
        Rule {
            action,
            os: Some(OsRule {
                name: Some(name.into()),
                ..Default::default()
            }),
            features: None,
        }
    }

    #[test]
    fn no_rules_means_allowed() {
        assert!(rules_allow(&[], &LINUX, &FeatureSet::new()));
    }

    #[test]
    fn allow_only_matching_os() {
        let rules = vec![os_rule(RuleAction::Allow, "osx")];
        assert!(rules_allow(&rules, &MAC_ARM, &FeatureSet::new()));
        assert!(!rules_allow(&rules, &LINUX, &FeatureSet::new()));
    }

    #[test]
    fn later_disallow_overrides_general_allow() {
        let rules = vec![
            Rule {
                action: RuleAction::Allow,
                os: None,
                features: None,
            },
            os_rule(RuleAction::Disallow, "osx"),
        ];
        assert!(rules_allow(&rules, &LINUX, &FeatureSet::new()));
        assert!(!rules_allow(&rules, &MAC_ARM, &FeatureSet::new()));
    }

    #[test]
    fn arch_and_feature_predicates() {
        let rules = vec![Rule {
            action: RuleAction::Allow,
            os: Some(OsRule {
                arch: Some("x86".into()),
                ..Default::default()
            }),
            features: None,
        }];
        assert!(!rules_allow(&rules, &LINUX, &FeatureSet::new()));

        let demo: Vec<Rule> = serde_json::from_value(serde_json::json!([
            {"action": "allow", "features": {"is_demo_user": true}}
        ]))
        .unwrap();
        assert!(!rules_allow(&demo, &LINUX, &FeatureSet::new()));
        assert!(rules_allow(
            &demo,
            &LINUX,
            &FeatureSet::new().with("is_demo_user")
        ));
    }
}
