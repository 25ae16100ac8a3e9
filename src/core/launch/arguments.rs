// ─── Launch Arguments ───
// `${key}` / `{key}` substitution over rule-filtered argument templates.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use super::classpath::{classpath_separator, safe_path_str};
use crate::core::auth::Account;
use crate::core::version::{ClientManifest, FeatureSet, Platform};

/// Runtime values the templates are filled from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentValues(BTreeMap<String, String>);

/// Everything the standard launch placeholders refer to.
pub struct ArgumentContext<'a> {
    pub account: &'a Account,
    pub version_name: &'a str,
    pub version_type: &'a str,
    pub game_dir: &'a Path,
    pub assets_dir: &'a Path,
    pub asset_index: &'a str,
    pub natives_dir: &'a Path,
    pub libraries_dir: &'a Path,
    pub classpath: &'a str,
    pub launcher_name: &'a str,
    pub launcher_version: &'a str,
}

impl ArgumentValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// The fixed placeholder set of a game launch.
    pub fn for_launch(ctx: &ArgumentContext<'_>) -> Self {
        let uuid = ctx.account.uuid().simple().to_string();
        let token = ctx.account.access_token();
        let assets = safe_path_str(ctx.assets_dir);

        Self::new()
            .with("auth_player_name", ctx.account.name())
            .with("auth_uuid", uuid.as_str())
            .with("auth_access_token", token)
            .with("auth_session", format!("token:{}:{}", token, uuid))
            .with("auth_xuid", ctx.account.xuid())
            .with("clientid", "")
            .with("user_type", ctx.account.user_type())
            .with("user_properties", "{}")
            .with("version_name", ctx.version_name)
            .with("version_type", ctx.version_type)
            .with("game_directory", safe_path_str(ctx.game_dir))
            .with("assets_root", assets.as_str())
            .with("game_assets", assets.as_str())
            .with("assets_index_name", ctx.asset_index)
            .with("natives_directory", safe_path_str(ctx.natives_dir))
            .with("library_directory", safe_path_str(ctx.libraries_dir))
            .with("classpath", ctx.classpath)
            .with("classpath_separator", classpath_separator())
            .with("launcher_name", ctx.launcher_name)
            .with("launcher_version", ctx.launcher_version)
    }

    /// Replace every known `${key}` and `{key}`. Unknown placeholders are
    /// left untouched.
    pub fn substitute(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let Some(len) = rest[open + 1..].find('}') else {
                break;
            };
            let close = open + 1 + len;
            let key = &rest[open + 1..close];
            let dollar = rest[..open].ends_with('$');

            match self.0.get(key) {
                Some(value) => {
                    let prefix_end = if dollar { open - 1 } else { open };
                    out.push_str(&rest[..prefix_end]);
                    out.push_str(value);
                }
                None => out.push_str(&rest[..=close]),
            }
            rest = &rest[close + 1..];
        }

        out.push_str(rest);
        out
    }

    /// Substitute a whole argument list. Arguments still holding a `${...}`
    /// are dropped together with the bare option flag right before them.
    /// A `-Dkey=value` style argument carries its own value and is kept.
    pub fn resolve_all(&self, templates: &[String]) -> Vec<String> {
        let mut resolved: Vec<String> = Vec::with_capacity(templates.len());
        for template in templates {
            let arg = self.substitute(template);
            if arg.contains("${") {
                debug!("Dropping unresolved argument {}", template);
                if resolved.last().is_some_and(|prev| is_bare_flag(prev)) {
                    resolved.pop();
                }
                continue;
            }
            resolved.push(arg);
        }
        resolved
    }
}

fn is_bare_flag(arg: &str) -> bool {
    arg.starts_with('-') && !arg.contains('=')
}

pub fn build_jvm_arguments(
    manifest: &ClientManifest,
    platform: &Platform,
    features: &FeatureSet,
    values: &ArgumentValues,
) -> Vec<String> {
    values.resolve_all(&manifest.jvm_arguments(platform, features))
}

pub fn build_game_arguments(
    manifest: &ClientManifest,
    platform: &Platform,
    features: &FeatureSet,
    values: &ArgumentValues,
) -> Vec<String> {
    values.resolve_all(&manifest.game_arguments(platform, features))
}
