// ─── Game Process ───
// Precondition checks, command assembly, spawn, output mirroring and the
// window poll that lives exactly as long as the game process.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::arguments::{build_game_arguments, build_jvm_arguments, ArgumentContext, ArgumentValues};
use super::classpath::{build_classpath, safe_path_str};
use crate::core::auth::Account;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::guard::AbortOnDrop;
use crate::core::instance::layout::MinecraftDirectory;
use crate::core::instance::{InstanceConfig, ProcessPriority};
use crate::core::remap;
use crate::core::version::{ClientManifest, FeatureSet, ManifestResolver, Platform};

const WINDOW_POLL_INTERVAL: Duration = Duration::from_secs(1);
const TOKEN_MASK: &str = "********";

/// Detects the game window of a running process.
pub trait WindowProbe: Send + Sync {
    fn is_window_visible(&self, pid: u32) -> bool;
}

#[derive(Default)]
pub struct LaunchOptions {
    pub account: Option<Account>,
    /// Overrides the instance's configured Java.
    pub java: Option<PathBuf>,
    pub features: FeatureSet,
    pub window_probe: Option<Arc<dyn WindowProbe>>,
    pub launcher_name: String,
    pub launcher_version: String,
}

/// How the game run ended. A non-zero exit is reported here, not raised.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchOutcome {
    pub exit_code: Option<i32>,
    pub window_shown: bool,
    /// User-facing reason when the game did not exit cleanly.
    pub failure: Option<String>,
}

impl LaunchOutcome {
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }

    fn from_status(status: ExitStatus, window_shown: bool) -> Self {
        let failure = (!status.success()).then(|| {
            LauncherError::ProcessFailed {
                program: "Minecraft".into(),
                code: status.code(),
                stderr: String::new(),
            }
            .reason()
        });
        Self {
            exit_code: status.code(),
            window_shown,
            failure,
        }
    }
}

/// Fully assembled game invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub java: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub priority: ProcessPriority,
}

impl LaunchCommand {
    /// Command line for logs with the access token hidden.
    pub fn masked(&self, token: &str) -> String {
        let line = std::iter::once(safe_path_str(&self.java))
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        if token.is_empty() {
            line
        } else {
            line.replace(token, TOKEN_MASK)
        }
    }

    fn command(&self) -> Command {
        let mut cmd = match self.priority.nice_increment() {
            Some(increment) if cfg!(unix) => {
                let mut cmd = Command::new("nice");
                cmd.arg("-n").arg(increment.to_string()).arg(&self.java);
                cmd
            }
            _ => Command::new(&self.java),
        };
        cmd.args(&self.args)
            .current_dir(&self.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

/// Check preconditions and assemble the command for instance `name`.
pub async fn prepare_launch(
    dir: &MinecraftDirectory,
    name: &str,
    options: &LaunchOptions,
) -> LauncherResult<LaunchCommand> {
    let account = options.account.as_ref().ok_or(LauncherError::AccountMissing)?;
    let config = InstanceConfig::load(dir, name).await?;

    let mut resolver = ManifestResolver::new(dir.versions_dir());
    let manifest = resolver.load(&dir.manifest_path(name)).await?;
    let platform = Platform::current();
    let manifest: ClientManifest = if remap::applies_to(&platform) {
        remap::remap(Arc::unwrap_or_clone(manifest), &platform)
    } else {
        Arc::unwrap_or_clone(manifest)
    };

    let java = options
        .java
        .clone()
        .or_else(|| config.java_path.clone())
        .ok_or_else(|| LauncherError::JavaNotFound(manifest.required_java_major()))?;
    if !java.is_file() {
        return Err(LauncherError::MissingDependency {
            coordinate: safe_path_str(&java),
            requirement: format!("Java {} executable", manifest.required_java_major()),
        });
    }

    let classpath = build_classpath(
        &manifest,
        dir,
        &dir.client_jar_path(name),
        &config.additional_libraries,
        &platform,
        &options.features,
    )?;
    let natives_dir = dir.natives_dir(name);
    let game_dir = dir.instance_dir(name);
    let assets_dir = dir.assets_dir();
    let libraries_dir = dir.libraries_dir();
    let asset_index = manifest
        .asset_index
        .as_ref()
        .map(|index| index.id.as_str())
        .unwrap_or("legacy");

    let values = ArgumentValues::for_launch(&ArgumentContext {
        account,
        version_name: name,
        version_type: manifest.version_type.as_deref().unwrap_or("release"),
        game_dir: &game_dir,
        assets_dir: &assets_dir,
        asset_index,
        natives_dir: &natives_dir,
        libraries_dir: &libraries_dir,
        classpath: &classpath,
        launcher_name: &options.launcher_name,
        launcher_version: &options.launcher_version,
    });

    let mut args = vec![format!("-Xmx{}M", config.max_memory_mb)];
    args.extend(account.jvm_arguments());
    let jvm = build_jvm_arguments(&manifest, &platform, &options.features, &values);
    if !jvm.iter().any(|arg| arg == "-cp" || arg == "-classpath") {
        args.push("-cp".into());
        args.push(classpath.clone());
    }
    args.extend(jvm);
    args.push(manifest.main_class.clone());
    args.extend(build_game_arguments(
        &manifest,
        &platform,
        &options.features,
        &values,
    ));

    Ok(LaunchCommand {
        java,
        args,
        working_dir: game_dir,
        priority: config.priority,
    })
}

/// Launch instance `name` and wait for the game to exit.
pub async fn launch(
    dir: &MinecraftDirectory,
    name: &str,
    options: LaunchOptions,
) -> LauncherResult<LaunchOutcome> {
    let command = prepare_launch(dir, name, &options).await?;
    let token = options
        .account
        .as_ref()
        .map(|a| a.access_token().to_string())
        .unwrap_or_default();

    info!("Launching {} with Java {:?}", name, command.java);
    debug!("Command: {}", command.masked(&token));

    let mut child = command.command().spawn().map_err(|e| LauncherError::Spawn {
        program: safe_path_str(&command.java),
        source: e,
    })?;
    let pid = child.id().unwrap_or_default();

    let mut mirrors = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        mirrors.push(tokio::spawn(mirror_output(stdout, false)));
    }
    if let Some(stderr) = child.stderr.take() {
        mirrors.push(tokio::spawn(mirror_output(stderr, true)));
    }

    let window_shown = Arc::new(AtomicBool::new(false));
    let poller = options.window_probe.clone().map(|probe| {
        AbortOnDrop::new(tokio::spawn(poll_window(
            probe,
            pid,
            Arc::clone(&window_shown),
        )))
    });

    let status = child
        .wait()
        .await
        .map_err(|e| LauncherError::io(&command.working_dir, e))?;
    drop(poller);
    for mirror in mirrors {
        let _ = mirror.await;
    }

    let outcome = LaunchOutcome::from_status(status, window_shown.load(Ordering::SeqCst));
    match &outcome.failure {
        None => info!("{} exited normally", name),
        Some(reason) => warn!("{} exited abnormally: {}", name, reason),
    }
    Ok(outcome)
}

async fn mirror_output<R>(stream: R, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            warn!(target: "game", "{}", line);
        } else {
            info!(target: "game", "{}", line);
        }
    }
}

async fn poll_window(probe: Arc<dyn WindowProbe>, pid: u32, shown: Arc<AtomicBool>) {
    let mut ticker = tokio::time::interval(WINDOW_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        if probe.is_window_visible(pid) {
            info!("Game window of process {} is visible", pid);
            shown.store(true, Ordering::SeqCst);
            return;
        }
    }
}
