// ─── Install Processors ───
// Runs the client-side post-processing steps of a modern install profile,
// one at a time and in declared order.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::downloader::{CollisionPolicy, DownloadItem, DownloadSource, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::install::task::InstallTask;
use crate::core::instance::layout::MinecraftDirectory;
use crate::core::launch::classpath::classpath_separator;
use crate::core::maven::MavenArtifact;
use crate::core::version::DownloadInfo;

use super::profile::{path_string, Processor};

/// Lines of processor stderr kept in the error.
const STDERR_TAIL_LINES: usize = 20;

pub struct ProcessorRunner<'a> {
    pub java: &'a Path,
    pub dir: &'a MinecraftDirectory,
    /// Materialized template values, `{KEY}` → value.
    pub values: &'a BTreeMap<String, String>,
    pub working_dir: &'a Path,
    /// `client_mappings` of the base version, used instead of the
    /// DOWNLOAD_MOJMAPS step.
    pub mappings: Option<&'a DownloadInfo>,
    pub downloader: &'a Downloader,
    pub source: DownloadSource,
}

impl ProcessorRunner<'_> {
    /// Run every processor sequentially. The first failure aborts the rest.
    pub async fn run_all(
        &self,
        processors: &[&Processor],
        task: Option<&InstallTask>,
    ) -> LauncherResult<()> {
        info!("Running {} install processors", processors.len());

        for (i, processor) in processors.iter().enumerate() {
            let intercepted =
                processor.is_download_mojmaps() && self.download_mappings(processor).await?;
            if !intercepted {
                self.run(processor).await?;
            }
            if let Some(task) = task {
                task.set_stage_percentage((i + 1) as f64 / processors.len() as f64);
            }
        }
        Ok(())
    }

    async fn run(&self, processor: &Processor) -> LauncherResult<()> {
        let jar = self.library_jar(&processor.jar)?;
        if !jar.exists() {
            return Err(LauncherError::MissingDependency {
                coordinate: processor.jar.clone(),
                requirement: format!("processor jar missing at {}", jar.display()),
            });
        }

        let main_class = read_main_class(&jar)?;
        let mut classpath = vec![path_string(&jar)];
        for entry in &processor.classpath {
            classpath.push(path_string(&self.library_jar(entry)?));
        }

        let args = processor
            .args
            .iter()
            .map(|arg| resolve_arg(arg, self.values, self.dir))
            .collect::<LauncherResult<Vec<_>>>()?;

        info!("Running processor {} ({})", processor.label(), main_class);
        debug!("Processor args: {:?}", args);

        let output = tokio::process::Command::new(self.java)
            .arg("-cp")
            .arg(classpath.join(classpath_separator()))
            .arg(&main_class)
            .args(&args)
            .current_dir(self.working_dir)
            .output()
            .await
            .map_err(|e| LauncherError::Spawn {
                program: self.java.display().to_string(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(LauncherError::ProcessFailed {
                program: processor.jar.clone(),
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(())
    }

    /// Fetch the official mappings straight to the step's `--output`.
    /// Returns `false` when the step cannot be replaced and must run.
    async fn download_mappings(&self, processor: &Processor) -> LauncherResult<bool> {
        let (Some(output), Some(mappings)) = (processor.arg_after("--output"), self.mappings)
        else {
            return Ok(false);
        };

        let dest = PathBuf::from(resolve_arg(output, self.values, self.dir)?);
        let item = DownloadItem::mirrored(self.source, mappings.url.clone(), dest)
            .with_sha1(mappings.sha1.clone())
            .with_size(mappings.size);
        self.downloader
            .run_batch(vec![item], CollisionPolicy::Replace)
            .await?;

        debug!("Replaced DOWNLOAD_MOJMAPS with a direct download");
        Ok(true)
    }

    fn library_jar(&self, coord: &str) -> LauncherResult<PathBuf> {
        Ok(self
            .dir
            .libraries_dir()
            .join(MavenArtifact::parse(coord)?.local_path()))
    }
}

/// Resolve one processor argument: `[coord]` becomes a library path,
/// `'text'` a literal, and every `{KEY}` is substituted from `values`.
pub fn resolve_arg(
    arg: &str,
    values: &BTreeMap<String, String>,
    dir: &MinecraftDirectory,
) -> LauncherResult<String> {
    if let Some(coord) = arg.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let artifact = MavenArtifact::parse(coord)?;
        return Ok(path_string(&dir.libraries_dir().join(artifact.local_path())));
    }
    if let Some(literal) = arg.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Ok(literal.to_string());
    }

    let mut out = arg.to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    Ok(out)
}

/// `Main-Class` from a jar's `META-INF/MANIFEST.MF`, following continuation
/// lines.
pub fn read_main_class(path: &Path) -> LauncherResult<String> {
    let file = std::fs::File::open(path).map_err(|e| LauncherError::io(path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut manifest = archive.by_name("META-INF/MANIFEST.MF").map_err(|e| {
        LauncherError::Loader(format!("Manifest not found in {}: {}", path.display(), e))
    })?;

    let mut text = String::new();
    manifest
        .read_to_string(&mut text)
        .map_err(|e| LauncherError::io(path, e))?;

    let mut main_class: Option<String> = None;
    let mut current_key: Option<&str> = None;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix(' ') {
            if current_key == Some("Main-Class") {
                if let Some(value) = &mut main_class {
                    value.push_str(rest.trim_end());
                }
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            current_key = Some(key);
            if key == "Main-Class" {
                main_class = Some(value.trim().to_string());
            }
        }
    }

    main_class.filter(|c| !c.is_empty()).ok_or_else(|| {
        LauncherError::Loader(format!("Main-Class missing in {}", path.display()))
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
