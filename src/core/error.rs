use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the installation and launch engine.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Sha1Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Collision policy ────────────────────────────────
    #[error("Destination already exists: {0:?}")]
    AlreadyExists(PathBuf),

    // ── Malformed data ──────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    #[error("Malformed manifest {source_name}: {message}")]
    MalformedManifest {
        source_name: String,
        message: String,
    },

    #[error("Malformed install profile: {0}")]
    MalformedProfile(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Missing dependencies ────────────────────────────
    #[error("Parent manifest {parent} of {child} not found at {path:?}")]
    ParentNotFound {
        child: String,
        parent: String,
        path: PathBuf,
    },

    #[error("Missing dependency {coordinate}: {requirement}")]
    MissingDependency {
        coordinate: String,
        requirement: String,
    },

    #[error("Java not found for major version {0}")]
    JavaNotFound(u32),

    #[error("No account configured")]
    AccountMissing,

    // ── External processes ──────────────────────────────
    #[error("{program} exited with code {code:?}: {stderr}")]
    ProcessFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    // ── Loader ──────────────────────────────────────────
    #[error("Loader error: {0}")]
    Loader(String),

    #[error("Loader API unreachable: {0}")]
    LoaderApi(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

/// Coarse failure taxonomy used to decide retry and propagation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transient; eligible for exactly one fallback-source retry.
    Network,
    MalformedData,
    MissingDependency,
    ExternalProcess,
    AlreadyExists,
    Io,
    Other,
}

impl LauncherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LauncherError::Http(_)
            | LauncherError::DownloadFailed { .. }
            | LauncherError::Fetch { .. }
            | LauncherError::Sha1Mismatch { .. }
            | LauncherError::LoaderApi(_) => ErrorKind::Network,
            LauncherError::InvalidMavenCoordinate(_)
            | LauncherError::MalformedManifest { .. }
            | LauncherError::MalformedProfile(_)
            | LauncherError::Json(_)
            | LauncherError::Zip(_) => ErrorKind::MalformedData,
            LauncherError::ParentNotFound { .. }
            | LauncherError::MissingDependency { .. }
            | LauncherError::JavaNotFound(_)
            | LauncherError::AccountMissing => ErrorKind::MissingDependency,
            LauncherError::ProcessFailed { .. } | LauncherError::Spawn { .. } => {
                ErrorKind::ExternalProcess
            }
            LauncherError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            LauncherError::Io { .. } => ErrorKind::Io,
            LauncherError::Loader(_) | LauncherError::Other(_) => ErrorKind::Other,
        }
    }

    /// User-facing sentence describing the failure. `Display` keeps the
    /// technical detail for logs.
    pub fn reason(&self) -> String {
        match self {
            LauncherError::Io { path, .. } => {
                format!("Could not read or write {}.", path.display())
            }
            LauncherError::Http(_) | LauncherError::Fetch { .. } => {
                "A network request failed. Check your connection or switch download source."
                    .into()
            }
            LauncherError::DownloadFailed { url, status } => {
                format!("The server refused to deliver {} (status {}).", file_name(url), status)
            }
            LauncherError::Sha1Mismatch { path, .. } => format!(
                "{} was corrupted during download.",
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            ),
            LauncherError::AlreadyExists(path) => format!(
                "{} already exists.",
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            ),
            LauncherError::InvalidMavenCoordinate(coord) => {
                format!("The library name {} is not valid.", coord)
            }
            LauncherError::MalformedManifest { source_name, .. } => {
                format!("The version descriptor {} is damaged.", source_name)
            }
            LauncherError::MalformedProfile(_) => {
                "The mod loader installer contains an unreadable install profile.".into()
            }
            LauncherError::Json(_) => "Received data in an unexpected format.".into(),
            LauncherError::Zip(_) => "An archive could not be opened.".into(),
            LauncherError::ParentNotFound { child, parent, .. } => format!(
                "Version {} needs version {} to be installed first.",
                child, parent
            ),
            LauncherError::MissingDependency {
                coordinate,
                requirement,
            } => format!("{} is required ({}).", coordinate, requirement),
            LauncherError::JavaNotFound(major) => {
                format!("No Java {} installation was found.", major)
            }
            LauncherError::AccountMissing => {
                "Create and select an account before launching.".into()
            }
            LauncherError::ProcessFailed { program, code, .. } => match code {
                Some(code) => format!("{} stopped with exit code {}.", program, code),
                None => format!("{} was terminated.", program),
            },
            LauncherError::Spawn { program, .. } => format!("{} could not be started.", program),
            LauncherError::Loader(message) => format!("Mod loader install failed: {}", message),
            LauncherError::LoaderApi(_) => "The mod loader service is unreachable.".into(),
            LauncherError::Other(message) => message.clone(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }
}

fn file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_groups_variants() {
        let err = LauncherError::DownloadFailed {
            url: "https://example.com/a.jar".into(),
            status: 404,
        };
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(
            LauncherError::AlreadyExists(PathBuf::from("/tmp/a")).kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            LauncherError::ParentNotFound {
                child: "fabric".into(),
                parent: "1.20.1".into(),
                path: PathBuf::new(),
            }
            .kind(),
            ErrorKind::MissingDependency
        );
    }

    #[test]
    fn reason_differs_from_technical_message() {
        let err = LauncherError::DownloadFailed {
            url: "https://example.com/lib/a.jar".into(),
            status: 503,
        };
        assert_ne!(err.reason(), err.to_string());
        assert!(err.reason().contains("a.jar"));
    }
}
