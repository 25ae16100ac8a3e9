use std::fmt;
use std::path::{Path, PathBuf};

use super::source::DownloadSource;

/// Lazily computed fallback URL. Only invoked after the primary fetch failed.
pub type FallbackProvider = Box<dyn FnOnce() -> String + Send>;

/// A single file to download with optional SHA-1 for validation.
pub struct DownloadItem {
    pub url: String,
    pub dest: PathBuf,
    pub sha1: Option<String>,
    pub size: Option<u64>,
    fallback: Option<FallbackProvider>,
}

impl DownloadItem {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            sha1: None,
            size: None,
            fallback: None,
        }
    }

    /// Primary URL from `source`; the official URL becomes the fallback,
    /// computed only if the primary fails.
    pub fn from_source<F>(source: DownloadSource, url_for: F, dest: impl Into<PathBuf>) -> Self
    where
        F: Fn(DownloadSource) -> String + Send + 'static,
    {
        let mut item = Self::new(url_for(source), dest);
        if let Some(fallback) = source.fallback() {
            item.fallback = Some(Box::new(move || url_for(fallback)));
        }
        item
    }

    /// Shorthand for an official URL rewritten through `source`.
    pub fn mirrored(
        source: DownloadSource,
        official_url: impl Into<String>,
        dest: impl Into<PathBuf>,
    ) -> Self {
        let official_url = official_url.into();
        Self::from_source(source, move |s| s.rewrite(&official_url), dest)
    }

    pub fn with_sha1(mut self, sha1: Option<String>) -> Self {
        self.sha1 = sha1.filter(|s| !s.is_empty());
        self
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn with_fallback<F>(mut self, provider: F) -> Self
    where
        F: FnOnce() -> String + Send + 'static,
    {
        self.fallback = Some(Box::new(provider));
        self
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Resolve the fallback URL, consuming the provider.
    pub(crate) fn take_fallback(&mut self) -> Option<String> {
        self.fallback.take().map(|provider| provider())
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }
}

impl fmt::Debug for DownloadItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadItem")
            .field("url", &self.url)
            .field("dest", &self.dest)
            .field("sha1", &self.sha1)
            .field("size", &self.size)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn fallback_is_not_computed_eagerly() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut item = DownloadItem::from_source(
            DownloadSource::Bmclapi,
            move |source| {
                counter.fetch_add(1, Ordering::SeqCst);
                source.rewrite("https://libraries.minecraft.net/a/b/1/b-1.jar")
            },
            "/tmp/b-1.jar",
        );

        // Only the primary URL has been computed so far.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(item.url.starts_with("https://bmclapi2.bangbang93.com/"));

        let fallback = item.take_fallback().unwrap();
        assert_eq!(fallback, "https://libraries.minecraft.net/a/b/1/b-1.jar");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(item.take_fallback().is_none());
    }

    #[test]
    fn official_source_has_no_fallback() {
        let item = DownloadItem::mirrored(
            DownloadSource::Official,
            "https://libraries.minecraft.net/a/b/1/b-1.jar",
            "/tmp/b-1.jar",
        );
        assert!(!item.has_fallback());
    }
}
