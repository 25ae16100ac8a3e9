use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, Response};
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;

use super::source::DownloadSource;

/// Response body delivered chunk by chunk.
pub type ByteStream = BoxStream<'static, LauncherResult<Vec<u8>>>;

/// Transport used by the download engine. A non-success status is an error.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// The whole body, for small documents (manifests, profiles, lists).
    async fn fetch(&self, url: &str) -> LauncherResult<Vec<u8>>;

    /// The body as a stream, for files written to disk. Defaults to a single
    /// chunk holding the whole body.
    async fn fetch_stream(&self, url: &str) -> LauncherResult<ByteStream> {
        let bytes = self.fetch(url).await?;
        Ok(stream::once(async move { Ok(bytes) }).boxed())
    }
}

/// `reqwest`-backed fetcher sharing one client across all downloads.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> LauncherResult<Self> {
        Ok(Self {
            client: build_http_client()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn get(&self, url: &str) -> LauncherResult<Response> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> LauncherResult<Vec<u8>> {
        let bytes = self.get(url).await?.bytes().await?;
        debug!("Fetched {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn fetch_stream(&self, url: &str) -> LauncherResult<ByteStream> {
        let response = self.get(url).await?;
        debug!("Streaming {} ({:?} bytes)", url, response.content_length());
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(LauncherError::from))
            .boxed())
    }
}

/// Fetch an official URL through `source`, retrying the official host once
/// when a mirror fails.
pub async fn fetch_mirrored(
    fetcher: &dyn Fetcher,
    source: DownloadSource,
    official_url: &str,
) -> LauncherResult<Vec<u8>> {
    match fetcher.fetch(&source.rewrite(official_url)).await {
        Ok(bytes) => Ok(bytes),
        Err(e) => match source.fallback() {
            Some(fallback) => {
                warn!("{:?} failed for {} ({}), retrying {:?}", source, official_url, e, fallback);
                fetcher.fetch(&fallback.rewrite(official_url)).await
            }
            None => Err(e),
        },
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// In-memory fetcher recording every attempted URL. Unknown URLs fail
    /// with a 404.
    #[derive(Default)]
    pub struct MemoryFetcher {
        files: HashMap<String, Vec<u8>>,
        /// URLs whose stream breaks after the given prefix.
        broken: HashMap<String, Vec<u8>>,
        chunk_size: Option<usize>,
        attempts: Mutex<Vec<String>>,
        delay: Option<Duration>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MemoryFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_file(mut self, url: &str, body: &[u8]) -> Self {
            self.files.insert(url.to_string(), body.to_vec());
            self
        }

        pub fn with_broken_stream(mut self, url: &str, prefix: &[u8]) -> Self {
            self.broken.insert(url.to_string(), prefix.to_vec());
            self
        }

        /// Split streamed bodies into chunks of `size` bytes.
        pub fn with_chunk_size(mut self, size: usize) -> Self {
            self.chunk_size = Some(size.max(1));
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }

        /// Highest number of fetches observed running at once.
        pub fn peak_concurrency(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for MemoryFetcher {
        async fn fetch(&self, url: &str) -> LauncherResult<Vec<u8>> {
            self.attempts.lock().unwrap().push(url.to_string());

            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            self.files
                .get(url)
                .cloned()
                .ok_or_else(|| LauncherError::DownloadFailed {
                    url: url.to_string(),
                    status: 404,
                })
        }

        async fn fetch_stream(&self, url: &str) -> LauncherResult<ByteStream> {
            if let Some(prefix) = self.broken.get(url) {
                self.attempts.lock().unwrap().push(url.to_string());
                let chunks = vec![
                    Ok(prefix.clone()),
                    Err(LauncherError::Fetch {
                        url: url.to_string(),
                        message: "connection reset".into(),
                    }),
                ];
                return Ok(stream::iter(chunks).boxed());
            }

            let bytes = self.fetch(url).await?;
            let size = self.chunk_size.unwrap_or(usize::MAX);
            let chunks: Vec<LauncherResult<Vec<u8>>> =
                bytes.chunks(size).map(|c| Ok(c.to_vec())).collect();
            Ok(stream::iter(chunks).boxed())
        }
    }
}
