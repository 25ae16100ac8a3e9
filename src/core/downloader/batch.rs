use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::guard::AbortOnDrop;

use super::fetch::Fetcher;
use super::item::DownloadItem;

const PROGRESS_TICK: Duration = Duration::from_millis(200);

/// What to do when a destination already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Keep the existing file and report success.
    #[default]
    Skip,
    /// Fetch and overwrite.
    Replace,
    /// Abort the item with `AlreadyExists` before any network call.
    Fail,
}

/// Invoked once per item that finished (fetched, skipped or deduplicated).
pub type ItemCallback = Arc<dyn Fn(&Path) + Send + Sync>;

/// Optional observers for a batch run.
#[derive(Default, Clone)]
pub struct BatchObserver {
    /// Receives the batch fraction in `[0, 1]`, never decreasing.
    pub progress: Option<watch::Sender<f64>>,
    pub on_item_done: Option<ItemCallback>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched: usize,
    pub skipped: usize,
    /// Items collapsed onto another item with the same destination.
    pub deduplicated: usize,
}

enum Outcome {
    Fetched,
    Skipped,
    /// Not started because a sibling already failed.
    Cancelled,
}

/// Bounded-concurrency, SHA-1 validated downloader.
///
/// One `Downloader` may run several batches at once; a destination is only
/// ever written by one task at a time.
#[derive(Clone)]
pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
    /// Maximum number of parallel downloads.
    concurrency: usize,
    in_flight: Arc<InFlight>,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            concurrency: 16,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    pub async fn run_batch(
        &self,
        items: Vec<DownloadItem>,
        policy: CollisionPolicy,
    ) -> LauncherResult<BatchReport> {
        self.run_batch_observed(items, policy, BatchObserver::default())
            .await
    }

    /// Download every item, at most `concurrency` at a time.
    ///
    /// Fails with the first unrecoverable item error. Items not yet started
    /// at that point are skipped; items already running are allowed to
    /// finish.
    pub async fn run_batch_observed(
        &self,
        items: Vec<DownloadItem>,
        policy: CollisionPolicy,
        observer: BatchObserver,
    ) -> LauncherResult<BatchReport> {
        let mut report = BatchReport::default();
        let progress = Arc::new(BatchProgress::for_items(&items));

        // Collapse duplicate destinations within the batch; first item wins.
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(items.len());
        for item in items {
            if seen.insert(item.dest.clone()) {
                unique.push(item);
            } else {
                debug!("Deduplicated download for {:?}", item.dest);
                progress.complete(&item);
                if let Some(cb) = &observer.on_item_done {
                    cb(&item.dest);
                }
                report.deduplicated += 1;
            }
        }

        info!(
            "Starting batch download: {} files, concurrency={}, policy={:?}",
            unique.len(),
            self.concurrency,
            policy
        );

        let _ticker = observer
            .progress
            .clone()
            .map(|tx| spawn_ticker(tx, Arc::clone(&progress)));

        let failed = AtomicBool::new(false);
        let results: Vec<LauncherResult<Outcome>> = if self.concurrency == 1 {
            let mut results = Vec::with_capacity(unique.len());
            for item in unique {
                let result = self.run_item(item, policy, &progress, &observer).await;
                let stop = result.is_err();
                results.push(result);
                if stop {
                    break;
                }
            }
            results
        } else {
            stream::iter(unique)
                .map(|item| {
                    let failed = &failed;
                    let progress = &progress;
                    let observer = &observer;
                    async move {
                        if failed.load(Ordering::SeqCst) {
                            return Ok(Outcome::Cancelled);
                        }
                        let result = self.run_item(item, policy, progress, observer).await;
                        if result.is_err() {
                            failed.store(true, Ordering::SeqCst);
                        }
                        result
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await
        };

        for result in results {
            match result? {
                Outcome::Fetched => report.fetched += 1,
                Outcome::Skipped => report.skipped += 1,
                Outcome::Cancelled => {}
            }
        }

        if let Some(tx) = &observer.progress {
            publish(tx, 1.0);
        }
        info!(
            "Batch finished: {} fetched, {} skipped, {} deduplicated",
            report.fetched, report.skipped, report.deduplicated
        );
        Ok(report)
    }

    async fn run_item(
        &self,
        mut item: DownloadItem,
        policy: CollisionPolicy,
        progress: &BatchProgress,
        observer: &BatchObserver,
    ) -> LauncherResult<Outcome> {
        let _slot = self.in_flight.acquire(&item.dest).await;

        let exists = tokio::fs::try_exists(&item.dest)
            .await
            .map_err(|e| LauncherError::io(&item.dest, e))?;

        // Bytes of the current attempt already counted towards progress.
        let mut streamed = 0;
        let outcome = if exists && policy == CollisionPolicy::Fail {
            return Err(LauncherError::AlreadyExists(item.dest.clone()));
        } else if exists && policy == CollisionPolicy::Skip {
            Outcome::Skipped
        } else {
            let sha1 = item.sha1.clone();
            match self
                .fetch_to(&item.url, &item.dest, sha1.as_deref(), progress, &mut streamed)
                .await
            {
                Ok(()) => Outcome::Fetched,
                Err(primary_err) => match item.take_fallback() {
                    Some(fallback_url) => {
                        warn!(
                            "Download of {} failed ({}), retrying {}",
                            item.url, primary_err, fallback_url
                        );
                        progress.rewind(&mut streamed);
                        // The fallback always overwrites.
                        self.fetch_to(&fallback_url, &item.dest, sha1.as_deref(), progress, &mut streamed)
                            .await?;
                        Outcome::Fetched
                    }
                    None => return Err(primary_err),
                },
            }
        };

        progress.rewind(&mut streamed);
        progress.complete(&item);
        if let Some(cb) = &observer.on_item_done {
            cb(&item.dest);
        }
        Ok(outcome)
    }

    /// Stream `url` into `<dest>.part` and rename it onto `dest` once the
    /// SHA-1 matches. The partial file never outlives a failed attempt.
    async fn fetch_to(
        &self,
        url: &str,
        dest: &Path,
        sha1: Option<&str>,
        progress: &BatchProgress,
        streamed: &mut u64,
    ) -> LauncherResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let partial = partial_path(dest);
        if let Err(e) = self
            .stream_to(url, dest, &partial, sha1, progress, streamed)
            .await
        {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not remove {:?}: {}", partial, cleanup);
                }
            }
            return Err(e);
        }

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(())
    }

    async fn stream_to(
        &self,
        url: &str,
        dest: &Path,
        partial: &Path,
        sha1: Option<&str>,
        progress: &BatchProgress,
        streamed: &mut u64,
    ) -> LauncherResult<()> {
        let mut body = self.fetcher.fetch_stream(url).await?;
        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|e| LauncherError::io(partial, e))?;
        let mut hasher = Sha1::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| LauncherError::io(partial, e))?;
            progress.advance(chunk.len() as u64, streamed);
        }
        file.flush()
            .await
            .map_err(|e| LauncherError::io(partial, e))?;
        drop(file);

        if let Some(expected) = sha1 {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(LauncherError::Sha1Mismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        tokio::fs::rename(partial, dest)
            .await
            .map_err(|e| LauncherError::io(dest, e))
    }
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Validate an existing file's SHA-1.
pub async fn validate_sha1(path: &Path, expected: &str) -> LauncherResult<bool> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    Ok(sha1_hex(&bytes).eq_ignore_ascii_case(expected))
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

// ─── Progress ───

/// Completed units over total units. Byte-weighted when every item declares
/// its size, item-count otherwise; decided once per batch.
///
/// In byte mode, bytes of unfinished items count through `streamed` and are
/// swapped for the declared size when the item completes.
struct BatchProgress {
    by_bytes: bool,
    total: u64,
    done: AtomicU64,
    streamed: AtomicU64,
    items_done: AtomicUsize,
}

impl BatchProgress {
    fn for_items(items: &[DownloadItem]) -> Self {
        let by_bytes = !items.is_empty() && items.iter().all(|i| i.size.is_some());
        let total = if by_bytes {
            items.iter().filter_map(|i| i.size).sum()
        } else {
            items.len() as u64
        };
        Self {
            by_bytes,
            total,
            done: AtomicU64::new(0),
            streamed: AtomicU64::new(0),
            items_done: AtomicUsize::new(0),
        }
    }

    fn complete(&self, item: &DownloadItem) {
        let units = if self.by_bytes {
            item.size.unwrap_or(0)
        } else {
            1
        };
        self.done.fetch_add(units, Ordering::SeqCst);
        self.items_done.fetch_add(1, Ordering::SeqCst);
    }

    fn advance(&self, bytes: u64, streamed: &mut u64) {
        if self.by_bytes {
            self.streamed.fetch_add(bytes, Ordering::SeqCst);
            *streamed += bytes;
        }
    }

    /// Drop one item's in-flight bytes, e.g. before a fallback restarts it.
    fn rewind(&self, streamed: &mut u64) {
        self.streamed.fetch_sub(*streamed, Ordering::SeqCst);
        *streamed = 0;
    }

    fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        let units = self.done.load(Ordering::SeqCst) + self.streamed.load(Ordering::SeqCst);
        (units as f64 / self.total as f64).min(1.0)
    }
}

fn publish(tx: &watch::Sender<f64>, value: f64) {
    tx.send_if_modified(|current| {
        if value > *current {
            *current = value;
            true
        } else {
            false
        }
    });
}

fn spawn_ticker(tx: watch::Sender<f64>, progress: Arc<BatchProgress>) -> AbortOnDrop<()> {
    AbortOnDrop::new(tokio::spawn(async move {
        let mut interval = tokio::time::interval(PROGRESS_TICK);
        loop {
            interval.tick().await;
            publish(&tx, progress.fraction());
            debug!(
                "Batch progress {:.1}% ({} items)",
                progress.fraction() * 100.0,
                progress.items_done.load(Ordering::SeqCst)
            );
        }
    }))
}

// ─── Single-flight ───

/// Destinations currently being written, shared by every batch of a
/// `Downloader`.
#[derive(Default)]
struct InFlight {
    paths: Mutex<HashSet<PathBuf>>,
    released: Notify,
}

struct InFlightSlot<'a> {
    owner: &'a InFlight,
    path: PathBuf,
}

impl InFlight {
    async fn acquire(&self, path: &Path) -> InFlightSlot<'_> {
        loop {
            // Register for wakeups before checking to avoid a lost notify.
            let released = self.released.notified();
            {
                let mut paths = self.paths.lock().unwrap_or_else(|e| e.into_inner());
                if paths.insert(path.to_path_buf()) {
                    return InFlightSlot {
                        owner: self,
                        path: path.to_path_buf(),
                    };
                }
            }
            released.await;
        }
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.owner
            .paths
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.path);
        self.owner.released.notify_waiters();
    }
}
