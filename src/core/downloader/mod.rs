mod batch;
mod fetch;
mod item;
mod source;

pub use batch::{
    sha1_hex, validate_sha1, BatchObserver, BatchReport, CollisionPolicy, Downloader, ItemCallback,
};
pub use fetch::{fetch_mirrored, ByteStream, Fetcher, HttpFetcher};
pub use item::{DownloadItem, FallbackProvider};
pub use source::{DownloadSource, VERSION_MANIFEST_URL};

#[cfg(test)]
pub(crate) use fetch::testing;
