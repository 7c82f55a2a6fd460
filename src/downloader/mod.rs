//! Concurrent file downloader: bounded parallel fetch-with-retry plus
//! the path normalization helpers every destination path passes through.

pub mod engine;
pub mod path;

pub use engine::{Downloader, DownloaderConfig, DEFAULT_DOWNLOAD_CONCURRENCY};
pub use path::normalize_path;
