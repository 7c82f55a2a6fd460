//! Site-dispatching crawler framework (§4.2): a pluggable registry that
//! selects a site-specific parser by URL host and drives it through the
//! common lifecycle (parse → download → terminal status).

pub mod sites;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigProvider;
use crate::downloader::{normalize_path, Downloader, DownloaderConfig};
use crate::error::{AppError, AppResult};
use crate::http_client::ReqClient;
use crate::model::{ParseResult, TaskStatus};
use crate::task_manager::updater::TaskUpdater;

/// Capabilities handed to a parser's `parse` call. Modeled as a
/// concrete struct of optional-to-use fields rather than a set of
/// mandatory trait methods every parser has to no-op (§9 "avoid
/// mandatory methods that most parsers no-op").
pub struct ParseContext {
    pub client: Arc<ReqClient>,
    pub cancel: CancellationToken,
    pub updater: Arc<TaskUpdater>,
}

impl ParseContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Parser contract (§4.2): turns a URL into an index-aligned list of
/// image URLs and relative file paths, plus an album name.
#[async_trait]
pub trait Parser: Send + Sync {
    fn name(&self) -> &'static str;
    async fn parse(&self, ctx: &ParseContext, url: &str) -> AppResult<ParseResult>;
}

pub type ParserConstructor = fn() -> Box<dyn Parser>;

struct HostMatcher {
    site_type: &'static str,
    substrings: &'static [&'static str],
}

pub const SITE_TYPE_GENERIC: &str = "generic";

/// Two immutable-after-startup registries (§4.2, §9): site-type →
/// constructor, and an ordered host-substring → site-type list where
/// the first match wins.
pub struct CrawlerRegistry {
    constructors: HashMap<&'static str, ParserConstructor>,
    host_matchers: Vec<HostMatcher>,
}

impl CrawlerRegistry {
    pub fn new() -> Self {
        let mut registry = Self { constructors: HashMap::new(), host_matchers: Vec::new() };
        sites::register_all(&mut registry);
        registry
    }

    pub fn register(&mut self, site_type: &'static str, ctor: ParserConstructor) {
        self.constructors.insert(site_type, ctor);
    }

    pub fn register_host_contains(&mut self, site_type: &'static str, substrings: &'static [&'static str]) {
        self.host_matchers.push(HostMatcher { site_type, substrings });
    }

    pub fn detect_site_type(&self, host: &str) -> &'static str {
        for matcher in &self.host_matchers {
            if matcher.substrings.iter().any(|s| host.contains(s)) {
                return matcher.site_type;
            }
        }
        SITE_TYPE_GENERIC
    }

    pub fn create_parser(&self, site_type: &str) -> Option<Box<dyn Parser>> {
        self.constructors.get(site_type).map(|ctor| ctor())
    }
}

impl Default for CrawlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives any parser through the common lifecycle (§4.2 items 1-9).
pub struct BaseCrawler {
    registry: Arc<CrawlerRegistry>,
    config: Arc<ConfigProvider>,
    downloader_config: DownloaderConfig,
}

impl BaseCrawler {
    pub fn new(registry: Arc<CrawlerRegistry>, config: Arc<ConfigProvider>, downloader_config: DownloaderConfig) -> Self {
        Self { registry, config, downloader_config }
    }

    /// Runs one job end to end: detect site type, parse, download, and
    /// report a terminal outcome. Returns the album's absolute save
    /// path on success.
    pub async fn crawl(
        &self,
        url: &str,
        client: Arc<ReqClient>,
        updater: Arc<TaskUpdater>,
        cancel: CancellationToken,
    ) -> AppResult<PathBuf> {
        let parsed = reqwest::Url::parse(url).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
        let host = parsed.host_str().unwrap_or("").to_string();
        let site_type = self.registry.detect_site_type(&host);
        let parser = self
            .registry
            .create_parser(site_type)
            .ok_or_else(|| AppError::UnsupportedSite(site_type.to_string()))?;

        // 1-2: inject cancellation + proxy into the shared client.
        client.set_context(cancel.clone());
        if let Some(proxy) = self.config.get_proxy() {
            client.set_proxy(Some(&proxy))?;
        }

        // 3: cancellation check before touching the network.
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        updater.update_task_status(TaskStatus::Parsing, None);

        // 4: parse.
        let ctx = ParseContext { client: client.clone(), cancel: cancel.clone(), updater: updater.clone() };
        let result = parser.parse(&ctx, url).await?;

        if result.image_urls.len() != result.file_paths.len() {
            return Err(AppError::Parse(format!(
                "{}: image URL count ({}) does not match file path count ({})",
                parser.name(),
                result.image_urls.len(),
                result.file_paths.len()
            )));
        }

        // 5: cancellation check after parse.
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        // 6: name + status.
        updater.update_task_name(result.name.clone());
        updater.update_task_status(TaskStatus::Downloading, None);

        // 7: absolute destination paths under outputDir/<name>/.
        let album_dir = normalize_path(&result.name);
        let output_dir = self.config.get_output_dir();
        let album_path = output_dir.join(album_dir);
        let abs_paths: Vec<PathBuf> =
            result.file_paths.iter().map(|p| album_path.join(normalize_path(p))).collect();

        // 8: batch download.
        let downloader = Downloader::new(client.clone(), self.downloader_config.clone());
        let total = result.image_urls.len();
        let success =
            downloader.batch_download(&result.image_urls, &abs_paths, HashMap::new(), &updater, cancel.clone()).await?;

        // 9: final status.
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if success == total {
            Ok(album_path)
        } else {
            Err(AppError::PartialSuccess { succeeded: success, total })
        }
    }
}
