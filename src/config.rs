//! Config Provider: layered configuration plus the mutable settings the
//! crawler framework and downloader read (`GetOutputDir`, `GetProxy`,
//! `GetLibraries`), persisted back to TOML in the per-user app-data dir.

use figment::providers::Format;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::downloader::DEFAULT_DOWNLOAD_CONCURRENCY;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Default output directory for album folders.
    pub output_dir: PathBuf,
    /// Upper bound on concurrent file downloads (§4.3 `DefaultDownloadConcurrency`).
    pub max_concurrent: usize,
    /// Upper bound on concurrent per-image metadata fetches during discovery.
    pub max_metadata_concurrent: usize,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub libraries: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub settings: Settings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig { host: "0.0.0.0".to_string(), port: 7878 },
            downloads: DownloadsConfig {
                output_dir: PathBuf::from("./downloads"),
                max_concurrent: DEFAULT_DOWNLOAD_CONCURRENCY,
                max_metadata_concurrent: 5,
                retry_count: 3,
                retry_delay_ms: 500,
            },
            settings: Settings::default(),
        }
    }
}

/// Per-user app-data directory: `ALBUMFETCH_APPDATA_DIR` env override, else `./appData`.
pub fn appdata_dir() -> PathBuf {
    env::var("ALBUMFETCH_APPDATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./appData"))
}

pub fn config_path() -> PathBuf {
    appdata_dir().join("config.toml")
}

pub fn history_path() -> PathBuf {
    appdata_dir().join("download_history.json")
}

pub fn ensure_appdata_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(appdata_dir())
}

pub fn load() -> AppConfig {
    let path = config_path();
    figment::Figment::new()
        .merge(figment::providers::Serialized::defaults(AppConfig::default()))
        .merge(figment::providers::Toml::file(&path))
        .merge(figment::providers::Env::prefixed("ALBUMFETCH_").split("_"))
        .extract()
        .unwrap_or_else(|e| {
            tracing::warn!("failed to load config from {}: {e}, using defaults", path.display());
            AppConfig::default()
        })
}

/// Config Provider: the mutable slice of configuration the crawler
/// framework and downloader consult (`GetOutputDir`, `GetProxy`,
/// `GetLibraries`). Backed by a lock so a running job and a settings
/// update from the façade never tear each other's reads.
pub struct ConfigProvider {
    inner: RwLock<AppConfig>,
}

impl ConfigProvider {
    pub fn new(config: AppConfig) -> Self {
        Self { inner: RwLock::new(config) }
    }

    pub fn snapshot(&self) -> AppConfig {
        self.inner.read().unwrap().clone()
    }

    pub fn get_output_dir(&self) -> PathBuf {
        self.inner.read().unwrap().downloads.output_dir.clone()
    }

    pub fn get_proxy(&self) -> Option<String> {
        self.inner.read().unwrap().settings.proxy_url.clone()
    }

    pub fn get_libraries(&self) -> Vec<String> {
        self.inner.read().unwrap().settings.libraries.clone()
    }

    pub fn set_output_dir(&self, dir: PathBuf) {
        self.inner.write().unwrap().downloads.output_dir = dir;
        self.persist();
    }

    pub fn set_proxy(&self, proxy: Option<String>) {
        self.inner.write().unwrap().settings.proxy_url = proxy;
        self.persist();
    }

    pub fn add_library(&self, path: String) -> bool {
        let mut guard = self.inner.write().unwrap();
        if guard.settings.libraries.iter().any(|l| l == &path) {
            return false;
        }
        guard.settings.libraries.push(path);
        drop(guard);
        self.persist();
        true
    }

    fn persist(&self) {
        let config = self.inner.read().unwrap().clone();
        if let Err(e) = save(&config_path(), &config) {
            tracing::error!("failed to persist config: {e}");
        }
    }
}

fn save(path: &Path, config: &AppConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(path, toml_string)?;
    Ok(())
}
