//! `ReqClient`: the shared HTTP client abstraction (§4.4). Wraps a
//! single underlying `reqwest::Client` with a replaceable transport
//! (proxy), an append-only cookie jar, default headers, and a counting
//! rate gate used by `rate_limited_get` for parsers that hammer a site
//! with per-image metadata fetches.
//!
//! The downloader's own concurrency gate is independent of this one
//! (§4.4): `BatchDownload` never goes through `rate_limited_get`.

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::semaphore::Semaphore;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A cookie jar that can be wiped wholesale (`ClearCookies`) while
/// staying append-only (`AddCookie`) in between clears.
struct ClearableJar(RwLock<Jar>);

impl ClearableJar {
    fn new() -> Self {
        Self(RwLock::new(Jar::default()))
    }

    fn add_cookie_str(&self, cookie: &str, url: &Url) {
        self.0.read().unwrap().add_cookie_str(cookie, url);
    }

    fn clear(&self) {
        *self.0.write().unwrap() = Jar::default();
    }
}

impl CookieStore for ClearableJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.0.read().unwrap().set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.0.read().unwrap().cookies(url)
    }
}

pub struct ReqClient {
    client: RwLock<reqwest::Client>,
    cookie_jar: std::sync::Arc<ClearableJar>,
    proxy: RwLock<Option<String>>,
    rate_gate: Semaphore,
    cancel: RwLock<CancellationToken>,
}

impl ReqClient {
    pub fn new() -> Self {
        let cookie_jar = std::sync::Arc::new(ClearableJar::new());
        let client = build_client(cookie_jar.clone(), None).expect("default client build never fails");
        Self {
            client: RwLock::new(client),
            cookie_jar,
            proxy: RwLock::new(None),
            rate_gate: Semaphore::new(10),
            cancel: RwLock::new(CancellationToken::new()),
        }
    }

    /// Fixes the default cancellation context for subsequent requests.
    /// In-flight requests keep whatever token they started with.
    pub fn set_context(&self, cancel: CancellationToken) {
        *self.cancel.write().unwrap() = cancel;
    }

    pub fn get_proxy(&self) -> Option<String> {
        self.proxy.read().unwrap().clone()
    }

    /// Replaces the transport. In-flight requests retain the client
    /// (and therefore the proxy) they began with, since `reqwest::Client`
    /// is a cheap `Arc` clone internally.
    pub fn set_proxy(&self, proxy_url: Option<&str>) -> AppResult<()> {
        let new_client = build_client(self.cookie_jar.clone(), proxy_url)
            .map_err(|e| AppError::Internal(format!("invalid proxy url: {e}")))?;
        *self.client.write().unwrap() = new_client;
        *self.proxy.write().unwrap() = proxy_url.map(|s| s.to_string());
        Ok(())
    }

    pub fn add_cookie(&self, cookie: &str, url: &str) -> AppResult<()> {
        let parsed = Url::parse(url).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
        self.cookie_jar.add_cookie_str(cookie, &parsed);
        Ok(())
    }

    pub fn clear_cookies(&self) {
        self.cookie_jar.clear();
    }

    fn client(&self) -> reqwest::Client {
        self.client.read().unwrap().clone()
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel.read().unwrap().clone()
    }

    pub async fn get(&self, url: &str) -> AppResult<reqwest::Response> {
        self.do_request("GET", url, &HashMap::new()).await
    }

    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> AppResult<reqwest::Response> {
        self.do_request("GET", url, headers).await
    }

    pub async fn post_form(&self, url: &str, form: &HashMap<String, String>) -> AppResult<reqwest::Response> {
        let cancel = self.cancel_token();
        let request = self.client().post(url).form(form);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            result = request.send() => Ok(result?),
        }
    }

    /// Admission-gated GET: blocks on the shared rate gate before firing
    /// the request. Used by parsers that walk many per-image pages
    /// during discovery (§4.4).
    pub async fn rate_limited_get(&self, url: &str) -> AppResult<reqwest::Response> {
        let cancel = self.cancel_token();
        let _permit = match self.rate_gate.acquire_cancellable(&cancel).await {
            Some(p) => p,
            None => return Err(AppError::Cancelled),
        };
        self.get(url).await
    }

    async fn do_request(
        &self,
        method: &str,
        url: &str,
        extra_headers: &HashMap<String, String>,
    ) -> AppResult<reqwest::Response> {
        let cancel = self.cancel_token();
        let client = self.client();
        let mut builder = match method {
            "GET" => client.get(url),
            "POST" => client.post(url),
            other => return Err(AppError::Internal(format!("unsupported method {other}"))),
        };
        for (key, value) in extra_headers {
            builder = builder.header(key, value);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            result = builder.send() => Ok(result?),
        }
    }
}

impl Default for ReqClient {
    fn default() -> Self {
        Self::new()
    }
}

fn build_client(
    cookie_jar: std::sync::Arc<ClearableJar>,
    proxy_url: Option<&str>,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
    );
    headers.insert(reqwest::header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    let mut builder = reqwest::Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .default_headers(headers)
        .timeout(REQUEST_TIMEOUT)
        .cookie_provider(cookie_jar);

    if let Some(proxy) = proxy_url {
        // Applied as an HTTP CONNECT proxy for both http:// and https:// (§6).
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }

    builder.build()
}
