//! A `Parser` whose album name, image count and destination server are
//! read out of the crawl URL's query string, so each seed scenario (§8)
//! can drive the same registered parser without any shared mutable
//! state between tests.
//!
//! URL shape: `http://stub.test/album?server=<base>&count=<n>&name=<name>`

use async_trait::async_trait;
use std::collections::HashMap;

use albumfetch::crawler::{ParseContext, Parser};
use albumfetch::error::{AppError, AppResult};
use albumfetch::model::ParseResult;

pub const STUB_SITE_TYPE: &str = "stub";
pub const STUB_HOST: &str = "stub.test";

pub struct StubParser;

pub fn ctor() -> Box<dyn Parser> {
    Box::new(StubParser)
}

#[async_trait]
impl Parser for StubParser {
    fn name(&self) -> &'static str {
        "Stub"
    }

    async fn parse(&self, ctx: &ParseContext, url: &str) -> AppResult<ParseResult> {
        let parsed = reqwest::Url::parse(url).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
        let params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();

        let server = params.get("server").cloned().unwrap_or_default();
        let name = params.get("name").cloned().unwrap_or_else(|| "Unknown".to_string());
        let count: usize = params.get("count").and_then(|c| c.parse().ok()).unwrap_or(0);

        if ctx.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let image_urls = (0..count).map(|i| format!("{server}/img/{i}")).collect();
        let file_paths = (1..=count).map(|i| format!("{i}.jpg")).collect();

        Ok(ParseResult { name, image_urls, file_paths })
    }
}

pub fn stub_album_url(server: &str, name: &str, count: usize) -> String {
    format!(
        "http://{STUB_HOST}/album?server={}&name={}&count={count}",
        urlencoding(server),
        urlencoding(name)
    )
}

fn urlencoding(raw: &str) -> String {
    let url = reqwest::Url::parse_with_params("http://x/", &[("v", raw)]).unwrap();
    url.query().unwrap_or("").trim_start_matches("v=").to_string()
}
