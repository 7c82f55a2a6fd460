//! wnacg: an album spans several paginated listing pages, each linking
//! to one manga-page view per image. Listing and per-page discovery
//! both go through the rate-limited gate; per-page fetches run with
//! bounded concurrency (§5 "typical ceiling: 5").

use std::collections::HashSet;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::crawler::{ParseContext, Parser};
use crate::error::{AppError, AppResult};
use crate::model::ParseResult;
use crate::semaphore::Semaphore;

const HOST: &str = "https://www.wnacg.com";
const METADATA_CONCURRENCY: usize = 5;

static ALBUM_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("#bodywrap h2").unwrap());
static PAGINATOR_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse(".paginator a").unwrap());
static MANGA_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("#bodywrap ul li a").unwrap());
static PICAREA: Lazy<Selector> = Lazy::new(|| Selector::parse("#picarea").unwrap());

pub struct WnacgParser;

#[async_trait]
impl Parser for WnacgParser {
    fn name(&self) -> &'static str {
        "Wnacg"
    }

    async fn parse(&self, ctx: &ParseContext, url: &str) -> AppResult<ParseResult> {
        let (name, page_urls) = get_album_pages(ctx, url).await?;

        let mut manga_links = Vec::new();
        for page_url in &page_urls {
            if ctx.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            match get_manga_links(ctx, page_url).await {
                Ok(links) => manga_links.extend(links),
                Err(e) if e.is_cancellation() => return Err(e),
                Err(_) => continue,
            }
        }

        let gate = Semaphore::new(METADATA_CONCURRENCY);
        let mut join_set = tokio::task::JoinSet::new();
        for (index, manga_url) in manga_links.into_iter().enumerate() {
            let Some(permit) = gate.acquire_owned_cancellable(&ctx.cancel).await else { break };
            let client = ctx.client.clone();
            join_set.spawn(async move {
                let result = parse_manga_page(&client, &manga_url).await;
                drop(permit);
                (index, result)
            });
        }

        let mut resolved: Vec<(usize, String)> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let (index, result) = joined.map_err(|e| AppError::Internal(e.to_string()))?;
            if let Ok(image_url) = result {
                resolved.push((index, image_url));
            }
        }
        resolved.sort_by_key(|(index, _)| *index);

        let image_urls: Vec<String> = resolved.iter().map(|(_, url)| url.clone()).collect();
        let file_paths = (0..image_urls.len()).map(|i| format!("{i}.jpg")).collect();

        Ok(ParseResult { name, image_urls, file_paths })
    }
}

async fn get_album_pages(ctx: &ParseContext, url: &str) -> AppResult<(String, Vec<String>)> {
    let response = ctx.client.rate_limited_get(url).await?;
    if !response.status().is_success() {
        return Err(AppError::Protocol(response.status().as_u16()));
    }
    let body = response.text().await?;
    let document = Html::parse_document(&body);

    let name = document
        .select(&ALBUM_TITLE)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown Album".to_string());

    let mut seen = HashSet::new();
    let mut pages = vec![url.to_string()];
    seen.insert(url.to_string());

    for el in document.select(&PAGINATOR_LINK) {
        if let Some(href) = el.value().attr("href") {
            let full = resolve_url(href);
            if seen.insert(full.clone()) {
                pages.push(full);
            }
        }
    }

    Ok((name, pages))
}

async fn get_manga_links(ctx: &ParseContext, page_url: &str) -> AppResult<Vec<String>> {
    let response = ctx.client.rate_limited_get(page_url).await?;
    if !response.status().is_success() {
        return Err(AppError::Protocol(response.status().as_u16()));
    }
    let body = response.text().await?;
    let document = Html::parse_document(&body);

    Ok(document
        .select(&MANGA_LINK)
        .filter_map(|el| el.value().attr("href"))
        .map(resolve_url)
        .collect())
}

async fn parse_manga_page(client: &crate::http_client::ReqClient, link: &str) -> AppResult<String> {
    let response = client.rate_limited_get(link).await?;
    if !response.status().is_success() {
        return Err(AppError::Protocol(response.status().as_u16()));
    }
    let body = response.text().await?;
    let document = Html::parse_document(&body);

    let src = document
        .select(&PICAREA)
        .next()
        .and_then(|el| el.value().attr("src"))
        .ok_or_else(|| AppError::Parse("wnacg: image url not found on manga page".to_string()))?;

    Ok(resolve_url(src))
}

fn resolve_url(href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if let Some(stripped) = href.strip_prefix("//") {
        format!("https://{stripped}")
    } else {
        format!("{HOST}{href}")
    }
}
