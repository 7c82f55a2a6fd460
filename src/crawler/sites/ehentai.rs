//! E-Hentai / ExHentai: an album index page (plus possible pagination)
//! links to one per-image page each, which in turn links to a second
//! "real" page carrying the actual image `src`. All three request
//! shapes go through the rate-limited gate (§4.4's canonical example of
//! a parser that hammers a site with per-image metadata fetches).

use once_cell::sync::Lazy;
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};

use crate::crawler::{ParseContext, Parser};
use crate::error::{AppError, AppResult};
use crate::http_client::ReqClient;
use crate::model::ParseResult;
use crate::semaphore::Semaphore;
use crate::task_manager::updater::ProgressDetails;

const METADATA_CONCURRENCY: usize = 5;

static ALBUM_NAME: Lazy<Selector> = Lazy::new(|| Selector::parse("#gn").unwrap());
static GTB_TD: Lazy<Selector> = Lazy::new(|| Selector::parse("body > .gtb td").unwrap());
static TD_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static GDT_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("#gdt > a").unwrap());
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("#img").unwrap());
static NL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"nl\('(.+)'\)").unwrap());

/// Shared by both site types; only the name and adulthood-confirmation
/// cookie differ (§4.4 "required for sites that set an
/// adulthood-confirmation cookie before returning real content").
pub struct EHentaiParser {
    pub site_name: &'static str,
}

#[async_trait]
impl Parser for EHentaiParser {
    fn name(&self) -> &'static str {
        self.site_name
    }

    async fn parse(&self, ctx: &ParseContext, url: &str) -> AppResult<ParseResult> {
        ctx.client.add_cookie("nw=1", url)?;

        let (name, pages) = get_album_pages(ctx, url).await?;

        let mut links = Vec::new();
        for page in &pages {
            links.extend(parse_links(page));
        }

        let total_links = links.len() as u64;
        ctx.updater.update_task_progress(0, total_links);

        let gate = Semaphore::new(METADATA_CONCURRENCY);
        let mut join_set = tokio::task::JoinSet::new();
        for (index, link) in links.into_iter().enumerate() {
            let Some(permit) = gate.acquire_owned_cancellable(&ctx.cancel).await else { break };
            let client = ctx.client.clone();
            join_set.spawn(async move {
                let result = parse_page(&client, &link).await;
                drop(permit);
                (index, result)
            });
        }

        let mut done = 0u64;
        let mut resolved: Vec<(usize, String)> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let (index, result) = joined.map_err(|e| AppError::Internal(e.to_string()))?;
            done += 1;
            ctx.updater.update_task_progress_with_details(ProgressDetails {
                current: done,
                total: total_links,
                phase: Some("discovering".to_string()),
                current_item: None,
            });
            if let Ok(image_url) = result {
                resolved.push((index, image_url));
            }
        }
        resolved.sort_by_key(|(index, _)| *index);

        let image_urls: Vec<String> = resolved.iter().map(|(_, url)| url.clone()).collect();
        let file_paths = (0..image_urls.len()).map(|i| format!("{i}.jpg")).collect();

        if image_urls.is_empty() {
            return Err(AppError::Parse(format!("{}: no images found", self.site_name)));
        }

        Ok(ParseResult { name, image_urls, file_paths })
    }
}

async fn get_album_pages(ctx: &ParseContext, url: &str) -> AppResult<(String, Vec<String>)> {
    let response = ctx.client.rate_limited_get(url).await?;
    if !response.status().is_success() {
        return Err(AppError::Protocol(response.status().as_u16()));
    }
    let body = response.text().await?;

    let (name, page_urls) = {
        let document = Html::parse_document(&body);

        let name = document
            .select(&ALBUM_NAME)
            .next()
            .map(|el| el.text().collect::<String>())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::Parse("could not read album name".to_string()))?;

        let mut page_urls = vec![url.to_string()];
        let tds: Vec<_> = document.select(&GTB_TD).collect();
        let total = tds.len();
        for (i, td) in tds.iter().enumerate() {
            if i == 0 || i == 1 || i == total.saturating_sub(1) {
                continue;
            }
            for a in td.select(&TD_LINK) {
                if let Some(href) = a.value().attr("href") {
                    page_urls.push(href.to_string());
                }
            }
        }
        (name, page_urls)
    };

    if page_urls.len() == 1 {
        return Ok((name, vec![body]));
    }

    let mut pages = Vec::with_capacity(page_urls.len());
    for page_url in &page_urls {
        if ctx.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        match ctx.client.rate_limited_get(page_url).await {
            Ok(resp) if resp.status().is_success() => {
                if let Ok(html) = resp.text().await {
                    pages.push(html);
                }
            }
            _ => continue,
        }
    }

    Ok((name, pages))
}

fn parse_links(page_html: &str) -> Vec<String> {
    let document = Html::parse_document(page_html);
    document
        .select(&GDT_LINK)
        .filter_map(|el| el.value().attr("href"))
        .map(|s| s.to_string())
        .collect()
}

async fn parse_page(client: &ReqClient, link: &str) -> AppResult<String> {
    let real_url = get_real_url(client, link).await?;
    parse_real_page(client, &real_url).await
}

async fn get_real_url(client: &ReqClient, link: &str) -> AppResult<String> {
    let response = client.rate_limited_get(link).await?;
    if !response.status().is_success() {
        return Err(AppError::Protocol(response.status().as_u16()));
    }
    let body = response.text().await?;
    let document = Html::parse_document(&body);

    let on_error = document
        .select(&IMG)
        .next()
        .and_then(|el| el.value().attr("onerror"))
        .ok_or_else(|| AppError::Parse("could not find image onerror attribute".to_string()))?;

    let nl = NL_RE
        .captures(on_error)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AppError::Parse("could not parse nl parameter".to_string()))?;

    Ok(format!("{link}?nl={nl}"))
}

async fn parse_real_page(client: &ReqClient, real_url: &str) -> AppResult<String> {
    let response = client.rate_limited_get(real_url).await?;
    if !response.status().is_success() {
        return Err(AppError::Protocol(response.status().as_u16()));
    }
    let body = response.text().await?;
    let document = Html::parse_document(&body);

    document
        .select(&IMG)
        .next()
        .and_then(|el| el.value().attr("src"))
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Parse("could not find real image url".to_string()))
}
