//! nhentai: the gallery page embeds the first page of thumbnails
//! directly; remaining pages are fetched through an AJAX loader that
//! needs a CSRF token lifted from the page's `<meta>` tag.

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::crawler::{ParseContext, Parser};
use crate::error::{AppError, AppResult};
use crate::model::ParseResult;

static GALLERY_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.gallery_top div.info h1").unwrap());
static THUMB_IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("#thumbs_append img").unwrap());
static ANY_IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static CSRF_META: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"meta[name="csrf-token"]"#).unwrap());
static LOAD_SERVER: Lazy<Selector> = Lazy::new(|| Selector::parse("#load_server").unwrap());
static GALLERY_ID: Lazy<Selector> = Lazy::new(|| Selector::parse("#gallery_id").unwrap());
static LOAD_ID: Lazy<Selector> = Lazy::new(|| Selector::parse("#load_id").unwrap());
static LOAD_DIR: Lazy<Selector> = Lazy::new(|| Selector::parse("#load_dir").unwrap());
static LOAD_PAGES: Lazy<Selector> = Lazy::new(|| Selector::parse("#load_pages").unwrap());

static GALLERY_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/g/(\d+)/?").unwrap());
static THUMBNAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)t\.jpg$").unwrap());

const THUMBS_LOADER_URL: &str = "https://nhentai.xxx/modules/thumbs_loader.php";

pub struct NhentaiParser;

#[async_trait]
impl Parser for NhentaiParser {
    fn name(&self) -> &'static str {
        "Nhentai"
    }

    async fn parse(&self, ctx: &ParseContext, url: &str) -> AppResult<ParseResult> {
        let gallery_id = extract_gallery_id(url)?;

        let response = ctx.client.rate_limited_get(url).await?;
        if !response.status().is_success() {
            return Err(AppError::Protocol(response.status().as_u16()));
        }
        let body = response.text().await?;

        let (name, mut image_urls, loader_meta) = {
            let document = Html::parse_document(&body);

            let name = document
                .select(&GALLERY_TITLE)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Unknown Gallery".to_string());

            let image_urls: Vec<String> = document
                .select(&THUMB_IMG)
                .filter_map(|el| el.value().attr("data-src"))
                .filter(|s| !s.is_empty())
                .map(convert_thumbnail_to_full_image)
                .collect();

            let loader_meta = extract_loader_meta(&document);
            (name, image_urls, loader_meta)
        };

        if ctx.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        match get_more_images(ctx, loader_meta, &gallery_id, image_urls.len()).await {
            Ok(more) => image_urls.extend(more),
            Err(e) if e.is_cancellation() => return Err(e),
            Err(_) => {}
        }

        if image_urls.is_empty() {
            return Err(AppError::Parse("nhentai: no images found".to_string()));
        }

        let file_paths = (1..=image_urls.len()).map(|i| format!("{i:03}.webp")).collect();
        Ok(ParseResult { name, image_urls, file_paths })
    }
}

fn extract_gallery_id(url: &str) -> AppResult<String> {
    GALLERY_ID_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AppError::InvalidRequest("nhentai: could not extract gallery id from url".to_string()))
}

fn convert_thumbnail_to_full_image(thumbnail_url: &str) -> String {
    THUMBNAIL_RE.replace(thumbnail_url, "${1}.webp").to_string()
}

fn attr_value(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .next()
        .and_then(|el| el.value().attr("value"))
        .unwrap_or("")
        .to_string()
}

/// Metadata needed to call the AJAX thumbs-loader, lifted out of the
/// (non-`Send`) parsed document before any further `.await` point.
struct LoaderMeta {
    csrf_token: String,
    server: String,
    u_id: String,
    g_id: String,
    img_dir: String,
    total_pages_str: String,
}

fn extract_loader_meta(document: &Html) -> LoaderMeta {
    let csrf_token = document
        .select(&CSRF_META)
        .next()
        .and_then(|el| el.value().attr("content"))
        .unwrap_or("")
        .to_string();

    LoaderMeta {
        csrf_token,
        server: attr_value(document, &LOAD_SERVER),
        u_id: attr_value(document, &GALLERY_ID),
        g_id: attr_value(document, &LOAD_ID),
        img_dir: attr_value(document, &LOAD_DIR),
        total_pages_str: attr_value(document, &LOAD_PAGES),
    }
}

async fn get_more_images(
    ctx: &ParseContext,
    meta: LoaderMeta,
    _gallery_id: &str,
    visible_pages: usize,
) -> AppResult<Vec<String>> {
    let LoaderMeta { csrf_token, server, u_id, g_id, img_dir, total_pages_str } = meta;

    if csrf_token.is_empty() || server.is_empty() || u_id.is_empty() || g_id.is_empty() || img_dir.is_empty() || total_pages_str.is_empty() {
        return Ok(Vec::new());
    }

    let total_pages: usize = total_pages_str
        .parse()
        .map_err(|_| AppError::Parse("nhentai: could not parse total page count".to_string()))?;
    if visible_pages >= total_pages {
        return Ok(Vec::new());
    }

    let mut form = HashMap::new();
    form.insert("_token".to_string(), csrf_token);
    form.insert("server".to_string(), server);
    form.insert("u_id".to_string(), u_id);
    form.insert("g_id".to_string(), g_id);
    form.insert("img_dir".to_string(), img_dir);
    form.insert("visible_pages".to_string(), visible_pages.to_string());
    form.insert("total_pages".to_string(), total_pages_str);
    form.insert("type".to_string(), "2".to_string());

    let response = ctx.client.post_form(THUMBS_LOADER_URL, &form).await?;
    if !response.status().is_success() {
        return Err(AppError::Protocol(response.status().as_u16()));
    }
    let body = response.text().await?;
    let api_doc = Html::parse_document(&body);

    let more: Vec<String> = api_doc
        .select(&ANY_IMG)
        .filter_map(|el| el.value().attr("data-src"))
        .filter(|s| !s.is_empty())
        .map(convert_thumbnail_to_full_image)
        .collect();
    Ok(more)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_gallery_id_from_url() {
        assert_eq!(extract_gallery_id("https://nhentai.xxx/g/537651/").unwrap(), "537651");
    }

    #[test]
    fn converts_thumbnail_url_to_full_image() {
        assert_eq!(
            convert_thumbnail_to_full_image("http://i4.nhentaimg.com/016/9sazckpugf/11t.jpg"),
            "http://i4.nhentaimg.com/016/9sazckpugf/11.webp"
        );
    }
}
