//! Hitomi: gallery metadata is a JS file (`galleries/<id>.js` assigning
//! `var galleryinfo = {...}`); image URLs are derived from each file's
//! content hash through a small site-side script (`gg.js`) that picks a
//! CDN subdomain and path prefix.
//!
//! The original runs `gg.js` in an embedded JS VM. That script's shape
//! (a `case`-list "is this number special" switch plus a fixed path
//! prefix) is stable enough to read out with two regexes instead of
//! pulling in a JS runtime for one site parser; see DESIGN.md.

use std::collections::HashSet;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::crawler::{ParseContext, Parser};
use crate::error::{AppError, AppResult};
use crate::model::ParseResult;

const GALLERY_INFO_URL: &str = "https://ltn.gold-usergeneratedcontent.net/galleries";
const GG_SCRIPT_URL: &str = "https://ltn.gold-usergeneratedcontent.net/gg.js";
const DOMAIN: &str = "gold-usergeneratedcontent.net";

static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-(\d+)\.html").unwrap());
static GALLERYINFO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"var galleryinfo = (.+?);?\s*$").unwrap());
static GG_B_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"b:\s*['"]([^'"]*)['"]"#).unwrap());
static GG_CASE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"case\s+(\d+)").unwrap());
static HASH_TAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(..)(.)$").unwrap());

#[derive(Debug, Deserialize)]
struct HitomiFile {
    hash: String,
    #[serde(default)]
    haswebp: i32,
    name: String,
}

#[derive(Debug, Deserialize)]
struct HitomiGalleryInfo {
    files: Vec<HitomiFile>,
    title: String,
}

struct GgScript {
    b: String,
    special: HashSet<i64>,
}

impl GgScript {
    fn parse(script: &str) -> Self {
        let b = GG_B_RE.captures(script).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()).unwrap_or_default();
        let special = GG_CASE_RE
            .captures_iter(script)
            .filter_map(|c| c.get(1))
            .filter_map(|m| m.as_str().parse::<i64>().ok())
            .collect();
        Self { b, special }
    }

    /// Subdomain offset: `1` for the numbers the script special-cases, `0` otherwise.
    fn m(&self, g: i64) -> i64 {
        if self.special.contains(&g) {
            1
        } else {
            0
        }
    }

    /// Swaps the hash's trailing 3 hex digits (`xyz` -> `zxy`), mirroring
    /// `gg.s`'s `/(..)(.)$/` capture-and-swap.
    fn s(&self, hash: &str) -> String {
        match HASH_TAIL_RE.captures(hash) {
            Some(c) => format!("{}{}", &c[2], &c[1]),
            None => hash.to_string(),
        }
    }

    fn full_path(&self, hash: &str) -> String {
        format!("{}{}/{hash}", self.b, self.s(hash))
    }

    fn subdomain_index(&self, hash: &str) -> i64 {
        let tail = &hash[hash.len().saturating_sub(3)..];
        let g = i64::from_str_radix(tail, 16).unwrap_or(0);
        1 + self.m(g)
    }
}

pub struct HitomiParser;

#[async_trait]
impl Parser for HitomiParser {
    fn name(&self) -> &'static str {
        "Hitomi"
    }

    async fn parse(&self, ctx: &ParseContext, url: &str) -> AppResult<ParseResult> {
        let id = extract_id(url)?;
        let gallery = get_gallery_info(ctx, &id).await?;
        let gg = get_gg_script(ctx).await?;

        let mut image_urls = Vec::with_capacity(gallery.files.len());
        let mut file_paths = Vec::with_capacity(gallery.files.len());
        for (i, file) in gallery.files.iter().enumerate() {
            let subdomain = gg.subdomain_index(&file.hash);
            let path = gg.full_path(&file.hash);
            image_urls.push(format!("https://a{subdomain}.{DOMAIN}/{path}.webp"));

            let ext = if file.haswebp != 0 {
                "webp".to_string()
            } else {
                file.name.rsplit('.').next().unwrap_or("jpg").to_string()
            };
            file_paths.push(format!("{:03}.{ext}", i + 1));
        }

        if image_urls.is_empty() {
            return Err(AppError::Parse("hitomi: gallery has no files".to_string()));
        }

        Ok(ParseResult { name: gallery.title, image_urls, file_paths })
    }
}

fn extract_id(url: &str) -> AppResult<String> {
    ID_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AppError::InvalidRequest(format!("hitomi: could not extract gallery id from {url}")))
}

async fn get_gallery_info(ctx: &ParseContext, id: &str) -> AppResult<HitomiGalleryInfo> {
    let response = ctx.client.get(&format!("{GALLERY_INFO_URL}/{id}.js")).await?;
    if !response.status().is_success() {
        return Err(AppError::Protocol(response.status().as_u16()));
    }
    let body = response.text().await?;
    let json = GALLERYINFO_RE
        .captures(&body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| AppError::Parse("hitomi: galleryinfo variable not found".to_string()))?;
    serde_json::from_str(json).map_err(|e| AppError::Parse(format!("hitomi: could not parse galleryinfo: {e}")))
}

async fn get_gg_script(ctx: &ParseContext) -> AppResult<GgScript> {
    let response = ctx.client.get(GG_SCRIPT_URL).await?;
    if !response.status().is_success() {
        return Err(AppError::Protocol(response.status().as_u16()));
    }
    let body = response.text().await?;
    Ok(GgScript::parse(&body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_url() {
        assert_eq!(extract_id("https://hitomi.la/doujinshi/some-title-12345.html").unwrap(), "12345");
    }

    #[test]
    fn gg_script_parses_prefix_and_special_cases() {
        let gg = GgScript::parse("var gg = { b: '1737868181/', m: function(g){ switch(g){ case 1: case 7: return 1; default: return 0; } } };");
        assert_eq!(gg.b, "1737868181/");
        assert_eq!(gg.m(1), 1);
        assert_eq!(gg.m(2), 0);
    }

    #[test]
    fn s_swaps_trailing_hex_digits() {
        let gg = GgScript::parse("b: ''");
        assert_eq!(gg.s("abcde"), "ecd");
    }
}
