//! Telegraph (`telegra.ph`): a single-page article, every `<img>` on it
//! is one album image.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::crawler::{ParseContext, Parser};
use crate::error::{AppError, AppResult};
use crate::model::ParseResult;

static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

pub struct TelegraphParser;

#[async_trait]
impl Parser for TelegraphParser {
    fn name(&self) -> &'static str {
        "Telegraph"
    }

    async fn parse(&self, ctx: &ParseContext, url: &str) -> AppResult<ParseResult> {
        let response = ctx.client.get(url).await?;
        if !response.status().is_success() {
            return Err(AppError::Protocol(response.status().as_u16()));
        }
        let body = response.text().await?;
        let document = Html::parse_document(&body);

        let name = document
            .select(&H1)
            .next()
            .map(|el| el.text().collect::<String>())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "Telegraph Album".to_string());

        let mut image_urls = Vec::new();
        let mut file_paths = Vec::new();
        for (i, el) in document.select(&IMG).enumerate() {
            if let Some(src) = el.value().attr("src") {
                image_urls.push(format_telegraph_url(src));
                file_paths.push(format!("{i}.jpg"));
            }
        }

        Ok(ParseResult { name: name.trim().to_string(), image_urls, file_paths })
    }
}

fn format_telegraph_url(src: &str) -> String {
    if src.starts_with("http") {
        src.to_string()
    } else {
        format!("https://telegra.ph{src}")
    }
}
