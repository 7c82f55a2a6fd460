//! 18comic: a single gallery page whose image tags carry the real URL
//! in `data-original` (the `src` attribute is a placeholder scramble
//! image swapped in client-side by the site's own JS).

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::crawler::{ParseContext, Parser};
use crate::error::{AppError, AppResult};
use crate::model::ParseResult;

static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static SCRAMBLE_IMG: Lazy<Selector> = Lazy::new(|| Selector::parse(".scramble-page > img").unwrap());

pub struct Comic18Parser;

#[async_trait]
impl Parser for Comic18Parser {
    fn name(&self) -> &'static str {
        "18Comic"
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
            .map(|s| s.trim().replace('/', "_"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "18Comic Album".to_string());

        let mut image_urls = Vec::new();
        let mut file_paths = Vec::new();
        for (i, el) in document.select(&SCRAMBLE_IMG).enumerate() {
            if let Some(src) = el.value().attr("data-original") {
                image_urls.push(src.to_string());
                let ext = src.rsplit('.').next().filter(|e| e.len() <= 4).unwrap_or("webp");
                file_paths.push(format!("{i}.{ext}"));
            }
        }

        if image_urls.is_empty() {
            return Err(AppError::Parse(
                "18comic: no images found; the URL may be wrong, the page layout may have changed, or the gallery may require login".to_string(),
            ));
        }

        Ok(ParseResult { name, image_urls, file_paths })
    }
}
