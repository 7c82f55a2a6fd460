//! Concrete site parsers and their registration with the crawler
//! registry (§4.2, §9 "plug-in registration"). Rust has no init-side-effect
//! hook equivalent to Go's `func init()`, so registration is an explicit
//! function called once at process start instead.

mod comic18;
mod ehentai;
mod hitomi;
mod nhentai;
mod telegraph;
mod wnacg;

use super::{CrawlerRegistry, Parser};

pub const SITE_TYPE_EHENTAI: &str = "ehentai";
pub const SITE_TYPE_EXHENTAI: &str = "exhentai";
pub const SITE_TYPE_TELEGRAPH: &str = "telegraph";
pub const SITE_TYPE_WNACG: &str = "wnacg";
pub const SITE_TYPE_NHENTAI: &str = "nhentai";
pub const SITE_TYPE_COMIC18: &str = "comic18";
pub const SITE_TYPE_HITOMI: &str = "hitomi";

pub fn register_all(registry: &mut CrawlerRegistry) {
    registry.register(SITE_TYPE_EHENTAI, new_ehentai);
    registry.register_host_contains(SITE_TYPE_EHENTAI, &["e-hentai.org"]);

    registry.register(SITE_TYPE_EXHENTAI, new_exhentai);
    registry.register_host_contains(SITE_TYPE_EXHENTAI, &["exhentai.org"]);

    registry.register(SITE_TYPE_TELEGRAPH, new_telegraph);
    registry.register_host_contains(SITE_TYPE_TELEGRAPH, &["telegra.ph"]);

    registry.register(SITE_TYPE_WNACG, new_wnacg);
    registry.register_host_contains(SITE_TYPE_WNACG, &["wnacg.com"]);

    registry.register(SITE_TYPE_NHENTAI, new_nhentai);
    registry.register_host_contains(SITE_TYPE_NHENTAI, &["nhentai.xxx", "nhentai.net"]);

    registry.register(SITE_TYPE_COMIC18, new_comic18);
    registry.register_host_contains(SITE_TYPE_COMIC18, &["18comic", "jmcomic"]);

    registry.register(SITE_TYPE_HITOMI, new_hitomi);
    registry.register_host_contains(SITE_TYPE_HITOMI, &["hitomi.la"]);
}

fn new_ehentai() -> Box<dyn Parser> {
    Box::new(ehentai::EHentaiParser { site_name: "eHentai" })
}

fn new_exhentai() -> Box<dyn Parser> {
    Box::new(ehentai::EHentaiParser { site_name: "ExHentai" })
}

fn new_telegraph() -> Box<dyn Parser> {
    Box::new(telegraph::TelegraphParser)
}

fn new_wnacg() -> Box<dyn Parser> {
    Box::new(wnacg::WnacgParser)
}

fn new_nhentai() -> Box<dyn Parser> {
    Box::new(nhentai::NhentaiParser)
}

fn new_comic18() -> Box<dyn Parser> {
    Box::new(comic18::Comic18Parser)
}

fn new_hitomi() -> Box<dyn Parser> {
    Box::new(hitomi::HitomiParser)
}
