//! Aygaz（オートガスのみ）
//!
//! 一覧ページ下部の都市リンクを順に開き、`p.price` の価格を読む。
//! 「İstanbul (Anadolu)」「İstanbul (Avrupa)」は同じファイルに2行で出力する。

use std::path::PathBuf;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::browser::Link;
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::pacing::{between_cities, settle};
use crate::report::ScrapeReport;
use crate::text::{collapse_whitespace, find_by_name, is_istanbul_variant, leading_number, upper_ascii};
use crate::traits::PriceScraper;

use super::{group_in_order, scrape_each, Driver};

const PREFIX: &str = "aygaz";
const AYGAZ_URL: &str = "https://www.aygaz.com.tr/fiyatlar/otogaz";
const AYGAZ_BASE: &str = "https://www.aygaz.com.tr";
const CITY_LINKS: &str = "div.list a.item";
const ISTANBUL: &str = "ISTANBUL";

static SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+Otogaz Fiyatları\s*$").expect("valid suffix regex"));

static PARENS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*").expect("valid parens regex"));

/// ファイル名用: 括弧書きを除いたASCII大文字（"İstanbul (Avrupa)" → "ISTANBUL"）
pub fn file_city(name: &str) -> String {
    upper_ascii(&PARENS_RE.replace_all(name, ""))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityPage {
    pub name: String,
    pub url: String,
}

impl CityPage {
    pub fn from_link(link: &Link) -> Option<Self> {
        let name = collapse_whitespace(&SUFFIX_RE.replace(&link.text, ""));
        if name.is_empty() || link.href.is_empty() {
            return None;
        }
        let url = if link.href.starts_with('/') {
            format!("{}{}", AYGAZ_BASE, link.href)
        } else {
            link.href.clone()
        };
        Some(Self { name, url })
    }
}

/// 出力ファイルごとにページをまとめる（イスタンブールの2ページは1つに）
pub fn group_pages(pages: &[CityPage]) -> Vec<(String, Vec<CityPage>)> {
    group_in_order(pages, |page| {
        if is_istanbul_variant(&page.name) {
            ISTANBUL.to_string()
        } else {
            file_city(&page.name)
        }
    })
}

pub fn render_line(city: &str, price: &str) -> String {
    format!("{}: {}", city, price)
}

pub struct AygazScraper {
    driver: Driver,
}

impl AygazScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    async fn city_groups(&self) -> Result<Vec<(String, Vec<CityPage>)>, ScraperError> {
        let session = self.driver.session()?;
        session.goto(AYGAZ_URL).await?;
        settle(3000).await;
        session.wait_for_selector(CITY_LINKS).await?;

        let pages: Vec<CityPage> = session
            .links(CITY_LINKS)
            .await?
            .iter()
            .filter_map(CityPage::from_link)
            .collect();
        debug!("Aygaz: {} city links", pages.len());
        Ok(group_pages(&pages))
    }

    async fn read_price(&self, page: &CityPage) -> Result<String, ScraperError> {
        let session = self.driver.session()?;
        session.goto(&page.url).await?;
        settle(2000).await;
        session.wait_for_selector("p.price").await?;
        let text = session.text_of("p.price").await?.unwrap_or_default();
        let price = leading_number(&text);
        if price.is_empty() {
            return Err(ScraperError::NoPriceData(page.name.clone()));
        }
        Ok(price)
    }

    async fn scrape_group(&self, file: &str, pages: &[CityPage]) -> Result<PathBuf, ScraperError> {
        let mut lines = Vec::with_capacity(pages.len());
        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                between_cities(&self.driver.config).await;
            }
            let price = self.read_price(page).await?;
            lines.push(render_line(&page.name, &price));
        }
        self.driver.save(PREFIX, file, &lines)
    }
}

#[async_trait]
impl PriceScraper for AygazScraper {
    fn brand(&self) -> &'static str {
        PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let groups = self.city_groups().await?;
        let wanted = if is_istanbul_variant(city) {
            ISTANBUL.to_string()
        } else {
            file_city(city)
        };
        let (file, pages) = find_by_name(&groups, &wanted, |(name, _)| name.as_str())
            .cloned()
            .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        self.scrape_group(&file, &pages).await
    }

    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let groups = self.city_groups().await?;
        let names: Vec<String> = groups.iter().map(|(name, _)| name.clone()).collect();
        let this = &*self;
        let groups = &groups;
        Ok(scrape_each(PREFIX, &this.driver.config, &names, 1000, move |file| async move {
            let (_, pages) = groups
                .iter()
                .find(|(name, _)| name == file)
                .ok_or_else(|| ScraperError::CityNotFound(file.to_string()))?;
            this.scrape_group(file, pages).await
        })
        .await)
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.driver.stop().await
    }
}
