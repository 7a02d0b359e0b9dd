//! Türkiye Petrolleri (TPPD)
//!
//! トップページの都市リンクから各都市ページへ移動し、地区別の表を読む。

use std::path::PathBuf;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::browser::Link;
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::PriceLine;
use crate::pacing::settle;
use crate::report::ScrapeReport;
use crate::text::{collapse_whitespace, find_by_name};
use crate::traits::PriceScraper;

use super::{scrape_each, Driver};

const PREFIX: &str = "tppd";
const TPPD_URL: &str = "https://www.tppd.com.tr/akaryakit-fiyatlari";
const TPPD_BASE: &str = "https://www.tppd.com.tr";
const CITY_LINKS: &str = ".otherStations a[href*='-akaryakit-fiyatlari']";
const COOKIE_BUTTONS: &[&str] = &["#onetrust-accept-btn-handler"];

static TITLE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*GÜNCEL\s*AKARYAKIT\s*F[İI]YATLARI\s*$").expect("valid suffix regex")
});

static URL_CITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([^/]+)-akaryakit-fiyatlari").expect("valid url regex"));

/// リンク文言を都市名にする（"ADANA GÜNCEL AKARYAKIT FİYATLARI" → "ADANA"）
pub fn normalize_city_name(text: &str) -> String {
    let upper = text.trim().to_uppercase();
    if upper.contains("KAHRAMANMARAŞ") || upper.contains("K.MARAS") {
        return "K.MARAS".to_string();
    }
    collapse_whitespace(&TITLE_SUFFIX_RE.replace(&upper, ""))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityLink {
    pub name: String,
    pub url: String,
}

impl CityLink {
    /// 表示テキストが空ならURLから都市名を取る
    pub fn from_link(link: &Link) -> Option<Self> {
        if link.href.is_empty() {
            return None;
        }
        let mut name = normalize_city_name(&link.text);
        if name.is_empty() {
            name = URL_CITY_RE
                .captures(&link.href)
                .map(|caps| normalize_city_name(&caps[1].replace('-', " ")))
                .unwrap_or_default();
        }
        if name.is_empty() {
            return None;
        }
        let url = if link.href.starts_with("http") {
            link.href.clone()
        } else {
            format!("{}{}", TPPD_BASE, link.href)
        };
        Some(Self { name, url })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TppdPriceRow {
    pub district: String,
    pub kursunsuz_benzin: String,
    pub gaz_yagi: String,
    pub motorin_1: String,
    pub motorin_2: String,
    pub kalorifer_yakiti: String,
    pub fuel_oil: String,
    pub yk_fuel_oil: String,
    pub gaz: String,
}

impl TppdPriceRow {
    /// 9列未満の行（見出しなど）は捨てる
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        if cells.len() < 9 {
            return None;
        }
        let cell = |i: usize| {
            let text = collapse_whitespace(&cells[i]);
            if text.is_empty() {
                "-".to_string()
            } else {
                text
            }
        };
        Some(Self {
            district: cell(0),
            kursunsuz_benzin: cell(1),
            gaz_yagi: cell(2),
            motorin_1: cell(3),
            motorin_2: cell(4),
            kalorifer_yakiti: cell(5),
            fuel_oil: cell(6),
            yk_fuel_oil: cell(7),
            gaz: cell(8),
        })
    }

    pub fn render(&self) -> String {
        PriceLine::new(&self.district)
            .field("K.Benzin 95", &self.kursunsuz_benzin)
            .field("Gaz Yağı", &self.gaz_yagi)
            .field("Motorin", &self.motorin_1)
            .field("Motorin 2", &self.motorin_2)
            .field("Kalorifer Yakıtı", &self.kalorifer_yakiti)
            .field("Fuel Oil", &self.fuel_oil)
            .field("Y.K. Fuel Oil", &self.yk_fuel_oil)
            .field("Gaz", &self.gaz)
            .render()
    }
}

pub struct TppdScraper {
    driver: Driver,
}

impl TppdScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    async fn city_links(&self) -> Result<Vec<CityLink>, ScraperError> {
        let session = self.driver.session()?;
        session.goto(TPPD_URL).await?;
        session.accept_cookies(COOKIE_BUTTONS).await;
        session.wait_for_selector(CITY_LINKS).await?;

        let links: Vec<CityLink> = session
            .links(CITY_LINKS)
            .await?
            .iter()
            .filter_map(CityLink::from_link)
            .collect();
        debug!("TPPD: {} city links", links.len());
        Ok(links)
    }

    async fn scrape_link(&self, link: &CityLink) -> Result<PathBuf, ScraperError> {
        let session = self.driver.session()?;
        session.goto(&link.url).await?;
        session.wait_for_selector("#results").await?;
        settle(500).await;

        let mut cells = session
            .table_rows("#results table.table.table-bordered.cf tbody tr", "td")
            .await?;
        if cells.is_empty() {
            cells = session.table_rows("#results table tbody tr", "td").await?;
        }
        let lines: Vec<String> = cells
            .iter()
            .filter_map(|c| TppdPriceRow::from_cells(c))
            .map(|row| row.render())
            .collect();
        if lines.is_empty() {
            return Err(ScraperError::NoPriceData(link.name.clone()));
        }
        self.driver.save(PREFIX, &link.name, &lines)
    }
}

#[async_trait]
impl PriceScraper for TppdScraper {
    fn brand(&self) -> &'static str {
        PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let links = self.city_links().await?;
        let link = find_by_name(&links, &normalize_city_name(city), |l| l.name.as_str())
            .cloned()
            .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        self.scrape_link(&link).await
    }

    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let links = self.city_links().await?;
        let names: Vec<String> = links.iter().map(|l| l.name.clone()).collect();
        let this = &*self;
        let links = &links;
        Ok(scrape_each(PREFIX, &this.driver.config, &names, 600, move |name| async move {
            let link = links
                .iter()
                .find(|l| l.name == name)
                .ok_or_else(|| ScraperError::CityNotFound(name.to_string()))?;
            this.scrape_link(link).await
        })
        .await)
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.driver.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_city_name() {
        assert_eq!(normalize_city_name("Adana Güncel Akaryakıt Fiyatları"), "ADANA");
        assert_eq!(normalize_city_name("ADANA GÜNCEL AKARYAKIT FİYATLARI"), "ADANA");
        assert_eq!(normalize_city_name("KAHRAMANMARAŞ GÜNCEL AKARYAKIT FİYATLARI"), "K.MARAS");
        assert_eq!(normalize_city_name("  AFYON   KARAHİSAR "), "AFYON KARAHİSAR");
    }

    #[test]
    fn test_city_link_falls_back_to_url() {
        let link = Link {
            href: "/istanbul-avrupa-akaryakit-fiyatlari".to_string(),
            text: "".to_string(),
        };
        let city = CityLink::from_link(&link).unwrap();
        assert_eq!(city.name, "ISTANBUL AVRUPA");
        assert_eq!(
            city.url,
            "https://www.tppd.com.tr/istanbul-avrupa-akaryakit-fiyatlari"
        );
    }

    #[test]
    fn test_row_requires_nine_cells() {
        let short: Vec<String> = vec!["İlçe".into(), "Benzin".into()];
        assert!(TppdPriceRow::from_cells(&short).is_none());

        let cells: Vec<String> = ["SEYHAN", "44,10", "", "45,20", "45,30", "41", "30", "29", "22"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let row = TppdPriceRow::from_cells(&cells).unwrap();
        assert_eq!(
            row.render(),
            "SEYHAN | K.Benzin 95: 44,10 | Gaz Yağı: - | Motorin: 45,20 | Motorin 2: 45,30 | Kalorifer Yakıtı: 41 | Fuel Oil: 30 | Y.K. Fuel Oil: 29 | Gaz: 22"
        );
    }
}
