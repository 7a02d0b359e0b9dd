//! Petrall
//!
//! `fuelBring` エンドポイントをページ単位で全件読み、都市ごとにまとめて出力する。
//! イスタンブールの表記揺れは「İstanbul」1つにまとめる。

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::PriceLine;
use crate::pacing::settle;
use crate::report::ScrapeReport;
use crate::text::{collapse_whitespace, find_by_name, is_istanbul_variant, json_text, safe_filename};
use crate::traits::PriceScraper;

use super::Driver;

const PREFIX: &str = "petral";
const FUEL_URL: &str = "https://petrall.com.tr/fuelBring";
const PAGE_SIZE: u32 = 10;
/// ページ情報が返らないときに読むページ数
const FALLBACK_LAST_PAGE: u32 = 102;
const ISTANBUL: &str = "İstanbul";

pub fn page_url(page: u32) -> String {
    format!("{}?page={}&page_size={}", FUEL_URL, page, PAGE_SIZE)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PetralItem {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub diesel: Option<Value>,
    #[serde(default)]
    pub gasoline: Option<Value>,
    #[serde(default)]
    pub heatingoil: Option<Value>,
    #[serde(default)]
    pub fueloil: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub last_page: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PetralPage {
    #[serde(default)]
    pub data: Vec<PetralItem>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl PetralPage {
    /// 最終ページ番号。ページ情報がなければ既定値、値が読めなければ1
    pub fn last_page(&self) -> u32 {
        let Some(pagination) = &self.pagination else {
            return FALLBACK_LAST_PAGE;
        };
        match &pagination.last_page {
            Some(Value::Number(n)) => n.as_u64().map(|n| n as u32).unwrap_or(1),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(1),
            _ => 1,
        }
        .max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetralRow {
    pub city: String,
    pub district: String,
    pub diesel: String,
    pub gasoline: String,
    pub heatingoil: String,
    pub fueloil: String,
}

impl PetralRow {
    /// 都市名のない項目は捨てる。地区がなければ "-"
    pub fn from_item(item: &PetralItem) -> Option<Self> {
        let city = collapse_whitespace(item.city.as_deref().unwrap_or(""));
        if city.is_empty() {
            return None;
        }
        let district = collapse_whitespace(item.district.as_deref().unwrap_or(""));
        Some(Self {
            city,
            district: if district.is_empty() { "-".to_string() } else { district },
            diesel: json_text(item.diesel.as_ref()),
            gasoline: json_text(item.gasoline.as_ref()),
            heatingoil: json_text(item.heatingoil.as_ref()),
            fueloil: json_text(item.fueloil.as_ref()),
        })
    }

    /// 地区名が "-" の行は出力しない
    pub fn render(&self) -> Option<String> {
        if self.district == "-" {
            return None;
        }
        Some(
            PriceLine::new(&self.district)
                .field("Motorin", self.diesel.as_str())
                .field("Kurşunsuz 95", self.gasoline.as_str())
                .field("Kalorifer Yakıtı", self.heatingoil.as_str())
                .field("Fuel Oil", self.fueloil.as_str())
                .render(),
        )
    }
}

/// 出力用の都市キー
pub fn city_key(city: &str) -> String {
    if is_istanbul_variant(city) {
        ISTANBUL.to_string()
    } else {
        city.trim().to_string()
    }
}

pub fn group_by_city(rows: Vec<PetralRow>) -> BTreeMap<String, Vec<PetralRow>> {
    let mut cities: BTreeMap<String, Vec<PetralRow>> = BTreeMap::new();
    for row in rows {
        cities.entry(city_key(&row.city)).or_default().push(row);
    }
    cities
}

/// 1行目は都市名、以降は地区ごと
pub fn render_city(city: &str, rows: &[PetralRow]) -> Vec<String> {
    std::iter::once(city.to_string())
        .chain(rows.iter().filter_map(PetralRow::render))
        .collect()
}

pub struct PetralScraper {
    driver: Driver,
}

impl PetralScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    /// 全ページを順に読む。途中のページで失敗したらエラー
    async fn fetch_rows(&self) -> Result<Vec<PetralRow>, ScraperError> {
        let session = self.driver.session()?;
        let first: PetralPage = session.fetch_json(&page_url(1)).await?;
        let last_page = first.last_page();
        info!("Petrall: {} page(s) to read", last_page);

        let mut rows: Vec<PetralRow> = first.data.iter().filter_map(PetralRow::from_item).collect();
        for page in 2..=last_page {
            settle(150).await;
            let next: PetralPage = session.fetch_json(&page_url(page)).await?;
            if next.data.is_empty() {
                debug!("Petrall: page {} is empty, stopping", page);
                break;
            }
            rows.extend(next.data.iter().filter_map(PetralRow::from_item));
        }
        debug!("Petrall: {} row(s) total", rows.len());
        Ok(rows)
    }

    fn save(&self, city: &str, rows: &[PetralRow]) -> Result<PathBuf, ScraperError> {
        self.driver
            .save(PREFIX, &safe_filename(city), &render_city(city, rows))
    }
}

#[async_trait]
impl PriceScraper for PetralScraper {
    fn brand(&self) -> &'static str {
        PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let cities: Vec<(String, Vec<PetralRow>)> =
            group_by_city(self.fetch_rows().await?).into_iter().collect();
        let (name, rows) = find_by_name(&cities, &city_key(city), |(name, _)| name.as_str())
            .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        self.save(name, rows)
    }

    /// 全件を1回で取得するので、都市間の待機やリトライはしない
    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let cities = group_by_city(self.fetch_rows().await?);
        let mut report = ScrapeReport::new(PREFIX);
        for (city, rows) in &cities {
            match self.save(city, rows) {
                Ok(path) => report.saved(path),
                Err(e) => {
                    warn!("Skipped {} {}: {}", PREFIX, city, e);
                    report.skip(city.as_str(), e);
                }
            }
        }
        Ok(report.finish())
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.driver.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "data": [
            {"city": "İSTANBUL (AVRUPA)", "district": "Şişli", "diesel": "45.20", "gasoline": "44.10", "heatingoil": null, "fueloil": 30},
            {"city": "Istanbul Anadolu", "district": "Kadıköy", "diesel": "45.30", "gasoline": "44.20", "heatingoil": "41", "fueloil": "30"},
            {"city": "Adana", "district": null, "diesel": "45.00", "gasoline": "44.00"},
            {"city": "", "district": "X"}
        ],
        "pagination": {"last_page": 3}
    }"#;

    fn rows() -> Vec<PetralRow> {
        let page: PetralPage = serde_json::from_str(PAGE).unwrap();
        page.data.iter().filter_map(PetralRow::from_item).collect()
    }

    #[test]
    fn test_page_parsing_and_last_page() {
        let page: PetralPage = serde_json::from_str(PAGE).unwrap();
        assert_eq!(page.last_page(), 3);
        assert_eq!(rows().len(), 3);

        let no_pagination: PetralPage = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert_eq!(no_pagination.last_page(), 102);

        let text: PetralPage =
            serde_json::from_str(r#"{"data": [], "pagination": {"last_page": "7"}}"#).unwrap();
        assert_eq!(text.last_page(), 7);
        assert_eq!(page_url(2), "https://petrall.com.tr/fuelBring?page=2&page_size=10");
    }

    #[test]
    fn test_istanbul_variants_grouped() {
        let cities = group_by_city(rows());
        assert_eq!(cities.len(), 2);
        let istanbul = &cities["İstanbul"];
        assert_eq!(
            render_city("İstanbul", istanbul),
            vec![
                "İstanbul",
                "Şişli | Motorin: 45.20 | Kurşunsuz 95: 44.10 | Kalorifer Yakıtı:  | Fuel Oil: 30",
                "Kadıköy | Motorin: 45.30 | Kurşunsuz 95: 44.20 | Kalorifer Yakıtı: 41 | Fuel Oil: 30",
            ]
        );
    }

    #[test]
    fn test_dash_district_not_rendered() {
        let cities = group_by_city(rows());
        assert_eq!(render_city("Adana", &cities["Adana"]), vec!["Adana"]);
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_petral_live -- --ignored --nocapture
    async fn test_petral_live() {
        let dir = std::env::temp_dir().join("fuel-petral-live");
        let mut scraper = PetralScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::City("İstanbul".into()))
            .await
            .expect("Petrall scrape failed");
        assert!(report.saved[0].ends_with("petral_İstanbul_prices.txt"));
    }
}
