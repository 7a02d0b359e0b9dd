//! TotalEnergies (Güzel Enerji)
//!
//! モバイルアプリ向けのJSON API をプレートコードごとに呼ぶ。画面操作はない。

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::PriceLine;
use crate::plates::{plate_code, plate_codes, province_name};
use crate::report::ScrapeReport;
use crate::text::{collapse_whitespace, json_text, map_legacy_city, upper_ascii};
use crate::traits::PriceScraper;

use super::{scrape_each, Driver};

const PREFIX: &str = "total";
const TOTAL_API_BASE: &str = "https://apimobile.guzelenerji.com.tr/exapi/fuel_prices";

pub fn api_url(code: &str) -> String {
    format!("{}/{}", TOTAL_API_BASE, code)
}

/// APIの1地区分（価格は文字列・数値・null のいずれでも返ってくる）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TotalApiItem {
    #[serde(default)]
    pub county_name: Option<String>,
    #[serde(default)]
    pub kursunsuz_95_excellium_95: Option<Value>,
    #[serde(default)]
    pub motorin: Option<Value>,
    #[serde(default)]
    pub motorin_excellium: Option<Value>,
    #[serde(default)]
    pub gazyagi: Option<Value>,
    #[serde(default)]
    pub kalorifer_yakiti: Option<Value>,
    #[serde(default)]
    pub fuel_oil: Option<Value>,
    #[serde(default)]
    pub yuksek_kukurtlu_fuel_oil: Option<Value>,
    #[serde(default)]
    pub otogaz: Option<Value>,
}

impl TotalApiItem {
    /// 地区名のない項目は出力しない
    pub fn render(&self) -> Option<String> {
        let district = collapse_whitespace(self.county_name.as_deref().unwrap_or(""));
        if district.is_empty() {
            return None;
        }
        Some(
            PriceLine::new(district)
                .field("K.Benzin 95 Oktan", json_text(self.kursunsuz_95_excellium_95.as_ref()))
                .field("Motorin", json_text(self.motorin.as_ref()))
                .field("Motorin Excellium", json_text(self.motorin_excellium.as_ref()))
                .field("Gazyağı", json_text(self.gazyagi.as_ref()))
                .field("Kalorifer Yakıtı", json_text(self.kalorifer_yakiti.as_ref()))
                .field("Fuel Oil", json_text(self.fuel_oil.as_ref()))
                .field("Yüksek Kükürtlü Fuel Oil", json_text(self.yuksek_kukurtlu_fuel_oil.as_ref()))
                .field("Otogaz", json_text(self.otogaz.as_ref()))
                .render(),
        )
    }
}

/// ファイル名用の県名（旧名 İçel は Mersin）
pub fn file_city(code: &str) -> Option<String> {
    province_name(code).map(|name| upper_ascii(&map_legacy_city(name)))
}

pub struct TotalScraper {
    driver: Driver,
}

impl TotalScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    async fn scrape_code(&self, code: &str) -> Result<PathBuf, ScraperError> {
        let city = file_city(code).ok_or_else(|| ScraperError::CityNotFound(code.to_string()))?;
        let session = self.driver.session()?;
        let items: Vec<TotalApiItem> = session.fetch_json(&api_url(code)).await?;
        debug!("Total: {} item(s) for {}", items.len(), code);

        let lines: Vec<String> = items.iter().filter_map(TotalApiItem::render).collect();
        if lines.is_empty() {
            return Err(ScraperError::NoPriceData(city));
        }
        self.driver.save(PREFIX, &city, &lines)
    }
}

#[async_trait]
impl PriceScraper for TotalScraper {
    fn brand(&self) -> &'static str {
        PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let code = plate_code(city).ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        self.scrape_code(&code).await
    }

    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let codes = plate_codes();
        let this = &*self;
        Ok(scrape_each(PREFIX, &this.driver.config, &codes, 500, move |code| {
            this.scrape_code(code)
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
    fn test_parse_api_items() {
        let json = r#"[
            {"county_name": " SEYHAN ", "kursunsuz_95_excellium_95": "44.10", "motorin": 45.2,
             "motorin_excellium": null, "gazyagi": "", "kalorifer_yakiti": "41.00",
             "fuel_oil": "30.00", "yuksek_kukurtlu_fuel_oil": "29.00", "otogaz": "22.50"},
            {"county_name": "", "motorin": "1"}
        ]"#;
        let items: Vec<TotalApiItem> = serde_json::from_str(json).unwrap();
        let lines: Vec<String> = items.iter().filter_map(TotalApiItem::render).collect();
        assert_eq!(
            lines,
            vec!["SEYHAN | K.Benzin 95 Oktan: 44.10 | Motorin: 45.2 | Motorin Excellium:  | Gazyağı:  | Kalorifer Yakıtı: 41.00 | Fuel Oil: 30.00 | Yüksek Kükürtlü Fuel Oil: 29.00 | Otogaz: 22.50"]
        );
    }

    #[test]
    fn test_file_city_from_plate_code() {
        assert_eq!(file_city("33").as_deref(), Some("MERSIN"));
        assert_eq!(file_city("34").as_deref(), Some("ISTANBUL"));
        assert_eq!(file_city("99"), None);
        assert_eq!(
            api_url("06"),
            "https://apimobile.guzelenerji.com.tr/exapi/fuel_prices/06"
        );
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_total_live -- --ignored --nocapture
    async fn test_total_live() {
        let dir = std::env::temp_dir().join("fuel-total-live");
        let mut scraper = TotalScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::City("Ankara".into()))
            .await
            .expect("Total scrape failed");
        assert!(report.saved[0].ends_with("total_ANKARA_prices.txt"));
    }
}
