//! Kadoil
//!
//! 価格表は `admin.kadoil.com` の iframe 内にある。iframe の src を直接開き、
//! `#selectProvince` を切り替えて地区別の表（9列）を読む。
//! 「İçel」はメルシンとして出力する。

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::browser::{BrowserSession, SelectOption};
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::{LabeledPrice, PriceLine};
use crate::pacing::settle;
use crate::report::ScrapeReport;
use crate::text::{find_by_name, map_legacy_city, normalize_key, upper_ascii};
use crate::traits::PriceScraper;

use super::{scrape_each, Driver};

const PREFIX: &str = "kadoil";
const KADOIL_URL: &str = "https://kadoil.com/akaryakit-fiyatlari/";
const COOKIE_BUTTONS: &[&str] = &["button#euCookieAcceptWP"];
const CITY_SELECT: &str = "#selectProvince";
const PRICE_ROWS: &str = "table tbody tr";
const PLACEHOLDER: &str = "İl seçiniz";

const LABELS: [&str; 8] = [
    "K.Benzin 95 Oktan",
    "Motorin",
    "EcoMax Motorin",
    "Gazyağı",
    "Kalorifer Yakıtı",
    "Fuel Oil",
    "Yüksek Kükürtlü Fuel Oil",
    "KADOGAZ",
];

/// 価格表 iframe の src
const FRAME_SRC_JS: &str = r#"
(() => {
    const frames = Array.from(document.querySelectorAll('iframe'));
    const frame = document.querySelector('iframe#frame')
        || frames.find(f => (f.src || '').includes('admin.kadoil.com'));
    return frame && frame.src ? frame.src : null;
})()
"#;

const CLEAR_TABLE_JS: &str = r#"
(() => {
    document.querySelectorAll('table tbody').forEach(b => { b.innerHTML = ''; });
    return true;
})()
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KadoilPriceRow {
    pub district: String,
    /// [`LABELS`] の順（セルの表示のまま）
    pub prices: Vec<String>,
}

impl KadoilPriceRow {
    /// 地区名と8種の価格の9列。見出し行は捨てる
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        if cells.len() < LABELS.len() + 1 {
            return None;
        }
        let district = cells[0].trim();
        if district.is_empty() || matches!(normalize_key(district).as_str(), "ilce" | "district" | "bolge") {
            return None;
        }
        Some(Self {
            district: upper_ascii(district),
            prices: cells[1..=LABELS.len()]
                .iter()
                .map(|c| c.trim().to_string())
                .collect(),
        })
    }

    pub fn render(&self) -> String {
        PriceLine::new(&self.district)
            .fields(
                LABELS
                    .iter()
                    .zip(&self.prices)
                    .map(|(label, price)| LabeledPrice::new(*label, price.as_str())),
            )
            .render()
    }
}

/// 出力ファイル名（旧県名は現在の名前にしてASCII大文字）
pub fn file_city(option_text: &str) -> String {
    upper_ascii(&map_legacy_city(option_text))
}

pub struct KadoilScraper {
    driver: Driver,
}

impl KadoilScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    /// 外側のページから iframe の URL を取り出して開く
    async fn open(session: &BrowserSession) -> Result<(), ScraperError> {
        session.goto(KADOIL_URL).await?;
        session.wait_request_idle().await?;
        session.accept_cookies(COOKIE_BUTTONS).await;
        settle(2000).await;

        let src: Option<String> = session.eval(FRAME_SRC_JS).await?;
        let src = src.ok_or_else(|| ScraperError::ElementNotFound("Kadoil price iframe".to_string()))?;
        debug!("Kadoil: opening price frame {}", src);
        session.goto(&src).await?;
        session.wait_request_idle().await?;
        session.wait_for_selector(CITY_SELECT).await
    }

    async fn city_options(&self) -> Result<Vec<SelectOption>, ScraperError> {
        let session = self.driver.session()?;
        Self::open(session).await?;
        let options: Vec<SelectOption> = session
            .select_options(CITY_SELECT)
            .await?
            .into_iter()
            .filter(|o| !o.value.trim().is_empty() && !o.text.is_empty() && o.text != PLACEHOLDER)
            .collect();
        debug!("Kadoil: {} city options", options.len());
        Ok(options)
    }

    async fn scrape_city(&self, option: &SelectOption) -> Result<PathBuf, ScraperError> {
        let session = self.driver.session()?;
        session.run(CLEAR_TABLE_JS).await?;
        session.select_with_jquery(CITY_SELECT, &option.value).await?;
        settle(2000).await;
        session.wait_request_idle().await?;
        session.wait_for_selector(PRICE_ROWS).await?;
        settle(1000).await;

        let lines: Vec<String> = session
            .table_rows(PRICE_ROWS, "td")
            .await?
            .iter()
            .filter_map(|c| KadoilPriceRow::from_cells(c))
            .map(|row| row.render())
            .collect();
        if lines.is_empty() {
            return Err(ScraperError::NoPriceData(option.text.clone()));
        }
        debug!("Kadoil: {} district(s) for {}", lines.len(), option.text);
        self.driver.save(PREFIX, &file_city(&option.text), &lines)
    }
}

#[async_trait]
impl PriceScraper for KadoilScraper {
    fn brand(&self) -> &'static str {
        PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let options = self.city_options().await?;
        let option = find_by_name(&options, city, |o| o.text.as_str())
            .or_else(|| options.iter().find(|o| file_city(&o.text) == upper_ascii(city)))
            .cloned()
            .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        self.scrape_city(&option).await
    }

    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let options = self.city_options().await?;
        let names: Vec<String> = options.iter().map(|o| o.text.clone()).collect();
        let this = &*self;
        let options = &options;
        Ok(scrape_each(PREFIX, &this.driver.config, &names, 1000, move |city| async move {
            let option = options
                .iter()
                .find(|o| o.text == city)
                .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
            this.scrape_city(option).await
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

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_row_parse_and_render() {
        let row = KadoilPriceRow::from_cells(&cells(&[
            "Çukurova", "44,10", "45,20", "45,90", "40,00", "30,50", "28,00", "27,00", " 19,90 ",
        ]))
        .unwrap();
        assert_eq!(
            row.render(),
            "CUKUROVA | K.Benzin 95 Oktan: 44,10 | Motorin: 45,20 | EcoMax Motorin: 45,90 | \
             Gazyağı: 40,00 | Kalorifer Yakıtı: 30,50 | Fuel Oil: 28,00 | \
             Yüksek Kükürtlü Fuel Oil: 27,00 | KADOGAZ: 19,90"
        );
    }

    #[test]
    fn test_header_and_short_rows_skipped() {
        let header = cells(&["İlçe", "a", "b", "c", "d", "e", "f", "g", "h"]);
        assert!(KadoilPriceRow::from_cells(&header).is_none());
        assert!(KadoilPriceRow::from_cells(&cells(&["Seyhan", "44,10"])).is_none());
    }

    #[test]
    fn test_file_city() {
        assert_eq!(file_city("İçel"), "MERSIN");
        assert_eq!(file_city("Şanlıurfa"), "SANLIURFA");
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_kadoil_live -- --ignored --nocapture
    async fn test_kadoil_live() {
        let dir = std::env::temp_dir().join("fuel-kadoil-live");
        let mut scraper = KadoilScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::City("Adana".into()))
            .await
            .expect("Kadoil scrape failed");
        assert!(report.saved[0].ends_with("kadoil_ADANA_prices.txt"));
    }
}
