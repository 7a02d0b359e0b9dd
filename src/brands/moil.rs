//! Moil
//!
//! `#cityId` で都市を選び「Sonuçları Göster」で表を更新する。
//! 「İSTANBUL」「İSTANBUL ANADOLU」の2つの選択肢は1つの都市としてまとめて出力する。

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::browser::{js_str, BrowserSession, SelectOption};
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::PriceLine;
use crate::pacing::{between_cities, settle};
use crate::report::ScrapeReport;
use crate::text::{collapse_whitespace, find_by_name, is_istanbul_variant, map_legacy_city, upper_ascii};
use crate::traits::PriceScraper;

use super::{group_in_order, scrape_each, Driver};

const PREFIX: &str = "moil";
const MOIL_URL: &str = "https://www.moil.com.tr/akaryakit-fiyatlari";
const COOKIE_BUTTONS: &[&str] = &["button[onclick*='cerezKabul(2)']"];
const CITY_SELECT: &str = "#cityId";
const SHOW_BUTTON: &str = "button[onclick='pompaFiyatList();']";
const PRICE_ROWS: &str = ".distributor_list table.table-hover tbody tr";
const ISTANBUL: &str = "İSTANBUL";

const LABELS: [&str; 7] = [
    "Kurşunsuz Benzin",
    "Gaz Yağı",
    "Motorin",
    "Motorin PowerM",
    "Kalorifer Yakıtı",
    "Fuel Oil",
    "YK Fuel Oil",
];

/// 「Sonuçları Göster」ボタン（onclick が変わっていれば文言で探す）
fn click_show_js() -> String {
    format!(
        r#"
        (() => {{
            const btn = document.querySelector({sel})
                || Array.from(document.querySelectorAll('button'))
                    .find(b => (b.innerText || '').includes('Sonuçları Göster'));
            if (!btn) return false;
            btn.click();
            return true;
        }})()
    "#,
        sel = js_str(SHOW_BUTTON)
    )
}

/// 出力・ファイル名に使う都市名（イスタンブールの2つは1つに、İçel は Mersin）
pub fn logical_city(option_text: &str) -> String {
    if is_istanbul_variant(option_text) {
        ISTANBUL.to_string()
    } else {
        map_legacy_city(option_text)
    }
}

/// 選択肢を出現順のまま論理都市ごとにまとめる
pub fn group_options(options: &[SelectOption]) -> Vec<(String, Vec<SelectOption>)> {
    group_in_order(options, |o| logical_city(&o.text))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoilPriceRow {
    pub district: String,
    pub prices: [String; 7],
}

impl MoilPriceRow {
    /// 地区名と7種の価格の8列
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        if cells.len() < 8 {
            return None;
        }
        let district = collapse_whitespace(&cells[0]);
        if district.is_empty() {
            return None;
        }
        Some(Self {
            district,
            prices: std::array::from_fn(|i| cells[i + 1].trim().to_string()),
        })
    }

    pub fn render(&self) -> String {
        LABELS
            .iter()
            .zip(&self.prices)
            .fold(PriceLine::new(upper_ascii(&self.district)), |line, (label, price)| {
                line.field(label, price.as_str())
            })
            .render()
    }
}

pub struct MoilScraper {
    driver: Driver,
}

impl MoilScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    async fn open(session: &BrowserSession) -> Result<Vec<(String, Vec<SelectOption>)>, ScraperError> {
        session.goto(MOIL_URL).await?;
        session.wait_request_idle().await?;
        session.accept_cookies(COOKIE_BUTTONS).await;
        session.wait_for_selector(CITY_SELECT).await?;

        let options: Vec<SelectOption> = session
            .select_options(CITY_SELECT)
            .await?
            .into_iter()
            .filter(|o| !o.value.trim().is_empty() && !o.text.is_empty())
            .collect();
        let groups = group_options(&options);
        debug!("Moil: {} options, {} cities", options.len(), groups.len());
        Ok(groups)
    }

    async fn scrape_option(
        session: &BrowserSession,
        option: &SelectOption,
    ) -> Result<Vec<MoilPriceRow>, ScraperError> {
        session.select_value(CITY_SELECT, &option.value).await?;
        if !session.eval::<bool>(&click_show_js()).await? {
            return Err(ScraperError::ElementNotFound(SHOW_BUTTON.to_string()));
        }
        session.wait_request_idle().await?;
        session.wait_for_selector(PRICE_ROWS).await?;
        settle(800).await;

        Ok(session
            .table_rows(PRICE_ROWS, "td")
            .await?
            .iter()
            .filter_map(|c| MoilPriceRow::from_cells(c))
            .collect())
    }

    /// 論理都市に属する選択肢をすべて読み、1ファイルに書く
    async fn scrape_group(
        &self,
        city: &str,
        options: &[SelectOption],
    ) -> Result<PathBuf, ScraperError> {
        let session = self.driver.session()?;
        let mut rows = Vec::new();
        for (i, option) in options.iter().enumerate() {
            if i > 0 {
                between_cities(&self.driver.config).await;
            }
            let found = Self::scrape_option(session, option).await?;
            debug!("Moil: {} row(s) for option {}", found.len(), option.text);
            rows.extend(found);
        }
        if rows.is_empty() {
            return Err(ScraperError::NoPriceData(city.to_string()));
        }
        let lines: Vec<String> = rows.iter().map(MoilPriceRow::render).collect();
        self.driver.save(PREFIX, &upper_ascii(city), &lines)
    }
}

#[async_trait]
impl PriceScraper for MoilScraper {
    fn brand(&self) -> &'static str {
        PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let groups = Self::open(self.driver.session()?).await?;
        let (name, options) = find_by_name(&groups, &logical_city(city), |(name, _)| name.as_str())
            .cloned()
            .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        self.scrape_group(&name, &options).await
    }

    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let groups = Self::open(self.driver.session()?).await?;
        let names: Vec<String> = groups.iter().map(|(name, _)| name.clone()).collect();
        let this = &*self;
        let groups = &groups;
        Ok(scrape_each(PREFIX, &this.driver.config, &names, 1000, move |city| async move {
            let (_, options) = groups
                .iter()
                .find(|(name, _)| name == city)
                .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
            this.scrape_group(city, options).await
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

    fn option(value: &str, text: &str) -> SelectOption {
        SelectOption {
            value: value.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_logical_city() {
        assert_eq!(logical_city("İSTANBUL ANADOLU"), "İSTANBUL");
        assert_eq!(logical_city("İstanbul"), "İSTANBUL");
        assert_eq!(logical_city("İÇEL"), "Mersin");
        assert_eq!(logical_city("ADANA"), "ADANA");
    }

    #[test]
    fn test_istanbul_options_grouped_in_order() {
        let groups = group_options(&[
            option("1", "ADANA"),
            option("34", "İSTANBUL"),
            option("33", "İÇEL"),
            option("341", "İSTANBUL ANADOLU"),
        ]);
        let names: Vec<&str> = groups.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["ADANA", "İSTANBUL", "Mersin"]);
        assert_eq!(groups[1].1.len(), 2);
        assert_eq!(groups[1].1[1].value, "341");
    }

    #[test]
    fn test_row_render_uppercases_district() {
        let cells: Vec<String> = ["Kadıköy", "44,10", "40", "45,20", "46", "41", "30", "29"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let row = MoilPriceRow::from_cells(&cells).unwrap();
        assert_eq!(
            row.render(),
            "KADIKOY | Kurşunsuz Benzin: 44,10 | Gaz Yağı: 40 | Motorin: 45,20 | Motorin PowerM: 46 | Kalorifer Yakıtı: 41 | Fuel Oil: 30 | YK Fuel Oil: 29"
        );
        assert!(MoilPriceRow::from_cells(&cells[..7]).is_none());
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_moil_live -- --ignored --nocapture
    async fn test_moil_live() {
        let dir = std::env::temp_dir().join("fuel-moil-live");
        let mut scraper = MoilScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::City("İstanbul".into()))
            .await
            .expect("Moil scrape failed");
        assert!(report.saved[0].ends_with("moil_ISTANBUL_prices.txt"));
    }
}
