//! Alpet
//!
//! `select[name=city]` で都市を選んで送信すると地区別の `table.prices` が表示される。
//! 都市ごとにページを開き直す。

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::browser::{BrowserSession, SelectOption};
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::colon_line;
use crate::pacing::settle;
use crate::report::ScrapeReport;
use crate::text::{ascii_file_name, extract_price, find_by_name, normalize_key};
use crate::traits::PriceScraper;

use super::{scrape_each, Driver};

const PREFIX: &str = "alpet";
const ALPET_URL: &str = "https://www.alpet.com.tr/tr-TR/akaryakit-fiyatlari";
const COOKIE_BUTTONS: &[&str] = &["a.cc-btn.cc-dismiss", ".cc-dismiss"];
const CITY_SELECT: &str = "select[data-fuel-city]";
const SUBMIT_BUTTONS: &[&str] = &[r#"button[type="submit"]"#, "button.btn-success"];
const PRICE_ROWS: &str = "table.prices tbody tr";
const ALL_CITIES: &str = "Tüm Şehirler";

const LABELS: [&str; 6] = [
    "Motorin",
    "Motorin Performans +",
    "95 Oktan Kurşunsuz",
    "Fuel Oil 4",
    "Fuel Oil 3",
    "Fuel Oil 6(Yüksek kükürt)",
];

/// `select[name=city]`、なければ都市名を含む大きな select に印を付ける
const MARK_CITY_SELECT_JS: &str = r#"
(() => {
    let sel = document.querySelector('select[name="city"]');
    if (!sel) {
        const known = ['ADANA', 'ANKARA', 'ISTANBUL', 'İSTANBUL'];
        sel = Array.from(document.querySelectorAll('select')).find(s => {
            const texts = Array.from(s.options).map(o => (o.textContent || '').trim().toUpperCase());
            return texts.length >= 20 && known.some(k => texts.includes(k));
        });
    }
    if (!sel) return false;
    sel.setAttribute('data-fuel-city', '1');
    return true;
})()
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlpetPriceRow {
    pub district: String,
    /// [`LABELS`] の順。抽出できなかった価格は空文字
    pub prices: [String; 6],
}

impl AlpetPriceRow {
    /// 都市・地区・6種の価格の8列。見出し行と価格のない行は捨てる
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        if cells.len() < 8 {
            return None;
        }
        let city = cells[0].trim();
        let district = cells[1].trim();
        if city.is_empty() || district.is_empty() {
            return None;
        }
        if matches!(normalize_key(city).as_str(), "sehir" | "city")
            || matches!(normalize_key(district).as_str(), "ilce" | "district")
        {
            return None;
        }
        let prices: [String; 6] =
            std::array::from_fn(|i| extract_price(&cells[i + 2]).unwrap_or_default());
        if prices.iter().all(String::is_empty) {
            return None;
        }
        Some(Self {
            district: district.to_string(),
            prices,
        })
    }

    /// `DISTRICT: Label: v, Label: v`（空の価格は省く）
    pub fn render(&self) -> Option<String> {
        colon_line(&self.district, &LABELS, &self.prices)
    }
}

pub struct AlpetScraper {
    driver: Driver,
}

impl AlpetScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    async fn open(session: &BrowserSession) -> Result<(), ScraperError> {
        session.goto(ALPET_URL).await?;
        session.wait_request_idle().await?;
        session.accept_cookies(COOKIE_BUTTONS).await;
        settle(1000).await;
        session
            .wait_until(MARK_CITY_SELECT_JS, "Alpet city select")
            .await
    }

    async fn city_options(&self) -> Result<Vec<SelectOption>, ScraperError> {
        let session = self.driver.session()?;
        Self::open(session).await?;
        let options: Vec<SelectOption> = session
            .select_options(CITY_SELECT)
            .await?
            .into_iter()
            .filter(|o| !o.value.trim().is_empty() && !o.text.is_empty() && o.text != ALL_CITIES)
            .collect();
        debug!("Alpet: {} city options", options.len());
        Ok(options)
    }

    async fn scrape_city(&self, option: &SelectOption) -> Result<PathBuf, ScraperError> {
        let session = self.driver.session()?;
        let city = option.text.as_str();

        Self::open(session).await?;
        session.select_value(CITY_SELECT, &option.value).await?;
        settle(500).await;
        if !session.click_first(SUBMIT_BUTTONS).await? {
            return Err(ScraperError::ElementNotFound("Alpet submit button".to_string()));
        }
        session.wait_for_selector(PRICE_ROWS).await?;
        session.wait_request_idle().await?;
        settle(1500).await;

        let lines: Vec<String> = session
            .table_rows(PRICE_ROWS, "td")
            .await?
            .iter()
            .filter_map(|c| AlpetPriceRow::from_cells(c))
            .filter_map(|row| row.render())
            .collect();
        if lines.is_empty() {
            return Err(ScraperError::NoPriceData(city.to_string()));
        }
        debug!("Alpet: {} district(s) for {}", lines.len(), city);
        self.driver.save(PREFIX, &ascii_file_name(city), &lines)
    }
}

#[async_trait]
impl PriceScraper for AlpetScraper {
    fn brand(&self) -> &'static str {
        PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let options = self.city_options().await?;
        let option = find_by_name(&options, city, |o| o.text.as_str())
            .cloned()
            .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        self.scrape_city(&option).await
    }

    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let options = self.city_options().await?;
        let names: Vec<String> = options.iter().map(|o| o.text.clone()).collect();
        let this = &*self;
        let options = &options;
        Ok(scrape_each(PREFIX, &this.driver.config, &names, 800, move |city| async move {
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
    fn test_row_omits_empty_prices() {
        let row = AlpetPriceRow::from_cells(&cells(&[
            "ADANA",
            "SEYHAN",
            "45,20 TL/LT",
            "",
            "44,10",
            "-",
            "-",
            "29.00",
        ]))
        .unwrap();
        assert_eq!(
            row.render().unwrap(),
            "SEYHAN: Motorin: 45.20, 95 Oktan Kurşunsuz: 44.10, Fuel Oil 6(Yüksek kükürt): 29.00"
        );
    }

    #[test]
    fn test_header_and_empty_rows_skipped() {
        assert!(AlpetPriceRow::from_cells(&cells(&[
            "Şehir", "İlçe", "Motorin", "", "", "", "", ""
        ]))
        .is_none());
        assert!(AlpetPriceRow::from_cells(&cells(&[
            "ADANA", "SEYHAN", "-", "-", "-", "-", "-", "-"
        ]))
        .is_none());
        assert!(AlpetPriceRow::from_cells(&cells(&["ADANA", "SEYHAN", "45,20"])).is_none());
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_alpet_live -- --ignored --nocapture
    async fn test_alpet_live() {
        let dir = std::env::temp_dir().join("fuel-alpet-live");
        let mut scraper = AlpetScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::City("Adana".into()))
            .await
            .expect("Alpet scrape failed");
        assert!(report.saved[0].ends_with("alpet_ADANA_prices.txt"));
    }
}
