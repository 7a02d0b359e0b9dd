//! Petrol Ofisi
//!
//! `select.cities-dropdown` の値はプレートコード。ファイル名もプレートコードで出力する。

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::browser::js_str;
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::PriceLine;
use crate::pacing::settle;
use crate::plates::{plate_code, plate_codes};
use crate::report::ScrapeReport;
use crate::traits::PriceScraper;

use super::{scrape_each, Driver};

const PREFIX: &str = "petrolofisi";
const PO_URL: &str = "https://www.petrolofisi.com.tr/akaryakit-fiyatlari";
const CITY_SELECT: &str = "select.cities-dropdown";
const PRICE_ROWS: &str = "table.table-prices tbody tr.price-row";
const COOKIE_BUTTONS: &[&str] = &["#onetrust-accept-btn-handler"];

/// 価格行のセル（KDV込みの span があればその値）
fn extract_rows_js() -> String {
    format!(
        r#"
        Array.from(document.querySelectorAll({})).map(tr =>
            Array.from(tr.querySelectorAll('td')).map((td, i) => {{
                const span = i > 0 ? td.querySelector('span.with-tax') : null;
                return ((span || td).innerText || (span || td).textContent || '').trim();
            }})
        )
    "#,
        js_str(PRICE_ROWS)
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetrolOfisiRow {
    pub city: String,
    pub kursunsuz_95: String,
    pub diesel: String,
    pub gazyagi: String,
    pub kalorifer_yakiti: String,
    pub fuel_oil: String,
    pub otogaz: String,
}

/// 価格セルは先頭の語だけを使う（"44.10 TL/LT" → "44.10"）
fn price_cell(cells: &[String], i: usize) -> String {
    cells
        .get(i)
        .and_then(|c| c.split_whitespace().next())
        .unwrap_or("")
        .to_string()
}

impl PetrolOfisiRow {
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        let city = cells.first()?.trim();
        if city.is_empty() {
            return None;
        }
        Some(Self {
            city: city.to_string(),
            kursunsuz_95: price_cell(cells, 1),
            diesel: price_cell(cells, 2),
            gazyagi: price_cell(cells, 3),
            kalorifer_yakiti: price_cell(cells, 4),
            fuel_oil: price_cell(cells, 5),
            otogaz: price_cell(cells, 6),
        })
    }

    pub fn render(&self) -> String {
        PriceLine::new(&self.city)
            .field("95", &self.kursunsuz_95)
            .field("Diesel", &self.diesel)
            .field("Gazyağı", &self.gazyagi)
            .field("Kalorifer", &self.kalorifer_yakiti)
            .field("FuelOil", &self.fuel_oil)
            .field("Otogaz", &self.otogaz)
            .render()
    }
}

pub struct PetrolOfisiScraper {
    driver: Driver,
}

impl PetrolOfisiScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    /// ページを開き、select に存在するプレートコードを返す
    async fn open(&self) -> Result<Vec<String>, ScraperError> {
        let session = self.driver.session()?;
        session.goto(PO_URL).await?;
        session.accept_cookies(COOKIE_BUTTONS).await;
        session.wait_for_selector(CITY_SELECT).await?;

        let values: Vec<String> = session
            .select_options(CITY_SELECT)
            .await?
            .into_iter()
            .map(|o| o.value)
            .collect();
        let codes: Vec<String> = plate_codes()
            .into_iter()
            .filter(|code| values.contains(code))
            .collect();
        debug!("Petrol Ofisi: {} plate codes in dropdown", codes.len());
        Ok(if codes.is_empty() { plate_codes() } else { codes })
    }

    async fn scrape_code(&self, code: &str) -> Result<PathBuf, ScraperError> {
        let session = self.driver.session()?;
        session.select_value(CITY_SELECT, code).await?;
        session.wait_for_selector(PRICE_ROWS).await?;
        session.wait_request_idle().await?;
        settle(400).await;

        let cells: Vec<Vec<String>> = session.eval(&extract_rows_js()).await?;
        let lines: Vec<String> = cells
            .iter()
            .filter_map(|c| PetrolOfisiRow::from_cells(c))
            .map(|row| row.render())
            .collect();
        if lines.is_empty() {
            return Err(ScraperError::NoPriceData(code.to_string()));
        }
        self.driver.save(PREFIX, code, &lines)
    }
}

#[async_trait]
impl PriceScraper for PetrolOfisiScraper {
    fn brand(&self) -> &'static str {
        PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    /// 県名またはプレートコードで指定する
    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let code = plate_code(city).ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        let codes = self.open().await?;
        if !codes.contains(&code) {
            return Err(ScraperError::CityNotFound(city.to_string()));
        }
        self.scrape_code(&code).await
    }

    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let codes = self.open().await?;
        let this = &*self;
        Ok(scrape_each(PREFIX, &this.driver.config, &codes, 700, move |code| {
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

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_row_render() {
        let row = PetrolOfisiRow::from_cells(&cells(&[
            "ADANA",
            "44.10 TL/LT",
            "45.20",
            "40.00",
            "41.00",
            "30.00",
            "22.50 TL/LT",
        ]))
        .unwrap();
        assert_eq!(
            row.render(),
            "ADANA | 95: 44.10 | Diesel: 45.20 | Gazyağı: 40.00 | Kalorifer: 41.00 | FuelOil: 30.00 | Otogaz: 22.50"
        );
    }

    #[test]
    fn test_missing_cells_are_empty() {
        let row = PetrolOfisiRow::from_cells(&cells(&["SEYHAN", "44.10"])).unwrap();
        assert_eq!(row.kursunsuz_95, "44.10");
        assert_eq!(row.otogaz, "");
        assert!(PetrolOfisiRow::from_cells(&[]).is_none());
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_petrolofisi_live -- --ignored --nocapture
    async fn test_petrolofisi_live() {
        let dir = std::env::temp_dir().join("fuel-po-live");
        let mut scraper = PetrolOfisiScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::City("06".into()))
            .await
            .expect("Petrol Ofisi scrape failed");
        assert!(report.saved[0].ends_with("petrolofisi_06_prices.txt"));
    }
}
