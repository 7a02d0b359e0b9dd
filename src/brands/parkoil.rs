//! Parkoil
//!
//! `#citySelect` を切り替えると `tbody#parent` に地区別のベンジン・モトリンが出る。
//! ページは1回開けば都市を順に切り替えられる。

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::browser::{BrowserSession, SelectOption};
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::PriceLine;
use crate::pacing::settle;
use crate::report::ScrapeReport;
use crate::text::{find_by_name, safe_filename};
use crate::traits::PriceScraper;

use super::{scrape_each, Driver};

const PREFIX: &str = "parkoil";
const PARKOIL_URL: &str = "https://www.parkoil.com.tr/akaryakit-fiyatlar%C4%B1.html";
const COOKIE_BUTTONS: &[&str] = &["#onetrust-accept-btn-handler"];
const CITY_SELECT: &str = "#citySelect";
const PRICE_ROWS: &str = "tbody#parent tr";

const CLEAR_ROWS_JS: &str = r#"
(() => {
    const body = document.querySelector('tbody#parent');
    if (body) body.innerHTML = '';
    return true;
})()
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParkoilDistrictRow {
    pub name: String,
    pub benzin: String,
    pub motorin: String,
}

impl ParkoilDistrictRow {
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        if cells.len() < 3 || cells[0].trim().is_empty() {
            return None;
        }
        Some(Self {
            name: cells[0].trim().to_string(),
            benzin: cells[1].trim().to_string(),
            motorin: cells[2].trim().to_string(),
        })
    }

    pub fn render(&self) -> String {
        PriceLine::new(&self.name)
            .field("Benzin", self.benzin.as_str())
            .field("Motorin", self.motorin.as_str())
            .render()
    }
}

/// 1行目に都市名、以降は地区ごと
pub fn render_city(city: &str, rows: &[ParkoilDistrictRow]) -> Vec<String> {
    std::iter::once(city.to_string())
        .chain(rows.iter().map(ParkoilDistrictRow::render))
        .collect()
}

pub struct ParkoilScraper {
    driver: Driver,
}

impl ParkoilScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    async fn city_options(&self) -> Result<Vec<SelectOption>, ScraperError> {
        let session = self.driver.session()?;
        session.goto(PARKOIL_URL).await?;
        session.wait_request_idle().await?;
        session.accept_cookies(COOKIE_BUTTONS).await;
        session.wait_for_selector(CITY_SELECT).await?;

        // 値が空の「Tüm İller」は除く
        let options: Vec<SelectOption> = session
            .select_options(CITY_SELECT)
            .await?
            .into_iter()
            .filter(|o| !o.value.trim().is_empty())
            .collect();
        debug!("Parkoil: {} city options", options.len());
        Ok(options)
    }

    async fn read_rows(session: &BrowserSession, option: &SelectOption) -> Result<Vec<ParkoilDistrictRow>, ScraperError> {
        session.run(CLEAR_ROWS_JS).await?;
        session.select_value(CITY_SELECT, &option.value).await?;
        session.wait_for_selector(PRICE_ROWS).await?;
        session.wait_request_idle().await?;
        settle(300).await;
        Ok(session
            .table_rows(PRICE_ROWS, "td")
            .await?
            .iter()
            .filter_map(|c| ParkoilDistrictRow::from_cells(c))
            .collect())
    }

    async fn scrape_city(&self, option: &SelectOption) -> Result<PathBuf, ScraperError> {
        let session = self.driver.session()?;
        let city = match option.text.trim() {
            "" => option.value.trim(),
            text => text,
        };
        let rows = Self::read_rows(session, option).await?;
        if rows.is_empty() {
            return Err(ScraperError::NoPriceData(city.to_string()));
        }
        debug!("Parkoil: {} district(s) for {}", rows.len(), city);
        self.driver
            .save(PREFIX, &safe_filename(city), &render_city(city, &rows))
    }
}

#[async_trait]
impl PriceScraper for ParkoilScraper {
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
        Ok(scrape_each(PREFIX, &this.driver.config, &names, 700, move |city| async move {
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
    fn test_rows_render_under_city_header() {
        let rows: Vec<ParkoilDistrictRow> = [
            cells(&["SEYHAN", " 44,10 ", "45,20"]),
            cells(&["", "44,10", "45,20"]),
            cells(&["KOZAN", "44,30"]),
            cells(&["CEYHAN", "", "45,40", "x"]),
        ]
        .iter()
        .filter_map(|c| ParkoilDistrictRow::from_cells(c))
        .collect();
        assert_eq!(
            render_city("ADANA", &rows),
            vec![
                "ADANA",
                "SEYHAN | Benzin: 44,10 | Motorin: 45,20",
                "CEYHAN | Benzin:  | Motorin: 45,40",
            ]
        );
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_parkoil_live -- --ignored --nocapture
    async fn test_parkoil_live() {
        let dir = std::env::temp_dir().join("fuel-parkoil-live");
        let mut scraper = ParkoilScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::City("ADANA".into()))
            .await
            .expect("Parkoil scrape failed");
        assert!(report.saved[0].ends_with("parkoil_ADANA_prices.txt"));
    }
}
