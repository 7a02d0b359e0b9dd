//! Termopet
//!
//! 都市と地区の `<select>` は select2 で包まれているため、値は jQuery 経由で変更する。
//! 地区を選んで送信ボタンを押すと `#dataRows` に1地区分の価格が1行だけ出る。
//! 送信で都市の選択が戻ることがあるので、地区ごとに都市の値を確かめる。

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::browser::{js_str, BrowserSession, SelectOption};
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::colon_line;
use crate::pacing::{jitter, settle};
use crate::report::ScrapeReport;
use crate::text::{ascii_file_name, extract_price, find_by_name};
use crate::traits::PriceScraper;

use super::{scrape_each, Driver};

const PREFIX: &str = "termo";
const TERMO_URL: &str = "https://termopet.com.tr/tr-tr/pompa-fiyatlari";
const CITY_SELECT: &str = r#"select[name="city"]"#;
const DISTRICT_SELECT: &str = r#"select[name="district"]"#;
const SUBMIT_BUTTON: &str = "button.btn-submit-form";
const DATA_ROWS: &str = "#pricesTable tbody#dataRows tr";

const LABELS: [&str; 7] = [
    "K. Benzin (95 Oktan)",
    "Motorin",
    "Motorin XTR",
    "Gazyağı",
    "Fuel Oil3",
    "Kalorifer Yakıtı",
    "LPG",
];

const DISTRICTS_READY_JS: &str = r#"
(() => {
    const s = document.querySelector('select[name="district"]');
    return !!s && Array.from(s.options).some(o => o.value);
})()
"#;

const CLEAR_ROWS_JS: &str = r#"
(() => {
    const body = document.querySelector('#pricesTable tbody#dataRows');
    if (body) body.innerHTML = '';
    return true;
})()
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermoPriceRow {
    pub district: String,
    /// [`LABELS`] の順
    pub prices: Vec<String>,
}

impl TermoPriceRow {
    /// 結果の先頭行（7列）。地区名は選んだ選択肢の表示名を使う
    pub fn from_cells(district: &str, cells: &[String]) -> Option<Self> {
        if cells.len() < LABELS.len() {
            return None;
        }
        Some(Self {
            district: district.trim().to_string(),
            prices: cells[..LABELS.len()]
                .iter()
                .map(|c| extract_price(c).unwrap_or_default())
                .collect(),
        })
    }

    pub fn render(&self) -> Option<String> {
        colon_line(&self.district, &LABELS, &self.prices)
    }
}

/// 値が空の選択肢（「Seçiniz」など）を除く
fn real_options(options: Vec<SelectOption>) -> Vec<SelectOption> {
    options
        .into_iter()
        .filter(|o| !o.value.trim().is_empty() && !o.text.trim().is_empty())
        .collect()
}

pub struct TermoScraper {
    driver: Driver,
}

impl TermoScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    async fn open(session: &BrowserSession) -> Result<Vec<SelectOption>, ScraperError> {
        session.goto(TERMO_URL).await?;
        session.wait_request_idle().await?;
        // select2 の初期化待ち
        settle(2000).await;
        session.wait_for_selector(CITY_SELECT).await?;
        Ok(real_options(session.select_options(CITY_SELECT).await?))
    }

    async fn select_city(session: &BrowserSession, option: &SelectOption) -> Result<(), ScraperError> {
        session.select_with_jquery(CITY_SELECT, &option.value).await?;
        settle(2000).await;
        if !session.poll(DISTRICTS_READY_JS, 48, 250).await {
            debug!("Termo: districts for {} not loaded yet", option.text);
            settle(3000).await;
        }
        Ok(())
    }

    async fn read_district(
        session: &BrowserSession,
        city: &SelectOption,
        district: &SelectOption,
    ) -> Result<Option<TermoPriceRow>, ScraperError> {
        let current: String = session
            .eval(&format!(
                "(document.querySelector({}) || {{}}).value || ''",
                js_str(CITY_SELECT)
            ))
            .await?;
        if current != city.value {
            debug!("Termo: city selection reset, selecting {} again", city.text);
            Self::select_city(session, city).await?;
        }

        session.select_with_jquery(DISTRICT_SELECT, &district.value).await?;
        settle(800).await;
        session.run(CLEAR_ROWS_JS).await?;
        session.click(SUBMIT_BUTTON).await?;
        settle(1500).await;
        session.wait_for_selector(DATA_ROWS).await?;
        session.wait_request_idle().await?;
        settle(800).await;

        let rows = session.table_rows(DATA_ROWS, "td").await?;
        Ok(rows
            .first()
            .and_then(|cells| TermoPriceRow::from_cells(&district.text, cells)))
    }

    async fn scrape_city(&self, option: &SelectOption) -> Result<PathBuf, ScraperError> {
        let session = self.driver.session()?;
        let city = option.text.trim();

        Self::open(session).await?;
        Self::select_city(session, option).await?;
        let districts = real_options(session.select_options(DISTRICT_SELECT).await?);
        if districts.is_empty() {
            return Err(ScraperError::ElementNotFound(format!("{} districts", city)));
        }
        debug!("Termo: {} district(s) in {}", districts.len(), city);

        let mut lines = Vec::new();
        for district in &districts {
            match Self::read_district(session, option, district).await {
                Ok(Some(row)) => lines.extend(row.render()),
                Ok(None) => debug!("Termo: no price row for {} / {}", city, district.text),
                Err(e) => warn!("Termo: {} / {} failed: {}", city, district.text, e),
            }
            sleep(jitter(Duration::from_millis(500), Duration::from_millis(1000))).await;
        }
        if lines.is_empty() {
            return Err(ScraperError::NoPriceData(city.to_string()));
        }
        self.driver.save(PREFIX, &ascii_file_name(city), &lines)
    }
}

#[async_trait]
impl PriceScraper for TermoScraper {
    fn brand(&self) -> &'static str {
        PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let options = Self::open(self.driver.session()?).await?;
        let option = find_by_name(&options, city, |o| o.text.as_str())
            .cloned()
            .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        self.scrape_city(&option).await
    }

    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let options = Self::open(self.driver.session()?).await?;
        let names: Vec<String> = options.iter().map(|o| o.text.clone()).collect();
        let this = &*self;
        let options = &options;
        Ok(scrape_each(PREFIX, &this.driver.config, &names, 1500, move |city| async move {
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
        let row = TermoPriceRow::from_cells(
            " Seyhan ",
            &cells(&["44,10 TL", "45,20", "46,00", "-", "", "30,50", "19,90"]),
        )
        .unwrap();
        assert_eq!(
            row.render().as_deref(),
            Some(
                "Seyhan: K. Benzin (95 Oktan): 44.10, Motorin: 45.20, Motorin XTR: 46.00, \
                 Kalorifer Yakıtı: 30.50, LPG: 19.90"
            )
        );
    }

    #[test]
    fn test_short_and_empty_rows() {
        assert!(TermoPriceRow::from_cells("Seyhan", &cells(&["44,10", "45,20"])).is_none());
        let empty = TermoPriceRow::from_cells("Seyhan", &cells(&["-"; 7])).unwrap();
        assert_eq!(empty.render(), None);
    }

    #[test]
    fn test_placeholder_options_removed() {
        let options = real_options(vec![
            SelectOption { value: "".into(), text: "Seçiniz: İlçe".into() },
            SelectOption { value: "12".into(), text: "Seyhan".into() },
            SelectOption { value: "13".into(), text: " ".into() },
        ]);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].value, "12");
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_termo_live -- --ignored --nocapture
    async fn test_termo_live() {
        let dir = std::env::temp_dir().join("fuel-termo-live");
        let mut scraper = TermoScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::City("Adana".into()))
            .await
            .expect("Termopet scrape failed");
        assert!(report.saved[0].ends_with("termo_ADANA_prices.txt"));
    }
}
