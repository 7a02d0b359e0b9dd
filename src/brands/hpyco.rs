//! Hypco
//!
//! `#City` → `#District` を選んで表示ボタンを押すと、`#resultPrice` に1地区分の
//! ベンジン・モトリン価格が出る。地区ごとにボタンを押すので件数が多い。
//! 「İstanbul (Anadolu)」「İstanbul (Avrupa)」は `hpyco_İstanbul` にまとめる。

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::browser::{BrowserSession, SelectOption};
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::PriceLine;
use crate::pacing::{between_cities, jitter, settle};
use crate::report::ScrapeReport;
use crate::text::{
    collapse_whitespace, dedup_by_name, is_istanbul_variant, safe_filename, upper_ascii,
};
use crate::traits::PriceScraper;

use super::{find_group, group_in_order, scrape_each, Driver};

const PREFIX: &str = "hpyco";
const HYPCO_URL: &str = "https://www.hypco.com.tr/tr/pompa-fiyatlari";
const COOKIE_BUTTONS: &[&str] = &["#onetrust-accept-btn-handler"];
const CITY_SELECT: &str = "#City";
const DISTRICT_SELECT: &str = "#District";
const SHOW_BUTTONS: &[&str] = &[r#"button.btn[data-call-archive="1"]"#, "button.btn"];
const ISTANBUL: &str = "İstanbul";

static BENZIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)B\s*E\s*N\s*Z\s*[İIıi]\s*N[^0-9]*([0-9]+[.,][0-9]{2})").expect("valid benzin regex")
});

static MOTORIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)M\s*O\s*T\s*O\s*R\s*[İIıi]\s*N[^0-9]*([0-9]+[.,][0-9]{2})").expect("valid motorin regex")
});

static CELL_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+[.,][0-9]{2})").expect("valid cell price regex"));

const DISTRICTS_READY_JS: &str = r#"
(() => {
    const s = document.querySelector('#District');
    return !!s && s.options && s.options.length > 1;
})()
"#;

/// 前の地区の結果を消してから表示ボタンを押す
const CLEAR_RESULT_JS: &str = r#"
(() => {
    const box = document.querySelector('#resultPrice');
    if (box) box.innerHTML = '';
    return true;
})()
"#;

const RESULT_READY_JS: &str = r#"
(() => {
    const box = document.querySelector('#resultPrice');
    return !!box && box.innerHTML.trim().length > 20;
})()
"#;

const READ_RESULT_JS: &str = r#"
(() => {
    const scope = document.querySelector('#resultPrice') || document.body;
    const text = el => (el.innerText || el.textContent || '').trim();
    return {
        rows: Array.from(scope.querySelectorAll('table tbody tr'))
            .map(tr => Array.from(tr.querySelectorAll('td, th')).map(text)),
        text: text(scope),
    };
})()
"#;

/// `#resultPrice` の中身
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultBox {
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub text: String,
}

impl ResultBox {
    /// (ベンジン, モトリン)。表のラベルから読み、だめなら本文から探す
    pub fn prices(&self) -> (String, String) {
        let mut benzin = String::new();
        let mut motorin = String::new();
        for cells in &self.rows {
            let Some(label) = cells.first() else {
                continue;
            };
            let value = match cells.get(1) {
                Some(v) => v.trim().to_string(),
                None => CELL_PRICE_RE
                    .captures(&cells.join(" "))
                    .map(|c| c[1].to_string())
                    .unwrap_or_default(),
            };
            let label = upper_ascii(label);
            if label.contains("BENZ") && benzin.is_empty() {
                benzin = value.clone();
            }
            if label.contains("MOTOR") && motorin.is_empty() {
                motorin = value;
            }
        }
        if !benzin.is_empty() || !motorin.is_empty() {
            return (benzin, motorin);
        }

        let find = |re: &Regex| {
            re.captures(&self.text)
                .map(|c| c[1].trim().to_string())
                .unwrap_or_default()
        };
        (find(&BENZIN_RE), find(&MOTORIN_RE))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HypcoDistrictRow {
    pub name: String,
    pub benzin: String,
    pub motorin: String,
}

impl HypcoDistrictRow {
    pub fn has_price(&self) -> bool {
        !self.benzin.is_empty() || !self.motorin.is_empty()
    }

    pub fn render(&self) -> String {
        PriceLine::new(&self.name)
            .field("Benzin", self.benzin.as_str())
            .field("Motorin", self.motorin.as_str())
            .render()
    }
}

/// 出力上の都市名（ファイル名と1行目を兼ねる）
pub fn logical_city(option_text: &str) -> String {
    if is_istanbul_variant(option_text) {
        ISTANBUL.to_string()
    } else {
        collapse_whitespace(option_text)
    }
}

/// 1行目は都市名、以降は地区ごと（地区名の重複は先に出た方を残す）
pub fn render_city(city: &str, rows: Vec<HypcoDistrictRow>) -> Vec<String> {
    std::iter::once(city.to_string())
        .chain(dedup_by_name(rows, |r| r.name.as_str()).iter().map(HypcoDistrictRow::render))
        .collect()
}

fn is_placeholder(option: &SelectOption) -> bool {
    option.value.trim().is_empty()
        || option.text.contains("Şehir seçiniz")
        || option.text.contains("İlçe seçiniz")
}

pub struct HypcoScraper {
    driver: Driver,
}

impl HypcoScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    async fn open(session: &BrowserSession) -> Result<Vec<SelectOption>, ScraperError> {
        session.goto(HYPCO_URL).await?;
        session.wait_request_idle().await?;
        session.accept_cookies(COOKIE_BUTTONS).await;
        session.wait_for_selector(CITY_SELECT).await?;
        session.wait_for_selector(DISTRICT_SELECT).await?;
        Ok(session
            .select_options(CITY_SELECT)
            .await?
            .into_iter()
            .filter(|o| !is_placeholder(o))
            .collect())
    }

    async fn city_groups(&self) -> Result<Vec<(String, Vec<SelectOption>)>, ScraperError> {
        let options = Self::open(self.driver.session()?).await?;
        debug!("Hypco: {} city options", options.len());
        Ok(group_in_order(&options, |o| logical_city(&o.text)))
    }

    async fn read_district(session: &BrowserSession, district: &SelectOption) -> Result<(String, String), ScraperError> {
        session.select_value(DISTRICT_SELECT, &district.value).await?;
        session.run(CLEAR_RESULT_JS).await?;
        if !session.click_first(SHOW_BUTTONS).await? {
            return Err(ScraperError::ElementNotFound("Hypco show button".to_string()));
        }
        session.wait_until(RESULT_READY_JS, "Hypco #resultPrice").await?;
        session.wait_request_idle().await?;
        settle(300).await;
        let result: ResultBox = session.eval(READ_RESULT_JS).await?;
        Ok(result.prices())
    }

    /// 選択中の都市の全地区を読む。地区単位の失敗は価格なしの行として残す
    async fn scrape_city_option(
        session: &BrowserSession,
        option: &SelectOption,
    ) -> Result<Vec<HypcoDistrictRow>, ScraperError> {
        session.select_value(CITY_SELECT, &option.value).await?;
        settle(500).await;
        if !session.poll(DISTRICTS_READY_JS, 32, 250).await {
            debug!("Hypco: district list for {} still empty", option.text);
        }
        let districts: Vec<SelectOption> = session
            .select_options(DISTRICT_SELECT)
            .await?
            .into_iter()
            .filter(|o| !is_placeholder(o))
            .collect();
        debug!("Hypco: {} district(s) in {}", districts.len(), option.text);

        let mut rows = Vec::with_capacity(districts.len());
        for district in &districts {
            let (benzin, motorin) = match Self::read_district(session, district).await {
                Ok(prices) => prices,
                Err(e) => {
                    warn!("Hypco: {} / {} failed: {}", option.text, district.text, e);
                    (String::new(), String::new())
                }
            };
            rows.push(HypcoDistrictRow {
                name: district.text.trim().to_string(),
                benzin,
                motorin,
            });
            sleep(jitter(Duration::from_millis(300), Duration::from_millis(390))).await;
        }
        Ok(rows)
    }

    async fn scrape_group(&self, city: &str, options: &[SelectOption]) -> Result<PathBuf, ScraperError> {
        let session = self.driver.session()?;
        Self::open(session).await?;
        let mut rows = Vec::new();
        for (i, option) in options.iter().enumerate() {
            if i > 0 {
                between_cities(&self.driver.config).await;
            }
            rows.extend(Self::scrape_city_option(session, option).await?);
        }
        if !rows.iter().any(HypcoDistrictRow::has_price) {
            return Err(ScraperError::NoPriceData(city.to_string()));
        }
        self.driver
            .save(PREFIX, &safe_filename(city), &render_city(city, rows))
    }
}

#[async_trait]
impl PriceScraper for HypcoScraper {
    fn brand(&self) -> &'static str {
        PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let groups = self.city_groups().await?;
        let (name, options) = find_group(&groups, city, |o| o.text.as_str())
            .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        self.scrape_group(name, options).await
    }

    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let groups = self.city_groups().await?;
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

    fn row(name: &str, benzin: &str, motorin: &str) -> HypcoDistrictRow {
        HypcoDistrictRow {
            name: name.to_string(),
            benzin: benzin.to_string(),
            motorin: motorin.to_string(),
        }
    }

    #[test]
    fn test_prices_from_table_rows() {
        let result = ResultBox {
            rows: vec![
                vec!["Kurşunsuz Benzin 95".into(), "44,10".into()],
                vec!["Motorin".into(), "45,20".into()],
                vec!["Benzin (Premium)".into(), "46,00".into()],
            ],
            text: String::new(),
        };
        assert_eq!(result.prices(), ("44,10".to_string(), "45,20".to_string()));

        let single_cell = ResultBox {
            rows: vec![vec!["MOTORİN 45,20 TL".into()]],
            text: String::new(),
        };
        assert_eq!(single_cell.prices(), (String::new(), "45,20".to_string()));
    }

    #[test]
    fn test_prices_from_text() {
        let result = ResultBox {
            rows: Vec::new(),
            text: "Güncel fiyatlar\nBENZİN\n44,10 TL/LT\nMOTORİN: 45.20 TL/LT".into(),
        };
        assert_eq!(result.prices(), ("44,10".to_string(), "45.20".to_string()));
        assert_eq!(ResultBox::default().prices(), (String::new(), String::new()));
    }

    #[test]
    fn test_istanbul_file_deduplicates_districts() {
        assert_eq!(logical_city("İstanbul (Avrupa)"), "İstanbul");
        assert_eq!(logical_city(" Adana "), "Adana");
        let lines = render_city(
            "İstanbul",
            vec![
                row("Adalar", "44,50", "45,60"),
                row("ADALAR", "44,40", "45,50"),
                row("Kadıköy", "", ""),
            ],
        );
        assert_eq!(
            lines,
            vec![
                "İstanbul",
                "Adalar | Benzin: 44,50 | Motorin: 45,60",
                "Kadıköy | Benzin:  | Motorin: ",
            ]
        );
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_hypco_live -- --ignored --nocapture
    async fn test_hypco_live() {
        let dir = std::env::temp_dir().join("fuel-hpyco-live");
        let mut scraper = HypcoScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::City("Bolu".into()))
            .await
            .expect("Hypco scrape failed");
        assert!(report.saved[0].ends_with("hpyco_Bolu_prices.txt"));
    }
}
