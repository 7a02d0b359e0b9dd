//! Qplus
//!
//! `select#il` で都市を選んで「Sorgula」を押すと、`div.html` の `<ul>` に
//! 都市・日付・ベンジン・モトリン・LPG の順で1都市分の価格が出る。
//! イスタンブールの選択肢は `qplus_İstanbul` に1行ずつまとめる。

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::browser::{BrowserSession, SelectOption};
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::{LabeledPrice, PriceLine};
use crate::pacing::{between_cities, settle};
use crate::report::ScrapeReport;
use crate::text::{is_istanbul_variant, normalize_key, safe_filename};
use crate::traits::PriceScraper;

use super::{find_group, group_in_order, scrape_each, Driver};

const PREFIX: &str = "qplus";
const QPLUS_URL: &str = "https://www.qplus.com.tr/tr/akaryakit-fiyatlari";
const COOKIE_BUTTONS: &[&str] = &["#onetrust-accept-btn-handler"];
const CITY_SELECT: &str = "select#il";
const ISTANBUL: &str = "İstanbul";

/// `button[name=sorgula]`、なければ表示が「Sorgula」のボタン
const CLICK_QUERY_JS: &str = r#"
(() => {
    let btn = document.querySelector('button[name="sorgula"]');
    if (!btn) {
        btn = Array.from(document.querySelectorAll('button, input[type=submit]'))
            .find(b => /sorgula/i.test(b.innerText || b.value || ''));
    }
    if (!btn) return false;
    btn.scrollIntoView({ block: 'center' });
    btn.click();
    return true;
})()
"#;

const CLEAR_RESULT_JS: &str = r#"
(() => {
    const box = document.querySelector('div.html');
    if (box) box.innerHTML = '';
    return true;
})()
"#;

const RESULT_READY_JS: &str = r#"
(() => {
    const box = document.querySelector('div.html');
    return !!box && box.querySelectorAll('ul li').length >= 3;
})()
"#;

const READ_RESULT_JS: &str = r#"
Array.from(document.querySelectorAll('div.html ul li'))
    .slice(0, 7)
    .map(li => (li.innerText || li.textContent || '').trim())
"#;

/// 都市を選ぶ前の「İl Seçiniz」
fn is_placeholder(text: &str) -> bool {
    normalize_key(text) == "il seciniz"
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QplusPrice {
    pub city: String,
    pub benzin: String,
    pub motorin: String,
    pub lpg: String,
}

impl QplusPrice {
    /// `[都市, 日付, ベンジン, モトリン, LPG, ...]`。3項目未満なら None
    pub fn from_items(items: &[String], fallback_city: &str) -> Option<Self> {
        if items.len() < 3 {
            return None;
        }
        let item = |i: usize| items.get(i).map(|s| s.trim().to_string()).unwrap_or_default();
        let city = match item(0) {
            c if c.is_empty() => fallback_city.trim().to_string(),
            c => c,
        };
        Some(Self {
            city,
            benzin: item(2),
            motorin: item(3),
            lpg: item(4),
        })
    }

    fn fields(&self) -> [LabeledPrice; 3] {
        [
            LabeledPrice::new("Benzin", self.benzin.as_str()),
            LabeledPrice::new("Motorin", self.motorin.as_str()),
            LabeledPrice::new("LPG", self.lpg.as_str()),
        ]
    }
}

pub fn file_city(option_text: &str) -> String {
    if is_istanbul_variant(option_text) {
        ISTANBUL.to_string()
    } else {
        option_text.trim().to_string()
    }
}

/// 1都市なら価格1行、イスタンブールは選択肢ごとに都市名付きの行
pub fn render_city(city: &str, prices: &[QplusPrice]) -> Vec<String> {
    let mut lines = vec![city.to_string()];
    if is_istanbul_variant(city) {
        lines.extend(
            prices
                .iter()
                .map(|p| PriceLine::new(&p.city).fields(p.fields()).render()),
        );
    } else if let Some(p) = prices.first() {
        let parts: Vec<String> = p.fields().iter().map(LabeledPrice::render).collect();
        lines.push(parts.join(" | "));
    }
    lines
}

pub struct QplusScraper {
    driver: Driver,
}

impl QplusScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    async fn city_groups(&self) -> Result<Vec<(String, Vec<SelectOption>)>, ScraperError> {
        let session = self.driver.session()?;
        session.goto(QPLUS_URL).await?;
        session.wait_request_idle().await?;
        session.accept_cookies(COOKIE_BUTTONS).await;
        settle(300).await;
        session.wait_for_selector(CITY_SELECT).await?;

        let options: Vec<SelectOption> = session
            .select_options(CITY_SELECT)
            .await?
            .into_iter()
            .filter(|o| !o.value.trim().is_empty() && !is_placeholder(&o.text))
            .collect();
        debug!("Qplus: {} city options", options.len());
        Ok(group_in_order(&options, |o| file_city(&o.text)))
    }

    async fn read_option(session: &BrowserSession, option: &SelectOption) -> Result<QplusPrice, ScraperError> {
        session.run(CLEAR_RESULT_JS).await?;
        session.select_value(CITY_SELECT, &option.value).await?;
        if !session.eval::<bool>(CLICK_QUERY_JS).await? {
            return Err(ScraperError::ElementNotFound("Qplus query button".to_string()));
        }
        session.wait_until(RESULT_READY_JS, "Qplus result list").await?;
        session.wait_request_idle().await?;
        settle(200).await;

        let items: Vec<String> = session.eval(READ_RESULT_JS).await?;
        let price = QplusPrice::from_items(&items, &option.text)
            .ok_or_else(|| ScraperError::NoPriceData(option.text.clone()))?;
        if is_placeholder(&price.city) {
            return Err(ScraperError::CityNotFound(option.text.clone()));
        }
        Ok(price)
    }

    async fn scrape_group(&self, city: &str, options: &[SelectOption]) -> Result<PathBuf, ScraperError> {
        let session = self.driver.session()?;
        let mut prices = Vec::with_capacity(options.len());
        for (i, option) in options.iter().enumerate() {
            if i > 0 {
                between_cities(&self.driver.config).await;
            }
            prices.push(Self::read_option(session, option).await?);
        }
        self.driver
            .save(PREFIX, &safe_filename(city), &render_city(city, &prices))
    }
}

#[async_trait]
impl PriceScraper for QplusScraper {
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
        Ok(scrape_each(PREFIX, &this.driver.config, &names, 600, move |city| async move {
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

    fn items(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_from_items() {
        let price = QplusPrice::from_items(
            &items(&["ADANA", "18.10.2026", "44,10", "45,20", "19,90", "46,00", "TL"]),
            "Adana",
        )
        .unwrap();
        assert_eq!(render_city("ADANA", &[price]), vec!["ADANA", "Benzin: 44,10 | Motorin: 45,20 | LPG: 19,90"]);

        let partial = QplusPrice::from_items(&items(&["", "18.10.2026", "44,10"]), " Van ").unwrap();
        assert_eq!(partial.city, "Van");
        assert_eq!(partial.motorin, "");
        assert!(QplusPrice::from_items(&items(&["ADANA", "18.10.2026"]), "Adana").is_none());
    }

    #[test]
    fn test_istanbul_lines_carry_side_names() {
        let prices = vec![
            QplusPrice::from_items(&items(&["İSTANBUL AVRUPA", "-", "44,50", "45,60", "20,10"]), "").unwrap(),
            QplusPrice::from_items(&items(&["İSTANBUL ANADOLU", "-", "44,40", "45,50", "20,00"]), "").unwrap(),
        ];
        assert_eq!(file_city("İSTANBUL AVRUPA"), "İstanbul");
        assert_eq!(
            render_city("İstanbul", &prices),
            vec![
                "İstanbul",
                "İSTANBUL AVRUPA | Benzin: 44,50 | Motorin: 45,60 | LPG: 20,10",
                "İSTANBUL ANADOLU | Benzin: 44,40 | Motorin: 45,50 | LPG: 20,00",
            ]
        );
    }

    #[test]
    fn test_placeholder() {
        assert!(is_placeholder("İL SEÇİNİZ"));
        assert!(is_placeholder("Il Seciniz"));
        assert!(!is_placeholder("İzmir"));
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_qplus_live -- --ignored --nocapture
    async fn test_qplus_live() {
        let dir = std::env::temp_dir().join("fuel-qplus-live");
        let mut scraper = QplusScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::City("ADANA".into()))
            .await
            .expect("Qplus scrape failed");
        assert!(report.saved[0].ends_with("qplus_ADANA_prices.txt"));
    }
}
