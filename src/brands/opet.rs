//! Opet
//!
//! Reactで描画される `<select>` で都市を選ぶと `/akaryakit-fiyatlari/<slug>` に遷移する。
//! 表の1列目が「İlçe」なら地区別、そうでなければ都市行のみを出力する。

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::browser::{js_str, BrowserSession, SelectOption};
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::{LabeledPrice, PriceLine};
use crate::pacing::settle;
use crate::report::ScrapeReport;
use crate::text::{collapse_whitespace, find_by_name, normalize_key, same_name, slugify};
use crate::traits::PriceScraper;

use super::{scrape_each, Driver};

const PREFIX: &str = "opet";
const OPET_URL: &str = "https://www.opet.com.tr/akaryakit-fiyatlari";
const COOKIE_BUTTONS: &[&str] = &["#onetrust-accept-btn-handler"];
/// 都市選択用に印を付けた `<select>`
const CITY_SELECT: &str = "select[data-fuel-city]";

/// 都市の `<select>` を探して印を付ける（クラス名 → 都市名を含む大きな select の順）
const MARK_CITY_SELECT_JS: &str = r#"
(() => {
    let sel = document.querySelector('select.FuelPrice-module_obvSelect--3bb');
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

/// 価格表のヘッダと行を取り出す（セル値は最後の span.ml-auto を優先）
const EXTRACT_TABLE_JS: &str = r#"
(() => {
    const keywords = ['BENZIN', 'BENZİN', 'MOTORIN', 'MOTORİN', 'OTOGAZ', 'LPG', 'İLÇE', 'ILÇE', 'İL', 'IL'];
    let table = document.querySelector('table[class*="FuelPrice-module_tableFuelPrice"]');
    if (!table) {
        const tables = Array.from(document.querySelectorAll('#root table')).length
            ? Array.from(document.querySelectorAll('#root table'))
            : Array.from(document.querySelectorAll('table'));
        table = tables.find(t => {
            const head = Array.from(t.querySelectorAll('thead th')).map(th => (th.innerText || '').toUpperCase()).join(' ');
            return head && keywords.some(k => head.includes(k));
        }) || tables[0];
    }
    if (!table) return null;
    const cellText = td => {
        const spans = td.querySelectorAll('span.ml-auto');
        const el = spans.length ? spans[spans.length - 1] : td;
        return (el.innerText || el.textContent || '').trim();
    };
    return {
        headers: Array.from(table.querySelectorAll('thead tr th')).map(th => (th.innerText || th.textContent || '')),
        rows: Array.from(table.querySelectorAll('tbody tr'))
            .map(tr => Array.from(tr.querySelectorAll('td')).map(cellText))
            .filter(cells => cells.length >= 2)
    };
})()
"#;

/// 画面から取り出した価格表
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpetTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl OpetTable {
    pub fn normalized_headers(&self) -> Vec<String> {
        self.headers.iter().map(|h| collapse_whitespace(h)).collect()
    }

    /// 1列目が「İlçe」なら地区別の表
    pub fn is_district_table(&self) -> bool {
        self.headers
            .first()
            .map(|h| normalize_key(h).starts_with("ilce"))
            .unwrap_or(false)
    }

    /// 行の2列目以降をヘッダ名と組にする
    fn labeled(headers: &[String], cells: &[String]) -> Vec<LabeledPrice> {
        headers
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, label)| {
                LabeledPrice::new(label.as_str(), cells.get(i).map(String::as_str).unwrap_or(""))
            })
            .collect()
    }

    /// 出力行: 1行目は都市名
    pub fn render(&self, city: &str) -> Vec<String> {
        let headers = self.normalized_headers();
        let mut lines = vec![city.to_string()];

        if self.is_district_table() {
            for cells in &self.rows {
                let name = cells.first().map(String::as_str).unwrap_or("");
                lines.push(
                    PriceLine::new(name)
                        .fields(Self::labeled(&headers, cells))
                        .render(),
                );
            }
        } else if let Some(cells) = self
            .rows
            .iter()
            .find(|cells| cells.first().is_some_and(|c| same_name(c, city)))
        {
            lines.extend(Self::labeled(&headers, cells).iter().map(LabeledPrice::render));
        }
        lines
    }
}

pub struct OpetScraper {
    driver: Driver,
}

impl OpetScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    async fn open(&self, session: &BrowserSession) -> Result<Vec<SelectOption>, ScraperError> {
        session.goto(OPET_URL).await?;
        session.wait_request_idle().await?;
        session.accept_cookies(COOKIE_BUTTONS).await;
        session.wait_until(MARK_CITY_SELECT_JS, "Opet city select").await?;

        let options: Vec<SelectOption> = session
            .select_options(CITY_SELECT)
            .await?
            .into_iter()
            .filter(|o| !o.value.trim().is_empty())
            .collect();
        debug!("Opet: {} city options", options.len());
        Ok(options)
    }

    async fn scrape_city(&self, option: &SelectOption) -> Result<PathBuf, ScraperError> {
        let session = self.driver.session()?;
        let city = option.text.as_str();

        // 遷移後は select が描画し直されるため毎回印を付け直す
        session.wait_until(MARK_CITY_SELECT_JS, "Opet city select").await?;
        session.select_value(CITY_SELECT, &option.value).await?;

        let arrived = format!(
            r#"
            (() => {{
                if (window.location.pathname.includes('/akaryakit-fiyatlari/' + {slug})) return true;
                const el = document.querySelector('.FuelPrice-module_fuelPriceHeader--daa p.big');
                return !!el && (el.textContent || '').trim().toLocaleUpperCase('tr-TR') === {city}.toLocaleUpperCase('tr-TR');
            }})()
        "#,
            slug = js_str(&slugify(city)),
            city = js_str(city)
        );
        if !session.poll(&arrived, 48, 250).await {
            warn!("Opet: page did not switch to {} in time", city);
        }
        session.wait_request_idle().await?;
        settle(800).await;

        let table: OpetTable = session
            .eval::<Option<OpetTable>>(EXTRACT_TABLE_JS)
            .await?
            .ok_or_else(|| ScraperError::ElementNotFound("Opet price table".to_string()))?;
        let lines = table.render(city);
        if lines.len() <= 1 {
            session.debug_screenshot("opet-empty-table").await;
            return Err(ScraperError::NoPriceData(city.to_string()));
        }
        self.driver.save(PREFIX, city, &lines)
    }
}

#[async_trait]
impl PriceScraper for OpetScraper {
    fn brand(&self) -> &'static str {
        PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let options = self.open(self.driver.session()?).await?;
        let option = find_by_name(&options, city, |o| o.text.as_str())
            .cloned()
            .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        self.scrape_city(&option).await
    }

    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let options = self.open(self.driver.session()?).await?;
        let names: Vec<String> = options.iter().map(|o| o.text.clone()).collect();
        let this = &*self;
        let options = &options;
        Ok(scrape_each(PREFIX, &this.driver.config, &names, 500, move |city| async move {
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

    fn table(headers: &[&str], rows: &[&[&str]]) -> OpetTable {
        OpetTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_district_table_render() {
        let t = table(
            &["İlçe", "Kurşunsuz Benzin\n95", "Motorin  UltraForce"],
            &[&["SEYHAN", "44,10", "45,20"], &["ÇUKUROVA", "44,12", ""]],
        );
        assert!(t.is_district_table());
        assert_eq!(
            t.render("ADANA"),
            vec![
                "ADANA",
                "SEYHAN | Kurşunsuz Benzin 95: 44,10 | Motorin UltraForce: 45,20",
                "ÇUKUROVA | Kurşunsuz Benzin 95: 44,12 | Motorin UltraForce: ",
            ]
        );
    }

    #[test]
    fn test_city_table_render_picks_matching_row() {
        let t = table(
            &["İl", "KDV", "Motorin"],
            &[&["ANKARA", "%20", "45,00"], &["İSTANBUL", "%20", "44,50"]],
        );
        assert!(!t.is_district_table());
        assert_eq!(
            t.render("İstanbul"),
            vec!["İstanbul", "KDV: %20", "Motorin: 44,50"]
        );
        assert_eq!(t.render("Van"), vec!["Van"]);
    }

    #[test]
    fn test_table_deserialize() {
        let json = r#"{"headers":["İlçe","Motorin"],"rows":[["SEYHAN","45,20"]]}"#;
        let t: OpetTable = serde_json::from_str(json).unwrap();
        assert_eq!(t.rows.len(), 1);
        assert!(t.is_district_table());
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_opet_live -- --ignored --nocapture
    async fn test_opet_live() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info,fuel_price_scraper=debug")
            .try_init();
        let dir = std::env::temp_dir().join("fuel-opet-live");
        let mut scraper = OpetScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::City("Adana".into()))
            .await
            .expect("Opet scrape failed");
        assert_eq!(report.saved.len(), 1);
    }
}
