//! Şahoil
//!
//! 都市の `<select>` を変えるとフォームが自動送信され、地区別のベンジン・モトリン表が出る。
//! 送信後は要素が入れ替わるので、選択肢ごとにページを開き直す。
//! イスタンブールの選択肢はまとめて `sahoil_ISTANBUL` に出力する。

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::browser::{js_str, BrowserSession, SelectOption};
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::PriceLine;
use crate::pacing::{between_cities, settle};
use crate::report::ScrapeReport;
use crate::text::{collapse_whitespace, dedup_by_name, is_istanbul_variant, safe_filename, upper_ascii};
use crate::traits::PriceScraper;

use super::{find_group, group_in_order, scrape_each, Driver};

const PREFIX: &str = "sahoil";
const SAHOIL_URL: &str = "https://sahhoil.com.tr/tr/akaryakit-fiyatlari";
const COOKIE_BUTTONS: &[&str] = &["#onetrust-accept-btn-handler"];
const CITY_SELECT: &str = "select[data-fuel-city]";
const PRICE_ROWS: &str = "table.table.table-striped.table-hover tbody tr";
const ISTANBUL: &str = "ISTANBUL";

/// `select[name="il"]`、なければ ADANA を含む大きな select に印を付ける
const MARK_CITY_SELECT_JS: &str = r#"
(() => {
    let sel = document.querySelector('select[name="il"]');
    if (!sel) {
        sel = Array.from(document.querySelectorAll('select')).find(s => {
            const texts = Array.from(s.options).map(o => (o.textContent || '').trim().toUpperCase());
            return texts.length >= 20 && texts.includes('ADANA');
        });
    }
    if (!sel) return false;
    sel.setAttribute('data-fuel-city', '1');
    return true;
})()
"#;

/// 価格表の候補。専用クラスの表がなければページ内の全ての表
const READ_TABLES_JS: &str = r#"
(() => {
    let tables = Array.from(document.querySelectorAll('table.table.table-striped.table-hover'));
    if (!tables.length) tables = Array.from(document.querySelectorAll('table'));
    const text = el => (el ? (el.innerText || el.textContent || '') : '').replace(/\u00a0/g, ' ').trim();
    return tables.map(t => ({
        head: text(t.querySelector('thead') || t.querySelector('tbody tr')),
        rows: Array.from(t.querySelectorAll('tbody tr'))
            .map(tr => Array.from(tr.querySelectorAll('td')).map(text)),
    }));
})()
"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTable {
    #[serde(default)]
    pub head: String,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    fn is_price_table(&self) -> bool {
        let head = upper_ascii(&self.head);
        (head.contains("BENZ") || head.contains("KURSUNSUZ")) && head.contains("MOTOR")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SahoilDistrictRow {
    pub name: String,
    pub benzin: String,
    pub motorin: String,
}

impl SahoilDistrictRow {
    /// 3列以上（地区・ベンジン・モトリン）。見出しのような行は捨てる
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        if cells.len() < 3 {
            return None;
        }
        let name = collapse_whitespace(&cells[0]);
        let key = upper_ascii(&name);
        if name.is_empty() || key.contains("KURSUNSUZ") || key.contains("MOTOR") {
            return None;
        }
        Some(Self {
            name,
            benzin: collapse_whitespace(&cells[1]),
            motorin: collapse_whitespace(&cells[2]),
        })
    }

    pub fn render(&self) -> String {
        PriceLine::new(&self.name)
            .field("Benzin", self.benzin.as_str())
            .field("Motorin", self.motorin.as_str())
            .render()
    }
}

/// 見出しにベンジンとモトリンがあり、地区行が取れる最初の表
pub fn district_rows(tables: &[RawTable]) -> Vec<SahoilDistrictRow> {
    tables
        .iter()
        .filter(|t| t.is_price_table())
        .map(|t| {
            t.rows
                .iter()
                .filter_map(|c| SahoilDistrictRow::from_cells(c))
                .collect::<Vec<_>>()
        })
        .find(|rows| !rows.is_empty())
        .unwrap_or_default()
}

/// 出力ファイル名と1行目
pub fn file_city(option_text: &str) -> String {
    if is_istanbul_variant(option_text) {
        ISTANBUL.to_string()
    } else {
        option_text.trim().to_string()
    }
}

pub fn render_city(city: &str, rows: Vec<SahoilDistrictRow>) -> Vec<String> {
    std::iter::once(city.to_string())
        .chain(dedup_by_name(rows, |r| r.name.as_str()).iter().map(SahoilDistrictRow::render))
        .collect()
}

pub struct SahoilScraper {
    driver: Driver,
}

impl SahoilScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    async fn open(session: &BrowserSession) -> Result<(), ScraperError> {
        session.goto(SAHOIL_URL).await?;
        session.wait_request_idle().await?;
        session.accept_cookies(COOKIE_BUTTONS).await;
        session
            .wait_until(MARK_CITY_SELECT_JS, "Şahoil city select")
            .await
    }

    async fn city_groups(&self) -> Result<Vec<(String, Vec<SelectOption>)>, ScraperError> {
        let session = self.driver.session()?;
        Self::open(session).await?;
        let options: Vec<SelectOption> = session
            .select_options(CITY_SELECT)
            .await?
            .into_iter()
            .filter(|o| !o.value.trim().is_empty() && !o.text.is_empty())
            .collect();
        debug!("Şahoil: {} city options", options.len());
        Ok(group_in_order(&options, |o| file_city(&o.text)))
    }

    async fn scrape_option(
        session: &BrowserSession,
        option: &SelectOption,
    ) -> Result<Vec<SahoilDistrictRow>, ScraperError> {
        Self::open(session).await?;
        session.select_value(CITY_SELECT, &option.value).await?;
        settle(800).await;
        session.wait_ready().await?;
        session.wait_request_idle().await?;
        if !session
            .poll(&format!("document.querySelectorAll({}).length > 0", js_str(PRICE_ROWS)), 24, 500)
            .await
        {
            debug!("Şahoil: price rows not found for {}", option.text);
        }
        let tables: Vec<RawTable> = session.eval(READ_TABLES_JS).await?;
        Ok(district_rows(&tables))
    }

    async fn scrape_group(&self, city: &str, options: &[SelectOption]) -> Result<PathBuf, ScraperError> {
        let session = self.driver.session()?;
        let mut rows = Vec::new();
        for (i, option) in options.iter().enumerate() {
            if i > 0 {
                between_cities(&self.driver.config).await;
            }
            let found = Self::scrape_option(session, option).await?;
            debug!("Şahoil: {} district(s) for {}", found.len(), option.text);
            rows.extend(found);
        }
        if rows.is_empty() {
            return Err(ScraperError::NoPriceData(city.to_string()));
        }
        self.driver
            .save(PREFIX, &safe_filename(city), &render_city(city, rows))
    }
}

#[async_trait]
impl PriceScraper for SahoilScraper {
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
        Ok(scrape_each(PREFIX, &this.driver.config, &names, 800, move |city| async move {
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
