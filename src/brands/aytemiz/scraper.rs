//! Aytemiz スクレイパー実装

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::brands::{scrape_each, Driver};
use crate::browser::{js_str, BrowserSession, SelectOption};
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::pacing::settle;
use crate::report::ScrapeReport;
use crate::text::find_by_name;
use crate::traits::PriceScraper;

use super::merge::merge_lpg_for_city;
use super::types::{file_city, AytemizFuelRow, AytemizLpgRow, LpgTable};

const PREFIX: &str = "aytemiz";
const AYTEMIZ_URL: &str = "https://www.aytemiz.com.tr/akaryakit-fiyatlari/benzin-fiyatlari";
const COOKIE_BUTTONS: &[&str] = &["#onetrust-accept-btn-handler"];
const CITY_SELECT: &str = "#ContentPlaceHolder1_C001_ddlCity";
const POSTBACK_TARGET: &str = "ctl00$ContentPlaceHolder1$C001$ddlCity";
const FUEL_ROWS: &str = "#fuel-price-table tbody tr";
const LPG_BUTTONS: &[&str] = &[
    r#"a[href="javascript:filterPrice(2)"]"#,
    "#ContentPlaceHolder1_C001_rdbPriceType_1",
];
const ISTANBUL_CODE: &str = "34";

/// LPG表の行（`#fuelPricesHeader` を含む表、なければ最初の tbody）
const EXTRACT_LPG_JS: &str = r#"
(() => {
    const header = document.querySelector('#fuelPricesHeader');
    const table = header ? header.closest('table') : null;
    const rows = table
        ? table.querySelectorAll('tbody tr')
        : document.querySelectorAll('table tbody tr');
    return Array.from(rows).map(tr =>
        Array.from(tr.querySelectorAll('td')).map(td => (td.innerText || td.textContent || '').trim())
    );
})()
"#;

pub struct AytemizScraper {
    driver: Driver,
    /// 最初の取得時に1回だけ読み込む
    lpg: Option<LpgTable>,
}

impl AytemizScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
            lpg: None,
        }
    }

    async fn open(session: &BrowserSession) -> Result<(), ScraperError> {
        session.goto(AYTEMIZ_URL).await?;
        session.accept_cookies(COOKIE_BUTTONS).await;
        session.wait_for_selector(CITY_SELECT).await
    }

    /// 都市を選ぶとポストバックでページが再読み込みされる
    ///
    /// change イベントで反映されなければ `__doPostBack` を直接呼ぶ。
    async fn select_city(session: &BrowserSession, value: &str) -> Result<(), ScraperError> {
        session.select_value(CITY_SELECT, value).await?;
        let selected = format!(
            r#"
            (() => {{
                const sel = document.querySelector({sel});
                return document.readyState === 'complete' && !!sel && sel.value === {val};
            }})()
        "#,
            sel = js_str(CITY_SELECT),
            val = js_str(value)
        );
        settle(1000).await;
        if !session.poll(&selected, 40, 250).await {
            debug!("Aytemiz: forcing postback for {}", value);
            session
                .run(&format!(
                    "__doPostBack({}, '')",
                    js_str(POSTBACK_TARGET)
                ))
                .await?;
            settle(1000).await;
            session.wait_until(&selected, "Aytemiz postback").await?;
        }
        session.wait_postback("Aytemiz city postback").await?;
        settle(800).await;
        Ok(())
    }

    async fn city_options(session: &BrowserSession) -> Result<Vec<SelectOption>, ScraperError> {
        let options: Vec<SelectOption> = session
            .select_options(CITY_SELECT)
            .await?
            .into_iter()
            .filter(|o| !o.value.trim().is_empty() && o.value != "-1")
            .collect();
        debug!("Aytemiz: {} city options", options.len());
        Ok(options)
    }

    async fn extract_lpg(session: &BrowserSession) -> Result<Vec<AytemizLpgRow>, ScraperError> {
        let cells: Vec<Vec<String>> = session.eval(EXTRACT_LPG_JS).await?;
        Ok(cells
            .iter()
            .filter_map(|c| AytemizLpgRow::from_cells(c))
            .collect())
    }

    /// LPGタブに切り替えて全都市のLPG価格を読む
    ///
    /// 一覧にイスタンブールがなければイスタンブールを選んで読み直す。
    async fn fetch_lpg(session: &BrowserSession) -> Result<LpgTable, ScraperError> {
        Self::open(session).await?;
        settle(2000).await;

        if !session.click_first(LPG_BUTTONS).await? {
            warn!("Aytemiz: LPG switch not found, continuing without LPG prices");
            return Ok(LpgTable::new());
        }
        session.wait_request_idle().await?;
        settle(3000).await;

        let mut table: LpgTable = Self::extract_lpg(session).await?.into_iter().collect();
        info!("Aytemiz: {} LPG entries on main page", table.len());

        if !table.has_istanbul() {
            info!("Aytemiz: Istanbul LPG missing, selecting Istanbul");
            match Self::select_city(session, ISTANBUL_CODE).await {
                Ok(()) => {
                    let rows = Self::extract_lpg(session).await?;
                    if rows.is_empty() {
                        warn!("Aytemiz: no LPG prices for Istanbul after selection");
                    }
                    table.extend(rows);
                }
                Err(e) => warn!("Aytemiz: failed to load Istanbul LPG prices: {}", e),
            }
        }
        Ok(table)
    }

    async fn ensure_lpg(&mut self) -> Result<(), ScraperError> {
        if self.lpg.is_none() {
            let table = Self::fetch_lpg(self.driver.session()?).await?;
            self.lpg = Some(table);
        }
        Ok(())
    }

    async fn scrape_city(&self, option: &SelectOption) -> Result<PathBuf, ScraperError> {
        let session = self.driver.session()?;
        let city = option.text.trim();
        Self::select_city(session, &option.value).await?;
        session.wait_for_selector(FUEL_ROWS).await?;

        let rows: Vec<AytemizFuelRow> = session
            .table_rows(FUEL_ROWS, "td")
            .await?
            .iter()
            .filter_map(|c| AytemizFuelRow::from_cells(c, Some(city)))
            .collect();
        if rows.is_empty() {
            return Err(ScraperError::NoPriceData(city.to_string()));
        }
        debug!("Aytemiz: {} fuel row(s) for {}", rows.len(), city);

        let empty = LpgTable::new();
        let merged = merge_lpg_for_city(city, &rows, self.lpg.as_ref().unwrap_or(&empty));
        let lines: Vec<String> = merged.iter().map(AytemizFuelRow::render).collect();
        self.driver.save(PREFIX, &file_city(city), &lines)
    }

    /// LPGを読み込んだあと燃料ページを開き直して都市一覧を返す
    async fn prepare(&mut self) -> Result<Vec<SelectOption>, ScraperError> {
        self.ensure_lpg().await?;
        let session = self.driver.session()?;
        Self::open(session).await?;
        Self::city_options(session).await
    }
}

#[async_trait]
impl PriceScraper for AytemizScraper {
    fn brand(&self) -> &'static str {
        PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let options = self.prepare().await?;
        let option = find_by_name(&options, city, |o| o.text.as_str())
            .cloned()
            .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        self.scrape_city(&option).await
    }

    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let options = self.prepare().await?;
        let names: Vec<String> = options.iter().map(|o| o.text.trim().to_string()).collect();
        let this = &*self;
        let options = &options;
        Ok(scrape_each(PREFIX, &this.driver.config, &names, 800, move |city| async move {
            let option = options
                .iter()
                .find(|o| o.text.trim() == city)
                .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
            this.scrape_city(option).await
        })
        .await)
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.driver.stop().await
    }
}
