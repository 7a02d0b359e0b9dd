//! 日付と都市の `<select>` を選ぶとフォームが送信され、地区別の価格表が出るサイト
//!
//! サイトごとの違い（URL・セレクタ・列・ラベル）は [`TableSite`] の定数で表す。
//! イスタンブールの複数の選択肢は `ISTANBUL` の1ファイルにまとめ、地区名で重複を除く。

use std::marker::PhantomData;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::browser::{js_str, BrowserSession, SelectOption};
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::colon_line;
use crate::pacing::{between_cities, settle};
use crate::report::ScrapeReport;
use crate::text::{
    ascii_file_name, collapse_whitespace, dedup_by_name, extract_price, is_istanbul_variant,
    normalize_key,
};
use crate::traits::PriceScraper;

use super::{find_group, group_in_order, scrape_each, Driver};

const ISTANBUL: &str = "ISTANBUL";
const HEADER_KEYS: [&str; 4] = ["ilce", "district", "sehir", "city"];

pub trait TableSite: Send + Sync + 'static {
    const PREFIX: &'static str;
    /// ログ用の表示名
    const NAME: &'static str;
    const URL: &'static str;
    const DATE_SELECT: &'static str;
    const CITY_SELECT: &'static str;
    const PRICE_ROWS: &'static str;
    /// 地区名の列。それより前の列（都市名など）も空なら行を捨てる
    const DISTRICT_COL: usize;
    /// 地区名の次の列から順に対応する
    const LABELS: &'static [&'static str];
    /// 表示名に関係なくイスタンブールとして扱う選択肢の value
    const ISTANBUL_VALUES: &'static [&'static str] = &[];
    /// 都市ごとにページを開き直す
    const REOPEN_EACH_CITY: bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistrictPrices {
    pub district: String,
    pub prices: Vec<String>,
}

impl DistrictPrices {
    /// 見出し行・列の足りない行・価格が1つもない行は None
    pub fn from_cells<S: TableSite>(cells: &[String]) -> Option<Self> {
        if cells.len() < S::DISTRICT_COL + 1 + S::LABELS.len() {
            return None;
        }
        let names: Vec<String> = cells[..=S::DISTRICT_COL]
            .iter()
            .map(|c| collapse_whitespace(c))
            .collect();
        if names
            .iter()
            .any(|n| n.is_empty() || HEADER_KEYS.contains(&normalize_key(n).as_str()))
        {
            return None;
        }
        let prices: Vec<String> = cells[S::DISTRICT_COL + 1..]
            .iter()
            .take(S::LABELS.len())
            .map(|c| extract_price(c).unwrap_or_default())
            .collect();
        if prices.iter().all(String::is_empty) {
            return None;
        }
        Some(Self {
            district: names[S::DISTRICT_COL].clone(),
            prices,
        })
    }

    /// `DISTRICT: Label: v, Label: v`
    pub fn render<S: TableSite>(&self) -> Option<String> {
        colon_line(&self.district, S::LABELS, &self.prices)
    }
}

/// 出力ファイル名になるキー
pub fn file_key<S: TableSite>(option: &SelectOption) -> String {
    if is_istanbul_variant(&option.text) || S::ISTANBUL_VALUES.contains(&option.value.trim()) {
        ISTANBUL.to_string()
    } else {
        ascii_file_name(&option.text)
    }
}

/// 選択肢をファイル単位にまとめる（出現順）
pub fn group_options<S: TableSite>(options: &[SelectOption]) -> Vec<(String, Vec<SelectOption>)> {
    group_in_order(options, file_key::<S>)
}

/// 1都市分の行を出力行にする。複数の選択肢をまとめたときは地区名で重複を除く
pub fn render_rows<S: TableSite>(rows: Vec<DistrictPrices>, merged: bool) -> Vec<String> {
    let rows = if merged {
        dedup_by_name(rows, |r| r.district.as_str())
    } else {
        rows
    };
    rows.iter().filter_map(DistrictPrices::render::<S>).collect()
}

pub struct DistrictTableScraper<S: TableSite> {
    driver: Driver,
    _site: PhantomData<S>,
}

impl<S: TableSite> DistrictTableScraper<S> {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
            _site: PhantomData,
        }
    }

    /// 日付の選択肢の先頭（最新）がまだ選ばれていなければ選ぶ
    async fn select_latest_date(session: &BrowserSession) -> Result<(), ScraperError> {
        let options = match session.select_options(S::DATE_SELECT).await {
            Ok(options) => options,
            Err(ScraperError::ElementNotFound(_)) => {
                debug!("{}: no date select", S::NAME);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let Some(latest) = options.iter().find(|o| !o.value.trim().is_empty()) else {
            return Ok(());
        };
        let current: String = session
            .eval(&format!(
                "(document.querySelector({}) || {{}}).value || ''",
                js_str(S::DATE_SELECT)
            ))
            .await?;
        if current != latest.value {
            debug!("{}: selecting date {}", S::NAME, latest.text);
            session.select_value(S::DATE_SELECT, &latest.value).await?;
            settle(1200).await;
            session.wait_ready().await?;
            session.wait_request_idle().await?;
        }
        Ok(())
    }

    async fn open(session: &BrowserSession) -> Result<Vec<SelectOption>, ScraperError> {
        session.goto(S::URL).await?;
        session.wait_request_idle().await?;
        settle(1000).await;
        Self::select_latest_date(session).await?;
        session.wait_for_selector(S::CITY_SELECT).await?;

        let options: Vec<SelectOption> = session
            .select_options(S::CITY_SELECT)
            .await?
            .into_iter()
            .filter(|o| {
                let value = o.value.trim();
                !value.is_empty() && value != "0" && !o.text.is_empty()
            })
            .collect();
        debug!("{}: {} city options", S::NAME, options.len());
        Ok(options)
    }

    /// 都市を選ぶとフォームが送信されてページが入れ替わる
    async fn scrape_option(
        session: &BrowserSession,
        option: &SelectOption,
    ) -> Result<Vec<DistrictPrices>, ScraperError> {
        session.select_value(S::CITY_SELECT, &option.value).await?;
        settle(1000).await;
        session.wait_ready().await?;
        session.wait_for_selector(S::PRICE_ROWS).await?;
        session.wait_request_idle().await?;
        settle(1500).await;

        Ok(session
            .table_rows(S::PRICE_ROWS, "td")
            .await?
            .iter()
            .filter_map(|c| DistrictPrices::from_cells::<S>(c))
            .collect())
    }

    async fn scrape_group(&self, file: &str, options: &[SelectOption]) -> Result<PathBuf, ScraperError> {
        let session = self.driver.session()?;
        let mut rows = Vec::new();
        for (i, option) in options.iter().enumerate() {
            if i > 0 {
                between_cities(&self.driver.config).await;
            }
            if S::REOPEN_EACH_CITY {
                Self::open(session).await?;
            }
            let found = Self::scrape_option(session, option).await?;
            debug!("{}: {} row(s) for {}", S::NAME, found.len(), option.text);
            rows.extend(found);
        }
        let lines = render_rows::<S>(rows, options.len() > 1);
        if lines.is_empty() {
            return Err(ScraperError::NoPriceData(file.to_string()));
        }
        self.driver.save(S::PREFIX, file, &lines)
    }
}

#[async_trait]
impl<S: TableSite> PriceScraper for DistrictTableScraper<S> {
    fn brand(&self) -> &'static str {
        S::PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let options = Self::open(self.driver.session()?).await?;
        let groups = group_options::<S>(&options);
        let (file, members) = find_group(&groups, city, |o| o.text.as_str())
            .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        self.scrape_group(file, members).await
    }

    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let options = Self::open(self.driver.session()?).await?;
        let groups = group_options::<S>(&options);
        let names: Vec<String> = groups.iter().map(|(name, _)| name.clone()).collect();
        let this = &*self;
        let groups = &groups;
        Ok(scrape_each(S::PREFIX, &this.driver.config, &names, 1000, move |city| async move {
            let (_, members) = groups
                .iter()
                .find(|(name, _)| name == city)
                .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
            this.scrape_group(city, members).await
        })
        .await)
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.driver.stop().await
    }
}
