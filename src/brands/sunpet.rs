//! Sunpet
//!
//! 都市の選択肢（Choices.js）はそれぞれ都市ページのURLを持っているので、
//! 選択操作はせずに直接そのURLを開いて `table.primary-table` を読む。
//! イスタンブールのアナドル側・ヨーロッパ側は `sunpet_ISTANBUL` に続けて書く。

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::browser::BrowserSession;
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::colon_line;
use crate::pacing::{between_cities, settle};
use crate::report::ScrapeReport;
use crate::text::{ascii_file_name, collapse_whitespace, is_istanbul_variant, upper_ascii};
use crate::traits::PriceScraper;

use super::{find_group, group_in_order, scrape_each, Driver};

const PREFIX: &str = "sunpet";
const SUNPET_URL: &str = "https://www.sunpettr.com.tr/yakit-fiyatlari";
const COOKIE_BUTTONS: &[&str] = &["#cookieModal button.btn-apply-all"];
const PRICE_TABLE: &str = "table.primary-table";
const ISTANBUL: &str = "ISTANBUL";

const LABELS: [&str; 6] = [
    "Kurşunsuz Benzin 95",
    "Motorin",
    "Gazyağı",
    "Fuel Oil",
    "Yuksek Kukurtlu Fuel Oil",
    "Kalorifer Yakıtı",
];

/// 都市ページのURLを持つ選択肢。Choices.js の項目がなければ元の select から読む
const LIST_CITIES_JS: &str = r#"
(() => {
    const valid = (text, value) => text && value && value.startsWith('http') && text !== 'İl Seçiniz';
    const found = [];
    for (const el of document.querySelectorAll('.choices__item')) {
        const text = (el.innerText || el.textContent || '').trim();
        const value = el.getAttribute('data-value') || '';
        if (valid(text, value)) found.push({ text, url: value });
    }
    if (!found.length) {
        const select = document.querySelector('select.choices__input');
        for (const opt of (select ? select.options : [])) {
            const text = (opt.textContent || '').trim();
            const value = opt.value || opt.getAttribute('data-value') || '';
            if (valid(text, value)) found.push({ text, url: value });
        }
    }
    return found;
})()
"#;

/// 各行の地区名と、3〜8列目の `span b` の中身
const READ_ROWS_JS: &str = r#"
Array.from(document.querySelectorAll('table.primary-table tbody tr')).map(tr => {
    const cells = Array.from(tr.querySelectorAll('td'));
    return {
        district: cells.length ? (cells[0].innerText || cells[0].textContent || '').trim() : '',
        cells: cells.length,
        prices: cells.slice(2, 8).map(td => {
            const b = td.querySelector('span b');
            return b ? (b.innerText || b.textContent || '').trim() : '';
        }),
    };
})
"#;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CityLink {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub cells: usize,
    #[serde(default)]
    pub prices: Vec<String>,
}

/// 数字と区切り以外を除き、カンマは小数点にする
pub fn clean_price(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect::<String>()
        .replace(',', ".")
}

/// 8列に満たない行と地区名のない行は捨てる
pub fn render_rows(rows: &[RawRow]) -> Vec<String> {
    rows.iter()
        .filter(|r| r.cells >= 8 && !r.district.trim().is_empty())
        .filter_map(|r| {
            let prices: Vec<String> = r.prices.iter().map(|p| clean_price(p)).collect();
            colon_line(r.district.trim(), &LABELS, &prices)
        })
        .collect()
}

/// 表示名（空白を詰めた大文字）が同じ選択肢は最初の1つだけ残す
pub fn unique_cities(links: Vec<CityLink>) -> Vec<CityLink> {
    let mut seen = std::collections::HashSet::new();
    links
        .into_iter()
        .filter(|l| seen.insert(upper_ascii(&collapse_whitespace(&l.text))))
        .collect()
}

pub fn file_city(text: &str) -> String {
    if is_istanbul_variant(text) {
        ISTANBUL.to_string()
    } else {
        ascii_file_name(text)
    }
}

pub struct SunpetScraper {
    driver: Driver,
}

impl SunpetScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    async fn city_groups(&self) -> Result<Vec<(String, Vec<CityLink>)>, ScraperError> {
        let session = self.driver.session()?;
        session.goto(SUNPET_URL).await?;
        session.wait_request_idle().await?;
        session.accept_cookies(COOKIE_BUTTONS).await;

        let links: Vec<CityLink> = session.eval(LIST_CITIES_JS).await?;
        let links = unique_cities(links);
        debug!("Sunpet: {} cities", links.len());
        if links.is_empty() {
            return Err(ScraperError::ElementNotFound("Sunpet city list".to_string()));
        }
        Ok(group_in_order(&links, |l| file_city(&l.text)))
    }

    async fn read_city(session: &BrowserSession, link: &CityLink) -> Result<Vec<String>, ScraperError> {
        session.goto(&link.url).await?;
        settle(2000).await;
        session.wait_request_idle().await?;
        session.accept_cookies(COOKIE_BUTTONS).await;
        session.wait_for_selector(PRICE_TABLE).await?;
        settle(1000).await;

        let rows: Vec<RawRow> = session.eval(READ_ROWS_JS).await?;
        Ok(render_rows(&rows))
    }

    async fn scrape_group(&self, file: &str, links: &[CityLink]) -> Result<PathBuf, ScraperError> {
        let session = self.driver.session()?;
        let mut lines = Vec::new();
        for (i, link) in links.iter().enumerate() {
            if i > 0 {
                between_cities(&self.driver.config).await;
            }
            let found = Self::read_city(session, link).await?;
            debug!("Sunpet: {} district(s) for {}", found.len(), link.text);
            lines.extend(found);
        }
        if lines.is_empty() {
            return Err(ScraperError::NoPriceData(file.to_string()));
        }
        self.driver.save(PREFIX, file, &lines)
    }
}

#[async_trait]
impl PriceScraper for SunpetScraper {
    fn brand(&self) -> &'static str {
        PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let groups = self.city_groups().await?;
        let (file, links) = find_group(&groups, city, |l| l.text.as_str())
            .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        self.scrape_group(file, links).await
    }

    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let groups = self.city_groups().await?;
        let names: Vec<String> = groups.iter().map(|(name, _)| name.clone()).collect();
        let this = &*self;
        let groups = &groups;
        Ok(scrape_each(PREFIX, &this.driver.config, &names, 1000, move |city| async move {
            let (_, links) = groups
                .iter()
                .find(|(name, _)| name == city)
                .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
            this.scrape_group(city, links).await
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

    fn link(text: &str, url: &str) -> CityLink {
        CityLink {
            text: text.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_clean_price() {
        assert_eq!(clean_price("44,10 TL"), "44.10");
        assert_eq!(clean_price("₺ 45.20"), "45.20");
        assert_eq!(clean_price("-"), "");
    }

    #[test]
    fn test_render_rows() {
        let rows: Vec<RawRow> = serde_json::from_str(
            r#"[
                {"district":"SEYHAN","cells":8,"prices":["44,10 TL","45,20 TL","","","",""]},
                {"district":"","cells":8,"prices":["1","2","3","4","5","6"]},
                {"district":"CEYHAN","cells":5,"prices":["44,10"]},
                {"district":"KOZAN","cells":8,"prices":["","","","","",""]}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            render_rows(&rows),
            vec!["SEYHAN: Kurşunsuz Benzin 95: 44.10, Motorin: 45.20"]
        );
    }

    #[test]
    fn test_cities_deduplicated_and_istanbul_grouped() {
        let links = unique_cities(vec![
            link("İstanbul Anadolu", "https://x/ia"),
            link("Adana", "https://x/adana"),
            link("ADANA ", "https://x/adana2"),
            link("İstanbul Avrupa", "https://x/iv"),
        ]);
        assert_eq!(links.len(), 3);
        let groups = group_in_order(&links, |l| file_city(&l.text));
        let names: Vec<&str> = groups.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["ISTANBUL", "ADANA"]);
        assert_eq!(groups[0].1[1].url, "https://x/iv");
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_sunpet_live -- --ignored --nocapture
    async fn test_sunpet_live() {
        let dir = std::env::temp_dir().join("fuel-sunpet-live");
        let mut scraper = SunpetScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::City("Adana".into()))
            .await
            .expect("Sunpet scrape failed");
        assert!(report.saved[0].ends_with("sunpet_ADANA_prices.txt"));
    }
}
