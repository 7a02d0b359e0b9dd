//! 7 Kıta Dağıtım
//!
//! 全都市が1つの wpDataTables 表に載っている。列の見出しは表記が揺れるので
//! ラベルに正規化してから読む。ページは1回だけ開く。

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::LabeledPrice;
use crate::report::ScrapeReport;
use crate::text::{collapse_whitespace, find_by_name, normalize_key, safe_filename, upper_ascii};
use crate::traits::PriceScraper;

use super::Driver;

const PREFIX: &str = "7kita";
const SEVEN_KITA_URL: &str = "https://7kitadagitim.com/index.php/utts/fiyat/";
const COOKIE_BUTTONS: &[&str] = &["#onetrust-accept-btn-handler"];
const CITY_LABEL: &str = "İl";
const DATE_LABEL: &str = "Tarih";

/// 出力で先頭に並べるラベル。それ以外は列の順に後ろへ続ける
const ORDER: [&str; 5] = ["Benzin", "Motorin", "LPG", "Kalorifer Yakıtı", "Fuel Oil"];

const TABLE_READY_JS: &str = r#"
(document.querySelectorAll('#table_1 tbody tr').length
    || document.querySelectorAll('table.wpDataTable tbody tr').length) > 0
"#;

/// `#table_1`（なければ wpDataTable のうち5行以上ある最初の表）の見出しと行
const READ_TABLE_JS: &str = r#"
(() => {
    let tables = Array.from(document.querySelectorAll('#table_1'));
    if (!tables.length) tables = Array.from(document.querySelectorAll('table.wpDataTable'));
    if (!tables.length) return null;
    const table = tables.find(t => t.querySelectorAll('tbody tr').length >= 5) || tables[0];
    const text = el => (el.innerText || el.textContent || '').replace(/\u00a0/g, ' ').trim();
    const head = table.querySelector('thead tr');
    return {
        headers: head ? Array.from(head.querySelectorAll('th, td')).map(text) : [],
        rows: Array.from(table.querySelectorAll('tbody tr'))
            .map(tr => Array.from(tr.querySelectorAll('td')).map(text)),
    };
})()
"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTable {
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

/// 見出しの表記揺れをラベルにまとめる。該当しなければ元の文字列
pub fn header_label(text: &str) -> String {
    let up = upper_ascii(text);
    let has = |needle: &str| up.contains(needle);
    let label = if has("BENZ") || has("KURSUNSUZ") {
        "Benzin"
    } else if has("BIYODIZEL") || has("IHTIVA EDEN MOTORIN") {
        "Motorin (Biyodizel)"
    } else if has("MOTOR") || has("DIESEL") || has("DIZEL") {
        "Motorin"
    } else if has("LPG") || has("OTOGAZ") {
        "LPG"
    } else if has("KALORIFER") || has("KAL-YAK") || has("KALYAK") {
        "Kalorifer Yakıtı"
    } else if has("FUEL") {
        "Fuel Oil"
    } else if has("TARIH") {
        DATE_LABEL
    } else if has("ILCE") {
        "İlçe"
    } else if has("IL") || has("SEHIR") {
        CITY_LABEL
    } else {
        return text.trim().to_string();
    };
    label.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityRow {
    pub city: String,
    /// (ラベル, 値) を列の順に。同じラベルが2回出たら後の値で上書き
    pub values: Vec<(String, String)>,
}

impl CityRow {
    fn set(&mut self, label: String, value: String) {
        match self.values.iter_mut().find(|(l, _)| *l == label) {
            Some(slot) => slot.1 = value,
            None => self.values.push((label, value)),
        }
    }

    /// 1行目は都市名、2行目は `Benzin: v | Motorin: v | ...`
    pub fn lines(&self) -> Vec<String> {
        let ordered = ORDER
            .iter()
            .filter_map(|key| self.values.iter().find(|(label, _)| label == key));
        let rest = self
            .values
            .iter()
            .filter(|(label, _)| !ORDER.contains(&label.as_str()));
        let parts: Vec<String> = ordered
            .chain(rest)
            .map(|(label, value)| LabeledPrice::new(label.as_str(), value.as_str()).render())
            .collect();

        let mut lines = vec![self.city.clone()];
        if !parts.is_empty() {
            lines.push(parts.join(" | "));
        }
        lines
    }
}

/// 見出しから都市列を決め、行を都市ごとの値にする。日付列は捨てる
pub fn parse_table(table: &RawTable) -> Vec<CityRow> {
    let labels: Vec<String> = table.headers.iter().map(|h| header_label(h)).collect();
    let city_idx = labels.iter().position(|l| l == CITY_LABEL).unwrap_or(0);

    let mut rows = Vec::new();
    for cells in &table.rows {
        let Some(city) = cells.get(city_idx).map(|c| collapse_whitespace(c)) else {
            continue;
        };
        if city.is_empty() || normalize_key(&city) == "il" {
            continue;
        }
        let mut row = CityRow {
            city,
            values: Vec::new(),
        };
        for (i, cell) in cells.iter().enumerate() {
            if i == city_idx {
                continue;
            }
            let label = labels.get(i).cloned().unwrap_or_else(|| format!("C{}", i));
            let value = cell.trim();
            if label.is_empty() || label == DATE_LABEL || value.is_empty() {
                continue;
            }
            row.set(label, value.to_string());
        }
        rows.push(row);
    }
    rows
}

pub struct SevenKitaScraper {
    driver: Driver,
}

impl SevenKitaScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            driver: Driver::new(config),
        }
    }

    async fn load_rows(&self) -> Result<Vec<CityRow>, ScraperError> {
        let session = self.driver.session()?;
        session.goto(SEVEN_KITA_URL).await?;
        session.wait_request_idle().await?;
        session.accept_cookies(COOKIE_BUTTONS).await;
        session.wait_until(TABLE_READY_JS, "7 Kıta price table").await?;

        let table: Option<RawTable> = session.eval(READ_TABLE_JS).await?;
        let table = table.ok_or_else(|| ScraperError::ElementNotFound("#table_1".to_string()))?;
        let rows = parse_table(&table);
        debug!("7 Kıta: {} city row(s)", rows.len());
        if rows.is_empty() {
            return Err(ScraperError::NoPriceData("7 Kıta table".to_string()));
        }
        Ok(rows)
    }

    fn save(&self, row: &CityRow) -> Result<PathBuf, ScraperError> {
        self.driver
            .save(PREFIX, &safe_filename(&row.city), &row.lines())
    }
}

#[async_trait]
impl PriceScraper for SevenKitaScraper {
    fn brand(&self) -> &'static str {
        PREFIX
    }

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.driver.start().await
    }

    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError> {
        let rows = self.load_rows().await?;
        let row = find_by_name(&rows, city, |r| r.city.as_str())
            .ok_or_else(|| ScraperError::CityNotFound(city.to_string()))?;
        self.save(row)
    }

    /// 表は1回で読めるので、都市間の待機やリトライはしない
    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError> {
        let rows = self.load_rows().await?;
        let mut report = ScrapeReport::new(PREFIX);
        for row in &rows {
            match self.save(row) {
                Ok(path) => report.saved(path),
                Err(e) => {
                    warn!("Skipped {} {}: {}", PREFIX, row.city, e);
                    report.skip(row.city.as_str(), e);
                }
            }
        }
        Ok(report.finish())
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.driver.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_header_label() {
        assert_eq!(header_label("KURŞUNSUZ BENZİN 95"), "Benzin");
        assert_eq!(header_label("Biyodizel İhtiva Eden Motorin"), "Motorin (Biyodizel)");
        assert_eq!(header_label("Motorin"), "Motorin");
        assert_eq!(header_label("Otogaz"), "LPG");
        assert_eq!(header_label("Kal-Yak"), "Kalorifer Yakıtı");
        assert_eq!(header_label("Fuel Oil 6"), "Fuel Oil");
        assert_eq!(header_label("Tarih"), "Tarih");
        assert_eq!(header_label("İlçe"), "İlçe");
        assert_eq!(header_label("İL"), "İl");
        assert_eq!(header_label(" Kod "), "Kod");
    }

    #[test]
    fn test_parse_table_orders_labels() {
        let table = RawTable {
            headers: strings(&["Tarih", "İl", "Motorin", "Benzin", "Biyodizel Motorin", "LPG"]),
            rows: vec![
                strings(&["01.10.2026", "ADANA", "45,20", "44,10", "45,90", "18,90"]),
                strings(&["01.10.2026", "İL", "", "", "", ""]),
                strings(&["01.10.2026", "ANKARA", "45,30", "", "", "19,00"]),
            ],
        };
        let rows = parse_table(&table);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].lines(),
            vec![
                "ADANA",
                "Benzin: 44,10 | Motorin: 45,20 | LPG: 18,90 | Motorin (Biyodizel): 45,90",
            ]
        );
        assert_eq!(rows[1].lines(), vec!["ANKARA", "Motorin: 45,30 | LPG: 19,00"]);
    }

    #[test]
    fn test_city_column_defaults_to_first() {
        let table = RawTable {
            headers: Vec::new(),
            rows: vec![strings(&["Van", "44,50"]), strings(&[])],
        };
        let rows = parse_table(&table);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].lines(), vec!["Van", "C1: 44,50"]);
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_seven_kita_live -- --ignored --nocapture
    async fn test_seven_kita_live() {
        let dir = std::env::temp_dir().join("fuel-7kita-live");
        let mut scraper = SevenKitaScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::All)
            .await
            .expect("7 Kıta scrape failed");
        assert!(!report.saved.is_empty());
    }
}
