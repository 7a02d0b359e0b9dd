//! Enerji Petrol
//!
//! 過去価格ページで最新の日付を1回だけ選び、`select[name=sehir]` を切り替えて表を読む。
//! イスタンブール（表示名、または value 82 / 34）は `enerji_ISTANBUL` にまとめる。

use super::district_table::{DistrictTableScraper, TableSite};

pub struct Enerji;

impl TableSite for Enerji {
    const PREFIX: &'static str = "enerji";
    const NAME: &'static str = "Enerji";
    const URL: &'static str = "https://www.enerjipetrol.com/tr/past-prices/";
    const DATE_SELECT: &'static str = r#"select[name="tarih"]"#;
    const CITY_SELECT: &'static str = r#"select[name="sehir"]"#;
    const PRICE_ROWS: &'static str = "table.table-bordered tbody tr";
    const DISTRICT_COL: usize = 1;
    const LABELS: &'static [&'static str] = &[
        "Kurşunsuz Benzin 95 Oktan",
        "Motorin",
        "HighDizel",
        "Kalorifer Yakıtı",
        "Fuel Oil",
        "Yüksek Kükürtlü",
    ];
    const ISTANBUL_VALUES: &'static [&'static str] = &["82", "34"];
    const REOPEN_EACH_CITY: bool = false;
}

pub type EnerjiScraper = DistrictTableScraper<Enerji>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::SelectOption;
    use crate::brands::district_table::{file_key, DistrictPrices};
    use crate::config::ScraperConfig;
    use crate::traits::PriceScraper;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn option(value: &str, text: &str) -> SelectOption {
        SelectOption {
            value: value.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_row_uses_district_column() {
        let row = DistrictPrices::from_cells::<Enerji>(&cells(&[
            "ANKARA", "ÇANKAYA", "44,10", "45,20", "46,00", "", "", "28,10",
        ]))
        .unwrap();
        assert_eq!(row.district, "ÇANKAYA");
        assert_eq!(
            row.render::<Enerji>().unwrap(),
            "ÇANKAYA: Kurşunsuz Benzin 95 Oktan: 44.10, Motorin: 45.20, HighDizel: 46.00, Yüksek Kükürtlü: 28.10"
        );
    }

    #[test]
    fn test_header_rows_skipped() {
        let header = cells(&["Şehir", "İlçe", "Benzin", "Motorin", "", "", "", ""]);
        assert!(DistrictPrices::from_cells::<Enerji>(&header).is_none());
        let no_city = cells(&["", "ÇANKAYA", "44,10", "", "", "", "", ""]);
        assert!(DistrictPrices::from_cells::<Enerji>(&no_city).is_none());
    }

    #[test]
    fn test_istanbul_by_name_or_value() {
        assert_eq!(file_key::<Enerji>(&option("82", "Avrupa Yakası")), "ISTANBUL");
        assert_eq!(file_key::<Enerji>(&option("83", "İstanbul (Anadolu)")), "ISTANBUL");
        assert_eq!(file_key::<Enerji>(&option("46", "Kahramanmaraş")), "KAHRAMANMARAS");
        assert_eq!(file_key::<Enerji>(&option("3", "Afyon-Karahisar")), "AFYON_KARAHISAR");
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_enerji_live -- --ignored --nocapture
    async fn test_enerji_live() {
        let dir = std::env::temp_dir().join("fuel-enerji-live");
        let mut scraper = EnerjiScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::City("Ankara".into()))
            .await
            .expect("Enerji scrape failed");
        assert!(report.saved[0].ends_with("enerji_ANKARA_prices.txt"));
    }
}
