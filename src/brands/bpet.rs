//! BPET
//!
//! 最新の日付と `select[name=il]` を選ぶとフォームが送信され、地区別の表が出る。
//! 「ISTANBUL_TRA」「ISTANBUL_ANA」は `bpet_ISTANBUL` にまとめる。都市ごとにページを開き直す。

use super::district_table::{DistrictTableScraper, TableSite};

pub struct Bpet;

impl TableSite for Bpet {
    const PREFIX: &'static str = "bpet";
    const NAME: &'static str = "BPET";
    const URL: &'static str = "https://www.bpet.com.tr/tr/akaryakit-fiyatlari";
    const DATE_SELECT: &'static str = r#"select[name="tarih"]"#;
    const CITY_SELECT: &'static str = r#"select[name="il"]"#;
    const PRICE_ROWS: &'static str = "table.table-striped tbody tr";
    const DISTRICT_COL: usize = 0;
    const LABELS: &'static [&'static str] =
        &["Motorin", "Motorin Diğer", "K.B. 95", "Gaz Yağı", "F.Oil", "Kalyak"];
    const REOPEN_EACH_CITY: bool = true;
}

pub type BpetScraper = DistrictTableScraper<Bpet>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::SelectOption;
    use crate::brands::district_table::{group_options, render_rows, DistrictPrices};
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
    fn test_row_parse_and_render() {
        let row = DistrictPrices::from_cells::<Bpet>(&cells(&[
            "SEYHAN", "45,20 TL", "-", "44,10", "", "30.05", "29,90",
        ]))
        .unwrap();
        assert_eq!(
            row.render::<Bpet>().unwrap(),
            "SEYHAN: Motorin: 45.20, K.B. 95: 44.10, F.Oil: 30.05, Kalyak: 29.90"
        );
    }

    #[test]
    fn test_header_and_short_rows_skipped() {
        assert!(DistrictPrices::from_cells::<Bpet>(&cells(&[
            "İLÇE", "Motorin", "", "", "", "", ""
        ]))
        .is_none());
        assert!(DistrictPrices::from_cells::<Bpet>(&cells(&["SEYHAN", "45,20"])).is_none());
        assert!(DistrictPrices::from_cells::<Bpet>(&cells(&[
            "SEYHAN", "-", "-", "-", "-", "-", "-"
        ]))
        .is_none());
    }

    #[test]
    fn test_istanbul_options_merged_and_deduplicated() {
        let groups = group_options::<Bpet>(&[
            option("1", "ADANA"),
            option("34", "ISTANBUL_TRA"),
            option("46", "KAHRAMANMARAŞ"),
            option("35", "ISTANBUL_ANA"),
        ]);
        let names: Vec<&str> = groups.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["ADANA", "ISTANBUL", "KAHRAMANMARAS"]);
        assert_eq!(groups[1].1.len(), 2);

        let rows = vec![
            DistrictPrices::from_cells::<Bpet>(&cells(&["ŞİŞLİ", "45,20", "", "", "", "", ""])).unwrap(),
            DistrictPrices::from_cells::<Bpet>(&cells(&["Şişli", "45,30", "", "", "", "", ""])).unwrap(),
            DistrictPrices::from_cells::<Bpet>(&cells(&["KADIKÖY", "45,40", "", "", "", "", ""])).unwrap(),
        ];
        assert_eq!(
            render_rows::<Bpet>(rows, true),
            vec!["ŞİŞLİ: Motorin: 45.20", "KADIKÖY: Motorin: 45.40"]
        );
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_bpet_live -- --ignored --nocapture
    async fn test_bpet_live() {
        let dir = std::env::temp_dir().join("fuel-bpet-live");
        let mut scraper = BpetScraper::new(ScraperConfig::new(&dir));
        let report = scraper
            .execute(&crate::traits::ScrapeTarget::City("Adana".into()))
            .await
            .expect("BPET scrape failed");
        assert!(report.saved[0].ends_with("bpet_ADANA_prices.txt"));
    }
}
