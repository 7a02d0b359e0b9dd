//! Aytemiz 関連の型定義

use std::collections::BTreeMap;

use serde::Serialize;

use crate::output::{or_dash, PriceLine};
use crate::text::{normalize_key, upper_ascii};

/// "City / District" を都市と地区に分ける（"/" がなければ地区なし）
pub fn split_location(text: &str) -> (String, Option<String>) {
    match text.split_once('/') {
        Some((city, _)) => {
            let district = text.rsplit('/').next().unwrap_or_default();
            (city.trim().to_string(), Some(district.trim().to_string()))
        }
        None => (text.trim().to_string(), None),
    }
}

/// 出力ファイル名の都市部分（"İstanbul / Avrupa" → "ISTANBUL"）
pub fn file_city(city: &str) -> String {
    let city = city.split(" / ").next().unwrap_or(city);
    upper_ascii(city)
}

fn non_empty(cell: Option<&String>) -> Option<String> {
    cell.map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// 燃料価格の1行（都市または地区）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AytemizFuelRow {
    pub city: String,
    /// 都市単位の行は None
    pub district: Option<String>,
    pub benzin_95: Option<String>,
    pub motorin: Option<String>,
    pub motorin_optimum: Option<String>,
    pub kalorifer_yakiti: Option<String>,
    pub fuel_oil: Option<String>,
    /// LPG表とのマージで設定
    pub lpg: Option<String>,
}

impl AytemizFuelRow {
    pub fn new(city: impl Into<String>, district: Option<&str>) -> Self {
        Self {
            city: city.into(),
            district: district.map(str::to_string),
            benzin_95: None,
            motorin: None,
            motorin_optimum: None,
            kalorifer_yakiti: None,
            fuel_oil: None,
            lpg: None,
        }
    }

    /// `#fuel-price-table` の行から変換する
    ///
    /// 1列目に "/" がない場合、選択中の都市名と違えばその都市の地区、同じなら都市単位の行とみなす。
    pub fn from_cells(cells: &[String], selected_city: Option<&str>) -> Option<Self> {
        if cells.len() < 6 {
            return None;
        }
        let label = cells[0].trim();
        if label.is_empty() {
            return None;
        }

        let (city, district) = if label.contains('/') {
            split_location(label)
        } else {
            match selected_city {
                Some(selected) if normalize_key(label) != normalize_key(selected) => {
                    (selected.trim().to_string(), Some(label.to_string()))
                }
                _ => (label.to_string(), None),
            }
        };

        Some(Self {
            city,
            district,
            benzin_95: non_empty(cells.get(1)),
            motorin: non_empty(cells.get(2)),
            motorin_optimum: non_empty(cells.get(3)),
            kalorifer_yakiti: non_empty(cells.get(4)),
            fuel_oil: non_empty(cells.get(5)),
            lpg: None,
        })
    }

    pub fn with_lpg(mut self, lpg: Option<&str>) -> Self {
        self.lpg = lpg.map(str::to_string);
        self
    }

    /// 地区名（なければ都市名）
    pub fn location(&self) -> &str {
        self.district.as_deref().unwrap_or(&self.city)
    }

    pub fn render(&self) -> String {
        PriceLine::new(upper_ascii(self.location()))
            .field("Benzin 95", or_dash(self.benzin_95.as_deref()))
            .field("Motorin", or_dash(self.motorin.as_deref()))
            .field("Motorin Optimum", or_dash(self.motorin_optimum.as_deref()))
            .field("Kalorifer Yakıtı", or_dash(self.kalorifer_yakiti.as_deref()))
            .field("Fuel Oil", or_dash(self.fuel_oil.as_deref()))
            .field("LPG", or_dash(self.lpg.as_deref()))
            .render()
    }
}

/// LPG価格の1行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AytemizLpgRow {
    pub city: String,
    pub district: Option<String>,
    pub lpg: String,
}

impl AytemizLpgRow {
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        if cells.len() < 2 {
            return None;
        }
        let label = cells[0].trim();
        let lpg = cells[1].trim();
        if label.is_empty() || lpg.is_empty() {
            return None;
        }
        let (city, district) = split_location(label);
        Some(Self {
            city,
            district,
            lpg: lpg.to_string(),
        })
    }

    /// 表のキー: "City / District" または "City"
    pub fn key(&self) -> String {
        match &self.district {
            Some(district) => format!("{} / {}", self.city, district),
            None => self.city.clone(),
        }
    }
}

/// "City / District" または "City" をキーにしたLPG表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LpgTable {
    entries: BTreeMap<String, Vec<AytemizLpgRow>>,
}

impl LpgTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, row: AytemizLpgRow) {
        self.entries.entry(row.key()).or_default().push(row);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = AytemizLpgRow>) {
        for row in rows {
            self.insert(row);
        }
    }

    /// キーの最初の行の価格
    pub fn price(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|rows| rows.first())
            .map(|row| row.lpg.as_str())
    }

    /// 完全一致を優先し、なければ大文字小文字・トルコ文字の差を無視して探す
    pub fn city_price(&self, city: &str) -> Option<&str> {
        let city = city.trim();
        self.price(city).or_else(|| {
            let wanted = normalize_key(city);
            self.entries
                .iter()
                .find(|(key, _)| normalize_key(key) == wanted)
                .and_then(|(_, rows)| rows.first())
                .map(|row| row.lpg.as_str())
        })
    }

    pub fn has_istanbul(&self) -> bool {
        self.entries
            .keys()
            .any(|key| normalize_key(key).contains("istanbul"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<AytemizLpgRow>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<AytemizLpgRow> for LpgTable {
    fn from_iter<I: IntoIterator<Item = AytemizLpgRow>>(iter: I) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_split_location() {
        assert_eq!(
            split_location("İstanbul / Kadıköy"),
            ("İstanbul".to_string(), Some("Kadıköy".to_string()))
        );
        assert_eq!(split_location(" Adana "), ("Adana".to_string(), None));
        assert_eq!(file_city("İstanbul / Avrupa"), "ISTANBUL");
        assert_eq!(file_city("Kırşehir"), "KIRSEHIR");
    }

    #[test]
    fn test_fuel_row_district_detection() {
        let slash = AytemizFuelRow::from_cells(
            &cells(&["İstanbul / Kadıköy", "44,1", "45,2", "46,3", "40", ""]),
            Some("İstanbul"),
        )
        .unwrap();
        assert_eq!(slash.city, "İstanbul");
        assert_eq!(slash.district.as_deref(), Some("Kadıköy"));
        assert_eq!(slash.fuel_oil, None);

        let district = AytemizFuelRow::from_cells(
            &cells(&["Seyhan", "44,1", "45,2", "46,3", "40", "30"]),
            Some("Adana"),
        )
        .unwrap();
        assert_eq!(district.city, "Adana");
        assert_eq!(district.district.as_deref(), Some("Seyhan"));

        let city = AytemizFuelRow::from_cells(
            &cells(&["ADANA", "44,1", "45,2", "46,3", "40", "30"]),
            Some("Adana"),
        )
        .unwrap();
        assert_eq!(city.district, None);

        assert!(AytemizFuelRow::from_cells(&cells(&["Adana", "1"]), None).is_none());
    }

    #[test]
    fn test_fuel_row_render_uses_dashes() {
        let row = AytemizFuelRow::from_cells(
            &cells(&["İstanbul / Üsküdar", "44,1", "45,2", "", "40", "30"]),
            None,
        )
        .unwrap()
        .with_lpg(Some("18,50"));
        assert_eq!(
            row.render(),
            "USKUDAR | Benzin 95: 44,1 | Motorin: 45,2 | Motorin Optimum: - | Kalorifer Yakıtı: 40 | Fuel Oil: 30 | LPG: 18,50"
        );
    }

    #[test]
    fn test_lpg_table_keys() {
        let table: LpgTable = [
            cells(&["İstanbul / Avrupa", "18,40"]),
            cells(&["İstanbul / Anadolu", "18,50"]),
            cells(&["Adana", "18,90"]),
            cells(&["Bursa", ""]),
        ]
        .iter()
        .filter_map(|c| AytemizLpgRow::from_cells(c))
        .collect();

        assert_eq!(table.len(), 3);
        assert_eq!(table.price("İstanbul / Anadolu"), Some("18,50"));
        assert_eq!(table.city_price("Adana"), Some("18,90"));
        assert_eq!(table.city_price("ADANA"), Some("18,90"));
        assert_eq!(table.city_price("Bursa"), None);
        assert!(table.has_istanbul());
    }
}
