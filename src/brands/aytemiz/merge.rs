//! 燃料価格とLPG価格のマージ
//!
//! Aytemiz はイスタンブールのLPG価格を「İstanbul / Avrupa」「İstanbul / Anadolu」の2地域でしか
//! 公開していない。地区ごとの行には [`region_of`] で地域を引いて価格を割り当てる。
//! それ以外の都市は都市名と一致するキーの価格を全行に付ける。

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::districts::{is_region_label, region_of, Region};
use crate::text::{is_istanbul_variant, normalize_key};

use super::types::{AytemizFuelRow, LpgTable};

/// イスタンブールの地域別LPG価格
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IstanbulLpg {
    pub avrupa: Option<String>,
    pub anadolu: Option<String>,
}

impl IstanbulLpg {
    /// LPG表からイスタンブールの2地域分を取り出す
    pub fn from_table(lpg: &LpgTable) -> Self {
        let mut prices = Self::default();
        for (key, rows) in lpg.iter() {
            if !is_istanbul_variant(key) {
                continue;
            }
            let Some(price) = rows.first().map(|row| row.lpg.clone()) else {
                continue;
            };
            let normalized = normalize_key(key);
            if normalized.contains("avrupa") {
                prices.avrupa = Some(price);
            } else if normalized.contains("anadolu") {
                prices.anadolu = Some(price);
            } else {
                debug!("Istanbul LPG without region ignored: {} = {}", key, price);
            }
        }
        prices
    }

    pub fn price(&self, region: Region) -> Option<&str> {
        match region {
            Region::Avrupa => self.avrupa.as_deref(),
            Region::Anadolu => self.anadolu.as_deref(),
        }
    }
}

/// 1都市分の行にLPG価格を付ける
///
/// イスタンブールでは地区名が地域名そのもの（"Avrupa" / "Anadolu"）の行は表の見出しなので除外する。
/// 対応表にない地区はLPGなしのまま残す。
pub fn merge_lpg_for_city(
    city: &str,
    rows: &[AytemizFuelRow],
    lpg: &LpgTable,
) -> Vec<AytemizFuelRow> {
    if !is_istanbul_variant(city) {
        let price = lpg.city_price(city);
        if price.is_none() {
            debug!("No LPG price for {}", city);
        }
        return rows.iter().cloned().map(|row| row.with_lpg(price)).collect();
    }

    let regional = IstanbulLpg::from_table(lpg);
    if regional.avrupa.is_none() && regional.anadolu.is_none() {
        warn!("No Istanbul LPG prices found (Avrupa or Anadolu)");
    }

    let mut merged = Vec::with_capacity(rows.len());
    let mut matched = 0;
    let mut unmatched = Vec::new();

    for row in rows {
        let Some(district) = row.district.as_deref() else {
            merged.push(row.clone());
            continue;
        };
        if is_region_label(district) {
            debug!("Skipping region placeholder row: {}", district);
            continue;
        }
        match region_of(district) {
            Some(region) => {
                let price = regional.price(region);
                if price.is_some() {
                    matched += 1;
                }
                merged.push(row.clone().with_lpg(price));
            }
            None => {
                unmatched.push(district.to_string());
                merged.push(row.clone());
            }
        }
    }

    if !unmatched.is_empty() {
        warn!(
            "{} Istanbul district(s) not in region table: {:?}",
            unmatched.len(),
            unmatched
        );
    }
    debug!(
        "Applied Istanbul LPG to {} of {} row(s)",
        matched,
        merged.len()
    );
    merged
}

/// 都市名をキーにした全行へマージを適用する
pub fn merge_all(
    fuel: &BTreeMap<String, Vec<AytemizFuelRow>>,
    lpg: &LpgTable,
) -> BTreeMap<String, Vec<AytemizFuelRow>> {
    fuel.iter()
        .map(|(city, rows)| (city.clone(), merge_lpg_for_city(city, rows, lpg)))
        .collect()
}
