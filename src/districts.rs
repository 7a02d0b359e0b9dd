//! イスタンブール 地区 → 地域（Avrupa / Anadolu）対応表
//!
//! 一部ブランドはイスタンブールのLPG価格を2地域（ヨーロッパ側・アジア側）でしか
//! 公開していないため、この表で各地区に地域価格を割り当てる。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::text::normalize_key;

/// イスタンブールの地域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    /// ヨーロッパ側
    Avrupa,
    /// アジア側
    Anadolu,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Avrupa => "Avrupa",
            Region::Anadolu => "Anadolu",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_key(s).as_str() {
            "avrupa" => Ok(Region::Avrupa),
            "anadolu" => Ok(Region::Anadolu),
            _ => Err(format!("unknown region: {}", s)),
        }
    }
}

/// 地区名（"İstanbul /" プレフィックスなし）と地域
pub const ISTANBUL_DISTRICT_REGIONS: &[(&str, Region)] = &[
    ("Arnavutköy", Region::Avrupa),
    ("Avcılar", Region::Avrupa),
    ("Bağcılar", Region::Avrupa),
    ("Bahçelievler", Region::Avrupa),
    ("Bakırköy", Region::Avrupa),
    ("Başakşehir", Region::Avrupa),
    ("Bayrampaşa", Region::Avrupa),
    ("Beşiktaş", Region::Avrupa),
    ("Beylikdüzü", Region::Avrupa),
    ("Beyoğlu", Region::Avrupa),
    ("Büyükçekmece", Region::Avrupa),
    ("Çatalca", Region::Avrupa),
    ("Esenler", Region::Avrupa),
    ("Esenyurt", Region::Avrupa),
    // Eyüpsultanの旧称
    ("Eyüp", Region::Avrupa),
    ("Eyüpsultan", Region::Avrupa),
    // 2009年にFatihへ統合済みだが、まだ掲載するサイトがある
    ("Eminönü", Region::Avrupa),
    ("Fatih", Region::Avrupa),
    ("Gaziosmanpaşa", Region::Avrupa),
    ("Güngören", Region::Avrupa),
    ("Kağıthane", Region::Avrupa),
    ("Küçükçekmece", Region::Avrupa),
    ("Sarıyer", Region::Avrupa),
    ("Silivri", Region::Avrupa),
    ("Şişli", Region::Avrupa),
    ("Sultangazi", Region::Avrupa),
    ("Zeytinburnu", Region::Avrupa),
    ("Adalar", Region::Anadolu),
    ("Ataşehir", Region::Anadolu),
    ("Beykoz", Region::Anadolu),
    ("Çekmeköy", Region::Anadolu),
    ("Kadıköy", Region::Anadolu),
    ("Kartal", Region::Anadolu),
    ("Maltepe", Region::Anadolu),
    ("Pendik", Region::Anadolu),
    ("Sancaktepe", Region::Anadolu),
    ("Sultanbeyli", Region::Anadolu),
    ("Şile", Region::Anadolu),
    ("Tuzla", Region::Anadolu),
    ("Ümraniye", Region::Anadolu),
    ("Üsküdar", Region::Anadolu),
];

static REGION_BY_KEY: LazyLock<HashMap<String, Region>> = LazyLock::new(|| {
    ISTANBUL_DISTRICT_REGIONS
        .iter()
        .map(|(name, region)| (normalize_key(name), *region))
        .collect()
});

/// 地区名から地域を引く（空白・大文字小文字・トルコ文字の差は無視、あいまい一致はしない）
pub fn region_of(district: &str) -> Option<Region> {
    REGION_BY_KEY.get(&normalize_key(district)).copied()
}

/// 地区名ではなく地域名そのもの（"Avrupa" / "Anadolu"）か
pub fn is_region_label(name: &str) -> bool {
    name.parse::<Region>().is_ok()
}

pub fn districts_in(region: Region) -> Vec<&'static str> {
    ISTANBUL_DISTRICT_REGIONS
        .iter()
        .filter(|(_, r)| *r == region)
        .map(|(name, _)| *name)
        .collect()
}

pub fn avrupa_districts() -> Vec<&'static str> {
    districts_in(Region::Avrupa)
}

pub fn anadolu_districts() -> Vec<&'static str> {
    districts_in(Region::Anadolu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_districts() {
        assert_eq!(region_of("Kadıköy"), Some(Region::Anadolu));
        assert_eq!(region_of("Beşiktaş"), Some(Region::Avrupa));
        assert_eq!(region_of("Eyüp"), Some(Region::Avrupa));
        assert_eq!(region_of("Üsküdar"), Some(Region::Anadolu));
    }

    #[test]
    fn test_normalized_variants_resolve_to_same_region() {
        let variants = [
            "Kadıköy",
            "KADIKÖY",
            "kadikoy",
            "  Kadıköy  ",
            "KADIKOY",
            "Kadıköy\n",
        ];
        for v in variants {
            assert_eq!(region_of(v), Some(Region::Anadolu), "variant {:?}", v);
        }

        let spaced = ["Gazi osmanpaşa", "Gaziosmanpaşa", "GAZİOSMANPAŞA"];
        assert_eq!(region_of(spaced[0]), None);
        assert_eq!(region_of(spaced[1]), Some(Region::Avrupa));
        assert_eq!(region_of(spaced[2]), Some(Region::Avrupa));
    }

    #[test]
    fn test_unknown_district_is_none() {
        assert_eq!(region_of("Çankaya"), None);
        assert_eq!(region_of(""), None);
        assert_eq!(region_of("Kadı"), None);
    }

    #[test]
    fn test_each_district_has_one_region() {
        let mut seen = std::collections::HashSet::new();
        for (name, _) in ISTANBUL_DISTRICT_REGIONS {
            assert!(seen.insert(normalize_key(name)), "duplicate {}", name);
        }
        assert_eq!(REGION_BY_KEY.len(), ISTANBUL_DISTRICT_REGIONS.len());
    }

    #[test]
    fn test_region_lists() {
        let avrupa = avrupa_districts();
        let anadolu = anadolu_districts();
        assert_eq!(avrupa.len(), 27);
        assert_eq!(anadolu.len(), 14);
        assert!(avrupa.contains(&"Fatih"));
        assert!(anadolu.contains(&"Tuzla"));
    }

    #[test]
    fn test_region_labels() {
        assert!(is_region_label("Avrupa"));
        assert!(is_region_label(" ANADOLU "));
        assert!(!is_region_label("Kadıköy"));
        assert_eq!("avrupa".parse::<Region>(), Ok(Region::Avrupa));
        assert_eq!(Region::Anadolu.to_string(), "Anadolu");
    }
}
