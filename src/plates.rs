//! トルコの県ナンバー（プレートコード 01..81）と県名

use crate::text::normalize_key;

const PROVINCES: [&str; 81] = [
    "Adana", "Adıyaman", "Afyonkarahisar", "Ağrı", "Amasya", "Ankara", "Antalya", "Artvin",
    "Aydın", "Balıkesir", "Bilecik", "Bingöl", "Bitlis", "Bolu", "Burdur", "Bursa", "Çanakkale",
    "Çankırı", "Çorum", "Denizli", "Diyarbakır", "Edirne", "Elazığ", "Erzincan", "Erzurum",
    "Eskişehir", "Gaziantep", "Giresun", "Gümüşhane", "Hakkari", "Hatay", "Isparta", "Mersin",
    "İstanbul", "İzmir", "Kars", "Kastamonu", "Kayseri", "Kırklareli", "Kırşehir", "Kocaeli",
    "Konya", "Kütahya", "Malatya", "Manisa", "Kahramanmaraş", "Mardin", "Muğla", "Muş",
    "Nevşehir", "Niğde", "Ordu", "Rize", "Sakarya", "Samsun", "Siirt", "Sinop", "Sivas",
    "Tekirdağ", "Tokat", "Trabzon", "Tunceli", "Şanlıurfa", "Uşak", "Van", "Yozgat",
    "Zonguldak", "Aksaray", "Bayburt", "Karaman", "Kırıkkale", "Batman", "Şırnak", "Bartın",
    "Ardahan", "Iğdır", "Yalova", "Karabük", "Kilis", "Osmaniye", "Düzce",
];

/// "01".."81"
pub fn plate_codes() -> Vec<String> {
    (1..=PROVINCES.len()).map(|i| format!("{:02}", i)).collect()
}

pub fn province_name(code: &str) -> Option<&'static str> {
    let index: usize = code.trim().parse().ok()?;
    PROVINCES.get(index.checked_sub(1)?).copied()
}

/// 県名またはプレートコードからコードを引く
pub fn plate_code(name_or_code: &str) -> Option<String> {
    let trimmed = name_or_code.trim();
    if let Ok(n) = trimmed.parse::<usize>() {
        return (1..=PROVINCES.len())
            .contains(&n)
            .then(|| format!("{:02}", n));
    }
    let key = normalize_key(trimmed);
    let key = match key.as_str() {
        "icel" => "mersin".to_string(),
        "afyon" => "afyonkarahisar".to_string(),
        "k.maras" | "k. maras" | "maras" => "kahramanmaras".to_string(),
        _ => key,
    };
    PROVINCES
        .iter()
        .position(|p| normalize_key(p) == key)
        .map(|i| format!("{:02}", i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plate_codes() {
        let codes = plate_codes();
        assert_eq!(codes.len(), 81);
        assert_eq!(codes.first().map(String::as_str), Some("01"));
        assert_eq!(codes.last().map(String::as_str), Some("81"));
    }

    #[test]
    fn test_province_lookup() {
        assert_eq!(province_name("34"), Some("İstanbul"));
        assert_eq!(province_name("6"), Some("Ankara"));
        assert_eq!(province_name("00"), None);
        assert_eq!(province_name("82"), None);
        assert_eq!(province_name("xx"), None);
    }

    #[test]
    fn test_plate_code_from_name() {
        assert_eq!(plate_code("ISTANBUL").as_deref(), Some("34"));
        assert_eq!(plate_code("İçel").as_deref(), Some("33"));
        assert_eq!(plate_code("K.Maraş").as_deref(), Some("46"));
        assert_eq!(plate_code("7").as_deref(), Some("07"));
        assert_eq!(plate_code("99"), None);
        assert_eq!(plate_code("Atlantis"), None);
    }
}
