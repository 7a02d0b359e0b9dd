//! ブランド別スクレイパー
//!
//! 各ブランドはサイト固有のセレクタ・待機・正規化を持ち、共通部分は
//! [`Driver`]（ブラウザセッションと出力先）だけを共有する。

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::browser::BrowserSession;
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::output::{price_file, write_lines};
use crate::pacing::{between_cities, with_retries};
use crate::report::ScrapeReport;
use crate::text::find_by_name;
use crate::traits::PriceScraper;

pub mod alpet;
pub mod aygaz;
pub mod aytemiz;
pub mod bpet;
pub mod district_table;
pub mod enerji;
pub mod hpyco;
pub mod ipragaz;
pub mod kadoil;
pub mod lukoil;
pub mod milangaz;
pub mod moil;
pub mod opet;
pub mod parkoil;
pub mod petral;
pub mod petrolofisi;
pub mod qplus;
pub mod rpet;
pub mod sahoil;
pub mod seven_kita;
pub mod shell;
pub mod sunpet;
pub mod termo;
pub mod total;
pub mod tppd;

pub use alpet::AlpetScraper;
pub use aygaz::AygazScraper;
pub use aytemiz::AytemizScraper;
pub use bpet::BpetScraper;
pub use enerji::EnerjiScraper;
pub use hpyco::HypcoScraper;
pub use ipragaz::IpragazScraper;
pub use kadoil::KadoilScraper;
pub use lukoil::LukoilScraper;
pub use milangaz::MilangazScraper;
pub use moil::MoilScraper;
pub use opet::OpetScraper;
pub use parkoil::ParkoilScraper;
pub use petral::PetralScraper;
pub use petrolofisi::PetrolOfisiScraper;
pub use qplus::QplusScraper;
pub use rpet::RpetScraper;
pub use sahoil::SahoilScraper;
pub use seven_kita::SevenKitaScraper;
pub use shell::ShellScraper;
pub use sunpet::SunpetScraper;
pub use termo::TermoScraper;
pub use total::TotalScraper;
pub use tppd::TppdScraper;

/// 対応ブランド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Brand {
    Shell,
    Opet,
    PetrolOfisi,
    Tppd,
    Aytemiz,
    Total,
    Alpet,
    Lukoil,
    Moil,
    Aygaz,
    Rpet,
    Petral,
    SevenKita,
    Bpet,
    Enerji,
    Hpyco,
    Ipragaz,
    Kadoil,
    Milangaz,
    Parkoil,
    Qplus,
    Sahoil,
    Sunpet,
    Termo,
}

impl Brand {
    pub const ALL: [Brand; 24] = [
        Brand::Shell,
        Brand::Opet,
        Brand::PetrolOfisi,
        Brand::Tppd,
        Brand::Aytemiz,
        Brand::Total,
        Brand::Alpet,
        Brand::Lukoil,
        Brand::Moil,
        Brand::Aygaz,
        Brand::Rpet,
        Brand::Petral,
        Brand::SevenKita,
        Brand::Bpet,
        Brand::Enerji,
        Brand::Hpyco,
        Brand::Ipragaz,
        Brand::Kadoil,
        Brand::Milangaz,
        Brand::Parkoil,
        Brand::Qplus,
        Brand::Sahoil,
        Brand::Sunpet,
        Brand::Termo,
    ];

    /// 出力ファイル名のプレフィックス
    pub fn prefix(&self) -> &'static str {
        match self {
            Brand::Shell => "shell",
            Brand::Opet => "opet",
            Brand::PetrolOfisi => "petrolofisi",
            Brand::Tppd => "tppd",
            Brand::Aytemiz => "aytemiz",
            Brand::Total => "total",
            Brand::Alpet => "alpet",
            Brand::Lukoil => "lukoil",
            Brand::Moil => "moil",
            Brand::Aygaz => "aygaz",
            Brand::Rpet => "rpet",
            Brand::Petral => "petral",
            Brand::SevenKita => "7kita",
            Brand::Bpet => "bpet",
            Brand::Enerji => "enerji",
            Brand::Hpyco => "hpyco",
            Brand::Ipragaz => "ipragaz",
            Brand::Kadoil => "kadoil",
            Brand::Milangaz => "milangaz",
            Brand::Parkoil => "parkoil",
            Brand::Qplus => "qplus",
            Brand::Sahoil => "sahoil",
            Brand::Sunpet => "sunpet",
            Brand::Termo => "termo",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Brand::Shell => "Shell",
            Brand::Opet => "Opet",
            Brand::PetrolOfisi => "Petrol Ofisi",
            Brand::Tppd => "Türkiye Petrolleri",
            Brand::Aytemiz => "Aytemiz",
            Brand::Total => "Total (Güzel Enerji)",
            Brand::Alpet => "Alpet",
            Brand::Lukoil => "Lukoil",
            Brand::Moil => "Moil",
            Brand::Aygaz => "Aygaz Otogaz",
            Brand::Rpet => "Rpet",
            Brand::Petral => "Petral",
            Brand::SevenKita => "7 Kıta",
            Brand::Bpet => "Bpet",
            Brand::Enerji => "Enerji Petrol",
            Brand::Hpyco => "Hypco",
            Brand::Ipragaz => "İpragaz",
            Brand::Kadoil => "Kadoil",
            Brand::Milangaz => "Milangaz",
            Brand::Parkoil => "Parkoil",
            Brand::Qplus => "Qplus",
            Brand::Sahoil => "Şahoil",
            Brand::Sunpet => "Sunpet",
            Brand::Termo => "Termopet",
        }
    }

    /// サイトごとの都市間待機とリトライ回数
    pub fn pacing(&self) -> (Duration, Duration, u32) {
        let (min, max, retries) = match self {
            Brand::Shell => (600, 1400, 1),
            Brand::Opet => (600, 1200, 1),
            Brand::PetrolOfisi => (800, 1600, 2),
            Brand::Tppd | Brand::Alpet => (800, 1600, 1),
            Brand::Aytemiz | Brand::Total | Brand::Petral => (500, 1500, 1),
            Brand::Lukoil | Brand::Aygaz => (1000, 2500, 1),
            Brand::Moil => (300, 1000, 1),
            Brand::Rpet | Brand::SevenKita | Brand::Qplus => (500, 1100, 1),
            Brand::Hpyco | Brand::Sahoil | Brand::Parkoil => (600, 1200, 1),
            Brand::Bpet
            | Brand::Enerji
            | Brand::Ipragaz
            | Brand::Kadoil
            | Brand::Milangaz
            | Brand::Sunpet => (800, 1600, 1),
            Brand::Termo => (1000, 2000, 1),
        };
        (
            Duration::from_millis(min),
            Duration::from_millis(max),
            retries,
        )
    }

    /// ブランドの待機・リトライ既定値を適用した設定
    pub fn tune(&self, config: ScraperConfig) -> ScraperConfig {
        let (min, max, retries) = self.pacing();
        config.with_delays(min, max).with_retries(retries)
    }

    pub fn scraper(&self, config: ScraperConfig) -> Box<dyn PriceScraper> {
        match self {
            Brand::Shell => Box::new(ShellScraper::new(config)),
            Brand::Opet => Box::new(OpetScraper::new(config)),
            Brand::PetrolOfisi => Box::new(PetrolOfisiScraper::new(config)),
            Brand::Tppd => Box::new(TppdScraper::new(config)),
            Brand::Aytemiz => Box::new(AytemizScraper::new(config)),
            Brand::Total => Box::new(TotalScraper::new(config)),
            Brand::Alpet => Box::new(AlpetScraper::new(config)),
            Brand::Lukoil => Box::new(LukoilScraper::new(config)),
            Brand::Moil => Box::new(MoilScraper::new(config)),
            Brand::Aygaz => Box::new(AygazScraper::new(config)),
            Brand::Rpet => Box::new(RpetScraper::new(config)),
            Brand::Petral => Box::new(PetralScraper::new(config)),
            Brand::SevenKita => Box::new(SevenKitaScraper::new(config)),
            Brand::Bpet => Box::new(BpetScraper::new(config)),
            Brand::Enerji => Box::new(EnerjiScraper::new(config)),
            Brand::Hpyco => Box::new(HypcoScraper::new(config)),
            Brand::Ipragaz => Box::new(IpragazScraper::new(config)),
            Brand::Kadoil => Box::new(KadoilScraper::new(config)),
            Brand::Milangaz => Box::new(MilangazScraper::new(config)),
            Brand::Parkoil => Box::new(ParkoilScraper::new(config)),
            Brand::Qplus => Box::new(QplusScraper::new(config)),
            Brand::Sahoil => Box::new(SahoilScraper::new(config)),
            Brand::Sunpet => Box::new(SunpetScraper::new(config)),
            Brand::Termo => Box::new(TermoScraper::new(config)),
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for Brand {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = crate::text::normalize_key(s)
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let brand = match key.as_str() {
            "shell" => Brand::Shell,
            "opet" => Brand::Opet,
            "petrolofisi" | "po" => Brand::PetrolOfisi,
            "tppd" | "turkiyepetrolleri" | "tp" => Brand::Tppd,
            "aytemiz" => Brand::Aytemiz,
            "total" | "guzelenerji" => Brand::Total,
            "alpet" => Brand::Alpet,
            "lukoil" => Brand::Lukoil,
            "moil" => Brand::Moil,
            "aygaz" => Brand::Aygaz,
            "rpet" => Brand::Rpet,
            "petral" | "petrall" => Brand::Petral,
            "7kita" | "sevenkita" | "yedikita" => Brand::SevenKita,
            "bpet" => Brand::Bpet,
            "enerji" | "enerjipetrol" => Brand::Enerji,
            "hpyco" | "hypco" => Brand::Hpyco,
            "ipragaz" => Brand::Ipragaz,
            "kadoil" => Brand::Kadoil,
            "milangaz" => Brand::Milangaz,
            "parkoil" => Brand::Parkoil,
            "qplus" => Brand::Qplus,
            "sahoil" | "sahhoil" => Brand::Sahoil,
            "sunpet" => Brand::Sunpet,
            "termo" | "termopet" => Brand::Termo,
            _ => return Err(ScraperError::UnknownBrand(s.to_string())),
        };
        Ok(brand)
    }
}

/// ブランド共通の実行環境（設定・ブラウザ・出力）
pub(crate) struct Driver {
    pub config: ScraperConfig,
    session: Option<BrowserSession>,
}

impl Driver {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub async fn start(&mut self) -> Result<(), ScraperError> {
        if self.session.is_none() {
            self.session = Some(BrowserSession::launch(&self.config).await?);
        }
        Ok(())
    }

    pub fn session(&self) -> Result<&BrowserSession, ScraperError> {
        self.session
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("Browser not initialized".to_string()))
    }

    pub async fn stop(&mut self) -> Result<(), ScraperError> {
        match self.session.take() {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }

    pub fn file(&self, prefix: &str, city: &str) -> PathBuf {
        price_file(&self.config.output_dir, prefix, city)
    }

    /// `<prefix>_<city>_prices.txt` に書き出してパスを返す
    pub fn save(&self, prefix: &str, city: &str, lines: &[String]) -> Result<PathBuf, ScraperError> {
        let path = self.file(prefix, city);
        write_lines(&path, lines)?;
        info!("OK: {} -> {:?}", city, path.file_name().unwrap_or_default());
        Ok(path)
    }
}

/// 出現順を保ったまま、出力ファイル単位のキーでまとめる
pub(crate) fn group_in_order<T: Clone>(
    items: &[T],
    key_of: impl Fn(&T) -> String,
) -> Vec<(String, Vec<T>)> {
    let mut groups: Vec<(String, Vec<T>)> = Vec::new();
    for item in items {
        let key = key_of(item);
        match groups.iter_mut().find(|(name, _)| *name == key) {
            Some((_, members)) => members.push(item.clone()),
            None => groups.push((key, vec![item.clone()])),
        }
    }
    groups
}

/// 都市名に合う要素（完全一致優先）を探し、それを含むグループを返す
pub(crate) fn find_group<'a, T>(
    groups: &'a [(String, Vec<T>)],
    city: &str,
    name_of: impl Fn(&T) -> &str,
) -> Option<&'a (String, Vec<T>)> {
    let members: Vec<(usize, &T)> = groups
        .iter()
        .enumerate()
        .flat_map(|(i, (_, items))| items.iter().map(move |item| (i, item)))
        .collect();
    find_by_name(&members, city, |(_, item)| name_of(*item)).map(|(i, _)| &groups[*i])
}

/// 都市を順番に処理する。都市ごとにリトライし、失敗はレポートに残して次へ進む
pub(crate) async fn scrape_each<'a, F, Fut>(
    brand: &str,
    config: &ScraperConfig,
    cities: &'a [String],
    backoff_ms: u64,
    mut scrape: F,
) -> ScrapeReport
where
    F: FnMut(&'a str) -> Fut,
    Fut: Future<Output = Result<PathBuf, ScraperError>>,
{
    info!("{}: {} cities to fetch", brand, cities.len());
    let mut report = ScrapeReport::new(brand);
    for (i, city) in cities.iter().enumerate() {
        let label = format!("{} {}", brand, city);
        match with_retries(&label, config.retries, backoff_ms, || scrape(city)).await {
            Ok(path) => report.saved(path),
            Err(e) => {
                warn!("Skipped {}: {}", label, e);
                report.skip(city.as_str(), e);
            }
        }
        if i + 1 < cities.len() {
            between_cities(config).await;
        }
    }
    info!(
        "{}: saved {} file(s), skipped {} city(ies)",
        brand,
        report.saved.len(),
        report.skipped.len()
    );
    report.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_round_trip_names() {
        for brand in Brand::ALL {
            assert_eq!(brand.prefix().parse::<Brand>().unwrap(), brand);
        }
    }

    #[test]
    fn test_brand_aliases() {
        assert_eq!("Petrol Ofisi".parse::<Brand>().unwrap(), Brand::PetrolOfisi);
        assert_eq!("TÜRKİYE PETROLLERİ".parse::<Brand>().unwrap(), Brand::Tppd);
        assert_eq!("güzel-enerji".parse::<Brand>().unwrap(), Brand::Total);
        assert_eq!("7 Kıta".parse::<Brand>().unwrap(), Brand::SevenKita);
        assert_eq!("Hypco".parse::<Brand>().unwrap(), Brand::Hpyco);
        assert_eq!("Şahoil".parse::<Brand>().unwrap(), Brand::Sahoil);
        assert_eq!("İpragaz".parse::<Brand>().unwrap(), Brand::Ipragaz);
        assert!(matches!(
            "bp".parse::<Brand>(),
            Err(ScraperError::UnknownBrand(_))
        ));
    }

    #[test]
    fn test_tune_applies_brand_pacing() {
        let config = Brand::PetrolOfisi.tune(ScraperConfig::default());
        assert_eq!(config.retries, 2);
        assert_eq!(config.min_delay, Duration::from_millis(800));
        assert_eq!(config.max_delay, Duration::from_millis(1600));
    }

    #[tokio::test]
    async fn test_scrape_each_records_failures_and_continues() {
        let config = ScraperConfig::default()
            .with_delays(Duration::ZERO, Duration::ZERO)
            .with_retries(1);
        let cities = vec!["ADANA".to_string(), "VAN".to_string(), "ORDU".to_string()];
        let report = scrape_each("test", &config, &cities, 1, |city| async move {
            if city == "VAN" {
                Err(ScraperError::CityNotFound(city.to_string()))
            } else {
                Ok(PathBuf::from(format!("test_{}_prices.txt", city)))
            }
        })
        .await;

        assert_eq!(report.saved.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].city, "VAN");
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn test_group_in_order_keeps_first_appearance() {
        let items = ["b1", "a1", "b2", "c1", "a2"];
        let groups = group_in_order(&items, |s| s[..1].to_string());
        let keys: Vec<&str> = groups.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        assert_eq!(groups[1].1, vec!["a1", "a2"]);
    }

    #[test]
    fn test_find_group_matches_member_names() {
        let groups = vec![
            ("ADANA".to_string(), vec!["ADANA"]),
            ("ISTANBUL".to_string(), vec!["ISTANBUL_TRA", "ISTANBUL_ANA"]),
        ];
        let found = find_group(&groups, "İstanbul", |name| *name).unwrap();
        assert_eq!(found.0, "ISTANBUL");
        assert_eq!(find_group(&groups, "adana", |name| *name).unwrap().0, "ADANA");
        assert!(find_group(&groups, "Van", |name| *name).is_none());
    }

    #[test]
    fn test_driver_requires_session() {
        let driver = Driver::new(ScraperConfig::new("/tmp/prices"));
        assert!(matches!(driver.session(), Err(ScraperError::BrowserInit(_))));
        assert_eq!(
            driver.file("rpet", "ADANA"),
            PathBuf::from("/tmp/prices/rpet_ADANA_prices.txt")
        );
    }
}
