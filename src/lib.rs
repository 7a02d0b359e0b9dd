//! トルコ燃料価格スクレイパー
//!
//! - ブランド（Shell, Opet, Petrol Ofisi など24社）のサイトから都市・地区別の燃料価格を取得
//! - 1都市1ファイル（`<brand>_<CITY>_prices.txt`）で出力
//! - Aytemiz はLPG価格をイスタンブールの地域（Avrupa / Anadolu）から地区へ割り当ててマージ
//!
//! # 使用例
//!
//! ```rust,ignore
//! use fuel_price_scraper::{Brand, ScrapeRequest, ScraperService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = ScraperService::new();
//!
//!     let request = ScrapeRequest::new(Brand::Aytemiz).with_city("İstanbul");
//!
//!     let report = service.call(request).await.unwrap();
//!     println!("Saved: {:?}", report.saved);
//! }
//! ```
//!
//! # スクレイパーを直接使う
//!
//! ```rust,ignore
//! use fuel_price_scraper::{PriceScraper, ScraperConfig, ScrapeTarget, ShellScraper};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ScraperConfig::new("./prices").with_debug(true);
//!     let mut scraper = ShellScraper::new(config);
//!     let report = scraper.execute(&ScrapeTarget::All).await.unwrap();
//!     println!("Skipped: {:?}", report.skipped);
//! }
//! ```

pub mod brands;
pub mod browser;
pub mod config;
pub mod districts;
pub mod error;
pub mod output;
pub mod pacing;
pub mod plates;
pub mod report;
pub mod service;
pub mod text;
pub mod traits;

// 主要な型をリエクスポート
pub use brands::{
    AlpetScraper, AygazScraper, AytemizScraper, BpetScraper, Brand, EnerjiScraper, HypcoScraper,
    IpragazScraper, KadoilScraper, LukoilScraper, MilangazScraper, MoilScraper, OpetScraper,
    ParkoilScraper, PetralScraper, PetrolOfisiScraper, QplusScraper, RpetScraper, SahoilScraper,
    SevenKitaScraper, ShellScraper, SunpetScraper, TermoScraper, TotalScraper, TppdScraper,
};
pub use config::ScraperConfig;
pub use districts::{region_of, Region};
pub use error::ScraperError;
pub use report::{ScrapeReport, SkippedCity};
pub use service::{ScrapeRequest, ScraperService};
pub use traits::{PriceScraper, ScrapeTarget};
