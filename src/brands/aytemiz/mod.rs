//! Aytemiz スクレイパーモジュール
//!
//! 燃料価格（都市・地区別）とLPG価格（都市別、イスタンブールは地域別）を別々に取得し、
//! 1行にマージして出力する。

mod merge;
mod scraper;
mod types;

pub use merge::{merge_all, merge_lpg_for_city, IstanbulLpg};
pub use scraper::AytemizScraper;
pub use types::{file_city, split_location, AytemizFuelRow, AytemizLpgRow, LpgTable};
