use async_trait::async_trait;
use std::path::PathBuf;

use tracing::warn;

use crate::error::ScraperError;
use crate::report::ScrapeReport;

/// 取得対象
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeTarget {
    /// サイトに掲載された全都市
    All,
    /// 1都市（完全一致を優先、なければ部分一致）
    City(String),
}

#[async_trait]
pub trait PriceScraper: Send + Sync {
    /// 出力ファイル名のプレフィックス（例: "shell"）
    fn brand(&self) -> &'static str;

    /// ブラウザ初期化
    async fn initialize(&mut self) -> Result<(), ScraperError>;

    /// 1都市分を取得してファイルに書き出す
    async fn fetch_city(&mut self, city: &str) -> Result<PathBuf, ScraperError>;

    /// 全都市を順番に取得（都市単位の失敗はレポートに記録して続行）
    async fn fetch_all(&mut self) -> Result<ScrapeReport, ScraperError>;

    /// リソース解放
    async fn close(&mut self) -> Result<(), ScraperError>;

    /// 一括実行（initialize → fetch → close）。失敗してもcloseは必ず呼ぶ
    async fn execute(&mut self, target: &ScrapeTarget) -> Result<ScrapeReport, ScraperError> {
        self.initialize().await?;

        let result = match target {
            ScrapeTarget::All => self.fetch_all().await,
            ScrapeTarget::City(city) => self.fetch_city(city).await.map(|path| {
                let mut report = ScrapeReport::new(self.brand());
                report.saved(path);
                report.finish()
            }),
        };

        if let Err(e) = self.close().await {
            warn!("{}: failed to close browser: {}", self.brand(), e);
        }
        result
    }
}
