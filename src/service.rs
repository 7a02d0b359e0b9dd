use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::brands::Brand;
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::report::ScrapeReport;
use crate::traits::ScrapeTarget;

/// スクレイピングリクエスト
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub brand: Brand,
    pub target: ScrapeTarget,
    pub config: ScraperConfig,
}

impl ScrapeRequest {
    /// ブランド既定の待機・リトライ設定に環境変数を重ねて全都市を対象にする
    pub fn new(brand: Brand) -> Self {
        Self {
            brand,
            target: ScrapeTarget::All,
            config: brand.tune(ScraperConfig::default()).apply_env(),
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.target = ScrapeTarget::City(city.into());
        self
    }

    pub fn with_target(mut self, target: ScrapeTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_config(mut self, config: ScraperConfig) -> Self {
        self.config = config;
        self
    }
}

/// tower::Serviceを実装したスクレイパーサービス
#[derive(Debug, Clone, Default)]
pub struct ScraperService {}

impl ScraperService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<ScrapeRequest> for ScraperService {
    type Response = ScrapeReport;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!("Scrape request: brand={} target={:?}", req.brand, req.target);

        Box::pin(async move {
            let mut scraper = req.brand.scraper(req.config);
            let report = scraper.execute(&req.target).await?;

            info!(
                "Scrape finished: brand={} saved={} skipped={}",
                report.brand,
                report.saved.len(),
                report.skipped.len()
            );
            Ok(report)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_scrape_request_builder() {
        let config = ScraperConfig::new("/tmp/prices").with_headless(false);
        let req = ScrapeRequest::new(Brand::Opet)
            .with_city("Adana")
            .with_config(config);

        assert_eq!(req.brand, Brand::Opet);
        assert_eq!(req.target, ScrapeTarget::City("Adana".to_string()));
        assert_eq!(req.config.output_dir, PathBuf::from("/tmp/prices"));
        assert!(!req.config.headless);
    }

    #[test]
    fn test_scrape_request_uses_brand_pacing() {
        let req = ScrapeRequest::new(Brand::Lukoil).with_target(ScrapeTarget::All);
        let (min, max, _) = Brand::Lukoil.pacing();
        assert_eq!(req.target, ScrapeTarget::All);
        assert_eq!(req.config.min_delay, min);
        assert_eq!(req.config.max_delay, max);
    }

    #[test]
    fn test_service_is_always_ready() {
        let mut service = ScraperService::new();
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert!(matches!(service.poll_ready(&mut cx), Poll::Ready(Ok(()))));
    }
}
