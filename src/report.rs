use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 取得できなかった都市
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCity {
    pub city: String,
    pub reason: String,
}

/// 1ブランド分の実行結果
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    pub brand: String,
    pub saved: Vec<PathBuf>,
    pub skipped: Vec<SkippedCity>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScrapeReport {
    pub fn new(brand: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            saved: Vec::new(),
            skipped: Vec::new(),
            finished_at: None,
        }
    }

    pub fn saved(&mut self, path: PathBuf) {
        if !self.saved.contains(&path) {
            self.saved.push(path);
        }
    }

    pub fn skip(&mut self, city: impl Into<String>, reason: impl ToString) {
        self.skipped.push(SkippedCity {
            city: city.into(),
            reason: reason.to_string(),
        });
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}
