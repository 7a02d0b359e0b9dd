use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("JSON解析エラー: {0}")]
    Json(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("都市が見つかりません: {0}")]
    CityNotFound(String),

    #[error("価格データなし: {0}")]
    NoPriceData(String),

    #[error("未対応のブランド: {0}")]
    UnknownBrand(String),
}

impl ScraperError {
    /// 同じ都市をもう一度試す価値があるか
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScraperError::Navigation(_)
                | ScraperError::Timeout(_)
                | ScraperError::ElementNotFound(_)
                | ScraperError::JavaScript(_)
                | ScraperError::NoPriceData(_)
        )
    }
}

impl From<serde_json::Error> for ScraperError {
    fn from(e: serde_json::Error) -> Self {
        ScraperError::Json(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ScraperError::Timeout("table".into()).is_retryable());
        assert!(ScraperError::NoPriceData("ADANA".into()).is_retryable());
        assert!(!ScraperError::CityNotFound("ATLANTIS".into()).is_retryable());
        assert!(!ScraperError::BrowserInit("no chrome".into()).is_retryable());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: ScraperError = serde_json::from_str::<Vec<String>>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ScraperError::Json(_)));
    }
}
