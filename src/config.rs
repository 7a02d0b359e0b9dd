use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// 価格ファイルの出力先
    pub output_dir: PathBuf,
    pub headless: bool,
    /// ヘッド付き起動 + ブラウザログ + デバッグスクリーンショット
    pub debug: bool,
    /// ナビゲーション・セレクタ待機のタイムアウト
    pub timeout: Duration,
    /// 都市間の待機（最小）
    pub min_delay: Duration,
    /// 都市間の待機（最大）
    pub max_delay: Duration,
    /// 都市ごとのリトライ回数
    pub retries: u32,
    pub user_agent: String,
    pub window_size: (u32, u32),
    /// Chrome実行ファイル（未指定ならchromiumoxideの自動検出）
    pub chrome_path: Option<PathBuf>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./prices"),
            headless: true,
            debug: false,
            timeout: Duration::from_secs(45),
            min_delay: Duration::from_millis(800),
            max_delay: Duration::from_millis(1600),
            retries: 1,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            window_size: (1280, 900),
            chrome_path: None,
        }
    }
}

impl ScraperConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    /// 環境変数から設定を読み込む（未設定の項目はデフォルト値）
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// 設定済みの値に環境変数を上書きする
    pub fn apply_env(self) -> Self {
        let mut config = self;

        if let Ok(dir) = std::env::var("FUEL_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(headless) = std::env::var("FUEL_HEADLESS")
            .ok()
            .and_then(|v| parse_bool(&v))
        {
            config.headless = headless;
        }
        if let Some(secs) = std::env::var("FUEL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = std::env::var("FUEL_RETRIES")
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
        {
            config.retries = retries;
        }
        if let Ok(path) = std::env::var("CHROME_PATH").or_else(|_| std::env::var("CHROMIUM_PATH")) {
            config.chrome_path = Some(PathBuf::from(path));
        }

        config
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// デバッグモードはヘッド付きで起動する
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        if debug {
            self.headless = false;
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delays(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min.min(max);
        self.max_delay = max.max(min);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ScraperConfig::new("/tmp/prices")
            .with_headless(true)
            .with_timeout(Duration::from_secs(120))
            .with_retries(3);

        assert_eq!(config.output_dir, PathBuf::from("/tmp/prices"));
        assert!(config.headless);
        assert!(!config.debug);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.retries, 3);
    }

    #[test]
    fn test_debug_forces_headful() {
        let config = ScraperConfig::default().with_debug(true);
        assert!(config.debug);
        assert!(!config.headless);
    }

    #[test]
    fn test_delays_are_ordered() {
        let config = ScraperConfig::default()
            .with_delays(Duration::from_millis(900), Duration::from_millis(300));
        assert_eq!(config.min_delay, Duration::from_millis(300));
        assert_eq!(config.max_delay, Duration::from_millis(900));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
