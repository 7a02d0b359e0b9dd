//! ブラウザセッション
//!
//! 1ブランドにつき Chromium 1プロセス・1ページを使い回す。
//! DOM操作はすべて `page.evaluate` で行い、セレクタ文字列はJSONエンコードして埋め込む。

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;

/// ネットワークアイドル待機のタイムアウト（ミリ秒）
const NETWORK_IDLE_TIMEOUT_MS: u64 = 15000;
/// ネットワークアイドル判定のインターバル（ミリ秒）
const NETWORK_IDLE_CHECK_INTERVAL_MS: u64 = 500;
/// ポストバック後のDOM安定待機の最短時間（ミリ秒）
const PAGE_STABLE_MIN_MS: u64 = 3000;
/// 連続して満たすべき判定回数
const STEADY_CHECKS: u32 = 3;

/// 応答待ちのリソースがなければ true
const PENDING_REQUESTS_IDLE_JS: &str = r#"
(() => {
    const now = performance.now();
    return !performance.getEntriesByType('resource')
        .some(e => e.responseEnd === 0 && now - e.startTime < 5000);
})()
"#;
/// セレクタ待機のポーリング間隔（ミリ秒）
const POLL_INTERVAL_MS: u64 = 250;

/// `<select>` の選択肢
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

/// `<a>` のリンク先と表示テキスト
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Link {
    pub href: String,
    pub text: String,
}

/// JSONビューアのUIを除いた本文
const JSON_BODY_JS: &str = r#"
(() => {
    const pre = document.querySelector('body > pre') || document.querySelector('pre');
    if (pre) return pre.textContent || '';
    return document.body ? document.body.innerText : '';
})()
"#;

/// 本文からJSONを読む（前後の空白やBOMは無視）
pub fn parse_json_body<T: DeserializeOwned>(body: &str) -> Result<T, ScraperError> {
    let text = body.trim().trim_start_matches('\u{feff}');
    if text.is_empty() {
        return Err(ScraperError::Json("empty response body".to_string()));
    }
    Ok(serde_json::from_str(text)?)
}

/// 文字列をJSリテラルとして埋め込む
pub fn js_str(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    user_data_dir: PathBuf,
    timeout: Duration,
    debug: bool,
}

impl BrowserSession {
    /// ブラウザを起動して空のページを1枚開く
    pub async fn launch(config: &ScraperConfig) -> Result<Self, ScraperError> {
        info!("Launching browser (headless={})...", config.headless);

        // ユニークなユーザーデータディレクトリを生成
        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("fuel-prices-{}", unique_id));

        let (width, height) = config.window_size;
        let mut builder = BrowserConfig::builder()
            .user_data_dir(&user_data_dir)
            .window_size(width, height);

        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .request_timeout(config.timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--lang=tr-TR")
            .arg(format!("--user-agent={}", config.user_agent));

        if config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {:?}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // 価格の日付表示をサイトの現地時間に合わせる
        if let Err(e) = page
            .execute(SetTimezoneOverrideParams::new("Europe/Istanbul"))
            .await
        {
            debug!("Failed to override timezone: {}", e);
        }

        info!("Browser initialized successfully");
        Ok(Self {
            browser,
            page,
            handler,
            user_data_dir,
            timeout: config.timeout,
            debug: config.debug,
        })
    }

    /// URLへ移動し、readyState が complete になるまで待つ
    pub async fn goto(&self, url: &str) -> Result<(), ScraperError> {
        debug!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| ScraperError::Navigation(format!("{}: {}", url, e)))?;
        self.wait_ready().await
    }

    /// document.readyState == "complete" を待つ
    pub async fn wait_ready(&self) -> Result<(), ScraperError> {
        let start = Instant::now();
        while start.elapsed() < self.timeout {
            let state: String = self.eval("document.readyState").await.unwrap_or_default();
            if state == "complete" {
                debug!("Page load complete after {:?}", start.elapsed());
                return Ok(());
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
        Err(ScraperError::Timeout(format!(
            "page load did not complete within {:?}",
            self.timeout
        )))
    }

    /// スクリプトの結果が `STEADY_CHECKS` 回続けて `steady` を満たすまでポーリングする
    async fn poll_steady<T, F>(&self, script: &str, limit: Duration, interval_ms: u64, mut steady: F) -> bool
    where
        T: DeserializeOwned + Clone,
        F: FnMut(T) -> bool,
    {
        let start = Instant::now();
        let mut count = 0;
        while start.elapsed() < limit {
            match self.eval::<T>(script).await {
                Ok(value) if steady(value.clone()) => {
                    count += 1;
                    if count >= STEADY_CHECKS {
                        return true;
                    }
                }
                Ok(_) => count = 0,
                Err(e) => {
                    debug!("Steady check failed: {}", e);
                    count = 0;
                }
            }
            sleep(Duration::from_millis(interval_ms)).await;
        }
        false
    }

    /// 読み込み中のリソースがなくなるまで待つ。間に合わなくても続行する
    pub async fn wait_request_idle(&self) -> Result<(), ScraperError> {
        let start = Instant::now();
        let limit = Duration::from_millis(NETWORK_IDLE_TIMEOUT_MS);
        if self
            .poll_steady(PENDING_REQUESTS_IDLE_JS, limit, NETWORK_IDLE_CHECK_INTERVAL_MS, |idle: bool| idle)
            .await
        {
            debug!("Network idle after {:?}", start.elapsed());
        } else {
            warn!("Network still busy after {:?}, continuing", start.elapsed());
        }
        Ok(())
    }

    /// ASP.NET のポストバック完了を待つ
    ///
    /// 通信が止まり、DOMの大きさが変わらなくなるまで。`timeout` を過ぎたらエラー。
    pub async fn wait_postback(&self, what: &str) -> Result<(), ScraperError> {
        let start = Instant::now();
        let idle = self
            .poll_steady(PENDING_REQUESTS_IDLE_JS, self.timeout, NETWORK_IDLE_CHECK_INTERVAL_MS, |idle: bool| idle)
            .await;

        let mut last: Option<usize> = None;
        let remaining = self.timeout.saturating_sub(start.elapsed());
        let stable = idle
            && self
                .poll_steady(
                    "document.documentElement.outerHTML.length",
                    remaining.max(Duration::from_millis(PAGE_STABLE_MIN_MS)),
                    300,
                    |len: usize| last.replace(len) == Some(len),
                )
                .await;

        if stable {
            debug!("{} settled after {:?}", what, start.elapsed());
            Ok(())
        } else {
            Err(ScraperError::Timeout(format!(
                "{} did not settle within {:?}",
                what, self.timeout
            )))
        }
    }

    /// スクリプトを評価して結果をデシリアライズ
    pub async fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T, ScraperError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| ScraperError::JavaScript(e.to_string()))
    }

    /// 戻り値を使わないスクリプト実行
    pub async fn run(&self, script: &str) -> Result<(), ScraperError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
        Ok(())
    }

    /// 真偽値を返すスクリプトが true になるまで `timeout` の間待つ
    pub async fn wait_until(&self, script: &str, what: &str) -> Result<(), ScraperError> {
        let start = Instant::now();
        let mut i = 0u32;
        while start.elapsed() < self.timeout {
            if self.eval::<bool>(script).await.unwrap_or(false) {
                debug!("{} ready after {:?}", what, start.elapsed());
                return Ok(());
            }
            if i > 0 && i % 20 == 0 {
                debug!("Still waiting for {}... ({:?})", what, start.elapsed());
            }
            i += 1;
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
        Err(ScraperError::Timeout(format!(
            "{} not ready within {:?}",
            what, self.timeout
        )))
    }

    /// 回数を決めて短くポーリングする（タイムアウトしてもエラーにしない）
    pub async fn poll(&self, script: &str, attempts: u32, interval_ms: u64) -> bool {
        for _ in 0..attempts {
            if self.eval::<bool>(script).await.unwrap_or(false) {
                return true;
            }
            sleep(Duration::from_millis(interval_ms)).await;
        }
        false
    }

    pub async fn wait_for_selector(&self, selector: &str) -> Result<(), ScraperError> {
        let script = format!("document.querySelector({}) !== null", js_str(selector));
        self.wait_until(&script, selector).await.map_err(|e| match e {
            ScraperError::Timeout(_) => ScraperError::ElementNotFound(selector.to_string()),
            other => other,
        })
    }

    /// 候補セレクタのうち最初に見つかった要素をクリックする
    pub async fn click_first(&self, selectors: &[&str]) -> Result<bool, ScraperError> {
        let list = serde_json::to_string(selectors)?;
        let script = format!(
            r#"
            (() => {{
                for (const sel of {}) {{
                    const el = document.querySelector(sel);
                    if (el) {{ el.click(); return true; }}
                }}
                return false;
            }})()
        "#,
            list
        );
        self.eval(&script).await
    }

    pub async fn click(&self, selector: &str) -> Result<(), ScraperError> {
        if self.click_first(&[selector]).await? {
            Ok(())
        } else {
            Err(ScraperError::ElementNotFound(selector.to_string()))
        }
    }

    /// クッキーバナーを閉じる（見つからなくてもエラーにしない）
    pub async fn accept_cookies(&self, selectors: &[&str]) {
        match self.click_first(selectors).await {
            Ok(true) => {
                debug!("Cookie banner dismissed");
                sleep(Duration::from_millis(500)).await;
            }
            Ok(false) => debug!("No cookie banner found"),
            Err(e) => debug!("Failed to dismiss cookie banner: {}", e),
        }
    }

    pub async fn select_options(&self, selector: &str) -> Result<Vec<SelectOption>, ScraperError> {
        let script = format!(
            r#"
            (() => {{
                const sel = document.querySelector({});
                if (!sel) return null;
                return Array.from(sel.options).map(o => ({{
                    value: o.value,
                    text: (o.textContent || '').trim()
                }}));
            }})()
        "#,
            js_str(selector)
        );
        self.eval::<Option<Vec<SelectOption>>>(&script)
            .await?
            .ok_or_else(|| ScraperError::ElementNotFound(selector.to_string()))
    }

    /// `<select>` の値を変更して input/change イベントを発火する
    ///
    /// Reactの制御コンポーネントでも反映されるよう、ネイティブのsetterを経由する。
    pub async fn select_value(&self, selector: &str, value: &str) -> Result<(), ScraperError> {
        let script = format!(
            r#"
            (() => {{
                const sel = document.querySelector({sel});
                if (!sel) return false;
                const setter = Object.getOwnPropertyDescriptor(HTMLSelectElement.prototype, 'value').set;
                setter.call(sel, {val});
                if (sel.value !== {val}) return false;
                sel.dispatchEvent(new Event('input', {{ bubbles: true }}));
                sel.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()
        "#,
            sel = js_str(selector),
            val = js_str(value)
        );
        if self.eval::<bool>(&script).await? {
            Ok(())
        } else {
            Err(ScraperError::ElementNotFound(format!(
                "{} option {}",
                selector, value
            )))
        }
    }

    /// jQuery / select2 で管理された `<select>` の値を変更する
    ///
    /// jQuery があれば `.val().trigger('change')`、なければ change イベントだけを送る。
    pub async fn select_with_jquery(&self, selector: &str, value: &str) -> Result<(), ScraperError> {
        let script = format!(
            r#"
            (() => {{
                const sel = document.querySelector({sel});
                if (!sel) return false;
                if (!Array.from(sel.options).some(o => o.value === {val})) return false;
                sel.value = {val};
                if (window.jQuery) {{
                    window.jQuery(sel).val({val}).trigger('change');
                }} else {{
                    sel.dispatchEvent(new Event('change', {{ bubbles: true }}));
                }}
                return true;
            }})()
        "#,
            sel = js_str(selector),
            val = js_str(value)
        );
        if self.eval::<bool>(&script).await? {
            Ok(())
        } else {
            Err(ScraperError::ElementNotFound(format!(
                "{} option {}",
                selector, value
            )))
        }
    }

    /// 行ごとのセルテキスト
    pub async fn table_rows(
        &self,
        row_selector: &str,
        cell_selector: &str,
    ) -> Result<Vec<Vec<String>>, ScraperError> {
        let script = format!(
            r#"
            Array.from(document.querySelectorAll({})).map(row =>
                Array.from(row.querySelectorAll({})).map(c => (c.innerText || c.textContent || '').trim())
            )
        "#,
            js_str(row_selector),
            js_str(cell_selector)
        );
        self.eval(&script).await
    }

    pub async fn links(&self, selector: &str) -> Result<Vec<Link>, ScraperError> {
        let script = format!(
            r#"
            Array.from(document.querySelectorAll({})).map(a => ({{
                href: a.href || '',
                text: (a.innerText || a.textContent || '').trim()
            }}))
        "#,
            js_str(selector)
        );
        self.eval(&script).await
    }

    pub async fn text_of(&self, selector: &str) -> Result<Option<String>, ScraperError> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                return el ? (el.innerText || el.textContent || '').trim() : null;
            }})()
        "#,
            js_str(selector)
        );
        self.eval(&script).await
    }

    /// JSONを返すURLを開いて本文をデシリアライズする
    ///
    /// Chromeは生のJSONを `<pre>` に入れて表示するので、あればその中身だけを読む。
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ScraperError> {
        self.goto(url).await?;
        let body: String = self.eval(JSON_BODY_JS).await?;
        parse_json_body(&body)
    }

    /// デバッグ時のみ全画面スクリーンショットをbase64でログ出力
    pub async fn debug_screenshot(&self, label: &str) {
        if !self.debug {
            return;
        }
        match self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            Ok(screenshot) => {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
                debug!("{} screenshot: data:image/png;base64,{}", label, encoded);
            }
            Err(e) => debug!("Failed to take screenshot ({}): {}", label, e),
        }
    }

    /// ブラウザを終了してハンドラタスクを止める
    pub async fn close(mut self) -> Result<(), ScraperError> {
        if let Err(e) = self.browser.close().await {
            debug!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Failed to wait for browser exit: {}", e);
        }
        self.handler.abort();
        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            debug!("Failed to remove user data dir {:?}: {}", self.user_data_dir, e);
        }
        info!("Browser closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_str_escapes_quotes() {
        assert_eq!(js_str("a[href='x']"), r#""a[href='x']""#);
        assert_eq!(js_str(r#"input[name="city"]"#), r#""input[name=\"city\"]""#);
        assert_eq!(js_str("İstanbul"), "\"İstanbul\"");
    }

    #[test]
    fn test_parse_json_body() {
        let items: Vec<u32> = parse_json_body("\u{feff}  [1, 2, 3]\n").unwrap();
        assert_eq!(items, vec![1, 2, 3]);
        assert!(matches!(
            parse_json_body::<Vec<u32>>("   "),
            Err(ScraperError::Json(_))
        ));
        assert!(parse_json_body::<Vec<u32>>("<html>").is_err());
    }

    #[test]
    fn test_select_option_deserialize() {
        let json = r#"[{"value":"34","text":"İSTANBUL"},{"value":"-1","text":"Seçiniz"}]"#;
        let options: Vec<SelectOption> = serde_json::from_str(json).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].value, "34");
        assert_eq!(options[1].text, "Seçiniz");
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_browser_session -- --ignored --nocapture
    async fn test_browser_session() {
        let config = ScraperConfig::default();
        let session = BrowserSession::launch(&config).await.expect("launch");
        session
            .goto("data:text/html,<select id='c'><option value='1'>A</option><option value='2'>B</option></select>")
            .await
            .expect("goto");
        let options = session.select_options("#c").await.expect("options");
        assert_eq!(options.len(), 2);
        session.select_value("#c", "2").await.expect("select");
        let value: String = session
            .eval("document.querySelector('#c').value")
            .await
            .expect("eval");
        assert_eq!(value, "2");
        session.close().await.expect("close");
    }
}
