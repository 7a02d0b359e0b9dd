//! 都市間の待機とリトライ
//!
//! ボット対策を刺激しないよう、都市ごとにランダムな間隔を空けて順番に処理する。

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;

/// `min..=max` の範囲でランダムな待機時間
pub fn jitter(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let ms = rand::thread_rng().gen_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(ms)
}

/// 線形バックオフ: `base * (attempt + 1) * [1.0, spread)`
pub fn backoff(attempt: u32, base_ms: u64, spread: f64) -> Duration {
    let factor = if spread > 1.0 {
        rand::thread_rng().gen_range(1.0..spread)
    } else {
        1.0
    };
    Duration::from_millis((base_ms as f64 * (attempt + 1) as f64 * factor) as u64)
}

/// 次の都市へ進む前の待機
pub async fn between_cities(config: &ScraperConfig) {
    let wait = jitter(config.min_delay, config.max_delay);
    debug!("Waiting {:?} before next city", wait);
    sleep(wait).await;
}

/// 画面更新を待つ短い固定待機
pub async fn settle(ms: u64) {
    sleep(Duration::from_millis(ms)).await;
}

/// リトライ可能なエラーの間だけ `retries` 回まで再実行する
pub async fn with_retries<T, F, Fut>(
    label: &str,
    retries: u32,
    base_ms: u64,
    mut op: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries && e.is_retryable() => {
                let wait = backoff(attempt, base_ms, 1.4);
                warn!(
                    "{}: attempt {} failed, retrying in {:?}: {}",
                    label,
                    attempt + 1,
                    wait,
                    e
                );
                sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
