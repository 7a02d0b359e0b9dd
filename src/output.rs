//! 価格ファイル出力
//!
//! `<brand>_<CITY>_prices.txt` に1都市分を書き出す。行は `"\n"` 区切りで末尾改行なし。

use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::ScraperError;

/// 出力ファイルのパス
pub fn price_file(dir: &Path, prefix: &str, city: &str) -> PathBuf {
    dir.join(format!("{}_{}_prices.txt", prefix, city))
}

/// 行を書き出す（ディレクトリがなければ作成）
pub fn write_lines(path: &Path, lines: &[String]) -> Result<(), ScraperError> {
    let result = match path.parent() {
        Some(parent) => std::fs::create_dir_all(parent),
        None => Ok(()),
    }
    .and_then(|_| std::fs::write(path, lines.join("\n")));
    if let Err(e) = result {
        error!("Failed to write {:?}: {}", path, e);
        return Err(e.into());
    }
    debug!("Wrote {} line(s) to {:?}", lines.len(), path);
    Ok(())
}

/// 空の値は "-" にする
pub fn or_dash(value: Option<&str>) -> &str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => "-",
    }
}

/// ラベル付き価格
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledPrice {
    pub label: String,
    pub value: String,
}

impl LabeledPrice {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    pub fn render(&self) -> String {
        format!("{}: {}", self.label, self.value)
    }
}

/// `場所: ラベル: 値, ラベル: 値` 形式の1行。空の価格は省き、1つも残らなければ None
pub fn colon_line(location: &str, labels: &[&str], prices: &[String]) -> Option<String> {
    let parts: Vec<String> = labels
        .iter()
        .zip(prices)
        .filter(|(_, price)| !price.trim().is_empty())
        .map(|(label, price)| LabeledPrice::new(*label, price.trim()).render())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(format!("{}: {}", location, parts.join(", ")))
}

/// `場所 | ラベル: 値 | ラベル: 値` 形式の1行
#[derive(Debug, Clone)]
pub struct PriceLine {
    location: String,
    fields: Vec<LabeledPrice>,
}

impl PriceLine {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, label: &str, value: impl Into<String>) -> Self {
        self.fields.push(LabeledPrice::new(label, value));
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = LabeledPrice>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn render(&self) -> String {
        std::iter::once(self.location.clone())
            .chain(self.fields.iter().map(LabeledPrice::render))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_file_name() {
        let path = price_file(Path::new("/tmp/out"), "shell", "ADANA");
        assert_eq!(path, PathBuf::from("/tmp/out/shell_ADANA_prices.txt"));
    }

    #[test]
    fn test_price_line_render() {
        let line = PriceLine::new("KADIKOY")
            .field("Benzin 95", "44.10")
            .field("LPG", "18.50")
            .render();
        assert_eq!(line, "KADIKOY | Benzin 95: 44.10 | LPG: 18.50");
        assert_eq!(PriceLine::new("ADANA").render(), "ADANA");
    }

    #[test]
    fn test_colon_line_skips_empty_prices() {
        let prices = vec!["45.20".to_string(), " ".to_string(), "29.00".to_string()];
        assert_eq!(
            colon_line("SEYHAN", &["Motorin", "Gaz Yağı", "Kalyak"], &prices).as_deref(),
            Some("SEYHAN: Motorin: 45.20, Kalyak: 29.00")
        );
        assert_eq!(colon_line("SEYHAN", &["Motorin"], &[String::new()]), None);
    }

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(Some("12.3")), "12.3");
        assert_eq!(or_dash(Some("  ")), "-");
        assert_eq!(or_dash(None), "-");
    }

    #[test]
    fn test_write_lines_creates_directory() {
        let dir = std::env::temp_dir().join(format!("fuel-output-test-{}", std::process::id()));
        let path = price_file(&dir.join("nested"), "opet", "ADANA");
        write_lines(&path, &["ADANA".to_string(), "Motorin: 43.2".to_string()]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "ADANA\nMotorin: 43.2");
        std::fs::remove_dir_all(&dir).ok();
    }
}
