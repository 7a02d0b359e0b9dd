//! テキスト正規化ヘルパー
//!
//! サイトごとに都市名・地区名の表記が微妙に異なるため、比較用の正規化と
//! ファイル名用の正規化をここにまとめる。どの正規化を使うかは各ブランド側で選ぶ。

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[.,]\d+)").expect("valid price regex"));

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)").expect("valid number regex"));

static LIRA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[.,]?\d*)").expect("valid lira regex"));

/// トルコ語の文字をASCIIに置き換える（大文字・小文字は保持）
pub fn fold_turkish(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '\u{0307}')
        .map(|c| match c {
            'ı' => 'i',
            'İ' => 'I',
            'ş' => 's',
            'Ş' => 'S',
            'ğ' => 'g',
            'Ğ' => 'G',
            'ü' => 'u',
            'Ü' => 'U',
            'ö' => 'o',
            'Ö' => 'O',
            'ç' => 'c',
            'Ç' => 'C',
            'â' => 'a',
            'Â' => 'A',
            'î' => 'i',
            'Î' => 'I',
            'û' => 'u',
            'Û' => 'U',
            other => other,
        })
        .collect()
}

/// 前後の空白を除去し、連続する空白（改行・NBSP含む）を1つにまとめる
pub fn collapse_whitespace(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 比較用キー: 空白正規化 → トルコ文字ASCII化 → 小文字化
pub fn normalize_key(text: &str) -> String {
    fold_turkish(&collapse_whitespace(text)).to_lowercase()
}

/// ファイル名・出力行用: ASCII化した大文字
pub fn upper_ascii(text: &str) -> String {
    fold_turkish(text.trim()).to_uppercase()
}

/// 大文字小文字・トルコ文字を無視した一致
pub fn same_name(a: &str, b: &str) -> bool {
    normalize_key(a) == normalize_key(b)
}

/// 完全一致を優先し、なければ部分一致で候補を探す
pub fn find_by_name<'a, T>(
    items: &'a [T],
    wanted: &str,
    name_of: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    let key = normalize_key(wanted);
    if key.is_empty() {
        return None;
    }
    items
        .iter()
        .find(|item| normalize_key(name_of(item)) == key)
        .or_else(|| {
            items
                .iter()
                .find(|item| normalize_key(name_of(item)).contains(&key))
        })
}

/// 「İstanbul (Avrupa)」「ISTANBUL ANADOLU」等、イスタンブールの表記揺れを判定
pub fn is_istanbul_variant(name: &str) -> bool {
    normalize_key(name).starts_with("istanbul")
}

/// 一部サイトはメルシン県を旧名「İçel」で掲載している
pub fn map_legacy_city(name: &str) -> String {
    match normalize_key(name).as_str() {
        "icel" => "Mersin".to_string(),
        _ => name.trim().to_string(),
    }
}

/// セル文字列から小数の価格を抽出（カンマは小数点に変換）
pub fn extract_price(text: &str) -> Option<String> {
    let cleaned = text.replace("TL/LT", "").replace("TL/lt", "");
    PRICE_RE
        .captures(cleaned.trim())
        .map(|caps| caps[1].replace(',', "."))
}

/// 先頭の数値部分を抽出（整数も許容、見つからなければ元の文字列）
pub fn leading_number(text: &str) -> String {
    NUMBER_RE
        .captures(text)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| text.trim().to_string())
}

/// 「₺18,49/litre」「1.234,50 ₺」のような表示価格を "18.49" 形式にする
///
/// カンマが1つだけなら小数点とみなし、ドットは桁区切りとして捨てる。
pub fn parse_lira(text: &str) -> Option<String> {
    let cleaned = text.replace('₺', "").replace("/litre", "");
    let cleaned = cleaned.trim();
    let normalized = if cleaned.matches(',').count() == 1 {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned.to_string()
    };
    LIRA_RE
        .captures(&normalized)
        .map(|caps| caps[1].replace(',', "."))
}

/// 単語の先頭だけ大文字にする（"KAHRAMANMARAŞ" → "Kahramanmaraş", "IĞDIR" → "Iğdır"）
///
/// 小文字化はトルコ語の規則（I → ı, İ → i）に従う。
pub fn title_case_tr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word_start = true;
    for c in collapse_whitespace(text).chars() {
        if word_start {
            match c {
                'i' => out.push('İ'),
                'ı' => out.push('I'),
                other => out.extend(other.to_uppercase()),
            }
        } else {
            match c {
                'I' => out.push('ı'),
                'İ' => out.push('i'),
                other => out.extend(other.to_lowercase()),
            }
        }
        word_start = c == ' ' || c == '-' || c == '(';
    }
    out
}

/// ファイル名用: ASCII大文字、空白とハイフンは "_"、それ以外の記号は削除
pub fn ascii_file_name(city: &str) -> String {
    upper_ascii(city)
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

/// 名前（ASCII大文字で比較）が重複する行を後から来た方を捨てて除く。名前が空の行も捨てる
pub fn dedup_by_name<T>(rows: Vec<T>, name_of: impl Fn(&T) -> &str) -> Vec<T> {
    let mut seen = std::collections::HashSet::new();
    rows.into_iter()
        .filter(|row| {
            let key = upper_ascii(name_of(row));
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

/// URL用スラッグ（例: "Kahramanmaraş" → "kahramanmaras"）
pub fn slugify(text: &str) -> String {
    let lowered = fold_turkish(text.trim()).to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        match c {
            'a'..='z' | '0'..='9' => slug.push(c),
            ' ' | '.' | ',' | '-' => {
                if !slug.ends_with('-') {
                    slug.push('-');
                }
            }
            _ => {}
        }
    }
    slug.trim_matches('-').to_string()
}

/// JSONの値を出力用の文字列にする（文字列はtrim、null は空文字、数値はそのまま）
pub fn json_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// ファイル名に使えない文字を置き換える
pub fn safe_filename(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            other => other,
        })
        .collect();
    let mut out = String::with_capacity(replaced.len());
    for c in collapse_whitespace(&replaced).chars() {
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out
}
