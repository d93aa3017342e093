//! 照合キー抽出モジュール
//!
//! アーカイブのファイル名から照合キー（英数字のみ）を取り出す。
//!
//! 抽出規則は2種類あり、呼び出し側で明示的に選ぶ:
//! - `FirstSeparator`: 最初の `-` より後ろ全体（照合モードの既定）
//! - `PatternCascade`: 最後の `-` より後ろにパターン群を順に適用
//!
//! どちらの規則でも結果は `normalize` を通す。空文字列は「照合不能」を表す。

use regex::Regex;
use serde::{Deserialize, Serialize};

/// ファイル名の区切り文字
pub const SEPARATOR: char = '-';

/// 拡張子として一括で落とす複合サフィックス
const COMPOUND_EXTENSIONS: &[&str] = &[".tar.gz", ".tar.bz2", ".tar.xz"];

/// 抽出規則
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionRule {
    /// 最初の区切り文字より後ろ
    #[default]
    FirstSeparator,
    /// 最後の区切り文字より後ろ + パターン順次適用
    PatternCascade,
}

impl std::str::FromStr for ExtractionRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first" | "first-separator" => Ok(ExtractionRule::FirstSeparator),
            "cascade" | "pattern-cascade" | "last" => Ok(ExtractionRule::PatternCascade),
            _ => Err(format!("Unknown rule: {}. Use first or cascade", s)),
        }
    }
}

impl std::fmt::Display for ExtractionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionRule::FirstSeparator => write!(f, "first-separator"),
            ExtractionRule::PatternCascade => write!(f, "pattern-cascade"),
        }
    }
}

/// 英数字（ASCII）以外を除去
///
/// 冪等: `normalize(&normalize(s)) == normalize(s)`
pub fn normalize(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// ASCII 範囲外の文字（漢字など）を除去
pub fn strip_non_ascii(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii()).collect()
}

/// パス部分と拡張子を落としたファイル名本体
pub fn strip_extension(file_name: &str) -> &str {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);

    let lower = base.to_ascii_lowercase();
    for ext in COMPOUND_EXTENSIONS {
        if lower.len() > ext.len() && lower.ends_with(ext) {
            return &base[..base.len() - ext.len()];
        }
    }

    match base.rfind('.') {
        // 先頭のドットだけのもの（".hidden"）は拡張子扱いしない
        Some(pos) if !base[..pos].chars().all(|c| c == '.') => &base[..pos],
        _ => base,
    }
}

/// 規則を指定してキーを抽出
pub fn extract_key(file_name: &str, rule: ExtractionRule) -> String {
    match rule {
        ExtractionRule::FirstSeparator => key_after_first_separator(file_name),
        ExtractionRule::PatternCascade => key_from_pattern_cascade(file_name),
    }
}

/// 最初の区切り文字より後ろを正規化
pub fn key_after_first_separator(file_name: &str) -> String {
    let stem = strip_extension(file_name);
    let main = match stem.split_once(SEPARATOR) {
        Some((_, rest)) => rest.trim(),
        None => stem,
    };
    normalize(main)
}

/// 最後の区切り文字より後ろにパターンを順に適用
///
/// 最初にマッチしたパターンを採用し、どれにも当たらなければ全体を正規化する。
pub fn key_from_pattern_cascade(file_name: &str) -> String {
    lazy_static::lazy_static! {
        // (パターン, 採用するキャプチャ番号)
        static ref CASCADE: Vec<(Regex, usize)> = vec![
            // 6桁以上の数字
            (Regex::new(r"\d{6,}").unwrap(), 0),
            // 4文字以上の英字
            (Regex::new(r"[A-Za-z]{4,}").unwrap(), 0),
            // 数字_英字
            (Regex::new(r"\d+_[A-Za-z]+").unwrap(), 0),
            // 英字_数字
            (Regex::new(r"[A-Za-z]+_\d+").unwrap(), 0),
            // 英字+数字
            (Regex::new(r"[A-Za-z]+\d+").unwrap(), 0),
            // 数字+英字
            (Regex::new(r"\d+[A-Za-z]+").unwrap(), 0),
            // 識別子プレフィックス以降
            (Regex::new(r"ELS[Aa]?([A-Za-z\d_]+)").unwrap(), 1),
        ];
    }

    let stem = strip_extension(file_name);
    let main = match stem.rsplit_once(SEPARATOR) {
        Some((_, last)) => last.trim(),
        None => stem,
    };

    for (pattern, group) in CASCADE.iter() {
        if let Some(found) = pattern.captures(main).and_then(|c| c.get(*group)) {
            return normalize(found.as_str());
        }
    }

    normalize(main)
}
