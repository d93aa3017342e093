//! 実行レポート
//!
//! 1件単位の失敗（画像1枚、フォルダ1つ、アーカイブ1つ）は
//! `ItemOutcome::Skipped` として集計し、バッチ全体は止めない。

use serde::{Deserialize, Serialize};

/// スキップ対象の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Archive,
    Directory,
    Image,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Archive => write!(f, "archive"),
            ItemKind::Directory => write!(f, "directory"),
            ItemKind::Image => write!(f, "image"),
        }
    }
}

/// 1件の処理結果
#[derive(Debug)]
pub enum ItemOutcome<T> {
    Done(T),
    Skipped { item: String, reason: String },
}

impl<T> ItemOutcome<T> {
    pub fn skipped(item: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ItemOutcome::Skipped {
            item: item.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ItemOutcome::Done(_))
    }
}

/// スキップした1件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub kind: ItemKind,
    pub item: String,
    pub reason: String,
}

/// 1回の実行の集計
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// 配置できた画像数
    pub images_placed: usize,
    /// 入力として処理したコンテナ（またはフォルダ）数
    pub containers_processed: usize,
    /// 照合が確定し埋め込みを行ったコンテナ数
    pub containers_matched: usize,
    /// スキップした項目
    pub skipped: Vec<SkippedItem>,
}

impl RunReport {
    /// 結果を記録し、成功なら値を返す
    pub fn record<T>(&mut self, kind: ItemKind, outcome: ItemOutcome<T>) -> Option<T> {
        match outcome {
            ItemOutcome::Done(value) => Some(value),
            ItemOutcome::Skipped { item, reason } => {
                self.skipped.push(SkippedItem { kind, item, reason });
                None
            }
        }
    }

    /// 種類別のスキップ件数
    pub fn skipped_count(&self, kind: ItemKind) -> usize {
        self.skipped.iter().filter(|s| s.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_done_returns_value() {
        let mut report = RunReport::default();
        let value = report.record(ItemKind::Image, ItemOutcome::Done(7));
        assert_eq!(value, Some(7));
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_record_skipped_is_kept() {
        let mut report = RunReport::default();
        let value: Option<()> = report.record(
            ItemKind::Image,
            ItemOutcome::skipped("broken.jpg", "decode failed"),
        );
        assert!(value.is_none());
        assert_eq!(report.skipped_count(ItemKind::Image), 1);
        assert_eq!(report.skipped_count(ItemKind::Archive), 0);
        assert_eq!(report.skipped[0].item, "broken.jpg");
        assert_eq!(report.skipped[0].reason, "decode failed");
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = RunReport {
            images_placed: 3,
            ..Default::default()
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"imagesPlaced\":3"));
    }
}
