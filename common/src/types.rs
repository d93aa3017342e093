//! 照合処理の型定義
//!
//! - Container: 1アーカイブ分の展開済み画像と元ファイル名
//! - RowRecord: 表ドキュメントの1データ行
//! - MatchResult: RowRecord と Container の対応（または非対応）

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 展開済みアーカイブ
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// アーカイブのファイル名（拡張子付き）
    pub name: String,
    /// ファイル名から抽出した照合キー（空なら照合不能）
    pub key: String,
    /// 展開された画像のパス（埋め込み順）
    #[serde(default)]
    pub images: Vec<PathBuf>,
}

/// 表ドキュメントの1行
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRecord {
    /// シート上の行番号（1始まり、再採番しない）
    pub row_index: u32,
    pub customer: String,
    /// 追跡番号（セルの値そのまま）
    pub tracking_raw: String,
    /// 追跡番号から英数字以外を除いたもの
    pub tracking_clean: String,
    pub rfid: String,
}

/// ヘッダーから決定した列番号（1始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRoles {
    pub customer: u32,
    pub tracking: u32,
    pub rfid: u32,
}

impl Default for ColumnRoles {
    fn default() -> Self {
        Self {
            customer: 1,
            tracking: 2,
            rfid: 3,
        }
    }
}

/// 照合ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// キー完全一致
    Exact,
    /// 部分一致（フォールバック）
    Partial,
    /// 一致なし
    #[serde(rename = "none")]
    Unmatched,
    /// 手動補正
    Manual,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Exact => write!(f, "exact"),
            MatchStatus::Partial => write!(f, "partial"),
            MatchStatus::Unmatched => write!(f, "none"),
            MatchStatus::Manual => write!(f, "manual"),
        }
    }
}

/// 照合対象コンテナへの参照（実行内で安定したインデックス）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRef {
    pub index: usize,
    pub name: String,
}

/// 照合結果（RowRecord 1件につき1件）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub row: RowRecord,
    pub container: Option<ContainerRef>,
    pub status: MatchStatus,
}

