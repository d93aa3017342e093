//! 照合エンジン
//!
//! RowRecord の `tracking_clean` とコンテナの照合キーを突き合わせる。
//!
//! ## 規則
//! 1. 完全一致（`exact`）
//! 2. 部分一致（`partial`、オプション）: 一方が他方を含む最初のコンテナ
//! 3. どちらもなければ `none`
//!
//! 同じキーのコンテナが複数ある場合は入力順で最初のものを採用する。
//! スコアリングによる最良一致は行わない。
//!
//! 手動補正は `apply_corrections` で別ステップとして重ね、
//! エンジンの出力そのものは書き換えない。

use crate::error::{Error, Result};
use crate::types::{Container, ContainerRef, MatchResult, MatchStatus, RowRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 照合オプション
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchOptions {
    /// 完全一致がないときに部分一致を試す
    pub partial_fallback: bool,
}

/// キー → コンテナの索引
///
/// 同一キーは最初に現れたコンテナだけを保持する。
#[derive(Debug, Default)]
pub struct KeyIndex {
    by_key: HashMap<String, ContainerRef>,
}

impl KeyIndex {
    pub fn build(containers: &[Container]) -> Self {
        let mut by_key = HashMap::new();
        for (index, container) in containers.iter().enumerate() {
            if container.key.is_empty() {
                continue;
            }
            by_key.entry(container.key.clone()).or_insert_with(|| ContainerRef {
                index,
                name: container.name.clone(),
            });
        }
        Self { by_key }
    }

    pub fn get(&self, key: &str) -> Option<&ContainerRef> {
        if key.is_empty() {
            return None;
        }
        self.by_key.get(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// 部分一致の探索（入力順で最初のもの）
pub fn find_partial(key: &str, containers: &[Container]) -> Option<ContainerRef> {
    if key.is_empty() {
        return None;
    }
    containers
        .iter()
        .enumerate()
        .find(|(_, c)| !c.key.is_empty() && (key.contains(&c.key) || c.key.contains(key)))
        .map(|(index, c)| ContainerRef {
            index,
            name: c.name.clone(),
        })
}

/// 全行を照合
///
/// 戻り値は `rows` と同じ順序・同じ件数。
pub fn match_rows(
    rows: &[RowRecord],
    containers: &[Container],
    options: MatchOptions,
) -> Vec<MatchResult> {
    let index = KeyIndex::build(containers);

    rows.iter()
        .map(|row| {
            let key = row.tracking_clean.as_str();

            if let Some(found) = index.get(key) {
                return MatchResult {
                    row: row.clone(),
                    container: Some(found.clone()),
                    status: MatchStatus::Exact,
                };
            }

            if options.partial_fallback {
                if let Some(found) = find_partial(key, containers) {
                    return MatchResult {
                        row: row.clone(),
                        container: Some(found),
                        status: MatchStatus::Partial,
                    };
                }
            }

            MatchResult {
                row: row.clone(),
                container: None,
                status: MatchStatus::Unmatched,
            }
        })
        .collect()
}

/// 手動補正1件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    /// 対象の行番号（シート上の行）
    pub row: u32,
    /// 割り当てるコンテナ名。`None` は明示的に未対応とする
    #[serde(default)]
    pub container: Option<String>,
}

impl Correction {
    /// JSON配列から読み込み
    pub fn list_from_json(json: &str) -> Result<Vec<Correction>> {
        let list: Vec<Correction> = serde_json::from_str(json)?;
        Ok(list)
    }
}

/// 手動補正を重ねた新しい照合結果を返す
///
/// 補正は常にエンジンの結果より優先される。同じ行への補正は後勝ち。
pub fn apply_corrections(
    results: &[MatchResult],
    corrections: &[Correction],
    containers: &[Container],
) -> Result<Vec<MatchResult>> {
    let mut corrected = results.to_vec();

    for correction in corrections {
        let target = corrected
            .iter_mut()
            .find(|r| r.row.row_index == correction.row)
            .ok_or(Error::UnknownRow(correction.row))?;

        let container = match &correction.container {
            Some(name) => {
                let index = containers
                    .iter()
                    .position(|c| &c.name == name)
                    .ok_or_else(|| Error::UnknownContainer(name.clone()))?;
                Some(ContainerRef {
                    index,
                    name: name.clone(),
                })
            }
            None => None,
        };

        target.container = container;
        target.status = MatchStatus::Manual;
    }

    Ok(corrected)
}

/// ステータス別件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchCounts {
    pub exact: usize,
    pub partial: usize,
    pub unmatched: usize,
    pub manual: usize,
}

pub fn count_by_status(results: &[MatchResult]) -> MatchCounts {
    let mut counts = MatchCounts::default();
    for r in results {
        match r.status {
            MatchStatus::Exact => counts.exact += 1,
            MatchStatus::Partial => counts.partial += 1,
            MatchStatus::Unmatched => counts.unmatched += 1,
            MatchStatus::Manual => counts.manual += 1,
        }
    }
    counts
}
