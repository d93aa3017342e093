//! 対話式の照合補正
//!
//! 一致しなかった行を1件ずつ表示し、コンテナを一覧から選ばせる。
//! 結果は `Correction` の列として返し、照合結果への適用は呼び出し側で行う。

use crate::error::{EmbedError, Result};
use dialoguer::Select;
use photo_embed_common::{Container, Correction, MatchResult, MatchStatus};
use std::collections::HashSet;

/// 一致しなかった行の位置
pub fn unmatched_indices(results: &[MatchResult]) -> Vec<usize> {
    results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.status == MatchStatus::Unmatched)
        .map(|(i, _)| i)
        .collect()
}

/// 候補の並び: まだどの行にも使われていないコンテナを先に
pub fn candidate_order(results: &[MatchResult], containers: &[Container]) -> Vec<usize> {
    let used: HashSet<usize> = results
        .iter()
        .filter_map(|r| r.container.as_ref())
        .map(|c| c.index)
        .collect();

    let (free, taken): (Vec<usize>, Vec<usize>) =
        (0..containers.len()).partition(|i| !used.contains(i));
    free.into_iter().chain(taken).collect()
}

/// 対話アクション
pub enum ReviewAction {
    /// コンテナを割り当てる
    Assign(usize),
    /// この行は一致なしのまま
    Skip,
    /// 残り全部スキップ
    SkipAll,
}

fn container_label(container: &Container, used: bool) -> String {
    let mark = if used { " (使用済み)" } else { "" };
    format!(
        "{}  [key: {}, {}枚]{}",
        container.name,
        container.key,
        container.images.len(),
        mark
    )
}

/// 1行分の選択肢を表示して選ばせる
fn prompt_review_action(
    candidates: &[usize],
    containers: &[Container],
    used: &HashSet<usize>,
) -> Result<ReviewAction> {
    let mut items: Vec<String> = vec!["スキップ".to_string(), "残り全部スキップ".to_string()];
    items.extend(
        candidates
            .iter()
            .map(|&i| container_label(&containers[i], used.contains(&i))),
    );

    let selection = Select::new()
        .with_prompt("対応するアーカイブ")
        .items(&items)
        .default(0)
        .interact()
        .map_err(|e| EmbedError::Interaction(e.to_string()))?;

    Ok(match selection {
        0 => ReviewAction::Skip,
        1 => ReviewAction::SkipAll,
        n => ReviewAction::Assign(candidates[n - 2]),
    })
}

/// 対話式で補正を作る
pub fn run_interactive_review(results: &[MatchResult], containers: &[Container]) -> Result<Vec<Correction>> {
    let targets = unmatched_indices(results);

    if targets.is_empty() {
        println!("✓ すべての行が照合済みです");
        return Ok(Vec::new());
    }
    if containers.is_empty() {
        println!("割り当てられるアーカイブがありません");
        return Ok(Vec::new());
    }

    println!("🔎 一致しなかった行: {}件", targets.len());
    println!("---\n");

    let order = candidate_order(results, containers);
    let mut used: HashSet<usize> = results
        .iter()
        .filter_map(|r| r.container.as_ref())
        .map(|c| c.index)
        .collect();
    let mut corrections = Vec::new();

    for (count, &idx) in targets.iter().enumerate() {
        let row = &results[idx].row;
        println!(
            "[{}/{}] 行{}  customer: {}  tracking: {}  rfid: {}",
            count + 1,
            targets.len(),
            row.row_index,
            row.customer,
            row.tracking_raw,
            row.rfid
        );

        match prompt_review_action(&order, containers, &used)? {
            ReviewAction::Assign(index) => {
                let name = containers[index].name.clone();
                println!("  → {}\n", name);
                used.insert(index);
                corrections.push(Correction {
                    row: row.row_index,
                    container: Some(name),
                });
            }
            ReviewAction::Skip => {
                println!("  → スキップ\n");
            }
            ReviewAction::SkipAll => {
                println!("  → 残り全部スキップ\n");
                break;
            }
        }
    }

    Ok(corrections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use photo_embed_common::{ContainerRef, RowRecord};

    fn result(row_index: u32, container: Option<usize>) -> MatchResult {
        MatchResult {
            row: RowRecord {
                row_index,
                ..Default::default()
            },
            container: container.map(|index| ContainerRef {
                index,
                name: format!("c{}.zip", index),
            }),
            status: if container.is_some() {
                MatchStatus::Exact
            } else {
                MatchStatus::Unmatched
            },
        }
    }

    fn containers(n: usize) -> Vec<Container> {
        (0..n)
            .map(|i| Container {
                name: format!("c{}.zip", i),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_unmatched_indices() {
        let results = vec![result(2, Some(0)), result(3, None), result(4, None)];
        assert_eq!(unmatched_indices(&results), vec![1, 2]);
    }

    #[test]
    fn test_candidate_order_puts_unused_first() {
        let results = vec![result(2, Some(1)), result(3, None)];
        assert_eq!(candidate_order(&results, &containers(3)), vec![0, 2, 1]);
    }

    #[test]
    fn test_nothing_to_review() {
        let results = vec![result(2, Some(0))];
        let corrections = run_interactive_review(&results, &containers(1)).unwrap();
        assert!(corrections.is_empty());
    }
}
