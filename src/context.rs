//! 実行単位の作業フォルダ
//!
//! 1回の処理ごとにランダムなIDのフォルダを作り、展開先と出力先をまとめて持つ。
//! 並行実行はフォルダ名で分離するだけで、ロックはしない。
//!
//! 展開先（scratch）は `finish` で削除する。既に消えていてもエラーにしない。
//! 出力ファイルは削除しない。

use crate::error::Result;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug)]
pub struct RunContext {
    run_id: String,
    root: PathBuf,
    finished: bool,
}

impl RunContext {
    /// `base/<run-id>/` を作成
    pub fn create(base: &Path) -> Result<Self> {
        let run_id = Uuid::new_v4().simple().to_string();
        let root = base.join(&run_id);
        std::fs::create_dir_all(root.join("extracted"))?;
        std::fs::create_dir_all(root.join("output"))?;

        log::info!("run {} started in {}", run_id, root.display());

        Ok(Self {
            run_id,
            root,
            finished: false,
        })
    }

    /// アーカイブの展開先
    pub fn extract_dir(&self) -> PathBuf {
        self.root.join("extracted")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    /// `<prefix>_<8桁hex>.xlsx`
    pub fn output_path(&self, prefix: &str) -> PathBuf {
        self.output_dir()
            .join(format!("{}_{}.xlsx", prefix, &self.run_id[..8]))
    }

    /// 展開先を削除して終了
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        remove_dir_tolerant(&self.extract_dir())?;
        log::info!("run {} finished", self.run_id);
        Ok(())
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = remove_dir_tolerant(&self.extract_dir()) {
                log::warn!("作業フォルダの削除に失敗: {}", e);
            }
        }
    }
}

/// 存在しないフォルダの削除は成功扱い
fn remove_dir_tolerant(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
