use crate::error::{EmbedError, Result};
use photo_embed_common::ExtractionRule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const WORK_DIR_ENV: &str = "PHOTO_EMBED_WORK_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 顧客列を判定するヘッダーキーワード
    pub customer_keywords: Vec<String>,
    /// 追跡番号列を判定するヘッダーキーワード
    pub tracking_keywords: Vec<String>,
    /// RFID列を判定するヘッダーキーワード
    pub rfid_keywords: Vec<String>,
    /// 実行ごとの作業フォルダを作る場所
    pub work_dir: Option<PathBuf>,
    pub extraction_rule: ExtractionRule,
    pub partial_fallback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default_config())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| EmbedError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("photo-embed").join("config.json"))
    }

    fn default_config() -> Self {
        let words = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            customer_keywords: words(&["客户", "customer", "客户代码", "客户编号"]),
            tracking_keywords: words(&["elsa", "跟踪号", "追踪号", "tracking"]),
            rfid_keywords: words(&["rfid", "射频", "标签"]),
            work_dir: None,
            extraction_rule: ExtractionRule::FirstSeparator,
            partial_fallback: false,
        }
    }

    /// 作業フォルダの基準（環境変数を優先）
    pub fn work_base_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var(WORK_DIR_ENV) {
            if !dir.trim().is_empty() {
                return PathBuf::from(dir);
            }
        }

        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("photo-embed"))
    }
}
