use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("未対応のアーカイブ形式: {0}")]
    UnsupportedArchiveFormat(String),

    #[error("必要なファイルがありません: {0}")]
    MissingRequiredFile(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("表ドキュメントを読み込めません: {0}")]
    DocumentParse(String),

    /// 1件単位の失敗。実行全体のエラーとしては返さず、スキップとして集計する
    #[error("埋め込み失敗 ({item}): {reason}")]
    PerItemEmbed { item: String, reason: String },

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("Excel生成エラー: {0}")]
    ExcelGeneration(String),

    #[error("対話入力エラー: {0}")]
    Interaction(String),

    #[error("xlsxパッケージが不正: {0}")]
    Package(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] photo_embed_common::Error),
}

pub type Result<T> = std::result::Result<T, EmbedError>;
