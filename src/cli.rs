use clap::{Parser, Subcommand};
use photo_embed_common::ExtractionRule;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "photo-embed")]
#[command(about = "アーカイブ画像を表ドキュメントの行に照合して埋め込むツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 表ドキュメントとアーカイブを照合して結果を出力
    Match {
        /// アーカイブ（zip/tar/tar.gz）
        #[arg(required = true)]
        archives: Vec<PathBuf>,

        /// 表ドキュメント（.xlsx）
        #[arg(short, long)]
        document: PathBuf,

        /// キー抽出ルール (first/cascade)
        #[arg(long)]
        rule: Option<ExtractionRule>,

        /// 完全一致がないとき部分一致を試す
        #[arg(long)]
        partial: bool,

        /// 照合結果JSONの出力先（省略時は標準出力に一覧表示のみ）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 照合結果の一覧表（.xlsx）
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// 照合した行に画像を埋め込んだ表ドキュメントを出力
    Embed {
        /// アーカイブ（zip/tar/tar.gz）
        #[arg(required = true)]
        archives: Vec<PathBuf>,

        /// 表ドキュメント（.xlsx）
        #[arg(short, long)]
        document: PathBuf,

        /// 手動補正JSON（[{"row": 3, "container": "x.zip"}]）
        #[arg(short, long)]
        corrections: Option<PathBuf>,

        /// 一致しなかった行を対話的に補正
        #[arg(short, long)]
        interactive: bool,

        /// キー抽出ルール (first/cascade)
        #[arg(long)]
        rule: Option<ExtractionRule>,

        /// 完全一致がないとき部分一致を試す
        #[arg(long)]
        partial: bool,

        /// 出力ファイル/ディレクトリ
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// フォルダごとに1行で画像を並べた表ドキュメントを作成
    Folder {
        /// アーカイブまたは展開済みフォルダ
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// 出力ファイル/ディレクトリ
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 設定を表示/初期化
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// 既定値で設定ファイルを作成
        #[arg(long)]
        init: bool,
    },
}
