pub mod embed;
pub mod folder;
pub mod report;

pub use embed::{embed_in_place, EmbedSummary, RowImages};
pub use folder::{write_folder_document, EncodedImage, FolderRow};
pub use report::write_match_report;

use std::path::{Path, PathBuf};

/// 出力指定がフォルダ（または拡張子なし）なら既定のファイル名を付ける
pub fn resolve_output_path(output: &Path, default_file_name: &str) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join(default_file_name)
    } else {
        output.to_path_buf()
    }
}
