//! 展開済みフォルダから画像を集める
//!
//! 除外の順序:
//! 1. `._` で始まるファイル、`__MACOSX` 配下
//! 2. 拡張子が一致しても扱えない派生形式（.mpo など）
//! 3. ラスター画像の拡張子ホワイトリスト（大文字小文字無視）
//!
//! 並び順はパス名順で固定する。

use crate::error::{EmbedError, Result};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "jpge", "gif", "bmp"];

/// 拡張子は画像でも埋め込めない形式
const EXCLUDED_EXTENSIONS: &[&str] = &["mpo", "mp"];

/// OSが作るゴミフォルダ
const JUNK_DIRS: &[&str] = &["__MACOSX"];

/// 画像を直下に持つフォルダ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDirectory {
    pub path: PathBuf,
    /// フォルダ名（正規化前）
    pub name: String,
}

/// Check if a file name is an embeddable raster image
pub fn is_image_file(file_name: &str) -> bool {
    if file_name.starts_with("._") {
        return false;
    }

    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return false;
    };
    let ext = ext.to_lowercase();

    if EXCLUDED_EXTENSIONS.contains(&ext.as_str()) {
        return false;
    }

    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

fn is_junk_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && JUNK_DIRS
            .iter()
            .any(|junk| entry.file_name().to_string_lossy() == *junk)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// 配下すべての画像（再帰）
pub fn collect_images(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(EmbedError::FolderNotFound(root.display().to_string()));
    }

    let mut images: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_junk_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_image_file(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
        .collect();

    images.sort();
    Ok(images)
}

/// フォルダ直下の画像のみ
pub fn images_in_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(EmbedError::FolderNotFound(dir.display().to_string()));
    }

    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_image_file(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
        .collect();

    // ファイル名でソート
    images.sort();
    Ok(images)
}

/// 画像を直下に持つフォルダを列挙（root 自身を含む）
pub fn collect_image_dirs(root: &Path) -> Result<Vec<ImageDirectory>> {
    if !root.is_dir() {
        return Err(EmbedError::FolderNotFound(root.display().to_string()));
    }

    let mut dirs = Vec::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_junk_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        let path = entry.path();
        match images_in_dir(path) {
            Ok(images) if !images.is_empty() => dirs.push(ImageDirectory {
                path: path.to_path_buf(),
                name: file_name_of(path),
            }),
            Ok(_) => {}
            Err(e) => log::warn!("フォルダ読み込みエラー {}: {}", path.display(), e),
        }
    }

    Ok(dirs)
}
