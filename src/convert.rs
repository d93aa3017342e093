//! 画像をPNGに再エンコード
//!
//! 埋め込む画像はすべてPNGに揃える。形式は拡張子ではなく中身から判定する。
//! 変換だけは rayon で並列に行い、結果は入力順で返す。

use crate::error::{EmbedError, Result};
use image::{ImageFormat, ImageReader};
use indicatif::ProgressBar;
use photo_embed_common::ItemOutcome;
use rayon::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// 1枚をPNGバイト列に変換
pub fn to_png(path: &Path) -> Result<Vec<u8>> {
    let img = ImageReader::open(path)
        .map_err(|e| EmbedError::ImageLoad(format!("{}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| EmbedError::ImageLoad(format!("{}: {}", path.display(), e)))?
        .decode()
        .map_err(|e| EmbedError::ImageLoad(format!("{}: {}", path.display(), e)))?;

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| EmbedError::ImageLoad(format!("{}: {}", path.display(), e)))?;

    Ok(buf)
}

/// まとめて変換（失敗はスキップ扱い）
pub fn convert_all(paths: &[PathBuf], progress: Option<&ProgressBar>) -> Vec<ItemOutcome<Vec<u8>>> {
    paths
        .par_iter()
        .map(|path| {
            let outcome = match to_png(path) {
                Ok(data) => ItemOutcome::Done(data),
                Err(e) => ItemOutcome::skipped(path.display().to_string(), e),
            };
            if let Some(pb) = progress {
                pb.inc(1);
            }
            outcome
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::tempdir;

    fn write_jpeg(path: &Path) {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(4, 3, Rgb([200, 10, 10]));
        img.save_with_format(path, ImageFormat::Jpeg).unwrap();
    }

    #[test]
    fn test_to_png_from_jpeg() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        write_jpeg(&path);

        let png = to_png(&path).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 3);
    }

    #[test]
    fn test_format_guessed_from_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("typo.jpge");
        write_jpeg(&path);
        assert!(to_png(&path).is_ok());
    }

    #[test]
    fn test_corrupt_image_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        assert!(matches!(to_png(&path), Err(EmbedError::ImageLoad(_))));
    }

    #[test]
    fn test_convert_all_keeps_order_and_skips() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("1.jpg");
        let bad = dir.path().join("2.jpg");
        write_jpeg(&good);
        std::fs::write(&bad, b"xx").unwrap();

        let outcomes = convert_all(&[good, bad.clone(), dir.path().join("1.jpg")], None);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_done());
        assert!(!outcomes[1].is_done());
        assert!(outcomes[2].is_done());
        match &outcomes[1] {
            ItemOutcome::Skipped { item, .. } => assert!(item.ends_with("2.jpg")),
            ItemOutcome::Done(_) => panic!("corrupt image converted"),
        }
    }
}
