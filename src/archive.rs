//! アーカイブ展開
//!
//! 対応形式: zip / tar / tar.gz / tar.bz2 / 7z。
//! rar は形式として認識するが展開手段がないため
//! `UnsupportedArchiveFormat` を返す（黙ってスキップしない）。

use crate::error::{EmbedError, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    SevenZip,
    Rar,
}

impl ArchiveFormat {
    /// ファイル名（大文字小文字無視）から判定
    pub fn detect(file_name: &str) -> Option<Self> {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") || lower.ends_with(".gz") {
            Some(ArchiveFormat::TarGz)
        } else if lower.ends_with(".tar.bz2") || lower.ends_with(".tbz2") || lower.ends_with(".bz2") {
            Some(ArchiveFormat::TarBz2)
        } else if lower.ends_with(".tar") {
            Some(ArchiveFormat::Tar)
        } else if lower.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else if lower.ends_with(".7z") {
            Some(ArchiveFormat::SevenZip)
        } else if lower.ends_with(".rar") {
            Some(ArchiveFormat::Rar)
        } else {
            None
        }
    }

    /// このビルドで展開できるか
    pub fn is_supported(&self) -> bool {
        !matches!(self, ArchiveFormat::Rar)
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveFormat::Zip => write!(f, "zip"),
            ArchiveFormat::Tar => write!(f, "tar"),
            ArchiveFormat::TarGz => write!(f, "tar.gz"),
            ArchiveFormat::TarBz2 => write!(f, "tar.bz2"),
            ArchiveFormat::SevenZip => write!(f, "7z"),
            ArchiveFormat::Rar => write!(f, "rar"),
        }
    }
}

/// 展開可能な形式か検査
pub fn check_supported(path: &Path) -> Result<ArchiveFormat> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    match ArchiveFormat::detect(&name) {
        Some(format) if format.is_supported() => Ok(format),
        Some(format) => Err(EmbedError::UnsupportedArchiveFormat(format!(
            "{} ({}形式は展開できません)",
            name, format
        ))),
        None => Err(EmbedError::UnsupportedArchiveFormat(name)),
    }
}

/// `dest` に展開する
pub fn extract(archive_path: &Path, dest: &Path) -> Result<()> {
    if !archive_path.exists() {
        return Err(EmbedError::FileNotFound(archive_path.display().to_string()));
    }

    let format = check_supported(archive_path)?;
    std::fs::create_dir_all(dest)?;

    log::info!(
        "Unpacking {} ({}) -> {}",
        archive_path.display(),
        format,
        dest.display()
    );

    match format {
        ArchiveFormat::Zip => extract_zip(archive_path, dest),
        ArchiveFormat::Tar => {
            let file = File::open(archive_path)?;
            tar::Archive::new(BufReader::new(file)).unpack(dest)?;
            Ok(())
        }
        ArchiveFormat::TarGz => {
            let file = File::open(archive_path)?;
            tar::Archive::new(GzDecoder::new(BufReader::new(file))).unpack(dest)?;
            Ok(())
        }
        ArchiveFormat::TarBz2 => {
            let file = File::open(archive_path)?;
            tar::Archive::new(BzDecoder::new(BufReader::new(file))).unpack(dest)?;
            Ok(())
        }
        ArchiveFormat::SevenZip => sevenz_rust::decompress_file(archive_path, dest)
            .map_err(|e| EmbedError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))),
        ArchiveFormat::Rar => Err(EmbedError::UnsupportedArchiveFormat(format.to_string())),
    }
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        // 展開先の外へ出るエントリは無視
        let Some(relative) = entry.enclosed_name() else {
            log::warn!("  skipping unsafe zip entry: {}", entry.name());
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_detect_formats() {
        assert_eq!(ArchiveFormat::detect("a.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect("a.ZIP"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect("a.tar"), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::detect("a.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect("a.tgz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect("a.tar.bz2"), Some(ArchiveFormat::TarBz2));
        assert_eq!(ArchiveFormat::detect("a.7z"), Some(ArchiveFormat::SevenZip));
        assert_eq!(ArchiveFormat::detect("a.rar"), Some(ArchiveFormat::Rar));
        assert_eq!(ArchiveFormat::detect("a.xlsx"), None);
    }

    #[test]
    fn test_unsupported_is_distinct_error() {
        for name in ["a.rar", "a.RAR", "notes.txt"] {
            let err = check_supported(Path::new(name)).unwrap_err();
            assert!(
                matches!(err, EmbedError::UnsupportedArchiveFormat(_)),
                "{} should be unsupported",
                name
            );
        }
    }

    #[test]
    fn test_extract_zip() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("batch-AB123.zip");
        {
            let file = File::create(&zip_path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("inner/a.png", options).unwrap();
            writer.write_all(b"png").unwrap();
            writer.start_file("b.jpg", options).unwrap();
            writer.write_all(b"jpg").unwrap();
            writer.finish().unwrap();
        }

        let dest = dir.path().join("out");
        extract(&zip_path, &dest).unwrap();
        assert!(dest.join("inner").join("a.png").is_file());
        assert!(dest.join("b.jpg").is_file());
    }

    #[test]
    fn test_extract_tar_gz() {
        let dir = tempdir().unwrap();
        let tgz_path = dir.path().join("batch.tar.gz");
        {
            let file = File::create(&tgz_path).unwrap();
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let data = b"fake image";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, "sku1/a.png", &data[..]).unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let dest = dir.path().join("out");
        extract(&tgz_path, &dest).unwrap();
        assert!(dest.join("sku1").join("a.png").is_file());
    }

    #[test]
    fn test_bz2_and_7z_are_supported() {
        for name in ["a.tar.bz2", "a.tbz2", "a.7z"] {
            assert!(check_supported(Path::new(name)).is_ok(), "{}", name);
        }
    }

    fn write_tar<W: Write>(writer: W) -> W {
        let mut builder = tar::Builder::new(writer);
        let data = b"fake image";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "sku1/a.png", &data[..]).unwrap();
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_extract_tar() {
        let dir = tempdir().unwrap();
        let tar_path = dir.path().join("batch.tar");
        write_tar(File::create(&tar_path).unwrap());

        let dest = dir.path().join("out");
        extract(&tar_path, &dest).unwrap();
        assert!(dest.join("sku1").join("a.png").is_file());
    }

    #[test]
    fn test_extract_tar_bz2() {
        let dir = tempdir().unwrap();
        let tbz_path = dir.path().join("batch.tar.bz2");
        {
            let file = File::create(&tbz_path).unwrap();
            let encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
            write_tar(encoder).finish().unwrap();
        }

        let dest = dir.path().join("out");
        extract(&tbz_path, &dest).unwrap();
        assert!(dest.join("sku1").join("a.png").is_file());
    }

    #[test]
    fn test_extract_7z() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("sku1")).unwrap();
        std::fs::write(src.join("sku1").join("a.png"), b"fake image").unwrap();

        let archive_path = dir.path().join("batch.7z");
        sevenz_rust::compress_to_path(&src, &archive_path).unwrap();

        let dest = dir.path().join("out");
        extract(&archive_path, &dest).unwrap();
        let extracted: Vec<_> = walkdir::WalkDir::new(&dest)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .collect();
        assert_eq!(extracted.len(), 1);
        assert!(extracted[0].path().ends_with("sku1/a.png"));
    }

    #[test]
    fn test_extract_corrupt_7z_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.7z");
        std::fs::write(&path, b"not 7z").unwrap();
        assert!(extract(&path, &dir.path().join("out")).is_err());
    }

    #[test]
    fn test_extract_corrupt_zip_fails() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("broken.zip");
        std::fs::write(&zip_path, b"not a zip").unwrap();
        assert!(extract(&zip_path, &dir.path().join("out")).is_err());
    }

    #[test]
    fn test_extract_missing_file() {
        let dir = tempdir().unwrap();
        let err = extract(&dir.path().join("missing.zip"), dir.path()).unwrap_err();
        assert!(matches!(err, EmbedError::FileNotFound(_)));
    }
}
