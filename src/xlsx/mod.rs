//! xlsx パッケージ（OOXML zip）の直接編集
//!
//! 既存ドキュメントに画像を追加するとき、触る必要のあるパーツだけを書き換え、
//! それ以外（他シート・スタイル・共有文字列・既存画像など）はバイト単位でそのまま残す。
//!
//! 書き換えるパーツ:
//! - 対象シートのXMLとその `_rels`
//! - drawing パーツ（新規または既存への追記）とその `_rels`
//! - `xl/media/imageN.png`（新規）
//! - `[Content_Types].xml`

pub mod drawing;
pub mod rels;
pub mod sheet;

use crate::error::{EmbedError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use drawing::Anchor;
use rels::{ContentTypes, Relationships};
use sheet::{SheetEdit, SheetInfo};

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const WORKBOOK_PART: &str = "xl/workbook.xml";

pub const REL_TYPE_DRAWING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
pub const REL_TYPE_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub const CONTENT_TYPE_DRAWING: &str = "application/vnd.openxmlformats-officedocument.drawing+xml";
pub const CONTENT_TYPE_PNG: &str = "image/png";

/// シート名とパーツのパス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPart {
    pub name: String,
    pub path: String,
}

/// 配置する画像1枚
#[derive(Debug, Clone)]
pub struct Placement {
    /// 1始まりの行
    pub row: u32,
    /// 1始まりの列
    pub col: u32,
    /// PNGデータ
    pub png: Vec<u8>,
}

/// パーツ名順を保ったままメモリに展開したパッケージ
#[derive(Debug, Default)]
pub struct XlsxPackage {
    parts: Vec<(String, Vec<u8>)>,
}

impl XlsxPackage {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EmbedError::FileNotFound(path.display().to_string()));
        }
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    pub fn read<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| EmbedError::DocumentParse(format!("xlsxを開けません: {}", e)))?;

        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| EmbedError::DocumentParse(format!("パーツ{}を読めません: {}", i, e)))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            parts.push((name, data));
        }

        if !parts.iter().any(|(name, _)| name == WORKBOOK_PART) {
            return Err(EmbedError::DocumentParse(format!("{} がありません", WORKBOOK_PART)));
        }

        Ok(Self { parts })
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.iter().any(|(n, _)| n == name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    pub fn part_str(&self, name: &str) -> Result<String> {
        let data = self
            .part(name)
            .ok_or_else(|| EmbedError::Package(format!("{} がありません", name)))?;
        String::from_utf8(data.to_vec())
            .map_err(|e| EmbedError::Package(format!("{} がUTF-8ではありません: {}", name, e)))
    }

    /// 既存なら置き換え、なければ末尾に追加
    pub fn put_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = data,
            None => self.parts.push((name.to_string(), data)),
        }
    }

    /// `prefix{N}{suffix}` のうち未使用の最小N（1始まり）
    pub fn next_free_part(&self, prefix: &str, suffix: &str) -> String {
        (1..)
            .map(|n| format!("{}{}{}", prefix, n, suffix))
            .find(|name| !self.has_part(name))
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))
    }

    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, data) in &self.parts {
            zip.start_file(name.as_str(), options)
                .map_err(|e| EmbedError::Io(std::io::Error::other(e)))?;
            zip.write_all(data)?;
        }

        zip.finish()
            .map_err(|e| EmbedError::Io(std::io::Error::other(e)))?;
        Ok(())
    }

    /// アクティブシート（workbookView の activeTab、既定は先頭）
    pub fn active_sheet(&self) -> Result<SheetPart> {
        let workbook_xml = self.part_str(WORKBOOK_PART)?;
        let rels_xml = self.part_str(&rels_path_for(WORKBOOK_PART))?;
        let rels = Relationships::parse(&rels_xml)?;

        let (active_tab, sheets) = parse_workbook_sheets(&workbook_xml)?;
        let (name, rid) = sheets
            .get(active_tab)
            .or_else(|| sheets.first())
            .ok_or_else(|| EmbedError::DocumentParse("シートがありません".into()))?;

        let rel = rels
            .get(rid)
            .ok_or_else(|| EmbedError::Package(format!("シート {} の参照 {} がありません", name, rid)))?;

        Ok(SheetPart {
            name: name.clone(),
            path: resolve_target(WORKBOOK_PART, &rel.target),
        })
    }

    /// シートの現在の最大行・列などを調べる
    pub fn sheet_info(&self, sheet: &SheetPart) -> Result<SheetInfo> {
        sheet::scan_sheet(&self.part_str(&sheet.path)?)
    }

    /// 画像をシートに埋め込む
    ///
    /// `placements` が空ならパッケージには一切触らない。
    pub fn embed_images(
        &mut self,
        sheet: &SheetPart,
        edit: SheetEdit,
        placements: &[Placement],
    ) -> Result<()> {
        if placements.is_empty() {
            return Ok(());
        }

        let sheet_xml = self.part_str(&sheet.path)?;
        let info = sheet::scan_sheet(&sheet_xml)?;

        let sheet_rels_path = rels_path_for(&sheet.path);
        let mut sheet_rels = match self.part(&sheet_rels_path) {
            Some(_) => Relationships::parse(&self.part_str(&sheet_rels_path)?)?,
            None => Relationships::default(),
        };

        // 既存の drawing があれば追記、なければ新規作成
        let existing_drawing = info
            .drawing_rel_id
            .as_deref()
            .and_then(|id| sheet_rels.get(id))
            .map(|rel| resolve_target(&sheet.path, &rel.target));

        let (drawing_path, new_drawing_rel_id) = match existing_drawing {
            Some(path) if self.has_part(&path) => (path, None),
            _ => {
                let path = self.next_free_part("xl/drawings/drawing", ".xml");
                let id = sheet_rels.add(REL_TYPE_DRAWING, &relative_target(&sheet.path, &path));
                (path, Some(id))
            }
        };

        let drawing_rels_path = rels_path_for(&drawing_path);
        let mut drawing_rels = match self.part(&drawing_rels_path) {
            Some(_) => Relationships::parse(&self.part_str(&drawing_rels_path)?)?,
            None => Relationships::default(),
        };

        let existing_drawing_xml = if new_drawing_rel_id.is_none() {
            Some(self.part_str(&drawing_path)?)
        } else {
            None
        };
        let first_shape_id = existing_drawing_xml
            .as_deref()
            .map(drawing::max_shape_id)
            .transpose()?
            .unwrap_or(0)
            + 1;

        let mut anchors = Vec::with_capacity(placements.len());
        for (i, placement) in placements.iter().enumerate() {
            let media_path = self.next_free_part("xl/media/image", ".png");
            self.put_part(&media_path, placement.png.clone());
            let rel_id = drawing_rels.add(REL_TYPE_IMAGE, &relative_target(&drawing_path, &media_path));
            anchors.push(Anchor {
                row: placement.row,
                col: placement.col,
                rel_id,
                shape_id: first_shape_id + i as u32,
            });
        }

        let drawing_xml = match existing_drawing_xml {
            Some(xml) => drawing::append_anchors(&xml, &anchors)?,
            None => drawing::new_drawing(&anchors),
        };
        self.put_part(&drawing_path, drawing_xml.into_bytes());
        self.put_part(&drawing_rels_path, drawing_rels.to_xml().into_bytes());

        let edit = SheetEdit {
            drawing_rel_id: new_drawing_rel_id.clone(),
            ..edit
        };
        let patched = sheet::patch_sheet(&sheet_xml, &info, &edit)?;
        self.put_part(&sheet.path, patched.into_bytes());
        self.put_part(&sheet_rels_path, sheet_rels.to_xml().into_bytes());

        let mut content_types = ContentTypes::parse(&self.part_str(CONTENT_TYPES_PART)?)?;
        content_types.ensure_default("png", CONTENT_TYPE_PNG);
        if new_drawing_rel_id.is_some() {
            content_types.ensure_override(&format!("/{}", drawing_path), CONTENT_TYPE_DRAWING);
        }
        self.put_part(CONTENT_TYPES_PART, content_types.to_xml().into_bytes());

        log::debug!(
            "{} に {} 枚を配置 (drawing: {})",
            sheet.path,
            placements.len(),
            drawing_path
        );

        Ok(())
    }
}

/// workbook.xml から (activeTab, [(シート名, r:id)]) を取り出す
fn parse_workbook_sheets(xml: &str) -> Result<(usize, Vec<(String, String)>)> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut active_tab = 0usize;
    let mut sheets = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"workbookView" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"activeTab" {
                            active_tab = attr_string(&attr).parse().unwrap_or(0);
                        }
                    }
                }
                b"sheet" => {
                    let mut name = None;
                    let mut rid = None;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"name" => name = Some(attr_string(&attr)),
                            _ if attr.key.local_name().as_ref() == b"id" => {
                                rid = Some(attr_string(&attr))
                            }
                            _ => {}
                        }
                    }
                    if let (Some(name), Some(rid)) = (name, rid) {
                        sheets.push((name, rid));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(EmbedError::DocumentParse(format!("workbook.xml: {}", e))),
            _ => {}
        }
    }

    Ok((active_tab, sheets))
}

/// 属性値（エスケープ解除済み）
pub(crate) fn attr_string(attr: &quick_xml::events::attributes::Attribute) -> String {
    let raw = String::from_utf8_lossy(&attr.value);
    match quick_xml::escape::unescape(&raw) {
        Ok(value) => value.into_owned(),
        Err(_) => raw.into_owned(),
    }
}

/// `xl/worksheets/sheet1.xml` → `xl/worksheets/_rels/sheet1.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// リレーションのターゲットをパッケージ内の絶対パスにする
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// `from_part` から見た `to_part` の相対パス
pub fn relative_target(from_part: &str, to_part: &str) -> String {
    let from_dir: Vec<&str> = match from_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let to: Vec<&str> = to_part.split('/').collect();

    let common = from_dir
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from_dir.len() - common];
    parts.extend_from_slice(&to[common..]);
    parts.join("/")
}

/// 1始まりの列番号 → 列記号（1 → A, 27 → AA）
pub fn column_letter(col: u32) -> String {
    let mut n = col;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// `"AB12"` → `(12, 28)`（行, 列、1始まり）
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let split = cell_ref.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell_ref.split_at(split);
    if letters.is_empty() {
        return None;
    }

    let mut col: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col.checked_mul(26)? + (c.to_ascii_uppercase() as u8 - b'A' + 1) as u32;
    }
    let row: u32 = digits.parse().ok()?;
    Some((row, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((1, 1)));
        assert_eq!(parse_cell_ref("AB12"), Some((12, 28)));
        assert_eq!(parse_cell_ref("ab12"), Some((12, 28)));
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("A"), None);
    }

    #[test]
    fn test_rels_path_for() {
        assert_eq!(rels_path_for("xl/worksheets/sheet1.xml"), "xl/worksheets/_rels/sheet1.xml.rels");
        assert_eq!(rels_path_for("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("xl/workbook.xml", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("xl/worksheets/sheet1.xml", "../drawings/drawing1.xml"), "xl/drawings/drawing1.xml");
        assert_eq!(resolve_target("xl/workbook.xml", "/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
    }

    #[test]
    fn test_relative_target() {
        assert_eq!(relative_target("xl/worksheets/sheet1.xml", "xl/drawings/drawing1.xml"), "../drawings/drawing1.xml");
        assert_eq!(relative_target("xl/drawings/drawing1.xml", "xl/media/image3.png"), "../media/image3.png");
        assert_eq!(relative_target("xl/workbook.xml", "xl/worksheets/sheet1.xml"), "worksheets/sheet1.xml");
    }

    #[test]
    fn test_parse_workbook_sheets() {
        let xml = r#"<?xml version="1.0"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<bookViews><workbookView activeTab="1"/></bookViews>
<sheets><sheet name="A &amp; B" sheetId="1" r:id="rId1"/><sheet name="Data" sheetId="2" r:id="rId2"/></sheets>
</workbook>"#;
        let (active, sheets) = parse_workbook_sheets(xml).unwrap();
        assert_eq!(active, 1);
        assert_eq!(sheets[0], ("A & B".to_string(), "rId1".to_string()));
        assert_eq!(sheets[1], ("Data".to_string(), "rId2".to_string()));
    }
}
