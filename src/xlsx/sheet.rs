//! ワークシートXMLの走査と書き換え
//!
//! quick-xml でイベント単位にコピーしながら、必要な箇所だけ差し替える。
//! 既存セルの値・書式・数式には触れない。

use super::{attr_string, column_letter, parse_cell_ref};
use crate::error::{EmbedError, Result};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// `<drawing>` はこれらより前に置く（CT_Worksheet の要素順）
const AFTER_DRAWING: &[&[u8]] = &[
    b"legacyDrawing",
    b"legacyDrawingHF",
    b"drawingHF",
    b"picture",
    b"oleObjects",
    b"controls",
    b"webPublishItems",
    b"tableParts",
    b"extLst",
];

/// シートの現状
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetInfo {
    /// セルが存在する最大行（1始まり、空シートは0）
    pub max_row: u32,
    /// セルが存在する最大列（1始まり、空シートは0）
    pub max_col: u32,
    /// 既存の `<drawing r:id>`
    pub drawing_rel_id: Option<String>,
    /// 1行目で値を持つ列
    pub header_filled: BTreeSet<u32>,
}

/// シートへの変更内容
#[derive(Debug, Clone, Default)]
pub struct SheetEdit {
    /// 1行目に書く見出し（列 → 文字列）。既に値がある列は書かない
    pub headers: BTreeMap<u32, String>,
    /// 列幅（文字数単位）
    pub column_widths: BTreeMap<u32, f64>,
    /// 行の高さ（pt）
    pub row_heights: BTreeMap<u32, f64>,
    /// 新しく参照させる drawing の r:id
    pub drawing_rel_id: Option<String>,
}

impl SheetEdit {
    fn header_cells(&self, info: &SheetInfo) -> Vec<(u32, &str)> {
        self.headers
            .iter()
            .filter(|(col, _)| !info.header_filled.contains(col))
            .map(|(col, label)| (*col, label.as_str()))
            .collect()
    }

    /// 変更対象になる行
    fn target_rows(&self, info: &SheetInfo) -> BTreeSet<u32> {
        let mut rows: BTreeSet<u32> = self.row_heights.keys().copied().collect();
        if !self.header_cells(info).is_empty() {
            rows.insert(1);
        }
        rows
    }

    fn max_col(&self) -> u32 {
        let header_max = self.headers.keys().max().copied().unwrap_or(0);
        let width_max = self.column_widths.keys().max().copied().unwrap_or(0);
        header_max.max(width_max)
    }
}

/// 最大行・列・drawing・1行目の使用状況を調べる
pub fn scan_sheet(xml: &str) -> Result<SheetInfo> {
    let mut reader = Reader::from_str(xml);
    let mut info = SheetInfo::default();

    let mut current_row: u32 = 0;
    let mut current_col: u32 = 0;
    // 1行目のセルの中にいる間、その列
    let mut header_cell: Option<u32> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| EmbedError::DocumentParse(format!("シートXML: {}", e)))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                match e.local_name().as_ref() {
                    b"row" => {
                        current_row = attr_u32(e, b"r").unwrap_or(current_row + 1);
                        current_col = 0;
                        // 属性だけの空行でも高さ設定があれば行数に数える
                        info.max_row = info.max_row.max(current_row);
                    }
                    b"c" => {
                        let (row, col) = attr_value(e, b"r")
                            .and_then(|r| parse_cell_ref(&r))
                            .unwrap_or((current_row, current_col + 1));
                        current_col = col;
                        info.max_row = info.max_row.max(row);
                        info.max_col = info.max_col.max(col);
                        header_cell = (is_start && row == 1).then_some(col);
                    }
                    b"v" | b"is" | b"f" => {
                        if let Some(col) = header_cell {
                            info.header_filled.insert(col);
                        }
                    }
                    b"drawing" => {
                        info.drawing_rel_id = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.local_name().as_ref() == b"id")
                            .map(|a| attr_string(&a));
                    }
                    _ => {}
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"c" => header_cell = None,
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(info)
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| attr_string(&a))
}

fn attr_u32(e: &BytesStart, key: &[u8]) -> Option<u32> {
    attr_value(e, key).and_then(|v| v.parse().ok())
}

/// エスケープ済みのまま属性を作る
fn raw_attr<'a>(key: &'a str, value: &'a str) -> Attribute<'a> {
    Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Borrowed(value.as_bytes()),
    }
}

/// `<col>` 1要素
#[derive(Debug, Clone, PartialEq)]
struct ColSpan {
    min: u32,
    max: u32,
    /// min/max 以外の属性（エスケープ済みの生値）
    attrs: Vec<(String, String)>,
}

impl ColSpan {
    fn from_element(e: &BytesStart) -> Option<Self> {
        let mut min = None;
        let mut max = None;
        let mut attrs = Vec::new();
        for attr in e.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&attr.value).into_owned();
            match key.as_str() {
                "min" => min = raw.parse().ok(),
                "max" => max = raw.parse().ok(),
                _ => attrs.push((key, raw)),
            }
        }
        let min = min?;
        Some(Self {
            min,
            max: max.unwrap_or(min),
            attrs,
        })
    }

    fn single(col: u32, attrs: Vec<(String, String)>) -> Self {
        Self {
            min: col,
            max: col,
            attrs,
        }
    }

    fn set_width(&mut self, width: f64) {
        self.attrs
            .retain(|(k, _)| k != "width" && k != "customWidth");
        self.attrs.push(("width".into(), format_number(width)));
        self.attrs.push(("customWidth".into(), "1".into()));
    }
}

/// 指定列の幅を設定する。既存の範囲指定は分割して他の列の設定を残す
fn apply_widths(mut spans: Vec<ColSpan>, widths: &BTreeMap<u32, f64>) -> Vec<ColSpan> {
    for (&col, &width) in widths {
        match spans.iter().position(|s| s.min <= col && col <= s.max) {
            Some(pos) => {
                let span = spans.remove(pos);
                let mut pieces = Vec::with_capacity(3);
                if span.min < col {
                    pieces.push(ColSpan {
                        min: span.min,
                        max: col - 1,
                        attrs: span.attrs.clone(),
                    });
                }
                let mut target = ColSpan::single(col, span.attrs.clone());
                target.set_width(width);
                pieces.push(target);
                if col < span.max {
                    pieces.push(ColSpan {
                        min: col + 1,
                        max: span.max,
                        attrs: span.attrs,
                    });
                }
                spans.splice(pos..pos, pieces);
            }
            None => {
                let mut target = ColSpan::single(col, Vec::new());
                target.set_width(width);
                spans.push(target);
            }
        }
    }
    spans.sort_by_key(|s| s.min);
    spans
}

fn format_number(value: f64) -> String {
    format!("{}", value)
}

/// 書き換え中の状態
struct Patcher<'e> {
    writer: Writer<Vec<u8>>,
    edit: &'e SheetEdit,
    /// 要素名の名前空間プレフィックス（`x:` など）
    prefix: String,
    header_cells: Vec<(u32, &'e str)>,
    /// まだ処理していない対象行
    pending_rows: BTreeSet<u32>,
    max_row: u32,
    max_col: u32,
}

impl<'e> Patcher<'e> {
    fn name(&self, local: &str) -> String {
        format!("{}{}", self.prefix, local)
    }

    fn write(&mut self, event: Event) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| EmbedError::Package(format!("シートXMLの書き出しに失敗: {}", e)))
    }

    fn write_cols(&mut self, spans: &[ColSpan]) -> Result<()> {
        let cols_name = self.name("cols");
        let col_name = self.name("col");
        self.write(Event::Start(BytesStart::new(cols_name.as_str())))?;
        for span in spans {
            let mut col = BytesStart::new(col_name.as_str());
            col.push_attribute(("min", span.min.to_string().as_str()));
            col.push_attribute(("max", span.max.to_string().as_str()));
            for (k, v) in &span.attrs {
                col.push_attribute(raw_attr(k, v));
            }
            self.write(Event::Empty(col))?;
        }
        self.write(Event::End(BytesEnd::new(cols_name.as_str())))
    }

    fn write_new_cols(&mut self) -> Result<()> {
        if self.edit.column_widths.is_empty() {
            return Ok(());
        }
        let spans = apply_widths(Vec::new(), &self.edit.column_widths);
        self.write_cols(&spans)
    }

    fn write_drawing(&mut self) -> Result<()> {
        if let Some(id) = &self.edit.drawing_rel_id {
            let mut drawing = BytesStart::new(self.name("drawing"));
            drawing.push_attribute(("r:id", id.as_str()));
            self.write(Event::Empty(drawing))?;
        }
        Ok(())
    }

    fn row_height(&self, row: u32) -> Option<f64> {
        self.edit.row_heights.get(&row).copied()
    }

    /// 既存 `<row>` の属性を必要に応じて書き換えた開始タグ
    fn rewrite_row(&self, e: &BytesStart, row: u32, adds_cells: bool) -> BytesStart<'static> {
        let height = self.row_height(row);
        let mut out = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
        for attr in e.attributes().flatten() {
            let key = attr.key.as_ref();
            if height.is_some() && (key == b"ht" || key == b"customHeight") {
                continue;
            }
            // セルを足す行の spans は古くなるので落とす
            if adds_cells && key == b"spans" {
                continue;
            }
            out.push_attribute(attr);
        }
        if let Some(h) = height {
            out.push_attribute(("ht", format_number(h).as_str()));
            out.push_attribute(("customHeight", "1"));
        }
        out
    }

    fn write_header_cells(&mut self) -> Result<()> {
        let cells = std::mem::take(&mut self.header_cells);
        let c = self.name("c");
        let is = self.name("is");
        let t = self.name("t");
        for (col, label) in &cells {
            let cell_ref = format!("{}1", column_letter(*col));
            let mut cell = BytesStart::new(c.as_str());
            cell.push_attribute(("r", cell_ref.as_str()));
            cell.push_attribute(("t", "inlineStr"));
            self.write(Event::Start(cell))?;
            self.write(Event::Start(BytesStart::new(is.as_str())))?;
            self.write(Event::Start(BytesStart::new(t.as_str())))?;
            self.write(Event::Text(BytesText::new(label)))?;
            self.write(Event::End(BytesEnd::new(t.as_str())))?;
            self.write(Event::End(BytesEnd::new(is.as_str())))?;
            self.write(Event::End(BytesEnd::new(c.as_str())))?;
        }
        Ok(())
    }

    /// シートに存在しない対象行を作る
    fn write_synthetic_row(&mut self, row: u32) -> Result<()> {
        let row_name = self.name("row");
        let mut start = BytesStart::new(row_name.as_str());
        start.push_attribute(("r", row.to_string().as_str()));
        if let Some(h) = self.row_height(row) {
            start.push_attribute(("ht", format_number(h).as_str()));
            start.push_attribute(("customHeight", "1"));
        }

        if row == 1 && !self.header_cells.is_empty() {
            self.write(Event::Start(start))?;
            self.write_header_cells()?;
            self.write(Event::End(BytesEnd::new(row_name.as_str())))
        } else {
            self.write(Event::Empty(start))
        }
    }

    /// `before` より前の未処理行を出力
    fn flush_rows_before(&mut self, before: u32) -> Result<()> {
        let rows: Vec<u32> = self.pending_rows.range(..before).copied().collect();
        for row in rows {
            self.pending_rows.remove(&row);
            self.write_synthetic_row(row)?;
        }
        Ok(())
    }

    fn flush_all_rows(&mut self) -> Result<()> {
        self.flush_rows_before(u32::MAX)
    }

    fn dimension_ref(&self, original: Option<String>) -> String {
        let start = original
            .as_deref()
            .map(|r| r.split(':').next().unwrap_or(r).to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "A1".to_string());
        format!(
            "{}:{}{}",
            start,
            column_letter(self.max_col.max(1)),
            self.max_row.max(1)
        )
    }
}

/// シートXMLに変更を適用する
pub fn patch_sheet(xml: &str, info: &SheetInfo, edit: &SheetEdit) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let header_cells = edit.header_cells(info);
    let pending_rows = edit.target_rows(info);
    let max_row = info
        .max_row
        .max(pending_rows.iter().max().copied().unwrap_or(0));
    let max_col = info.max_col.max(edit.max_col());

    let mut p = Patcher {
        writer: Writer::new(Vec::with_capacity(xml.len() + 4096)),
        edit,
        prefix: String::new(),
        header_cells,
        pending_rows,
        max_row,
        max_col,
    };

    let mut depth: usize = 0;
    let mut in_sheet_data = false;
    let mut cols_written = false;
    let mut drawing_written = edit.drawing_rel_id.is_none();
    let mut collecting_cols: Option<Vec<ColSpan>> = None;
    // 既存 row の中で、閉じタグ前に見出しセルを足す必要があるか
    let mut header_row_open = false;
    let mut last_row: u32 = 0;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| EmbedError::DocumentParse(format!("シートXML: {}", e)))?;

        // <cols> の中身は溜めて、閉じタグで書き直す
        if collecting_cols.is_some() {
            match &event {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"col" => {
                    if let (Some(spans), Some(span)) =
                        (collecting_cols.as_mut(), ColSpan::from_element(e))
                    {
                        spans.push(span);
                    }
                }
                Event::End(e) if e.local_name().as_ref() == b"cols" => {
                    let spans = collecting_cols.take().unwrap_or_default();
                    let merged = apply_widths(spans, &edit.column_widths);
                    p.write_cols(&merged)?;
                    cols_written = true;
                    depth -= 1;
                }
                Event::Eof => {
                    return Err(EmbedError::DocumentParse("シートXML: <cols> が閉じていません".into()))
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                let local = e.local_name().as_ref().to_vec();

                if depth == 0 && local.as_slice() == b"worksheet" {
                    let qname = e.name();
                    let full = String::from_utf8_lossy(qname.as_ref()).into_owned();
                    if let Some((prefix, _)) = full.split_once(':') {
                        p.prefix = format!("{}:", prefix);
                    }
                    let mut root = e.to_owned();
                    let has_r = e
                        .attributes()
                        .flatten()
                        .any(|a| a.key.as_ref() == b"xmlns:r");
                    if edit.drawing_rel_id.is_some() && !has_r {
                        root.push_attribute(("xmlns:r", R_NS));
                    }
                    p.write(if is_start { Event::Start(root) } else { Event::Empty(root) })?;
                } else if depth == 1 {
                    match local.as_slice() {
                        b"dimension" => {
                            let mut dim = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                            for attr in e.attributes().flatten() {
                                if attr.key.as_ref() != b"ref" {
                                    dim.push_attribute(attr);
                                }
                            }
                            let new_ref = p.dimension_ref(attr_value(e, b"ref"));
                            dim.push_attribute(("ref", new_ref.as_str()));
                            p.write(if is_start { Event::Start(dim) } else { Event::Empty(dim) })?;
                        }
                        b"cols" if is_start => {
                            collecting_cols = Some(Vec::new());
                        }
                        b"cols" => {
                            let merged = apply_widths(Vec::new(), &edit.column_widths);
                            if !merged.is_empty() {
                                p.write_cols(&merged)?;
                            }
                            cols_written = true;
                        }
                        b"sheetData" => {
                            if !cols_written {
                                p.write_new_cols()?;
                                cols_written = true;
                            }
                            if is_start {
                                in_sheet_data = true;
                                p.write(Event::Start(e.to_owned()))?;
                            } else {
                                let start = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                                let end_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                                p.write(Event::Start(start))?;
                                p.flush_all_rows()?;
                                p.write(Event::End(BytesEnd::new(end_name)))?;
                            }
                        }
                        name if !drawing_written && AFTER_DRAWING.contains(&name) => {
                            p.write_drawing()?;
                            drawing_written = true;
                            p.write(event.clone())?;
                        }
                        _ => p.write(event.clone())?,
                    }
                } else if in_sheet_data && depth == 2 && local.as_slice() == b"row" {
                    let row = attr_u32(e, b"r").unwrap_or(last_row + 1);
                    last_row = row;
                    p.flush_rows_before(row)?;
                    let targeted = p.pending_rows.remove(&row);
                    let adds_cells = row == 1 && !p.header_cells.is_empty();

                    if !targeted {
                        p.write(event.clone())?;
                    } else {
                        let rewritten = p.rewrite_row(e, row, adds_cells);
                        if is_start {
                            p.write(Event::Start(rewritten))?;
                            header_row_open = adds_cells;
                        } else if adds_cells {
                            let end_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                            p.write(Event::Start(rewritten))?;
                            p.write_header_cells()?;
                            p.write(Event::End(BytesEnd::new(end_name)))?;
                        } else {
                            p.write(Event::Empty(rewritten))?;
                        }
                    }
                } else {
                    p.write(event.clone())?;
                }

                if is_start {
                    depth += 1;
                }
            }
            Event::End(ref e) => {
                depth = depth.saturating_sub(1);
                let local = e.local_name().as_ref().to_vec();

                if in_sheet_data && depth == 2 && local.as_slice() == b"row" && header_row_open {
                    p.write_header_cells()?;
                    header_row_open = false;
                    p.write(event.clone())?;
                } else if depth == 1 && local.as_slice() == b"sheetData" {
                    p.flush_all_rows()?;
                    in_sheet_data = false;
                    p.write(event.clone())?;
                } else if depth == 0 && local.as_slice() == b"worksheet" {
                    if !drawing_written {
                        p.write_drawing()?;
                        drawing_written = true;
                    }
                    p.write(event.clone())?;
                } else {
                    p.write(event.clone())?;
                }
            }
            Event::Eof => break,
            other => p.write(other)?,
        }
    }

    String::from_utf8(p.writer.into_inner())
        .map_err(|e| EmbedError::Package(format!("シートXMLの書き出しに失敗: {}", e)))
}
