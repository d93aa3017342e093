//! drawing パーツ（xdr:wsDr）の生成と追記
//!
//! 画像1枚 = oneCellAnchor 1つ。左上をセルに合わせ、サイズは固定。

use super::attr_string;
use crate::error::{EmbedError, Result};
use photo_embed_common::layout;
use quick_xml::events::Event;
use quick_xml::Reader;

const XDR_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// 画像1枚分のアンカー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// 1始まりの行
    pub row: u32,
    /// 1始まりの列
    pub col: u32,
    /// drawing の rels 内の画像ID
    pub rel_id: String,
    pub shape_id: u32,
}

fn anchor_xml(anchor: &Anchor, declare_ns: bool) -> String {
    let ns = if declare_ns {
        format!(" xmlns:xdr=\"{}\" xmlns:a=\"{}\" xmlns:r=\"{}\"", XDR_NS, A_NS, R_NS)
    } else {
        String::new()
    };

    format!(
        concat!(
            "<xdr:oneCellAnchor{ns}>",
            "<xdr:from><xdr:col>{col}</xdr:col><xdr:colOff>0</xdr:colOff>",
            "<xdr:row>{row}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>",
            "<xdr:ext cx=\"{cx}\" cy=\"{cy}\"/>",
            "<xdr:pic>",
            "<xdr:nvPicPr><xdr:cNvPr id=\"{id}\" name=\"Picture {id}\"/>",
            "<xdr:cNvPicPr><a:picLocks noChangeAspect=\"1\"/></xdr:cNvPicPr></xdr:nvPicPr>",
            "<xdr:blipFill><a:blip r:embed=\"{rel}\"/><a:stretch><a:fillRect/></a:stretch></xdr:blipFill>",
            "<xdr:spPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm>",
            "<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></xdr:spPr>",
            "</xdr:pic>",
            "<xdr:clientData/>",
            "</xdr:oneCellAnchor>"
        ),
        ns = ns,
        // xdr:from は0始まり
        col = anchor.col.saturating_sub(1),
        row = anchor.row.saturating_sub(1),
        cx = layout::image_width_emu(),
        cy = layout::image_height_emu(),
        id = anchor.shape_id,
        rel = anchor.rel_id,
    )
}

/// 新しい drawing パーツ
pub fn new_drawing(anchors: &[Anchor]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
    xml.push_str(&format!(
        "<xdr:wsDr xmlns:xdr=\"{}\" xmlns:a=\"{}\" xmlns:r=\"{}\">",
        XDR_NS, A_NS, R_NS
    ));
    for anchor in anchors {
        xml.push_str(&anchor_xml(anchor, false));
    }
    xml.push_str("</xdr:wsDr>");
    xml
}

/// 既存の drawing の末尾に追記
///
/// 既存側のプレフィックスが何であっても壊れないよう、各アンカーに名前空間を宣言する。
pub fn append_anchors(existing: &str, anchors: &[Anchor]) -> Result<String> {
    let trimmed = existing.trim_end();
    let close = trimmed
        .rfind("</")
        .filter(|&pos| trimmed[pos..].contains("wsDr"))
        .ok_or_else(|| EmbedError::Package("drawing パーツの終端が見つかりません".into()))?;

    let mut xml = String::with_capacity(existing.len() + anchors.len() * 1024);
    xml.push_str(&trimmed[..close]);
    for anchor in anchors {
        xml.push_str(&anchor_xml(anchor, true));
    }
    xml.push_str(&trimmed[close..]);
    Ok(xml)
}

/// 既存図形IDの最大値
pub fn max_shape_id(xml: &str) -> Result<u32> {
    let mut reader = Reader::from_str(xml);
    let mut max = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"cNvPr" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"id" {
                        if let Ok(id) = attr_string(&attr).parse::<u32>() {
                            max = max.max(id);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(EmbedError::Package(format!("drawing: {}", e))),
            _ => {}
        }
    }

    Ok(max)
}
