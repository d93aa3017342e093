//! `.rels` と `[Content_Types].xml` の読み書き

use super::attr_string;
use crate::error::{EmbedError, Result};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub target_mode: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut items = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut rel = Relationship {
                        id: String::new(),
                        rel_type: String::new(),
                        target: String::new(),
                        target_mode: None,
                    };
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Id" => rel.id = attr_string(&attr),
                            b"Type" => rel.rel_type = attr_string(&attr),
                            b"Target" => rel.target = attr_string(&attr),
                            b"TargetMode" => rel.target_mode = Some(attr_string(&attr)),
                            _ => {}
                        }
                    }
                    items.push(rel);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(EmbedError::Package(format!("rels: {}", e))),
                _ => {}
            }
        }

        Ok(Self { items })
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `rId{N}` のうち未使用のもの（既存の最大番号 + 1）
    fn next_id(&self) -> String {
        let max = self
            .items
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);

        let mut n = max + 1;
        while self.get(&format!("rId{}", n)).is_some() {
            n += 1;
        }
        format!("rId{}", n)
    }

    /// 追加して割り当てたIDを返す
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let id = self.next_id();
        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            target_mode: None,
        });
        id
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
        xml.push_str(&format!("<Relationships xmlns=\"{}\">", RELS_NS));
        for rel in &self.items {
            xml.push_str(&format!(
                "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"",
                escape(rel.id.as_str()),
                escape(rel.rel_type.as_str()),
                escape(rel.target.as_str())
            ));
            if let Some(mode) = &rel.target_mode {
                xml.push_str(&format!(" TargetMode=\"{}\"", escape(mode.as_str())));
            }
            xml.push_str("/>");
        }
        xml.push_str("</Relationships>");
        xml
    }
}

/// `[Content_Types].xml`
#[derive(Debug, Clone, Default)]
pub struct ContentTypes {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut types = Self::default();

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    let kind = e.local_name().as_ref().to_vec();
                    let mut key = String::new();
                    let mut content_type = String::new();
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Extension" | b"PartName" => key = attr_string(&attr),
                            b"ContentType" => content_type = attr_string(&attr),
                            _ => {}
                        }
                    }
                    match kind.as_slice() {
                        b"Default" => types.defaults.push((key, content_type)),
                        b"Override" => types.overrides.push((key, content_type)),
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(EmbedError::Package(format!("[Content_Types].xml: {}", e))),
                _ => {}
            }
        }

        Ok(types)
    }

    /// 拡張子の既定型（大文字小文字無視で既にあれば何もしない）
    pub fn ensure_default(&mut self, extension: &str, content_type: &str) {
        if !self
            .defaults
            .iter()
            .any(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        {
            self.defaults
                .push((extension.to_string(), content_type.to_string()));
        }
    }

    pub fn ensure_override(&mut self, part_name: &str, content_type: &str) {
        if !self.overrides.iter().any(|(part, _)| part == part_name) {
            self.overrides
                .push((part_name.to_string(), content_type.to_string()));
        }
    }

    #[cfg(test)]
    fn default_for(&self, extension: &str) -> Option<&str> {
        self.defaults
            .iter()
            .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
            .map(|(_, ct)| ct.as_str())
    }

    #[cfg(test)]
    fn override_for(&self, part_name: &str) -> Option<&str> {
        self.overrides
            .iter()
            .find(|(part, _)| part == part_name)
            .map(|(_, ct)| ct.as_str())
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
        xml.push_str(&format!("<Types xmlns=\"{}\">", CONTENT_TYPES_NS));
        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(
                "<Default Extension=\"{}\" ContentType=\"{}\"/>",
                escape(ext.as_str()),
                escape(ct.as_str())
            ));
        }
        for (part, ct) in &self.overrides {
            xml.push_str(&format!(
                "<Override PartName=\"{}\" ContentType=\"{}\"/>",
                escape(part.as_str()),
                escape(ct.as_str())
            ));
        }
        xml.push_str("</Types>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments" Target="../comments1.xml"/>
</Relationships>"#;

    #[test]
    fn test_parse_and_add() {
        let mut rels = Relationships::parse(SHEET_RELS).unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels.get("rId1").unwrap().target, "https://example.com/?a=1&b=2");
        assert_eq!(rels.get("rId1").unwrap().target_mode.as_deref(), Some("External"));

        let id = rels.add("drawing-type", "../drawings/drawing1.xml");
        assert_eq!(id, "rId4");
        assert_eq!(rels.get("rId4").unwrap().target, "../drawings/drawing1.xml");
    }

    #[test]
    fn test_to_xml_round_trips_escaping() {
        let rels = Relationships::parse(SHEET_RELS).unwrap();
        let xml = rels.to_xml();
        assert!(xml.contains("a=1&amp;b=2"));
        assert!(xml.contains("TargetMode=\"External\""));

        let reparsed = Relationships::parse(&xml).unwrap();
        assert_eq!(reparsed.get("rId1"), rels.get("rId1"));
        assert_eq!(reparsed.get("rId3"), rels.get("rId3"));
    }

    #[test]
    fn test_empty_rels_start_at_one() {
        let mut rels = Relationships::default();
        assert!(rels.is_empty());
        assert_eq!(rels.add("t", "x"), "rId1");
        assert_eq!(rels.add("t", "y"), "rId2");
    }

    #[test]
    fn test_content_types() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="PNG" ContentType="image/png"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
</Types>"#;
        let mut types = ContentTypes::parse(xml).unwrap();
        types.ensure_default("png", "image/png");
        types.ensure_default("jpeg", "image/jpeg");
        types.ensure_override("/xl/drawings/drawing1.xml", "application/vnd.openxmlformats-officedocument.drawing+xml");
        types.ensure_override("/xl/drawings/drawing1.xml", "application/vnd.openxmlformats-officedocument.drawing+xml");

        let out = ContentTypes::parse(&types.to_xml()).unwrap();
        assert_eq!(out.defaults.len(), 3);
        assert_eq!(out.overrides.len(), 2);
        assert_eq!(out.default_for("png"), Some("image/png"));
        assert_eq!(
            out.override_for("/xl/drawings/drawing1.xml"),
            Some("application/vnd.openxmlformats-officedocument.drawing+xml")
        );
    }
}
