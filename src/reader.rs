//! 表ドキュメントの読み込み
//!
//! 1行目をヘッダーとしてキーワードで列の役割を決め、2行目以降を行レコードにする。
//! 行番号はシート上の物理行のまま保持する（埋め込み先の行になるため振り直さない）。

use crate::config::Config;
use crate::error::{EmbedError, Result};
use crate::xlsx::{SheetPart, XlsxPackage};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use photo_embed_common::{normalize, ColumnRoles, RowRecord};
use std::path::Path;

/// 読み込み結果
#[derive(Debug, Clone)]
pub struct DocumentData {
    /// 読み込んだシート
    pub sheet: SheetPart,
    pub roles: ColumnRoles,
    pub rows: Vec<RowRecord>,
}

/// ヘッダーキーワード
#[derive(Debug, Clone)]
pub struct HeaderKeywords {
    pub customer: Vec<String>,
    pub tracking: Vec<String>,
    pub rfid: Vec<String>,
}

impl HeaderKeywords {
    pub fn from_config(config: &Config) -> Self {
        let lower = |list: &[String]| list.iter().map(|k| k.to_lowercase()).collect();
        Self {
            customer: lower(&config.customer_keywords),
            tracking: lower(&config.tracking_keywords),
            rfid: lower(&config.rfid_keywords),
        }
    }
}

fn contains_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| !k.is_empty() && text.contains(k.as_str()))
}

/// ヘッダー文字列から列の役割を決める
///
/// 各役割は最初に一致した列。1つのヘッダーは customer → tracking → rfid の順に1役割だけ。
/// 見つからない役割は 1/2/3 列目（ヘッダーが無いと誤割り当てになり得る）。
pub fn resolve_roles(headers: &[String], keywords: &HeaderKeywords) -> ColumnRoles {
    let mut customer = None;
    let mut tracking = None;
    let mut rfid = None;

    for (i, header) in headers.iter().enumerate() {
        let col = i as u32 + 1;
        let lower = header.to_lowercase();

        if contains_any(&lower, &keywords.customer) {
            customer.get_or_insert(col);
        } else if contains_any(&lower, &keywords.tracking) {
            tracking.get_or_insert(col);
        } else if contains_any(&lower, &keywords.rfid) {
            rfid.get_or_insert(col);
        }
    }

    let defaults = ColumnRoles::default();
    ColumnRoles {
        customer: customer.unwrap_or(defaults.customer),
        tracking: tracking.unwrap_or(defaults.tracking),
        rfid: rfid.unwrap_or(defaults.rfid),
    }
}

/// セル値を文字列に（整数値の浮動小数は小数点なし）
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Data::Float(n) => format!("{}", n),
        Data::Int(n) => format!("{}", n),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        other => other.to_string(),
    }
}

/// シート上の (行, 列)（1始まり）の値
fn value_at(range: &Range<Data>, row: u32, col: u32) -> String {
    range
        .get_value((row - 1, col - 1))
        .map(cell_to_string)
        .unwrap_or_default()
}

/// 範囲からレコードを作る
pub fn rows_from_range(range: &Range<Data>, keywords: &HeaderKeywords) -> (ColumnRoles, Vec<RowRecord>) {
    let Some((_, end_col)) = range.end() else {
        return (ColumnRoles::default(), Vec::new());
    };
    let last_row = range.end().map(|(r, _)| r + 1).unwrap_or(0);

    let headers: Vec<String> = (1..=end_col + 1).map(|col| value_at(range, 1, col)).collect();
    let roles = resolve_roles(&headers, keywords);

    let mut rows = Vec::new();
    for row_index in 2..=last_row {
        let customer = value_at(range, row_index, roles.customer);
        let tracking = value_at(range, row_index, roles.tracking);
        let rfid = value_at(range, row_index, roles.rfid);

        let customer = customer.trim();
        let tracking = tracking.trim();
        let rfid = rfid.trim();

        if customer.is_empty() && tracking.is_empty() && rfid.is_empty() {
            continue;
        }

        rows.push(RowRecord {
            row_index,
            customer: customer.to_string(),
            tracking_raw: tracking.to_string(),
            tracking_clean: normalize(tracking),
            rfid: rfid.to_string(),
        });
    }

    (roles, rows)
}

/// アクティブシートを読み込む
pub fn read_document(path: &Path, keywords: &HeaderKeywords) -> Result<DocumentData> {
    if !path.exists() {
        return Err(EmbedError::MissingRequiredFile(format!(
            "表ドキュメント {}",
            path.display()
        )));
    }

    let sheet = XlsxPackage::open(path)?.active_sheet()?;

    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e: calamine::XlsxError| EmbedError::DocumentParse(e.to_string()))?;
    let range = workbook
        .worksheet_range(&sheet.name)
        .map_err(|e| EmbedError::DocumentParse(format!("{}: {}", sheet.name, e)))?;

    let (roles, rows) = rows_from_range(&range, keywords);

    log::info!(
        "Read {} rows from sheet '{}' (customer={}, tracking={}, rfid={})",
        rows.len(),
        sheet.name,
        roles.customer,
        roles.tracking,
        roles.rfid
    );

    Ok(DocumentData { sheet, roles, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use tempfile::tempdir;

    fn keywords() -> HeaderKeywords {
        HeaderKeywords::from_config(&Config::default())
    }

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_roles_by_keyword() {
        let roles = resolve_roles(&headers(&["备注", "RFID标签", "ELSA跟踪号", "客户代码"]), &keywords());
        assert_eq!(roles.customer, 4);
        assert_eq!(roles.tracking, 3);
        assert_eq!(roles.rfid, 2);
    }

    #[test]
    fn test_resolve_roles_first_match_wins() {
        let roles = resolve_roles(&headers(&["Tracking", "Customer", "tracking 2"]), &keywords());
        assert_eq!(roles.tracking, 1);
        assert_eq!(roles.customer, 2);
        assert_eq!(roles.rfid, 3);
    }

    #[test]
    fn test_resolve_roles_defaults() {
        let roles = resolve_roles(&headers(&["a", "b"]), &keywords());
        assert_eq!(roles, ColumnRoles::default());
    }

    #[test]
    fn test_one_header_one_role() {
        // customer が優先され、同じ列は tracking にならない
        let roles = resolve_roles(&headers(&["customer tracking"]), &keywords());
        assert_eq!(roles.customer, 1);
        assert_eq!(roles.tracking, 2);
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::Float(12345.0)), "12345");
        assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::String("AB-1".into())), "AB-1");
    }

    #[test]
    fn test_read_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("returns.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("退货").unwrap();
        sheet.write_string(0, 0, "客户").unwrap();
        sheet.write_string(0, 1, "ELSA").unwrap();
        sheet.write_string(0, 2, "RFID").unwrap();
        sheet.write_string(1, 0, "C1").unwrap();
        sheet.write_string(1, 1, " AB-123 ").unwrap();
        sheet.write_string(1, 2, "R1").unwrap();
        // 3行目は空行
        sheet.write_string(3, 0, "C2").unwrap();
        sheet.write_number(3, 1, 998877.0).unwrap();
        workbook.save(&path).unwrap();

        let data = read_document(&path, &keywords()).unwrap();
        assert_eq!(data.sheet.name, "退货");
        assert_eq!(data.rows.len(), 2);

        assert_eq!(data.rows[0].row_index, 2);
        assert_eq!(data.rows[0].tracking_raw, "AB-123");
        assert_eq!(data.rows[0].tracking_clean, "AB123");
        assert_eq!(data.rows[0].rfid, "R1");

        // 空行を飛ばしても行番号は物理行のまま
        assert_eq!(data.rows[1].row_index, 4);
        assert_eq!(data.rows[1].tracking_clean, "998877");
        assert_eq!(data.rows[1].rfid, "");
    }

    #[test]
    fn test_read_missing_document() {
        let err = read_document(Path::new("/nonexistent/doc.xlsx"), &keywords()).unwrap_err();
        assert!(matches!(err, EmbedError::MissingRequiredFile(_)));
    }

    #[test]
    fn test_read_unreadable_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a spreadsheet").unwrap();
        let err = read_document(&path, &keywords()).unwrap_err();
        assert!(matches!(err, EmbedError::DocumentParse(_)));
    }
}
