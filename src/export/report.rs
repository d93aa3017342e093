//! 照合結果の一覧表

use crate::error::{EmbedError, Result};
use photo_embed_common::{Container, MatchResult};
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;

const REPORT_SHEET: &str = "match_result";

const REPORT_HEADERS: [&str; 7] = [
    "row",
    "customer",
    "tracking",
    "rfid",
    "container key",
    "container",
    "status",
];

/// 1行1結果で書き出す
pub fn write_match_report(results: &[MatchResult], containers: &[Container], output: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(REPORT_SHEET)
        .map_err(|e| EmbedError::ExcelGeneration(format!("シート名設定エラー: {}", e)))?;

    let header_format = Format::new().set_bold();
    for (col, header) in REPORT_HEADERS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *header, &header_format)
            .map_err(|e| EmbedError::ExcelGeneration(format!("見出し書き込みエラー: {}", e)))?;
    }

    for (i, result) in results.iter().enumerate() {
        let row = (i + 1) as u32;
        let container = result
            .container
            .as_ref()
            .and_then(|c| containers.get(c.index));
        let cells = [
            result.row.customer.as_str(),
            result.row.tracking_raw.as_str(),
            result.row.rfid.as_str(),
            container.map(|c| c.key.as_str()).unwrap_or(""),
            container.map(|c| c.name.as_str()).unwrap_or(""),
        ];

        worksheet
            .write_number(row, 0, result.row.row_index as f64)
            .map_err(|e| EmbedError::ExcelGeneration(format!("値書き込みエラー: {}", e)))?;
        for (offset, value) in cells.iter().enumerate() {
            worksheet
                .write_string(row, (offset + 1) as u16, *value)
                .map_err(|e| EmbedError::ExcelGeneration(format!("値書き込みエラー: {}", e)))?;
        }
        worksheet
            .write_string(row, 6, result.status.to_string())
            .map_err(|e| EmbedError::ExcelGeneration(format!("値書き込みエラー: {}", e)))?;
    }

    worksheet
        .autofit()
        .set_freeze_panes(1, 0)
        .map_err(|e| EmbedError::ExcelGeneration(format!("ウィンドウ枠固定エラー: {}", e)))?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    workbook
        .save(output)
        .map_err(|e| EmbedError::ExcelGeneration(format!("Excel保存エラー: {}", e)))?;

    Ok(())
}
