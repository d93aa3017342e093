//! フォルダ一覧モード: 新規ドキュメントに1フォルダ1行で画像を並べる

use crate::error::{EmbedError, Result};
use photo_embed_common::layout::{
    image_header, IDENTIFIER_HEADER, IMAGE_COL_WIDTH, IMAGE_HEIGHT_PX, IMAGE_ROW_HEIGHT_PT,
    IMAGE_WIDTH_PX,
};
use photo_embed_common::{ItemKind, ItemOutcome, RunReport};
use rust_xlsxwriter::{Format, Image, ObjectMovement, Workbook, Worksheet};
use std::path::Path;

/// PNG化済みの画像
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// 元ファイル（ログ用）
    pub source: String,
    pub png: Vec<u8>,
}

/// 出力する1行
#[derive(Debug, Clone)]
pub struct FolderRow {
    /// 列1に書く名前（ASCII化済み）
    pub identifier: String,
    /// 画像。変換に失敗したものは None（列は詰めない）
    pub images: Vec<Option<EncodedImage>>,
}

/// 固定サイズに縮尺した画像を作る
fn sized_image(png: &[u8]) -> std::result::Result<Image, rust_xlsxwriter::XlsxError> {
    let image = Image::new_from_buffer(png)?;
    let scale_w = IMAGE_WIDTH_PX as f64 / image.width();
    let scale_h = IMAGE_HEIGHT_PX as f64 / image.height();
    Ok(image
        .set_scale_width(scale_w)
        .set_scale_height(scale_h)
        .set_object_movement(ObjectMovement::MoveButDontSizeWithCells))
}

fn place_image(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    image: &EncodedImage,
) -> std::result::Result<(), rust_xlsxwriter::XlsxError> {
    let sized = sized_image(&image.png)?;
    worksheet.insert_image(row, col, &sized)?;
    Ok(())
}

/// ドキュメントを作成して保存
///
/// 見出しの画像列数は全行の最大画像数。
pub fn write_folder_document(rows: &[FolderRow], output: &Path, report: &mut RunReport) -> Result<()> {
    let max_images = rows.iter().map(|r| r.images.len()).max().unwrap_or(0);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let header_format = Format::new().set_bold();
    worksheet
        .write_string_with_format(0, 0, IDENTIFIER_HEADER, &header_format)
        .map_err(|e| EmbedError::ExcelGeneration(format!("見出し書き込みエラー: {}", e)))?;

    for i in 0..max_images {
        let col = (i + 1) as u16;
        worksheet
            .write_string_with_format(0, col, image_header(i + 1), &header_format)
            .map_err(|e| EmbedError::ExcelGeneration(format!("見出し書き込みエラー: {}", e)))?;
        worksheet
            .set_column_width(col, IMAGE_COL_WIDTH)
            .map_err(|e| EmbedError::ExcelGeneration(format!("列幅設定エラー: {}", e)))?;
    }

    for (i, row) in rows.iter().enumerate() {
        let row_num = (i + 1) as u32;

        worksheet
            .write_string(row_num, 0, &row.identifier)
            .map_err(|e| EmbedError::ExcelGeneration(format!("値書き込みエラー: {}", e)))?;

        if !row.images.is_empty() {
            worksheet
                .set_row_height(row_num, IMAGE_ROW_HEIGHT_PT)
                .map_err(|e| EmbedError::ExcelGeneration(format!("行高さ設定エラー: {}", e)))?;
        }

        for (ordinal, image) in row.images.iter().enumerate() {
            let Some(image) = image else {
                continue;
            };
            let col = (ordinal + 1) as u16;
            let outcome = match place_image(worksheet, row_num, col, image) {
                Ok(()) => ItemOutcome::Done(()),
                Err(e) => {
                    let err = EmbedError::PerItemEmbed {
                        item: image.source.clone(),
                        reason: e.to_string(),
                    };
                    log::warn!("{}", err);
                    ItemOutcome::skipped(image.source.clone(), err)
                }
            };
            if report.record(ItemKind::Image, outcome).is_some() {
                report.images_placed += 1;
            }
        }
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    workbook
        .save(output)
        .map_err(|e| EmbedError::ExcelGeneration(format!("Excel保存エラー: {}", e)))?;

    Ok(())
}
