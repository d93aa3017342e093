//! レイアウト定数モジュール
//!
//! 画像埋め込み時の列幅・行高さ・表示サイズ。
//! 元画像のアスペクト比に関係なく固定サイズで配置する。

/// 画像列の列幅（Excel文字幅単位）
pub const IMAGE_COL_WIDTH: f64 = 15.0;

/// 画像を置く行の高さ（pt）
pub const IMAGE_ROW_HEIGHT_PT: f64 = 70.0;

/// 画像の表示幅（px）
pub const IMAGE_WIDTH_PX: u32 = 80;

/// 画像の表示高さ（px）
pub const IMAGE_HEIGHT_PX: u32 = 80;

/// 1px あたりの EMU（96dpi 基準）
pub const EMU_PER_PX: u64 = 9525;

/// フォルダ出力モードの先頭列ヘッダー
pub const IDENTIFIER_HEADER: &str = "identifier";

/// 画像列ヘッダー（1始まり）
pub fn image_header(ordinal: usize) -> String {
    format!("image{}", ordinal)
}

/// 表示幅（EMU）
pub fn image_width_emu() -> u64 {
    IMAGE_WIDTH_PX as u64 * EMU_PER_PX
}

/// 表示高さ（EMU）
pub fn image_height_emu() -> u64 {
    IMAGE_HEIGHT_PX as u64 * EMU_PER_PX
}
