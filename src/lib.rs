//! photo-embed: アーカイブ画像を表ドキュメントの行に照合して埋め込む

pub mod archive;
pub mod cli;
pub mod config;
pub mod context;
pub mod convert;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod reader;
pub mod review;
pub mod scanner;
pub mod xlsx;
