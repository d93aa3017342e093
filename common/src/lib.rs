//! Photo Embed Common Library
//!
//! ファイルIOを持たない照合ロジックと型

pub mod types;
pub mod layout;
pub mod error;
pub mod identifier;
pub mod matching;
pub mod report;

pub use types::{ColumnRoles, Container, ContainerRef, MatchResult, MatchStatus, RowRecord};
pub use error::{Error, Result};
pub use identifier::{extract_key, normalize, strip_non_ascii, ExtractionRule};
pub use matching::{apply_corrections, match_rows, Correction, MatchOptions};
pub use report::{ItemKind, ItemOutcome, RunReport, SkippedItem};
