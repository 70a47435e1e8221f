//! ファイルシステム上の画像プール
//!
//! プールはフラットなディレクトリで、直下のエントリ1つが画像1枚に対応する。

mod fs_pool;
pub use fs_pool::*;
