//! Asset classification, scanning and processing.

mod kind;
pub mod minify;
mod process;
mod scan;

pub use kind::AssetKind;
pub use process::{compile_script, compile_stylesheet, copy_asset};
pub use scan::{AssetRoute, collect_files, scan_markup, scan_source_assets};
