//! Asset scanning functions (pure, no side effects).

use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use crate::config::BusterConfig;

use super::AssetKind;

/// A source file together with its computed output path and kind.
#[derive(Debug, Clone)]
pub struct AssetRoute {
    pub source: PathBuf,
    pub output: PathBuf,
    pub kind: AssetKind,
}

/// Scan the source assets directory (`src/assets`)
///
/// Returns all files found, with output paths mirrored into the build
/// assets directory (`build/assets`). Directory structure is preserved,
/// so `src/assets/images/logo.png` maps to `build/assets/images/logo.png`.
///
/// This function only reads the filesystem and returns data.
pub fn scan_source_assets(config: &BusterConfig) -> Vec<AssetRoute> {
    let source_assets = config.build.source_assets();
    let build_assets = config.build.build_assets();
    scan_mirrored(&source_assets, &build_assets, |_| true)
}

/// Scan the static HTML directory (`static/**/*.html`)
///
/// Output paths are mirrored into the build root, matching the
/// original tree layout (`static/about/index.html` -> `build/about/index.html`).
pub fn scan_markup(config: &BusterConfig) -> Vec<AssetRoute> {
    scan_mirrored(&config.build.static_dir, &config.build.output, |p| {
        AssetKind::from_path(p) == AssetKind::Markup
    })
}

/// Walk `base` and mirror matching files under `dest`.
fn scan_mirrored(
    base: &Path,
    dest: &Path,
    select: impl Fn(&Path) -> bool,
) -> Vec<AssetRoute> {
    if !base.exists() {
        return vec![];
    }

    let mut results: Vec<AssetRoute> = WalkDir::new(base)
        .skip_hidden(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| select(p))
        .map(|source| {
            let rel = source.strip_prefix(base).unwrap_or(&source).to_path_buf();
            AssetRoute {
                output: dest.join(&rel),
                kind: AssetKind::from_path(&source),
                source,
            }
        })
        .collect();

    // jwalk yields in parallel, so impose a stable order
    results.sort_by(|a, b| a.source.cmp(&b.source));
    results
}

/// Collect files under a directory matching a predicate, sorted.
///
/// Used by the revisioning stages to enumerate the build tree.
pub fn collect_files(dir: &Path, select: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    if !dir.exists() {
        return vec![];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .skip_hidden(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| select(p))
        .collect();

    files.sort();
    files
}
