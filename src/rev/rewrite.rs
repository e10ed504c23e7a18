//! Reference rewriting: point text assets at hashed filenames.
//!
//! Matching is textual (the manifest key as a substring), the same
//! contract the manifest keys are designed for: keys are relative to
//! the build assets directory, so both `url(../images/logo.png)` in CSS
//! and `src="assets/images/logo.png"` in HTML contain a key. Anything
//! that matches no key - external URLs, absolute CDN paths - is left
//! untouched.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;

use super::Manifest;

/// Rewrite one file in place against a manifest.
///
/// Returns `true` if the file changed. The file is only written when a
/// reference was actually replaced, so rewriting is cheap and
/// idempotent: a second pass with the same manifest is a no-op.
pub fn rewrite_file(path: &Path, manifest: &Manifest) -> Result<bool> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let (rewritten, replaced) = manifest.apply(&content);
    if replaced == 0 {
        return Ok(false);
    }

    fs::write(path, rewritten)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

/// Rewrite every file under `root` selected by `select`.
///
/// Returns the number of files that changed. Fails on the first
/// unreadable file, reporting its path.
pub fn rewrite_tree(
    root: &Path,
    manifest: &Manifest,
    select: impl Fn(&Path) -> bool + Sync,
) -> Result<usize> {
    let files = crate::asset::collect_files(root, select);

    let changed = files
        .par_iter()
        .map(|path| rewrite_file(path, manifest))
        .collect::<Result<Vec<bool>>>()?;

    Ok(changed.into_iter().filter(|c| *c).count())
}
