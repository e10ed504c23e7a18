//! Content-addressed filenames for built assets.
//!
//! `logo.png` whose contents fingerprint to `9f8c1a2b` gets a hashed
//! sibling `logo-9f8c1a2b.png`; the manifest records the pair. The
//! original file is left in place (references that were never rewritten
//! keep working during incremental development).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;

use crate::utils::hash::{FINGERPRINT_LEN, fingerprint_file};

use super::Manifest;

/// Build the hashed file name for a fingerprint:
/// `logo.png` + `9f8c1a2b` -> `logo-9f8c1a2b.png`.
pub fn hashed_file_name(path: &Path, fingerprint: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-{fingerprint}.{ext}"),
        None => format!("{stem}-{fingerprint}"),
    };
    path.with_file_name(name)
}

/// Check whether a file name already carries a content fingerprint
/// (stem ending in `-xxxxxxxx` with 8 hex chars).
///
/// Re-running the hasher over an unclean build tree must not hash the
/// hashed copies again.
pub fn is_revved(path: &Path) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    let Some((_, suffix)) = stem.rsplit_once('-') else {
        return false;
    };
    suffix.len() == FINGERPRINT_LEN && suffix.chars().all(|c| c.is_ascii_hexdigit())
}

/// Hash a single asset: fingerprint its contents and write the hashed
/// copy next to it. Returns the hashed path.
///
/// Idempotent: unchanged contents produce the same hashed name, and the
/// copy simply overwrites an identical file.
pub fn hash_asset(path: &Path) -> Result<PathBuf> {
    let fingerprint = fingerprint_file(path)?;
    let hashed = hashed_file_name(path, &fingerprint);
    fs::copy(path, &hashed)
        .with_context(|| format!("failed to write {}", hashed.display()))?;
    Ok(hashed)
}

/// Hash every file under `base` selected by `select`, producing a
/// manifest keyed by `base`-relative paths (forward slashes).
///
/// Files that already carry a fingerprint are skipped. The whole pass
/// fails on the first unreadable asset, reporting its path; no partial
/// manifest escapes a failed pass.
pub fn hash_tree(
    base: &Path,
    select: impl Fn(&Path) -> bool + Sync,
) -> Result<Manifest> {
    let files = crate::asset::collect_files(base, |p| !is_revved(p) && select(p));

    let entries: Vec<(String, String)> = files
        .par_iter()
        .map(|path| {
            let hashed = hash_asset(path)?;
            Ok((rel_key(base, path)?, rel_key(base, &hashed)?))
        })
        .collect::<Result<_>>()?;

    let mut manifest = Manifest::new();
    for (original, hashed) in entries {
        manifest.insert(original, hashed);
    }
    Ok(manifest)
}

/// Manifest key: path relative to the hashing base, forward slashes.
fn rel_key(base: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(base)
        .map_err(|_| anyhow!("{} is outside {}", path.display(), base.display()))?;
    Ok(rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}
