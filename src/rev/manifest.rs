//! The rev manifest: original asset path -> hashed output path.
//!
//! Keys and values are paths relative to the build assets directory,
//! with forward slashes, e.g. `"images/logo.png": "images/logo-9f8c1a2b.png"`.
//! The manifest is serialized as a flat JSON object at a known location
//! in the build tree and consumed by the reference-rewriting stages.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Ordered mapping from original to hashed asset paths.
///
/// Append-only within a build pass. Sub-pass manifests are merged with
/// [`Manifest::merge`]; on a key collision the later manifest wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hashed asset.
    pub fn insert(&mut self, original: impl Into<String>, hashed: impl Into<String>) {
        self.entries.insert(original.into(), hashed.into());
    }

    /// Merge a later sub-pass into this manifest. Later entries win.
    pub fn merge(&mut self, later: Manifest) {
        self.entries.extend(later.entries);
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries.get(original).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Rewrite every occurrence of an original path in `text` to its
    /// hashed counterpart. Returns the rewritten text and the number of
    /// replacements made.
    ///
    /// Longer keys are applied first so that a key which is a substring
    /// of another (`site.css` vs `print/site.css`) never clobbers the
    /// longer match. Substrings that match no key are left untouched;
    /// external URLs therefore pass through unchanged. Applying the
    /// same manifest twice is a no-op because hashed values never
    /// contain their own key.
    pub fn apply(&self, text: &str) -> (String, usize) {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

        let mut result = text.to_string();
        let mut replaced = 0;
        for key in keys {
            let hashed = &self.entries[key];
            let count = result.matches(key).count();
            if count > 0 {
                result = result.replace(key, hashed);
                replaced += count;
            }
        }
        (result, replaced)
    }

    /// Serialize to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("failed to write manifest {}", path.display()))?;
        Ok(())
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let manifest = serde_json::from_str(&content)
            .with_context(|| format!("malformed manifest {}", path.display()))?;
        Ok(manifest)
    }
}
