//! `[build]` and `[build.rev]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! source = "src"      # source tree; assets under src/assets/
//! static = "static"   # static HTML tree
//! output = "build"    # build tree; assets under build/assets/
//! minify = true
//!
//! [build.rev]
//! exclude = ["eot", "woff", "ttf"]   # extensions never hashed
//! manifest = "rev-manifest.json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Build settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSectionConfig {
    /// Source tree root. Assets are expected under `<source>/assets/`,
    /// with stylesheets in `assets/stylesheets` and scripts in
    /// `assets/javascripts`.
    pub source: PathBuf,

    /// Static HTML tree, copied to the build root.
    #[serde(rename = "static")]
    pub static_dir: PathBuf,

    /// Build tree root.
    pub output: PathBuf,

    /// Minify stylesheets and scripts into `.min` siblings.
    pub minify: bool,

    /// Clean output directory before building (CLI only).
    #[serde(skip)]
    pub clean: bool,

    /// Asset revisioning settings.
    pub rev: RevConfig,
}

impl Default for BuildSectionConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("src"),
            static_dir: PathBuf::from("static"),
            output: PathBuf::from("build"),
            minify: true,
            clean: false,
            rev: RevConfig::default(),
        }
    }
}

impl BuildSectionConfig {
    /// Source assets directory: `<source>/assets`.
    pub fn source_assets(&self) -> PathBuf {
        self.source.join("assets")
    }

    /// Build assets directory: `<output>/assets`.
    pub fn build_assets(&self) -> PathBuf {
        self.output.join("assets")
    }

    /// Normalize path fields to absolute, relative to the project root.
    pub fn normalize(&mut self, root: &Path) {
        self.source = crate::utils::path::normalize_path(&root.join(&self.source));
        self.static_dir = crate::utils::path::normalize_path(&root.join(&self.static_dir));
        self.output = crate::utils::path::normalize_path(&root.join(&self.output));
    }

    /// Check path safety before normalization (relative, no `..`).
    ///
    /// MUST be called before `normalize()` - after normalization all
    /// paths are absolute, making this check meaningless.
    pub fn validate_paths(&self, errors: &mut Vec<String>) {
        for (field, path) in [
            ("build.source", &self.source),
            ("build.static", &self.static_dir),
            ("build.output", &self.output),
        ] {
            validate_path_safety(field, path, errors);
        }
    }
}

/// Check a single path for unsafe components (`..` or absolute).
fn validate_path_safety(field: &str, path: &Path, errors: &mut Vec<String>) {
    use std::path::Component;

    for comp in path.components() {
        let reason = match comp {
            Component::ParentDir => Some("parent directory '..' not allowed"),
            Component::Prefix(_) | Component::RootDir => Some("absolute paths not allowed"),
            _ => None,
        };
        if let Some(reason) = reason {
            errors.push(format!("{field} = '{}': {reason}", path.display()));
        }
    }
}

// ============================================================================
// Rev
// ============================================================================

/// Asset revisioning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevConfig {
    /// File extensions excluded from hashing (lowercase, without dot).
    ///
    /// Stylesheets and scripts are always hashed in their own later
    /// sub-pass, never here.
    pub exclude: Vec<String>,

    /// Manifest file name, written into the build assets directory.
    pub manifest: String,
}

impl Default for RevConfig {
    fn default() -> Self {
        Self {
            exclude: vec![],
            manifest: "rev-manifest.json".to_string(),
        }
    }
}

impl RevConfig {
    /// Check whether an extension is excluded from hashing.
    pub fn is_excluded(&self, ext: &str) -> bool {
        self.exclude.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_build_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.build.source, PathBuf::from("src"));
        assert_eq!(config.build.static_dir, PathBuf::from("static"));
        assert_eq!(config.build.output, PathBuf::from("build"));
        assert!(config.build.minify);
        assert!(config.build.rev.exclude.is_empty());
        assert_eq!(config.build.rev.manifest, "rev-manifest.json");
    }

    #[test]
    fn test_build_static_rename() {
        let config = test_parse_config("[build]\nstatic = \"pages\"");
        assert_eq!(config.build.static_dir, PathBuf::from("pages"));
    }

    #[test]
    fn test_rev_exclude() {
        let config = test_parse_config("[build.rev]\nexclude = [\"eot\", \"woff\", \"ttf\"]");
        assert!(config.build.rev.is_excluded("woff"));
        assert!(config.build.rev.is_excluded("WOFF"));
        assert!(!config.build.rev.is_excluded("png"));
    }

    #[test]
    fn test_asset_dirs() {
        let build = BuildSectionConfig::default();
        assert_eq!(build.source_assets(), PathBuf::from("src/assets"));
        assert_eq!(build.build_assets(), PathBuf::from("build/assets"));
    }

    #[test]
    fn test_validate_paths_rejects_parent_dir() {
        let config = test_parse_config("[build]\noutput = \"../build\"");
        let mut errors = Vec::new();
        config.build.validate_paths(&mut errors);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("build.output"));
    }

    #[test]
    fn test_validate_paths_rejects_absolute() {
        let config = test_parse_config("[build]\nsource = \"/abs/src\"");
        let mut errors = Vec::new();
        config.build.validate_paths(&mut errors);
        assert!(!errors.is_empty());
        assert!(errors[0].contains("absolute"));
    }
}
