//! The build pipeline: typed stages wired into an explicit task graph.
//!
//! Each stage consumes the build tree left by its dependencies and may
//! produce a [`Manifest`] sub-pass. The graph owns the ordering
//! invariant of the whole pipeline: hash-producing stages run strictly
//! before reference-consuming stages for the same asset class.

mod graph;
mod stages;

pub use graph::{GraphReport, TaskGraph};
pub use stages::{development_graph, graph_for, production_graph};

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::BusterConfig;
use crate::core::BuildMode;
use crate::logger::ProgressLine;
use crate::rev::Manifest;

// ============================================================================
// Stage identity
// ============================================================================

/// Identity of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    CompileStyles,
    CompileScripts,
    CopyImages,
    CopyFonts,
    CopyMarkup,
    HashAssets,
    RewriteSources,
    CompressSources,
    RewriteMarkup,
}

impl StageId {
    pub const fn name(self) -> &'static str {
        match self {
            Self::CompileStyles => "compile-styles",
            Self::CompileScripts => "compile-scripts",
            Self::CopyImages => "copy-images",
            Self::CopyFonts => "copy-fonts",
            Self::CopyMarkup => "copy-markup",
            Self::HashAssets => "hash-assets",
            Self::RewriteSources => "rewrite-sources",
            Self::CompressSources => "compress-sources",
            Self::RewriteMarkup => "rewrite-markup",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Stage contract
// ============================================================================

/// A single pipeline stage.
pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    /// Stages that must complete before this one runs.
    fn deps(&self) -> &'static [StageId] {
        &[]
    }

    /// Execute against the shared context. Outputs from completed
    /// dependencies (manifest sub-passes) are available on `ctx`.
    fn run(&self, ctx: &StageContext) -> anyhow::Result<StageOutput>;
}

/// Shared, read-only stage input.
pub struct StageContext<'a> {
    pub config: &'a BusterConfig,
    pub mode: BuildMode,
    pub progress: Option<&'a ProgressLine>,
    /// Manifest sub-passes produced so far, in completion order.
    manifests: Vec<Manifest>,
}

impl<'a> StageContext<'a> {
    pub fn new(config: &'a BusterConfig, mode: BuildMode) -> Self {
        Self {
            config,
            mode,
            progress: None,
            manifests: vec![],
        }
    }

    pub fn with_progress(mut self, progress: Option<&'a ProgressLine>) -> Self {
        self.progress = progress;
        self
    }

    /// Record a completed hashing sub-pass (called by the graph).
    pub(crate) fn push_manifest(&mut self, manifest: Manifest) {
        self.manifests.push(manifest);
    }

    /// All sub-passes merged, later passes winning on collision.
    ///
    /// `None` when no hashing stage has completed - a failed or absent
    /// upstream pass means "no manifest available", never an empty one.
    pub fn merged_manifest(&self) -> Option<Manifest> {
        if self.manifests.is_empty() {
            return None;
        }
        let mut merged = Manifest::new();
        for manifest in &self.manifests {
            merged.merge(manifest.clone());
        }
        Some(merged)
    }

    /// Serialized manifest location in the build tree.
    pub fn manifest_path(&self) -> PathBuf {
        self.config
            .build
            .build_assets()
            .join(&self.config.build.rev.manifest)
    }

    /// Bump a progress counter if a progress line is attached.
    pub fn tick(&self, counter: &str) {
        if let Some(progress) = self.progress {
            progress.inc(counter);
        }
    }
}

/// Typed stage output.
#[derive(Debug, Default)]
pub struct StageOutput {
    /// Manifest sub-pass produced by a hashing stage.
    pub manifest: Option<Manifest>,
    /// Number of files this stage touched (for the build summary).
    pub files: usize,
}

impl StageOutput {
    pub fn files(files: usize) -> Self {
        Self {
            manifest: None,
            files,
        }
    }

    pub fn with_manifest(manifest: Manifest, files: usize) -> Self {
        Self {
            manifest: Some(manifest),
            files,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Graph execution errors. Every failure names the stage it happened in.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("stage `{stage}` failed: {error:#}")]
    Stage { stage: StageId, error: anyhow::Error },

    #[error("build aborted before stage `{stage}`")]
    Aborted { stage: StageId },

    #[error("stage `{stage}` depends on `{dep}`, which is not part of this build")]
    UnknownDependency { stage: StageId, dep: StageId },

    #[error("dependency cycle involving stage `{0}`")]
    Cycle(StageId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_at;
    use tempfile::TempDir;

    #[test]
    fn test_stage_id_names() {
        assert_eq!(StageId::HashAssets.to_string(), "hash-assets");
        assert_eq!(StageId::RewriteMarkup.to_string(), "rewrite-markup");
    }

    #[test]
    fn test_merged_manifest_none_without_subpasses() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path());
        let ctx = StageContext::new(&config, BuildMode::PRODUCTION);
        assert!(ctx.merged_manifest().is_none());
    }

    #[test]
    fn test_merged_manifest_later_pass_wins() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path());
        let mut ctx = StageContext::new(&config, BuildMode::PRODUCTION);

        let mut first = Manifest::new();
        first.insert("images/logo.png", "images/logo-aaaaaaaa.png");
        first.insert("stylesheets/site.min.css", "stylesheets/site.min-aaaaaaaa.css");
        ctx.push_manifest(first);

        let mut second = Manifest::new();
        second.insert("stylesheets/site.min.css", "stylesheets/site.min-bbbbbbbb.css");
        ctx.push_manifest(second);

        let merged = ctx.merged_manifest().unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged.get("stylesheets/site.min.css"),
            Some("stylesheets/site.min-bbbbbbbb.css")
        );
    }

    #[test]
    fn test_manifest_path() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path());
        let ctx = StageContext::new(&config, BuildMode::PRODUCTION);
        assert!(ctx.manifest_path().ends_with("build/assets/rev-manifest.json"));
    }
}
