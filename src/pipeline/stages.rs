//! Concrete pipeline stages and build-target graph construction.

use anyhow::{Context, Result, bail};
use rayon::prelude::*;

use crate::asset::{
    AssetKind, AssetRoute, compile_script, compile_stylesheet, copy_asset, scan_markup,
    scan_source_assets,
};
use crate::rev::{self, Manifest};
use crate::utils::path::extension;

use super::{Stage, StageContext, StageId, StageOutput, TaskGraph};

// ============================================================================
// Compile stages
// ============================================================================

/// Compile stylesheets into the build tree (plus `.min.css` siblings).
pub struct CompileStyles;

impl Stage for CompileStyles {
    fn id(&self) -> StageId {
        StageId::CompileStyles
    }

    fn run(&self, ctx: &StageContext) -> Result<StageOutput> {
        compile_kind(ctx, AssetKind::Stylesheet, |route, minify| {
            compile_stylesheet(route, minify)
        })
    }
}

/// Compile scripts into the build tree (plus `.min.js` siblings).
pub struct CompileScripts;

impl Stage for CompileScripts {
    fn id(&self) -> StageId {
        StageId::CompileScripts
    }

    fn run(&self, ctx: &StageContext) -> Result<StageOutput> {
        compile_kind(ctx, AssetKind::Script, |route, minify| {
            compile_script(route, minify)
        })
    }
}

/// Copy images into the build tree.
pub struct CopyImages;

impl Stage for CopyImages {
    fn id(&self) -> StageId {
        StageId::CopyImages
    }

    fn run(&self, ctx: &StageContext) -> Result<StageOutput> {
        compile_kind(ctx, AssetKind::Image, |route, _| copy_asset(route))
    }
}

/// Copy fonts into the build tree.
pub struct CopyFonts;

impl Stage for CopyFonts {
    fn id(&self) -> StageId {
        StageId::CopyFonts
    }

    fn run(&self, ctx: &StageContext) -> Result<StageOutput> {
        compile_kind(ctx, AssetKind::Font, |route, _| copy_asset(route))
    }
}

/// Copy static HTML into the build root.
pub struct CopyMarkup;

impl Stage for CopyMarkup {
    fn id(&self) -> StageId {
        StageId::CopyMarkup
    }

    fn run(&self, ctx: &StageContext) -> Result<StageOutput> {
        let routes = scan_markup(ctx.config);
        process_routes(ctx, &routes, |route, _| copy_asset(route))
    }
}

/// Run one compile stage over all source assets of a kind.
fn compile_kind(
    ctx: &StageContext,
    kind: AssetKind,
    process: impl Fn(&AssetRoute, bool) -> Result<()> + Sync,
) -> Result<StageOutput> {
    let routes: Vec<_> = scan_source_assets(ctx.config)
        .into_iter()
        .filter(|r| r.kind == kind)
        .collect();
    process_routes(ctx, &routes, process)
}

fn process_routes(
    ctx: &StageContext,
    routes: &[AssetRoute],
    process: impl Fn(&AssetRoute, bool) -> Result<()> + Sync,
) -> Result<StageOutput> {
    let minify = ctx.config.build.minify;
    routes.par_iter().try_for_each(|route| {
        process(route, minify)?;
        ctx.tick(route.kind.label());
        Ok::<_, anyhow::Error>(())
    })?;
    Ok(StageOutput::files(routes.len()))
}

// ============================================================================
// Revisioning stages
// ============================================================================

/// Hash built binary assets and serialize the manifest.
///
/// Stylesheets and scripts are never hashed here - their bytes are not
/// final until their own references have been rewritten. Configured
/// exclusion extensions are skipped entirely.
pub struct HashAssets;

/// The compile stages that must have fully produced the build tree
/// before any hashing starts.
const COMPILE_STAGES: [StageId; 5] = [
    StageId::CompileStyles,
    StageId::CompileScripts,
    StageId::CopyImages,
    StageId::CopyFonts,
    StageId::CopyMarkup,
];

impl Stage for HashAssets {
    fn id(&self) -> StageId {
        StageId::HashAssets
    }

    fn deps(&self) -> &'static [StageId] {
        &COMPILE_STAGES
    }

    fn run(&self, ctx: &StageContext) -> Result<StageOutput> {
        let build_assets = ctx.config.build.build_assets();
        let rev_config = &ctx.config.build.rev;

        let manifest = rev::hash_tree(&build_assets, |path| {
            let kind = AssetKind::from_path(path);
            if matches!(kind, AssetKind::Stylesheet | AssetKind::Script) {
                return false;
            }
            // A manifest left behind by a previous pass is not an asset
            if path.file_name().and_then(|n| n.to_str()) == Some(rev_config.manifest.as_str()) {
                return false;
            }
            match extension(path) {
                Some(ext) => !rev_config.is_excluded(&ext),
                None => true,
            }
        })?;

        manifest.save(&ctx.manifest_path())?;

        let files = manifest.len();
        Ok(StageOutput::with_manifest(manifest, files))
    }
}

/// Rewrite references inside built stylesheets and scripts.
pub struct RewriteSources;

impl Stage for RewriteSources {
    fn id(&self) -> StageId {
        StageId::RewriteSources
    }

    fn deps(&self) -> &'static [StageId] {
        &[StageId::HashAssets]
    }

    fn run(&self, ctx: &StageContext) -> Result<StageOutput> {
        let manifest = require_manifest(ctx)?;
        let changed = rev::rewrite_tree(&ctx.config.build.output, &manifest, |path| {
            matches!(
                AssetKind::from_path(path),
                AssetKind::Stylesheet | AssetKind::Script
            ) && !rev::is_revved(path)
        })?;
        Ok(StageOutput::files(changed))
    }
}

/// Re-minify the rewritten stylesheets/scripts, then hash them.
///
/// Rewriting changed their bytes, so this is the first point at which
/// their hashed names are stable; the sub-pass is merged over the
/// binary-asset manifest and the serialized manifest is updated for
/// the HTML pass.
pub struct CompressSources;

impl Stage for CompressSources {
    fn id(&self) -> StageId {
        StageId::CompressSources
    }

    fn deps(&self) -> &'static [StageId] {
        &[StageId::RewriteSources]
    }

    fn run(&self, ctx: &StageContext) -> Result<StageOutput> {
        require_manifest(ctx)?;

        let build_assets = ctx.config.build.build_assets();
        let rev_config = &ctx.config.build.rev;

        let sources = crate::asset::collect_files(&build_assets, |path| {
            matches!(
                AssetKind::from_path(path),
                AssetKind::Stylesheet | AssetKind::Script
            ) && !rev::is_revved(path)
        });

        if ctx.config.build.minify {
            sources
                .par_iter()
                .filter(|p| is_min_file(p))
                .try_for_each(|path| recompress(path))?;
        }

        let sub_pass = rev::hash_tree(&build_assets, |path| {
            matches!(
                AssetKind::from_path(path),
                AssetKind::Stylesheet | AssetKind::Script
            ) && extension(path).is_none_or(|ext| !rev_config.is_excluded(&ext))
        })?;

        // Keep the serialized manifest in sync for the HTML pass
        let manifest_path = ctx.manifest_path();
        let mut merged = Manifest::load(&manifest_path)
            .context("no manifest available from hash-assets")?;
        merged.merge(sub_pass.clone());
        merged.save(&manifest_path)?;

        let files = sub_pass.len();
        Ok(StageOutput::with_manifest(sub_pass, files))
    }
}

/// Rewrite references inside built HTML, against the merged manifest.
pub struct RewriteMarkup;

impl Stage for RewriteMarkup {
    fn id(&self) -> StageId {
        StageId::RewriteMarkup
    }

    fn deps(&self) -> &'static [StageId] {
        &[StageId::CompressSources]
    }

    fn run(&self, ctx: &StageContext) -> Result<StageOutput> {
        let manifest = require_manifest(ctx)?;
        let changed = rev::rewrite_tree(&ctx.config.build.output, &manifest, |path| {
            AssetKind::from_path(path) == AssetKind::Markup
        })?;
        Ok(StageOutput::files(changed))
    }
}

fn require_manifest(ctx: &StageContext) -> Result<Manifest> {
    match ctx.merged_manifest() {
        Some(manifest) => Ok(manifest),
        None => bail!("no manifest available; hash-assets has not completed"),
    }
}

fn is_min_file(path: &std::path::Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(".min"))
}

/// Minify a rewritten `.min` file in place.
fn recompress(path: &std::path::Path) -> Result<()> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let minified = match AssetKind::from_path(path) {
        AssetKind::Stylesheet => crate::asset::minify::minify_css(&source),
        AssetKind::Script => crate::asset::minify::minify_js(&source),
        _ => return Ok(()),
    }
    .with_context(|| format!("in {}", path.display()))?;
    std::fs::write(path, minified)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

// ============================================================================
// Build targets
// ============================================================================

/// Development build: compile subsequence only.
pub fn development_graph() -> TaskGraph {
    graph_for(&COMPILE_STAGES)
}

/// Production build: the full pipeline.
pub fn production_graph() -> TaskGraph {
    let mut graph = development_graph();
    graph.push(HashAssets);
    graph.push(RewriteSources);
    graph.push(CompressSources);
    graph.push(RewriteMarkup);
    graph
}

/// Build a graph from a set of stage ids (watch mode re-runs only the
/// stages owning the changed files).
pub fn graph_for(ids: &[StageId]) -> TaskGraph {
    let mut graph = TaskGraph::new();
    for id in ids {
        match id {
            StageId::CompileStyles => graph.push(CompileStyles),
            StageId::CompileScripts => graph.push(CompileScripts),
            StageId::CopyImages => graph.push(CopyImages),
            StageId::CopyFonts => graph.push(CopyFonts),
            StageId::CopyMarkup => graph.push(CopyMarkup),
            StageId::HashAssets => graph.push(HashAssets),
            StageId::RewriteSources => graph.push(RewriteSources),
            StageId::CompressSources => graph.push(CompressSources),
            StageId::RewriteMarkup => graph.push(RewriteMarkup),
        }
    }
    graph
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BusterConfig, test_config_at};
    use crate::core::BuildMode;
    use crate::pipeline::GraphError;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Lay out a small project: a stylesheet referencing an image and an
    /// external URL, a script, an image, a font, and an HTML page
    /// referencing the minified stylesheet and the image.
    fn write_site(root: &Path) {
        let assets = root.join("src/assets");
        fs::create_dir_all(assets.join("stylesheets")).unwrap();
        fs::create_dir_all(assets.join("javascripts")).unwrap();
        fs::create_dir_all(assets.join("images")).unwrap();
        fs::create_dir_all(assets.join("fonts")).unwrap();
        fs::create_dir_all(root.join("static")).unwrap();

        fs::write(
            assets.join("stylesheets/site.css"),
            ".brand { background: url(../images/logo.png); }\n\
             .hero { background: url(https://cdn.example.com/x.png); }\n",
        )
        .unwrap();
        fs::write(
            assets.join("javascripts/site.js"),
            "const logo = \"images/logo.png\";\nconsole.log(logo);\n",
        )
        .unwrap();
        fs::write(assets.join("images/logo.png"), b"fake png bytes").unwrap();
        fs::write(assets.join("fonts/icons.woff2"), b"fake font bytes").unwrap();
        fs::write(
            root.join("static/index.html"),
            "<html><head>\
             <link rel=\"stylesheet\" href=\"assets/stylesheets/site.min.css\">\
             </head><body>\
             <img src=\"assets/images/logo.png\">\
             </body></html>",
        )
        .unwrap();
    }

    fn run_graph(graph: &TaskGraph, config: &BusterConfig) -> Result<(), GraphError> {
        let mut ctx = StageContext::new(config, BuildMode::PRODUCTION);
        graph.run(&mut ctx).map(|_| ())
    }

    #[test]
    fn test_development_build_compiles_without_rev() {
        let dir = TempDir::new().unwrap();
        write_site(dir.path());
        let config = test_config_at(dir.path());

        run_graph(&development_graph(), &config).unwrap();

        let assets = dir.path().join("build/assets");
        assert!(assets.join("stylesheets/site.css").exists());
        assert!(assets.join("stylesheets/site.min.css").exists());
        assert!(assets.join("javascripts/site.min.js").exists());
        assert!(assets.join("images/logo.png").exists());
        assert!(assets.join("fonts/icons.woff2").exists());
        assert!(dir.path().join("build/index.html").exists());

        // No manifest, no hashed copies
        assert!(!assets.join("rev-manifest.json").exists());
        assert!(crate::asset::collect_files(&assets, |p| rev::is_revved(p)).is_empty());
    }

    #[test]
    fn test_production_build_end_to_end() {
        let dir = TempDir::new().unwrap();
        write_site(dir.path());
        let config = test_config_at(dir.path());

        run_graph(&production_graph(), &config).unwrap();

        let assets = dir.path().join("build/assets");

        // Manifest covers the image, the font, and the css/js sub-pass
        let manifest =
            Manifest::load(&assets.join("rev-manifest.json")).unwrap();
        let hashed_logo = manifest.get("images/logo.png").unwrap().to_string();
        assert!(hashed_logo.starts_with("images/logo-"));
        assert!(manifest.get("fonts/icons.woff2").is_some());
        let hashed_css = manifest.get("stylesheets/site.min.css").unwrap().to_string();
        assert!(assets.join(&hashed_logo).exists());
        assert!(assets.join(&hashed_css).exists());

        // CSS references the hashed image; the unhashed name is gone;
        // the external URL survived untouched
        let css = fs::read_to_string(assets.join("stylesheets/site.min.css")).unwrap();
        assert!(css.contains(hashed_logo.as_str()));
        assert!(!css.contains("images/logo.png"));
        assert!(css.contains("https://cdn.example.com/x.png"));

        // The hashed CSS copy has the same rewritten contents
        let hashed_css_content = fs::read_to_string(assets.join(&hashed_css)).unwrap();
        assert_eq!(css, hashed_css_content);

        // HTML references the hashed css/image names, not the originals
        let html = fs::read_to_string(dir.path().join("build/index.html")).unwrap();
        assert!(html.contains(hashed_css.as_str()));
        assert!(!html.contains("assets/stylesheets/site.min.css\""));
        assert!(html.contains(hashed_logo.as_str()));
    }

    #[test]
    fn test_production_build_idempotent_for_unchanged_content() {
        let dir = TempDir::new().unwrap();
        write_site(dir.path());
        let config = test_config_at(dir.path());

        run_graph(&production_graph(), &config).unwrap();
        let assets = dir.path().join("build/assets");
        let first = Manifest::load(&assets.join("rev-manifest.json")).unwrap();

        // Unchanged sources: a second full build lands on identical names
        run_graph(&production_graph(), &config).unwrap();
        let second = Manifest::load(&assets.join("rev-manifest.json")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_changed_asset_changes_only_its_name() {
        let dir = TempDir::new().unwrap();
        write_site(dir.path());
        let config = test_config_at(dir.path());

        run_graph(&production_graph(), &config).unwrap();
        let assets = dir.path().join("build/assets");
        let first = Manifest::load(&assets.join("rev-manifest.json")).unwrap();

        fs::write(
            dir.path().join("src/assets/images/logo.png"),
            b"different png bytes",
        )
        .unwrap();
        run_graph(&production_graph(), &config).unwrap();
        let second = Manifest::load(&assets.join("rev-manifest.json")).unwrap();

        assert_ne!(
            first.get("images/logo.png"),
            second.get("images/logo.png")
        );
        assert_eq!(
            first.get("fonts/icons.woff2"),
            second.get("fonts/icons.woff2")
        );
    }

    #[test]
    fn test_rev_exclude_respected() {
        let dir = TempDir::new().unwrap();
        write_site(dir.path());
        let mut config = test_config_at(dir.path());
        config.build.rev.exclude = vec!["woff2".to_string()];

        run_graph(&production_graph(), &config).unwrap();

        let assets = dir.path().join("build/assets");
        let manifest = Manifest::load(&assets.join("rev-manifest.json")).unwrap();
        assert!(manifest.get("fonts/icons.woff2").is_none());
        assert!(manifest.get("images/logo.png").is_some());
    }

    #[test]
    fn test_malformed_stylesheet_fails_compile_stage() {
        let dir = TempDir::new().unwrap();
        write_site(dir.path());
        fs::write(
            dir.path().join("src/assets/stylesheets/broken.css"),
            "<html>this is not css</html>",
        )
        .unwrap();
        let config = test_config_at(dir.path());

        let err = run_graph(&production_graph(), &config).unwrap_err();
        match err {
            GraphError::Stage { stage, .. } => assert_eq!(stage, StageId::CompileStyles),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rewrite_without_hash_stage_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_site(dir.path());
        let config = test_config_at(dir.path());

        let err = run_graph(&graph_for(&[StageId::RewriteSources]), &config).unwrap_err();
        assert!(matches!(err, GraphError::UnknownDependency { .. }));
    }
}
