//! Site building orchestration.
//!
//! Build pipeline phases:
//! - **Init** - Output tree preparation (optional clean)
//! - **Collect** - Count source files for the progress display
//! - **Graph** - Run the stage graph for the selected build target
//! - **Finalize** - Logging

use anyhow::Result;
use rustc_hash::FxHashMap;
use std::fs;

use crate::{
    asset::{AssetKind, scan_markup, scan_source_assets},
    config::BusterConfig,
    core::BuildMode,
    log,
    logger::ProgressLine,
    pipeline::{self, StageContext},
    utils::plural_count,
};

/// Build the site with the graph for the given mode.
///
/// A failed build reports the failing stage and leaves no trusted
/// manifest behind; the next attempt starts again from compile.
pub fn build_site(mode: BuildMode, config: &BusterConfig, quiet: bool) -> Result<()> {
    init_build(config)?;

    let progress = create_progress(config, quiet);

    let graph = if mode.rev {
        pipeline::production_graph()
    } else {
        pipeline::development_graph()
    };

    let mut ctx = StageContext::new(config, mode).with_progress(progress.as_ref());
    let report = graph.run(&mut ctx)?;

    if let Some(progress) = progress {
        progress.finish();
    }

    if !quiet {
        log!("build"; "{} across {} stages",
            plural_count(report.files, "file"), report.completed.len());
    }

    Ok(())
}

/// Prepare the output directory.
fn init_build(config: &BusterConfig) -> Result<()> {
    let output = &config.build.output;

    if config.build.clean && output.exists() {
        fs::remove_dir_all(output)?;
    }
    fs::create_dir_all(output)?;
    Ok(())
}

/// Create the progress display with per-kind source counts.
fn create_progress(config: &BusterConfig, quiet: bool) -> Option<ProgressLine> {
    if quiet {
        return None;
    }

    let mut counts: FxHashMap<&'static str, usize> = FxHashMap::default();
    for route in scan_source_assets(config) {
        if route.kind != AssetKind::Other {
            *counts.entry(route.kind.label()).or_default() += 1;
        }
    }
    let markup = scan_markup(config).len();

    Some(ProgressLine::new(&[
        ("styles", counts.get("styles").copied().unwrap_or(0)),
        ("scripts", counts.get("scripts").copied().unwrap_or(0)),
        ("images", counts.get("images").copied().unwrap_or(0)),
        ("fonts", counts.get("fonts").copied().unwrap_or(0)),
        ("html", markup),
    ]))
}
