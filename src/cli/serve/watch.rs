//! File watching: re-run only the stages owning the changed files.
//!
//! Change events are debounced and deduplicated, then mapped onto
//! pipeline stages by where the file lives and what kind it is. A
//! stylesheet edit re-runs compile-styles only; an image drop re-runs
//! copy-images. Rebuild failures are reported to the terminal and never
//! take the server down.

use crossbeam::channel::{self, Receiver};
use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::{
    asset::AssetKind,
    config::{BusterConfig, cfg, reload_config},
    core::{BuildMode, is_healthy, set_healthy},
    debug, log,
    logger::{status_error, status_success},
    pipeline::{self, StageContext, StageId},
    utils::path::normalize_path,
};

const DEBOUNCE_MS: u64 = 300;
const REBUILD_COOLDOWN_MS: u64 = 800;

/// Spawn the watcher thread.
pub fn spawn_watcher(shutdown_rx: Receiver<()>) -> Option<JoinHandle<()>> {
    Some(thread::spawn(move || {
        if let Err(e) = run_watcher(&shutdown_rx) {
            log!("watch"; "error: {:#}", e);
        }
    }))
}

fn run_watcher(shutdown_rx: &Receiver<()>) -> anyhow::Result<()> {
    let (tx, events) = channel::unbounded::<notify::Event>();
    let mut watcher =
        notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        })?;

    let config = cfg();
    for dir in [&config.build.source, &config.build.static_dir] {
        if dir.exists() {
            watcher.watch(dir, RecursiveMode::Recursive)?;
        }
    }
    if config.config_path.exists() {
        watcher.watch(&config.config_path, RecursiveMode::NonRecursive)?;
    }

    log!(
        "watch";
        "watching {} and {}",
        config.root_relative(&config.build.source).display(),
        config.root_relative(&config.build.static_dir).display()
    );

    let mut debouncer = Debouncer::new();
    loop {
        crossbeam::select! {
            recv(shutdown_rx) -> _ => return Ok(()),
            recv(events) -> event => {
                if let Ok(event) = event {
                    debouncer.add_event(&event);
                }
            }
            default(debouncer.sleep_duration()) => {}
        }

        if crate::core::is_shutdown() {
            return Ok(());
        }

        if let Some(changes) = debouncer.take_if_ready() {
            handle_changes(&changes);
        }
    }
}

/// Map debounced changes onto stages and rebuild.
fn handle_changes(changes: &FxHashSet<PathBuf>) {
    let mut full_rebuild = false;

    if changes.contains(&cfg().config_path) {
        match reload_config() {
            Ok(true) => {
                log!("watch"; "config reloaded");
                full_rebuild = true;
            }
            Ok(false) => {}
            Err(e) => {
                status_error("config reload failed", &format!("{e:#}"));
                return;
            }
        }
    }

    // Re-read after a potential reload
    let config = cfg();

    let mut stages: Vec<StageId> = changes
        .iter()
        .filter_map(|path| classify(path, &config))
        .collect::<FxHashSet<_>>()
        .into_iter()
        .collect();

    if stages.is_empty() && !full_rebuild {
        return;
    }

    // After a failed build the tree is not trusted; start over from a
    // full compile rather than resuming with a subset
    if full_rebuild || !is_healthy() {
        stages = pipeline::development_graph().stage_ids();
    }
    stages.sort_by_key(|s| s.name());

    rebuild(&stages, &config);
}

/// Which stage owns a changed file?
fn classify(path: &Path, config: &BusterConfig) -> Option<StageId> {
    let kind = AssetKind::from_path(path);

    if path.starts_with(config.build.source_assets()) {
        return match kind {
            AssetKind::Stylesheet => Some(StageId::CompileStyles),
            AssetKind::Script => Some(StageId::CompileScripts),
            AssetKind::Image => Some(StageId::CopyImages),
            AssetKind::Font => Some(StageId::CopyFonts),
            _ => None,
        };
    }

    if path.starts_with(&config.build.static_dir) && kind == AssetKind::Markup {
        return Some(StageId::CopyMarkup);
    }

    None
}

fn rebuild(stages: &[StageId], config: &BusterConfig) {
    let names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
    debug!("watch"; "rebuilding: {}", names.join(", "));

    let graph = pipeline::graph_for(stages);
    let mut ctx = StageContext::new(config, BuildMode::DEVELOPMENT);
    match graph.run(&mut ctx) {
        Ok(report) => {
            set_healthy(true);
            status_success(&format!(
                "rebuilt {} ({} files)",
                names.join(", "),
                report.files
            ));
        }
        Err(e) => {
            set_healthy(false);
            status_error("rebuild failed", &e.to_string());
        }
    }
}

// ============================================================================
// Debouncer
// ============================================================================

/// Pure debouncer: timing and event deduplication only.
struct Debouncer {
    changes: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
    last_build: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            changes: FxHashSet::default(),
            last_event: None,
            last_build: None,
        }
    }

    /// Record a notify event. Metadata-only modifications and editor
    /// temp files are ignored (they trigger endless rebuild loops).
    fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        match event.kind {
            EventKind::Create(_) | EventKind::Remove(_) => {}
            EventKind::Modify(modify) => {
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
            }
            _ => return,
        }

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            let path = normalize_path(path);
            debug!("watch"; "event: {}", path.display());
            self.changes.insert(path);
            self.last_event = Some(Instant::now());
        }
    }

    /// Take the pending changes if debounce + cooldown elapsed.
    fn take_if_ready(&mut self) -> Option<FxHashSet<PathBuf>> {
        if !self.is_ready() {
            return None;
        }

        let changes = std::mem::take(&mut self.changes);
        self.last_event = None;

        if changes.is_empty() {
            return None;
        }

        self.last_build = Some(Instant::now());
        Some(changes)
    }

    fn is_ready(&self) -> bool {
        let Some(last_event) = self.last_event else {
            return false;
        };

        if last_event.elapsed() < Duration::from_millis(DEBOUNCE_MS) {
            return false;
        }

        if let Some(last_build) = self.last_build
            && last_build.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS)
        {
            return false;
        }

        !self.changes.is_empty()
    }

    /// Precise sleep duration until the next possible ready time.
    fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };

        let debounce_remaining =
            Duration::from_millis(DEBOUNCE_MS).saturating_sub(last_event.elapsed());

        let cooldown_remaining = self
            .last_build
            .map(|t| Duration::from_millis(REBUILD_COOLDOWN_MS).saturating_sub(t.elapsed()))
            .unwrap_or(Duration::ZERO);

        debounce_remaining
            .max(cooldown_remaining)
            .max(Duration::from_millis(1))
    }
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_at;
    use tempfile::TempDir;

    #[test]
    fn test_classify_by_location_and_kind() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path());
        let assets = config.build.source_assets();

        assert_eq!(
            classify(&assets.join("stylesheets/site.css"), &config),
            Some(StageId::CompileStyles)
        );
        assert_eq!(
            classify(&assets.join("javascripts/site.js"), &config),
            Some(StageId::CompileScripts)
        );
        assert_eq!(
            classify(&assets.join("images/logo.png"), &config),
            Some(StageId::CopyImages)
        );
        assert_eq!(
            classify(&assets.join("fonts/icons.woff2"), &config),
            Some(StageId::CopyFonts)
        );
        assert_eq!(
            classify(&config.build.static_dir.join("index.html"), &config),
            Some(StageId::CopyMarkup)
        );
    }

    #[test]
    fn test_classify_ignores_unrelated_paths() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path());

        // outside the watched trees
        assert_eq!(classify(&dir.path().join("README.md"), &config), None);
        // non-markup inside static
        assert_eq!(
            classify(&config.build.static_dir.join("notes.txt"), &config),
            None
        );
        // unclassified kind inside assets
        assert_eq!(
            classify(&config.build.source_assets().join("data.json"), &config),
            None
        );
    }

    #[test]
    fn test_debouncer_waits_for_quiet_window() {
        let mut debouncer = Debouncer::new();
        let event = notify::Event {
            kind: notify::EventKind::Create(notify::event::CreateKind::File),
            paths: vec![PathBuf::from("/site/src/assets/stylesheets/site.css")],
            attrs: Default::default(),
        };
        debouncer.add_event(&event);

        // Immediately after the event the debounce window is still open
        assert!(debouncer.take_if_ready().is_none());
        assert!(!debouncer.changes.is_empty());
        assert!(debouncer.sleep_duration() <= Duration::from_millis(DEBOUNCE_MS));
    }

    #[test]
    fn test_debouncer_dedups_paths() {
        let mut debouncer = Debouncer::new();
        for _ in 0..3 {
            debouncer.add_event(&notify::Event {
                kind: notify::EventKind::Modify(notify::event::ModifyKind::Data(
                    notify::event::DataChange::Content,
                )),
                paths: vec![PathBuf::from("/site/src/assets/images/logo.png")],
                attrs: Default::default(),
            });
        }
        assert_eq!(debouncer.changes.len(), 1);
    }

    #[test]
    fn test_debouncer_ignores_temp_files() {
        assert!(is_temp_file(Path::new("/site/src/.site.css.swp")));
        assert!(is_temp_file(Path::new("/site/src/site.css~")));
        assert!(is_temp_file(Path::new("/site/src/site.css.bak")));
        assert!(!is_temp_file(Path::new("/site/src/site.css")));

        let mut debouncer = Debouncer::new();
        debouncer.add_event(&notify::Event {
            kind: notify::EventKind::Create(notify::event::CreateKind::File),
            paths: vec![PathBuf::from("/site/src/assets/.site.css.swp")],
            attrs: Default::default(),
        });
        assert!(debouncer.changes.is_empty());
    }

    #[test]
    fn test_debouncer_ignores_metadata_changes() {
        let mut debouncer = Debouncer::new();
        debouncer.add_event(&notify::Event {
            kind: notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
                notify::event::MetadataKind::Any,
            )),
            paths: vec![PathBuf::from("/site/src/assets/images/logo.png")],
            attrs: Default::default(),
        });
        assert!(debouncer.changes.is_empty());
    }
}
