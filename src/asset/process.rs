//! Asset processing with side effects (copying, minification).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::scan::AssetRoute;

/// Compile a stylesheet into the build tree.
///
/// Writes the source as-is, plus a minified `.min.css` sibling when
/// `minify` is enabled. Sources already named `*.min.css` are copied
/// without re-minifying.
pub fn compile_stylesheet(route: &AssetRoute, minify: bool) -> Result<()> {
    compile_text_asset(route, minify, "css", super::minify::minify_css)
}

/// Compile a script into the build tree.
///
/// Same contract as [`compile_stylesheet`], producing `.min.js`.
pub fn compile_script(route: &AssetRoute, minify: bool) -> Result<()> {
    compile_text_asset(route, minify, "js", super::minify::minify_js)
}

/// Copy a binary asset (image, font) into the build tree.
pub fn copy_asset(route: &AssetRoute) -> Result<()> {
    ensure_parent(&route.output)?;
    fs::copy(&route.source, &route.output)
        .with_context(|| format!("failed to copy {}", route.source.display()))?;
    Ok(())
}

fn compile_text_asset(
    route: &AssetRoute,
    minify: bool,
    ext: &str,
    minifier: impl Fn(&str) -> Result<String>,
) -> Result<()> {
    ensure_parent(&route.output)?;

    let source = fs::read_to_string(&route.source)
        .with_context(|| format!("failed to read {}", route.source.display()))?;
    fs::write(&route.output, &source)
        .with_context(|| format!("failed to write {}", route.output.display()))?;

    if !minify || is_pre_minified(&route.source) {
        return Ok(());
    }

    let minified =
        minifier(&source).with_context(|| format!("in {}", route.source.display()))?;
    let min_output = min_sibling(&route.output, ext);
    fs::write(&min_output, minified)
        .with_context(|| format!("failed to write {}", min_output.display()))?;
    Ok(())
}

/// `site.css` -> `site.min.css` next to the output file.
fn min_sibling(output: &Path, ext: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    output.with_file_name(format!("{stem}.min.{ext}"))
}

/// Check for an already-minified source (`*.min.css` / `*.min.js`).
fn is_pre_minified(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(".min"))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetKind;
    use tempfile::TempDir;

    fn route(source: PathBuf, output: PathBuf) -> AssetRoute {
        let kind = AssetKind::from_path(&source);
        AssetRoute {
            source,
            output,
            kind,
        }
    }

    #[test]
    fn test_compile_stylesheet_writes_both() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("site.css");
        fs::write(&source, "body {\n  color: red;\n}\n").unwrap();
        let output = dir.path().join("out/stylesheets/site.css");

        compile_stylesheet(&route(source, output.clone()), true).unwrap();

        assert!(output.exists());
        let min = output.with_file_name("site.min.css");
        assert!(min.exists());
        assert!(fs::read_to_string(&min).unwrap().len() < fs::read_to_string(&output).unwrap().len());
    }

    #[test]
    fn test_compile_stylesheet_no_minify() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("site.css");
        fs::write(&source, "body {}").unwrap();
        let output = dir.path().join("out/site.css");

        compile_stylesheet(&route(source, output.clone()), false).unwrap();

        assert!(output.exists());
        assert!(!output.with_file_name("site.min.css").exists());
    }

    #[test]
    fn test_compile_pre_minified_not_doubled() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("vendor.min.js");
        fs::write(&source, "console.log(1);").unwrap();
        let output = dir.path().join("out/vendor.min.js");

        compile_script(&route(source, output.clone()), true).unwrap();

        assert!(output.exists());
        assert!(!output.with_file_name("vendor.min.min.js").exists());
    }

    #[test]
    fn test_compile_malformed_stylesheet_reports_path() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("broken.css");
        fs::write(&source, "<html>this is not css</html>").unwrap();
        let output = dir.path().join("out/broken.css");

        let err = compile_stylesheet(&route(source, output), true).unwrap_err();
        assert!(format!("{err:#}").contains("broken.css"));
    }

    #[test]
    fn test_copy_asset() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("logo.png");
        fs::write(&source, b"fake png").unwrap();
        let output = dir.path().join("out/images/logo.png");

        copy_asset(&route(source, output.clone())).unwrap();
        assert_eq!(fs::read(&output).unwrap(), b"fake png");
    }

    #[test]
    fn test_copy_asset_missing_source_reports_path() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("gone.png");
        let output = dir.path().join("out/gone.png");

        let err = copy_asset(&route(source, output)).unwrap_err();
        assert!(format!("{err:#}").contains("gone.png"));
    }
}
